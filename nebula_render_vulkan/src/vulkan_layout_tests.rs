//! Unit tests for mip-level layout planning

use ash::vk;
use nebula_render::nebula::Error;

use super::*;

const UNDEFINED: vk::ImageLayout = vk::ImageLayout::UNDEFINED;
const DST: vk::ImageLayout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
const SRC: vk::ImageLayout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
const READ: vk::ImageLayout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;

#[test]
fn test_uniform_levels_form_one_run() {
    let runs = plan_layout_transitions(&[READ; 6], 0..6, DST);
    assert_eq!(
        runs,
        vec![LayoutRun {
            base_level: 0,
            level_count: 6,
            old_layout: READ
        }]
    );
}

#[test]
fn test_levels_already_in_target_are_skipped() {
    assert!(plan_layout_transitions(&[DST; 4], 0..4, DST).is_empty());

    // The middle level splits the READ levels into two runs
    let runs = plan_layout_transitions(&[READ, DST, READ], 0..3, DST);
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].base_level, 0);
    assert_eq!(runs[1].base_level, 2);
}

#[test]
fn test_barrier_count_equals_distinct_runs() {
    // Runs: [SRC SRC] [READ] [UNDEFINED UNDEFINED UNDEFINED] [SRC]
    let current = [SRC, SRC, READ, UNDEFINED, UNDEFINED, UNDEFINED, SRC];
    let runs = plan_layout_transitions(&current, 0..7, DST);
    assert_eq!(runs.len(), 4);
    assert_eq!(runs.iter().map(|r| r.level_count).sum::<u32>(), 7);
    assert_eq!(
        runs[2],
        LayoutRun {
            base_level: 3,
            level_count: 3,
            old_layout: UNDEFINED
        }
    );
}

#[test]
fn test_sub_range_only() {
    let current = [READ, SRC, SRC, READ];
    let runs = plan_layout_transitions(&current, 1..3, READ);
    assert_eq!(
        runs,
        vec![LayoutRun {
            base_level: 1,
            level_count: 2,
            old_layout: SRC
        }]
    );
    // Range past the end is clipped
    assert_eq!(plan_layout_transitions(&current, 3..10, DST).len(), 1);
}

#[test]
fn test_transition_updates_tracked_layouts() {
    let mut layouts = MipLayouts::new(4);
    assert_eq!(layouts.level(0), Some(UNDEFINED));

    let runs = layouts.transition(0..4, DST);
    assert_eq!(runs.len(), 1);
    assert!((0..4).all(|level| layouts.level(level) == Some(DST)));

    // Mipmap blit pattern: level 0 becomes a source, then everything goes to READ
    layouts.transition(0..1, SRC);
    let runs = layouts.transition(0..4, READ);
    assert_eq!(runs.len(), 2);
    assert_eq!(layouts.level(3), Some(READ));
    assert_eq!(layouts.level(4), None);

    // Second transition to the same layout is free
    assert!(layouts.transition(0..4, READ).is_empty());
}

#[test]
fn test_access_masks_follow_layout() {
    let (access, stage) = layout_access_and_stage(UNDEFINED);
    assert!(access.is_empty());
    assert_eq!(stage, vk::PipelineStageFlags::TOP_OF_PIPE);

    let (access, stage) = layout_access_and_stage(DST);
    assert_eq!(access, vk::AccessFlags::TRANSFER_WRITE);
    assert_eq!(stage, vk::PipelineStageFlags::TRANSFER);

    let (access, _) = layout_access_and_stage(READ);
    assert_eq!(access, vk::AccessFlags::SHADER_READ);
}

#[test]
fn test_staged_transition_commits_on_success() {
    let mut layouts = MipLayouts::new(3);
    let barriers = layouts
        .stage(|staged| Ok(staged.transition(0..3, DST).len()))
        .unwrap();

    assert_eq!(barriers, 1);
    assert_eq!(layouts.level(2), Some(DST));
}

#[test]
fn test_failed_submission_keeps_previous_layouts() {
    let mut layouts = MipLayouts::new(3);
    layouts.transition(0..3, READ);

    let result: nebula_render::nebula::Result<()> = layouts.stage(|staged| {
        staged.transition(1..3, DST);
        Err(Error::OutOfMemory)
    });

    assert!(matches!(result, Err(Error::OutOfMemory)));
    assert_eq!(layouts.level(1), Some(READ));
    // The next plan starts from the layouts the GPU actually reached
    let runs = layouts.transition(0..3, SRC);
    assert_eq!(
        runs,
        vec![LayoutRun {
            base_level: 0,
            level_count: 3,
            old_layout: READ
        }]
    );
}
