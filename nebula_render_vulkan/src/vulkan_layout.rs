/// Per-mip-level image layout tracking
///
/// A texture remembers the layout of every mip level. Transitions only touch
/// the levels that are not already in the target layout, and contiguous
/// levels sharing the same old layout go through a single barrier.

use std::ops::Range;

use ash::vk;
use nebula_render::nebula::Result;

/// Contiguous levels moving out of the same old layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LayoutRun {
    pub base_level: u32,
    pub level_count: u32,
    pub old_layout: vk::ImageLayout,
}

/// Group the levels of `range` that differ from `target` into runs
///
/// Levels already in `target` split runs and produce no barrier.
pub(crate) fn plan_layout_transitions(
    current: &[vk::ImageLayout],
    range: Range<u32>,
    target: vk::ImageLayout,
) -> Vec<LayoutRun> {
    let mut runs: Vec<LayoutRun> = Vec::new();
    let end = range.end.min(current.len() as u32);
    for level in range.start..end {
        let old = current[level as usize];
        if old == target {
            continue;
        }
        match runs.last_mut() {
            Some(run) if run.old_layout == old && run.base_level + run.level_count == level => {
                run.level_count += 1;
            }
            _ => runs.push(LayoutRun {
                base_level: level,
                level_count: 1,
                old_layout: old,
            }),
        }
    }
    runs
}

/// Access mask and pipeline stage that go with a layout on either side of a barrier
pub(crate) fn layout_access_and_stage(layout: vk::ImageLayout) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        vk::ImageLayout::UNDEFINED => (vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => (vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => {
            (vk::AccessFlags::SHADER_READ, vk::PipelineStageFlags::FRAGMENT_SHADER)
        }
        _ => (
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    }
}

/// Layout of every mip level of one image
#[derive(Debug, Clone)]
pub(crate) struct MipLayouts {
    levels: Vec<vk::ImageLayout>,
}

impl MipLayouts {
    pub fn new(mip_count: u32) -> Self {
        Self {
            levels: vec![vk::ImageLayout::UNDEFINED; mip_count as usize],
        }
    }

    pub fn level(&self, level: u32) -> Option<vk::ImageLayout> {
        self.levels.get(level as usize).copied()
    }

    pub fn mip_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Run `submit` against a staged copy of the layouts
    ///
    /// The tracked layouts only change when `submit` succeeds, so a failed
    /// submission leaves them describing what the GPU last reached.
    pub fn stage<T>(&mut self, submit: impl FnOnce(&mut MipLayouts) -> Result<T>) -> Result<T> {
        let mut staged = self.clone();
        let value = submit(&mut staged)?;
        *self = staged;
        Ok(value)
    }

    /// Plan the barriers moving `range` to `target` and record the new layouts
    pub fn transition(&mut self, range: Range<u32>, target: vk::ImageLayout) -> Vec<LayoutRun> {
        let runs = plan_layout_transitions(&self.levels, range.clone(), target);
        let end = range.end.min(self.mip_count());
        for layout in &mut self.levels[range.start.min(end) as usize..end as usize] {
            *layout = target;
        }
        runs
    }

    /// Move `range` to `target`, recording one pipeline barrier per run
    ///
    /// # Returns
    ///
    /// Number of barriers recorded.
    pub fn record_transition(
        &mut self,
        device: &ash::Device,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        range: Range<u32>,
        target: vk::ImageLayout,
    ) -> u32 {
        let runs = self.transition(range, target);
        let (dst_access, dst_stage) = layout_access_and_stage(target);
        for run in &runs {
            let (src_access, src_stage) = layout_access_and_stage(run.old_layout);
            let barrier = vk::ImageMemoryBarrier::default()
                .old_layout(run.old_layout)
                .new_layout(target)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: run.base_level,
                    level_count: run.level_count,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .src_access_mask(src_access)
                .dst_access_mask(dst_access);

            unsafe {
                device.cmd_pipeline_barrier(
                    command_buffer,
                    src_stage,
                    dst_stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            }
        }
        runs.len() as u32
    }
}

#[cfg(test)]
#[path = "vulkan_layout_tests.rs"]
mod tests;
