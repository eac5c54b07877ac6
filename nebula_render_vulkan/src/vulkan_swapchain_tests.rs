//! Unit tests for swapchain parameter selection (no GPU)

use ash::vk;

use super::*;

fn capabilities(current: (u32, u32), min_images: u32, max_images: u32) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        min_image_count: min_images,
        max_image_count: max_images,
        current_extent: vk::Extent2D {
            width: current.0,
            height: current.1,
        },
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D {
            width: 4096,
            height: 4096,
        },
        ..Default::default()
    }
}

#[test]
fn test_vsync_always_uses_fifo() {
    let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
    assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
}

#[test]
fn test_no_vsync_prefers_mailbox_then_immediate() {
    let all = [
        vk::PresentModeKHR::FIFO,
        vk::PresentModeKHR::IMMEDIATE,
        vk::PresentModeKHR::MAILBOX,
    ];
    assert_eq!(choose_present_mode(&all, false), vk::PresentModeKHR::MAILBOX);

    let no_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
    assert_eq!(choose_present_mode(&no_mailbox, false), vk::PresentModeKHR::IMMEDIATE);

    assert_eq!(
        choose_present_mode(&[vk::PresentModeKHR::FIFO], false),
        vk::PresentModeKHR::FIFO
    );
}

#[test]
fn test_surface_format_prefers_srgb() {
    let unorm = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    let srgb = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    assert_eq!(choose_surface_format(&[unorm, srgb]).unwrap().format, vk::Format::B8G8R8A8_SRGB);
    assert_eq!(choose_surface_format(&[unorm]).unwrap().format, vk::Format::B8G8R8A8_UNORM);
    assert!(choose_surface_format(&[]).is_none());
}

#[test]
fn test_extent_follows_surface_or_window() {
    assert_eq!(
        choose_extent(&capabilities((800, 600), 2, 8), 1024, 768),
        vk::Extent2D {
            width: 800,
            height: 600
        }
    );

    // u32::MAX means the window decides
    let extent = choose_extent(&capabilities((u32::MAX, u32::MAX), 2, 8), 10000, 768);
    assert_eq!(
        extent,
        vk::Extent2D {
            width: 4096,
            height: 768
        }
    );
}

#[test]
fn test_image_count_within_limits() {
    assert_eq!(choose_image_count(&capabilities((1, 1), 2, 8)), 3);
    assert_eq!(choose_image_count(&capabilities((1, 1), 2, 2)), 2);
    assert_eq!(choose_image_count(&capabilities((1, 1), 4, 0)), 4);
    assert_eq!(choose_image_count(&capabilities((1, 1), 1, 0)), 3);
}

#[test]
fn test_single_sample_attachments() {
    let start = frame_attachments(vk::Format::B8G8R8A8_SRGB, vk::SampleCountFlags::TYPE_1, false);
    assert_eq!(start.len(), 2);
    assert_eq!(start[0].load_op, vk::AttachmentLoadOp::CLEAR);
    assert_eq!(start[0].initial_layout, vk::ImageLayout::UNDEFINED);
    assert_eq!(start[0].final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    assert_eq!(start[1].format, DEPTH_FORMAT);

    let resume = frame_attachments(vk::Format::B8G8R8A8_SRGB, vk::SampleCountFlags::TYPE_1, true);
    assert_eq!(resume[0].load_op, vk::AttachmentLoadOp::LOAD);
    assert_eq!(resume[0].initial_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    assert_eq!(resume[1].load_op, vk::AttachmentLoadOp::LOAD);
    assert_eq!(
        resume[1].initial_layout,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    );
}

#[test]
fn test_multisampled_attachments_resolve_to_swapchain_image() {
    let attachments = frame_attachments(vk::Format::B8G8R8A8_SRGB, vk::SampleCountFlags::TYPE_4, true);
    assert_eq!(attachments.len(), 3);
    assert_eq!(attachments[0].samples, vk::SampleCountFlags::TYPE_4);
    assert_eq!(attachments[0].initial_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    assert_eq!(attachments[1].samples, vk::SampleCountFlags::TYPE_4);
    assert_eq!(attachments[2].samples, vk::SampleCountFlags::TYPE_1);
    assert_eq!(attachments[2].load_op, vk::AttachmentLoadOp::DONT_CARE);
    assert_eq!(attachments[2].final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
}
