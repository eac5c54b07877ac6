/// Device capabilities from Vulkan physical-device properties

use ash::vk;
use nebula_render::nebula::render::{DeviceFeatures, ProbeOverrides, MAX_TEXTURE_UNITS};

use crate::vulkan_format::max_sample_count;

/// Upper bound on vertex attribute locations exposed through `DeviceFeatures`
const MAX_VERTEX_INPUT_LOCATIONS: u32 = 64;

/// Build the capability record of a physical device
///
/// `present_modes` are the modes the window surface supports. The GL
/// entry-point flags (VAO, DSA, SSO, buffer storage, sampler objects) have
/// no Vulkan counterpart to miss and are always reported.
pub(crate) fn build_device_features(
    limits: &vk::PhysicalDeviceLimits,
    features: &vk::PhysicalDeviceFeatures,
    present_modes: &[vk::PresentModeKHR],
    overrides: ProbeOverrides,
) -> DeviceFeatures {
    let is_anisotropy_available =
        features.sampler_anisotropy == vk::TRUE && !overrides.contains(ProbeOverrides::NO_ANISOTROPY);
    let max_anisotropy_degree = if is_anisotropy_available {
        limits.max_sampler_anisotropy.max(DeviceFeatures::min_anisotropy_off())
    } else {
        DeviceFeatures::min_anisotropy_off()
    };

    let sample_counts = limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;
    let max_msaa_degree = if overrides.contains(ProbeOverrides::NO_MSAA) {
        1
    } else {
        max_sample_count(sample_counts)
    };

    let can_disable_vsync = present_modes
        .iter()
        .any(|&mode| mode == vk::PresentModeKHR::MAILBOX || mode == vk::PresentModeKHR::IMMEDIATE);
    let is_vsync_available = can_disable_vsync && !overrides.contains(ProbeOverrides::NO_VSYNC);

    DeviceFeatures {
        max_texture_dimension: limits.max_image_dimension2_d,
        max_viewport_width: limits.max_viewport_dimensions[0],
        max_viewport_height: limits.max_viewport_dimensions[1],
        is_anisotropy_available,
        max_anisotropy_degree,
        is_npot_available: !overrides.contains(ProbeOverrides::NO_NPOT),
        is_mipmap_available: !overrides.contains(ProbeOverrides::NO_MIPMAP),
        is_sampler_available: true,
        is_msaa_available: max_msaa_degree > 1,
        max_msaa_degree,
        is_msaa_render_to_window: false,
        // The sample count is baked into the render passes at creation
        is_msaa_requires_restart: max_msaa_degree > 1,
        is_vsync_available,
        is_vsync_requires_restart: false,
        is_vao_available: true,
        is_buffer_storage_available: true,
        is_dsa_available: true,
        is_sso_available: true,
        max_vertex_input_locations: limits.max_vertex_input_attributes.min(MAX_VERTEX_INPUT_LOCATIONS),
        max_texture_units: limits
            .max_per_stage_descriptor_samplers
            .min(MAX_TEXTURE_UNITS as u32),
    }
}

#[cfg(test)]
#[path = "vulkan_features_tests.rs"]
mod tests;
