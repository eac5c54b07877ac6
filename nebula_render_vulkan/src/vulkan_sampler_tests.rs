//! Unit tests for sampler create-info construction

use ash::vk;
use nebula_render::nebula::render::{AddressMode, DeviceFeatures, Filter, MipmapMode, SamplerDesc};

use super::*;

#[test]
fn test_default_sampler_has_no_mipmapping_or_anisotropy() {
    let info = sampler_create_info(&SamplerDesc::default());
    assert_eq!(info.mag_filter, vk::Filter::LINEAR);
    assert_eq!(info.max_lod, 0.0);
    assert_eq!(info.anisotropy_enable, vk::FALSE);
    assert_eq!(info.max_anisotropy, 1.0);
}

#[test]
fn test_anisotropy_clamped_before_create_info() {
    let features = DeviceFeatures {
        is_anisotropy_available: true,
        max_anisotropy_degree: 8.0,
        ..DeviceFeatures::baseline()
    };
    let desc = SamplerDesc {
        anisotropy: 64.0,
        ..SamplerDesc::default()
    }
    .resolved(&features);
    let info = sampler_create_info(&desc);
    assert_eq!(info.anisotropy_enable, vk::TRUE);
    assert_eq!(info.max_anisotropy, 8.0);

    // Without the capability every request collapses to "off"
    let resolved = desc.resolved(&DeviceFeatures::baseline());
    assert_eq!(sampler_create_info(&resolved).anisotropy_enable, vk::FALSE);
}

#[test]
fn test_filters_and_wrapping_carried_over() {
    let desc = SamplerDesc {
        mag_filter: Filter::Nearest,
        min_filter: Filter::Linear,
        mipmap_mode: MipmapMode::Linear,
        address_u: AddressMode::ClampToEdge,
        address_v: AddressMode::MirroredRepeat,
        anisotropy: 1.0,
    };
    let info = sampler_create_info(&desc);
    assert_eq!(info.mag_filter, vk::Filter::NEAREST);
    assert_eq!(info.min_filter, vk::Filter::LINEAR);
    assert_eq!(info.mipmap_mode, vk::SamplerMipmapMode::LINEAR);
    assert_eq!(info.max_lod, vk::LOD_CLAMP_NONE);
    assert_eq!(info.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);
    assert_eq!(info.address_mode_v, vk::SamplerAddressMode::MIRRORED_REPEAT);
}
