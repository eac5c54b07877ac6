//! Unit tests for 2D texture validation

use crate::error::Error;
use crate::renderer::texture::*;
use crate::renderer::DeviceFeatures;

fn desc(width: u32, height: u32, mip_count: u32) -> R2TextureDesc {
    R2TextureDesc {
        format: PixelFormat::R8G8B8A8_UNORM,
        width,
        height,
        mip_count,
    }
}

// ============================================================================
// FORMAT SIZES
// ============================================================================

#[test]
fn test_bytes_per_pixel() {
    assert_eq!(PixelFormat::R8_UNORM.bytes_per_pixel(), 1);
    assert_eq!(PixelFormat::R8G8B8_UNORM.bytes_per_pixel(), 3);
    assert_eq!(PixelFormat::B8G8R8A8_UNORM.bytes_per_pixel(), 4);
    assert_eq!(PixelFormat::R32G32B32A32_SFLOAT.bytes_per_pixel(), 16);
}

// ============================================================================
// MIP CHAIN
// ============================================================================

#[test]
fn test_full_mip_chain_len() {
    assert_eq!(full_mip_chain_len(1, 1), 1);
    assert_eq!(full_mip_chain_len(64, 64), 7);
    assert_eq!(full_mip_chain_len(256, 16), 9);
    assert_eq!(full_mip_chain_len(100, 30), 7);
}

#[test]
fn test_mip_extent_never_below_one() {
    let info = validate_r2_texture_desc(&desc(64, 16, 7), &DeviceFeatures::headless()).unwrap();
    assert_eq!(info.mip_extent(0), (64, 16));
    assert_eq!(info.mip_extent(4), (4, 1));
    assert_eq!(info.mip_extent(6), (1, 1));
    assert_eq!(info.mip_byte_size(4), 4 * 1 * 4);
}

// ============================================================================
// DESCRIPTOR VALIDATION
// ============================================================================

#[test]
fn test_zero_dimensions_rejected() {
    let features = DeviceFeatures::headless();
    assert!(matches!(validate_r2_texture_desc(&desc(0, 4, 1), &features), Err(Error::InvalidArgument(_))));
    assert!(matches!(validate_r2_texture_desc(&desc(4, 0, 1), &features), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_dimensions_above_device_max_rejected() {
    let features = DeviceFeatures {
        max_texture_dimension: 512,
        ..DeviceFeatures::headless()
    };
    assert!(validate_r2_texture_desc(&desc(1024, 4, 1), &features).is_err());
    assert!(validate_r2_texture_desc(&desc(512, 512, 1), &features).is_ok());
}

#[test]
fn test_mip_count_range() {
    let features = DeviceFeatures::headless();
    assert!(validate_r2_texture_desc(&desc(64, 64, 0), &features).is_err());
    assert!(validate_r2_texture_desc(&desc(64, 64, 7), &features).is_ok());
    assert!(validate_r2_texture_desc(&desc(64, 64, 8), &features).is_err());
}

#[test]
fn test_npot_requires_support() {
    let features = DeviceFeatures {
        is_npot_available: false,
        ..DeviceFeatures::headless()
    };
    assert!(matches!(validate_r2_texture_desc(&desc(100, 64, 1), &features), Err(Error::Unsupported(_))));
    assert!(validate_r2_texture_desc(&desc(128, 64, 1), &features).is_ok());
    assert!(validate_r2_texture_desc(&desc(100, 64, 1), &DeviceFeatures::headless()).is_ok());
}

// ============================================================================
// UPLOADS AND MIPMAP GENERATION
// ============================================================================

#[test]
fn test_mip_upload_size_must_match() {
    let info = validate_r2_texture_desc(&desc(8, 8, 2), &DeviceFeatures::headless()).unwrap();
    assert!(validate_mip_upload(&info, 0, 8 * 8 * 4).is_ok());
    assert!(validate_mip_upload(&info, 1, 4 * 4 * 4).is_ok());
    assert!(validate_mip_upload(&info, 0, 10).is_err());
    assert!(validate_mip_upload(&info, 2, 2 * 2 * 4).is_err());
}

#[test]
fn test_generate_mipmaps_single_level_is_noop() {
    let features = DeviceFeatures {
        is_mipmap_available: false,
        ..DeviceFeatures::headless()
    };
    let info = validate_r2_texture_desc(&desc(64, 64, 1), &features).unwrap();
    assert_eq!(check_generate_mipmaps(&info, &features).unwrap(), false);
}

#[test]
fn test_generate_mipmaps_without_support_fails() {
    let features = DeviceFeatures {
        is_mipmap_available: false,
        ..DeviceFeatures::headless()
    };
    let info = validate_r2_texture_desc(&desc(64, 64, 4), &features).unwrap();
    assert!(matches!(check_generate_mipmaps(&info, &features), Err(Error::Unsupported(_))));
}

#[test]
fn test_generate_mipmaps_with_support() {
    let features = DeviceFeatures::headless();
    let info = validate_r2_texture_desc(&desc(64, 64, 4), &features).unwrap();
    assert!(check_generate_mipmaps(&info, &features).unwrap());
}
