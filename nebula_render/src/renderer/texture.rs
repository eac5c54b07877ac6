/// 2D texture trait, descriptor and shared validation

use crate::error::{Error, Result};
use crate::renderer::DeviceFeatures;

/// Largest mip count any backend accepts
pub const MAX_MIP_COUNT: u32 = 31;

/// Texel formats for 2D textures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum PixelFormat {
    R8_UNORM,
    R8G8_UNORM,
    R8G8B8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::R8_UNORM => 1,
            PixelFormat::R8G8_UNORM => 2,
            PixelFormat::R8G8B8_UNORM => 3,
            PixelFormat::R8G8B8A8_UNORM
            | PixelFormat::R8G8B8A8_SRGB
            | PixelFormat::B8G8R8A8_UNORM => 4,
            PixelFormat::R16G16B16A16_SFLOAT => 8,
            PixelFormat::R32G32B32A32_SFLOAT => 16,
        }
    }
}

/// Descriptor for creating a 2D texture
#[derive(Debug, Clone)]
pub struct R2TextureDesc {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Number of mip levels, 1 for no mipmaps
    pub mip_count: u32,
}

/// Read-only properties of a created 2D texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct R2TextureInfo {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub mip_count: u32,
}

impl R2TextureInfo {
    /// Dimensions of one mip level (never below 1x1)
    pub fn mip_extent(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }

    /// Exact byte length expected by `R2Texture::update` for a level
    pub fn mip_byte_size(&self, level: u32) -> usize {
        let (w, h) = self.mip_extent(level);
        w as usize * h as usize * self.format.bytes_per_pixel() as usize
    }
}

/// 2D texture resource trait
pub trait R2Texture {
    fn info(&self) -> &R2TextureInfo;

    /// Upload one whole mip level
    ///
    /// `data` must be exactly `info().mip_byte_size(mip_level)` bytes of
    /// tightly packed rows.
    fn update(&mut self, mip_level: u32, data: &[u8]) -> Result<()>;

    /// Derive levels `1..mip_count` from level 0 on the GPU
    ///
    /// Returns immediately for single-level textures. Fails with
    /// `Error::Unsupported` when the device cannot generate mipmaps.
    fn generate_mipmaps(&mut self) -> Result<()>;
}

/// Number of levels in a full chain down to 1x1
pub fn full_mip_chain_len(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Validate a texture descriptor against the device
pub fn validate_r2_texture_desc(desc: &R2TextureDesc, features: &DeviceFeatures) -> Result<R2TextureInfo> {
    if desc.width == 0 || desc.height == 0 {
        return Err(Error::InvalidArgument(format!(
            "Texture dimensions {}x{} must be non-zero",
            desc.width, desc.height
        )));
    }
    if desc.width > features.max_texture_dimension || desc.height > features.max_texture_dimension {
        return Err(Error::InvalidArgument(format!(
            "Texture dimensions {}x{} exceed device maximum {}",
            desc.width, desc.height, features.max_texture_dimension
        )));
    }
    if !features.is_npot_available && (!desc.width.is_power_of_two() || !desc.height.is_power_of_two()) {
        return Err(Error::Unsupported(format!(
            "Non-power-of-two texture {}x{} requires NPOT support",
            desc.width, desc.height
        )));
    }
    let max_levels = full_mip_chain_len(desc.width, desc.height).min(MAX_MIP_COUNT);
    if desc.mip_count == 0 || desc.mip_count > max_levels {
        return Err(Error::InvalidArgument(format!(
            "Mip count {} out of range 1..={} for {}x{}",
            desc.mip_count, max_levels, desc.width, desc.height
        )));
    }
    Ok(R2TextureInfo {
        format: desc.format,
        width: desc.width,
        height: desc.height,
        mip_count: desc.mip_count,
    })
}

/// Validate a single mip upload
pub fn validate_mip_upload(info: &R2TextureInfo, mip_level: u32, data_len: usize) -> Result<()> {
    if mip_level >= info.mip_count {
        return Err(Error::InvalidArgument(format!(
            "Mip level {} out of range (texture has {})",
            mip_level, info.mip_count
        )));
    }
    let expected = info.mip_byte_size(mip_level);
    if data_len != expected {
        return Err(Error::InvalidArgument(format!(
            "Mip level {} expects {} bytes, got {}",
            mip_level, expected, data_len
        )));
    }
    Ok(())
}

/// Decide whether `generate_mipmaps` has work to do
///
/// `Ok(false)` for single-level textures, `Ok(true)` when levels must be
/// generated, `Err(Unsupported)` when the device has no mipmap generation.
pub fn check_generate_mipmaps(info: &R2TextureInfo, features: &DeviceFeatures) -> Result<bool> {
    if info.mip_count <= 1 {
        return Ok(false);
    }
    if !features.is_mipmap_available {
        return Err(Error::Unsupported("Hardware mipmap generation is not available".to_string()));
    }
    Ok(true)
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
