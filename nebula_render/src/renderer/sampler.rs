/// Sampler state bundle

use crate::renderer::DeviceFeatures;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// How mip levels are selected during minification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MipmapMode {
    /// Sample level 0 only
    None,
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

/// Descriptor for creating a sampler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_mode: MipmapMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    /// Requested anisotropy degree, clamped to the device range at creation
    pub anisotropy: f32,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_mode: MipmapMode::None,
            address_u: AddressMode::Repeat,
            address_v: AddressMode::Repeat,
            anisotropy: DeviceFeatures::min_anisotropy_off(),
        }
    }
}

impl SamplerDesc {
    /// Copy of this descriptor with anisotropy clamped for `features`
    pub fn resolved(&self, features: &DeviceFeatures) -> SamplerDesc {
        SamplerDesc {
            anisotropy: features.clamp_anisotropy_degree(self.anisotropy),
            ..*self
        }
    }

    pub fn is_anisotropic(&self) -> bool {
        self.anisotropy > DeviceFeatures::min_anisotropy_off()
    }
}

/// Sampler resource trait
///
/// Samplers are immutable; `desc()` reports the resolved (clamped) state.
pub trait Sampler {
    fn desc(&self) -> &SamplerDesc;
}
