/// Device capability record, filled once when a backend starts

use bitflags::bitflags;

/// What the active GPU/driver pair supports
///
/// Backends build this once during initialization; callers only ever get a
/// shared reference through `Renderer::device_features`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFeatures {
    /// Largest width/height accepted for a 2D texture
    pub max_texture_dimension: u32,
    pub max_viewport_width: u32,
    pub max_viewport_height: u32,

    pub is_anisotropy_available: bool,
    /// 1.0 when anisotropic filtering is unavailable
    pub max_anisotropy_degree: f32,

    /// Non-power-of-two texture dimensions
    pub is_npot_available: bool,
    /// Hardware mipmap generation
    pub is_mipmap_available: bool,
    /// Sampler objects separate from textures
    pub is_sampler_available: bool,

    pub is_msaa_available: bool,
    pub max_msaa_degree: u32,
    /// MSAA only works when rendering straight to the window surface
    pub is_msaa_render_to_window: bool,
    /// Changing the MSAA degree needs a context/device restart
    pub is_msaa_requires_restart: bool,

    pub is_vsync_available: bool,
    /// Toggling vsync needs a context/device restart
    pub is_vsync_requires_restart: bool,

    pub is_vao_available: bool,
    pub is_buffer_storage_available: bool,
    pub is_dsa_available: bool,
    pub is_sso_available: bool,

    pub max_vertex_input_locations: u32,
    /// Number of texture/sampler units addressable by `set_texture` / `set_sampler`
    pub max_texture_units: u32,
}

impl DeviceFeatures {
    /// Anisotropy degree meaning "anisotropic filtering off"
    pub const fn min_anisotropy_off() -> f32 {
        1.0
    }

    /// Clamp a requested anisotropy degree into
    /// `[min_anisotropy_off(), max_anisotropy_degree]`.
    ///
    /// Idempotent. NaN maps to the minimum.
    pub fn clamp_anisotropy_degree(&self, degree: f32) -> f32 {
        let min = Self::min_anisotropy_off();
        let max = if self.is_anisotropy_available {
            self.max_anisotropy_degree.max(min)
        } else {
            min
        };
        if degree.is_nan() {
            return min;
        }
        degree.clamp(min, max)
    }

    /// Lowest common denominator every backend starts from before probing
    pub fn baseline() -> Self {
        Self {
            max_texture_dimension: 1024,
            max_viewport_width: 1024,
            max_viewport_height: 1024,
            is_anisotropy_available: false,
            max_anisotropy_degree: Self::min_anisotropy_off(),
            is_npot_available: false,
            is_mipmap_available: false,
            is_sampler_available: false,
            is_msaa_available: false,
            max_msaa_degree: 1,
            is_msaa_render_to_window: false,
            is_msaa_requires_restart: false,
            is_vsync_available: false,
            is_vsync_requires_restart: false,
            is_vao_available: false,
            is_buffer_storage_available: false,
            is_dsa_available: false,
            is_sso_available: false,
            max_vertex_input_locations: 8,
            max_texture_units: 8,
        }
    }

    /// Capabilities reported by the Null backend: everything on, generous limits
    pub fn headless() -> Self {
        Self {
            max_texture_dimension: 16384,
            max_viewport_width: 16384,
            max_viewport_height: 16384,
            is_anisotropy_available: true,
            max_anisotropy_degree: 16.0,
            is_npot_available: true,
            is_mipmap_available: true,
            is_sampler_available: true,
            is_msaa_available: true,
            max_msaa_degree: 8,
            is_msaa_render_to_window: false,
            is_msaa_requires_restart: false,
            is_vsync_available: true,
            is_vsync_requires_restart: false,
            is_vao_available: true,
            is_buffer_storage_available: true,
            is_dsa_available: true,
            is_sso_available: true,
            max_vertex_input_locations: 16,
            max_texture_units: 16,
        }
    }
}

bitflags! {
    /// Forced fallbacks for capability probing
    ///
    /// Each flag makes the matching probe report the feature as missing, so the
    /// degraded code paths can be exercised on capable hardware.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProbeOverrides: u32 {
        const NO_ANISOTROPY = 1 << 0;
        const NO_NPOT = 1 << 1;
        const NO_MIPMAP = 1 << 2;
        const NO_FRAMEBUFFER_OBJECT = 1 << 3;
        const NO_MSAA = 1 << 4;
        const NO_SAMPLER_OBJECTS = 1 << 5;
        const NO_VAO = 1 << 6;
        const NO_BUFFER_STORAGE = 1 << 7;
        const NO_DSA = 1 << 8;
        const NO_SSO = 1 << 9;
        const NO_VSYNC = 1 << 10;
    }
}

#[cfg(test)]
#[path = "device_features_tests.rs"]
mod tests;
