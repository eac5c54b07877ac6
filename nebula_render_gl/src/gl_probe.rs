/// OpenGL capability probing
///
/// `GlFeatureProber` turns a driver's version, extension strings and limits
/// into one `DeviceFeatures` record plus the GL-specific facts the backend
/// needs later (which mipmap entry point to call, whether FBOs exist).
///
/// Steps run in a fixed order. Each optional step only degrades its own
/// feature flag; a missing essential entry point is the only fatal outcome.
/// `ProbeOverrides` forces any optional step to report its feature missing.

use nebula_render::nebula::render::{DeviceFeatures, ProbeOverrides, MAX_TEXTURE_UNITS};
use nebula_render::nebula::{Error, Result};
use nebula_render::{engine_debug, engine_error, engine_info};

use crate::gl_format::{drain_errors, ErrorDrain};
use crate::gl_window::GlWindow;

const SOURCE: &str = "nebula::gl::probe";

/// Entry points every code path calls
pub const ESSENTIAL_FUNCTIONS: &[&str] = &[
    "glGetIntegerv",
    "glGetString",
    "glGetError",
    "glEnable",
    "glDisable",
    "glViewport",
    "glClear",
    "glGenBuffers",
    "glBufferData",
    "glGenTextures",
    "glTexImage2D",
    "glCreateShader",
    "glCreateProgram",
    "glDrawElements",
];

/// Required together for the EXT framebuffer path
pub const EXT_FRAMEBUFFER_EXTENSIONS: [&str; 4] = [
    "GL_EXT_framebuffer_blit",
    "GL_EXT_framebuffer_multisample",
    "GL_EXT_framebuffer_object",
    "GL_EXT_packed_depth_stencil",
];

/// Highest sample count tried on the window
const MAX_WINDOW_SAMPLES: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlVersion {
    pub major: u32,
    pub minor: u32,
    /// OpenGL ES context
    pub is_embedded: bool,
}

impl GlVersion {
    pub fn desktop(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            is_embedded: false,
        }
    }

    pub fn embedded(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            is_embedded: true,
        }
    }

    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }

    /// Desktop GL at or above `major.minor`
    pub fn is_desktop_at_least(&self, major: u32, minor: u32) -> bool {
        !self.is_embedded && self.at_least(major, minor)
    }

    pub fn is_embedded_at_least(&self, major: u32, minor: u32) -> bool {
        self.is_embedded && self.at_least(major, minor)
    }
}

/// Which flavor of an entry point family the driver exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPointVariant {
    /// Core or ARB names (`glGenerateMipmap`)
    Core,
    /// EXT-suffixed names (`glGenerateMipmapEXT`)
    Ext,
}

/// Driver queries the prober needs
///
/// Implemented over the live glow context and window, and by fakes in tests.
pub trait GlProbeApi {
    /// Whether the loader resolves `name`
    fn has_function(&self, name: &str) -> bool;

    fn version(&self) -> GlVersion;

    fn vendor(&self) -> String;

    fn renderer(&self) -> String;

    fn has_extension(&self, name: &str) -> bool;

    /// `glGetIntegerv` into `out`; values stay untouched when unsupported
    fn get_integers(&self, pname: u32, out: &mut [i32]);

    fn get_float(&self, pname: u32) -> f32;

    /// Whether the window can host a context with `samples` MSAA samples
    fn try_window_samples(&self, samples: u32) -> bool;

    fn set_swap_interval(&self, interval: u32) -> bool;

    fn get_integer(&self, pname: u32) -> i32 {
        let mut value = [0];
        self.get_integers(pname, &mut value);
        value[0]
    }
}

/// Everything probing found out
#[derive(Debug, Clone)]
pub struct GlProbeReport {
    pub features: DeviceFeatures,
    pub version: GlVersion,
    pub vendor: String,
    pub renderer: String,
    /// `None` when mipmaps cannot be generated
    pub mipmap_variant: Option<EntryPointVariant>,
    /// `None` when framebuffer objects are unavailable
    pub framebuffer_variant: Option<EntryPointVariant>,
    pub window_msaa_degree: u32,
    pub offscreen_msaa_degree: u32,
}

pub struct GlFeatureProber {
    overrides: ProbeOverrides,
}

impl GlFeatureProber {
    pub fn new(overrides: ProbeOverrides) -> Self {
        Self { overrides }
    }

    fn is_forced_off(&self, flag: ProbeOverrides) -> bool {
        self.overrides.contains(flag)
    }

    /// Run every probing step
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` when an essential entry point is missing.
    pub fn probe(&self, api: &dyn GlProbeApi) -> Result<GlProbeReport> {
        // 1. Essential functions
        let missing: Vec<&str> = ESSENTIAL_FUNCTIONS
            .iter()
            .copied()
            .filter(|name| !api.has_function(name))
            .collect();
        if !missing.is_empty() {
            engine_error!(SOURCE, "Essential GL functions missing: {}", missing.join(", "));
            return Err(Error::InitializationFailed(format!(
                "OpenGL driver lacks essential functions: {}",
                missing.join(", ")
            )));
        }

        let version = api.version();
        let mut features = DeviceFeatures::baseline();
        self.probe_limits(api, &mut features);

        // 2. Anisotropy
        let anisotropy = self.probe_anisotropy(api);
        features.is_anisotropy_available = anisotropy.is_some();
        features.max_anisotropy_degree = anisotropy.unwrap_or(DeviceFeatures::min_anisotropy_off());

        // 3. Non-power-of-two textures
        features.is_npot_available = self.probe_npot(api, version);

        // 4. Mipmap generation
        let mipmap_variant = self.probe_mipmap(api, version);
        features.is_mipmap_available = mipmap_variant.is_some();

        // 5. Framebuffer objects
        let framebuffer_variant = self.probe_framebuffer(api, version);

        // 6. Multisampling
        let window_msaa_degree = self.probe_window_msaa(api);
        let offscreen_msaa_degree = self.probe_offscreen_msaa(api, framebuffer_variant);
        let msaa_degree = window_msaa_degree.max(offscreen_msaa_degree);
        features.is_msaa_available = msaa_degree > 1;
        features.max_msaa_degree = msaa_degree;
        features.is_msaa_render_to_window = window_msaa_degree > 1 && offscreen_msaa_degree <= 1;
        features.is_msaa_requires_restart = features.is_msaa_render_to_window;

        // 7. Optional object models
        features.is_sampler_available = !self.is_forced_off(ProbeOverrides::NO_SAMPLER_OBJECTS)
            && (api.has_extension("GL_ARB_sampler_objects")
                || version.is_desktop_at_least(3, 3)
                || version.is_embedded_at_least(3, 0));
        features.is_vao_available = !self.is_forced_off(ProbeOverrides::NO_VAO)
            && (api.has_extension("GL_ARB_vertex_array_object")
                || version.is_desktop_at_least(3, 0)
                || version.is_embedded_at_least(3, 0));
        features.is_buffer_storage_available = !self.is_forced_off(ProbeOverrides::NO_BUFFER_STORAGE)
            && (api.has_extension("GL_ARB_buffer_storage") || version.is_desktop_at_least(4, 4));
        features.is_dsa_available = !self.is_forced_off(ProbeOverrides::NO_DSA)
            && (api.has_extension("GL_ARB_direct_state_access") || version.is_desktop_at_least(4, 5));
        features.is_sso_available = !self.is_forced_off(ProbeOverrides::NO_SSO)
            && (api.has_extension("GL_ARB_separate_shader_objects")
                || version.is_desktop_at_least(4, 1)
                || version.is_embedded_at_least(3, 1));

        // 8. VSync
        let (is_vsync_available, is_vsync_requires_restart) = self.probe_vsync(api);
        features.is_vsync_available = is_vsync_available;
        features.is_vsync_requires_restart = is_vsync_requires_restart;

        let report = GlProbeReport {
            features,
            version,
            vendor: api.vendor(),
            renderer: api.renderer(),
            mipmap_variant,
            framebuffer_variant,
            window_msaa_degree,
            offscreen_msaa_degree,
        };
        log_report(&report);
        Ok(report)
    }

    fn probe_limits(&self, api: &dyn GlProbeApi, features: &mut DeviceFeatures) {
        let max_texture = api.get_integer(glow::MAX_TEXTURE_SIZE);
        if max_texture > 0 {
            features.max_texture_dimension = max_texture as u32;
        }

        let mut viewport = [0, 0];
        api.get_integers(glow::MAX_VIEWPORT_DIMS, &mut viewport);
        if viewport[0] > 0 && viewport[1] > 0 {
            features.max_viewport_width = viewport[0] as u32;
            features.max_viewport_height = viewport[1] as u32;
        }

        let attributes = api.get_integer(glow::MAX_VERTEX_ATTRIBS);
        if attributes > 0 {
            features.max_vertex_input_locations = (attributes as u32).min(64);
        }

        let units = api.get_integer(glow::MAX_TEXTURE_IMAGE_UNITS);
        if units > 0 {
            features.max_texture_units = (units as u32).min(MAX_TEXTURE_UNITS as u32);
        }
    }

    /// Maximum degree, `None` when anisotropic filtering is unavailable
    fn probe_anisotropy(&self, api: &dyn GlProbeApi) -> Option<f32> {
        if self.is_forced_off(ProbeOverrides::NO_ANISOTROPY) {
            return None;
        }
        let extension = ["GL_ARB_texture_filter_anisotropic", "GL_EXT_texture_filter_anisotropic"]
            .into_iter()
            .find(|name| api.has_extension(name))?;
        // Both extensions share the enum value
        let degree = api.get_float(glow::MAX_TEXTURE_MAX_ANISOTROPY_EXT);
        engine_debug!(SOURCE, "{} reports max anisotropy {}", extension, degree);
        (degree > DeviceFeatures::min_anisotropy_off()).then_some(degree)
    }

    fn probe_npot(&self, api: &dyn GlProbeApi, version: GlVersion) -> bool {
        if self.is_forced_off(ProbeOverrides::NO_NPOT) {
            return false;
        }
        api.has_extension("GL_ARB_texture_non_power_of_two")
            || api.has_extension("GL_OES_texture_npot")
            || version.is_desktop_at_least(2, 0)
            || version.is_embedded_at_least(3, 0)
    }

    fn probe_mipmap(&self, api: &dyn GlProbeApi, version: GlVersion) -> Option<EntryPointVariant> {
        if self.is_forced_off(ProbeOverrides::NO_MIPMAP) {
            return None;
        }
        if version.is_embedded || api.has_extension("GL_ARB_framebuffer_object") || version.at_least(3, 0) {
            Some(EntryPointVariant::Core)
        } else if api.has_extension("GL_EXT_framebuffer_object") {
            Some(EntryPointVariant::Ext)
        } else {
            None
        }
    }

    fn probe_framebuffer(&self, api: &dyn GlProbeApi, version: GlVersion) -> Option<EntryPointVariant> {
        if self.is_forced_off(ProbeOverrides::NO_FRAMEBUFFER_OBJECT) {
            return None;
        }
        if api.has_extension("GL_ARB_framebuffer_object")
            || version.is_desktop_at_least(3, 0)
            || version.is_embedded_at_least(3, 0)
        {
            return Some(EntryPointVariant::Core);
        }
        let missing: Vec<&str> = EXT_FRAMEBUFFER_EXTENSIONS
            .into_iter()
            .filter(|name| !api.has_extension(name))
            .collect();
        if missing.is_empty() {
            Some(EntryPointVariant::Ext)
        } else {
            if missing.len() < EXT_FRAMEBUFFER_EXTENSIONS.len() {
                engine_debug!(SOURCE, "EXT framebuffer path rejected, missing {}", missing.join(", "));
            }
            None
        }
    }

    /// Largest sample count the window accepts, doubling from 2
    fn probe_window_msaa(&self, api: &dyn GlProbeApi) -> u32 {
        if self.is_forced_off(ProbeOverrides::NO_MSAA) {
            return 1;
        }
        let mut best = 1;
        let mut samples = 2;
        while samples <= MAX_WINDOW_SAMPLES && api.try_window_samples(samples) {
            best = samples;
            samples *= 2;
        }
        best
    }

    fn probe_offscreen_msaa(&self, api: &dyn GlProbeApi, framebuffer: Option<EntryPointVariant>) -> u32 {
        if self.is_forced_off(ProbeOverrides::NO_MSAA) || framebuffer.is_none() {
            return 1;
        }
        // GL_MAX_SAMPLES and GL_MAX_SAMPLES_EXT share the enum value
        api.get_integer(glow::MAX_SAMPLES).max(1) as u32
    }

    /// (available, requires restart)
    fn probe_vsync(&self, api: &dyn GlProbeApi) -> (bool, bool) {
        if self.is_forced_off(ProbeOverrides::NO_VSYNC) {
            return (false, false);
        }
        let can_disable = api.set_swap_interval(0);
        let can_enable = api.set_swap_interval(1);
        match (can_disable, can_enable) {
            (true, true) => (true, false),
            (false, false) => (false, false),
            // The interval is fixed by how the context was created
            _ => (false, true),
        }
    }
}

fn log_report(report: &GlProbeReport) {
    let features = &report.features;
    engine_info!(
        SOURCE,
        "OpenGL{} {}.{} on {} ({})",
        if report.version.is_embedded { " ES" } else { "" },
        report.version.major,
        report.version.minor,
        report.renderer,
        report.vendor
    );
    engine_info!(
        SOURCE,
        "anisotropy {} (x{}), npot {}, mipmap {:?}, fbo {:?}, msaa x{} (window x{}, offscreen x{})",
        features.is_anisotropy_available,
        features.max_anisotropy_degree,
        features.is_npot_available,
        report.mipmap_variant,
        report.framebuffer_variant,
        features.max_msaa_degree,
        report.window_msaa_degree,
        report.offscreen_msaa_degree
    );
    engine_info!(
        SOURCE,
        "samplers {}, vao {}, buffer storage {}, dsa {}, sso {}, vsync {} (restart {}), {} texture units",
        features.is_sampler_available,
        features.is_vao_available,
        features.is_buffer_storage_available,
        features.is_dsa_available,
        features.is_sso_available,
        features.is_vsync_available,
        features.is_vsync_requires_restart,
        features.max_texture_units
    );
}

// ============================================================================
// LIVE DRIVER
// ============================================================================

/// `GlProbeApi` over a live glow context and its window
pub(crate) struct LiveProbe<'a> {
    pub gl: &'a glow::Context,
    pub window: &'a dyn GlWindow,
}

impl GlProbeApi for LiveProbe<'_> {
    fn has_function(&self, name: &str) -> bool {
        !self.window.get_proc_address(name).is_null()
    }

    fn version(&self) -> GlVersion {
        use glow::HasContext;
        let version = self.gl.version();
        GlVersion {
            major: version.major,
            minor: version.minor,
            is_embedded: version.is_embedded,
        }
    }

    fn vendor(&self) -> String {
        use glow::HasContext;
        unsafe { self.gl.get_parameter_string(glow::VENDOR) }
    }

    fn renderer(&self) -> String {
        use glow::HasContext;
        unsafe { self.gl.get_parameter_string(glow::RENDERER) }
    }

    fn has_extension(&self, name: &str) -> bool {
        use glow::HasContext;
        self.gl.supported_extensions().contains(name)
    }

    fn get_integers(&self, pname: u32, out: &mut [i32]) {
        use glow::HasContext;
        unsafe {
            self.gl.get_parameter_i32_slice(pname, out);
        }
        // Unknown enums leave an error behind; the value stays untouched
        if let ErrorDrain::Stuck(_) = drain_errors(|| unsafe { self.gl.get_error() }) {
            engine_error!(SOURCE, "GL error queue never cleared while probing 0x{:X}", pname);
        }
    }

    fn get_float(&self, pname: u32) -> f32 {
        use glow::HasContext;
        unsafe {
            let value = self.gl.get_parameter_f32(pname);
            if self.gl.get_error() != glow::NO_ERROR {
                return 0.0;
            }
            value
        }
    }

    fn try_window_samples(&self, samples: u32) -> bool {
        self.window.supports_samples(samples)
    }

    fn set_swap_interval(&self, interval: u32) -> bool {
        self.window.set_swap_interval(interval)
    }
}

#[cfg(test)]
#[path = "gl_probe_tests.rs"]
mod tests;
