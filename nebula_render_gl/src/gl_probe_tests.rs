//! Unit tests for GL capability probing
//!
//! Runs the prober against a scripted driver, no GL context required.

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};

use nebula_render::nebula::render::{DeviceFeatures, ProbeOverrides};
use nebula_render::nebula::Error;

use super::*;

// ============================================================================
// FAKE DRIVER
// ============================================================================

struct FakeProbeApi {
    version: GlVersion,
    extensions: FxHashSet<String>,
    missing_functions: FxHashSet<String>,
    integers: FxHashMap<u32, Vec<i32>>,
    max_anisotropy: f32,
    max_window_samples: u32,
    swap_intervals: [bool; 2],
    swap_calls: RefCell<Vec<u32>>,
}

impl FakeProbeApi {
    fn new(version: GlVersion) -> Self {
        let mut integers = FxHashMap::default();
        integers.insert(glow::MAX_TEXTURE_SIZE, vec![16384]);
        integers.insert(glow::MAX_VIEWPORT_DIMS, vec![16384, 8192]);
        integers.insert(glow::MAX_VERTEX_ATTRIBS, vec![16]);
        integers.insert(glow::MAX_TEXTURE_IMAGE_UNITS, vec![32]);
        integers.insert(glow::MAX_SAMPLES, vec![8]);
        Self {
            version,
            extensions: FxHashSet::default(),
            missing_functions: FxHashSet::default(),
            integers,
            max_anisotropy: 16.0,
            max_window_samples: 1,
            swap_intervals: [true, true],
            swap_calls: RefCell::new(Vec::new()),
        }
    }

    fn with_extensions(mut self, names: &[&str]) -> Self {
        self.extensions.extend(names.iter().map(|name| name.to_string()));
        self
    }
}

impl GlProbeApi for FakeProbeApi {
    fn has_function(&self, name: &str) -> bool {
        !self.missing_functions.contains(name)
    }

    fn version(&self) -> GlVersion {
        self.version
    }

    fn vendor(&self) -> String {
        "Fake Vendor".to_string()
    }

    fn renderer(&self) -> String {
        "Fake Renderer".to_string()
    }

    fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    fn get_integers(&self, pname: u32, out: &mut [i32]) {
        if let Some(values) = self.integers.get(&pname) {
            for (slot, value) in out.iter_mut().zip(values) {
                *slot = *value;
            }
        }
    }

    fn get_float(&self, pname: u32) -> f32 {
        assert_eq!(pname, glow::MAX_TEXTURE_MAX_ANISOTROPY_EXT);
        self.max_anisotropy
    }

    fn try_window_samples(&self, samples: u32) -> bool {
        samples <= self.max_window_samples
    }

    fn set_swap_interval(&self, interval: u32) -> bool {
        self.swap_calls.borrow_mut().push(interval);
        self.swap_intervals[interval as usize]
    }
}

fn probe(api: &FakeProbeApi) -> GlProbeReport {
    GlFeatureProber::new(ProbeOverrides::empty()).probe(api).unwrap()
}

// ============================================================================
// ESSENTIALS AND LIMITS
// ============================================================================

#[test]
fn test_missing_essential_function_fails() {
    let mut api = FakeProbeApi::new(GlVersion::desktop(3, 3));
    api.missing_functions.insert("glDrawElements".to_string());

    let result = GlFeatureProber::new(ProbeOverrides::empty()).probe(&api);

    match result {
        Err(Error::InitializationFailed(message)) => assert!(message.contains("glDrawElements")),
        other => panic!("expected InitializationFailed, got {:?}", other.map(|r| r.version)),
    }
}

#[test]
fn test_limits_are_read_and_capped() {
    let report = probe(&FakeProbeApi::new(GlVersion::desktop(3, 3)));
    let features = &report.features;

    assert_eq!(features.max_texture_dimension, 16384);
    assert_eq!(features.max_viewport_width, 16384);
    assert_eq!(features.max_viewport_height, 8192);
    assert_eq!(features.max_vertex_input_locations, 16);
    // 32 units reported, capped to the draw-state table size
    assert_eq!(features.max_texture_units, 16);
    assert_eq!(report.vendor, "Fake Vendor");
}

#[test]
fn test_unreported_limits_keep_baseline() {
    let mut api = FakeProbeApi::new(GlVersion::desktop(2, 1));
    api.integers.clear();

    let features = probe(&api).features;
    let baseline = DeviceFeatures::baseline();

    assert_eq!(features.max_texture_dimension, baseline.max_texture_dimension);
    assert_eq!(features.max_texture_units, baseline.max_texture_units);
}

// ============================================================================
// ANISOTROPY
// ============================================================================

#[test]
fn test_no_anisotropy_extension_reports_degree_one() {
    let features = probe(&FakeProbeApi::new(GlVersion::desktop(2, 1))).features;

    assert!(!features.is_anisotropy_available);
    assert_eq!(features.max_anisotropy_degree, 1.0);
}

#[test]
fn test_anisotropy_from_either_extension() {
    for extension in ["GL_ARB_texture_filter_anisotropic", "GL_EXT_texture_filter_anisotropic"] {
        let api = FakeProbeApi::new(GlVersion::desktop(3, 3)).with_extensions(&[extension]);
        let features = probe(&api).features;

        assert!(features.is_anisotropy_available, "{}", extension);
        assert_eq!(features.max_anisotropy_degree, 16.0);
    }
}

#[test]
fn test_anisotropy_override_wins_over_extension() {
    let api = FakeProbeApi::new(GlVersion::desktop(4, 6)).with_extensions(&["GL_ARB_texture_filter_anisotropic"]);
    let report = GlFeatureProber::new(ProbeOverrides::NO_ANISOTROPY).probe(&api).unwrap();

    assert!(!report.features.is_anisotropy_available);
    assert_eq!(report.features.max_anisotropy_degree, 1.0);
}

// ============================================================================
// TEXTURES AND FRAMEBUFFERS
// ============================================================================

#[test]
fn test_npot_by_version_or_extension() {
    assert!(!probe(&FakeProbeApi::new(GlVersion::desktop(1, 5))).features.is_npot_available);
    assert!(probe(&FakeProbeApi::new(GlVersion::desktop(2, 0))).features.is_npot_available);
    assert!(!probe(&FakeProbeApi::new(GlVersion::embedded(2, 0))).features.is_npot_available);
    assert!(probe(&FakeProbeApi::new(GlVersion::embedded(3, 0))).features.is_npot_available);

    let api = FakeProbeApi::new(GlVersion::embedded(2, 0)).with_extensions(&["GL_OES_texture_npot"]);
    assert!(probe(&api).features.is_npot_available);
}

#[test]
fn test_mipmap_entry_point_variants() {
    assert_eq!(
        probe(&FakeProbeApi::new(GlVersion::desktop(3, 0))).mipmap_variant,
        Some(EntryPointVariant::Core)
    );
    assert_eq!(
        probe(&FakeProbeApi::new(GlVersion::embedded(2, 0))).mipmap_variant,
        Some(EntryPointVariant::Core)
    );

    let ext = FakeProbeApi::new(GlVersion::desktop(2, 1)).with_extensions(&["GL_EXT_framebuffer_object"]);
    let report = probe(&ext);
    assert_eq!(report.mipmap_variant, Some(EntryPointVariant::Ext));
    assert!(report.features.is_mipmap_available);

    let none = probe(&FakeProbeApi::new(GlVersion::desktop(2, 1)));
    assert_eq!(none.mipmap_variant, None);
    assert!(!none.features.is_mipmap_available);
}

#[test]
fn test_ext_framebuffer_needs_all_four_extensions() {
    let partial = FakeProbeApi::new(GlVersion::desktop(2, 1)).with_extensions(&EXT_FRAMEBUFFER_EXTENSIONS[..3]);
    assert_eq!(probe(&partial).framebuffer_variant, None);

    let full = FakeProbeApi::new(GlVersion::desktop(2, 1)).with_extensions(&EXT_FRAMEBUFFER_EXTENSIONS);
    assert_eq!(probe(&full).framebuffer_variant, Some(EntryPointVariant::Ext));

    let arb = FakeProbeApi::new(GlVersion::desktop(2, 1)).with_extensions(&["GL_ARB_framebuffer_object"]);
    assert_eq!(probe(&arb).framebuffer_variant, Some(EntryPointVariant::Core));
}

// ============================================================================
// MSAA
// ============================================================================

#[test]
fn test_msaa_takes_larger_of_window_and_offscreen() {
    let mut api = FakeProbeApi::new(GlVersion::desktop(3, 3));
    api.max_window_samples = 4;

    let report = probe(&api);

    assert_eq!(report.window_msaa_degree, 4);
    assert_eq!(report.offscreen_msaa_degree, 8);
    assert!(report.features.is_msaa_available);
    assert_eq!(report.features.max_msaa_degree, 8);
    assert!(!report.features.is_msaa_render_to_window);
    assert!(!report.features.is_msaa_requires_restart);
}

#[test]
fn test_window_only_msaa_requires_restart() {
    // No framebuffer objects on 2.1 without extensions
    let mut api = FakeProbeApi::new(GlVersion::desktop(2, 1));
    api.max_window_samples = 4;

    let features = probe(&api).features;

    assert!(features.is_msaa_available);
    assert_eq!(features.max_msaa_degree, 4);
    assert!(features.is_msaa_render_to_window);
    assert!(features.is_msaa_requires_restart);
}

#[test]
fn test_window_sample_trial_is_bounded() {
    let mut api = FakeProbeApi::new(GlVersion::desktop(2, 1));
    api.max_window_samples = u32::MAX;

    assert_eq!(probe(&api).window_msaa_degree, 32);
}

#[test]
fn test_no_msaa_override() {
    let mut api = FakeProbeApi::new(GlVersion::desktop(4, 6));
    api.max_window_samples = 8;

    let features = GlFeatureProber::new(ProbeOverrides::NO_MSAA).probe(&api).unwrap().features;

    assert!(!features.is_msaa_available);
    assert_eq!(features.max_msaa_degree, 1);
}

// ============================================================================
// OBJECT MODELS
// ============================================================================

#[test]
fn test_object_models_follow_version() {
    let legacy = probe(&FakeProbeApi::new(GlVersion::desktop(2, 1))).features;
    assert!(!legacy.is_sampler_available);
    assert!(!legacy.is_vao_available);
    assert!(!legacy.is_buffer_storage_available);
    assert!(!legacy.is_dsa_available);
    assert!(!legacy.is_sso_available);

    let modern = probe(&FakeProbeApi::new(GlVersion::desktop(4, 5))).features;
    assert!(modern.is_sampler_available);
    assert!(modern.is_vao_available);
    assert!(modern.is_buffer_storage_available);
    assert!(modern.is_dsa_available);
    assert!(modern.is_sso_available);

    let es3 = probe(&FakeProbeApi::new(GlVersion::embedded(3, 0))).features;
    assert!(es3.is_sampler_available);
    assert!(es3.is_vao_available);
    assert!(!es3.is_buffer_storage_available);
}

#[test]
fn test_arb_extensions_on_old_context() {
    let api = FakeProbeApi::new(GlVersion::desktop(2, 1))
        .with_extensions(&["GL_ARB_sampler_objects", "GL_ARB_vertex_array_object"]);

    let features = probe(&api).features;

    assert!(features.is_sampler_available);
    assert!(features.is_vao_available);
    assert!(!features.is_dsa_available);
}

#[test]
fn test_object_model_overrides() {
    let overrides = ProbeOverrides::NO_SAMPLER_OBJECTS | ProbeOverrides::NO_VAO;
    let features = GlFeatureProber::new(overrides)
        .probe(&FakeProbeApi::new(GlVersion::desktop(4, 6)))
        .unwrap()
        .features;

    assert!(!features.is_sampler_available);
    assert!(!features.is_vao_available);
    assert!(features.is_dsa_available);
}

// ============================================================================
// VSYNC
// ============================================================================

#[test]
fn test_vsync_toggle_tries_off_then_on() {
    let api = FakeProbeApi::new(GlVersion::desktop(3, 3));

    let features = probe(&api).features;

    assert_eq!(*api.swap_calls.borrow(), vec![0, 1]);
    assert!(features.is_vsync_available);
    assert!(!features.is_vsync_requires_restart);
}

#[test]
fn test_vsync_fixed_interval_requires_restart() {
    let mut api = FakeProbeApi::new(GlVersion::desktop(3, 3));
    api.swap_intervals = [false, true];

    let features = probe(&api).features;

    assert!(!features.is_vsync_available);
    assert!(features.is_vsync_requires_restart);
}

#[test]
fn test_vsync_unavailable() {
    let mut api = FakeProbeApi::new(GlVersion::desktop(3, 3));
    api.swap_intervals = [false, false];

    let features = probe(&api).features;

    assert!(!features.is_vsync_available);
    assert!(!features.is_vsync_requires_restart);
}

#[test]
fn test_version_ordering() {
    let version = GlVersion::desktop(3, 3);
    assert!(version.at_least(3, 0));
    assert!(version.at_least(3, 3));
    assert!(!version.at_least(4, 0));
    assert!(!version.is_embedded_at_least(3, 0));
    assert!(GlVersion::embedded(3, 1).is_embedded_at_least(3, 0));
}
