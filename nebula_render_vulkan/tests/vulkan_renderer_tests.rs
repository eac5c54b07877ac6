//! Tests for the Vulkan renderer against a real device
//!
//! All tests require a GPU and a display and are marked with #[ignore].
//! winit allows one event loop per process, so run them one at a time:
//!
//! cargo test --test vulkan_renderer_tests -- --ignored --exact <name>

use nebula_render::nebula::render::*;
use nebula_render::nebula::Error;
use nebula_render_vulkan::VulkanRenderer;
use winit::event_loop::EventLoop;
use winit::window::Window;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

/// Helper to create a hidden test window
#[allow(deprecated)]
fn create_test_window() -> (Window, EventLoop<()>) {
    let event_loop = EventLoop::new().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("Vulkan Renderer Test")
        .with_inner_size(winit::dpi::PhysicalSize::new(WIDTH, HEIGHT))
        .with_visible(false);
    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

fn create_renderer(window: &Window) -> VulkanRenderer {
    let config = RendererConfig {
        enable_validation: true,
        ..RendererConfig::default()
    };
    VulkanRenderer::new(window, WIDTH, HEIGHT, &config).unwrap()
}

// ============================================================================
// DEVICE
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_reports_device_features() {
    let (window, _event_loop) = create_test_window();
    let renderer = create_renderer(&window);

    let features = renderer.device_features();
    assert_eq!(renderer.backend_type(), BackendType::Vulkan);
    assert!(features.max_texture_dimension >= 4096);
    assert!(features.max_anisotropy_degree >= DeviceFeatures::min_anisotropy_off());
    assert!(features.is_sampler_available);
}

// ============================================================================
// BUFFERS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_buffer_partial_update_bounds() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window);

    let buffer = renderer
        .create_buffer(BufferDesc {
            buffer_type: BufferType::Vertex,
            usage: BufferUsage::DrawStatic,
            size: 256,
        })
        .unwrap();

    let data = vec![7u8; 256];
    let target = renderer.buffer_mut(buffer).unwrap();
    target.update(0, 256, &data).unwrap();
    assert!(matches!(target.update(200, 100, &data), Err(Error::InvalidArgument(_))));
    assert_eq!(renderer.buffer(buffer).unwrap().size(), 256);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_destroyed_buffer_is_rejected() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window);

    let buffer = renderer
        .create_buffer(BufferDesc {
            buffer_type: BufferType::Index,
            usage: BufferUsage::DrawDynamic,
            size: 64,
        })
        .unwrap();
    renderer.destroy(buffer.into()).unwrap();

    assert!(matches!(renderer.buffer(buffer), Err(Error::InvalidResource(_))));
    assert!(matches!(renderer.destroy(buffer.into()), Err(Error::InvalidResource(_))));
}

// ============================================================================
// TEXTURES & SAMPLERS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_texture_upload_and_mipmaps() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window);

    let texture = renderer
        .create_r2_texture(R2TextureDesc {
            format: PixelFormat::R8G8B8A8_UNORM,
            width: 64,
            height: 64,
            mip_count: 7,
        })
        .unwrap();

    let level0 = vec![255u8; 64 * 64 * 4];
    let target = renderer.r2_texture_mut(texture).unwrap();
    target.update(0, &level0).unwrap();
    target.generate_mipmaps().unwrap();
    assert!(matches!(target.update(1, &level0), Err(Error::InvalidArgument(_))));

    let stats = renderer.stats();
    assert!(stats.layout_barriers > 0);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_single_level_generate_mipmaps_is_noop() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window);

    let texture = renderer
        .create_r2_texture(R2TextureDesc {
            format: PixelFormat::R8G8B8A8_UNORM,
            width: 64,
            height: 64,
            mip_count: 1,
        })
        .unwrap();
    renderer.r2_texture_mut(texture).unwrap().generate_mipmaps().unwrap();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_sampler_anisotropy_is_clamped() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window);
    let max = renderer.device_features().max_anisotropy_degree;

    let sampler = renderer
        .create_sampler(SamplerDesc {
            anisotropy: 1000.0,
            ..SamplerDesc::default()
        })
        .unwrap();
    assert_eq!(renderer.sampler(sampler).unwrap().desc().anisotropy, max);
}

// ============================================================================
// SHADERS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_rejects_glsl_and_garbage_spirv() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window);

    let glsl = renderer.create_shader(ShaderDesc::glsl(ShaderType::Vertex, "void main() {}"));
    assert!(matches!(glsl, Err(Error::Unsupported(_))));

    let garbage = renderer.create_shader(ShaderDesc::spirv(ShaderType::Vertex, vec![0xdead_beef; 8]));
    assert!(garbage.is_err());
}

// ============================================================================
// FRAMES
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_clear_and_present_frames() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window);

    let mut cb = CommandBuffer::new();
    cb.begin_write().unwrap();
    cb.clear(ClearFlags::COLOR | ClearFlags::DEPTH, [0.2, 0.3, 0.4, 1.0], 1.0, 0).unwrap();
    cb.end_write().unwrap();

    for _ in 0..4 {
        renderer.submit_commands(&mut cb).unwrap();
        renderer.present().unwrap();
    }

    let stats = renderer.stats();
    assert_eq!(stats.frames_presented, 4);
    assert_eq!(stats.submissions, 4);
    assert!(stats.native_calls >= 4);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_disabled_buffer_issues_no_native_calls() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window);

    let mut cb = CommandBuffer::new();
    cb.begin_write().unwrap();
    cb.clear(ClearFlags::COLOR, [1.0, 0.0, 0.0, 1.0], 1.0, 0).unwrap();
    cb.end_write().unwrap();
    cb.enable(false);

    renderer.submit_commands(&mut cb).unwrap();
    let stats = renderer.stats();
    assert_eq!(stats.native_calls, 0);
    assert_eq!(stats.submissions, 0);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_update_after_draw_in_same_frame() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window);

    let texture = renderer
        .create_r2_texture(R2TextureDesc {
            format: PixelFormat::R8G8B8A8_UNORM,
            width: 4,
            height: 4,
            mip_count: 1,
        })
        .unwrap();

    let mut cb = CommandBuffer::new();
    cb.begin_write().unwrap();
    cb.clear(ClearFlags::COLOR, [0.0, 0.0, 0.0, 1.0], 1.0, 0).unwrap();
    cb.end_write().unwrap();
    renderer.submit_commands(&mut cb).unwrap();

    // Uploading while a frame is open must not disturb it
    renderer.r2_texture_mut(texture).unwrap().update(0, &[9u8; 64]).unwrap();
    renderer.present().unwrap();
    assert_eq!(renderer.stats().frames_presented, 1);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_resize_and_vsync() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window);

    renderer.resize(640, 480).unwrap();
    renderer.present().unwrap();

    // Zero area suspends presentation without failing
    renderer.resize(0, 0).unwrap();
    renderer.present().unwrap();
    renderer.resize(WIDTH, HEIGHT).unwrap();
    renderer.present().unwrap();

    let features = renderer.device_features().clone();
    match renderer.set_vsync(false) {
        Ok(()) => assert!(features.is_vsync_available),
        Err(Error::Unsupported(_)) => assert!(!features.is_vsync_available),
        Err(e) => panic!("unexpected error: {}", e),
    }
    renderer.present().unwrap();
}
