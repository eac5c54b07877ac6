//! Unit tests for the Null backend

use crate::error::Error;
use crate::renderer::null_renderer::NullRenderer;
use crate::renderer::*;

const VERTEX_SRC: &str = r#"
#version 330 core
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec2 a_uv; // texture coordinates
uniform mat4 u_mvp;
out vec2 v_uv;
void main() {
    v_uv = a_uv;
    gl_Position = u_mvp * vec4(a_position, 1.0);
}
"#;

const FRAGMENT_SRC: &str = r#"
#version 330 core
precision mediump float;
in vec2 v_uv;
uniform sampler2D u_albedo;
uniform vec4 u_tint;
out vec4 o_color;
void main() {
    o_color = texture(u_albedo, v_uv) * u_tint;
}
"#;

fn renderer() -> NullRenderer {
    NullRenderer::new(&RendererConfig::default())
}

fn buffer(r: &mut NullRenderer, buffer_type: BufferType, size: u64) -> BufferHandle {
    r.create_buffer(BufferDesc {
        buffer_type,
        usage: BufferUsage::DrawStatic,
        size,
    })
    .unwrap()
}

struct Scene {
    stage: ShaderStageHandle,
    vertex_input: VertexInputHandle,
    texture: R2TextureHandle,
    sampler: SamplerHandle,
}

fn scene(r: &mut NullRenderer) -> Scene {
    let vertices = buffer(r, BufferType::Vertex, 20 * 4);
    let indices = buffer(r, BufferType::Index, 6 * 2);
    let vs = r.create_shader(ShaderDesc::glsl(ShaderType::Vertex, VERTEX_SRC)).unwrap();
    let fs = r.create_shader(ShaderDesc::glsl(ShaderType::Fragment, FRAGMENT_SRC)).unwrap();
    let stage = r.create_shader_stage(ShaderStageDesc { vertex: vs, fragment: fs }).unwrap();
    let vertex_input = r
        .create_vertex_input(VertexInputDesc {
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    format: AttributeFormat::R32G32B32_SFLOAT,
                    source: AttributeSource::Buffer { buffer: vertices, stride: 20, offset: 0 },
                },
                VertexAttribute {
                    location: 1,
                    format: AttributeFormat::R32G32_SFLOAT,
                    source: AttributeSource::Buffer { buffer: vertices, stride: 20, offset: 12 },
                },
            ],
            index_buffer: indices,
            index_type: IndexType::U16,
        })
        .unwrap();
    let texture = r
        .create_r2_texture(R2TextureDesc {
            format: PixelFormat::R8G8B8A8_UNORM,
            width: 4,
            height: 4,
            mip_count: 3,
        })
        .unwrap();
    let sampler = r.create_sampler(SamplerDesc::default()).unwrap();
    Scene { stage, vertex_input, texture, sampler }
}

// ============================================================================
// BUFFERS
// ============================================================================

#[test]
fn test_vertex_buffer_update_bounds() {
    let mut r = renderer();
    let handle = buffer(&mut r, BufferType::Vertex, 256);
    let data = [7u8; 256];

    assert!(r.buffer_mut(handle).unwrap().update(0, 256, &data).is_ok());
    let result = r.buffer_mut(handle).unwrap().update(200, 100, &data);
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_buffer_update_touches_only_range() {
    let mut r = renderer();
    let handle = buffer(&mut r, BufferType::Vertex, 16);
    r.buffer_mut(handle).unwrap().update(4, 8, &[0xAB; 8]).unwrap();

    let contents = r.buffer_contents(handle).unwrap();
    assert_eq!(&contents[..4], &[0; 4]);
    assert_eq!(&contents[4..12], &[0xAB; 8]);
    assert_eq!(&contents[12..], &[0; 4]);
}

#[test]
fn test_zero_sized_buffer_rejected() {
    let mut r = renderer();
    let result = r.create_buffer(BufferDesc {
        buffer_type: BufferType::Index,
        usage: BufferUsage::DrawStreaming,
        size: 0,
    });
    assert!(result.is_err());
}

// ============================================================================
// TEXTURES AND SAMPLERS
// ============================================================================

#[test]
fn test_single_level_generate_mipmaps_is_noop() {
    let mut r = renderer();
    let handle = r
        .create_r2_texture(R2TextureDesc {
            format: PixelFormat::R8G8B8A8_UNORM,
            width: 64,
            height: 64,
            mip_count: 1,
        })
        .unwrap();
    assert!(r.r2_texture_mut(handle).unwrap().generate_mipmaps().is_ok());
}

#[test]
fn test_generate_mipmaps_without_support() {
    let features = DeviceFeatures {
        is_mipmap_available: false,
        ..DeviceFeatures::headless()
    };
    let mut r = NullRenderer::with_features(features, &RendererConfig::default());
    let handle = r
        .create_r2_texture(R2TextureDesc {
            format: PixelFormat::R8_UNORM,
            width: 8,
            height: 8,
            mip_count: 4,
        })
        .unwrap();
    let result = r.r2_texture_mut(handle).unwrap().generate_mipmaps();
    assert!(matches!(result, Err(Error::Unsupported(_))));
}

#[test]
fn test_texture_update_and_generate() {
    let mut r = renderer();
    let Scene { texture, .. } = scene(&mut r);
    let level0 = vec![255u8; 4 * 4 * 4];
    r.r2_texture_mut(texture).unwrap().update(0, &level0).unwrap();
    assert_eq!(r.texture_level(texture, 0).unwrap(), Some(level0.as_slice()));
    assert_eq!(r.texture_level(texture, 2).unwrap(), None);

    r.r2_texture_mut(texture).unwrap().generate_mipmaps().unwrap();
    assert_eq!(r.texture_level(texture, 2).unwrap().map(|d| d.len()), Some(4));
    assert!(r.r2_texture_mut(texture).unwrap().update(1, &[0; 3]).is_err());
}

#[test]
fn test_generate_mipmaps_box_filters_level_zero() {
    let mut r = renderer();
    let handle = r
        .create_r2_texture(R2TextureDesc {
            format: PixelFormat::R8_UNORM,
            width: 4,
            height: 2,
            mip_count: 3,
        })
        .unwrap();
    let texture = r.r2_texture_mut(handle).unwrap();
    texture.update(0, &[0, 100, 10, 10, 200, 60, 30, 30]).unwrap();
    texture.generate_mipmaps().unwrap();

    assert_eq!(r.texture_level(handle, 1).unwrap(), Some([90u8, 20].as_slice()));
    assert_eq!(r.texture_level(handle, 2).unwrap(), Some([55u8].as_slice()));
}

#[test]
fn test_generate_mipmaps_keeps_levels_without_base_upload() {
    let mut r = renderer();
    let Scene { texture, .. } = scene(&mut r);
    let level1 = vec![7u8; 2 * 2 * 4];
    r.r2_texture_mut(texture).unwrap().update(1, &level1).unwrap();

    r.r2_texture_mut(texture).unwrap().generate_mipmaps().unwrap();

    assert_eq!(r.texture_level(texture, 1).unwrap(), Some(level1.as_slice()));
    assert_eq!(r.texture_level(texture, 2).unwrap(), None);
}

#[test]
fn test_unallocatable_buffer_is_out_of_memory() {
    let mut r = renderer();
    let result = r.create_buffer(BufferDesc {
        buffer_type: BufferType::Vertex,
        usage: BufferUsage::DrawStatic,
        size: u64::MAX,
    });
    assert!(matches!(result, Err(Error::OutOfMemory)));
    // The renderer stays usable
    assert!(r
        .create_buffer(BufferDesc {
            buffer_type: BufferType::Vertex,
            usage: BufferUsage::DrawStatic,
            size: 64,
        })
        .is_ok());
}

#[test]
fn test_sampler_anisotropy_clamped() {
    let mut r = renderer();
    let handle = r
        .create_sampler(SamplerDesc {
            anisotropy: 64.0,
            ..SamplerDesc::default()
        })
        .unwrap();
    assert_eq!(r.sampler(handle).unwrap().desc().anisotropy, 16.0);
}

// ============================================================================
// SHADERS
// ============================================================================

#[test]
fn test_shader_stage_reflects_glsl_declarations() {
    let mut r = renderer();
    let Scene { stage, .. } = scene(&mut r);
    let stage_ref = r.shader_stage(stage).unwrap();

    let position = stage_ref.variable("a_position").unwrap();
    assert_eq!(position.kind, VariableKind::Attribute);
    assert_eq!(position.value_type, ValueType::Vec3);
    assert_eq!(stage_ref.variable("a_uv").unwrap().location, 1);

    let mvp = stage_ref.variable("u_mvp").unwrap();
    assert_eq!(mvp.kind, VariableKind::Uniform);
    assert_eq!(mvp.stage, stage);

    assert_eq!(stage_ref.variable("u_albedo").unwrap().kind, VariableKind::Sampler);
    assert_eq!(stage_ref.variable("u_tint").unwrap().value_type, ValueType::Vec4);
    assert!(stage_ref.variable("v_uv").is_none());
}

#[test]
fn test_shader_stage_rejects_swapped_shaders() {
    let mut r = renderer();
    let vs = r.create_shader(ShaderDesc::glsl(ShaderType::Vertex, VERTEX_SRC)).unwrap();
    let fs = r.create_shader(ShaderDesc::glsl(ShaderType::Fragment, FRAGMENT_SRC)).unwrap();
    assert!(r.create_shader_stage(ShaderStageDesc { vertex: fs, fragment: vs }).is_err());
}

#[test]
fn test_empty_shader_rejected() {
    let mut r = renderer();
    assert!(r.create_shader(ShaderDesc::glsl(ShaderType::Vertex, "  ")).is_err());
    assert!(r.create_shader(ShaderDesc::spirv(ShaderType::Vertex, Vec::new())).is_err());
}

// ============================================================================
// SUBMISSION
// ============================================================================

#[test]
fn test_submit_full_frame() {
    let mut r = renderer();
    let s = scene(&mut r);
    let (mvp, tint, albedo) = {
        let stage = r.shader_stage(s.stage).unwrap();
        (
            stage.variable("u_mvp").unwrap().clone(),
            stage.variable("u_tint").unwrap().clone(),
            stage.variable("u_albedo").unwrap().clone(),
        )
    };

    let mut cb = CommandBuffer::new();
    cb.begin_write().unwrap();
    cb.clear(ClearFlags::COLOR | ClearFlags::DEPTH, [0.0, 0.0, 0.0, 1.0], 1.0, 0).unwrap();
    cb.enable_depth_test(true).unwrap();
    cb.set_shader_stage(Some(s.stage)).unwrap();
    cb.set_vertex_input(Some(s.vertex_input)).unwrap();
    cb.set_texture(0, Some(s.texture)).unwrap();
    cb.set_sampler(0, Some(s.sampler)).unwrap();
    cb.set_uniform(&mvp, glam::Mat4::IDENTITY).unwrap();
    cb.set_uniform(&tint, glam::Vec4::ONE).unwrap();
    cb.set_uniform(&albedo, UniformValue::Sampler2d(0)).unwrap();
    cb.draw_indexed(0, 6).unwrap();
    cb.end_write().unwrap();

    r.submit_commands(&mut cb).unwrap();
    r.present().unwrap();

    let stats = r.stats();
    assert_eq!(stats.commands_executed, 10);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.frames_presented, 1);
    assert_eq!(stats.native_calls, 0);
    assert!(r.draw_state().is_depth_test_enabled);
}

#[test]
fn test_disabled_submission_does_nothing() {
    let mut r = renderer();
    let mut cb = CommandBuffer::new();
    cb.begin_write().unwrap();
    cb.draw_indexed(0, 3).unwrap(); // would fail: nothing bound
    cb.end_write().unwrap();
    cb.enable(false);

    r.submit_commands(&mut cb).unwrap();
    assert_eq!(r.stats(), RendererStats::default());
}

#[test]
fn test_draw_without_bindings_fails() {
    let mut r = renderer();
    let mut cb = CommandBuffer::new();
    cb.begin_write().unwrap();
    cb.draw_indexed(0, 3).unwrap();
    cb.end_write().unwrap();
    assert!(matches!(r.submit_commands(&mut cb), Err(Error::InvalidState(_))));
}

#[test]
fn test_draw_past_index_buffer_fails() {
    let mut r = renderer();
    let s = scene(&mut r);
    let mut cb = CommandBuffer::new();
    cb.begin_write().unwrap();
    cb.set_shader_stage(Some(s.stage)).unwrap();
    cb.set_vertex_input(Some(s.vertex_input)).unwrap();
    cb.draw_indexed(3, 6).unwrap();
    cb.end_write().unwrap();
    assert!(matches!(r.submit_commands(&mut cb), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_state_does_not_leak_between_submissions() {
    let mut r = renderer();
    let mut cb = CommandBuffer::new();
    cb.begin_write().unwrap();
    cb.enable_culling(true).unwrap();
    cb.end_write().unwrap();
    r.submit_commands(&mut cb).unwrap();
    assert!(r.draw_state().is_culling_enabled);

    let mut empty = CommandBuffer::new();
    empty.begin_write().unwrap();
    empty.end_write().unwrap();
    r.submit_commands(&mut empty).unwrap();
    assert!(!r.draw_state().is_culling_enabled);
}

#[test]
fn test_texture_unit_out_of_range() {
    let mut r = renderer();
    let s = scene(&mut r);
    let mut cb = CommandBuffer::new();
    cb.begin_write().unwrap();
    cb.set_texture(99, Some(s.texture)).unwrap();
    cb.end_write().unwrap();
    assert!(r.submit_commands(&mut cb).is_err());
}

// ============================================================================
// LIFETIME
// ============================================================================

#[test]
fn test_destroyed_handle_rejected_everywhere() {
    let mut r = renderer();
    let s = scene(&mut r);
    r.destroy(s.texture.into()).unwrap();

    assert!(matches!(r.r2_texture(s.texture), Err(Error::InvalidResource(_))));
    assert!(r.destroy(s.texture.into()).is_err());

    let mut cb = CommandBuffer::new();
    cb.begin_write().unwrap();
    cb.set_texture(0, Some(s.texture)).unwrap();
    cb.end_write().unwrap();
    assert!(matches!(r.submit_commands(&mut cb), Err(Error::InvalidResource(_))));
}

#[test]
fn test_resize_and_vsync() {
    let mut r = renderer();
    r.resize(1280, 720).unwrap();
    assert_eq!(r.surface_size(), (1280, 720));
    r.set_vsync(false).unwrap();
    assert!(!r.is_vsync_enabled());

    let features = DeviceFeatures {
        is_vsync_requires_restart: true,
        ..DeviceFeatures::headless()
    };
    let mut locked = NullRenderer::with_features(features, &RendererConfig::default());
    assert!(matches!(locked.set_vsync(false), Err(Error::Unsupported(_))));
}

#[test]
fn test_backend_type() {
    assert_eq!(renderer().backend_type(), BackendType::Null);
}
