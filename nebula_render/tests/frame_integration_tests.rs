//! Integration tests for recording and submitting frames
//!
//! These tests drive the Null backend through the public API only, the same
//! way an application drives a GPU backend.
//! No GPU required.
//!
//! Run with: cargo test --test frame_integration_tests

use nebula_render::glam::{Mat4, Vec3, Vec4};
use nebula_render::nebula::render::*;
use nebula_render::nebula::{Engine, Error};

const VERTEX_SRC: &str = r#"
#version 330 core
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec4 a_color;
uniform mat4 u_mvp;
out vec4 v_color;
void main() {
    v_color = a_color;
    gl_Position = u_mvp * vec4(a_position, 1.0);
}
"#;

const FRAGMENT_SRC: &str = r#"
#version 330 core
in vec4 v_color;
uniform float u_fade;
out vec4 o_color;
void main() {
    o_color = v_color * u_fade;
}
"#;

// ============================================================================
// HELPERS
// ============================================================================

struct Quad {
    stage: ShaderStageHandle,
    vertex_input: VertexInputHandle,
    vertices: BufferHandle,
    indices: BufferHandle,
    mvp: ShaderVariable,
    fade: ShaderVariable,
}

/// Quad with a per-vertex position and a constant color attribute
fn create_quad(renderer: &mut dyn Renderer) -> Quad {
    let vertices = renderer
        .create_buffer(BufferDesc {
            buffer_type: BufferType::Vertex,
            usage: BufferUsage::DrawStatic,
            size: 4 * 12,
        })
        .unwrap();
    let indices = renderer
        .create_buffer(BufferDesc {
            buffer_type: BufferType::Index,
            usage: BufferUsage::DrawStatic,
            size: 6 * 2,
        })
        .unwrap();

    let positions: [Vec3; 4] = [
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
    ];
    let index_data: [u16; 6] = [0, 1, 2, 2, 3, 0];
    renderer
        .buffer_mut(vertices)
        .unwrap()
        .update(0, 48, bytemuck::cast_slice(&positions))
        .unwrap();
    renderer
        .buffer_mut(indices)
        .unwrap()
        .update(0, 12, bytemuck::cast_slice(&index_data))
        .unwrap();

    let vs = renderer.create_shader(ShaderDesc::glsl(ShaderType::Vertex, VERTEX_SRC)).unwrap();
    let fs = renderer.create_shader(ShaderDesc::glsl(ShaderType::Fragment, FRAGMENT_SRC)).unwrap();
    let stage = renderer.create_shader_stage(ShaderStageDesc { vertex: vs, fragment: fs }).unwrap();

    let vertex_input = renderer
        .create_vertex_input(VertexInputDesc {
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    format: AttributeFormat::R32G32B32_SFLOAT,
                    source: AttributeSource::Buffer { buffer: vertices, stride: 12, offset: 0 },
                },
                VertexAttribute {
                    location: 1,
                    format: AttributeFormat::R32G32B32A32_SFLOAT,
                    source: AttributeSource::Constant([1.0, 0.5, 0.25, 1.0]),
                },
            ],
            index_buffer: indices,
            index_type: IndexType::U16,
        })
        .unwrap();

    let stage_ref = renderer.shader_stage(stage).unwrap();
    let mvp = stage_ref.variable("u_mvp").unwrap().clone();
    let fade = stage_ref.variable("u_fade").unwrap().clone();

    Quad { stage, vertex_input, vertices, indices, mvp, fade }
}

fn record_quad(cb: &mut CommandBuffer, quad: &Quad, fade: f32) {
    cb.begin_write().unwrap();
    cb.clear(ClearFlags::COLOR | ClearFlags::DEPTH, [0.1, 0.1, 0.1, 1.0], 1.0, 0).unwrap();
    cb.set_viewport(Rect { x: 0, y: 0, width: 640, height: 480 }).unwrap();
    cb.enable_blending(true).unwrap();
    cb.set_blending_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha).unwrap();
    cb.set_shader_stage(Some(quad.stage)).unwrap();
    cb.set_vertex_input(Some(quad.vertex_input)).unwrap();
    cb.set_uniform(&quad.mvp, Mat4::IDENTITY).unwrap();
    cb.set_uniform(&quad.fade, fade).unwrap();
    cb.draw_indexed(0, 6).unwrap();
    cb.end_write().unwrap();
}

// ============================================================================
// FRAME TESTS
// ============================================================================

#[test]
fn test_integration_record_once_replay_many() {
    let mut renderer = NullRenderer::new(&RendererConfig::default());
    let quad = create_quad(&mut renderer);

    let mut cb = CommandBuffer::new();
    record_quad(&mut cb, &quad, 1.0);
    assert_eq!(cb.phase(), CommandBufferPhase::Recorded);

    for _ in 0..3 {
        renderer.submit_commands(&mut cb).unwrap();
        renderer.present().unwrap();
    }

    let stats = renderer.stats();
    assert_eq!(stats.submissions, 3);
    assert_eq!(stats.draw_calls, 3);
    assert_eq!(stats.commands_executed, 3 * cb.command_count() as u64);
    assert_eq!(stats.frames_presented, 3);
    assert_eq!(cb.phase(), CommandBufferPhase::Recorded);
}

#[test]
fn test_integration_rerecord_after_reset() {
    let mut renderer = NullRenderer::new(&RendererConfig::default());
    let quad = create_quad(&mut renderer);

    let mut cb = CommandBuffer::new();
    record_quad(&mut cb, &quad, 1.0);
    let first_len = cb.byte_len();

    cb.reset();
    assert_eq!(cb.phase(), CommandBufferPhase::Empty);
    record_quad(&mut cb, &quad, 0.5);
    assert_eq!(cb.byte_len(), first_len);
    renderer.submit_commands(&mut cb).unwrap();
    assert_eq!(renderer.stats().draw_calls, 1);
}

#[test]
fn test_integration_buffer_contents_visible_after_update() {
    let mut renderer = NullRenderer::new(&RendererConfig::default());
    let quad = create_quad(&mut renderer);

    let indices = renderer.buffer_contents(quad.indices).unwrap();
    assert_eq!(&indices[..4], &[0, 0, 1, 0]);
    assert_eq!(renderer.buffer(quad.vertices).unwrap().size(), 48);
}

#[test]
fn test_integration_uniform_type_mismatch_rejected_at_record() {
    let mut renderer = NullRenderer::new(&RendererConfig::default());
    let quad = create_quad(&mut renderer);

    let mut cb = CommandBuffer::new();
    cb.begin_write().unwrap();
    let result = cb.set_uniform(&quad.fade, Vec4::ONE);
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_integration_destroyed_vertex_input_breaks_frame() {
    let mut renderer = NullRenderer::new(&RendererConfig::default());
    let quad = create_quad(&mut renderer);
    renderer.destroy(quad.vertex_input.into()).unwrap();

    let mut cb = CommandBuffer::new();
    record_quad(&mut cb, &quad, 1.0);
    assert!(matches!(renderer.submit_commands(&mut cb), Err(Error::InvalidResource(_))));
    // The buffer is still replayable once the failure is handled
    assert_eq!(cb.phase(), CommandBufferPhase::Recorded);
}

#[test]
fn test_integration_frame_through_engine_singleton() {
    Engine::shutdown();
    Engine::initialize().unwrap();
    let config = RendererConfig {
        backend_preference: vec![BackendType::Null],
        ..RendererConfig::default()
    };
    let renderer = Engine::select_renderer(BackendSelector::new(), &config).unwrap();

    let quad = {
        let mut r = renderer.borrow_mut();
        create_quad(&mut **r)
    };
    let mut cb = CommandBuffer::new();
    record_quad(&mut cb, &quad, 0.75);

    {
        let mut r = renderer.borrow_mut();
        r.submit_commands(&mut cb).unwrap();
        r.present().unwrap();
        assert_eq!(r.stats().draw_calls, 1);
    }

    Engine::destroy_renderer().unwrap();
    Engine::shutdown();
}
