/*!
# Nebula Render - OpenGL Backend

OpenGL and OpenGL ES implementation of the nebula_render `Renderer` trait,
on top of glow.

The window collaborator (`GlWindow`) supplies a current context, its
proc-address loader and swap control. At creation the backend probes the
driver's version and extensions into `DeviceFeatures`, choosing core, ARB or
EXT entry points and falling back to legacy paths (texture parameters instead
of sampler objects, per-draw attribute binding instead of VAOs) where needed.

GL's global state is shadowed in a cache so redundant binds and enables are
never issued.
*/

mod gl;
mod gl_buffer;
mod gl_context;
mod gl_format;
mod gl_probe;
mod gl_sampler;
mod gl_shader;
mod gl_state;
mod gl_texture;
mod gl_vertex_input;
mod gl_window;

pub use gl::GlRenderer;
pub use gl_buffer::GlBuffer;
pub use gl_probe::{
    EntryPointVariant, GlFeatureProber, GlProbeApi, GlProbeReport, GlVersion, ESSENTIAL_FUNCTIONS,
    EXT_FRAMEBUFFER_EXTENSIONS,
};
pub use gl_sampler::GlSampler;
pub use gl_shader::{GlShader, GlShaderStage};
pub use gl_texture::GlR2Texture;
pub use gl_vertex_input::GlVertexInput;
pub use gl_window::GlWindow;

use nebula_render::nebula::render::{BackendSelector, BackendType, Renderer};

/// Register the OpenGL backend with a selector
///
/// The window moves into the factory and, if OpenGL is selected, into the
/// renderer.
pub fn register<W>(selector: &mut BackendSelector<'_>, window: W, width: u32, height: u32)
where
    W: GlWindow + 'static,
{
    selector.register(BackendType::OpenGl, move |config| {
        let renderer: Box<dyn Renderer> = Box::new(GlRenderer::new(window, width, height, config)?);
        Ok(renderer)
    });
}
