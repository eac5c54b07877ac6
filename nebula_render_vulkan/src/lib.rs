/*!
# Nebula Render - Vulkan Backend

Vulkan implementation of the nebula_render `Renderer` trait.

Uses Ash for the Vulkan bindings, gpu-allocator for memory management and
spirq to reflect shader variables out of SPIR-V modules.

Draws go through a pipeline cache keyed by the fixed-function draw state;
textures track the layout of every mip level and transition runs of levels
with one barrier each.

Build with the `vulkan-validation` feature to enable the Khronos validation
layer and forward its messages to the engine logger.
*/

mod vulkan;
mod vulkan_buffer;
mod vulkan_context;
mod vulkan_draw;
mod vulkan_features;
mod vulkan_format;
mod vulkan_frame;
mod vulkan_layout;
mod vulkan_pipeline;
mod vulkan_sampler;
mod vulkan_shader;
mod vulkan_swapchain;
mod vulkan_texture;
mod vulkan_vertex_input;

#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan::VulkanRenderer;
pub use vulkan_buffer::VulkanBuffer;
pub use vulkan_sampler::VulkanSampler;
pub use vulkan_shader::{VulkanShader, VulkanShaderStage};
pub use vulkan_texture::VulkanR2Texture;
pub use vulkan_vertex_input::VulkanVertexInput;

#[cfg(feature = "vulkan-validation")]
pub use debug::{print_validation_stats_report, validation_stats, ValidationStats};

use nebula_render::nebula::render::{BackendSelector, BackendType, Renderer};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Register the Vulkan backend with a selector
///
/// The factory borrows `window` until the selector runs.
///
/// # Example
///
/// ```no_run
/// use nebula_render::nebula::render::{BackendSelector, RendererConfig};
/// # fn run(window: &winit::window::Window) -> nebula_render::nebula::Result<()> {
/// let mut selector = BackendSelector::new();
/// nebula_render_vulkan::register(&mut selector, window, 1280, 720);
/// let renderer = selector.select(&RendererConfig::default())?;
/// # Ok(())
/// # }
/// ```
pub fn register<'a, W>(selector: &mut BackendSelector<'a>, window: &'a W, width: u32, height: u32)
where
    W: HasDisplayHandle + HasWindowHandle,
{
    selector.register(BackendType::Vulkan, move |config| {
        let renderer: Box<dyn Renderer> = Box::new(VulkanRenderer::new(window, width, height, config)?);
        Ok(renderer)
    });
}
