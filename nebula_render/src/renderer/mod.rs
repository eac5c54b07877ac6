/// Renderer module - backend-agnostic resources, commands and renderer trait

// Module declarations
pub mod renderer;
pub mod device_features;
pub mod handle;
pub mod buffer;
pub mod texture;
pub mod sampler;
pub mod shader;
pub mod vertex_input;
pub mod command;
pub mod command_buffer;
pub mod draw_state;
pub mod dispatch;
pub mod null_renderer;
pub mod backend_selector;

// Re-export everything from renderer.rs
pub use renderer::*;

// Re-export from other modules
pub use device_features::*;
pub use handle::*;
pub use buffer::*;
pub use texture::*;
pub use sampler::*;
pub use shader::*;
pub use vertex_input::*;
pub use command::*;
pub use command_buffer::*;
pub use draw_state::*;
pub use dispatch::*;
pub use null_renderer::NullRenderer;
pub use backend_selector::*;
