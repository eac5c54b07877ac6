/*!
# Nebula Render

Backend-independent rendering layer.

This crate defines the API every rendering backend implements. Backends
(OpenGL, Vulkan, and the built-in Null backend) are selected once at startup
and driven through trait objects.

## Architecture

- **Renderer**: Factory trait creating GPU resources and executing command buffers
- **Buffer / R2Texture / Sampler**: Data resources owned by the renderer
- **Shader / ShaderStage**: Compiled programs and their reflected variables
- **VertexInput**: Attribute layout bound to vertex and index buffers
- **CommandBuffer**: Recorded frame commands, replayed by the backend on submit
- **BackendSelector**: Startup choice of the first backend that initializes

Backend crates provide concrete types implementing these traits.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod renderer;

// Main nebula namespace module
pub mod nebula {
    // Error types
    pub use crate::error::{Error, NativeError, Result};

    // Engine singleton
    pub use crate::engine::{Engine, SharedRenderer};

    // Renderer factory trait
    pub use crate::renderer::Renderer;

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{format_entry, DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Render sub-module with all rendering types
    pub mod render {
        pub use crate::renderer::*;
    }
}

// Re-export math library at crate root
pub use glam;
