/// Renderer trait - backend-agnostic factory and submission interface

use std::fmt;

use crate::error::Result;
use crate::renderer::{
    Buffer, BufferDesc, BufferHandle, CommandBuffer, DeviceFeatures, ProbeOverrides, R2Texture, R2TextureDesc,
    R2TextureHandle, ResourceHandle, Sampler, SamplerDesc, SamplerHandle, Shader, ShaderDesc, ShaderHandle,
    ShaderStage, ShaderStageDesc, ShaderStageHandle, VertexInput, VertexInputDesc, VertexInputHandle,
};

// ============================================================================
// Common types
// ============================================================================

/// Native API behind a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    OpenGl,
    Vulkan,
    /// No GPU; validation only
    Null,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendType::OpenGl => write!(f, "OpenGL"),
            BackendType::Vulkan => write!(f, "Vulkan"),
            BackendType::Null => write!(f, "Null"),
        }
    }
}

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Backends to try, in order
    pub backend_preference: Vec<BackendType>,
    /// Fall back to the Null backend when every preferred backend fails
    pub allow_null_fallback: bool,
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Wait for vertical blank when presenting
    pub vsync: bool,
    /// Requested MSAA sample count for the window surface (1 = off)
    pub msaa_samples: u32,
    /// Forced capability fallbacks
    pub probe_overrides: ProbeOverrides,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            backend_preference: vec![BackendType::Vulkan, BackendType::OpenGl],
            allow_null_fallback: true,
            enable_validation: cfg!(debug_assertions),
            app_name: "Nebula Application".to_string(),
            app_version: (1, 0, 0),
            vsync: true,
            msaa_samples: 1,
            probe_overrides: ProbeOverrides::empty(),
        }
    }
}

/// Renderer statistics, cumulative since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    /// `submit_commands` calls that replayed an enabled buffer
    pub submissions: u64,
    /// Commands replayed
    pub commands_executed: u64,
    /// Indexed draws issued
    pub draw_calls: u64,
    /// Native API calls issued (GL calls, recorded vkCmd* calls)
    pub native_calls: u64,
    pub frames_presented: u64,
    pub pipeline_cache_hits: u64,
    pub pipeline_cache_misses: u64,
    /// Pipeline barriers recorded for image layout transitions
    pub layout_barriers: u64,
}

// ============================================================================
// Renderer trait
// ============================================================================

/// Main renderer trait
///
/// One implementation per backend (GlRenderer, VulkanRenderer, NullRenderer).
/// Resources are addressed by handles minted by the renderer that created
/// them; handles from anywhere else are rejected with
/// `Error::InvalidResource`. All calls happen on the rendering thread.
pub trait Renderer {
    fn backend_type(&self) -> BackendType;

    /// Capabilities probed at initialization
    fn device_features(&self) -> &DeviceFeatures;

    // ===== CREATION =====

    fn create_buffer(&mut self, desc: BufferDesc) -> Result<BufferHandle>;

    fn create_r2_texture(&mut self, desc: R2TextureDesc) -> Result<R2TextureHandle>;

    /// Anisotropy is clamped to the device range, never rejected
    fn create_sampler(&mut self, desc: SamplerDesc) -> Result<SamplerHandle>;

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<ShaderHandle>;

    fn create_shader_stage(&mut self, desc: ShaderStageDesc) -> Result<ShaderStageHandle>;

    fn create_vertex_input(&mut self, desc: VertexInputDesc) -> Result<VertexInputHandle>;

    // ===== ACCESS =====

    fn buffer(&self, handle: BufferHandle) -> Result<&dyn Buffer>;

    fn buffer_mut(&mut self, handle: BufferHandle) -> Result<&mut dyn Buffer>;

    fn r2_texture(&self, handle: R2TextureHandle) -> Result<&dyn R2Texture>;

    fn r2_texture_mut(&mut self, handle: R2TextureHandle) -> Result<&mut dyn R2Texture>;

    fn sampler(&self, handle: SamplerHandle) -> Result<&dyn Sampler>;

    fn shader(&self, handle: ShaderHandle) -> Result<&dyn Shader>;

    fn shader_stage(&self, handle: ShaderStageHandle) -> Result<&dyn ShaderStage>;

    fn vertex_input(&self, handle: VertexInputHandle) -> Result<&dyn VertexInput>;

    /// Release a resource and its native handles immediately
    fn destroy(&mut self, resource: ResourceHandle) -> Result<()>;

    // ===== FRAME =====

    /// Replay a recorded command buffer
    ///
    /// Disabled buffers are skipped without any native call. Returns once the
    /// native submission returns, not when the GPU finishes.
    fn submit_commands(&mut self, commands: &mut CommandBuffer) -> Result<()>;

    /// Show the frame rendered since the previous `present`
    fn present(&mut self) -> Result<()>;

    /// Notify renderer that the window has been resized
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Toggle vertical sync
    ///
    /// Fails with `Error::Unsupported` when the device cannot toggle vsync
    /// without a restart.
    fn set_vsync(&mut self, enabled: bool) -> Result<()>;

    fn stats(&self) -> RendererStats;
}
