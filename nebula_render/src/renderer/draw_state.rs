/// Per-submission draw state shared by all backends

use crate::error::{Error, Result};
use crate::renderer::{BlendFactor, R2TextureHandle, Rect, SamplerHandle, ShaderStageHandle, VertexInputHandle};

/// Texture/sampler units tracked per submission
pub const MAX_TEXTURE_UNITS: usize = 16;

/// Current culling/blending/depth/binding state while a command buffer replays
///
/// Reset to `DrawState::default()` at the start of every submission, so a
/// command buffer never inherits state from the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawState {
    pub is_culling_enabled: bool,
    pub is_blending_enabled: bool,
    pub is_depth_test_enabled: bool,
    pub is_depth_write_enabled: bool,
    pub is_scissor_enabled: bool,
    pub blend_src: BlendFactor,
    pub blend_dst: BlendFactor,
    /// `None` means the full surface
    pub viewport: Option<Rect>,
    pub scissor_box: Option<Rect>,
    pub vertex_input: Option<VertexInputHandle>,
    pub shader_stage: Option<ShaderStageHandle>,
    pub textures: [Option<R2TextureHandle>; MAX_TEXTURE_UNITS],
    pub samplers: [Option<SamplerHandle>; MAX_TEXTURE_UNITS],
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            is_culling_enabled: false,
            is_blending_enabled: false,
            is_depth_test_enabled: false,
            is_depth_write_enabled: true,
            is_scissor_enabled: false,
            blend_src: BlendFactor::One,
            blend_dst: BlendFactor::Zero,
            viewport: None,
            scissor_box: None,
            vertex_input: None,
            shader_stage: None,
            textures: [None; MAX_TEXTURE_UNITS],
            samplers: [None; MAX_TEXTURE_UNITS],
        }
    }
}

impl DrawState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn check_unit(unit: u32, limit: u32) -> Result<usize> {
        let limit = limit.min(MAX_TEXTURE_UNITS as u32);
        if unit >= limit {
            return Err(Error::InvalidArgument(format!(
                "Texture unit {} out of range (device has {})",
                unit, limit
            )));
        }
        Ok(unit as usize)
    }

    /// Bind (or unbind with `None`) a texture on a unit below `unit_limit`
    pub fn bind_texture(&mut self, unit: u32, texture: Option<R2TextureHandle>, unit_limit: u32) -> Result<()> {
        let unit = Self::check_unit(unit, unit_limit)?;
        self.textures[unit] = texture;
        Ok(())
    }

    pub fn bind_sampler(&mut self, unit: u32, sampler: Option<SamplerHandle>, unit_limit: u32) -> Result<()> {
        let unit = Self::check_unit(unit, unit_limit)?;
        self.samplers[unit] = sampler;
        Ok(())
    }

    /// Vertex input and shader stage required by a draw
    pub fn draw_bindings(&self) -> Result<(VertexInputHandle, ShaderStageHandle)> {
        let vertex_input = self
            .vertex_input
            .ok_or_else(|| Error::InvalidState("draw_indexed without a vertex input".to_string()))?;
        let shader_stage = self
            .shader_stage
            .ok_or_else(|| Error::InvalidState("draw_indexed without a shader stage".to_string()))?;
        Ok((vertex_input, shader_stage))
    }

    /// Viewport or scissor for the given surface size
    pub fn viewport_or(&self, width: u32, height: u32) -> Rect {
        self.viewport.unwrap_or(Rect {
            x: 0,
            y: 0,
            width: width as i32,
            height: height as i32,
        })
    }

    /// Scissor rectangle in effect; the whole viewport when scissoring is off
    pub fn effective_scissor(&self, width: u32, height: u32) -> Rect {
        match (self.is_scissor_enabled, self.scissor_box) {
            (true, Some(rect)) => rect,
            _ => Rect {
                x: 0,
                y: 0,
                width: width as i32,
                height: height as i32,
            },
        }
    }
}
