/// Recorded command stream
///
/// A `CommandBuffer` is a tagged bump arena. Each record is one 8-byte
/// header word (`id` in the low 32 bits, payload size in the high 32 bits)
/// followed by the payload, padded to a whole number of words. Writers get a
/// zeroed `&mut` payload straight inside the arena; the reader walks the
/// records once, in recording order.
///
/// Lifecycle: `begin_write` → `write_*`... → `end_write` → `begin_read` →
/// `read_*`... → `end_read`. The recorded stream can be replayed any number of
/// times until the next `begin_write` or `reset`.

use std::mem::size_of;

use crate::error::{Error, Result};
use crate::renderer::command::*;
use crate::renderer::{
    validate_uniform_value, R2TextureHandle, RawHandle, SamplerHandle, ShaderStageHandle, ShaderVariable,
    UniformValue, VertexInputHandle,
};

const WORD: usize = size_of::<u64>();

/// Phase of a command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferPhase {
    /// Nothing recorded
    Empty,
    /// Between `begin_write` and `end_write`
    Writing,
    /// Recorded and ready for `begin_read`
    Recorded,
    /// Between `begin_read` and `end_read`
    Reading,
}

pub struct CommandBuffer {
    words: Vec<u64>,
    read_cursor: usize,
    command_count: usize,
    phase: CommandBufferPhase,
    enabled: bool,
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-size the arena for `bytes` of records
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            words: Vec::with_capacity(bytes.div_ceil(WORD)),
            read_cursor: 0,
            command_count: 0,
            phase: CommandBufferPhase::Empty,
            enabled: true,
        }
    }

    // ===== STATE =====

    /// A disabled buffer is skipped entirely at submission
    pub fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn phase(&self) -> CommandBufferPhase {
        self.phase
    }

    pub fn command_count(&self) -> usize {
        self.command_count
    }

    /// Arena size in bytes, headers included
    pub fn byte_len(&self) -> usize {
        self.words.len() * WORD
    }

    /// Drop every recorded command, including an unfinished write phase
    pub fn reset(&mut self) {
        self.words.clear();
        self.read_cursor = 0;
        self.command_count = 0;
        self.phase = CommandBufferPhase::Empty;
    }

    // ===== WRITE PHASE =====

    /// Start recording, discarding the previous contents
    pub fn begin_write(&mut self) -> Result<()> {
        match self.phase {
            CommandBufferPhase::Empty | CommandBufferPhase::Recorded => {
                self.reset();
                self.phase = CommandBufferPhase::Writing;
                Ok(())
            }
            phase => Err(Error::InvalidState(format!("begin_write called while {:?}", phase))),
        }
    }

    pub fn end_write(&mut self) -> Result<()> {
        if self.phase != CommandBufferPhase::Writing {
            return Err(Error::InvalidState(format!("end_write called while {:?}", self.phase)));
        }
        self.phase = CommandBufferPhase::Recorded;
        Ok(())
    }

    /// Append a zeroed payload for `P` and return it for filling in
    pub fn write<P: CommandPayload>(&mut self) -> Result<&mut P> {
        if self.phase != CommandBufferPhase::Writing {
            return Err(Error::InvalidState(format!(
                "Cannot record {:?} outside begin_write/end_write",
                P::ID
            )));
        }
        let size = size_of::<P>();
        let header = (P::ID as u32 as u64) | ((size as u64) << 32);
        self.words.push(header);
        let start = self.words.len();
        self.words.resize(start + size.div_ceil(WORD), 0);
        self.command_count += 1;

        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.words[start..]);
        Ok(bytemuck::from_bytes_mut(&mut bytes[..size]))
    }

    pub fn write_clear(&mut self) -> Result<&mut ClearParams> {
        self.write()
    }

    pub fn write_set_viewport(&mut self) -> Result<&mut ViewportParams> {
        self.write()
    }

    pub fn write_enable_scissor(&mut self) -> Result<&mut EnableScissorParams> {
        self.write()
    }

    pub fn write_set_scissor_box(&mut self) -> Result<&mut ScissorBoxParams> {
        self.write()
    }

    pub fn write_enable_culling(&mut self) -> Result<&mut EnableCullingParams> {
        self.write()
    }

    pub fn write_enable_depth_test(&mut self) -> Result<&mut EnableDepthTestParams> {
        self.write()
    }

    pub fn write_enable_depth_write(&mut self) -> Result<&mut EnableDepthWriteParams> {
        self.write()
    }

    pub fn write_enable_blending(&mut self) -> Result<&mut EnableBlendingParams> {
        self.write()
    }

    pub fn write_set_blending_func(&mut self) -> Result<&mut BlendingFuncParams> {
        self.write()
    }

    pub fn write_set_texture(&mut self) -> Result<&mut TextureParams> {
        self.write()
    }

    pub fn write_set_sampler(&mut self) -> Result<&mut SamplerParams> {
        self.write()
    }

    pub fn write_set_vertex_input(&mut self) -> Result<&mut VertexInputParams> {
        self.write()
    }

    pub fn write_set_shader_stage(&mut self) -> Result<&mut ShaderStageParams> {
        self.write()
    }

    pub fn write_set_int32_uniform(&mut self) -> Result<&mut Int32UniformParams> {
        self.write()
    }

    pub fn write_set_float32_uniform(&mut self) -> Result<&mut Float32UniformParams> {
        self.write()
    }

    pub fn write_set_vec2_uniform(&mut self) -> Result<&mut Vec2UniformParams> {
        self.write()
    }

    pub fn write_set_vec3_uniform(&mut self) -> Result<&mut Vec3UniformParams> {
        self.write()
    }

    pub fn write_set_vec4_uniform(&mut self) -> Result<&mut Vec4UniformParams> {
        self.write()
    }

    pub fn write_set_mat4_uniform(&mut self) -> Result<&mut Mat4UniformParams> {
        self.write()
    }

    pub fn write_set_sampler2d_uniform(&mut self) -> Result<&mut Sampler2dUniformParams> {
        self.write()
    }

    pub fn write_draw_indexed(&mut self) -> Result<&mut DrawIndexedParams> {
        self.write()
    }

    // ===== CONVENIENCE WRITERS =====

    pub fn clear(&mut self, flags: ClearFlags, color: [f32; 4], depth: f32, stencil: i32) -> Result<()> {
        let params = self.write_clear()?;
        params.color = color;
        params.depth = depth;
        params.stencil = stencil;
        params.set_clear_flags(flags);
        Ok(())
    }

    pub fn set_viewport(&mut self, rect: Rect) -> Result<()> {
        self.write_set_viewport()?.set_rect(rect);
        Ok(())
    }

    pub fn enable_scissor(&mut self, enabled: bool) -> Result<()> {
        self.write_enable_scissor()?.set_enabled(enabled);
        Ok(())
    }

    pub fn set_scissor_box(&mut self, rect: Rect) -> Result<()> {
        self.write_set_scissor_box()?.set_rect(rect);
        Ok(())
    }

    pub fn enable_culling(&mut self, enabled: bool) -> Result<()> {
        self.write_enable_culling()?.set_enabled(enabled);
        Ok(())
    }

    pub fn enable_depth_test(&mut self, enabled: bool) -> Result<()> {
        self.write_enable_depth_test()?.set_enabled(enabled);
        Ok(())
    }

    pub fn enable_depth_write(&mut self, enabled: bool) -> Result<()> {
        self.write_enable_depth_write()?.set_enabled(enabled);
        Ok(())
    }

    pub fn enable_blending(&mut self, enabled: bool) -> Result<()> {
        self.write_enable_blending()?.set_enabled(enabled);
        Ok(())
    }

    pub fn set_blending_func(&mut self, src: BlendFactor, dst: BlendFactor) -> Result<()> {
        self.write_set_blending_func()?.set(src, dst);
        Ok(())
    }

    pub fn set_texture(&mut self, unit: u32, texture: Option<R2TextureHandle>) -> Result<()> {
        self.write_set_texture()?.set(unit, texture);
        Ok(())
    }

    pub fn set_sampler(&mut self, unit: u32, sampler: Option<SamplerHandle>) -> Result<()> {
        self.write_set_sampler()?.set(unit, sampler);
        Ok(())
    }

    pub fn set_vertex_input(&mut self, vertex_input: Option<VertexInputHandle>) -> Result<()> {
        self.write_set_vertex_input()?.set(vertex_input);
        Ok(())
    }

    pub fn set_shader_stage(&mut self, shader_stage: Option<ShaderStageHandle>) -> Result<()> {
        self.write_set_shader_stage()?.set(shader_stage);
        Ok(())
    }

    /// Record the `set_*_uniform` op matching `value`
    ///
    /// Fails when `variable` is an attribute or holds a different type.
    pub fn set_uniform(&mut self, variable: &ShaderVariable, value: impl Into<UniformValue>) -> Result<()> {
        let value = value.into();
        validate_uniform_value(variable, &value)?;
        let stage = RawHandle::from_key(variable.stage);
        let index = variable.index;

        match value {
            UniformValue::Int32(v) => {
                let p = self.write_set_int32_uniform()?;
                p.shader_stage = stage;
                p.variable = index;
                p.value = v;
            }
            UniformValue::Float32(v) => {
                let p = self.write_set_float32_uniform()?;
                p.shader_stage = stage;
                p.variable = index;
                p.value = v;
            }
            UniformValue::Vec2(v) => {
                let p = self.write_set_vec2_uniform()?;
                p.shader_stage = stage;
                p.variable = index;
                p.value = v;
            }
            UniformValue::Vec3(v) => {
                let p = self.write_set_vec3_uniform()?;
                p.shader_stage = stage;
                p.variable = index;
                p.value = v;
            }
            UniformValue::Vec4(v) => {
                let p = self.write_set_vec4_uniform()?;
                p.shader_stage = stage;
                p.variable = index;
                p.value = v;
            }
            UniformValue::Mat4(v) => {
                let p = self.write_set_mat4_uniform()?;
                p.shader_stage = stage;
                p.variable = index;
                p.value = v;
            }
            UniformValue::Sampler2d(v) => {
                let p = self.write_set_sampler2d_uniform()?;
                p.shader_stage = stage;
                p.variable = index;
                p.value = v;
            }
        }
        Ok(())
    }

    pub fn draw_indexed(&mut self, first_index: u32, index_count: u32) -> Result<()> {
        let params = self.write_draw_indexed()?;
        params.first_index = first_index;
        params.index_count = index_count;
        Ok(())
    }

    // ===== READ PHASE =====

    pub fn begin_read(&mut self) -> Result<()> {
        if self.phase != CommandBufferPhase::Recorded {
            return Err(Error::InvalidState(format!("begin_read called while {:?}", self.phase)));
        }
        self.read_cursor = 0;
        self.phase = CommandBufferPhase::Reading;
        Ok(())
    }

    /// Finish a read pass; the recording stays available for replay
    pub fn end_read(&mut self) -> Result<()> {
        if self.phase != CommandBufferPhase::Reading {
            return Err(Error::InvalidState(format!("end_read called while {:?}", self.phase)));
        }
        self.read_cursor = 0;
        self.phase = CommandBufferPhase::Recorded;
        Ok(())
    }

    /// Tag of the next record, `None` once every record has been read
    ///
    /// # Panics
    ///
    /// Outside a read pass.
    pub fn read_command_id(&self) -> Option<CommandId> {
        assert_eq!(
            self.phase,
            CommandBufferPhase::Reading,
            "read_command_id called outside begin_read/end_read"
        );
        let header = *self.words.get(self.read_cursor)?;
        let raw = header as u32;
        match CommandId::from_raw(raw) {
            Some(id) => Some(id),
            None => panic!("Corrupt command stream: unknown tag {}", raw),
        }
    }

    /// Read the next record as `P`
    ///
    /// # Panics
    ///
    /// Outside a read pass, past the end, or when the next record is not a `P`.
    pub fn read<P: CommandPayload>(&mut self) -> P {
        assert_eq!(
            self.phase,
            CommandBufferPhase::Reading,
            "read of {:?} outside begin_read/end_read",
            P::ID
        );
        let header = match self.words.get(self.read_cursor) {
            Some(header) => *header,
            None => panic!("read of {:?} past the end of the command stream", P::ID),
        };
        let id = header as u32;
        let size = (header >> 32) as usize;
        assert_eq!(
            id,
            P::ID as u32,
            "Command tag mismatch: stream holds {:?}, reader asked for {:?}",
            CommandId::from_raw(id),
            P::ID
        );
        assert_eq!(size, size_of::<P>(), "Payload size mismatch for {:?}", P::ID);

        let start = self.read_cursor + 1;
        let end = start + size.div_ceil(WORD);
        let bytes: &[u8] = bytemuck::cast_slice(&self.words[start..end]);
        let payload = *bytemuck::from_bytes::<P>(&bytes[..size]);
        self.read_cursor = end;
        payload
    }

    pub fn read_clear(&mut self) -> ClearParams {
        self.read()
    }

    pub fn read_set_viewport(&mut self) -> ViewportParams {
        self.read()
    }

    pub fn read_enable_scissor(&mut self) -> EnableScissorParams {
        self.read()
    }

    pub fn read_set_scissor_box(&mut self) -> ScissorBoxParams {
        self.read()
    }

    pub fn read_enable_culling(&mut self) -> EnableCullingParams {
        self.read()
    }

    pub fn read_enable_depth_test(&mut self) -> EnableDepthTestParams {
        self.read()
    }

    pub fn read_enable_depth_write(&mut self) -> EnableDepthWriteParams {
        self.read()
    }

    pub fn read_enable_blending(&mut self) -> EnableBlendingParams {
        self.read()
    }

    pub fn read_set_blending_func(&mut self) -> BlendingFuncParams {
        self.read()
    }

    pub fn read_set_texture(&mut self) -> TextureParams {
        self.read()
    }

    pub fn read_set_sampler(&mut self) -> SamplerParams {
        self.read()
    }

    pub fn read_set_vertex_input(&mut self) -> VertexInputParams {
        self.read()
    }

    pub fn read_set_shader_stage(&mut self) -> ShaderStageParams {
        self.read()
    }

    pub fn read_set_int32_uniform(&mut self) -> Int32UniformParams {
        self.read()
    }

    pub fn read_set_float32_uniform(&mut self) -> Float32UniformParams {
        self.read()
    }

    pub fn read_set_vec2_uniform(&mut self) -> Vec2UniformParams {
        self.read()
    }

    pub fn read_set_vec3_uniform(&mut self) -> Vec3UniformParams {
        self.read()
    }

    pub fn read_set_vec4_uniform(&mut self) -> Vec4UniformParams {
        self.read()
    }

    pub fn read_set_mat4_uniform(&mut self) -> Mat4UniformParams {
        self.read()
    }

    pub fn read_set_sampler2d_uniform(&mut self) -> Sampler2dUniformParams {
        self.read()
    }

    pub fn read_draw_indexed(&mut self) -> DrawIndexedParams {
        self.read()
    }
}

#[cfg(test)]
#[path = "command_buffer_tests.rs"]
mod tests;
