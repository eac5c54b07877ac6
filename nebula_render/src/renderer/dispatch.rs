/// Command buffer replay
///
/// `dispatch_commands` decodes a recorded [`CommandBuffer`] and forwards each
/// record, in order, to a backend's [`CommandExecutor`].

use crate::error::{Error, Result};
use crate::renderer::command::*;
use crate::renderer::{
    CommandBuffer, R2TextureHandle, RawHandle, Rect, SamplerHandle, ShaderStageHandle, UniformValue,
    VertexInputHandle,
};

/// Backend side of command replay; one method per op-code
pub trait CommandExecutor {
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4], depth: f32, stencil: i32) -> Result<()>;

    fn set_viewport(&mut self, rect: Rect) -> Result<()>;

    fn enable_scissor(&mut self, enabled: bool) -> Result<()>;

    fn set_scissor_box(&mut self, rect: Rect) -> Result<()>;

    fn enable_culling(&mut self, enabled: bool) -> Result<()>;

    fn enable_depth_test(&mut self, enabled: bool) -> Result<()>;

    fn enable_depth_write(&mut self, enabled: bool) -> Result<()>;

    fn enable_blending(&mut self, enabled: bool) -> Result<()>;

    fn set_blending_func(&mut self, src: BlendFactor, dst: BlendFactor) -> Result<()>;

    fn set_texture(&mut self, unit: u32, texture: Option<R2TextureHandle>) -> Result<()>;

    fn set_sampler(&mut self, unit: u32, sampler: Option<SamplerHandle>) -> Result<()>;

    fn set_vertex_input(&mut self, vertex_input: Option<VertexInputHandle>) -> Result<()>;

    fn set_shader_stage(&mut self, shader_stage: Option<ShaderStageHandle>) -> Result<()>;

    /// All `set_*_uniform` ops land here with their decoded value
    fn set_uniform(&mut self, shader_stage: ShaderStageHandle, variable: u32, value: UniformValue) -> Result<()>;

    fn draw_indexed(&mut self, first_index: u32, index_count: u32) -> Result<()>;
}

fn blend_factor(raw: u32) -> Result<BlendFactor> {
    BlendFactor::from_raw(raw).ok_or_else(|| Error::InvalidArgument(format!("Unknown blend factor {}", raw)))
}

fn stage_of(raw: RawHandle) -> Result<ShaderStageHandle> {
    raw.to_key()
        .ok_or_else(|| Error::InvalidResource("Uniform command without a shader stage".to_string()))
}

/// Replay `commands` into `executor`
///
/// A disabled buffer is skipped without touching the executor. The buffer is
/// returned to its recorded state whether or not replay succeeds.
///
/// # Returns
///
/// Number of commands executed.
pub fn dispatch_commands(commands: &mut CommandBuffer, executor: &mut dyn CommandExecutor) -> Result<usize> {
    if !commands.is_enabled() {
        return Ok(0);
    }
    commands.begin_read()?;
    let result = replay(commands, executor);
    commands.end_read()?;
    result
}

fn replay(commands: &mut CommandBuffer, executor: &mut dyn CommandExecutor) -> Result<usize> {
    let mut executed = 0;
    while let Some(id) = commands.read_command_id() {
        match id {
            CommandId::Clear => {
                let p = commands.read_clear();
                executor.clear(p.clear_flags(), p.color, p.depth, p.stencil)?;
            }
            CommandId::SetViewport => {
                let p = commands.read_set_viewport();
                executor.set_viewport(p.rect())?;
            }
            CommandId::EnableScissor => {
                let p = commands.read_enable_scissor();
                executor.enable_scissor(p.is_enabled())?;
            }
            CommandId::SetScissorBox => {
                let p = commands.read_set_scissor_box();
                executor.set_scissor_box(p.rect())?;
            }
            CommandId::EnableCulling => {
                let p = commands.read_enable_culling();
                executor.enable_culling(p.is_enabled())?;
            }
            CommandId::EnableDepthTest => {
                let p = commands.read_enable_depth_test();
                executor.enable_depth_test(p.is_enabled())?;
            }
            CommandId::EnableDepthWrite => {
                let p = commands.read_enable_depth_write();
                executor.enable_depth_write(p.is_enabled())?;
            }
            CommandId::EnableBlending => {
                let p = commands.read_enable_blending();
                executor.enable_blending(p.is_enabled())?;
            }
            CommandId::SetBlendingFunc => {
                let p = commands.read_set_blending_func();
                executor.set_blending_func(blend_factor(p.src)?, blend_factor(p.dst)?)?;
            }
            CommandId::SetTexture => {
                let p = commands.read_set_texture();
                executor.set_texture(p.unit, p.texture.to_key())?;
            }
            CommandId::SetSampler => {
                let p = commands.read_set_sampler();
                executor.set_sampler(p.unit, p.sampler.to_key())?;
            }
            CommandId::SetVertexInput => {
                let p = commands.read_set_vertex_input();
                executor.set_vertex_input(p.vertex_input.to_key())?;
            }
            CommandId::SetShaderStage => {
                let p = commands.read_set_shader_stage();
                executor.set_shader_stage(p.shader_stage.to_key())?;
            }
            CommandId::SetInt32Uniform => {
                let p = commands.read_set_int32_uniform();
                executor.set_uniform(stage_of(p.shader_stage)?, p.variable, UniformValue::Int32(p.value))?;
            }
            CommandId::SetFloat32Uniform => {
                let p = commands.read_set_float32_uniform();
                executor.set_uniform(stage_of(p.shader_stage)?, p.variable, UniformValue::Float32(p.value))?;
            }
            CommandId::SetVec2Uniform => {
                let p = commands.read_set_vec2_uniform();
                executor.set_uniform(stage_of(p.shader_stage)?, p.variable, UniformValue::Vec2(p.value))?;
            }
            CommandId::SetVec3Uniform => {
                let p = commands.read_set_vec3_uniform();
                executor.set_uniform(stage_of(p.shader_stage)?, p.variable, UniformValue::Vec3(p.value))?;
            }
            CommandId::SetVec4Uniform => {
                let p = commands.read_set_vec4_uniform();
                executor.set_uniform(stage_of(p.shader_stage)?, p.variable, UniformValue::Vec4(p.value))?;
            }
            CommandId::SetMat4Uniform => {
                let p = commands.read_set_mat4_uniform();
                executor.set_uniform(stage_of(p.shader_stage)?, p.variable, UniformValue::Mat4(p.value))?;
            }
            CommandId::SetSampler2dUniform => {
                let p = commands.read_set_sampler2d_uniform();
                executor.set_uniform(stage_of(p.shader_stage)?, p.variable, UniformValue::Sampler2d(p.value))?;
            }
            CommandId::DrawIndexed => {
                let p = commands.read_draw_indexed();
                executor.draw_indexed(p.first_index, p.index_count)?;
            }
        }
        executed += 1;
    }
    Ok(executed)
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
