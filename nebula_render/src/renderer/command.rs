/// Command op-codes and their fixed-size payloads
///
/// Every payload is a `#[repr(C)]` POD struct without implicit padding so it
/// can live directly inside the command arena.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::renderer::{R2TextureHandle, RawHandle, SamplerHandle, ShaderStageHandle, VertexInputHandle};

/// Tag stored in front of every recorded command
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    Clear = 1,
    SetViewport,
    EnableScissor,
    SetScissorBox,
    EnableCulling,
    EnableDepthTest,
    EnableDepthWrite,
    EnableBlending,
    SetBlendingFunc,
    SetTexture,
    SetSampler,
    SetVertexInput,
    SetShaderStage,
    SetInt32Uniform,
    SetFloat32Uniform,
    SetVec2Uniform,
    SetVec3Uniform,
    SetVec4Uniform,
    SetMat4Uniform,
    SetSampler2dUniform,
    DrawIndexed,
}

impl CommandId {
    const ALL: [CommandId; 21] = [
        CommandId::Clear,
        CommandId::SetViewport,
        CommandId::EnableScissor,
        CommandId::SetScissorBox,
        CommandId::EnableCulling,
        CommandId::EnableDepthTest,
        CommandId::EnableDepthWrite,
        CommandId::EnableBlending,
        CommandId::SetBlendingFunc,
        CommandId::SetTexture,
        CommandId::SetSampler,
        CommandId::SetVertexInput,
        CommandId::SetShaderStage,
        CommandId::SetInt32Uniform,
        CommandId::SetFloat32Uniform,
        CommandId::SetVec2Uniform,
        CommandId::SetVec3Uniform,
        CommandId::SetVec4Uniform,
        CommandId::SetMat4Uniform,
        CommandId::SetSampler2dUniform,
        CommandId::DrawIndexed,
    ];

    pub fn from_raw(raw: u32) -> Option<CommandId> {
        Self::ALL.iter().copied().find(|id| *id as u32 == raw)
    }
}

/// Payload type bound to exactly one op-code
pub trait CommandPayload: Pod {
    const ID: CommandId;
}

bitflags! {
    /// Attachments touched by a clear
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Blend factors for `set_blending_func`
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero = 0,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

impl BlendFactor {
    pub fn from_raw(raw: u32) -> Option<BlendFactor> {
        Some(match raw {
            0 => BlendFactor::Zero,
            1 => BlendFactor::One,
            2 => BlendFactor::SrcColor,
            3 => BlendFactor::OneMinusSrcColor,
            4 => BlendFactor::DstColor,
            5 => BlendFactor::OneMinusDstColor,
            6 => BlendFactor::SrcAlpha,
            7 => BlendFactor::OneMinusSrcAlpha,
            8 => BlendFactor::DstAlpha,
            9 => BlendFactor::OneMinusDstAlpha,
            _ => return None,
        })
    }
}

/// Integer rectangle in framebuffer pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

// ===== PAYLOADS =====

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ClearParams {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: i32,
    /// `ClearFlags` bits
    pub flags: u32,
    pub _pad: u32,
}

impl ClearParams {
    pub fn clear_flags(&self) -> ClearFlags {
        ClearFlags::from_bits_truncate(self.flags)
    }

    pub fn set_clear_flags(&mut self, flags: ClearFlags) {
        self.flags = flags.bits();
    }
}

impl CommandPayload for ClearParams {
    const ID: CommandId = CommandId::Clear;
}

macro_rules! rect_payload {
    ($name:ident, $id:expr) => {
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
        pub struct $name {
            pub x: i32,
            pub y: i32,
            pub width: i32,
            pub height: i32,
        }

        impl $name {
            pub fn rect(&self) -> Rect {
                Rect {
                    x: self.x,
                    y: self.y,
                    width: self.width,
                    height: self.height,
                }
            }

            pub fn set_rect(&mut self, rect: Rect) {
                self.x = rect.x;
                self.y = rect.y;
                self.width = rect.width;
                self.height = rect.height;
            }
        }

        impl CommandPayload for $name {
            const ID: CommandId = $id;
        }
    };
}

rect_payload!(ViewportParams, CommandId::SetViewport);
rect_payload!(ScissorBoxParams, CommandId::SetScissorBox);

macro_rules! toggle_payload {
    ($name:ident, $id:expr) => {
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
        pub struct $name {
            pub enabled: u32,
        }

        impl $name {
            pub fn is_enabled(&self) -> bool {
                self.enabled != 0
            }

            pub fn set_enabled(&mut self, enabled: bool) {
                self.enabled = enabled as u32;
            }
        }

        impl CommandPayload for $name {
            const ID: CommandId = $id;
        }
    };
}

toggle_payload!(EnableScissorParams, CommandId::EnableScissor);
toggle_payload!(EnableCullingParams, CommandId::EnableCulling);
toggle_payload!(EnableDepthTestParams, CommandId::EnableDepthTest);
toggle_payload!(EnableDepthWriteParams, CommandId::EnableDepthWrite);
toggle_payload!(EnableBlendingParams, CommandId::EnableBlending);

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct BlendingFuncParams {
    /// `BlendFactor` as u32
    pub src: u32,
    /// `BlendFactor` as u32
    pub dst: u32,
}

impl BlendingFuncParams {
    pub fn set(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.src = src as u32;
        self.dst = dst as u32;
    }
}

impl CommandPayload for BlendingFuncParams {
    const ID: CommandId = CommandId::SetBlendingFunc;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TextureParams {
    pub texture: RawHandle,
    pub unit: u32,
    pub _pad: u32,
}

impl TextureParams {
    pub fn set(&mut self, unit: u32, texture: Option<R2TextureHandle>) {
        self.unit = unit;
        self.texture = RawHandle::from_option(texture);
    }
}

impl CommandPayload for TextureParams {
    const ID: CommandId = CommandId::SetTexture;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SamplerParams {
    pub sampler: RawHandle,
    pub unit: u32,
    pub _pad: u32,
}

impl SamplerParams {
    pub fn set(&mut self, unit: u32, sampler: Option<SamplerHandle>) {
        self.unit = unit;
        self.sampler = RawHandle::from_option(sampler);
    }
}

impl CommandPayload for SamplerParams {
    const ID: CommandId = CommandId::SetSampler;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct VertexInputParams {
    pub vertex_input: RawHandle,
}

impl VertexInputParams {
    pub fn set(&mut self, vertex_input: Option<VertexInputHandle>) {
        self.vertex_input = RawHandle::from_option(vertex_input);
    }
}

impl CommandPayload for VertexInputParams {
    const ID: CommandId = CommandId::SetVertexInput;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ShaderStageParams {
    pub shader_stage: RawHandle,
}

impl ShaderStageParams {
    pub fn set(&mut self, shader_stage: Option<ShaderStageHandle>) {
        self.shader_stage = RawHandle::from_option(shader_stage);
    }
}

impl CommandPayload for ShaderStageParams {
    const ID: CommandId = CommandId::SetShaderStage;
}

// Uniform payloads all start with the owning stage and the variable index.

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Int32UniformParams {
    pub shader_stage: RawHandle,
    pub variable: u32,
    pub value: i32,
}

impl CommandPayload for Int32UniformParams {
    const ID: CommandId = CommandId::SetInt32Uniform;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Float32UniformParams {
    pub shader_stage: RawHandle,
    pub variable: u32,
    pub value: f32,
}

impl CommandPayload for Float32UniformParams {
    const ID: CommandId = CommandId::SetFloat32Uniform;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vec2UniformParams {
    pub shader_stage: RawHandle,
    pub variable: u32,
    pub _pad: u32,
    pub value: [f32; 2],
}

impl CommandPayload for Vec2UniformParams {
    const ID: CommandId = CommandId::SetVec2Uniform;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vec3UniformParams {
    pub shader_stage: RawHandle,
    pub variable: u32,
    pub value: [f32; 3],
}

impl CommandPayload for Vec3UniformParams {
    const ID: CommandId = CommandId::SetVec3Uniform;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vec4UniformParams {
    pub shader_stage: RawHandle,
    pub variable: u32,
    pub _pad: u32,
    pub value: [f32; 4],
}

impl CommandPayload for Vec4UniformParams {
    const ID: CommandId = CommandId::SetVec4Uniform;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Mat4UniformParams {
    pub shader_stage: RawHandle,
    pub variable: u32,
    pub _pad: u32,
    /// Column-major
    pub value: [f32; 16],
}

impl CommandPayload for Mat4UniformParams {
    const ID: CommandId = CommandId::SetMat4Uniform;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Sampler2dUniformParams {
    pub shader_stage: RawHandle,
    pub variable: u32,
    /// Texture unit
    pub value: i32,
}

impl CommandPayload for Sampler2dUniformParams {
    const ID: CommandId = CommandId::SetSampler2dUniform;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedParams {
    pub first_index: u32,
    pub index_count: u32,
}

impl CommandPayload for DrawIndexedParams {
    const ID: CommandId = CommandId::DrawIndexed;
}
