/// Conversions from nebula_render enums to GL enums

use nebula_render::nebula::render::{
    AddressMode, AttributeFormat, BlendFactor, BufferUsage, Filter, IndexType, MipmapMode, PixelFormat,
};
use nebula_render::nebula::{Error, Result};

/// (internal format, pixel format, component type) for `glTexImage2D`
pub(crate) fn pixel_format_to_gl(format: PixelFormat) -> (i32, u32, u32) {
    match format {
        PixelFormat::R8_UNORM => (glow::R8 as i32, glow::RED, glow::UNSIGNED_BYTE),
        PixelFormat::R8G8_UNORM => (glow::RG8 as i32, glow::RG, glow::UNSIGNED_BYTE),
        PixelFormat::R8G8B8_UNORM => (glow::RGB8 as i32, glow::RGB, glow::UNSIGNED_BYTE),
        PixelFormat::R8G8B8A8_UNORM => (glow::RGBA8 as i32, glow::RGBA, glow::UNSIGNED_BYTE),
        PixelFormat::R8G8B8A8_SRGB => (glow::SRGB8_ALPHA8 as i32, glow::RGBA, glow::UNSIGNED_BYTE),
        PixelFormat::B8G8R8A8_UNORM => (glow::RGBA8 as i32, glow::BGRA, glow::UNSIGNED_BYTE),
        PixelFormat::R16G16B16A16_SFLOAT => (glow::RGBA16F as i32, glow::RGBA, glow::HALF_FLOAT),
        PixelFormat::R32G32B32A32_SFLOAT => (glow::RGBA32F as i32, glow::RGBA, glow::FLOAT),
    }
}

/// (component count, component type, normalized) for `glVertexAttribPointer`
pub(crate) fn attribute_format_to_gl(format: AttributeFormat) -> (i32, u32, bool) {
    match format {
        AttributeFormat::R32_SFLOAT => (1, glow::FLOAT, false),
        AttributeFormat::R32G32_SFLOAT => (2, glow::FLOAT, false),
        AttributeFormat::R32G32B32_SFLOAT => (3, glow::FLOAT, false),
        AttributeFormat::R32G32B32A32_SFLOAT => (4, glow::FLOAT, false),
        AttributeFormat::R8G8B8A8_UNORM => (4, glow::UNSIGNED_BYTE, true),
    }
}

pub(crate) fn index_type_to_gl(index_type: IndexType) -> u32 {
    match index_type {
        IndexType::U16 => glow::UNSIGNED_SHORT,
        IndexType::U32 => glow::UNSIGNED_INT,
    }
}

/// (count, byte offset) arguments of `glDrawElements`, both bounded by `GLsizei`
pub(crate) fn draw_elements_range(first_index: u32, index_count: u32, index_type: IndexType) -> Result<(i32, i32)> {
    let offset = u64::from(first_index) * u64::from(index_type.size_bytes());
    match (i32::try_from(index_count), i32::try_from(offset)) {
        (Ok(count), Ok(offset)) => Ok((count, offset)),
        _ => Err(Error::InvalidArgument(format!(
            "draw_indexed range {}+{} exceeds the GL index range",
            first_index, index_count
        ))),
    }
}

pub(crate) fn buffer_usage_to_gl(usage: BufferUsage) -> u32 {
    match usage {
        BufferUsage::DrawStreaming => glow::STREAM_DRAW,
        BufferUsage::DrawStatic => glow::STATIC_DRAW,
        BufferUsage::DrawDynamic => glow::DYNAMIC_DRAW,
    }
}

pub(crate) fn mag_filter_to_gl(filter: Filter) -> i32 {
    match filter {
        Filter::Nearest => glow::NEAREST as i32,
        Filter::Linear => glow::LINEAR as i32,
    }
}

/// GL folds the mipmap mode into the minification filter
pub(crate) fn min_filter_to_gl(filter: Filter, mipmap_mode: MipmapMode) -> i32 {
    let value = match (filter, mipmap_mode) {
        (Filter::Nearest, MipmapMode::None) => glow::NEAREST,
        (Filter::Linear, MipmapMode::None) => glow::LINEAR,
        (Filter::Nearest, MipmapMode::Nearest) => glow::NEAREST_MIPMAP_NEAREST,
        (Filter::Linear, MipmapMode::Nearest) => glow::LINEAR_MIPMAP_NEAREST,
        (Filter::Nearest, MipmapMode::Linear) => glow::NEAREST_MIPMAP_LINEAR,
        (Filter::Linear, MipmapMode::Linear) => glow::LINEAR_MIPMAP_LINEAR,
    };
    value as i32
}

pub(crate) fn address_mode_to_gl(mode: AddressMode) -> i32 {
    let value = match mode {
        AddressMode::Repeat => glow::REPEAT,
        AddressMode::MirroredRepeat => glow::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => glow::CLAMP_TO_EDGE,
    };
    value as i32
}

pub(crate) fn blend_factor_to_gl(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcColor => glow::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => glow::DST_COLOR,
        BlendFactor::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => glow::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
    }
}

/// Human-readable name of a `glGetError` code
pub(crate) fn gl_error_name(code: u32) -> &'static str {
    match code {
        glow::INVALID_ENUM => "GL_INVALID_ENUM",
        glow::INVALID_VALUE => "GL_INVALID_VALUE",
        glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
        glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        glow::STACK_OVERFLOW => "GL_STACK_OVERFLOW",
        glow::STACK_UNDERFLOW => "GL_STACK_UNDERFLOW",
        glow::CONTEXT_LOST => "GL_CONTEXT_LOST",
        _ => "unknown GL error",
    }
}

/// Error flags polled before the queue is considered stuck
pub(crate) const MAX_ERROR_DRAIN: usize = 32;

/// Outcome of emptying the GL error queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorDrain {
    Clear,
    /// First error reported before the queue emptied
    First(u32),
    /// Still reporting errors after `MAX_ERROR_DRAIN` polls; a lost context
    /// keeps its error flag set forever
    Stuck(u32),
}

/// Poll `next_error` (a `glGetError`) until it reports `GL_NO_ERROR`, at
/// most `MAX_ERROR_DRAIN` times
pub(crate) fn drain_errors(mut next_error: impl FnMut() -> u32) -> ErrorDrain {
    let mut first = None;
    for _ in 0..MAX_ERROR_DRAIN {
        let code = next_error();
        if code == glow::NO_ERROR {
            return first.map_or(ErrorDrain::Clear, ErrorDrain::First);
        }
        first.get_or_insert(code);
    }
    ErrorDrain::Stuck(first.unwrap_or(glow::CONTEXT_LOST))
}

#[cfg(test)]
#[path = "gl_format_tests.rs"]
mod tests;
