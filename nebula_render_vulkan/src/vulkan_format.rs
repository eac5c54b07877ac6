/// Conversions from renderer enums to Vulkan enums

use ash::vk;
use nebula_render::nebula::render::{
    AddressMode, AttributeFormat, BlendFactor, Filter, IndexType, MipmapMode, PixelFormat, ValueType,
};

pub(crate) fn pixel_format_to_vk(format: PixelFormat) -> vk::Format {
    match format {
        PixelFormat::R8_UNORM => vk::Format::R8_UNORM,
        PixelFormat::R8G8_UNORM => vk::Format::R8G8_UNORM,
        PixelFormat::R8G8B8_UNORM => vk::Format::R8G8B8_UNORM,
        PixelFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        PixelFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        PixelFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        PixelFormat::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        PixelFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
    }
}

/// Image format backing a texture of `format`
///
/// `is_usable` says whether the device can sample and upload to a format
/// with optimal tiling. RGB8 falls back to RGBA8, which every device
/// supports; uploads then go through `expand_rgb_to_rgba`.
pub(crate) fn select_texture_format(
    format: PixelFormat,
    is_usable: impl Fn(vk::Format) -> bool,
) -> Option<vk::Format> {
    let native = pixel_format_to_vk(format);
    if is_usable(native) {
        return Some(native);
    }
    match format {
        PixelFormat::R8G8B8_UNORM if is_usable(vk::Format::R8G8B8A8_UNORM) => Some(vk::Format::R8G8B8A8_UNORM),
        _ => None,
    }
}

/// Tightly packed RGB8 texels to RGBA8 with opaque alpha
pub(crate) fn expand_rgb_to_rgba(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 3 * 4);
    for texel in data.chunks_exact(3) {
        out.extend_from_slice(texel);
        out.push(u8::MAX);
    }
    out
}

/// Vertex attribute format as read from a vertex buffer
pub(crate) fn attribute_format_to_vk(format: AttributeFormat) -> vk::Format {
    match format {
        AttributeFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
        AttributeFormat::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        AttributeFormat::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
        AttributeFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        AttributeFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
    }
}

pub(crate) fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

pub(crate) fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

/// Mipmap mode plus the max LOD that goes with it
///
/// Vulkan has no "no mipmapping" mode; clamping the LOD range to level 0
/// gives the same result.
pub(crate) fn mipmap_mode_to_vk(mode: MipmapMode) -> (vk::SamplerMipmapMode, f32) {
    match mode {
        MipmapMode::None => (vk::SamplerMipmapMode::NEAREST, 0.0),
        MipmapMode::Nearest => (vk::SamplerMipmapMode::NEAREST, vk::LOD_CLAMP_NONE),
        MipmapMode::Linear => (vk::SamplerMipmapMode::LINEAR, vk::LOD_CLAMP_NONE),
    }
}

pub(crate) fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
    }
}

pub(crate) fn blend_factor_to_vk(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
    }
}

/// Sample count flag for a requested MSAA degree (rounded down to a power of two)
pub(crate) fn sample_count_to_vk(samples: u32) -> vk::SampleCountFlags {
    match samples {
        0 | 1 => vk::SampleCountFlags::TYPE_1,
        2 | 3 => vk::SampleCountFlags::TYPE_2,
        4..=7 => vk::SampleCountFlags::TYPE_4,
        8..=15 => vk::SampleCountFlags::TYPE_8,
        16..=31 => vk::SampleCountFlags::TYPE_16,
        32..=63 => vk::SampleCountFlags::TYPE_32,
        _ => vk::SampleCountFlags::TYPE_64,
    }
}

/// Highest sample count present in a set of supported counts
pub(crate) fn max_sample_count(counts: vk::SampleCountFlags) -> u32 {
    [64, 32, 16, 8, 4, 2]
        .into_iter()
        .find(|&n| counts.contains(sample_count_to_vk(n)))
        .unwrap_or(1)
}

/// Byte size of a uniform value inside a push-constant block
pub(crate) fn push_constant_size(value_type: ValueType) -> u32 {
    match value_type {
        ValueType::Int32 | ValueType::Float32 | ValueType::Sampler2d => 4,
        ValueType::Vec2 => 8,
        ValueType::Vec3 => 12,
        ValueType::Vec4 => 16,
        ValueType::Mat4 => 64,
    }
}

/// Map a reflected SPIR-V type to a uniform value type
///
/// Returns `None` for types the command set cannot express (doubles,
/// non-square matrices, arrays, structs).
pub(crate) fn spirq_type_to_value_type(ty: &spirq::ty::Type) -> Option<ValueType> {
    use spirq::ty::{ScalarType, Type};

    let is_f32 = |scalar: &ScalarType| matches!(scalar, ScalarType::Float { bits: 32 });
    match ty {
        Type::Scalar(ScalarType::Integer { bits: 32, is_signed: true }) => Some(ValueType::Int32),
        Type::Scalar(s) if is_f32(s) => Some(ValueType::Float32),
        Type::Vector(v) if is_f32(&v.scalar_ty) => match v.nscalar {
            2 => Some(ValueType::Vec2),
            3 => Some(ValueType::Vec3),
            4 => Some(ValueType::Vec4),
            _ => None,
        },
        Type::Matrix(m) if is_f32(&m.vector_ty.scalar_ty) && m.nvector == 4 && m.vector_ty.nscalar == 4 => {
            Some(ValueType::Mat4)
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
