//! Unit tests for Vulkan format conversion functions
//!
//! Pure mappings, no GPU required.

use ash::vk;
use nebula_render::nebula::render::{
    AddressMode, AttributeFormat, BlendFactor, Filter, IndexType, MipmapMode, PixelFormat, ValueType,
};

use super::*;

// ============================================================================
// TEXEL / ATTRIBUTE / INDEX FORMATS
// ============================================================================

#[test]
fn test_pixel_formats_map_one_to_one() {
    assert_eq!(pixel_format_to_vk(PixelFormat::R8_UNORM), vk::Format::R8_UNORM);
    assert_eq!(pixel_format_to_vk(PixelFormat::R8G8B8A8_SRGB), vk::Format::R8G8B8A8_SRGB);
    assert_eq!(pixel_format_to_vk(PixelFormat::B8G8R8A8_UNORM), vk::Format::B8G8R8A8_UNORM);
    assert_eq!(
        pixel_format_to_vk(PixelFormat::R16G16B16A16_SFLOAT),
        vk::Format::R16G16B16A16_SFLOAT
    );

    let all = [
        PixelFormat::R8_UNORM,
        PixelFormat::R8G8_UNORM,
        PixelFormat::R8G8B8_UNORM,
        PixelFormat::R8G8B8A8_UNORM,
        PixelFormat::R8G8B8A8_SRGB,
        PixelFormat::B8G8R8A8_UNORM,
        PixelFormat::R16G16B16A16_SFLOAT,
        PixelFormat::R32G32B32A32_SFLOAT,
    ];
    let mut mapped: Vec<vk::Format> = all.iter().map(|f| pixel_format_to_vk(*f)).collect();
    mapped.sort_by_key(|f| f.as_raw());
    mapped.dedup();
    assert_eq!(mapped.len(), all.len());
}

#[test]
fn test_attribute_formats() {
    assert_eq!(attribute_format_to_vk(AttributeFormat::R32_SFLOAT), vk::Format::R32_SFLOAT);
    assert_eq!(attribute_format_to_vk(AttributeFormat::R32G32_SFLOAT), vk::Format::R32G32_SFLOAT);
    assert_eq!(
        attribute_format_to_vk(AttributeFormat::R32G32B32_SFLOAT),
        vk::Format::R32G32B32_SFLOAT
    );
    assert_eq!(
        attribute_format_to_vk(AttributeFormat::R32G32B32A32_SFLOAT),
        vk::Format::R32G32B32A32_SFLOAT
    );
    assert_eq!(attribute_format_to_vk(AttributeFormat::R8G8B8A8_UNORM), vk::Format::R8G8B8A8_UNORM);
}

#[test]
fn test_index_types() {
    assert_eq!(index_type_to_vk(IndexType::U16), vk::IndexType::UINT16);
    assert_eq!(index_type_to_vk(IndexType::U32), vk::IndexType::UINT32);
}

// ============================================================================
// SAMPLER STATE
// ============================================================================

#[test]
fn test_filters_and_address_modes() {
    assert_eq!(filter_to_vk(Filter::Nearest), vk::Filter::NEAREST);
    assert_eq!(filter_to_vk(Filter::Linear), vk::Filter::LINEAR);
    assert_eq!(address_mode_to_vk(AddressMode::Repeat), vk::SamplerAddressMode::REPEAT);
    assert_eq!(
        address_mode_to_vk(AddressMode::MirroredRepeat),
        vk::SamplerAddressMode::MIRRORED_REPEAT
    );
    assert_eq!(address_mode_to_vk(AddressMode::ClampToEdge), vk::SamplerAddressMode::CLAMP_TO_EDGE);
}

#[test]
fn test_mipmap_none_clamps_lod_to_base_level() {
    let (mode, max_lod) = mipmap_mode_to_vk(MipmapMode::None);
    assert_eq!(mode, vk::SamplerMipmapMode::NEAREST);
    assert_eq!(max_lod, 0.0);

    let (mode, max_lod) = mipmap_mode_to_vk(MipmapMode::Linear);
    assert_eq!(mode, vk::SamplerMipmapMode::LINEAR);
    assert_eq!(max_lod, vk::LOD_CLAMP_NONE);
}

// ============================================================================
// BLENDING / MSAA
// ============================================================================

#[test]
fn test_blend_factors() {
    assert_eq!(blend_factor_to_vk(BlendFactor::Zero), vk::BlendFactor::ZERO);
    assert_eq!(blend_factor_to_vk(BlendFactor::One), vk::BlendFactor::ONE);
    assert_eq!(blend_factor_to_vk(BlendFactor::SrcAlpha), vk::BlendFactor::SRC_ALPHA);
    assert_eq!(
        blend_factor_to_vk(BlendFactor::OneMinusSrcAlpha),
        vk::BlendFactor::ONE_MINUS_SRC_ALPHA
    );
    assert_eq!(
        blend_factor_to_vk(BlendFactor::OneMinusDstColor),
        vk::BlendFactor::ONE_MINUS_DST_COLOR
    );
}

#[test]
fn test_sample_count_rounds_down() {
    assert_eq!(sample_count_to_vk(0), vk::SampleCountFlags::TYPE_1);
    assert_eq!(sample_count_to_vk(1), vk::SampleCountFlags::TYPE_1);
    assert_eq!(sample_count_to_vk(3), vk::SampleCountFlags::TYPE_2);
    assert_eq!(sample_count_to_vk(4), vk::SampleCountFlags::TYPE_4);
    assert_eq!(sample_count_to_vk(6), vk::SampleCountFlags::TYPE_4);
    assert_eq!(sample_count_to_vk(8), vk::SampleCountFlags::TYPE_8);
    assert_eq!(sample_count_to_vk(100), vk::SampleCountFlags::TYPE_64);
}

#[test]
fn test_max_sample_count() {
    let counts = vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_2 | vk::SampleCountFlags::TYPE_4;
    assert_eq!(max_sample_count(counts), 4);
    assert_eq!(max_sample_count(vk::SampleCountFlags::TYPE_1), 1);
    assert_eq!(max_sample_count(vk::SampleCountFlags::empty()), 1);
}

// ============================================================================
// REFLECTION TYPES
// ============================================================================

#[test]
fn test_push_constant_sizes() {
    assert_eq!(push_constant_size(ValueType::Float32), 4);
    assert_eq!(push_constant_size(ValueType::Vec3), 12);
    assert_eq!(push_constant_size(ValueType::Mat4), 64);
}

#[test]
fn test_spirq_scalar_and_vector_types() {
    use spirq::ty::{ScalarType, Type, VectorType};

    let float = ScalarType::Float { bits: 32 };
    assert_eq!(spirq_type_to_value_type(&Type::Scalar(float.clone())), Some(ValueType::Float32));
    assert_eq!(
        spirq_type_to_value_type(&Type::Scalar(ScalarType::Integer { bits: 32, is_signed: true })),
        Some(ValueType::Int32)
    );
    assert_eq!(
        spirq_type_to_value_type(&Type::Scalar(ScalarType::Integer { bits: 32, is_signed: false })),
        None
    );
    assert_eq!(spirq_type_to_value_type(&Type::Scalar(ScalarType::Float { bits: 64 })), None);

    let vec3 = Type::Vector(VectorType {
        scalar_ty: float.clone(),
        nscalar: 3,
    });
    assert_eq!(spirq_type_to_value_type(&vec3), Some(ValueType::Vec3));
    let vec4 = Type::Vector(VectorType {
        scalar_ty: float,
        nscalar: 4,
    });
    assert_eq!(spirq_type_to_value_type(&vec4), Some(ValueType::Vec4));
}

// ============================================================================
// TEXTURE FORMAT FALLBACK
// ============================================================================

#[test]
fn test_texture_format_native_when_supported() {
    let format = select_texture_format(PixelFormat::R8G8B8_UNORM, |_| true);
    assert_eq!(format, Some(vk::Format::R8G8B8_UNORM));
}

#[test]
fn test_rgb8_falls_back_to_rgba8() {
    let format = select_texture_format(PixelFormat::R8G8B8_UNORM, |f| f != vk::Format::R8G8B8_UNORM);
    assert_eq!(format, Some(vk::Format::R8G8B8A8_UNORM));
}

#[test]
fn test_unusable_format_has_no_fallback() {
    assert_eq!(select_texture_format(PixelFormat::R32G32B32A32_SFLOAT, |_| false), None);
    assert_eq!(select_texture_format(PixelFormat::R8G8B8_UNORM, |_| false), None);
}

#[test]
fn test_expand_rgb_rows_to_rgba() {
    let rgba = expand_rgb_to_rgba(&[1, 2, 3, 4, 5, 6]);
    assert_eq!(rgba, vec![1, 2, 3, 255, 4, 5, 6, 255]);
    assert!(expand_rgb_to_rgba(&[]).is_empty());
}
