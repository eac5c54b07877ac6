//! Unit tests for GL enum conversions
//!
//! Pure mappings, no GL context required.

use nebula_render::nebula::render::{
    AddressMode, AttributeFormat, BlendFactor, BufferUsage, Filter, IndexType, MipmapMode, PixelFormat,
};

use nebula_render::nebula::Error;

use super::*;

#[test]
fn test_pixel_formats() {
    assert_eq!(
        pixel_format_to_gl(PixelFormat::R8G8B8A8_UNORM),
        (glow::RGBA8 as i32, glow::RGBA, glow::UNSIGNED_BYTE)
    );
    assert_eq!(
        pixel_format_to_gl(PixelFormat::B8G8R8A8_UNORM),
        (glow::RGBA8 as i32, glow::BGRA, glow::UNSIGNED_BYTE)
    );
    assert_eq!(pixel_format_to_gl(PixelFormat::R16G16B16A16_SFLOAT).2, glow::HALF_FLOAT);
    assert_eq!(pixel_format_to_gl(PixelFormat::R32G32B32A32_SFLOAT).2, glow::FLOAT);
}

#[test]
fn test_attribute_formats() {
    assert_eq!(attribute_format_to_gl(AttributeFormat::R32G32B32_SFLOAT), (3, glow::FLOAT, false));
    assert_eq!(
        attribute_format_to_gl(AttributeFormat::R8G8B8A8_UNORM),
        (4, glow::UNSIGNED_BYTE, true)
    );
}

#[test]
fn test_index_types_and_usage() {
    assert_eq!(index_type_to_gl(IndexType::U16), glow::UNSIGNED_SHORT);
    assert_eq!(index_type_to_gl(IndexType::U32), glow::UNSIGNED_INT);
    assert_eq!(buffer_usage_to_gl(BufferUsage::DrawStreaming), glow::STREAM_DRAW);
    assert_eq!(buffer_usage_to_gl(BufferUsage::DrawStatic), glow::STATIC_DRAW);
    assert_eq!(buffer_usage_to_gl(BufferUsage::DrawDynamic), glow::DYNAMIC_DRAW);
}

#[test]
fn test_draw_elements_range_in_bytes() {
    assert_eq!(draw_elements_range(6, 12, IndexType::U16).unwrap(), (12, 12));
    assert_eq!(draw_elements_range(6, 12, IndexType::U32).unwrap(), (12, 24));
    // Offsets past 4 GiB would wrap in 32 bits
    assert!(matches!(
        draw_elements_range(0x4000_0000, 3, IndexType::U32),
        Err(Error::InvalidArgument(msg)) if msg.contains("1073741824+3")
    ));
    assert!(matches!(
        draw_elements_range(0x2000_0000, 3, IndexType::U32),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        draw_elements_range(0, u32::MAX, IndexType::U16),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(
        draw_elements_range(0x1FFF_FFFF, 1, IndexType::U32).unwrap(),
        (1, 0x7FFF_FFFC)
    );
}

#[test]
fn test_min_filter_folds_mipmap_mode() {
    assert_eq!(min_filter_to_gl(Filter::Linear, MipmapMode::None), glow::LINEAR as i32);
    assert_eq!(
        min_filter_to_gl(Filter::Linear, MipmapMode::Linear),
        glow::LINEAR_MIPMAP_LINEAR as i32
    );
    assert_eq!(
        min_filter_to_gl(Filter::Nearest, MipmapMode::Linear),
        glow::NEAREST_MIPMAP_LINEAR as i32
    );
    assert_eq!(
        min_filter_to_gl(Filter::Linear, MipmapMode::Nearest),
        glow::LINEAR_MIPMAP_NEAREST as i32
    );
    assert_eq!(mag_filter_to_gl(Filter::Nearest), glow::NEAREST as i32);
}

#[test]
fn test_address_modes_and_blend_factors() {
    assert_eq!(address_mode_to_gl(AddressMode::ClampToEdge), glow::CLAMP_TO_EDGE as i32);
    assert_eq!(address_mode_to_gl(AddressMode::MirroredRepeat), glow::MIRRORED_REPEAT as i32);
    assert_eq!(blend_factor_to_gl(BlendFactor::SrcAlpha), glow::SRC_ALPHA);
    assert_eq!(blend_factor_to_gl(BlendFactor::OneMinusSrcAlpha), glow::ONE_MINUS_SRC_ALPHA);
    assert_eq!(blend_factor_to_gl(BlendFactor::Zero), glow::ZERO);
}

#[test]
fn test_error_names() {
    assert_eq!(gl_error_name(glow::INVALID_OPERATION), "GL_INVALID_OPERATION");
    assert_eq!(gl_error_name(glow::OUT_OF_MEMORY), "GL_OUT_OF_MEMORY");
    assert_eq!(gl_error_name(0x1234), "unknown GL error");
}

#[test]
fn test_drain_errors_reports_first_error() {
    let mut queue = vec![glow::NO_ERROR, glow::INVALID_VALUE, glow::INVALID_ENUM];
    assert_eq!(drain_errors(|| queue.pop().unwrap()), ErrorDrain::First(glow::INVALID_ENUM));
    assert!(queue.is_empty());

    assert_eq!(drain_errors(|| glow::NO_ERROR), ErrorDrain::Clear);
}

#[test]
fn test_drain_errors_gives_up_on_sticky_error() {
    let mut polls = 0;
    let drained = drain_errors(|| {
        polls += 1;
        glow::CONTEXT_LOST
    });
    assert_eq!(drained, ErrorDrain::Stuck(glow::CONTEXT_LOST));
    assert_eq!(polls, MAX_ERROR_DRAIN);
    assert_eq!(gl_error_name(glow::CONTEXT_LOST), "GL_CONTEXT_LOST");
}
