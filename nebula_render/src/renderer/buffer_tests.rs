//! Unit tests for buffer validation
//!
//! Covers the partial-update bounds rules shared by every backend.

use crate::error::Error;
use crate::renderer::buffer::{validate_buffer_desc, validate_buffer_update, BufferDesc, BufferType, BufferUsage};

// ============================================================================
// DESCRIPTOR VALIDATION
// ============================================================================

#[test]
fn test_zero_size_buffer_rejected() {
    let desc = BufferDesc {
        buffer_type: BufferType::Vertex,
        usage: BufferUsage::DrawStatic,
        size: 0,
    };
    assert!(matches!(validate_buffer_desc(&desc), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_non_zero_size_buffer_accepted() {
    let desc = BufferDesc {
        buffer_type: BufferType::Index,
        usage: BufferUsage::DrawDynamic,
        size: 6,
    };
    assert!(validate_buffer_desc(&desc).is_ok());
}

// ============================================================================
// UPDATE BOUNDS
// ============================================================================

#[test]
fn test_update_full_range() {
    assert_eq!(validate_buffer_update(256, 0, 256, 256).unwrap(), 0..256);
}

#[test]
fn test_update_out_of_bounds() {
    assert!(matches!(
        validate_buffer_update(256, 200, 100, 100),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_update_rejects_negative_offset_and_non_positive_size() {
    assert!(validate_buffer_update(256, -1, 4, 4).is_err());
    assert!(validate_buffer_update(256, 0, 0, 4).is_err());
    assert!(validate_buffer_update(256, 0, -4, 4).is_err());
}

#[test]
fn test_update_rejects_short_data() {
    assert!(validate_buffer_update(256, 0, 16, 8).is_err());
}

#[test]
fn test_update_accepts_longer_data() {
    assert_eq!(validate_buffer_update(256, 8, 8, 64).unwrap(), 8..16);
}

#[test]
fn test_update_boundary_cases() {
    // Last byte
    assert_eq!(validate_buffer_update(256, 255, 1, 1).unwrap(), 255..256);
    // One past the end
    assert!(validate_buffer_update(256, 256, 1, 1).is_err());
    // Huge ranges
    assert!(validate_buffer_update(1000, i64::MAX, i64::MAX, usize::MAX).is_err());
    assert!(validate_buffer_update(1000, 1, i64::MAX, usize::MAX).is_err());
}

#[test]
fn test_update_exhaustive_small_capacity() {
    let capacity = 8u64;
    for offset in -2i64..10 {
        for size in -2i64..10 {
            let result = validate_buffer_update(capacity, offset, size, 16);
            let expected_ok = offset >= 0 && size > 0 && (offset + size) as u64 <= capacity;
            assert_eq!(result.is_ok(), expected_ok, "offset={} size={}", offset, size);
        }
    }
}
