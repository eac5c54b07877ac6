/// Buffer trait, buffer descriptor and shared bounds validation

use std::ops::Range;

use crate::error::{Error, Result};

/// What the buffer feeds into a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// Element indices (u16 or u32)
    Index,
    /// Per-vertex attribute data
    Vertex,
}

/// Update frequency hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Rewritten every frame
    DrawStreaming,
    /// Written once, drawn many times
    DrawStatic,
    /// Rewritten occasionally
    DrawDynamic,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub buffer_type: BufferType,
    pub usage: BufferUsage,
    /// Capacity in bytes, fixed for the buffer's lifetime
    pub size: u64,
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types (GlBuffer, VulkanBuffer,
/// NullBuffer). The native buffer is released when the value is dropped.
pub trait Buffer {
    fn buffer_type(&self) -> BufferType;

    fn usage(&self) -> BufferUsage;

    /// Capacity in bytes
    fn size(&self) -> u64;

    /// Overwrite `[offset, offset + size)` with the first `size` bytes of `data`
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` when `offset < 0`, `size <= 0`,
    /// `offset + size > capacity`, or `data` holds fewer than `size` bytes.
    fn update(&mut self, offset: i64, size: i64, data: &[u8]) -> Result<()>;
}

/// Reject zero-sized buffers
pub fn validate_buffer_desc(desc: &BufferDesc) -> Result<()> {
    if desc.size == 0 {
        return Err(Error::InvalidArgument(format!(
            "{:?} buffer size must be greater than 0",
            desc.buffer_type
        )));
    }
    Ok(())
}

/// Check a partial update against the buffer capacity
///
/// Returns the byte range to write on success.
pub fn validate_buffer_update(capacity: u64, offset: i64, size: i64, data_len: usize) -> Result<Range<usize>> {
    if offset < 0 {
        return Err(Error::InvalidArgument(format!("Buffer update offset {} is negative", offset)));
    }
    if size <= 0 {
        return Err(Error::InvalidArgument(format!("Buffer update size {} must be greater than 0", size)));
    }
    let end = (offset as u64)
        .checked_add(size as u64)
        .ok_or_else(|| Error::InvalidArgument("Buffer update range overflows".to_string()))?;
    if end > capacity {
        return Err(Error::InvalidArgument(format!(
            "Buffer update [{}, {}) exceeds capacity {}",
            offset, end, capacity
        )));
    }
    if (data_len as u64) < size as u64 {
        return Err(Error::InvalidArgument(format!(
            "Buffer update needs {} bytes but only {} were provided",
            size, data_len
        )));
    }
    Ok(offset as usize..end as usize)
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
