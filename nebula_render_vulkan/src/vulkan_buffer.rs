/// Buffer - Vulkan implementation of the Buffer trait

use std::cell::Cell;
use std::rc::Rc;

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use nebula_render::engine_err;
use nebula_render::nebula::render::{validate_buffer_update, Buffer, BufferDesc, BufferType, BufferUsage};
use nebula_render::nebula::Result;

use crate::vulkan_context::GpuContext;

/// Host-visible, persistently mapped buffer
///
/// Backs vertex/index buffers, staging uploads and constant attributes.
pub(crate) struct HostBuffer {
    ctx: Rc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
}

impl HostBuffer {
    pub fn new(ctx: Rc<GpuContext>, name: &str, size: u64, usage: vk::BufferUsageFlags) -> Result<Self> {
        let (buffer, allocation) = ctx.create_buffer(name, size, usage, MemoryLocation::CpuToGpu)?;
        Ok(Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
        })
    }

    /// Buffer initialized with `data`
    pub fn with_data(ctx: Rc<GpuContext>, name: &str, data: &[u8], usage: vk::BufferUsageFlags) -> Result<Self> {
        let mut buffer = Self::new(ctx, name, data.len() as u64, usage)?;
        buffer.write(0, data)?;
        Ok(buffer)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Copy `data` into the mapped memory at `offset`
    ///
    /// Bounds are the caller's responsibility; out-of-range writes fail.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let mapped = self
            .allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or_else(|| engine_err!("nebula::vulkan", "Buffer memory is not CPU-accessible"))?;
        let target = mapped
            .get_mut(offset..offset + data.len())
            .ok_or_else(|| engine_err!("nebula::vulkan", "Write of {} bytes at {} exceeds mapped range", data.len(), offset))?;
        target.copy_from_slice(data);
        Ok(())
    }
}

impl Drop for HostBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe { self.ctx.device.destroy_buffer(self.buffer, None) };
    }
}

/// Vertex or index buffer
pub struct VulkanBuffer {
    buffer_type: BufferType,
    usage: BufferUsage,
    host: HostBuffer,
    /// Frame serial of the last recorded draw reading this buffer
    last_used: Cell<u64>,
}

impl VulkanBuffer {
    pub(crate) fn new(ctx: Rc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        let usage = match desc.buffer_type {
            BufferType::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferType::Index => vk::BufferUsageFlags::INDEX_BUFFER,
        };
        let name = match desc.buffer_type {
            BufferType::Vertex => "vertex buffer",
            BufferType::Index => "index buffer",
        };
        Ok(Self {
            buffer_type: desc.buffer_type,
            usage: desc.usage,
            host: HostBuffer::new(ctx, name, desc.size, usage)?,
            last_used: Cell::new(0),
        })
    }

    pub(crate) fn raw(&self) -> vk::Buffer {
        self.host.buffer
    }

    pub(crate) fn mark_used(&self, serial: u64) {
        self.last_used.set(serial);
    }

    pub(crate) fn last_used(&self) -> u64 {
        self.last_used.get()
    }
}

impl Buffer for VulkanBuffer {
    fn buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn size(&self) -> u64 {
        self.host.size()
    }

    fn update(&mut self, offset: i64, size: i64, data: &[u8]) -> Result<()> {
        let range = validate_buffer_update(self.size(), offset, size, data.len())?;
        let len = range.len();
        self.host.write(range.start, &data[..len])
    }
}
