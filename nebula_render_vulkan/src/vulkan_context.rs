/// GpuContext - device-level objects shared by every Vulkan resource
///
/// Resources hold an `Rc<GpuContext>` so they can free their memory and
/// native handles on drop. The renderer owns the instance and device
/// lifetimes and calls `release` before destroying the device.

use std::cell::{Cell, RefCell};

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use nebula_render::nebula::{Error, NativeError, Result};
use nebula_render::{engine_err, engine_error};

/// Log a failed Vulkan call and convert its result code
///
/// Memory exhaustion becomes `Error::OutOfMemory`; every other code is kept
/// as a native cause so callers can inspect it.
pub(crate) fn vk_error(source: &str, context: impl Into<String>, result: vk::Result) -> Error {
    let context = context.into();
    engine_error!(source, "{}: {:?}", context, result);
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => Error::OutOfMemory,
        _ => Error::native(
            context,
            NativeError::new("Vulkan", result.as_raw() as i64, format!("{:?}", result)),
        ),
    }
}

pub(crate) struct GpuContext {
    pub instance: ash::Instance,
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    /// `None` once released
    allocator: RefCell<Option<Allocator>>,
    /// Pool for one-shot upload submissions
    upload_command_pool: Cell<vk::CommandPool>,
    /// Layout-transition barriers recorded so far, reported in renderer stats
    layout_barriers: Cell<u64>,
}

impl GpuContext {
    pub fn new(
        instance: ash::Instance,
        device: ash::Device,
        physical_device: vk::PhysicalDevice,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        allocator: Allocator,
        upload_command_pool: vk::CommandPool,
    ) -> Self {
        Self {
            instance,
            device,
            physical_device,
            graphics_queue,
            graphics_queue_family,
            allocator: RefCell::new(Some(allocator)),
            upload_command_pool: Cell::new(upload_command_pool),
            layout_barriers: Cell::new(0),
        }
    }

    // ===== MEMORY =====

    pub fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let mut allocator = self.allocator.borrow_mut();
        let allocator = allocator
            .as_mut()
            .ok_or_else(|| engine_err!("nebula::vulkan", "Allocation of {} after device release", name))?;
        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!(
                    "nebula::vulkan",
                    "Out of GPU memory for {} (required: {:.2} MB): {}",
                    name,
                    size_mb,
                    e
                );
                Error::OutOfMemory
            })
    }

    pub fn free(&self, allocation: Allocation) {
        if let Some(allocator) = self.allocator.borrow_mut().as_mut() {
            if let Err(e) = allocator.free(allocation) {
                engine_error!("nebula::vulkan", "Failed to free GPU allocation: {}", e);
            }
        }
    }

    /// Create a buffer and bind fresh memory to it
    pub fn create_buffer(
        &self,
        name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<(vk::Buffer, Allocation)> {
        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            self.device
                .create_buffer(&create_info, None)
                .map_err(|e| vk_error("nebula::vulkan", format!("Failed to create {} of {} bytes", name, size), e))?
        };

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let allocation = match self.allocate(name, requirements, location, true) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let bound = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        if let Err(e) = bound {
            self.free(allocation);
            unsafe { self.device.destroy_buffer(buffer, None) };
            return Err(vk_error("nebula::vulkan", format!("Failed to bind {} memory", name), e));
        }
        Ok((buffer, allocation))
    }

    // ===== ONE-SHOT SUBMISSIONS =====

    /// Record commands into a transient command buffer, submit and wait
    ///
    /// Used for uploads and mipmap generation outside of frame recording.
    pub fn one_shot(&self, record: impl FnOnce(vk::CommandBuffer) -> Result<()>) -> Result<()> {
        let pool = self.upload_command_pool.get();
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = unsafe {
            self.device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| vk_error("nebula::vulkan", "Failed to allocate upload command buffer", e))?[0]
        };

        let result = self.record_and_wait(command_buffer, record);
        unsafe { self.device.free_command_buffers(pool, &[command_buffer]) };
        result
    }

    fn record_and_wait(
        &self,
        command_buffer: vk::CommandBuffer,
        record: impl FnOnce(vk::CommandBuffer) -> Result<()>,
    ) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| vk_error("nebula::vulkan", "Failed to begin upload command buffer", e))?;
        }

        record(command_buffer)?;

        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(|e| vk_error("nebula::vulkan", "Failed to end upload command buffer", e))?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            self.device
                .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
                .map_err(|e| vk_error("nebula::vulkan", "Failed to submit upload commands", e))?;
            self.device
                .queue_wait_idle(self.graphics_queue)
                .map_err(|e| vk_error("nebula::vulkan", "Failed to wait for upload completion", e))?;
        }
        Ok(())
    }

    // ===== QUERIES =====

    /// Whether an optimal-tiling image of `format` can be sampled and uploaded to
    pub fn supports_sampled_upload(&self, format: vk::Format) -> bool {
        let properties = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        };
        properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE | vk::FormatFeatureFlags::TRANSFER_DST)
    }

    /// Whether `format` can be the source and destination of a linear blit
    pub fn supports_linear_blit(&self, format: vk::Format) -> bool {
        let properties = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        };
        properties.optimal_tiling_features.contains(
            vk::FormatFeatureFlags::BLIT_SRC
                | vk::FormatFeatureFlags::BLIT_DST
                | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
        )
    }

    pub fn add_layout_barriers(&self, count: u32) {
        self.layout_barriers.set(self.layout_barriers.get() + count as u64);
    }

    pub fn layout_barriers(&self) -> u64 {
        self.layout_barriers.get()
    }

    /// Destroy the upload pool and drop the allocator
    ///
    /// Must run after every resource has been dropped and before the device
    /// is destroyed. Later frees become no-ops.
    pub fn release(&self) {
        let pool = self.upload_command_pool.replace(vk::CommandPool::null());
        if pool != vk::CommandPool::null() {
            unsafe { self.device.destroy_command_pool(pool, None) };
        }
        drop(self.allocator.borrow_mut().take());
    }
}

#[cfg(test)]
#[path = "vulkan_context_tests.rs"]
mod tests;
