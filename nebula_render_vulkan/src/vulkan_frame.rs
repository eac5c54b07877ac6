/// Frames in flight
///
/// Each slot owns what one frame needs while the GPU may still be reading
/// the previous use of the slot: a command buffer, its fence, the image
/// acquire semaphore and the descriptor pools sampler sets come from.

use ash::vk;
use nebula_render::engine_debug;
use nebula_render::nebula::Result;

use crate::vulkan_context::vk_error;

pub(crate) const FRAMES_IN_FLIGHT: usize = 2;

/// Sets per descriptor pool; a new pool is added when one runs out
const SETS_PER_POOL: u32 = 256;
const SAMPLERS_PER_POOL: u32 = 1024;

pub(crate) struct FrameSlot {
    pub command_buffer: vk::CommandBuffer,
    /// Signalled when the slot's last submission completes
    pub fence: vk::Fence,
    pub image_available: vk::Semaphore,
    /// Renderer serial of the last submission made from this slot
    pub submitted_serial: u64,
    descriptor_pools: Vec<vk::DescriptorPool>,
    active_pool: usize,
}

impl FrameSlot {
    fn new(device: &ash::Device, command_pool: vk::CommandPool) -> Result<Self> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        unsafe {
            let command_buffer = device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| vk_error("nebula::vulkan", "Failed to allocate frame command buffer", e))?[0];

            // Signalled so the first wait on the slot returns immediately
            let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
            let fence = device
                .create_fence(&fence_info, None)
                .map_err(|e| vk_error("nebula::vulkan", "Failed to create frame fence", e))?;

            let image_available = match device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    device.destroy_fence(fence, None);
                    return Err(vk_error("nebula::vulkan", "Failed to create acquire semaphore", e));
                }
            };

            Ok(Self {
                command_buffer,
                fence,
                image_available,
                submitted_serial: 0,
                descriptor_pools: Vec::new(),
                active_pool: 0,
            })
        }
    }

    /// Block until the slot's previous submission has completed
    pub fn wait(&self, device: &ash::Device) -> Result<()> {
        unsafe {
            device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(|e| vk_error("nebula::vulkan", "Failed to wait for frame fence", e))
        }
    }

    /// Recycle every descriptor set handed out since the last reset
    ///
    /// Only valid once `wait` has returned.
    pub fn reset_descriptor_pools(&mut self, device: &ash::Device) -> Result<()> {
        for &pool in &self.descriptor_pools {
            unsafe {
                device
                    .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
                    .map_err(|e| vk_error("nebula::vulkan", "Failed to reset descriptor pool", e))?;
            }
        }
        self.active_pool = 0;
        Ok(())
    }

    /// Allocate one set, growing the pool list when the active pool is full
    pub fn allocate_descriptor_set(
        &mut self,
        device: &ash::Device,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        loop {
            if self.active_pool == self.descriptor_pools.len() {
                self.descriptor_pools.push(create_descriptor_pool(device)?);
                engine_debug!(
                    "nebula::vulkan",
                    "Frame descriptor pools grown to {}",
                    self.descriptor_pools.len()
                );
            }

            let allocate_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(self.descriptor_pools[self.active_pool])
                .set_layouts(&layouts);
            match unsafe { device.allocate_descriptor_sets(&allocate_info) } {
                Ok(sets) => return Ok(sets[0]),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                    self.active_pool += 1;
                }
                Err(e) => {
                    return Err(vk_error("nebula::vulkan", "Failed to allocate descriptor set", e));
                }
            }
        }
    }

    fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            for pool in self.descriptor_pools.drain(..) {
                device.destroy_descriptor_pool(pool, None);
            }
            device.destroy_semaphore(self.image_available, None);
            device.destroy_fence(self.fence, None);
        }
    }
}

fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
    let pool_sizes = [vk::DescriptorPoolSize {
        ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        descriptor_count: SAMPLERS_PER_POOL,
    }];
    let create_info = vk::DescriptorPoolCreateInfo::default()
        .pool_sizes(&pool_sizes)
        .max_sets(SETS_PER_POOL);

    unsafe {
        device
            .create_descriptor_pool(&create_info, None)
            .map_err(|e| vk_error("nebula::vulkan", "Failed to create descriptor pool", e))
    }
}

/// The ring of frame slots and the command pool their buffers come from
pub(crate) struct FrameRing {
    command_pool: vk::CommandPool,
    slots: Vec<FrameSlot>,
    current: usize,
}

impl FrameRing {
    pub fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe {
            device
                .create_command_pool(&pool_info, None)
                .map_err(|e| vk_error("nebula::vulkan", "Failed to create frame command pool", e))?
        };

        let mut ring = Self {
            command_pool,
            slots: Vec::with_capacity(FRAMES_IN_FLIGHT),
            current: 0,
        };
        for _ in 0..FRAMES_IN_FLIGHT {
            match FrameSlot::new(device, command_pool) {
                Ok(slot) => ring.slots.push(slot),
                Err(e) => {
                    ring.destroy(device);
                    return Err(e);
                }
            }
        }
        Ok(ring)
    }

    pub fn current(&self) -> &FrameSlot {
        &self.slots[self.current]
    }

    pub fn current_mut(&mut self) -> &mut FrameSlot {
        &mut self.slots[self.current]
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    /// Destroy every slot and the command pool; the device must be idle
    pub fn destroy(&mut self, device: &ash::Device) {
        for slot in &mut self.slots {
            slot.destroy(device);
        }
        self.slots.clear();
        if self.command_pool != vk::CommandPool::null() {
            unsafe { device.destroy_command_pool(self.command_pool, None) };
            self.command_pool = vk::CommandPool::null();
        }
    }
}
