/// R2Texture - Vulkan implementation of the R2Texture trait
///
/// Every mip level stays in SHADER_READ_ONLY_OPTIMAL between operations.
/// Uploads and mipmap generation move only the levels they touch and put
/// them back, through the per-level layout tracker.

use std::borrow::Cow;
use std::cell::Cell;
use std::rc::Rc;

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use nebula_render::nebula::render::{
    check_generate_mipmaps, validate_mip_upload, DeviceFeatures, R2Texture, R2TextureInfo,
};
use nebula_render::nebula::{Error, Result};
use nebula_render::{engine_err, engine_trace};

use crate::vulkan_buffer::HostBuffer;
use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{expand_rgb_to_rgba, pixel_format_to_vk, select_texture_format};
use crate::vulkan_layout::MipLayouts;

const READ: vk::ImageLayout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
const DST: vk::ImageLayout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
const SRC: vk::ImageLayout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;

pub struct VulkanR2Texture {
    ctx: Rc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    info: R2TextureInfo,
    format: vk::Format,
    layouts: MipLayouts,
    is_mipmap_available: bool,
    last_used: Cell<u64>,
}

impl VulkanR2Texture {
    /// Create the image and move every level to SHADER_READ_ONLY_OPTIMAL
    ///
    /// `info` has already been validated against the device.
    pub(crate) fn new(ctx: Rc<GpuContext>, info: R2TextureInfo, features: &DeviceFeatures) -> Result<Self> {
        let format = select_texture_format(info.format, |format| ctx.supports_sampled_upload(format))
            .ok_or_else(|| Error::Unsupported(format!("{:?} textures cannot be sampled on this device", info.format)))?;

        let image_create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: info.width,
                height: info.height,
                depth: 1,
            })
            .mip_levels(info.mip_count)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(
                vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::TRANSFER_SRC,
            )
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe {
            ctx.device
                .create_image(&image_create_info, None)
                .map_err(|e| vk_error("nebula::vulkan", "Failed to create texture image", e))?
        };

        let requirements = unsafe { ctx.device.get_image_memory_requirements(image) };
        let allocation = match ctx.allocate("texture", requirements, MemoryLocation::GpuOnly, false) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        // From here on, Drop cleans up whatever has been created
        let mut texture = Self {
            is_mipmap_available: features.is_mipmap_available && ctx.supports_linear_blit(format),
            ctx,
            image,
            view: vk::ImageView::null(),
            allocation: Some(allocation),
            layouts: MipLayouts::new(info.mip_count),
            info,
            format,
            last_used: Cell::new(0),
        };

        let allocation = texture
            .allocation
            .as_ref()
            .ok_or_else(|| engine_err!("nebula::vulkan", "Texture allocation missing"))?;
        unsafe {
            texture
                .ctx
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .map_err(|e| vk_error("nebula::vulkan", "Failed to bind texture image memory", e))?;
        }

        let view_create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: texture.info.mip_count,
                base_array_layer: 0,
                layer_count: 1,
            });
        texture.view = unsafe {
            texture
                .ctx
                .device
                .create_image_view(&view_create_info, None)
                .map_err(|e| vk_error("nebula::vulkan", "Failed to create texture image view", e))?
        };

        let mip_count = texture.info.mip_count;
        texture.transition(|device, command_buffer, image, layouts| {
            layouts.record_transition(device, command_buffer, image, 0..mip_count, READ)
        })?;
        Ok(texture)
    }

    /// Run layout-tracked commands in a one-shot submission
    fn transition(
        &mut self,
        record: impl FnOnce(&ash::Device, vk::CommandBuffer, vk::Image, &mut MipLayouts) -> u32,
    ) -> Result<()> {
        let ctx = Rc::clone(&self.ctx);
        let image = self.image;
        let barriers = self.layouts.stage(|layouts| {
            let mut barriers = 0;
            ctx.one_shot(|command_buffer| {
                barriers = record(&ctx.device, command_buffer, image, layouts);
                Ok(())
            })?;
            Ok(barriers)
        })?;
        ctx.add_layout_barriers(barriers);
        Ok(())
    }

    pub(crate) fn mark_used(&self, serial: u64) {
        self.last_used.set(serial);
    }

    pub(crate) fn last_used(&self) -> u64 {
        self.last_used.get()
    }
}

impl R2Texture for VulkanR2Texture {
    fn info(&self) -> &R2TextureInfo {
        &self.info
    }

    fn update(&mut self, mip_level: u32, data: &[u8]) -> Result<()> {
        validate_mip_upload(&self.info, mip_level, data.len())?;
        // RGB8 stored as RGBA8
        let texels = if self.format == pixel_format_to_vk(self.info.format) {
            Cow::Borrowed(data)
        } else {
            Cow::Owned(expand_rgb_to_rgba(data))
        };
        let staging = HostBuffer::with_data(
            Rc::clone(&self.ctx),
            "texture staging buffer",
            &texels,
            vk::BufferUsageFlags::TRANSFER_SRC,
        )?;
        let (width, height) = self.info.mip_extent(mip_level);

        self.transition(|device, command_buffer, image, layouts| {
            let mut barriers = layouts.record_transition(device, command_buffer, image, mip_level..mip_level + 1, DST);
            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D { width, height, depth: 1 });
            unsafe {
                device.cmd_copy_buffer_to_image(command_buffer, staging.buffer, image, DST, &[region]);
            }
            barriers += layouts.record_transition(device, command_buffer, image, mip_level..mip_level + 1, READ);
            barriers
        })?;
        engine_trace!(
            "nebula::vulkan",
            "Uploaded mip {} ({}x{}, {} bytes) of {:?} texture",
            mip_level,
            width,
            height,
            data.len(),
            self.format
        );
        Ok(())
    }

    fn generate_mipmaps(&mut self) -> Result<()> {
        let features = DeviceFeatures {
            is_mipmap_available: self.is_mipmap_available,
            ..DeviceFeatures::baseline()
        };
        if !check_generate_mipmaps(&self.info, &features)? {
            return Ok(());
        }
        if self.layouts.mip_count() != self.info.mip_count {
            return Err(Error::InvalidState("Texture layout tracker out of sync".to_string()));
        }

        let info = self.info.clone();
        self.transition(|device, command_buffer, image, layouts| {
            let mip_count = info.mip_count;
            let mut barriers = layouts.record_transition(device, command_buffer, image, 0..1, SRC);
            barriers += layouts.record_transition(device, command_buffer, image, 1..mip_count, DST);

            for level in 1..mip_count {
                let (src_w, src_h) = info.mip_extent(level - 1);
                let (dst_w, dst_h) = info.mip_extent(level);
                let blit = vk::ImageBlit::default()
                    .src_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: level - 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .src_offsets([
                        vk::Offset3D { x: 0, y: 0, z: 0 },
                        vk::Offset3D {
                            x: src_w as i32,
                            y: src_h as i32,
                            z: 1,
                        },
                    ])
                    .dst_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: level,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .dst_offsets([
                        vk::Offset3D { x: 0, y: 0, z: 0 },
                        vk::Offset3D {
                            x: dst_w as i32,
                            y: dst_h as i32,
                            z: 1,
                        },
                    ]);
                unsafe {
                    device.cmd_blit_image(command_buffer, image, SRC, image, DST, &[blit], vk::Filter::LINEAR);
                }
                // The level just written feeds the next blit
                barriers += layouts.record_transition(device, command_buffer, image, level..level + 1, SRC);
            }

            barriers + layouts.record_transition(device, command_buffer, image, 0..mip_count, READ)
        })
    }
}

impl Drop for VulkanR2Texture {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
        }
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe { self.ctx.device.destroy_image(self.image, None) };
    }
}
