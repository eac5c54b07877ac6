/// Sampler - Vulkan implementation of the Sampler trait
///
/// One VkSampler per created sampler, built from the resolved descriptor.

use std::rc::Rc;

use ash::vk;
use nebula_render::nebula::render::{Sampler, SamplerDesc};
use nebula_render::nebula::Result;

use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{address_mode_to_vk, filter_to_vk, mipmap_mode_to_vk};

pub struct VulkanSampler {
    ctx: Rc<GpuContext>,
    pub(crate) sampler: vk::Sampler,
    desc: SamplerDesc,
}

/// Create info for a descriptor whose anisotropy is already clamped
pub(crate) fn sampler_create_info(desc: &SamplerDesc) -> vk::SamplerCreateInfo<'static> {
    let (mipmap_mode, max_lod) = mipmap_mode_to_vk(desc.mipmap_mode);
    vk::SamplerCreateInfo::default()
        .mag_filter(filter_to_vk(desc.mag_filter))
        .min_filter(filter_to_vk(desc.min_filter))
        .mipmap_mode(mipmap_mode)
        .address_mode_u(address_mode_to_vk(desc.address_u))
        .address_mode_v(address_mode_to_vk(desc.address_v))
        .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(max_lod)
        .anisotropy_enable(desc.is_anisotropic())
        .max_anisotropy(desc.anisotropy)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
}

impl VulkanSampler {
    pub(crate) fn new(ctx: Rc<GpuContext>, desc: SamplerDesc) -> Result<Self> {
        let create_info = sampler_create_info(&desc);
        let sampler = unsafe {
            ctx.device
                .create_sampler(&create_info, None)
                .map_err(|e| vk_error("nebula::vulkan", "Failed to create sampler", e))?
        };
        Ok(Self { ctx, sampler, desc })
    }
}

impl Sampler for VulkanSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_sampler(self.sampler, None) };
    }
}

#[cfg(test)]
#[path = "vulkan_sampler_tests.rs"]
mod tests;
