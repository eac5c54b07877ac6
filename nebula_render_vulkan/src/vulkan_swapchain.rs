/// Swapchain - window surface, presentable images and their attachments
///
/// Owns the surface, the swapchain images and views, a D32 depth buffer,
/// the optional multisampled color buffer, the two render passes frames are
/// recorded in and one framebuffer per image. Recreated on resize and on
/// vsync toggles.

use std::rc::Rc;

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use nebula_render::nebula::{Error, Result};
use nebula_render::{engine_debug, engine_error, engine_info};

use crate::vulkan_context::{vk_error, GpuContext};

pub(crate) const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Preferred number of swapchain images
const DESIRED_IMAGE_COUNT: u32 = 3;

// ===== CHOOSERS =====

/// FIFO when vsync is on; otherwise MAILBOX, then IMMEDIATE, then FIFO
pub(crate) fn choose_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// An 8-bit sRGB format when offered, else the first one
pub(crate) fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|f| {
            (f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB)
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
}

/// Surface-imposed extent, or the window size clamped to the surface limits
pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Triple buffering within the surface limits (`max_image_count` 0 = unbounded)
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = DESIRED_IMAGE_COUNT.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Attachments of the frame render pass
///
/// Single-sampled: `[color, depth]`. Multisampled: `[msaa color, depth,
/// resolve]`, the resolve target being the swapchain image. The `resume`
/// variant loads the previous contents of a frame interrupted by a flush.
pub(crate) fn frame_attachments(
    color_format: vk::Format,
    samples: vk::SampleCountFlags,
    resume: bool,
) -> Vec<vk::AttachmentDescription> {
    let is_multisampled = samples != vk::SampleCountFlags::TYPE_1;
    let (load_op, color_initial, depth_initial, present_initial) = if resume {
        (
            vk::AttachmentLoadOp::LOAD,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        )
    } else {
        (
            vk::AttachmentLoadOp::CLEAR,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::UNDEFINED,
        )
    };

    let depth = vk::AttachmentDescription::default()
        .format(DEPTH_FORMAT)
        .samples(samples)
        .load_op(load_op)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(depth_initial)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    if is_multisampled {
        let color = vk::AttachmentDescription::default()
            .format(color_format)
            .samples(samples)
            .load_op(load_op)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(color_initial)
            .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        // Fully rewritten by the resolve
        let resolve = vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);
        vec![color, depth, resolve]
    } else {
        let color = vk::AttachmentDescription::default()
            .format(color_format)
            .samples(samples)
            .load_op(load_op)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(present_initial)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);
        vec![color, depth]
    }
}

fn create_frame_render_pass(
    device: &ash::Device,
    color_format: vk::Format,
    samples: vk::SampleCountFlags,
    resume: bool,
) -> Result<vk::RenderPass> {
    let attachments = frame_attachments(color_format, samples, resume);

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let resolve_refs = [vk::AttachmentReference {
        attachment: 2,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];

    let mut subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref);
    if attachments.len() == 3 {
        subpass = subpass.resolve_attachments(&resolve_refs);
    }

    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        )
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE);

    let subpasses = [subpass];
    let dependencies = [dependency];
    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe {
        device
            .create_render_pass(&create_info, None)
            .map_err(|e| vk_error("nebula::vulkan::Swapchain", "Failed to create frame render pass", e))
    }
}

// ===== ATTACHMENT IMAGES =====

/// Device-local image used as a depth or multisampled color attachment
struct AttachmentImage {
    ctx: Rc<GpuContext>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
}

impl AttachmentImage {
    fn new(
        ctx: Rc<GpuContext>,
        name: &str,
        format: vk::Format,
        extent: vk::Extent2D,
        samples: vk::SampleCountFlags,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> Result<Self> {
        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe {
            ctx.device
                .create_image(&create_info, None)
                .map_err(|e| vk_error("nebula::vulkan::Swapchain", format!("Failed to create {} image", name), e))?
        };
        let requirements = unsafe { ctx.device.get_image_memory_requirements(image) };
        let allocation = match ctx.allocate(name, requirements, MemoryLocation::GpuOnly, false) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let mut attachment = Self {
            ctx,
            image,
            view: vk::ImageView::null(),
            allocation: None,
        };
        let bound = unsafe {
            attachment
                .ctx
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        };
        attachment.allocation = Some(allocation);
        bound.map_err(|e| vk_error("nebula::vulkan::Swapchain", format!("Failed to bind {} memory", name), e))?;

        attachment.view = create_view(&attachment.ctx.device, image, format, aspect)?;
        Ok(attachment)
    }
}

impl Drop for AttachmentImage {
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

fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    unsafe {
        device
            .create_image_view(&create_info, None)
            .map_err(|e| vk_error("nebula::vulkan::Swapchain", "Failed to create image view", e))
    }
}

// ===== SWAPCHAIN =====

/// Result of acquiring the next presentable image
pub(crate) enum Acquired {
    Image(u32),
    /// The swapchain no longer matches the surface and must be recreated
    OutOfDate,
}

pub(crate) struct Swapchain {
    ctx: Rc<GpuContext>,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,

    format: vk::Format,
    extent: vk::Extent2D,
    samples: vk::SampleCountFlags,
    present_mode: vk::PresentModeKHR,

    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    depth: Option<AttachmentImage>,
    msaa_color: Option<AttachmentImage>,

    /// Clears every attachment; starts a frame
    render_pass_clear: vk::RenderPass,
    /// Keeps attachment contents; resumes a flushed frame
    render_pass_resume: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    /// One per image, signalled by the frame submission and waited by present
    render_finished: Vec<vk::Semaphore>,
}

impl Swapchain {
    /// Build a swapchain for `surface`, taking ownership of the surface
    pub fn new(
        ctx: Rc<GpuContext>,
        surface_loader: ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        vsync: bool,
        samples: vk::SampleCountFlags,
    ) -> Result<Self> {
        let loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);
        let mut swapchain = Self {
            ctx,
            surface_loader,
            surface,
            loader,
            swapchain: vk::SwapchainKHR::null(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D { width, height },
            samples,
            present_mode: vk::PresentModeKHR::FIFO,
            images: Vec::new(),
            views: Vec::new(),
            depth: None,
            msaa_color: None,
            render_pass_clear: vk::RenderPass::null(),
            render_pass_resume: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            render_finished: Vec::new(),
        };
        // On failure, Drop releases whatever was built
        swapchain.build(width, height, vsync)?;
        engine_info!(
            "nebula::vulkan::Swapchain",
            "Swapchain {}x{} {:?}, {} images, {:?}, {} sample(s)",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.format,
            swapchain.images.len(),
            swapchain.present_mode,
            samples.as_raw()
        );
        Ok(swapchain)
    }

    /// Present modes the surface supports
    pub fn supported_present_modes(&self) -> Result<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(self.ctx.physical_device, self.surface)
                .map_err(|e| vk_error("nebula::vulkan::Swapchain", "Failed to query present modes", e))
        }
    }

    /// Rebuild for a new size or present mode
    ///
    /// The device must be idle. Returns whether the color format changed,
    /// in which case pipelines built for the old render passes are stale.
    pub fn recreate(&mut self, width: u32, height: u32, vsync: bool) -> Result<bool> {
        let old_format = self.format;
        self.release_images();
        self.build(width, height, vsync)?;
        engine_debug!(
            "nebula::vulkan::Swapchain",
            "Swapchain recreated: {}x{} {:?}",
            self.extent.width,
            self.extent.height,
            self.present_mode
        );
        Ok(old_format != self.format)
    }

    fn build(&mut self, width: u32, height: u32, vsync: bool) -> Result<()> {
        let physical_device = self.ctx.physical_device;
        let (capabilities, formats, present_modes) = unsafe {
            let capabilities = self
                .surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
                .map_err(|e| vk_error("nebula::vulkan::Swapchain", "Failed to get surface capabilities", e))?;
            let formats = self
                .surface_loader
                .get_physical_device_surface_formats(physical_device, self.surface)
                .map_err(|e| vk_error("nebula::vulkan::Swapchain", "Failed to query surface formats", e))?;
            (capabilities, formats, self.supported_present_modes()?)
        };

        let surface_format = choose_surface_format(&formats).ok_or_else(|| {
            engine_error!("nebula::vulkan::Swapchain", "Surface reports no formats");
            Error::InitializationFailed("Surface reports no formats".to_string())
        })?;
        let extent = choose_extent(&capabilities, width, height);
        let present_mode = choose_present_mode(&present_modes, vsync);

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(choose_image_count(&capabilities))
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe {
            self.loader
                .create_swapchain(&create_info, None)
                .map_err(|e| vk_error("nebula::vulkan::Swapchain", "Failed to create swapchain", e))?
        };
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;
        self.extent = extent;
        self.present_mode = present_mode;

        if surface_format.format != self.format {
            self.destroy_render_passes();
            self.format = surface_format.format;
            self.render_pass_clear = create_frame_render_pass(&self.ctx.device, self.format, self.samples, false)?;
            self.render_pass_resume = create_frame_render_pass(&self.ctx.device, self.format, self.samples, true)?;
        }

        self.images = unsafe {
            self.loader
                .get_swapchain_images(swapchain)
                .map_err(|e| vk_error("nebula::vulkan::Swapchain", "Failed to get swapchain images", e))?
        };
        for &image in &self.images {
            let view = create_view(&self.ctx.device, image, self.format, vk::ImageAspectFlags::COLOR)?;
            self.views.push(view);
        }

        self.depth = Some(AttachmentImage::new(
            Rc::clone(&self.ctx),
            "depth buffer",
            DEPTH_FORMAT,
            extent,
            self.samples,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )?);
        if self.samples != vk::SampleCountFlags::TYPE_1 {
            self.msaa_color = Some(AttachmentImage::new(
                Rc::clone(&self.ctx),
                "multisampled color buffer",
                self.format,
                extent,
                self.samples,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
                vk::ImageAspectFlags::COLOR,
            )?);
        }

        for i in 0..self.views.len() {
            let attachments = self.framebuffer_attachments(i);
            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.render_pass_clear)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe {
                self.ctx
                    .device
                    .create_framebuffer(&create_info, None)
                    .map_err(|e| vk_error("nebula::vulkan::Swapchain", "Failed to create framebuffer", e))?
            };
            self.framebuffers.push(framebuffer);

            let semaphore = unsafe {
                self.ctx
                    .device
                    .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                    .map_err(|e| vk_error("nebula::vulkan::Swapchain", "Failed to create semaphore", e))?
            };
            self.render_finished.push(semaphore);
        }
        Ok(())
    }

    fn framebuffer_attachments(&self, image_index: usize) -> Vec<vk::ImageView> {
        let depth = self.depth.as_ref().map_or(vk::ImageView::null(), |d| d.view);
        match &self.msaa_color {
            Some(color) => vec![color.view, depth, self.views[image_index]],
            None => vec![self.views[image_index], depth],
        }
    }

    /// Destroy everything tied to the current images, keeping the swapchain
    /// handle for `old_swapchain` and the render passes
    fn release_images(&mut self) {
        let device = &self.ctx.device;
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                device.destroy_framebuffer(framebuffer, None);
            }
            for semaphore in self.render_finished.drain(..) {
                device.destroy_semaphore(semaphore, None);
            }
            for view in self.views.drain(..) {
                device.destroy_image_view(view, None);
            }
        }
        self.images.clear();
        self.depth = None;
        self.msaa_color = None;
    }

    fn destroy_render_passes(&mut self) {
        unsafe {
            for pass in [self.render_pass_clear, self.render_pass_resume] {
                if pass != vk::RenderPass::null() {
                    self.ctx.device.destroy_render_pass(pass, None);
                }
            }
        }
        self.render_pass_clear = vk::RenderPass::null();
        self.render_pass_resume = vk::RenderPass::null();
    }

    // ===== FRAME =====

    pub fn acquire(&self, image_available: vk::Semaphore) -> Result<Acquired> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, image_available, vk::Fence::null())
        };
        match result {
            // A suboptimal image is still presentable; present reports it
            Ok((index, _)) => Ok(Acquired::Image(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquired::OutOfDate),
            Err(e) => Err(vk_error("nebula::vulkan::Swapchain", "Failed to acquire swapchain image", e)),
        }
    }

    /// Queue `image_index` for presentation
    ///
    /// Returns `true` when the swapchain should be recreated.
    pub fn present(&self, queue: vk::Queue, image_index: u32) -> Result<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [self.render_finished[image_index as usize]];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(is_suboptimal) => Ok(is_suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(vk_error("nebula::vulkan::Swapchain", "Failed to present swapchain image", e)),
        }
    }

    // ===== ACCESSORS =====

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    /// Render pass used to start (`resume == false`) or continue a frame
    pub fn render_pass(&self, resume: bool) -> vk::RenderPass {
        if resume {
            self.render_pass_resume
        } else {
            self.render_pass_clear
        }
    }

    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    pub fn render_finished(&self, image_index: u32) -> vk::Semaphore {
        self.render_finished[image_index as usize]
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.release_images();
        self.destroy_render_passes();
        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
