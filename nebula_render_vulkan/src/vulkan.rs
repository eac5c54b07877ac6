/// VulkanRenderer - Vulkan implementation of the Renderer trait
///
/// Frames are recorded lazily: the first command after `present` waits for
/// the frame slot, acquires a swapchain image and opens the clearing render
/// pass. Draws pick a pipeline from the cache keyed by the current draw
/// state. `present` submits the frame and queues the image.
///
/// Updating or destroying a resource the GPU may still read waits for it:
/// a resource used by the frame being recorded flushes that frame first.

use std::ffi::CString;
use std::rc::Rc;

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use nebula_render::nebula::render::*;
use nebula_render::nebula::{Error, Renderer, Result};
use nebula_render::{engine_debug, engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_draw::{
    flipped_scissor, flipped_viewport, record_indexed_draw, CommandBufferRecorder, IndexedDraw, PushConstants,
};
use crate::vulkan_features::build_device_features;
use crate::vulkan_format::{index_type_to_vk, sample_count_to_vk};
use crate::vulkan_frame::FrameRing;
use crate::vulkan_pipeline::{create_graphics_pipeline, PipelineCache, PipelineInputs, PipelineKey};
use crate::vulkan_sampler::VulkanSampler;
use crate::vulkan_shader::{VulkanShader, VulkanShaderStage};
use crate::vulkan_swapchain::{Acquired, Swapchain};
use crate::vulkan_texture::VulkanR2Texture;
use crate::vulkan_vertex_input::VulkanVertexInput;

#[cfg(feature = "vulkan-validation")]
use crate::debug::DebugMessenger;

const SOURCE: &str = "nebula::vulkan";

/// Preference of a physical device type; higher wins
pub(crate) fn device_type_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 3,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
        _ => 0,
    }
}

/// Image a frame is being recorded for
#[derive(Debug, Clone, Copy)]
struct Recording {
    image_index: u32,
    /// Whether a submission already waited on the acquire semaphore
    is_acquire_consumed: bool,
}

// ============================================================================
// BOOTSTRAP
// ============================================================================

/// Instance and device objects created before the renderer exists
///
/// Destroys them in reverse order if initialization fails halfway.
struct Bootstrap {
    instance: ash::Instance,
    #[cfg(feature = "vulkan-validation")]
    debug_messenger: Option<DebugMessenger>,
    surface_loader: ash::khr::surface::Instance,
    /// Null once handed to the swapchain
    surface: vk::SurfaceKHR,
    device: Option<ash::Device>,
    ctx: Option<Rc<GpuContext>>,
    is_armed: bool,
}

impl Drop for Bootstrap {
    fn drop(&mut self) {
        if !self.is_armed {
            return;
        }
        unsafe {
            if let Some(device) = &self.device {
                device.device_wait_idle().ok();
            }
            if let Some(ctx) = self.ctx.take() {
                ctx.release();
            }
            if let Some(device) = self.device.take() {
                device.destroy_device(None);
            }
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
            }
            #[cfg(feature = "vulkan-validation")]
            if let Some(messenger) = &mut self.debug_messenger {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

// ============================================================================
// RENDERER
// ============================================================================

pub struct VulkanRenderer {
    /// Keeps the loader alive for the instance lifetime
    _entry: ash::Entry,
    ctx: Rc<GpuContext>,
    #[cfg(feature = "vulkan-validation")]
    debug_messenger: Option<DebugMessenger>,
    features: DeviceFeatures,
    max_push_constants_size: u32,

    swapchain: Option<Swapchain>,
    frames: FrameRing,

    buffers: ResourceTable<BufferHandle, VulkanBuffer>,
    textures: ResourceTable<R2TextureHandle, VulkanR2Texture>,
    samplers: ResourceTable<SamplerHandle, VulkanSampler>,
    shaders: ResourceTable<ShaderHandle, VulkanShader>,
    shader_stages: ResourceTable<ShaderStageHandle, VulkanShaderStage>,
    vertex_inputs: ResourceTable<VertexInputHandle, VulkanVertexInput>,
    /// Used for texture units without a bound sampler
    default_sampler: Option<VulkanSampler>,
    pipelines: PipelineCache<vk::Pipeline>,

    draw_state: DrawState,
    recording: Option<Recording>,
    /// Serial of the frame being (or next to be) recorded
    serial: u64,
    /// Every submission up to this serial has completed
    completed_serial: u64,

    width: u32,
    height: u32,
    vsync: bool,
    stats: RendererStats,
}

impl VulkanRenderer {
    /// Create a renderer presenting to `window`
    ///
    /// `config.msaa_samples` is rounded down to a supported count and fixed
    /// for the renderer lifetime.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        width: u32,
        height: u32,
        config: &RendererConfig,
    ) -> Result<Self> {
        let entry = unsafe {
            ash::Entry::load().map_err(|e| {
                engine_error!(SOURCE, "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?
        };

        let display_handle = window.display_handle().map_err(|e| {
            engine_error!(SOURCE, "Failed to get display handle: {}", e);
            Error::InitializationFailed(format!("Failed to get display handle: {}", e))
        })?;
        let window_handle = window.window_handle().map_err(|e| {
            engine_error!(SOURCE, "Failed to get window handle: {}", e);
            Error::InitializationFailed(format!("Failed to get window handle: {}", e))
        })?;

        let is_validation_enabled = config.enable_validation && cfg!(feature = "vulkan-validation");
        if config.enable_validation && !is_validation_enabled {
            engine_warn!(SOURCE, "Validation requested but the vulkan-validation feature is off");
        }

        // ----- instance -----
        let app_name = CString::new(config.app_name.as_str()).unwrap_or_default();
        let (major, minor, patch) = config.app_version;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(c"Nebula")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_1);

        let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| vk_error(SOURCE, "Failed to get required surface extensions", e))?
            .to_vec();
        let mut layer_names = Vec::new();
        #[cfg(feature = "vulkan-validation")]
        if is_validation_enabled {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            layer_names.push(crate::debug::VALIDATION_LAYER.as_ptr());
        }

        let instance_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);
        let instance = unsafe {
            entry
                .create_instance(&instance_info, None)
                .map_err(|e| vk_error(SOURCE, "Failed to create Vulkan instance", e))?
        };

        let mut boot = Bootstrap {
            surface_loader: ash::khr::surface::Instance::new(&entry, &instance),
            instance,
            #[cfg(feature = "vulkan-validation")]
            debug_messenger: None,
            surface: vk::SurfaceKHR::null(),
            device: None,
            ctx: None,
            is_armed: true,
        };

        #[cfg(feature = "vulkan-validation")]
        if is_validation_enabled {
            boot.debug_messenger = Some(DebugMessenger::new(&entry, &boot.instance)?);
        }

        boot.surface = unsafe {
            ash_window::create_surface(
                &entry,
                &boot.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| vk_error(SOURCE, "Failed to create window surface", e))?
        };

        // ----- device -----
        let (physical_device, queue_family) = Self::pick_physical_device(&boot)?;
        let (properties, device_features) = unsafe {
            (
                boot.instance.get_physical_device_properties(physical_device),
                boot.instance.get_physical_device_features(physical_device),
            )
        };
        let present_modes = unsafe {
            boot.surface_loader
                .get_physical_device_surface_present_modes(physical_device, boot.surface)
                .map_err(|e| vk_error(SOURCE, "Failed to query present modes", e))?
        };
        let features = build_device_features(
            &properties.limits,
            &device_features,
            &present_modes,
            config.probe_overrides,
        );

        let queue_priorities = [1.0];
        let queue_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities)];
        let device_extensions = [ash::khr::swapchain::NAME.as_ptr()];
        let enabled_features =
            vk::PhysicalDeviceFeatures::default().sampler_anisotropy(features.is_anisotropy_available);
        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&device_extensions)
            .enabled_features(&enabled_features);

        let device = unsafe {
            boot.instance
                .create_device(physical_device, &device_info, None)
                .map_err(|e| vk_error(SOURCE, "Failed to create logical device", e))?
        };
        boot.device = Some(device.clone());
        let graphics_queue = unsafe { device.get_device_queue(queue_family, 0) };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: boot.instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| {
            engine_error!(SOURCE, "Failed to create GPU allocator: {:?}", e);
            Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
        })?;

        let upload_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let upload_command_pool = match unsafe { device.create_command_pool(&upload_pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                drop(allocator);
                return Err(vk_error(SOURCE, "Failed to create upload command pool", e));
            }
        };

        let ctx = Rc::new(GpuContext::new(
            boot.instance.clone(),
            device.clone(),
            physical_device,
            graphics_queue,
            queue_family,
            allocator,
            upload_command_pool,
        ));
        boot.ctx = Some(Rc::clone(&ctx));

        // ----- presentation -----
        let msaa_samples = if features.is_msaa_available {
            config.msaa_samples.clamp(1, features.max_msaa_degree)
        } else {
            1
        };
        let surface = std::mem::replace(&mut boot.surface, vk::SurfaceKHR::null());
        let swapchain = Swapchain::new(
            Rc::clone(&ctx),
            boot.surface_loader.clone(),
            surface,
            width,
            height,
            config.vsync,
            sample_count_to_vk(msaa_samples),
        )?;
        let default_sampler = VulkanSampler::new(Rc::clone(&ctx), SamplerDesc::default().resolved(&features))?;
        let frames = FrameRing::new(&device, queue_family)?;

        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        engine_info!(
            SOURCE,
            "Vulkan renderer on {} (API {}.{}.{}), {} sample(s), vsync {}",
            device_name,
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version),
            msaa_samples,
            if config.vsync { "on" } else { "off" }
        );
        engine_debug!(SOURCE, "Device features: {:?}", features);

        boot.is_armed = false;
        Ok(Self {
            _entry: entry,
            ctx,
            #[cfg(feature = "vulkan-validation")]
            debug_messenger: boot.debug_messenger.take(),
            features,
            max_push_constants_size: properties.limits.max_push_constants_size,
            swapchain: Some(swapchain),
            frames,
            buffers: ResourceTable::new("buffer"),
            textures: ResourceTable::new("texture"),
            samplers: ResourceTable::new("sampler"),
            shaders: ResourceTable::new("shader"),
            shader_stages: ResourceTable::new("shader stage"),
            vertex_inputs: ResourceTable::new("vertex input"),
            default_sampler: Some(default_sampler),
            pipelines: PipelineCache::new(),
            draw_state: DrawState::default(),
            recording: None,
            serial: 1,
            completed_serial: 0,
            width,
            height,
            vsync: config.vsync,
            stats: RendererStats::default(),
        })
    }

    /// Best device with a queue family that draws and presents
    fn pick_physical_device(boot: &Bootstrap) -> Result<(vk::PhysicalDevice, u32)> {
        let physical_devices = unsafe {
            boot.instance
                .enumerate_physical_devices()
                .map_err(|e| vk_error(SOURCE, "Failed to enumerate physical devices", e))?
        };

        physical_devices
            .into_iter()
            .filter_map(|physical_device| unsafe {
                let properties = boot.instance.get_physical_device_properties(physical_device);
                if properties.api_version < vk::API_VERSION_1_1 {
                    return None;
                }
                let families = boot
                    .instance
                    .get_physical_device_queue_family_properties(physical_device);
                let family = (0..families.len() as u32).find(|&i| {
                    families[i as usize].queue_flags.contains(vk::QueueFlags::GRAPHICS)
                        && boot
                            .surface_loader
                            .get_physical_device_surface_support(physical_device, i, boot.surface)
                            .unwrap_or(false)
                })?;
                Some((device_type_score(properties.device_type), physical_device, family))
            })
            .max_by_key(|(score, _, _)| *score)
            .map(|(_, physical_device, family)| (physical_device, family))
            .ok_or_else(|| {
                engine_error!(SOURCE, "No Vulkan 1.1 GPU can present to this window");
                Error::InitializationFailed("No suitable Vulkan GPU found".to_string())
            })
    }

    fn swapchain(&self) -> Result<&Swapchain> {
        self.swapchain
            .as_ref()
            .ok_or_else(|| Error::InvalidState("Swapchain already released".to_string()))
    }

    fn is_suspended(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    // ===== FRAME LIFECYCLE =====

    /// Start recording a frame unless one is open
    ///
    /// Returns the command buffer, or `None` while the window has no area.
    fn begin_frame(&mut self) -> Result<Option<vk::CommandBuffer>> {
        if self.recording.is_some() {
            return Ok(Some(self.frames.current().command_buffer));
        }
        if self.is_suspended() {
            return Ok(None);
        }

        let device = &self.ctx.device;
        let slot = self.frames.current();
        slot.wait(device)?;
        self.completed_serial = self.completed_serial.max(slot.submitted_serial);

        let image_available = slot.image_available;
        let image_index = loop {
            match self.swapchain()?.acquire(image_available)? {
                Acquired::Image(index) => break index,
                Acquired::OutOfDate => {
                    self.rebuild_swapchain()?;
                    if self.is_suspended() {
                        return Ok(None);
                    }
                }
            }
        };

        let device = &self.ctx.device;
        let slot = self.frames.current_mut();
        slot.reset_descriptor_pools(device)?;
        let command_buffer = slot.command_buffer;
        unsafe {
            device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| vk_error(SOURCE, "Failed to reset frame command buffer", e))?;
            let begin_info =
                vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| vk_error(SOURCE, "Failed to begin frame command buffer", e))?;
        }

        self.recording = Some(Recording {
            image_index,
            is_acquire_consumed: false,
        });
        self.begin_render_pass(command_buffer, image_index, false)?;
        Ok(Some(command_buffer))
    }

    fn begin_render_pass(&mut self, command_buffer: vk::CommandBuffer, image_index: u32, resume: bool) -> Result<()> {
        let swapchain = self.swapchain()?;
        let extent = swapchain.extent();
        let mut clear_values = vec![
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        if swapchain.samples() != vk::SampleCountFlags::TYPE_1 {
            clear_values.push(clear_values[0]);
        }
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(swapchain.render_pass(resume))
            .framebuffer(swapchain.framebuffer(image_index))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);
        unsafe {
            self.ctx
                .device
                .cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE)
        };
        self.stats.native_calls += 1;
        Ok(())
    }

    /// Close the render pass and submit what has been recorded
    ///
    /// `is_final` signals the image's render-finished semaphore for present.
    fn submit_recording(&mut self, is_final: bool) -> Result<()> {
        let Some(recording) = self.recording else {
            return Ok(());
        };
        let device = &self.ctx.device;
        let slot = self.frames.current();
        let command_buffer = slot.command_buffer;
        unsafe {
            device.cmd_end_render_pass(command_buffer);
            device
                .end_command_buffer(command_buffer)
                .map_err(|e| vk_error(SOURCE, "Failed to end frame command buffer", e))?;
        }
        self.stats.native_calls += 1;

        let wait_semaphores = [slot.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.swapchain()?.render_finished(recording.image_index)];
        let command_buffers = [command_buffer];
        let mut submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        if !recording.is_acquire_consumed {
            submit_info = submit_info
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages);
        }
        if is_final {
            submit_info = submit_info.signal_semaphores(&signal_semaphores);
        }

        unsafe {
            device
                .reset_fences(&[slot.fence])
                .map_err(|e| vk_error(SOURCE, "Failed to reset frame fence", e))?;
            device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], slot.fence)
                .map_err(|e| vk_error(SOURCE, "Failed to submit frame", e))?;
        }

        self.frames.current_mut().submitted_serial = self.serial;
        self.recording = Some(Recording {
            is_acquire_consumed: true,
            ..recording
        });
        Ok(())
    }

    /// Submit the open frame, wait for it, and reopen it keeping its contents
    fn flush_frame(&mut self) -> Result<()> {
        let Some(recording) = self.recording else {
            return Ok(());
        };
        engine_debug!(SOURCE, "Flushing frame {} for a resource update", self.serial);
        self.submit_recording(false)?;

        let device = &self.ctx.device;
        let slot = self.frames.current();
        slot.wait(device)?;
        self.completed_serial = self.serial;
        self.serial += 1;

        let command_buffer = slot.command_buffer;
        unsafe {
            device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| vk_error(SOURCE, "Failed to reset frame command buffer", e))?;
            let begin_info =
                vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| vk_error(SOURCE, "Failed to begin frame command buffer", e))?;
        }
        self.begin_render_pass(command_buffer, recording.image_index, true)
    }

    /// Wait until nothing submitted or recorded up to `last_used` is pending
    fn ensure_idle_for(&mut self, last_used: u64) -> Result<()> {
        if last_used == 0 || last_used <= self.completed_serial {
            return Ok(());
        }
        if self.recording.is_some() && last_used == self.serial {
            return self.flush_frame();
        }
        self.wait_device_idle()
    }

    fn wait_device_idle(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| vk_error(SOURCE, "Failed to wait for device idle", e))?;
        }
        // The open frame, if any, has not been submitted yet
        self.completed_serial = if self.recording.is_some() {
            self.serial - 1
        } else {
            self.serial
        };
        Ok(())
    }

    /// Submit the open frame without presenting it, then wait for the device
    fn abandon_frame(&mut self) -> Result<()> {
        if self.recording.is_some() {
            self.submit_recording(false)?;
            self.recording = None;
            self.serial += 1;
        }
        self.wait_device_idle()
    }

    /// Recreate the swapchain for the current size and vsync setting
    fn rebuild_swapchain(&mut self) -> Result<()> {
        self.abandon_frame()?;
        if self.is_suspended() {
            return Ok(());
        }
        let (width, height, vsync) = (self.width, self.height, self.vsync);
        let swapchain = self
            .swapchain
            .as_mut()
            .ok_or_else(|| Error::InvalidState("Swapchain already released".to_string()))?;
        if swapchain.recreate(width, height, vsync)? {
            self.destroy_pipelines(|_| true);
            engine_info!(SOURCE, "Surface format changed, pipeline cache cleared");
        }
        Ok(())
    }

    /// Destroy cached pipelines matching `pred`; the device must be idle
    fn destroy_pipelines(&mut self, pred: impl Fn(&PipelineKey) -> bool) {
        for pipeline in self.pipelines.evict(pred) {
            unsafe { self.ctx.device.destroy_pipeline(pipeline, None) };
        }
    }

    // ===== DRAW =====

    fn bind_sampler_set(&mut self, shader_stage: ShaderStageHandle) -> Result<Option<vk::DescriptorSet>> {
        let stage = self.shader_stages.get(shader_stage)?;
        if stage.sampler_units.is_empty() {
            return Ok(None);
        }

        let mut image_infos = Vec::with_capacity(stage.sampler_units.len());
        for &(binding, unit) in &stage.sampler_units {
            let unit_index = unit as usize;
            if unit_index >= MAX_TEXTURE_UNITS {
                return Err(Error::InvalidArgument(format!("Texture unit {} out of range", unit)));
            }
            let texture_handle = self.draw_state.textures[unit_index].ok_or_else(|| {
                Error::InvalidState(format!("No texture bound on unit {} (binding {})", unit, binding))
            })?;
            let texture = self.textures.get(texture_handle)?;
            let sampler = match self.draw_state.samplers[unit_index] {
                Some(handle) => self.samplers.get(handle)?.sampler,
                None => self
                    .default_sampler
                    .as_ref()
                    .map_or(vk::Sampler::null(), |sampler| sampler.sampler),
            };
            texture.mark_used(self.serial);
            image_infos.push((
                binding,
                [vk::DescriptorImageInfo {
                    sampler,
                    image_view: texture.view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                }],
            ));
        }

        let set = self
            .frames
            .current_mut()
            .allocate_descriptor_set(&self.ctx.device, stage.set_layout)?;
        let writes: Vec<vk::WriteDescriptorSet> = image_infos
            .iter()
            .map(|(binding, info)| {
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(info)
            })
            .collect();
        unsafe { self.ctx.device.update_descriptor_sets(&writes, &[]) };
        Ok(Some(set))
    }
}

impl Renderer for VulkanRenderer {
    fn backend_type(&self) -> BackendType {
        BackendType::Vulkan
    }

    fn device_features(&self) -> &DeviceFeatures {
        &self.features
    }

    fn create_buffer(&mut self, desc: BufferDesc) -> Result<BufferHandle> {
        validate_buffer_desc(&desc)?;
        let buffer = VulkanBuffer::new(Rc::clone(&self.ctx), &desc)?;
        Ok(self.buffers.insert(buffer))
    }

    fn create_r2_texture(&mut self, desc: R2TextureDesc) -> Result<R2TextureHandle> {
        let info = validate_r2_texture_desc(&desc, &self.features)?;
        let texture = VulkanR2Texture::new(Rc::clone(&self.ctx), info, &self.features)?;
        Ok(self.textures.insert(texture))
    }

    fn create_sampler(&mut self, desc: SamplerDesc) -> Result<SamplerHandle> {
        let sampler = VulkanSampler::new(Rc::clone(&self.ctx), desc.resolved(&self.features))?;
        Ok(self.samplers.insert(sampler))
    }

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<ShaderHandle> {
        let shader = VulkanShader::new(Rc::clone(&self.ctx), &desc)?;
        Ok(self.shaders.insert(shader))
    }

    fn create_shader_stage(&mut self, desc: ShaderStageDesc) -> Result<ShaderStageHandle> {
        let vertex = self.shaders.get(desc.vertex)?;
        let fragment = self.shaders.get(desc.fragment)?;
        let stage = VulkanShaderStage::new(
            Rc::clone(&self.ctx),
            (desc.vertex, vertex),
            (desc.fragment, fragment),
            self.max_push_constants_size,
        )?;
        let handle = self.shader_stages.insert(stage);
        self.shader_stages.get_mut(handle)?.variable_set().assign_stage(handle);
        Ok(handle)
    }

    fn create_vertex_input(&mut self, desc: VertexInputDesc) -> Result<VertexInputHandle> {
        let buffers = &self.buffers;
        validate_vertex_input_desc(&desc, &self.features, |h| Ok(buffers.get(h)?.buffer_type()))?;
        let vertex_input = VulkanVertexInput::new(Rc::clone(&self.ctx), desc)?;
        Ok(self.vertex_inputs.insert(vertex_input))
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&dyn Buffer> {
        Ok(self.buffers.get(handle)?)
    }

    fn buffer_mut(&mut self, handle: BufferHandle) -> Result<&mut dyn Buffer> {
        let last_used = self.buffers.get(handle)?.last_used();
        self.ensure_idle_for(last_used)?;
        Ok(self.buffers.get_mut(handle)?)
    }

    fn r2_texture(&self, handle: R2TextureHandle) -> Result<&dyn R2Texture> {
        Ok(self.textures.get(handle)?)
    }

    fn r2_texture_mut(&mut self, handle: R2TextureHandle) -> Result<&mut dyn R2Texture> {
        let last_used = self.textures.get(handle)?.last_used();
        self.ensure_idle_for(last_used)?;
        Ok(self.textures.get_mut(handle)?)
    }

    fn sampler(&self, handle: SamplerHandle) -> Result<&dyn Sampler> {
        Ok(self.samplers.get(handle)?)
    }

    fn shader(&self, handle: ShaderHandle) -> Result<&dyn Shader> {
        Ok(self.shaders.get(handle)?)
    }

    fn shader_stage(&self, handle: ShaderStageHandle) -> Result<&dyn ShaderStage> {
        Ok(self.shader_stages.get(handle)?)
    }

    fn vertex_input(&self, handle: VertexInputHandle) -> Result<&dyn VertexInput> {
        Ok(self.vertex_inputs.get(handle)?)
    }

    fn destroy(&mut self, resource: ResourceHandle) -> Result<()> {
        match resource {
            ResourceHandle::Buffer(h) => {
                let last_used = self.buffers.get(h)?.last_used();
                self.ensure_idle_for(last_used)?;
                self.buffers.remove(h).map(drop)
            }
            ResourceHandle::R2Texture(h) => {
                let last_used = self.textures.get(h)?.last_used();
                self.ensure_idle_for(last_used)?;
                self.textures.remove(h).map(drop)
            }
            ResourceHandle::Sampler(h) => {
                self.samplers.get(h)?;
                self.ensure_idle_for(self.serial)?;
                self.samplers.remove(h).map(drop)
            }
            // Modules are shared with the stages built from them
            ResourceHandle::Shader(h) => self.shaders.remove(h).map(drop),
            ResourceHandle::ShaderStage(h) => {
                self.shader_stages.get(h)?;
                self.ensure_idle_for(self.serial)?;
                self.destroy_pipelines(|key| key.shader_stage == h);
                self.shader_stages.remove(h).map(drop)
            }
            ResourceHandle::VertexInput(h) => {
                self.vertex_inputs.get(h)?;
                self.ensure_idle_for(self.serial)?;
                self.destroy_pipelines(|key| key.vertex_input == h);
                self.vertex_inputs.remove(h).map(drop)
            }
        }
    }

    fn submit_commands(&mut self, commands: &mut CommandBuffer) -> Result<()> {
        if !commands.is_enabled() {
            return Ok(());
        }
        self.draw_state.reset();
        let executed = dispatch_commands(commands, self)?;
        self.stats.submissions += 1;
        self.stats.commands_executed += executed as u64;
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        if self.begin_frame()?.is_none() {
            return Ok(());
        }
        let Some(recording) = self.recording else {
            return Ok(());
        };
        self.submit_recording(true)?;

        let needs_rebuild = self
            .swapchain()?
            .present(self.ctx.graphics_queue, recording.image_index)?;
        self.recording = None;
        self.serial += 1;
        self.frames.advance();
        self.stats.frames_presented += 1;

        if needs_rebuild {
            self.rebuild_swapchain()?;
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.width = width;
        self.height = height;
        if self.is_suspended() {
            engine_debug!(SOURCE, "Window has no area, rendering suspended");
            return self.abandon_frame();
        }
        self.rebuild_swapchain()
    }

    fn set_vsync(&mut self, enabled: bool) -> Result<()> {
        if !self.features.is_vsync_available || self.features.is_vsync_requires_restart {
            return Err(Error::Unsupported(
                "The surface offers no present mode without vsync".to_string(),
            ));
        }
        if enabled == self.vsync {
            return Ok(());
        }
        self.vsync = enabled;
        self.rebuild_swapchain()
    }

    fn stats(&self) -> RendererStats {
        RendererStats {
            pipeline_cache_hits: self.pipelines.hits(),
            pipeline_cache_misses: self.pipelines.misses(),
            layout_barriers: self.ctx.layout_barriers(),
            ..self.stats
        }
    }
}

impl CommandExecutor for VulkanRenderer {
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4], depth: f32, _stencil: i32) -> Result<()> {
        let Some(command_buffer) = self.begin_frame()? else {
            return Ok(());
        };
        let extent = self.swapchain()?.extent();

        // D32 has no stencil aspect; stencil clears have nothing to touch
        let mut attachments = Vec::with_capacity(2);
        if flags.contains(ClearFlags::COLOR) {
            attachments.push(vk::ClearAttachment {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                color_attachment: 0,
                clear_value: vk::ClearValue {
                    color: vk::ClearColorValue { float32: color },
                },
            });
        }
        if flags.contains(ClearFlags::DEPTH) {
            attachments.push(vk::ClearAttachment {
                aspect_mask: vk::ImageAspectFlags::DEPTH,
                color_attachment: 0,
                clear_value: vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth, stencil: 0 },
                },
            });
        }
        if attachments.is_empty() {
            return Ok(());
        }

        let area = self.draw_state.effective_scissor(extent.width, extent.height);
        let rect = vk::ClearRect {
            rect: flipped_scissor(area, extent.height),
            base_array_layer: 0,
            layer_count: 1,
        };
        if rect.rect.extent.width == 0 || rect.rect.extent.height == 0 {
            return Ok(());
        }
        unsafe {
            self.ctx
                .device
                .cmd_clear_attachments(command_buffer, &attachments, &[rect])
        };
        self.stats.native_calls += 1;
        Ok(())
    }

    fn set_viewport(&mut self, rect: Rect) -> Result<()> {
        if rect.width < 0
            || rect.height < 0
            || rect.width as u32 > self.features.max_viewport_width
            || rect.height as u32 > self.features.max_viewport_height
        {
            return Err(Error::InvalidArgument(format!("Viewport {:?} out of device range", rect)));
        }
        self.draw_state.viewport = Some(rect);
        Ok(())
    }

    fn enable_scissor(&mut self, enabled: bool) -> Result<()> {
        self.draw_state.is_scissor_enabled = enabled;
        Ok(())
    }

    fn set_scissor_box(&mut self, rect: Rect) -> Result<()> {
        if rect.width < 0 || rect.height < 0 {
            return Err(Error::InvalidArgument(format!("Scissor box {:?} has a negative size", rect)));
        }
        self.draw_state.scissor_box = Some(rect);
        Ok(())
    }

    fn enable_culling(&mut self, enabled: bool) -> Result<()> {
        self.draw_state.is_culling_enabled = enabled;
        Ok(())
    }

    fn enable_depth_test(&mut self, enabled: bool) -> Result<()> {
        self.draw_state.is_depth_test_enabled = enabled;
        Ok(())
    }

    fn enable_depth_write(&mut self, enabled: bool) -> Result<()> {
        self.draw_state.is_depth_write_enabled = enabled;
        Ok(())
    }

    fn enable_blending(&mut self, enabled: bool) -> Result<()> {
        self.draw_state.is_blending_enabled = enabled;
        Ok(())
    }

    fn set_blending_func(&mut self, src: BlendFactor, dst: BlendFactor) -> Result<()> {
        self.draw_state.blend_src = src;
        self.draw_state.blend_dst = dst;
        Ok(())
    }

    fn set_texture(&mut self, unit: u32, texture: Option<R2TextureHandle>) -> Result<()> {
        if let Some(handle) = texture {
            self.textures.get(handle)?;
        }
        self.draw_state.bind_texture(unit, texture, self.features.max_texture_units)
    }

    fn set_sampler(&mut self, unit: u32, sampler: Option<SamplerHandle>) -> Result<()> {
        if let Some(handle) = sampler {
            self.samplers.get(handle)?;
        }
        self.draw_state.bind_sampler(unit, sampler, self.features.max_texture_units)
    }

    fn set_vertex_input(&mut self, vertex_input: Option<VertexInputHandle>) -> Result<()> {
        if let Some(handle) = vertex_input {
            self.vertex_inputs.get(handle)?;
        }
        self.draw_state.vertex_input = vertex_input;
        Ok(())
    }

    fn set_shader_stage(&mut self, shader_stage: Option<ShaderStageHandle>) -> Result<()> {
        if let Some(handle) = shader_stage {
            self.shader_stages.get(handle)?;
        }
        self.draw_state.shader_stage = shader_stage;
        Ok(())
    }

    fn set_uniform(&mut self, shader_stage: ShaderStageHandle, variable: u32, value: UniformValue) -> Result<()> {
        self.shader_stages
            .get_mut(shader_stage)?
            .set_uniform(variable, &value)
    }

    fn draw_indexed(&mut self, first_index: u32, index_count: u32) -> Result<()> {
        let (vertex_input_handle, shader_stage_handle) = self.draw_state.draw_bindings()?;
        self.shader_stages.get(shader_stage_handle)?;
        let desc = self.vertex_inputs.get(vertex_input_handle)?.desc();
        let index_buffer = self.buffers.get(desc.index_buffer)?;
        let needed = (first_index as u64 + index_count as u64) * desc.index_type.size_bytes() as u64;
        if needed > index_buffer.size() {
            return Err(Error::InvalidArgument(format!(
                "draw_indexed reads {} index bytes but the index buffer holds {}",
                needed,
                index_buffer.size()
            )));
        }

        let Some(command_buffer) = self.begin_frame()? else {
            return Ok(());
        };
        let descriptor_set = self.bind_sampler_set(shader_stage_handle)?;

        let swapchain = self.swapchain()?;
        let extent = swapchain.extent();
        let render_pass = swapchain.render_pass(false);
        let samples = swapchain.samples();
        let stage = self.shader_stages.get(shader_stage_handle)?;
        let vertex_input = self.vertex_inputs.get(vertex_input_handle)?;

        let key = PipelineKey::from_draw_state(&self.draw_state, vertex_input_handle, shader_stage_handle);
        let device = &self.ctx.device;
        let pipeline = self.pipelines.get_or_try_insert_with(key, || {
            create_graphics_pipeline(
                device,
                &key,
                &PipelineInputs {
                    vertex_module: stage.vertex_module.module,
                    vertex_entry: &stage.vertex_entry,
                    fragment_module: stage.fragment_module.module,
                    fragment_entry: &stage.fragment_entry,
                    layout: stage.pipeline_layout,
                    vertex_layout: &vertex_input.layout,
                    render_pass,
                    samples,
                },
            )
        })?;

        let desc = vertex_input.desc();
        let index_buffer = self.buffers.get(desc.index_buffer)?;
        index_buffer.mark_used(self.serial);
        let mut vertex_buffers = Vec::with_capacity(vertex_input.layout.buffers.len() + 1);
        for &handle in &vertex_input.layout.buffers {
            let buffer = self.buffers.get(handle)?;
            buffer.mark_used(self.serial);
            vertex_buffers.push(buffer.raw());
        }
        if let Some(constants) = &vertex_input.constant_buffer {
            vertex_buffers.push(constants.buffer);
        }

        let viewport = self.draw_state.viewport_or(extent.width, extent.height);
        let scissor = self.draw_state.effective_scissor(extent.width, extent.height);
        let draw = IndexedDraw {
            pipeline,
            viewport: flipped_viewport(viewport, extent.height),
            scissor: flipped_scissor(scissor, extent.height),
            index_buffer: index_buffer.raw(),
            index_type: index_type_to_vk(desc.index_type),
            vertex_buffers: &vertex_buffers,
            descriptor_set: descriptor_set.map(|set| (stage.pipeline_layout, set)),
            push_constants: (!stage.push_data.is_empty()).then(|| PushConstants {
                layout: stage.pipeline_layout,
                stages: stage.push_constant_stages,
                data: &stage.push_data,
            }),
            first_index,
            index_count,
        };

        let mut recorder = CommandBufferRecorder::new(device, command_buffer);
        record_indexed_draw(&mut recorder, &draw);
        self.stats.native_calls += recorder.calls;
        self.stats.draw_calls += 1;
        Ok(())
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        unsafe { self.ctx.device.device_wait_idle().ok() };

        // 1. Resources and pipelines
        self.destroy_pipelines(|_| true);
        self.vertex_inputs.clear();
        self.shader_stages.clear();
        self.shaders.clear();
        self.samplers.clear();
        self.textures.clear();
        self.buffers.clear();
        self.default_sampler = None;

        // 2. Swapchain, then its surface
        self.swapchain = None;

        // 3. Per-frame objects
        self.frames.destroy(&self.ctx.device);

        // 4. Allocator, then the device
        self.ctx.release();
        unsafe { self.ctx.device.destroy_device(None) };

        // 5. Debug messenger, then the instance
        #[cfg(feature = "vulkan-validation")]
        if let Some(messenger) = &mut self.debug_messenger {
            messenger.destroy();
        }
        unsafe { self.ctx.instance.destroy_instance(None) };
    }
}

#[cfg(test)]
#[path = "vulkan_tests.rs"]
mod tests;
