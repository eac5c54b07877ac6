/// GlRenderer - OpenGL implementation of the Renderer trait
///
/// The context comes current from the window collaborator. Capabilities are
/// probed once at creation; everything after that runs through the shared
/// `GlContext`, whose state cache filters redundant binds and enables.
///
/// Draw state is applied lazily: commands only update the per-submission
/// `DrawState`, and each clear or draw pushes the parts it depends on.

use std::rc::Rc;

use glow::HasContext;
use nebula_render::nebula::render::*;
use nebula_render::nebula::{Error, Renderer, Result};
use nebula_render::{engine_err, engine_info, engine_warn};

use crate::gl_buffer::GlBuffer;
use crate::gl_context::GlContext;
use crate::gl_format::{blend_factor_to_gl, draw_elements_range, index_type_to_gl};
use crate::gl_probe::{GlFeatureProber, GlProbeReport, LiveProbe};
use crate::gl_sampler::GlSampler;
use crate::gl_shader::{GlShader, GlShaderStage};
use crate::gl_state::Capability;
use crate::gl_texture::GlR2Texture;
use crate::gl_vertex_input::GlVertexInput;
use crate::gl_window::GlWindow;

const SOURCE: &str = "nebula::gl";

pub struct GlRenderer {
    ctx: Rc<GlContext>,
    report: GlProbeReport,
    buffers: ResourceTable<BufferHandle, GlBuffer>,
    textures: ResourceTable<R2TextureHandle, GlR2Texture>,
    samplers: ResourceTable<SamplerHandle, GlSampler>,
    shaders: ResourceTable<ShaderHandle, GlShader>,
    shader_stages: ResourceTable<ShaderStageHandle, GlShaderStage>,
    vertex_inputs: ResourceTable<VertexInputHandle, GlVertexInput>,
    /// Used on units with a texture but no sampler
    default_sampler: Option<GlSampler>,
    draw_state: DrawState,
    width: u32,
    height: u32,
    vsync: bool,
    stats: RendererStats,
    /// Owns the GL context; dropped last
    window: Box<dyn GlWindow>,
}

impl GlRenderer {
    /// Probe the current context of `window` and set up the renderer
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` when the driver lacks an essential entry
    /// point.
    pub fn new<W: GlWindow + 'static>(window: W, width: u32, height: u32, config: &RendererConfig) -> Result<Self> {
        // SAFETY: the window guarantees its context is current on this thread
        let gl = unsafe { glow::Context::from_loader_function(|name| window.get_proc_address(name)) };
        let report = GlFeatureProber::new(config.probe_overrides).probe(&LiveProbe {
            gl: &gl,
            window: &window,
        })?;
        let features = report.features.clone();
        let ctx = Rc::new(GlContext::new(gl, &report, |name| window.get_proc_address(name))?);

        unsafe {
            ctx.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            ctx.gl.depth_func(glow::LESS);
            ctx.gl.cull_face(glow::BACK);
            ctx.gl.front_face(glow::CCW);
        }
        ctx.count(4);

        if config.msaa_samples > 1 {
            if features.is_msaa_available && config.msaa_samples <= features.max_msaa_degree {
                if !report.version.is_embedded {
                    unsafe { ctx.gl.enable(glow::MULTISAMPLE) };
                    ctx.count(1);
                }
            } else {
                engine_warn!(
                    SOURCE,
                    "{}x MSAA requested but the device offers at most {}x",
                    config.msaa_samples,
                    features.max_msaa_degree
                );
            }
        }

        // Probing leaves the interval at 1 when it could be set
        let vsync = if features.is_vsync_available {
            window.set_swap_interval(config.vsync as u32);
            config.vsync
        } else {
            if features.is_vsync_requires_restart {
                engine_warn!(SOURCE, "Swap interval is fixed by the context, vsync setting ignored");
            }
            window.set_swap_interval(1)
        };

        let default_sampler = if features.is_sampler_available {
            Some(GlSampler::new(Rc::clone(&ctx), SamplerDesc::default().resolved(&features))?)
        } else {
            None
        };
        ctx.check_error("Renderer initialization")?;

        engine_info!(
            SOURCE,
            "OpenGL renderer created for '{}' ({}x{}, vsync {})",
            config.app_name,
            width,
            height,
            vsync
        );

        Ok(Self {
            ctx,
            report,
            buffers: ResourceTable::new("buffer"),
            textures: ResourceTable::new("texture"),
            samplers: ResourceTable::new("sampler"),
            shaders: ResourceTable::new("shader"),
            shader_stages: ResourceTable::new("shader stage"),
            vertex_inputs: ResourceTable::new("vertex input"),
            default_sampler,
            draw_state: DrawState::default(),
            width,
            height,
            vsync,
            stats: RendererStats::default(),
            window: Box::new(window),
        })
    }

    /// Everything capability probing found out
    pub fn probe_report(&self) -> &GlProbeReport {
        &self.report
    }

    pub fn is_vsync_enabled(&self) -> bool {
        self.vsync
    }

    fn apply_scissor(&self) {
        match (self.draw_state.is_scissor_enabled, self.draw_state.scissor_box) {
            (true, Some(rect)) => {
                self.ctx.set_capability(Capability::ScissorTest, true);
                self.ctx.scissor(rect);
            }
            _ => self.ctx.set_capability(Capability::ScissorTest, false),
        }
    }

    fn apply_draw_state(&self) {
        let state = &self.draw_state;
        self.ctx.viewport(state.viewport_or(self.width, self.height));
        self.apply_scissor();
        self.ctx.set_capability(Capability::CullFace, state.is_culling_enabled);
        self.ctx.set_capability(Capability::DepthTest, state.is_depth_test_enabled);
        self.ctx.depth_mask(state.is_depth_write_enabled);
        self.ctx.set_capability(Capability::Blend, state.is_blending_enabled);
        if state.is_blending_enabled {
            self.ctx
                .blend_func(blend_factor_to_gl(state.blend_src), blend_factor_to_gl(state.blend_dst));
        }
    }

    /// Bind every unit's texture and sampler for the next draw
    fn bind_texture_units(&self) -> Result<()> {
        let default_desc = SamplerDesc::default().resolved(&self.ctx.features);
        for unit in 0..self.ctx.features.max_texture_units {
            let slot = unit as usize;
            let texture = match self.draw_state.textures[slot] {
                Some(handle) => Some(self.textures.get(handle)?),
                None => None,
            };
            let sampler = match self.draw_state.samplers[slot] {
                Some(handle) => Some(self.samplers.get(handle)?),
                None => None,
            };
            self.ctx.bind_texture(unit, texture.map(|t| t.raw));

            if self.ctx.features.is_sampler_available {
                let raw = sampler
                    .or(self.default_sampler.as_ref())
                    .and_then(|s| s.raw);
                self.ctx.bind_sampler(unit, raw);
            } else if let Some(texture) = texture {
                self.ctx.select_unit(unit);
                texture.apply_sampler(sampler.map_or(&default_desc, |s| s.desc()));
            }
        }
        Ok(())
    }
}

impl Renderer for GlRenderer {
    fn backend_type(&self) -> BackendType {
        BackendType::OpenGl
    }

    fn device_features(&self) -> &DeviceFeatures {
        &self.ctx.features
    }

    fn create_buffer(&mut self, desc: BufferDesc) -> Result<BufferHandle> {
        validate_buffer_desc(&desc)?;
        let buffer = GlBuffer::new(Rc::clone(&self.ctx), &desc)?;
        Ok(self.buffers.insert(buffer))
    }

    fn create_r2_texture(&mut self, desc: R2TextureDesc) -> Result<R2TextureHandle> {
        let info = validate_r2_texture_desc(&desc, &self.ctx.features)?;
        let texture = GlR2Texture::new(Rc::clone(&self.ctx), info)?;
        Ok(self.textures.insert(texture))
    }

    fn create_sampler(&mut self, desc: SamplerDesc) -> Result<SamplerHandle> {
        let sampler = GlSampler::new(Rc::clone(&self.ctx), desc.resolved(&self.ctx.features))?;
        Ok(self.samplers.insert(sampler))
    }

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<ShaderHandle> {
        let shader = GlShader::new(Rc::clone(&self.ctx), &desc)?;
        Ok(self.shaders.insert(shader))
    }

    fn create_shader_stage(&mut self, desc: ShaderStageDesc) -> Result<ShaderStageHandle> {
        let vertex = self.shaders.get(desc.vertex)?;
        let fragment = self.shaders.get(desc.fragment)?;
        validate_shader_pair(vertex.shader_type(), fragment.shader_type())?;
        let stage = GlShaderStage::link(
            Rc::clone(&self.ctx),
            (desc.vertex, vertex),
            (desc.fragment, fragment),
        )?;
        let handle = self.shader_stages.insert(stage);
        self.shader_stages.get_mut(handle)?.assign_stage(handle);
        Ok(handle)
    }

    fn create_vertex_input(&mut self, desc: VertexInputDesc) -> Result<VertexInputHandle> {
        let buffers = &self.buffers;
        validate_vertex_input_desc(&desc, &self.ctx.features, |h| Ok(buffers.get(h)?.buffer_type()))?;
        let vertex_input = GlVertexInput::new(Rc::clone(&self.ctx), desc, |h| Ok(buffers.get(h)?.raw))?;
        Ok(self.vertex_inputs.insert(vertex_input))
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&dyn Buffer> {
        Ok(self.buffers.get(handle)?)
    }

    fn buffer_mut(&mut self, handle: BufferHandle) -> Result<&mut dyn Buffer> {
        Ok(self.buffers.get_mut(handle)?)
    }

    fn r2_texture(&self, handle: R2TextureHandle) -> Result<&dyn R2Texture> {
        Ok(self.textures.get(handle)?)
    }

    fn r2_texture_mut(&mut self, handle: R2TextureHandle) -> Result<&mut dyn R2Texture> {
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
            ResourceHandle::Buffer(h) => self.buffers.remove(h).map(drop),
            ResourceHandle::R2Texture(h) => self.textures.remove(h).map(drop),
            ResourceHandle::Sampler(h) => self.samplers.remove(h).map(drop),
            // Linked programs keep working without their shader objects
            ResourceHandle::Shader(h) => self.shaders.remove(h).map(drop),
            ResourceHandle::ShaderStage(h) => self.shader_stages.remove(h).map(drop),
            ResourceHandle::VertexInput(h) => self.vertex_inputs.remove(h).map(drop),
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
        self.window.swap_buffers()?;
        self.ctx.count(1);
        self.stats.frames_presented += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        self.window.resize(width, height);
        Ok(())
    }

    fn set_vsync(&mut self, enabled: bool) -> Result<()> {
        let features = &self.ctx.features;
        if !features.is_vsync_available || features.is_vsync_requires_restart {
            return Err(Error::Unsupported(
                "The swap interval cannot be changed on this context".to_string(),
            ));
        }
        if !self.window.set_swap_interval(enabled as u32) {
            return Err(engine_err!(SOURCE, "Window refused swap interval {}", enabled as u32));
        }
        self.ctx.count(1);
        self.vsync = enabled;
        Ok(())
    }

    fn stats(&self) -> RendererStats {
        RendererStats {
            native_calls: self.ctx.native_calls(),
            ..self.stats
        }
    }
}

impl CommandExecutor for GlRenderer {
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4], depth: f32, stencil: i32) -> Result<()> {
        let mut mask = 0;
        let gl = &self.ctx.gl;
        if flags.contains(ClearFlags::COLOR) {
            unsafe { gl.clear_color(color[0], color[1], color[2], color[3]) };
            self.ctx.count(1);
            mask |= glow::COLOR_BUFFER_BIT;
        }
        if flags.contains(ClearFlags::DEPTH) {
            // Depth clears honour the depth mask
            self.ctx.depth_mask(true);
            unsafe {
                if self.ctx.version.is_embedded || self.ctx.version.at_least(4, 1) {
                    gl.clear_depth_f32(depth);
                } else {
                    gl.clear_depth_f64(depth as f64);
                }
            }
            self.ctx.count(1);
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        if flags.contains(ClearFlags::STENCIL) {
            unsafe { gl.clear_stencil(stencil) };
            self.ctx.count(1);
            mask |= glow::STENCIL_BUFFER_BIT;
        }
        if mask == 0 {
            return Ok(());
        }

        self.apply_scissor();
        unsafe { gl.clear(mask) };
        self.ctx.count(1);
        Ok(())
    }

    fn set_viewport(&mut self, rect: Rect) -> Result<()> {
        let features = &self.ctx.features;
        if rect.width < 0
            || rect.height < 0
            || rect.width as u32 > features.max_viewport_width
            || rect.height as u32 > features.max_viewport_height
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
        self.draw_state
            .bind_texture(unit, texture, self.ctx.features.max_texture_units)
    }

    fn set_sampler(&mut self, unit: u32, sampler: Option<SamplerHandle>) -> Result<()> {
        if let Some(handle) = sampler {
            self.samplers.get(handle)?;
        }
        self.draw_state
            .bind_sampler(unit, sampler, self.ctx.features.max_texture_units)
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
        self.shader_stages.get(shader_stage)?.set_uniform(variable, &value)
    }

    fn draw_indexed(&mut self, first_index: u32, index_count: u32) -> Result<()> {
        let (vertex_input_handle, shader_stage_handle) = self.draw_state.draw_bindings()?;
        let stage = self.shader_stages.get(shader_stage_handle)?;
        let vertex_input = self.vertex_inputs.get(vertex_input_handle)?;
        let desc = vertex_input.desc();

        let index_size = desc.index_type.size_bytes();
        let index_buffer = self.buffers.get(desc.index_buffer)?;
        let needed = (first_index as u64 + index_count as u64) * index_size as u64;
        if needed > index_buffer.size() {
            return Err(Error::InvalidArgument(format!(
                "draw_indexed reads {} index bytes but the index buffer holds {}",
                needed,
                index_buffer.size()
            )));
        }
        for (buffer, _) in desc.buffer_bindings() {
            self.buffers.get(buffer)?;
        }
        let (count, offset) = draw_elements_range(first_index, index_count, desc.index_type)?;

        self.apply_draw_state();
        self.ctx.use_program(Some(stage.program));
        self.bind_texture_units()?;
        let buffers = &self.buffers;
        vertex_input.bind(|h| Ok(buffers.get(h)?.raw))?;

        unsafe {
            self.ctx
                .gl
                .draw_elements(glow::TRIANGLES, count, index_type_to_gl(desc.index_type), offset)
        };
        self.ctx.count(1);
        self.stats.draw_calls += 1;
        Ok(())
    }
}

impl Drop for GlRenderer {
    fn drop(&mut self) {
        // Objects go before the context that owns them
        self.vertex_inputs.clear();
        self.shader_stages.clear();
        self.shaders.clear();
        self.samplers.clear();
        self.textures.clear();
        self.buffers.clear();
        self.default_sampler = None;
        engine_info!(SOURCE, "OpenGL renderer destroyed");
    }
}
