//! Null backend
//!
//! Satisfies the whole renderer contract without a GPU: descriptors and
//! mutations go through the same validation as the real backends, command
//! buffers are decoded and their handles checked, and no native call is ever
//! issued. Used for headless runs and automated tests.

use crate::error::{Error, Result};
use crate::renderer::*;

// ===== RESOURCES =====

pub struct NullBuffer {
    buffer_type: BufferType,
    usage: BufferUsage,
    /// CPU copy of the contents
    data: Vec<u8>,
}

impl NullBuffer {
    pub fn contents(&self) -> &[u8] {
        &self.data
    }
}

impl Buffer for NullBuffer {
    fn buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn update(&mut self, offset: i64, size: i64, data: &[u8]) -> Result<()> {
        let range = validate_buffer_update(self.size(), offset, size, data.len())?;
        let len = range.len();
        self.data[range].copy_from_slice(&data[..len]);
        Ok(())
    }
}

pub struct NullR2Texture {
    info: R2TextureInfo,
    mipmap_available: bool,
    /// Uploaded bytes per level, `None` until written
    levels: Vec<Option<Vec<u8>>>,
}

impl NullR2Texture {
    pub fn level_data(&self, level: u32) -> Option<&[u8]> {
        self.levels.get(level as usize)?.as_deref()
    }
}

impl R2Texture for NullR2Texture {
    fn info(&self) -> &R2TextureInfo {
        &self.info
    }

    fn update(&mut self, mip_level: u32, data: &[u8]) -> Result<()> {
        validate_mip_upload(&self.info, mip_level, data.len())?;
        self.levels[mip_level as usize] = Some(data.to_vec());
        Ok(())
    }

    fn generate_mipmaps(&mut self) -> Result<()> {
        let features = DeviceFeatures {
            is_mipmap_available: self.mipmap_available,
            ..DeviceFeatures::headless()
        };
        if !check_generate_mipmaps(&self.info, &features)? {
            return Ok(());
        }
        // Nothing to derive from until level 0 is uploaded
        let Some(mut source) = self.levels[0].clone() else {
            return Ok(());
        };
        for level in 1..self.info.mip_count {
            source = downsample(&self.info, level, &source);
            self.levels[level as usize] = Some(source.clone());
        }
        Ok(())
    }
}

/// 2x2 box filter from level `level - 1` into `level`
///
/// 8-bit channels are averaged; float formats take the top-left texel.
fn downsample(info: &R2TextureInfo, level: u32, source: &[u8]) -> Vec<u8> {
    let bpp = info.format.bytes_per_pixel() as usize;
    let average = !matches!(
        info.format,
        PixelFormat::R16G16B16A16_SFLOAT | PixelFormat::R32G32B32A32_SFLOAT
    );
    let (src_w, src_h) = info.mip_extent(level - 1);
    let (dst_w, dst_h) = info.mip_extent(level);
    let (src_w, src_h) = (src_w as usize, src_h as usize);
    let texel = |x: usize, y: usize| {
        let start = (y.min(src_h - 1) * src_w + x.min(src_w - 1)) * bpp;
        &source[start..start + bpp]
    };

    let mut out = Vec::with_capacity(info.mip_byte_size(level));
    for y in 0..dst_h as usize {
        for x in 0..dst_w as usize {
            let quad = [
                texel(2 * x, 2 * y),
                texel(2 * x + 1, 2 * y),
                texel(2 * x, 2 * y + 1),
                texel(2 * x + 1, 2 * y + 1),
            ];
            if average {
                for byte in 0..bpp {
                    let sum: u32 = quad.iter().map(|t| t[byte] as u32).sum();
                    out.push(((sum + 2) / 4) as u8);
                }
            } else {
                out.extend_from_slice(quad[0]);
            }
        }
    }
    out
}

pub struct NullSampler {
    desc: SamplerDesc,
}

impl Sampler for NullSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

pub struct NullShader {
    shader_type: ShaderType,
    code: ShaderCode,
}

impl Shader for NullShader {
    fn shader_type(&self) -> ShaderType {
        self.shader_type
    }
}

pub struct NullShaderStage {
    vertex: ShaderHandle,
    fragment: ShaderHandle,
    variables: ShaderVariableSet,
}

impl ShaderStage for NullShaderStage {
    fn vertex_shader(&self) -> ShaderHandle {
        self.vertex
    }

    fn fragment_shader(&self) -> ShaderHandle {
        self.fragment
    }

    fn variables(&self) -> &[ShaderVariable] {
        self.variables.as_slice()
    }

    fn variable(&self, name: &str) -> Option<&ShaderVariable> {
        self.variables.by_name(name)
    }
}

pub struct NullVertexInput {
    desc: VertexInputDesc,
}

impl VertexInput for NullVertexInput {
    fn desc(&self) -> &VertexInputDesc {
        &self.desc
    }
}

// ===== GLSL DECLARATION SCAN =====

fn glsl_value_type(name: &str) -> Option<ValueType> {
    Some(match name {
        "int" => ValueType::Int32,
        "float" => ValueType::Float32,
        "vec2" => ValueType::Vec2,
        "vec3" => ValueType::Vec3,
        "vec4" => ValueType::Vec4,
        "mat4" => ValueType::Mat4,
        "sampler2D" => ValueType::Sampler2d,
        _ => return None,
    })
}

/// Collect attribute/uniform/sampler declarations from GLSL source
///
/// Only plain top-level declarations are recognized (one per statement,
/// optional `layout(location = N)`); the Null backend has no compiler.
fn scan_glsl_declarations(source: &str, is_vertex: bool, variables: &mut ShaderVariableSet) {
    let cleaned: String = source
        .lines()
        .map(|line| line.split("//").next().unwrap_or(""))
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    let mut next_attribute = 0;
    for statement in cleaned.split(';') {
        let statement = statement.rsplit(['{', '}']).next().unwrap_or("").trim();
        let (location, rest) = match statement.strip_prefix("layout") {
            Some(rest) => {
                let Some(close) = rest.find(')') else { continue };
                let location = rest[..close]
                    .split(|c: char| c == '=' || c == '(' || c == ',')
                    .map(str::trim)
                    .skip_while(|token| *token != "location")
                    .nth(1)
                    .and_then(|token| token.parse::<u32>().ok());
                (location, rest[close + 1..].trim())
            }
            None => (None, statement),
        };

        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let (qualifier, type_name, name) = match tokens.as_slice() {
            [qualifier, type_name, name] => (*qualifier, *type_name, *name),
            [qualifier, _precision, type_name, name] => (*qualifier, *type_name, *name),
            _ => continue,
        };
        let Some(value_type) = glsl_value_type(type_name) else { continue };

        match qualifier {
            "in" | "attribute" if is_vertex => {
                let location = location.unwrap_or(next_attribute);
                next_attribute = location + 1;
                variables.push(name, VariableKind::Attribute, value_type, location);
            }
            "uniform" => {
                let kind = if value_type == ValueType::Sampler2d {
                    VariableKind::Sampler
                } else {
                    VariableKind::Uniform
                };
                let location = location.unwrap_or(variables.len() as u32);
                variables.push(name, kind, value_type, location);
            }
            _ => {}
        }
    }
}

// ===== RENDERER =====

/// Renderer that validates everything and draws nothing
pub struct NullRenderer {
    features: DeviceFeatures,
    buffers: ResourceTable<BufferHandle, NullBuffer>,
    textures: ResourceTable<R2TextureHandle, NullR2Texture>,
    samplers: ResourceTable<SamplerHandle, NullSampler>,
    shaders: ResourceTable<ShaderHandle, NullShader>,
    shader_stages: ResourceTable<ShaderStageHandle, NullShaderStage>,
    vertex_inputs: ResourceTable<VertexInputHandle, NullVertexInput>,
    draw_state: DrawState,
    stats: RendererStats,
    width: u32,
    height: u32,
    vsync: bool,
}

impl NullRenderer {
    pub fn new(config: &RendererConfig) -> Self {
        Self::with_features(DeviceFeatures::headless(), config)
    }

    /// Null renderer reporting custom capabilities
    pub fn with_features(features: DeviceFeatures, config: &RendererConfig) -> Self {
        crate::engine_info!(
            "nebula::null",
            "Null renderer created for '{}' (no GPU calls will be issued)",
            config.app_name
        );
        Self {
            features,
            buffers: ResourceTable::new("buffer"),
            textures: ResourceTable::new("texture"),
            samplers: ResourceTable::new("sampler"),
            shaders: ResourceTable::new("shader"),
            shader_stages: ResourceTable::new("shader stage"),
            vertex_inputs: ResourceTable::new("vertex input"),
            draw_state: DrawState::default(),
            stats: RendererStats::default(),
            width: 0,
            height: 0,
            vsync: config.vsync,
        }
    }

    /// CPU copy of a buffer's contents
    pub fn buffer_contents(&self, handle: BufferHandle) -> Result<&[u8]> {
        Ok(self.buffers.get(handle)?.contents())
    }

    pub fn texture_level(&self, handle: R2TextureHandle, level: u32) -> Result<Option<&[u8]>> {
        Ok(self.textures.get(handle)?.level_data(level))
    }

    pub fn draw_state(&self) -> &DrawState {
        &self.draw_state
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_vsync_enabled(&self) -> bool {
        self.vsync
    }
}

impl Renderer for NullRenderer {
    fn backend_type(&self) -> BackendType {
        BackendType::Null
    }

    fn device_features(&self) -> &DeviceFeatures {
        &self.features
    }

    fn create_buffer(&mut self, desc: BufferDesc) -> Result<BufferHandle> {
        validate_buffer_desc(&desc)?;
        let len = usize::try_from(desc.size).map_err(|_| Error::OutOfMemory)?;
        let mut data = Vec::new();
        if data.try_reserve_exact(len).is_err() {
            crate::engine_error!("nebula::null", "Cannot shadow a buffer of {} bytes", desc.size);
            return Err(Error::OutOfMemory);
        }
        data.resize(len, 0);
        Ok(self.buffers.insert(NullBuffer {
            buffer_type: desc.buffer_type,
            usage: desc.usage,
            data,
        }))
    }

    fn create_r2_texture(&mut self, desc: R2TextureDesc) -> Result<R2TextureHandle> {
        let info = validate_r2_texture_desc(&desc, &self.features)?;
        let levels = vec![None; info.mip_count as usize];
        Ok(self.textures.insert(NullR2Texture {
            info,
            mipmap_available: self.features.is_mipmap_available,
            levels,
        }))
    }

    fn create_sampler(&mut self, desc: SamplerDesc) -> Result<SamplerHandle> {
        Ok(self.samplers.insert(NullSampler {
            desc: desc.resolved(&self.features),
        }))
    }

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<ShaderHandle> {
        match &desc.code {
            ShaderCode::Glsl(source) if source.trim().is_empty() => {
                return Err(Error::InvalidArgument("Empty GLSL source".to_string()));
            }
            ShaderCode::Spirv(words) if words.is_empty() => {
                return Err(Error::InvalidArgument("Empty SPIR-V module".to_string()));
            }
            _ => {}
        }
        Ok(self.shaders.insert(NullShader {
            shader_type: desc.shader_type,
            code: desc.code,
        }))
    }

    fn create_shader_stage(&mut self, desc: ShaderStageDesc) -> Result<ShaderStageHandle> {
        let vertex = self.shaders.get(desc.vertex)?;
        let fragment = self.shaders.get(desc.fragment)?;
        validate_shader_pair(vertex.shader_type, fragment.shader_type)?;

        let mut variables = ShaderVariableSet::new();
        if let ShaderCode::Glsl(source) = &vertex.code {
            scan_glsl_declarations(source, true, &mut variables);
        }
        if let ShaderCode::Glsl(source) = &fragment.code {
            scan_glsl_declarations(source, false, &mut variables);
        }

        let handle = self.shader_stages.insert(NullShaderStage {
            vertex: desc.vertex,
            fragment: desc.fragment,
            variables,
        });
        self.shader_stages.get_mut(handle)?.variables.assign_stage(handle);
        Ok(handle)
    }

    fn create_vertex_input(&mut self, desc: VertexInputDesc) -> Result<VertexInputHandle> {
        let buffers = &self.buffers;
        validate_vertex_input_desc(&desc, &self.features, |h| Ok(buffers.get(h)?.buffer_type))?;
        Ok(self.vertex_inputs.insert(NullVertexInput { desc }))
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
        self.stats.frames_presented += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn set_vsync(&mut self, enabled: bool) -> Result<()> {
        if !self.features.is_vsync_available || self.features.is_vsync_requires_restart {
            return Err(Error::Unsupported("Toggling vsync needs a restart on this device".to_string()));
        }
        self.vsync = enabled;
        Ok(())
    }

    fn stats(&self) -> RendererStats {
        self.stats
    }
}

impl CommandExecutor for NullRenderer {
    fn clear(&mut self, _flags: ClearFlags, _color: [f32; 4], _depth: f32, _stencil: i32) -> Result<()> {
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
            .get(shader_stage)?
            .variables
            .resolve_uniform(variable, &value)?;
        Ok(())
    }

    fn draw_indexed(&mut self, first_index: u32, index_count: u32) -> Result<()> {
        let (vertex_input, shader_stage) = self.draw_state.draw_bindings()?;
        self.shader_stages.get(shader_stage)?;
        let desc = &self.vertex_inputs.get(vertex_input)?.desc;

        let index_buffer = self.buffers.get(desc.index_buffer)?;
        let needed = (first_index as u64 + index_count as u64) * desc.index_type.size_bytes() as u64;
        if needed > index_buffer.size() {
            return Err(Error::InvalidArgument(format!(
                "draw_indexed reads {} index bytes but the index buffer holds {}",
                needed,
                index_buffer.size()
            )));
        }
        for attribute in &desc.attributes {
            if let AttributeSource::Buffer { buffer, .. } = attribute.source {
                self.buffers.get(buffer)?;
            }
        }
        self.stats.draw_calls += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "null_renderer_tests.rs"]
mod tests;
