/// Shader and ShaderStage - Vulkan implementations
///
/// Shaders are SPIR-V modules reflected with spirq:
/// - vertex-stage inputs become attributes (location = input location)
/// - push-constant block members become uniforms (location = byte offset)
/// - combined image samplers in set 0 become samplers (location = binding)
///
/// Uniform writes land in a CPU copy of the push-constant block, pushed
/// before every draw.

use std::ffi::CString;
use std::rc::Rc;

use ash::vk;
use nebula_render::nebula::render::{
    validate_shader_pair, Shader, ShaderCode, ShaderDesc, ShaderHandle, ShaderStage, ShaderType, ShaderVariable,
    ShaderVariableSet, UniformValue, ValueType, VariableKind,
};
use nebula_render::nebula::{Error, Result};
use nebula_render::{engine_err, engine_warn};

use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{push_constant_size, spirq_type_to_value_type};

// ============================================================================
// REFLECTION
// ============================================================================

/// One variable found by reflection
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReflectedVariable {
    pub name: String,
    pub value_type: ValueType,
    /// Input location, push-constant offset or descriptor binding
    pub location: u32,
}

/// Reflection of a single SPIR-V entry point
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ReflectedShader {
    pub inputs: Vec<ReflectedVariable>,
    pub uniforms: Vec<ReflectedVariable>,
    pub samplers: Vec<ReflectedVariable>,
}

/// Reflect the entry point `entry_point` of a SPIR-V module
pub(crate) fn reflect_spirv(words: &[u32], entry_point: &str, shader_type: ShaderType) -> Result<ReflectedShader> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(words)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("nebula::vulkan", "SPIR-V reflection failed: {:?}", e))?;

    let entry = entry_points
        .iter()
        .find(|ep| ep.name == entry_point)
        .ok_or_else(|| Error::InvalidArgument(format!("SPIR-V module has no entry point '{}'", entry_point)))?;

    let mut reflected = ReflectedShader::default();
    for var in entry.vars.iter() {
        match var {
            spirq::var::Variable::Input { name, location, ty, .. } if shader_type == ShaderType::Vertex => {
                let Some(name) = name.clone().filter(|n| !n.starts_with("gl_")) else { continue };
                match spirq_type_to_value_type(ty) {
                    Some(value_type) => reflected.inputs.push(ReflectedVariable {
                        name,
                        value_type,
                        location: location.loc(),
                    }),
                    None => engine_warn!("nebula::vulkan", "Skipping vertex input '{}' of unsupported type", name),
                }
            }
            spirq::var::Variable::PushConstant { ty, .. } => {
                let spirq::ty::Type::Struct(block) = ty else { continue };
                for member in &block.members {
                    let name = member.name.clone().unwrap_or_default();
                    match spirq_type_to_value_type(&member.ty) {
                        Some(value_type) => reflected.uniforms.push(ReflectedVariable {
                            name,
                            value_type,
                            location: member.offset.unwrap_or(0) as u32,
                        }),
                        None => engine_warn!("nebula::vulkan", "Skipping uniform '{}' of unsupported type", name),
                    }
                }
            }
            spirq::var::Variable::Descriptor { name, desc_bind, desc_ty, .. } => {
                let name = name.clone().unwrap_or_default();
                match desc_ty {
                    spirq::ty::DescriptorType::CombinedImageSampler() if desc_bind.set() == 0 => {
                        reflected.samplers.push(ReflectedVariable {
                            name,
                            value_type: ValueType::Sampler2d,
                            location: desc_bind.bind(),
                        });
                    }
                    other => {
                        return Err(Error::Unsupported(format!(
                            "Shader resource '{}' ({:?}, set {}) is not a set-0 combined image sampler",
                            name,
                            other,
                            desc_bind.set()
                        )));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(reflected)
}

/// Variables and layout facts of a linked vertex + fragment pair
#[derive(Debug, Clone)]
pub(crate) struct StageReflection {
    pub variables: ShaderVariableSet,
    /// Bytes covered by the push-constant block
    pub push_constant_size: u32,
    pub push_constant_stages: vk::ShaderStageFlags,
    /// Sampler bindings with the stages reading them
    pub sampler_bindings: Vec<(u32, vk::ShaderStageFlags)>,
}

/// Merge vertex and fragment reflections into one variable set
///
/// Variables are ordered attributes, uniforms, samplers; a name declared by
/// both stages appears once.
pub(crate) fn merge_reflections(vertex: &ReflectedShader, fragment: &ReflectedShader) -> StageReflection {
    let mut variables = ShaderVariableSet::new();
    for input in &vertex.inputs {
        variables.push(input.name.clone(), VariableKind::Attribute, input.value_type, input.location);
    }

    let mut block_size = 0;
    let mut push_constant_stages = vk::ShaderStageFlags::empty();
    for (shader, stage) in [(vertex, vk::ShaderStageFlags::VERTEX), (fragment, vk::ShaderStageFlags::FRAGMENT)] {
        for uniform in &shader.uniforms {
            variables.push(uniform.name.clone(), VariableKind::Uniform, uniform.value_type, uniform.location);
            block_size = block_size.max(uniform.location + push_constant_size(uniform.value_type));
            push_constant_stages |= stage;
        }
    }

    let mut sampler_bindings: Vec<(u32, vk::ShaderStageFlags)> = Vec::new();
    for (shader, stage) in [(vertex, vk::ShaderStageFlags::VERTEX), (fragment, vk::ShaderStageFlags::FRAGMENT)] {
        for sampler in &shader.samplers {
            variables.push(sampler.name.clone(), VariableKind::Sampler, ValueType::Sampler2d, sampler.location);
            match sampler_bindings.iter_mut().find(|(binding, _)| *binding == sampler.location) {
                Some((_, stages)) => *stages |= stage,
                None => sampler_bindings.push((sampler.location, stage)),
            }
        }
    }

    StageReflection {
        variables,
        push_constant_size: block_size,
        push_constant_stages,
        sampler_bindings,
    }
}

/// Bytes of a uniform value as laid out in a push-constant block
pub(crate) fn uniform_bytes(value: &UniformValue) -> Vec<u8> {
    match value {
        UniformValue::Int32(v) | UniformValue::Sampler2d(v) => v.to_ne_bytes().to_vec(),
        UniformValue::Float32(v) => v.to_ne_bytes().to_vec(),
        UniformValue::Vec2(v) => bytemuck::cast_slice(v).to_vec(),
        UniformValue::Vec3(v) => bytemuck::cast_slice(v).to_vec(),
        UniformValue::Vec4(v) => bytemuck::cast_slice(v).to_vec(),
        UniformValue::Mat4(v) => bytemuck::cast_slice(v).to_vec(),
    }
}

// ============================================================================
// SHADER
// ============================================================================

/// Owned VkShaderModule, shared by the shader and the stages linking it
pub(crate) struct ShaderModule {
    ctx: Rc<GpuContext>,
    pub(crate) module: vk::ShaderModule,
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_shader_module(self.module, None) };
    }
}

pub struct VulkanShader {
    shader_type: ShaderType,
    pub(crate) module: Rc<ShaderModule>,
    pub(crate) entry_point: Rc<CString>,
    pub(crate) reflection: ReflectedShader,
}

impl VulkanShader {
    pub(crate) fn new(ctx: Rc<GpuContext>, desc: &ShaderDesc) -> Result<Self> {
        let words = match &desc.code {
            ShaderCode::Spirv(words) if words.is_empty() => {
                return Err(Error::InvalidArgument("Empty SPIR-V module".to_string()));
            }
            ShaderCode::Spirv(words) => words,
            ShaderCode::Glsl(_) => {
                return Err(Error::Unsupported("The Vulkan backend only accepts SPIR-V shaders".to_string()));
            }
        };
        let entry_point = CString::new(desc.entry_point.as_str())
            .map_err(|_| Error::InvalidArgument(format!("Entry point '{}' contains a NUL byte", desc.entry_point)))?;
        let reflection = reflect_spirv(words, &desc.entry_point, desc.shader_type)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(words);
        let module = unsafe {
            ctx.device
                .create_shader_module(&create_info, None)
                .map_err(|e| vk_error("nebula::vulkan", "Failed to create shader module", e))?
        };

        Ok(Self {
            shader_type: desc.shader_type,
            module: Rc::new(ShaderModule { ctx, module }),
            entry_point: Rc::new(entry_point),
            reflection,
        })
    }
}

impl Shader for VulkanShader {
    fn shader_type(&self) -> ShaderType {
        self.shader_type
    }
}

// ============================================================================
// SHADER STAGE
// ============================================================================

pub struct VulkanShaderStage {
    ctx: Rc<GpuContext>,
    vertex: ShaderHandle,
    fragment: ShaderHandle,
    pub(crate) vertex_module: Rc<ShaderModule>,
    pub(crate) vertex_entry: Rc<CString>,
    pub(crate) fragment_module: Rc<ShaderModule>,
    pub(crate) fragment_entry: Rc<CString>,
    variables: ShaderVariableSet,
    pub(crate) set_layout: vk::DescriptorSetLayout,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    pub(crate) push_constant_stages: vk::ShaderStageFlags,
    /// CPU copy of the push-constant block
    pub(crate) push_data: Vec<u8>,
    /// (binding, texture unit) for every sampler variable
    pub(crate) sampler_units: Vec<(u32, u32)>,
}

impl VulkanShaderStage {
    pub(crate) fn new(
        ctx: Rc<GpuContext>,
        (vertex_handle, vertex): (ShaderHandle, &VulkanShader),
        (fragment_handle, fragment): (ShaderHandle, &VulkanShader),
        max_push_constants_size: u32,
    ) -> Result<Self> {
        validate_shader_pair(vertex.shader_type, fragment.shader_type)?;
        let reflection = merge_reflections(&vertex.reflection, &fragment.reflection);
        if reflection.push_constant_size > max_push_constants_size {
            return Err(Error::Unsupported(format!(
                "Uniform block of {} bytes exceeds the device push-constant limit of {}",
                reflection.push_constant_size, max_push_constants_size
            )));
        }

        let bindings: Vec<vk::DescriptorSetLayoutBinding> = reflection
            .sampler_bindings
            .iter()
            .map(|&(binding, stages)| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .descriptor_count(1)
                    .stage_flags(stages)
            })
            .collect();
        let set_layout = unsafe {
            ctx.device
                .create_descriptor_set_layout(&vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings), None)
                .map_err(|e| vk_error("nebula::vulkan", "Failed to create descriptor set layout", e))?
        };

        let set_layouts = [set_layout];
        let push_ranges = [vk::PushConstantRange {
            stage_flags: reflection.push_constant_stages,
            offset: 0,
            size: reflection.push_constant_size,
        }];
        let mut layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        if reflection.push_constant_size > 0 {
            layout_info = layout_info.push_constant_ranges(&push_ranges);
        }
        let pipeline_layout = match unsafe { ctx.device.create_pipeline_layout(&layout_info, None) } {
            Ok(layout) => layout,
            Err(e) => {
                unsafe { ctx.device.destroy_descriptor_set_layout(set_layout, None) };
                return Err(vk_error("nebula::vulkan", "Failed to create pipeline layout", e));
            }
        };

        Ok(Self {
            ctx,
            vertex: vertex_handle,
            fragment: fragment_handle,
            vertex_module: Rc::clone(&vertex.module),
            vertex_entry: Rc::clone(&vertex.entry_point),
            fragment_module: Rc::clone(&fragment.module),
            fragment_entry: Rc::clone(&fragment.entry_point),
            push_constant_stages: reflection.push_constant_stages,
            push_data: vec![0; reflection.push_constant_size as usize],
            sampler_units: reflection.sampler_bindings.iter().map(|&(binding, _)| (binding, 0)).collect(),
            variables: reflection.variables,
            set_layout,
            pipeline_layout,
        })
    }

    pub(crate) fn variable_set(&mut self) -> &mut ShaderVariableSet {
        &mut self.variables
    }

    /// Store a uniform value for the next draws
    ///
    /// Sampler variables take a texture unit; every other uniform is written
    /// into the push-constant block at its offset.
    pub(crate) fn set_uniform(&mut self, variable: u32, value: &UniformValue) -> Result<()> {
        let variable = self.variables.resolve_uniform(variable, value)?;
        match (variable.kind, value) {
            (VariableKind::Sampler, UniformValue::Sampler2d(unit)) => {
                let unit = u32::try_from(*unit)
                    .map_err(|_| Error::InvalidArgument(format!("Texture unit {} is negative", unit)))?;
                let binding = variable.location;
                if let Some(entry) = self.sampler_units.iter_mut().find(|(b, _)| *b == binding) {
                    entry.1 = unit;
                }
                Ok(())
            }
            _ => {
                let offset = variable.location as usize;
                let bytes = uniform_bytes(value);
                let target = self.push_data.get_mut(offset..offset + bytes.len()).ok_or_else(|| {
                    Error::InvalidState(format!("Uniform '{}' lies outside the push-constant block", variable.name))
                })?;
                target.copy_from_slice(&bytes);
                Ok(())
            }
        }
    }
}

impl ShaderStage for VulkanShaderStage {
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

impl Drop for VulkanShaderStage {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.ctx.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
