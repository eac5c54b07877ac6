/// Shader and ShaderStage - OpenGL implementations
///
/// Shaders are compiled GLSL objects. A shader stage is a linked program;
/// its variables come from the driver's active attribute and uniform lists,
/// and uniform locations are cached per variable index.

use std::rc::Rc;

use glow::HasContext;
use nebula_render::engine_debug;
use nebula_render::nebula::render::{
    Shader, ShaderCode, ShaderDesc, ShaderHandle, ShaderStage, ShaderStageHandle, ShaderType, ShaderVariable,
    ShaderVariableSet, UniformValue, ValueType, VariableKind,
};
use nebula_render::nebula::{Error, NativeError, Result};

use crate::gl_context::{creation_error, GlContext, RawName};

const SOURCE: &str = "nebula::gl::shader";

fn shader_type_to_gl(shader_type: ShaderType) -> u32 {
    match shader_type {
        ShaderType::Vertex => glow::VERTEX_SHADER,
        ShaderType::Fragment => glow::FRAGMENT_SHADER,
    }
}

/// Reflected GL type, `None` for types the API does not expose
pub(crate) fn value_type_from_gl(gl_type: u32) -> Option<ValueType> {
    Some(match gl_type {
        glow::INT => ValueType::Int32,
        glow::FLOAT => ValueType::Float32,
        glow::FLOAT_VEC2 => ValueType::Vec2,
        glow::FLOAT_VEC3 => ValueType::Vec3,
        glow::FLOAT_VEC4 => ValueType::Vec4,
        glow::FLOAT_MAT4 => ValueType::Mat4,
        glow::SAMPLER_2D => ValueType::Sampler2d,
        _ => return None,
    })
}

/// Name as declared: array suffix dropped, built-ins filtered out
pub(crate) fn reflected_name(name: &str) -> Option<&str> {
    if name.starts_with("gl_") {
        return None;
    }
    Some(name.strip_suffix("[0]").unwrap_or(name))
}

pub struct GlShader {
    ctx: Rc<GlContext>,
    pub(crate) raw: glow::Shader,
    shader_type: ShaderType,
}

impl GlShader {
    pub(crate) fn new(ctx: Rc<GlContext>, desc: &ShaderDesc) -> Result<Self> {
        let source = match &desc.code {
            ShaderCode::Glsl(source) if source.trim().is_empty() => {
                return Err(Error::InvalidArgument("Empty GLSL source".to_string()));
            }
            ShaderCode::Glsl(source) => source,
            ShaderCode::Spirv(_) => {
                return Err(Error::Unsupported("The OpenGL backend consumes GLSL, not SPIR-V".to_string()));
            }
        };

        let raw = unsafe { ctx.gl.create_shader(shader_type_to_gl(desc.shader_type)) }
            .map_err(|message| creation_error("shader", message))?;
        ctx.count(1);
        let shader = Self {
            ctx,
            raw,
            shader_type: desc.shader_type,
        };

        let gl = &shader.ctx.gl;
        let is_compiled = unsafe {
            gl.shader_source(raw, source);
            gl.compile_shader(raw);
            gl.get_shader_compile_status(raw)
        };
        shader.ctx.count(3);
        if !is_compiled {
            let log = unsafe { gl.get_shader_info_log(raw) };
            shader.ctx.count(1);
            return Err(Error::native(
                format!("Failed to compile {:?} shader", desc.shader_type),
                NativeError::new("OpenGL", glow::INVALID_OPERATION as i64, log.trim()),
            ));
        }
        Ok(shader)
    }
}

impl Shader for GlShader {
    fn shader_type(&self) -> ShaderType {
        self.shader_type
    }
}

impl Drop for GlShader {
    fn drop(&mut self) {
        unsafe { self.ctx.gl.delete_shader(self.raw) };
        self.ctx.count(1);
    }
}

// ===== SHADER STAGE =====

pub struct GlShaderStage {
    ctx: Rc<GlContext>,
    pub(crate) program: glow::Program,
    vertex: ShaderHandle,
    fragment: ShaderHandle,
    variables: ShaderVariableSet,
    /// Uniform location per variable index, `None` for attributes
    locations: Vec<Option<glow::UniformLocation>>,
}

impl GlShaderStage {
    /// Link a validated vertex + fragment pair
    pub(crate) fn link(
        ctx: Rc<GlContext>,
        vertex: (ShaderHandle, &GlShader),
        fragment: (ShaderHandle, &GlShader),
    ) -> Result<Self> {
        let program = unsafe { ctx.gl.create_program() }.map_err(|message| creation_error("program", message))?;
        ctx.count(1);
        let mut stage = Self {
            ctx,
            program,
            vertex: vertex.0,
            fragment: fragment.0,
            variables: ShaderVariableSet::new(),
            locations: Vec::new(),
        };

        let gl = &stage.ctx.gl;
        let is_linked = unsafe {
            gl.attach_shader(program, vertex.1.raw);
            gl.attach_shader(program, fragment.1.raw);
            gl.link_program(program);
            let is_linked = gl.get_program_link_status(program);
            gl.detach_shader(program, vertex.1.raw);
            gl.detach_shader(program, fragment.1.raw);
            is_linked
        };
        stage.ctx.count(6);
        if !is_linked {
            let log = unsafe { gl.get_program_info_log(program) };
            stage.ctx.count(1);
            return Err(Error::native(
                "Failed to link shader stage",
                NativeError::new("OpenGL", glow::INVALID_OPERATION as i64, log.trim()),
            ));
        }

        stage.reflect();
        Ok(stage)
    }

    fn reflect(&mut self) {
        let ctx = Rc::clone(&self.ctx);
        let gl = &ctx.gl;
        let program = self.program;

        let attribute_count = unsafe { gl.get_active_attributes(program) };
        for index in 0..attribute_count {
            let Some(attribute) = (unsafe { gl.get_active_attribute(program, index) }) else { continue };
            let Some(name) = reflected_name(&attribute.name) else { continue };
            let Some(value_type) = value_type_from_gl(attribute.atype) else { continue };
            let Some(location) = (unsafe { gl.get_attrib_location(program, name) }) else { continue };
            let variable = self.variables.push(name, VariableKind::Attribute, value_type, location);
            self.set_location(variable, None);
        }

        let uniform_count = unsafe { gl.get_active_uniforms(program) };
        for index in 0..uniform_count {
            let Some(uniform) = (unsafe { gl.get_active_uniform(program, index) }) else { continue };
            let Some(name) = reflected_name(&uniform.name) else { continue };
            let Some(value_type) = value_type_from_gl(uniform.utype) else { continue };
            let Some(location) = (unsafe { gl.get_uniform_location(program, name) }) else { continue };
            let kind = if value_type == ValueType::Sampler2d {
                VariableKind::Sampler
            } else {
                VariableKind::Uniform
            };
            let variable = self.variables.push(name, kind, value_type, location.0);
            self.set_location(variable, Some(location));
        }

        engine_debug!(
            SOURCE,
            "Program {} exposes {} variables",
            program.raw_name(),
            self.variables.len()
        );
    }

    fn set_location(&mut self, variable: u32, location: Option<glow::UniformLocation>) {
        let index = variable as usize;
        if self.locations.len() <= index {
            self.locations.resize(index + 1, None);
        }
        self.locations[index] = location;
    }

    pub(crate) fn assign_stage(&mut self, handle: ShaderStageHandle) {
        self.variables.assign_stage(handle);
    }

    /// Write a uniform; makes this program current
    pub(crate) fn set_uniform(&self, variable: u32, value: &UniformValue) -> Result<()> {
        self.variables.resolve_uniform(variable, value)?;
        let Some(location) = self.locations.get(variable as usize).and_then(Option::as_ref) else {
            return Err(Error::InvalidArgument(format!(
                "Shader variable {} has no uniform location",
                variable
            )));
        };

        self.ctx.use_program(Some(self.program));
        let gl = &self.ctx.gl;
        let location = Some(location);
        unsafe {
            match value {
                UniformValue::Int32(v) | UniformValue::Sampler2d(v) => gl.uniform_1_i32(location, *v),
                UniformValue::Float32(v) => gl.uniform_1_f32(location, *v),
                UniformValue::Vec2(v) => gl.uniform_2_f32_slice(location, v),
                UniformValue::Vec3(v) => gl.uniform_3_f32_slice(location, v),
                UniformValue::Vec4(v) => gl.uniform_4_f32_slice(location, v),
                UniformValue::Mat4(m) => gl.uniform_matrix_4_f32_slice(location, false, m),
            }
        }
        self.ctx.count(1);
        Ok(())
    }
}

impl ShaderStage for GlShaderStage {
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

impl Drop for GlShaderStage {
    fn drop(&mut self) {
        self.ctx.state().forget_program(self.program.raw_name());
        unsafe { self.ctx.gl.delete_program(self.program) };
        self.ctx.count(1);
    }
}

#[cfg(test)]
#[path = "gl_shader_tests.rs"]
mod tests;
