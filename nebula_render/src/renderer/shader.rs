/// Shaders, shader stages and their reflected variables

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::renderer::{ShaderHandle, ShaderStageHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderType {
    Vertex,
    Fragment,
}

/// Shader code as handed over by the shader-asset collaborator
#[derive(Debug, Clone)]
pub enum ShaderCode {
    /// SPIR-V words (Vulkan)
    Spirv(Vec<u32>),
    /// GLSL source text (OpenGL)
    Glsl(String),
}

/// Descriptor for creating a shader
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    pub shader_type: ShaderType,
    pub code: ShaderCode,
    pub entry_point: String,
}

impl ShaderDesc {
    pub fn glsl(shader_type: ShaderType, source: impl Into<String>) -> Self {
        Self {
            shader_type,
            code: ShaderCode::Glsl(source.into()),
            entry_point: "main".to_string(),
        }
    }

    pub fn spirv(shader_type: ShaderType, words: Vec<u32>) -> Self {
        Self {
            shader_type,
            code: ShaderCode::Spirv(words),
            entry_point: "main".to_string(),
        }
    }
}

/// Shader module trait
pub trait Shader {
    fn shader_type(&self) -> ShaderType;
}

// ===== SHADER STAGE =====

/// Descriptor for linking a vertex + fragment pair
#[derive(Debug, Clone, Copy)]
pub struct ShaderStageDesc {
    pub vertex: ShaderHandle,
    pub fragment: ShaderHandle,
}

/// Kind of a named shader variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Per-vertex input
    Attribute,
    /// Uniform value
    Uniform,
    /// 2D sampler
    Sampler,
}

/// Value type of a shader variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int32,
    Float32,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Sampler2d,
}

/// One named variable exposed by a shader stage
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderVariable {
    /// Stage that owns the variable
    pub stage: ShaderStageHandle,
    /// Position in the stage's variable list, used in command payloads
    pub index: u32,
    pub name: String,
    pub kind: VariableKind,
    pub value_type: ValueType,
    /// Attribute location, uniform location/offset or sampler binding
    pub location: u32,
}

/// Typed uniform value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int32(i32),
    Float32(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major 4x4 matrix
    Mat4([f32; 16]),
    /// Texture unit index
    Sampler2d(i32),
}

impl UniformValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            UniformValue::Int32(_) => ValueType::Int32,
            UniformValue::Float32(_) => ValueType::Float32,
            UniformValue::Vec2(_) => ValueType::Vec2,
            UniformValue::Vec3(_) => ValueType::Vec3,
            UniformValue::Vec4(_) => ValueType::Vec4,
            UniformValue::Mat4(_) => ValueType::Mat4,
            UniformValue::Sampler2d(_) => ValueType::Sampler2d,
        }
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int32(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float32(value)
    }
}

impl From<glam::Vec2> for UniformValue {
    fn from(value: glam::Vec2) -> Self {
        UniformValue::Vec2(value.to_array())
    }
}

impl From<glam::Vec3> for UniformValue {
    fn from(value: glam::Vec3) -> Self {
        UniformValue::Vec3(value.to_array())
    }
}

impl From<glam::Vec4> for UniformValue {
    fn from(value: glam::Vec4) -> Self {
        UniformValue::Vec4(value.to_array())
    }
}

impl From<glam::Mat4> for UniformValue {
    fn from(value: glam::Mat4) -> Self {
        UniformValue::Mat4(value.to_cols_array())
    }
}

/// Linked shader pair trait
pub trait ShaderStage {
    fn vertex_shader(&self) -> ShaderHandle;

    fn fragment_shader(&self) -> ShaderHandle;

    fn variables(&self) -> &[ShaderVariable];

    /// Look up a variable by name
    fn variable(&self, name: &str) -> Option<&ShaderVariable>;
}

/// Name-indexed variable list shared by the backends' shader stages
#[derive(Debug, Clone, Default)]
pub struct ShaderVariableSet {
    variables: Vec<ShaderVariable>,
    by_name: FxHashMap<String, usize>,
}

impl ShaderVariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a variable; `index` and `stage` are assigned by the set
    ///
    /// A name already present keeps its first definition (GLSL and SPIR-V
    /// reflection can report a uniform once per stage).
    pub fn push(&mut self, name: impl Into<String>, kind: VariableKind, value_type: ValueType, location: u32) -> u32 {
        let name = name.into();
        if let Some(&existing) = self.by_name.get(&name) {
            return existing as u32;
        }
        let index = self.variables.len();
        self.by_name.insert(name.clone(), index);
        self.variables.push(ShaderVariable {
            stage: ShaderStageHandle::default(),
            index: index as u32,
            name,
            kind,
            value_type,
            location,
        });
        index as u32
    }

    /// Stamp the owning stage handle once it has been minted
    pub fn assign_stage(&mut self, stage: ShaderStageHandle) {
        for variable in &mut self.variables {
            variable.stage = stage;
        }
    }

    pub fn get(&self, index: u32) -> Option<&ShaderVariable> {
        self.variables.get(index as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<&ShaderVariable> {
        self.by_name.get(name).map(|&i| &self.variables[i])
    }

    pub fn as_slice(&self) -> &[ShaderVariable] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Resolve a uniform write coming from a command payload
    pub fn resolve_uniform(&self, index: u32, value: &UniformValue) -> Result<&ShaderVariable> {
        let variable = self
            .get(index)
            .ok_or_else(|| Error::InvalidArgument(format!("Shader variable index {} out of range", index)))?;
        validate_uniform_value(variable, value)?;
        Ok(variable)
    }
}

/// Check that a vertex and a fragment shader were given in the right slots
pub fn validate_shader_pair(vertex: ShaderType, fragment: ShaderType) -> Result<()> {
    if vertex != ShaderType::Vertex {
        return Err(Error::InvalidArgument(format!(
            "Shader stage vertex slot holds a {:?} shader",
            vertex
        )));
    }
    if fragment != ShaderType::Fragment {
        return Err(Error::InvalidArgument(format!(
            "Shader stage fragment slot holds a {:?} shader",
            fragment
        )));
    }
    Ok(())
}

/// Uniform setters refuse attributes and mismatched value types
pub fn validate_uniform_value(variable: &ShaderVariable, value: &UniformValue) -> Result<()> {
    if variable.kind == VariableKind::Attribute {
        return Err(Error::InvalidArgument(format!(
            "Shader variable '{}' is an attribute, not a uniform",
            variable.name
        )));
    }
    if variable.value_type != value.value_type() {
        return Err(Error::InvalidArgument(format!(
            "Shader variable '{}' is {:?}, got {:?}",
            variable.name,
            variable.value_type,
            value.value_type()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
