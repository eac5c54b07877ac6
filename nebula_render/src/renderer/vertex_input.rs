/// Vertex input layout: attributes, their sources and the index buffer

use crate::error::{Error, Result};
use crate::renderer::{BufferHandle, BufferType, DeviceFeatures};

/// Vertex attribute formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum AttributeFormat {
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    /// Four normalized bytes (packed colors)
    R8G8B8A8_UNORM,
}

impl AttributeFormat {
    pub fn size_bytes(&self) -> u32 {
        match self {
            AttributeFormat::R32_SFLOAT => 4,
            AttributeFormat::R32G32_SFLOAT => 8,
            AttributeFormat::R32G32B32_SFLOAT => 12,
            AttributeFormat::R32G32B32A32_SFLOAT => 16,
            AttributeFormat::R8G8B8A8_UNORM => 4,
        }
    }

    pub fn component_count(&self) -> u32 {
        match self {
            AttributeFormat::R32_SFLOAT => 1,
            AttributeFormat::R32G32_SFLOAT => 2,
            AttributeFormat::R32G32B32_SFLOAT => 3,
            AttributeFormat::R32G32B32A32_SFLOAT | AttributeFormat::R8G8B8A8_UNORM => 4,
        }
    }
}

/// Where an attribute reads its values from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeSource {
    /// Interleaved or planar data in a vertex buffer
    Buffer {
        buffer: BufferHandle,
        stride: u32,
        offset: u32,
    },
    /// Same value for every vertex, no buffer behind it
    Constant([f32; 4]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: AttributeFormat,
    pub source: AttributeSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Descriptor for creating a vertex input
#[derive(Debug, Clone, PartialEq)]
pub struct VertexInputDesc {
    pub attributes: Vec<VertexAttribute>,
    pub index_buffer: BufferHandle,
    pub index_type: IndexType,
}

impl VertexInputDesc {
    /// Distinct vertex buffers in first-use order, with their stride
    ///
    /// Backends bind one vertex buffer binding per entry.
    pub fn buffer_bindings(&self) -> Vec<(BufferHandle, u32)> {
        let mut bindings: Vec<(BufferHandle, u32)> = Vec::new();
        for attribute in &self.attributes {
            if let AttributeSource::Buffer { buffer, stride, .. } = attribute.source {
                if !bindings.iter().any(|&(b, s)| b == buffer && s == stride) {
                    bindings.push((buffer, stride));
                }
            }
        }
        bindings
    }

    pub fn has_constant_attributes(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| matches!(a.source, AttributeSource::Constant(_)))
    }
}

/// Vertex input resource trait
pub trait VertexInput {
    fn desc(&self) -> &VertexInputDesc;
}

/// Validate a vertex input descriptor
///
/// `buffer_type_of` resolves a buffer handle in the creating renderer and
/// fails for unknown handles.
pub fn validate_vertex_input_desc(
    desc: &VertexInputDesc,
    features: &DeviceFeatures,
    buffer_type_of: impl Fn(BufferHandle) -> Result<BufferType>,
) -> Result<()> {
    if buffer_type_of(desc.index_buffer)? != BufferType::Index {
        return Err(Error::InvalidArgument(
            "Vertex input index buffer is not an index buffer".to_string(),
        ));
    }

    let mut seen: u64 = 0;
    for attribute in &desc.attributes {
        if attribute.location >= features.max_vertex_input_locations || attribute.location >= 64 {
            return Err(Error::InvalidArgument(format!(
                "Attribute location {} exceeds device maximum {}",
                attribute.location, features.max_vertex_input_locations
            )));
        }
        let bit = 1u64 << attribute.location;
        if seen & bit != 0 {
            return Err(Error::InvalidArgument(format!(
                "Attribute location {} used twice",
                attribute.location
            )));
        }
        seen |= bit;

        if let AttributeSource::Buffer { buffer, stride, .. } = attribute.source {
            if buffer_type_of(buffer)? != BufferType::Vertex {
                return Err(Error::InvalidArgument(format!(
                    "Attribute location {} reads from a non-vertex buffer",
                    attribute.location
                )));
            }
            if stride == 0 {
                return Err(Error::InvalidArgument(format!(
                    "Attribute location {} has a zero stride",
                    attribute.location
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "vertex_input_tests.rs"]
mod tests;
