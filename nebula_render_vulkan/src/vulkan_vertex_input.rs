/// VertexInput - Vulkan implementation of the VertexInput trait
///
/// Buffer-backed attributes get one binding per distinct (buffer, stride)
/// pair. Constant attributes read from a small generic buffer bound last
/// with a zero stride, so every vertex sees the same value.

use std::rc::Rc;

use ash::vk;
use nebula_render::nebula::render::{AttributeSource, BufferHandle, VertexInput, VertexInputDesc};
use nebula_render::nebula::Result;

use crate::vulkan_buffer::HostBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::attribute_format_to_vk;

/// Size of one constant attribute slot (vec4 of f32)
const CONSTANT_SLOT_SIZE: u32 = 16;

/// Native description of a vertex input, independent of any device
#[derive(Debug, Clone, Default)]
pub(crate) struct VertexLayout {
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
    /// Vertex buffers in binding order
    pub buffers: Vec<BufferHandle>,
    /// Binding of the constant buffer, after every vertex buffer
    pub constant_binding: Option<u32>,
    /// Bytes of the constant buffer
    pub constant_data: Vec<u8>,
}

/// Translate a vertex input descriptor into bindings and attributes
pub(crate) fn build_vertex_layout(desc: &VertexInputDesc) -> VertexLayout {
    let buffer_bindings = desc.buffer_bindings();
    let mut layout = VertexLayout {
        bindings: buffer_bindings
            .iter()
            .enumerate()
            .map(|(binding, &(_, stride))| vk::VertexInputBindingDescription {
                binding: binding as u32,
                stride,
                input_rate: vk::VertexInputRate::VERTEX,
            })
            .collect(),
        buffers: buffer_bindings.iter().map(|&(buffer, _)| buffer).collect(),
        ..VertexLayout::default()
    };

    let constant_binding = buffer_bindings.len() as u32;
    for attribute in &desc.attributes {
        match attribute.source {
            AttributeSource::Buffer { buffer, stride, offset } => {
                let binding = buffer_bindings
                    .iter()
                    .position(|&(b, s)| b == buffer && s == stride)
                    .unwrap_or_default() as u32;
                layout.attributes.push(vk::VertexInputAttributeDescription {
                    location: attribute.location,
                    binding,
                    format: attribute_format_to_vk(attribute.format),
                    offset,
                });
            }
            AttributeSource::Constant(value) => {
                let offset = layout.constant_data.len() as u32;
                layout.constant_data.extend_from_slice(bytemuck::cast_slice(&value));
                layout.attributes.push(vk::VertexInputAttributeDescription {
                    location: attribute.location,
                    binding: constant_binding,
                    format: vk::Format::R32G32B32A32_SFLOAT,
                    offset,
                });
            }
        }
    }

    if !layout.constant_data.is_empty() {
        debug_assert_eq!(layout.constant_data.len() % CONSTANT_SLOT_SIZE as usize, 0);
        layout.constant_binding = Some(constant_binding);
        layout.bindings.push(vk::VertexInputBindingDescription {
            binding: constant_binding,
            stride: 0,
            input_rate: vk::VertexInputRate::VERTEX,
        });
    }
    layout
}

pub struct VulkanVertexInput {
    desc: VertexInputDesc,
    pub(crate) layout: VertexLayout,
    /// Holds the constant attribute values, if any
    pub(crate) constant_buffer: Option<HostBuffer>,
}

impl VulkanVertexInput {
    pub(crate) fn new(ctx: Rc<GpuContext>, desc: VertexInputDesc) -> Result<Self> {
        let layout = build_vertex_layout(&desc);
        let constant_buffer = if layout.constant_data.is_empty() {
            None
        } else {
            Some(HostBuffer::with_data(
                ctx,
                "constant attribute buffer",
                &layout.constant_data,
                vk::BufferUsageFlags::VERTEX_BUFFER,
            )?)
        };
        Ok(Self {
            desc,
            layout,
            constant_buffer,
        })
    }
}

impl VertexInput for VulkanVertexInput {
    fn desc(&self) -> &VertexInputDesc {
        &self.desc
    }
}

#[cfg(test)]
#[path = "vulkan_vertex_input_tests.rs"]
mod tests;
