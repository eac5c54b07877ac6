/// VertexInput - OpenGL implementation of the VertexInput trait
///
/// With VAOs the buffer-backed attributes and the index buffer are recorded
/// once at creation. Without them everything is rebound per draw. Constant
/// attributes never live in a VAO: their array stays disabled and the value
/// is set with `glVertexAttrib4f` before each draw.

use std::rc::Rc;

use glow::HasContext;
use nebula_render::nebula::render::{AttributeSource, BufferHandle, VertexInput, VertexInputDesc};
use nebula_render::nebula::Result;

use crate::gl_context::{creation_error, GlContext, RawName};
use crate::gl_format::attribute_format_to_gl;

pub struct GlVertexInput {
    ctx: Rc<GlContext>,
    desc: VertexInputDesc,
    vao: Option<glow::VertexArray>,
}

impl GlVertexInput {
    /// `resolve` maps a validated buffer handle to its GL buffer
    pub(crate) fn new(
        ctx: Rc<GlContext>,
        desc: VertexInputDesc,
        resolve: impl Fn(BufferHandle) -> Result<glow::Buffer>,
    ) -> Result<Self> {
        if !ctx.features.is_vao_available {
            return Ok(Self { ctx, desc, vao: None });
        }

        let vao = unsafe { ctx.gl.create_vertex_array() }.map_err(|message| creation_error("vertex array", message))?;
        ctx.count(1);
        let input = Self {
            ctx,
            desc,
            vao: Some(vao),
        };
        input.ctx.bind_vertex_array(Some(vao));
        input.bind_buffers(&resolve)?;
        input.ctx.check_error("glVertexAttribPointer")?;
        Ok(input)
    }

    /// Point every buffer-backed attribute at its buffer and bind the
    /// index buffer, into whichever VAO is current
    fn bind_buffers(&self, resolve: &impl Fn(BufferHandle) -> Result<glow::Buffer>) -> Result<()> {
        let gl = &self.ctx.gl;
        for attribute in &self.desc.attributes {
            let AttributeSource::Buffer { buffer, stride, offset } = attribute.source else { continue };
            self.ctx.bind_array_buffer(Some(resolve(buffer)?));
            let (size, component_type, is_normalized) = attribute_format_to_gl(attribute.format);
            unsafe {
                gl.vertex_attrib_pointer_f32(
                    attribute.location,
                    size,
                    component_type,
                    is_normalized,
                    stride as i32,
                    offset as i32,
                );
                if self.vao.is_some() {
                    gl.enable_vertex_attrib_array(attribute.location);
                }
            }
            self.ctx.count(if self.vao.is_some() { 2 } else { 1 });
        }
        self.ctx.bind_element_buffer(Some(resolve(self.desc.index_buffer)?));
        Ok(())
    }

    /// Attribute locations fed from buffers, one bit each
    fn buffer_attribute_mask(&self) -> u64 {
        self.desc
            .attributes
            .iter()
            .filter(|attribute| matches!(attribute.source, AttributeSource::Buffer { .. }))
            .fold(0, |mask, attribute| mask | (1u64 << attribute.location))
    }

    /// Make this input current for a draw
    pub(crate) fn bind(&self, resolve: impl Fn(BufferHandle) -> Result<glow::Buffer>) -> Result<()> {
        match self.vao {
            Some(vao) => self.ctx.bind_vertex_array(Some(vao)),
            None => {
                self.ctx.set_enabled_attributes(self.buffer_attribute_mask());
                self.bind_buffers(&resolve)?;
            }
        }

        for attribute in &self.desc.attributes {
            if let AttributeSource::Constant([x, y, z, w]) = attribute.source {
                unsafe { self.ctx.gl.vertex_attrib_4_f32(attribute.location, x, y, z, w) };
                self.ctx.count(1);
            }
        }
        Ok(())
    }
}

impl VertexInput for GlVertexInput {
    fn desc(&self) -> &VertexInputDesc {
        &self.desc
    }
}

impl Drop for GlVertexInput {
    fn drop(&mut self) {
        if let Some(vao) = self.vao {
            self.ctx.state().forget_vertex_array(vao.raw_name());
            unsafe { self.ctx.gl.delete_vertex_array(vao) };
            self.ctx.count(1);
        }
    }
}
