/// Buffer - OpenGL implementation of the Buffer trait

use std::rc::Rc;

use glow::HasContext;
use nebula_render::nebula::render::{validate_buffer_update, Buffer, BufferDesc, BufferType, BufferUsage};
use nebula_render::nebula::Result;

use crate::gl_context::{creation_error, GlContext, RawName};
use crate::gl_format::buffer_usage_to_gl;

pub struct GlBuffer {
    ctx: Rc<GlContext>,
    pub(crate) raw: glow::Buffer,
    buffer_type: BufferType,
    usage: BufferUsage,
    size: u64,
}

impl GlBuffer {
    /// Allocate uninitialized storage of `desc.size` bytes
    pub(crate) fn new(ctx: Rc<GlContext>, desc: &BufferDesc) -> Result<Self> {
        let raw = unsafe { ctx.gl.create_buffer() }.map_err(|message| creation_error("buffer", message))?;
        ctx.count(1);
        let buffer = Self {
            ctx,
            raw,
            buffer_type: desc.buffer_type,
            usage: desc.usage,
            size: desc.size,
        };

        let target = buffer.bind();
        unsafe {
            buffer
                .ctx
                .gl
                .buffer_data_size(target, desc.size as i32, buffer_usage_to_gl(desc.usage))
        };
        buffer.ctx.count(1);
        // Dropping `buffer` on failure deletes the GL object
        buffer.ctx.check_error("glBufferData")?;
        Ok(buffer)
    }

    /// Bind for a data transfer, returning the target used
    fn bind(&self) -> u32 {
        match self.buffer_type {
            BufferType::Vertex => {
                self.ctx.bind_array_buffer(Some(self.raw));
                glow::ARRAY_BUFFER
            }
            BufferType::Index => {
                self.ctx.bind_element_buffer_for_upload(self.raw);
                glow::ELEMENT_ARRAY_BUFFER
            }
        }
    }
}

impl Buffer for GlBuffer {
    fn buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn update(&mut self, offset: i64, size: i64, data: &[u8]) -> Result<()> {
        let range = validate_buffer_update(self.size, offset, size, data.len())?;
        let target = self.bind();
        unsafe {
            self.ctx
                .gl
                .buffer_sub_data_u8_slice(target, range.start as i32, &data[..range.len()])
        };
        self.ctx.count(1);
        self.ctx.check_error("glBufferSubData")
    }
}

impl Drop for GlBuffer {
    fn drop(&mut self) {
        self.ctx.state().forget_buffer(self.raw.raw_name());
        unsafe { self.ctx.gl.delete_buffer(self.raw) };
        self.ctx.count(1);
    }
}
