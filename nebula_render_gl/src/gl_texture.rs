/// R2Texture - OpenGL implementation of the R2Texture trait

use std::cell::Cell;
use std::rc::Rc;

use glow::HasContext;
use nebula_render::nebula::render::{
    check_generate_mipmaps, validate_mip_upload, R2Texture, R2TextureInfo, SamplerDesc,
};
use nebula_render::nebula::Result;

use crate::gl_context::{creation_error, GlContext, RawName};
use crate::gl_format::pixel_format_to_gl;
use crate::gl_sampler::apply_texture_parameters;

pub struct GlR2Texture {
    ctx: Rc<GlContext>,
    pub(crate) raw: glow::Texture,
    info: R2TextureInfo,
    /// Sampler state last written as texture parameters (no sampler objects)
    applied_sampler: Cell<Option<SamplerDesc>>,
}

impl GlR2Texture {
    /// Allocate every level of an already validated texture
    pub(crate) fn new(ctx: Rc<GlContext>, info: R2TextureInfo) -> Result<Self> {
        let raw = unsafe { ctx.gl.create_texture() }.map_err(|message| creation_error("texture", message))?;
        ctx.count(1);
        let texture = Self {
            ctx,
            raw,
            info,
            applied_sampler: Cell::new(None),
        };

        let ctx = &texture.ctx;
        ctx.bind_texture_for_update(raw);
        // ES 2.0 has no TEXTURE_MAX_LEVEL; the level count is implied there
        if !ctx.version.is_embedded || ctx.version.at_least(3, 0) {
            unsafe {
                ctx.gl.tex_parameter_i32(
                    glow::TEXTURE_2D,
                    glow::TEXTURE_MAX_LEVEL,
                    texture.info.mip_count as i32 - 1,
                )
            };
            ctx.count(1);
        }

        let (internal_format, format, component_type) = pixel_format_to_gl(texture.info.format);
        for level in 0..texture.info.mip_count {
            let (width, height) = texture.info.mip_extent(level);
            unsafe {
                ctx.gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    level as i32,
                    internal_format,
                    width as i32,
                    height as i32,
                    0,
                    format,
                    component_type,
                    glow::PixelUnpackData::Slice(None),
                )
            };
        }
        ctx.count(texture.info.mip_count as u64);
        ctx.check_error("glTexImage2D")?;
        Ok(texture)
    }

    /// Write sampler state into the texture if it differs from the last one
    ///
    /// The texture must be bound on the active unit.
    pub(crate) fn apply_sampler(&self, desc: &SamplerDesc) {
        if self.applied_sampler.get().as_ref() != Some(desc) {
            apply_texture_parameters(&self.ctx, desc);
            self.applied_sampler.set(Some(*desc));
        }
    }
}

impl R2Texture for GlR2Texture {
    fn info(&self) -> &R2TextureInfo {
        &self.info
    }

    fn update(&mut self, mip_level: u32, data: &[u8]) -> Result<()> {
        validate_mip_upload(&self.info, mip_level, data.len())?;
        let (_, format, component_type) = pixel_format_to_gl(self.info.format);
        let (width, height) = self.info.mip_extent(mip_level);

        self.ctx.bind_texture_for_update(self.raw);
        unsafe {
            self.ctx.gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                mip_level as i32,
                0,
                0,
                width as i32,
                height as i32,
                format,
                component_type,
                glow::PixelUnpackData::Slice(Some(data)),
            )
        };
        self.ctx.count(1);
        self.ctx.check_error("glTexSubImage2D")
    }

    fn generate_mipmaps(&mut self) -> Result<()> {
        if !check_generate_mipmaps(&self.info, &self.ctx.features)? {
            return Ok(());
        }
        self.ctx.bind_texture_for_update(self.raw);
        self.ctx.generate_mipmap()
    }
}

impl Drop for GlR2Texture {
    fn drop(&mut self) {
        self.ctx.state().forget_texture(self.raw.raw_name());
        unsafe { self.ctx.gl.delete_texture(self.raw) };
        self.ctx.count(1);
    }
}
