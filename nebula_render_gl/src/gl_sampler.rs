/// Sampler - OpenGL implementation of the Sampler trait
///
/// With sampler objects the state lives in a GL sampler bound per unit.
/// Without them the descriptor is applied as texture parameters on the
/// texture it is drawn with (see `GlR2Texture::apply_sampler`).

use std::rc::Rc;

use glow::HasContext;
use nebula_render::nebula::render::{Sampler, SamplerDesc};
use nebula_render::nebula::Result;

use crate::gl_context::{creation_error, GlContext, RawName};
use crate::gl_format::{address_mode_to_gl, mag_filter_to_gl, min_filter_to_gl};

/// Integer parameters (name, value) for a descriptor
fn integer_parameters(desc: &SamplerDesc) -> [(u32, i32); 4] {
    [
        (glow::TEXTURE_MIN_FILTER, min_filter_to_gl(desc.min_filter, desc.mipmap_mode)),
        (glow::TEXTURE_MAG_FILTER, mag_filter_to_gl(desc.mag_filter)),
        (glow::TEXTURE_WRAP_S, address_mode_to_gl(desc.address_u)),
        (glow::TEXTURE_WRAP_T, address_mode_to_gl(desc.address_v)),
    ]
}

/// Apply `desc` to the texture bound to TEXTURE_2D on the active unit
pub(crate) fn apply_texture_parameters(ctx: &GlContext, desc: &SamplerDesc) {
    for (name, value) in integer_parameters(desc) {
        unsafe { ctx.gl.tex_parameter_i32(glow::TEXTURE_2D, name, value) };
    }
    ctx.count(4);
    if ctx.features.is_anisotropy_available {
        unsafe {
            ctx.gl
                .tex_parameter_f32(glow::TEXTURE_2D, glow::TEXTURE_MAX_ANISOTROPY_EXT, desc.anisotropy)
        };
        ctx.count(1);
    }
}

pub struct GlSampler {
    ctx: Rc<GlContext>,
    /// `None` without sampler objects
    pub(crate) raw: Option<glow::Sampler>,
    desc: SamplerDesc,
}

impl GlSampler {
    /// `desc` must already be clamped to the device range
    pub(crate) fn new(ctx: Rc<GlContext>, desc: SamplerDesc) -> Result<Self> {
        if !ctx.features.is_sampler_available {
            return Ok(Self { ctx, raw: None, desc });
        }

        let raw = unsafe { ctx.gl.create_sampler() }.map_err(|message| creation_error("sampler", message))?;
        ctx.count(1);
        let sampler = Self {
            ctx,
            raw: Some(raw),
            desc,
        };
        let gl = &sampler.ctx.gl;
        for (name, value) in integer_parameters(&desc) {
            unsafe { gl.sampler_parameter_i32(raw, name, value) };
        }
        sampler.ctx.count(4);
        if sampler.ctx.features.is_anisotropy_available {
            unsafe { gl.sampler_parameter_f32(raw, glow::TEXTURE_MAX_ANISOTROPY_EXT, desc.anisotropy) };
            sampler.ctx.count(1);
        }
        sampler.ctx.check_error("glSamplerParameter")?;
        Ok(sampler)
    }
}

impl Sampler for GlSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

impl Drop for GlSampler {
    fn drop(&mut self) {
        if let Some(raw) = self.raw {
            self.ctx.state().forget_sampler(raw.raw_name());
            unsafe { self.ctx.gl.delete_sampler(raw) };
            self.ctx.count(1);
        }
    }
}
