/// Shared GL context: the glow function table, the state cache and the
/// native call counter
///
/// Resources keep an `Rc<GlContext>` so they can issue calls from their own
/// trait methods (buffer updates, texture uploads) and delete their objects
/// on drop. Every native call goes through a helper here or is counted with
/// `count`.

use std::cell::{Cell, RefCell, RefMut};
use std::ffi::c_void;

use glow::HasContext;
use nebula_render::engine_error;
use nebula_render::nebula::render::{DeviceFeatures, Rect};
use nebula_render::nebula::{Error, NativeError, Result};

use crate::gl_format::{drain_errors, gl_error_name, ErrorDrain};
use crate::gl_probe::{EntryPointVariant, GlProbeReport, GlVersion};
use crate::gl_state::{Capability, GlState};

const SOURCE: &str = "nebula::gl";

/// `glGenerateMipmapEXT`
type GenerateMipmapExtFn = unsafe extern "system" fn(target: u32);

/// Raw object name behind a glow handle
pub(crate) trait RawName {
    fn raw_name(self) -> u32;
}

macro_rules! impl_raw_name {
    ($($ty:ty),*) => {
        $(impl RawName for $ty {
            fn raw_name(self) -> u32 {
                self.0.get()
            }
        })*
    };
}

impl_raw_name!(glow::NativeBuffer, glow::NativeTexture, glow::NativeSampler, glow::NativeProgram, glow::NativeVertexArray);

/// Wrap a glow creation failure (which only carries a message)
pub(crate) fn creation_error(what: &str, message: String) -> Error {
    Error::native(format!("Failed to create {}", what), NativeError::new("OpenGL", 0, message))
}

pub(crate) struct GlContext {
    pub gl: glow::Context,
    pub features: DeviceFeatures,
    pub mipmap_variant: Option<EntryPointVariant>,
    pub version: GlVersion,
    generate_mipmap_ext: Option<GenerateMipmapExtFn>,
    state: RefCell<GlState>,
    native_calls: Cell<u64>,
}

impl GlContext {
    /// `resolve` looks up extension entry points glow does not load
    pub fn new(gl: glow::Context, report: &GlProbeReport, resolve: impl Fn(&str) -> *const c_void) -> Result<Self> {
        let generate_mipmap_ext = match report.mipmap_variant {
            Some(EntryPointVariant::Ext) => {
                let address = resolve("glGenerateMipmapEXT");
                if address.is_null() {
                    return Err(Error::InitializationFailed(
                        "GL_EXT_framebuffer_object advertised without glGenerateMipmapEXT".to_string(),
                    ));
                }
                // SAFETY: the loader returned this address for glGenerateMipmapEXT,
                // whose C signature is void(GLenum)
                Some(unsafe { std::mem::transmute::<*const c_void, GenerateMipmapExtFn>(address) })
            }
            _ => None,
        };

        Ok(Self {
            gl,
            features: report.features.clone(),
            mipmap_variant: report.mipmap_variant,
            version: report.version,
            generate_mipmap_ext,
            state: RefCell::new(GlState::new()),
            native_calls: Cell::new(0),
        })
    }

    /// Record `n` native calls
    pub fn count(&self, n: u64) {
        self.native_calls.set(self.native_calls.get() + n);
    }

    pub fn native_calls(&self) -> u64 {
        self.native_calls.get()
    }

    pub fn state(&self) -> RefMut<'_, GlState> {
        self.state.borrow_mut()
    }

    /// Drain the GL error queue; the first error becomes the result
    ///
    /// A queue that never empties is reported as a lost context.
    pub fn check_error(&self, context: &str) -> Result<()> {
        let drained = drain_errors(|| {
            self.count(1);
            unsafe { self.gl.get_error() }
        });
        match drained {
            ErrorDrain::Clear => Ok(()),
            ErrorDrain::First(glow::OUT_OF_MEMORY) => {
                engine_error!(SOURCE, "{}: GL_OUT_OF_MEMORY", context);
                Err(Error::OutOfMemory)
            }
            ErrorDrain::First(code) => {
                engine_error!(SOURCE, "{}: {}", context, gl_error_name(code));
                Err(Error::native(
                    context,
                    NativeError::new("OpenGL", code as i64, gl_error_name(code)),
                ))
            }
            ErrorDrain::Stuck(code) => {
                engine_error!(
                    SOURCE,
                    "{}: {} never cleared, treating the context as lost",
                    context,
                    gl_error_name(code)
                );
                Err(Error::native(
                    context,
                    NativeError::new("OpenGL", glow::CONTEXT_LOST as i64, "GL_CONTEXT_LOST"),
                ))
            }
        }
    }

    // ===== BINDINGS =====

    pub fn use_program(&self, program: Option<glow::Program>) {
        if self.state().program.set(program.map_or(0, RawName::raw_name)) {
            unsafe { self.gl.use_program(program) };
            self.count(1);
        }
    }

    pub fn bind_vertex_array(&self, vao: Option<glow::VertexArray>) {
        if self.state().bind_vertex_array(vao.map_or(0, RawName::raw_name)) {
            unsafe { self.gl.bind_vertex_array(vao) };
            self.count(1);
        }
    }

    pub fn bind_array_buffer(&self, buffer: Option<glow::Buffer>) {
        if self.state().array_buffer.set(buffer.map_or(0, RawName::raw_name)) {
            unsafe { self.gl.bind_buffer(glow::ARRAY_BUFFER, buffer) };
            self.count(1);
        }
    }

    /// Bind into the current VAO (or the default one without VAOs)
    pub fn bind_element_buffer(&self, buffer: Option<glow::Buffer>) {
        if self.state().element_buffer.set(buffer.map_or(0, RawName::raw_name)) {
            unsafe { self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, buffer) };
            self.count(1);
        }
    }

    /// Bind an index buffer for an upload without touching any VAO's binding
    pub fn bind_element_buffer_for_upload(&self, buffer: glow::Buffer) {
        if self.features.is_vao_available {
            self.bind_vertex_array(None);
        }
        self.bind_element_buffer(Some(buffer));
    }

    /// Make `unit` the target of texture parameter calls
    pub fn select_unit(&self, unit: u32) {
        if self.state().active_unit.set(unit) {
            unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) };
            self.count(1);
        }
    }

    pub fn bind_texture(&self, unit: u32, texture: Option<glow::Texture>) {
        let name = texture.map_or(0, RawName::raw_name);
        if self.state().textures[unit as usize].set(name) {
            self.select_unit(unit);
            unsafe { self.gl.bind_texture(glow::TEXTURE_2D, texture) };
            self.count(1);
        }
    }

    /// Bind on unit 0 for uploads and parameter changes
    pub fn bind_texture_for_update(&self, texture: glow::Texture) {
        self.bind_texture(0, Some(texture));
        self.select_unit(0);
    }

    pub fn bind_sampler(&self, unit: u32, sampler: Option<glow::Sampler>) {
        if self.state().samplers[unit as usize].set(sampler.map_or(0, RawName::raw_name)) {
            unsafe { self.gl.bind_sampler(unit, sampler) };
            self.count(1);
        }
    }

    // ===== FIXED FUNCTION =====

    pub fn set_capability(&self, capability: Capability, enabled: bool) {
        if self.state().set_capability(capability, enabled) {
            unsafe {
                if enabled {
                    self.gl.enable(capability.to_gl());
                } else {
                    self.gl.disable(capability.to_gl());
                }
            }
            self.count(1);
        }
    }

    pub fn depth_mask(&self, enabled: bool) {
        if self.state().depth_mask.set(enabled) {
            unsafe { self.gl.depth_mask(enabled) };
            self.count(1);
        }
    }

    pub fn blend_func(&self, src: u32, dst: u32) {
        if self.state().blend_func.set((src, dst)) {
            unsafe { self.gl.blend_func(src, dst) };
            self.count(1);
        }
    }

    pub fn viewport(&self, rect: Rect) {
        if self.state().viewport.set(rect) {
            unsafe { self.gl.viewport(rect.x, rect.y, rect.width, rect.height) };
            self.count(1);
        }
    }

    pub fn scissor(&self, rect: Rect) {
        if self.state().scissor_box.set(rect) {
            unsafe { self.gl.scissor(rect.x, rect.y, rect.width, rect.height) };
            self.count(1);
        }
    }

    /// Enable exactly the attribute arrays in `mask` (no VAO bound)
    pub fn set_enabled_attributes(&self, mask: u64) {
        let (enable, disable) = self.state().attribute_mask_delta(mask);
        for location in crate::gl_state::mask_bits(enable) {
            unsafe { self.gl.enable_vertex_attrib_array(location) };
            self.count(1);
        }
        for location in crate::gl_state::mask_bits(disable) {
            unsafe { self.gl.disable_vertex_attrib_array(location) };
            self.count(1);
        }
    }

    // ===== EXTENSION ENTRY POINTS =====

    /// Generate mip levels of the texture bound to TEXTURE_2D
    pub fn generate_mipmap(&self) -> Result<()> {
        match (self.mipmap_variant, self.generate_mipmap_ext) {
            (Some(EntryPointVariant::Core), _) => unsafe { self.gl.generate_mipmap(glow::TEXTURE_2D) },
            (Some(EntryPointVariant::Ext), Some(generate)) => unsafe { generate(glow::TEXTURE_2D) },
            _ => return Err(Error::Unsupported("Hardware mipmap generation is not available".to_string())),
        }
        self.count(1);
        self.check_error("glGenerateMipmap")
    }
}
