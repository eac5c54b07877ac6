/// Window + GL context supplied by the windowing layer
///
/// The renderer never creates windows or contexts itself. The windowing
/// layer hands over an object whose context is already current on the
/// rendering thread.

use std::ffi::c_void;

use nebula_render::nebula::Result;

pub trait GlWindow {
    /// Address of a GL entry point, null when the driver lacks it
    fn get_proc_address(&self, name: &str) -> *const c_void;

    /// Show the back buffer
    fn swap_buffers(&self) -> Result<()>;

    /// Set the swap interval (0 = off, 1 = vsync); `false` if refused
    fn set_swap_interval(&self, interval: u32) -> bool;

    /// Whether a context with `samples` MSAA samples can be created for this
    /// window's pixel format
    ///
    /// Used by capability probing only; the live context is not replaced.
    fn supports_samples(&self, samples: u32) -> bool;

    /// Called after the renderer is resized
    fn resize(&self, _width: u32, _height: u32) {}
}
