/// Shadow copy of GL binding and fixed-function state
///
/// Every setter returns whether the native call is needed, so redundant
/// binds and enables never reach the driver.

use nebula_render::nebula::render::{Rect, MAX_TEXTURE_UNITS};

/// One cached piece of state, unknown until first set
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Cached<T> {
    value: Option<T>,
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T: Copy + PartialEq> Cached<T> {
    /// Record `value`; `true` when it differs from what the driver holds
    pub fn set(&mut self, value: T) -> bool {
        if self.value == Some(value) {
            return false;
        }
        self.value = Some(value);
        true
    }

    pub fn get(&self) -> Option<T> {
        self.value
    }

    pub fn invalidate(&mut self) {
        self.value = None;
    }

    /// Forget the value only if it equals `value`
    pub fn forget(&mut self, value: T) {
        if self.value == Some(value) {
            self.value = None;
        }
    }
}

/// Capabilities toggled with glEnable/glDisable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Capability {
    CullFace,
    Blend,
    DepthTest,
    ScissorTest,
}

impl Capability {
    pub fn to_gl(self) -> u32 {
        match self {
            Capability::CullFace => glow::CULL_FACE,
            Capability::Blend => glow::BLEND,
            Capability::DepthTest => glow::DEPTH_TEST,
            Capability::ScissorTest => glow::SCISSOR_TEST,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Native object names are stored as raw `u32`s so the cache stays
/// independent of glow's handle wrappers.
#[derive(Debug, Default)]
pub(crate) struct GlState {
    pub program: Cached<u32>,
    pub vertex_array: Cached<u32>,
    pub array_buffer: Cached<u32>,
    /// Part of VAO state; invalidated whenever the VAO changes
    pub element_buffer: Cached<u32>,
    pub active_unit: Cached<u32>,
    pub textures: [Cached<u32>; MAX_TEXTURE_UNITS],
    pub samplers: [Cached<u32>; MAX_TEXTURE_UNITS],
    capabilities: [Cached<bool>; 4],
    pub depth_mask: Cached<bool>,
    /// (src, dst) GL blend factors
    pub blend_func: Cached<(u32, u32)>,
    pub viewport: Cached<Rect>,
    pub scissor_box: Cached<Rect>,
    /// Attribute arrays enabled outside any VAO, one bit per location
    pub enabled_attributes: u64,
}

impl GlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_capability(&mut self, capability: Capability, enabled: bool) -> bool {
        self.capabilities[capability.slot()].set(enabled)
    }

    pub fn capability(&self, capability: Capability) -> Option<bool> {
        self.capabilities[capability.slot()].get()
    }

    /// Switching VAOs swaps the element buffer binding with it
    pub fn bind_vertex_array(&mut self, vao: u32) -> bool {
        if self.vertex_array.set(vao) {
            self.element_buffer.invalidate();
            true
        } else {
            false
        }
    }

    /// Bits to enable and to disable to reach `wanted`
    pub fn attribute_mask_delta(&mut self, wanted: u64) -> (u64, u64) {
        let enable = wanted & !self.enabled_attributes;
        let disable = self.enabled_attributes & !wanted;
        self.enabled_attributes = wanted;
        (enable, disable)
    }

    /// Drop every cached reference to a deleted object
    pub fn forget_buffer(&mut self, name: u32) {
        self.array_buffer.forget(name);
        self.element_buffer.forget(name);
    }

    pub fn forget_texture(&mut self, name: u32) {
        for unit in &mut self.textures {
            unit.forget(name);
        }
    }

    pub fn forget_sampler(&mut self, name: u32) {
        for unit in &mut self.samplers {
            unit.forget(name);
        }
    }

    pub fn forget_program(&mut self, name: u32) {
        self.program.forget(name);
    }

    pub fn forget_vertex_array(&mut self, name: u32) {
        if self.vertex_array.get() == Some(name) {
            self.vertex_array.invalidate();
            self.element_buffer.invalidate();
        }
    }

    /// Forget everything, e.g. after a context loss
    pub fn invalidate_all(&mut self) {
        *self = Self::default();
    }
}

/// Bit positions set in `mask`, lowest first
pub(crate) fn mask_bits(mask: u64) -> impl Iterator<Item = u32> {
    (0..64).filter(move |bit| mask & (1u64 << bit) != 0)
}

#[cfg(test)]
#[path = "gl_state_tests.rs"]
mod tests;
