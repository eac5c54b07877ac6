/// Typed resource handles and the per-backend resource tables that mint them

use bytemuck::{Pod, Zeroable};
use slotmap::{new_key_type, Key, KeyData, SlotMap};

use crate::error::{Error, Result};

new_key_type! {
    /// Handle to a vertex or index buffer
    pub struct BufferHandle;
    /// Handle to a 2D texture
    pub struct R2TextureHandle;
    /// Handle to a sampler
    pub struct SamplerHandle;
    /// Handle to a single vertex or fragment shader
    pub struct ShaderHandle;
    /// Handle to a linked vertex + fragment shader pair
    pub struct ShaderStageHandle;
    /// Handle to a vertex input layout
    pub struct VertexInputHandle;
}

/// Any resource handle, used by `Renderer::destroy`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceHandle {
    Buffer(BufferHandle),
    R2Texture(R2TextureHandle),
    Sampler(SamplerHandle),
    Shader(ShaderHandle),
    ShaderStage(ShaderStageHandle),
    VertexInput(VertexInputHandle),
}

impl From<BufferHandle> for ResourceHandle {
    fn from(handle: BufferHandle) -> Self {
        ResourceHandle::Buffer(handle)
    }
}

impl From<R2TextureHandle> for ResourceHandle {
    fn from(handle: R2TextureHandle) -> Self {
        ResourceHandle::R2Texture(handle)
    }
}

impl From<SamplerHandle> for ResourceHandle {
    fn from(handle: SamplerHandle) -> Self {
        ResourceHandle::Sampler(handle)
    }
}

impl From<ShaderHandle> for ResourceHandle {
    fn from(handle: ShaderHandle) -> Self {
        ResourceHandle::Shader(handle)
    }
}

impl From<ShaderStageHandle> for ResourceHandle {
    fn from(handle: ShaderStageHandle) -> Self {
        ResourceHandle::ShaderStage(handle)
    }
}

impl From<VertexInputHandle> for ResourceHandle {
    fn from(handle: VertexInputHandle) -> Self {
        ResourceHandle::VertexInput(handle)
    }
}

/// Handle stored inside command payloads
///
/// `0` means "no resource". Occupied slotmap keys always carry an odd
/// version in their upper 32 bits, so a live key never encodes to 0.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct RawHandle(pub u64);

impl RawHandle {
    pub const NONE: RawHandle = RawHandle(0);

    pub fn from_key<K: Key>(key: K) -> Self {
        if key.is_null() {
            Self::NONE
        } else {
            RawHandle(key.data().as_ffi())
        }
    }

    pub fn from_option<K: Key>(key: Option<K>) -> Self {
        key.map_or(Self::NONE, Self::from_key)
    }

    pub fn to_key<K: Key>(self) -> Option<K> {
        if self.is_none() {
            None
        } else {
            Some(KeyData::from_ffi(self.0).into())
        }
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// Generational storage for one resource kind
///
/// Lookups of stale or foreign handles fail with `Error::InvalidResource`
/// instead of panicking.
pub struct ResourceTable<K: Key, T> {
    kind: &'static str,
    slots: SlotMap<K, T>,
}

impl<K: Key, T> ResourceTable<K, T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: SlotMap::with_key(),
        }
    }

    pub fn insert(&mut self, value: T) -> K {
        self.slots.insert(value)
    }

    /// Insert a value that needs to know its own handle (shader variables do)
    pub fn insert_with_key(&mut self, build: impl FnOnce(K) -> T) -> K {
        self.slots.insert_with_key(build)
    }

    pub fn get(&self, key: K) -> Result<&T> {
        let kind = self.kind;
        self.slots
            .get(key)
            .ok_or_else(|| Error::InvalidResource(format!("Unknown {} handle {:?}", kind, key.data())))
    }

    pub fn get_mut(&mut self, key: K) -> Result<&mut T> {
        let kind = self.kind;
        self.slots
            .get_mut(key)
            .ok_or_else(|| Error::InvalidResource(format!("Unknown {} handle {:?}", kind, key.data())))
    }

    pub fn remove(&mut self, key: K) -> Result<T> {
        let kind = self.kind;
        self.slots
            .remove(key)
            .ok_or_else(|| Error::InvalidResource(format!("Unknown {} handle {:?}", kind, key.data())))
    }

    pub fn contains(&self, key: K) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.slots.iter()
    }

    /// Drop every resource; used by renderers to control destruction order
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
