//! Lightweight handles to GPU-side resources owned by the renderer.

/// Handle to a mesh stored in the renderer's mesh manager.
///
/// Handles are lightweight and can be copied freely.
/// The actual vertex data is stored by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct MeshHandle(u64);

impl MeshHandle {
    /// Returns the raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Creates a handle from a raw value.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

/// Handle to a material in the renderer's material library.
///
/// [`MaterialHandle::DEFAULT`] always resolves to the shared default material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct MaterialHandle(u64);

impl MaterialHandle {
    /// The shared fallback material.
    pub const DEFAULT: MaterialHandle = MaterialHandle(0);

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}
