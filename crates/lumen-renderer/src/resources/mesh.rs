//! Mesh resource management.

use std::collections::HashMap;

use glam::Vec3;
use lumen_core::{MeshHandle, PrimitiveShape};

use crate::gpu::vertex_array::VertexArray;
use crate::resources::MeshVertex;

/// Axis-aligned bounds in mesh space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Inverted box that any point expands.
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Radius of the enclosing sphere around [`center`](Self::center).
    pub fn radius(&self) -> f32 {
        if self.is_empty() {
            0.0
        } else {
            (self.max - self.min).length() * 0.5
        }
    }
}

/// CPU mesh data for uploading to the GPU.
#[derive(Debug, Clone)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Option<Vec<u32>>,
    pub bounds: BoundingBox,
}

impl MeshData {
    /// Non-indexed mesh.
    pub fn new(vertices: Vec<MeshVertex>) -> Self {
        let bounds = Self::compute_bounds(&vertices);
        Self {
            vertices,
            indices: None,
            bounds,
        }
    }

    pub fn indexed(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        let bounds = Self::compute_bounds(&vertices);
        Self {
            vertices,
            indices: Some(indices),
            bounds,
        }
    }

    pub fn from_primitive(shape: PrimitiveShape) -> Self {
        let geometry = shape.generate();
        Self::indexed(MeshVertex::from_geometry(&geometry), geometry.indices)
    }

    fn compute_bounds(vertices: &[MeshVertex]) -> BoundingBox {
        vertices.iter().fold(BoundingBox::empty(), |bounds, v| {
            let p = Vec3::from(v.position);
            BoundingBox::new(bounds.min.min(p), bounds.max.max(p))
        })
    }
}

/// Uploaded mesh.
pub struct GpuMesh {
    pub geometry: VertexArray,
    pub bounds: BoundingBox,
}

/// Owns uploaded meshes and hands out handles to them.
///
/// Primitive shapes are uploaded once and shared by every component that
/// asks for the same shape.
pub struct MeshManager {
    meshes: HashMap<MeshHandle, GpuMesh>,
    primitives: HashMap<PrimitiveShape, MeshHandle>,
    next_handle: u64,
}

impl MeshManager {
    pub fn new() -> Self {
        Self {
            meshes: HashMap::new(),
            primitives: HashMap::new(),
            next_handle: 1,
        }
    }

    /// Uploads mesh data and returns its handle.
    pub fn create(&mut self, device: &wgpu::Device, label: &str, data: &MeshData) -> MeshHandle {
        let handle = MeshHandle::from_raw(self.next_handle);
        self.next_handle += 1;

        let geometry = VertexArray::new(device, label, &data.vertices, data.indices.as_deref());
        self.meshes.insert(
            handle,
            GpuMesh {
                geometry,
                bounds: data.bounds,
            },
        );
        tracing::debug!(
            "Uploaded mesh '{}' as {:?} ({} vertices)",
            label,
            handle,
            data.vertices.len()
        );
        handle
    }

    /// Handle of the shared mesh for `shape`, uploading it on first use.
    pub fn primitive(&mut self, device: &wgpu::Device, shape: PrimitiveShape) -> MeshHandle {
        if let Some(handle) = self.primitives.get(&shape) {
            return *handle;
        }
        let handle = self.create(device, shape.name(), &MeshData::from_primitive(shape));
        self.primitives.insert(shape, handle);
        handle
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&GpuMesh> {
        self.meshes.get(&handle)
    }

    /// Removes a mesh; its GPU buffers are released on drop.
    pub fn remove(&mut self, handle: MeshHandle) -> Option<GpuMesh> {
        self.primitives.retain(|_, h| *h != handle);
        self.meshes.remove(&handle)
    }

    pub fn contains(&self, handle: MeshHandle) -> bool {
        self.meshes.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
        self.primitives.clear();
    }
}

impl Default for MeshManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_context;

    #[test]
    fn test_bounds() {
        let data = MeshData::from_primitive(PrimitiveShape::Cube);
        assert_eq!(data.bounds.min, Vec3::splat(-0.5));
        assert_eq!(data.bounds.max, Vec3::splat(0.5));
        assert_eq!(data.bounds.center(), Vec3::ZERO);
        assert!(BoundingBox::empty().is_empty());
        assert_eq!(MeshData::new(Vec::new()).bounds.radius(), 0.0);
    }

    #[test]
    fn test_primitive_is_shared() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut meshes = MeshManager::new();
        let a = meshes.primitive(ctx.device(), PrimitiveShape::Cube);
        let b = meshes.primitive(ctx.device(), PrimitiveShape::Cube);
        let c = meshes.primitive(ctx.device(), PrimitiveShape::sphere());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes.get(a).unwrap().geometry.index_count(), 36);

        meshes.remove(a);
        let d = meshes.primitive(ctx.device(), PrimitiveShape::Cube);
        assert_ne!(a, d);
    }
}
