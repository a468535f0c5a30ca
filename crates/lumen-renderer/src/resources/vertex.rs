//! Vertex format shared by every mesh pipeline.

use lumen_core::PrimitiveGeometry;

/// Position, normal and texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }

    /// Interleaves generated streams. Missing normals or uvs become zero.
    pub fn from_geometry(geometry: &PrimitiveGeometry) -> Vec<MeshVertex> {
        geometry
            .positions
            .iter()
            .enumerate()
            .map(|(i, position)| MeshVertex {
                position: *position,
                normal: geometry.normals.get(i).copied().unwrap_or_default(),
                uv: geometry.uvs.get(i).copied().unwrap_or_default(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use lumen_core::PrimitiveShape;

    use super::*;

    #[test]
    fn test_layout_stride() {
        let layout = MeshVertex::layout();
        assert_eq!(layout.array_stride, 32);
        assert_eq!(layout.attributes[2].offset, 24);
    }

    #[test]
    fn test_from_geometry_interleaves() {
        let geometry = PrimitiveShape::Plane.generate();
        let vertices = MeshVertex::from_geometry(&geometry);
        assert_eq!(vertices.len(), geometry.vertex_count());
        assert_eq!(vertices[0].position, geometry.positions[0]);
        assert_eq!(vertices[0].normal, [0.0, 1.0, 0.0]);
        assert_eq!(vertices[0].uv, geometry.uvs[0]);
    }
}
