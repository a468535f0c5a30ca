//! Vertex buffer paired with an optional index buffer.

use bytemuck::Pod;

use crate::gpu::buffer::{IndexBuffer, VertexBuffer};

/// Geometry ready to be drawn with a single call.
pub struct VertexArray {
    vertices: VertexBuffer,
    indices: Option<IndexBuffer>,
}

impl VertexArray {
    pub fn new<V: Pod>(device: &wgpu::Device, label: &str, vertices: &[V], indices: Option<&[u32]>) -> Self {
        let vertices = VertexBuffer::new(device, &format!("{label} Vertices"), vertices);
        let indices = indices
            .filter(|i| !i.is_empty())
            .map(|i| IndexBuffer::new(device, &format!("{label} Indices"), i));
        Self { vertices, indices }
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.count()
    }

    pub fn index_count(&self) -> u32 {
        self.indices.as_ref().map(IndexBuffer::count).unwrap_or(0)
    }

    /// Returns true if this array uses indexed drawing.
    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    /// Binds the buffers to slot 0 and issues the draw.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertices.raw().slice(..));
        match &self.indices {
            Some(indices) => {
                pass.set_index_buffer(indices.raw().slice(..), indices.format());
                pass.draw_indexed(0..indices.count(), 0, 0..1);
            }
            None => pass.draw(0..self.vertices.count(), 0..1),
        }
    }
}
