//! Typed vertex, index and uniform buffers.

use std::marker::PhantomData;
use std::num::NonZeroU64;

use bytemuck::Pod;
use wgpu::util::DeviceExt;

/// Rounds `value` up to a multiple of `alignment`.
pub fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Immutable vertex data.
pub struct VertexBuffer {
    raw: wgpu::Buffer,
    count: u32,
}

impl VertexBuffer {
    pub fn new<V: Pod>(device: &wgpu::Device, label: &str, vertices: &[V]) -> Self {
        let raw = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            raw,
            count: vertices.len() as u32,
        }
    }

    pub fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Immutable 32-bit index data.
pub struct IndexBuffer {
    raw: wgpu::Buffer,
    count: u32,
}

impl IndexBuffer {
    pub fn new(device: &wgpu::Device, label: &str, indices: &[u32]) -> Self {
        let raw = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            raw,
            count: indices.len() as u32,
        }
    }

    pub fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn format(&self) -> wgpu::IndexFormat {
        wgpu::IndexFormat::Uint32
    }
}

/// A uniform buffer holding exactly one `T`.
pub struct UniformBuffer<T: Pod> {
    raw: wgpu::Buffer,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    pub fn new(device: &wgpu::Device, label: &str, initial: &T) -> Self {
        let raw = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(initial),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub fn write(&self, queue: &wgpu::Queue, value: &T) {
        queue.write_buffer(&self.raw, 0, bytemuck::bytes_of(value));
    }

    pub fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }

    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        self.raw.as_entire_binding()
    }

    /// Size of `T` as a binding size.
    pub fn min_binding_size() -> Option<NonZeroU64> {
        NonZeroU64::new(std::mem::size_of::<T>() as u64)
    }
}

/// An array of `T` addressed by dynamic offsets.
///
/// Elements are staged on the CPU with [`push`](Self::push) and written in
/// one upload. The GPU buffer grows when the staged count exceeds capacity;
/// callers must rebuild bind groups when [`upload`](Self::upload) reports
/// growth.
pub struct DynamicUniformBuffer<T: Pod> {
    label: String,
    raw: wgpu::Buffer,
    stride: u64,
    capacity: u64,
    staging: Vec<u8>,
    _marker: PhantomData<T>,
}

impl<T: Pod> DynamicUniformBuffer<T> {
    pub fn new(device: &wgpu::Device, label: &str, alignment: u64, capacity: u64) -> Self {
        let stride = align_to(std::mem::size_of::<T>() as u64, alignment.max(1));
        let capacity = capacity.max(1);
        Self {
            label: label.to_string(),
            raw: Self::create(device, label, stride * capacity),
            stride,
            capacity,
            staging: Vec::new(),
            _marker: PhantomData,
        }
    }

    fn create(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Drops all staged elements.
    pub fn clear(&mut self) {
        self.staging.clear();
    }

    /// Stages an element and returns its dynamic offset.
    pub fn push(&mut self, value: &T) -> u32 {
        let offset = self.staging.len();
        self.staging.extend_from_slice(bytemuck::bytes_of(value));
        self.staging.resize(offset + self.stride as usize, 0);
        offset as u32
    }

    /// Number of staged elements.
    pub fn len(&self) -> usize {
        self.staging.len() / self.stride as usize
    }

    pub fn is_empty(&self) -> bool {
        self.staging.is_empty()
    }

    /// Writes staged elements to the GPU, growing the buffer if needed.
    ///
    /// Returns true if the buffer was reallocated.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        let needed = self.len() as u64;
        let grew = needed > self.capacity;
        if grew {
            self.capacity = needed.next_power_of_two();
            self.raw = Self::create(device, &self.label, self.stride * self.capacity);
            tracing::debug!(
                "Grew '{}' to {} elements",
                self.label,
                self.capacity
            );
        }
        if !self.staging.is_empty() {
            queue.write_buffer(&self.raw, 0, &self.staging);
        }
        grew
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }

    /// Binding of a single element window, for dynamic offsets.
    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.raw,
            offset: 0,
            size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
        })
    }

    pub fn min_binding_size() -> Option<NonZeroU64> {
        NonZeroU64::new(std::mem::size_of::<T>() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(160, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
    }

    #[test]
    fn test_dynamic_offsets_follow_stride() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut buffer: DynamicUniformBuffer<[f32; 4]> =
            DynamicUniformBuffer::new(ctx.device(), "test", 256, 1);

        assert_eq!(buffer.push(&[0.0; 4]), 0);
        assert_eq!(buffer.push(&[1.0; 4]), 256);
        assert_eq!(buffer.push(&[2.0; 4]), 512);
        assert_eq!(buffer.len(), 3);

        assert!(buffer.upload(ctx.device(), ctx.queue()));
        assert_eq!(buffer.capacity(), 4);
        buffer.clear();
        buffer.push(&[3.0; 4]);
        assert!(!buffer.upload(ctx.device(), ctx.queue()));
    }
}
