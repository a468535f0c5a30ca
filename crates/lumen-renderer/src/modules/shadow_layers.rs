//! Fixed-capacity shadow layer allocation and per-layer pass uniforms.

use lumen_core::NodeId;

use crate::constants::shadow;
use crate::gpu::buffer::DynamicUniformBuffer;
use crate::gpu::layouts;
use crate::uniforms::ShadowPassUniform;

/// Layers a shadow array can hold when each layer spans `slices` array
/// slices and the device allows `max_slices` in total.
pub fn layer_budget(requested: u32, slices: u32, max_slices: u32) -> u32 {
    let budget = requested
        .clamp(1, shadow::MAX_LAYERS)
        .min(max_slices / slices.max(1))
        .max(1);
    if budget != requested {
        tracing::warn!("Shadow layers clamped from {} to {}", requested, budget);
    }
    budget
}

/// Hands out texture array layers to shadowed lights for one frame.
///
/// Lights are offered in traversal order. Once every layer is taken the
/// remaining lights get no shadow; that is not an error and is not logged.
#[derive(Debug, Clone)]
pub struct ShadowLayers {
    capacity: u32,
    assigned: Vec<NodeId>,
}

impl ShadowLayers {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            assigned: Vec::with_capacity(capacity as usize),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.assigned.clear();
    }

    /// Layer for `node`, or `None` when all layers are taken.
    pub fn allocate(&mut self, node: NodeId) -> Option<u32> {
        if let Some(layer) = self.layer_of(node) {
            return Some(layer);
        }
        if self.assigned.len() as u32 >= self.capacity {
            return None;
        }
        self.assigned.push(node);
        Some(self.assigned.len() as u32 - 1)
    }

    /// Resets and allocates for every `(node, has_shadows)` in order.
    pub fn assign(&mut self, lights: impl IntoIterator<Item = (NodeId, bool)>) {
        self.clear();
        for (node, has_shadows) in lights {
            if has_shadows {
                self.allocate(node);
            }
        }
    }

    pub fn layer_of(&self, node: NodeId) -> Option<u32> {
        self.assigned
            .iter()
            .position(|n| *n == node)
            .map(|i| i as u32)
    }

    /// Nodes holding a layer, indexed by layer.
    pub fn assigned(&self) -> &[NodeId] {
        &self.assigned
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

/// One [`ShadowPassUniform`] per rendered layer, bound at group 0 with a
/// dynamic offset.
pub struct ShadowPasses {
    buffer: DynamicUniformBuffer<ShadowPassUniform>,
    offsets: Vec<u32>,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl ShadowPasses {
    pub fn new(device: &wgpu::Device, label: &str, alignment: u64, capacity: u64) -> Self {
        let buffer = DynamicUniformBuffer::new(device, label, alignment, capacity);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} Layout")),
            entries: &[layouts::uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX_FRAGMENT,
                true,
                DynamicUniformBuffer::<ShadowPassUniform>::min_binding_size(),
            )],
        });
        let bind_group = Self::create_bind_group(device, label, &layout, &buffer);
        Self {
            buffer,
            offsets: Vec::new(),
            layout,
            bind_group,
        }
    }

    fn create_bind_group(
        device: &wgpu::Device,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        buffer: &DynamicUniformBuffer<ShadowPassUniform>,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.binding(),
            }],
        })
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.offsets.clear();
    }

    pub fn push(&mut self, pass: &ShadowPassUniform) {
        let offset = self.buffer.push(pass);
        self.offsets.push(offset);
    }

    /// Dynamic offsets, one per rendered layer in layer order.
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, label: &str) {
        if self.buffer.upload(device, queue) {
            self.bind_group = Self::create_bind_group(device, label, &self.layout, &self.buffer);
        }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use lumen_core::{PointLight, Scene, SceneNode, Transform};

    use super::*;

    #[test]
    fn test_ten_point_lights_eight_layers() {
        let mut scene = Scene::new();
        let root = scene.root();
        let mut ids = Vec::new();
        for i in 0..10 {
            let node = SceneNode::new(format!("bulb{i}"))
                .with_transform(Transform::from_position(Vec3::new(i as f32, 2.0, 0.0)))
                .with_component(PointLight::new());
            ids.push(scene.insert(root, node).unwrap());
        }

        let gathered = scene.gather_lights();
        assert_eq!(gathered.point, ids);

        let mut layers = ShadowLayers::new(8);
        layers.assign(gathered.point.iter().map(|id| (*id, true)));

        assert_eq!(layers.len(), 8);
        assert_eq!(layers.assigned(), &ids[..8]);
        for (i, id) in ids.iter().enumerate() {
            let expected = (i < 8).then_some(i as u32);
            assert_eq!(layers.layer_of(*id), expected);
        }
    }

    #[test]
    fn test_layer_budget_respects_limits() {
        assert_eq!(layer_budget(50, 6, 256), shadow::MAX_LAYERS);
        assert_eq!(layer_budget(8, 6, 32), 5);
        assert_eq!(layer_budget(4, 1, 256), 4);
        assert_eq!(layer_budget(0, 6, 256), 1);
        assert_eq!(layer_budget(8, 6, 4), 1);
    }

    #[test]
    fn test_unshadowed_lights_take_no_layer() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.insert(root, SceneNode::new("a")).unwrap();
        let b = scene.insert(root, SceneNode::new("b")).unwrap();

        let mut layers = ShadowLayers::new(2);
        layers.assign([(a, false), (b, true)]);
        assert_eq!(layers.layer_of(a), None);
        assert_eq!(layers.layer_of(b), Some(0));
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.insert(root, SceneNode::new("a")).unwrap();

        let mut layers = ShadowLayers::new(1);
        assert_eq!(layers.allocate(a), Some(0));
        assert_eq!(layers.allocate(a), Some(0));
        assert_eq!(layers.len(), 1);
    }
}
