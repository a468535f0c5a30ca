//! Bind groups that follow texture resizes.

use crate::gpu::texture::Texture;

/// A bind group over textures that may be resized.
///
/// The generation of every input texture is recorded when the group is
/// built. A later request whose inputs report different generations rebuilds
/// the group, so resizing a texture never leaves a pass sampling a dropped
/// view.
pub struct TrackedBindGroup {
    label: String,
    bind_group: Option<wgpu::BindGroup>,
    generations: Vec<u64>,
    rebuilds: u64,
}

impl TrackedBindGroup {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bind_group: None,
            generations: Vec::new(),
            rebuilds: 0,
        }
    }

    fn generations_of(inputs: &[&Texture]) -> Vec<u64> {
        inputs.iter().map(|t| t.generation()).collect()
    }

    /// Returns true if the group is missing or any input changed.
    pub fn is_stale(&self, inputs: &[&Texture]) -> bool {
        self.bind_group.is_none() || self.generations != Self::generations_of(inputs)
    }

    /// Rebuilds the group with `build` if it is stale.
    ///
    /// Returns true if a rebuild happened.
    pub fn refresh(&mut self, inputs: &[&Texture], build: impl FnOnce(&str) -> wgpu::BindGroup) -> bool {
        if !self.is_stale(inputs) {
            return false;
        }
        self.bind_group = Some(build(&self.label));
        self.generations = Self::generations_of(inputs);
        self.rebuilds += 1;
        tracing::debug!("Rebuilt bind group '{}'", self.label);
        true
    }

    /// Forces a rebuild on the next [`refresh`](Self::refresh).
    pub fn invalidate(&mut self) {
        self.bind_group = None;
    }

    pub fn get(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_context;
    use crate::gpu::layouts;
    use crate::gpu::texture::TextureDesc;

    #[test]
    fn test_rebuilds_only_after_resize() {
        let Some(ctx) = test_context() else {
            return;
        };
        let device = ctx.device();
        let texture = Texture::new(device, TextureDesc::new("input", wgpu::TextureFormat::R8Unorm, 8, 8));
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: None,
            entries: &[layouts::unfiltered_texture_entry(0, wgpu::TextureViewDimension::D2)],
        });
        let build = |label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view()),
                }],
            })
        };

        let mut group = TrackedBindGroup::new("tracked");
        assert!(group.get().is_none());
        assert!(group.refresh(&[&texture], build));
        assert!(!group.refresh(&[&texture], build));
        assert_eq!(group.rebuild_count(), 1);

        texture.resize(device, 4, 4);
        assert!(group.is_stale(&[&texture]));
        assert!(group.refresh(&[&texture], build));
        assert_eq!(group.rebuild_count(), 2);
    }
}
