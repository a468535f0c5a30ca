//! Model component: a decoded hierarchy of meshes.

use glam::Mat4;

use super::MeshComponent;
use crate::draw::{DrawAux, DrawSink};

/// One node of a decoded model.
#[derive(Debug, Clone)]
pub struct ModelNode {
    pub name: String,
    /// Transform relative to the parent model node
    pub local: Mat4,
    pub meshes: Vec<MeshComponent>,
    children: Vec<usize>,
}

impl ModelNode {
    pub fn new(name: impl Into<String>, local: Mat4) -> Self {
        Self {
            name: name.into(),
            local,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_mesh(mut self, mesh: MeshComponent) -> Self {
        self.meshes.push(mesh);
        self
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }
}

/// Decoded model handed over by the asset collaborator.
///
/// Nodes are stored flat; a node can only be attached under a node that
/// already exists, so the hierarchy is acyclic by construction.
#[derive(Debug, Clone, Default)]
pub struct ModelComponent {
    nodes: Vec<ModelNode>,
    roots: Vec<usize>,
}

impl ModelComponent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node under `parent` (or as a root) and return its index.
    ///
    /// Returns `None` if `parent` does not exist.
    pub fn add_node(&mut self, parent: Option<usize>, node: ModelNode) -> Option<usize> {
        let index = self.nodes.len();
        match parent {
            Some(parent) => self.nodes.get_mut(parent)?.children.push(index),
            None => self.roots.push(index),
        }
        self.nodes.push(node);
        Some(index)
    }

    pub fn nodes(&self) -> &[ModelNode] {
        &self.nodes
    }

    pub fn node_mut(&mut self, index: usize) -> Option<&mut ModelNode> {
        self.nodes.get_mut(index)
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().map(|n| n.meshes.len()).sum()
    }

    /// Apply `f` to every mesh, e.g. to toggle shadow casting model-wide.
    pub fn for_each_mesh_mut(&mut self, mut f: impl FnMut(&mut MeshComponent)) {
        for node in &mut self.nodes {
            node.meshes.iter_mut().for_each(&mut f);
        }
    }

    pub fn draw(&self, world: Mat4, aux: DrawAux, sink: &mut dyn DrawSink) {
        for &root in &self.roots {
            self.draw_node(root, world, aux, sink);
        }
    }

    fn draw_node(&self, index: usize, parent_world: Mat4, aux: DrawAux, sink: &mut dyn DrawSink) {
        let node = &self.nodes[index];
        let world = parent_world * node.local;

        for mesh in &node.meshes {
            mesh.draw(world, aux, sink);
        }
        for &child in &node.children {
            self.draw_node(child, world, aux, sink);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::draw::DrawCall;
    use crate::handles::MeshHandle;

    #[test]
    fn test_model_nodes_compose() {
        let mut model = ModelComponent::new();
        let root = model
            .add_node(
                None,
                ModelNode::new("body", Mat4::from_translation(Vec3::X))
                    .with_mesh(MeshComponent::new(MeshHandle::from_raw(1))),
            )
            .unwrap();
        model
            .add_node(
                Some(root),
                ModelNode::new("wheel", Mat4::from_translation(Vec3::Y))
                    .with_mesh(MeshComponent::new(MeshHandle::from_raw(2))),
            )
            .unwrap();

        let mut calls: Vec<DrawCall> = Vec::new();
        let world = Mat4::from_translation(Vec3::Z);
        model.draw(world, DrawAux::None, &mut calls);

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].world, world * Mat4::from_translation(Vec3::X));
        assert_eq!(
            calls[1].world.transform_point3(Vec3::ZERO),
            Vec3::new(1.0, 1.0, 1.0)
        );
    }

    #[test]
    fn test_add_under_missing_parent() {
        let mut model = ModelComponent::new();
        assert!(model.add_node(Some(3), ModelNode::new("orphan", Mat4::IDENTITY)).is_none());
        assert!(model.nodes().is_empty());
    }
}
