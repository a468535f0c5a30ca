//! Arena-backed scene graph.

use glam::Mat4;
use slotmap::SlotMap;

use crate::component::Component;
use crate::draw::{DrawAux, DrawSink};
use crate::error::{SceneError, SceneResult};
use crate::light::{DirectionalLight, PointLight};
use crate::node::SceneNode;

slotmap::new_key_type! {
    /// Stable id of a node in a [`Scene`].
    pub struct NodeId;
}

/// Light nodes bucketed by kind, each in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LightSet {
    pub directional: Vec<NodeId>,
    pub point: Vec<NodeId>,
}

impl LightSet {
    pub fn len(&self) -> usize {
        self.directional.len() + self.point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directional.is_empty() && self.point.is_empty()
    }
}

/// Scene tree with a single root.
///
/// Nodes are stored flat and referenced by [`NodeId`]. Every node has at
/// most one parent; cycles are rejected on attach. Nodes that are not
/// reachable from the root are kept but never drawn.
pub struct Scene {
    nodes: SlotMap<NodeId, SceneNode>,
    root: NodeId,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Creates a scene containing only the root node.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new("root"));
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes, including the root and detached nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if only the root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    pub fn component(&self, id: NodeId) -> Option<&Component> {
        self.nodes.get(id)?.component.as_ref()
    }

    pub fn component_mut(&mut self, id: NodeId) -> Option<&mut Component> {
        self.nodes.get_mut(id)?.component.as_mut()
    }

    pub fn directional_light(&self, id: NodeId) -> Option<&DirectionalLight> {
        self.component(id)?.as_directional_light()
    }

    pub fn point_light(&self, id: NodeId) -> Option<&PointLight> {
        self.component(id)?.as_point_light()
    }

    /// Inserts a detached node. Attach it with [`Scene::add_child`].
    pub fn create_node(&mut self, node: SceneNode) -> NodeId {
        let mut node = node;
        node.parent = None;
        node.children.clear();
        self.nodes.insert(node)
    }

    /// Inserts `node` as the last child of `parent`.
    pub fn insert(&mut self, parent: NodeId, node: SceneNode) -> SceneResult<NodeId> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        let id = self.create_node(node);
        self.link(parent, id);
        Ok(id)
    }

    /// Attaches a detached node (and its subtree) under `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        let Some(child_node) = self.nodes.get(child) else {
            return Err(SceneError::NodeNotFound(child));
        };
        if child == self.root {
            return Err(SceneError::RootNode);
        }
        if child_node.parent.is_some() {
            return Err(SceneError::AlreadyHasParent(child));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::WouldCreateCycle { parent, child });
        }

        self.link(parent, child);
        Ok(())
    }

    /// Unlinks `child` from `parent`, leaving the subtree detached in the arena.
    pub fn detach(&mut self, child: NodeId) -> SceneResult<()> {
        if child == self.root {
            return Err(SceneError::RootNode);
        }
        let node = self
            .nodes
            .get_mut(child)
            .ok_or(SceneError::NodeNotFound(child))?;
        if let Some(parent) = node.parent.take()
            && let Some(parent_node) = self.nodes.get_mut(parent)
        {
            parent_node.children.retain(|c| *c != child);
        }
        Ok(())
    }

    /// Moves `child` under `new_parent`, keeping its local transform.
    pub fn reparent(&mut self, child: NodeId, new_parent: NodeId) -> SceneResult<()> {
        if !self.nodes.contains_key(new_parent) {
            return Err(SceneError::NodeNotFound(new_parent));
        }
        if self.is_ancestor_or_self(child, new_parent) {
            return Err(SceneError::WouldCreateCycle {
                parent: new_parent,
                child,
            });
        }
        self.detach(child)?;
        self.add_child(new_parent, child)
    }

    /// Removes `child` from `parent` and destroys the whole subtree.
    ///
    /// Returns the removed nodes in pre-order so the caller can release any
    /// GPU resources they referenced.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> SceneResult<Vec<SceneNode>> {
        let node = self
            .nodes
            .get(child)
            .ok_or(SceneError::NodeNotFound(child))?;
        if node.parent != Some(parent) {
            return Err(SceneError::NotAChild { parent, child });
        }
        self.remove(child)
    }

    /// Destroys `id` and all of its descendants.
    pub fn remove(&mut self, id: NodeId) -> SceneResult<Vec<SceneNode>> {
        if id == self.root {
            return Err(SceneError::RootNode);
        }
        self.detach(id)?;

        let order = self.subtree(id);
        let removed = order
            .into_iter()
            .filter_map(|node_id| self.nodes.remove(node_id))
            .collect::<Vec<_>>();

        tracing::debug!("Removed {} scene node(s)", removed.len());
        Ok(removed)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// First node in traversal order with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.traverse()
            .into_iter()
            .find(|id| self.nodes[*id].name == name)
    }

    /// Node ids reachable from the root, in pre-order.
    pub fn traverse(&self) -> Vec<NodeId> {
        self.subtree(self.root)
    }

    /// Node ids of the subtree rooted at `id`, in pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            order.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }

    /// World matrix of `id`, composed from the root down.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.nodes.get(node_id)?;
            chain.push(node_id);
            current = node.parent;
        }

        let mut world = Mat4::IDENTITY;
        for node_id in chain.into_iter().rev() {
            world *= self.nodes[node_id].transform.matrix();
        }
        Some(world)
    }

    /// Draws the whole tree.
    pub fn draw(&self, aux: DrawAux, sink: &mut dyn DrawSink) {
        self.draw_from(self.root, Mat4::IDENTITY, aux, sink);
    }

    /// Draws the subtree at `id` under `parent_world`.
    ///
    /// Each node's world matrix is `parent_world × local`, computed fresh on
    /// every call. Hidden nodes are skipped together with their subtrees.
    pub fn draw_from(&self, id: NodeId, parent_world: Mat4, aux: DrawAux, sink: &mut dyn DrawSink) {
        let mut stack = vec![(id, parent_world)];
        while let Some((current, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if !node.visible {
                continue;
            }

            let world = parent_world * node.transform.matrix();
            if let Some(component) = &node.component {
                component.draw(world, aux, sink);
            }
            stack.extend(node.children.iter().rev().map(|child| (*child, world)));
        }
    }

    /// Walks the tree once and buckets light nodes by kind.
    ///
    /// Point lights receive their node's world-space position; an unchanged
    /// position leaves their cached matrices intact.
    pub fn gather_lights(&mut self) -> LightSet {
        let mut lights = LightSet::default();
        let mut point_positions = Vec::new();

        let mut stack = vec![(self.root, Mat4::IDENTITY)];
        while let Some((current, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if !node.visible {
                continue;
            }

            let world = parent_world * node.transform.matrix();
            match &node.component {
                Some(Component::DirectionalLight(_)) => lights.directional.push(current),
                Some(Component::PointLight(_)) => {
                    lights.point.push(current);
                    point_positions.push((current, world.w_axis.truncate()));
                }
                _ => {}
            }
            stack.extend(node.children.iter().rev().map(|child| (*child, world)));
        }

        for (id, position) in point_positions {
            if let Some(light) = self.component_mut(id).and_then(Component::as_point_light_mut) {
                light.set_position(position);
            }
        }

        lights
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    /// Returns true if `ancestor` is `id` or one of its ancestors.
    fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == ancestor {
                return true;
            }
            current = self.nodes.get(node_id).and_then(|n| n.parent);
        }
        false
    }
}
