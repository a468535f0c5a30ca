//! Scene node definition.

use crate::component::Component;
use crate::scene::NodeId;
use crate::transform::Transform;

/// A node in the scene tree.
///
/// Nodes live in the [`Scene`](crate::scene::Scene) arena; parent and
/// children are stable ids into that arena. Only the scene edits the links.
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Display name
    pub name: String,
    /// Local transform relative to the parent
    pub transform: Transform,
    /// Optional payload
    pub component: Option<Component>,
    /// Hidden nodes and their subtrees are skipped by traversal
    pub visible: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl SceneNode {
    /// Creates an empty node with an identity transform.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::new(),
            component: None,
            visible: true,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Sets the local transform.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Sets the component.
    pub fn with_component(mut self, component: impl Into<Component>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_light(&self) -> bool {
        self.component.as_ref().is_some_and(Component::is_light)
    }

    pub fn is_mesh(&self) -> bool {
        self.component.as_ref().is_some_and(Component::is_mesh)
    }
}
