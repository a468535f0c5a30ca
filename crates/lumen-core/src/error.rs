//! Scene graph errors

use crate::scene::NodeId;

/// Errors raised by scene graph edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("Attaching {child:?} under {parent:?} would create a cycle")]
    WouldCreateCycle { parent: NodeId, child: NodeId },
    #[error("Node already has a parent: {0:?}")]
    AlreadyHasParent(NodeId),
    #[error("The root node cannot be removed or reparented")]
    RootNode,
    #[error("Node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },
}

/// Result type for scene graph operations
pub type SceneResult<T> = Result<T, SceneError>;
