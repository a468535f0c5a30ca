//! Lumen scene core
//!
//! CPU-side data structures that feed the deferred renderer:
//! - Transform: position/rotation/scale with a lazily rebuilt matrix
//! - Scene: arena-backed node tree with pre-order traversal
//! - Component: tagged variants (mesh, model, primitive, lights)
//! - Lights: directional and point lights with cached light-space matrices
//! - Draw recording: the traversal emits draw calls into a sink

pub mod component;
pub mod draw;
pub mod error;
pub mod handles;
pub mod light;
pub mod node;
pub mod primitive;
pub mod scene;
pub mod transform;

pub use component::*;
pub use draw::*;
pub use error::*;
pub use handles::*;
pub use light::*;
pub use node::*;
pub use primitive::*;
pub use scene::*;
pub use transform::*;
