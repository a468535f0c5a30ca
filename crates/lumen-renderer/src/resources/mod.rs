//! GPU resource management.
//!
//! Handle-based storage for meshes and materials. Scene components only hold
//! handles; the data lives here.

mod material;
mod mesh;
mod vertex;

pub use material::*;
pub use mesh::*;
pub use vertex::*;
