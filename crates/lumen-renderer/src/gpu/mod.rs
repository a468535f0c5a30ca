//! Thin wrappers over wgpu objects.

pub mod bind_group;
pub mod buffer;
pub mod framebuffer;
pub mod layouts;
pub mod program;
pub mod texture;
pub mod vertex_array;

pub use bind_group::TrackedBindGroup;
pub use buffer::{DynamicUniformBuffer, IndexBuffer, UniformBuffer, VertexBuffer, align_to};
pub use framebuffer::{Framebuffer, FramebufferBuilder, PassOps};
pub use program::{Program, ProgramCache, ProgramDesc, ProgramKey};
pub use texture::{Texture, TextureDesc, TextureKind};
pub use vertex_array::VertexArray;
