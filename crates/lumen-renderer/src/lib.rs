//! Lumen Renderer
//!
//! WGPU-based deferred renderer for [`lumen_core`] scenes.
//!
//! # Architecture
//!
//! - [`context::RenderContext`] - GPU device, queue and error scopes
//! - [`gpu`] - Programs, framebuffers, textures and buffers over wgpu
//! - [`modules`] - Shadow, SSAO and skybox passes behind [`modules::RenderModule`]
//! - [`environment::Environment`] - Image-based lighting precompute
//! - [`DeferredRenderer`] - Per-frame pass orchestration
//!
//! # Example
//!
//! ```ignore
//! use lumen_renderer::{DeferredRenderer, RenderContext, RendererConfig};
//!
//! let config = RendererConfig::load_or_default("lumen.ron");
//! let ctx = RenderContext::headless(config.width, config.height)?;
//! let mut renderer = DeferredRenderer::new(ctx, config)?;
//!
//! let stats = renderer.render(&mut scene)?;
//! ```

// Core abstractions
pub mod context;
pub mod error;
pub mod gpu;
pub mod resources;
pub mod shader_library;

pub mod camera;
pub mod config;
pub mod constants;
pub mod environment;
pub mod hot_reload;
pub mod modules;
pub mod renderer;
pub mod uniforms;

// Re-exports for convenience
pub use camera::Camera;
pub use config::*;
pub use context::RenderContext;
pub use environment::{Environment, EnvironmentSource};
pub use error::{RenderError, RenderResult};
pub use hot_reload::AssetWatcher;
pub use modules::RenderModule;
pub use renderer::*;
pub use resources::{GpuMesh, Material, MaterialLibrary, MeshData, MeshManager, MeshVertex};
pub use shader_library::ShaderLibrary;
