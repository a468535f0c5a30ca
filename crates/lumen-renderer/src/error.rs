//! Renderer errors

use std::path::PathBuf;

use lumen_core::MeshHandle;

/// Errors raised while setting up or driving the renderer.
///
/// Setup-time variants (shader compile, pipeline creation, incomplete
/// framebuffers) are fatal to the caller; per-frame problems are logged
/// instead of surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("No suitable GPU adapter found")]
    AdapterNotFound,

    #[error("Failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("Shader '{label}' failed to compile: {message}")]
    ShaderCompile { label: String, message: String },

    #[error("Pipeline '{label}' could not be created: {message}")]
    PipelineCreation { label: String, message: String },

    #[error("Framebuffer '{label}' is incomplete: {reason}")]
    FramebufferIncomplete { label: String, reason: String },

    #[error("Unknown shader: {0}")]
    UnknownShader(String),

    #[error("Program not built: {0}")]
    ProgramMissing(String),

    #[error("Mesh not found: {0:?}")]
    MissingMesh(MeshHandle),

    #[error("Invalid texture data for '{label}': {reason}")]
    InvalidTextureData { label: String, reason: String },

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scene edit failed: {0}")]
    Scene(#[from] lumen_core::SceneError),

    #[error("Failed to parse config: {0}")]
    Config(#[from] ron::error::SpannedError),
}

impl RenderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RenderError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;
