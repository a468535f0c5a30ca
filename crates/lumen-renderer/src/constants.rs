//! Renderer-wide constants.

/// Uniform binding indices inside the frame bind group (group 0).
pub mod bindings {
    pub const VERTEX_MATRICES: u32 = 0;
    pub const FRAGMENT_MATRICES: u32 = 1;
    pub const CAMERA: u32 = 2;
    pub const DIRECTIONAL_LIGHTS: u32 = 3;
    pub const POINT_LIGHTS: u32 = 4;
}

/// Texture formats.
pub mod formats {
    use wgpu::TextureFormat;

    pub const DEPTH: TextureFormat = TextureFormat::Depth32Float;
    pub const HDR: TextureFormat = TextureFormat::Rgba16Float;

    pub const GBUFFER_POSITION: TextureFormat = TextureFormat::Rgba16Float;
    pub const GBUFFER_NORMAL: TextureFormat = TextureFormat::Rgba16Float;
    pub const GBUFFER_ALBEDO_SPEC: TextureFormat = TextureFormat::Rgba8Unorm;
    pub const GBUFFER_MATERIAL: TextureFormat = TextureFormat::Rgba8Unorm;

    pub const SSAO: TextureFormat = TextureFormat::R8Unorm;
    pub const SHADOW: TextureFormat = TextureFormat::Depth32Float;

    pub const ENVIRONMENT: TextureFormat = TextureFormat::Rgba16Float;
    pub const BRDF_LUT: TextureFormat = TextureFormat::Rg16Float;
    /// Source pixels handed over by the image decoder
    pub const SOURCE_HDR: TextureFormat = TextureFormat::Rgba32Float;
}

/// Light array capacities in the frame uniforms.
pub mod lights {
    pub const MAX_DIRECTIONAL: usize = 8;
    pub const MAX_POINT: usize = 64;
    /// Shadow layer value meaning "no shadow"
    pub const NO_SHADOW: i32 = -1;
}

pub mod shadow {
    /// Upper bound for `ShadowConfig::num_layers`; never above
    /// `lights::MAX_DIRECTIONAL` so every shadowed light is also lit.
    pub const MAX_LAYERS: u32 = 8;
}

pub mod ssao {
    pub const MAX_KERNEL_SIZE: u32 = 64;
    /// Box blur footprint in texels
    pub const BLUR_SIZE: u32 = 4;
}

pub mod hot_reload {
    use std::time::Duration;

    pub const MIN_INTERVAL: Duration = Duration::from_secs(1);
}

/// Number of faces in a cube map.
pub const CUBE_FACES: u32 = 6;
