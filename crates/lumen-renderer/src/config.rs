//! Renderer configuration loaded from RON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{hot_reload, shadow, ssao};
use crate::error::{RenderError, RenderResult};

/// Shadow map settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Slices per shadow array (cube arrays hold six faces per slice)
    pub num_layers: u32,
    /// Directional shadow map resolution
    pub directional_size: u32,
    /// Point shadow cube face resolution
    pub point_size: u32,
    /// Depth bias applied when comparing against directional maps
    pub directional_bias: f32,
    /// Depth bias applied when comparing against point cube maps
    pub point_bias: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            num_layers: 8,
            directional_size: 2048,
            point_size: 1024,
            directional_bias: 0.005,
            point_bias: 0.05,
        }
    }
}

/// Screen-space ambient occlusion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsaoConfig {
    pub enabled: bool,
    pub kernel_size: u32,
    pub radius: f32,
    pub bias: f32,
    /// Side length of the tiled rotation noise texture
    pub noise_size: u32,
    /// Seed for kernel and noise generation
    pub seed: u64,
}

impl Default for SsaoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kernel_size: 32,
            radius: 0.5,
            bias: 0.025,
            noise_size: 4,
            seed: 0x5eed,
        }
    }
}

/// Image-based lighting precompute sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub cube_size: u32,
    pub irradiance_size: u32,
    pub prefilter_size: u32,
    pub prefilter_mips: u32,
    pub brdf_lut_size: u32,
    pub intensity: f32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            cube_size: 512,
            irradiance_size: 32,
            prefilter_size: 128,
            prefilter_mips: 5,
            brdf_lut_size: 512,
            intensity: 1.0,
        }
    }
}

/// Shader hot reload settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotReloadConfig {
    pub enabled: bool,
    /// Directory whose `<name>.wgsl` files override the built-in shaders
    pub shader_dir: Option<PathBuf>,
    pub poll_interval_ms: u64,
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            shader_dir: None,
            poll_interval_ms: 1000,
        }
    }
}

impl HotReloadConfig {
    /// Polling interval, never shorter than one second.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(hot_reload::MIN_INTERVAL)
    }
}

/// Initial camera placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    /// Degrees
    pub yaw: f32,
    /// Degrees
    pub pitch: f32,
    /// Vertical field of view in degrees
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 2.0, 8.0],
            yaw: -90.0,
            pitch: -10.0,
            fov_y: 45.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Top-level renderer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    pub clear_color: [f32; 4],
    pub shadow: ShadowConfig,
    pub ssao: SsaoConfig,
    pub environment: EnvironmentConfig,
    pub hot_reload: HotReloadConfig,
    pub camera: CameraConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shadow: ShadowConfig::default(),
            ssao: SsaoConfig::default(),
            environment: EnvironmentConfig::default(),
            hot_reload: HotReloadConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Parse a configuration from RON text. Missing fields take defaults.
    pub fn from_ron_str(content: &str) -> RenderResult<Self> {
        let config: RendererConfig = ron::from_str(content)?;
        Ok(config.sanitized())
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| RenderError::io(path, e))?;
        let config = Self::from_ron_str(&content)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load a configuration file, falling back to defaults when it is
    /// missing or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config file at {:?}, using defaults", path);
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}", e);
            Self::default()
        })
    }

    /// Clamp values the GPU side cannot honour.
    pub fn sanitized(mut self) -> Self {
        self.width = self.width.max(1);
        self.height = self.height.max(1);
        self.shadow.num_layers = self.shadow.num_layers.clamp(1, shadow::MAX_LAYERS);
        self.shadow.directional_size = self.shadow.directional_size.clamp(64, 8192);
        self.shadow.point_size = self.shadow.point_size.clamp(64, 4096);
        self.ssao.kernel_size = self.ssao.kernel_size.clamp(1, ssao::MAX_KERNEL_SIZE);
        self.ssao.noise_size = self.ssao.noise_size.clamp(1, 16);

        let env = &mut self.environment;
        env.cube_size = env.cube_size.max(1);
        env.irradiance_size = env.irradiance_size.max(1);
        env.prefilter_size = env.prefilter_size.max(1);
        env.brdf_lut_size = env.brdf_lut_size.max(1);
        let max_mips = u32::BITS - env.prefilter_size.leading_zeros();
        env.prefilter_mips = env.prefilter_mips.clamp(1, max_mips);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.shadow.num_layers, 8);
        assert_eq!(config.ssao.kernel_size, 32);
        assert_eq!(config.environment.prefilter_mips, 5);
    }

    #[test]
    fn test_partial_ron_fills_defaults() {
        let config = RendererConfig::from_ron_str(
            "(width: 800, height: 600, shadow: (num_layers: 4), ssao: (enabled: false))",
        )
        .unwrap();

        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.shadow.num_layers, 4);
        assert_eq!(config.shadow.directional_size, 2048);
        assert!(!config.ssao.enabled);
        assert_eq!(config.ssao.radius, 0.5);
    }

    #[test]
    fn test_invalid_ron_is_an_error() {
        let result = RendererConfig::from_ron_str("(width: \"wide\")");
        assert!(matches!(result, Err(RenderError::Config(_))));
    }

    #[test]
    fn test_sanitize_clamps() {
        let config = RendererConfig::from_ron_str(
            "(width: 0, shadow: (num_layers: 0), ssao: (kernel_size: 1000), \
             environment: (prefilter_size: 16, prefilter_mips: 12))",
        )
        .unwrap();

        assert_eq!(config.width, 1);
        assert_eq!(config.shadow.num_layers, 1);
        assert_eq!(config.ssao.kernel_size, ssao::MAX_KERNEL_SIZE);
        assert_eq!(config.environment.prefilter_mips, 5);
    }

    #[test]
    fn test_sanitize_caps_shadow_layers() {
        let config = RendererConfig::from_ron_str("(shadow: (num_layers: 50))").unwrap();
        assert_eq!(config.shadow.num_layers, shadow::MAX_LAYERS);
        assert!(shadow::MAX_LAYERS as usize <= crate::constants::lights::MAX_DIRECTIONAL);
        assert!(shadow::MAX_LAYERS as usize <= crate::constants::lights::MAX_POINT);
    }

    #[test]
    fn test_hot_reload_interval_floor() {
        let config = HotReloadConfig {
            poll_interval_ms: 10,
            ..Default::default()
        };
        assert_eq!(config.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = RendererConfig::load_or_default("/nonexistent/lumen.ron");
        assert_eq!(config, RendererConfig::default());
    }
}
