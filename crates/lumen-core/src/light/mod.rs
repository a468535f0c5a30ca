//! Light components with lazily cached light-space matrices.

mod directional;
mod point;

pub use directional::*;
pub use point::*;

use glam::Vec3;

/// Fraction of peak intensity below which a light's contribution is ignored.
pub const ATTENUATION_CUTOFF: f32 = 5.0 / 256.0;

/// Parameters shared by every light kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    /// Linear RGB color
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// Whether the light requests a shadow map
    pub has_shadows: bool,
    /// Near plane of the shadow projection
    pub near: f32,
    /// Far plane of the shadow projection
    pub far: f32,
}

impl Default for LightParams {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            has_shadows: true,
            near: 0.1,
            far: 50.0,
        }
    }
}

impl LightParams {
    /// Largest color channel.
    pub fn peak(&self) -> f32 {
        self.color.max_element()
    }
}

/// Borrowed view over either light kind.
#[derive(Debug, Clone, Copy)]
pub enum LightRef<'a> {
    Directional(&'a DirectionalLight),
    Point(&'a PointLight),
}

impl LightRef<'_> {
    pub fn params(&self) -> &LightParams {
        match self {
            LightRef::Directional(light) => light.params(),
            LightRef::Point(light) => light.params(),
        }
    }

    pub fn has_shadows(&self) -> bool {
        self.params().has_shadows
    }
}
