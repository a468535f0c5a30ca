//! Omnidirectional point light.

use std::cell::Cell;

use glam::{Mat4, Vec3};

use super::{ATTENUATION_CUTOFF, LightParams};

/// (forward, up) for each cube face in +X, -X, +Y, -Y, +Z, -Z order.
const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

/// Distance falloff coefficients: `1 / (c + l·d + q·d²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

impl Attenuation {
    pub fn new(constant: f32, linear: f32, quadratic: f32) -> Self {
        Self {
            constant,
            linear,
            quadratic,
        }
    }

    /// Distance beyond which a light of peak channel `peak` contributes less
    /// than [`ATTENUATION_CUTOFF`] of its intensity.
    ///
    /// Positive root of `q·r² + l·r + (c − peak / cutoff) = 0`.
    pub fn radius(&self, peak: f32) -> f32 {
        let threshold = self.constant - peak / ATTENUATION_CUTOFF;
        if self.quadratic > 0.0 {
            let discriminant = self.linear * self.linear - 4.0 * self.quadratic * threshold;
            ((-self.linear + discriminant.max(0.0).sqrt()) / (2.0 * self.quadratic)).max(0.0)
        } else if self.linear > 0.0 {
            (-threshold / self.linear).max(0.0)
        } else {
            f32::INFINITY
        }
    }

    /// Attenuation factor at `distance`.
    pub fn factor(&self, distance: f32) -> f32 {
        1.0 / (self.constant + self.linear * distance + self.quadratic * distance * distance)
    }
}

/// A light emitting in all directions from a point.
///
/// The position is the world-space position of the owning scene node and is
/// written by the scene during light gathering. The six cube-face matrices
/// are cached and rebuilt only after the position or clip planes changed.
#[derive(Debug, Clone)]
pub struct PointLight {
    params: LightParams,
    attenuation: Attenuation,
    position: Vec3,
    matrices: Cell<[Mat4; 6]>,
    dirty: Cell<bool>,
    rebuilds: Cell<u64>,
}

impl Default for PointLight {
    fn default() -> Self {
        Self::new()
    }
}

impl PointLight {
    pub fn new() -> Self {
        Self {
            params: LightParams {
                far: 25.0,
                ..LightParams::default()
            },
            attenuation: Attenuation::default(),
            position: Vec3::ZERO,
            matrices: Cell::new([Mat4::IDENTITY; 6]),
            dirty: Cell::new(true),
            rebuilds: Cell::new(0),
        }
    }

    pub fn with_params(mut self, params: LightParams) -> Self {
        self.set_params(params);
        self
    }

    pub fn with_attenuation(mut self, attenuation: Attenuation) -> Self {
        self.attenuation = attenuation;
        self
    }

    pub fn params(&self) -> &LightParams {
        &self.params
    }

    pub fn attenuation(&self) -> Attenuation {
        self.attenuation
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_params(&mut self, params: LightParams) {
        if params.near != self.params.near || params.far != self.params.far {
            self.dirty.set(true);
        }
        self.params = params;
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.params.color = color;
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.params.intensity = intensity;
    }

    pub fn set_shadows(&mut self, enabled: bool) {
        self.params.has_shadows = enabled;
    }

    pub fn set_attenuation(&mut self, attenuation: Attenuation) {
        self.attenuation = attenuation;
    }

    /// Set the world-space position.
    pub fn set_position(&mut self, position: Vec3) {
        if position != self.position {
            self.position = position;
            self.dirty.set(true);
        }
    }

    /// Influence radius derived from attenuation and the peak color channel.
    pub fn radius(&self) -> f32 {
        self.attenuation.radius(self.params.peak())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.get()
    }

    /// Perspective projection × view for each cube face.
    pub fn light_space_matrices(&self) -> [Mat4; 6] {
        if self.dirty.get() {
            let projection = cube_face_projection(self.params.near, self.params.far);
            let matrices = CUBE_FACES.map(|(forward, up)| {
                projection * Mat4::look_at_rh(self.position, self.position + forward, up)
            });
            self.matrices.set(matrices);
            self.dirty.set(false);
            self.rebuilds.set(self.rebuilds.get() + 1);
        }
        self.matrices.get()
    }
}

/// 90° square projection for one cube face.
///
/// Y is flipped so rows written with a top-left framebuffer origin line up
/// with cube-map sampling coordinates.
fn cube_face_projection(near: f32, far: f32) -> Mat4 {
    Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
        * Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, near, far)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_radius_from_attenuation() {
        let attenuation = Attenuation::new(1.0, 0.09, 0.032);
        assert_relative_eq!(attenuation.radius(1.0), 38.226, epsilon = 1e-3);
        // Deterministic for identical inputs
        assert_eq!(attenuation.radius(1.0), attenuation.radius(1.0));
    }

    #[test]
    fn test_radius_of_dark_light_is_zero() {
        let attenuation = Attenuation::default();
        assert_eq!(attenuation.radius(0.0), 0.0);
        // below the cutoff even at distance zero
        assert_eq!(Attenuation::new(2.0, 0.09, 0.032).radius(0.01), 0.0);
        assert_eq!(Attenuation::new(2.0, 0.09, 0.0).radius(0.01), 0.0);
    }

    #[test]
    fn test_radius_contribution_reaches_cutoff() {
        let attenuation = Attenuation::new(1.0, 0.7, 1.8);
        let peak = 0.8;
        let r = attenuation.radius(peak);
        assert_relative_eq!(peak * attenuation.factor(r), ATTENUATION_CUTOFF, epsilon = 1e-5);
    }

    #[test]
    fn test_radius_degenerate_coefficients() {
        let linear_only = Attenuation::new(1.0, 0.5, 0.0);
        assert_relative_eq!(linear_only.radius(1.0), (51.2 - 1.0) / 0.5, epsilon = 1e-3);

        let constant_only = Attenuation::new(1.0, 0.0, 0.0);
        assert!(constant_only.radius(1.0).is_infinite());
    }

    #[test]
    fn test_light_radius_uses_peak_channel() {
        let light = PointLight::new().with_params(LightParams {
            color: Vec3::new(0.2, 1.0, 0.5),
            ..LightParams::default()
        });
        assert_relative_eq!(light.radius(), Attenuation::default().radius(1.0));
    }

    #[test]
    fn test_matrices_cached_until_moved() {
        let mut light = PointLight::new();
        light.set_position(Vec3::new(1.0, 2.0, 3.0));
        let first = light.light_space_matrices();
        let second = light.light_space_matrices();
        assert_eq!(light.rebuild_count(), 1);
        assert_eq!(first, second);

        light.set_position(Vec3::new(1.0, 2.0, 3.0));
        assert!(!light.is_dirty());

        light.set_position(Vec3::new(0.0, 2.0, 3.0));
        assert!(light.is_dirty());
        let moved = light.light_space_matrices();
        assert_eq!(light.rebuild_count(), 2);
        assert_ne!(first, moved);
    }

    #[test]
    fn test_face_matrices_center_their_axis() {
        let mut light = PointLight::new();
        light.set_position(Vec3::new(2.0, 0.0, 0.0));
        let matrices = light.light_space_matrices();

        for (matrix, (forward, _)) in matrices.iter().zip(CUBE_FACES) {
            let clip = matrix.project_point3(light.position() + forward * 5.0);
            assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
            assert!(clip.z > 0.0 && clip.z < 1.0);
        }
    }
}
