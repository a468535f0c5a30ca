//! Directional light for sun-like sources.

use std::cell::Cell;

use glam::{Mat4, Vec3};

use super::LightParams;

/// Primary up reference used when building the light view matrix.
const UP_REFERENCE: Vec3 = Vec3::Y;
/// Used instead of [`UP_REFERENCE`] when the direction is parallel to it.
const FALLBACK_UP: Vec3 = Vec3::Z;

/// A light whose rays are all parallel.
///
/// The orthographic light-space matrix is cached and rebuilt only after the
/// direction, focus, extent or clip planes changed.
#[derive(Debug, Clone)]
pub struct DirectionalLight {
    params: LightParams,
    /// Direction the light travels (normalized)
    direction: Vec3,
    /// Point the shadow frustum is centered on
    focus: Vec3,
    /// Half-size of the orthographic shadow frustum
    ortho_size: f32,
    matrix: Cell<Mat4>,
    dirty: Cell<bool>,
    rebuilds: Cell<u64>,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Vec3::new(-0.3, -1.0, -0.4))
    }
}

impl DirectionalLight {
    /// Create a light travelling along `direction`.
    ///
    /// A zero direction falls back to straight down.
    pub fn new(direction: Vec3) -> Self {
        Self {
            params: LightParams::default(),
            direction: direction.try_normalize().unwrap_or(Vec3::NEG_Y),
            focus: Vec3::ZERO,
            ortho_size: 20.0,
            matrix: Cell::new(Mat4::IDENTITY),
            dirty: Cell::new(true),
            rebuilds: Cell::new(0),
        }
    }

    pub fn with_params(mut self, params: LightParams) -> Self {
        self.set_params(params);
        self
    }

    pub fn params(&self) -> &LightParams {
        &self.params
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn focus(&self) -> Vec3 {
        self.focus
    }

    pub fn ortho_size(&self) -> f32 {
        self.ortho_size
    }

    /// Replace all shared parameters. Clip plane changes dirty the matrix.
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

    /// Set the travel direction. Zero vectors are ignored.
    pub fn set_direction(&mut self, direction: Vec3) {
        if direction == self.direction {
            return;
        }
        let Some(direction) = direction.try_normalize() else {
            tracing::warn!("Ignoring zero-length directional light direction");
            return;
        };
        if !direction.abs_diff_eq(self.direction, f32::EPSILON) {
            self.direction = direction;
            self.dirty.set(true);
        }
    }

    pub fn set_focus(&mut self, focus: Vec3) {
        if focus != self.focus {
            self.focus = focus;
            self.dirty.set(true);
        }
    }

    pub fn set_ortho_size(&mut self, size: f32) {
        if size != self.ortho_size {
            self.ortho_size = size;
            self.dirty.set(true);
        }
    }

    /// Fit the frustum around a bounding sphere.
    pub fn fit_to_sphere(&mut self, center: Vec3, radius: f32) {
        self.set_focus(center);
        self.set_ortho_size(radius * 1.5);
        let mut params = self.params;
        params.far = radius * 4.0;
        self.set_params(params);
    }

    /// Returns true if the next matrix query recomputes.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Number of times the light-space matrix has been rebuilt.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.get()
    }

    /// Orthographic projection × view from the light.
    pub fn light_space_matrix(&self) -> Mat4 {
        if self.dirty.get() {
            self.matrix.set(self.projection_matrix() * self.view_matrix());
            self.dirty.set(false);
            self.rebuilds.set(self.rebuilds.get() + 1);
        }
        self.matrix.get()
    }

    fn view_matrix(&self) -> Mat4 {
        let eye = self.focus - self.direction * (self.params.far * 0.5);
        Mat4::look_at_rh(eye, self.focus, up_for(self.direction))
    }

    fn projection_matrix(&self) -> Mat4 {
        Mat4::orthographic_rh(
            -self.ortho_size,
            self.ortho_size,
            -self.ortho_size,
            self.ortho_size,
            self.params.near,
            self.params.far,
        )
    }
}

/// Up vector for a look-at along `direction`, avoiding the degenerate case.
fn up_for(direction: Vec3) -> Vec3 {
    if direction.cross(UP_REFERENCE).length_squared() < 1e-6 {
        FALLBACK_UP
    } else {
        UP_REFERENCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_finite(m: Mat4) -> bool {
        m.to_cols_array().iter().all(|v| v.is_finite())
    }

    #[test]
    fn test_matrix_cached_until_direction_changes() {
        let light = DirectionalLight::new(Vec3::new(0.5, -1.0, 0.2));
        let a = light.light_space_matrix();
        let b = light.light_space_matrix();
        assert_eq!(light.rebuild_count(), 1);
        assert_eq!(a.to_cols_array(), b.to_cols_array());
    }

    #[test]
    fn test_direction_change_dirties() {
        let mut light = DirectionalLight::new(Vec3::NEG_Y + Vec3::X);
        let before = light.light_space_matrix();

        light.set_direction(Vec3::new(0.0, -1.0, 1.0));
        assert!(light.is_dirty());
        let after = light.light_space_matrix();

        assert_eq!(light.rebuild_count(), 2);
        assert_ne!(before, after);
    }

    #[test]
    fn test_noop_direction_keeps_cache() {
        let mut light = DirectionalLight::new(Vec3::new(1.0, -2.0, 0.5));
        let before = light.light_space_matrix();

        light.set_direction(light.direction());
        assert!(!light.is_dirty());

        assert_eq!(light.light_space_matrix(), before);
        assert_eq!(light.rebuild_count(), 1);
    }

    #[test]
    fn test_parallel_to_up_has_no_nan() {
        for direction in [Vec3::Y, Vec3::NEG_Y] {
            let light = DirectionalLight::new(direction);
            assert!(all_finite(light.light_space_matrix()));
        }
    }

    #[test]
    fn test_zero_direction_is_ignored() {
        let mut light = DirectionalLight::new(Vec3::X);
        light.set_direction(Vec3::ZERO);
        assert_eq!(light.direction(), Vec3::X);
    }

    #[test]
    fn test_focus_projects_to_center() {
        let mut light = DirectionalLight::new(Vec3::new(0.2, -1.0, 0.1));
        light.set_focus(Vec3::new(3.0, 0.0, -2.0));
        let clip = light.light_space_matrix().project_point3(light.focus());
        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }
}
