//! Local transform with a lazily rebuilt matrix.

use std::cell::Cell;

use glam::{Mat4, Quat, Vec3};

/// Position, rotation and scale of a scene node relative to its parent.
///
/// Writes only mark the cached matrix dirty; the matrix is rebuilt on the
/// next [`Transform::matrix`] call. Reading twice without an intervening
/// write returns the cached value untouched.
#[derive(Debug, Clone)]
pub struct Transform {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    front: Vec3,
    right: Vec3,
    up: Vec3,
    matrix: Cell<Mat4>,
    dirty: Cell<bool>,
    rebuilds: Cell<u64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform {
    /// Identity transform.
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            front: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
            matrix: Cell::new(Mat4::IDENTITY),
            dirty: Cell::new(false),
            rebuilds: Cell::new(0),
        }
    }

    /// Transform at the given position.
    pub fn from_position(position: Vec3) -> Self {
        let mut transform = Self::new();
        transform.set_position(position);
        transform
    }

    /// Builder: set the rotation.
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.set_rotation(rotation);
        self
    }

    /// Builder: set the scale.
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.set_scale(scale);
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Forward direction (-Z rotated by the current rotation).
    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn set_position(&mut self, position: Vec3) {
        if position != self.position {
            self.position = position;
            self.dirty.set(true);
        }
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        if rotation == self.rotation {
            return;
        }
        let rotation = rotation.normalize();
        if rotation != self.rotation {
            self.rotation = rotation;
            self.update_basis();
            self.dirty.set(true);
        }
    }

    /// Set rotation from Euler angles (radians, XYZ order).
    pub fn set_euler(&mut self, x: f32, y: f32, z: f32) {
        self.set_rotation(Quat::from_euler(glam::EulerRot::XYZ, x, y, z));
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        if scale != self.scale {
            self.scale = scale;
            self.dirty.set(true);
        }
    }

    /// Move by `delta` in parent space.
    pub fn translate(&mut self, delta: Vec3) {
        self.set_position(self.position + delta);
    }

    /// Apply `rotation` in local space.
    pub fn rotate(&mut self, rotation: Quat) {
        self.set_rotation(self.rotation * rotation);
    }

    /// Rotate by `angle` radians around a local `axis`.
    pub fn rotate_axis(&mut self, axis: Vec3, angle: f32) {
        self.rotate(Quat::from_axis_angle(axis.normalize(), angle));
    }

    /// Multiply the current scale component-wise.
    pub fn scale_by(&mut self, factor: Vec3) {
        self.set_scale(self.scale * factor);
    }

    /// Local matrix (translation × rotation × scale).
    pub fn matrix(&self) -> Mat4 {
        if self.dirty.get() {
            self.matrix.set(Mat4::from_scale_rotation_translation(
                self.scale,
                self.rotation,
                self.position,
            ));
            self.dirty.set(false);
            self.rebuilds.set(self.rebuilds.get() + 1);
        }
        self.matrix.get()
    }

    /// Returns true if the next [`Transform::matrix`] call rebuilds.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Number of times the matrix has been rebuilt.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.get()
    }

    fn update_basis(&mut self) {
        self.front = (self.rotation * Vec3::NEG_Z).normalize();
        self.right = (self.rotation * Vec3::X).normalize();
        self.up = (self.rotation * Vec3::Y).normalize();
    }
}
