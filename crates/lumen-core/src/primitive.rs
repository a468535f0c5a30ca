//! Procedural primitive geometry.
//!
//! All shapes are unit-sized, centered on the origin and wound
//! counter-clockwise when viewed from outside.

use std::f32::consts::PI;

use glam::Vec3;

/// Built-in shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveShape {
    /// Unit cube with per-face normals
    Cube,
    /// UV sphere of radius 0.5
    Sphere { sectors: u32, stacks: u32 },
    /// Unit square in the XZ plane facing +Y
    Plane,
    /// Square spanning [-1, 1] in the XY plane facing +Z
    Quad,
}

impl PrimitiveShape {
    pub fn sphere() -> Self {
        PrimitiveShape::Sphere {
            sectors: 32,
            stacks: 16,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveShape::Cube => "cube",
            PrimitiveShape::Sphere { .. } => "sphere",
            PrimitiveShape::Plane => "plane",
            PrimitiveShape::Quad => "quad",
        }
    }

    pub fn generate(&self) -> PrimitiveGeometry {
        match *self {
            PrimitiveShape::Cube => cube(),
            PrimitiveShape::Sphere { sectors, stacks } => sphere(0.5, sectors.max(3), stacks.max(2)),
            PrimitiveShape::Plane => {
                let mut geometry = PrimitiveGeometry::default();
                geometry.push_face(Vec3::ZERO, Vec3::X * 0.5, Vec3::NEG_Z * 0.5);
                geometry
            }
            PrimitiveShape::Quad => {
                let mut geometry = PrimitiveGeometry::default();
                geometry.push_face(Vec3::ZERO, Vec3::X, Vec3::Y);
                geometry
            }
        }
    }
}

/// CPU-side vertex streams for a generated shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimitiveGeometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl PrimitiveGeometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Append a quad spanning `center ± u ± v` with normal `u × v`.
    fn push_face(&mut self, center: Vec3, u: Vec3, v: Vec3) {
        let base = self.positions.len() as u32;
        let normal = u.cross(v).normalize();
        let corners = [
            (center - u - v, [0.0, 1.0]),
            (center + u - v, [1.0, 1.0]),
            (center + u + v, [1.0, 0.0]),
            (center - u + v, [0.0, 0.0]),
        ];
        for (position, uv) in corners {
            self.positions.push(position.to_array());
            self.normals.push(normal.to_array());
            self.uvs.push(uv);
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

fn cube() -> PrimitiveGeometry {
    let mut geometry = PrimitiveGeometry::default();
    // (normal, u, v) with u × v = normal
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    for (normal, u, v) in faces {
        geometry.push_face(normal * 0.5, u * 0.5, v * 0.5);
    }
    geometry
}

fn sphere(radius: f32, sectors: u32, stacks: u32) -> PrimitiveGeometry {
    let mut geometry = PrimitiveGeometry::default();
    let sector_step = 2.0 * PI / sectors as f32;
    let stack_step = PI / stacks as f32;

    for i in 0..=stacks {
        let stack_angle = PI / 2.0 - i as f32 * stack_step;
        let ring = radius * stack_angle.cos();
        let y = radius * stack_angle.sin();

        for j in 0..=sectors {
            let sector_angle = j as f32 * sector_step;
            let position = Vec3::new(ring * sector_angle.cos(), y, ring * sector_angle.sin());
            geometry.positions.push(position.to_array());
            geometry
                .normals
                .push((position / radius).to_array());
            geometry
                .uvs
                .push([j as f32 / sectors as f32, i as f32 / stacks as f32]);
        }
    }

    //  k1--k1+1
    //  |  / |
    //  | /  |
    //  k2--k2+1
    for i in 0..stacks {
        let mut k1 = i * (sectors + 1);
        let mut k2 = k1 + sectors + 1;
        for _ in 0..sectors {
            if i != 0 {
                geometry.indices.extend_from_slice(&[k1, k1 + 1, k2]);
            }
            if i != stacks - 1 {
                geometry.indices.extend_from_slice(&[k1 + 1, k2 + 1, k2]);
            }
            k1 += 1;
            k2 += 1;
        }
    }

    geometry
}
