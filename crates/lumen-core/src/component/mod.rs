//! Node components.
//!
//! A scene node carries at most one [`Component`]. The set of kinds is
//! closed, so capability checks are plain tag comparisons.

mod mesh;
mod model;

pub use mesh::*;
pub use model::*;

use glam::Mat4;

use crate::draw::{DrawAux, DrawSink};
use crate::light::{DirectionalLight, LightRef, PointLight};
use crate::primitive::PrimitiveShape;

/// Payload attached to a scene node.
#[derive(Debug, Clone)]
pub enum Component {
    /// A single mesh with an optional material
    Mesh(MeshComponent),
    /// A decoded model: a small tree of model nodes with meshes
    Model(ModelComponent),
    /// A generated primitive shape uploaded as a mesh
    Primitive(PrimitiveComponent),
    DirectionalLight(DirectionalLight),
    PointLight(PointLight),
}

impl Component {
    /// Returns true for components that emit geometry.
    pub fn is_mesh(&self) -> bool {
        matches!(
            self,
            Component::Mesh(_) | Component::Model(_) | Component::Primitive(_)
        )
    }

    /// Returns true for light components.
    pub fn is_light(&self) -> bool {
        matches!(
            self,
            Component::DirectionalLight(_) | Component::PointLight(_)
        )
    }

    pub fn as_light(&self) -> Option<LightRef<'_>> {
        match self {
            Component::DirectionalLight(light) => Some(LightRef::Directional(light)),
            Component::PointLight(light) => Some(LightRef::Point(light)),
            _ => None,
        }
    }

    pub fn as_directional_light(&self) -> Option<&DirectionalLight> {
        match self {
            Component::DirectionalLight(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_directional_light_mut(&mut self) -> Option<&mut DirectionalLight> {
        match self {
            Component::DirectionalLight(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_point_light(&self) -> Option<&PointLight> {
        match self {
            Component::PointLight(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_point_light_mut(&mut self) -> Option<&mut PointLight> {
        match self {
            Component::PointLight(light) => Some(light),
            _ => None,
        }
    }

    /// Emit draw calls for this component at `world`.
    ///
    /// Lights emit nothing.
    pub fn draw(&self, world: Mat4, aux: DrawAux, sink: &mut dyn DrawSink) {
        match self {
            Component::Mesh(mesh) => mesh.draw(world, aux, sink),
            Component::Model(model) => model.draw(world, aux, sink),
            Component::Primitive(primitive) => primitive.surface.draw(world, aux, sink),
            Component::DirectionalLight(_) | Component::PointLight(_) => {}
        }
    }
}

impl From<MeshComponent> for Component {
    fn from(mesh: MeshComponent) -> Self {
        Component::Mesh(mesh)
    }
}

impl From<ModelComponent> for Component {
    fn from(model: ModelComponent) -> Self {
        Component::Model(model)
    }
}

impl From<PrimitiveComponent> for Component {
    fn from(primitive: PrimitiveComponent) -> Self {
        Component::Primitive(primitive)
    }
}

impl From<DirectionalLight> for Component {
    fn from(light: DirectionalLight) -> Self {
        Component::DirectionalLight(light)
    }
}

impl From<PointLight> for Component {
    fn from(light: PointLight) -> Self {
        Component::PointLight(light)
    }
}

/// A generated shape drawn through an uploaded mesh.
#[derive(Debug, Clone)]
pub struct PrimitiveComponent {
    pub shape: PrimitiveShape,
    pub surface: MeshComponent,
}

impl PrimitiveComponent {
    pub fn new(shape: PrimitiveShape, surface: MeshComponent) -> Self {
        Self { shape, surface }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::draw::DrawCall;
    use crate::handles::{MaterialHandle, MeshHandle};

    #[test]
    fn test_capabilities() {
        let mesh: Component = MeshComponent::new(MeshHandle::from_raw(1)).into();
        let sun: Component = DirectionalLight::new(Vec3::NEG_Y).into();
        let bulb: Component = PointLight::new().into();

        assert!(mesh.is_mesh() && !mesh.is_light());
        assert!(sun.is_light() && !sun.is_mesh());
        assert!(bulb.is_light());
        assert!(matches!(bulb.as_light(), Some(LightRef::Point(_))));
        assert!(mesh.as_light().is_none());
    }

    #[test]
    fn test_lights_emit_nothing() {
        let mut calls: Vec<DrawCall> = Vec::new();
        Component::from(PointLight::new()).draw(Mat4::IDENTITY, DrawAux::None, &mut calls);
        assert!(calls.is_empty());
    }

    #[test]
    fn test_primitive_draws_its_surface() {
        let surface = MeshComponent::new(MeshHandle::from_raw(9))
            .with_material(MaterialHandle::from_raw(4));
        let primitive = Component::from(PrimitiveComponent::new(PrimitiveShape::Cube, surface));

        let mut calls: Vec<DrawCall> = Vec::new();
        primitive.draw(Mat4::IDENTITY, DrawAux::None, &mut calls);

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].mesh, MeshHandle::from_raw(9));
        assert_eq!(calls[0].material, MaterialHandle::from_raw(4));
    }
}
