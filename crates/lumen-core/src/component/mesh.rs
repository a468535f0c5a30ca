//! Mesh component.

use glam::Mat4;

use crate::draw::{DrawAux, DrawCall, DrawSink};
use crate::handles::{MaterialHandle, MeshHandle};

/// Reference to an uploaded mesh plus per-instance draw settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshComponent {
    pub mesh: MeshHandle,
    /// Material to draw with; `None` uses the shared default material
    pub material: Option<MaterialHandle>,
    /// Whether shadow modules draw this mesh
    pub casts_shadow: bool,
}

impl MeshComponent {
    pub fn new(mesh: MeshHandle) -> Self {
        Self {
            mesh,
            material: None,
            casts_shadow: true,
        }
    }

    pub fn with_material(mut self, material: MaterialHandle) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_casts_shadow(mut self, casts_shadow: bool) -> Self {
        self.casts_shadow = casts_shadow;
        self
    }

    /// Material used when no override is threaded through.
    pub fn effective_material(&self) -> MaterialHandle {
        self.material.unwrap_or(MaterialHandle::DEFAULT)
    }

    pub fn draw(&self, world: Mat4, aux: DrawAux, sink: &mut dyn DrawSink) {
        let material = match aux {
            DrawAux::None => self.effective_material(),
            DrawAux::Material(material) => material,
            DrawAux::Module(kind) => {
                if kind.is_shadow() && !self.casts_shadow {
                    return;
                }
                self.effective_material()
            }
        };

        sink.submit(DrawCall {
            mesh: self.mesh,
            world,
            material,
            casts_shadow: self.casts_shadow,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::ModuleKind;

    fn record(mesh: &MeshComponent, aux: DrawAux) -> Vec<DrawCall> {
        let mut calls = Vec::new();
        mesh.draw(Mat4::IDENTITY, aux, &mut calls);
        calls
    }

    #[test]
    fn test_missing_material_uses_default() {
        let mesh = MeshComponent::new(MeshHandle::from_raw(1));
        let calls = record(&mesh, DrawAux::None);
        assert_eq!(calls[0].material, MaterialHandle::DEFAULT);
    }

    #[test]
    fn test_material_override() {
        let mesh = MeshComponent::new(MeshHandle::from_raw(1))
            .with_material(MaterialHandle::from_raw(3));
        let calls = record(&mesh, DrawAux::Material(MaterialHandle::from_raw(7)));
        assert_eq!(calls[0].material, MaterialHandle::from_raw(7));
    }

    #[test]
    fn test_shadow_modules_skip_non_casters() {
        let mesh = MeshComponent::new(MeshHandle::from_raw(1)).with_casts_shadow(false);
        assert!(record(&mesh, DrawAux::Module(ModuleKind::DirectionalShadow)).is_empty());
        assert!(record(&mesh, DrawAux::Module(ModuleKind::PointShadow)).is_empty());
        assert_eq!(record(&mesh, DrawAux::Module(ModuleKind::Skybox)).len(), 1);
        assert_eq!(record(&mesh, DrawAux::None).len(), 1);
    }
}
