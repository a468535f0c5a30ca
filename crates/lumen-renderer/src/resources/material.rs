//! Surface materials.

use std::collections::HashMap;

use glam::Vec3;
use lumen_core::MaterialHandle;

/// Metallic-roughness surface description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Linear base color
    pub albedo: Vec3,
    pub specular: f32,
    pub metallic: f32,
    pub roughness: f32,
    /// Baked ambient occlusion
    pub ao: f32,
    /// Emissive strength, multiplies albedo
    pub emissive: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::splat(0.8),
            specular: 0.5,
            metallic: 0.0,
            roughness: 0.5,
            ao: 1.0,
            emissive: 0.0,
        }
    }
}

impl Material {
    pub fn new(albedo: Vec3) -> Self {
        Self {
            albedo,
            ..Default::default()
        }
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic.clamp(0.0, 1.0);
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    pub fn with_emissive(mut self, emissive: f32) -> Self {
        self.emissive = emissive.max(0.0);
        self
    }
}

/// Materials keyed by handle. [`MaterialHandle::DEFAULT`] is always present.
pub struct MaterialLibrary {
    default: Material,
    materials: HashMap<MaterialHandle, Material>,
    next_handle: u64,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self {
            default: Material::default(),
            materials: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn insert(&mut self, material: Material) -> MaterialHandle {
        let handle = MaterialHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        self.materials.insert(handle, material);
        handle
    }

    /// Returns the material, or the default one for unknown handles.
    pub fn get(&self, handle: MaterialHandle) -> &Material {
        self.materials.get(&handle).unwrap_or(&self.default)
    }

    pub fn default_material(&self) -> &Material {
        &self.default
    }

    /// Replaces a material, including the default. Returns false for
    /// unknown handles.
    pub fn set(&mut self, handle: MaterialHandle, material: Material) -> bool {
        if handle.is_default() {
            self.default = material;
            return true;
        }
        match self.materials.get_mut(&handle) {
            Some(slot) => {
                *slot = material;
                true
            }
            None => false,
        }
    }

    /// Removes a material. The default material cannot be removed.
    pub fn remove(&mut self, handle: MaterialHandle) -> Option<Material> {
        self.materials.remove(&handle)
    }

    pub fn contains(&self, handle: MaterialHandle) -> bool {
        handle.is_default() || self.materials.contains_key(&handle)
    }

    /// Number of materials including the default.
    pub fn len(&self) -> usize {
        self.materials.len() + 1
    }
}

impl Default for MaterialLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_handle_falls_back_to_default() {
        let library = MaterialLibrary::new();
        let missing = MaterialHandle::from_raw(42);
        assert_eq!(library.get(missing), library.default_material());
    }

    #[test]
    fn test_default_cannot_be_removed() {
        let mut library = MaterialLibrary::new();
        assert!(library.remove(MaterialHandle::DEFAULT).is_none());
        assert!(library.contains(MaterialHandle::DEFAULT));

        let gold = library.insert(Material::new(Vec3::new(1.0, 0.8, 0.3)).with_metallic(1.0));
        assert_eq!(library.len(), 2);
        assert_eq!(library.get(gold).metallic, 1.0);
        assert!(library.remove(gold).is_some());
        assert_eq!(library.get(gold), library.default_material());
    }

    #[test]
    fn test_set_replaces() {
        let mut library = MaterialLibrary::new();
        let handle = library.insert(Material::default());
        assert!(library.set(handle, Material::default().with_roughness(0.1)));
        assert_eq!(library.get(handle).roughness, 0.1);
        assert!(!library.set(MaterialHandle::from_raw(99), Material::default()));
    }
}
