//! Draw recording.
//!
//! Scene traversal does not talk to the GPU directly. Components emit
//! [`DrawCall`]s into a [`DrawSink`]; the renderer encodes the recorded list
//! into whichever pass requested the walk.

use glam::Mat4;

use crate::handles::{MaterialHandle, MeshHandle};

/// Render-pass modules a traversal can be threaded through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Depth-only pass into the directional shadow array
    DirectionalShadow,
    /// Depth-only pass into the point shadow cube array
    PointShadow,
    /// Environment background
    Skybox,
    /// Screen-space ambient occlusion
    Ssao,
}

impl ModuleKind {
    /// Returns true for modules that render shadow depth.
    pub fn is_shadow(&self) -> bool {
        matches!(self, ModuleKind::DirectionalShadow | ModuleKind::PointShadow)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModuleKind::DirectionalShadow => "directional_shadow",
            ModuleKind::PointShadow => "point_shadow",
            ModuleKind::Skybox => "skybox",
            ModuleKind::Ssao => "ssao",
        }
    }
}

/// Auxiliary object threaded through a traversal to every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawAux {
    /// Regular draw, each mesh uses its own material
    #[default]
    None,
    /// Every mesh is drawn with this material instead of its own
    Material(MaterialHandle),
    /// Draw on behalf of a render module
    Module(ModuleKind),
}

/// One mesh draw emitted by a traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub mesh: MeshHandle,
    pub world: Mat4,
    pub material: MaterialHandle,
    pub casts_shadow: bool,
}

/// Receiver of draw calls emitted during traversal.
pub trait DrawSink {
    fn submit(&mut self, call: DrawCall);
}

impl DrawSink for Vec<DrawCall> {
    fn submit(&mut self, call: DrawCall) {
        self.push(call);
    }
}

/// Recorded draw calls for one pass.
#[derive(Debug, Default, Clone)]
pub struct DrawList {
    calls: Vec<DrawCall>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Clears recorded calls but keeps the allocation.
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawCall> {
        self.calls.iter()
    }
}

impl DrawSink for DrawList {
    fn submit(&mut self, call: DrawCall) {
        self.calls.push(call);
    }
}
