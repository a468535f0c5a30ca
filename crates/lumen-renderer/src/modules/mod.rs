//! Render modules.
//!
//! A module pairs one program with the uniform protocol of one GPU pass.
//! Scene traversals are threaded through a module with
//! [`DrawAux::Module`](lumen_core::DrawAux), so mesh components can opt out
//! of passes they do not take part in.

mod directional_shadow;
mod point_shadow;
mod shadow_layers;
mod skybox;
mod ssao;

pub use directional_shadow::DirectionalShadowModule;
pub use point_shadow::PointShadowModule;
pub use shadow_layers::{ShadowLayers, ShadowPasses, layer_budget};
pub use skybox::SkyboxModule;
pub use ssao::{SsaoModule, generate_kernel, generate_noise};

use lumen_core::{MeshHandle, ModuleKind};

use crate::context::RenderContext;
use crate::error::RenderResult;
use crate::gpu::program::{Program, ProgramKey};
use crate::resources::MeshManager;
use crate::shader_library::ShaderLibrary;

/// Layouts owned by the renderer that module programs bind against.
pub struct SharedLayouts<'a> {
    /// Group 0 of scene passes
    pub frame: &'a wgpu::BindGroupLayout,
    /// Per-draw object uniforms
    pub object: &'a wgpu::BindGroupLayout,
}

/// Common interface of every render module.
pub trait RenderModule {
    fn kind(&self) -> ModuleKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    fn program_key(&self) -> ProgramKey {
        ProgramKey::Module(self.kind())
    }

    /// Shader names composed into this module's program.
    fn shaders(&self) -> &'static [&'static str];

    /// Compiles the module's program.
    fn build_program(
        &self,
        ctx: &RenderContext,
        library: &ShaderLibrary,
        layouts: &SharedLayouts<'_>,
    ) -> RenderResult<Program>;

    /// Called once per viewport size change.
    fn on_resize(&mut self, _ctx: &RenderContext, _width: u32, _height: u32) {}
}

/// A recorded draw whose object uniforms are already staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedDraw {
    pub mesh: MeshHandle,
    /// Dynamic offset into the object uniform buffer
    pub offset: u32,
}

/// Draws every prepared call with group 1 bound at its offset.
///
/// Returns the number of draws issued.
pub(crate) fn draw_prepared(
    pass: &mut wgpu::RenderPass<'_>,
    meshes: &MeshManager,
    objects: &wgpu::BindGroup,
    draws: &[PreparedDraw],
) -> u32 {
    let mut issued = 0;
    for draw in draws {
        let Some(mesh) = meshes.get(draw.mesh) else {
            continue;
        };
        pass.set_bind_group(1, objects, &[draw.offset]);
        mesh.geometry.draw(pass);
        issued += 1;
    }
    issued
}
