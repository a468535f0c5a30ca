//! Environment background.

use lumen_core::{MeshHandle, ModuleKind};

use super::{RenderModule, SharedLayouts};
use crate::context::RenderContext;
use crate::error::RenderResult;
use crate::gpu::layouts;
use crate::gpu::program::{Program, ProgramDesc};
use crate::gpu::texture::Texture;
use crate::resources::{MeshManager, MeshVertex};
use crate::shader_library::ShaderLibrary;

const LABEL: &str = "Skybox";
const SHADERS: &[&str] = &["frame", "skybox"];

/// Draws the environment cube behind everything the lighting pass wrote.
///
/// The pass runs after scene depth has been copied into the output target and
/// only passes where depth is still at the far plane.
pub struct SkyboxModule {
    enabled: bool,
    cube: MeshHandle,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    bind_group: Option<wgpu::BindGroup>,
}

impl SkyboxModule {
    /// `cube` is the unit cube mesh drawn around the camera.
    pub fn new(ctx: &RenderContext, cube: MeshHandle) -> Self {
        let device = ctx.device();
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Skybox Bind Group Layout"),
            entries: &[
                layouts::filtered_texture_entry(0, wgpu::TextureViewDimension::Cube),
                layouts::sampler_entry(1, wgpu::SamplerBindingType::Filtering),
            ],
        });
        Self {
            enabled: true,
            cube,
            layout,
            sampler: layouts::create_linear_sampler(device, "Skybox Sampler"),
            bind_group: None,
        }
    }

    /// Binds a new environment cube.
    pub fn set_environment(&mut self, device: &wgpu::Device, environment: &Texture) {
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skybox Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&environment.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
    }

    pub fn has_environment(&self) -> bool {
        self.bind_group.is_some()
    }

    /// Draws the skybox. Returns false when nothing was drawn.
    pub fn render(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        program: &Program,
        frame: &wgpu::BindGroup,
        meshes: &MeshManager,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let (Some(bind_group), Some(mesh)) = (&self.bind_group, meshes.get(self.cube)) else {
            return false;
        };
        pass.set_pipeline(program.pipeline());
        pass.set_bind_group(0, frame, &[]);
        pass.set_bind_group(1, bind_group, &[]);
        mesh.geometry.draw(pass);
        true
    }
}

impl RenderModule for SkyboxModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Skybox
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn shaders(&self) -> &'static [&'static str] {
        SHADERS
    }

    fn build_program(
        &self,
        ctx: &RenderContext,
        library: &ShaderLibrary,
        layouts: &SharedLayouts<'_>,
    ) -> RenderResult<Program> {
        // viewed from inside, so no culling
        ProgramDesc::new(LABEL, library, SHADERS)?
            .with_bind_group_layouts(&[layouts.frame, &self.layout])
            .with_vertex_layouts(vec![MeshVertex::layout()])
            .with_target(ctx.output_format())
            .with_depth(ctx.depth_format(), false, wgpu::CompareFunction::LessEqual)
            .with_cull_mode(None)
            .build(ctx)
    }
}

#[cfg(test)]
mod tests {
    use lumen_core::PrimitiveShape;

    use super::*;
    use crate::constants::formats;
    use crate::context::test_context;
    use crate::gpu::texture::{TextureDesc, TextureKind};

    #[test]
    fn test_environment_binding() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut meshes = MeshManager::new();
        let cube = meshes.primitive(ctx.device(), PrimitiveShape::Cube);
        let mut skybox = SkyboxModule::new(&ctx, cube);
        assert!(!skybox.has_environment());

        let environment = Texture::new(
            ctx.device(),
            TextureDesc::new("env", formats::ENVIRONMENT, 16, 16).with_kind(TextureKind::Cube),
        );
        skybox.set_environment(ctx.device(), &environment);
        assert!(skybox.has_environment());
        assert_eq!(skybox.name(), "skybox");
    }
}
