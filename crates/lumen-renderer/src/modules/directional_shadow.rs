//! Shadow maps for directional lights.

use std::sync::Arc;

use lumen_core::{ModuleKind, NodeId, Scene};

use super::{
    PreparedDraw, RenderModule, ShadowLayers, ShadowPasses, SharedLayouts, draw_prepared, layer_budget,
};
use crate::config::ShadowConfig;
use crate::constants::formats;
use crate::context::RenderContext;
use crate::error::RenderResult;
use crate::gpu::framebuffer::{Framebuffer, PassOps};
use crate::gpu::program::{Program, ProgramDesc};
use crate::gpu::texture::{Texture, TextureDesc, TextureKind};
use crate::resources::{MeshManager, MeshVertex};
use crate::shader_library::ShaderLibrary;
use crate::uniforms::ShadowPassUniform;

const LABEL: &str = "Directional Shadow";
const SHADERS: &[&str] = &["shadow_pass", "object", "directional_shadow"];

/// Renders one orthographic depth map per shadowed directional light into a
/// 2D texture array.
pub struct DirectionalShadowModule {
    enabled: bool,
    layers: ShadowLayers,
    texture: Arc<Texture>,
    framebuffer: Framebuffer,
    passes: ShadowPasses,
}

impl DirectionalShadowModule {
    pub fn new(ctx: &RenderContext, config: &ShadowConfig) -> RenderResult<Self> {
        let size = config.directional_size;
        let num_layers = layer_budget(config.num_layers, 1, ctx.device().limits().max_texture_array_layers);
        let texture = Arc::new(Texture::new(
            ctx.device(),
            TextureDesc::new("Directional Shadow Array", formats::SHADOW, size, size)
                .with_kind(TextureKind::D2Array { layers: num_layers }),
        ));
        let framebuffer = Framebuffer::builder(LABEL, size, size)
            .depth(texture.clone())
            .build(ctx.device())?;
        let passes = ShadowPasses::new(
            ctx.device(),
            "Directional Shadow Passes",
            ctx.uniform_alignment(),
            u64::from(num_layers),
        );

        Ok(Self {
            enabled: true,
            layers: ShadowLayers::new(num_layers),
            texture,
            framebuffer,
            passes,
        })
    }

    /// The shadow array, sampled by the lighting pass.
    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    pub fn layers(&self) -> &ShadowLayers {
        &self.layers
    }

    /// Layer holding `node`'s shadow this frame.
    pub fn layer_of(&self, node: NodeId) -> Option<u32> {
        self.layers.layer_of(node)
    }

    /// Assigns layers to `lights` in order and stages their uniforms.
    pub fn prepare(&mut self, ctx: &RenderContext, scene: &Scene, lights: &[NodeId]) {
        self.passes.clear();
        if !self.enabled {
            self.layers.clear();
            return;
        }

        self.layers.assign(
            lights
                .iter()
                .filter_map(|id| scene.directional_light(*id).map(|l| (*id, l.params().has_shadows))),
        );
        for id in self.layers.assigned() {
            let Some(light) = scene.directional_light(*id) else {
                continue;
            };
            let params = light.params();
            let eye = light.focus() - light.direction() * (params.far * 0.5);
            self.passes.push(&ShadowPassUniform::new(
                light.light_space_matrix(),
                eye,
                params.near,
                params.far,
            ));
        }
        self.passes.upload(ctx.device(), ctx.queue(), LABEL);
    }

    /// Renders every assigned layer. Returns the number of draws issued.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        program: &Program,
        meshes: &MeshManager,
        objects: &wgpu::BindGroup,
        draws: &[PreparedDraw],
    ) -> u32 {
        let mut issued = 0;
        for (layer, offset) in self.passes.offsets().iter().enumerate() {
            let mut pass =
                self.framebuffer
                    .begin_layer(encoder, "Directional Shadow Pass", layer as u32, 0, PassOps::clear_depth());
            pass.set_pipeline(program.pipeline());
            pass.set_bind_group(0, self.passes.bind_group(), &[*offset]);
            issued += draw_prepared(&mut pass, meshes, objects, draws);
        }
        issued
    }
}

impl RenderModule for DirectionalShadowModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::DirectionalShadow
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
        ProgramDesc::new(LABEL, library, SHADERS)?
            .with_bind_group_layouts(&[self.passes.layout(), layouts.object])
            .with_vertex_layouts(vec![MeshVertex::layout()])
            .with_depth(formats::SHADOW, true, wgpu::CompareFunction::Less)
            .with_depth_bias(2, 2.0)
            .with_cull_mode(Some(wgpu::Face::Front))
            .without_fragment()
            .build(ctx)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use lumen_core::{DirectionalLight, LightParams, SceneNode};

    use super::*;
    use crate::context::test_context;

    #[test]
    fn test_array_sized_by_layers() {
        let Some(ctx) = test_context() else {
            return;
        };
        let config = ShadowConfig {
            num_layers: 3,
            directional_size: 256,
            ..Default::default()
        };
        let module = DirectionalShadowModule::new(&ctx, &config).unwrap();
        assert_eq!(module.texture().kind(), TextureKind::D2Array { layers: 3 });
        assert_eq!(module.texture().size(), (256, 256));
    }

    #[test]
    fn test_only_shadowed_lights_get_layers() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut scene = Scene::new();
        let root = scene.root();
        let lit = scene
            .insert(root, SceneNode::new("sun").with_component(DirectionalLight::new(Vec3::NEG_Y)))
            .unwrap();
        let unshadowed = DirectionalLight::new(Vec3::X).with_params(LightParams {
            has_shadows: false,
            ..Default::default()
        });
        let fill = scene
            .insert(root, SceneNode::new("fill").with_component(unshadowed))
            .unwrap();
        let lights = scene.gather_lights();

        let mut module = DirectionalShadowModule::new(&ctx, &ShadowConfig::default()).unwrap();
        module.prepare(&ctx, &scene, &lights.directional);
        assert_eq!(module.layer_of(lit), Some(0));
        assert_eq!(module.layer_of(fill), None);

        module.set_enabled(false);
        module.prepare(&ctx, &scene, &lights.directional);
        assert!(module.layers().is_empty());
    }
}
