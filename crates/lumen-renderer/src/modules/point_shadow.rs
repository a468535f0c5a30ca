//! Omnidirectional shadow maps for point lights.

use std::sync::Arc;

use lumen_core::{ModuleKind, NodeId, Scene};

use super::{
    PreparedDraw, RenderModule, ShadowLayers, ShadowPasses, SharedLayouts, draw_prepared, layer_budget,
};
use crate::config::ShadowConfig;
use crate::constants::{CUBE_FACES, formats};
use crate::context::RenderContext;
use crate::error::RenderResult;
use crate::gpu::framebuffer::{Framebuffer, PassOps};
use crate::gpu::program::{Program, ProgramDesc};
use crate::gpu::texture::{Texture, TextureDesc, TextureKind};
use crate::resources::{MeshManager, MeshVertex};
use crate::shader_library::ShaderLibrary;
use crate::uniforms::ShadowPassUniform;

const LABEL: &str = "Point Shadow";
const SHADERS: &[&str] = &["shadow_pass", "object", "point_shadow"];

/// Renders six faces per shadowed point light into a cube map array.
///
/// Depth holds distance to the light divided by the light's far plane, so
/// the lighting pass compares linear distances.
pub struct PointShadowModule {
    enabled: bool,
    layers: ShadowLayers,
    texture: Arc<Texture>,
    framebuffer: Framebuffer,
    passes: ShadowPasses,
}

impl PointShadowModule {
    pub fn new(ctx: &RenderContext, config: &ShadowConfig) -> RenderResult<Self> {
        let size = config.point_size;
        let num_layers = layer_budget(
            config.num_layers,
            CUBE_FACES,
            ctx.device().limits().max_texture_array_layers,
        );
        let texture = Arc::new(Texture::new(
            ctx.device(),
            TextureDesc::new("Point Shadow Cube Array", formats::SHADOW, size, size)
                .with_kind(TextureKind::CubeArray { cubes: num_layers }),
        ));
        let framebuffer = Framebuffer::builder(LABEL, size, size)
            .depth(texture.clone())
            .build(ctx.device())?;
        let passes = ShadowPasses::new(
            ctx.device(),
            "Point Shadow Passes",
            ctx.uniform_alignment(),
            u64::from(num_layers * CUBE_FACES),
        );

        Ok(Self {
            enabled: true,
            layers: ShadowLayers::new(num_layers),
            texture,
            framebuffer,
            passes,
        })
    }

    /// The cube array, sampled by the lighting pass.
    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    pub fn layers(&self) -> &ShadowLayers {
        &self.layers
    }

    /// Cube index holding `node`'s shadow this frame.
    pub fn layer_of(&self, node: NodeId) -> Option<u32> {
        self.layers.layer_of(node)
    }

    /// Assigns cubes to `lights` in order and stages six face uniforms each.
    pub fn prepare(&mut self, ctx: &RenderContext, scene: &Scene, lights: &[NodeId]) {
        self.passes.clear();
        if !self.enabled {
            self.layers.clear();
            return;
        }

        self.layers.assign(
            lights
                .iter()
                .filter_map(|id| scene.point_light(*id).map(|l| (*id, l.params().has_shadows))),
        );
        for id in self.layers.assigned() {
            let Some(light) = scene.point_light(*id) else {
                continue;
            };
            let params = light.params();
            for matrix in light.light_space_matrices() {
                self.passes.push(&ShadowPassUniform::new(
                    matrix,
                    light.position(),
                    params.near,
                    params.far,
                ));
            }
        }
        self.passes.upload(ctx.device(), ctx.queue(), LABEL);
    }

    /// Renders every face of every assigned cube. Returns the number of
    /// draws issued.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        program: &Program,
        meshes: &MeshManager,
        objects: &wgpu::BindGroup,
        draws: &[PreparedDraw],
    ) -> u32 {
        let mut issued = 0;
        // cube c, face f lives at array layer c * 6 + f, which is also the
        // order the face uniforms were staged in
        for (layer, offset) in self.passes.offsets().iter().enumerate() {
            let mut pass =
                self.framebuffer
                    .begin_layer(encoder, "Point Shadow Pass", layer as u32, 0, PassOps::clear_depth());
            pass.set_pipeline(program.pipeline());
            pass.set_bind_group(0, self.passes.bind_group(), &[*offset]);
            issued += draw_prepared(&mut pass, meshes, objects, draws);
        }
        issued
    }
}

impl RenderModule for PointShadowModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::PointShadow
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
        // the face projections flip y, which reverses screen-space winding
        ProgramDesc::new(LABEL, library, SHADERS)?
            .with_bind_group_layouts(&[self.passes.layout(), layouts.object])
            .with_vertex_layouts(vec![MeshVertex::layout()])
            .with_depth(formats::SHADOW, true, wgpu::CompareFunction::Less)
            .with_front_face(wgpu::FrontFace::Cw)
            .with_cull_mode(Some(wgpu::Face::Front))
            .build(ctx)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use lumen_core::{PointLight, SceneNode, Transform};

    use super::*;
    use crate::context::test_context;

    #[test]
    fn test_cube_array_has_six_faces_per_layer() {
        let Some(ctx) = test_context() else {
            return;
        };
        let config = ShadowConfig {
            num_layers: 2,
            point_size: 64,
            ..Default::default()
        };
        let module = PointShadowModule::new(&ctx, &config).unwrap();
        assert_eq!(module.texture().kind().depth_or_layers(), 12);
    }

    #[test]
    fn test_oversized_layer_count_is_clamped() {
        let Some(ctx) = test_context() else {
            return;
        };
        // bypasses RendererConfig::sanitized
        let config = ShadowConfig {
            num_layers: 50,
            point_size: 64,
            ..Default::default()
        };
        let module = PointShadowModule::new(&ctx, &config).unwrap();
        let layers = module.layers().capacity();
        assert!(layers <= crate::constants::shadow::MAX_LAYERS);
        assert!(module.texture().kind().depth_or_layers() <= ctx.device().limits().max_texture_array_layers);
        assert_eq!(module.texture().kind().depth_or_layers(), layers * CUBE_FACES);
    }

    #[test]
    fn test_capacity_overflow_is_silent() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut scene = Scene::new();
        let root = scene.root();
        let ids: Vec<_> = (0..10)
            .map(|i| {
                let node = SceneNode::new(format!("bulb{i}"))
                    .with_transform(Transform::from_position(Vec3::new(i as f32, 1.0, 0.0)))
                    .with_component(PointLight::new());
                scene.insert(root, node).unwrap()
            })
            .collect();
        let lights = scene.gather_lights();

        let config = ShadowConfig {
            num_layers: 8,
            point_size: 64,
            ..Default::default()
        };
        let mut module = PointShadowModule::new(&ctx, &config).unwrap();
        module.prepare(&ctx, &scene, &lights.point);

        assert_eq!(module.layers().len(), 8);
        assert_eq!(module.layer_of(ids[7]), Some(7));
        assert_eq!(module.layer_of(ids[8]), None);
        assert_eq!(module.layer_of(ids[9]), None);
        assert_eq!(module.passes.offsets().len(), 8 * 6);
    }
}
