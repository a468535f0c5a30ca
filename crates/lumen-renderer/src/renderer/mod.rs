//! Deferred renderer.
//!
//! One frame runs, in order:
//!
//! 1. geometry: scene meshes into the G-buffer
//! 2. shadow: both shadow modules over the gathered light lists
//! 3. SSAO: occlusion and blur, when enabled
//! 4. lighting: G-buffer, shadow arrays, IBL and occlusion into the output
//! 5. forward: G-buffer depth copied into the output target, then the skybox
//!
//! Frame uniforms are written once before the first pass. Everything is
//! recorded into one encoder, so pass ordering is the only synchronisation.

mod frame_stats;
mod gbuffer;

pub use frame_stats::FrameStats;
pub use gbuffer::GBuffer;

use std::sync::Arc;
use std::time::Instant;

use bytemuck::Zeroable;
use lumen_core::{DrawAux, DrawList, MeshHandle, ModuleKind, NodeId, PrimitiveShape, Scene};

use crate::camera::Camera;
use crate::config::RendererConfig;
use crate::constants::lights;
use crate::context::RenderContext;
use crate::environment::{Environment, EnvironmentSource};
use crate::error::RenderResult;
use crate::gpu::bind_group::TrackedBindGroup;
use crate::gpu::framebuffer::{Framebuffer, PassOps};
use crate::gpu::layouts;
use crate::gpu::program::{Program, ProgramCache, ProgramDesc, ProgramKey};
use crate::gpu::texture::{Texture, TextureDesc};
use crate::hot_reload::AssetWatcher;
use crate::modules::{
    DirectionalShadowModule, PointShadowModule, PreparedDraw, RenderModule, SharedLayouts, SkyboxModule,
    SsaoModule, draw_prepared,
};
use crate::resources::{MaterialLibrary, MeshData, MeshManager, MeshVertex};
use crate::shader_library::ShaderLibrary;
use crate::uniforms::{DirectionalLightsUniform, FrameParams, FrameUniforms, ObjectUniforms, PointLightsUniform};

/// Everything a program build reads, borrowed apart from the cache.
struct ProgramSources<'a> {
    ctx: &'a RenderContext,
    library: &'a ShaderLibrary,
    frame: &'a FrameUniforms,
    objects: &'a ObjectUniforms,
    gbuffer_layout: &'a wgpu::BindGroupLayout,
    shadow_layout: &'a wgpu::BindGroupLayout,
    environment: &'a Environment,
    directional_shadow: &'a DirectionalShadowModule,
    point_shadow: &'a PointShadowModule,
    ssao: &'a SsaoModule,
    skybox: &'a SkyboxModule,
}

impl ProgramSources<'_> {
    fn build(&self, key: ProgramKey) -> RenderResult<Program> {
        let shared = SharedLayouts {
            frame: self.frame.layout(),
            object: self.objects.layout(),
        };
        match key {
            ProgramKey::Geometry => ProgramDesc::new("Geometry", self.library, &["frame", "object", "geometry"])?
                .with_bind_group_layouts(&[shared.frame, shared.object])
                .with_vertex_layouts(vec![MeshVertex::layout()])
                .with_targets(&GBuffer::COLOR_FORMATS)
                .with_depth(self.ctx.depth_format(), true, wgpu::CompareFunction::Less)
                .build(self.ctx),
            // the output target carries depth for the forward pass, lighting
            // neither tests nor writes it
            ProgramKey::Lighting => ProgramDesc::new("Lighting", self.library, &["frame", "fullscreen", "lighting"])?
                .with_bind_group_layouts(&[
                    shared.frame,
                    self.gbuffer_layout,
                    self.shadow_layout,
                    self.environment.ibl_layout(),
                ])
                .with_target(self.ctx.output_format())
                .with_depth(self.ctx.depth_format(), false, wgpu::CompareFunction::Always)
                .with_cull_mode(None)
                .build(self.ctx),
            ProgramKey::SsaoBlur => self.ssao.build_blur_program(self.ctx, self.library),
            ProgramKey::Module(kind) => {
                let module: &dyn RenderModule = match kind {
                    ModuleKind::DirectionalShadow => self.directional_shadow,
                    ModuleKind::PointShadow => self.point_shadow,
                    ModuleKind::Ssao => self.ssao,
                    ModuleKind::Skybox => self.skybox,
                };
                module.build_program(self.ctx, self.library, &shared)
            }
            ProgramKey::EquirectToCube
            | ProgramKey::CubeCopy
            | ProgramKey::Irradiance
            | ProgramKey::Prefilter
            | ProgramKey::BrdfLut => Err(crate::error::RenderError::ProgramMissing(format!(
                "{} is built by the environment bake",
                key.name()
            ))),
        }
    }
}

/// Deferred renderer over a [`Scene`].
pub struct DeferredRenderer {
    ctx: RenderContext,
    config: RendererConfig,
    camera: Camera,
    library: ShaderLibrary,
    programs: ProgramCache,
    frame: FrameUniforms,
    objects: ObjectUniforms,
    meshes: MeshManager,
    materials: MaterialLibrary,
    gbuffer: GBuffer,
    output: Framebuffer,
    directional_shadow: DirectionalShadowModule,
    point_shadow: PointShadowModule,
    ssao: SsaoModule,
    skybox: SkyboxModule,
    environment: Environment,
    gbuffer_layout: wgpu::BindGroupLayout,
    gbuffer_group: TrackedBindGroup,
    shadow_layout: wgpu::BindGroupLayout,
    shadow_group: wgpu::BindGroup,
    watcher: Option<AssetWatcher>,
    frame_index: u64,
}

impl DeferredRenderer {
    /// Allocates every render target and bakes a solid environment from the
    /// clear color.
    ///
    /// Fails if any framebuffer is incomplete or the environment programs do
    /// not compile.
    pub fn new(mut ctx: RenderContext, config: RendererConfig) -> RenderResult<Self> {
        let config = config.sanitized();
        let (width, height) = (config.width, config.height);
        ctx.resize(width, height);

        let library = match &config.hot_reload.shader_dir {
            Some(dir) => ShaderLibrary::with_dir(dir),
            None => ShaderLibrary::builtin(),
        };
        let mut programs = ProgramCache::new();
        let mut camera = Camera::from_config(&config.camera, 1.0);
        camera.resize(width, height);

        let device = ctx.device();
        let frame = FrameUniforms::new(device);
        let objects = ObjectUniforms::new(device, ctx.uniform_alignment());
        let mut meshes = MeshManager::new();
        let cube = meshes.primitive(device, PrimitiveShape::Cube);

        let gbuffer = GBuffer::new(&ctx, width, height)?;
        let output = Framebuffer::builder("Output", width, height)
            .color(Arc::new(Texture::new(
                device,
                TextureDesc::new("Output Color", ctx.output_format(), width, height)
                    .add_usage(wgpu::TextureUsages::COPY_SRC),
            )))
            .depth(Arc::new(Texture::new(
                device,
                TextureDesc::new("Output Depth", ctx.depth_format(), width, height)
                    .add_usage(wgpu::TextureUsages::COPY_DST),
            )))
            .build(device)?;

        let directional_shadow = DirectionalShadowModule::new(&ctx, &config.shadow)?;
        let point_shadow = PointShadowModule::new(&ctx, &config.shadow)?;
        let ssao = SsaoModule::new(&ctx, &config.ssao, width, height)?;
        let mut skybox = SkyboxModule::new(&ctx, cube);

        let mut environment = Environment::new(&ctx, &config.environment);
        let [r, g, b, _] = config.clear_color;
        environment.bake(&ctx, &library, &mut programs, EnvironmentSource::Solid([r, g, b]))?;
        skybox.set_environment(device, environment.cube());

        let gbuffer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("G-Buffer Bind Group Layout"),
            entries: &[
                layouts::unfiltered_texture_entry(0, wgpu::TextureViewDimension::D2),
                layouts::unfiltered_texture_entry(1, wgpu::TextureViewDimension::D2),
                layouts::unfiltered_texture_entry(2, wgpu::TextureViewDimension::D2),
                layouts::unfiltered_texture_entry(3, wgpu::TextureViewDimension::D2),
                layouts::unfiltered_texture_entry(4, wgpu::TextureViewDimension::D2),
            ],
        });
        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Bind Group Layout"),
            entries: &[
                layouts::depth_texture_entry(0, wgpu::TextureViewDimension::D2Array),
                layouts::depth_texture_entry(1, wgpu::TextureViewDimension::CubeArray),
                layouts::sampler_entry(2, wgpu::SamplerBindingType::Comparison),
            ],
        });
        let shadow_sampler = layouts::create_shadow_sampler(device);
        let shadow_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Bind Group"),
            layout: &shadow_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&directional_shadow.texture().view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&point_shadow.texture().view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_sampler),
                },
            ],
        });

        let watcher = match (&config.hot_reload, library.dir()) {
            (hot_reload, Some(_)) if hot_reload.enabled => {
                let mut watcher = AssetWatcher::new(hot_reload.interval());
                for name in ShaderLibrary::names() {
                    if let Some(path) = library.path(name) {
                        watcher.watch(path, name);
                    }
                }
                Some(watcher)
            }
            (hot_reload, None) if hot_reload.enabled => {
                tracing::warn!("Hot reload enabled without a shader directory, ignoring");
                None
            }
            _ => None,
        };

        tracing::info!("Deferred renderer ready at {}x{}", width, height);

        Ok(Self {
            ctx,
            config,
            camera,
            library,
            programs,
            frame,
            objects,
            meshes,
            materials: MaterialLibrary::new(),
            gbuffer,
            output,
            directional_shadow,
            point_shadow,
            ssao,
            skybox,
            environment,
            gbuffer_layout,
            gbuffer_group: TrackedBindGroup::new("G-Buffer Bind Group"),
            shadow_layout,
            shadow_group,
            watcher,
            frame_index: 0,
        })
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn meshes(&self) -> &MeshManager {
        &self.meshes
    }

    pub fn materials(&self) -> &MaterialLibrary {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialLibrary {
        &mut self.materials
    }

    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    pub fn ssao(&self) -> &SsaoModule {
        &self.ssao
    }

    pub fn directional_shadow(&self) -> &DirectionalShadowModule {
        &self.directional_shadow
    }

    pub fn point_shadow(&self) -> &PointShadowModule {
        &self.point_shadow
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Lit color target.
    pub fn output(&self) -> Option<&Arc<Texture>> {
        self.output.color(0)
    }

    pub fn size(&self) -> (u32, u32) {
        self.gbuffer.size()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Uploads a decoded mesh.
    pub fn upload_mesh(&mut self, label: &str, data: &MeshData) -> MeshHandle {
        self.meshes.create(self.ctx.device(), label, data)
    }

    /// Mesh for a built-in shape, uploaded on first request.
    pub fn primitive_mesh(&mut self, shape: PrimitiveShape) -> MeshHandle {
        self.meshes.primitive(self.ctx.device(), shape)
    }

    pub fn set_ssao_enabled(&mut self, enabled: bool) {
        self.ssao.set_enabled(enabled);
    }

    pub fn set_shadows_enabled(&mut self, enabled: bool) {
        self.directional_shadow.set_enabled(enabled);
        self.point_shadow.set_enabled(enabled);
    }

    pub fn set_skybox_enabled(&mut self, enabled: bool) {
        self.skybox.set_enabled(enabled);
    }

    /// Re-bakes image-based lighting and the skybox from `source`.
    pub fn set_environment(&mut self, source: EnvironmentSource) -> RenderResult<()> {
        self.environment
            .bake(&self.ctx, &self.library, &mut self.programs, source)?;
        self.skybox.set_environment(self.ctx.device(), self.environment.cube());
        Ok(())
    }

    fn split(&mut self) -> (&mut ProgramCache, ProgramSources<'_>) {
        (
            &mut self.programs,
            ProgramSources {
                ctx: &self.ctx,
                library: &self.library,
                frame: &self.frame,
                objects: &self.objects,
                gbuffer_layout: &self.gbuffer_layout,
                shadow_layout: &self.shadow_layout,
                environment: &self.environment,
                directional_shadow: &self.directional_shadow,
                point_shadow: &self.point_shadow,
                ssao: &self.ssao,
                skybox: &self.skybox,
            },
        )
    }

    /// Returns the program for `key`, building it on first use.
    fn program(&mut self, key: ProgramKey) -> RenderResult<Arc<Program>> {
        let (programs, sources) = self.split();
        programs.get_or_build(key, || sources.build(key))
    }

    /// Rebuilds every built program that composes one of `shaders`.
    ///
    /// A program that fails to rebuild keeps its previous pipeline. Returns
    /// the number of programs replaced.
    pub fn reload_shaders<S: AsRef<str>>(&mut self, shaders: &[S]) -> usize {
        let (programs, sources) = self.split();
        let mut keys: Vec<ProgramKey> = shaders
            .iter()
            .flat_map(|shader| programs.keys_using(shader.as_ref()))
            .filter(|key| key.is_per_frame())
            .collect();
        keys.sort_by_key(|k| k.name());
        keys.dedup();

        keys.into_iter()
            .filter(|key| programs.replace(*key, sources.build(*key)))
            .count()
    }

    /// Polls watched shader files and reloads what changed.
    ///
    /// Call between frames. Returns the number of programs replaced.
    pub fn poll_hot_reload(&mut self, now: Instant) -> usize {
        let Some(watcher) = &mut self.watcher else {
            return 0;
        };
        let changed = watcher.poll(now);
        if changed.is_empty() {
            return 0;
        }
        tracing::info!("Shader sources changed: {}", changed.join(", "));
        self.reload_shaders(&changed)
    }

    /// Resizes every screen-sized target. Bind groups over them are rebuilt
    /// on next use.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let (width, height) = (width.max(1), height.max(1));
        if self.gbuffer.size() == (width, height) {
            return false;
        }
        self.ctx.resize(width, height);
        self.camera.resize(width, height);

        let device = self.ctx.device();
        self.gbuffer.resize(device, width, height);
        self.output.resize(device, width, height);
        self.ssao.on_resize(&self.ctx, width, height);
        self.directional_shadow.on_resize(&self.ctx, width, height);
        self.point_shadow.on_resize(&self.ctx, width, height);
        self.skybox.on_resize(&self.ctx, width, height);

        self.config.width = width;
        self.config.height = height;
        tracing::info!("Renderer resized to {}x{}", width, height);
        true
    }

    /// Stages object uniforms for every recorded call with an uploaded mesh.
    fn stage_draws(&mut self, list: &DrawList) -> Vec<PreparedDraw> {
        let mut prepared = Vec::with_capacity(list.len());
        for call in list.iter() {
            if !self.meshes.contains(call.mesh) {
                tracing::warn!("Skipping draw of unknown mesh {:?}", call.mesh);
                continue;
            }
            let offset = self.objects.push(call.world, self.materials.get(call.material));
            prepared.push(PreparedDraw {
                mesh: call.mesh,
                offset,
            });
        }
        prepared
    }

    fn record(scene: &Scene, aux: DrawAux) -> DrawList {
        let mut list = DrawList::new();
        scene.draw(aux, &mut list);
        list
    }

    /// Renders one frame of `scene` into the output target.
    ///
    /// Light matrices are refreshed while lights are gathered, hence the
    /// mutable borrow.
    pub fn render(&mut self, scene: &mut Scene) -> RenderResult<FrameStats> {
        let lights = scene.gather_lights();
        let scene: &Scene = scene;

        let geometry_calls = Self::record(scene, DrawAux::None);
        let directional_calls = Self::record(scene, DrawAux::Module(ModuleKind::DirectionalShadow));
        let point_calls = Self::record(scene, DrawAux::Module(ModuleKind::PointShadow));

        self.objects.clear();
        let geometry_draws = self.stage_draws(&geometry_calls);
        let directional_draws = self.stage_draws(&directional_calls);
        let point_draws = self.stage_draws(&point_calls);

        // Only lights that fit the frame uniforms are shadowed or lit.
        let lit_directional = lit_lights(&lights.directional, lights::MAX_DIRECTIONAL, "directional");
        let lit_point = lit_lights(&lights.point, lights::MAX_POINT, "point");
        self.directional_shadow.prepare(&self.ctx, scene, lit_directional);
        self.point_shadow.prepare(&self.ctx, scene, lit_point);

        let mut directional = DirectionalLightsUniform::zeroed();
        for id in lit_directional {
            if let Some(light) = scene.directional_light(*id) {
                directional.push(light, self.directional_shadow.layer_of(*id));
            }
        }
        let mut point = PointLightsUniform::zeroed();
        for id in lit_point {
            if let Some(light) = scene.point_light(*id) {
                point.push(light, self.point_shadow.layer_of(*id));
            }
        }

        let (width, height) = self.gbuffer.size();
        let params = FrameParams {
            ssao_enabled: self.ssao.is_enabled(),
            width,
            height,
            environment_intensity: self.environment.intensity(),
            max_prefilter_mip: self.environment.max_prefilter_mip(),
            directional_bias: self.config.shadow.directional_bias,
            point_bias: self.config.shadow.point_bias,
        };
        let queue = self.ctx.queue();
        self.frame.write_camera(queue, &self.camera, &params);
        self.frame.write_lights(queue, &directional, &point);
        self.objects.upload(self.ctx.device(), queue);

        let geometry_program = self.program(ProgramKey::Geometry)?;
        let lighting_program = self.program(ProgramKey::Lighting)?;
        let directional_program = self.program(ProgramKey::Module(ModuleKind::DirectionalShadow))?;
        let point_program = self.program(ProgramKey::Module(ModuleKind::PointShadow))?;
        let ssao_programs = if self.ssao.is_enabled() {
            Some((
                self.program(ProgramKey::Module(ModuleKind::Ssao))?,
                self.program(ProgramKey::SsaoBlur)?,
            ))
        } else {
            None
        };
        let skybox_program = if self.skybox.is_enabled() {
            Some(self.program(ProgramKey::Module(ModuleKind::Skybox))?)
        } else {
            None
        };

        self.refresh_bind_groups();

        let mut stats = FrameStats {
            directional_lights: directional.len() as u32,
            point_lights: point.len() as u32,
            shadowed_directional: self.directional_shadow.layers().len() as u32,
            shadowed_point: self.point_shadow.layers().len() as u32,
            ..Default::default()
        };

        let mut encoder = self.ctx.create_encoder("Frame Encoder");
        {
            let mut pass = self.gbuffer.framebuffer().begin(
                &mut encoder,
                "Geometry Pass",
                PassOps::clear(wgpu::Color::TRANSPARENT),
            );
            pass.set_pipeline(geometry_program.pipeline());
            pass.set_bind_group(0, self.frame.bind_group(), &[]);
            stats.geometry_draws = draw_prepared(&mut pass, &self.meshes, self.objects.bind_group(), &geometry_draws);
        }

        stats.directional_shadow_draws = self.directional_shadow.render(
            &mut encoder,
            &directional_program,
            &self.meshes,
            self.objects.bind_group(),
            &directional_draws,
        );
        stats.point_shadow_draws = self.point_shadow.render(
            &mut encoder,
            &point_program,
            &self.meshes,
            self.objects.bind_group(),
            &point_draws,
        );

        if let Some((ssao_program, blur_program)) = &ssao_programs {
            stats.ssao_enabled = self
                .ssao
                .render(&mut encoder, ssao_program, blur_program, self.frame.bind_group());
        }

        if let Some(gbuffer_group) = self.gbuffer_group.get() {
            let [r, g, b, a] = self.config.clear_color.map(f64::from);
            let mut pass = self
                .output
                .begin(&mut encoder, "Lighting Pass", PassOps::clear(wgpu::Color { r, g, b, a }));
            pass.set_pipeline(lighting_program.pipeline());
            pass.set_bind_group(0, self.frame.bind_group(), &[]);
            pass.set_bind_group(1, gbuffer_group, &[]);
            pass.set_bind_group(2, &self.shadow_group, &[]);
            pass.set_bind_group(3, self.environment.ibl_bind_group(), &[]);
            pass.draw(0..3, 0..1);
        }

        self.copy_depth(&mut encoder);
        if let Some(skybox_program) = &skybox_program {
            let mut pass = self.output.begin(&mut encoder, "Forward Pass", PassOps::load());
            stats.skybox_drawn = self
                .skybox
                .render(&mut pass, skybox_program, self.frame.bind_group(), &self.meshes);
        }

        self.ctx.submit(encoder);
        self.frame_index += 1;
        tracing::debug!("Frame {}: {}", self.frame_index, stats);
        Ok(stats)
    }

    /// Rebuilds bind groups over screen-sized textures after a resize.
    fn refresh_bind_groups(&mut self) {
        let device = self.ctx.device();
        self.ssao
            .prepare(device, self.gbuffer.position(), self.gbuffer.normal());

        let gbuffer = &self.gbuffer;
        let inputs: [&Texture; 5] = [
            gbuffer.position(),
            gbuffer.normal(),
            gbuffer.albedo_spec(),
            gbuffer.material(),
            self.ssao.output(),
        ];
        let layout = &self.gbuffer_layout;
        self.gbuffer_group.refresh(&inputs, |label| {
            let views: Vec<_> = inputs.iter().map(|t| t.view()).collect();
            let entries: Vec<wgpu::BindGroupEntry> = views
                .iter()
                .enumerate()
                .map(|(binding, view)| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: wgpu::BindingResource::TextureView(view),
                })
                .collect();
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &entries,
            })
        });
    }

    /// Copies G-buffer depth into the output target so forward draws are
    /// occluded by the scene.
    fn copy_depth(&self, encoder: &mut wgpu::CommandEncoder) {
        let (Some(source), Some(target)) = (self.gbuffer.depth(), self.output.depth()) else {
            return;
        };
        let (width, height) = source.size();
        let (source, target) = (source.raw(), target.raw());
        encoder.copy_texture_to_texture(
            wgpu::ImageCopyTexture {
                texture: &source,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyTexture {
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// The leading lights that fit in a frame uniform array of `capacity`.
fn lit_lights<'a>(ids: &'a [NodeId], capacity: usize, kind: &str) -> &'a [NodeId] {
    if ids.len() > capacity {
        tracing::warn!(
            "{} {} lights in scene, only the first {} are lit",
            ids.len(),
            kind,
            capacity
        );
    }
    &ids[..ids.len().min(capacity)]
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use lumen_core::{
        DirectionalLight, MeshComponent, PointLight, PrimitiveComponent, SceneNode, Transform,
    };

    use super::*;
    use crate::config::{EnvironmentConfig, ShadowConfig, SsaoConfig};
    use crate::context::test_context;
    use crate::resources::Material;

    fn small_config() -> RendererConfig {
        RendererConfig {
            width: 64,
            height: 64,
            shadow: ShadowConfig {
                num_layers: 2,
                directional_size: 64,
                point_size: 64,
                ..Default::default()
            },
            ssao: SsaoConfig {
                kernel_size: 8,
                ..Default::default()
            },
            environment: EnvironmentConfig {
                cube_size: 16,
                irradiance_size: 8,
                prefilter_size: 16,
                prefilter_mips: 3,
                brdf_lut_size: 16,
                intensity: 1.0,
            },
            ..Default::default()
        }
    }

    fn demo_scene(renderer: &mut DeferredRenderer) -> Scene {
        let cube = renderer.primitive_mesh(PrimitiveShape::Cube);
        let plane = renderer.primitive_mesh(PrimitiveShape::Plane);
        let red = renderer
            .materials_mut()
            .insert(Material::new(Vec3::new(0.8, 0.1, 0.1)));

        let mut scene = Scene::new();
        let root = scene.root();
        scene
            .insert(
                root,
                SceneNode::new("floor")
                    .with_transform(Transform::new().with_scale(Vec3::splat(10.0)))
                    .with_component(MeshComponent::new(plane).with_casts_shadow(false)),
            )
            .unwrap();
        scene
            .insert(
                root,
                SceneNode::new("box")
                    .with_transform(Transform::from_position(Vec3::new(0.0, 0.5, 0.0)))
                    .with_component(PrimitiveComponent::new(
                        PrimitiveShape::Cube,
                        MeshComponent::new(cube).with_material(red),
                    )),
            )
            .unwrap();
        scene
            .insert(
                root,
                SceneNode::new("sun").with_component(DirectionalLight::new(Vec3::new(-0.3, -1.0, -0.2))),
            )
            .unwrap();
        for i in 0..3 {
            scene
                .insert(
                    root,
                    SceneNode::new(format!("bulb{i}"))
                        .with_transform(Transform::from_position(Vec3::new(i as f32 - 1.0, 2.0, 1.0)))
                        .with_component(PointLight::new()),
                )
                .unwrap();
        }
        scene
    }

    #[test]
    fn test_frame_counts_passes() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut renderer = DeferredRenderer::new(ctx, small_config()).unwrap();
        let mut scene = demo_scene(&mut renderer);

        let stats = renderer.render(&mut scene).unwrap();
        assert_eq!(stats.geometry_draws, 2);
        assert_eq!(stats.directional_lights, 1);
        assert_eq!(stats.point_lights, 3);
        assert_eq!(stats.shadowed_directional, 1);
        // two cube slots for three lights
        assert_eq!(stats.shadowed_point, 2);
        // the floor casts no shadow
        assert_eq!(stats.directional_shadow_draws, 1);
        assert_eq!(stats.point_shadow_draws, 2 * 6);
        assert!(stats.ssao_enabled);
        assert!(stats.skybox_drawn);
        assert_eq!(renderer.frame_index(), 1);

        // programs are built once and reused
        let builds = renderer.programs().build_count();
        renderer.render(&mut scene).unwrap();
        assert_eq!(renderer.programs().build_count(), builds);
    }

    #[test]
    fn test_toggles_skip_passes() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut renderer = DeferredRenderer::new(ctx, small_config()).unwrap();
        let mut scene = demo_scene(&mut renderer);
        renderer.set_ssao_enabled(false);
        renderer.set_shadows_enabled(false);

        let stats = renderer.render(&mut scene).unwrap();
        assert!(!stats.ssao_enabled);
        assert_eq!(stats.shadowed_point, 0);
        assert_eq!(stats.point_shadow_draws, 0);
        assert_eq!(stats.geometry_draws, 2);
        assert!(!renderer.programs().contains(ProgramKey::Module(ModuleKind::Ssao)));
    }

    #[test]
    fn test_resize_keeps_targets_consistent() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut renderer = DeferredRenderer::new(ctx, small_config()).unwrap();
        let mut scene = demo_scene(&mut renderer);
        renderer.render(&mut scene).unwrap();
        let rebinds = renderer.ssao().rebind_count();

        assert!(renderer.resize(96, 48));
        assert!(!renderer.resize(96, 48));
        renderer.render(&mut scene).unwrap();

        assert_eq!(renderer.size(), (96, 48));
        assert_eq!(renderer.output().map(|t| t.size()), Some((96, 48)));
        assert_eq!(renderer.ssao().output().size(), (96, 48));
        assert_eq!(renderer.ssao().rebind_count(), rebinds + 1);
        assert_eq!(renderer.camera().aspect(), 2.0);
    }

    #[test]
    fn test_reload_replaces_programs_using_shader() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut renderer = DeferredRenderer::new(ctx, small_config()).unwrap();
        let mut scene = demo_scene(&mut renderer);
        renderer.render(&mut scene).unwrap();

        assert_eq!(renderer.reload_shaders(&["lighting"]), 1);
        // geometry, lighting, ssao and skybox compose the frame uniforms
        assert_eq!(renderer.reload_shaders(&["frame"]), 4);
        assert_eq!(renderer.reload_shaders(&["unused"]), 0);
        assert_eq!(renderer.poll_hot_reload(Instant::now()), 0);
    }

    #[test]
    fn test_missing_mesh_is_skipped() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut renderer = DeferredRenderer::new(ctx, small_config()).unwrap();
        let mut scene = Scene::new();
        let root = scene.root();
        scene
            .insert(
                root,
                SceneNode::new("ghost").with_component(MeshComponent::new(MeshHandle::from_raw(999))),
            )
            .unwrap();
        let stats = renderer.render(&mut scene).unwrap();
        assert_eq!(stats.geometry_draws, 0);
    }

    fn sun_scene(count: usize) -> Scene {
        let mut scene = Scene::new();
        let root = scene.root();
        for i in 0..count {
            let tilt = i as f32 * 0.1;
            scene
                .insert(
                    root,
                    SceneNode::new(format!("sun{i}")).with_component(DirectionalLight::new(Vec3::new(tilt, -1.0, 0.0))),
                )
                .unwrap();
        }
        scene
    }

    #[test]
    fn test_lit_lights_caps_at_capacity() {
        let mut scene = sun_scene(10);
        let ids = scene.gather_lights().directional;
        assert_eq!(ids.len(), 10);
        assert_eq!(lit_lights(&ids, lights::MAX_DIRECTIONAL, "directional"), &ids[..lights::MAX_DIRECTIONAL]);
        assert_eq!(lit_lights(&ids[..3], lights::MAX_DIRECTIONAL, "directional").len(), 3);
    }

    #[test]
    fn test_every_shadowed_sun_is_lit() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut config = small_config();
        config.shadow.num_layers = 8;
        let mut renderer = DeferredRenderer::new(ctx, config).unwrap();

        let mut scene = sun_scene(6);
        let stats = renderer.render(&mut scene).unwrap();
        assert_eq!(stats.directional_lights, 6);
        assert_eq!(stats.shadowed_directional, 6);

        // past the uniform capacity the extra suns get neither light nor shadow
        let mut scene = sun_scene(lights::MAX_DIRECTIONAL + 3);
        let stats = renderer.render(&mut scene).unwrap();
        assert_eq!(stats.directional_lights, lights::MAX_DIRECTIONAL as u32);
        assert!(stats.shadowed_directional <= stats.directional_lights);
    }
}
