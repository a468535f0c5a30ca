//! Screen-space ambient occlusion.
//!
//! Two fullscreen passes: the occlusion pass samples a hemisphere kernel
//! around every G-buffer position, then a 4x4 box blur removes the tiling of
//! the rotation noise.

use std::sync::Arc;

use glam::{Vec3, Vec4};
use lumen_core::ModuleKind;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{RenderModule, SharedLayouts};
use crate::config::SsaoConfig;
use crate::constants::{formats, ssao};
use crate::context::RenderContext;
use crate::error::RenderResult;
use crate::gpu::bind_group::TrackedBindGroup;
use crate::gpu::buffer::UniformBuffer;
use crate::gpu::framebuffer::{Framebuffer, PassOps};
use crate::gpu::layouts;
use crate::gpu::program::{Program, ProgramDesc};
use crate::gpu::texture::{Texture, TextureDesc};
use crate::shader_library::ShaderLibrary;
use crate::uniforms::SsaoUniform;

const LABEL: &str = "SSAO";
const SHADERS: &[&str] = &["frame", "fullscreen", "ssao"];
const BLUR_SHADERS: &[&str] = &["fullscreen", "ssao_blur"];

/// Hemisphere samples oriented along +Z, denser near the origin.
pub fn generate_kernel(size: u32, seed: u64) -> Vec<Vec4> {
    let mut rng = StdRng::seed_from_u64(seed);
    let size = size.clamp(1, ssao::MAX_KERNEL_SIZE);
    (0..size)
        .map(|i| {
            let direction = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(0.0..1.0),
            )
            .try_normalize()
            .unwrap_or(Vec3::Z);
            let length: f32 = rng.gen_range(0.0..1.0);
            let t = i as f32 / size as f32;
            let scale = 0.1 + 0.9 * t * t;
            (direction * length * scale).extend(0.0)
        })
        .collect()
}

/// Random rotation vectors in the tangent plane, one per noise texel.
pub fn generate_noise(size: u32, seed: u64) -> Vec<[f32; 4]> {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    (0..size * size)
        .map(|_| [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0, 0.0])
        .collect()
}

fn pack_uniform(config: &SsaoConfig, kernel: &[Vec4]) -> SsaoUniform {
    let mut uniform = SsaoUniform {
        samples: [[0.0; 4]; 64],
        params: [
            kernel.len() as f32,
            config.radius,
            config.bias,
            config.noise_size as f32,
        ],
    };
    for (slot, sample) in uniform.samples.iter_mut().zip(kernel) {
        *slot = sample.to_array();
    }
    uniform
}

fn fullscreen_target(label: &str, width: u32, height: u32) -> TextureDesc {
    TextureDesc::new(label, formats::SSAO, width, height)
}

/// Occlusion and blur passes with their render targets.
pub struct SsaoModule {
    enabled: bool,
    config: SsaoConfig,
    kernel: Vec<Vec4>,
    params: UniformBuffer<SsaoUniform>,
    noise: Texture,
    occlusion: Arc<Texture>,
    blurred: Arc<Texture>,
    occlusion_target: Framebuffer,
    blur_target: Framebuffer,
    layout: wgpu::BindGroupLayout,
    blur_layout: wgpu::BindGroupLayout,
    input_group: TrackedBindGroup,
    blur_group: TrackedBindGroup,
}

impl SsaoModule {
    pub fn new(ctx: &RenderContext, config: &SsaoConfig, width: u32, height: u32) -> RenderResult<Self> {
        let device = ctx.device();
        let kernel = generate_kernel(config.kernel_size, config.seed);
        let params = UniformBuffer::new(device, "SSAO Params", &pack_uniform(config, &kernel));

        let noise_size = config.noise_size.max(1);
        let noise = Texture::new(
            device,
            TextureDesc::new("SSAO Noise", formats::SOURCE_HDR, noise_size, noise_size)
                .with_usage(wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST),
        );
        let noise_pixels = generate_noise(noise_size, config.seed);
        noise.write_layer(ctx.queue(), 0, bytemuck::cast_slice(&noise_pixels))?;

        let occlusion = Arc::new(Texture::new(device, fullscreen_target("SSAO Occlusion", width, height)));
        let blurred = Arc::new(Texture::new(device, fullscreen_target("SSAO Blurred", width, height)));
        let occlusion_target = Framebuffer::builder("SSAO", width, height)
            .color(occlusion.clone())
            .build(device)?;
        let blur_target = Framebuffer::builder("SSAO Blur", width, height)
            .color(blurred.clone())
            .build(device)?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SSAO Bind Group Layout"),
            entries: &[
                layouts::uniform_entry(
                    0,
                    wgpu::ShaderStages::FRAGMENT,
                    false,
                    UniformBuffer::<SsaoUniform>::min_binding_size(),
                ),
                layouts::unfiltered_texture_entry(1, wgpu::TextureViewDimension::D2),
                layouts::unfiltered_texture_entry(2, wgpu::TextureViewDimension::D2),
                layouts::unfiltered_texture_entry(3, wgpu::TextureViewDimension::D2),
            ],
        });
        let blur_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SSAO Blur Bind Group Layout"),
            entries: &[layouts::unfiltered_texture_entry(0, wgpu::TextureViewDimension::D2)],
        });

        Ok(Self {
            enabled: config.enabled,
            config: config.clone(),
            kernel,
            params,
            noise,
            occlusion,
            blurred,
            occlusion_target,
            blur_target,
            layout,
            blur_layout,
            input_group: TrackedBindGroup::new("SSAO Bind Group"),
            blur_group: TrackedBindGroup::new("SSAO Blur Bind Group"),
        })
    }

    pub fn kernel(&self) -> &[Vec4] {
        &self.kernel
    }

    /// Blurred occlusion factor read by the lighting pass.
    pub fn output(&self) -> &Arc<Texture> {
        &self.blurred
    }

    pub fn size(&self) -> (u32, u32) {
        self.blur_target.size()
    }

    /// Times the input bind group was rebuilt, the first build included.
    pub fn rebind_count(&self) -> u64 {
        self.input_group.rebuild_count()
    }

    /// Updates radius and bias without regenerating the kernel.
    pub fn set_params(&mut self, queue: &wgpu::Queue, radius: f32, bias: f32) {
        self.config.radius = radius;
        self.config.bias = bias;
        self.params.write(queue, &pack_uniform(&self.config, &self.kernel));
    }

    /// Rebuilds bind groups whose G-buffer inputs were recreated.
    pub fn prepare(&mut self, device: &wgpu::Device, position: &Texture, normal: &Texture) {
        let (layout, params, noise) = (&self.layout, &self.params, &self.noise);
        self.input_group.refresh(&[position, normal, noise], |label| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params.binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&position.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&normal.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&noise.view()),
                    },
                ],
            })
        });

        let (blur_layout, occlusion) = (&self.blur_layout, &self.occlusion);
        self.blur_group.refresh(&[occlusion.as_ref()], |label| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: blur_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&occlusion.view()),
                }],
            })
        });
    }

    /// Records the occlusion and blur passes. Returns false when skipped.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        program: &Program,
        blur_program: &Program,
        frame: &wgpu::BindGroup,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let (Some(input), Some(blur)) = (self.input_group.get(), self.blur_group.get()) else {
            tracing::warn!("SSAO rendered before prepare, skipping");
            return false;
        };

        {
            let mut pass = self
                .occlusion_target
                .begin(encoder, "SSAO Pass", PassOps::clear(wgpu::Color::WHITE));
            pass.set_pipeline(program.pipeline());
            pass.set_bind_group(0, frame, &[]);
            pass.set_bind_group(1, input, &[]);
            pass.draw(0..3, 0..1);
        }

        let mut pass = self
            .blur_target
            .begin(encoder, "SSAO Blur Pass", PassOps::clear(wgpu::Color::WHITE));
        pass.set_pipeline(blur_program.pipeline());
        pass.set_bind_group(0, blur, &[]);
        pass.draw(0..3, 0..1);
        true
    }

    /// Compiles the blur program, which binds only the raw occlusion texture.
    pub fn build_blur_program(&self, ctx: &RenderContext, library: &ShaderLibrary) -> RenderResult<Program> {
        ProgramDesc::new("SSAO Blur", library, BLUR_SHADERS)?
            .with_bind_group_layouts(&[&self.blur_layout])
            .with_target(formats::SSAO)
            .with_cull_mode(None)
            .build(ctx)
    }

    pub fn blur_shaders(&self) -> &'static [&'static str] {
        BLUR_SHADERS
    }
}

impl RenderModule for SsaoModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Ssao
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
            .with_bind_group_layouts(&[layouts.frame, &self.layout])
            .with_target(formats::SSAO)
            .with_cull_mode(None)
            .build(ctx)
    }

    fn on_resize(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        self.occlusion_target.resize(ctx.device(), width, height);
        self.blur_target.resize(ctx.device(), width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_context;

    #[test]
    fn test_kernel_lies_in_hemisphere() {
        let kernel = generate_kernel(64, 7);
        assert_eq!(kernel.len(), 64);
        for sample in &kernel {
            assert!(sample.z >= 0.0);
            assert!(sample.truncate().length() <= 1.0 + 1e-5);
            assert_eq!(sample.w, 0.0);
        }
        // early samples are pulled toward the origin
        assert!(kernel[0].truncate().length() <= 0.1 + 1e-5);
    }

    #[test]
    fn test_kernel_is_seeded() {
        assert_eq!(generate_kernel(16, 3), generate_kernel(16, 3));
        assert_ne!(generate_kernel(16, 3), generate_kernel(16, 4));
        assert_eq!(generate_kernel(500, 1).len(), ssao::MAX_KERNEL_SIZE as usize);
    }

    #[test]
    fn test_noise_rotates_around_z() {
        let noise = generate_noise(4, 11);
        assert_eq!(noise.len(), 16);
        for texel in &noise {
            assert!(texel[0].abs() <= 1.0 && texel[1].abs() <= 1.0);
            assert_eq!(texel[2], 0.0);
            assert_eq!(texel[3], 0.0);
        }
    }

    #[test]
    fn test_pack_uniform_params() {
        let config = SsaoConfig::default();
        let kernel = generate_kernel(config.kernel_size, config.seed);
        let uniform = pack_uniform(&config, &kernel);
        assert_eq!(uniform.params, [32.0, 0.5, 0.025, 4.0]);
        assert_eq!(uniform.samples[31], kernel[31].to_array());
        assert_eq!(uniform.samples[32], [0.0; 4]);
    }

    #[test]
    fn test_resize_rebinds_inputs() {
        let Some(ctx) = test_context() else {
            return;
        };
        let device = ctx.device();
        let position = Texture::new(
            device,
            TextureDesc::new("position", formats::GBUFFER_POSITION, 1920, 1080),
        );
        let normal = Texture::new(device, TextureDesc::new("normal", formats::GBUFFER_NORMAL, 1920, 1080));

        let mut module = SsaoModule::new(&ctx, &SsaoConfig::default(), 1920, 1080).unwrap();
        module.prepare(device, &position, &normal);
        module.prepare(device, &position, &normal);
        assert_eq!(module.rebind_count(), 1);

        position.resize(device, 800, 600);
        normal.resize(device, 800, 600);
        module.on_resize(&ctx, 800, 600);
        module.prepare(device, &position, &normal);

        assert_eq!(module.rebind_count(), 2);
        assert_eq!(module.size(), (800, 600));
        assert_eq!(module.output().size(), (800, 600));
    }
}
