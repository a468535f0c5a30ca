//! Image-based lighting precompute.
//!
//! An environment is baked once from an equirectangular image or six cube
//! faces into four textures: the environment cube drawn by the skybox, a
//! diffuse irradiance cube, a specular cube prefiltered per roughness mip,
//! and the split-sum BRDF lookup table. The lighting pass binds the last
//! three read-only every frame.

use std::sync::Arc;

use crate::config::EnvironmentConfig;
use crate::constants::{CUBE_FACES, formats};
use crate::context::RenderContext;
use crate::error::{RenderError, RenderResult};
use crate::gpu::buffer::DynamicUniformBuffer;
use crate::gpu::framebuffer::{Framebuffer, PassOps};
use crate::gpu::layouts;
use crate::gpu::program::{Program, ProgramCache, ProgramDesc, ProgramKey};
use crate::gpu::texture::{Texture, TextureDesc, TextureKind};
use crate::shader_library::ShaderLibrary;
use crate::uniforms::FacePassUniform;

/// GGX samples per prefiltered texel.
const PREFILTER_SAMPLES: u32 = 1024;

/// Decoded HDR pixels to bake from. Pixels are tightly packed RGBA `f32`.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvironmentSource {
    /// Latitude/longitude panorama
    Equirect { width: u32, height: u32, pixels: Vec<f32> },
    /// Six square faces in +X, -X, +Y, -Y, +Z, -Z order
    Cube { size: u32, faces: Vec<f32> },
    /// Uniform radiance in every direction
    Solid([f32; 3]),
}

impl EnvironmentSource {
    /// Expected number of `f32`s in the pixel buffer.
    pub fn expected_len(&self) -> usize {
        match self {
            EnvironmentSource::Equirect { width, height, .. } => *width as usize * *height as usize * 4,
            EnvironmentSource::Cube { size, .. } => {
                *size as usize * *size as usize * 4 * CUBE_FACES as usize
            }
            EnvironmentSource::Solid(_) => CUBE_FACES as usize * 4,
        }
    }

    fn validate(&self) -> RenderResult<()> {
        let (len, empty) = match self {
            EnvironmentSource::Equirect { width, height, pixels } => (pixels.len(), *width == 0 || *height == 0),
            EnvironmentSource::Cube { size, faces } => (faces.len(), *size == 0),
            EnvironmentSource::Solid(_) => return Ok(()),
        };
        if empty {
            return Err(RenderError::InvalidTextureData {
                label: "Environment Source".to_string(),
                reason: "zero-sized image".to_string(),
            });
        }
        if len != self.expected_len() {
            return Err(RenderError::InvalidTextureData {
                label: "Environment Source".to_string(),
                reason: format!("expected {} floats, got {}", self.expected_len(), len),
            });
        }
        Ok(())
    }

    /// Solid color expanded to six 1x1 faces.
    fn into_faces(self) -> EnvironmentSource {
        match self {
            EnvironmentSource::Solid([r, g, b]) => EnvironmentSource::Cube {
                size: 1,
                faces: [r, g, b, 1.0].repeat(CUBE_FACES as usize),
            },
            other => other,
        }
    }
}

/// Roughness baked into prefilter mip `mip` of `mips`.
pub fn mip_roughness(mip: u32, mips: u32) -> f32 {
    if mips <= 1 {
        0.0
    } else {
        mip as f32 / (mips - 1) as f32
    }
}

/// The baked IBL textures and the bind group that exposes them.
pub struct Environment {
    config: EnvironmentConfig,
    cube: Arc<Texture>,
    irradiance: Arc<Texture>,
    prefilter: Arc<Texture>,
    brdf_lut: Arc<Texture>,
    sampler: wgpu::Sampler,
    face_layout: wgpu::BindGroupLayout,
    equirect_layout: wgpu::BindGroupLayout,
    faces_layout: wgpu::BindGroupLayout,
    cube_layout: wgpu::BindGroupLayout,
    ibl_layout: wgpu::BindGroupLayout,
    ibl_group: wgpu::BindGroup,
    bakes: u32,
}

fn cube_texture(device: &wgpu::Device, label: &str, size: u32, mips: u32) -> Arc<Texture> {
    Arc::new(Texture::new(
        device,
        TextureDesc::new(label, formats::ENVIRONMENT, size, size)
            .with_kind(TextureKind::Cube)
            .with_mips(mips)
            .add_usage(wgpu::TextureUsages::COPY_SRC),
    ))
}

impl Environment {
    /// Allocates the IBL textures. Their contents are undefined until
    /// [`bake`](Self::bake) runs.
    pub fn new(ctx: &RenderContext, config: &EnvironmentConfig) -> Self {
        let device = ctx.device();
        let max_mips = u32::BITS - config.prefilter_size.max(1).leading_zeros();
        let mips = config.prefilter_mips.clamp(1, max_mips);

        let cube = cube_texture(device, "Environment Cube", config.cube_size, 1);
        let irradiance = cube_texture(device, "Irradiance Cube", config.irradiance_size, 1);
        let prefilter = cube_texture(device, "Prefilter Cube", config.prefilter_size, mips);
        let brdf_lut = Arc::new(Texture::new(
            device,
            TextureDesc::new("BRDF LUT", formats::BRDF_LUT, config.brdf_lut_size, config.brdf_lut_size),
        ));
        let sampler = layouts::create_linear_sampler(device, "Environment Sampler");

        let face_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cube Face Bind Group Layout"),
            entries: &[layouts::uniform_entry(
                0,
                wgpu::ShaderStages::FRAGMENT,
                true,
                DynamicUniformBuffer::<FacePassUniform>::min_binding_size(),
            )],
        });
        let equirect_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Equirect Bind Group Layout"),
            entries: &[layouts::unfiltered_texture_entry(0, wgpu::TextureViewDimension::D2)],
        });
        let faces_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cube Faces Bind Group Layout"),
            entries: &[layouts::unfiltered_texture_entry(0, wgpu::TextureViewDimension::D2Array)],
        });
        let cube_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Environment Cube Bind Group Layout"),
            entries: &[
                layouts::filtered_texture_entry(0, wgpu::TextureViewDimension::Cube),
                layouts::sampler_entry(1, wgpu::SamplerBindingType::Filtering),
            ],
        });
        let ibl_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("IBL Bind Group Layout"),
            entries: &[
                layouts::filtered_texture_entry(0, wgpu::TextureViewDimension::Cube),
                layouts::filtered_texture_entry(1, wgpu::TextureViewDimension::Cube),
                layouts::filtered_texture_entry(2, wgpu::TextureViewDimension::D2),
                layouts::sampler_entry(3, wgpu::SamplerBindingType::Filtering),
            ],
        });
        let ibl_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("IBL Bind Group"),
            layout: &ibl_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&irradiance.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&prefilter.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&brdf_lut.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        Self {
            config: EnvironmentConfig {
                prefilter_mips: mips,
                ..config.clone()
            },
            cube,
            irradiance,
            prefilter,
            brdf_lut,
            sampler,
            face_layout,
            equirect_layout,
            faces_layout,
            cube_layout,
            ibl_layout,
            ibl_group,
            bakes: 0,
        }
    }

    /// Environment cube for the skybox.
    pub fn cube(&self) -> &Arc<Texture> {
        &self.cube
    }

    pub fn irradiance(&self) -> &Arc<Texture> {
        &self.irradiance
    }

    pub fn prefilter(&self) -> &Arc<Texture> {
        &self.prefilter
    }

    pub fn brdf_lut(&self) -> &Arc<Texture> {
        &self.brdf_lut
    }

    /// Highest prefilter mip, used to map roughness to a sampling LOD.
    pub fn max_prefilter_mip(&self) -> f32 {
        (self.config.prefilter_mips - 1) as f32
    }

    pub fn intensity(&self) -> f32 {
        self.config.intensity
    }

    pub fn is_baked(&self) -> bool {
        self.bakes > 0
    }

    pub fn ibl_layout(&self) -> &wgpu::BindGroupLayout {
        &self.ibl_layout
    }

    pub fn ibl_bind_group(&self) -> &wgpu::BindGroup {
        &self.ibl_group
    }

    fn face_program(
        &self,
        ctx: &RenderContext,
        library: &ShaderLibrary,
        label: &str,
        shaders: &[&'static str],
        source_layout: &wgpu::BindGroupLayout,
    ) -> RenderResult<Program> {
        ProgramDesc::new(label, library, shaders)?
            .with_bind_group_layouts(&[&self.face_layout, source_layout])
            .with_target(formats::ENVIRONMENT)
            .with_cull_mode(None)
            .build(ctx)
    }

    /// Uploads the source pixels as a texture readable by the conversion
    /// program.
    fn upload_source(&self, ctx: &RenderContext, source: &EnvironmentSource) -> RenderResult<Texture> {
        let usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        match source {
            EnvironmentSource::Equirect { width, height, pixels } => {
                let texture = Texture::new(
                    ctx.device(),
                    TextureDesc::new("Equirect Source", formats::SOURCE_HDR, *width, *height).with_usage(usage),
                );
                texture.write_layer(ctx.queue(), 0, bytemuck::cast_slice(pixels))?;
                Ok(texture)
            }
            EnvironmentSource::Cube { size, faces } => {
                let texture = Texture::new(
                    ctx.device(),
                    TextureDesc::new("Cube Source", formats::SOURCE_HDR, *size, *size)
                        .with_kind(TextureKind::D2Array { layers: CUBE_FACES })
                        .with_usage(usage),
                );
                let face_len = faces.len() / CUBE_FACES as usize;
                for (layer, face) in faces.chunks_exact(face_len).enumerate() {
                    texture.write_layer(ctx.queue(), layer as u32, bytemuck::cast_slice(face))?;
                }
                Ok(texture)
            }
            EnvironmentSource::Solid(_) => Err(RenderError::InvalidTextureData {
                label: "Environment Source".to_string(),
                reason: "solid sources are expanded before upload".to_string(),
            }),
        }
    }

    /// Bakes every IBL texture from `source`.
    ///
    /// Conversion, irradiance, prefilter and BRDF passes are recorded into
    /// one encoder and submitted together.
    pub fn bake(
        &mut self,
        ctx: &RenderContext,
        library: &ShaderLibrary,
        programs: &mut ProgramCache,
        source: EnvironmentSource,
    ) -> RenderResult<()> {
        source.validate()?;
        let source = source.into_faces();
        let device = ctx.device();
        let source_texture = self.upload_source(ctx, &source)?;

        let (convert_key, source_layout) = match source {
            EnvironmentSource::Equirect { .. } => (ProgramKey::EquirectToCube, &self.equirect_layout),
            _ => (ProgramKey::CubeCopy, &self.faces_layout),
        };
        let convert = programs.get_or_build(convert_key, || match convert_key {
            ProgramKey::EquirectToCube => self.face_program(
                ctx,
                library,
                "Equirect To Cube",
                &["fullscreen", "cube_face", "equirect_to_cube"],
                source_layout,
            ),
            _ => self.face_program(
                ctx,
                library,
                "Cube Copy",
                &["fullscreen", "cube_face", "cube_copy"],
                source_layout,
            ),
        })?;
        let irradiance_program = programs.get_or_build(ProgramKey::Irradiance, || {
            self.face_program(
                ctx,
                library,
                "Irradiance",
                &["fullscreen", "cube_face", "ibl_sampling", "irradiance"],
                &self.cube_layout,
            )
        })?;
        let prefilter_program = programs.get_or_build(ProgramKey::Prefilter, || {
            self.face_program(
                ctx,
                library,
                "Prefilter",
                &["fullscreen", "cube_face", "ibl_sampling", "prefilter"],
                &self.cube_layout,
            )
        })?;
        let brdf_program = programs.get_or_build(ProgramKey::BrdfLut, || {
            ProgramDesc::new("BRDF LUT", library, &["fullscreen", "ibl_sampling", "brdf_lut"])?
                .with_target(formats::BRDF_LUT)
                .with_cull_mode(None)
                .build(ctx)
        })?;

        // face uniforms: conversion, irradiance, then prefilter mip by mip
        let mips = self.config.prefilter_mips;
        let mut faces = DynamicUniformBuffer::<FacePassUniform>::new(
            device,
            "Environment Face Passes",
            ctx.uniform_alignment(),
            u64::from(CUBE_FACES * (2 + mips)),
        );
        let cube_size = self.config.cube_size as f32;
        let mut stage = |roughness: f32, sample_count: u32| -> Vec<u32> {
            (0..CUBE_FACES)
                .map(|face| {
                    faces.push(&FacePassUniform {
                        face,
                        roughness,
                        source_size: cube_size,
                        sample_count,
                    })
                })
                .collect()
        };
        let convert_offsets = stage(0.0, 0);
        let irradiance_offsets = stage(0.0, 0);
        let prefilter_offsets: Vec<Vec<u32>> = (0..mips)
            .map(|mip| stage(mip_roughness(mip, mips), PREFILTER_SAMPLES))
            .collect();
        faces.upload(device, ctx.queue());

        let face_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cube Face Bind Group"),
            layout: &self.face_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: faces.binding(),
            }],
        });
        let source_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Environment Source Bind Group"),
            layout: source_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&source_texture.view()),
            }],
        });
        let cube_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Environment Cube Bind Group"),
            layout: &self.cube_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.cube.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let target = |texture: &Arc<Texture>| {
            let (width, height) = texture.size();
            Framebuffer::builder(texture.label(), width, height)
                .color(texture.clone())
                .build(device)
        };
        let cube_target = target(&self.cube)?;
        let irradiance_target = target(&self.irradiance)?;
        let prefilter_target = target(&self.prefilter)?;
        let brdf_target = target(&self.brdf_lut)?;

        let mut encoder = ctx.create_encoder("Environment Bake");
        let mut face_passes = |target: &Framebuffer, program: &Program, source: &wgpu::BindGroup, offsets: &[u32], mip: u32| {
            for (face, offset) in offsets.iter().enumerate() {
                let mut pass = target.begin_layer(
                    &mut encoder,
                    "Environment Face Pass",
                    face as u32,
                    mip,
                    PassOps::clear(wgpu::Color::BLACK),
                );
                pass.set_pipeline(program.pipeline());
                pass.set_bind_group(0, &face_group, &[*offset]);
                pass.set_bind_group(1, source, &[]);
                pass.draw(0..3, 0..1);
            }
        };
        face_passes(&cube_target, &*convert, &source_group, &convert_offsets, 0);
        face_passes(&irradiance_target, &*irradiance_program, &cube_group, &irradiance_offsets, 0);
        for (mip, offsets) in prefilter_offsets.iter().enumerate() {
            face_passes(&prefilter_target, &*prefilter_program, &cube_group, offsets, mip as u32);
        }
        {
            let mut pass = brdf_target.begin(&mut encoder, "BRDF LUT Pass", PassOps::clear(wgpu::Color::BLACK));
            pass.set_pipeline(brdf_program.pipeline());
            pass.draw(0..3, 0..1);
        }
        ctx.submit(encoder);

        self.bakes += 1;
        tracing::info!(
            "Baked environment: cube {}, irradiance {}, prefilter {} x {} mips, BRDF LUT {}",
            self.config.cube_size,
            self.config.irradiance_size,
            self.config.prefilter_size,
            mips,
            self.config.brdf_lut_size
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::context::test_context;

    #[test]
    fn test_mip_roughness_spans_unit_range() {
        assert_eq!(mip_roughness(0, 5), 0.0);
        assert_relative_eq!(mip_roughness(2, 5), 0.5);
        assert_eq!(mip_roughness(4, 5), 1.0);
        assert_eq!(mip_roughness(0, 1), 0.0);
    }

    #[test]
    fn test_source_validation() {
        let ok = EnvironmentSource::Equirect {
            width: 4,
            height: 2,
            pixels: vec![0.0; 32],
        };
        assert!(ok.validate().is_ok());

        let short = EnvironmentSource::Cube {
            size: 2,
            faces: vec![0.0; 16],
        };
        assert!(matches!(
            short.validate(),
            Err(RenderError::InvalidTextureData { .. })
        ));

        let empty = EnvironmentSource::Equirect {
            width: 0,
            height: 2,
            pixels: Vec::new(),
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_solid_expands_to_faces() {
        let EnvironmentSource::Cube { size, faces } = EnvironmentSource::Solid([0.5, 0.25, 1.0]).into_faces() else {
            panic!("solid source should expand to a cube");
        };
        assert_eq!(size, 1);
        assert_eq!(faces.len(), 24);
        assert_eq!(&faces[20..24], &[0.5, 0.25, 1.0, 1.0]);
    }

    #[test]
    fn test_bake_builds_precompute_programs() {
        let Some(ctx) = test_context() else {
            return;
        };
        let config = EnvironmentConfig {
            cube_size: 16,
            irradiance_size: 8,
            prefilter_size: 16,
            prefilter_mips: 5,
            brdf_lut_size: 16,
            intensity: 1.0,
        };
        let library = ShaderLibrary::builtin();
        let mut programs = ProgramCache::new();
        let mut environment = Environment::new(&ctx, &config);
        assert_eq!(environment.prefilter().mip_levels(), 5);
        assert_eq!(environment.max_prefilter_mip(), 4.0);

        let pixels = [0.2f32, 0.4, 0.8, 1.0].repeat(8 * 4);
        environment
            .bake(
                &ctx,
                &library,
                &mut programs,
                EnvironmentSource::Equirect {
                    width: 8,
                    height: 4,
                    pixels,
                },
            )
            .unwrap();
        environment
            .bake(&ctx, &library, &mut programs, EnvironmentSource::Solid([1.0, 1.0, 1.0]))
            .unwrap();

        assert!(environment.is_baked());
        for key in [
            ProgramKey::EquirectToCube,
            ProgramKey::CubeCopy,
            ProgramKey::Irradiance,
            ProgramKey::Prefilter,
            ProgramKey::BrdfLut,
        ] {
            assert!(programs.contains(key), "{} missing", key.name());
            assert!(!key.is_per_frame());
        }
    }

    fn f16_to_f32(bits: u16) -> f32 {
        let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
        let exponent = i32::from((bits >> 10) & 0x1f);
        let mantissa = f32::from(bits & 0x3ff);
        match exponent {
            0 => sign * mantissa * 2f32.powi(-24),
            31 => f32::NAN,
            _ => sign * (1.0 + mantissa / 1024.0) * 2f32.powi(exponent - 15),
        }
    }

    /// Center texel of every face of an `Rgba16Float` cube, mip 0.
    fn read_face_centers(ctx: &RenderContext, texture: &Texture) -> Vec<[f32; 4]> {
        let row = u64::from(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("Face Readback"),
            size: row * u64::from(CUBE_FACES),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let (size, _) = texture.size();
        let mut encoder = ctx.create_encoder("Face Readback");
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &texture.raw(),
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: size / 2,
                    y: size / 2,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: CUBE_FACES,
            },
        );
        ctx.submit(encoder);

        let slice = buffer.slice(..);
        slice.map_async(wgpu::MapMode::Read, |result| result.unwrap());
        ctx.device().poll(wgpu::Maintain::Wait);
        let data = slice.get_mapped_range();
        (0..CUBE_FACES as usize)
            .map(|face| {
                let offset = face * row as usize;
                let texel: [u16; 4] = bytemuck::pod_read_unaligned(&data[offset..offset + 8]);
                texel.map(f16_to_f32)
            })
            .collect()
    }

    #[test]
    fn test_half_float_decode() {
        assert_eq!(f16_to_f32(0x3c00), 1.0);
        assert_eq!(f16_to_f32(0xc000), -2.0);
        assert_eq!(f16_to_f32(0x3800), 0.5);
        assert_eq!(f16_to_f32(0), 0.0);
    }

    #[test]
    fn test_white_environment_irradiance_is_one() {
        let Some(ctx) = test_context() else {
            return;
        };
        let config = EnvironmentConfig {
            cube_size: 16,
            irradiance_size: 8,
            prefilter_size: 16,
            prefilter_mips: 3,
            brdf_lut_size: 16,
            intensity: 1.0,
        };
        let library = ShaderLibrary::builtin();
        let mut programs = ProgramCache::new();
        let mut environment = Environment::new(&ctx, &config);
        environment
            .bake(&ctx, &library, &mut programs, EnvironmentSource::Solid([1.0, 1.0, 1.0]))
            .unwrap();

        // cosine-weighted average of a constant sky is the sky itself
        for texel in read_face_centers(&ctx, environment.irradiance()) {
            for channel in &texel[..3] {
                assert_relative_eq!(*channel, 1.0, epsilon = 0.05);
            }
            assert_eq!(texel[3], 1.0);
        }
        for texel in read_face_centers(&ctx, environment.cube()) {
            assert_eq!(texel, [1.0; 4]);
        }
    }
}
