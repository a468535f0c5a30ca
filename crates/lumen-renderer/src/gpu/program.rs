//! Shader programs and the cache that owns them.
//!
//! A [`Program`] is one compiled render pipeline. Programs are built on
//! first request through [`ProgramCache::get_or_build`] and never mutated
//! afterwards; a shader reload swaps in a new `Arc<Program>` and passes pick
//! it up on their next lookup.

use std::collections::HashMap;
use std::sync::Arc;

use lumen_core::ModuleKind;

use crate::context::RenderContext;
use crate::error::{RenderError, RenderResult};
use crate::shader_library::ShaderLibrary;

/// Identifies a program in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKey {
    Geometry,
    Lighting,
    SsaoBlur,
    Module(ModuleKind),
    EquirectToCube,
    CubeCopy,
    Irradiance,
    Prefilter,
    BrdfLut,
}

impl ProgramKey {
    pub fn name(&self) -> &'static str {
        match self {
            ProgramKey::Geometry => "geometry",
            ProgramKey::Lighting => "lighting",
            ProgramKey::SsaoBlur => "ssao_blur",
            ProgramKey::Module(kind) => kind.name(),
            ProgramKey::EquirectToCube => "equirect_to_cube",
            ProgramKey::CubeCopy => "cube_copy",
            ProgramKey::Irradiance => "irradiance",
            ProgramKey::Prefilter => "prefilter",
            ProgramKey::BrdfLut => "brdf_lut",
        }
    }

    /// Programs used every frame, as opposed to one-time precompute.
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            ProgramKey::Geometry | ProgramKey::Lighting | ProgramKey::SsaoBlur | ProgramKey::Module(_)
        )
    }
}

/// A compiled render pipeline plus the shader names it was built from.
pub struct Program {
    label: String,
    shaders: Vec<&'static str>,
    pipeline: wgpu::RenderPipeline,
}

impl Program {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub fn shaders(&self) -> &[&'static str] {
        &self.shaders
    }

    pub fn uses_shader(&self, name: &str) -> bool {
        self.shaders.contains(&name)
    }
}

/// Pipeline description; vertex and fragment entry points are `vs_main` and
/// `fs_main`.
pub struct ProgramDesc<'a> {
    label: String,
    shaders: Vec<&'static str>,
    source: String,
    bind_group_layouts: Vec<&'a wgpu::BindGroupLayout>,
    vertex_layouts: Vec<wgpu::VertexBufferLayout<'static>>,
    targets: Vec<Option<wgpu::ColorTargetState>>,
    depth_stencil: Option<wgpu::DepthStencilState>,
    topology: wgpu::PrimitiveTopology,
    cull_mode: Option<wgpu::Face>,
    front_face: wgpu::FrontFace,
    has_fragment: bool,
}

impl<'a> ProgramDesc<'a> {
    /// Starts a description whose WGSL is the given shaders concatenated.
    pub fn new(label: impl Into<String>, library: &ShaderLibrary, shaders: &[&'static str]) -> RenderResult<Self> {
        Ok(Self {
            label: label.into(),
            shaders: shaders.to_vec(),
            source: library.compose(shaders)?,
            bind_group_layouts: Vec::new(),
            vertex_layouts: Vec::new(),
            targets: Vec::new(),
            depth_stencil: None,
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            front_face: wgpu::FrontFace::Ccw,
            has_fragment: true,
        })
    }

    pub fn with_bind_group_layouts(mut self, layouts: &[&'a wgpu::BindGroupLayout]) -> Self {
        self.bind_group_layouts = layouts.to_vec();
        self
    }

    pub fn with_vertex_layouts(mut self, layouts: Vec<wgpu::VertexBufferLayout<'static>>) -> Self {
        self.vertex_layouts = layouts;
        self
    }

    /// Adds a color target without blending.
    pub fn with_target(mut self, format: wgpu::TextureFormat) -> Self {
        self.targets.push(Some(wgpu::ColorTargetState {
            format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        }));
        self
    }

    /// Adds a color target for each format.
    pub fn with_targets(mut self, formats: &[wgpu::TextureFormat]) -> Self {
        for format in formats {
            self = self.with_target(*format);
        }
        self
    }

    pub fn with_depth(mut self, format: wgpu::TextureFormat, write: bool, compare: wgpu::CompareFunction) -> Self {
        self.depth_stencil = Some(wgpu::DepthStencilState {
            format,
            depth_write_enabled: write,
            depth_compare: compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });
        self
    }

    pub fn with_depth_bias(mut self, constant: i32, slope_scale: f32) -> Self {
        if let Some(depth) = &mut self.depth_stencil {
            depth.bias = wgpu::DepthBiasState {
                constant,
                slope_scale,
                clamp: 0.0,
            };
        }
        self
    }

    pub fn with_cull_mode(mut self, cull_mode: Option<wgpu::Face>) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    pub fn with_front_face(mut self, front_face: wgpu::FrontFace) -> Self {
        self.front_face = front_face;
        self
    }

    /// Depth-only pipeline without a fragment stage.
    pub fn without_fragment(mut self) -> Self {
        self.has_fragment = false;
        self
    }

    /// Compiles the shaders and creates the pipeline.
    pub fn build(self, ctx: &RenderContext) -> RenderResult<Program> {
        let module = ctx.create_shader(&self.source, &self.label)?;

        let layout = ctx
            .device()
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{} Layout", self.label)),
                bind_group_layouts: &self.bind_group_layouts,
                push_constant_ranges: &[],
            });

        let fragment = self.has_fragment.then(|| wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &self.targets,
        });

        let pipeline = ctx.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&self.label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &self.vertex_layouts,
            },
            primitive: wgpu::PrimitiveState {
                topology: self.topology,
                strip_index_format: None,
                front_face: self.front_face,
                cull_mode: self.cull_mode,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: self.depth_stencil.clone(),
            multisample: wgpu::MultisampleState::default(),
            fragment,
            multiview: None,
            cache: None,
        })?;

        tracing::debug!("Built program '{}'", self.label);
        Ok(Program {
            label: self.label,
            shaders: self.shaders,
            pipeline,
        })
    }
}

/// Owns every program, keyed by what it renders.
#[derive(Default)]
pub struct ProgramCache {
    programs: HashMap<ProgramKey, Arc<Program>>,
    builds: u64,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an already-built program.
    pub fn get(&self, key: ProgramKey) -> RenderResult<Arc<Program>> {
        self.programs
            .get(&key)
            .cloned()
            .ok_or_else(|| RenderError::ProgramMissing(key.name().to_string()))
    }

    /// Returns the program for `key`, building it on first request.
    pub fn get_or_build(
        &mut self,
        key: ProgramKey,
        build: impl FnOnce() -> RenderResult<Program>,
    ) -> RenderResult<Arc<Program>> {
        if let Some(program) = self.programs.get(&key) {
            return Ok(program.clone());
        }
        let program = Arc::new(build()?);
        self.builds += 1;
        self.programs.insert(key, program.clone());
        Ok(program)
    }

    /// Installs a rebuilt program. On failure the previous program stays
    /// in place and the error is logged.
    pub fn replace(&mut self, key: ProgramKey, rebuilt: RenderResult<Program>) -> bool {
        match rebuilt {
            Ok(program) => {
                self.builds += 1;
                self.programs.insert(key, Arc::new(program));
                tracing::info!("Reloaded program '{}'", key.name());
                true
            }
            Err(e) => {
                tracing::error!("Keeping previous '{}' program: {}", key.name(), e);
                false
            }
        }
    }

    /// Drops a program so the next request rebuilds it.
    pub fn invalidate(&mut self, key: ProgramKey) -> bool {
        self.programs.remove(&key).is_some()
    }

    /// Keys of built programs whose source includes `shader`.
    pub fn keys_using(&self, shader: &str) -> Vec<ProgramKey> {
        let mut keys: Vec<ProgramKey> = self
            .programs
            .iter()
            .filter(|(_, p)| p.uses_shader(shader))
            .map(|(k, _)| *k)
            .collect();
        keys.sort_by_key(|k| k.name());
        keys
    }

    pub fn contains(&self, key: ProgramKey) -> bool {
        self.programs.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Total successful builds, including reloads.
    pub fn build_count(&self) -> u64 {
        self.builds
    }
}
