//! Render context that encapsulates the GPU device.
//!
//! The RenderContext hides wgpu setup from consumers and wraps the calls
//! whose failures must be caught with error scopes.

use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::constants::formats;
use crate::error::{RenderError, RenderResult};

/// GPU device, queue and output description shared by every pass.
pub struct RenderContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    output_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

impl RenderContext {
    /// Creates a context around an existing device.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        output_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            device,
            queue,
            output_format,
            depth_format: formats::DEPTH,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Requests an adapter and device without a surface.
    pub fn headless(width: u32, height: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(RenderError::AdapterNotFound)?;

        let info = adapter.get_info();
        tracing::info!("Using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("lumen device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))?;

        Ok(Self::new(
            Arc::new(device),
            Arc::new(queue),
            formats::HDR,
            width,
            height,
        ))
    }

    /// Returns the wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns the wgpu queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Returns the format of the lit output target.
    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.output_format
    }

    /// Returns the depth texture format.
    pub fn depth_format(&self) -> wgpu::TextureFormat {
        self.depth_format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Updates the viewport dimensions.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    /// Minimum stride between dynamic uniform offsets.
    pub fn uniform_alignment(&self) -> u64 {
        u64::from(self.device.limits().min_uniform_buffer_offset_alignment)
    }

    /// Creates a buffer initialized with data.
    pub fn create_buffer_init(&self, desc: &wgpu::util::BufferInitDescriptor) -> wgpu::Buffer {
        self.device.create_buffer_init(desc)
    }

    /// Writes data to a buffer.
    pub fn write_buffer(&self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer, offset, data);
    }

    /// Runs `f` inside a validation error scope and returns its first error.
    pub fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error)
    }

    /// Runs `f` inside a validation error scope and logs any error.
    ///
    /// Used around calls whose failure should not stop the frame.
    pub fn logged<T>(&self, label: &str, f: impl FnOnce(&wgpu::Device) -> T) -> T {
        let (value, error) = self.scoped(f);
        if let Some(error) = error {
            tracing::error!("GPU validation error in '{}': {}", label, error);
        }
        value
    }

    /// Compiles a WGSL shader module.
    pub fn create_shader(&self, source: &str, label: &str) -> RenderResult<wgpu::ShaderModule> {
        let (module, error) = self.scoped(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });
        match error {
            Some(error) => Err(RenderError::ShaderCompile {
                label: label.to_string(),
                message: error.to_string(),
            }),
            None => Ok(module),
        }
    }

    /// Creates a render pipeline, turning validation errors into a result.
    pub fn create_render_pipeline(
        &self,
        desc: &wgpu::RenderPipelineDescriptor,
    ) -> RenderResult<wgpu::RenderPipeline> {
        let (pipeline, error) = self.scoped(|device| device.create_render_pipeline(desc));
        match error {
            Some(error) => Err(RenderError::PipelineCreation {
                label: desc.label.unwrap_or("unnamed").to_string(),
                message: error.to_string(),
            }),
            None => Ok(pipeline),
        }
    }

    /// Creates a command encoder.
    pub fn create_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    /// Finishes and submits an encoder, logging validation errors.
    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.logged("submit", |_| {
            self.queue.submit(Some(encoder.finish()));
        });
    }
}

/// Headless context for GPU-backed tests, or `None` when no adapter exists.
#[cfg(test)]
pub(crate) fn test_context() -> Option<RenderContext> {
    match RenderContext::headless(64, 64) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("Skipping GPU test: {}", e);
            None
        }
    }
}
