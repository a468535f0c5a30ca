//! Texture wrapper with in-place resize.
//!
//! Textures that are read by several passes (G-buffer attachments, shadow
//! arrays) are shared as `Arc<Texture>`. Resizing swaps the GPU texture
//! behind a lock and bumps a generation counter so readers can tell that
//! bind groups built from the old view are stale.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};

use crate::constants::CUBE_FACES;
use crate::error::{RenderError, RenderResult};

/// Shape of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    D2,
    D2Array { layers: u32 },
    Cube,
    CubeArray { cubes: u32 },
    D3 { depth: u32 },
}

impl TextureKind {
    /// Value of `depth_or_array_layers`.
    pub fn depth_or_layers(&self) -> u32 {
        match *self {
            TextureKind::D2 => 1,
            TextureKind::D2Array { layers } => layers.max(1),
            TextureKind::Cube => CUBE_FACES,
            TextureKind::CubeArray { cubes } => CUBE_FACES * cubes.max(1),
            TextureKind::D3 { depth } => depth.max(1),
        }
    }

    pub fn dimension(&self) -> wgpu::TextureDimension {
        match self {
            TextureKind::D3 { .. } => wgpu::TextureDimension::D3,
            _ => wgpu::TextureDimension::D2,
        }
    }

    pub fn view_dimension(&self) -> wgpu::TextureViewDimension {
        match self {
            TextureKind::D2 => wgpu::TextureViewDimension::D2,
            TextureKind::D2Array { .. } => wgpu::TextureViewDimension::D2Array,
            TextureKind::Cube => wgpu::TextureViewDimension::Cube,
            TextureKind::CubeArray { .. } => wgpu::TextureViewDimension::CubeArray,
            TextureKind::D3 { .. } => wgpu::TextureViewDimension::D3,
        }
    }

    /// Returns true if individual slices can be bound as render targets.
    pub fn is_layered(&self) -> bool {
        !matches!(self, TextureKind::D2 | TextureKind::D3 { .. })
    }
}

/// Creation parameters for a [`Texture`].
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub label: String,
    pub kind: TextureKind,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub usage: wgpu::TextureUsages,
}

impl TextureDesc {
    /// Single-mip 2D render target that can also be sampled.
    pub fn new(label: impl Into<String>, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            kind: TextureKind::D2,
            format,
            width,
            height,
            mip_levels: 1,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        }
    }

    pub fn with_kind(mut self, kind: TextureKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_mips(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels.max(1);
        self
    }

    pub fn with_usage(mut self, usage: wgpu::TextureUsages) -> Self {
        self.usage = usage;
        self
    }

    pub fn add_usage(mut self, usage: wgpu::TextureUsages) -> Self {
        self.usage |= usage;
        self
    }
}

struct TextureState {
    raw: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// A GPU texture plus its default full view.
pub struct Texture {
    label: String,
    kind: TextureKind,
    format: wgpu::TextureFormat,
    mip_levels: u32,
    usage: wgpu::TextureUsages,
    state: RwLock<TextureState>,
    generation: AtomicU64,
}

impl Texture {
    pub fn new(device: &wgpu::Device, desc: TextureDesc) -> Self {
        let state = Self::create_state(device, &desc);
        Self {
            label: desc.label,
            kind: desc.kind,
            format: desc.format,
            mip_levels: desc.mip_levels.max(1),
            usage: desc.usage,
            state: RwLock::new(state),
            generation: AtomicU64::new(0),
        }
    }

    fn create_state(device: &wgpu::Device, desc: &TextureDesc) -> TextureState {
        let width = desc.width.max(1);
        let height = desc.height.max(1);
        let raw = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: desc.kind.depth_or_layers(),
            },
            mip_level_count: desc.mip_levels.max(1),
            sample_count: 1,
            dimension: desc.kind.dimension(),
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });
        let view = raw.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&desc.label),
            dimension: Some(desc.kind.view_dimension()),
            ..Default::default()
        });
        TextureState {
            raw,
            view,
            width,
            height,
        }
    }

    fn desc(&self, width: u32, height: u32) -> TextureDesc {
        TextureDesc {
            label: self.label.clone(),
            kind: self.kind,
            format: self.format,
            width,
            height,
            mip_levels: self.mip_levels,
            usage: self.usage,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn usage(&self) -> wgpu::TextureUsages {
        self.usage
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Current (width, height) of mip 0.
    pub fn size(&self) -> (u32, u32) {
        let state = self.state.read();
        (state.width, state.height)
    }

    /// Incremented on every resize.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Full view of the texture with its natural dimension.
    pub fn view(&self) -> MappedRwLockReadGuard<'_, wgpu::TextureView> {
        RwLockReadGuard::map(self.state.read(), |s| &s.view)
    }

    pub fn raw(&self) -> MappedRwLockReadGuard<'_, wgpu::Texture> {
        RwLockReadGuard::map(self.state.read(), |s| &s.raw)
    }

    /// 2D view of one array layer (or cube face) at one mip level.
    pub fn layer_view(&self, layer: u32, mip: u32) -> wgpu::TextureView {
        let state = self.state.read();
        state.raw.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&self.label),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_mip_level: mip,
            mip_level_count: Some(1),
            base_array_layer: layer,
            array_layer_count: Some(1),
            ..Default::default()
        })
    }

    /// Recreates the texture at a new size.
    ///
    /// Returns false without touching the GPU when the size is unchanged.
    pub fn resize(&self, device: &wgpu::Device, width: u32, height: u32) -> bool {
        let (width, height) = (width.max(1), height.max(1));
        if self.size() == (width, height) {
            return false;
        }
        let state = Self::create_state(device, &self.desc(width, height));
        *self.state.write() = state;
        self.generation.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("Resized texture '{}' to {}x{}", self.label, width, height);
        true
    }

    /// Uploads tightly packed pixels for one layer of mip 0.
    pub fn write_layer(&self, queue: &wgpu::Queue, layer: u32, data: &[u8]) -> RenderResult<()> {
        let (width, height) = self.size();
        let bytes_per_pixel = self.format.block_copy_size(None).ok_or_else(|| {
            RenderError::InvalidTextureData {
                label: self.label.clone(),
                reason: format!("{:?} has no single copy size", self.format),
            }
        })?;
        let expected = layer_byte_len(bytes_per_pixel, width, height);
        if data.len() != expected {
            return Err(RenderError::InvalidTextureData {
                label: self.label.clone(),
                reason: format!("expected {} bytes, got {}", expected, data.len()),
            });
        }
        if layer >= self.kind.depth_or_layers() {
            return Err(RenderError::InvalidTextureData {
                label: self.label.clone(),
                reason: format!("layer {} out of range", layer),
            });
        }

        let state = self.state.read();
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &state.raw,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_pixel * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }
}

fn layer_byte_len(bytes_per_pixel: u32, width: u32, height: u32) -> usize {
    bytes_per_pixel as usize * width as usize * height as usize
}
