//! Render target made of shared textures and an owned depth renderbuffer.

use std::sync::Arc;

use crate::error::{RenderError, RenderResult};
use crate::gpu::texture::Texture;

/// Maximum simultaneous color attachments.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

/// Load behaviour for a pass over a framebuffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassOps {
    /// Clear color attachments, or keep their contents when `None`
    pub clear_color: Option<wgpu::Color>,
    /// Clear depth, or keep its contents when `None`
    pub clear_depth: Option<f32>,
}

impl PassOps {
    pub fn clear(color: wgpu::Color) -> Self {
        Self {
            clear_color: Some(color),
            clear_depth: Some(1.0),
        }
    }

    pub fn clear_depth() -> Self {
        Self {
            clear_color: None,
            clear_depth: Some(1.0),
        }
    }

    pub fn load() -> Self {
        Self::default()
    }

    fn color_load(&self) -> wgpu::LoadOp<wgpu::Color> {
        match self.clear_color {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        }
    }

    fn depth_load(&self) -> wgpu::LoadOp<f32> {
        match self.clear_depth {
            Some(depth) => wgpu::LoadOp::Clear(depth),
            None => wgpu::LoadOp::Load,
        }
    }
}

/// Where an attachment is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentSlot {
    Color(usize),
    Depth,
    Renderbuffer,
}

/// What the completeness check needs to know about one attachment.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentInfo {
    pub slot: AttachmentSlot,
    pub format: wgpu::TextureFormat,
    pub size: (u32, u32),
    pub usage: wgpu::TextureUsages,
    pub layered: bool,
}

impl AttachmentInfo {
    fn of(slot: AttachmentSlot, texture: &Texture) -> Self {
        Self {
            slot,
            format: texture.format(),
            size: texture.size(),
            usage: texture.usage(),
            layered: texture.kind().is_layered(),
        }
    }
}

/// Validates a set of attachments the way a driver would before the first
/// draw. Returns the first problem found.
pub fn check_complete(size: (u32, u32), attachments: &[AttachmentInfo]) -> Result<(), String> {
    if attachments.is_empty() {
        return Err("no attachments".to_string());
    }

    let colors = attachments
        .iter()
        .filter(|a| matches!(a.slot, AttachmentSlot::Color(_)))
        .count();
    if colors > MAX_COLOR_ATTACHMENTS {
        return Err(format!(
            "{} color attachments exceed the limit of {}",
            colors, MAX_COLOR_ATTACHMENTS
        ));
    }

    let depths = attachments
        .iter()
        .filter(|a| !matches!(a.slot, AttachmentSlot::Color(_)))
        .count();
    if depths > 1 {
        return Err("more than one depth attachment".to_string());
    }

    for attachment in attachments {
        let is_depth = attachment.format.is_depth_stencil_format();
        match attachment.slot {
            AttachmentSlot::Color(index) if is_depth => {
                return Err(format!(
                    "color attachment {} has depth format {:?}",
                    index, attachment.format
                ));
            }
            AttachmentSlot::Depth | AttachmentSlot::Renderbuffer if !is_depth => {
                return Err(format!(
                    "depth attachment has color format {:?}",
                    attachment.format
                ));
            }
            _ => {}
        }
        if !attachment.usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
            return Err(format!(
                "{:?} is missing RENDER_ATTACHMENT usage",
                attachment.slot
            ));
        }
        if attachment.size != size {
            return Err(format!(
                "{:?} is {}x{}, framebuffer is {}x{}",
                attachment.slot, attachment.size.0, attachment.size.1, size.0, size.1
            ));
        }
    }

    let layered = attachments.iter().filter(|a| a.layered).count();
    if layered != 0 && attachments.iter().any(|a| a.slot == AttachmentSlot::Renderbuffer) {
        return Err("a renderbuffer cannot back a layered framebuffer".to_string());
    }
    if layered != 0 && layered != attachments.len() {
        return Err("layered and single-layer attachments are mixed".to_string());
    }

    Ok(())
}

struct Renderbuffer {
    format: wgpu::TextureFormat,
    size: (u32, u32),
    view: wgpu::TextureView,
}

impl Renderbuffer {
    fn new(device: &wgpu::Device, label: &str, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            format,
            size: (width.max(1), height.max(1)),
            view,
        }
    }
}

/// Builder for [`Framebuffer`].
pub struct FramebufferBuilder {
    label: String,
    width: u32,
    height: u32,
    colors: Vec<Arc<Texture>>,
    depth: Option<Arc<Texture>>,
    renderbuffer: Option<wgpu::TextureFormat>,
}

impl FramebufferBuilder {
    /// Adds a shared color attachment.
    pub fn color(mut self, texture: Arc<Texture>) -> Self {
        self.colors.push(texture);
        self
    }

    /// Adds a shared depth texture.
    pub fn depth(mut self, texture: Arc<Texture>) -> Self {
        self.depth = Some(texture);
        self
    }

    /// Adds an owned depth renderbuffer that cannot be sampled.
    pub fn renderbuffer(mut self, format: wgpu::TextureFormat) -> Self {
        self.renderbuffer = Some(format);
        self
    }

    /// Creates the framebuffer, failing if it is incomplete.
    pub fn build(self, device: &wgpu::Device) -> RenderResult<Framebuffer> {
        let mut infos: Vec<AttachmentInfo> = self
            .colors
            .iter()
            .enumerate()
            .map(|(i, t)| AttachmentInfo::of(AttachmentSlot::Color(i), t))
            .collect();
        if let Some(depth) = &self.depth {
            infos.push(AttachmentInfo::of(AttachmentSlot::Depth, depth));
        }
        if let Some(format) = self.renderbuffer {
            infos.push(AttachmentInfo {
                slot: AttachmentSlot::Renderbuffer,
                format,
                size: (self.width, self.height),
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                layered: false,
            });
        }

        check_complete((self.width, self.height), &infos).map_err(|reason| {
            RenderError::FramebufferIncomplete {
                label: self.label.clone(),
                reason,
            }
        })?;

        let renderbuffer = self.renderbuffer.map(|format| {
            Renderbuffer::new(
                device,
                &format!("{} Renderbuffer", self.label),
                format,
                self.width,
                self.height,
            )
        });

        tracing::debug!(
            "Framebuffer '{}' complete: {} color, {}x{}",
            self.label,
            self.colors.len(),
            self.width,
            self.height
        );

        Ok(Framebuffer {
            label: self.label,
            width: self.width,
            height: self.height,
            colors: self.colors,
            depth: self.depth,
            renderbuffer,
        })
    }
}

/// A set of render attachments used together by one or more passes.
///
/// Color and depth textures are shared with the passes that read them; the
/// depth renderbuffer belongs to the framebuffer alone.
pub struct Framebuffer {
    label: String,
    width: u32,
    height: u32,
    colors: Vec<Arc<Texture>>,
    depth: Option<Arc<Texture>>,
    renderbuffer: Option<Renderbuffer>,
}

impl Framebuffer {
    pub fn builder(label: impl Into<String>, width: u32, height: u32) -> FramebufferBuilder {
        FramebufferBuilder {
            label: label.into(),
            width: width.max(1),
            height: height.max(1),
            colors: Vec::new(),
            depth: None,
            renderbuffer: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color(&self, index: usize) -> Option<&Arc<Texture>> {
        self.colors.get(index)
    }

    pub fn colors(&self) -> &[Arc<Texture>] {
        &self.colors
    }

    pub fn depth(&self) -> Option<&Arc<Texture>> {
        self.depth.as_ref()
    }

    /// Formats of the color attachments in slot order.
    pub fn color_formats(&self) -> Vec<wgpu::TextureFormat> {
        self.colors.iter().map(|t| t.format()).collect()
    }

    /// Format of whichever depth attachment is present.
    pub fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        self.depth
            .as_ref()
            .map(|t| t.format())
            .or(self.renderbuffer.as_ref().map(|r| r.format))
    }

    /// Resizes every attachment to the new size.
    ///
    /// Returns false when the size is unchanged.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> bool {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return false;
        }

        for texture in self.colors.iter().chain(self.depth.iter()) {
            texture.resize(device, width, height);
        }
        if let Some(renderbuffer) = &mut self.renderbuffer {
            *renderbuffer = Renderbuffer::new(
                device,
                &format!("{} Renderbuffer", self.label),
                renderbuffer.format,
                width,
                height,
            );
        }

        self.width = width;
        self.height = height;
        tracing::debug!("Framebuffer '{}' resized to {}x{}", self.label, width, height);
        true
    }

    /// Begins a pass over all attachments.
    pub fn begin<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        label: &str,
        ops: PassOps,
    ) -> wgpu::RenderPass<'e> {
        let color_views: Vec<_> = self.colors.iter().map(|t| t.view()).collect();
        let depth_view = self.depth.as_ref().map(|t| t.view());

        let color_attachments: Vec<_> = color_views
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: ops.color_load(),
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        let depth = depth_view
            .as_deref()
            .or(self.renderbuffer.as_ref().map(|r| &r.view));

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment: depth.map(|view| depth_attachment(view, ops)),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }

    /// Begins a pass over one array layer (or cube face) of layered
    /// attachments. Layered framebuffers never carry a renderbuffer.
    pub fn begin_layer<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        label: &str,
        layer: u32,
        mip: u32,
        ops: PassOps,
    ) -> wgpu::RenderPass<'e> {
        let color_views: Vec<_> = self
            .colors
            .iter()
            .map(|t| t.layer_view(layer, mip))
            .collect();
        let depth_view = self.depth.as_ref().map(|t| t.layer_view(layer, mip));

        let color_attachments: Vec<_> = color_views
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: ops.color_load(),
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment: depth_view.as_ref().map(|view| depth_attachment(view, ops)),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }
}

fn depth_attachment(view: &wgpu::TextureView, ops: PassOps) -> wgpu::RenderPassDepthStencilAttachment<'_> {
    wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load: ops.depth_load(),
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::formats;
    use crate::context::test_context;
    use crate::gpu::texture::{TextureDesc, TextureKind};

    fn info(slot: AttachmentSlot, format: wgpu::TextureFormat, size: (u32, u32)) -> AttachmentInfo {
        AttachmentInfo {
            slot,
            format,
            size,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            layered: false,
        }
    }

    #[test]
    fn test_complete_gbuffer_layout() {
        let size = (640, 480);
        let attachments = [
            info(AttachmentSlot::Color(0), wgpu::TextureFormat::Rgba16Float, size),
            info(AttachmentSlot::Color(1), wgpu::TextureFormat::Rgba16Float, size),
            info(AttachmentSlot::Color(2), wgpu::TextureFormat::Rgba8Unorm, size),
            info(AttachmentSlot::Depth, wgpu::TextureFormat::Depth32Float, size),
        ];
        assert!(check_complete(size, &attachments).is_ok());
    }

    #[test]
    fn test_incomplete_layouts() {
        let size = (64, 64);
        assert!(check_complete(size, &[]).is_err());

        let depth_in_color = [info(AttachmentSlot::Color(0), wgpu::TextureFormat::Depth32Float, size)];
        assert!(check_complete(size, &depth_in_color).is_err());

        let mismatched = [
            info(AttachmentSlot::Color(0), wgpu::TextureFormat::Rgba8Unorm, size),
            info(AttachmentSlot::Depth, wgpu::TextureFormat::Depth32Float, (32, 64)),
        ];
        assert!(check_complete(size, &mismatched).is_err());

        let two_depths = [
            info(AttachmentSlot::Depth, wgpu::TextureFormat::Depth32Float, size),
            info(AttachmentSlot::Renderbuffer, wgpu::TextureFormat::Depth32Float, size),
        ];
        assert!(check_complete(size, &two_depths).is_err());

        let mut layered_color = info(AttachmentSlot::Color(0), wgpu::TextureFormat::Rgba8Unorm, size);
        layered_color.layered = true;
        let layered_with_renderbuffer = [
            layered_color,
            info(AttachmentSlot::Renderbuffer, wgpu::TextureFormat::Depth32Float, size),
        ];
        assert_eq!(
            check_complete(size, &layered_with_renderbuffer).unwrap_err(),
            "a renderbuffer cannot back a layered framebuffer"
        );

        let mut sampled_only = info(AttachmentSlot::Color(0), wgpu::TextureFormat::Rgba8Unorm, size);
        sampled_only.usage = wgpu::TextureUsages::TEXTURE_BINDING;
        assert!(check_complete(size, &[sampled_only]).is_err());
    }

    #[test]
    fn test_build_reports_incomplete() {
        let Some(ctx) = test_context() else {
            return;
        };
        let color = Arc::new(Texture::new(
            ctx.device(),
            TextureDesc::new("color", wgpu::TextureFormat::Rgba8Unorm, 32, 32),
        ));
        let result = Framebuffer::builder("broken", 64, 64)
            .color(color)
            .build(ctx.device());
        assert!(matches!(
            result,
            Err(RenderError::FramebufferIncomplete { .. })
        ));
    }

    #[test]
    fn test_resize_updates_every_attachment() {
        let Some(ctx) = test_context() else {
            return;
        };
        let device = ctx.device();
        let colors: Vec<Arc<Texture>> = [
            wgpu::TextureFormat::Rgba16Float,
            wgpu::TextureFormat::Rgba16Float,
            wgpu::TextureFormat::Rgba8Unorm,
        ]
        .into_iter()
        .enumerate()
        .map(|(i, format)| {
            Arc::new(Texture::new(
                device,
                TextureDesc::new(format!("color{i}"), format, 1920, 1080),
            ))
        })
        .collect();
        let depth = Arc::new(Texture::new(
            device,
            TextureDesc::new("depth", wgpu::TextureFormat::Depth32Float, 1920, 1080),
        ));

        let mut builder = Framebuffer::builder("gbuffer", 1920, 1080).depth(depth.clone());
        for color in &colors {
            builder = builder.color(color.clone());
        }
        let mut framebuffer = builder.build(device).unwrap();

        assert!(framebuffer.resize(device, 800, 600));
        assert!(!framebuffer.resize(device, 800, 600));

        assert_eq!(framebuffer.size(), (800, 600));
        for color in &colors {
            assert_eq!(color.size(), (800, 600));
            assert_eq!(color.generation(), 1);
        }
        assert_eq!(depth.size(), (800, 600));
    }

    #[test]
    fn test_renderbuffer_follows_resize() {
        let Some(ctx) = test_context() else {
            return;
        };
        let device = ctx.device();
        let color = Arc::new(Texture::new(
            device,
            TextureDesc::new("color", wgpu::TextureFormat::Rgba8Unorm, 1920, 1080),
        ));
        let mut framebuffer = Framebuffer::builder("forward", 1920, 1080)
            .color(color.clone())
            .renderbuffer(formats::DEPTH)
            .build(device)
            .unwrap();
        assert!(framebuffer.depth().is_none());
        assert_eq!(framebuffer.depth_format(), Some(formats::DEPTH));

        assert!(framebuffer.resize(device, 800, 600));
        assert_eq!(color.size(), (800, 600));
        assert_eq!(framebuffer.renderbuffer.as_ref().map(|r| r.size), Some((800, 600)));

        let ((), error) = ctx.scoped(|_| {
            let mut encoder = ctx.create_encoder("Renderbuffer Test");
            drop(framebuffer.begin(&mut encoder, "Renderbuffer Pass", PassOps::clear(wgpu::Color::BLACK)));
            ctx.queue().submit(Some(encoder.finish()));
        });
        assert!(error.is_none(), "{error:?}");
    }

    #[test]
    fn test_layered_build_rejects_renderbuffer() {
        let Some(ctx) = test_context() else {
            return;
        };
        let layers = Arc::new(Texture::new(
            ctx.device(),
            TextureDesc::new("layers", wgpu::TextureFormat::Rgba8Unorm, 32, 32)
                .with_kind(TextureKind::D2Array { layers: 2 }),
        ));
        let result = Framebuffer::builder("layered", 32, 32)
            .color(layers)
            .renderbuffer(formats::DEPTH)
            .build(ctx.device());
        assert!(matches!(
            result,
            Err(RenderError::FramebufferIncomplete { .. })
        ));
    }
}
