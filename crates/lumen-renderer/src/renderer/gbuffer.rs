//! Geometry buffer.

use std::sync::Arc;

use crate::constants::formats;
use crate::context::RenderContext;
use crate::error::RenderResult;
use crate::gpu::framebuffer::Framebuffer;
use crate::gpu::texture::{Texture, TextureDesc};

/// Attachments written by the geometry pass.
///
/// | slot | format      | contents                                     |
/// |------|-------------|----------------------------------------------|
/// | 0    | rgba16float | world position, w = 1 where covered          |
/// | 1    | rgba16float | world normal                                 |
/// | 2    | rgba8unorm  | albedo, a = specular                         |
/// | 3    | rgba8unorm  | metallic, roughness, occlusion, emissive     |
///
/// Depth is kept in its own texture so the forward pass can copy it.
pub struct GBuffer {
    framebuffer: Framebuffer,
}

impl GBuffer {
    pub const COLOR_FORMATS: [wgpu::TextureFormat; 4] = [
        formats::GBUFFER_POSITION,
        formats::GBUFFER_NORMAL,
        formats::GBUFFER_ALBEDO_SPEC,
        formats::GBUFFER_MATERIAL,
    ];

    pub fn new(ctx: &RenderContext, width: u32, height: u32) -> RenderResult<Self> {
        let device = ctx.device();
        let labels = ["G-Buffer Position", "G-Buffer Normal", "G-Buffer Albedo", "G-Buffer Material"];

        let mut builder = Framebuffer::builder("G-Buffer", width, height);
        for (label, format) in labels.into_iter().zip(Self::COLOR_FORMATS) {
            builder = builder.color(Arc::new(Texture::new(
                device,
                TextureDesc::new(label, format, width, height),
            )));
        }
        let depth = Arc::new(Texture::new(
            device,
            TextureDesc::new("G-Buffer Depth", ctx.depth_format(), width, height)
                .add_usage(wgpu::TextureUsages::COPY_SRC),
        ));
        let framebuffer = builder.depth(depth).build(device)?;
        Ok(Self { framebuffer })
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn size(&self) -> (u32, u32) {
        self.framebuffer.size()
    }

    fn attachment(&self, index: usize) -> &Arc<Texture> {
        &self.framebuffer.colors()[index]
    }

    pub fn position(&self) -> &Arc<Texture> {
        self.attachment(0)
    }

    pub fn normal(&self) -> &Arc<Texture> {
        self.attachment(1)
    }

    pub fn albedo_spec(&self) -> &Arc<Texture> {
        self.attachment(2)
    }

    pub fn material(&self) -> &Arc<Texture> {
        self.attachment(3)
    }

    /// Shared depth attachment.
    pub fn depth(&self) -> Option<&Arc<Texture>> {
        self.framebuffer.depth()
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> bool {
        self.framebuffer.resize(device, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_context;

    #[test]
    fn test_attachments_follow_resize() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut gbuffer = GBuffer::new(&ctx, 1920, 1080).unwrap();
        assert_eq!(gbuffer.framebuffer().color_formats(), GBuffer::COLOR_FORMATS.to_vec());
        assert_eq!(gbuffer.framebuffer().depth_format(), Some(formats::DEPTH));

        assert!(gbuffer.resize(ctx.device(), 800, 600));
        for texture in [gbuffer.position(), gbuffer.normal(), gbuffer.albedo_spec(), gbuffer.material()] {
            assert_eq!(texture.size(), (800, 600));
        }
        assert_eq!(gbuffer.depth().map(|d| d.size()), Some((800, 600)));
    }
}
