//! Native window surface for the Vello engine.
//!
//! Vello renders into an `Rgba8Unorm` storage texture, which is then blitted
//! onto the swapchain texture (whose format may be BGRA).

use crate::renderer::{RenderResult, RendererError};
use crate::vello_impl::RenderSurface;
use futures::channel::oneshot;
use kurbo::{Affine, Size};
use peniko::Color;
use vello::util::RenderContext;
use vello::wgpu::{self, PresentMode, SurfaceError, SurfaceTarget, util::TextureBlitter};
use vello::{AaConfig, RenderParams, Renderer, RendererOptions, Scene};

struct GpuState {
    surface: vello::util::RenderSurface<'static>,
    renderer: Renderer,
    blitter: TextureBlitter,
}

/// A [`RenderSurface`] drawing into a native window.
pub struct WgpuSurface {
    target: Option<SurfaceTarget<'static>>,
    initial_size: (u32, u32),
    scale_factor: f64,
    render_cx: RenderContext,
    state: Option<GpuState>,
}

impl WgpuSurface {
    /// `width` and `height` are the initial size in physical pixels.
    pub fn new(target: impl Into<SurfaceTarget<'static>>, width: u32, height: u32) -> Self {
        Self {
            target: Some(target.into()),
            initial_size: (width.max(1), height.max(1)),
            scale_factor: 1.0,
            render_cx: RenderContext::new(),
            state: None,
        }
    }

    /// Ratio of physical to logical pixels.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
    }

    fn create_state(&mut self) -> RenderResult<()> {
        let target = self
            .target
            .take()
            .ok_or_else(|| RendererError::InitFailed("surface target already consumed".into()))?;
        let (width, height) = self.initial_size;
        let surface = futures::executor::block_on(self.render_cx.create_surface(
            target,
            width,
            height,
            PresentMode::AutoVsync,
        ))
        .map_err(|e| RendererError::InitFailed(e.to_string()))?;

        let device = &self.render_cx.devices[surface.dev_id].device;
        let renderer = Renderer::new(device, RendererOptions::default())
            .map_err(|e| RendererError::InitFailed(e.to_string()))?;
        let blitter = TextureBlitter::new(device, surface.config.format);
        self.state = Some(GpuState {
            surface,
            renderer,
            blitter,
        });
        Ok(())
    }
}

fn physical(logical: f64, scale_factor: f64) -> u32 {
    ((logical * scale_factor).round() as u32).max(1)
}

impl RenderSurface for WgpuSurface {
    fn request_context(&mut self) -> oneshot::Receiver<RenderResult<()>> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(self.create_state());
        rx
    }

    fn present(&mut self, scene: &Scene, base_color: Color, size: Size) -> RenderResult<()> {
        let Some(state) = self.state.as_mut() else {
            return Err(RendererError::Surface("surface not initialized".into()));
        };
        let width = physical(size.width, self.scale_factor);
        let height = physical(size.height, self.scale_factor);
        if state.surface.config.width != width || state.surface.config.height != height {
            self.render_cx.resize_surface(&mut state.surface, width, height);
        }

        let handle = &self.render_cx.devices[state.surface.dev_id];
        let (device, queue) = (&handle.device, &handle.queue);
        let frame = state.surface.surface.get_current_texture().map_err(|e| {
            if matches!(e, SurfaceError::Lost | SurfaceError::OutOfMemory) {
                RendererError::ContextLost(e.to_string())
            } else {
                RendererError::Surface(e.to_string())
            }
        })?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("graph render texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let params = RenderParams {
            base_color,
            width,
            height,
            antialiasing_method: AaConfig::Area,
        };
        let scaled;
        let scene = if (self.scale_factor - 1.0).abs() > f64::EPSILON {
            let mut root = Scene::new();
            root.append(scene, Some(Affine::scale(self.scale_factor)));
            scaled = root;
            &scaled
        } else {
            scene
        };
        state
            .renderer
            .render_to_texture(device, queue, scene, &texture_view, &params)
            .map_err(|e| RendererError::Surface(e.to_string()))?;

        let surface_view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("graph blit encoder"),
        });
        state.blitter.copy(device, &mut encoder, &texture_view, &surface_view);
        queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::debug!("GPU surface released");
        }
    }
}

impl std::fmt::Debug for WgpuSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuSurface")
            .field("scale_factor", &self.scale_factor)
            .field("initialized", &self.state.is_some())
            .finish_non_exhaustive()
    }
}
