//! GraphView Render Library
//!
//! Renderer abstraction and implementations for the graph view.
//! The default implementation uses Vello for GPU-accelerated rendering;
//! [`SvgEngine`] renders the same graph to an SVG document.

mod engine;
mod renderer;
mod svg_impl;
pub mod text_cache;
mod view;

#[cfg(feature = "vello-renderer")]
pub mod graphics;
#[cfg(feature = "vello-renderer")]
mod parley_text;
#[cfg(all(feature = "vello-renderer", not(target_arch = "wasm32")))]
mod surface;
#[cfg(feature = "vello-renderer")]
mod vello_impl;

#[cfg(test)]
mod test_support;

pub use engine::AnyEngine;
pub use renderer::{
    EngineCallbacks, EngineConfig, RenderEngine, RenderResult, RendererError, UpdateOptions, ZoomType,
};
pub use svg_impl::SvgEngine;
pub use text_cache::{TextCache, TextKey, TextRasterizer, TextSprite, TextTexture};
pub use view::GraphView;

#[cfg(feature = "vello-renderer")]
pub use parley_text::ParleyRasterizer;
#[cfg(all(feature = "vello-renderer", not(target_arch = "wasm32")))]
pub use surface::WgpuSurface;
#[cfg(feature = "vello-renderer")]
pub use vello_impl::{EngineState, RenderSurface, VelloEngine};
