//! Closed set of renderers selectable at runtime.

use crate::renderer::{RenderEngine, UpdateOptions, ZoomType};
use crate::svg_impl::SvgEngine;
use graphview_core::events::{EventKind, GraphEvent, Listener};
use graphview_core::input::PointerEvent;
use graphview_core::spatial::Hit;
use kurbo::{Point, Rect};

#[cfg(feature = "vello-renderer")]
use crate::vello_impl::VelloEngine;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Either renderer behind one concrete type.
#[derive(Debug)]
pub enum AnyEngine {
    #[cfg(feature = "vello-renderer")]
    Vello(Box<VelloEngine>),
    Svg(Box<SvgEngine>),
}

macro_rules! delegate {
    ($self:ident, $engine:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "vello-renderer")]
            AnyEngine::Vello($engine) => $call,
            AnyEngine::Svg($engine) => $call,
        }
    };
}

#[cfg(feature = "vello-renderer")]
impl From<VelloEngine> for AnyEngine {
    fn from(engine: VelloEngine) -> Self {
        AnyEngine::Vello(Box::new(engine))
    }
}

impl From<SvgEngine> for AnyEngine {
    fn from(engine: SvgEngine) -> Self {
        AnyEngine::Svg(Box::new(engine))
    }
}

impl RenderEngine for AnyEngine {
    fn init(&mut self) {
        delegate!(self, e => e.init())
    }

    fn update(&mut self, options: UpdateOptions) {
        delegate!(self, e => e.update(options))
    }

    fn set_initial_zoom(&mut self) {
        delegate!(self, e => e.set_initial_zoom())
    }

    fn precompute_and_start(&mut self) {
        delegate!(self, e => e.precompute_and_start())
    }

    fn zoom_by_type(&mut self, zoom: ZoomType) {
        delegate!(self, e => e.zoom_by_type(zoom))
    }

    fn resize(&mut self, is_fullscreen: bool, wheel_zoom_requires_mod_key: bool) {
        delegate!(self, e => e.resize(is_fullscreen, wheel_zoom_requires_mod_key))
    }

    fn bounding_box(&self) -> Option<Rect> {
        delegate!(self, e => e.bounding_box())
    }

    fn on(&mut self, kind: EventKind, listener: Listener) {
        delegate!(self, e => e.on(kind, listener))
    }

    fn trigger(&mut self, event: &GraphEvent) {
        delegate!(self, e => e.trigger(event))
    }

    fn on_tick(&mut self) {
        delegate!(self, e => e.on_tick())
    }

    fn handle_pointer_event(&mut self, event: &PointerEvent, now: Instant) {
        delegate!(self, e => e.handle_pointer_event(event, now))
    }

    fn hit_test(&self, screen_point: Point) -> Option<Hit> {
        delegate!(self, e => e.hit_test(screen_point))
    }

    fn poll(&mut self) {
        delegate!(self, e => e.poll())
    }

    fn destroy(&mut self) {
        delegate!(self, e => e.destroy())
    }
}
