//! Renderer trait abstraction.

use graphview_core::camera::ZoomLimits;
use graphview_core::events::{EventKind, GraphEvent, Listener};
use graphview_core::input::PointerEvent;
use graphview_core::spatial::Hit;
use kurbo::{Point, Rect, Size};
use thiserror::Error;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Renderer errors.
#[derive(Debug, Clone, Error)]
pub enum RendererError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),
    /// The GPU context went away; the renderer must be recreated.
    #[error("GPU context lost: {0}")]
    ContextLost(String),
    #[error("Surface error: {0}")]
    Surface(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Zoom requests from the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomType {
    In,
    Out,
    Fit,
}

/// What an [`RenderEngine::update`] call must rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    pub update_nodes: bool,
    pub update_relationships: bool,
    pub restart_simulation: bool,
}

impl UpdateOptions {
    /// Rebuild everything and restart the simulation.
    pub fn all() -> Self {
        Self {
            update_nodes: true,
            update_relationships: true,
            restart_simulation: true,
        }
    }

    pub fn with_nodes(mut self, update: bool) -> Self {
        self.update_nodes = update;
        self
    }

    pub fn with_relationships(mut self, update: bool) -> Self {
        self.update_relationships = update;
        self
    }

    pub fn with_restart(mut self, restart: bool) -> Self {
        self.restart_simulation = restart;
        self
    }
}

/// Renderer flags supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub is_fullscreen: bool,
    /// Plain wheel scrolling only zooms while a modifier key is held.
    pub wheel_zoom_requires_mod_key: bool,
    /// Zoom to fit once the initial layout has been computed.
    pub initial_zoom_to_fit: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            is_fullscreen: false,
            wheel_zoom_requires_mod_key: false,
            initial_zoom_to_fit: true,
        }
    }
}

impl EngineConfig {
    pub fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.is_fullscreen = fullscreen;
        self
    }

    pub fn with_wheel_zoom_requires_mod_key(mut self, required: bool) -> Self {
        self.wheel_zoom_requires_mod_key = required;
        self
    }

    pub fn with_initial_zoom_to_fit(mut self, fit: bool) -> Self {
        self.initial_zoom_to_fit = fit;
        self
    }
}

/// Host callbacks for surface size and zoom notifications.
pub struct EngineCallbacks {
    /// Current drawing surface size in logical pixels.
    pub surface_size: Box<dyn Fn() -> Size>,
    pub on_zoom_limits: Box<dyn FnMut(ZoomLimits)>,
    /// Plain wheel scroll while a modifier key is required to zoom.
    pub on_wheel_zoom_info: Box<dyn FnMut()>,
}

impl EngineCallbacks {
    pub fn new(surface_size: impl Fn() -> Size + 'static) -> Self {
        Self {
            surface_size: Box::new(surface_size),
            on_zoom_limits: Box::new(|_| {}),
            on_wheel_zoom_info: Box::new(|| {}),
        }
    }

    pub fn with_zoom_limits(mut self, callback: impl FnMut(ZoomLimits) + 'static) -> Self {
        self.on_zoom_limits = Box::new(callback);
        self
    }

    pub fn with_wheel_zoom_info(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_wheel_zoom_info = Box::new(callback);
        self
    }
}

impl std::fmt::Debug for EngineCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCallbacks").finish_non_exhaustive()
    }
}

/// Trait for graph rendering backends.
///
/// Every operation is safe to call in any lifecycle state. A renderer whose
/// initialization failed stays inert and ignores further calls.
pub trait RenderEngine {
    /// Build the initial graphics. Calling it again is a no-op.
    fn init(&mut self);

    /// Rebuild graphics for the parts of the graph selected by `options`.
    fn update(&mut self, options: UpdateOptions);

    /// Zoom to the node-count based initial scale, centred on the origin.
    fn set_initial_zoom(&mut self);

    /// Run the simulation to a stable layout, then start live ticking.
    fn precompute_and_start(&mut self);

    fn zoom_by_type(&mut self, zoom: ZoomType);

    fn resize(&mut self, is_fullscreen: bool, wheel_zoom_requires_mod_key: bool);

    /// Bounds of all node circles in world space, or `None` for an empty graph.
    fn bounding_box(&self) -> Option<Rect>;

    fn on(&mut self, kind: EventKind, listener: Listener);

    fn trigger(&mut self, event: &GraphEvent);

    /// Per-tick render: advance the simulation one step and redraw.
    fn on_tick(&mut self);

    fn handle_pointer_event(&mut self, event: &PointerEvent, now: Instant);

    /// Entity under a screen point.
    fn hit_test(&self, screen_point: Point) -> Option<Hit>;

    /// Drive asynchronous initialization. Renderers without async setup ignore it.
    fn poll(&mut self) {}

    /// Release every resource. The renderer is unusable afterwards.
    fn destroy(&mut self);
}
