//! Camera module for pan/zoom transforms.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest allowed zoom level.
pub const ZOOM_MIN_SCALE: f64 = 0.1;
/// Largest allowed zoom level.
pub const ZOOM_MAX_SCALE: f64 = 2.0;
/// Fraction of the viewport left free on each side by zoom-to-fit.
pub const ZOOM_FIT_PADDING_PERCENT: f64 = 0.05;
/// Zoom step for the zoom in / zoom out buttons.
pub const ZOOM_STEP: f64 = 1.3;

/// Per-frame velocity retention for pan inertia.
const INERTIA_FRICTION: f64 = 0.9;
/// Velocities below this (px/frame) stop the inertia.
const INERTIA_STOP: f64 = 0.05;

/// Initial zoom for a graph of `node_count` nodes.
///
/// Shared with the vector renderer so both start at the same scale.
pub fn initial_zoom_scale(node_count: usize) -> f64 {
    let n = node_count as f64;
    let scale = -0.02364554 + 1.913 / (1.0 + (n / 12.7211).powf(0.8156444));
    scale.max(ZOOM_MIN_SCALE)
}

/// Which zoom limits the camera currently sits on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomLimits {
    pub zoom_in_limit_reached: bool,
    pub zoom_out_limit_reached: bool,
}

/// Camera manages the view transform for the graph viewport.
///
/// It handles panning (translation), zooming (scaling) and pan inertia,
/// converting between screen coordinates and world coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    /// Current translation offset (pan)
    pub offset: Vec2,
    /// Current zoom level
    pub zoom: f64,
    /// Minimum allowed zoom level
    pub min_zoom: f64,
    /// Maximum allowed zoom level
    pub max_zoom: f64,
    /// Pan velocity carried after a pan release, in screen px per frame.
    #[serde(skip)]
    velocity: Vec2,
    /// Screen position of the last pan sample while the camera is being dragged.
    #[serde(skip)]
    pan_anchor: Option<Point>,
    /// While paused, pointer drags do not pan (a node drag is in progress).
    #[serde(skip)]
    drag_paused: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            min_zoom: ZOOM_MIN_SCALE,
            max_zoom: ZOOM_MAX_SCALE,
            velocity: Vec2::ZERO,
            pan_anchor: None,
            drag_paused: false,
        }
    }
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the affine transform for rendering.
    ///
    /// This transform converts world coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Get the inverse transform for input handling.
    ///
    /// This transform converts screen coordinates to world coordinates.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    /// Convert a screen point to world coordinates.
    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    /// Convert a world point to screen coordinates.
    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Pan the camera by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Zoom the camera, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        // Convert screen point to world before zoom
        let world_point = self.screen_to_world(screen_point);

        // Apply new zoom
        self.zoom = new_zoom;

        // Adjust offset so world_point stays at screen_point
        let new_screen = self.world_to_screen(world_point);
        self.offset += screen_point - new_screen;
    }

    /// Set an absolute zoom level with the world origin in the viewport centre.
    pub fn center_on_origin(&mut self, zoom: f64, viewport: Size) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        self.offset = Vec2::new(viewport.width / 2.0, viewport.height / 2.0);
        self.velocity = Vec2::ZERO;
    }

    /// Fit the camera to show the given bounding box.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size) {
        self.velocity = Vec2::ZERO;
        let padding_x = viewport.width * ZOOM_FIT_PADDING_PERCENT;
        let padding_y = viewport.height * ZOOM_FIT_PADDING_PERCENT;
        let padded_viewport = Size::new(
            (viewport.width - padding_x * 2.0).max(1.0),
            (viewport.height - padding_y * 2.0).max(1.0),
        );

        if bounds.width() > 0.0 && bounds.height() > 0.0 {
            let scale_x = padded_viewport.width / bounds.width();
            let scale_y = padded_viewport.height / bounds.height();
            self.zoom = scale_x.min(scale_y).clamp(self.min_zoom, self.max_zoom);
        }

        // Center the bounds in the viewport
        let bounds_center = bounds.center();
        let viewport_center = Point::new(viewport.width / 2.0, viewport.height / 2.0);

        self.offset = Vec2::new(
            viewport_center.x - bounds_center.x * self.zoom,
            viewport_center.y - bounds_center.y * self.zoom,
        );
    }

    /// Which zoom limits are currently reached.
    pub fn zoom_limits(&self) -> ZoomLimits {
        ZoomLimits {
            zoom_in_limit_reached: self.zoom >= self.max_zoom - f64::EPSILON,
            zoom_out_limit_reached: self.zoom <= self.min_zoom + f64::EPSILON,
        }
    }

    /// Suspend or resume camera panning by pointer drag.
    pub fn set_drag_paused(&mut self, paused: bool) {
        self.drag_paused = paused;
        if paused {
            self.pan_anchor = None;
        }
    }

    pub fn is_drag_paused(&self) -> bool {
        self.drag_paused
    }

    /// Start a pointer pan at `screen_point`.
    pub fn begin_pan(&mut self, screen_point: Point) {
        if self.drag_paused {
            return;
        }
        self.pan_anchor = Some(screen_point);
        self.velocity = Vec2::ZERO;
    }

    /// Continue a pointer pan. Returns true if the camera moved.
    pub fn drag_pan(&mut self, screen_point: Point) -> bool {
        if self.drag_paused {
            return false;
        }
        let Some(anchor) = self.pan_anchor else {
            return false;
        };
        let delta = screen_point - anchor;
        self.pan(delta);
        self.velocity = delta;
        self.pan_anchor = Some(screen_point);
        true
    }

    /// Finish a pointer pan, keeping the last velocity as inertia.
    pub fn end_pan(&mut self) {
        self.pan_anchor = None;
    }

    pub fn is_panning(&self) -> bool {
        self.pan_anchor.is_some()
    }

    /// Advance pan inertia by one frame. Returns true while still moving.
    pub fn step_inertia(&mut self) -> bool {
        if self.pan_anchor.is_some() {
            return false;
        }
        if self.velocity.hypot() < INERTIA_STOP {
            self.velocity = Vec2::ZERO;
            return false;
        }
        self.velocity *= INERTIA_FRICTION;
        self.offset += self.velocity;
        true
    }
}
