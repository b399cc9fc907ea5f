//! Renderer-agnostic visualization controller.
//!
//! [`GraphView`] owns everything both renderers share: the camera, the
//! spatial grid, the interaction state machine, the event bus and the
//! collaborators (style, simulation, geometry). Renderers add their own
//! retained graphics on top and decide when to draw.

use crate::renderer::{EngineCallbacks, EngineConfig, UpdateOptions, ZoomType};
use graphview_core::camera::{Camera, ZOOM_STEP, initial_zoom_scale};
use graphview_core::events::{EventBus, EventKind, GraphEvent, Listener};
use graphview_core::geometry::{GeometryChange, GeometryModel, GraphGeometry};
use graphview_core::graph::SharedGraph;
use graphview_core::input::{MouseButton, PointerEvent, wheel_zoom_factor};
use graphview_core::interaction::{InteractionContext, InteractionState};
use graphview_core::simulation::ForceSimulation;
use graphview_core::spatial::{Hit, SpatialGrid};
use graphview_core::style::GraphStyle;
use kurbo::{Point, Rect, Size};
use std::rc::Rc;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

pub struct GraphView {
    graph: SharedGraph,
    style: Rc<dyn GraphStyle>,
    simulation: Box<dyn ForceSimulation>,
    geometry: Box<dyn GeometryModel>,
    camera: Camera,
    grid: SpatialGrid,
    interaction: InteractionState,
    events: EventBus,
    config: EngineConfig,
    callbacks: EngineCallbacks,
    fitted_once: bool,
}

impl GraphView {
    pub fn new(
        graph: SharedGraph,
        style: Rc<dyn GraphStyle>,
        simulation: Box<dyn ForceSimulation>,
        config: EngineConfig,
        callbacks: EngineCallbacks,
    ) -> Self {
        Self {
            graph,
            style,
            simulation,
            geometry: Box::new(GraphGeometry::new()),
            camera: Camera::new(),
            grid: SpatialGrid::default(),
            interaction: InteractionState::new(),
            events: EventBus::new(),
            config,
            callbacks,
            fitted_once: false,
        }
    }

    /// Replace the default geometry helper.
    pub fn with_geometry(mut self, geometry: Box<dyn GeometryModel>) -> Self {
        self.geometry = geometry;
        self
    }

    /// Replace the spatial grid (e.g. to change cell size or tolerance).
    pub fn with_grid(mut self, grid: SpatialGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn style(&self) -> &dyn GraphStyle {
        self.style.as_ref()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn surface_size(&self) -> Size {
        (self.callbacks.surface_size)()
    }

    /// Recompute style-derived geometry, hand the graph to the simulation and
    /// re-index it for hit testing.
    pub fn apply_update(&mut self, options: UpdateOptions) {
        let mut graph = self.graph.borrow_mut();
        let change = GeometryChange {
            nodes: options.update_nodes,
            relationships: options.update_relationships,
        };
        self.geometry.on_graph_change(&mut graph, self.style.as_ref(), change);
        if options.update_nodes || options.update_relationships {
            self.simulation.update_graph(&graph);
        }
        if options.restart_simulation {
            self.simulation.restart();
        }
        self.grid.rebuild_grid(&graph);
        log::debug!(
            "Graph updated: {} nodes, {} relationships",
            graph.node_count(),
            graph.relationship_count()
        );
    }

    /// Advance the simulation and pan inertia by one frame.
    ///
    /// Returns true when anything moved. The grid is rebuilt once, on the
    /// tick where the simulation comes to rest.
    pub fn advance(&mut self) -> bool {
        let mut moved = self.camera.step_inertia();
        if self.simulation.is_running() {
            let mut graph = self.graph.borrow_mut();
            let running = self.simulation.tick(&mut graph);
            moved = true;
            if !running {
                self.grid.rebuild_grid(&graph);
                log::debug!("Simulation came to rest");
            }
        }
        moved
    }

    /// Recompute position-derived geometry for this tick.
    pub fn tick_geometry(&mut self) {
        let mut graph = self.graph.borrow_mut();
        self.geometry.on_tick(&mut graph);
    }

    pub fn precompute_and_start(&mut self) {
        {
            let mut graph = self.graph.borrow_mut();
            self.simulation.precompute_and_start(&mut graph);
            self.geometry.on_tick(&mut graph);
            self.grid.rebuild_grid(&graph);
        }
        if self.config.initial_zoom_to_fit && !self.fitted_once {
            self.fitted_once = true;
            self.zoom_to_fit();
        }
    }

    pub fn set_initial_zoom(&mut self) {
        let count = self.graph.borrow().node_count();
        let size = self.surface_size();
        self.camera.center_on_origin(initial_zoom_scale(count), size);
        self.notify_zoom_limits();
    }

    pub fn zoom_by_type(&mut self, zoom: ZoomType) {
        let size = self.surface_size();
        let centre = Point::new(size.width / 2.0, size.height / 2.0);
        match zoom {
            ZoomType::In => self.camera.zoom_at(centre, ZOOM_STEP),
            ZoomType::Out => self.camera.zoom_at(centre, 1.0 / ZOOM_STEP),
            ZoomType::Fit => {
                self.zoom_to_fit();
                return;
            }
        }
        self.notify_zoom_limits();
    }

    fn zoom_to_fit(&mut self) {
        let Some(bounds) = self.bounding_box() else {
            return;
        };
        let size = self.surface_size();
        self.camera.fit_to_bounds(bounds, size);
        self.notify_zoom_limits();
    }

    pub fn resize(&mut self, is_fullscreen: bool, wheel_zoom_requires_mod_key: bool) {
        self.config.is_fullscreen = is_fullscreen;
        self.config.wheel_zoom_requires_mod_key = wheel_zoom_requires_mod_key;
    }

    pub fn bounding_box(&self) -> Option<Rect> {
        self.graph.borrow().bounds()
    }

    pub fn hit_test(&self, screen_point: Point) -> Option<Hit> {
        self.grid
            .hit_test_at_zoom(self.camera.screen_to_world(screen_point), self.camera.zoom)
    }

    pub fn on(&mut self, kind: EventKind, listener: Listener) {
        self.events.on(kind, listener);
    }

    pub fn trigger(&mut self, event: &GraphEvent) {
        self.events.trigger(event);
    }

    fn notify_zoom_limits(&mut self) {
        let limits = self.camera.zoom_limits();
        (self.callbacks.on_zoom_limits)(limits);
        self.events.trigger(&GraphEvent::ZoomLimitsChanged(limits));
    }

    /// Route a pointer event through the interaction state machine.
    ///
    /// Events are delivered after the graph borrow is released.
    pub fn handle_pointer_event(&mut self, event: &PointerEvent, now: Instant) {
        if let PointerEvent::Wheel {
            position,
            delta,
            modifiers,
        } = event
        {
            if self.config.wheel_zoom_requires_mod_key && !modifiers.any_zoom_key() && !self.config.is_fullscreen {
                (self.callbacks.on_wheel_zoom_info)();
                return;
            }
            self.camera.zoom_at(*position, wheel_zoom_factor(*delta));
            self.notify_zoom_limits();
            return;
        }

        let mut outbox = Vec::new();
        {
            let mut graph = self.graph.borrow_mut();
            let mut ctx = InteractionContext {
                graph: &mut *graph,
                grid: &mut self.grid,
                simulation: self.simulation.as_mut(),
                camera: &mut self.camera,
                events: &mut outbox,
            };
            match event {
                PointerEvent::Down { position, button } => {
                    self.interaction.pointer_down(&mut ctx, *position, *button);
                }
                PointerEvent::Move { position } => self.interaction.pointer_move(&mut ctx, *position),
                PointerEvent::Up {
                    position,
                    button: MouseButton::Left,
                } => self.interaction.pointer_up(&mut ctx, *position, now),
                PointerEvent::Up { .. } => {}
                PointerEvent::Leave => self.interaction.pointer_leave(&mut ctx),
                PointerEvent::Wheel { .. } => {}
            }
        }
        for event in &outbox {
            self.events.trigger(event);
        }
    }

    /// Stop the simulation and drop every listener.
    pub fn shutdown(&mut self) {
        self.simulation.stop();
        self.interaction.reset();
        self.grid.clear();
        self.events.clear();
    }
}

impl std::fmt::Debug for GraphView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphView")
            .field("camera", &self.camera)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockSimulation, SimulationLog, two_node_graph};
    use graphview_core::camera::{ZOOM_MAX_SCALE, ZoomLimits};
    use graphview_core::graph::NodeId;
    use graphview_core::input::{Modifiers, MouseButton};
    use graphview_core::style::StaticStyle;
    use kurbo::Vec2;
    use std::cell::{Cell, RefCell};

    fn view(config: EngineConfig) -> (GraphView, Rc<RefCell<SimulationLog>>) {
        let (simulation, log) = MockSimulation::new();
        let view = GraphView::new(
            two_node_graph().shared(),
            Rc::new(StaticStyle::new()),
            Box::new(simulation),
            config,
            EngineCallbacks::new(|| Size::new(800.0, 600.0)),
        );
        (view, log)
    }

    #[test]
    fn test_update_registers_graph() {
        let (mut view, log) = view(EngineConfig::default());
        view.apply_update(UpdateOptions::all());
        assert_eq!(log.borrow().updates, 1);
        assert_eq!(log.borrow().restarts, 1);
        assert!(view.hit_test(Point::new(0.0, 0.0)).is_some());
    }

    #[test]
    fn test_initial_zoom_centres_origin() {
        let (mut view, _) = view(EngineConfig::default());
        view.set_initial_zoom();
        assert!((view.camera().zoom - initial_zoom_scale(2)).abs() < 1e-12);
        let centre = view.camera().world_to_screen(Point::ZERO);
        assert!((centre.x - 400.0).abs() < 1e-9 && (centre.y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_limits_reported() {
        let (simulation, _) = MockSimulation::new();
        let seen = Rc::new(Cell::new(ZoomLimits::default()));
        let sink = Rc::clone(&seen);
        let mut view = GraphView::new(
            two_node_graph().shared(),
            Rc::new(StaticStyle::new()),
            Box::new(simulation),
            EngineConfig::default(),
            EngineCallbacks::new(|| Size::new(800.0, 600.0)).with_zoom_limits(move |limits| sink.set(limits)),
        );
        for _ in 0..10 {
            view.zoom_by_type(ZoomType::In);
        }
        assert!((view.camera().zoom - ZOOM_MAX_SCALE).abs() < f64::EPSILON);
        assert!(seen.get().zoom_in_limit_reached);
    }

    #[test]
    fn test_precompute_fits_once() {
        let (mut view, log) = view(EngineConfig::default());
        view.apply_update(UpdateOptions::all());
        view.precompute_and_start();
        // Node bounds are 250 x 50, so the fit hits the zoom ceiling.
        let fitted = view.camera().zoom;
        assert!((fitted - ZOOM_MAX_SCALE).abs() < f64::EPSILON);
        view.zoom_by_type(ZoomType::Out);
        view.precompute_and_start();
        assert!(view.camera().zoom < fitted);
        assert_eq!(log.borrow().precomputes, 2);
    }

    #[test]
    fn test_wheel_zoom_requires_modifier() {
        let (simulation, _) = MockSimulation::new();
        let hints = Rc::new(Cell::new(0));
        let sink = Rc::clone(&hints);
        let mut view = GraphView::new(
            two_node_graph().shared(),
            Rc::new(StaticStyle::new()),
            Box::new(simulation),
            EngineConfig::default().with_wheel_zoom_requires_mod_key(true),
            EngineCallbacks::new(|| Size::new(800.0, 600.0)).with_wheel_zoom_info(move || sink.set(sink.get() + 1)),
        );
        let wheel = |modifiers| PointerEvent::Wheel {
            position: Point::new(10.0, 10.0),
            delta: Vec2::new(0.0, -100.0),
            modifiers,
        };
        let now = Instant::now();

        view.handle_pointer_event(&wheel(Modifiers::default()), now);
        assert_eq!(hints.get(), 1);
        assert!((view.camera().zoom - 1.0).abs() < f64::EPSILON);

        view.handle_pointer_event(&wheel(Modifiers { ctrl: true, ..Default::default() }), now);
        assert!(view.camera().zoom > 1.0);

        // Fullscreen lifts the modifier requirement.
        view.resize(true, true);
        let zoom = view.camera().zoom;
        view.handle_pointer_event(&wheel(Modifiers::default()), now);
        assert!(view.camera().zoom > zoom);
        assert_eq!(hints.get(), 1);
    }

    #[test]
    fn test_listeners_may_read_graph() {
        let (mut view, _) = view(EngineConfig::default());
        view.apply_update(UpdateOptions::all());
        let graph = Rc::clone(view.graph());
        let radius = Rc::new(Cell::new(0.0));
        let sink = Rc::clone(&radius);
        view.on(
            EventKind::NodeClicked,
            Box::new(move |event| {
                if let GraphEvent::NodeClicked(id) = event {
                    let graph = graph.borrow();
                    sink.set(graph.node(id).map_or(0.0, |n| n.radius));
                }
            }),
        );
        let now = Instant::now();
        let at = Point::new(0.0, 0.0);
        view.handle_pointer_event(&PointerEvent::Down { position: at, button: MouseButton::Left }, now);
        view.handle_pointer_event(&PointerEvent::Up { position: at, button: MouseButton::Left }, now);
        assert!((radius.get() - 25.0).abs() < f64::EPSILON);
        assert!(view.graph().borrow().node(&NodeId::from("a")).is_some());
    }

    #[test]
    fn test_advance_rebuilds_grid_at_rest() {
        let (mut view, log) = view(EngineConfig::default());
        view.apply_update(UpdateOptions::all());
        log.borrow_mut().remaining_ticks = 2;
        log.borrow_mut().shift = Vec2::new(1000.0, 0.0);
        assert!(view.advance());
        // Mid-run the grid still reflects the old positions.
        assert!(view.hit_test(Point::new(0.0, 0.0)).is_some());
        assert!(view.advance());
        assert!(view.hit_test(Point::new(0.0, 0.0)).is_none());
        assert!(!view.advance());
    }
}
