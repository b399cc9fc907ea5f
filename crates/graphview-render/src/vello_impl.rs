//! Vello-based renderer implementation.
//!
//! The engine keeps one retained bundle per node and relationship and
//! re-encodes them into a fresh [`Scene`] every tick. GPU setup is
//! asynchronous: the surface hands back a one-shot receiver that [`poll`]
//! checks without blocking. Calls made before the context is ready are
//! queued and replayed in order once it is.
//!
//! [`poll`]: RenderEngine::poll

use crate::graphics::{NodeGraphicsManager, RelationshipGraphicsManager};
use crate::parley_text::ParleyRasterizer;
use crate::renderer::{RenderEngine, RenderResult, RendererError, UpdateOptions, ZoomType};
use crate::text_cache::{TextCache, TextRasterizer};
use crate::view::GraphView;
use futures::channel::oneshot;
use graphview_core::events::{EventKind, GraphEvent, Listener};
use graphview_core::input::PointerEvent;
use graphview_core::spatial::Hit;
use graphview_core::style::RelationshipStyleCache;
use kurbo::{Point, Rect, Size};
use peniko::Color;
use std::rc::Rc;
use vello::Scene;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// GPU side of the Vello engine: context acquisition and frame presentation.
pub trait RenderSurface {
    /// Start acquiring the GPU context. The receiver resolves once the
    /// context is usable or has failed.
    fn request_context(&mut self) -> oneshot::Receiver<RenderResult<()>>;

    /// Render `scene` to the surface at `size` logical pixels.
    fn present(&mut self, scene: &Scene, base_color: Color, size: Size) -> RenderResult<()>;

    /// Drop every GPU resource.
    fn release(&mut self);
}

/// Observable lifecycle state of a [`VelloEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    /// Initialization failed or the context was lost; the engine is inert.
    Failed,
    /// Destroyed while initializing; waiting for the context request to settle.
    TearingDown,
    Destroyed,
}

enum Lifecycle {
    Uninitialized,
    Initializing(oneshot::Receiver<RenderResult<()>>),
    Ready,
    Failed,
    TearingDown(oneshot::Receiver<RenderResult<()>>),
    Destroyed,
}

/// A call deferred until the context is ready.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingOp {
    Build,
    Update(UpdateOptions),
    SetInitialZoom,
    PrecomputeAndStart,
    Zoom(ZoomType),
}

pub struct VelloEngine {
    view: GraphView,
    surface: Box<dyn RenderSurface>,
    text: TextCache<Scene>,
    nodes: NodeGraphicsManager,
    relationships: RelationshipGraphicsManager,
    rel_styles: RelationshipStyleCache,
    scene: Scene,
    background: Color,
    lifecycle: Lifecycle,
    pending: Vec<PendingOp>,
    last_error: Option<RendererError>,
}

impl VelloEngine {
    /// Create an engine that lays captions out with Parley.
    pub fn new(view: GraphView, surface: Box<dyn RenderSurface>) -> Self {
        Self::with_rasterizer(view, surface, Box::new(ParleyRasterizer::new()))
    }

    pub fn with_rasterizer(
        view: GraphView,
        surface: Box<dyn RenderSurface>,
        rasterizer: Box<dyn TextRasterizer<Texture = Scene>>,
    ) -> Self {
        Self {
            view,
            surface,
            text: TextCache::new(rasterizer),
            nodes: NodeGraphicsManager::new(),
            relationships: RelationshipGraphicsManager::new(),
            rel_styles: RelationshipStyleCache::new(),
            scene: Scene::new(),
            background: Color::WHITE,
            lifecycle: Lifecycle::Uninitialized,
            pending: Vec::new(),
            last_error: None,
        }
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    pub fn state(&self) -> EngineState {
        match self.lifecycle {
            Lifecycle::Uninitialized => EngineState::Uninitialized,
            Lifecycle::Initializing(_) => EngineState::Initializing,
            Lifecycle::Ready => EngineState::Ready,
            Lifecycle::Failed => EngineState::Failed,
            Lifecycle::TearingDown(_) => EngineState::TearingDown,
            Lifecycle::Destroyed => EngineState::Destroyed,
        }
    }

    /// The error that made the engine inert, if any.
    pub fn last_error(&self) -> Option<&RendererError> {
        self.last_error.as_ref()
    }

    pub fn view(&self) -> &GraphView {
        &self.view
    }

    pub fn node_graphics(&self) -> &NodeGraphicsManager {
        &self.nodes
    }

    pub fn relationship_graphics(&self) -> &RelationshipGraphicsManager {
        &self.relationships
    }

    /// The most recently encoded frame.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    fn is_ready(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Ready)
    }

    fn dispatch(&mut self, op: PendingOp) {
        match self.lifecycle {
            Lifecycle::Ready => self.apply(op),
            Lifecycle::Uninitialized | Lifecycle::Initializing(_) => {
                log::debug!("Deferring {op:?} until the GPU context is ready");
                self.pending.push(op);
            }
            _ => log::trace!("Ignoring {op:?} on an inert renderer"),
        }
    }

    fn apply(&mut self, op: PendingOp) {
        match op {
            PendingOp::Build => {
                let options = UpdateOptions::default().with_nodes(true).with_relationships(true);
                self.rebuild(options);
            }
            PendingOp::Update(options) => {
                self.rebuild(options);
                self.view.trigger(&GraphEvent::Updated);
            }
            PendingOp::SetInitialZoom => self.view.set_initial_zoom(),
            PendingOp::PrecomputeAndStart => {
                self.view.precompute_and_start();
                self.refresh_positions();
                self.render_frame();
            }
            PendingOp::Zoom(zoom) => {
                self.view.zoom_by_type(zoom);
                self.render_frame();
            }
        }
    }

    fn rebuild(&mut self, options: UpdateOptions) {
        self.view.apply_update(options);
        if options.update_relationships {
            self.rel_styles.clear();
        }

        let graph = Rc::clone(self.view.graph());
        {
            let graph = graph.borrow();
            self.nodes.retain(|id| graph.node(id).is_some());
            self.relationships.retain(|id| graph.relationship(id).is_some());

            if options.update_nodes {
                for node in graph.nodes() {
                    let style = self.view.style().for_node(node);
                    self.nodes.update_node(node, &style, &mut self.text);
                }
            }
            if options.update_relationships {
                for rel in graph.relationships() {
                    let Some(source) = graph.node(&rel.source) else {
                        continue;
                    };
                    let style = self.rel_styles.get(self.view.style(), rel);
                    self.relationships
                        .update_relationship(rel, source.position, &style, &mut self.text);
                }
            }
        }
        self.render_frame();
    }

    fn refresh_positions(&mut self) {
        let graph = Rc::clone(self.view.graph());
        let graph = graph.borrow();
        self.nodes.update_all_positions(graph.nodes());
        self.relationships.update_all_positions(&graph, &mut self.text);
    }

    /// Encode every bundle, relationships below nodes, and present the frame.
    fn render_frame(&mut self) {
        self.scene.reset();
        let view = self.view.camera().transform();
        {
            let graph = self.view.graph().borrow();
            for rel in graph.relationships() {
                if let Some(bundle) = self.relationships.get(&rel.id) {
                    bundle.encode(&mut self.scene, view);
                }
            }
            for node in graph.nodes() {
                if let Some(bundle) = self.nodes.get(&node.id) {
                    bundle.encode(&mut self.scene, view);
                }
            }
        }

        let size = self.view.surface_size();
        match self.surface.present(&self.scene, self.background, size) {
            Ok(()) => {}
            Err(err @ RendererError::ContextLost(_)) => self.fail(err),
            Err(err) => log::warn!("Frame dropped: {err}"),
        }
    }

    fn fail(&mut self, err: RendererError) {
        log::error!("Graph renderer disabled: {err}");
        self.pending.clear();
        self.surface.release();
        self.lifecycle = Lifecycle::Failed;
        self.last_error = Some(err);
    }

    fn finish_init(&mut self) {
        self.lifecycle = Lifecycle::Ready;
        log::info!("GPU context ready, replaying {} deferred calls", self.pending.len());
        for op in std::mem::take(&mut self.pending) {
            if !self.is_ready() {
                break;
            }
            self.apply(op);
        }
    }

    fn finish_destroy(&mut self) {
        self.view.shutdown();
        self.nodes.clear();
        self.relationships.clear();
        self.rel_styles.clear();
        self.text.clear();
        self.scene.reset();
        self.pending.clear();
        self.surface.release();
        self.lifecycle = Lifecycle::Destroyed;
        log::debug!("Graph renderer destroyed");
    }
}

impl RenderEngine for VelloEngine {
    fn init(&mut self) {
        if !matches!(self.lifecycle, Lifecycle::Uninitialized) {
            return;
        }
        log::debug!("Requesting GPU context");
        // Initial graphics come before anything the host queued earlier.
        self.pending.insert(0, PendingOp::SetInitialZoom);
        self.pending.insert(0, PendingOp::Build);
        self.lifecycle = Lifecycle::Initializing(self.surface.request_context());
        self.poll();
    }

    fn update(&mut self, options: UpdateOptions) {
        self.dispatch(PendingOp::Update(options));
    }

    fn set_initial_zoom(&mut self) {
        self.dispatch(PendingOp::SetInitialZoom);
    }

    fn precompute_and_start(&mut self) {
        self.dispatch(PendingOp::PrecomputeAndStart);
    }

    fn zoom_by_type(&mut self, zoom: ZoomType) {
        self.dispatch(PendingOp::Zoom(zoom));
    }

    fn resize(&mut self, is_fullscreen: bool, wheel_zoom_requires_mod_key: bool) {
        self.view.resize(is_fullscreen, wheel_zoom_requires_mod_key);
    }

    fn bounding_box(&self) -> Option<Rect> {
        self.view.bounding_box()
    }

    fn on(&mut self, kind: EventKind, listener: Listener) {
        self.view.on(kind, listener);
    }

    fn trigger(&mut self, event: &GraphEvent) {
        self.view.trigger(event);
    }

    fn on_tick(&mut self) {
        self.poll();
        if !self.is_ready() {
            return;
        }
        self.view.advance();
        self.view.tick_geometry();
        self.refresh_positions();
        self.render_frame();
    }

    fn handle_pointer_event(&mut self, event: &PointerEvent, now: Instant) {
        if self.is_ready() {
            self.view.handle_pointer_event(event, now);
        }
    }

    fn hit_test(&self, screen_point: Point) -> Option<Hit> {
        self.view.hit_test(screen_point)
    }

    fn poll(&mut self) {
        match &mut self.lifecycle {
            Lifecycle::Initializing(rx) => match rx.try_recv() {
                Ok(None) => {}
                Ok(Some(Ok(()))) => self.finish_init(),
                Ok(Some(Err(err))) => self.fail(err),
                Err(oneshot::Canceled) => {
                    self.fail(RendererError::InitFailed("context request dropped".into()));
                }
            },
            Lifecycle::TearingDown(rx) => {
                if !matches!(rx.try_recv(), Ok(None)) {
                    self.finish_destroy();
                }
            }
            _ => {}
        }
    }

    fn destroy(&mut self) {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Destroyed) {
            Lifecycle::Initializing(rx) => {
                log::debug!("Destroy requested during initialization");
                self.pending.clear();
                self.lifecycle = Lifecycle::TearingDown(rx);
                self.poll();
            }
            Lifecycle::TearingDown(rx) => self.lifecycle = Lifecycle::TearingDown(rx),
            Lifecycle::Destroyed => {}
            Lifecycle::Uninitialized | Lifecycle::Ready | Lifecycle::Failed => self.finish_destroy(),
        }
    }
}

impl std::fmt::Debug for VelloEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VelloEngine")
            .field("state", &self.state())
            .field("nodes", &self.nodes.len())
            .field("relationships", &self.relationships.len())
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{EngineCallbacks, EngineConfig};
    use crate::test_support::{
        MockSimulation, MockSurface, SimulationLog, StubRasterizer, SurfaceLog, SurfaceMode, two_node_graph,
    };
    use graphview_core::graph::{GraphModel, NodeId, RelationshipId, SharedGraph};
    use graphview_core::input::MouseButton;
    use graphview_core::style::StaticStyle;
    use std::cell::RefCell;

    struct Fixture {
        engine: VelloEngine,
        graph: SharedGraph,
        simulation: Rc<RefCell<SimulationLog>>,
        surface: Rc<RefCell<SurfaceLog>>,
    }

    fn fixture(graph: GraphModel, mode: SurfaceMode) -> Fixture {
        let graph = graph.shared();
        let (simulation, simulation_log) = MockSimulation::new();
        let (surface, surface_log) = MockSurface::new(mode);
        let (rasterizer, _) = StubRasterizer::<Scene>::new();
        let view = GraphView::new(
            Rc::clone(&graph),
            Rc::new(StaticStyle::new()),
            Box::new(simulation),
            EngineConfig::default(),
            EngineCallbacks::new(|| Size::new(800.0, 600.0)),
        );
        Fixture {
            engine: VelloEngine::with_rasterizer(view, Box::new(surface), Box::new(rasterizer)),
            graph,
            simulation: simulation_log,
            surface: surface_log,
        }
    }

    fn start(engine: &mut VelloEngine) {
        engine.init();
        engine.update(UpdateOptions::all());
        engine.set_initial_zoom();
        engine.precompute_and_start();
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut f = fixture(two_node_graph(), SurfaceMode::Immediate);
        f.engine.init();
        f.engine.init();
        assert_eq!(f.engine.state(), EngineState::Ready);
        assert_eq!(f.surface.borrow().requests, 1);
        assert_eq!(f.engine.node_graphics().len(), 2);
        assert_eq!(f.engine.relationship_graphics().len(), 1);
        assert_eq!(f.simulation.borrow().updates, 1);
        assert!(f.surface.borrow().presents > 0);
    }

    #[test]
    fn test_bundles_match_entities() {
        let mut f = fixture(two_node_graph(), SurfaceMode::Immediate);
        start(&mut f.engine);
        assert_eq!(f.engine.node_graphics().len(), 2);
        assert_eq!(f.engine.relationship_graphics().len(), 1);

        f.graph.borrow_mut().remove_node(&NodeId::from("b"));
        f.engine.update(UpdateOptions::all());
        let mut ids: Vec<_> = f.engine.node_graphics().ids().cloned().collect();
        ids.sort();
        assert_eq!(ids, vec![NodeId::from("a")]);
        assert!(f.engine.relationship_graphics().is_empty());
    }

    #[test]
    fn test_empty_graph() {
        let mut f = fixture(GraphModel::new(), SurfaceMode::Immediate);
        start(&mut f.engine);
        f.engine.zoom_by_type(ZoomType::Fit);
        f.engine.on_tick();
        assert!(f.engine.bounding_box().is_none());
        assert!(f.engine.hit_test(Point::new(400.0, 300.0)).is_none());
        assert!(f.engine.node_graphics().is_empty());
        assert_eq!(f.engine.state(), EngineState::Ready);
    }

    #[test]
    fn test_drag_moves_node_and_relationship() {
        let mut f = fixture(two_node_graph(), SurfaceMode::Immediate);
        start(&mut f.engine);
        let camera = f.engine.view().camera().clone();
        let start = camera.world_to_screen(Point::ZERO);
        let end = start + kurbo::Vec2::new(50.0, 0.0);
        let now = Instant::now();

        f.engine
            .handle_pointer_event(&PointerEvent::Down { position: start, button: MouseButton::Left }, now);
        f.engine.handle_pointer_event(&PointerEvent::Move { position: end }, now);
        f.engine.on_tick();

        let dropped = camera.screen_to_world(end);
        let a = f.graph.borrow().node(&NodeId::from("a")).unwrap().position;
        assert!((a - dropped).hypot() < 1e-9);
        let rel = f.engine.relationship_graphics().get(&RelationshipId::from("ab")).unwrap();
        assert!((rel.transform * Point::ZERO - a).hypot() < 1e-9);
        let b = f.engine.node_graphics().get(&NodeId::from("b")).unwrap();
        assert_eq!(b.position(), Point::new(200.0, 0.0));
        assert_eq!(f.simulation.borrow().reheats, 1);
    }

    #[test]
    fn test_deferred_init_replays_pending_calls() {
        let mut f = fixture(two_node_graph(), SurfaceMode::Deferred);
        let updates = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&updates);
        f.engine.on(EventKind::Updated, Box::new(move |_| *sink.borrow_mut() += 1));

        start(&mut f.engine);
        f.engine.on_tick();
        assert_eq!(f.engine.state(), EngineState::Initializing);
        assert!(f.engine.node_graphics().is_empty());
        assert_eq!(f.simulation.borrow().updates, 0);
        assert_eq!(f.surface.borrow().presents, 0);

        let sender = f.surface.borrow_mut().sender.take().unwrap();
        sender.send(Ok(())).unwrap();
        f.engine.poll();

        assert_eq!(f.engine.state(), EngineState::Ready);
        assert_eq!(f.engine.node_graphics().len(), 2);
        assert_eq!(f.simulation.borrow().updates, 2);
        assert_eq!(f.simulation.borrow().precomputes, 1);
        assert_eq!(*updates.borrow(), 1);
        assert!(f.surface.borrow().presents > 0);
    }

    #[test]
    fn test_init_failure_is_inert() {
        let mut f = fixture(two_node_graph(), SurfaceMode::Fail);
        start(&mut f.engine);
        f.engine.on_tick();
        assert_eq!(f.engine.state(), EngineState::Failed);
        assert!(matches!(f.engine.last_error(), Some(RendererError::InitFailed(_))));
        assert!(f.engine.node_graphics().is_empty());
        assert_eq!(f.surface.borrow().presents, 0);

        f.engine.update(UpdateOptions::all());
        assert!(f.engine.node_graphics().is_empty());
    }

    #[test]
    fn test_context_loss_disables_renderer() {
        let mut f = fixture(two_node_graph(), SurfaceMode::Immediate);
        start(&mut f.engine);
        f.surface.borrow_mut().present_error = Some(RendererError::ContextLost("device removed".into()));
        f.engine.on_tick();
        assert_eq!(f.engine.state(), EngineState::Failed);
        assert!(f.surface.borrow().released);

        let presents = f.surface.borrow().presents;
        f.engine.on_tick();
        assert_eq!(f.surface.borrow().presents, presents);
    }

    #[test]
    fn test_surface_error_is_not_fatal() {
        let mut f = fixture(two_node_graph(), SurfaceMode::Immediate);
        start(&mut f.engine);
        f.surface.borrow_mut().present_error = Some(RendererError::Surface("timeout".into()));
        f.engine.on_tick();
        assert_eq!(f.engine.state(), EngineState::Ready);
    }

    #[test]
    fn test_destroy_during_init_waits_for_context() {
        let mut f = fixture(two_node_graph(), SurfaceMode::Deferred);
        f.engine.init();
        f.engine.update(UpdateOptions::all());
        f.engine.destroy();
        assert_eq!(f.engine.state(), EngineState::TearingDown);
        assert!(!f.surface.borrow().released);

        let sender = f.surface.borrow_mut().sender.take().unwrap();
        sender.send(Ok(())).unwrap();
        f.engine.poll();
        assert_eq!(f.engine.state(), EngineState::Destroyed);
        assert!(f.surface.borrow().released);
        assert_eq!(f.simulation.borrow().updates, 0);
        assert!(f.simulation.borrow().stopped);
    }

    #[test]
    fn test_destroy_after_dropped_request() {
        let mut f = fixture(two_node_graph(), SurfaceMode::Deferred);
        f.engine.init();
        f.engine.destroy();
        drop(f.surface.borrow_mut().sender.take());
        f.engine.poll();
        assert_eq!(f.engine.state(), EngineState::Destroyed);
    }
}
