//! Hand-written collaborators shared by the renderer tests.

use crate::text_cache::{OVERSAMPLING, TextKey, TextRasterizer, TextTexture};
use graphview_core::graph::{GraphModel, Node, Relationship};
use graphview_core::simulation::ForceSimulation;
use kurbo::{Point, Vec2};
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

/// What the mock simulation was asked to do.
#[derive(Debug, Default)]
pub struct SimulationLog {
    pub updates: usize,
    pub restarts: usize,
    pub reheats: usize,
    pub settles: usize,
    pub precomputes: usize,
    pub ticks: usize,
    /// Ticks left before the simulation reports rest.
    pub remaining_ticks: usize,
    /// Offset applied to every unpinned node per tick.
    pub shift: Vec2,
    pub stopped: bool,
}

pub struct MockSimulation {
    log: Rc<RefCell<SimulationLog>>,
}

impl MockSimulation {
    pub fn new() -> (Self, Rc<RefCell<SimulationLog>>) {
        let log = Rc::new(RefCell::new(SimulationLog::default()));
        (Self { log: Rc::clone(&log) }, log)
    }
}

impl ForceSimulation for MockSimulation {
    fn update_graph(&mut self, _graph: &GraphModel) {
        self.log.borrow_mut().updates += 1;
    }

    fn reheat(&mut self, _alpha_target: f64) {
        self.log.borrow_mut().reheats += 1;
    }

    fn restart(&mut self) {
        self.log.borrow_mut().restarts += 1;
    }

    fn settle(&mut self) {
        self.log.borrow_mut().settles += 1;
    }

    fn precompute_and_start(&mut self, _graph: &mut GraphModel) {
        self.log.borrow_mut().precomputes += 1;
    }

    fn tick(&mut self, graph: &mut GraphModel) -> bool {
        let mut log = self.log.borrow_mut();
        log.ticks += 1;
        let shift = log.shift;
        for node in graph.nodes_mut() {
            if !node.is_pinned() {
                node.position += shift;
            }
        }
        log.remaining_ticks = log.remaining_ticks.saturating_sub(1);
        log.remaining_ticks > 0
    }

    fn is_running(&self) -> bool {
        self.log.borrow().remaining_ticks > 0
    }

    fn stop(&mut self) {
        let mut log = self.log.borrow_mut();
        log.stopped = true;
        log.remaining_ticks = 0;
    }
}

/// Rasterizes every char as a font-size square, counting calls.
pub struct StubRasterizer<T> {
    calls: Rc<Cell<usize>>,
    oversampling: f64,
    texture: PhantomData<T>,
}

impl<T: Default> StubRasterizer<T> {
    pub fn new() -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        (
            Self {
                calls: Rc::clone(&calls),
                oversampling: OVERSAMPLING,
                texture: PhantomData,
            },
            calls,
        )
    }

    pub fn with_oversampling(mut self, oversampling: f64) -> Self {
        self.oversampling = oversampling;
        self
    }
}

impl<T: Default> TextRasterizer for StubRasterizer<T> {
    type Texture = T;

    fn rasterize(&mut self, key: &TextKey, scale: f64, padding: f64) -> TextTexture<T> {
        self.calls.set(self.calls.get() + 1);
        let size = key.font_size_px() * scale;
        let chars = key.text.chars().count() as f64;
        TextTexture {
            texture: T::default(),
            width: chars * size + 2.0 * padding,
            height: size + 2.0 * padding,
            baseline: padding + size * 0.8,
        }
    }

    fn oversampling(&self) -> f64 {
        self.oversampling
    }
}

/// Nodes `a` at the origin and `b` at (200, 0), joined by `ab`.
pub fn two_node_graph() -> GraphModel {
    let mut graph = GraphModel::new();
    graph
        .add_nodes([
            Node::new("a").with_position(Point::new(0.0, 0.0)),
            Node::new("b").with_position(Point::new(200.0, 0.0)),
        ])
        .unwrap();
    graph
        .add_relationships([Relationship::new("ab", "KNOWS", "a", "b")])
        .unwrap();
    graph
}

#[cfg(feature = "vello-renderer")]
pub use surface::{MockSurface, SurfaceLog, SurfaceMode};

#[cfg(feature = "vello-renderer")]
mod surface {
    use crate::renderer::{RenderResult, RendererError};
    use crate::vello_impl::RenderSurface;
    use futures::channel::oneshot;
    use kurbo::Size;
    use peniko::Color;
    use std::cell::RefCell;
    use std::rc::Rc;
    use vello::Scene;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SurfaceMode {
        /// The context is ready as soon as it is requested.
        Immediate,
        /// The test resolves the context through [`SurfaceLog::sender`].
        Deferred,
        /// The context request fails.
        Fail,
    }

    #[derive(Default)]
    pub struct SurfaceLog {
        pub requests: usize,
        pub presents: usize,
        pub released: bool,
        pub sender: Option<oneshot::Sender<RenderResult<()>>>,
        /// Error returned by every present while set.
        pub present_error: Option<RendererError>,
    }

    pub struct MockSurface {
        mode: SurfaceMode,
        log: Rc<RefCell<SurfaceLog>>,
    }

    impl MockSurface {
        pub fn new(mode: SurfaceMode) -> (Self, Rc<RefCell<SurfaceLog>>) {
            let log = Rc::new(RefCell::new(SurfaceLog::default()));
            (Self { mode, log: Rc::clone(&log) }, log)
        }
    }

    impl RenderSurface for MockSurface {
        fn request_context(&mut self) -> oneshot::Receiver<RenderResult<()>> {
            let (tx, rx) = oneshot::channel();
            let mut log = self.log.borrow_mut();
            log.requests += 1;
            match self.mode {
                SurfaceMode::Immediate => {
                    let _ = tx.send(Ok(()));
                }
                SurfaceMode::Fail => {
                    let _ = tx.send(Err(RendererError::InitFailed("no adapter".into())));
                }
                SurfaceMode::Deferred => log.sender = Some(tx),
            }
            rx
        }

        fn present(&mut self, _scene: &Scene, _base_color: Color, _size: Size) -> RenderResult<()> {
            let mut log = self.log.borrow_mut();
            log.presents += 1;
            match log.present_error.clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        fn release(&mut self) {
            self.log.borrow_mut().released = true;
        }
    }
}
