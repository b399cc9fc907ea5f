//! Pointer interaction state machine: drag vs click vs double-click vs hover.
//!
//! Every transition runs against an [`InteractionContext`] borrowed from the
//! renderer for the duration of one pointer event. Callers pass the release
//! time to [`InteractionState::pointer_up`] so the double-click window can be
//! exercised deterministically.

use crate::camera::Camera;
use crate::events::GraphEvent;
use crate::graph::{GraphModel, NodeId, PinReason, RelationshipId};
use crate::input::MouseButton;
use crate::simulation::{DRAG_ALPHA_TARGET, ForceSimulation};
use crate::spatial::{Hit, SpatialGrid};
use kurbo::{Point, Vec2};
use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Squared screen distance a press may travel and still count as a click.
pub const DRAG_TOLERANCE_SQ: f64 = 25.0;
/// Two clicks on the same node within this window form a double click.
pub const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(300);

/// Everything a pointer transition may read or mutate.
///
/// Events are collected in `events` and delivered by the caller once the
/// graph borrow is released, so listeners may read the model.
pub struct InteractionContext<'a> {
    pub graph: &'a mut GraphModel,
    pub grid: &'a mut SpatialGrid,
    pub simulation: &'a mut dyn ForceSimulation,
    pub camera: &'a mut Camera,
    pub events: &'a mut Vec<GraphEvent>,
}

/// Node press in progress.
#[derive(Debug, Clone)]
struct NodeDrag {
    node: NodeId,
    start_screen: Point,
    /// Offset from the pointer to the node centre, in world units.
    grab_offset: Vec2,
    /// Node centre at press time, restored on a plain click.
    start_position: Point,
    /// Pin held before the press, restored on a plain click.
    previous_pin: (PinReason, Option<Point>),
    /// Set once the pointer left the tolerance and the simulation was reheated.
    perturbed: bool,
}

#[derive(Debug, Clone, Default)]
enum Gesture {
    #[default]
    Idle,
    Drag(NodeDrag),
    /// Press on empty canvas; becomes a pan once it leaves the tolerance.
    Canvas { start_screen: Point, moved: bool },
}

/// Currently hovered entity. Node and relationship hover are exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Hover {
    Node(NodeId),
    Relationship(RelationshipId),
}

/// Interaction state of one renderer.
#[derive(Debug, Default)]
pub struct InteractionState {
    gesture: Gesture,
    hover: Option<Hover>,
    last_click: Option<(NodeId, Instant)>,
}

impl InteractionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node currently being pressed or dragged.
    pub fn dragged_node(&self) -> Option<&NodeId> {
        match &self.gesture {
            Gesture::Drag(drag) => Some(&drag.node),
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(&self.gesture, Gesture::Drag(drag) if drag.perturbed)
    }

    pub fn hovered_node(&self) -> Option<&NodeId> {
        match &self.hover {
            Some(Hover::Node(id)) => Some(id),
            _ => None,
        }
    }

    pub fn hovered_relationship(&self) -> Option<&RelationshipId> {
        match &self.hover {
            Some(Hover::Relationship(id)) => Some(id),
            _ => None,
        }
    }

    pub fn pointer_down(&mut self, ctx: &mut InteractionContext<'_>, screen: Point, button: MouseButton) {
        if button != MouseButton::Left {
            return;
        }
        let world = ctx.camera.screen_to_world(screen);
        match ctx.grid.hit_test_at_zoom(world, ctx.camera.zoom) {
            Some(Hit::Node(id)) => {
                self.clear_hover(ctx);
                let Some(node) = ctx.graph.node_mut(&id) else {
                    return;
                };
                let previous_pin = (node.pin_reason(), node.fixed_position());
                let position = node.position;
                // An external pin keeps its owner; the node still follows the pointer.
                if node.pin_reason() != PinReason::External {
                    node.pin(PinReason::Drag, position);
                }
                ctx.camera.set_drag_paused(true);
                log::debug!("Press on node {id}");
                self.gesture = Gesture::Drag(NodeDrag {
                    node: id,
                    start_screen: screen,
                    grab_offset: position - world,
                    start_position: position,
                    previous_pin,
                    perturbed: false,
                });
            }
            Some(Hit::Relationship(id)) => {
                self.gesture = Gesture::Idle;
                ctx.events.push(GraphEvent::RelationshipClicked(id));
            }
            None => {
                ctx.camera.begin_pan(screen);
                self.gesture = Gesture::Canvas {
                    start_screen: screen,
                    moved: false,
                };
            }
        }
    }

    pub fn pointer_move(&mut self, ctx: &mut InteractionContext<'_>, screen: Point) {
        match &mut self.gesture {
            Gesture::Drag(drag) => {
                // The simulation is only reheated once the press leaves the tolerance.
                if !drag.perturbed && (screen - drag.start_screen).hypot2() > DRAG_TOLERANCE_SQ {
                    drag.perturbed = true;
                    ctx.simulation.reheat(DRAG_ALPHA_TARGET);
                    log::debug!("Dragging node {}", drag.node);
                }
                let target = ctx.camera.screen_to_world(screen) + drag.grab_offset;
                if let Some(node) = ctx.graph.node_mut(&drag.node) {
                    node.move_pin(target);
                }
            }
            Gesture::Canvas { start_screen, moved } => {
                if !*moved && (screen - *start_screen).hypot2() > DRAG_TOLERANCE_SQ {
                    *moved = true;
                }
                ctx.camera.drag_pan(screen);
            }
            Gesture::Idle => {
                let world = ctx.camera.screen_to_world(screen);
                let hover = ctx.grid.hit_test_at_zoom(world, ctx.camera.zoom).map(|hit| match hit {
                    Hit::Node(id) => Hover::Node(id),
                    Hit::Relationship(id) => Hover::Relationship(id),
                });
                if hover != self.hover {
                    self.clear_hover(ctx);
                    if let Some(hover) = hover {
                        self.enter_hover(ctx, hover);
                    }
                }
            }
        }
    }

    pub fn pointer_up(&mut self, ctx: &mut InteractionContext<'_>, screen: Point, now: Instant) {
        match std::mem::take(&mut self.gesture) {
            Gesture::Drag(drag) => {
                ctx.camera.set_drag_paused(false);
                if drag.perturbed {
                    // Dropped: the node stays pinned where it was released.
                    ctx.simulation.settle();
                    ctx.grid.rebuild_grid(ctx.graph);
                    return;
                }
                if let Some(node) = ctx.graph.node_mut(&drag.node) {
                    node.position = drag.start_position;
                    match drag.previous_pin {
                        (reason, Some(at)) => node.pin(reason, at),
                        (_, None) => node.clear_pin(),
                    }
                }
                self.click_node(ctx, drag.node, now);
            }
            Gesture::Canvas { moved, .. } => {
                ctx.camera.end_pan();
                if moved {
                    return;
                }
                self.click_canvas(ctx, screen);
            }
            Gesture::Idle => self.click_canvas(ctx, screen),
        }
    }

    /// The pointer left the drawing surface.
    pub fn pointer_leave(&mut self, ctx: &mut InteractionContext<'_>) {
        self.clear_hover(ctx);
    }

    /// Forget all gesture and hover state without emitting events.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn click_canvas(&mut self, ctx: &mut InteractionContext<'_>, screen: Point) {
        let world = ctx.camera.screen_to_world(screen);
        if ctx.grid.hit_test_at_zoom(world, ctx.camera.zoom).is_none() {
            ctx.events.push(GraphEvent::CanvasClicked(world));
        }
    }

    fn click_node(&mut self, ctx: &mut InteractionContext<'_>, id: NodeId, now: Instant) {
        let is_double = matches!(
            &self.last_click,
            Some((last, at)) if *last == id && now.saturating_duration_since(*at) <= DOUBLE_CLICK_WINDOW
        );
        if is_double {
            self.last_click = None;
            ctx.events.push(GraphEvent::NodeDblClicked(id));
        } else {
            self.last_click = Some((id.clone(), now));
            ctx.events.push(GraphEvent::NodeClicked(id));
        }
    }

    fn enter_hover(&mut self, ctx: &mut InteractionContext<'_>, hover: Hover) {
        match &hover {
            Hover::Node(id) => {
                if let Some(node) = ctx.graph.node_mut(id) {
                    if !node.is_pinned() {
                        let at = node.position;
                        node.pin(PinReason::Hover, at);
                    }
                }
                ctx.events.push(GraphEvent::NodeMouseOver(id.clone()));
            }
            Hover::Relationship(id) => {
                ctx.events.push(GraphEvent::RelMouseOver(id.clone()));
            }
        }
        self.hover = Some(hover);
    }

    fn clear_hover(&mut self, ctx: &mut InteractionContext<'_>) {
        match self.hover.take() {
            Some(Hover::Node(id)) => {
                if let Some(node) = ctx.graph.node_mut(&id) {
                    node.release_pin(PinReason::Hover);
                }
                ctx.events.push(GraphEvent::NodeMouseOut(id));
            }
            Some(Hover::Relationship(id)) => {
                ctx.events.push(GraphEvent::RelMouseOut(id));
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, Relationship};

    #[derive(Default)]
    struct CountingSimulation {
        reheats: usize,
        settles: usize,
    }

    impl ForceSimulation for CountingSimulation {
        fn update_graph(&mut self, _graph: &GraphModel) {}
        fn reheat(&mut self, _alpha_target: f64) {
            self.reheats += 1;
        }
        fn settle(&mut self) {
            self.settles += 1;
        }
        fn precompute_and_start(&mut self, _graph: &mut GraphModel) {}
        fn tick(&mut self, _graph: &mut GraphModel) -> bool {
            false
        }
        fn is_running(&self) -> bool {
            false
        }
        fn restart(&mut self) {}
        fn stop(&mut self) {}
    }

    struct Harness {
        graph: GraphModel,
        grid: SpatialGrid,
        simulation: CountingSimulation,
        camera: Camera,
        events: Vec<GraphEvent>,
        state: InteractionState,
    }

    impl Harness {
        fn new() -> Self {
            let mut graph = GraphModel::new();
            graph
                .add_nodes([
                    Node::new("a").with_position(Point::new(100.0, 100.0)).with_radius(25.0),
                    Node::new("b").with_position(Point::new(400.0, 100.0)).with_radius(25.0),
                ])
                .unwrap();
            graph
                .add_relationships([Relationship::new("ab", "KNOWS", "a", "b")])
                .unwrap();
            let mut grid = SpatialGrid::default();
            grid.rebuild_grid(&graph);

            Self {
                graph,
                grid,
                simulation: CountingSimulation::default(),
                camera: Camera::new(),
                events: Vec::new(),
                state: InteractionState::new(),
            }
        }

        fn run(&mut self, f: impl FnOnce(&mut InteractionState, &mut InteractionContext<'_>)) {
            let mut ctx = InteractionContext {
                graph: &mut self.graph,
                grid: &mut self.grid,
                simulation: &mut self.simulation,
                camera: &mut self.camera,
                events: &mut self.events,
            };
            f(&mut self.state, &mut ctx);
        }

        fn click(&mut self, at: Point, now: Instant) {
            self.run(|state, ctx| {
                state.pointer_down(ctx, at, MouseButton::Left);
                state.pointer_up(ctx, at, now);
            });
        }

        fn events(&self) -> Vec<GraphEvent> {
            self.events.clone()
        }

        fn node(&self, id: &str) -> &Node {
            self.graph.node(&NodeId::from(id)).unwrap()
        }
    }

    fn a() -> NodeId {
        NodeId::from("a")
    }

    #[test]
    fn test_click_without_movement() {
        let mut h = Harness::new();
        let now = Instant::now();
        h.run(|state, ctx| {
            state.pointer_down(ctx, Point::new(100.0, 100.0), MouseButton::Left);
            state.pointer_move(ctx, Point::new(102.0, 103.0));
            state.pointer_up(ctx, Point::new(102.0, 103.0), now);
        });
        assert_eq!(h.events(), vec![GraphEvent::NodeClicked(a())]);
        assert_eq!(h.simulation.reheats, 0);
        assert!(!h.node("a").is_pinned());
        assert_eq!(h.node("a").position, Point::new(100.0, 100.0));
        assert!(!h.camera.is_drag_paused());
    }

    #[test]
    fn test_drag_moves_and_keeps_pin() {
        let mut h = Harness::new();
        let now = Instant::now();
        h.run(|state, ctx| {
            state.pointer_down(ctx, Point::new(100.0, 100.0), MouseButton::Left);
            assert!(ctx.camera.is_drag_paused());
            state.pointer_move(ctx, Point::new(130.0, 100.0));
            state.pointer_move(ctx, Point::new(150.0, 100.0));
            assert!(state.is_dragging());
            state.pointer_up(ctx, Point::new(150.0, 100.0), now);
        });
        assert!(h.events().is_empty());
        assert_eq!(h.simulation.reheats, 1);
        assert_eq!(h.simulation.settles, 1);
        let node = h.node("a");
        assert_eq!(node.pin_reason(), PinReason::Drag);
        assert_eq!(node.fixed_position(), Some(Point::new(150.0, 100.0)));
        assert_eq!(node.position, Point::new(150.0, 100.0));
        assert!(!h.camera.is_drag_paused());
        // The grid was rebuilt at the drop position.
        assert_eq!(h.grid.hit_test(Point::new(170.0, 100.0)), Some(Hit::Node(a())));
    }

    #[test]
    fn test_node_follows_pointer_within_tolerance() {
        let mut h = Harness::new();
        h.run(|state, ctx| {
            state.pointer_down(ctx, Point::new(100.0, 100.0), MouseButton::Left);
            state.pointer_move(ctx, Point::new(103.0, 104.0));
        });
        let node = h.node("a");
        assert_eq!(node.position, Point::new(103.0, 104.0));
        assert_eq!(node.pin_reason(), PinReason::Drag);
        assert_eq!(h.simulation.reheats, 0);
    }

    #[test]
    fn test_double_click_window() {
        let mut h = Harness::new();
        let t0 = Instant::now();
        h.click(Point::new(100.0, 100.0), t0);
        h.click(Point::new(100.0, 100.0), t0 + Duration::from_millis(200));
        assert_eq!(
            h.events(),
            vec![GraphEvent::NodeClicked(a()), GraphEvent::NodeDblClicked(a())]
        );
    }

    #[test]
    fn test_slow_clicks_are_two_clicks() {
        let mut h = Harness::new();
        let t0 = Instant::now();
        h.click(Point::new(100.0, 100.0), t0);
        h.click(Point::new(100.0, 100.0), t0 + Duration::from_millis(400));
        assert_eq!(
            h.events(),
            vec![GraphEvent::NodeClicked(a()), GraphEvent::NodeClicked(a())]
        );
    }

    #[test]
    fn test_click_on_other_node_resets_double_click() {
        let mut h = Harness::new();
        let t0 = Instant::now();
        h.click(Point::new(100.0, 100.0), t0);
        h.click(Point::new(400.0, 100.0), t0 + Duration::from_millis(50));
        h.click(Point::new(100.0, 100.0), t0 + Duration::from_millis(100));
        let clicks = h
            .events()
            .iter()
            .filter(|e| matches!(e, GraphEvent::NodeClicked(_)))
            .count();
        assert_eq!(clicks, 3);
    }

    #[test]
    fn test_hover_is_exclusive_and_ordered() {
        let mut h = Harness::new();
        h.run(|state, ctx| {
            state.pointer_move(ctx, Point::new(100.0, 100.0));
            assert_eq!(state.hovered_node(), Some(&a()));
            state.pointer_move(ctx, Point::new(250.0, 100.0));
            assert!(state.hovered_node().is_none());
            assert!(state.hovered_relationship().is_some());
        });
        assert_eq!(
            h.events(),
            vec![
                GraphEvent::NodeMouseOver(a()),
                GraphEvent::NodeMouseOut(a()),
                GraphEvent::RelMouseOver(RelationshipId::from("ab")),
            ]
        );
        assert!(!h.node("a").is_pinned());
    }

    #[test]
    fn test_hover_pins_and_leave_releases() {
        let mut h = Harness::new();
        h.run(|state, ctx| state.pointer_move(ctx, Point::new(100.0, 100.0)));
        assert_eq!(h.node("a").pin_reason(), PinReason::Hover);
        h.run(|state, ctx| state.pointer_leave(ctx));
        assert!(!h.node("a").is_pinned());
        assert_eq!(h.events().last(), Some(&GraphEvent::NodeMouseOut(a())));
    }

    #[test]
    fn test_hover_keeps_foreign_pin() {
        let mut h = Harness::new();
        h.graph
            .node_mut(&a())
            .unwrap()
            .pin(PinReason::External, Point::new(100.0, 100.0));
        h.run(|state, ctx| {
            state.pointer_move(ctx, Point::new(100.0, 100.0));
            state.pointer_leave(ctx);
        });
        assert_eq!(h.node("a").pin_reason(), PinReason::External);
    }

    #[test]
    fn test_press_clears_hover_first() {
        let mut h = Harness::new();
        h.run(|state, ctx| {
            state.pointer_move(ctx, Point::new(100.0, 100.0));
            state.pointer_down(ctx, Point::new(100.0, 100.0), MouseButton::Left);
            assert!(state.hovered_node().is_none());
            assert_eq!(state.dragged_node(), Some(&a()));
        });
        assert_eq!(h.node("a").pin_reason(), PinReason::Drag);
        assert_eq!(h.events().last(), Some(&GraphEvent::NodeMouseOut(a())));
    }

    #[test]
    fn test_relationship_press_fires_immediately() {
        let mut h = Harness::new();
        h.run(|state, ctx| {
            state.pointer_down(ctx, Point::new(250.0, 100.0), MouseButton::Left)
        });
        assert_eq!(
            h.events(),
            vec![GraphEvent::RelationshipClicked(RelationshipId::from("ab"))]
        );
    }

    #[test]
    fn test_relationship_press_released_on_canvas() {
        let mut h = Harness::new();
        let now = Instant::now();
        h.run(|state, ctx| {
            state.pointer_down(ctx, Point::new(250.0, 100.0), MouseButton::Left);
            state.pointer_up(ctx, Point::new(250.0, 300.0), now);
        });
        assert_eq!(
            h.events(),
            vec![
                GraphEvent::RelationshipClicked(RelationshipId::from("ab")),
                GraphEvent::CanvasClicked(Point::new(250.0, 300.0)),
            ]
        );

        // Released back on the relationship: no canvas click.
        h.run(|state, ctx| {
            state.pointer_down(ctx, Point::new(250.0, 100.0), MouseButton::Left);
            state.pointer_up(ctx, Point::new(250.0, 100.0), now);
        });
        assert_eq!(h.events().len(), 3);
    }

    #[test]
    fn test_relationship_tolerance_is_in_pixels() {
        let mut h = Harness::new();
        h.camera.zoom = 0.5;
        h.camera.offset = Vec2::ZERO;
        // 6 px below the line at zoom 0.5 is 12 world units away.
        h.run(|state, ctx| state.pointer_move(ctx, Point::new(125.0, 56.0)));
        assert!(h.state.hovered_relationship().is_some());
    }

    #[test]
    fn test_canvas_click_and_pan() {
        let mut h = Harness::new();
        let now = Instant::now();
        h.click(Point::new(250.0, 300.0), now);
        assert_eq!(h.events(), vec![GraphEvent::CanvasClicked(Point::new(250.0, 300.0))]);

        h.run(|state, ctx| {
            state.pointer_down(ctx, Point::new(250.0, 300.0), MouseButton::Left);
            state.pointer_move(ctx, Point::new(290.0, 300.0));
            state.pointer_up(ctx, Point::new(290.0, 300.0), now);
        });
        assert_eq!(h.events().len(), 1);
        assert_eq!(h.camera.offset, Vec2::new(40.0, 0.0));
    }
}
