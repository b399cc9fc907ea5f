//! GraphView Core Library
//!
//! Platform-agnostic graph model, geometry, hit testing and interaction logic
//! shared by every graph renderer.

pub mod arrows;
pub mod camera;
pub mod events;
pub mod geometry;
pub mod graph;
pub mod input;
pub mod interaction;
pub mod path;
pub mod simulation;
pub mod spatial;
pub mod style;

pub use arrows::{Arrow, LoopArrow, StraightArrow};
pub use camera::{Camera, ZoomLimits, initial_zoom_scale};
pub use events::{EventBus, EventKind, GraphEvent, Listener};
pub use geometry::{GeometryChange, GeometryModel, GraphGeometry};
pub use graph::{
    CaptionLine, GraphError, GraphModel, Node, NodeId, PinReason, Relationship, RelationshipId, SharedGraph,
};
pub use input::{Modifiers, MouseButton, PointerEvent};
pub use interaction::{InteractionContext, InteractionState};
pub use path::{PathCache, parse_path};
pub use simulation::ForceSimulation;
pub use spatial::{Hit, SpatialGrid};
pub use style::{GraphStyle, StaticStyle, StyleView};
