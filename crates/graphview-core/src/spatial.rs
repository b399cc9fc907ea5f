//! Uniform-grid spatial index for pointer hit testing.
//!
//! The grid snapshots node circles and relationship shapes at rebuild time.
//! It is rebuilt on structural change, after the initial layout, on drag
//! drop and when the simulation comes to rest, not on every tick.

use crate::arrows::Arrow;
use crate::graph::{GraphModel, NodeId, RelationshipId};
use kurbo::{Affine, Line, ParamCurveNearest, Point, Rect};
use std::collections::HashMap;

/// Default cell edge length in world units.
pub const DEFAULT_CELL_SIZE: f64 = 100.0;
/// Default distance within which a relationship counts as hit, in screen
/// pixels.
pub const DEFAULT_REL_TOLERANCE: f64 = 8.0;
/// Shapes covering more cells than this per axis are kept outside the grid
/// and tested on every query.
const MAX_CELL_SPAN: i64 = 64;

/// Entity under a point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hit {
    Node(NodeId),
    Relationship(RelationshipId),
}

#[derive(Debug, Clone)]
struct NodeEntry {
    id: NodeId,
    center: Point,
    radius: f64,
}

#[derive(Debug, Clone)]
enum RelShape {
    Segment(Line),
    /// Self-loop disk in world space.
    Circle { center: Point, radius: f64 },
}

impl RelShape {
    fn distance(&self, point: Point) -> f64 {
        match self {
            RelShape::Segment(line) => line.nearest(point, 1e-6).distance_sq.sqrt(),
            RelShape::Circle { center, radius } => (center.distance(point) - radius).max(0.0),
        }
    }

    fn bounds(&self) -> Rect {
        match self {
            RelShape::Segment(line) => Rect::from_points(line.p0, line.p1),
            RelShape::Circle { center, radius } => Rect::from_center_size(*center, (radius * 2.0, radius * 2.0)),
        }
    }
}

#[derive(Debug, Clone)]
struct RelEntry {
    id: RelationshipId,
    shape: RelShape,
}

#[derive(Debug, Default)]
struct Cell {
    nodes: Vec<usize>,
    rels: Vec<usize>,
}

/// Bucketed index of node and relationship shapes.
#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f64,
    tolerance: f64,
    nodes: Vec<NodeEntry>,
    rels: Vec<RelEntry>,
    cells: HashMap<(i32, i32), Cell>,
    oversized: Cell,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE, DEFAULT_REL_TOLERANCE)
    }
}

impl SpatialGrid {
    pub fn new(cell_size: f64, tolerance: f64) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            tolerance: tolerance.max(0.0),
            nodes: Vec::new(),
            rels: Vec::new(),
            cells: HashMap::new(),
            oversized: Cell::default(),
        }
    }

    fn cell_of(&self, point: Point) -> (i32, i32) {
        (
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }

    /// Cells within `span` of `(cx, cy)`, clamped to the `i32` range.
    fn neighbourhood(cx: i32, cy: i32, span: i32) -> impl Iterator<Item = (i32, i32)> {
        let xs = cx.saturating_sub(span)..=cx.saturating_add(span);
        xs.flat_map(move |x| (cy.saturating_sub(span)..=cy.saturating_add(span)).map(move |y| (x, y)))
    }

    /// Cells overlapping `rect`, or `None` when it spans too many of them.
    fn cells_covering(&self, rect: Rect) -> Option<Vec<(i32, i32)>> {
        let (x0, y0) = self.cell_of(Point::new(rect.x0, rect.y0));
        let (x1, y1) = self.cell_of(Point::new(rect.x1, rect.y1));
        if i64::from(x1) - i64::from(x0) > MAX_CELL_SPAN || i64::from(y1) - i64::from(y0) > MAX_CELL_SPAN {
            return None;
        }
        Some((x0..=x1).flat_map(|x| (y0..=y1).map(move |y| (x, y))).collect())
    }

    /// Re-index every node and relationship at its current position.
    pub fn rebuild_grid(&mut self, graph: &GraphModel) {
        self.nodes.clear();
        self.rels.clear();
        self.cells.clear();
        self.oversized = Cell::default();

        for node in graph.nodes() {
            let entry = NodeEntry {
                id: node.id.clone(),
                center: node.position,
                radius: node.radius,
            };
            let index = self.nodes.len();
            match self.cells_covering(node.bounds()) {
                Some(keys) => {
                    for key in keys {
                        self.cells.entry(key).or_default().nodes.push(index);
                    }
                }
                None => self.oversized.nodes.push(index),
            }
            self.nodes.push(entry);
        }

        for rel in graph.relationships() {
            let Some((source, target)) = graph.endpoints(rel) else {
                continue;
            };
            let shape = match &rel.arrow {
                Some(Arrow::Loop(arrow)) => {
                    let frame = Affine::translate(source.position.to_vec2())
                        * Affine::rotate(rel.natural_angle.to_radians());
                    RelShape::Circle {
                        center: frame * arrow.loop_centre(),
                        radius: arrow.loop_radius(),
                    }
                }
                // Loops are only indexed once their arrow geometry exists.
                None if rel.is_loop() => continue,
                _ => RelShape::Segment(Line::new(source.position, target.position)),
            };
            let index = self.rels.len();
            let area = shape.bounds().inflate(self.tolerance, self.tolerance);
            match self.cells_covering(area) {
                Some(keys) => {
                    for key in keys {
                        self.cells.entry(key).or_default().rels.push(index);
                    }
                }
                None => self.oversized.rels.push(index),
            }
            self.rels.push(RelEntry {
                id: rel.id.clone(),
                shape,
            });
        }
        log::debug!(
            "Spatial grid rebuilt: {} nodes, {} relationships, {} cells",
            self.nodes.len(),
            self.rels.len(),
            self.cells.len()
        );
    }

    /// Topmost entity at a world point at zoom 1. Nodes win over relationships.
    pub fn hit_test(&self, point: Point) -> Option<Hit> {
        self.hit_test_at_zoom(point, 1.0)
    }

    /// Topmost entity at a world point, with the relationship tolerance held
    /// constant in screen pixels at the given zoom.
    pub fn hit_test_at_zoom(&self, point: Point, zoom: f64) -> Option<Hit> {
        let tolerance = if zoom > 0.0 { self.tolerance / zoom } else { self.tolerance };
        let (cx, cy) = self.cell_of(point);
        // Relationships are indexed with the zoom-1 tolerance; widen the search to match.
        let span = (tolerance / self.cell_size).ceil().clamp(1.0, MAX_CELL_SPAN as f64) as i32;
        let cells: Vec<&Cell> = Self::neighbourhood(cx, cy, span)
            .filter_map(|key| self.cells.get(&key))
            .chain(std::iter::once(&self.oversized))
            .collect();

        let node = cells
            .iter()
            .flat_map(|cell| cell.nodes.iter())
            .map(|&i| &self.nodes[i])
            .filter(|entry| entry.center.distance(point) <= entry.radius)
            .min_by(|a, b| a.center.distance(point).total_cmp(&b.center.distance(point)));
        if let Some(entry) = node {
            return Some(Hit::Node(entry.id.clone()));
        }

        cells
            .iter()
            .flat_map(|cell| cell.rels.iter())
            .map(|&i| (&self.rels[i], self.rels[i].shape.distance(point)))
            .filter(|(_, distance)| *distance <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(entry, _)| Hit::Relationship(entry.id.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.rels.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.rels.clear();
        self.cells.clear();
        self.oversized = Cell::default();
    }
}
