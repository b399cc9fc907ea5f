//! Graph model: nodes, relationships and their pin state.
//!
//! The model is owned by the host. Renderers hold it through [`SharedGraph`]
//! and only touch pin state, selection and derived geometry.

use crate::arrows::Arrow;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Shared handle to the host-owned graph model.
pub type SharedGraph = Rc<RefCell<GraphModel>>;

/// Graph model errors.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Failed to parse graph: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Relationship {rel} references missing node {node}")]
    DanglingRelationship { rel: RelationshipId, node: NodeId },
    #[error("Duplicate id: {0}")]
    DuplicateId(String),
}

/// Opaque node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

/// Opaque relationship identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(pub String);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for RelationshipId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Why a node is held at a fixed position.
///
/// Only the owner of a pin may release it: hovering never clears a drag pin,
/// a drag never clears an externally fixed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PinReason {
    #[default]
    None,
    /// Held by the pointer while dragging, or dropped after a drag.
    Drag,
    /// Held while the pointer hovers the node.
    Hover,
    /// Fixed by the host.
    External,
}

/// One line of a node caption, positioned relative to the node centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionLine {
    pub text: String,
    /// Vertical baseline offset from the node centre.
    pub baseline: f64,
}

/// A graph node (entity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Current position, written by the simulation every tick.
    #[serde(default = "origin")]
    pub position: Point,
    /// Fixed position override (fx/fy). Present exactly when `pin_reason` is not `None`.
    #[serde(default)]
    fixed: Option<Point>,
    #[serde(default)]
    pin_reason: PinReason,
    /// Derived from style and caption.
    #[serde(default)]
    pub radius: f64,
    #[serde(default)]
    pub caption: Vec<CaptionLine>,
    #[serde(default)]
    pub selected: bool,
}

fn origin() -> Point {
    Point::ZERO
}

impl Node {
    /// Create a node at the origin.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: NodeId(id.into()),
            labels: Vec::new(),
            properties: BTreeMap::new(),
            position: Point::ZERO,
            fixed: None,
            pin_reason: PinReason::None,
            radius: 0.0,
            caption: Vec::new(),
            selected: false,
        }
    }

    pub fn with_position(mut self, position: Point) -> Self {
        self.position = position;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// The fixed position override, if pinned.
    pub fn fixed_position(&self) -> Option<Point> {
        self.fixed
    }

    pub fn pin_reason(&self) -> PinReason {
        self.pin_reason
    }

    pub fn is_pinned(&self) -> bool {
        self.fixed.is_some()
    }

    /// Pin the node at `at`, taking ownership of the pin for `reason`.
    ///
    /// Pinning with [`PinReason::None`] is the same as clearing the pin.
    pub fn pin(&mut self, reason: PinReason, at: Point) {
        if reason == PinReason::None {
            self.clear_pin();
            return;
        }
        self.pin_reason = reason;
        self.fixed = Some(at);
        self.position = at;
    }

    /// Move an existing pin without changing its owner.
    pub fn move_pin(&mut self, at: Point) {
        if self.fixed.is_some() {
            self.fixed = Some(at);
            self.position = at;
        }
    }

    /// Release the pin if it is owned by `reason`. Returns true if released.
    pub fn release_pin(&mut self, reason: PinReason) -> bool {
        if self.pin_reason == reason && reason != PinReason::None {
            self.clear_pin();
            true
        } else {
            false
        }
    }

    /// Drop the pin regardless of its owner.
    pub fn clear_pin(&mut self) {
        self.pin_reason = PinReason::None;
        self.fixed = None;
    }

    /// Axis-aligned bounds of the node circle.
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.position.x - self.radius,
            self.position.y - self.radius,
            self.position.x + self.radius,
            self.position.y + self.radius,
        )
    }

    /// Whether a world point lies inside the node circle.
    pub fn contains(&self, point: Point) -> bool {
        let dx = point.x - self.position.x;
        let dy = point.y - self.position.y;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

/// A binary relationship between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Arrow geometry, computed by the geometry helper every tick.
    #[serde(skip)]
    pub arrow: Option<Arrow>,
    /// Angle of the relationship in degrees, 0 pointing along +x.
    #[serde(skip)]
    pub natural_angle: f64,
    #[serde(skip)]
    pub short_caption: String,
    #[serde(skip)]
    pub caption_width: f64,
    #[serde(skip)]
    pub caption_height: f64,
    /// Caption anchor in the relationship's local frame.
    #[serde(skip)]
    pub midpoint: Point,
    #[serde(default)]
    pub selected: bool,
}

impl Relationship {
    pub fn new(
        id: impl Into<String>,
        rel_type: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: RelationshipId(id.into()),
            rel_type: rel_type.into(),
            source: NodeId(source.into()),
            target: NodeId(target.into()),
            properties: BTreeMap::new(),
            arrow: None,
            natural_angle: 0.0,
            short_caption: String::new(),
            caption_width: 0.0,
            caption_height: 0.0,
            midpoint: Point::ZERO,
            selected: false,
        }
    }

    pub fn is_loop(&self) -> bool {
        self.source == self.target
    }
}

#[derive(Deserialize)]
struct GraphData {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

/// The node and relationship collections of one graph view.
#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    nodes: Vec<Node>,
    relationships: Vec<Relationship>,
    node_index: HashMap<NodeId, usize>,
    rel_index: HashMap<RelationshipId, usize>,
}

impl GraphModel {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the model for sharing with a renderer.
    pub fn shared(self) -> SharedGraph {
        Rc::new(RefCell::new(self))
    }

    /// Parse a `{"nodes": [...], "relationships": [...]}` document.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let data: GraphData = serde_json::from_str(json)?;
        let mut graph = Self::new();
        graph.add_nodes(data.nodes)?;
        graph.add_relationships(data.relationships)?;
        Ok(graph)
    }

    /// Add nodes; ids already present are rejected.
    pub fn add_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) -> Result<(), GraphError> {
        for node in nodes {
            if self.node_index.contains_key(&node.id) {
                return Err(GraphError::DuplicateId(node.id.0));
            }
            self.node_index.insert(node.id.clone(), self.nodes.len());
            self.nodes.push(node);
        }
        Ok(())
    }

    /// Add relationships; both endpoints must already exist.
    pub fn add_relationships(
        &mut self,
        relationships: impl IntoIterator<Item = Relationship>,
    ) -> Result<(), GraphError> {
        for rel in relationships {
            if self.rel_index.contains_key(&rel.id) {
                return Err(GraphError::DuplicateId(rel.id.0));
            }
            for end in [&rel.source, &rel.target] {
                if !self.node_index.contains_key(end) {
                    return Err(GraphError::DanglingRelationship {
                        rel: rel.id.clone(),
                        node: end.clone(),
                    });
                }
            }
            self.rel_index.insert(rel.id.clone(), self.relationships.len());
            self.relationships.push(rel);
        }
        Ok(())
    }

    /// Remove a node together with every relationship touching it.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<Node> {
        let index = self.node_index.get(id).copied()?;
        self.relationships.retain(|rel| rel.source != *id && rel.target != *id);
        let node = self.nodes.remove(index);
        self.reindex();
        Some(node)
    }

    pub fn remove_relationship(&mut self, id: &RelationshipId) -> Option<Relationship> {
        let index = self.rel_index.get(id).copied()?;
        let rel = self.relationships.remove(index);
        self.reindex();
        Some(rel)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.relationships.clear();
        self.node_index.clear();
        self.rel_index.clear();
    }

    fn reindex(&mut self) {
        self.node_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect();
        self.rel_index = self
            .relationships
            .iter()
            .enumerate()
            .map(|(i, rel)| (rel.id.clone(), i))
            .collect();
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn relationships_mut(&mut self) -> &mut [Relationship] {
        &mut self.relationships
    }

    /// Mutable access to relationships alongside read access to nodes.
    pub fn split_mut(&mut self) -> (&[Node], &mut [Relationship]) {
        (&self.nodes, &mut self.relationships)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.node_index.get(id).map(|&i| &mut self.nodes[i])
    }

    pub fn relationship(&self, id: &RelationshipId) -> Option<&Relationship> {
        self.rel_index.get(id).map(|&i| &self.relationships[i])
    }

    pub fn relationship_mut(&mut self, id: &RelationshipId) -> Option<&mut Relationship> {
        self.rel_index.get(id).map(|&i| &mut self.relationships[i])
    }

    /// Source and target nodes of a relationship.
    pub fn endpoints(&self, rel: &Relationship) -> Option<(&Node, &Node)> {
        Some((self.node(&rel.source)?, self.node(&rel.target)?))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Union of all node circles, or `None` for an empty graph.
    pub fn bounds(&self) -> Option<Rect> {
        self.nodes
            .iter()
            .map(Node::bounds)
            .reduce(|acc, bounds| acc.union(bounds))
    }

    /// Select exactly one node (or none), clearing every other selection.
    pub fn select_node(&mut self, id: Option<&NodeId>) {
        for rel in &mut self.relationships {
            rel.selected = false;
        }
        for node in &mut self.nodes {
            node.selected = Some(&node.id) == id;
        }
    }

    /// Select exactly one relationship (or none), clearing every other selection.
    pub fn select_relationship(&mut self, id: Option<&RelationshipId>) {
        for node in &mut self.nodes {
            node.selected = false;
        }
        for rel in &mut self.relationships {
            rel.selected = Some(&rel.id) == id;
        }
    }
}
