use super::{CaptionSprite, SELECTION_RING_WIDTH, selection_color};
use crate::text_cache::TextCache;
use graphview_core::graph::{Node, NodeId};
use graphview_core::style::{self as keys, StyleView};
use kurbo::{Affine, Circle, Point, Stroke};
use peniko::{Color, Fill};
use std::collections::HashMap;
use vello::Scene;

const DEFAULT_FILL: Color = Color::from_rgba8(165, 171, 182, 255);
const DEFAULT_BORDER: Color = Color::from_rgba8(154, 161, 172, 255);
const DEFAULT_TEXT: Color = Color::WHITE;

/// Retained graphics for one node.
#[derive(Debug, Clone)]
pub struct NodeGraphics {
    /// Translation to the node position.
    pub transform: Affine,
    pub radius: f64,
    pub fill: Color,
    pub border: Color,
    pub border_width: f64,
    /// Selection ring, shown while the node is selected.
    pub ring: bool,
    pub captions: Vec<CaptionSprite>,
}

impl NodeGraphics {
    fn new(node: &Node) -> Self {
        Self {
            transform: Affine::translate(node.position.to_vec2()),
            radius: node.radius,
            fill: DEFAULT_FILL,
            border: DEFAULT_BORDER,
            border_width: 2.0,
            ring: false,
            captions: Vec::new(),
        }
    }

    fn restyle(&mut self, node: &Node, style: &StyleView, text: &mut TextCache<Scene>) {
        self.transform = Affine::translate(node.position.to_vec2());
        self.radius = node.radius;
        self.fill = style.color(keys::COLOR, DEFAULT_FILL);
        self.border = style.color(keys::BORDER_COLOR, DEFAULT_BORDER);
        self.border_width = style.px(keys::BORDER_WIDTH, 2.0);
        self.ring = node.selected;

        let font_size = style.px(keys::FONT_SIZE, 10.0);
        let color = style.color(keys::TEXT_COLOR, DEFAULT_TEXT);
        let family = style.get(keys::FONT_FAMILY);
        self.captions = node
            .caption
            .iter()
            .map(|line| {
                let sprite = text.create_text_sprite(&line.text, font_size, color, family);
                let size = sprite.size();
                let offset = Point::new(-size.width / 2.0, line.baseline - sprite.baseline());
                CaptionSprite { sprite, offset }
            })
            .collect();
    }

    pub fn position(&self) -> Point {
        Point::ZERO + self.transform.translation()
    }

    pub fn encode(&self, scene: &mut Scene, view: Affine) {
        let transform = view * self.transform;
        let circle = Circle::new(Point::ZERO, self.radius);
        if self.ring {
            let ring = Circle::new(Point::ZERO, self.radius + SELECTION_RING_WIDTH / 2.0);
            scene.stroke(&Stroke::new(SELECTION_RING_WIDTH), transform, selection_color(), None, &ring);
        }
        scene.fill(Fill::NonZero, transform, self.fill, None, &circle);
        if self.border_width > 0.0 {
            scene.stroke(&Stroke::new(self.border_width), transform, self.border, None, &circle);
        }
        for caption in &self.captions {
            caption.encode(scene, transform);
        }
    }
}

/// Node bundles keyed by node id.
#[derive(Debug, Default)]
pub struct NodeGraphicsManager {
    bundles: HashMap<NodeId, NodeGraphics>,
}

impl NodeGraphicsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or fetch the node's bundle and reconcile its style.
    pub fn update_node(&mut self, node: &Node, style: &StyleView, text: &mut TextCache<Scene>) -> &NodeGraphics {
        let bundle = self
            .bundles
            .entry(node.id.clone())
            .or_insert_with(|| NodeGraphics::new(node));
        bundle.restyle(node, style, text);
        bundle
    }

    /// Move existing bundles to the nodes' current positions.
    pub fn update_all_positions(&mut self, nodes: &[Node]) {
        for node in nodes {
            if let Some(bundle) = self.bundles.get_mut(&node.id) {
                bundle.transform = Affine::translate(node.position.to_vec2());
                bundle.ring = node.selected;
            }
        }
    }

    pub fn remove_node(&mut self, id: &NodeId) -> bool {
        self.bundles.remove(id).is_some()
    }

    /// Drop every bundle whose id fails `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&NodeId) -> bool) {
        self.bundles.retain(|id, _| keep(id));
    }

    pub fn clear(&mut self) {
        self.bundles.clear();
    }

    pub fn get(&self, id: &NodeId) -> Option<&NodeGraphics> {
        self.bundles.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.bundles.keys()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}
