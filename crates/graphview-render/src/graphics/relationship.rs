use super::{CaptionSprite, SELECTION_RING_WIDTH, selection_color};
use crate::text_cache::TextCache;
use graphview_core::graph::{GraphModel, Relationship, RelationshipId};
use graphview_core::path::PathCache;
use graphview_core::style::{self as keys, StyleView};
use kurbo::{Affine, BezPath, Point};
use peniko::{Color, Fill};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::rc::Rc;
use vello::Scene;

const DEFAULT_COLOR: Color = Color::from_rgba8(165, 171, 182, 255);
const DEFAULT_TEXT: Color = Color::BLACK;

#[derive(Debug, Clone, PartialEq)]
struct CaptionStyle {
    font_size: f64,
    color: Color,
    family: String,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 8.0,
            color: DEFAULT_TEXT,
            family: String::new(),
        }
    }
}

/// Retained graphics for one relationship, drawn in its local frame.
#[derive(Debug, Clone)]
pub struct RelationshipGraphics {
    /// Translation to the source node followed by rotation to the natural angle.
    pub transform: Affine,
    pub outline: Rc<BezPath>,
    /// Wider outline drawn behind the arrow while selected.
    pub overlay: Rc<BezPath>,
    pub color: Color,
    pub selected: bool,
    pub caption: Option<CaptionSprite>,
    /// Caption anchor in the local frame.
    pub midpoint: Point,
    /// Caption rotated half a turn so it never reads upside down.
    pub flipped: bool,
    caption_text: String,
    caption_style: CaptionStyle,
}

impl Default for RelationshipGraphics {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            outline: Rc::new(BezPath::new()),
            overlay: Rc::new(BezPath::new()),
            color: DEFAULT_COLOR,
            selected: false,
            caption: None,
            midpoint: Point::ZERO,
            flipped: false,
            caption_text: String::new(),
            caption_style: CaptionStyle::default(),
        }
    }
}

/// Whether text laid along `angle` degrees would read upside down.
fn is_flipped(angle: f64) -> bool {
    let angle = angle.rem_euclid(360.0);
    angle > 90.0 && angle < 270.0
}

impl RelationshipGraphics {
    fn place(&mut self, rel: &Relationship, source: Point, paths: &mut PathCache) {
        self.transform = Affine::translate(source.to_vec2()) * Affine::rotate(rel.natural_angle.to_radians());
        self.midpoint = rel.midpoint;
        self.flipped = is_flipped(rel.natural_angle);
        self.selected = rel.selected;
        match &rel.arrow {
            Some(arrow) => {
                self.outline = paths.get(&arrow.outline(rel.caption_width));
                self.overlay = paths.get(&arrow.overlay(SELECTION_RING_WIDTH * 2.0));
            }
            None => {
                self.outline = Rc::new(BezPath::new());
                self.overlay = Rc::new(BezPath::new());
            }
        }
    }

    fn refresh_caption(&mut self, text: &str, cache: &mut TextCache<Scene>) {
        self.caption_text = text.to_string();
        if text.is_empty() {
            self.caption = None;
            return;
        }
        let style = &self.caption_style;
        let sprite = cache.create_text_sprite(text, style.font_size, style.color, &style.family);
        let size = sprite.size();
        self.caption = Some(CaptionSprite {
            sprite,
            offset: Point::new(-size.width / 2.0, -size.height / 2.0),
        });
    }

    /// Short caption currently shown.
    pub fn caption_text(&self) -> &str {
        &self.caption_text
    }

    pub fn encode(&self, scene: &mut Scene, view: Affine) {
        let transform = view * self.transform;
        if self.selected {
            scene.fill(Fill::NonZero, transform, selection_color(), None, &*self.overlay);
        }
        scene.fill(Fill::NonZero, transform, self.color, None, &*self.outline);
        if let Some(caption) = &self.caption {
            let mut frame = transform * Affine::translate(self.midpoint.to_vec2());
            if self.flipped {
                frame = frame * Affine::rotate(PI);
            }
            caption.encode(scene, frame);
        }
    }
}

/// Relationship bundles keyed by relationship id, sharing one path cache.
#[derive(Debug, Default)]
pub struct RelationshipGraphicsManager {
    bundles: HashMap<RelationshipId, RelationshipGraphics>,
    paths: PathCache,
}

impl RelationshipGraphicsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or fetch the relationship's bundle and reconcile its style.
    pub fn update_relationship(
        &mut self,
        rel: &Relationship,
        source: Point,
        style: &StyleView,
        text: &mut TextCache<Scene>,
    ) -> &RelationshipGraphics {
        let bundle = self.bundles.entry(rel.id.clone()).or_default();
        bundle.color = style.color(keys::COLOR, DEFAULT_COLOR);
        bundle.caption_style = CaptionStyle {
            font_size: style.px(keys::FONT_SIZE, 8.0),
            color: style.color(keys::TEXT_COLOR, DEFAULT_TEXT),
            family: style.get(keys::FONT_FAMILY).to_string(),
        };
        bundle.place(rel, source, &mut self.paths);
        bundle.refresh_caption(&rel.short_caption, text);
        bundle
    }

    /// Redraw every bundle's arrow for the current positions.
    ///
    /// Captions are re-rasterized only when their short caption changed.
    pub fn update_all_positions(&mut self, graph: &GraphModel, text: &mut TextCache<Scene>) {
        for rel in graph.relationships() {
            let Some(bundle) = self.bundles.get_mut(&rel.id) else {
                continue;
            };
            let Some(source) = graph.node(&rel.source) else {
                continue;
            };
            bundle.place(rel, source.position, &mut self.paths);
            if bundle.caption_text != rel.short_caption {
                bundle.refresh_caption(&rel.short_caption, text);
            }
        }
    }

    pub fn remove_relationship(&mut self, id: &RelationshipId) -> bool {
        self.bundles.remove(id).is_some()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&RelationshipId) -> bool) {
        self.bundles.retain(|id, _| keep(id));
    }

    pub fn clear(&mut self) {
        self.bundles.clear();
        self.paths.clear();
    }

    pub fn get(&self, id: &RelationshipId) -> Option<&RelationshipGraphics> {
        self.bundles.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &RelationshipId> {
        self.bundles.keys()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubRasterizer;
    use graphview_core::geometry::{GeometryChange, GeometryModel, GraphGeometry};
    use graphview_core::graph::{Node, NodeId};
    use graphview_core::style::StaticStyle;

    fn text_cache() -> TextCache<Scene> {
        let (rasterizer, _) = StubRasterizer::<Scene>::new();
        TextCache::new(Box::new(rasterizer))
    }

    fn laid_out(b: Point) -> (GraphModel, GraphGeometry) {
        let mut graph = GraphModel::new();
        graph
            .add_nodes([Node::new("a"), Node::new("b").with_position(b)])
            .unwrap();
        graph
            .add_relationships([Relationship::new("ab", "KNOWS", "a", "b")])
            .unwrap();
        let mut geometry = GraphGeometry::new();
        geometry.on_graph_change(
            &mut graph,
            &StaticStyle::new(),
            GeometryChange { nodes: true, relationships: true },
        );
        (graph, geometry)
    }

    fn register(manager: &mut RelationshipGraphicsManager, graph: &GraphModel, text: &mut TextCache<Scene>) {
        let rel = &graph.relationships()[0];
        let source = graph.node(&rel.source).unwrap().position;
        manager.update_relationship(rel, source, &StyleView::default(), text);
    }

    #[test]
    fn test_transform_follows_source_and_angle() {
        let (graph, _) = laid_out(Point::new(0.0, 200.0));
        let mut manager = RelationshipGraphicsManager::new();
        let mut text = text_cache();
        register(&mut manager, &graph, &mut text);

        let bundle = manager.get(&RelationshipId::from("ab")).unwrap();
        let along = bundle.transform * Point::new(100.0, 0.0);
        assert!(along.x.abs() < 1e-9);
        assert!((along.y - 100.0).abs() < 1e-9);
        assert!(!bundle.outline.elements().is_empty());
        assert_eq!(bundle.caption_text(), "KNOWS");
        assert!(bundle.caption.is_some());
    }

    #[test]
    fn test_positions_redraw_paths_and_caption() {
        let (mut graph, mut geometry) = laid_out(Point::new(200.0, 0.0));
        let mut manager = RelationshipGraphicsManager::new();
        let mut text = text_cache();
        register(&mut manager, &graph, &mut text);
        let before = Rc::clone(&manager.get(&RelationshipId::from("ab")).unwrap().outline);

        graph.node_mut(&NodeId::from("b")).unwrap().position = Point::new(80.0, 0.0);
        geometry.on_tick(&mut graph);
        manager.update_all_positions(&graph, &mut text);

        let bundle = manager.get(&RelationshipId::from("ab")).unwrap();
        assert!(!Rc::ptr_eq(&before, &bundle.outline));
        assert_ne!(bundle.caption_text(), "KNOWS");
        assert_eq!(bundle.caption_text(), graph.relationships()[0].short_caption);
    }

    #[test]
    fn test_leftward_caption_is_flipped() {
        let (graph, _) = laid_out(Point::new(-200.0, 0.0));
        let mut manager = RelationshipGraphicsManager::new();
        let mut text = text_cache();
        register(&mut manager, &graph, &mut text);
        assert!(manager.get(&RelationshipId::from("ab")).unwrap().flipped);

        assert!(!is_flipped(0.0));
        assert!(!is_flipped(-90.0));
        assert!(is_flipped(180.0));
        assert!(is_flipped(-135.0));
    }

    #[test]
    fn test_retain_drops_stale_bundles() {
        let (graph, _) = laid_out(Point::new(200.0, 0.0));
        let mut manager = RelationshipGraphicsManager::new();
        let mut text = text_cache();
        register(&mut manager, &graph, &mut text);
        manager.retain(|id| id.0 != "ab");
        assert!(manager.is_empty());
        assert!(!manager.remove_relationship(&RelationshipId::from("ab")));
    }
}
