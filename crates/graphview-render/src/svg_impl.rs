//! Vector renderer emitting an SVG document.
//!
//! Arrow outlines are already SVG path data, so relationships are written
//! out verbatim. The document is regenerated after every update and tick.

use crate::renderer::{RenderEngine, UpdateOptions, ZoomType};
use crate::view::GraphView;
use graphview_core::events::{EventKind, GraphEvent, Listener};
use graphview_core::graph::{Node, NodeId, Relationship};
use graphview_core::input::PointerEvent;
use graphview_core::spatial::Hit;
use graphview_core::style::{self as keys, RelationshipStyleCache, StyleView, format_color};
use kurbo::{Affine, Point, Rect};
use peniko::Color;
use std::collections::HashMap;
use std::fmt::Write;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

const SELECTION_FILL: &str = "#6ba4e8a0";
const DEFAULT_FILL: Color = Color::from_rgba8(165, 171, 182, 255);
const DEFAULT_BORDER: Color = Color::from_rgba8(154, 161, 172, 255);
const SELECTION_RING_WIDTH: f64 = 8.0;
const HALO_WIDTH: f64 = 16.0;

/// Escape text for use in SVG content and attribute values.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn num(value: f64) -> f64 {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 { 0.0 } else { rounded }
}

fn matrix(transform: Affine) -> String {
    let [a, b, c, d, e, f] = transform.as_coeffs();
    format!("matrix({} {} {} {} {} {})", num(a), num(b), num(c), num(d), num(e), num(f))
}

pub struct SvgEngine {
    view: GraphView,
    node_styles: HashMap<NodeId, StyleView>,
    rel_styles: RelationshipStyleCache,
    document: String,
    initialized: bool,
    destroyed: bool,
}

impl SvgEngine {
    pub fn new(view: GraphView) -> Self {
        Self {
            view,
            node_styles: HashMap::new(),
            rel_styles: RelationshipStyleCache::new(),
            document: String::new(),
            initialized: false,
            destroyed: false,
        }
    }

    /// The most recently rendered document.
    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn view(&self) -> &GraphView {
        &self.view
    }

    fn render(&mut self) {
        let size = self.view.surface_size();
        let mut svg = String::with_capacity(self.document.len().max(256));
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = num(size.width),
            h = num(size.height),
        );
        let _ = write!(svg, r#"<g class="viewport" transform="{}">"#, matrix(self.view.camera().transform()));
        {
            let graph = self.view.graph().borrow();
            svg.push_str(r#"<g class="layer relationships">"#);
            for rel in graph.relationships() {
                let Some(source) = graph.node(&rel.source) else {
                    continue;
                };
                let style = self.rel_styles.get(self.view.style(), rel);
                write_relationship(&mut svg, rel, source.position, &style);
            }
            svg.push_str("</g>");
            svg.push_str(r#"<g class="layer nodes">"#);
            for node in graph.nodes() {
                let style = self.node_styles.get(&node.id).cloned().unwrap_or_default();
                write_node(&mut svg, node, &style);
            }
            svg.push_str("</g>");
        }
        svg.push_str("</g></svg>");
        self.document = svg;
    }

    fn apply_update(&mut self, options: UpdateOptions) {
        self.rebuild(options);
        self.view.trigger(&GraphEvent::Updated);
    }

    fn rebuild(&mut self, options: UpdateOptions) {
        self.view.apply_update(options);
        if options.update_relationships {
            self.rel_styles.clear();
        }
        {
            let graph = self.view.graph().borrow();
            self.node_styles.retain(|id, _| graph.node(id).is_some());
            if options.update_nodes {
                for node in graph.nodes() {
                    self.node_styles
                        .insert(node.id.clone(), self.view.style().for_node(node));
                }
            }
        }
        self.render();
    }

    fn is_live(&self) -> bool {
        !self.destroyed
    }
}

fn write_relationship(svg: &mut String, rel: &Relationship, source: Point, style: &StyleView) {
    let Some(arrow) = &rel.arrow else {
        return;
    };
    let _ = write!(
        svg,
        r#"<g class="relationship" data-id="{}" transform="translate({} {}) rotate({})">"#,
        escape(&rel.id.0),
        num(source.x),
        num(source.y),
        num(rel.natural_angle),
    );
    if rel.selected {
        let _ = write!(
            svg,
            r#"<path class="overlay" d="{}" fill="{SELECTION_FILL}"/>"#,
            arrow.overlay(HALO_WIDTH)
        );
    }
    let _ = write!(
        svg,
        r#"<path class="outline" d="{}" fill="{}"/>"#,
        arrow.outline(rel.caption_width),
        format_color(style.color(keys::COLOR, DEFAULT_FILL)),
    );
    if !rel.short_caption.is_empty() {
        let mid = rel.midpoint;
        let angle = rel.natural_angle.rem_euclid(360.0);
        let flip = if angle > 90.0 && angle < 270.0 {
            format!(r#" transform="rotate(180 {} {})""#, num(mid.x), num(mid.y))
        } else {
            String::new()
        };
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" dominant-baseline="central" font-size="{}" font-family="{}" fill="{}"{flip}>{}</text>"#,
            num(mid.x),
            num(mid.y),
            num(style.px(keys::FONT_SIZE, 8.0)),
            escape(style.get(keys::FONT_FAMILY)),
            format_color(style.color(keys::TEXT_COLOR, Color::BLACK)),
            escape(&rel.short_caption),
        );
    }
    svg.push_str("</g>");
}

fn write_node(svg: &mut String, node: &Node, style: &StyleView) {
    let _ = write!(
        svg,
        r#"<g class="node" data-id="{}" transform="translate({} {})">"#,
        escape(&node.id.0),
        num(node.position.x),
        num(node.position.y),
    );
    if node.selected {
        let _ = write!(
            svg,
            r#"<circle class="ring" r="{}" fill="none" stroke="{SELECTION_FILL}" stroke-width="{SELECTION_RING_WIDTH}"/>"#,
            num(node.radius + SELECTION_RING_WIDTH / 2.0),
        );
    }
    let _ = write!(
        svg,
        r#"<circle r="{}" fill="{}" stroke="{}" stroke-width="{}"/>"#,
        num(node.radius),
        format_color(style.color(keys::COLOR, DEFAULT_FILL)),
        format_color(style.color(keys::BORDER_COLOR, DEFAULT_BORDER)),
        num(style.px(keys::BORDER_WIDTH, 2.0)),
    );
    let font_size = num(style.px(keys::FONT_SIZE, 10.0));
    for line in &node.caption {
        let _ = write!(
            svg,
            r#"<text y="{}" text-anchor="middle" font-size="{font_size}" font-family="{}" fill="{}">{}</text>"#,
            num(line.baseline),
            escape(style.get(keys::FONT_FAMILY)),
            format_color(style.color(keys::TEXT_COLOR, Color::WHITE)),
            escape(&line.text),
        );
    }
    svg.push_str("</g>");
}

impl RenderEngine for SvgEngine {
    fn init(&mut self) {
        if self.initialized || self.destroyed {
            return;
        }
        self.initialized = true;
        self.rebuild(UpdateOptions::default().with_nodes(true).with_relationships(true));
        self.view.set_initial_zoom();
        self.render();
        log::debug!("SVG renderer initialized");
    }

    fn update(&mut self, options: UpdateOptions) {
        if self.is_live() {
            self.apply_update(options);
        }
    }

    fn set_initial_zoom(&mut self) {
        if self.is_live() {
            self.view.set_initial_zoom();
        }
    }

    fn precompute_and_start(&mut self) {
        if self.is_live() {
            self.view.precompute_and_start();
            self.render();
        }
    }

    fn zoom_by_type(&mut self, zoom: ZoomType) {
        if self.is_live() {
            self.view.zoom_by_type(zoom);
            self.render();
        }
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
        if !self.is_live() {
            return;
        }
        self.view.advance();
        self.view.tick_geometry();
        self.render();
    }

    fn handle_pointer_event(&mut self, event: &PointerEvent, now: Instant) {
        if self.is_live() {
            self.view.handle_pointer_event(event, now);
        }
    }

    fn hit_test(&self, screen_point: Point) -> Option<Hit> {
        self.view.hit_test(screen_point)
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.view.shutdown();
        self.node_styles.clear();
        self.rel_styles.clear();
        self.document.clear();
        log::debug!("SVG renderer destroyed");
    }
}

impl std::fmt::Debug for SvgEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvgEngine")
            .field("initialized", &self.initialized)
            .field("destroyed", &self.destroyed)
            .field("document_len", &self.document.len())
            .finish_non_exhaustive()
    }
}
