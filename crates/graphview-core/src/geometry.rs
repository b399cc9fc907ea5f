//! Derived per-entity geometry: node radius and caption layout, relationship
//! arrows, angles and short captions.
//!
//! Renderers call [`GeometryModel::on_graph_change`] after structural or style
//! updates and [`GeometryModel::on_tick`] before drawing every tick.

use crate::arrows::{Arrow, LoopArrow, StraightArrow};
use crate::graph::{CaptionLine, GraphModel, RelationshipId};
use crate::style::{self, GraphStyle};
use std::collections::HashMap;

/// Average glyph advance as a fraction of the font size.
const CHAR_WIDTH_RATIO: f64 = 0.6;
const MAX_CAPTION_LINES: usize = 3;
const CAPTION_PADDING: f64 = 2.0;
const ELLIPSIS: char = '\u{2026}';
/// Self-loops point up, above their node.
pub const LOOP_ANGLE: f64 = -90.0;
const LOOP_STRAIGHT_LENGTH: f64 = 40.0;
const LOOP_SPREAD_DEGREES: f64 = 30.0;

/// What changed since the last geometry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryChange {
    pub nodes: bool,
    pub relationships: bool,
}

/// Geometry helper used by renderers.
pub trait GeometryModel {
    /// Recompute style-derived geometry (radius, captions, caption styles).
    fn on_graph_change(&mut self, graph: &mut GraphModel, style: &dyn GraphStyle, change: GeometryChange);

    /// Recompute position-derived geometry (arrows, angles, midpoints).
    fn on_tick(&mut self, graph: &mut GraphModel);
}

/// Estimated rendered width of `text`.
pub fn estimate_text_width(text: &str, font_size: f64) -> f64 {
    text.chars().count() as f64 * font_size * CHAR_WIDTH_RATIO
}

/// Truncate `text` with an ellipsis so its estimated width fits `max_width`.
pub fn truncate_to_width(text: &str, font_size: f64, max_width: f64) -> String {
    if estimate_text_width(text, font_size) <= max_width {
        return text.to_string();
    }
    let fit = (max_width / (font_size * CHAR_WIDTH_RATIO)).floor() as usize;
    if fit <= 1 {
        return String::new();
    }
    let mut out: String = text.chars().take(fit - 1).collect();
    out.push(ELLIPSIS);
    out
}

/// Width of the horizontal chord of a circle at vertical offset `y`.
fn chord_width(radius: f64, y: f64) -> f64 {
    let h = radius * radius - y * y;
    if h <= 0.0 { 0.0 } else { 2.0 * h.sqrt() }
}

/// Lay a caption out inside a node circle, wrapping words onto at most three lines.
pub fn fit_caption(text: &str, radius: f64, font_size: f64) -> Vec<CaptionLine> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || radius <= 0.0 || font_size <= 0.0 {
        return Vec::new();
    }
    let line_height = font_size;
    let max_lines = ((2.0 * radius / line_height).floor() as usize).clamp(1, MAX_CAPTION_LINES);

    let layout = |line_count: usize| -> (Vec<CaptionLine>, bool) {
        let block_top = -(line_count as f64) * line_height / 2.0;
        let mut lines = Vec::with_capacity(line_count);
        let mut next = 0;
        for i in 0..line_count {
            let top = block_top + i as f64 * line_height;
            let bottom = top + line_height;
            let width = chord_width(radius, top.abs().max(bottom.abs())) - CAPTION_PADDING * 2.0;
            let mut line = String::new();
            while next < words.len() {
                let candidate = if line.is_empty() {
                    words[next].to_string()
                } else {
                    format!("{line} {}", words[next])
                };
                if estimate_text_width(&candidate, font_size) > width && !line.is_empty() {
                    break;
                }
                line = candidate;
                next += 1;
                if estimate_text_width(&line, font_size) > width {
                    break;
                }
            }
            let is_last = i + 1 == line_count;
            let overflow = is_last && next < words.len();
            let text = if overflow || estimate_text_width(&line, font_size) > width {
                let mut t = truncate_to_width(&line, font_size, width - font_size * CHAR_WIDTH_RATIO);
                if !t.ends_with(ELLIPSIS) {
                    t.push(ELLIPSIS);
                }
                t
            } else {
                line
            };
            lines.push(CaptionLine {
                text,
                baseline: bottom - line_height * 0.25,
            });
        }
        (lines, next >= words.len())
    };

    for line_count in 1..max_lines {
        let (lines, complete) = layout(line_count);
        if complete && lines.iter().all(|line| !line.text.ends_with(ELLIPSIS)) {
            return lines;
        }
    }
    let (lines, _) = layout(max_lines);
    lines
}

#[derive(Debug, Clone)]
struct RelCaptionStyle {
    caption: String,
    font_size: f64,
    shaft_width: f64,
}

/// Default geometry helper: straight arrows between nodes, loops above.
#[derive(Debug, Default)]
pub struct GraphGeometry {
    rel_styles: HashMap<RelationshipId, RelCaptionStyle>,
}

impl GraphGeometry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GeometryModel for GraphGeometry {
    fn on_graph_change(&mut self, graph: &mut GraphModel, style: &dyn GraphStyle, change: GeometryChange) {
        if change.nodes {
            for node in graph.nodes_mut() {
                let view = style.for_node(node);
                node.radius = view.px(style::DIAMETER, 50.0) / 2.0;
                let font_size = view.px(style::FONT_SIZE, 10.0);
                node.caption = fit_caption(view.get(style::CAPTION), node.radius, font_size);
            }
        }
        if change.relationships {
            self.rel_styles.clear();
            for rel in graph.relationships() {
                let view = style.for_relationship(rel);
                self.rel_styles.insert(
                    rel.id.clone(),
                    RelCaptionStyle {
                        caption: view.get(style::CAPTION).to_string(),
                        font_size: view.px(style::FONT_SIZE, 8.0),
                        shaft_width: view.px(style::SHAFT_WIDTH, 1.0),
                    },
                );
            }
        }
        self.on_tick(graph);
    }

    fn on_tick(&mut self, graph: &mut GraphModel) {
        let (nodes, relationships) = graph.split_mut();
        let index: HashMap<_, _> = nodes.iter().map(|n| (&n.id, n)).collect();

        for rel in relationships.iter_mut() {
            let (Some(source), Some(target)) = (index.get(&rel.source), index.get(&rel.target)) else {
                continue;
            };
            let caption_style = self.rel_styles.get(&rel.id).cloned().unwrap_or(RelCaptionStyle {
                caption: rel.rel_type.clone(),
                font_size: 8.0,
                shaft_width: 1.0,
            });
            let shaft_width = caption_style.shaft_width;
            let head_width = shaft_width + 6.0;
            let head_height = head_width;

            let arrow = if rel.source == rel.target {
                rel.natural_angle = LOOP_ANGLE;
                Arrow::Loop(LoopArrow::new(
                    source.radius,
                    LOOP_STRAIGHT_LENGTH,
                    LOOP_SPREAD_DEGREES,
                    shaft_width,
                    head_width,
                    head_height,
                    caption_style.font_size,
                ))
            } else {
                let delta = target.position - source.position;
                rel.natural_angle = delta.y.atan2(delta.x).to_degrees();
                Arrow::Straight(StraightArrow::new(
                    source.radius,
                    target.radius,
                    delta.hypot(),
                    shaft_width,
                    head_width,
                    head_height,
                    true,
                ))
            };

            let available = arrow.shaft_length() - CAPTION_PADDING * 2.0;
            rel.short_caption = truncate_to_width(&caption_style.caption, caption_style.font_size, available);
            rel.caption_width = estimate_text_width(&rel.short_caption, caption_style.font_size);
            rel.caption_height = caption_style.font_size;
            rel.midpoint = arrow.midpoint();
            rel.arrow = Some(arrow);
        }
    }
}
