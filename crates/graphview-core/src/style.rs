//! Style lookup.
//!
//! The styling rule engine is an external collaborator. Renderers consume it
//! through [`GraphStyle`], which resolves a [`StyleView`] of pre-formatted
//! strings (`"12px"`, `"#68bdf6"`) per node or relationship. Numeric and
//! colour parsing happens here, on the renderer side.

use crate::graph::{Node, Relationship};
use peniko::Color;
use std::collections::HashMap;
use std::rc::Rc;

/// Node fill colour.
pub const COLOR: &str = "color";
/// Node border / relationship stroke colour.
pub const BORDER_COLOR: &str = "border-color";
pub const BORDER_WIDTH: &str = "border-width";
pub const FONT_SIZE: &str = "font-size";
pub const TEXT_COLOR: &str = "text-color";
pub const DIAMETER: &str = "diameter";
pub const SHAFT_WIDTH: &str = "shaft-width";
/// Resolved caption text.
pub const CAPTION: &str = "caption";
pub const FONT_FAMILY: &str = "font-family";

/// Immutable key/value view of resolved style properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleView(Rc<HashMap<String, String>>);

impl StyleView {
    pub fn new<K: Into<String>, V: Into<String>>(props: impl IntoIterator<Item = (K, V)>) -> Self {
        Self(Rc::new(
            props.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }

    /// Property value, or `""` when unset.
    pub fn get(&self, property: &str) -> &str {
        self.0.get(property).map_or("", String::as_str)
    }

    /// Pixel value of a property, or `default` when unset or malformed.
    pub fn px(&self, property: &str, default: f64) -> f64 {
        parse_px(self.get(property)).unwrap_or(default)
    }

    /// Colour value of a property, or `default` when unset or malformed.
    pub fn color(&self, property: &str, default: Color) -> Color {
        parse_color(self.get(property)).unwrap_or(default)
    }

    /// A copy with `overrides` applied on top.
    pub fn merged(&self, overrides: &StyleView) -> StyleView {
        let mut props = (*self.0).clone();
        props.extend(overrides.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        StyleView(Rc::new(props))
    }

    fn with(&self, property: &str, value: String) -> StyleView {
        let mut props = (*self.0).clone();
        props.insert(property.to_string(), value);
        StyleView(Rc::new(props))
    }
}

/// Style lookup service.
pub trait GraphStyle {
    fn for_node(&self, node: &Node) -> StyleView;
    fn for_relationship(&self, rel: &Relationship) -> StyleView;
}

/// Parse `"12px"`, `"12"` or `"1.5px"`.
pub fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    number.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_color(value: &str) -> Option<Color> {
    let hex = value.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = channel(&c.to_string())?;
                rgb[i] = v * 17;
            }
            Some(Color::from_rgba8(rgb[0], rgb[1], rgb[2], 255))
        }
        6 | 8 => {
            let r = channel(&hex[0..2])?;
            let g = channel(&hex[2..4])?;
            let b = channel(&hex[4..6])?;
            let a = if hex.len() == 8 { channel(&hex[6..8])? } else { 255 };
            Some(Color::from_rgba8(r, g, b, a))
        }
        _ => None,
    }
}

/// Format a colour as `#rrggbb` (or `#rrggbbaa` when translucent).
pub fn format_color(color: Color) -> String {
    let rgba = color.to_rgba8();
    if rgba.a == 255 {
        format!("#{:02x}{:02x}{:02x}", rgba.r, rgba.g, rgba.b)
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", rgba.r, rgba.g, rgba.b, rgba.a)
    }
}

/// Expand `{property}`, `<id>` and `<type>` placeholders of a caption template.
fn interpolate(
    template: &str,
    id: &str,
    kind: &str,
    properties: &std::collections::BTreeMap<String, String>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find(['{', '<']) {
        out.push_str(&rest[..open]);
        let close_char = if rest[open..].starts_with('{') { '}' } else { '>' };
        let Some(len) = rest[open + 1..].find(close_char) else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = &rest[open + 1..open + 1 + len];
        match (close_char, key) {
            ('>', "id") => out.push_str(id),
            ('>', "type") => out.push_str(kind),
            ('}', key) => out.push_str(properties.get(key).map_or("", String::as_str)),
            _ => out.push_str(&rest[open..open + len + 2]),
        }
        rest = &rest[open + len + 2..];
    }
    out.push_str(rest);
    out
}

/// A fixed style table: defaults plus per-label and per-type overrides.
///
/// The `caption` property is treated as a template and resolved against the
/// entity's properties.
#[derive(Debug, Clone)]
pub struct StaticStyle {
    node_defaults: StyleView,
    node_by_label: HashMap<String, StyleView>,
    rel_defaults: StyleView,
    rel_by_type: HashMap<String, StyleView>,
}

impl Default for StaticStyle {
    fn default() -> Self {
        Self {
            node_defaults: StyleView::new([
                (DIAMETER, "50px"),
                (COLOR, "#a5abb6"),
                (BORDER_COLOR, "#9aa1ac"),
                (BORDER_WIDTH, "2px"),
                (TEXT_COLOR, "#ffffff"),
                (FONT_SIZE, "10px"),
                (FONT_FAMILY, "sans-serif"),
                (CAPTION, "<id>"),
            ]),
            node_by_label: HashMap::new(),
            rel_defaults: StyleView::new([
                (COLOR, "#a5abb6"),
                (SHAFT_WIDTH, "1px"),
                (FONT_SIZE, "8px"),
                (TEXT_COLOR, "#000000"),
                (FONT_FAMILY, "sans-serif"),
                (CAPTION, "<type>"),
            ]),
            rel_by_type: HashMap::new(),
        }
    }
}

impl StaticStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>, style: StyleView) -> Self {
        self.node_by_label.insert(label.into(), style);
        self
    }

    pub fn with_relationship_type(mut self, rel_type: impl Into<String>, style: StyleView) -> Self {
        self.rel_by_type.insert(rel_type.into(), style);
        self
    }
}

impl GraphStyle for StaticStyle {
    fn for_node(&self, node: &Node) -> StyleView {
        let mut view = self.node_defaults.clone();
        for label in &node.labels {
            if let Some(overrides) = self.node_by_label.get(label) {
                view = view.merged(overrides);
            }
        }
        let kind = node.labels.first().map_or("", String::as_str);
        let caption = interpolate(view.get(CAPTION), &node.id.0, kind, &node.properties);
        view.with(CAPTION, caption)
    }

    fn for_relationship(&self, rel: &Relationship) -> StyleView {
        let view = match self.rel_by_type.get(&rel.rel_type) {
            Some(overrides) => self.rel_defaults.merged(overrides),
            None => self.rel_defaults.clone(),
        };
        let caption = interpolate(view.get(CAPTION), &rel.id.0, &rel.rel_type, &rel.properties);
        view.with(CAPTION, caption)
    }
}

/// Relationship styles cached by relationship type.
///
/// Restyling is far rarer than repositioning, so one lookup per type is kept
/// until [`clear`](Self::clear) is called on a style or structure change.
#[derive(Debug, Default)]
pub struct RelationshipStyleCache {
    by_type: HashMap<String, StyleView>,
}

impl RelationshipStyleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, style: &dyn GraphStyle, rel: &Relationship) -> StyleView {
        if let Some(view) = self.by_type.get(&rel.rel_type) {
            return view.clone();
        }
        let view = style.for_relationship(rel);
        self.by_type.insert(rel.rel_type.clone(), view.clone());
        view
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_type.clear();
    }
}
