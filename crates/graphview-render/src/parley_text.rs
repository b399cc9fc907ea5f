//! Caption rasterization with Parley.
//!
//! Each string is laid out once and its glyph runs are encoded into a
//! standalone [`Scene`] fragment, which the Vello renderer appends with a
//! transform wherever the caption is shown.

use crate::text_cache::{TextKey, TextRasterizer, TextTexture};
use kurbo::Affine;
use parley::layout::PositionedLayoutItem;
use parley::{Alignment, AlignmentOptions, FontContext, FontStack, LayoutContext, StyleProperty};
use peniko::{Brush, Fill};
use std::sync::Arc;
use vello::Scene;

const DEFAULT_FAMILY: &str = "sans-serif";

pub struct ParleyRasterizer {
    font_cx: FontContext,
    layout_cx: LayoutContext<Brush>,
}

impl Default for ParleyRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ParleyRasterizer {
    pub fn new() -> Self {
        Self {
            font_cx: FontContext::new(),
            layout_cx: LayoutContext::new(),
        }
    }

    /// Register an embedded font so captions don't depend on system fonts.
    pub fn with_font(mut self, data: &'static [u8]) -> Self {
        self.font_cx
            .collection
            .register_fonts(vello::peniko::Blob::new(Arc::new(data)), None);
        self
    }
}

impl TextRasterizer for ParleyRasterizer {
    type Texture = Scene;

    // Glyph outlines are replayed as vectors and stay sharp at any scale.
    fn oversampling(&self) -> f64 {
        1.0
    }

    fn rasterize(&mut self, key: &TextKey, scale: f64, padding: f64) -> TextTexture<Scene> {
        let brush = Brush::Solid(key.color());
        let family = if key.family.is_empty() { DEFAULT_FAMILY } else { key.family.as_str() };

        let mut builder = self.layout_cx.ranged_builder(&mut self.font_cx, &key.text, 1.0, false);
        builder.push_default(StyleProperty::FontSize((key.font_size_px() * scale) as f32));
        builder.push_default(StyleProperty::Brush(brush.clone()));
        builder.push_default(StyleProperty::FontStack(FontStack::Source(family.into())));
        let mut layout = builder.build(&key.text);
        layout.break_all_lines(None);
        layout.align(None, Alignment::Start, AlignmentOptions::default());

        let mut scene = Scene::new();
        let transform = Affine::translate((padding, padding));
        let mut baseline = None;
        for line in layout.lines() {
            if baseline.is_none() {
                baseline = Some(f64::from(line.metrics().baseline));
            }
            for item in line.items() {
                let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                    continue;
                };
                let mut x = glyph_run.offset();
                let y = glyph_run.baseline();
                let run = glyph_run.run();
                let glyph_xform = run
                    .synthesis()
                    .skew()
                    .map(|angle| Affine::skew(f64::from(angle.to_radians().tan()), 0.0));
                let glyphs: Vec<vello::Glyph> = glyph_run
                    .glyphs()
                    .map(|glyph| {
                        let gx = x + glyph.x;
                        x += glyph.advance;
                        vello::Glyph {
                            id: glyph.id,
                            x: gx,
                            y: y - glyph.y,
                        }
                    })
                    .collect();
                if glyphs.is_empty() {
                    continue;
                }
                scene
                    .draw_glyphs(run.font())
                    .brush(&brush)
                    .transform(transform)
                    .glyph_transform(glyph_xform)
                    .font_size(run.font_size())
                    .normalized_coords(run.normalized_coords())
                    .draw(Fill::NonZero, glyphs.into_iter());
            }
        }
        if baseline.is_none() {
            log::warn!("No glyphs laid out for caption {:?}", key.text);
        }

        TextTexture {
            texture: scene,
            width: f64::from(layout.width()) + 2.0 * padding,
            height: f64::from(layout.height()) + 2.0 * padding,
            baseline: padding + baseline.unwrap_or(0.0),
        }
    }
}

impl std::fmt::Debug for ParleyRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParleyRasterizer").finish_non_exhaustive()
    }
}
