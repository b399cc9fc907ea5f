//! Retained per-entity draw bundles for the Vello renderer.
//!
//! Bundles are created or refreshed on restyle and only moved on ticks. Each
//! bundle encodes itself into the frame scene under the camera transform.

mod node;
mod relationship;

pub use node::{NodeGraphics, NodeGraphicsManager};
pub use relationship::{RelationshipGraphics, RelationshipGraphicsManager};

use crate::text_cache::TextSprite;
use kurbo::{Affine, Point};
use peniko::Color;
use vello::Scene;

/// Width of the selection ring / halo around selected entities.
pub const SELECTION_RING_WIDTH: f64 = 8.0;

/// Colour of selection rings and relationship halos.
pub fn selection_color() -> Color {
    Color::from_rgba8(107, 164, 232, 160)
}

/// A caption sprite placed in its bundle's local frame.
#[derive(Debug, Clone)]
pub struct CaptionSprite {
    pub sprite: TextSprite<Scene>,
    /// Top-left corner in the bundle's local frame.
    pub offset: Point,
}

impl CaptionSprite {
    fn encode(&self, scene: &mut Scene, transform: Affine) {
        let placed = transform * Affine::translate(self.offset.to_vec2()) * Affine::scale(self.sprite.scale);
        scene.append(&self.sprite.texture.texture, Some(placed));
    }
}
