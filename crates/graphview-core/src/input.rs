//! Pointer input events delivered by the host.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Whether a zoom modifier (ctrl, meta or shift) is held.
    pub fn any_zoom_key(&self) -> bool {
        self.ctrl || self.meta || self.shift
    }
}

/// Pointer event in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: MouseButton,
    },
    Up {
        position: Point,
        button: MouseButton,
    },
    Move {
        position: Point,
    },
    /// The cursor left the drawing surface.
    Leave,
    Wheel {
        position: Point,
        delta: Vec2,
        modifiers: Modifiers,
    },
}

/// Multiplicative zoom factor for a wheel delta (positive y scrolls down and zooms out).
pub fn wheel_zoom_factor(delta: Vec2) -> f64 {
    (-delta.y * 0.002).exp().clamp(0.5, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wheel_direction() {
        assert!(wheel_zoom_factor(Vec2::new(0.0, -100.0)) > 1.0);
        assert!(wheel_zoom_factor(Vec2::new(0.0, 100.0)) < 1.0);
        assert!((wheel_zoom_factor(Vec2::ZERO) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zoom_modifier() {
        assert!(!Modifiers::default().any_zoom_key());
        assert!(Modifiers { ctrl: true, ..Default::default() }.any_zoom_key());
    }
}
