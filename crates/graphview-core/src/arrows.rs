//! Arrow shapes for relationships.
//!
//! Arrows are described in the relationship's local frame: the source node
//! centre sits at the origin and the relationship points along +x. The
//! renderer rotates the frame by the relationship's natural angle. Outlines
//! are emitted as path strings (`M`, `L`, `A`, `Z`) so the vector renderer can
//! use them directly and the GPU renderer can convert them.

use kurbo::Point;
use std::f64::consts::PI;
use std::fmt::Write;

/// Arrow geometry of a relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum Arrow {
    Straight(StraightArrow),
    Loop(LoopArrow),
}

impl Arrow {
    /// Filled outline; `caption_width` opens a gap in the shaft for the caption.
    pub fn outline(&self, caption_width: f64) -> String {
        match self {
            Arrow::Straight(arrow) => arrow.outline(caption_width),
            Arrow::Loop(arrow) => arrow.outline(),
        }
    }

    /// Wider invisible outline used for forgiving hit testing.
    pub fn overlay(&self, min_width: f64) -> String {
        match self {
            Arrow::Straight(arrow) => arrow.overlay(min_width),
            Arrow::Loop(arrow) => arrow.overlay(min_width),
        }
    }

    /// Caption anchor in the local frame.
    pub fn midpoint(&self) -> Point {
        match self {
            Arrow::Straight(arrow) => arrow.mid_shaft_point,
            Arrow::Loop(arrow) => arrow.mid_shaft_point,
        }
    }

    /// Shaft length available to a caption.
    pub fn shaft_length(&self) -> f64 {
        match self {
            Arrow::Straight(arrow) => arrow.shaft_length,
            Arrow::Loop(arrow) => arrow.shaft_length,
        }
    }
}

/// Builds a path string with space separated tokens.
struct PathWriter(String);

impl PathWriter {
    fn new() -> Self {
        Self(String::with_capacity(128))
    }

    fn cmd(&mut self, cmd: char, values: &[f64]) -> &mut Self {
        if !self.0.is_empty() {
            self.0.push(' ');
        }
        self.0.push(cmd);
        for value in values {
            let _ = write!(self.0, " {}", round(*value));
        }
        self
    }

    fn point(&mut self, cmd: char, p: Point) -> &mut Self {
        self.cmd(cmd, &[p.x, p.y])
    }

    fn arc(&mut self, radius: f64, large_arc: bool, sweep: bool, to: Point) -> &mut Self {
        self.cmd(
            'A',
            &[
                radius,
                radius,
                0.0,
                f64::from(u8::from(large_arc)),
                f64::from(u8::from(sweep)),
                to.x,
                to.y,
            ],
        )
    }

    fn close(&mut self) -> &mut Self {
        self.cmd('Z', &[])
    }

    fn finish(&mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

/// Round to a sensible precision so identical geometry yields identical strings.
fn round(value: f64) -> f64 {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// A straight arrow between two distinct nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct StraightArrow {
    start: f64,
    length: f64,
    shaft_length: f64,
    shaft_radius: f64,
    head_radius: f64,
    caption_gap: bool,
    mid_shaft_point: Point,
}

impl StraightArrow {
    /// `caption_gap` breaks the shaft around the caption instead of drawing it across.
    pub fn new(
        start_radius: f64,
        end_radius: f64,
        centre_distance: f64,
        shaft_width: f64,
        head_width: f64,
        head_height: f64,
        caption_gap: bool,
    ) -> Self {
        let length = (centre_distance - (start_radius + end_radius)).max(0.0);
        let shaft_length = (length - head_height).max(0.0);
        Self {
            start: start_radius,
            length,
            shaft_length,
            shaft_radius: shaft_width / 2.0,
            head_radius: head_width / 2.0,
            caption_gap,
            mid_shaft_point: Point::new(start_radius + shaft_length / 2.0, 0.0),
        }
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn outline(&self, caption_width: f64) -> String {
        let start = self.start;
        let end_shaft = start + self.shaft_length;
        let end_arrow = start + self.length;
        let (sr, hr) = (self.shaft_radius, self.head_radius);
        let mut path = PathWriter::new();

        if self.caption_gap && caption_width > 0.0 && caption_width < self.shaft_length {
            let start_break = start + (self.shaft_length - caption_width) / 2.0;
            let end_break = end_shaft - (self.shaft_length - caption_width) / 2.0;
            path.cmd('M', &[start, sr])
                .cmd('L', &[start_break, sr])
                .cmd('L', &[start_break, -sr])
                .cmd('L', &[start, -sr])
                .close()
                .cmd('M', &[end_break, sr])
                .cmd('L', &[end_shaft, sr])
                .cmd('L', &[end_shaft, hr])
                .cmd('L', &[end_arrow, 0.0])
                .cmd('L', &[end_shaft, -hr])
                .cmd('L', &[end_shaft, -sr])
                .cmd('L', &[end_break, -sr])
                .close();
        } else {
            path.cmd('M', &[start, sr])
                .cmd('L', &[end_shaft, sr])
                .cmd('L', &[end_shaft, hr])
                .cmd('L', &[end_arrow, 0.0])
                .cmd('L', &[end_shaft, -hr])
                .cmd('L', &[end_shaft, -sr])
                .cmd('L', &[start, -sr])
                .close();
        }
        path.finish()
    }

    pub fn overlay(&self, min_width: f64) -> String {
        let radius = (min_width / 2.0).max(self.shaft_radius);
        let end = self.start + self.length;
        PathWriter::new()
            .cmd('M', &[self.start, radius])
            .cmd('L', &[end, radius])
            .cmd('L', &[end, -radius])
            .cmd('L', &[self.start, -radius])
            .close()
            .finish()
    }
}

/// A self-loop drawn as a teardrop beside its node, opening along +x.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopArrow {
    spread: f64,
    r1: f64,
    r2: f64,
    r3: f64,
    loop_radius: f64,
    shaft_radius: f64,
    head_width: f64,
    shaft_length: f64,
    mid_shaft_point: Point,
}

impl LoopArrow {
    pub fn new(
        node_radius: f64,
        straight_length: f64,
        spread_degrees: f64,
        shaft_width: f64,
        head_width: f64,
        head_height: f64,
        caption_height: f64,
    ) -> Self {
        let spread = spread_degrees.to_radians();
        let r3 = node_radius + straight_length;
        let loop_radius = r3 * (spread / 2.0).tan();
        let shaft_radius = shaft_width / 2.0;
        let mut arrow = Self {
            spread,
            r1: node_radius,
            r2: node_radius + head_height,
            r3,
            loop_radius,
            shaft_radius,
            head_width,
            shaft_length: loop_radius * 3.0 + shaft_width,
            mid_shaft_point: Point::ZERO,
        };
        arrow.mid_shaft_point = arrow.normal_point(0.0, r3, shaft_radius + caption_height / 2.0 + 2.0);
        arrow
    }

    /// Point on the loop at `sweep` radians, `displacement` outside the centre line.
    fn normal_point(&self, sweep: f64, radius: f64, displacement: f64) -> Point {
        let local_loop_radius = radius * (self.spread / 2.0).tan();
        let cx = radius / (self.spread / 2.0).cos();
        Point::new(
            cx + (local_loop_radius + displacement) * sweep.cos(),
            -(local_loop_radius + displacement) * sweep.sin(),
        )
    }

    fn start_point(&self, radius: f64, displacement: f64) -> Point {
        self.normal_point((PI + self.spread) / 2.0, radius, displacement)
    }

    fn end_point(&self, radius: f64, displacement: f64) -> Point {
        self.normal_point(-(PI + self.spread) / 2.0, radius, displacement)
    }

    /// Centre of the loop in the local frame.
    pub fn loop_centre(&self) -> Point {
        Point::new(self.r3 / (self.spread / 2.0).cos(), 0.0)
    }

    pub fn loop_radius(&self) -> f64 {
        self.loop_radius
    }

    pub fn outline(&self) -> String {
        let sr = self.shaft_radius;
        let inner = self.loop_radius - sr;
        let outer = self.loop_radius + sr;
        let (r1, r2, r3) = (self.r1, self.r2, self.r3);
        PathWriter::new()
            .point('M', self.start_point(r1, sr))
            .point('L', self.start_point(r3, sr))
            .arc(outer, true, true, self.end_point(r3, sr))
            .point('L', self.end_point(r2, sr))
            .point('L', self.end_point(r2, -self.head_width / 2.0))
            .point('L', self.end_point(r1, 0.0))
            .point('L', self.end_point(r2, self.head_width / 2.0))
            .point('L', self.end_point(r2, -sr))
            .point('L', self.end_point(r3, -sr))
            .arc(inner, false, false, self.start_point(r3, -sr))
            .point('L', self.start_point(r1, -sr))
            .close()
            .finish()
    }

    pub fn overlay(&self, min_width: f64) -> String {
        let displacement = (min_width / 2.0).max(self.shaft_radius);
        let inner = self.loop_radius - displacement;
        let outer = self.loop_radius + displacement;
        let (r1, r2, r3) = (self.r1, self.r2, self.r3);
        PathWriter::new()
            .point('M', self.start_point(r1, displacement))
            .point('L', self.start_point(r3, displacement))
            .arc(outer, true, true, self.end_point(r3, displacement))
            .point('L', self.end_point(r2, displacement))
            .point('L', self.end_point(r2, -displacement))
            .point('L', self.end_point(r3, -displacement))
            .arc(inner, false, false, self.start_point(r3, -displacement))
            .point('L', self.start_point(r1, -displacement))
            .close()
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_outline_without_gap() {
        let arrow = StraightArrow::new(10.0, 10.0, 100.0, 2.0, 8.0, 10.0, false);
        assert!((arrow.length() - 80.0).abs() < f64::EPSILON);
        assert_eq!(
            arrow.outline(20.0),
            "M 10 1 L 80 1 L 80 4 L 90 0 L 80 -4 L 80 -1 L 10 -1 Z"
        );
    }

    #[test]
    fn test_straight_outline_with_caption_gap() {
        let arrow = StraightArrow::new(10.0, 10.0, 100.0, 2.0, 8.0, 10.0, true);
        let outline = arrow.outline(30.0);
        // Two closed sub-paths around the caption.
        assert_eq!(outline.matches('M').count(), 2);
        assert!(outline.starts_with("M 10 1 L 30 1"));
    }

    #[test]
    fn test_gap_skipped_when_caption_too_wide() {
        let arrow = StraightArrow::new(10.0, 10.0, 100.0, 2.0, 8.0, 10.0, true);
        assert_eq!(arrow.outline(500.0).matches('M').count(), 1);
    }

    #[test]
    fn test_overlay_uses_min_width() {
        let arrow = StraightArrow::new(0.0, 0.0, 50.0, 2.0, 8.0, 10.0, false);
        assert_eq!(arrow.overlay(16.0), "M 0 8 L 50 8 L 50 -8 L 0 -8 Z");
    }

    #[test]
    fn test_loop_starts_on_node_circle() {
        let arrow = LoopArrow::new(25.0, 40.0, 30.0, 2.0, 8.0, 10.0, 12.0);
        let start = arrow.start_point(25.0, 0.0);
        assert!((start.to_vec2().hypot() - 25.0).abs() < 1e-9);
        assert!(arrow.outline().contains(" A "));
        assert!(arrow.loop_centre().x > 25.0);
    }

    #[test]
    fn test_loop_midpoint_beyond_loop() {
        let arrow = LoopArrow::new(25.0, 40.0, 30.0, 2.0, 8.0, 10.0, 12.0);
        let mid = Arrow::Loop(arrow.clone()).midpoint();
        assert!(mid.x > arrow.loop_centre().x + arrow.loop_radius());
        assert!(mid.y.abs() < 1e-9);
    }
}
