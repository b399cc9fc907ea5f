//! Conversion of path strings into renderer-native Bezier paths.
//!
//! Supports the absolute commands `M`, `L`, `A` and `Z`. Elliptical arcs are
//! approximated with cubic Beziers so no host arc primitive is needed.
//! Malformed input never fails: bare numbers continue as line-to, unknown
//! letters are skipped.

use kurbo::{BezPath, Point, Vec2};
use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_4, TAU};
use std::rc::Rc;

/// Default number of parsed paths kept by [`PathCache`].
pub const DEFAULT_PATH_CACHE_CAPACITY: usize = 1000;

/// Radii below this are treated as degenerate.
const DEGENERATE_RADIUS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Command(char),
    Number(f64),
}

/// Split a path string into command letters and numbers.
fn tokenize(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() || c == b',' {
            i += 1;
        } else if c == b'-' || c == b'+' || c == b'.' || c.is_ascii_digit() {
            let start = i;
            i += 1;
            let mut seen_dot = c == b'.';
            let mut seen_exp = false;
            while i < bytes.len() {
                let d = bytes[i];
                if d.is_ascii_digit() {
                    i += 1;
                } else if d == b'.' && !seen_dot && !seen_exp {
                    seen_dot = true;
                    i += 1;
                } else if (d == b'e' || d == b'E') && !seen_exp {
                    seen_exp = true;
                    i += 1;
                    if i < bytes.len() && (bytes[i] == b'-' || bytes[i] == b'+') {
                        i += 1;
                    }
                } else {
                    break;
                }
            }
            if let Ok(value) = input[start..i].parse::<f64>() {
                tokens.push(Token::Number(value));
            }
        } else if c.is_ascii_alphabetic() {
            tokens.push(Token::Command(c as char));
            i += 1;
        } else {
            // Skip the whole UTF-8 sequence of anything unexpected.
            i += input[i..].chars().next().map_or(1, char::len_utf8);
        }
    }
    tokens
}

/// Parse a path string into a [`BezPath`].
pub fn parse_path(input: &str) -> BezPath {
    let tokens = tokenize(input);
    let mut path = BezPath::new();
    let mut current = Point::ZERO;
    let mut subpath_start = Point::ZERO;
    let mut has_current = false;
    let mut i = 0;

    let numbers = |i: usize, n: usize| -> Option<Vec<f64>> {
        let slice = tokens.get(i..i + n)?;
        slice
            .iter()
            .map(|token| match token {
                Token::Number(v) => Some(*v),
                Token::Command(_) => None,
            })
            .collect()
    };

    while i < tokens.len() {
        match tokens[i] {
            Token::Command('M') => match numbers(i + 1, 2) {
                Some(v) => {
                    current = Point::new(v[0], v[1]);
                    subpath_start = current;
                    path.move_to(current);
                    has_current = true;
                    i += 3;
                }
                None => i += 1,
            },
            Token::Command('L') => match numbers(i + 1, 2) {
                Some(v) => {
                    current = line_to(&mut path, &mut has_current, Point::new(v[0], v[1]));
                    i += 3;
                }
                None => i += 1,
            },
            Token::Command('A') => match numbers(i + 1, 7) {
                Some(v) => {
                    let to = Point::new(v[5], v[6]);
                    if !has_current {
                        path.move_to(current);
                        has_current = true;
                    }
                    arc_to(&mut path, current, v[0], v[1], v[2], v[3] != 0.0, v[4] != 0.0, to);
                    current = to;
                    i += 8;
                }
                None => i += 1,
            },
            Token::Command('Z') | Token::Command('z') => {
                if has_current {
                    path.close_path();
                    current = subpath_start;
                    has_current = false;
                }
                i += 1;
            }
            Token::Number(_) => match numbers(i, 2) {
                Some(v) => {
                    current = line_to(&mut path, &mut has_current, Point::new(v[0], v[1]));
                    i += 2;
                }
                None => i += 1,
            },
            Token::Command(other) => {
                log::trace!("skipping unsupported path command {other:?}");
                i += 1;
            }
        }
    }
    path
}

fn line_to(path: &mut BezPath, has_current: &mut bool, to: Point) -> Point {
    if *has_current {
        path.line_to(to);
    } else {
        path.move_to(to);
        *has_current = true;
    }
    to
}

/// Centre parameterisation of an elliptical arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcCenter {
    pub center: Point,
    pub radii: Vec2,
    /// x-axis rotation in radians.
    pub rotation: f64,
    pub start_angle: f64,
    /// Signed sweep in radians.
    pub sweep: f64,
}

/// Convert an SVG endpoint arc to its centre parameterisation.
///
/// Returns `None` when the arc degenerates to a straight line (zero radius or
/// coincident endpoints).
pub fn endpoint_to_center(
    from: Point,
    rx: f64,
    ry: f64,
    x_rotation_degrees: f64,
    large_arc: bool,
    sweep: bool,
    to: Point,
) -> Option<ArcCenter> {
    let mut rx = rx.abs();
    let mut ry = ry.abs();
    if rx < DEGENERATE_RADIUS || ry < DEGENERATE_RADIUS {
        return None;
    }
    if (from - to).hypot2() < DEGENERATE_RADIUS * DEGENERATE_RADIUS {
        return None;
    }

    let phi = x_rotation_degrees.to_radians();
    let (sin_phi, cos_phi) = phi.sin_cos();

    // Step 1: transformed midpoint.
    let dx2 = (from.x - to.x) / 2.0;
    let dy2 = (from.y - to.y) / 2.0;
    let x1p = cos_phi * dx2 + sin_phi * dy2;
    let y1p = -sin_phi * dx2 + cos_phi * dy2;

    // Scale radii up when they cannot span the endpoints.
    let lambda = (x1p * x1p) / (rx * rx) + (y1p * y1p) / (ry * ry);
    if lambda > 1.0 {
        let scale = lambda.sqrt();
        rx *= scale;
        ry *= scale;
    }

    // Step 2: transformed centre.
    let rx2 = rx * rx;
    let ry2 = ry * ry;
    let numerator = rx2 * ry2 - rx2 * y1p * y1p - ry2 * x1p * x1p;
    let denominator = rx2 * y1p * y1p + ry2 * x1p * x1p;
    let mut coef = if denominator == 0.0 {
        0.0
    } else {
        (numerator / denominator).max(0.0).sqrt()
    };
    if large_arc == sweep {
        coef = -coef;
    }
    let cxp = coef * (rx * y1p / ry);
    let cyp = coef * -(ry * x1p / rx);

    // Step 3: centre in user space.
    let center = Point::new(
        cos_phi * cxp - sin_phi * cyp + (from.x + to.x) / 2.0,
        sin_phi * cxp + cos_phi * cyp + (from.y + to.y) / 2.0,
    );

    // Step 4: angles.
    let start_vec = Vec2::new((x1p - cxp) / rx, (y1p - cyp) / ry);
    let end_vec = Vec2::new((-x1p - cxp) / rx, (-y1p - cyp) / ry);
    let start_angle = start_vec.atan2();
    let mut delta = end_vec.atan2() - start_angle;
    if sweep && delta < 0.0 {
        delta += TAU;
    } else if !sweep && delta > 0.0 {
        delta -= TAU;
    }
    delta = delta.clamp(-TAU, TAU);
    if delta.abs() < f64::EPSILON && large_arc {
        delta = if sweep { TAU } else { -TAU };
    }

    Some(ArcCenter {
        center,
        radii: Vec2::new(rx, ry),
        rotation: phi,
        start_angle,
        sweep: delta,
    })
}

impl ArcCenter {
    /// Point on the ellipse at parametric angle `theta`.
    pub fn point_at(&self, theta: f64) -> Point {
        let (sin_phi, cos_phi) = self.rotation.sin_cos();
        let (sin_t, cos_t) = theta.sin_cos();
        let x = self.radii.x * cos_t;
        let y = self.radii.y * sin_t;
        Point::new(
            self.center.x + cos_phi * x - sin_phi * y,
            self.center.y + sin_phi * x + cos_phi * y,
        )
    }

    /// Derivative of [`point_at`](Self::point_at) with respect to `theta`.
    fn tangent_at(&self, theta: f64) -> Vec2 {
        let (sin_phi, cos_phi) = self.rotation.sin_cos();
        let (sin_t, cos_t) = theta.sin_cos();
        let x = -self.radii.x * sin_t;
        let y = self.radii.y * cos_t;
        Vec2::new(cos_phi * x - sin_phi * y, sin_phi * x + cos_phi * y)
    }

    /// Number of cubic segments: one per 45° of sweep.
    pub fn segment_count(&self) -> usize {
        ((self.sweep.abs() / FRAC_PI_4) - 1e-9).ceil().max(1.0) as usize
    }

    /// Append the cubic approximation to `path`; the current point must be the arc start.
    pub fn append_cubics(&self, path: &mut BezPath, end: Point) {
        let segments = self.segment_count();
        let step = self.sweep / segments as f64;
        // Control distance for a segment of angle `step`.
        let kappa = 4.0 / 3.0 * (step / 4.0).tan();
        let mut theta = self.start_angle;
        for i in 0..segments {
            let next = theta + step;
            let p0 = self.point_at(theta);
            let p3 = if i + 1 == segments { end } else { self.point_at(next) };
            let c1 = p0 + self.tangent_at(theta) * kappa;
            let c2 = self.point_at(next) - self.tangent_at(next) * kappa;
            path.curve_to(c1, c2, p3);
            theta = next;
        }
    }
}

/// Append an SVG elliptical arc from `from` to `to`.
#[allow(clippy::too_many_arguments)]
pub fn arc_to(
    path: &mut BezPath,
    from: Point,
    rx: f64,
    ry: f64,
    x_rotation_degrees: f64,
    large_arc: bool,
    sweep: bool,
    to: Point,
) {
    match endpoint_to_center(from, rx, ry, x_rotation_degrees, large_arc, sweep, to) {
        Some(arc) => arc.append_cubics(path, to),
        None => path.line_to(to),
    }
}

struct CachedPath {
    path: Rc<BezPath>,
    last_used: u64,
}

/// Bounded cache of parsed paths keyed by the exact path string.
///
/// When full, the least recently used 10% are evicted in one batch.
pub struct PathCache {
    entries: HashMap<String, CachedPath>,
    capacity: usize,
    clock: u64,
}

impl std::fmt::Debug for PathCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_CACHE_CAPACITY)
    }
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    /// Parsed path for `input`, parsing on a miss.
    pub fn get(&mut self, input: &str) -> Rc<BezPath> {
        self.clock += 1;
        if let Some(entry) = self.entries.get_mut(input) {
            entry.last_used = self.clock;
            return Rc::clone(&entry.path);
        }
        if self.entries.len() >= self.capacity {
            self.evict();
        }
        let path = Rc::new(parse_path(input));
        self.entries.insert(
            input.to_string(),
            CachedPath {
                path: Rc::clone(&path),
                last_used: self.clock,
            },
        );
        path
    }

    fn evict(&mut self) {
        let count = (self.capacity / 10).max(1);
        let mut by_age: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.last_used, key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(last_used, _)| *last_used);
        for (_, key) in by_age.into_iter().take(count) {
            self.entries.remove(&key);
        }
        log::debug!("path cache evicted {count} entries");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, input: &str) -> bool {
        self.entries.contains_key(input)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
