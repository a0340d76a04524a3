//! 2D parametric curves: trim curves in surface parameter space and the
//! sketch-plane curves handled by the tangency solvers.

use std::f64::consts::PI;

use conica_kernel_math::{normalize_angle, Point2, Vec2};

const TWO_PI: f64 = 2.0 * PI;

/// Samples used by the generic numeric closest-point and foot searches.
const SEARCH_SAMPLES: usize = 64;

/// Analytic shape of a 2D curve, used for closed-form dispatch.
///
/// Only the carrier is described; the parameter range always comes from
/// [`Curve2d::domain`]. A circle's parameter is its polar angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurveShape2d {
    /// `origin + t * direction`.
    Line {
        /// Point at `t = 0`.
        origin: Point2,
        /// Velocity along the line.
        direction: Vec2,
    },
    /// Counter-clockwise circle parameterized by angle.
    Circle {
        /// Center.
        center: Point2,
        /// Radius.
        radius: f64,
    },
    /// Anything without a closed form.
    Other,
}

/// A 2D parametric curve (trim curves in parameter space, sketch curves).
pub trait Curve2d: Send + Sync + std::fmt::Debug {
    /// Evaluate the curve at parameter `t` to get a 2D point.
    fn evaluate(&self, t: f64) -> Point2;

    /// First derivative at parameter `t`.
    fn tangent(&self, t: f64) -> Vec2;

    /// Second derivative at parameter `t`.
    ///
    /// The default is a central difference of [`Curve2d::tangent`].
    fn second_derivative(&self, t: f64) -> Vec2 {
        let (t0, t1) = self.domain();
        let h = 1e-6 * (t1 - t0).abs().max(1.0);
        let a = (t - h).max(t0);
        let b = (t + h).min(t1);
        if b - a <= 0.0 {
            return Vec2::zeros();
        }
        (self.tangent(b) - self.tangent(a)) / (b - a)
    }

    /// Parameter domain `(t_min, t_max)`.
    fn domain(&self) -> (f64, f64);

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Curve2d>;

    /// Closed-form shape of the carrier, if any.
    fn shape(&self) -> CurveShape2d {
        CurveShape2d::Other
    }

    /// Parameter of the point on the curve closest to `p`.
    fn parameter_of(&self, p: &Point2) -> f64 {
        closest_point(self, p).0
    }

    /// Parameters of every in-domain point whose tangent is perpendicular to
    /// the segment back to `p`.
    fn perpendicular_feet(&self, p: &Point2) -> Vec<f64> {
        foot_params(self, p)
    }

    /// The sub-curve over `[t0, t1]`.
    fn trimmed(&self, t0: f64, t1: f64) -> Box<dyn Curve2d> {
        Box::new(TrimmedCurve2d::new(self.clone_box(), t0, t1))
    }

    /// Offset to the left of the direction of travel by `distance`.
    ///
    /// Returns `None` when the offset degenerates. The default samples the
    /// curve into a [`Polyline2d`].
    fn offset(&self, distance: f64) -> Option<Box<dyn Curve2d>> {
        let (t0, t1) = self.domain();
        let n = SEARCH_SAMPLES * 2;
        let mut points = Vec::with_capacity(n + 1);
        for i in 0..=n {
            let t = t0 + (t1 - t0) * i as f64 / n as f64;
            let d = self.tangent(t);
            let len = d.norm();
            if !(len > 0.0) {
                return None;
            }
            points.push(self.evaluate(t) + Vec2::new(-d.y, d.x) * (distance / len));
        }
        Some(Box::new(Polyline2d::new(points)))
    }

    /// Point at the start of the domain.
    fn start_point(&self) -> Point2 {
        self.evaluate(self.domain().0)
    }

    /// Point at the end of the domain.
    fn end_point(&self) -> Point2 {
        self.evaluate(self.domain().1)
    }
}

impl Clone for Box<dyn Curve2d> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Map `angle` into the circular range `range` (start, end with
/// `end >= start`). Returns the unwrapped parameter, or `None` if the angle
/// lies outside the range by more than `tol`.
pub fn angle_in_range(angle: f64, range: (f64, f64), tol: f64) -> Option<f64> {
    let (a0, a1) = range;
    let span = a1 - a0;
    if span >= TWO_PI - tol {
        return Some(a0 + normalize_angle(angle - a0));
    }
    let rel = normalize_angle(angle - a0);
    if rel <= span + tol {
        Some(a0 + rel.min(span))
    } else if TWO_PI - rel <= tol {
        Some(a0)
    } else {
        None
    }
}

/// Closest point on `curve` to `p`: coarse sampling followed by Newton
/// refinement of `(C(t) - p) · C'(t) = 0`, clamped to the domain.
pub fn closest_point<C: Curve2d + ?Sized>(curve: &C, p: &Point2) -> (f64, Point2) {
    let (t0, t1) = curve.domain();
    let mut best_t = t0;
    let mut best_d = f64::INFINITY;
    for i in 0..=SEARCH_SAMPLES {
        let t = t0 + (t1 - t0) * i as f64 / SEARCH_SAMPLES as f64;
        let d = (curve.evaluate(t) - p).norm_squared();
        if d < best_d {
            best_d = d;
            best_t = t;
        }
    }

    let mut t = best_t;
    for _ in 0..32 {
        let c = curve.evaluate(t) - p;
        let d1 = curve.tangent(t);
        let f = c.dot(&d1);
        let df = d1.norm_squared() + c.dot(&curve.second_derivative(t));
        if !(df.abs() > 1e-300) {
            break;
        }
        let next = (t - f / df).max(t0).min(t1);
        let done = (next - t).abs() < 1e-14 * (1.0 + t.abs());
        t = next;
        if done {
            break;
        }
    }

    let refined = curve.evaluate(t);
    if (refined - p).norm_squared() <= best_d {
        (t, refined)
    } else {
        (best_t, curve.evaluate(best_t))
    }
}

/// Parameters where `(C(t) - p) · C'(t)` vanishes, found by sign changes on
/// a sample grid and bisection.
pub fn foot_params<C: Curve2d + ?Sized>(curve: &C, p: &Point2) -> Vec<f64> {
    let (t0, t1) = curve.domain();
    let f = |t: f64| (curve.evaluate(t) - p).dot(&curve.tangent(t));
    let mut feet = Vec::new();
    let mut prev_t = t0;
    let mut prev_f = f(t0);
    if prev_f == 0.0 {
        feet.push(t0);
    }
    for i in 1..=SEARCH_SAMPLES {
        let t = t0 + (t1 - t0) * i as f64 / SEARCH_SAMPLES as f64;
        let ft = f(t);
        if ft == 0.0 {
            feet.push(t);
        } else if prev_f * ft < 0.0 {
            let (mut a, mut b, mut fa) = (prev_t, t, prev_f);
            for _ in 0..60 {
                let m = 0.5 * (a + b);
                let fm = f(m);
                if fm == 0.0 {
                    a = m;
                    b = m;
                    break;
                }
                if fa * fm < 0.0 {
                    b = m;
                } else {
                    a = m;
                    fa = fm;
                }
            }
            feet.push(0.5 * (a + b));
        }
        prev_t = t;
        prev_f = ft;
    }
    feet
}

// =============================================================================
// Line2d
// =============================================================================

/// A 2D line segment.
///
/// Parameterization: `P(t) = origin + t * direction` over `range`.
#[derive(Debug, Clone)]
pub struct Line2d {
    /// Point at `t = 0`.
    pub origin: Point2,
    /// Direction.
    pub direction: Vec2,
    /// Parameter range.
    pub range: (f64, f64),
}

impl Line2d {
    /// Create from two endpoints over `[0, 1]`.
    pub fn from_points(start: Point2, end: Point2) -> Self {
        Self {
            origin: start,
            direction: end - start,
            range: (0.0, 1.0),
        }
    }

    /// Create with an explicit parameter range.
    pub fn new(origin: Point2, direction: Vec2, range: (f64, f64)) -> Self {
        Self {
            origin,
            direction,
            range: (range.0.min(range.1), range.0.max(range.1)),
        }
    }

    fn project(&self, p: &Point2) -> Option<f64> {
        let len2 = self.direction.norm_squared();
        (len2 > 0.0).then(|| (p - self.origin).dot(&self.direction) / len2)
    }
}

impl Curve2d for Line2d {
    fn evaluate(&self, t: f64) -> Point2 {
        self.origin + t * self.direction
    }

    fn tangent(&self, _t: f64) -> Vec2 {
        self.direction
    }

    fn second_derivative(&self, _t: f64) -> Vec2 {
        Vec2::zeros()
    }

    fn domain(&self) -> (f64, f64) {
        self.range
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }

    fn shape(&self) -> CurveShape2d {
        CurveShape2d::Line {
            origin: self.origin,
            direction: self.direction,
        }
    }

    fn parameter_of(&self, p: &Point2) -> f64 {
        let t = self.project(p).unwrap_or(self.range.0);
        t.max(self.range.0).min(self.range.1)
    }

    fn perpendicular_feet(&self, p: &Point2) -> Vec<f64> {
        let Some(t) = self.project(p) else {
            return Vec::new();
        };
        let eps = 1e-12 * (self.range.1 - self.range.0).abs().max(1.0);
        if t >= self.range.0 - eps && t <= self.range.1 + eps {
            vec![t.max(self.range.0).min(self.range.1)]
        } else {
            Vec::new()
        }
    }

    fn trimmed(&self, t0: f64, t1: f64) -> Box<dyn Curve2d> {
        Box::new(Line2d::new(self.origin, self.direction, (t0, t1)))
    }

    fn offset(&self, distance: f64) -> Option<Box<dyn Curve2d>> {
        let len = self.direction.norm();
        if !(len > 0.0) {
            return None;
        }
        let left = Vec2::new(-self.direction.y, self.direction.x) / len;
        Some(Box::new(Line2d::new(
            self.origin + left * distance,
            self.direction,
            self.range,
        )))
    }
}

// =============================================================================
// Circle2d
// =============================================================================

/// A counter-clockwise 2D circle or arc parameterized by angle.
#[derive(Debug, Clone)]
pub struct Circle2d {
    /// Center of the circle.
    pub center: Point2,
    /// Radius.
    pub radius: f64,
    /// Angular range with `end >= start`.
    pub range: (f64, f64),
}

impl Circle2d {
    /// Create a full circle at the given center with the given radius.
    pub fn new(center: Point2, radius: f64) -> Self {
        Self {
            center,
            radius,
            range: (0.0, TWO_PI),
        }
    }

    /// Counter-clockwise arc from angle `start` to angle `end`. `end` is
    /// unwrapped to lie at or after `start`.
    pub fn arc(center: Point2, radius: f64, start: f64, end: f64) -> Self {
        let mut end = end;
        if end < start {
            end += TWO_PI * ((start - end) / TWO_PI).ceil();
        }
        Self {
            center,
            radius,
            range: (start, end),
        }
    }

    /// True if the arc covers the whole circle.
    pub fn is_full(&self) -> bool {
        self.range.1 - self.range.0 >= TWO_PI - 1e-12
    }
}

impl Curve2d for Circle2d {
    fn evaluate(&self, t: f64) -> Point2 {
        let (sin_t, cos_t) = t.sin_cos();
        self.center + self.radius * Vec2::new(cos_t, sin_t)
    }

    fn tangent(&self, t: f64) -> Vec2 {
        let (sin_t, cos_t) = t.sin_cos();
        self.radius * Vec2::new(-sin_t, cos_t)
    }

    fn second_derivative(&self, t: f64) -> Vec2 {
        let (sin_t, cos_t) = t.sin_cos();
        -self.radius * Vec2::new(cos_t, sin_t)
    }

    fn domain(&self) -> (f64, f64) {
        self.range
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }

    fn shape(&self) -> CurveShape2d {
        CurveShape2d::Circle {
            center: self.center,
            radius: self.radius,
        }
    }

    fn parameter_of(&self, p: &Point2) -> f64 {
        let d = p - self.center;
        let angle = d.y.atan2(d.x);
        if let Some(t) = angle_in_range(angle, self.range, 0.0) {
            return t;
        }
        let (s, e) = self.range;
        if (self.evaluate(s) - p).norm() <= (self.evaluate(e) - p).norm() {
            s
        } else {
            e
        }
    }

    fn perpendicular_feet(&self, p: &Point2) -> Vec<f64> {
        let d = p - self.center;
        if d.norm() < 1e-14 {
            return Vec::new();
        }
        let angle = d.y.atan2(d.x);
        let mut feet: Vec<f64> = [angle, angle + PI]
            .iter()
            .filter_map(|a| angle_in_range(*a, self.range, 1e-12))
            .collect();
        feet.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
        feet
    }

    fn trimmed(&self, t0: f64, t1: f64) -> Box<dyn Curve2d> {
        Box::new(Circle2d::arc(self.center, self.radius, t0, t1))
    }

    fn offset(&self, distance: f64) -> Option<Box<dyn Curve2d>> {
        let r = self.radius - distance;
        if r <= 1e-12 {
            return None;
        }
        Some(Box::new(Circle2d {
            center: self.center,
            radius: r,
            range: self.range,
        }))
    }
}

// =============================================================================
// Ellipse2d
// =============================================================================

/// A 2D ellipse or elliptical arc: `center + cos(t) * axis_a + sin(t) * axis_b`.
#[derive(Debug, Clone)]
pub struct Ellipse2d {
    /// Center.
    pub center: Point2,
    /// Semi-axis reached at `t = 0`.
    pub axis_a: Vec2,
    /// Semi-axis reached at `t = π/2`.
    pub axis_b: Vec2,
    /// Parameter range.
    pub range: (f64, f64),
}

impl Ellipse2d {
    /// Create an elliptical arc.
    pub fn new(center: Point2, axis_a: Vec2, axis_b: Vec2, range: (f64, f64)) -> Self {
        Self {
            center,
            axis_a,
            axis_b,
            range,
        }
    }
}

impl Curve2d for Ellipse2d {
    fn evaluate(&self, t: f64) -> Point2 {
        let (sin_t, cos_t) = t.sin_cos();
        self.center + cos_t * self.axis_a + sin_t * self.axis_b
    }

    fn tangent(&self, t: f64) -> Vec2 {
        let (sin_t, cos_t) = t.sin_cos();
        -sin_t * self.axis_a + cos_t * self.axis_b
    }

    fn second_derivative(&self, t: f64) -> Vec2 {
        let (sin_t, cos_t) = t.sin_cos();
        -cos_t * self.axis_a - sin_t * self.axis_b
    }

    fn domain(&self) -> (f64, f64) {
        self.range
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }

    fn trimmed(&self, t0: f64, t1: f64) -> Box<dyn Curve2d> {
        Box::new(Ellipse2d::new(self.center, self.axis_a, self.axis_b, (t0, t1)))
    }
}

// =============================================================================
// Polyline2d
// =============================================================================

/// Generic fallback curve: a polyline parameterized by vertex index.
#[derive(Debug, Clone)]
pub struct Polyline2d {
    /// Vertices; `t = i` lands on `points[i]`.
    pub points: Vec<Point2>,
}

impl Polyline2d {
    /// Create from at least two vertices.
    pub fn new(points: Vec<Point2>) -> Self {
        Self { points }
    }

    fn segment(&self, t: f64) -> (usize, f64) {
        let last = self.points.len().saturating_sub(2);
        let i = (t.floor().max(0.0) as usize).min(last);
        (i, t - i as f64)
    }
}

impl Curve2d for Polyline2d {
    fn evaluate(&self, t: f64) -> Point2 {
        match self.points.len() {
            0 => Point2::origin(),
            1 => self.points[0],
            _ => {
                let (i, s) = self.segment(t);
                self.points[i] + (self.points[i + 1] - self.points[i]) * s
            }
        }
    }

    fn tangent(&self, t: f64) -> Vec2 {
        if self.points.len() < 2 {
            return Vec2::zeros();
        }
        let (i, _) = self.segment(t);
        self.points[i + 1] - self.points[i]
    }

    fn second_derivative(&self, _t: f64) -> Vec2 {
        Vec2::zeros()
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, self.points.len().saturating_sub(1) as f64)
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }

    fn parameter_of(&self, p: &Point2) -> f64 {
        let mut best = (0.0, f64::INFINITY);
        for (i, w) in self.points.windows(2).enumerate() {
            let d = w[1] - w[0];
            let len2 = d.norm_squared();
            let s = if len2 > 0.0 {
                ((p - w[0]).dot(&d) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let dist = (w[0] + d * s - p).norm_squared();
            if dist < best.1 {
                best = (i as f64 + s, dist);
            }
        }
        best.0
    }
}

// =============================================================================
// TrimmedCurve2d
// =============================================================================

/// A sub-range view of another curve.
#[derive(Debug, Clone)]
pub struct TrimmedCurve2d {
    /// The untrimmed curve.
    pub basis: Box<dyn Curve2d>,
    /// Restricted parameter range.
    pub range: (f64, f64),
}

impl TrimmedCurve2d {
    /// Trim `basis` to `[t0, t1]` (sorted).
    pub fn new(basis: Box<dyn Curve2d>, t0: f64, t1: f64) -> Self {
        Self {
            basis,
            range: (t0.min(t1), t0.max(t1)),
        }
    }
}

impl Curve2d for TrimmedCurve2d {
    fn evaluate(&self, t: f64) -> Point2 {
        self.basis.evaluate(t)
    }

    fn tangent(&self, t: f64) -> Vec2 {
        self.basis.tangent(t)
    }

    fn second_derivative(&self, t: f64) -> Vec2 {
        self.basis.second_derivative(t)
    }

    fn domain(&self) -> (f64, f64) {
        self.range
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }

    fn shape(&self) -> CurveShape2d {
        self.basis.shape()
    }

    fn trimmed(&self, t0: f64, t1: f64) -> Box<dyn Curve2d> {
        self.basis.trimmed(t0, t1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_parameter_clamps() {
        let l = Line2d::from_points(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0));
        assert!((l.parameter_of(&Point2::new(5.0, 3.0)) - 0.5).abs() < 1e-12);
        assert_eq!(l.parameter_of(&Point2::new(-5.0, 3.0)), 0.0);
        assert!(l.perpendicular_feet(&Point2::new(15.0, 1.0)).is_empty());
    }

    #[test]
    fn test_line_offset_is_left() {
        let l = Line2d::from_points(Point2::new(0.0, 0.0), Point2::new(2.0, 0.0));
        let o = l.offset(1.5).unwrap();
        assert!((o.start_point() - Point2::new(0.0, 1.5)).norm() < 1e-12);
    }

    #[test]
    fn test_circle_arc_unwraps() {
        let arc = Circle2d::arc(Point2::origin(), 1.0, 1.5 * PI, 0.5 * PI);
        assert!((arc.range.1 - 2.5 * PI).abs() < 1e-12);
        // the point at angle 0 lies inside the arc
        let t = arc.parameter_of(&Point2::new(2.0, 0.0));
        assert!((t - 2.0 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_circle_feet_respect_range() {
        let full = Circle2d::new(Point2::origin(), 2.0);
        assert_eq!(full.perpendicular_feet(&Point2::new(5.0, 0.0)).len(), 2);
        let upper = Circle2d::arc(Point2::origin(), 2.0, 0.1, PI - 0.1);
        let feet = upper.perpendicular_feet(&Point2::new(0.0, 5.0));
        assert_eq!(feet.len(), 1);
        assert!((feet[0] - PI / 2.0).abs() < 1e-12);
        assert!(full.perpendicular_feet(&Point2::origin()).is_empty());
    }

    #[test]
    fn test_circle_offset_shrinks_left() {
        let c = Circle2d::new(Point2::origin(), 3.0);
        let inner = c.offset(1.0).unwrap();
        assert!((inner.start_point() - Point2::new(2.0, 0.0)).norm() < 1e-12);
        assert!(c.offset(3.0).is_none());
    }

    #[test]
    fn test_ellipse_numeric_closest_point() {
        let e = Ellipse2d::new(Point2::origin(), Vec2::new(4.0, 0.0), Vec2::new(0.0, 2.0), (0.0, TWO_PI));
        let (t, p) = closest_point(&e, &Point2::new(0.0, 5.0));
        assert!((t - PI / 2.0).abs() < 1e-8);
        assert!((p - Point2::new(0.0, 2.0)).norm() < 1e-8);

        let feet = e.perpendicular_feet(&Point2::new(10.0, 0.0));
        assert_eq!(feet.len(), 2);
        assert!(feet[0].abs() < 1e-12);
        assert!((feet[1] - PI).abs() < 1e-9);
    }

    #[test]
    fn test_polyline_and_trimmed() {
        let poly = Polyline2d::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
        ]);
        assert_eq!(poly.domain(), (0.0, 2.0));
        assert!((poly.evaluate(1.5) - Point2::new(1.0, 0.5)).norm() < 1e-12);
        assert!((poly.parameter_of(&Point2::new(2.0, 0.75)) - 1.75).abs() < 1e-12);

        let piece = poly.trimmed(0.5, 1.5);
        assert_eq!(piece.domain(), (0.5, 1.5));
        assert!((piece.start_point() - Point2::new(0.5, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_angle_in_range() {
        assert_eq!(angle_in_range(0.5, (0.0, 1.0), 0.0), Some(0.5));
        assert!(angle_in_range(-0.5, (0.0, 1.0), 0.0).is_none());
        assert!((angle_in_range(-1e-14, (0.0, 1.0), 1e-12).unwrap()).abs() < 1e-12);
        let wrapped = angle_in_range(0.1, (6.0, 6.0 + 1.0), 0.0).unwrap();
        assert!((wrapped - (0.1 + TWO_PI)).abs() < 1e-12);
    }
}
