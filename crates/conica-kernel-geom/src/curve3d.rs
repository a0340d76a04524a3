//! 3D curve types returned by plane sections.

use std::f64::consts::PI;

use conica_kernel_math::{Dir3, Point3, Vec3};

/// The kind of a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    /// Straight line.
    Line,
    /// Circle or circular arc.
    Circle,
    /// Ellipse or elliptical arc.
    Ellipse,
    /// Rational B-spline (exact conic arcs and interpolated splines).
    Nurbs,
}

/// A parametric curve in 3D space.
pub trait Curve3d: Send + Sync + std::fmt::Debug {
    /// Evaluate the curve at parameter `t` to get a 3D point.
    fn evaluate(&self, t: f64) -> Point3;

    /// Tangent vector at parameter `t`.
    fn tangent(&self, t: f64) -> Vec3;

    /// Parameter domain `(t_min, t_max)`.
    fn domain(&self) -> (f64, f64);

    /// The kind of this curve.
    fn curve_type(&self) -> CurveKind;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Curve3d>;

    /// Point at the start of the domain.
    fn start_point(&self) -> Point3 {
        self.evaluate(self.domain().0)
    }

    /// Point at the end of the domain.
    fn end_point(&self) -> Point3 {
        self.evaluate(self.domain().1)
    }
}

impl Clone for Box<dyn Curve3d> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A 3D line segment defined by origin and direction.
///
/// Parameterization: `P(t) = origin + t * direction`, `t ∈ [0, 1]`.
#[derive(Debug, Clone)]
pub struct Line3d {
    /// Starting point.
    pub origin: Point3,
    /// Direction (not necessarily unit length; magnitude determines speed).
    pub direction: Vec3,
}

impl Line3d {
    /// Create a line from two endpoints, parameterized so `t=0` gives `start` and `t=1` gives `end`.
    pub fn from_points(start: Point3, end: Point3) -> Self {
        Self {
            origin: start,
            direction: end - start,
        }
    }
}

impl Curve3d for Line3d {
    fn evaluate(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }

    fn tangent(&self, _t: f64) -> Vec3 {
        self.direction
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Line
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

/// A circle or circular arc in 3D space.
///
/// Parameterization: `P(t) = center + radius * (cos(t) * x_dir + sin(t) * y_dir)`
/// over `range`.
#[derive(Debug, Clone)]
pub struct Circle3d {
    /// Center of the circle.
    pub center: Point3,
    /// Radius.
    pub radius: f64,
    /// Reference direction for t=0.
    pub x_dir: Dir3,
    /// Second in-plane direction (perpendicular to x_dir and normal).
    pub y_dir: Dir3,
    /// Normal to the circle plane.
    pub normal: Dir3,
    /// Parameter range; `(0, 2π)` for a full circle.
    pub range: (f64, f64),
}

impl Circle3d {
    /// Create a full circle in the XY plane centered at the given point.
    pub fn new(center: Point3, radius: f64) -> Self {
        Self {
            center,
            radius,
            x_dir: Dir3::new_normalize(Vec3::x()),
            y_dir: Dir3::new_normalize(Vec3::y()),
            normal: Dir3::new_normalize(Vec3::z()),
            range: (0.0, 2.0 * PI),
        }
    }

    /// Create an arc from an explicit in-plane frame. `y_dir` is
    /// re-orthogonalized against `x_dir`.
    pub fn from_frame(center: Point3, x_dir: Vec3, y_dir: Vec3, radius: f64, range: (f64, f64)) -> Self {
        let x = Dir3::new_normalize(x_dir);
        let y = Dir3::new_normalize(y_dir - y_dir.dot(x.as_ref()) * x.as_ref());
        Self {
            center,
            radius,
            x_dir: x,
            y_dir: y,
            normal: Dir3::new_normalize(x.as_ref().cross(y.as_ref())),
            range,
        }
    }
}

impl Curve3d for Circle3d {
    fn evaluate(&self, t: f64) -> Point3 {
        let (sin_t, cos_t) = t.sin_cos();
        self.center + self.radius * (cos_t * self.x_dir.as_ref() + sin_t * self.y_dir.as_ref())
    }

    fn tangent(&self, t: f64) -> Vec3 {
        let (sin_t, cos_t) = t.sin_cos();
        self.radius * (-sin_t * self.x_dir.as_ref() + cos_t * self.y_dir.as_ref())
    }

    fn domain(&self) -> (f64, f64) {
        self.range
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Circle
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

/// An ellipse or elliptical arc.
///
/// Parameterization: `P(t) = center + cos(t) * axis_a + sin(t) * axis_b`
/// over `range`. The axes are conjugate semi-diameters; for a true
/// principal-axis ellipse they are perpendicular.
#[derive(Debug, Clone)]
pub struct Ellipse3d {
    /// Center of the ellipse.
    pub center: Point3,
    /// Semi-axis reached at `t = 0`.
    pub axis_a: Vec3,
    /// Semi-axis reached at `t = π/2`.
    pub axis_b: Vec3,
    /// Parameter range.
    pub range: (f64, f64),
}

impl Ellipse3d {
    /// Create an elliptical arc.
    pub fn new(center: Point3, axis_a: Vec3, axis_b: Vec3, range: (f64, f64)) -> Self {
        Self {
            center,
            axis_a,
            axis_b,
            range,
        }
    }
}

impl Curve3d for Ellipse3d {
    fn evaluate(&self, t: f64) -> Point3 {
        let (sin_t, cos_t) = t.sin_cos();
        self.center + cos_t * self.axis_a + sin_t * self.axis_b
    }

    fn tangent(&self, t: f64) -> Vec3 {
        let (sin_t, cos_t) = t.sin_cos();
        -sin_t * self.axis_a + cos_t * self.axis_b
    }

    fn domain(&self) -> (f64, f64) {
        self.range
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Ellipse
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line3d() {
        let line = Line3d::from_points(Point3::origin(), Point3::new(10.0, 0.0, 0.0));
        let mid = line.evaluate(0.5);
        assert!((mid.x - 5.0).abs() < 1e-12);
        assert_eq!(line.end_point(), Point3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_circle3d() {
        let circle = Circle3d::new(Point3::origin(), 5.0);
        let pt = circle.evaluate(0.0);
        assert!((pt.x - 5.0).abs() < 1e-12);
        let pt90 = circle.evaluate(PI / 2.0);
        assert!(pt90.x.abs() < 1e-12);
        assert!((pt90.y - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_circle3d_from_skewed_frame() {
        let c = Circle3d::from_frame(
            Point3::new(0.0, 0.0, 2.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            3.0,
            (0.0, PI),
        );
        assert!((c.y_dir.as_ref() - Vec3::y()).norm() < 1e-12);
        assert!((c.end_point() - Point3::new(-3.0, 0.0, 2.0)).norm() < 1e-12);
        assert!((c.normal.as_ref() - Vec3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_ellipse3d_tangent() {
        let e = Ellipse3d::new(Point3::origin(), Vec3::new(4.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0), (0.0, 2.0 * PI));
        let t = 0.7;
        let h = 1e-7;
        let fd = (e.evaluate(t + h) - e.evaluate(t - h)) / (2.0 * h);
        assert!((fd - e.tangent(t)).norm() < 1e-6);
        assert_eq!(e.curve_type(), CurveKind::Ellipse);
    }
}
