//! The curve-construction seam used to materialize intersection results.

use conica_kernel_math::{Point3, Vec3};

use crate::curve3d::{Circle3d, Curve3d, Ellipse3d, Line3d};

/// Constructs 3D curves on behalf of geometric algorithms.
///
/// Callers that keep their own curve representations implement this to
/// receive plane-section results directly in that form. Lines, circles,
/// and ellipses default to this crate's analytic types; rational arcs and
/// splines need a B-spline implementation.
pub trait CurveFactory {
    /// Segment from `start` (t = 0) to `end` (t = 1).
    fn line(&self, start: Point3, end: Point3) -> Box<dyn Curve3d> {
        Box::new(Line3d::from_points(start, end))
    }

    /// Circular arc `center + radius (cos t x + sin t y)` over `range`.
    fn circle(
        &self,
        center: Point3,
        x_dir: Vec3,
        y_dir: Vec3,
        radius: f64,
        range: (f64, f64),
    ) -> Box<dyn Curve3d> {
        Box::new(Circle3d::from_frame(center, x_dir, y_dir, radius, range))
    }

    /// Elliptical arc `center + cos t a + sin t b` over `range`.
    fn ellipse(&self, center: Point3, axis_a: Vec3, axis_b: Vec3, range: (f64, f64)) -> Box<dyn Curve3d> {
        Box::new(Ellipse3d::new(center, axis_a, axis_b, range))
    }

    /// Exact rational quadratic arc over `[0, 1]` with end points `start`
    /// and `end`, tangent lines meeting at `apex`, and middle weight
    /// `weight` (`< 1` ellipse, `= 1` parabola, `> 1` hyperbola).
    fn conic_arc(&self, start: Point3, apex: Point3, end: Point3, weight: f64) -> Box<dyn Curve3d>;

    /// Spline of the given degree passing through `points` at the matching
    /// `params`. Returns `None` if the interpolation system is singular.
    fn spline_through(&self, points: &[Point3], params: &[f64], degree: usize) -> Option<Box<dyn Curve3d>>;
}
