#![warn(missing_docs)]

//! Tangency and distance constructions between 2D curves.
//!
//! # Operations
//!
//! - [`tangent_lines`] — lines touching two curves
//! - [`tangent_circles`] — circles of a given radius touching two curves
//! - [`apollonius`] — circles touching three lines or circles
//! - [`simple_minimum_distance`] — closest pair of points on two curves
//!
//! Every construction returns an empty result (or `None`) for configurations
//! with no solution, such as concentric circles or parallel segments. None
//! of them fail with an error.

mod apollonius;
mod circles;
mod distance;
mod lines;

use conica_kernel_geom::Curve2d;
use conica_kernel_math::Point2;

pub use apollonius::apollonius;
pub use circles::tangent_circles;
pub use distance::simple_minimum_distance;
pub use lines::tangent_lines;

/// Tuning for the tangency and distance solvers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentSettings {
    /// Linear tolerance for touch verification and intersection tests.
    pub tolerance: f64,
    /// Iteration cap for refinement loops.
    pub max_iterations: usize,
    /// Newton seeds tried per candidate cell when refining general
    /// tangent lines.
    pub seeds_per_segment: usize,
    /// Segments per curve in the coarse search grid for general curves.
    pub hull_segments: usize,
}

impl Default for TangentSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-7,
            max_iterations: 64,
            seeds_per_segment: 3,
            hull_segments: 48,
        }
    }
}

/// A line touching both curves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentLine {
    /// Touch point on the first curve.
    pub start: Point2,
    /// Touch point on the second curve.
    pub end: Point2,
    /// Parameter of `start` on the first curve.
    pub ta: f64,
    /// Parameter of `end` on the second curve.
    pub tb: f64,
}

/// A circle touching each input curve.
#[derive(Debug, Clone, PartialEq)]
pub struct TangentCircle {
    /// Center.
    pub center: Point2,
    /// Radius, always positive.
    pub radius: f64,
    /// Touch point on each input curve, in input order.
    pub touch_points: Vec<Point2>,
}

/// Closest pair of points on two curves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinDistance {
    /// Distance between the points; zero where the curves cross.
    pub distance: f64,
    /// Point on the first curve.
    pub point_a: Point2,
    /// Point on the second curve.
    pub point_b: Point2,
    /// Parameter of `point_a`.
    pub ta: f64,
    /// Parameter of `point_b`.
    pub tb: f64,
}

/// In-domain foot of the perpendicular from `p` onto `curve` at distance
/// `radius` within `tol`.
pub(crate) fn touching_foot(curve: &dyn Curve2d, p: &Point2, radius: f64, tol: f64) -> Option<(f64, Point2)> {
    curve
        .perpendicular_feet(p)
        .into_iter()
        .map(|t| (t, curve.evaluate(t)))
        .find(|(_, q)| ((q - p).norm() - radius).abs() <= tol * radius.max(1.0))
}

/// Push `circle` unless an equal one is already present.
pub(crate) fn push_unique(out: &mut Vec<TangentCircle>, circle: TangentCircle, tol: f64) {
    let scale = circle.radius.max(1.0);
    let dup = out.iter().any(|c| {
        (c.center - circle.center).norm() <= tol * scale && (c.radius - circle.radius).abs() <= tol * scale
    });
    if !dup {
        out.push(circle);
    }
}
