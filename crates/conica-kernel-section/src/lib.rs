#![warn(missing_docs)]

//! Plane sections of analytic surfaces.
//!
//! Intersecting a surface with an infinite plane yields zero or more
//! [`DualCurve`]s: a 3D curve together with its images in the surface's
//! `(u, v)` chart and in the plane's own chart, all sharing one parameter.
//! The cone implementation classifies the section (circle, ellipse,
//! parabola, hyperbola, or degenerate generator lines) and builds exact
//! representations where one exists.
//!
//! Results are bounded by a [`ParamRect`] on the surface. A plane that
//! misses the bounded region, or a construction that would need a singular
//! solve, yields an empty list rather than an error.

mod arcs;
mod cone;
mod plane;

use conica_kernel_geom::{Curve2d, Curve3d, CurveFactory, ParametricSurface, Plane};
use conica_kernel_math::{Point2, Tolerance, Vec2};
use conica_kernel_nurbs::NurbsCurveFactory;

/// Bounds-agnostic shape of a plane section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConicClass {
    /// The plane and surface do not meet (or the input is not finite).
    Empty,
    /// A single point (plane through the apex, outside the cone).
    Point,
    /// One generator line (plane tangent along it).
    Line,
    /// Two generator lines through the apex.
    LinePair,
    /// A circle.
    Circle,
    /// An ellipse.
    Ellipse,
    /// A parabola.
    Parabola,
    /// A hyperbola (one branch per nappe).
    Hyperbola,
}

/// Representation of one returned section curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Straight segment.
    Line,
    /// Circular arc.
    Circle,
    /// Elliptical arc.
    Ellipse,
    /// Exact rational quadratic with unit weight.
    Parabola,
    /// Exact rational quadratic with weight above one.
    Hyperbola,
    /// Interpolating spline through sampled section points.
    Spline,
}

/// Rectangle in a surface's `(u, v)` chart restricting which part of the
/// section is returned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRect {
    /// `(start, end)` in u. A span of `2π` or more on a periodic
    /// direction means the full turn.
    pub u: (f64, f64),
    /// `(start, end)` in v.
    pub v: (f64, f64),
}

impl ParamRect {
    /// Rectangle from explicit ranges; each range is reordered if needed.
    pub fn new(u: (f64, f64), v: (f64, f64)) -> Self {
        Self {
            u: (u.0.min(u.1), u.0.max(u.1)),
            v: (v.0.min(v.1), v.0.max(v.1)),
        }
    }

    /// Full turn in u with the given v range.
    pub fn full_turn(v0: f64, v1: f64) -> Self {
        Self::new((0.0, std::f64::consts::TAU), (v0, v1))
    }

    /// True if `uv` lies inside, with `u` compared on the circle when the
    /// u range is a full turn.
    pub fn contains(&self, uv: &Point2, tol: f64) -> bool {
        let u_ok = conica_kernel_geom::angle_in_range(uv.x, self.u, tol).is_some();
        u_ok && uv.y >= self.v.0 - tol && uv.y <= self.v.1 + tol
    }
}

/// Tuning for plane-section construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionOptions {
    /// Linear tolerance: distance at which the plane counts as passing
    /// through the apex.
    pub precision: f64,
    /// Angular tolerance (radians) for the circle and parabola cases.
    pub angular: f64,
    /// Sample count for curves built by sampling, also the number of seam
    /// anchors in each [`SurfaceTrace`].
    pub samples: usize,
}

impl SectionOptions {
    /// Options with the given tolerances and the default sample count.
    pub fn from_tolerance(tol: &Tolerance) -> Self {
        Self {
            precision: tol.linear,
            angular: tol.angular,
            samples: 50,
        }
    }
}

impl Default for SectionOptions {
    fn default() -> Self {
        Self::from_tolerance(&Tolerance::DEFAULT)
    }
}

/// A section curve in 3D and in both charts.
///
/// For every `t` in [`DualCurve::domain`], `curve(t)` lies at
/// `surface.point_at(on_surface(t))` and `plane.point_at(on_plane(t))`.
#[derive(Debug, Clone)]
pub struct DualCurve {
    /// How the curve is represented.
    pub kind: SectionKind,
    /// The section in world coordinates.
    pub curve: Box<dyn Curve3d>,
    /// The section in the intersected surface's `(u, v)` chart.
    pub on_surface: Box<dyn Curve2d>,
    /// The section in the cutting plane's chart.
    pub on_plane: Box<dyn Curve2d>,
}

impl DualCurve {
    /// Shared parameter domain.
    pub fn domain(&self) -> (f64, f64) {
        self.curve.domain()
    }
}

/// Intersection with an infinite plane.
pub trait PlaneSection {
    /// Shape of the full, unbounded section.
    fn classify_plane(&self, plane: &Plane, options: &SectionOptions) -> ConicClass;

    /// Section curves inside `bounds`, built with [`NurbsCurveFactory`].
    fn plane_intersection(&self, plane: &Plane, bounds: &ParamRect, options: &SectionOptions) -> Vec<DualCurve> {
        self.plane_intersection_with(plane, bounds, options, &NurbsCurveFactory)
    }

    /// Section curves inside `bounds`, with 3D curves built by `factory`.
    fn plane_intersection_with(
        &self,
        plane: &Plane,
        bounds: &ParamRect,
        options: &SectionOptions,
        factory: &dyn CurveFactory,
    ) -> Vec<DualCurve>;
}

/// Image of a 3D curve lying on a surface, in that surface's `(u, v)` chart.
///
/// Points come from the surface's inverse map applied to the curve, so the
/// trace is exact wherever the curve lies on the surface. On a u-periodic
/// surface each u is shifted by whole periods toward the lifted u of the
/// nearest anchor, a set of evenly spaced parameters unwrapped once at
/// construction, which keeps the trace continuous across the seam.
#[derive(Debug, Clone)]
pub struct SurfaceTrace {
    surface: Box<dyn ParametricSurface>,
    curve: Box<dyn Curve3d>,
    anchors: Vec<f64>,
}

impl SurfaceTrace {
    /// Trace of `curve` on `surface`, lifted at `anchors` evenly spaced
    /// parameters with the first u placed nearest `u_start`.
    pub fn new(
        surface: Box<dyn ParametricSurface>,
        curve: Box<dyn Curve3d>,
        u_start: f64,
        anchors: usize,
    ) -> Self {
        let mut lifted = Vec::new();
        if let Some(period) = surface.u_period() {
            let (t0, t1) = curve.domain();
            let n = anchors.max(2);
            let mut reference = u_start;
            for i in 0..n {
                let t = t0 + (t1 - t0) * i as f64 / (n - 1) as f64;
                let u = surface.position_of(&curve.evaluate(t)).x;
                reference = u + period * ((reference - u) / period).round();
                lifted.push(reference);
            }
        }
        Self {
            surface,
            curve,
            anchors: lifted,
        }
    }

    fn lift(&self, t: f64, mut uv: Point2) -> Point2 {
        let (Some(period), Some(last)) = (self.surface.u_period(), self.anchors.len().checked_sub(1)) else {
            return uv;
        };
        let (t0, t1) = self.curve.domain();
        let k = if t1 > t0 {
            ((t - t0) / (t1 - t0) * last as f64).round().clamp(0.0, last as f64) as usize
        } else {
            0
        };
        uv.x += period * ((self.anchors[k] - uv.x) / period).round();
        uv
    }

    fn difference(&self, t: f64) -> Vec2 {
        let (t0, t1) = self.curve.domain();
        let h = 1e-7 * (t1 - t0).abs().max(1.0);
        let a = (t - h).max(t0);
        let b = (t + h).min(t1);
        if b - a <= 0.0 {
            return Vec2::zeros();
        }
        (self.evaluate(b) - self.evaluate(a)) / (b - a)
    }
}

impl Curve2d for SurfaceTrace {
    fn evaluate(&self, t: f64) -> Point2 {
        let uv = self.surface.position_of(&self.curve.evaluate(t));
        self.lift(t, uv)
    }

    /// Chain rule through the first fundamental form; falls back to a
    /// central difference where the chart is singular.
    fn tangent(&self, t: f64) -> Vec2 {
        let d = self.surface.derivatives(self.evaluate(t));
        let c = self.curve.tangent(t);
        let (e, f, g) = (d.du.dot(&d.du), d.du.dot(&d.dv), d.dv.dot(&d.dv));
        let det = e * g - f * f;
        if !(det > 1e-12 * e * g) {
            return self.difference(t);
        }
        let (a, b) = (d.du.dot(&c), d.dv.dot(&c));
        Vec2::new(g * a - f * b, e * b - f * a) / det
    }

    fn domain(&self) -> (f64, f64) {
        self.curve.domain()
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }
}
