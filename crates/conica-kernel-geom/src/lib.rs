#![warn(missing_docs)]

//! Analytic surface and curve types for the conica kernel.
//!
//! Provides trait-based abstractions for parametric surfaces and curves,
//! with the concrete types the plane-section and tangency solvers need:
//! planes and cones in 3D, lines, circles, ellipses, and polylines in 2D,
//! and the [`CurveFactory`] seam through which callers materialize
//! intersection results as their own curve objects.

mod cone;
mod curve2d;
mod curve3d;
mod error;
mod factory;
mod intersect2d;
mod plane;
mod surface;

pub use cone::ConicalSurface;
pub use curve2d::{
    angle_in_range, closest_point, foot_params, Circle2d, Curve2d, CurveShape2d, Ellipse2d,
    Line2d, Polyline2d, TrimmedCurve2d,
};
pub use curve3d::{Circle3d, Curve3d, CurveKind, Ellipse3d, Line3d};
pub use error::{GeomError, Result};
pub use factory::CurveFactory;
pub use intersect2d::{intersect_curves, CurveHit};
pub use plane::Plane;
pub use surface::{ParametricSurface, SurfaceDerivatives, SurfaceKind};
