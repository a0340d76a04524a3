//! The parametric-surface contract shared by planes and cones.

use std::any::Any;

use conica_kernel_math::{AffineTransform2d, AffineTransform3d, Dir3, Point2, Point3, Vec3};

use crate::Result;

/// The kind of a surface (for match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Infinite plane.
    Plane,
    /// Conical surface.
    Cone,
}

/// Point and partial derivatives of a surface at one `(u, v)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceDerivatives {
    /// `P(u, v)`.
    pub point: Point3,
    /// `∂P/∂u`.
    pub du: Vec3,
    /// `∂P/∂v`.
    pub dv: Vec3,
    /// `∂²P/∂u²`.
    pub duu: Vec3,
    /// `∂²P/∂v²`.
    pub dvv: Vec3,
    /// `∂²P/∂u∂v`.
    pub duv: Vec3,
}

/// A parametric surface mapping `(u, v)` to 3D and back.
pub trait ParametricSurface: Send + Sync + std::fmt::Debug {
    /// Evaluate the surface at `(u, v)`.
    fn point_at(&self, uv: Point2) -> Point3;

    /// Parameters of the surface point nearest `p` (exact for points on the
    /// surface).
    fn position_of(&self, p: &Point3) -> Point2;

    /// Point and first/second partial derivatives at `(u, v)`.
    fn derivatives(&self, uv: Point2) -> SurfaceDerivatives;

    /// Unit normal `∂P/∂u × ∂P/∂v` at `(u, v)`.
    fn normal(&self, uv: Point2) -> Dir3;

    /// Period in u, if periodic.
    fn u_period(&self) -> Option<f64>;

    /// Period in v, if periodic.
    fn v_period(&self) -> Option<f64>;

    /// True if u wraps around.
    fn is_u_periodic(&self) -> bool {
        self.u_period().is_some()
    }

    /// True if v wraps around.
    fn is_v_periodic(&self) -> bool {
        self.v_period().is_some()
    }

    /// u values whose iso-line collapses to a point.
    fn u_singularities(&self) -> Vec<f64>;

    /// v values whose iso-line collapses to a point.
    fn v_singularities(&self) -> Vec<f64>;

    /// Apply `t` in place. Fails, leaving the surface unchanged, if the
    /// result cannot be inverted.
    fn modify(&mut self, t: &AffineTransform3d) -> Result<()>;

    /// Flip the surface normal. Returns the map from old to new `(u, v)`.
    ///
    /// On a u-periodic surface the mapped u may fall one period outside the
    /// stored range; wrap it with `normalize_angle` if a canonical value is
    /// needed.
    fn reverse_orientation(&mut self) -> AffineTransform2d;

    /// Parameters of every point where the infinite line through `origin`
    /// along `direction` meets the surface.
    fn line_intersection(&self, origin: &Point3, direction: &Vec3) -> Vec<Point2>;

    /// The surface at constant distance `distance` along the normal, with
    /// the map from this surface's `(u, v)` to the offset surface's.
    fn offset_surface(&self, distance: f64) -> Option<(Box<dyn ParametricSurface>, AffineTransform2d)>;

    /// The kind of this surface.
    fn kind(&self) -> SurfaceKind;

    /// Clone this surface into a boxed trait object.
    fn clone_box(&self) -> Box<dyn ParametricSurface>;

    /// Downcast to a concrete type via `Any`.
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn ParametricSurface> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
