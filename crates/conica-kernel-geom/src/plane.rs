//! Infinite planes with an orthonormal chart.

use std::any::Any;

use conica_kernel_math::{
    any_perpendicular, AffineTransform2d, AffineTransform3d, Dir3, MathError, Point2, Point3,
    Vec2, Vec3,
};
use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

use crate::surface::{ParametricSurface, SurfaceDerivatives, SurfaceKind};
use crate::Result;

/// An infinite plane defined by an origin point and a coordinate frame.
///
/// Parameterization: `P(u, v) = origin + u * x_dir + v * y_dir`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Origin point on the plane.
    pub origin: Point3,
    /// Unit vector along the u direction.
    pub x_dir: Dir3,
    /// Unit vector along the v direction.
    pub y_dir: Dir3,
    /// Unit normal (x_dir × y_dir).
    pub normal_dir: Dir3,
}

impl Plane {
    /// Create a plane from origin and two direction vectors.
    /// The vectors need not be normalized; `y_dir` is re-orthogonalized
    /// against `x_dir`.
    pub fn new(origin: Point3, x_dir: Vec3, y_dir: Vec3) -> Self {
        let x = Dir3::new_normalize(x_dir);
        let y = Dir3::new_normalize(y_dir - y_dir.dot(x.as_ref()) * x.as_ref());
        let n = Dir3::new_normalize(x.as_ref().cross(y.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal_dir: n,
        }
    }

    /// Create a plane from origin and normal. X/Y directions are chosen arbitrarily.
    pub fn from_normal(origin: Point3, normal: Vec3) -> Self {
        let n = Dir3::new_normalize(normal);
        let x = Dir3::new_normalize(any_perpendicular(n.as_ref()));
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal_dir: n,
        }
    }

    /// XY plane at the origin.
    pub fn xy() -> Self {
        Self::new(Point3::origin(), Vec3::x(), Vec3::y())
    }

    /// Project a 3D point onto this plane's (u, v) parameter space.
    pub fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(d.dot(self.x_dir.as_ref()), d.dot(self.y_dir.as_ref()))
    }

    /// Signed distance from a point to this plane.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        (p - self.origin).dot(self.normal_dir.as_ref())
    }

    /// Project a 3D vector into the plane's chart.
    pub fn project_vec(&self, v: &Vec3) -> Vec2 {
        Vec2::new(v.dot(self.x_dir.as_ref()), v.dot(self.y_dir.as_ref()))
    }
}

impl ParametricSurface for Plane {
    fn point_at(&self, uv: Point2) -> Point3 {
        self.origin + uv.x * self.x_dir.as_ref() + uv.y * self.y_dir.as_ref()
    }

    fn position_of(&self, p: &Point3) -> Point2 {
        self.project(p)
    }

    fn derivatives(&self, uv: Point2) -> SurfaceDerivatives {
        SurfaceDerivatives {
            point: self.point_at(uv),
            du: *self.x_dir.as_ref(),
            dv: *self.y_dir.as_ref(),
            duu: Vec3::zeros(),
            dvv: Vec3::zeros(),
            duv: Vec3::zeros(),
        }
    }

    fn normal(&self, _uv: Point2) -> Dir3 {
        self.normal_dir
    }

    fn u_period(&self) -> Option<f64> {
        None
    }

    fn v_period(&self) -> Option<f64> {
        None
    }

    fn u_singularities(&self) -> Vec<f64> {
        Vec::new()
    }

    fn v_singularities(&self) -> Vec<f64> {
        Vec::new()
    }

    fn modify(&mut self, t: &AffineTransform3d) -> Result<()> {
        let x = t.apply_vec(self.x_dir.as_ref());
        let y = t.apply_vec(self.y_dir.as_ref());
        let n = x.cross(&y);
        if !(n.norm() > 1e-16) {
            return Err(MathError::SingularTransform {
                determinant: t.determinant(),
            }
            .into());
        }
        *self = Plane::new(t.apply_point(&self.origin), x, y);
        Ok(())
    }

    fn reverse_orientation(&mut self) -> AffineTransform2d {
        self.y_dir = -self.y_dir;
        self.normal_dir = -self.normal_dir;
        AffineTransform2d::from_parts(Matrix2::new(1.0, 0.0, 0.0, -1.0), Vec2::zeros())
    }

    fn line_intersection(&self, origin: &Point3, direction: &Vec3) -> Vec<Point2> {
        let denom = direction.dot(self.normal_dir.as_ref());
        if denom.abs() < 1e-15 * direction.norm() {
            return Vec::new();
        }
        let t = -self.signed_distance(origin) / denom;
        vec![self.project(&(origin + direction * t))]
    }

    fn offset_surface(&self, distance: f64) -> Option<(Box<dyn ParametricSurface>, AffineTransform2d)> {
        let mut moved = self.clone();
        moved.origin += self.normal_dir.as_ref() * distance;
        Some((Box::new(moved), AffineTransform2d::identity()))
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Plane
    }

    fn clone_box(&self) -> Box<dyn ParametricSurface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
