//! Conical surface defined entirely by its transform from the unit cone.

use std::any::Any;
use std::f64::consts::{FRAC_PI_2, PI};

use conica_kernel_math::{
    any_perpendicular, normalize_angle, AffineTransform2d, AffineTransform3d, Dir3, Point2,
    Point3, Vec2, Vec3,
};
use nalgebra::{Matrix2, Matrix3};
use serde::{Deserialize, Serialize, Serializer};

use crate::curve3d::Circle3d;
use crate::plane::Plane;
use crate::surface::{ParametricSurface, SurfaceDerivatives, SurfaceKind};
use crate::{GeomError, Result};

/// State of the v-origin carried over from legacy imports.
#[derive(Debug, Clone, Copy, PartialEq)]
enum VOrigin {
    Normalized,
    /// Stored parameters are shifted by this amount until
    /// [`ConicalSurface::normalize_v_origin`] is called.
    Pending(f64),
}

/// A double cone.
///
/// The unit cone has its apex at the origin, axis +Z, and a 45° half-angle:
/// `x² + y² = z²`. The surface's own placement, orientation, and half-angle
/// are all folded into `to_canonical` (unit → world):
///
/// ```text
/// P(u, v) = to_canonical · (v·cos u, v·sin u, v)
/// ```
///
/// `u ∈ [0, 2π)` is periodic. `v` is signed distance along the generator
/// from the apex for cones built by [`ConicalSurface::new`]; `v = 0` is the
/// apex singularity and `v < 0` is the opposite nappe.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ConeRecord")]
pub struct ConicalSurface {
    to_canonical: AffineTransform3d,
    to_unit: AffineTransform3d,
    v_origin: VOrigin,
}

#[derive(Serialize, Deserialize)]
struct ConeRecord {
    to_canonical: AffineTransform3d,
}

impl TryFrom<ConeRecord> for ConicalSurface {
    type Error = GeomError;

    fn try_from(record: ConeRecord) -> Result<Self> {
        Self::from_transform(record.to_canonical)
            .map_err(|e| GeomError::Serialization(e.to_string()))
    }
}

impl Serialize for ConicalSurface {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if let VOrigin::Pending(offset) = self.v_origin {
            return Err(serde::ser::Error::custom(GeomError::PendingVOffset(offset)));
        }
        ConeRecord {
            to_canonical: self.to_canonical,
        }
        .serialize(serializer)
    }
}

impl ConicalSurface {
    /// Cone with apex `apex`, `u = 0` along `dir_x`, `u = π/2` along
    /// `dir_y`, opening along `axis` with the given half-angle (radians).
    pub fn new(apex: Point3, dir_x: Vec3, dir_y: Vec3, axis: Vec3, half_angle: f64) -> Result<Self> {
        let (s, c) = half_angle.sin_cos();
        let linear = AffineTransform3d::fit_vectors(
            &[Vec3::x(), Vec3::y(), Vec3::z()],
            &[dir_x.normalize() * s, dir_y.normalize() * s, axis.normalize() * c],
        )?;
        Self::from_transform(AffineTransform3d::translation(apex.coords) * linear)
    }

    /// Cone around `axis` with an arbitrary `u = 0` direction.
    pub fn with_axis(apex: Point3, axis: Vec3, half_angle: f64) -> Result<Self> {
        let z = axis.normalize();
        let x = any_perpendicular(&z);
        Self::new(apex, x, z.cross(&x), z, half_angle)
    }

    /// Cone from an explicit unit → world transform.
    pub fn from_transform(to_canonical: AffineTransform3d) -> Result<Self> {
        let to_unit = to_canonical.inverse()?;
        Ok(Self {
            to_canonical,
            to_unit,
            v_origin: VOrigin::Normalized,
        })
    }

    /// Cone restored from a legacy record whose v parameters are shifted by
    /// `v_offset`. A non-zero offset stays pending until
    /// [`ConicalSurface::normalize_v_origin`] is called.
    pub fn from_legacy(to_canonical: AffineTransform3d, v_offset: f64) -> Result<Self> {
        let mut cone = Self::from_transform(to_canonical)?;
        if v_offset != 0.0 {
            cone.v_origin = VOrigin::Pending(v_offset);
        }
        Ok(cone)
    }

    /// The cone tangent to three planes, with the cone's axis on the side
    /// each plane normal points away from.
    ///
    /// Returns `None` if the planes do not meet in a single point or admit
    /// no such cone.
    pub fn from_tangent_planes(p1: &Plane, p2: &Plane, p3: &Plane) -> Option<Self> {
        let n = [p1.normal_dir, p2.normal_dir, p3.normal_dir];
        let rows = Matrix3::from_rows(&[
            n[0].as_ref().transpose(),
            n[1].as_ref().transpose(),
            n[2].as_ref().transpose(),
        ]);
        if rows.determinant().abs() < 1e-12 {
            return None;
        }
        let inv = rows.try_inverse()?;
        let offsets = Vec3::new(
            n[0].as_ref().dot(&p1.origin.coords),
            n[1].as_ref().dot(&p2.origin.coords),
            n[2].as_ref().dot(&p3.origin.coords),
        );
        let apex = Point3::from(inv * offsets);
        // unit axis â satisfies nᵢ·â = sin α for every plane
        let d = inv * Vec3::new(1.0, 1.0, 1.0);
        let len = d.norm();
        if !(len > 1.0 + 1e-12) {
            return None;
        }
        Self::with_axis(apex, d, (1.0 / len).asin()).ok()
    }

    /// The cone through two coaxial circles of different radii.
    ///
    /// Returns `None` for equal radii (a cylinder), coincident centers, or
    /// circles that do not share an axis.
    pub fn from_circles(c1: &Circle3d, c2: &Circle3d) -> Option<Self> {
        let along = c2.center - c1.center;
        let dist = along.norm();
        let dr = c1.radius - c2.radius;
        if dist < 1e-12 || dr.abs() < 1e-12 {
            return None;
        }
        let a = along / dist;
        if a.cross(c1.normal.as_ref()).norm() > 1e-9 || a.cross(c2.normal.as_ref()).norm() > 1e-9 {
            return None;
        }
        let apex = c1.center + along * (c1.radius / dr);
        let wide = if c1.radius > c2.radius { c1 } else { c2 };
        let axis = (wide.center - apex).normalize();
        let x = c1.x_dir.as_ref() - axis * c1.x_dir.as_ref().dot(&axis);
        let half_angle = (dr.abs() / dist).atan();
        Self::new(apex, x, axis.cross(&x), axis, half_angle).ok()
    }

    /// Unit → world transform.
    pub fn to_canonical(&self) -> &AffineTransform3d {
        &self.to_canonical
    }

    /// World → unit transform.
    pub fn to_unit(&self) -> &AffineTransform3d {
        &self.to_unit
    }

    /// Apex in world coordinates.
    pub fn apex(&self) -> Point3 {
        self.to_canonical.apply_point(&Point3::origin())
    }

    /// World direction of the unit +Z axis.
    pub fn axis(&self) -> Dir3 {
        Dir3::new_normalize(self.to_canonical.apply_vec(&Vec3::z()))
    }

    fn radial_scale(&self) -> f64 {
        self.to_canonical.apply_vec(&Vec3::x()).norm()
    }

    fn axial_scale(&self) -> f64 {
        self.to_canonical.apply_vec(&Vec3::z()).norm()
    }

    /// World half-angle, measured between the axis and the `u = 0`
    /// generator.
    pub fn half_angle(&self) -> f64 {
        self.radial_scale().atan2(self.axial_scale())
    }

    /// World length of one unit of `v` along a generator.
    pub fn generator_speed(&self) -> f64 {
        self.radial_scale().hypot(self.axial_scale())
    }

    /// True if the world cone has a circular cross-section (no shear or
    /// non-uniform scale in the transform).
    pub fn is_circular(&self, tol: f64) -> bool {
        let m = self.to_canonical.matrix();
        let (x, y, z) = (m.column(0), m.column(1), m.column(2));
        let rel = |a: f64, b: f64| a.abs() <= tol * b;
        rel(x.dot(&y), x.norm() * y.norm())
            && rel(x.dot(&z), x.norm() * z.norm())
            && rel(y.dot(&z), y.norm() * z.norm())
            && rel(x.norm() - y.norm(), x.norm())
    }

    /// True while a legacy v-offset awaits normalization.
    pub fn has_pending_v_offset(&self) -> bool {
        matches!(self.v_origin, VOrigin::Pending(_))
    }

    /// Fail with [`GeomError::PendingVOffset`] while a legacy offset is
    /// pending.
    pub fn ensure_normalized(&self) -> Result<()> {
        match self.v_origin {
            VOrigin::Normalized => Ok(()),
            VOrigin::Pending(offset) => Err(GeomError::PendingVOffset(offset)),
        }
    }

    /// Fold a pending legacy offset into the parameterization. Returns the
    /// map from the old `(u, v)` to the new one.
    pub fn normalize_v_origin(&mut self) -> AffineTransform2d {
        match std::mem::replace(&mut self.v_origin, VOrigin::Normalized) {
            VOrigin::Normalized => AffineTransform2d::identity(),
            VOrigin::Pending(offset) => AffineTransform2d::translation(Vec2::new(0.0, offset)),
        }
    }

    fn v_shift(&self) -> f64 {
        match self.v_origin {
            VOrigin::Normalized => 0.0,
            VOrigin::Pending(offset) => offset,
        }
    }

    /// Feet of the perpendiculars from `p` onto the two generators lying in
    /// the axial plane through `p`, as `(u, v)` pairs.
    ///
    /// The first foot is on the generator at `p`'s own angle, the second on
    /// the generator opposite it. Returns `None` for non-circular cones.
    pub fn perpendicular_feet(&self, p: &Point3) -> Option<[Point2; 2]> {
        if !self.is_circular(1e-9) {
            return None;
        }
        let apex = self.apex();
        let axis = self.axis().into_inner();
        let (s, c) = self.half_angle().sin_cos();
        let w = p - apex;
        let radial = w - axis * w.dot(&axis);
        let rho = if radial.norm() > 1e-14 {
            radial.normalize()
        } else {
            self.to_canonical.apply_vec(&Vec3::x()).normalize()
        };
        let near = axis * c + rho * s;
        let far = axis * c - rho * s;
        let foot = |g: &Vec3| self.position_of(&(apex + g * w.dot(g)));
        Some([foot(&near), foot(&far)])
    }
}

impl ParametricSurface for ConicalSurface {
    fn point_at(&self, uv: Point2) -> Point3 {
        let v = uv.y + self.v_shift();
        let (sin_u, cos_u) = uv.x.sin_cos();
        self.to_canonical
            .apply_point(&Point3::new(v * cos_u, v * sin_u, v))
    }

    fn position_of(&self, p: &Point3) -> Point2 {
        let q = self.to_unit.apply_point(p);
        let u = if q.z >= 0.0 {
            q.y.atan2(q.x)
        } else {
            (-q.y).atan2(-q.x)
        };
        Point2::new(normalize_angle(u), q.z - self.v_shift())
    }

    fn derivatives(&self, uv: Point2) -> SurfaceDerivatives {
        let v = uv.y + self.v_shift();
        let (sin_u, cos_u) = uv.x.sin_cos();
        let m = &self.to_canonical;
        SurfaceDerivatives {
            point: m.apply_point(&Point3::new(v * cos_u, v * sin_u, v)),
            du: m.apply_vec(&Vec3::new(-v * sin_u, v * cos_u, 0.0)),
            dv: m.apply_vec(&Vec3::new(cos_u, sin_u, 1.0)),
            duu: m.apply_vec(&Vec3::new(-v * cos_u, -v * sin_u, 0.0)),
            dvv: Vec3::zeros(),
            duv: m.apply_vec(&Vec3::new(-sin_u, cos_u, 0.0)),
        }
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        let mut v = uv.y + self.v_shift();
        if v.abs() < 1e-12 {
            v = 1.0;
        }
        let d = self.derivatives(Point2::new(uv.x, v - self.v_shift()));
        Dir3::new_normalize(d.du.cross(&d.dv))
    }

    fn u_period(&self) -> Option<f64> {
        Some(2.0 * PI)
    }

    fn v_period(&self) -> Option<f64> {
        None
    }

    fn u_singularities(&self) -> Vec<f64> {
        Vec::new()
    }

    fn v_singularities(&self) -> Vec<f64> {
        vec![-self.v_shift()]
    }

    fn modify(&mut self, t: &AffineTransform3d) -> Result<()> {
        let to_canonical = *t * self.to_canonical;
        let to_unit = to_canonical.inverse()?;
        self.to_canonical = to_canonical;
        self.to_unit = to_unit;
        Ok(())
    }

    /// Mirrors across the unit xz plane, so `u ↦ 2π - u`. The old seam
    /// `u = 0` maps to `2π`, the same generator as the new `u = 0`.
    fn reverse_orientation(&mut self) -> AffineTransform2d {
        let flip = AffineTransform3d::reflect_plane(&Point3::origin(), &Dir3::new_unchecked(Vec3::y()));
        self.to_canonical = self.to_canonical * flip;
        self.to_unit = flip * self.to_unit;
        AffineTransform2d::from_parts(Matrix2::new(-1.0, 0.0, 0.0, 1.0), Vec2::new(2.0 * PI, 0.0))
    }

    fn line_intersection(&self, origin: &Point3, direction: &Vec3) -> Vec<Point2> {
        let q = self.to_unit.apply_point(origin);
        let e = self.to_unit.apply_vec(direction);
        let a = e.x * e.x + e.y * e.y - e.z * e.z;
        let b = 2.0 * (q.x * e.x + q.y * e.y - q.z * e.z);
        let c = q.x * q.x + q.y * q.y - q.z * q.z;
        let scale = e.norm_squared();
        let roots = if a.abs() <= 1e-14 * scale {
            if b.abs() <= 1e-14 * scale.sqrt() * q.coords.norm().max(1.0) {
                Vec::new()
            } else {
                vec![-c / b]
            }
        } else {
            let disc = b * b - 4.0 * a * c;
            if disc < 0.0 {
                Vec::new()
            } else if disc == 0.0 {
                vec![-b / (2.0 * a)]
            } else {
                let sq = disc.sqrt();
                vec![(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)]
            }
        };
        roots
            .into_iter()
            .map(|t| self.position_of(&(origin + direction * t)))
            .collect()
    }

    /// Exact for the `v > 0` nappe: offsetting along the normal keeps the
    /// axis and half-angle and slides the apex along the axis.
    fn offset_surface(&self, distance: f64) -> Option<(Box<dyn ParametricSurface>, AffineTransform2d)> {
        if let VOrigin::Pending(offset) = self.v_origin {
            tracing::warn!(offset, "offset requested on cone with pending v-offset");
            return None;
        }
        if !self.is_circular(1e-9) {
            tracing::debug!("offset of a non-circular cone is not a cone");
            return None;
        }
        let alpha = self.half_angle();
        if !(alpha > 0.0 && alpha < FRAC_PI_2) {
            return None;
        }
        let d = distance * self.to_canonical.determinant().signum();
        let shift = self.axis().into_inner() * (-d / alpha.sin());
        let to_canonical = AffineTransform3d::translation(shift) * self.to_canonical;
        let cone = Self::from_transform(to_canonical).ok()?;
        let dv = d * alpha.cos() / (alpha.sin() * self.generator_speed());
        Some((Box::new(cone), AffineTransform2d::translation(Vec2::new(0.0, dv))))
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Cone
    }

    fn clone_box(&self) -> Box<dyn ParametricSurface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::FRAC_PI_4;

    fn unit_cone() -> ConicalSurface {
        ConicalSurface::new(Point3::origin(), Vec3::x(), Vec3::y(), Vec3::z(), FRAC_PI_4).unwrap()
    }

    fn close(a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < 1e-9
    }

    #[test]
    fn test_circle_at_height_ten() {
        let cone = unit_cone();
        let v = 10.0 / FRAC_PI_4.cos();
        for u in [0.0, 1.0, 2.5, 4.0] {
            let p = cone.point_at(Point2::new(u, v));
            assert!((p.z - 10.0).abs() < 1e-12);
            assert!((p.coords.xy().norm() - 10.0).abs() < 1e-12);
        }
        assert!(close(&cone.point_at(Point2::new(0.0, v)), &Point3::new(10.0, 0.0, 10.0)));
    }

    #[test]
    fn test_accessors() {
        let cone = ConicalSurface::with_axis(Point3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 2.0, 0.0), 0.3).unwrap();
        assert!(close(&cone.apex(), &Point3::new(1.0, 2.0, 3.0)));
        assert!((cone.axis().as_ref() - Vec3::y()).norm() < 1e-12);
        assert!((cone.half_angle() - 0.3).abs() < 1e-12);
        assert!((cone.generator_speed() - 1.0).abs() < 1e-12);
        assert!(cone.is_circular(1e-12));
    }

    #[test]
    fn test_negative_nappe_round_trip() {
        let cone = unit_cone();
        let uv = Point2::new(1.0, -3.0);
        let p = cone.point_at(uv);
        assert!(p.z < 0.0);
        let back = cone.position_of(&p);
        assert!((back - uv).norm() < 1e-12);
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let cone = ConicalSurface::with_axis(Point3::new(0.5, -1.0, 2.0), Vec3::new(1.0, 1.0, 1.0), 0.4).unwrap();
        let uv = Point2::new(0.8, 2.5);
        let h = 1e-6;
        let d = cone.derivatives(uv);
        let pu = (cone.point_at(Point2::new(uv.x + h, uv.y)) - cone.point_at(Point2::new(uv.x - h, uv.y))) / (2.0 * h);
        let pv = (cone.point_at(Point2::new(uv.x, uv.y + h)) - cone.point_at(Point2::new(uv.x, uv.y - h))) / (2.0 * h);
        assert!((d.du - pu).norm() < 1e-6);
        assert!((d.dv - pv).norm() < 1e-6);
        let du_at = |u: f64| cone.derivatives(Point2::new(u, uv.y)).du;
        let puu = (du_at(uv.x + h) - du_at(uv.x - h)) / (2.0 * h);
        assert!((d.duu - puu).norm() < 1e-6);
        let du_v = |v: f64| cone.derivatives(Point2::new(uv.x, v)).du;
        let puv = (du_v(uv.y + h) - du_v(uv.y - h)) / (2.0 * h);
        assert!((d.duv - puv).norm() < 1e-6);
        assert_eq!(d.dvv, Vec3::zeros());
    }

    #[test]
    fn test_normal_at_apex_is_finite() {
        let cone = unit_cone();
        let at_apex = cone.normal(Point2::new(0.0, 0.0));
        let at_one = cone.normal(Point2::new(0.0, 1.0));
        assert!((at_apex.as_ref() - at_one.as_ref()).norm() < 1e-12);
        let expected = Vec3::new(1.0, 0.0, -1.0).normalize();
        assert!((at_one.as_ref() - expected).norm() < 1e-12);
    }

    #[test]
    fn test_periodicity_and_singularities() {
        let cone = unit_cone();
        assert!(cone.is_u_periodic());
        assert!(!cone.is_v_periodic());
        assert_eq!(cone.u_period(), Some(2.0 * PI));
        assert!(cone.u_singularities().is_empty());
        assert_eq!(cone.v_singularities(), vec![0.0]);
    }

    #[test]
    fn test_modify_moves_and_keeps_cache_consistent() {
        let mut cone = unit_cone();
        let t = AffineTransform3d::translation(Vec3::new(0.0, 0.0, 5.0))
            * AffineTransform3d::rotation(&Dir3::new_normalize(Vec3::x()), 0.5);
        cone.modify(&t).unwrap();
        assert!(close(&cone.apex(), &Point3::new(0.0, 0.0, 5.0)));
        let uv = Point2::new(2.0, 3.0);
        assert!((cone.position_of(&cone.point_at(uv)) - uv).norm() < 1e-12);

        let flat = AffineTransform3d::directional_scale(&Dir3::new_normalize(Vec3::z()), 0.0);
        let before = cone.clone();
        assert!(cone.modify(&flat).is_err());
        assert_eq!(cone, before);
    }

    #[test]
    fn test_reverse_orientation() {
        let mut cone = unit_cone();
        let uv = Point2::new(1.0, 2.0);
        let p = cone.point_at(uv);
        let n_before = cone.normal(uv);
        let reparam = cone.reverse_orientation();
        let new_uv = reparam * uv;
        assert!(close(&cone.point_at(new_uv), &p));
        assert!((cone.normal(new_uv).as_ref() + n_before.as_ref()).norm() < 1e-12);

        // the seam maps one period up but names the same generator
        let seam = reparam * Point2::new(0.0, 2.0);
        assert!((seam.x - 2.0 * PI).abs() < 1e-15);
        assert!(close(&cone.point_at(seam), &cone.point_at(Point2::new(0.0, 2.0))));
        assert!(normalize_angle(seam.x) < 1e-12);
    }

    #[test]
    fn test_line_intersection() {
        let cone = unit_cone();
        let hits = cone.line_intersection(&Point3::new(-10.0, 0.0, 5.0), &Vec3::x());
        assert_eq!(hits.len(), 2);
        for uv in &hits {
            assert!((cone.point_at(*uv).z - 5.0).abs() < 1e-12);
        }
        // parallel to a generator: single root
        let hits = cone.line_intersection(&Point3::new(-1.0, 0.0, 0.0), &Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(hits.len(), 1);
        assert!(close(&cone.point_at(hits[0]), &Point3::new(-0.5, 0.0, 0.5)));
        assert!((hits[0].x - PI).abs() < 1e-12);
        // misses entirely
        assert!(cone
            .line_intersection(&Point3::new(0.0, 5.0, 0.0), &Vec3::new(1.0, 0.0, 0.0))
            .is_empty());
    }

    #[test]
    fn test_offset_surface_slides_apex() {
        let cone = unit_cone();
        let (off, reparam) = cone.offset_surface(1.0).unwrap();
        let uv = Point2::new(0.0, 2.0f64.sqrt());
        let p = cone.point_at(uv);
        let n = cone.normal(uv);
        let moved = p + n.as_ref() * 1.0;
        let mapped = reparam * uv;
        assert!(close(&off.point_at(mapped), &moved));
        let cone2 = off.as_any().downcast_ref::<ConicalSurface>().unwrap();
        assert!(close(&cone2.apex(), &Point3::new(0.0, 0.0, -(2.0f64.sqrt()))));
    }

    #[test]
    fn test_perpendicular_feet_are_two_distinct_generators() {
        let cone = unit_cone();
        let p = Point3::new(3.0, 0.0, 1.0);
        let feet = cone.perpendicular_feet(&p).unwrap();
        assert!((feet[0] - Point2::new(0.0, 8.0f64.sqrt())).norm() < 1e-12);
        assert!((feet[1].x - PI).abs() < 1e-12);
        assert!((feet[1].y + 2.0f64.sqrt()).abs() < 1e-12);
        for uv in feet {
            let f = cone.point_at(uv);
            let g = cone.derivatives(uv).dv;
            assert!((p - f).dot(&g).abs() < 1e-9);
        }
    }

    #[test]
    fn test_from_tangent_planes_recovers_cone() {
        let truth = ConicalSurface::new(Point3::new(1.0, 2.0, 3.0), Vec3::x(), Vec3::y(), Vec3::z(), FRAC_PI_4)
            .unwrap();
        let planes: Vec<Plane> = [0.0, 2.0 * PI / 3.0, 4.0 * PI / 3.0]
            .iter()
            .map(|u| {
                let uv = Point2::new(*u, 1.0);
                Plane::from_normal(truth.point_at(uv), truth.normal(uv).into_inner())
            })
            .collect();
        let cone = ConicalSurface::from_tangent_planes(&planes[0], &planes[1], &planes[2]).unwrap();
        assert!(close(&cone.apex(), &truth.apex()));
        assert!((cone.half_angle() - FRAC_PI_4).abs() < 1e-9);
        for uv in [Point2::new(0.3, 2.0), Point2::new(5.0, -1.5)] {
            let p = truth.point_at(uv);
            assert!(close(&cone.point_at(cone.position_of(&p)), &p));
        }
    }

    #[test]
    fn test_from_circles() {
        let c1 = Circle3d::new(Point3::origin(), 2.0);
        let c2 = Circle3d::new(Point3::new(0.0, 0.0, 1.0), 1.0);
        let cone = ConicalSurface::from_circles(&c1, &c2).unwrap();
        assert!(close(&cone.apex(), &Point3::new(0.0, 0.0, 2.0)));
        assert!((cone.half_angle() - FRAC_PI_4).abs() < 1e-12);
        let p = Point3::new(0.0, 2.0, 0.0);
        assert!(close(&cone.point_at(cone.position_of(&p)), &p));

        let same = Circle3d::new(Point3::new(0.0, 0.0, 1.0), 2.0);
        assert!(ConicalSurface::from_circles(&c1, &same).is_none());
        let concentric = Circle3d::new(Point3::origin(), 1.0);
        assert!(ConicalSurface::from_circles(&c1, &concentric).is_none());
        let skew = Circle3d::new(Point3::new(1.0, 0.0, 1.0), 1.0);
        assert!(ConicalSurface::from_circles(&c1, &skew).is_none());
    }

    #[test]
    fn test_legacy_offset_lifecycle() {
        let base = unit_cone();
        let mut legacy = ConicalSurface::from_legacy(*base.to_canonical(), 2.0).unwrap();
        assert!(legacy.has_pending_v_offset());
        assert_eq!(legacy.v_singularities(), vec![-2.0]);
        assert!(matches!(legacy.ensure_normalized(), Err(GeomError::PendingVOffset(_))));
        assert!(close(&legacy.point_at(Point2::new(1.0, 1.0)), &base.point_at(Point2::new(1.0, 3.0))));
        assert!(serde_json::to_string(&legacy).is_err());
        assert!(legacy.offset_surface(1.0).is_none());

        let reparam = legacy.normalize_v_origin();
        assert!(!legacy.has_pending_v_offset());
        let new_uv = reparam * Point2::new(1.0, 1.0);
        assert!(close(&legacy.point_at(new_uv), &base.point_at(Point2::new(1.0, 3.0))));
        assert_eq!(legacy.normalize_v_origin().mode(), conica_kernel_math::TransformMode::Identity);
    }

    #[test]
    fn test_serde_round_trip() {
        let cone = ConicalSurface::with_axis(Point3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 1.0), 0.6).unwrap();
        let json = serde_json::to_string(&cone).unwrap();
        let back: ConicalSurface = serde_json::from_str(&json).unwrap();
        assert!(back.to_canonical().approx_eq(cone.to_canonical(), 1e-15));
        assert!(back.to_unit().approx_eq(cone.to_unit(), 1e-12));

        let singular = r#"{"to_canonical":{"matrix":[0,0,0,0,0,0,0,0,0],"translation":[0,0,0],"mode":"Other"}}"#;
        assert!(serde_json::from_str::<ConicalSurface>(singular).is_err());
    }

    proptest! {
        #[test]
        fn prop_point_position_round_trip(
            ax in -1.0f64..1.0, ay in -1.0f64..1.0, az in 0.2f64..1.0,
            half_angle in 0.05f64..1.5,
            u in 0.0f64..(2.0 * PI),
            v in prop_oneof![-50.0f64..-0.01, 0.01f64..50.0],
        ) {
            let cone = ConicalSurface::with_axis(Point3::new(1.0, -2.0, 0.5), Vec3::new(ax, ay, az), half_angle).unwrap();
            let back = cone.position_of(&cone.point_at(Point2::new(u, v)));
            let du = (back.x - u).abs();
            prop_assert!(du.min(2.0 * PI - du) < 1e-8);
            prop_assert!((back.y - v).abs() < 1e-8 * v.abs().max(1.0));
        }
    }
}
