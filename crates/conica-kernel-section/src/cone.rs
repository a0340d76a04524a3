//! Plane sections of a [`ConicalSurface`].
//!
//! Everything is computed in the cone's unit frame, where the surface is
//! `x² + y² = z²` and `v` is the z coordinate. A plane `n·q = k` that
//! misses the apex meets the generator at angle `u` where
//!
//! ```text
//! v(u) = k / (n_x cos u + n_y sin u + n_z) = k / (ρ cos(u - φ) + n_z)
//! ```
//!
//! so every bound on v turns into a window on `cos(u - φ)`, and the
//! admissible parts of the section are arcs in u. Each arc becomes one
//! curve: an elliptical arc for closed sections, an exact rational
//! quadratic through its end points for open ones.

use std::f64::consts::{FRAC_PI_4, PI, TAU};

use conica_kernel_geom::{
    angle_in_range, ConicalSurface, Curve2d, Curve3d, CurveFactory, Ellipse2d, Line2d,
    ParametricSurface, Plane,
};
use conica_kernel_math::{Point2, Point3, Vec2, Vec3};
use conica_kernel_nurbs::NurbsCurve2;

use crate::arcs::{self, Arc};
use crate::{ConicClass, DualCurve, ParamRect, PlaneSection, SectionKind, SectionOptions, SurfaceTrace};

/// The cutting plane expressed in the cone's unit frame.
#[derive(Debug, Clone, Copy)]
struct UnitPlane {
    normal: Vec3,
    offset: f64,
    rho: f64,
    phi: f64,
}

impl UnitPlane {
    fn new(cone: &ConicalSurface, plane: &Plane) -> Option<Self> {
        let to_unit = cone.to_unit();
        let x = to_unit.apply_vec(plane.x_dir.as_ref());
        let y = to_unit.apply_vec(plane.y_dir.as_ref());
        let n = x.cross(&y);
        let len = n.norm();
        if !(len > 1e-300) || !len.is_finite() {
            return None;
        }
        let normal = n / len;
        let offset = normal.dot(&to_unit.apply_point(&plane.origin).coords);
        if !offset.is_finite() {
            return None;
        }
        Some(Self {
            normal,
            offset,
            rho: normal.x.hypot(normal.y),
            phi: normal.y.atan2(normal.x),
        })
    }

    /// Angle between the plane normal and the cone axis, folded to `[0, π/2]`.
    fn tilt(&self) -> f64 {
        self.rho.atan2(self.normal.z.abs())
    }

    fn denominator(&self, u: f64) -> f64 {
        let (s, c) = u.sin_cos();
        self.normal.x * c + self.normal.y * s + self.normal.z
    }

    /// Section point on the generator at `u`.
    fn point(&self, u: f64) -> Point3 {
        let v = self.offset / self.denominator(u);
        let (s, c) = u.sin_cos();
        Point3::new(v * c, v * s, v)
    }

    /// u-arcs where the section lies on the nappe `sign` with
    /// `|v| ∈ [near, far]`.
    fn nappe_window(&self, sign: f64, near: f64, far: f64) -> Vec<Arc> {
        let s = self.offset * sign;
        let d_near = if near > 0.0 { s / near } else { s.signum() * f64::INFINITY };
        let d_far = if far.is_finite() { s / far } else { 0.0 };
        let (lo, hi) = (d_near.min(d_far), d_near.max(d_far));
        let nz = self.normal.z;
        arcs::shifted(arcs::cos_window((lo - nz) / self.rho, (hi - nz) / self.rho), self.phi)
    }
}

/// Unit-frame gradient of `x² + y² - z²`.
fn cone_gradient(p: &Point3) -> Vec3 {
    Vec3::new(2.0 * p.x, 2.0 * p.y, -2.0 * p.z)
}

/// Parameters `λ` where `origin + λ dir` lies on the unit cone.
fn unit_cone_hits(origin: &Point3, dir: &Vec3) -> Vec<f64> {
    let a = dir.x * dir.x + dir.y * dir.y - dir.z * dir.z;
    let b = 2.0 * (origin.x * dir.x + origin.y * dir.y - origin.z * dir.z);
    let c = origin.x * origin.x + origin.y * origin.y - origin.z * origin.z;
    if a.abs() <= 1e-14 * dir.norm_squared() {
        return if b.abs() > 1e-300 { vec![-c / b] } else { Vec::new() };
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }
    let sq = disc.sqrt();
    vec![(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)]
}

/// Per-call state shared by the construction helpers.
struct Section<'a> {
    cone: &'a ConicalSurface,
    plane: &'a Plane,
    unit: UnitPlane,
    bounds: &'a ParamRect,
    options: &'a SectionOptions,
    factory: &'a dyn CurveFactory,
}

impl Section<'_> {
    fn world(&self, p: &Point3) -> Point3 {
        self.cone.to_canonical().apply_point(p)
    }

    fn world_vec(&self, v: &Vec3) -> Vec3 {
        self.cone.to_canonical().apply_vec(v)
    }

    fn chart(&self, p: &Point3) -> Vec2 {
        self.plane.project(p).coords
    }

    fn on_surface(&self, curve: &dyn Curve3d, u_start: f64) -> Box<dyn Curve2d> {
        Box::new(SurfaceTrace::new(
            Box::new(self.cone.clone()),
            curve.clone_box(),
            u_start,
            self.options.samples,
        ))
    }

    /// Generator lines through the apex at the given angles, clipped to the
    /// v bounds.
    fn generators(&self, angles: &[f64]) -> Vec<DualCurve> {
        let (v0, v1) = self.bounds.v;
        if !(v0.is_finite() && v1.is_finite()) || v1 - v0 <= self.options.precision {
            tracing::debug!(v0, v1, "generator section needs a finite v range");
            return Vec::new();
        }
        angles
            .iter()
            .filter_map(|&u| angle_in_range(u, self.bounds.u, self.options.angular))
            .map(|u| {
                let start = self.cone.point_at(Point2::new(u, v0));
                let end = self.cone.point_at(Point2::new(u, v1));
                DualCurve {
                    kind: SectionKind::Line,
                    curve: self.factory.line(start, end),
                    on_surface: Box::new(Line2d::from_points(Point2::new(u, v0), Point2::new(u, v1))),
                    on_plane: Box::new(Line2d::from_points(self.plane.project(&start), self.plane.project(&end))),
                }
            })
            .collect()
    }

    /// Plane perpendicular to the unit axis: the section is the parallel
    /// circle at `v = k / n_z`, parameterized directly by u.
    fn parallel(&self) -> Vec<DualCurve> {
        let h = self.unit.offset / self.unit.normal.z;
        let (v0, v1) = self.bounds.v;
        if h < v0 - self.options.precision || h > v1 + self.options.precision {
            return Vec::new();
        }
        let center = self.world(&Point3::new(0.0, 0.0, h));
        let axis_a = self.world_vec(&Vec3::new(h, 0.0, 0.0));
        let axis_b = self.world_vec(&Vec3::new(0.0, h, 0.0));
        let circular = self.cone.is_circular(1e-9);
        let on_plane_center = self.plane.project(&center);
        let (pa, pb) = (self.plane.project_vec(&axis_a), self.plane.project_vec(&axis_b));

        arcs::bound_arcs(self.bounds.u)
            .into_iter()
            .map(|range| {
                let (kind, curve) = if circular {
                    (
                        SectionKind::Circle,
                        self.factory.circle(center, axis_a, axis_b, axis_a.norm(), range),
                    )
                } else {
                    (SectionKind::Ellipse, self.factory.ellipse(center, axis_a, axis_b, range))
                };
                DualCurve {
                    kind,
                    curve,
                    on_surface: Box::new(Line2d::new(Point2::new(0.0, h), Vec2::x(), range)),
                    on_plane: Box::new(Ellipse2d::new(on_plane_center, pa, pb, range)),
                }
            })
            .collect()
    }

    /// u-arcs of the section inside the bounds, per nappe.
    fn windows(&self) -> Vec<Arc> {
        let (v0, v1) = self.bounds.v;
        let mut window = Vec::new();
        if v1 > 0.0 {
            window.extend(self.unit.nappe_window(1.0, v0.max(0.0), v1));
        }
        if v0 < 0.0 {
            window.extend(self.unit.nappe_window(-1.0, (-v1).max(0.0), -v0));
        }
        arcs::intersect(&window, &arcs::bound_arcs(self.bounds.u))
    }

    /// Closed section: the ellipse through the generators at `φ` and
    /// `φ + π`, parameterized so that `t = 0` sits at `u = φ` and `t`
    /// increases with u.
    fn ellipse(&self, pieces: &[Arc]) -> Vec<DualCurve> {
        let up = &self.unit;
        let a_pt = up.point(up.phi);
        let b_pt = up.point(up.phi + PI);
        let center = Point3::from((a_pt.coords + b_pt.coords) * 0.5);
        let axis_a = a_pt - center;
        let radial = center.x.hypot(center.y);
        let minor_sq = center.z * center.z - radial * radial;
        if !(minor_sq > 0.0) || !(axis_a.norm() > 0.0) {
            tracing::debug!(minor_sq, "degenerate ellipse section");
            return Vec::new();
        }
        let (sin_phi, cos_phi) = up.phi.sin_cos();
        let axis_b = Vec3::new(-sin_phi, cos_phi, 0.0) * (minor_sq.sqrt() * a_pt.z.signum());

        let param_of = |u: f64| {
            let d = up.point(u) - center;
            let raw = (d.dot(&axis_b) / axis_b.norm_squared()).atan2(d.dot(&axis_a) / axis_a.norm_squared());
            let target = u - up.phi;
            raw + TAU * ((target - raw) / TAU).round()
        };

        let world_center = self.world(&center);
        let (wa, wb) = (self.world_vec(&axis_a), self.world_vec(&axis_b));
        let plane_center = self.plane.project(&world_center);
        let (pa, pb) = (self.plane.project_vec(&wa), self.plane.project_vec(&wb));

        pieces
            .iter()
            .map(|&(ua, ub)| {
                let t0 = param_of(ua);
                let t1 = if arcs::is_full(&(ua, ub)) { t0 + TAU } else { param_of(ub) };
                let t1 = if t1 <= t0 { t1 + TAU } else { t1 };
                let curve = self.factory.ellipse(world_center, wa, wb, (t0, t1));
                let on_surface = self.on_surface(curve.as_ref(), ua);
                DualCurve {
                    kind: SectionKind::Ellipse,
                    curve,
                    on_surface,
                    on_plane: Box::new(Ellipse2d::new(plane_center, pa, pb, (t0, t1))),
                }
            })
            .collect()
    }

    /// Open section piece between `u = ua` and `u = ub` as an exact rational
    /// quadratic: end points, the meeting point of their tangents, and the
    /// shoulder weight where the chord-midpoint ray crosses the cone.
    fn open_arc(&self, (ua, ub): Arc, class: ConicClass) -> Option<DualCurve> {
        let up = &self.unit;
        let p0 = up.point(ua);
        let p2 = up.point(ub);
        let t0 = up.normal.cross(&cone_gradient(&p0));
        let t2 = up.normal.cross(&cone_gradient(&p2));
        let cross = t0.cross(&t2);
        let denom = cross.norm_squared();
        if !(denom > 1e-24 * t0.norm_squared() * t2.norm_squared()) {
            tracing::debug!(ua, ub, "parallel end tangents, sampling instead");
            return self.sampled_arc((ua, ub));
        }
        let s = (p2 - p0).cross(&t2).dot(&cross) / denom;
        let p1 = p0 + t0 * s;

        let weight = if class == ConicClass::Parabola {
            1.0
        } else {
            let mid = Point3::from((p0.coords + p2.coords) * 0.5);
            let shoulder = unit_cone_hits(&mid, &(p1 - mid))
                .into_iter()
                .find(|l| *l > 1e-12 && *l < 1.0 - 1e-12);
            match shoulder {
                Some(l) => l / (1.0 - l),
                None => {
                    tracing::debug!(ua, ub, "no shoulder point, sampling instead");
                    return self.sampled_arc((ua, ub));
                }
            }
        };

        let (w0, w1, w2) = (self.world(&p0), self.world(&p1), self.world(&p2));
        let curve = self.factory.conic_arc(w0, w1, w2, weight);
        let on_plane = NurbsCurve2::conic_arc(self.chart(&w0), self.chart(&w1), self.chart(&w2), weight);
        let on_surface = self.on_surface(curve.as_ref(), ua);
        let kind = if class == ConicClass::Parabola {
            SectionKind::Parabola
        } else {
            SectionKind::Hyperbola
        };
        Some(DualCurve {
            kind,
            curve,
            on_surface,
            on_plane: Box::new(on_plane),
        })
    }

    /// Interpolating spline through section points evenly spaced in u.
    fn sampled_arc(&self, (ua, ub): Arc) -> Option<DualCurve> {
        let n = self.options.samples.max(4);
        let params: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
        let points: Vec<Point3> = params
            .iter()
            .map(|t| self.world(&self.unit.point(ua + (ub - ua) * t)))
            .collect();
        let curve = self.factory.spline_through(&points, &params, 3)?;
        let charted: Vec<Vec2> = points.iter().map(|p| self.chart(p)).collect();
        let on_plane = NurbsCurve2::interpolate(&charted, &params, 3)?;
        let on_surface = self.on_surface(curve.as_ref(), ua);
        Some(DualCurve {
            kind: SectionKind::Spline,
            curve,
            on_surface,
            on_plane: Box::new(on_plane),
        })
    }
}

fn classify(cone: &ConicalSurface, plane: &Plane, unit: &UnitPlane, options: &SectionOptions) -> ConicClass {
    let tilt = unit.tilt();
    let through_apex = plane.signed_distance(&cone.apex()).abs() <= options.precision;
    if through_apex {
        if tilt < FRAC_PI_4 - options.angular {
            ConicClass::Point
        } else if tilt <= FRAC_PI_4 + options.angular {
            ConicClass::Line
        } else {
            ConicClass::LinePair
        }
    } else if tilt <= options.angular {
        if cone.is_circular(1e-9) {
            ConicClass::Circle
        } else {
            ConicClass::Ellipse
        }
    } else if tilt < FRAC_PI_4 - options.angular {
        ConicClass::Ellipse
    } else if tilt <= FRAC_PI_4 + options.angular {
        ConicClass::Parabola
    } else {
        ConicClass::Hyperbola
    }
}

impl PlaneSection for ConicalSurface {
    fn classify_plane(&self, plane: &Plane, options: &SectionOptions) -> ConicClass {
        match UnitPlane::new(self, plane) {
            Some(unit) => classify(self, plane, &unit, options),
            None => ConicClass::Empty,
        }
    }

    fn plane_intersection_with(
        &self,
        plane: &Plane,
        bounds: &ParamRect,
        options: &SectionOptions,
        factory: &dyn CurveFactory,
    ) -> Vec<DualCurve> {
        if let Err(err) = self.ensure_normalized() {
            tracing::warn!(%err, "plane section refused");
            return Vec::new();
        }
        let Some(unit) = UnitPlane::new(self, plane) else {
            tracing::warn!("plane section with a degenerate or non-finite plane");
            return Vec::new();
        };
        let class = classify(self, plane, &unit, options);
        tracing::trace!(?class, tilt = unit.tilt(), offset = unit.offset, "cone plane section");

        let section = Section {
            cone: self,
            plane,
            unit,
            bounds,
            options,
            factory,
        };
        match class {
            ConicClass::Empty | ConicClass::Point => Vec::new(),
            // tangent plane: the contact generator faces away from the normal
            ConicClass::Line if unit.normal.z > 0.0 => section.generators(&[unit.phi + PI]),
            ConicClass::Line => section.generators(&[unit.phi]),
            ConicClass::LinePair => {
                let spread = (-unit.normal.z / unit.rho).clamp(-1.0, 1.0).acos();
                section.generators(&[unit.phi - spread, unit.phi + spread])
            }
            ConicClass::Circle => section.parallel(),
            ConicClass::Ellipse if unit.rho <= 1e-15 => section.parallel(),
            ConicClass::Ellipse => section.ellipse(&section.windows()),
            ConicClass::Parabola | ConicClass::Hyperbola => {
                let (v0, v1) = bounds.v;
                if !(v0.is_finite() && v1.is_finite()) {
                    tracing::debug!(?class, "open section needs a finite v range");
                    return Vec::new();
                }
                section
                    .windows()
                    .into_iter()
                    .filter_map(|piece| section.open_arc(piece, class))
                    .collect()
            }
        }
    }
}
