//! Plane–plane sections.

use conica_kernel_geom::{CurveFactory, Line2d, ParametricSurface, Plane};
use conica_kernel_math::{Point2, Point3, Vec2};

use crate::{ConicClass, DualCurve, ParamRect, PlaneSection, SectionKind, SectionOptions};

/// Parameter range of `origin + t dir` inside the rectangle, or `None` if
/// the line misses it or the range is unbounded.
fn clip_to_rect(origin: &Point2, dir: &Vec2, rect: &ParamRect) -> Option<(f64, f64)> {
    let mut t0 = f64::NEG_INFINITY;
    let mut t1 = f64::INFINITY;
    for (o, d, (lo, hi)) in [(origin.x, dir.x, rect.u), (origin.y, dir.y, rect.v)] {
        if d.abs() < 1e-300 {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let (a, b) = ((lo - o) / d, (hi - o) / d);
        t0 = t0.max(a.min(b));
        t1 = t1.min(a.max(b));
    }
    (t0.is_finite() && t1.is_finite() && t1 > t0).then_some((t0, t1))
}

impl PlaneSection for Plane {
    fn classify_plane(&self, plane: &Plane, options: &SectionOptions) -> ConicClass {
        let dir = self.normal_dir.as_ref().cross(plane.normal_dir.as_ref());
        if dir.norm() <= options.angular.sin() {
            ConicClass::Empty
        } else {
            ConicClass::Line
        }
    }

    fn plane_intersection_with(
        &self,
        plane: &Plane,
        bounds: &ParamRect,
        options: &SectionOptions,
        factory: &dyn CurveFactory,
    ) -> Vec<DualCurve> {
        if self.classify_plane(plane, options) == ConicClass::Empty {
            tracing::trace!("parallel planes have no section line");
            return Vec::new();
        }
        let n1 = self.normal_dir.into_inner();
        let n2 = plane.normal_dir.into_inner();
        let dir = n1.cross(&n2);
        // point on both planes closest to the origin
        let (d1, d2) = (n1.dot(&self.origin.coords), n2.dot(&plane.origin.coords));
        let through = Point3::from((n2.cross(&dir) * d1 + dir.cross(&n1) * d2) / dir.norm_squared());

        let origin = self.project(&through);
        let chart_dir = self.project_vec(&dir);
        let Some((t0, t1)) = clip_to_rect(&origin, &chart_dir, bounds) else {
            tracing::debug!("section line misses the bounds");
            return Vec::new();
        };
        let start = self.point_at(origin + chart_dir * t0);
        let end = self.point_at(origin + chart_dir * t1);
        vec![DualCurve {
            kind: SectionKind::Line,
            curve: factory.line(start, end),
            on_surface: Box::new(Line2d::from_points(self.project(&start), self.project(&end))),
            on_plane: Box::new(Line2d::from_points(plane.project(&start), plane.project(&end))),
        }]
    }
}
