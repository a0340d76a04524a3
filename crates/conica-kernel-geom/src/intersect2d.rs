//! Curve–curve intersection in the plane.
//!
//! Line and circle pairs are solved in closed form; every other pair is
//! bracketed on sampled polylines and refined by Newton iteration on both
//! parameters.

use conica_kernel_math::{Point2, Vec2};

use crate::curve2d::{angle_in_range, Curve2d, CurveShape2d};

/// Segments per curve when bracketing general intersections.
const BRACKET_SEGMENTS: usize = 96;

/// One intersection between curves `a` and `b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveHit {
    /// Intersection point.
    pub point: Point2,
    /// Parameter on the first curve.
    pub ta: f64,
    /// Parameter on the second curve.
    pub tb: f64,
}

/// All intersections between two bounded curves.
///
/// Parallel or coincident lines and concentric circles yield no hits.
pub fn intersect_curves(a: &dyn Curve2d, b: &dyn Curve2d, tol: f64) -> Vec<CurveHit> {
    let hits = match (a.shape(), b.shape()) {
        (
            CurveShape2d::Line { origin: oa, direction: da },
            CurveShape2d::Line { origin: ob, direction: db },
        ) => line_line(oa, da, a.domain(), ob, db, b.domain(), tol),
        (CurveShape2d::Line { origin, direction }, CurveShape2d::Circle { center, radius }) => {
            line_circle(origin, direction, a.domain(), center, radius, b.domain(), tol)
        }
        (CurveShape2d::Circle { center, radius }, CurveShape2d::Line { origin, direction }) => {
            line_circle(origin, direction, b.domain(), center, radius, a.domain(), tol)
                .into_iter()
                .map(|h| CurveHit {
                    point: h.point,
                    ta: h.tb,
                    tb: h.ta,
                })
                .collect()
        }
        (
            CurveShape2d::Circle { center: ca, radius: ra },
            CurveShape2d::Circle { center: cb, radius: rb },
        ) => circle_circle(ca, ra, a.domain(), cb, rb, b.domain(), tol),
        _ => general(a, b, tol),
    };
    dedup_hits(hits, tol)
}

fn in_range(t: f64, range: (f64, f64), eps: f64) -> Option<f64> {
    (t >= range.0 - eps && t <= range.1 + eps).then(|| t.max(range.0).min(range.1))
}

fn line_line(
    oa: Point2,
    da: Vec2,
    ra: (f64, f64),
    ob: Point2,
    db: Vec2,
    rb: (f64, f64),
    tol: f64,
) -> Vec<CurveHit> {
    let cross = da.perp(&db);
    if cross.abs() <= 1e-12 * da.norm() * db.norm() {
        return Vec::new();
    }
    let w = ob - oa;
    let s = w.perp(&db) / cross;
    let t = w.perp(&da) / cross;
    let (Some(s), Some(t)) = (
        in_range(s, ra, tol / da.norm()),
        in_range(t, rb, tol / db.norm()),
    ) else {
        return Vec::new();
    };
    vec![CurveHit {
        point: oa + da * s,
        ta: s,
        tb: t,
    }]
}

fn line_circle(
    origin: Point2,
    direction: Vec2,
    line_range: (f64, f64),
    center: Point2,
    radius: f64,
    arc_range: (f64, f64),
    tol: f64,
) -> Vec<CurveHit> {
    let a = direction.norm_squared();
    if !(a > 0.0) {
        return Vec::new();
    }
    let w = origin - center;
    let b = 2.0 * w.dot(&direction);
    let c = w.norm_squared() - radius * radius;
    let disc = b * b - 4.0 * a * c;
    // tangency within tolerance counts as a single touching point
    let foot = -b / (2.0 * a);
    let gap = (w + direction * foot).norm() - radius;
    let roots: Vec<f64> = if disc < 0.0 {
        if gap.abs() <= tol {
            vec![foot]
        } else {
            return Vec::new();
        }
    } else {
        let sq = disc.sqrt();
        if sq / (2.0 * a) * a.sqrt() <= tol * 1e-3 {
            vec![foot]
        } else {
            vec![(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)]
        }
    };
    let eps = tol / a.sqrt();
    roots
        .into_iter()
        .filter_map(|s| {
            let s = in_range(s, line_range, eps)?;
            let p = origin + direction * s;
            let d = p - center;
            let t = angle_in_range(d.y.atan2(d.x), arc_range, tol / radius.max(tol))?;
            Some(CurveHit { point: p, ta: s, tb: t })
        })
        .collect()
}

fn circle_circle(
    ca: Point2,
    ra: f64,
    range_a: (f64, f64),
    cb: Point2,
    rb: f64,
    range_b: (f64, f64),
    tol: f64,
) -> Vec<CurveHit> {
    let delta = cb - ca;
    let d = delta.norm();
    if d < 1e-14 || d > ra + rb + tol || d < (ra - rb).abs() - tol {
        return Vec::new();
    }
    let along = (d * d + ra * ra - rb * rb) / (2.0 * d);
    let h = (ra * ra - along * along).max(0.0).sqrt();
    let ex = delta / d;
    let ey = Vec2::new(-ex.y, ex.x);
    let base = ca + ex * along;
    let points = if h <= tol * 1e-3 {
        vec![base]
    } else {
        vec![base + ey * h, base - ey * h]
    };
    points
        .into_iter()
        .filter_map(|p| {
            let da = p - ca;
            let db = p - cb;
            let ta = angle_in_range(da.y.atan2(da.x), range_a, tol / ra.max(tol))?;
            let tb = angle_in_range(db.y.atan2(db.x), range_b, tol / rb.max(tol))?;
            Some(CurveHit { point: p, ta, tb })
        })
        .collect()
}

fn samples(c: &dyn Curve2d) -> Vec<(f64, Point2)> {
    let (t0, t1) = c.domain();
    (0..=BRACKET_SEGMENTS)
        .map(|i| {
            let t = t0 + (t1 - t0) * i as f64 / BRACKET_SEGMENTS as f64;
            (t, c.evaluate(t))
        })
        .collect()
}

/// Newton refinement of `A(s) = B(t)` from a bracketed seed.
fn refine(a: &dyn Curve2d, b: &dyn Curve2d, mut s: f64, mut t: f64, tol: f64) -> Option<CurveHit> {
    let (ra, rb) = (a.domain(), b.domain());
    for _ in 0..40 {
        let f = a.evaluate(s) - b.evaluate(t);
        if f.norm() < tol * 1e-6 {
            break;
        }
        let da = a.tangent(s);
        let db = b.tangent(t);
        let det = -da.perp(&db);
        if det.abs() < 1e-300 {
            break;
        }
        // solve [da, -db] [ds, dt]^T = -f
        let ds = (-f.x * -db.y + db.x * -f.y) / det;
        let dt = (da.x * -f.y - da.y * -f.x) / det;
        s = (s + ds).max(ra.0).min(ra.1);
        t = (t + dt).max(rb.0).min(rb.1);
    }
    let pa = a.evaluate(s);
    ((pa - b.evaluate(t)).norm() <= tol).then_some(CurveHit { point: pa, ta: s, tb: t })
}

fn general(a: &dyn Curve2d, b: &dyn Curve2d, tol: f64) -> Vec<CurveHit> {
    let sa = samples(a);
    let sb = samples(b);
    let mut hits = Vec::new();
    for wa in sa.windows(2) {
        let (p0, p1) = (wa[0].1, wa[1].1);
        let da = p1 - p0;
        for wb in sb.windows(2) {
            let (q0, q1) = (wb[0].1, wb[1].1);
            let db = q1 - q0;
            let cross = da.perp(&db);
            let w = q0 - p0;
            let seed = if cross.abs() > 1e-300 {
                let u = w.perp(&db) / cross;
                let v = w.perp(&da) / cross;
                let slack = 0.05;
                (u >= -slack && u <= 1.0 + slack && v >= -slack && v <= 1.0 + slack)
                    .then_some((u.clamp(0.0, 1.0), v.clamp(0.0, 1.0)))
            } else {
                None
            };
            // near-tangent contacts do not cross; seed from closest endpoints
            let seed = seed.or_else(|| {
                ((p0 - q0).norm() <= tol * 10.0).then_some((0.0, 0.0))
            });
            if let Some((u, v)) = seed {
                let s = wa[0].0 + (wa[1].0 - wa[0].0) * u;
                let t = wb[0].0 + (wb[1].0 - wb[0].0) * v;
                if let Some(hit) = refine(a, b, s, t, tol) {
                    hits.push(hit);
                }
            }
        }
    }
    hits
}

fn dedup_hits(hits: Vec<CurveHit>, tol: f64) -> Vec<CurveHit> {
    let mut out: Vec<CurveHit> = Vec::with_capacity(hits.len());
    for h in hits {
        if !out.iter().any(|o| (o.point - h.point).norm() <= tol) {
            out.push(h);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Circle2d, Ellipse2d, Line2d};
    use std::f64::consts::PI;

    #[test]
    fn test_line_line_crossing() {
        let a = Line2d::from_points(Point2::new(0.0, 0.0), Point2::new(4.0, 4.0));
        let b = Line2d::from_points(Point2::new(0.0, 4.0), Point2::new(4.0, 0.0));
        let hits = intersect_curves(&a, &b, 1e-9);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].point - Point2::new(2.0, 2.0)).norm() < 1e-12);
        assert!((hits[0].ta - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_segments_that_miss() {
        let a = Line2d::from_points(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
        let b = Line2d::from_points(Point2::new(0.0, 4.0), Point2::new(4.0, 0.0));
        assert!(intersect_curves(&a, &b, 1e-9).is_empty());
    }

    #[test]
    fn test_line_circle_two_points_and_arc_filter() {
        let line = Line2d::from_points(Point2::new(-5.0, 0.0), Point2::new(5.0, 0.0));
        let full = Circle2d::new(Point2::origin(), 2.0);
        assert_eq!(intersect_curves(&line, &full, 1e-9).len(), 2);
        let upper = Circle2d::arc(Point2::origin(), 2.0, 0.0, PI / 2.0);
        let hits = intersect_curves(&upper, &line, 1e-9);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].point - Point2::new(2.0, 0.0)).norm() < 1e-12);
        assert!(hits[0].ta.abs() < 1e-12);
    }

    #[test]
    fn test_circle_circle_tangent_and_concentric() {
        let a = Circle2d::new(Point2::origin(), 1.0);
        let b = Circle2d::new(Point2::new(3.0, 0.0), 2.0);
        let hits = intersect_curves(&a, &b, 1e-9);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].point - Point2::new(1.0, 0.0)).norm() < 1e-9);
        let c = Circle2d::new(Point2::origin(), 3.0);
        assert!(intersect_curves(&a, &c, 1e-9).is_empty());
    }

    #[test]
    fn test_general_ellipse_line() {
        let e = Ellipse2d::new(Point2::origin(), Vec2::new(4.0, 0.0), Vec2::new(0.0, 2.0), (0.0, 2.0 * PI));
        let l = Line2d::from_points(Point2::new(0.0, -5.0), Point2::new(0.0, 5.0));
        let mut hits = intersect_curves(&e, &l, 1e-9);
        hits.sort_by(|a, b| a.point.y.total_cmp(&b.point.y));
        assert_eq!(hits.len(), 2);
        assert!((hits[0].point - Point2::new(0.0, -2.0)).norm() < 1e-8);
        assert!((hits[1].point - Point2::new(0.0, 2.0)).norm() < 1e-8);
    }
}
