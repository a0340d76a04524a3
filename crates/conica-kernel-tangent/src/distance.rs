//! Minimum distance between two curves.

use conica_kernel_geom::{angle_in_range, closest_point, intersect_curves, Curve2d, CurveShape2d};
use conica_kernel_math::{Point2, Vec2};

use crate::{MinDistance, TangentSettings};

fn pair(a: &dyn Curve2d, ta: f64, b: &dyn Curve2d, tb: f64) -> MinDistance {
    let point_a = a.evaluate(ta);
    let point_b = b.evaluate(tb);
    MinDistance {
        distance: (point_b - point_a).norm(),
        point_a,
        point_b,
        ta,
        tb,
    }
}

/// Foot on `curve` nearest to `p`, falling back to the closest point when
/// no perpendicular foot lies in range.
fn nearest_foot(curve: &dyn Curve2d, p: &Point2) -> f64 {
    curve
        .perpendicular_feet(p)
        .into_iter()
        .min_by(|s, t| {
            let ds = (curve.evaluate(*s) - p).norm_squared();
            let dt = (curve.evaluate(*t) - p).norm_squared();
            ds.total_cmp(&dt)
        })
        .unwrap_or_else(|| closest_point(curve, p).0)
}

/// Closest pair of points between `a` and `b`.
///
/// Crossings win outright (distance zero, the one nearest `preferred` if
/// given). Otherwise candidates come from closed forms for circle and line
/// pairs, from alternating perpendicular feet started at `preferred` (or
/// between the curve midpoints), and from every endpoint. When a
/// `preferred` point is given and the pair iterated from it is within
/// tolerance of the global minimum, that pair is returned instead, so ties
/// such as parallel segments resolve near `preferred`.
///
/// Returns `None` only if no candidate could be evaluated.
pub fn simple_minimum_distance(
    a: &dyn Curve2d,
    b: &dyn Curve2d,
    preferred: Option<Point2>,
    settings: &TangentSettings,
) -> Option<MinDistance> {
    let tol = settings.tolerance;
    let hits = intersect_curves(a, b, tol);
    if !hits.is_empty() {
        let anchor = preferred.unwrap_or(hits[0].point);
        return hits
            .into_iter()
            .min_by(|h, k| (h.point - anchor).norm().total_cmp(&(k.point - anchor).norm()))
            .map(|h| MinDistance {
                distance: 0.0,
                point_a: h.point,
                point_b: h.point,
                ta: h.ta,
                tb: h.tb,
            });
    }

    let mut candidates = analytic(a, b, tol);
    let iterated = iterate(a, b, preferred, settings);
    candidates.extend(iterated);
    candidates.extend(endpoints(a, b));

    let best = candidates
        .into_iter()
        .filter(|c| c.distance.is_finite())
        .min_by(|x, y| x.distance.total_cmp(&y.distance))?;
    match (preferred, iterated) {
        (Some(_), Some(it)) if it.distance <= best.distance + tol => Some(it),
        _ => Some(best),
    }
}

/// Closed-form candidates for circle and line pairs.
fn analytic(a: &dyn Curve2d, b: &dyn Curve2d, tol: f64) -> Vec<MinDistance> {
    match (a.shape(), b.shape()) {
        (
            CurveShape2d::Circle { center: ca, radius: ra },
            CurveShape2d::Circle { center: cb, radius: rb },
        ) => {
            let d = cb - ca;
            if d.norm() < 1e-14 {
                return Vec::new();
            }
            // extremal pairs lie on the line of centers
            let angle = d.y.atan2(d.x);
            let mut out = Vec::new();
            for sa in [angle, angle + std::f64::consts::PI] {
                for sb in [angle, angle + std::f64::consts::PI] {
                    let ta = angle_in_range(sa, a.domain(), tol / ra.max(tol));
                    let tb = angle_in_range(sb, b.domain(), tol / rb.max(tol));
                    if let (Some(ta), Some(tb)) = (ta, tb) {
                        out.push(pair(a, ta, b, tb));
                    }
                }
            }
            out
        }
        (CurveShape2d::Line { .. }, CurveShape2d::Circle { center, radius }) => {
            line_circle(a, b, center, radius, tol, false)
        }
        (CurveShape2d::Circle { center, radius }, CurveShape2d::Line { .. }) => {
            line_circle(b, a, center, radius, tol, true)
        }
        _ => Vec::new(),
    }
}

fn line_circle(
    line: &dyn Curve2d,
    circle: &dyn Curve2d,
    center: Point2,
    radius: f64,
    tol: f64,
    swapped: bool,
) -> Vec<MinDistance> {
    let mut out = Vec::new();
    for tl in line.perpendicular_feet(&center) {
        let foot = line.evaluate(tl);
        let d: Vec2 = foot - center;
        if d.norm() < 1e-14 {
            continue;
        }
        let angle = d.y.atan2(d.x);
        for sc in [angle, angle + std::f64::consts::PI] {
            let Some(tc) = angle_in_range(sc, circle.domain(), tol / radius.max(tol)) else {
                continue;
            };
            out.push(if swapped {
                pair(circle, tc, line, tl)
            } else {
                pair(line, tl, circle, tc)
            });
        }
    }
    out
}

/// Alternate perpendicular feet from a working point, moving it to the
/// midpoint of the feet while the pair keeps closing in.
fn iterate(
    a: &dyn Curve2d,
    b: &dyn Curve2d,
    preferred: Option<Point2>,
    settings: &TangentSettings,
) -> Option<MinDistance> {
    let mut work = preferred.unwrap_or_else(|| {
        let (a0, a1) = a.domain();
        let (b0, b1) = b.domain();
        let pa = a.evaluate(0.5 * (a0 + a1));
        let pb = b.evaluate(0.5 * (b0 + b1));
        Point2::from((pa.coords + pb.coords) * 0.5)
    });
    let mut best: Option<MinDistance> = None;
    for _ in 0..settings.max_iterations {
        let next = pair(a, nearest_foot(a, &work), b, nearest_foot(b, &work));
        if !next.distance.is_finite() {
            break;
        }
        let improved = match &best {
            Some(prev) => prev.distance - next.distance > settings.tolerance * 1e-3,
            None => true,
        };
        if !improved {
            if best.map_or(true, |p| next.distance < p.distance) {
                best = Some(next);
            }
            break;
        }
        work = Point2::from((next.point_a.coords + next.point_b.coords) * 0.5);
        best = Some(next);
    }
    best
}

/// Endpoint-to-endpoint and endpoint-to-curve candidates.
fn endpoints(a: &dyn Curve2d, b: &dyn Curve2d) -> Vec<MinDistance> {
    let (a0, a1) = a.domain();
    let (b0, b1) = b.domain();
    let mut out = Vec::with_capacity(8);
    for ta in [a0, a1] {
        for tb in [b0, b1] {
            out.push(pair(a, ta, b, tb));
        }
    }
    for ta in [a0, a1] {
        let tb = closest_point(b, &a.evaluate(ta)).0;
        out.push(pair(a, ta, b, tb));
    }
    for tb in [b0, b1] {
        let ta = closest_point(a, &b.evaluate(tb)).0;
        out.push(pair(a, ta, b, tb));
    }
    out
}
