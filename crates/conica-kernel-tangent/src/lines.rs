//! Common tangent lines of two curves.

use conica_kernel_geom::{angle_in_range, Curve2d, CurveShape2d};
use conica_kernel_math::{Point2, Vec2};

use crate::{TangentLine, TangentSettings};

/// All lines touching both `a` and `b`.
///
/// Circle and arc pairs are solved in closed form (up to four lines,
/// filtered by the arc ranges). Other curves are searched on a parameter
/// grid and refined by Newton iteration on both touch parameters. A line
/// has no tangent other than itself, so line-shaped inputs give nothing.
pub fn tangent_lines(a: &dyn Curve2d, b: &dyn Curve2d, settings: &TangentSettings) -> Vec<TangentLine> {
    match (a.shape(), b.shape()) {
        (CurveShape2d::Line { .. }, _) | (_, CurveShape2d::Line { .. }) => {
            tracing::trace!("tangent lines skip line-shaped input");
            Vec::new()
        }
        (
            CurveShape2d::Circle { center: c1, radius: r1 },
            CurveShape2d::Circle { center: c2, radius: r2 },
        ) => circle_circle(c1, r1, a.domain(), c2, r2, b.domain(), settings.tolerance),
        _ => general(a, b, settings),
    }
}

/// Closed-form tangents of two circles.
///
/// A tangent line `n·x = h` has signed distances `r1` and `e2 r2` from the
/// centers; fixing the first sign loses nothing since `(n, h)` and
/// `(-n, -h)` are the same line.
fn circle_circle(
    c1: Point2,
    r1: f64,
    range1: (f64, f64),
    c2: Point2,
    r2: f64,
    range2: (f64, f64),
    tol: f64,
) -> Vec<TangentLine> {
    let d = c2 - c1;
    let len = d.norm();
    if len < 1e-14 {
        tracing::trace!("concentric circles have no common tangent");
        return Vec::new();
    }
    let along = d / len;
    let across = Vec2::new(-along.y, along.x);
    let mut out: Vec<TangentLine> = Vec::new();
    for e2 in [1.0, -1.0] {
        let cos = (e2 * r2 - r1) / len;
        if cos.abs() > 1.0 + tol / len {
            continue;
        }
        let cos = cos.clamp(-1.0, 1.0);
        let sin = (1.0 - cos * cos).sqrt();
        for side in [1.0, -1.0] {
            let n = along * cos + across * (side * sin);
            let start = c1 - n * r1;
            let end = c2 - n * (e2 * r2);
            let (u1, u2) = (start - c1, end - c2);
            let Some(ta) = angle_in_range(u1.y.atan2(u1.x), range1, tol / r1.max(tol)) else {
                continue;
            };
            let Some(tb) = angle_in_range(u2.y.atan2(u2.x), range2, tol / r2.max(tol)) else {
                continue;
            };
            push_line(&mut out, TangentLine { start, end, ta, tb }, tol);
        }
    }
    out
}

fn push_line(out: &mut Vec<TangentLine>, line: TangentLine, tol: f64) {
    let scale = (line.end - line.start).norm().max(1.0);
    let dup = out.iter().any(|l| {
        (l.start - line.start).norm() <= tol * scale && (l.end - line.end).norm() <= tol * scale
    });
    if !dup {
        out.push(line);
    }
}

fn cross(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Grid sample of a curve: parameter, point and first derivative.
struct Samples {
    t: Vec<f64>,
    p: Vec<Point2>,
    d: Vec<Vec2>,
}

impl Samples {
    fn new(c: &dyn Curve2d, segments: usize) -> Self {
        let (t0, t1) = c.domain();
        let t: Vec<f64> = (0..=segments)
            .map(|i| t0 + (t1 - t0) * i as f64 / segments as f64)
            .collect();
        let p = t.iter().map(|&s| c.evaluate(s)).collect();
        let d = t.iter().map(|&s| c.tangent(s)).collect();
        Self { t, p, d }
    }
}

/// Keeps Newton steps inside the domain, wrapping on closed curves.
struct Domain {
    lo: f64,
    hi: f64,
    closed: bool,
}

impl Domain {
    fn of(c: &dyn Curve2d, tol: f64) -> Self {
        let (lo, hi) = c.domain();
        let closed = (c.start_point() - c.end_point()).norm() <= tol;
        Self { lo, hi, closed }
    }

    fn fit(&self, t: f64) -> f64 {
        if self.closed {
            let span = self.hi - self.lo;
            self.lo + (t - self.lo).rem_euclid(span)
        } else {
            t.clamp(self.lo, self.hi)
        }
    }
}

/// Tangency residuals at `(s, t)`: the cross products of each curve's
/// derivative with the chord between the touch points.
fn residuals(a: &dyn Curve2d, b: &dyn Curve2d, s: f64, t: f64) -> (Vec2, Vec2, Vec2, f64, f64) {
    let chord = b.evaluate(t) - a.evaluate(s);
    let da = a.tangent(s);
    let db = b.tangent(t);
    (chord, da, db, cross(&da, &chord), cross(&db, &chord))
}

fn newton(
    a: &dyn Curve2d,
    b: &dyn Curve2d,
    (dom_a, dom_b): (&Domain, &Domain),
    mut s: f64,
    mut t: f64,
    settings: &TangentSettings,
) -> Option<TangentLine> {
    let tol = settings.tolerance;
    for _ in 0..settings.max_iterations {
        let (chord, da, db, f, g) = residuals(a, b, s, t);
        let (la, lb) = (da.norm(), db.norm());
        if !(la > 0.0 && lb > 0.0) {
            return None;
        }
        if (f / la).abs() <= tol * 1e-3 && (g / lb).abs() <= tol * 1e-3 {
            break;
        }
        let fs = cross(&a.second_derivative(s), &chord);
        let ft = cross(&da, &db);
        let gt = cross(&b.second_derivative(t), &chord);
        let det = fs * gt - ft * ft;
        if !(det.abs() > 1e-300) {
            return None;
        }
        let ds = (-f * gt + g * ft) / det;
        let dt = (-g * fs + f * ft) / det;
        s = dom_a.fit(s + ds);
        t = dom_b.fit(t + dt);
    }

    let (chord, da, db, f, g) = residuals(a, b, s, t);
    let len = chord.norm();
    // crossing points satisfy the residuals trivially
    if len <= tol * 10.0 {
        return None;
    }
    let (la, lb) = (da.norm(), db.norm());
    if !(la > 0.0 && lb > 0.0) || (f / la).abs() > tol || (g / lb).abs() > tol {
        return None;
    }
    Some(TangentLine {
        start: a.evaluate(s),
        end: b.evaluate(t),
        ta: s,
        tb: t,
    })
}

/// Sign-change search over a sample grid of both curves, seeding Newton in
/// every cell where both residuals can vanish.
fn general(a: &dyn Curve2d, b: &dyn Curve2d, settings: &TangentSettings) -> Vec<TangentLine> {
    let n = settings.hull_segments.max(4);
    let sa = Samples::new(a, n);
    let sb = Samples::new(b, n);
    let domains = (&Domain::of(a, settings.tolerance), &Domain::of(b, settings.tolerance));

    let mut f = vec![vec![0.0; n + 1]; n + 1];
    let mut g = vec![vec![0.0; n + 1]; n + 1];
    for i in 0..=n {
        for j in 0..=n {
            let chord = sb.p[j] - sa.p[i];
            f[i][j] = cross(&sa.d[i], &chord);
            g[i][j] = cross(&sb.d[j], &chord);
        }
    }
    let straddles = |m: &Vec<Vec<f64>>, i: usize, j: usize| {
        let corners = [m[i][j], m[i + 1][j], m[i][j + 1], m[i + 1][j + 1]];
        let lo = corners.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = corners.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        lo <= 0.0 && hi >= 0.0
    };

    let seeds = settings.seeds_per_segment.max(1);
    let mut out = Vec::new();
    for i in 0..n {
        for j in 0..n {
            if !(straddles(&f, i, j) && straddles(&g, i, j)) {
                continue;
            }
            for k in 0..seeds {
                let w = (k as f64 + 0.5) / seeds as f64;
                let s = sa.t[i] + (sa.t[i + 1] - sa.t[i]) * w;
                let t = sb.t[j] + (sb.t[j + 1] - sb.t[j]) * w;
                if let Some(line) = newton(a, b, domains, s, t, settings) {
                    push_line(&mut out, line, settings.tolerance * 100.0);
                    break;
                }
            }
        }
    }
    tracing::debug!(count = out.len(), "general tangent lines");
    out
}
