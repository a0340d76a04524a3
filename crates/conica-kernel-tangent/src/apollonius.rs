//! Circles touching three lines or circles (the problem of Apollonius).
//!
//! For a solution with center `X` and radius `r`, a circle input gives
//! `|X - C|² = (r + s R)²` and a line input gives `n·(X - O) = s r`, where
//! the sign `s` picks the side (outside or inside for circles). Each of the
//! eight sign combinations is solved in closed form: three lines form a
//! linear system, and with any circle present the differences against the
//! first circle leave two linear equations plus that circle's quadratic.

use nalgebra::{Matrix2, Matrix2x3, Matrix3, Vector2, Vector3};

use conica_kernel_geom::{Curve2d, CurveShape2d};
use conica_kernel_math::{Point2, Vec2};

use crate::{push_unique, touching_foot, TangentCircle, TangentSettings};

#[derive(Debug, Clone, Copy)]
enum Input {
    Circle { center: Point2, radius: f64 },
    Line { origin: Point2, normal: Vec2 },
}

impl Input {
    fn of(c: &dyn Curve2d) -> Option<Self> {
        match c.shape() {
            CurveShape2d::Circle { center, radius } => Some(Input::Circle { center, radius }),
            CurveShape2d::Line { origin, direction } => {
                let len = direction.norm();
                (len > 0.0).then(|| Input::Line {
                    origin,
                    normal: Vec2::new(-direction.y, direction.x) / len,
                })
            }
            CurveShape2d::Other => None,
        }
    }

    /// Row `[x, y, r] = rhs` of a line input.
    fn line_row(origin: &Point2, normal: &Vec2, sign: f64) -> (Vector3<f64>, f64) {
        (Vector3::new(normal.x, normal.y, -sign), normal.dot(&origin.coords))
    }
}

/// Every circle touching all three inputs within their parameter ranges.
///
/// Only line and circle shapes are supported; any other curve gives an
/// empty result, as do degenerate layouts such as concentric circles.
pub fn apollonius(
    c1: &dyn Curve2d,
    c2: &dyn Curve2d,
    c3: &dyn Curve2d,
    settings: &TangentSettings,
) -> Vec<TangentCircle> {
    let curves = [c1, c2, c3];
    let (Some(i1), Some(i2), Some(i3)) = (Input::of(c1), Input::of(c2), Input::of(c3)) else {
        tracing::trace!("apollonius needs line or circle inputs");
        return Vec::new();
    };
    let inputs = [i1, i2, i3];
    let tol = settings.tolerance;

    let mut out = Vec::new();
    for combo in 0..8u8 {
        let signs = [0, 1, 2].map(|k| if combo & (1 << k) == 0 { 1.0 } else { -1.0 });
        for (center, radius) in solve(&inputs, signs) {
            if !(radius > tol) || !center.coords.iter().all(|c| c.is_finite()) {
                continue;
            }
            let feet: Option<Vec<Point2>> = curves
                .iter()
                .map(|c| touching_foot(*c, &center, radius, tol).map(|(_, p)| p))
                .collect();
            let Some(touch_points) = feet else {
                continue;
            };
            push_unique(
                &mut out,
                TangentCircle {
                    center,
                    radius,
                    touch_points,
                },
                tol * 10.0,
            );
        }
    }
    tracing::debug!(count = out.len(), "apollonius circles");
    out
}

/// Candidate `(center, radius)` pairs for one sign combination, radius sign
/// unchecked.
fn solve(inputs: &[Input; 3], signs: [f64; 3]) -> Vec<(Point2, f64)> {
    let first_circle = inputs
        .iter()
        .position(|i| matches!(i, Input::Circle { .. }));
    match first_circle {
        None => three_lines(inputs, signs).into_iter().collect(),
        Some(k) => with_circle(inputs, signs, k),
    }
}

fn three_lines(inputs: &[Input; 3], signs: [f64; 3]) -> Option<(Point2, f64)> {
    let mut m = Matrix3::zeros();
    let mut rhs = Vector3::zeros();
    for (row, (input, sign)) in inputs.iter().zip(signs).enumerate() {
        let Input::Line { origin, normal } = input else {
            return None;
        };
        let (coeffs, value) = Input::line_row(origin, normal, sign);
        m.set_row(row, &coeffs.transpose());
        rhs[row] = value;
    }
    // parallel lines leave the system singular
    let w = m.lu().solve(&rhs)?;
    Some((Point2::new(w.x, w.y), w.z))
}

fn with_circle(inputs: &[Input; 3], signs: [f64; 3], first: usize) -> Vec<(Point2, f64)> {
    let Input::Circle { center: c0, radius: r0 } = inputs[first] else {
        return Vec::new();
    };
    let s0 = signs[first];

    let mut m = Matrix2x3::zeros();
    let mut rhs = Vector2::zeros();
    let mut row = 0;
    for (k, input) in inputs.iter().enumerate() {
        if k == first {
            continue;
        }
        let (coeffs, value) = match input {
            Input::Line { origin, normal } => Input::line_row(origin, normal, signs[k]),
            Input::Circle { center, radius } => {
                let d = center - c0;
                (
                    Vector3::new(2.0 * d.x, 2.0 * d.y, 2.0 * (signs[k] * radius - s0 * r0)),
                    center.coords.norm_squared() - c0.coords.norm_squared() - radius * radius
                        + r0 * r0,
                )
            }
        };
        m.set_row(row, &coeffs.transpose());
        rhs[row] = value;
        row += 1;
    }

    // solutions form the line p + λq in (x, y, r) space
    let q: Vector3<f64> = m.row(0).transpose().cross(&m.row(1).transpose());
    let scale = m.row(0).norm() * m.row(1).norm();
    if !(q.norm() > 1e-12 * scale) {
        tracing::trace!("rank-deficient apollonius system");
        return Vec::new();
    }
    let gram: Matrix2<f64> = m * m.transpose();
    let Some(gram_inv) = gram.try_inverse() else {
        return Vec::new();
    };
    let p: Vector3<f64> = m.transpose() * (gram_inv * rhs);

    // |p_xy + λ q_xy - c0|² = (p_r + λ q_r + s0 r0)²
    let e = Vec2::new(p.x - c0.x, p.y - c0.y);
    let qxy = Vec2::new(q.x, q.y);
    let g = p.z + s0 * r0;
    let a = qxy.norm_squared() - q.z * q.z;
    let b = 2.0 * (e.dot(&qxy) - g * q.z);
    let c = e.norm_squared() - g * g;

    let lambdas: Vec<f64> = if a.abs() <= 1e-12 * q.norm_squared() {
        if b.abs() <= 1e-300 {
            return Vec::new();
        }
        vec![-c / b]
    } else {
        let disc = b * b - 4.0 * a * c;
        let slack = 1e-12 * b * b;
        if disc < -slack {
            return Vec::new();
        }
        let sq = disc.max(0.0).sqrt();
        if sq == 0.0 {
            vec![-b / (2.0 * a)]
        } else {
            vec![(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)]
        }
    };

    lambdas
        .into_iter()
        .map(|l| {
            let w = p + q * l;
            (Point2::new(w.x, w.y), w.z)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use conica_kernel_geom::{Circle2d, Ellipse2d, Line2d};
    use std::f64::consts::TAU;

    fn assert_touches_all(sol: &TangentCircle, curves: &[&dyn Curve2d]) {
        assert_eq!(sol.touch_points.len(), curves.len());
        for (p, c) in sol.touch_points.iter().zip(curves) {
            assert_relative_eq!((p - sol.center).norm(), sol.radius, epsilon = 1e-7);
            let t = c.parameter_of(p);
            assert!((c.evaluate(t) - p).norm() < 1e-7);
        }
    }

    #[test]
    fn test_three_separated_circles_have_eight_solutions() {
        let a = Circle2d::new(Point2::new(0.0, 0.0), 1.0);
        let b = Circle2d::new(Point2::new(10.0, 0.0), 2.0);
        let c = Circle2d::new(Point2::new(3.0, 9.0), 1.5);
        let sols = apollonius(&a, &b, &c, &TangentSettings::default());
        assert_eq!(sols.len(), 8);
        for s in &sols {
            assert!(s.radius > 0.0);
            assert_touches_all(s, &[&a, &b, &c]);
        }
    }

    #[test]
    fn test_two_equal_radii() {
        let a = Circle2d::new(Point2::new(0.0, 0.0), 1.0);
        let b = Circle2d::new(Point2::new(6.0, 0.0), 1.0);
        let c = Circle2d::new(Point2::new(3.0, 6.0), 2.0);
        let sols = apollonius(&a, &b, &c, &TangentSettings::default());
        assert_eq!(sols.len(), 8);
        for s in &sols {
            assert_touches_all(s, &[&a, &b, &c]);
        }
    }

    #[test]
    fn test_three_equal_radii() {
        let a = Circle2d::new(Point2::new(0.0, 0.0), 1.0);
        let b = Circle2d::new(Point2::new(6.0, 0.0), 1.0);
        let c = Circle2d::new(Point2::new(3.0, 6.0), 1.0);
        let sols = apollonius(&a, &b, &c, &TangentSettings::default());
        assert_eq!(sols.len(), 8);
        for s in &sols {
            assert_touches_all(s, &[&a, &b, &c]);
        }
        // circumcircle of the centers is (3, 2.25) with radius 3.75
        let mut concentric: Vec<f64> = sols
            .iter()
            .filter(|s| (s.center - Point2::new(3.0, 2.25)).norm() < 1e-9)
            .map(|s| s.radius)
            .collect();
        concentric.sort_by(f64::total_cmp);
        assert_eq!(concentric.len(), 2);
        assert_relative_eq!(concentric[0], 2.75, epsilon = 1e-9);
        assert_relative_eq!(concentric[1], 4.75, epsilon = 1e-9);
    }

    #[test]
    fn test_triangle_segments_keep_only_incircle() {
        let a = Line2d::from_points(Point2::new(0.0, 0.0), Point2::new(4.0, 0.0));
        let b = Line2d::from_points(Point2::new(4.0, 0.0), Point2::new(0.0, 3.0));
        let c = Line2d::from_points(Point2::new(0.0, 3.0), Point2::new(0.0, 0.0));
        let sols = apollonius(&a, &b, &c, &TangentSettings::default());
        assert_eq!(sols.len(), 1);
        assert_relative_eq!(sols[0].center, Point2::new(1.0, 1.0), epsilon = 1e-10);
        assert_relative_eq!(sols[0].radius, 1.0, epsilon = 1e-10);
        assert_touches_all(&sols[0], &[&a, &b, &c]);
    }

    #[test]
    fn test_long_lines_add_excircles() {
        let line = |p: Point2, q: Point2| Line2d::new(p, q - p, (-100.0, 100.0));
        let a = line(Point2::new(0.0, 0.0), Point2::new(4.0, 0.0));
        let b = line(Point2::new(4.0, 0.0), Point2::new(0.0, 3.0));
        let c = line(Point2::new(0.0, 3.0), Point2::new(0.0, 0.0));
        let sols = apollonius(&a, &b, &c, &TangentSettings::default());
        assert_eq!(sols.len(), 4);
        let mut radii: Vec<f64> = sols.iter().map(|s| s.radius).collect();
        radii.sort_by(f64::total_cmp);
        // inradius 1, exradii area / (s - side) with area 6 and s = 6
        for (r, expect) in radii.iter().zip([1.0, 2.0, 3.0, 6.0]) {
            assert_relative_eq!(*r, expect, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_mixed_lines_and_circle() {
        // unit circle between two horizontal lines at y = ±3
        let a = Line2d::new(Point2::new(0.0, 3.0), Vec2::new(1.0, 0.0), (-50.0, 50.0));
        let b = Line2d::new(Point2::new(0.0, -3.0), Vec2::new(1.0, 0.0), (-50.0, 50.0));
        let c = Circle2d::new(Point2::origin(), 1.0);
        let sols = apollonius(&a, &b, &c, &TangentSettings::default());
        // radius 3 circles centered on the x-axis touching the unit circle
        // from outside (x = ±4) and enclosing it (x = ±2)
        assert_eq!(sols.len(), 4);
        for s in &sols {
            assert_relative_eq!(s.radius, 3.0, epsilon = 1e-9);
            assert_relative_eq!(s.center.y, 0.0, epsilon = 1e-9);
            assert!(
                (s.center.x.abs() - 4.0).abs() < 1e-9 || (s.center.x.abs() - 2.0).abs() < 1e-9
            );
        }
    }

    #[test]
    fn test_unsupported_or_degenerate_inputs() {
        let settings = TangentSettings::default();
        let a = Circle2d::new(Point2::origin(), 1.0);
        let b = Circle2d::new(Point2::origin(), 2.0);
        let c = Circle2d::new(Point2::origin(), 3.0);
        assert!(apollonius(&a, &b, &c, &settings).is_empty());

        let e = Ellipse2d::new(Point2::new(5.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 2.0), (0.0, TAU));
        let d = Circle2d::new(Point2::new(0.0, 5.0), 1.0);
        assert!(apollonius(&a, &d, &e, &settings).is_empty());
    }
}
