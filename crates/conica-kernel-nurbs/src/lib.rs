#![warn(missing_docs)]

//! Rational B-spline curves for the conica kernel.
//!
//! Provides a NURBS curve generic over its dimension, so the same type
//! carries a plane section in 3D and its images in 2D parameter charts.
//! Implements `Curve3d` for the 3D form and `Curve2d` for the 2D form.
//!
//! # Key types
//!
//! - [`NurbsCurve`] — rational B-spline curve in `D` dimensions
//! - [`NurbsCurveFactory`] — the default `CurveFactory`
//!
//! # Algorithms
//!
//! - **Cox–de Boor recursion** for basis functions and their derivatives
//! - **Rational quadratic arcs** for exact conic sections
//! - **Global interpolation** with averaged knots

use conica_kernel_geom::{Curve2d, Curve3d, CurveKind};
use conica_kernel_math::{Point2, Point3, Vec2, Vec3};
use nalgebra::{DMatrix, SVector};

mod factory;

pub use factory::NurbsCurveFactory;

// =============================================================================
// Knot vector utilities
// =============================================================================

/// Validate a knot vector: non-decreasing, length = n_control_points + degree + 1.
fn validate_knots(knots: &[f64], n_points: usize, degree: usize) -> bool {
    if knots.len() != n_points + degree + 1 || n_points <= degree {
        return false;
    }
    knots.windows(2).all(|w| w[1] >= w[0]) && knots[n_points] > knots[degree]
}

/// Find the knot span index for parameter `t`.
///
/// Returns `i` such that `knots[i] <= t < knots[i+1]`, clamped to valid range.
/// For `t` at the end of the domain, returns the last non-empty span.
fn find_span(knots: &[f64], n: usize, degree: usize, t: f64) -> usize {
    // n = number of control points - 1 (last index)
    if t >= knots[n + 1] {
        let mut span = n;
        while span > degree && knots[span] >= knots[n + 1] {
            span -= 1;
        }
        return span;
    }
    if t <= knots[degree] {
        return degree;
    }
    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Non-zero basis function values at `t`: `N[span-degree..=span]`.
fn basis_functions(knots: &[f64], span: usize, degree: usize, t: f64) -> Vec<f64> {
    let mut n = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    n[0] = 1.0;

    for j in 1..=degree {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            if denom.abs() < 1e-30 {
                continue;
            }
            let temp = n[r] / denom;
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }

    n
}

/// Basis functions and their derivatives up to order `n_ders` at `t`.
///
/// `ders[k][j]` is the k-th derivative of `N[span-degree+j]`.
fn ders_basis_functions(knots: &[f64], span: usize, degree: usize, t: f64, n_ders: usize) -> Vec<Vec<f64>> {
    let p = degree;
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;
    for j in 1..=p {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = if ndu[j][r].abs() < 1e-30 {
                0.0
            } else {
                ndu[r][j - 1] / ndu[j][r]
            };
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    let mut ders = vec![vec![0.0; p + 1]; n_ders + 1];
    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let div = |num: f64, den: f64| if den.abs() < 1e-30 { 0.0 } else { num / den };
    let pi = p as isize;
    let top = n_ders.min(p) as isize;
    for r in 0..=pi {
        let mut a = [vec![0.0; p + 1], vec![0.0; p + 1]];
        let (mut s1, mut s2) = (0usize, 1usize);
        a[0][0] = 1.0;
        for k in 1..=top {
            let mut d = 0.0;
            let rk = r - k;
            let pk = pi - k;
            if r >= k {
                a[s2][0] = div(a[s1][0], ndu[(pk + 1) as usize][rk as usize]);
                d = a[s2][0] * ndu[rk as usize][pk as usize];
            }
            let j1 = if rk >= -1 { 1 } else { -rk };
            let j2 = if r - 1 <= pk { k - 1 } else { pi - r };
            for j in j1..=j2 {
                let (ju, rkj) = (j as usize, (rk + j) as usize);
                a[s2][ju] = div(a[s1][ju] - a[s1][ju - 1], ndu[(pk + 1) as usize][rkj]);
                d += a[s2][ju] * ndu[rkj][pk as usize];
            }
            if r <= pk {
                let ku = k as usize;
                a[s2][ku] = div(-a[s1][ku - 1], ndu[(pk + 1) as usize][r as usize]);
                d += a[s2][ku] * ndu[r as usize][pk as usize];
            }
            ders[k as usize][r as usize] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = p as f64;
    for k in 1..=n_ders {
        for j in 0..=p {
            ders[k][j] *= factor;
        }
        factor *= p as f64 - k as f64;
    }
    ders
}

// =============================================================================
// NURBS curve
// =============================================================================

/// A rational B-spline curve in `D` dimensions.
///
/// Evaluated by computing the non-rational B-spline in homogeneous
/// coordinates and dividing by the weight.
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsCurve<const D: usize> {
    /// Control points (Cartesian, not pre-multiplied by weight).
    pub control_points: Vec<SVector<f64, D>>,
    /// Weights, one per control point, all positive.
    pub weights: Vec<f64>,
    /// Knot vector.
    pub knots: Vec<f64>,
    /// Polynomial degree.
    pub degree: usize,
}

/// A NURBS curve in 3D.
pub type NurbsCurve3 = NurbsCurve<3>;

/// A NURBS curve in a 2D chart.
pub type NurbsCurve2 = NurbsCurve<2>;

impl<const D: usize> NurbsCurve<D> {
    /// Create a NURBS curve. Returns `None` for an invalid knot vector or
    /// mismatched/non-positive weights.
    pub fn new(
        control_points: Vec<SVector<f64, D>>,
        weights: Vec<f64>,
        knots: Vec<f64>,
        degree: usize,
    ) -> Option<Self> {
        if degree == 0
            || weights.len() != control_points.len()
            || weights.iter().any(|w| !(*w > 0.0))
            || !validate_knots(&knots, control_points.len(), degree)
        {
            return None;
        }
        Some(Self {
            control_points,
            weights,
            knots,
            degree,
        })
    }

    /// Exact rational quadratic arc over `[0, 1]` from `start` to `end`
    /// with tangents meeting at `apex` and middle weight `weight`.
    pub fn conic_arc(start: SVector<f64, D>, apex: SVector<f64, D>, end: SVector<f64, D>, weight: f64) -> Self {
        Self {
            control_points: vec![start, apex, end],
            weights: vec![1.0, weight, 1.0],
            knots: vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            degree: 2,
        }
    }

    /// Non-rational curve of degree `degree` passing through `points` at
    /// the strictly increasing `params`.
    ///
    /// The degree is lowered to `points.len() - 1` when there are too few
    /// points. Returns `None` for mismatched input or a singular system.
    pub fn interpolate(points: &[SVector<f64, D>], params: &[f64], degree: usize) -> Option<Self> {
        let count = points.len();
        if count < 2 || params.len() != count || degree == 0 {
            return None;
        }
        if params.windows(2).any(|w| !(w[1] > w[0])) {
            return None;
        }
        let p = degree.min(count - 1);
        let n = count - 1;

        // averaged knot vector
        let mut knots = Vec::with_capacity(count + p + 1);
        knots.extend(std::iter::repeat(params[0]).take(p + 1));
        for j in 1..=(n - p) {
            let avg = params[j..j + p].iter().sum::<f64>() / p as f64;
            knots.push(avg);
        }
        knots.extend(std::iter::repeat(params[n]).take(p + 1));

        let mut system = DMatrix::zeros(count, count);
        for (row, &t) in params.iter().enumerate() {
            let span = find_span(&knots, n, p, t);
            for (i, b) in basis_functions(&knots, span, p, t).into_iter().enumerate() {
                system[(row, span - p + i)] = b;
            }
        }
        let rhs = DMatrix::from_fn(count, D, |r, c| points[r][c]);
        let solution = system.lu().solve(&rhs)?;
        if solution.iter().any(|v| !v.is_finite()) {
            tracing::debug!(count, degree = p, "spline interpolation produced non-finite control points");
            return None;
        }
        let control_points = (0..count)
            .map(|r| SVector::<f64, D>::from_fn(|c, _| solution[(r, c)]))
            .collect();
        Self::new(control_points, vec![1.0; count], knots, p)
    }

    /// Parameter domain.
    pub fn parameter_domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.control_points.len()])
    }

    /// Apply `f` to every control point, keeping weights and knots.
    ///
    /// Exact for affine maps.
    pub fn map_points<const E: usize>(&self, f: impl Fn(&SVector<f64, D>) -> SVector<f64, E>) -> NurbsCurve<E> {
        NurbsCurve {
            control_points: self.control_points.iter().map(f).collect(),
            weights: self.weights.clone(),
            knots: self.knots.clone(),
            degree: self.degree,
        }
    }

    fn clamp_param(&self, t: f64) -> f64 {
        let (t0, t1) = self.parameter_domain();
        t.max(t0).min(t1)
    }

    /// Evaluate the curve at parameter `t`.
    pub fn eval(&self, t: f64) -> SVector<f64, D> {
        let n = self.control_points.len() - 1;
        let t = self.clamp_param(t);
        let span = find_span(&self.knots, n, self.degree, t);
        let basis = basis_functions(&self.knots, span, self.degree, t);

        let mut num = SVector::<f64, D>::zeros();
        let mut den = 0.0;
        for (i, &b) in basis.iter().enumerate() {
            let idx = span - self.degree + i;
            let w = self.weights[idx] * b;
            num += self.control_points[idx] * w;
            den += w;
        }
        if den.abs() < 1e-30 {
            SVector::zeros()
        } else {
            num / den
        }
    }

    /// Point, first, and second derivative at `t` (quotient rule on the
    /// homogeneous form).
    pub fn derivatives(&self, t: f64) -> [SVector<f64, D>; 3] {
        let n = self.control_points.len() - 1;
        let t = self.clamp_param(t);
        let span = find_span(&self.knots, n, self.degree, t);
        let ders = ders_basis_functions(&self.knots, span, self.degree, t, 2);

        let mut a = [SVector::<f64, D>::zeros(); 3];
        let mut w = [0.0; 3];
        for k in 0..3 {
            for j in 0..=self.degree {
                let idx = span - self.degree + j;
                let bw = ders[k][j] * self.weights[idx];
                a[k] += self.control_points[idx] * bw;
                w[k] += bw;
            }
        }
        if w[0].abs() < 1e-30 {
            return [SVector::zeros(); 3];
        }
        let c0 = a[0] / w[0];
        let c1 = (a[1] - c0 * w[1]) / w[0];
        let c2 = (a[2] - c1 * (2.0 * w[1]) - c0 * w[2]) / w[0];
        [c0, c1, c2]
    }

    /// Number of control points.
    pub fn num_control_points(&self) -> usize {
        self.control_points.len()
    }
}

impl Curve3d for NurbsCurve<3> {
    fn evaluate(&self, t: f64) -> Point3 {
        Point3::from(self.eval(t))
    }

    fn tangent(&self, t: f64) -> Vec3 {
        self.derivatives(t)[1]
    }

    fn domain(&self) -> (f64, f64) {
        self.parameter_domain()
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Nurbs
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

impl Curve2d for NurbsCurve<2> {
    fn evaluate(&self, t: f64) -> Point2 {
        Point2::from(self.eval(t))
    }

    fn tangent(&self, t: f64) -> Vec2 {
        self.derivatives(t)[1]
    }

    fn second_derivative(&self, t: f64) -> Vec2 {
        self.derivatives(t)[2]
    }

    fn domain(&self) -> (f64, f64) {
        self.parameter_domain()
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_1_SQRT_2;

    #[test]
    fn test_quarter_circle_arc_is_exact() {
        let arc = NurbsCurve3::conic_arc(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            FRAC_1_SQRT_2,
        );
        for i in 0..=10 {
            let p = arc.eval(i as f64 / 10.0);
            assert_relative_eq!(p.norm(), 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(arc.eval(1.0), Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_parabola_weight_one() {
        // y = x² through (-1, 1), (1, 1) with tangents meeting at (0, -1)
        let arc = NurbsCurve2::conic_arc(Vec2::new(-1.0, 1.0), Vec2::new(0.0, -1.0), Vec2::new(1.0, 1.0), 1.0);
        for i in 0..=8 {
            let p = arc.eval(i as f64 / 8.0);
            assert_relative_eq!(p.y, p.x * p.x, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_hyperbola_weight_above_one() {
        // x² - y² = 1 branch between (√2, -1) and (√2, 1) has its vertex at (1, 0)
        let s2 = 2.0f64.sqrt();
        let apex = Vec2::new(1.0 / s2, 0.0);
        let arc = NurbsCurve2::conic_arc(Vec2::new(s2, -1.0), apex, Vec2::new(s2, 1.0), s2);
        for i in 0..=8 {
            let p = arc.eval(i as f64 / 8.0);
            assert_relative_eq!(p.x * p.x - p.y * p.y, 1.0, epsilon = 1e-9);
        }
        assert_relative_eq!(arc.eval(0.5), Vec2::new(1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let arc = NurbsCurve3::conic_arc(
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 3.0, 1.0),
            Vec3::new(-1.0, 2.0, 0.0),
            0.6,
        );
        let h = 1e-5;
        for t in [0.0, 0.3, 0.77, 1.0] {
            let [_, d1, d2] = arc.derivatives(t);
            let a = (t - h).max(0.0);
            let b = (t + h).min(1.0);
            let fd1 = (arc.eval(b) - arc.eval(a)) / (b - a);
            assert!((fd1 - d1).norm() < 1e-4, "t={t}");
            let fd2 = (arc.derivatives(b)[1] - arc.derivatives(a)[1]) / (b - a);
            assert!((fd2 - d2).norm() < 1e-3, "t={t}");
        }
    }

    #[test]
    fn test_interpolation_hits_points() {
        let points: Vec<Vec3> = (0..7)
            .map(|i| {
                let x = i as f64;
                Vec3::new(x, (x * 0.7).sin(), 0.1 * x * x)
            })
            .collect();
        let params: Vec<f64> = (0..7).map(|i| i as f64 / 6.0).collect();
        for degree in [2, 3] {
            let curve = NurbsCurve3::interpolate(&points, &params, degree).unwrap();
            assert_eq!(curve.degree, degree);
            for (p, t) in points.iter().zip(&params) {
                assert_relative_eq!(curve.eval(*t), *p, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_interpolation_rejects_bad_input() {
        let pts = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0)];
        assert!(NurbsCurve2::interpolate(&pts, &[0.0, 0.0], 2).is_none());
        assert!(NurbsCurve2::interpolate(&pts, &[0.0], 2).is_none());
        let line = NurbsCurve2::interpolate(&pts, &[0.0, 1.0], 3).unwrap();
        assert_eq!(line.degree, 1);
        assert_relative_eq!(line.eval(0.25), Vec2::new(0.25, 0.25), epsilon = 1e-12);
    }

    #[test]
    fn test_map_points_projects_exactly() {
        let arc = NurbsCurve3::conic_arc(
            Vec3::new(1.0, 0.0, 5.0),
            Vec3::new(1.0, 1.0, 5.0),
            Vec3::new(0.0, 1.0, 5.0),
            FRAC_1_SQRT_2,
        );
        let flat: NurbsCurve2 = arc.map_points(|p| Vec2::new(p.x, p.y));
        for i in 0..=4 {
            let t = i as f64 / 4.0;
            let p3 = arc.eval(t);
            assert_relative_eq!(flat.eval(t), Vec2::new(p3.x, p3.y), epsilon = 1e-12);
        }
        let c: &dyn Curve2d = &flat;
        assert_relative_eq!(c.parameter_of(&Point2::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2)), 0.5, epsilon = 1e-8);
    }

    #[test]
    fn test_invalid_construction() {
        let pts = vec![Vec2::zeros(), Vec2::x(), Vec2::y()];
        assert!(NurbsCurve2::new(pts.clone(), vec![1.0, -1.0, 1.0], vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0], 2).is_none());
        assert!(NurbsCurve2::new(pts, vec![1.0; 3], vec![0.0, 0.0, 1.0, 1.0], 2).is_none());
    }
}
