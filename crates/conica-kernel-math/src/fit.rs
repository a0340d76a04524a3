//! Correspondence fitting: find the affine transform that maps a set of
//! source vectors or points onto destinations.
//!
//! Minimal correspondence counts are solved exactly; anything above that is
//! a least-squares fit through a thin QR decomposition.

use nalgebra::{DMatrix, Matrix2, Matrix3};

use crate::{
    any_perpendicular, AffineTransform2d, AffineTransform3d, Dir3, MathError, Point2, Point3,
    Result, Vec2, Vec3,
};

/// Relative determinant below which an exact fit is considered singular.
const FIT_SINGULAR_REL: f64 = 1e-12;

fn check_counts(sources: usize, targets: usize) -> Result<()> {
    if sources != targets {
        return Err(MathError::FitCountMismatch { sources, targets });
    }
    if sources == 0 {
        return Err(MathError::EmptyFit);
    }
    Ok(())
}

/// Solve `a * x = b` in the least-squares sense. `a` must have at least as
/// many rows as columns.
fn least_squares(a: DMatrix<f64>, b: DMatrix<f64>) -> Result<DMatrix<f64>> {
    let scale = a.amax();
    if !(scale > 0.0) || !scale.is_finite() {
        return Err(MathError::SingularFit);
    }
    let qr = a.qr();
    let r = qr.r();
    if r.diagonal().iter().any(|d| d.abs() <= FIT_SINGULAR_REL * scale) {
        return Err(MathError::SingularFit);
    }
    let rhs = qr.q().transpose() * b;
    let x = r
        .solve_upper_triangular(&rhs)
        .ok_or(MathError::SingularFit)?;
    if x.iter().all(|v| v.is_finite()) {
        Ok(x)
    } else {
        Err(MathError::SingularFit)
    }
}

/// `D * S⁻¹` for column-stacked 3×3 frames.
fn solve_frames3(s: &Matrix3<f64>, d: &Matrix3<f64>) -> Result<Matrix3<f64>> {
    let norms: f64 = (0..3).map(|i| s.column(i).norm()).product();
    if !(s.determinant().abs() > FIT_SINGULAR_REL * norms) {
        return Err(MathError::SingularFit);
    }
    let inv = s.try_inverse().ok_or(MathError::SingularFit)?;
    let m = d * inv;
    if m.iter().all(|v| v.is_finite()) {
        Ok(m)
    } else {
        Err(MathError::SingularFit)
    }
}

fn solve_frames2(s: &Matrix2<f64>, d: &Matrix2<f64>) -> Result<Matrix2<f64>> {
    let norms = s.column(0).norm() * s.column(1).norm();
    if !(s.determinant().abs() > FIT_SINGULAR_REL * norms) {
        return Err(MathError::SingularFit);
    }
    let inv = s.try_inverse().ok_or(MathError::SingularFit)?;
    let m = d * inv;
    if m.iter().all(|v| v.is_finite()) {
        Ok(m)
    } else {
        Err(MathError::SingularFit)
    }
}

/// Cross product of the destination pair, rescaled so a similarity of scale
/// `k` maps the source cross product onto a vector of length `k·|ns|`.
fn matched_normal(ns: &Vec3, nd: &Vec3) -> Result<Vec3> {
    let ls = ns.norm();
    let ld = nd.norm();
    if !(ls > 0.0) || !(ld > 0.0) {
        return Err(MathError::SingularFit);
    }
    Ok(nd / ld * ls * (ld / ls).sqrt())
}

impl AffineTransform3d {
    /// Minimal rotation taking `from` onto the direction of `to`, combined
    /// with the uniform scale `|to| / |from|`.
    fn align_vector(from: &Vec3, to: &Vec3, do_scale: bool) -> Result<Self> {
        let (lf, lt) = (from.norm(), to.norm());
        if !(lf > 0.0) || !(lt > 0.0) {
            return Err(MathError::SingularFit);
        }
        let (a, b) = (from / lf, to / lt);
        let axis = a.cross(&b);
        let sin = axis.norm();
        let cos = a.dot(&b);
        let rotation = if sin > 1e-15 {
            Self::rotation(&Dir3::new_unchecked(axis / sin), sin.atan2(cos))
        } else if cos > 0.0 {
            Self::identity()
        } else {
            Self::rotation(&Dir3::new_unchecked(any_perpendicular(&a)), std::f64::consts::PI)
        };
        if do_scale && (lt / lf - 1.0).abs() > 1e-15 {
            Ok(Self::uniform_scale(lt / lf) * rotation)
        } else {
            Ok(rotation)
        }
    }

    /// Fit the linear transform mapping each `src` vector onto `dst`.
    ///
    /// - 1 vector: rotation plus uniform scale.
    /// - 2 vectors: the cross products are added as a third correspondence.
    /// - 3 vectors: exact solve.
    /// - 4 or more: least squares.
    pub fn fit_vectors(src: &[Vec3], dst: &[Vec3]) -> Result<Self> {
        check_counts(src.len(), dst.len())?;
        match src.len() {
            1 => Self::align_vector(&src[0], &dst[0], true),
            2 => {
                let ns = src[0].cross(&src[1]);
                let nd = matched_normal(&ns, &dst[0].cross(&dst[1]))?;
                let s = Matrix3::from_columns(&[src[0], src[1], ns]);
                let d = Matrix3::from_columns(&[dst[0], dst[1], nd]);
                Ok(Self::from_parts(solve_frames3(&s, &d)?, Vec3::zeros()))
            }
            3 => {
                let s = Matrix3::from_columns(&[src[0], src[1], src[2]]);
                let d = Matrix3::from_columns(&[dst[0], dst[1], dst[2]]);
                Ok(Self::from_parts(solve_frames3(&s, &d)?, Vec3::zeros()))
            }
            n => {
                tracing::trace!(count = n, "least-squares vector fit");
                let a = DMatrix::from_fn(n, 3, |r, c| src[r][c]);
                let b = DMatrix::from_fn(n, 3, |r, c| dst[r][c]);
                let x = least_squares(a, b)?;
                // x is Mᵀ
                let m = Matrix3::from_fn(|r, c| x[(c, r)]);
                Ok(Self::from_parts(m, Vec3::zeros()))
            }
        }
    }

    /// Fit the affine transform mapping each `src` point onto `dst`.
    ///
    /// - 1 point: translation.
    /// - 2 points: rotation and translation, plus uniform scale if `do_scale`.
    /// - 3 points: exact affine fit; the triangle normal maps onto the
    ///   destination normal with its length preserved.
    /// - 4 or more: least-squares affine fit (exact for 4 points in general
    ///   position).
    pub fn fit_points(src: &[Point3], dst: &[Point3], do_scale: bool) -> Result<Self> {
        check_counts(src.len(), dst.len())?;
        match src.len() {
            1 => Ok(Self::translation(dst[0] - src[0])),
            2 => {
                let linear = Self::align_vector(&(src[1] - src[0]), &(dst[1] - dst[0]), do_scale)?;
                let moved = linear.apply_point(&src[0]);
                Ok(Self::translation(dst[0] - moved) * linear)
            }
            3 => {
                let (e1, e2) = (src[1] - src[0], src[2] - src[0]);
                let (f1, f2) = (dst[1] - dst[0], dst[2] - dst[0]);
                let ns = e1.cross(&e2);
                let fd = f1.cross(&f2);
                let nd_len = fd.norm();
                if !(nd_len > 0.0) {
                    return Err(MathError::SingularFit);
                }
                let nd = fd / nd_len * ns.norm();
                let s = Matrix3::from_columns(&[e1, e2, ns]);
                let d = Matrix3::from_columns(&[f1, f2, nd]);
                let m = solve_frames3(&s, &d)?;
                Ok(Self::from_parts(m, dst[0].coords - m * src[0].coords))
            }
            n => {
                tracing::trace!(count = n, "least-squares point fit");
                let a = DMatrix::from_fn(n, 4, |r, c| if c < 3 { src[r][c] } else { 1.0 });
                let b = DMatrix::from_fn(n, 3, |r, c| dst[r][c]);
                let x = least_squares(a, b)?;
                let m = Matrix3::from_fn(|r, c| x[(c, r)]);
                let t = Vec3::new(x[(3, 0)], x[(3, 1)], x[(3, 2)]);
                Ok(Self::from_parts(m, t))
            }
        }
    }
}

impl AffineTransform2d {
    fn align_vector(from: &Vec2, to: &Vec2, do_scale: bool) -> Result<Self> {
        let (lf, lt) = (from.norm(), to.norm());
        if !(lf > 0.0) || !(lt > 0.0) {
            return Err(MathError::SingularFit);
        }
        let angle = from.perp(to).atan2(from.dot(to));
        let rotation = Self::rotation(angle);
        if do_scale && (lt / lf - 1.0).abs() > 1e-15 {
            Ok(Self::uniform_scale(lt / lf) * rotation)
        } else {
            Ok(rotation)
        }
    }

    /// Fit the linear transform mapping each `src` vector onto `dst`:
    /// 1 vector gives rotation plus scale, 2 an exact solve, 3 or more a
    /// least-squares fit.
    pub fn fit_vectors(src: &[Vec2], dst: &[Vec2]) -> Result<Self> {
        check_counts(src.len(), dst.len())?;
        match src.len() {
            1 => Self::align_vector(&src[0], &dst[0], true),
            2 => {
                let s = Matrix2::from_columns(&[src[0], src[1]]);
                let d = Matrix2::from_columns(&[dst[0], dst[1]]);
                Ok(Self::from_parts(solve_frames2(&s, &d)?, Vec2::zeros()))
            }
            n => {
                let a = DMatrix::from_fn(n, 2, |r, c| src[r][c]);
                let b = DMatrix::from_fn(n, 2, |r, c| dst[r][c]);
                let x = least_squares(a, b)?;
                let m = Matrix2::from_fn(|r, c| x[(c, r)]);
                Ok(Self::from_parts(m, Vec2::zeros()))
            }
        }
    }

    /// Fit the affine transform mapping each `src` point onto `dst`:
    /// 1 point gives a translation, 2 a rigid motion (similarity if
    /// `do_scale`), 3 an exact affine fit, more a least-squares fit.
    pub fn fit_points(src: &[Point2], dst: &[Point2], do_scale: bool) -> Result<Self> {
        check_counts(src.len(), dst.len())?;
        match src.len() {
            1 => Ok(Self::translation(dst[0] - src[0])),
            2 => {
                let linear = Self::align_vector(&(src[1] - src[0]), &(dst[1] - dst[0]), do_scale)?;
                let moved = linear.apply_point(&src[0]);
                Ok(Self::translation(dst[0] - moved) * linear)
            }
            3 => {
                let s = Matrix2::from_columns(&[src[1] - src[0], src[2] - src[0]]);
                let d = Matrix2::from_columns(&[dst[1] - dst[0], dst[2] - dst[0]]);
                let m = solve_frames2(&s, &d)?;
                Ok(Self::from_parts(m, dst[0].coords - m * src[0].coords))
            }
            n => {
                tracing::trace!(count = n, "least-squares 2d point fit");
                let a = DMatrix::from_fn(n, 3, |r, c| if c < 2 { src[r][c] } else { 1.0 });
                let b = DMatrix::from_fn(n, 2, |r, c| dst[r][c]);
                let x = least_squares(a, b)?;
                let m = Matrix2::from_fn(|r, c| x[(c, r)]);
                Ok(Self::from_parts(m, Vec2::new(x[(2, 0)], x[(2, 1)])))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransformMode;
    use proptest::prelude::*;

    fn sample_affine() -> AffineTransform3d {
        AffineTransform3d::from_parts(
            Matrix3::new(1.2, 0.3, -0.1, 0.0, 0.9, 0.4, 0.2, -0.5, 1.1),
            Vec3::new(3.0, -2.0, 5.0),
        )
    }

    fn assert_maps(t: &AffineTransform3d, src: &[Point3], dst: &[Point3]) {
        for (s, d) in src.iter().zip(dst) {
            assert!((t.apply_point(s) - d).norm() < 1e-9, "{s} -> {d}");
        }
    }

    #[test]
    fn test_fit_count_errors() {
        let p = [Point3::origin()];
        assert!(matches!(
            AffineTransform3d::fit_points(&p, &[], true),
            Err(MathError::FitCountMismatch { sources: 1, targets: 0 })
        ));
        assert!(matches!(
            AffineTransform3d::fit_points(&[], &[], true),
            Err(MathError::EmptyFit)
        ));
    }

    #[test]
    fn test_fit_one_point_is_translation() {
        let t = AffineTransform3d::fit_points(
            &[Point3::new(1.0, 1.0, 1.0)],
            &[Point3::new(2.0, 3.0, 4.0)],
            true,
        )
        .unwrap();
        assert_eq!(t.mode(), TransformMode::Translation);
        assert_maps(&t, &[Point3::origin()], &[Point3::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn test_fit_two_points_with_and_without_scale() {
        let src = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let dst = [Point3::new(1.0, 1.0, 1.0), Point3::new(1.0, 3.0, 1.0)];
        let scaled = AffineTransform3d::fit_points(&src, &dst, true).unwrap();
        assert_maps(&scaled, &src, &dst);
        assert_eq!(scaled.mode(), TransformMode::Compound);

        let rigid = AffineTransform3d::fit_points(&src, &dst, false).unwrap();
        assert!(rigid.is_orthogonal(1e-12));
        assert!((rigid.apply_point(&src[1]) - Point3::new(1.0, 2.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_fit_two_antiparallel_points() {
        let src = [Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        let dst = [Point3::origin(), Point3::new(-1.0, 0.0, 0.0)];
        let t = AffineTransform3d::fit_points(&src, &dst, false).unwrap();
        assert_maps(&t, &src, &dst);
        assert!(t.determinant() > 0.0);
    }

    #[test]
    fn test_fit_three_and_four_points_exact() {
        let truth = sample_affine();
        let src = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(0.0, 0.0, 3.0),
        ];
        let dst: Vec<Point3> = src.iter().map(|p| truth * *p).collect();
        let three = AffineTransform3d::fit_points(&src[..3], &dst[..3], true).unwrap();
        assert_maps(&three, &src[..3], &dst[..3]);
        let four = AffineTransform3d::fit_points(&src, &dst, true).unwrap();
        assert!(four.approx_eq(&truth, 1e-9));
    }

    #[test]
    fn test_fit_collinear_points_is_singular() {
        let src = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)];
        let dst = [Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0), Point3::new(1.0, 1.0, 0.0)];
        assert!(matches!(
            AffineTransform3d::fit_points(&src, &dst, true),
            Err(MathError::SingularFit)
        ));
    }

    #[test]
    fn test_fit_least_squares_beats_truth_on_noisy_data() {
        let truth = sample_affine();
        let src: Vec<Point3> = (0..12)
            .map(|i| {
                let f = i as f64;
                Point3::new(f.sin() * 4.0, (f * 0.7).cos() * 3.0, f * 0.5)
            })
            .collect();
        let dst: Vec<Point3> = src
            .iter()
            .enumerate()
            .map(|(i, p)| truth * *p + Vec3::new(0.01, -0.02, 0.015) * if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let fit = AffineTransform3d::fit_points(&src, &dst, true).unwrap();
        let residual = |t: &AffineTransform3d| -> f64 {
            src.iter().zip(&dst).map(|(s, d)| (t.apply_point(s) - d).norm_squared()).sum()
        };
        assert!(residual(&fit) <= residual(&truth) + 1e-12);
    }

    #[test]
    fn test_fit_vectors_cone_frame() {
        let (s, c) = (0.3f64.sin(), 0.3f64.cos());
        let src = [Vec3::x(), Vec3::y(), Vec3::z()];
        let dst = [Vec3::y() * s, Vec3::z() * s, Vec3::x() * c];
        let t = AffineTransform3d::fit_vectors(&src, &dst).unwrap();
        for (a, b) in src.iter().zip(&dst) {
            assert!((t * *a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_fit_vectors_two_similarity() {
        let rot = AffineTransform3d::uniform_scale(2.0)
            * AffineTransform3d::rotation(&Dir3::new_normalize(Vec3::new(1.0, 2.0, 3.0)), 0.8);
        let src = [Vec3::new(1.0, 0.0, 0.5), Vec3::new(0.0, 1.0, -0.2)];
        let dst = [rot * src[0], rot * src[1]];
        let t = AffineTransform3d::fit_vectors(&src, &dst).unwrap();
        assert!(t.approx_eq(&rot, 1e-9));
    }

    #[test]
    fn test_fit_2d_family() {
        let truth = AffineTransform2d::from_parts(Matrix2::new(1.5, 0.2, -0.3, 0.8), Vec2::new(1.0, 2.0));
        let src = [Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), Point2::new(0.0, 1.0), Point2::new(1.0, 1.0)];
        let dst: Vec<Point2> = src.iter().map(|p| truth * *p).collect();
        let three = AffineTransform2d::fit_points(&src[..3], &dst[..3], true).unwrap();
        assert!(three.approx_eq(&truth, 1e-12));
        let four = AffineTransform2d::fit_points(&src, &dst, true).unwrap();
        assert!(four.approx_eq(&truth, 1e-9));

        let two = AffineTransform2d::fit_points(&src[..2], &dst[..2], true).unwrap();
        for (s, d) in src[..2].iter().zip(&dst[..2]) {
            assert!((two * *s - d).norm() < 1e-12);
        }

        let v = AffineTransform2d::fit_vectors(&[Vec2::x()], &[Vec2::new(0.0, 3.0)]).unwrap();
        assert!((v * Vec2::y() - Vec2::new(-3.0, 0.0)).norm() < 1e-12);

        let vs = [Vec2::x(), Vec2::y(), Vec2::new(1.0, 1.0)];
        let vd: Vec<Vec2> = vs.iter().map(|v| truth * *v).collect();
        let ls = AffineTransform2d::fit_vectors(&vs, &vd).unwrap();
        assert!((ls.matrix() - truth.matrix()).amax() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_three_point_fit_is_exact(
            coords in proptest::collection::vec(-10.0f64..10.0, 18),
        ) {
            let src: Vec<Point3> = coords[..9].chunks(3).map(|c| Point3::new(c[0], c[1], c[2])).collect();
            let dst: Vec<Point3> = coords[9..].chunks(3).map(|c| Point3::new(c[0], c[1], c[2])).collect();
            let area_s = (src[1] - src[0]).cross(&(src[2] - src[0])).norm();
            let area_d = (dst[1] - dst[0]).cross(&(dst[2] - dst[0])).norm();
            prop_assume!(area_s > 1e-2 && area_d > 1e-2);
            let t = AffineTransform3d::fit_points(&src, &dst, true).unwrap();
            for (s, d) in src.iter().zip(&dst) {
                prop_assert!((t.apply_point(s) - d).norm() < 1e-7);
            }
        }
    }
}
