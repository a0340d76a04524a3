//! Mode-tagged 3D affine transforms.

use std::ops::Mul;

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::{Dir3, MathError, Point3, Result, TransformMode, Vec3};

/// Determinant magnitude below which a 3D transform is treated as singular.
const SINGULAR_DET_3D: f64 = 1e-32;

/// A 3D affine transform: a 3×3 linear block plus a translation.
///
/// `p' = matrix * p + translation`. Vectors ignore the translation.
/// The cached [`TransformMode`] is recomputed conservatively on every
/// composition and inversion. Only the matrix and translation are
/// persisted; a restored transform is `Identity` or `Translation` when the
/// linear block is exactly the identity and `Other` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransformRecord3d", into = "TransformRecord3d")]
pub struct AffineTransform3d {
    matrix: Matrix3<f64>,
    translation: Vec3,
    mode: TransformMode,
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct TransformRecord3d {
    matrix: Matrix3<f64>,
    translation: Vec3,
}

impl From<TransformRecord3d> for AffineTransform3d {
    fn from(record: TransformRecord3d) -> Self {
        if record.matrix == Matrix3::identity() {
            return Self::translation(record.translation);
        }
        Self::from_parts(record.matrix, record.translation)
    }
}

impl From<AffineTransform3d> for TransformRecord3d {
    fn from(t: AffineTransform3d) -> Self {
        Self {
            matrix: t.matrix,
            translation: t.translation,
        }
    }
}

impl AffineTransform3d {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
            translation: Vec3::zeros(),
            mode: TransformMode::Identity,
        }
    }

    /// The all-zero transform.
    ///
    /// Only meaningful as an "uninitialized" sentinel; it is never a valid
    /// transform and cannot be inverted.
    pub fn null() -> Self {
        Self {
            matrix: Matrix3::zeros(),
            translation: Vec3::zeros(),
            mode: TransformMode::Other,
        }
    }

    /// Build from a raw linear block and translation.
    ///
    /// The mode is `Other`; use the named constructors when the structure is
    /// known.
    pub fn from_parts(matrix: Matrix3<f64>, translation: Vec3) -> Self {
        Self {
            matrix,
            translation,
            mode: TransformMode::Other,
        }
    }

    /// Transform mapping the canonical axes onto `x`, `y`, `z` and the origin
    /// onto `origin`.
    pub fn from_frame(origin: Point3, x: Vec3, y: Vec3, z: Vec3) -> Self {
        Self::from_parts(Matrix3::from_columns(&[x, y, z]), origin.coords)
    }

    /// Translation by `v`.
    pub fn translation(v: Vec3) -> Self {
        let mode = if v == Vec3::zeros() {
            TransformMode::Identity
        } else {
            TransformMode::Translation
        };
        Self {
            matrix: Matrix3::identity(),
            translation: v,
            mode,
        }
    }

    /// Rotation about an axis through the origin by `angle` radians.
    ///
    /// Uses Rodrigues' rotation formula:
    /// `R = I·cosθ + sinθ·[a]× + (1 - cosθ)·a⊗a`.
    pub fn rotation(axis: &Dir3, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let a = axis.as_ref();
        let cross = Matrix3::new(0.0, -a.z, a.y, a.z, 0.0, -a.x, -a.y, a.x, 0.0);
        let matrix = Matrix3::identity() * c + cross * s + (a * a.transpose()) * (1.0 - c);
        Self {
            matrix,
            translation: Vec3::zeros(),
            mode: TransformMode::Rotation,
        }
    }

    /// Rotation about the axis through `point` along `axis`.
    pub fn rotation_about(point: &Point3, axis: &Dir3, angle: f64) -> Self {
        Self::conjugate_about(point, Self::rotation(axis, angle))
    }

    /// Uniform scale about the origin.
    pub fn uniform_scale(factor: f64) -> Self {
        Self {
            matrix: Matrix3::identity() * factor,
            translation: Vec3::zeros(),
            mode: TransformMode::Scale,
        }
    }

    /// Uniform scale about `point`.
    pub fn uniform_scale_about(point: &Point3, factor: f64) -> Self {
        Self::conjugate_about(point, Self::uniform_scale(factor))
    }

    /// Scale by `factor` along `direction` only (through the origin).
    ///
    /// Rotates `direction` onto X, scales X, and rotates back.
    pub fn directional_scale(direction: &Dir3, factor: f64) -> Self {
        let d = direction.into_inner();
        let e1 = crate::any_perpendicular(&d);
        let e2 = d.cross(&e1);
        let frame = Matrix3::from_columns(&[d, e1, e2]);
        let scale = Matrix3::from_diagonal(&Vec3::new(factor, 1.0, 1.0));
        Self::from_parts(frame * scale * frame.transpose(), Vec3::zeros())
    }

    /// Reflection in the plane through `point` with normal `normal`.
    pub fn reflect_plane(point: &Point3, normal: &Dir3) -> Self {
        let n = normal.as_ref();
        let matrix = Matrix3::identity() - (n * n.transpose()) * 2.0;
        Self {
            matrix,
            translation: n * (2.0 * point.coords.dot(n)),
            mode: TransformMode::PlaneMirror,
        }
    }

    /// Central symmetry through `point`.
    pub fn reflect_point(point: &Point3) -> Self {
        Self {
            matrix: -Matrix3::identity(),
            translation: point.coords * 2.0,
            mode: TransformMode::PointMirror,
        }
    }

    /// Half-turn symmetry about the axis through `point` along `direction`.
    pub fn reflect_axis(point: &Point3, direction: &Dir3) -> Self {
        let d = direction.as_ref();
        let matrix = (d * d.transpose()) * 2.0 - Matrix3::identity();
        Self {
            matrix,
            translation: point.coords - matrix * point.coords,
            mode: TransformMode::AxisMirror,
        }
    }

    fn conjugate_about(point: &Point3, t: Self) -> Self {
        Self::translation(point.coords) * t * Self::translation(-point.coords)
    }

    /// The linear (rotation/scale/shear) block.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// The translation column.
    pub fn translation_part(&self) -> &Vec3 {
        &self.translation
    }

    /// The cached mode tag.
    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    /// Determinant of the linear block.
    pub fn determinant(&self) -> f64 {
        let m = &self.matrix;
        m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
            - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
            + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
    }

    /// Uniform-scale proxy `|det|^(1/3)`.
    pub fn scale_factor(&self) -> f64 {
        self.determinant().abs().cbrt()
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        match self.mode {
            TransformMode::Identity => *p,
            TransformMode::Translation => p + self.translation,
            _ => Point3::from(self.matrix * p.coords + self.translation),
        }
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        if self.mode.is_pure_translation() {
            *v
        } else {
            self.matrix * v
        }
    }

    /// `self ∘ inner`: apply `inner` first, then `self`.
    pub fn compose(&self, inner: &Self) -> Self {
        let matrix = self.matrix * inner.matrix;
        let translation = self.matrix * inner.translation + self.translation;
        let mode = TransformMode::compose(self.mode, inner.mode, || {
            is_proper_rotation(&matrix)
        });
        Self {
            matrix,
            translation,
            mode,
        }
    }

    /// Closed-form (cofactor) inverse.
    ///
    /// Fails with [`MathError::SingularTransform`] when `|det| < 1e-32`.
    pub fn inverse(&self) -> Result<Self> {
        match self.mode {
            TransformMode::Identity => return Ok(*self),
            TransformMode::Translation => return Ok(Self::translation(-self.translation)),
            _ => {}
        }
        let det = self.determinant();
        if !(det.abs() >= SINGULAR_DET_3D) {
            return Err(MathError::SingularTransform { determinant: det });
        }
        let m = &self.matrix;
        let cof = Matrix3::new(
            m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)],
            m[(0, 2)] * m[(2, 1)] - m[(0, 1)] * m[(2, 2)],
            m[(0, 1)] * m[(1, 2)] - m[(0, 2)] * m[(1, 1)],
            m[(1, 2)] * m[(2, 0)] - m[(1, 0)] * m[(2, 2)],
            m[(0, 0)] * m[(2, 2)] - m[(0, 2)] * m[(2, 0)],
            m[(0, 2)] * m[(1, 0)] - m[(0, 0)] * m[(1, 2)],
            m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)],
            m[(0, 1)] * m[(2, 0)] - m[(0, 0)] * m[(2, 1)],
            m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
        );
        let matrix = cof / det;
        Ok(Self {
            matrix,
            translation: -(matrix * self.translation),
            mode: self.mode,
        })
    }

    /// True if the three basis images are mutually perpendicular and the
    /// determinant has unit magnitude.
    pub fn is_orthogonal(&self, tol: f64) -> bool {
        self.is_isogonal(tol) && (self.determinant().abs() - 1.0).abs() < tol
    }

    /// True if the three basis images are mutually perpendicular.
    pub fn is_isogonal(&self, tol: f64) -> bool {
        let c: Vec<Vec3> = (0..3).map(|i| self.matrix.column(i).into_owned()).collect();
        let perpendicular = |a: &Vec3, b: &Vec3| {
            let scale = a.norm() * b.norm();
            scale > 0.0 && (a.dot(b) / scale).abs() < tol
        };
        perpendicular(&c[0], &c[1]) && perpendicular(&c[1], &c[2]) && perpendicular(&c[0], &c[2])
    }

    /// Component-wise comparison of linear block and translation.
    pub fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        (self.matrix - other.matrix).amax() < tol
            && (self.translation - other.translation).amax() < tol
    }
}

fn is_proper_rotation(m: &Matrix3<f64>) -> bool {
    let gram = m.transpose() * m;
    (gram - Matrix3::identity()).amax() < 1e-12 && m.determinant() > 0.0
}

impl Default for AffineTransform3d {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for AffineTransform3d {
    type Output = AffineTransform3d;

    fn mul(self, rhs: AffineTransform3d) -> AffineTransform3d {
        self.compose(&rhs)
    }
}

impl Mul<Point3> for AffineTransform3d {
    type Output = Point3;

    fn mul(self, rhs: Point3) -> Point3 {
        self.apply_point(&rhs)
    }
}

impl Mul<Vec3> for AffineTransform3d {
    type Output = Vec3;

    fn mul(self, rhs: Vec3) -> Vec3 {
        self.apply_vec(&rhs)
    }
}

/// Scales a length by the transform's uniform-scale proxy.
impl Mul<f64> for AffineTransform3d {
    type Output = f64;

    fn mul(self, rhs: f64) -> f64 {
        rhs * self.scale_factor()
    }
}
