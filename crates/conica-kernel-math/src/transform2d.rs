//! Mode-tagged 2D affine transforms, used for parameter-space
//! re-parameterizations and sketch-plane mappings.

use std::ops::Mul;

use nalgebra::{Matrix2, Matrix3};
use serde::{Deserialize, Serialize};

use crate::{AffineTransform3d, MathError, Point2, Result, TransformMode, Vec2, Vec3};

const SINGULAR_DET_2D: f64 = 1e-16;

/// A 2D affine transform: a 2×2 linear block plus a translation.
///
/// Persisted as matrix and translation only, like [`AffineTransform3d`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransformRecord2d", into = "TransformRecord2d")]
pub struct AffineTransform2d {
    matrix: Matrix2<f64>,
    translation: Vec2,
    mode: TransformMode,
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct TransformRecord2d {
    matrix: Matrix2<f64>,
    translation: Vec2,
}

impl From<TransformRecord2d> for AffineTransform2d {
    fn from(record: TransformRecord2d) -> Self {
        if record.matrix == Matrix2::identity() {
            return Self::translation(record.translation);
        }
        Self::from_parts(record.matrix, record.translation)
    }
}

impl From<AffineTransform2d> for TransformRecord2d {
    fn from(t: AffineTransform2d) -> Self {
        Self {
            matrix: t.matrix,
            translation: t.translation,
        }
    }
}

impl AffineTransform2d {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix2::identity(),
            translation: Vec2::zeros(),
            mode: TransformMode::Identity,
        }
    }

    /// The all-zero sentinel transform.
    pub fn null() -> Self {
        Self {
            matrix: Matrix2::zeros(),
            translation: Vec2::zeros(),
            mode: TransformMode::Other,
        }
    }

    /// Build from a raw linear block and translation (mode `Other`).
    pub fn from_parts(matrix: Matrix2<f64>, translation: Vec2) -> Self {
        Self {
            matrix,
            translation,
            mode: TransformMode::Other,
        }
    }

    /// Transform mapping the canonical axes onto `x`, `y` and the origin onto
    /// `origin`.
    pub fn from_frame(origin: Point2, x: Vec2, y: Vec2) -> Self {
        Self::from_parts(Matrix2::from_columns(&[x, y]), origin.coords)
    }

    /// Translation by `v`.
    pub fn translation(v: Vec2) -> Self {
        let mode = if v == Vec2::zeros() {
            TransformMode::Identity
        } else {
            TransformMode::Translation
        };
        Self {
            matrix: Matrix2::identity(),
            translation: v,
            mode,
        }
    }

    /// Counter-clockwise rotation about the origin.
    pub fn rotation(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            matrix: Matrix2::new(c, -s, s, c),
            translation: Vec2::zeros(),
            mode: TransformMode::Rotation,
        }
    }

    /// Counter-clockwise rotation about `center`.
    pub fn rotation_about(center: &Point2, angle: f64) -> Self {
        Self::translation(center.coords) * Self::rotation(angle) * Self::translation(-center.coords)
    }

    /// Uniform scale about the origin.
    pub fn uniform_scale(factor: f64) -> Self {
        Self {
            matrix: Matrix2::identity() * factor,
            translation: Vec2::zeros(),
            mode: TransformMode::Scale,
        }
    }

    /// Uniform scale about `center`.
    pub fn uniform_scale_about(center: &Point2, factor: f64) -> Self {
        Self::translation(center.coords)
            * Self::uniform_scale(factor)
            * Self::translation(-center.coords)
    }

    /// Scale by `factor` along `direction` only.
    ///
    /// `direction` need not be normalized but must be non-zero.
    pub fn directional_scale(direction: &Vec2, factor: f64) -> Self {
        let d = direction.normalize();
        let frame = Matrix2::new(d.x, -d.y, d.y, d.x);
        let scale = Matrix2::new(factor, 0.0, 0.0, 1.0);
        Self::from_parts(frame * scale * frame.transpose(), Vec2::zeros())
    }

    /// Mirror in the line through `point` along `direction`.
    pub fn reflect_line(point: &Point2, direction: &Vec2) -> Self {
        let d = direction.normalize();
        let matrix = (d * d.transpose()) * 2.0 - Matrix2::identity();
        Self {
            matrix,
            translation: point.coords - matrix * point.coords,
            mode: TransformMode::PlaneMirror,
        }
    }

    /// Central symmetry through `point`.
    pub fn reflect_point(point: &Point2) -> Self {
        Self {
            matrix: -Matrix2::identity(),
            translation: point.coords * 2.0,
            mode: TransformMode::PointMirror,
        }
    }

    /// Embed into 3D acting on the z = 0 plane (z is passed through).
    pub fn to_3d(&self) -> AffineTransform3d {
        let m = &self.matrix;
        let matrix = Matrix3::new(
            m[(0, 0)], m[(0, 1)], 0.0, //
            m[(1, 0)], m[(1, 1)], 0.0, //
            0.0, 0.0, 1.0,
        );
        let t = Vec3::new(self.translation.x, self.translation.y, 0.0);
        match self.mode {
            TransformMode::Identity => AffineTransform3d::identity(),
            TransformMode::Translation => AffineTransform3d::translation(t),
            _ => AffineTransform3d::from_parts(matrix, t),
        }
    }

    /// Project a 3D transform onto the plane spanned by the two axes other
    /// than `dropped_axis` (0 = x, 1 = y, 2 = z).
    ///
    /// Returns `None` for an axis index out of range.
    pub fn from_3d_projection(t: &AffineTransform3d, dropped_axis: usize) -> Option<Self> {
        let (i, j) = match dropped_axis {
            0 => (1, 2),
            1 => (0, 2),
            2 => (0, 1),
            _ => return None,
        };
        let m = t.matrix();
        let tr = t.translation_part();
        let matrix = Matrix2::new(m[(i, i)], m[(i, j)], m[(j, i)], m[(j, j)]);
        let translation = Vec2::new(tr[i], tr[j]);
        let mode = match t.mode() {
            TransformMode::Identity => TransformMode::Identity,
            TransformMode::Translation => {
                if translation == Vec2::zeros() {
                    TransformMode::Identity
                } else {
                    TransformMode::Translation
                }
            }
            TransformMode::Scale => TransformMode::Scale,
            _ => TransformMode::Other,
        };
        Some(Self {
            matrix,
            translation,
            mode,
        })
    }

    /// The linear block.
    pub fn matrix(&self) -> &Matrix2<f64> {
        &self.matrix
    }

    /// The translation column.
    pub fn translation_part(&self) -> &Vec2 {
        &self.translation
    }

    /// The cached mode tag.
    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    /// Determinant of the linear block.
    pub fn determinant(&self) -> f64 {
        self.matrix[(0, 0)] * self.matrix[(1, 1)] - self.matrix[(0, 1)] * self.matrix[(1, 0)]
    }

    /// Uniform-scale proxy `sqrt(|det|)`.
    pub fn scale_factor(&self) -> f64 {
        self.determinant().abs().sqrt()
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point2) -> Point2 {
        match self.mode {
            TransformMode::Identity => *p,
            TransformMode::Translation => p + self.translation,
            _ => Point2::from(self.matrix * p.coords + self.translation),
        }
    }

    /// Transform a vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec2) -> Vec2 {
        if self.mode.is_pure_translation() {
            *v
        } else {
            self.matrix * v
        }
    }

    /// `self ∘ inner`.
    pub fn compose(&self, inner: &Self) -> Self {
        let matrix = self.matrix * inner.matrix;
        let translation = self.matrix * inner.translation + self.translation;
        let mode = TransformMode::compose(self.mode, inner.mode, || {
            let gram = matrix.transpose() * matrix;
            (gram - Matrix2::identity()).amax() < 1e-12 && matrix.determinant() > 0.0
        });
        Self {
            matrix,
            translation,
            mode,
        }
    }

    /// Closed-form inverse; fails when `|det| < 1e-16`.
    pub fn inverse(&self) -> Result<Self> {
        match self.mode {
            TransformMode::Identity => return Ok(*self),
            TransformMode::Translation => return Ok(Self::translation(-self.translation)),
            _ => {}
        }
        let det = self.determinant();
        if !(det.abs() >= SINGULAR_DET_2D) {
            return Err(MathError::SingularTransform { determinant: det });
        }
        let m = &self.matrix;
        let matrix = Matrix2::new(m[(1, 1)], -m[(0, 1)], -m[(1, 0)], m[(0, 0)]) / det;
        Ok(Self {
            matrix,
            translation: -(matrix * self.translation),
            mode: self.mode,
        })
    }

    /// True if both basis images are perpendicular and `|det| ≈ 1`.
    pub fn is_orthogonal(&self, tol: f64) -> bool {
        self.is_isogonal(tol) && (self.determinant().abs() - 1.0).abs() < tol
    }

    /// True if both basis images are perpendicular.
    pub fn is_isogonal(&self, tol: f64) -> bool {
        let a = self.matrix.column(0);
        let b = self.matrix.column(1);
        let scale = a.norm() * b.norm();
        scale > 0.0 && (a.dot(&b) / scale).abs() < tol
    }

    /// Component-wise comparison.
    pub fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        (self.matrix - other.matrix).amax() < tol
            && (self.translation - other.translation).amax() < tol
    }
}

impl Default for AffineTransform2d {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for AffineTransform2d {
    type Output = AffineTransform2d;

    fn mul(self, rhs: AffineTransform2d) -> AffineTransform2d {
        self.compose(&rhs)
    }
}

impl Mul<Point2> for AffineTransform2d {
    type Output = Point2;

    fn mul(self, rhs: Point2) -> Point2 {
        self.apply_point(&rhs)
    }
}

impl Mul<Vec2> for AffineTransform2d {
    type Output = Vec2;

    fn mul(self, rhs: Vec2) -> Vec2 {
        self.apply_vec(&rhs)
    }
}

impl Mul<f64> for AffineTransform2d {
    type Output = f64;

    fn mul(self, rhs: f64) -> f64 {
        rhs * self.scale_factor()
    }
}
