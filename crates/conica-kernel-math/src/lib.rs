#![warn(missing_docs)]

//! Math types for the conica geometric kernel.
//!
//! Thin wrappers around nalgebra providing the domain types used by the
//! surface and curve crates: points, vectors, directions, mode-tagged affine
//! transforms in 2D and 3D, correspondence fitting, and tolerance constants.

use nalgebra::{Unit, Vector2, Vector3};
use serde::{Deserialize, Serialize};

mod error;
mod fit;
mod transform2d;
mod transform3d;

pub use error::{MathError, Result};
pub use transform2d::AffineTransform2d;
pub use transform3d::AffineTransform3d;

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D (sketch or parameter) space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// Cached classification of what a transform does to its linear part.
///
/// The tag is a fast-path hint and is always conservative: a transform may be
/// tagged [`TransformMode::Other`] even when its matrix happens to be a pure
/// rotation, but it never claims a more specific mode than the matrix
/// actually performs.
///
/// Apart from `Identity` (no translation) the tag describes only the linear
/// block; any mode may carry a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformMode {
    /// Linear block is the identity and there is no translation.
    Identity,
    /// Linear block is the identity.
    Translation,
    /// Linear block is a proper rotation (orthonormal, determinant +1).
    Rotation,
    /// Linear block is `-I` (central symmetry).
    PointMirror,
    /// Linear block is a half-turn about an axis (`2dd^T - I`).
    AxisMirror,
    /// Linear block is a reflection in a plane (`I - 2nn^T`).
    PlaneMirror,
    /// Linear block is `s * I`.
    Scale,
    /// Linear block is a similarity (uniform scale times an orthogonal matrix).
    Compound,
    /// Anything else: shear, non-uniform scale, or simply unknown.
    Other,
}

impl TransformMode {
    /// Mode of `outer ∘ inner`.
    ///
    /// `is_proper_rotation` is only called when both operands are similarities
    /// and must verify the composed linear block numerically.
    pub(crate) fn compose(
        outer: TransformMode,
        inner: TransformMode,
        is_proper_rotation: impl FnOnce() -> bool,
    ) -> TransformMode {
        use TransformMode::*;
        match (outer, inner) {
            (Identity, m) | (m, Identity) => m,
            (Translation, m) | (m, Translation) => m,
            (Other, _) | (_, Other) => Other,
            (Scale, Scale) => Scale,
            (PointMirror, PointMirror) => Translation,
            (a, b) if a.is_similarity() && b.is_similarity() => {
                if is_proper_rotation() {
                    Rotation
                } else {
                    Compound
                }
            }
            _ => Other,
        }
    }

    /// True if the linear block is known to be a uniform scale times an
    /// orthogonal matrix.
    pub fn is_similarity(self) -> bool {
        !matches!(self, TransformMode::Other)
    }

    /// True if point and vector application can skip the matrix multiply.
    pub fn is_pure_translation(self) -> bool {
        matches!(self, TransformMode::Identity | TransformMode::Translation)
    }
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Linear distance tolerance in model units.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default CAD tolerances (1e-6 linear, 1e-9 rad angular).
    pub const DEFAULT: Self = Self {
        linear: 1e-6,
        angular: 1e-9,
    };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Normalize an angle into `[0, 2π)`.
pub fn normalize_angle(a: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let r = a.rem_euclid(two_pi);
    // rem_euclid can round up to exactly 2π for tiny negative inputs
    if r >= two_pi {
        0.0
    } else {
        r
    }
}

/// Any unit vector perpendicular to `n`.
pub fn any_perpendicular(n: &Vec3) -> Vec3 {
    let arbitrary = if n.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
    arbitrary.cross(n).normalize()
}
