//! Error types for transform construction and inversion.

use thiserror::Error;

/// Errors raised by transform inversion and correspondence fitting.
///
/// These are hard failures: every downstream computation assumes the
/// transform it was handed is invertible.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    /// Inversion requested on a matrix whose determinant is (nearly) zero.
    #[error("transform is singular (determinant {determinant:e})")]
    SingularTransform {
        /// The offending determinant.
        determinant: f64,
    },

    /// Source and destination slices have different lengths.
    #[error("fit needs matching correspondences, got {sources} sources and {targets} targets")]
    FitCountMismatch {
        /// Number of source entries.
        sources: usize,
        /// Number of destination entries.
        targets: usize,
    },

    /// No correspondences were supplied.
    #[error("fit needs at least one correspondence")]
    EmptyFit,

    /// The linear system behind a fit is singular or produced NaN/inf.
    #[error("fit system is singular or produced non-finite coefficients")]
    SingularFit,
}

/// Result type for math operations.
pub type Result<T> = std::result::Result<T, MathError>;
