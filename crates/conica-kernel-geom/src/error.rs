//! Error types for surface construction and persistence.

use conica_kernel_math::MathError;
use thiserror::Error;

/// Errors raised by surface construction, modification, and persistence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeomError {
    /// A transform inversion or fit failed.
    #[error(transparent)]
    Math(#[from] MathError),

    /// The surface still carries an imported v-origin offset that has not
    /// been normalized.
    #[error("surface has a pending legacy v-offset of {0}; normalize it before use")]
    PendingVOffset(f64),

    /// A persisted record could not be turned back into a surface.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeomError>;
