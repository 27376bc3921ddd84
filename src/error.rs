//! Error types for normalized matrix operations

use thiserror::Error;

/// Result type for normalized matrix operations
pub type Result<T> = std::result::Result<T, MatrixError>;

/// Which representation an operator was invoked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    Factorized,
    Dense,
    Scalar,
}

impl std::fmt::Display for Representation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Representation::Factorized => write!(f, "factorized"),
            Representation::Dense => write!(f, "dense"),
            Representation::Scalar => write!(f, "scalar"),
        }
    }
}

/// Errors that can occur while dispatching or evaluating matrix operators
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatrixError {
    /// The operand combination has no defined semantics
    #[error("operation `{op}` is not supported for {repr} operands")]
    UnsupportedOperation {
        op: &'static str,
        repr: String,
    },

    /// Prediction requested before the model was fitted
    #[error("You must train the regressor before predicting data!")]
    NotTrained,

    /// Malformed construction arguments or dataset metadata
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Operand shapes are incompatible for the requested operation
    #[error("shape mismatch in `{op}`: {left:?} vs {right:?}")]
    ShapeMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    /// The matrix passed to `invert` has no inverse
    #[error("matrix is singular and cannot be inverted")]
    Singular,
}

impl MatrixError {
    pub(crate) fn unsupported(op: &'static str, reprs: &[Representation]) -> Self {
        let repr = reprs
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(" x ");
        MatrixError::UnsupportedOperation { op, repr }
    }
}
