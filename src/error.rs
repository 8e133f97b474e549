//! Error types for jax-jacfwd.

use crate::{DType, Shape};
use thiserror::Error;

/// Result type alias using this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while computing values and forward-mode Jacobians.
///
/// Every error is raised before the stage that detects it does any real
/// work; nothing is retried or coerced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Primal and tangent containers are not positional sequences, or their
    /// tree structures differ.
    #[error("primal and tangent arguments to jvp: {0}")]
    ArgumentStructure(String),

    /// A tangent leaf does not have the tangent dtype of its primal.
    #[error(
        "primal and tangent arguments to jvp do not match; dtypes must be equal, or in case of \
         int/bool primal dtype the tangent dtype must be float0. Got primal dtype {primal} and so \
         expected tangent dtype {expected}, but got tangent dtype {got} instead."
    )]
    DtypeMismatch {
        /// Dtype of the primal leaf
        primal: DType,
        /// Tangent dtype implied by the primal
        expected: DType,
        /// Dtype of the supplied tangent
        got: DType,
    },

    /// A tangent leaf's shape differs from its primal's.
    #[error("jvp called with different primal and tangent shapes; got primal shape {primal} and tangent shape {tangent}")]
    ShapeMismatch {
        /// Shape of the primal leaf
        primal: Shape,
        /// Shape of the supplied tangent
        tangent: Shape,
    },

    /// A differentiated input has a dtype forward-mode differentiation cannot
    /// probe.
    #[error(
        "jacfwd requires real- or complex-valued inputs (input dtype that is a sub-dtype of \
         inexact), but got {dtype}. If you want to use integer-valued inputs, use vmap or set \
         holomorphic=true."
    )]
    InputDtype {
        /// Offending input dtype
        dtype: DType,
    },

    /// A primary output has a dtype incompatible with a non-holomorphic
    /// Jacobian.
    #[error(
        "jacfwd requires real-valued outputs (output dtype that is a sub-dtype of floating), \
         but got {dtype}. For holomorphic differentiation, pass holomorphic=true."
    )]
    OutputDtype {
        /// Offending output dtype
        dtype: DType,
    },

    /// The function can no longer be invoked.
    #[error("expected a callable value, got {0}")]
    NotCallable(String),

    /// Argument selection does not fit the call.
    #[error("invalid argnums {argnums:?} for a call with {nargs} positional arguments")]
    InvalidArgnums {
        /// Requested argument indices
        argnums: Vec<usize>,
        /// Number of positional arguments supplied
        nargs: usize,
    },

    /// A `has_aux` function did not return a `(value, aux)` pair.
    #[error("has_aux=true requires the function to return a (value, aux) pair, got {0}")]
    AuxOutput(String),

    /// Leaves or sizes do not fit a tree structure.
    #[error("cannot reassemble: {0}")]
    Reshape(String),

    /// Per-direction results could not be stacked.
    #[error("batching failed: {0}")]
    Batching(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_mismatch_message() {
        let err = Error::DtypeMismatch {
            primal: DType::Int32,
            expected: DType::Float0,
            got: DType::Float32,
        };
        let msg = err.to_string();
        assert!(msg.contains("Got primal dtype int32"));
        assert!(msg.contains("expected tangent dtype float0"));
        assert!(msg.contains("got tangent dtype float32"));
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = Error::ShapeMismatch { primal: Shape::new(vec![3]), tangent: Shape::new(vec![2]) };
        assert!(err.to_string().contains("primal shape (3,)"));
    }
}
