//! Error types for devkern

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using devkern's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in devkern operations
///
/// `Error` is `Clone` so that the failure of one submitted task can be
/// delivered to every holder of its completion [`Event`](crate::runtime::Event).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Argument is not a tensor of the element type the operation accepts
    #[error("Invalid type for '{arg}': expected {expected}, got {got:?}")]
    InvalidType {
        /// The argument name
        arg: &'static str,
        /// Description of the accepted types
        expected: &'static str,
        /// The dtype that was passed
        got: DType,
    },

    /// Argument has the wrong number of dimensions
    #[error("Invalid shape for '{arg}': expected {expected}, got shape {got:?}")]
    InvalidShape {
        /// The argument name
        arg: &'static str,
        /// Description of the accepted ranks
        expected: &'static str,
        /// The shape that was passed
        got: Vec<usize>,
    },

    /// KDE smoothing parameter is not strictly positive
    #[error("KDE smoothing scale must be positive, got {value}")]
    InvalidBandwidth {
        /// The rejected bandwidth
        value: f64,
    },

    /// Points of interest and sample disagree on dimensionality
    #[error("Dimensionality of inputs must be the same, but got {poi} and {sample}")]
    DimensionMismatch {
        /// Dimensionality of the points of interest
        poi: usize,
        /// Dimensionality of the sample
        sample: usize,
    },

    /// Shape mismatch in an operation
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Invalid dimension index
    #[error("Invalid dimension {dim} for tensor with {ndim} dimensions")]
    InvalidDimension {
        /// The invalid dimension
        dim: isize,
        /// Number of dimensions
        ndim: usize,
    },

    /// Unsupported dtype for an operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// DType mismatch between operands
    #[error("DType mismatch: {lhs:?} vs {rhs:?}")]
    DTypeMismatch {
        /// Left-hand side dtype
        lhs: DType,
        /// Right-hand side dtype
        rhs: DType,
    },

    /// Device mismatch between operands
    #[error("Device mismatch: tensors must be on the same device")]
    DeviceMismatch,

    /// Out of memory
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Tensor does not have the memory order an operation requires
    #[error("Operation '{op}' requires {order} tensors")]
    NotContiguous {
        /// The operation name
        op: &'static str,
        /// The required order ("row-major" or "column-major batch-last")
        order: &'static str,
    },

    /// A submitted kernel failed while executing
    #[error("Kernel '{op}' failed: {reason}")]
    KernelFailed {
        /// The kernel label
        op: &'static str,
        /// Description of the failure
        reason: String,
    },

    /// A submitted task was skipped because one of its predecessors failed
    #[error("Task '{op}' not run: predecessor failed ({cause})")]
    DependencyFailed {
        /// The skipped task's label
        op: &'static str,
        /// The predecessor's error message
        cause: String,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create an invalid shape error
    pub fn invalid_shape(arg: &'static str, expected: &'static str, got: &[usize]) -> Self {
        Self::InvalidShape {
            arg,
            expected,
            got: got.to_vec(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Create a kernel failure error
    pub fn kernel_failed(op: &'static str, reason: impl Into<String>) -> Self {
        Self::KernelFailed {
            op,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_argument() {
        let err = Error::invalid_shape("x", "at least 2 dimensions", &[5]);
        assert_eq!(
            err.to_string(),
            "Invalid shape for 'x': expected at least 2 dimensions, got shape [5]"
        );

        let err = Error::DimensionMismatch { poi: 3, sample: 2 };
        assert!(err.to_string().contains("3 and 2"));
    }

    #[test]
    fn test_clone_preserves_variant() {
        let err = Error::kernel_failed("qr", "scratch allocation failed");
        assert_eq!(err.clone(), err);
    }
}
