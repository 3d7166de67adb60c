//! Decomposition result types

use crate::runtime::Runtime;
use crate::tensor::Tensor;

/// QR decomposition result: A = QR, per matrix of a batch
///
/// For an input of shape `(..., m, n)`:
/// - `q` has shape `(..., m, m)` and is orthogonal per slice (Q^T @ Q = I)
/// - `r` has shape `(..., m, n)` and is upper trapezoidal per slice, with
///   entries below the diagonal exactly zero
#[derive(Debug, Clone)]
pub struct QrDecomposition<R: Runtime> {
    /// Orthogonal factor [..., m, m]
    pub q: Tensor<R>,

    /// Upper trapezoidal factor [..., m, n]
    pub r: Tensor<R>,
}

impl<R: Runtime> QrDecomposition<R> {
    /// Split into `(q, r)`
    pub fn into_parts(self) -> (Tensor<R>, Tensor<R>) {
        (self.q, self.r)
    }
}
