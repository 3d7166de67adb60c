//! Helper functions for batched linear algebra
//!
//! Validation utilities shared by the orchestrator and the native launchers.

use crate::error::{Error, Result};
use crate::runtime::{Device, Runtime};
use crate::tensor::Tensor;

/// Validate the argument of a caller-facing `qr`
///
/// Returns `(m, n)`, the trailing matrix dimensions.
///
/// # Errors
///
/// - [`Error::InvalidType`] if the dtype is not `F32`/`F64`
/// - [`Error::InvalidShape`] if the tensor has fewer than 2 dimensions
pub fn validate_qr_input<R: Runtime>(a: &Tensor<R>) -> Result<(usize, usize)> {
    if !a.dtype().is_float() {
        return Err(Error::InvalidType {
            arg: "a",
            expected: "a floating-point tensor (f32 or f64)",
            got: a.dtype(),
        });
    }
    let ndim = a.ndim();
    if ndim < 2 {
        return Err(Error::invalid_shape(
            "a",
            "an array with at least 2 dimensions",
            a.shape(),
        ));
    }
    Ok((a.shape()[ndim - 2], a.shape()[ndim - 1]))
}

/// Validate the buffers of a native batched QR call
///
/// `a_f` is `(m, n, B)`, `q_f` is `(m, m, B)` and `r_f` is `(m, n, B)`, all
/// non-empty, column-major batch-last contiguous, of one float dtype and on
/// one device. Returns `(m, n, B)`.
pub fn validate_native_qr_args<R: Runtime>(
    a_f: &Tensor<R>,
    q_f: &Tensor<R>,
    r_f: &Tensor<R>,
) -> Result<(usize, usize, usize)> {
    for (arg, t) in [("a_f", a_f), ("q_f", q_f), ("r_f", r_f)] {
        if t.ndim() != 3 {
            return Err(Error::invalid_shape(arg, "3 dimensions (rows, cols, batch)", t.shape()));
        }
    }
    let (a, q, r) = (a_f.shape(), q_f.shape(), r_f.shape());

    if a[2] != q[2] || a[2] != r[2] {
        return Err(Error::invalid_argument(
            "q_f",
            format!("batch sizes differ: a_f {}, q_f {}, r_f {}", a[2], q[2], r[2]),
        ));
    }
    if a[0] != q[0] || q[0] != q[1] {
        return Err(Error::shape_mismatch(&[a[0], a[0], a[2]], q));
    }
    if r[0] != q[1] || r[1] != a[1] {
        return Err(Error::shape_mismatch(&[a[0], a[1], a[2]], r));
    }
    if a_f.numel() == 0 {
        return Err(Error::invalid_shape("a_f", "a non-empty batch", a));
    }

    let dtype = a_f.dtype();
    if !dtype.is_float() {
        return Err(Error::UnsupportedDType {
            dtype,
            op: "qr_batched",
        });
    }
    for t in [q_f, r_f] {
        if t.dtype() != dtype {
            return Err(Error::DTypeMismatch {
                lhs: dtype,
                rhs: t.dtype(),
            });
        }
    }

    if !(a_f.is_f_contiguous() && q_f.is_f_contiguous() && r_f.is_f_contiguous()) {
        return Err(Error::NotContiguous {
            op: "qr_batched",
            order: "column-major batch-last",
        });
    }

    if !(a_f.device().is_same(q_f.device()) && a_f.device().is_same(r_f.device())) {
        return Err(Error::DeviceMismatch);
    }

    Ok((a[0], a[1], a[2]))
}

/// Number of concurrently running chains a batch of `batch` matrices is
/// spread over
pub fn linear_streams(batch: usize) -> usize {
    if batch > 16 {
        4
    } else if batch > 4 {
        2
    } else {
        1
    }
}
