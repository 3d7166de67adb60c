//! Batched QR algorithm contract

use super::decompositions::QrDecomposition;
use super::helpers::validate_qr_input;
use crate::algorithm::relayout::{from_batch_last_fortran, to_batch_last_fortran};
use crate::error::Result;
use crate::runtime::{Blocking, Event, OrderManager, Runtime, RuntimeClient};
use crate::tensor::Tensor;

/// Batched QR decomposition
///
/// Backends implement [`qr_batched_native`](Self::qr_batched_native); the
/// caller-facing [`qr`](Self::qr) and [`qr_with_order`](Self::qr_with_order)
/// are provided on top of it.
///
/// # Algorithm
///
/// Householder QR without pivoting, per matrix:
///
/// ```text
/// for j in 0..min(m, n):
///     (v_j, tau_j) = reflector annihilating A[j+1.., j]
///     A[j.., j..] = (I - tau_j v_j v_j^T) A[j.., j..]
/// R = upper trapezoid of A
/// Q = H_0 H_1 ... H_{k-1}   (full m x m)
/// ```
///
/// Rank deficiency is not detected; a zero column yields an identity
/// reflector.
pub trait BatchedQrAlgorithms<R: Runtime<Client = Self>>: RuntimeClient<R> + Sized {
    /// Factor every matrix of a column-major batch-last stack
    ///
    /// # Arguments
    ///
    /// * `a_f` - Input stack `(m, n, B)`; overwritten with reflectors
    /// * `q_f` - Output `(m, m, B)`
    /// * `r_f` - Output `(m, n, B)`
    /// * `depends` - Events that must complete before any buffer is touched
    ///
    /// # Returns
    ///
    /// `(host_event, compute_event)`. The compute event completes when `q_f`
    /// and `r_f` hold the factorization; the host event completes after it,
    /// once the call's bookkeeping (scratch and argument lifetimes) is done.
    /// Contents of `a_f` are undefined afterwards.
    fn qr_batched_native(
        &self,
        a_f: &Tensor<R>,
        q_f: &Tensor<R>,
        r_f: &Tensor<R>,
        depends: &[Event],
    ) -> Result<(Event, Event)>;

    /// QR decomposition of a matrix or a stack of matrices, blocking until
    /// the result is ready
    ///
    /// # Arguments
    ///
    /// * `a` - Tensor of shape `(..., m, n)` with dtype `F32` or `F64`
    ///
    /// # Errors
    ///
    /// - `InvalidType` if the dtype is not a real floating type
    /// - `InvalidShape` if `a` has fewer than 2 dimensions
    fn qr(&self, a: &Tensor<R>) -> Result<QrDecomposition<R>> {
        self.qr_with_order(a, &Blocking)
    }

    /// QR decomposition synchronized by `order`
    ///
    /// With [`Blocking`] the call returns completed results. With a
    /// [`SequentialOrderManager`](crate::runtime::SequentialOrderManager) it
    /// returns immediately; the returned tensors carry their pending writers,
    /// so reading them or passing them to another call waits as needed.
    ///
    /// An input with zero elements returns zero-filled `Q` and `R` without
    /// invoking the factorization.
    fn qr_with_order<O: OrderManager + ?Sized>(
        &self,
        a: &Tensor<R>,
        order: &O,
    ) -> Result<QrDecomposition<R>> {
        let (m, n) = validate_qr_input(a)?;
        let ndim = a.ndim();
        let batch_shape = &a.shape()[..ndim - 2];
        let dtype = a.dtype();
        let device = a.device();

        if a.numel() == 0 {
            log::debug!("qr: empty input of shape {:?}, skipping factorization", a.shape());
            let mut q_shape = batch_shape.to_vec();
            q_shape.extend([m, m]);
            return Ok(QrDecomposition {
                q: Tensor::zeros(&q_shape, dtype, device)?,
                r: Tensor::zeros(a.shape(), dtype, device)?,
            });
        }

        let stacked = if ndim == 2 { a.unsqueeze(0)? } else { a.clone() };
        let batch: usize = stacked.shape()[..stacked.ndim() - 2].iter().product();
        log::debug!("qr: {batch} matrices of {m}x{n} ({dtype})");

        let depends = order.depends_on();
        let a_f = to_batch_last_fortran(self, &stacked, &depends)?;
        let q_f = Tensor::zeros_fortran(&[m, m, batch], dtype, device)?;
        let r_f = Tensor::zeros_fortran(&[m, n, batch], dtype, device)?;

        let (host, compute) = self.qr_batched_native(&a_f, &q_f, &r_f, &depends)?;
        order.submit(host, compute.clone())?;

        let after = [compute];
        let q = from_batch_last_fortran(self, &q_f, batch_shape, &after)?;
        let r = from_batch_last_fortran(self, &r_f, batch_shape, &after)?;
        Ok(QrDecomposition { q, r })
    }
}
