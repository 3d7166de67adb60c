//! CPU implementation of batched QR
//!
//! This module implements the [`BatchedQrAlgorithms`] trait for CPU. The
//! batch is dealt round-robin over a few linear chains of per-matrix tasks;
//! chains run concurrently and each owns one reflector-coefficient scratch
//! buffer that its tasks reuse in turn.

use super::kernels::{extract_r_kernel, geqrf_kernel, orgqr_kernel, seed_q_kernel};
use super::{CpuClient, CpuRuntime};
use crate::algorithm::linalg::{BatchedQrAlgorithms, linear_streams, validate_native_qr_args};
use crate::dispatch_float_dtype;
use crate::dtype::Element;
use crate::error::Result;
use crate::runtime::{Event, RuntimeClient};
use crate::tensor::Tensor;
use num_traits::{Float, Zero};
use parking_lot::Mutex;
use std::sync::Arc;

impl BatchedQrAlgorithms<CpuRuntime> for CpuClient {
    fn qr_batched_native(
        &self,
        a_f: &Tensor<CpuRuntime>,
        q_f: &Tensor<CpuRuntime>,
        r_f: &Tensor<CpuRuntime>,
        depends: &[Event],
    ) -> Result<(Event, Event)> {
        let (m, n, batch) = validate_native_qr_args(a_f, q_f, r_f)?;

        dispatch_float_dtype!(a_f.dtype(), T => {
            qr_batched_typed::<T>(self, a_f, q_f, r_f, (m, n, batch), depends)
        }, "qr_batched")
    }
}

fn qr_batched_typed<T: Element + Float>(
    client: &CpuClient,
    a_f: &Tensor<CpuRuntime>,
    q_f: &Tensor<CpuRuntime>,
    r_f: &Tensor<CpuRuntime>,
    (m, n, batch): (usize, usize, usize),
    depends: &[Event],
) -> Result<(Event, Event)> {
    let mut deps = depends.to_vec();
    for t in [a_f, q_f, r_f] {
        deps.extend(t.pending());
    }

    let k = m.min(n);
    let streams = linear_streams(batch);
    log::debug!("qr_batched: {batch} matrices of {m}x{n} over {streams} stream(s)");

    let mut tails = Vec::with_capacity(streams);
    let mut scratch = Vec::with_capacity(streams);
    for stream in 0..streams {
        let tau = Arc::new(Mutex::new(vec![<T as Zero>::zero(); k]));
        let mut prev: Option<Event> = None;

        for i in (stream..batch).step_by(streams) {
            let after = match &prev {
                Some(event) => vec![event.clone()],
                None => deps.clone(),
            };
            let a = a_f.storage().clone();
            let q = q_f.storage().clone();
            let r = r_f.storage().clone();
            let tau = Arc::clone(&tau);

            let event = client.submit("qr_batched_matrix", &after, move || {
                let mut tau = tau.lock();
                // SAFETY: the buffers were validated as column-major (m, n, B)
                // and (m, m, B); matrix i is touched only by this task.
                unsafe {
                    let a_ptr = (a.ptr() as *mut T).add(i * m * n);
                    let q_ptr = (q.ptr() as *mut T).add(i * m * m);
                    let r_ptr = (r.ptr() as *mut T).add(i * m * n);
                    geqrf_kernel(a_ptr, m, n, &mut tau);
                    extract_r_kernel(a_ptr, r_ptr, m, n);
                    seed_q_kernel(a_ptr, q_ptr, m, n);
                    orgqr_kernel(q_ptr, m, k, &tau);
                }
                Ok(())
            });
            prev = Some(event);
        }

        tails.extend(prev);
        scratch.push(tau);
    }

    let compute = client.submit("qr_batched_cleanup", &tails, move || {
        drop(scratch);
        Ok(())
    });

    let held = [a_f, q_f, r_f].map(|t| t.storage().clone());
    let host = client.submit("qr_batched_keep_alive", std::slice::from_ref(&compute), move || {
        drop(held);
        Ok(())
    });

    for t in [a_f, q_f, r_f] {
        t.storage().set_pending(compute.clone());
    }
    Ok((host, compute))
}
