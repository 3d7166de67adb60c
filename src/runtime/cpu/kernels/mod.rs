//! CPU kernel implementations
//!
//! Low-level compute kernels for the CPU runtime. Kernels are generic over
//! `T: Element + Float` and work on raw pointers into device buffers; the
//! launchers in `cpu::linalg` and `cpu::kde` own the buffers and decide how
//! kernels are split into submitted tasks.

#![allow(unsafe_op_in_unsafe_fn)] // Kernels are already marked unsafe, inner unsafe is redundant

pub mod atomic;
pub mod kde;
pub mod qr;

pub use atomic::AtomicFloat;
pub use kde::{SAMPLES_PER_BLOCK, WORK_GROUP_SAMPLES_PER_LANE, WORK_GROUP_SIZE};
pub(crate) use kde::{
    KdeArgs, kde_atomic_kernel, kde_direct_kernel, kde_tree_final_kernel,
    kde_tree_partials_kernel, kde_tree_reduce_kernel, kde_work_group_kernel,
};
pub use qr::{extract_r_kernel, geqrf_kernel, orgqr_kernel, seed_q_kernel};

use super::client::CpuClient;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Run `f(i)` for every `i in 0..count`
///
/// Iterations run on the client's pool when the `rayon` feature is enabled,
/// sequentially otherwise. `f` must tolerate any execution order.
pub(crate) fn parallel_for(client: &CpuClient, count: usize, f: impl Fn(usize) + Send + Sync) {
    #[cfg(feature = "rayon")]
    {
        let min_len = client.rayon_min_len();
        client.install_parallelism(|| {
            (0..count).into_par_iter().with_min_len(min_len).for_each(f);
        });
    }

    #[cfg(not(feature = "rayon"))]
    {
        let _ = client;
        (0..count).for_each(f);
    }
}

/// Ceiling division
#[inline]
pub(crate) fn upper_quotient(n: usize, d: usize) -> usize {
    n.div_ceil(d)
}
