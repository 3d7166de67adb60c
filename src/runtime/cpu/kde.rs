//! CPU implementation of kernel density estimation
//!
//! Each strategy is submitted as a short chain of tasks after the caller's
//! dependencies and the inputs' pending writers. The output buffer carries
//! the chain's final event.

use super::kernels::{
    AtomicFloat, KdeArgs, SAMPLES_PER_BLOCK, kde_atomic_kernel, kde_direct_kernel,
    kde_tree_final_kernel, kde_tree_partials_kernel, kde_tree_reduce_kernel,
    kde_work_group_kernel, upper_quotient,
};
use super::{CpuClient, CpuRuntime};
use crate::algorithm::kde::{KdeStrategy, KernelDensityAlgorithms, validate_native_kde_args};
use crate::dispatch_float_dtype;
use crate::dtype::Element;
use crate::error::Result;
use crate::runtime::{Event, RuntimeClient};
use crate::tensor::{Storage, Tensor};
use num_traits::{Float, Zero};

impl KernelDensityAlgorithms<CpuRuntime> for CpuClient {
    fn kde_native(
        &self,
        poi: &Tensor<CpuRuntime>,
        sample: &Tensor<CpuRuntime>,
        pdf: &Tensor<CpuRuntime>,
        h: f64,
        strategy: KdeStrategy,
        depends: &[Event],
    ) -> Result<(Event, Event)> {
        let dims = validate_native_kde_args(poi, sample, pdf)?;

        dispatch_float_dtype!(poi.dtype(), T => {
            kde_typed::<T>(self, poi, sample, pdf, dims, h, strategy, depends)
        }, "kde")
    }
}

/// Buffers shared by the tasks of one KDE launch
#[derive(Clone)]
struct KdeBuffers {
    poi: Storage<CpuRuntime>,
    sample: Storage<CpuRuntime>,
    pdf: Storage<CpuRuntime>,
    poi_offset: usize,
    sample_offset: usize,
    pdf_offset: usize,
    n_poi: usize,
    n_sample: usize,
    dim: usize,
}

impl KdeBuffers {
    /// # Safety
    ///
    /// The inputs must stay alive and unwritten while the returned args are
    /// in use; holding `self` keeps them alive.
    unsafe fn args<T>(&self) -> KdeArgs {
        unsafe {
            KdeArgs::new(
                (self.poi.ptr() as *const T).add(self.poi_offset),
                (self.sample.ptr() as *const T).add(self.sample_offset),
                self.n_poi,
                self.n_sample,
                self.dim,
            )
        }
    }

    fn out<T>(&self) -> *mut T {
        (self.pdf.ptr() as *mut T).wrapping_add(self.pdf_offset)
    }
}

#[allow(clippy::too_many_arguments)]
fn kde_typed<T: Element + Float + AtomicFloat>(
    client: &CpuClient,
    poi: &Tensor<CpuRuntime>,
    sample: &Tensor<CpuRuntime>,
    pdf: &Tensor<CpuRuntime>,
    (n_poi, n_sample, dim): (usize, usize, usize),
    h: f64,
    strategy: KdeStrategy,
    depends: &[Event],
) -> Result<(Event, Event)> {
    let mut deps = depends.to_vec();
    for t in [poi, sample, pdf] {
        deps.extend(t.pending());
    }

    let h = <T as Element>::from_f64(h);
    let bufs = KdeBuffers {
        poi: poi.storage().clone(),
        sample: sample.storage().clone(),
        pdf: pdf.storage().clone(),
        poi_offset: poi.layout().offset(),
        sample_offset: sample.layout().offset(),
        pdf_offset: pdf.layout().offset(),
        n_poi,
        n_sample,
        dim,
    };
    log::debug!("kde_native: {n_poi}x{n_sample} d={dim} via {strategy}");

    // Nothing to evaluate: the output is left untouched.
    if n_poi == 0 || n_sample == 0 {
        let compute = client.submit("kde_empty", &deps, || Ok(()));
        pdf.storage().set_pending(compute.clone());
        return Ok((compute.clone(), compute));
    }

    let compute = match strategy {
        KdeStrategy::Direct => {
            let (bufs, worker) = (bufs.clone(), client.clone());
            client.submit("kde_direct", &deps, move || {
                // SAFETY: validated row-major buffers, kept alive by `bufs`.
                unsafe { kde_direct_kernel::<T>(&worker, bufs.args::<T>(), h, bufs.out::<T>()) };
                Ok(())
            })
        }
        KdeStrategy::Atomic => {
            let filled = submit_zero_fill::<T>(client, &bufs, &deps);
            let (bufs, worker) = (bufs.clone(), client.clone());
            client.submit("kde_atomic", &[filled], move || {
                // SAFETY: as above; `out` was zero-filled by the predecessor.
                unsafe { kde_atomic_kernel::<T>(&worker, bufs.args::<T>(), h, bufs.out::<T>()) };
                Ok(())
            })
        }
        KdeStrategy::WorkGroup => {
            let filled = submit_zero_fill::<T>(client, &bufs, &deps);
            let (bufs, worker) = (bufs.clone(), client.clone());
            client.submit("kde_work_group", &[filled], move || {
                // SAFETY: as above; `out` was zero-filled by the predecessor.
                unsafe {
                    kde_work_group_kernel::<T>(&worker, bufs.args::<T>(), h, bufs.out::<T>())
                };
                Ok(())
            })
        }
        KdeStrategy::Tree => submit_tree::<T>(client, &bufs, h, &deps)?,
    };

    let held = bufs;
    let host = client.submit("kde_keep_alive", std::slice::from_ref(&compute), move || {
        drop(held);
        Ok(())
    });

    pdf.storage().set_pending(compute.clone());
    Ok((host, compute))
}

fn submit_zero_fill<T: Element + Float>(
    client: &CpuClient,
    bufs: &KdeBuffers,
    deps: &[Event],
) -> Event {
    let bufs = bufs.clone();
    client.submit("kde_fill", deps, move || {
        // SAFETY: `pdf` holds n_poi elements past its offset.
        let out = unsafe { std::slice::from_raw_parts_mut(bufs.out::<T>(), bufs.n_poi) };
        out.fill(<T as Zero>::zero());
        Ok(())
    })
}

/// Submit the partial-sum pass, as many 256-wide reduction levels as needed,
/// and the final per-point pass
///
/// Levels ping-pong between two regions of one temporary buffer: `n_poi *
/// n_blocks` partials followed by `n_poi * ceil(n_blocks / 256)` sums.
fn submit_tree<T: Element + Float>(
    client: &CpuClient,
    bufs: &KdeBuffers,
    h: T,
    deps: &[Event],
) -> Result<Event> {
    let n_poi = bufs.n_poi;
    let mut n_blocks = upper_quotient(bufs.n_sample, SAMPLES_PER_BLOCK);
    let first_region = n_poi * n_blocks;
    let second_region = n_poi * upper_quotient(n_blocks, SAMPLES_PER_BLOCK);
    let temp =
        Storage::<CpuRuntime>::new(first_region + second_region, T::DTYPE, bufs.pdf.device())?;

    let mut event = {
        let (bufs, temp, worker) = (bufs.clone(), temp.clone(), client.clone());
        client.submit("kde_tree_partials", deps, move || {
            // SAFETY: `temp` holds n_poi * n_blocks elements in its first region.
            unsafe {
                kde_tree_partials_kernel::<T>(&worker, bufs.args::<T>(), h, temp.ptr() as *mut T)
            };
            Ok(())
        })
    };

    let (mut src, mut dst) = (0, first_region);
    let mut levels = 0;
    while n_blocks > SAMPLES_PER_BLOCK {
        let (temp, worker) = (temp.clone(), client.clone());
        let blocks = n_blocks;
        event = client.submit("kde_tree_reduce", &[event], move || {
            let base = temp.ptr() as *mut T;
            // SAFETY: each level's output fits the region it writes, and the
            // two regions never overlap.
            unsafe {
                kde_tree_reduce_kernel::<T>(&worker, base.add(src), base.add(dst), n_poi, blocks)
            };
            Ok(())
        });
        n_blocks = upper_quotient(n_blocks, SAMPLES_PER_BLOCK);
        std::mem::swap(&mut src, &mut dst);
        levels += 1;
    }
    log::trace!("kde tree: {levels} reduction level(s), {n_blocks} final block(s)");

    let (bufs, worker) = (bufs.clone(), client.clone());
    Ok(client.submit("kde_tree_final", &[event], move || {
        // SAFETY: `src` holds n_poi * n_blocks sums; `out` holds n_poi elements.
        unsafe {
            let partials = (temp.ptr() as *const T).add(src);
            kde_tree_final_kernel::<T>(&worker, partials, bufs.out::<T>(), n_poi, n_blocks)
        };
        Ok(())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::kde::reference_density;
    use crate::runtime::cpu::CpuDevice;

    fn grid(rows: usize, dim: usize, step: f64) -> Vec<f64> {
        (0..rows * dim).map(|i| ((i * 31) % 97) as f64 * step - 1.0).collect()
    }

    #[test]
    fn test_native_strategies_match_reference() {
        let device = CpuDevice::new();
        let client = CpuClient::new(device.clone());
        let dim = 3;
        let poi_data = grid(7, dim, 0.02);
        let sample_data = grid(900, dim, 0.021);
        let expected = reference_density(&poi_data, &sample_data, dim, 0.3).unwrap();

        let poi = Tensor::<CpuRuntime>::from_slice(&poi_data, &[7, dim], &device);
        let sample = Tensor::<CpuRuntime>::from_slice(&sample_data, &[900, dim], &device);
        for strategy in KdeStrategy::ALL {
            let pdf = Tensor::<CpuRuntime>::from_slice(&[5.0f64; 7], &[7], &device);
            let (host, _) = client
                .kde_native(&poi, &sample, &pdf, 0.3, strategy, &[])
                .unwrap();
            host.wait().unwrap();
            let got = pdf.to_vec::<f64>().unwrap();
            for (g, e) in got.iter().zip(&expected) {
                assert!((g - e).abs() <= 1e-12 * e.abs(), "{strategy}: {g} vs {e}");
            }
        }
    }

    #[test]
    fn test_tree_with_reduction_levels() {
        let device = CpuDevice::new();
        let client = CpuClient::new(device.clone());
        // 70_000 samples need ceil(70000 / 256) = 274 blocks, so one extra level.
        let n_sample = 70_000;
        let sample_data: Vec<f32> = (0..n_sample)
            .map(|i| ((i % 1000) as f32) / 500.0 - 1.0)
            .collect();
        let poi_data = [0.0f32, 0.5];
        let expected = reference_density(
            &poi_data.map(f64::from),
            &sample_data.iter().map(|&v| f64::from(v)).collect::<Vec<_>>(),
            1,
            0.2,
        )
        .unwrap();

        let poi = Tensor::<CpuRuntime>::from_slice(&poi_data, &[2, 1], &device);
        let sample = Tensor::<CpuRuntime>::from_slice(&sample_data, &[n_sample, 1], &device);
        let pdf = Tensor::<CpuRuntime>::zeros(&[2], crate::dtype::DType::F32, &device).unwrap();
        let (host, _) = client
            .kde_native(&poi, &sample, &pdf, 0.2, KdeStrategy::Tree, &[])
            .unwrap();
        host.wait().unwrap();
        let got = pdf.to_vec::<f32>().unwrap();
        for (g, e) in got.iter().zip(&expected) {
            assert!((f64::from(*g) - e).abs() <= 1e-4 * e, "{g} vs {e}");
        }
    }
}
