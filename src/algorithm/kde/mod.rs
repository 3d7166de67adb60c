//! Gaussian kernel density estimation contract
//!
//! For points of interest `p_i` and a sample `s_j` (`N` rows) of shared
//! dimensionality `d`, every strategy computes
//!
//! ```text
//! density[i] = (1/N) * sum_j exp(-|p_i - s_j|^2 / (2 h^2)) / (sqrt(2 pi) h)^d
//! ```
//!
//! The strategies differ only in how the sum over the sample is parallelized
//! and combined; see [`KdeStrategy`].

mod helpers;
mod strategy;

pub use helpers::{
    gaussian_normalization, reference_density, validate_kde_inputs, validate_native_kde_args,
};
pub use strategy::KdeStrategy;

use crate::algorithm::relayout::copy_to_contiguous;
use crate::error::{Error, Result};
use crate::runtime::{Blocking, Event, OrderManager, Runtime, RuntimeClient};
use crate::tensor::Tensor;

/// Kernel density estimation
///
/// Backends implement [`kde_native`](Self::kde_native); the caller-facing
/// [`kde`](Self::kde) and [`kde_with_order`](Self::kde_with_order) are
/// provided on top of it.
pub trait KernelDensityAlgorithms<R: Runtime<Client = Self>>: RuntimeClient<R> + Sized {
    /// Evaluate the density at every point of interest into `pdf`
    ///
    /// # Arguments
    ///
    /// * `poi` - Row-major `(n_poi, d)` points of interest
    /// * `sample` - Row-major `(n_sample, d)` sample
    /// * `pdf` - Row-major `(n_poi,)` output of the same dtype
    /// * `h` - Bandwidth, already validated positive
    /// * `strategy` - Evaluation strategy
    /// * `depends` - Events that must complete before any buffer is touched
    ///
    /// # Returns
    ///
    /// `(host_event, compute_event)`, as for the batched QR routine.
    fn kde_native(
        &self,
        poi: &Tensor<R>,
        sample: &Tensor<R>,
        pdf: &Tensor<R>,
        h: f64,
        strategy: KdeStrategy,
        depends: &[Event],
    ) -> Result<(Event, Event)>;

    /// Kernel density estimate at each point of interest, blocking until the
    /// result is ready
    ///
    /// # Errors
    ///
    /// In order of checking:
    /// - `InvalidType` if either tensor is not `F32`/`F64`
    /// - `InvalidShape` if either tensor is not 2-D
    /// - `InvalidBandwidth` if `h` is not strictly positive
    /// - `DimensionMismatch` if the column counts differ
    /// - `DTypeMismatch` / `DeviceMismatch` if the tensors disagree
    /// - `InvalidShape` if the sample has no rows or the points no columns
    fn kde(
        &self,
        poi: &Tensor<R>,
        sample: &Tensor<R>,
        h: f64,
        strategy: KdeStrategy,
    ) -> Result<Tensor<R>> {
        self.kde_with_order(poi, sample, h, strategy, &Blocking)
    }

    /// Kernel density estimate synchronized by `order`
    ///
    /// Returns a `(n_poi,)` tensor of `poi`'s dtype. Non row-major inputs are
    /// copied into row-major buffers first.
    fn kde_with_order<O: OrderManager + ?Sized>(
        &self,
        poi: &Tensor<R>,
        sample: &Tensor<R>,
        h: f64,
        strategy: KdeStrategy,
        order: &O,
    ) -> Result<Tensor<R>> {
        let (n_poi, n_sample, dim) = validate_kde_inputs(poi, sample, h)?;
        if n_sample == 0 {
            return Err(Error::invalid_shape("sample", "at least one sample row", sample.shape()));
        }
        if dim == 0 {
            return Err(Error::invalid_shape("poi", "at least one column", poi.shape()));
        }

        let pdf = Tensor::zeros(&[n_poi], poi.dtype(), poi.device())?;
        if n_poi == 0 {
            return Ok(pdf);
        }
        log::debug!(
            "kde: {n_poi} points, {n_sample} samples, d={dim}, h={h}, strategy={strategy}"
        );

        let depends = order.depends_on();
        let poi = row_major(self, poi, &depends)?;
        let sample = row_major(self, sample, &depends)?;

        let (host, compute) = self.kde_native(&poi, &sample, &pdf, h, strategy, &depends)?;
        order.submit(host, compute)?;
        Ok(pdf)
    }
}

fn row_major<R: Runtime>(
    client: &R::Client,
    t: &Tensor<R>,
    depends: &[Event],
) -> Result<Tensor<R>> {
    if t.is_contiguous() {
        Ok(t.clone())
    } else {
        copy_to_contiguous(client, t, depends)
    }
}
