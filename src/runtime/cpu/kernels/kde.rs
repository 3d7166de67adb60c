//! Gaussian kernel density estimation kernels
//!
//! Every kernel evaluates, for each point of interest `x_t`,
//!
//! ```text
//! f(x_t) = (1/N) * sum_j exp(-|x_t - s_j|^2 / (2 h^2)) / (sqrt(2 pi) h)^d
//! ```
//!
//! and differs only in how the sum over the `N` samples is split up and
//! combined. Points of interest and samples are row-major `(count, d)`.

use super::atomic::AtomicFloat;
use super::{parallel_for, upper_quotient};
use crate::algorithm::kde::gaussian_normalization;
use crate::dtype::Element;
use crate::runtime::cpu::CpuClient;
use num_traits::{Float, NumCast, One, Zero};

/// Lanes in one work group of the work-group strategy
pub const WORK_GROUP_SIZE: usize = 512;

/// Strided samples visited by each lane of a work group
pub const WORK_GROUP_SAMPLES_PER_LANE: usize = 128;

/// Samples (or partial sums) reduced by one unit of the atomic and tree
/// strategies
pub const SAMPLES_PER_BLOCK: usize = 256;

/// `exp(-|y - x|^2 / (2 h^2))`
#[inline]
fn unnormalized_density<T: Float>(y: &[T], x: &[T], h: T) -> T {
    let dist_sq = y
        .iter()
        .zip(x)
        .fold(<T as Zero>::zero(), |acc, (&a, &b)| acc + (a - b) * (a - b));
    let two = <T as One>::one() + <T as One>::one();
    (-(dist_sq / two) / (h * h)).exp()
}

/// Raw views of one KDE problem
///
/// Addresses are stored as `usize` so the struct can be shared with rayon
/// workers.
#[derive(Clone, Copy)]
pub(crate) struct KdeArgs {
    poi: usize,
    sample: usize,
    n_poi: usize,
    n_sample: usize,
    dim: usize,
}

impl KdeArgs {
    /// # Safety
    ///
    /// `poi` and `sample` must point to `n_poi * dim` and `n_sample * dim`
    /// valid elements that stay alive and unmodified while kernels run.
    pub(crate) unsafe fn new<T>(
        poi: *const T,
        sample: *const T,
        n_poi: usize,
        n_sample: usize,
        dim: usize,
    ) -> Self {
        Self {
            poi: poi as usize,
            sample: sample as usize,
            n_poi,
            n_sample,
            dim,
        }
    }

    #[inline]
    unsafe fn poi_row<'a, T>(&self, t: usize) -> &'a [T] {
        std::slice::from_raw_parts((self.poi as *const T).add(t * self.dim), self.dim)
    }

    #[inline]
    unsafe fn sample_row<'a, T>(&self, j: usize) -> &'a [T] {
        std::slice::from_raw_parts((self.sample as *const T).add(j * self.dim), self.dim)
    }

    /// Normalized contribution of sample `j` to point `t`
    #[inline]
    unsafe fn term<T: Float>(&self, t: usize, j: usize, h: T, scale: T) -> T {
        scale * unnormalized_density(self.poi_row(t), self.sample_row(j), h)
    }

    /// Sum of the normalized contributions of one 256-sample block to point `t`
    #[inline]
    unsafe fn block_sum<T: Float>(&self, t: usize, block: usize, h: T, scale: T) -> T {
        let start = block * SAMPLES_PER_BLOCK;
        let end = (start + SAMPLES_PER_BLOCK).min(self.n_sample);
        (start..end).fold(<T as Zero>::zero(), |acc, j| acc + self.term(t, j, h, scale))
    }

    /// `gaussian_normalization / N`, the weight of a single sample
    #[inline]
    fn scale<T: Float>(&self, h: T) -> T {
        let count = <T as NumCast>::from(self.n_sample).unwrap_or_else(<T as One>::one);
        gaussian_normalization(h, self.dim) / count
    }
}

/// Direct strategy: materialize all pairwise squared distances, then reduce
///
/// # Safety
///
/// - `args` must describe live input buffers
/// - `out` must point to `args.n_poi` writable elements
pub(crate) unsafe fn kde_direct_kernel<T: Element + Float>(
    client: &CpuClient,
    args: KdeArgs,
    h: T,
    out: *mut T,
) {
    let (n_poi, n_sample) = (args.n_poi, args.n_sample);

    // (n_poi, n_sample) matrix of squared distances
    let mut dist_sq = vec![<T as Zero>::zero(); n_poi * n_sample];
    let dist_addr = dist_sq.as_mut_ptr() as usize;
    parallel_for(client, n_poi, |t| unsafe {
        let row = std::slice::from_raw_parts_mut((dist_addr as *mut T).add(t * n_sample), n_sample);
        let p = args.poi_row::<T>(t);
        for (j, d) in row.iter_mut().enumerate() {
            *d = p
                .iter()
                .zip(args.sample_row::<T>(j))
                .fold(<T as Zero>::zero(), |acc, (&a, &b)| acc + (a - b) * (a - b));
        }
    });

    let two = <T as One>::one() + <T as One>::one();
    let norm = <T as One>::one() / (two_pi::<T>().sqrt() * h).powi(args.dim as i32);
    let count = <T as NumCast>::from(n_sample).unwrap_or_else(<T as One>::one);
    let out_addr = out as usize;
    let dist = &dist_sq;
    parallel_for(client, n_poi, |t| unsafe {
        let row = &dist[t * n_sample..(t + 1) * n_sample];
        let total = pairwise_sum(row, &|d: T| (d / (-two * h * h)).exp());
        *(out_addr as *mut T).add(t) = total / count * norm;
    });
}

/// Sum of `f(x)` over `values`, halving recursively down to blocks of
/// `SAMPLES_PER_BLOCK` that are summed sequentially
///
/// Rounding error grows with `log2(len / SAMPLES_PER_BLOCK)` instead of `len`.
fn pairwise_sum<T: Float>(values: &[T], f: &impl Fn(T) -> T) -> T {
    if values.len() <= SAMPLES_PER_BLOCK {
        return values.iter().fold(<T as Zero>::zero(), |acc, &v| acc + f(v));
    }
    let (lo, hi) = values.split_at(values.len() / 2);
    pairwise_sum(lo, f) + pairwise_sum(hi, f)
}

#[inline]
fn two_pi<T: Float>() -> T {
    <T as NumCast>::from(std::f64::consts::TAU).unwrap_or_else(<T as Zero>::zero)
}

/// Atomic strategy: each `(point, block)` unit adds its block sum to `out`
///
/// # Safety
///
/// - `args` must describe live input buffers
/// - `out` must point to `args.n_poi` zero-filled elements
pub(crate) unsafe fn kde_atomic_kernel<T: Element + Float + AtomicFloat>(
    client: &CpuClient,
    args: KdeArgs,
    h: T,
    out: *mut T,
) {
    let n_blocks = upper_quotient(args.n_sample, SAMPLES_PER_BLOCK);
    let scale = args.scale(h);
    let out_addr = out as usize;
    parallel_for(client, args.n_poi * n_blocks, |unit| unsafe {
        let (t, block) = (unit / n_blocks, unit % n_blocks);
        let local = args.block_sum(t, block, h, scale);
        T::atomic_add((out_addr as *mut T).add(t), local);
    });
}

/// Work-group strategy: groups of 512 lanes reduce 65536 samples locally,
/// then the group leader adds the group total to `out`
///
/// Lane `l` of group `g` visits samples `g * 512 * 128 + k * 512 + l`.
///
/// # Safety
///
/// - `args` must describe live input buffers
/// - `out` must point to `args.n_poi` zero-filled elements
pub(crate) unsafe fn kde_work_group_kernel<T: Element + Float + AtomicFloat>(
    client: &CpuClient,
    args: KdeArgs,
    h: T,
    out: *mut T,
) {
    let per_group = WORK_GROUP_SIZE * WORK_GROUP_SAMPLES_PER_LANE;
    let n_groups = upper_quotient(args.n_sample, per_group);
    let scale = args.scale(h);
    let out_addr = out as usize;
    parallel_for(client, args.n_poi * n_groups, |unit| unsafe {
        let (t, group) = (unit / n_groups, unit % n_groups);
        let base = group * per_group;

        let mut lanes = [<T as Zero>::zero(); WORK_GROUP_SIZE];
        for (lane, acc) in lanes.iter_mut().enumerate() {
            for k in 0..WORK_GROUP_SAMPLES_PER_LANE {
                let j = base + k * WORK_GROUP_SIZE + lane;
                if j < args.n_sample {
                    *acc = *acc + args.term(t, j, h, scale);
                }
            }
        }

        T::atomic_add((out_addr as *mut T).add(t), reduce_over_group(&mut lanes));
    });
}

/// Pairwise in-place reduction of a power-of-two sized group
fn reduce_over_group<T: Float>(lanes: &mut [T]) -> T {
    let mut width = lanes.len();
    while width > 1 {
        width /= 2;
        for i in 0..width {
            lanes[i] = lanes[i] + lanes[i + width];
        }
    }
    lanes.first().copied().unwrap_or_else(<T as Zero>::zero)
}

/// Tree strategy, first pass: per `(point, block)` partial sums
///
/// Writes `partials[t * n_blocks + b]` where `n_blocks = ceil(N / 256)`.
///
/// # Safety
///
/// - `args` must describe live input buffers
/// - `partials` must point to `args.n_poi * n_blocks` writable elements
pub(crate) unsafe fn kde_tree_partials_kernel<T: Element + Float>(
    client: &CpuClient,
    args: KdeArgs,
    h: T,
    partials: *mut T,
) {
    let n_blocks = upper_quotient(args.n_sample, SAMPLES_PER_BLOCK);
    let scale = args.scale(h);
    let partials_addr = partials as usize;
    parallel_for(client, args.n_poi * n_blocks, |unit| unsafe {
        let (t, block) = (unit / n_blocks, unit % n_blocks);
        *(partials_addr as *mut T).add(unit) = args.block_sum(t, block, h, scale);
    });
}

/// Tree strategy, one level: reduce 256 partial sums per output slot
///
/// Reads `n_points * n_blocks` partials and writes
/// `n_points * ceil(n_blocks / 256)` sums into `scratch`.
///
/// # Safety
///
/// - `partials` must point to `n_points * n_blocks` valid elements
/// - `scratch` must point to `n_points * ceil(n_blocks / 256)` writable
///   elements not overlapping `partials`
pub(crate) unsafe fn kde_tree_reduce_kernel<T: Element + Float>(
    client: &CpuClient,
    partials: *const T,
    scratch: *mut T,
    n_points: usize,
    n_blocks: usize,
) {
    let local_n_blocks = upper_quotient(n_blocks, SAMPLES_PER_BLOCK);
    let partials_addr = partials as usize;
    let scratch_addr = scratch as usize;
    parallel_for(client, n_points * local_n_blocks, |unit| unsafe {
        let (t, block) = (unit / local_n_blocks, unit % local_n_blocks);
        let start = block * SAMPLES_PER_BLOCK;
        let end = (start + SAMPLES_PER_BLOCK).min(n_blocks);
        let row = (partials_addr as *const T).add(t * n_blocks);
        let sum = (start..end).fold(<T as Zero>::zero(), |acc, k| acc + *row.add(k));
        *(scratch_addr as *mut T).add(unit) = sum;
    });
}

/// Tree strategy, final pass: sum the remaining partials of each point
///
/// # Safety
///
/// - `partials` must point to `n_points * n_blocks` valid elements
/// - `out` must point to `n_points` writable elements
pub(crate) unsafe fn kde_tree_final_kernel<T: Element + Float>(
    client: &CpuClient,
    partials: *const T,
    out: *mut T,
    n_points: usize,
    n_blocks: usize,
) {
    let partials_addr = partials as usize;
    let out_addr = out as usize;
    parallel_for(client, n_points, |t| unsafe {
        let first = (partials_addr as *const T).add(t * n_blocks);
        let row = std::slice::from_raw_parts(first, n_blocks);
        *(out_addr as *mut T).add(t) = row.iter().fold(<T as Zero>::zero(), |acc, &v| acc + v);
    });
}
