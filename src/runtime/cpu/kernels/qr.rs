//! Householder QR kernels on one column-major matrix
//!
//! All matrices use column-major storage with leading dimension `m`:
//! element `(i, j)` lives at `i + j * m`.
//!
//! The factorization is split the way LAPACK splits it:
//! 1. [`geqrf_kernel`] overwrites `A` with `R` on and above the diagonal and the
//!    Householder vectors below it, writing the scalar factors into `tau`.
//! 2. [`extract_r_kernel`] copies the upper trapezoid into `R`.
//! 3. [`seed_q_kernel`] copies the reflectors into `Q`.
//! 4. [`orgqr_kernel`] expands the reflectors into the full orthogonal `Q`.

use crate::dtype::Element;
use num_traits::{Float, One, Zero};

/// Generate an elementary reflector `H = I - tau * v * v^T`
///
/// On entry `alpha` is the leading element and `x` the rest of the vector.
/// On exit `x` holds `v[1..]` (with `v[0] = 1` implied) and the returned pair
/// is `(beta, tau)` where `H * [alpha; x] = [beta; 0]`.
fn householder<T: Element + Float>(alpha: T, x: &mut [T]) -> (T, T) {
    let xnorm = x.iter().fold(<T as Zero>::zero(), |acc, &v| acc.hypot(v));
    if xnorm == <T as Zero>::zero() {
        // H = I
        return (alpha, <T as Zero>::zero());
    }

    let mut beta = alpha.hypot(xnorm);
    if alpha >= <T as Zero>::zero() {
        beta = -beta;
    }
    let tau = (beta - alpha) / beta;
    let scale = <T as One>::one() / (alpha - beta);
    for v in x.iter_mut() {
        *v = *v * scale;
    }
    (beta, tau)
}

/// Apply `H = I - tau * v * v^T` from the left to the columns `cols` of the
/// row range `row0..m`, where `v` is stored in column `vcol` starting at
/// `row0` with an implicit leading one.
#[inline]
fn apply_reflector<T: Element + Float>(
    a: &mut [T],
    m: usize,
    row0: usize,
    vcol: usize,
    tau: T,
    cols: std::ops::Range<usize>,
) {
    if tau == <T as Zero>::zero() {
        return;
    }
    let vbase = vcol * m;
    for j in cols {
        let cbase = j * m;
        // w = v^T * a[row0.., j]
        let mut w = a[cbase + row0];
        for i in (row0 + 1)..m {
            w = w + a[vbase + i] * a[cbase + i];
        }
        let w = w * tau;
        a[cbase + row0] = a[cbase + row0] - w;
        for i in (row0 + 1)..m {
            a[cbase + i] = a[cbase + i] - a[vbase + i] * w;
        }
    }
}

/// Unblocked Householder QR factorization of an `m x n` matrix in place
///
/// # Safety
///
/// - `a` must point to `m * n` valid, exclusively accessible elements
/// - `tau` must hold at least `min(m, n)` elements
pub unsafe fn geqrf_kernel<T: Element + Float>(a: *mut T, m: usize, n: usize, tau: &mut [T]) {
    let a = std::slice::from_raw_parts_mut(a, m * n);
    let k = m.min(n);

    for j in 0..k {
        let diag = j + j * m;
        let (beta, t) = {
            let (head, tail) = a[diag..j * m + m].split_at_mut(1);
            householder(head[0], tail)
        };
        tau[j] = t;

        // Apply H(j) to the trailing columns with the unit leading element in place.
        a[diag] = <T as One>::one();
        apply_reflector(a, m, j, j, t, (j + 1)..n);
        a[diag] = beta;
    }
}

/// Copy the upper trapezoid of a factored `m x n` matrix into `r`
///
/// Entries of `r` below the diagonal are set to exactly zero.
///
/// # Safety
///
/// - `a` must point to `m * n` valid elements
/// - `r` must point to `m * n` valid, exclusively accessible elements
pub unsafe fn extract_r_kernel<T: Element + Float>(a: *const T, r: *mut T, m: usize, n: usize) {
    let a = std::slice::from_raw_parts(a, m * n);
    let r = std::slice::from_raw_parts_mut(r, m * n);
    for j in 0..n {
        for i in 0..m {
            let idx = i + j * m;
            r[idx] = if i <= j { a[idx] } else { <T as Zero>::zero() };
        }
    }
}

/// Copy the reflector columns of a factored `m x n` matrix into the `m x m`
/// matrix `q`, zero-filling the remaining columns
///
/// # Safety
///
/// - `a` must point to `m * n` valid elements
/// - `q` must point to `m * m` valid, exclusively accessible elements
pub unsafe fn seed_q_kernel<T: Element + Float>(a: *const T, q: *mut T, m: usize, n: usize) {
    let a = std::slice::from_raw_parts(a, m * n);
    let q = std::slice::from_raw_parts_mut(q, m * m);
    let copied = m.min(n) * m;
    q[..copied].copy_from_slice(&a[..copied]);
    q[copied..].fill(<T as Zero>::zero());
}

/// Form the `m x m` orthogonal matrix `Q = H(0) H(1) ... H(k-1)` in place
///
/// On entry the first `k` columns of `q` hold the Householder vectors produced
/// by [`geqrf_kernel`].
///
/// # Safety
///
/// - `q` must point to `m * m` valid, exclusively accessible elements
/// - `tau` must hold at least `k` elements, and `k <= m`
pub unsafe fn orgqr_kernel<T: Element + Float>(q: *mut T, m: usize, k: usize, tau: &[T]) {
    let q = std::slice::from_raw_parts_mut(q, m * m);

    // Columns k..m start as columns of the identity.
    for j in k..m {
        let col = &mut q[j * m..(j + 1) * m];
        col.fill(<T as Zero>::zero());
        col[j] = <T as One>::one();
    }

    for i in (0..k).rev() {
        let t = tau[i];
        if i + 1 < m {
            q[i + i * m] = <T as One>::one();
            apply_reflector(q, m, i, i, t, (i + 1)..m);
            for r in (i + 1)..m {
                q[r + i * m] = -t * q[r + i * m];
            }
        }
        q[i + i * m] = <T as One>::one() - t;
        for r in 0..i {
            q[r + i * m] = <T as Zero>::zero();
        }
    }
}
