//! Integration tests for batched QR decomposition
//!
//! Tests verify, in units of the dtype's machine epsilon:
//! - Orthogonality: max |Q^T Q - I| < 12 eps per matrix
//! - Reconstruction: max |Q R - A| < (12 + max |A|) eps per matrix
//! - Exact zeros below the diagonal of R
//! - Shapes for square, tall, wide, batched and empty inputs
//! - Argument errors

mod common;

use common::{
    assert_allclose_f64, create_cpu_client, gram, identity, matmul, random_f64,
    random_normal_f64, to_host_f64,
};
use devkern::algorithm::linalg::BatchedQrAlgorithms;
use devkern::dtype::{DType, Element};
use devkern::error::Error;
use devkern::runtime::cpu::CpuRuntime;
use devkern::runtime::{OrderManager, SequentialOrderManager};
use devkern::tensor::Tensor;

// ============================================================================
// Helper Functions
// ============================================================================

/// Error allowance in multiples of machine epsilon
const TOL_MULT: f64 = 12.0;

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

/// Check every matrix of a row-major stack against its factors
///
/// `a`, `q` and `r` hold values of `dtype` widened to f64.
fn check_factorization(
    dtype: DType,
    a: &[f64],
    q: &[f64],
    r: &[f64],
    (batch, m, n): (usize, usize, usize),
) {
    let eps = dtype.epsilon().unwrap();
    assert_eq!(q.len(), batch * m * m);
    assert_eq!(r.len(), batch * m * n);
    let a_max = a.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));

    for b in 0..batch {
        let ab = &a[b * m * n..(b + 1) * m * n];
        let qb = &q[b * m * m..(b + 1) * m * m];
        let rb = &r[b * m * n..(b + 1) * m * n];

        let orth = max_abs_diff(&gram(qb, m, m), &identity(m));
        assert!(orth < TOL_MULT * eps, "{dtype} matrix {b}: |Q^T Q - I| = {orth:e}");
        let recon = max_abs_diff(&matmul(qb, rb, m, m, n), ab);
        assert!(
            recon < (TOL_MULT + a_max) * eps,
            "{dtype} matrix {b}: |Q R - A| = {recon:e}"
        );
        for i in 0..m {
            for j in 0..n.min(i) {
                assert_eq!(rb[i * n + j], 0.0, "{dtype} matrix {b}: R[{i}, {j}] not zero");
            }
        }
    }
}

/// Factor `data` as a `T` tensor of `shape` and check the factors
fn check_qr_of<T: Element>(data: &[f64], shape: &[usize]) {
    let (client, device) = create_cpu_client();
    let values: Vec<T> = data.iter().map(|&v| T::from_f64(v)).collect();
    let a = Tensor::<CpuRuntime>::from_slice(&values, shape, &device);

    let qr = client.qr(&a).unwrap();
    let ndim = shape.len();
    let (m, n) = (shape[ndim - 2], shape[ndim - 1]);
    let batch_shape = &shape[..ndim - 2];

    let mut q_shape = batch_shape.to_vec();
    q_shape.extend([m, m]);
    assert_eq!(qr.q.shape(), q_shape.as_slice());
    assert_eq!(qr.r.shape(), shape);
    assert_eq!(qr.q.dtype(), T::DTYPE);
    assert_eq!(qr.r.dtype(), T::DTYPE);

    let widened: Vec<f64> = values.iter().map(|v| v.to_f64()).collect();
    let batch = batch_shape.iter().product();
    check_factorization(
        T::DTYPE,
        &widened,
        &to_host_f64::<T>(&qr.q),
        &to_host_f64::<T>(&qr.r),
        (batch, m, n),
    );
}

fn run_qr(shape: &[usize], seed: u64) {
    let numel: usize = shape.iter().product();
    check_qr_of::<f64>(&random_f64(numel, seed), shape);
}

/// Normally distributed input, factored in both float dtypes
fn run_qr_normal(shape: &[usize], seed: u64) {
    let numel: usize = shape.iter().product();
    let data = random_normal_f64(numel, seed);
    check_qr_of::<f32>(&data, shape);
    check_qr_of::<f64>(&data, shape);
}

fn assert_exact_identity<T: Element>(n: usize) {
    let (client, device) = create_cpu_client();
    let eye: Vec<T> = identity(n).iter().map(|&v| T::from_f64(v)).collect();
    let a = Tensor::<CpuRuntime>::from_slice(&eye, &[n, n], &device);
    let (q, r) = client.qr(&a).unwrap().into_parts();

    // -0.0 compares equal to 0.0.
    assert_eq!(to_host_f64::<T>(&q), identity(n), "{} Q", T::DTYPE);
    assert_eq!(to_host_f64::<T>(&r), identity(n), "{} R", T::DTYPE);
}

// ============================================================================
// Shapes
// ============================================================================

#[test]
fn test_qr_square() {
    run_qr(&[4, 4], 1);
}

#[test]
fn test_qr_tall() {
    run_qr(&[7, 3], 2);
}

#[test]
fn test_qr_wide() {
    run_qr(&[3, 6], 3);
}

#[test]
fn test_qr_single_element() {
    run_qr(&[1, 1], 4);
}

#[test]
fn test_qr_batched_one_stream() {
    run_qr(&[3, 5, 4], 5);
}

#[test]
fn test_qr_batched_two_streams() {
    run_qr(&[9, 4, 4], 6);
}

#[test]
fn test_qr_batched_four_streams() {
    run_qr(&[40, 6, 3], 7);
}

#[test]
fn test_qr_two_batch_dims() {
    // Batch index order must follow the leading dimensions.
    run_qr(&[2, 3, 5, 2], 8);
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn test_qr_batched_square_normal() {
    run_qr_normal(&[10, 4, 4], 21);
}

#[test]
fn test_qr_batched_tall_normal() {
    run_qr_normal(&[10, 8, 4], 22);
}

#[test]
fn test_qr_batched_short_normal() {
    run_qr_normal(&[10, 3, 4], 23);
}

#[test]
fn test_qr_identity_is_exact() {
    assert_exact_identity::<f32>(4);
    assert_exact_identity::<f64>(4);
}

#[test]
fn test_qr_zero_column() {
    // Second column is zero; rank deficiency is not an error.
    check_qr_of::<f64>(&[1.0, 0.0, 2.0, 0.0, 3.0, 0.0], &[3, 2]);
}

#[test]
fn test_qr_strided_input() {
    let (client, device) = create_cpu_client();
    let data = random_f64(12, 12);
    // Transposed view of a (3, 4) buffer: a non-contiguous (4, 3) input.
    let base = Tensor::<CpuRuntime>::from_slice(&data, &[3, 4], &device);
    let a = base.t().unwrap();
    let dense = a.to_vec::<f64>().unwrap();

    let qr = client.qr(&a).unwrap();
    check_factorization(
        DType::F64,
        &dense,
        &qr.q.to_vec::<f64>().unwrap(),
        &qr.r.to_vec::<f64>().unwrap(),
        (1, 4, 3),
    );
}

#[test]
fn test_qr_input_is_not_modified() {
    let (client, device) = create_cpu_client();
    let data = random_f64(16, 13);
    let a = Tensor::<CpuRuntime>::from_slice(&data, &[4, 4], &device);
    let _ = client.qr(&a).unwrap();
    assert_eq!(a.to_vec::<f64>().unwrap(), data);
}

#[test]
fn test_qr_of_r_is_r_up_to_signs() {
    let (client, device) = create_cpu_client();
    let a = Tensor::<CpuRuntime>::from_slice(&random_f64(20, 14), &[5, 4], &device);
    let r = client.qr(&a).unwrap().r;
    let r_data = r.to_vec::<f64>().unwrap();

    let r2 = client.qr(&r).unwrap().r.to_vec::<f64>().unwrap();
    let abs = |v: &[f64]| v.iter().map(|x| x.abs()).collect::<Vec<_>>();
    assert_allclose_f64(&abs(&r2), &abs(&r_data), 1e-12, 1e-12, "|R(R)| vs |R|");
}

// ============================================================================
// Empty inputs
// ============================================================================

#[test]
fn test_qr_empty_rows() {
    let (client, device) = create_cpu_client();
    let a = Tensor::<CpuRuntime>::zeros(&[0, 3], DType::F64, &device).unwrap();
    let qr = client.qr(&a).unwrap();
    assert_eq!(qr.q.shape(), &[0, 0]);
    assert_eq!(qr.r.shape(), &[0, 3]);
}

#[test]
fn test_qr_empty_columns_gives_zero_q() {
    let (client, device) = create_cpu_client();
    let a = Tensor::<CpuRuntime>::zeros(&[2, 3, 0], DType::F32, &device).unwrap();
    let qr = client.qr(&a).unwrap();
    assert_eq!(qr.q.shape(), &[2, 3, 3]);
    assert_eq!(qr.r.shape(), &[2, 3, 0]);
    assert!(qr.q.to_vec::<f32>().unwrap().iter().all(|&v| v == 0.0));
}

#[test]
fn test_qr_empty_batch() {
    let (client, device) = create_cpu_client();
    let a = Tensor::<CpuRuntime>::zeros(&[0, 2, 2], DType::F64, &device).unwrap();
    let qr = client.qr(&a).unwrap();
    assert_eq!(qr.q.shape(), &[0, 2, 2]);
    assert_eq!(qr.r.shape(), &[0, 2, 2]);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_qr_rejects_vector() {
    let (client, device) = create_cpu_client();
    let a = Tensor::<CpuRuntime>::from_slice(&[1.0f64, 2.0, 3.0], &[3], &device);
    assert!(matches!(client.qr(&a), Err(Error::InvalidShape { .. })));
}

#[test]
fn test_qr_rejects_integers() {
    let (client, device) = create_cpu_client();
    let a = Tensor::<CpuRuntime>::from_slice(&[1i32, 2, 3, 4], &[2, 2], &device);
    assert!(matches!(client.qr(&a), Err(Error::InvalidType { .. })));
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_qr_sequential_order() {
    let (client, device) = create_cpu_client();
    let order = SequentialOrderManager::new();
    let data = random_f64(6 * 4 * 3, 15);
    let a = Tensor::<CpuRuntime>::from_slice(&data, &[6, 4, 3], &device);

    let first = client.qr_with_order(&a, &order).unwrap();
    // The second call consumes the first call's R while it may be in flight.
    let second = client.qr_with_order(&first.r, &order).unwrap();
    order.wait().unwrap();

    check_factorization(
        DType::F64,
        &data,
        &first.q.to_vec::<f64>().unwrap(),
        &first.r.to_vec::<f64>().unwrap(),
        (6, 4, 3),
    );
    let r = first.r.to_vec::<f64>().unwrap();
    check_factorization(
        DType::F64,
        &r,
        &second.q.to_vec::<f64>().unwrap(),
        &second.r.to_vec::<f64>().unwrap(),
        (6, 4, 3),
    );
}

#[test]
fn test_qr_repeated_calls_are_bit_identical() {
    let (client, device) = create_cpu_client();
    let data = random_f64(10 * 5 * 4, 16);
    let a = Tensor::<CpuRuntime>::from_slice(&data, &[10, 5, 4], &device);

    let first = client.qr(&a).unwrap();
    let second = client.qr(&a).unwrap();
    assert_eq!(first.q.to_vec::<f64>().unwrap(), second.q.to_vec::<f64>().unwrap());
    assert_eq!(first.r.to_vec::<f64>().unwrap(), second.r.to_vec::<f64>().unwrap());
    assert_eq!(a.to_vec::<f64>().unwrap(), data);
}
