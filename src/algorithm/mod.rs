//! Algorithm contracts for runtime backends
//!
//! Every algorithm is defined as a trait first, then implemented per backend.
//! A contract has one required native entry point working on buffers in the
//! backend's preferred layout, and provided caller-facing methods that
//! validate arguments, convert layouts and synchronize through an
//! [`OrderManager`](crate::runtime::OrderManager).
//!
//! # Available Algorithm Contracts
//!
//! - [`BatchedQrAlgorithms`] - Householder QR of stacks of matrices
//! - [`KernelDensityAlgorithms`] - Gaussian KDE with selectable strategies
//!
//! Layout conversion shared by the contracts lives in [`relayout`].

pub mod kde;
pub mod linalg;
pub mod relayout;

pub use kde::{KdeStrategy, KernelDensityAlgorithms};
pub use linalg::{BatchedQrAlgorithms, QrDecomposition};
