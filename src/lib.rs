//! # devkern
//!
//! **Batched QR decomposition and Gaussian kernel density estimation over
//! device-resident tensors.**
//!
//! devkern launches its kernels as asynchronous tasks on a compute runtime.
//! Every submission returns an [`Event`](runtime::Event); events chain later
//! work after earlier work, and an [`OrderManager`](runtime::OrderManager)
//! decides whether a call blocks or only records its events.
//!
//! ## Features
//!
//! - **QR**: full `Q` (`m x m`) and `R` (`m x n`) for any stack `(..., m, n)`
//! - **KDE**: Gaussian density at points of interest, four evaluation
//!   strategies with identical results up to rounding
//! - **Layouts**: strided views (transpose, moveaxis) and submitted
//!   relayout copies between batch-leading and column-major batch-last
//!
//! ## Quick Start
//!
//! ```rust
//! use devkern::prelude::*;
//!
//! let device = CpuDevice::new();
//! let client = CpuClient::new(device.clone());
//!
//! let a = Tensor::<CpuRuntime>::from_slice(&[3.0f64, 1.0, 4.0, 2.0], &[2, 2], &device);
//! let qr = client.qr(&a)?;
//! assert_eq!(qr.q.shape(), &[2, 2]);
//!
//! let poi = Tensor::<CpuRuntime>::from_slice(&[0.0f64, 0.5], &[2, 1], &device);
//! let sample = Tensor::<CpuRuntime>::from_slice(&[0.1f64, -0.2, 0.3], &[3, 1], &device);
//! let pdf = client.kde(&poi, &sample, 0.25, KdeStrategy::Tree)?;
//! assert_eq!(pdf.to_vec::<f64>()?.len(), 2);
//! # Ok::<(), devkern::error::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): run submitted tasks and kernels on a rayon pool

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod algorithm;
pub mod dtype;
pub mod error;
pub mod runtime;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::algorithm::{
        BatchedQrAlgorithms, KdeStrategy, KernelDensityAlgorithms, QrDecomposition,
    };
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime, ParallelismConfig};
    pub use crate::runtime::{
        Blocking, Device, Event, OrderManager, Runtime, RuntimeClient, SequentialOrderManager,
    };
    pub use crate::tensor::{Layout, Tensor};
}

/// Default runtime
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
