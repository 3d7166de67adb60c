//! CPU runtime implementation
//!
//! The CPU runtime allocates zero-filled, 64-byte aligned heap buffers and
//! runs submitted tasks on a rayon pool (inline when the `rayon` feature is
//! disabled). It is the reference backend for every algorithm contract.

mod client;
mod device;
mod kde;
pub(crate) mod kernels;
mod linalg;
mod runtime;

pub use client::{CpuClient, ParallelismConfig};
pub use device::CpuDevice;
pub use runtime::CpuRuntime;
