//! Runtime backends for tensor computation
//!
//! This module defines the `Runtime` trait and the CPU implementation.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity, memory primitives)
//! ├── Device (identifies a specific compute unit)
//! └── Client (submits tasks, tracks their completion events)
//! ```
//!
//! Work is submitted through [`RuntimeClient::submit`], which returns an
//! [`Event`] immediately. Events of earlier submissions can be passed as
//! predecessors of later ones, and an [`OrderManager`] decides how an
//! orchestrated call synchronizes its own submissions.

pub mod cpu;
mod event;
mod order;

pub use cpu::{CpuClient, CpuDevice, CpuRuntime, ParallelismConfig};
pub use event::Event;
pub(crate) use event::{dependency_error, when_all};
pub use order::{Blocking, OrderManager, SequentialOrderManager};

use crate::error::Result;

/// Core trait for compute backends
///
/// `Runtime` abstracts over compute devices. It uses static dispatch via
/// generics for zero-cost abstraction.
///
/// # Associated Types
///
/// - `Device`: Identifies a specific compute unit
/// - `Client`: Handles task submission and synchronization
///
/// # Example
///
/// ```ignore
/// use devkern::runtime::{Runtime, CpuRuntime};
///
/// fn scratch<R: Runtime>(device: &R::Device) -> devkern::error::Result<()> {
///     let ptr = R::allocate(1024, device)?;
///     // ... use memory ...
///     R::deallocate(ptr, 1024, device);
///     Ok(())
/// }
/// ```
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: Device;

    /// Client for submitting work
    type Client: RuntimeClient<Self>;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Allocate zero-filled device memory
    ///
    /// Returns a device pointer (u64). A zero-byte request returns the null
    /// handle `0`.
    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64>;

    /// Deallocate device memory
    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device);

    /// Copy data from host to device
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()>;

    /// Copy data from device to host
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()>;

    /// Copy strided data to a contiguous buffer
    ///
    /// Elements are visited in row-major order of `shape` and written densely
    /// to `dst_handle`.
    ///
    /// # Parameters
    /// - `src_handle`: Source buffer handle
    /// - `src_byte_offset`: Byte offset into source buffer
    /// - `dst_handle`: Destination buffer handle
    /// - `shape`: Shape of the view being copied
    /// - `strides`: Strides of the source view (in elements, not bytes)
    /// - `elem_size`: Size of each element in bytes
    fn copy_strided(
        src_handle: u64,
        src_byte_offset: usize,
        dst_handle: u64,
        shape: &[usize],
        strides: &[isize],
        elem_size: usize,
        device: &Self::Device,
    ) -> Result<()>;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Get the default client for a device
    fn default_client(device: &Self::Device) -> Self::Client;
}

/// Trait for device identification
pub trait Device: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Unique identifier for this device
    fn id(&self) -> usize;

    /// Check if two devices are the same
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Human-readable name
    fn name(&self) -> String {
        format!("Device({})", self.id())
    }
}

/// Trait for runtime clients that handle task submission
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Submit `task` to run once every event in `depends` has completed
    ///
    /// Returns the task's completion event without blocking. If any
    /// predecessor failed, the task is not run and its event completes with
    /// [`Error::DependencyFailed`](crate::error::Error::DependencyFailed).
    fn submit<F>(&self, label: &'static str, depends: &[Event], task: F) -> Event
    where
        F: FnOnce() -> Result<()> + Send + 'static;

    /// Wait for every task submitted through this client to complete
    ///
    /// Returns the first failure among them, if any.
    fn synchronize(&self) -> Result<()>;
}
