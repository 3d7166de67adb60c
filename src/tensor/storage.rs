//! Storage: device memory management with Arc-based sharing

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::{Event, Runtime};
use parking_lot::Mutex;
use std::sync::Arc;

/// Storage for tensor data on a device
///
/// Storage wraps device memory with reference counting, enabling zero-copy
/// views (transpose, moveaxis, reshape) that share the underlying buffer.
///
/// A buffer written by a submitted kernel carries that kernel's completion
/// [`Event`] until it is observed complete. Host reads wait on it, and
/// submissions that read the buffer list it as a predecessor.
///
/// Memory is automatically deallocated when the last reference is dropped.
pub struct Storage<R: Runtime> {
    inner: Arc<StorageInner<R>>,
}

struct StorageInner<R: Runtime> {
    /// Raw device pointer (CPU ptr cast to u64)
    ptr: u64,
    /// Number of elements (not bytes)
    len: usize,
    dtype: DType,
    device: R::Device,
    /// Completion of the last submitted writer, if it may still be running
    pending: Mutex<Option<Event>>,
}

impl<R: Runtime> Storage<R> {
    /// Allocate `len` elements of type `dtype` on the specified device
    ///
    /// Device memory is zero-filled by every runtime.
    pub fn new(len: usize, dtype: DType, device: &R::Device) -> Result<Self> {
        let size_bytes = len
            .checked_mul(dtype.size_in_bytes())
            .ok_or(Error::OutOfMemory { size: usize::MAX })?;
        let ptr = R::allocate(size_bytes, device)?;
        Ok(Self::wrap(ptr, len, dtype, device))
    }

    /// Create storage from host data with inferred dtype
    pub fn from_slice<T: Element>(data: &[T], device: &R::Device) -> Result<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let ptr = R::allocate(bytes.len(), device)?;
        R::copy_to_device(bytes, ptr, device)?;
        Ok(Self::wrap(ptr, data.len(), T::DTYPE, device))
    }

    fn wrap(ptr: u64, len: usize, dtype: DType, device: &R::Device) -> Self {
        Self {
            inner: Arc::new(StorageInner {
                ptr,
                len,
                dtype,
                device: device.clone(),
                pending: Mutex::new(None),
            }),
        }
    }

    /// Get the raw device pointer
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.inner.ptr
    }

    /// Get the number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// Check if storage is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Get the element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    /// Get the device
    #[inline]
    pub fn device(&self) -> &R::Device {
        &self.inner.device
    }

    /// Get size in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.inner.len * self.inner.dtype.size_in_bytes()
    }

    /// Check whether two storages share one allocation
    #[inline]
    pub fn same_buffer(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Record `event` as the completion of the latest writer of this buffer
    pub fn set_pending(&self, event: Event) {
        *self.inner.pending.lock() = Some(event);
    }

    /// The writer's completion event, if it has not been observed complete
    pub fn pending(&self) -> Option<Event> {
        let mut slot = self.inner.pending.lock();
        // A failed writer stays recorded so later readers see the error.
        if slot
            .as_ref()
            .is_some_and(|e| matches!(e.try_status(), Some(Ok(()))))
        {
            *slot = None;
        }
        slot.clone()
    }

    /// Block until the latest writer has completed
    pub fn wait_ready(&self) -> Result<()> {
        match self.pending() {
            Some(event) => event.wait(),
            None => Ok(()),
        }
    }

    /// Copy the whole buffer to host once its writer has completed
    pub fn to_vec<T: bytemuck::Pod>(&self) -> Result<Vec<T>> {
        self.wait_ready()?;
        // Allocate with T's alignment, then view as bytes for the copy.
        let mut result = vec![T::zeroed(); self.inner.len];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut result);
        R::copy_from_device(self.inner.ptr, bytes, &self.inner.device)?;
        Ok(result)
    }
}

impl<R: Runtime> Clone for Storage<R> {
    /// Clone increments the reference count (zero-copy)
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Runtime> Drop for StorageInner<R> {
    fn drop(&mut self) {
        if self.ptr != 0 {
            R::deallocate(self.ptr, self.len * self.dtype.size_in_bytes(), &self.device);
        }
    }
}

impl<R: Runtime> std::fmt::Debug for Storage<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("ptr", &format!("0x{:x}", self.inner.ptr))
            .field("len", &self.inner.len)
            .field("dtype", &self.inner.dtype)
            .field("refs", &Arc::strong_count(&self.inner))
            .finish()
    }
}

// Storage tests are in the cpu runtime module (they need a concrete runtime)
