//! Core Tensor type

use super::{Layout, Storage};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::{Event, Runtime};
use std::fmt;

/// N-dimensional array stored on a compute device
///
/// `Tensor` is the fundamental data structure in devkern. It consists of:
/// - **Storage**: Reference-counted device memory
/// - **Layout**: Shape, strides, and offset defining the view into storage
/// - **DType**: Element type (determined at runtime)
///
/// # Zero-Copy Views
///
/// Operations like `transpose`, `moveaxis`, and `reshape` create new tensors
/// that share the same underlying storage. This is achieved through:
/// - Arc-wrapped storage (reference counting)
/// - Modified layout (different strides/offset)
///
/// # Asynchronous Contents
///
/// A tensor returned by a non-blocking call may still be written by a
/// submitted task. [`Tensor::to_vec`] and [`Tensor::wait`] block until the
/// writer has finished; passing the tensor to another call orders the new
/// work after it automatically.
///
/// # Example
///
/// ```ignore
/// use devkern::prelude::*;
///
/// let device = CpuDevice::new();
/// let a = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2], &device);
/// let b = a.transpose(-1, -2)?; // Zero-copy, shares storage with a
/// ```
pub struct Tensor<R: Runtime> {
    /// Device memory
    storage: Storage<R>,
    /// Shape, strides, offset
    layout: Layout,
}

impl<R: Runtime> Tensor<R> {
    /// Create a tensor from storage and layout
    pub fn from_parts(storage: Storage<R>, layout: Layout) -> Self {
        Self { storage, layout }
    }

    /// Create a tensor from a slice of data
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not equal the product of the `shape` dimensions.
    /// For a fallible alternative, use [`Self::try_from_slice`].
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize], device: &R::Device) -> Self {
        match Self::try_from_slice(data, shape, device) {
            Ok(tensor) => tensor,
            Err(e) => panic!("Tensor::from_slice failed: {e}"),
        }
    }

    /// Create a tensor from a slice of data (fallible version)
    ///
    /// Returns an error if `data.len()` does not equal the product of the `shape` dimensions,
    /// or if memory allocation fails.
    pub fn try_from_slice<T: Element>(
        data: &[T],
        shape: &[usize],
        device: &R::Device,
    ) -> Result<Self> {
        let expected_len: usize = shape.iter().product();
        if data.len() != expected_len {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }

        let storage = Storage::from_slice(data, device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape)))
    }

    /// Create a row-major tensor filled with zeros
    pub fn zeros(shape: &[usize], dtype: DType, device: &R::Device) -> Result<Self> {
        let len: usize = shape.iter().product();
        let storage = Storage::new(len, dtype, device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape)))
    }

    /// Create a column-major tensor filled with zeros
    pub fn zeros_fortran(shape: &[usize], dtype: DType, device: &R::Device) -> Result<Self> {
        let len: usize = shape.iter().product();
        let storage = Storage::new(len, dtype, device)?;
        Ok(Self::from_parts(storage, Layout::fortran(shape)))
    }

    // ===== Accessors =====

    /// Get the storage
    #[inline]
    pub fn storage(&self) -> &Storage<R> {
        &self.storage
    }

    /// Get the layout
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Get the strides
    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    /// Get the number of dimensions (rank)
    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Get the total number of elements
    #[inline]
    pub fn numel(&self) -> usize {
        self.layout.elem_count()
    }

    /// Get the element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Get the device
    #[inline]
    pub fn device(&self) -> &R::Device {
        self.storage.device()
    }

    /// Check if the tensor is contiguous in row-major order
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Check if the tensor is contiguous in column-major order
    #[inline]
    pub fn is_f_contiguous(&self) -> bool {
        self.layout.is_f_contiguous()
    }

    /// Completion event of the task still writing this tensor, if any
    pub fn pending(&self) -> Option<Event> {
        self.storage.pending()
    }

    /// Block until no submitted task is writing this tensor
    pub fn wait(&self) -> Result<()> {
        self.storage.wait_ready()
    }

    // ===== View Operations (Zero-Copy) =====

    fn with_layout(&self, layout: Layout) -> Self {
        Self {
            storage: self.storage.clone(),
            layout,
        }
    }

    /// Transpose two dimensions (zero-copy)
    pub fn transpose(&self, dim0: isize, dim1: isize) -> Result<Self> {
        let new_layout =
            self.layout
                .transpose(dim0, dim1)
                .ok_or_else(|| Error::InvalidDimension {
                    dim: dim0,
                    ndim: self.ndim(),
                })?;
        Ok(self.with_layout(new_layout))
    }

    /// Transpose last two dimensions (matrix transpose)
    pub fn t(&self) -> Result<Self> {
        self.transpose(-2, -1)
    }

    /// Permute dimensions (zero-copy)
    ///
    /// Output dimension `i` is input dimension `dims[i]`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let tensor = Tensor::<CpuRuntime>::from_slice(&data, &[2, 3, 4], &device);
    /// let permuted = tensor.permute(&[2, 0, 1])?; // Shape becomes [4, 2, 3]
    /// ```
    pub fn permute(&self, dims: &[usize]) -> Result<Self> {
        let new_layout = self
            .layout
            .permute(dims)
            .ok_or_else(|| Error::InvalidDimension {
                dim: dims.first().copied().unwrap_or(0) as isize,
                ndim: self.ndim(),
            })?;
        Ok(self.with_layout(new_layout))
    }

    /// Move dimensions to new positions (zero-copy)
    ///
    /// ```ignore
    /// let t = Tensor::<CpuRuntime>::from_slice(&data, &[4, 2, 3], &device);
    /// let last = t.moveaxis(&[0], &[-1])?; // Shape becomes [2, 3, 4]
    /// ```
    pub fn moveaxis(&self, source: &[isize], destination: &[isize]) -> Result<Self> {
        let new_layout = self
            .layout
            .moveaxis(source, destination)
            .ok_or_else(|| Error::InvalidDimension {
                dim: source.first().copied().unwrap_or(0),
                ndim: self.ndim(),
            })?;
        Ok(self.with_layout(new_layout))
    }

    /// Reshape a row-major contiguous tensor (zero-copy)
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        if !self.is_contiguous() {
            return Err(Error::NotContiguous {
                op: "reshape",
                order: "row-major",
            });
        }
        let new_layout = self
            .layout
            .reshape(shape)
            .ok_or_else(|| Error::shape_mismatch(self.shape(), shape))?;
        Ok(self.with_layout(new_layout))
    }

    /// Add a dimension of size 1
    pub fn unsqueeze(&self, dim: isize) -> Result<Self> {
        let new_layout = self
            .layout
            .unsqueeze(dim)
            .ok_or_else(|| Error::InvalidDimension {
                dim,
                ndim: self.ndim(),
            })?;
        Ok(self.with_layout(new_layout))
    }

    // ===== Host Access =====

    /// Copy tensor data to a `Vec` on the host in row-major order
    ///
    /// Blocks until any task writing the tensor has completed, and returns its
    /// error if it failed.
    pub fn to_vec<T: bytemuck::Pod>(&self) -> Result<Vec<T>> {
        if std::mem::size_of::<T>() != self.dtype().size_in_bytes() {
            return Err(Error::invalid_argument(
                "T",
                format!("element size does not match dtype {}", self.dtype()),
            ));
        }

        let all: Vec<T> = self.storage.to_vec()?;
        if self.is_contiguous() && all.len() == self.numel() {
            return Ok(all);
        }

        // Gather a strided view in row-major order.
        let shape = self.shape();
        let strides = self.strides();
        let numel = self.numel();
        let mut out = Vec::with_capacity(numel);
        let mut indices = vec![0usize; shape.len()];
        for _ in 0..numel {
            let offset = indices
                .iter()
                .zip(strides)
                .fold(self.layout.offset() as isize, |acc, (&i, &s)| {
                    acc + i as isize * s
                });
            out.push(all[offset as usize]);
            for dim in (0..shape.len()).rev() {
                indices[dim] += 1;
                if indices[dim] < shape[dim] {
                    break;
                }
                indices[dim] = 0;
            }
        }
        Ok(out)
    }
}

impl<R: Runtime> Clone for Tensor<R> {
    /// Clone creates a new view sharing the same storage (zero-copy)
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            layout: self.layout.clone(),
        }
    }
}

impl<R: Runtime> fmt::Debug for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .field("strides", &self.strides())
            .field("dtype", &self.dtype())
            .field("runtime", &R::name())
            .finish()
    }
}

impl<R: Runtime> fmt::Display for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor({:?}, dtype={})", self.shape(), self.dtype())
    }
}
