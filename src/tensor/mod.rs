//! Tensor types
//!
//! This module provides the core `Tensor` type, which represents an n-dimensional
//! array stored on a compute device, together with its memory `Layout` and
//! reference-counted `Storage`.

mod core;
mod layout;
mod storage;

pub use core::Tensor;
pub use layout::{Layout, Shape, Strides, column_major_strides, row_major_strides};
pub use storage::Storage;
