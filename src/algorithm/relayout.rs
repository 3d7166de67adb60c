//! Layout conversion between batch-leading and batch-last column-major stacks
//!
//! Batched factorization routines take a stack of `B` matrices as one
//! column-major `(m, n, B)` buffer with strides `[1, m, m * n]`. Callers hold
//! the same stack batch-leading, `(..., m, n)`, in any strided layout.
//!
//! The column-major `(m, n, B)` buffer has exactly the memory of a row-major
//! `(B, n, m)` array, so both directions are a single strided copy of a
//! zero-copy view:
//!
//! ```text
//! to_batch_last_fortran:
//!     (..., m, n) --transpose(-1,-2)--> (..., n, m) --copy--> (m, n, B) F-order
//! from_batch_last_fortran:
//!     (m, n, B) F-order --moveaxis(-1, 0)--> (B, m, n) --copy--> (..., m, n)
//! ```
//!
//! Every copy is submitted as a task that runs after `depends` and after any
//! pending writer of the source, and the returned tensor carries the copy's
//! completion event.

use crate::error::{Error, Result};
use crate::runtime::{Event, Runtime, RuntimeClient};
use crate::tensor::{Layout, Storage, Tensor};

/// Copy any view into fresh row-major storage
///
/// The copy is always made, even for an already contiguous source.
pub fn copy_to_contiguous<R: Runtime>(
    client: &R::Client,
    src: &Tensor<R>,
    depends: &[Event],
) -> Result<Tensor<R>> {
    submit_copy(client, src, Layout::contiguous(src.shape()), depends)
}

/// Convert a `(..., m, n)` stack into a column-major `(m, n, B)` buffer
///
/// `B` is the product of the leading dimensions (1 for a bare matrix). Batch
/// index `b` is the row-major flattening of the leading indices.
pub fn to_batch_last_fortran<R: Runtime>(
    client: &R::Client,
    a: &Tensor<R>,
    depends: &[Event],
) -> Result<Tensor<R>> {
    let ndim = a.ndim();
    if ndim < 2 {
        return Err(Error::invalid_shape("a", "at least 2 dimensions", a.shape()));
    }
    let (m, n) = (a.shape()[ndim - 2], a.shape()[ndim - 1]);
    let batch: usize = a.shape()[..ndim - 2].iter().product();

    // Row-major (..., n, m) is column-major (m, n, B).
    let view = a.transpose(-1, -2)?;
    submit_copy(client, &view, Layout::fortran(&[m, n, batch]), depends)
}

/// Convert a column-major `(p, q, B)` buffer back into `batch_shape + (p, q)`
///
/// `batch_shape` must multiply out to `B`; an empty `batch_shape` requires
/// `B == 1`.
pub fn from_batch_last_fortran<R: Runtime>(
    client: &R::Client,
    t_f: &Tensor<R>,
    batch_shape: &[usize],
    depends: &[Event],
) -> Result<Tensor<R>> {
    if t_f.ndim() != 3 {
        return Err(Error::invalid_shape("t_f", "3 dimensions (p, q, B)", t_f.shape()));
    }
    let (p, q, batch) = (t_f.shape()[0], t_f.shape()[1], t_f.shape()[2]);
    if batch_shape.iter().product::<usize>() != batch {
        return Err(Error::shape_mismatch(&[batch], batch_shape));
    }

    let mut out_shape = batch_shape.to_vec();
    out_shape.extend([p, q]);

    let view = t_f.moveaxis(&[-1], &[0])?;
    submit_copy(client, &view, Layout::contiguous(&out_shape), depends)
}

/// Allocate `dst_layout`, then submit a row-major walk of `src` into it
///
/// `dst_layout` must describe a dense buffer whose memory order matches the
/// row-major order of `src`'s shape.
fn submit_copy<R: Runtime>(
    client: &R::Client,
    src: &Tensor<R>,
    dst_layout: Layout,
    depends: &[Event],
) -> Result<Tensor<R>> {
    let dtype = src.dtype();
    let numel = src.numel();
    let dst = Storage::<R>::new(numel, dtype, src.device())?;
    if numel == 0 {
        return Ok(Tensor::from_parts(dst, dst_layout));
    }

    let mut deps = depends.to_vec();
    deps.extend(src.pending());

    let src_storage = src.storage().clone();
    let dst_storage = dst.clone();
    let shape = src.shape().to_vec();
    let strides = src.strides().to_vec();
    let elem_size = dtype.size_in_bytes();
    let src_byte_offset = src.layout().offset() * elem_size;

    let event = client.submit("relayout_copy", &deps, move || {
        R::copy_strided(
            src_storage.ptr(),
            src_byte_offset,
            dst_storage.ptr(),
            &shape,
            &strides,
            elem_size,
            dst_storage.device(),
        )
    });
    dst.set_pending(event);

    Ok(Tensor::from_parts(dst, dst_layout))
}
