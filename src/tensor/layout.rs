//! Layout: shape, strides, and offset for tensor memory layout

use smallvec::SmallVec;
use std::fmt;

/// Stack allocation threshold for dimensions
/// Most tensors have 4 or fewer dimensions, so we stack-allocate up to 4
const STACK_DIMS: usize = 4;

/// Shape type: dimensions of a tensor
pub type Shape = SmallVec<[usize; STACK_DIMS]>;

/// Strides type: element offsets between consecutive elements along each dimension
/// NOTE: Strides are in ELEMENTS, not bytes
pub type Strides = SmallVec<[isize; STACK_DIMS]>;

/// Layout describes the memory layout of a tensor
///
/// A tensor's elements are stored in a contiguous buffer, but not necessarily
/// in row-major order. The layout specifies how to compute the memory address
/// of any element given its indices.
///
/// Address of element at indices [i0, i1, ..., in]:
///   offset + i0 * strides[0] + i1 * strides[1] + ... + in * strides[n]
#[derive(Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Strides,
    offset: usize,
}

impl Layout {
    /// Create a row-major (C-order) layout from a shape
    ///
    /// # Example
    /// ```
    /// use devkern::tensor::Layout;
    /// let layout = Layout::contiguous(&[2, 3, 4]);
    /// assert_eq!(layout.strides(), &[12, 4, 1]);
    /// ```
    pub fn contiguous(shape: &[usize]) -> Self {
        Self {
            shape: shape.iter().copied().collect(),
            strides: row_major_strides(shape),
            offset: 0,
        }
    }

    /// Create a column-major (Fortran-order) layout from a shape
    ///
    /// # Example
    /// ```
    /// use devkern::tensor::Layout;
    /// let layout = Layout::fortran(&[2, 3, 4]);
    /// assert_eq!(layout.strides(), &[1, 2, 6]);
    /// ```
    pub fn fortran(shape: &[usize]) -> Self {
        Self {
            shape: shape.iter().copied().collect(),
            strides: column_major_strides(shape),
            offset: 0,
        }
    }

    /// Create a layout with explicit shape, strides, and offset
    pub fn new(shape: Shape, strides: Strides, offset: usize) -> Self {
        debug_assert_eq!(shape.len(), strides.len());
        Self {
            shape,
            strides,
            offset,
        }
    }

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the strides
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Get the offset
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of dimensions (rank)
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements
    #[inline]
    pub fn elem_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Check if memory is contiguous in row-major order
    pub fn is_contiguous(&self) -> bool {
        self.offset == 0
            && strides_match(&self.shape, &self.strides, &row_major_strides(&self.shape))
    }

    /// Check if memory is contiguous in column-major order
    pub fn is_f_contiguous(&self) -> bool {
        self.offset == 0
            && strides_match(&self.shape, &self.strides, &column_major_strides(&self.shape))
    }

    /// Normalize a dimension index (handle negative indices)
    pub fn normalize_dim(&self, d: isize) -> Option<usize> {
        let ndim = self.ndim() as isize;
        let idx = if d < 0 { ndim + d } else { d };
        if idx >= 0 && idx < ndim {
            Some(idx as usize)
        } else {
            None
        }
    }

    /// Create a transposed layout (swap two dimensions)
    pub fn transpose(&self, dim0: isize, dim1: isize) -> Option<Self> {
        let d0 = self.normalize_dim(dim0)?;
        let d1 = self.normalize_dim(dim1)?;

        let mut shape = self.shape.clone();
        let mut strides = self.strides.clone();
        shape.swap(d0, d1);
        strides.swap(d0, d1);

        Some(Self::new(shape, strides, self.offset))
    }

    /// Reorder dimensions: output dimension `i` is input dimension `dims[i]`
    ///
    /// Returns None if `dims` is not a permutation of `0..ndim`.
    pub fn permute(&self, dims: &[usize]) -> Option<Self> {
        if dims.len() != self.ndim() {
            return None;
        }
        let mut seen: SmallVec<[bool; STACK_DIMS]> = SmallVec::from_elem(false, dims.len());
        for &d in dims {
            if d >= dims.len() || seen[d] {
                return None;
            }
            seen[d] = true;
        }

        let shape = dims.iter().map(|&d| self.shape[d]).collect();
        let strides = dims.iter().map(|&d| self.strides[d]).collect();
        Some(Self::new(shape, strides, self.offset))
    }

    /// Move dimensions `source` to positions `destination`, keeping the
    /// relative order of the remaining dimensions
    ///
    /// Both lists support negative indexing and must have equal length.
    pub fn moveaxis(&self, source: &[isize], destination: &[isize]) -> Option<Self> {
        if source.len() != destination.len() {
            return None;
        }
        let ndim = self.ndim();
        let src: Option<Vec<usize>> = source.iter().map(|&d| self.normalize_dim(d)).collect();
        let dst: Option<Vec<usize>> = destination.iter().map(|&d| self.normalize_dim(d)).collect();
        let (src, dst) = (src?, dst?);

        let mut order: Vec<Option<usize>> = vec![None; ndim];
        for (&s, &d) in src.iter().zip(dst.iter()) {
            if order[d].is_some() {
                return None;
            }
            order[d] = Some(s);
        }
        let mut rest = (0..ndim).filter(|d| !src.contains(d));
        let perm: Option<Vec<usize>> = order
            .into_iter()
            .map(|slot| slot.or_else(|| rest.next()))
            .collect();

        self.permute(&perm?)
    }

    /// Create a reshaped row-major layout
    ///
    /// Returns None if the layout is not row-major contiguous or the element
    /// counts differ.
    pub fn reshape(&self, new_shape: &[usize]) -> Option<Self> {
        if !self.is_contiguous() {
            return None;
        }
        let new_count: usize = new_shape.iter().product();
        if new_count != self.elem_count() {
            return None;
        }
        Some(Self::contiguous(new_shape))
    }

    /// Create an unsqueezed layout (add dimension of size 1)
    pub fn unsqueeze(&self, dim: isize) -> Option<Self> {
        let ndim = self.ndim();
        let idx = if dim < 0 { ndim as isize + dim + 1 } else { dim };
        if idx < 0 || idx as usize > ndim {
            return None;
        }
        let idx = idx as usize;

        let mut shape = self.shape.clone();
        let mut strides = self.strides.clone();
        let new_stride = if idx < ndim {
            strides[idx] * shape[idx] as isize
        } else {
            1
        };
        shape.insert(idx, 1);
        strides.insert(idx, new_stride);

        Some(Self::new(shape, strides, self.offset))
    }
}

/// Row-major strides for a shape
pub fn row_major_strides(shape: &[usize]) -> Strides {
    let mut strides: Strides = SmallVec::from_elem(0, shape.len());
    let mut stride = 1isize;
    for (i, &dim) in shape.iter().enumerate().rev() {
        strides[i] = stride;
        stride *= dim.max(1) as isize;
    }
    strides
}

/// Column-major strides for a shape
pub fn column_major_strides(shape: &[usize]) -> Strides {
    let mut strides: Strides = SmallVec::with_capacity(shape.len());
    let mut stride = 1isize;
    for &dim in shape {
        strides.push(stride);
        stride *= dim.max(1) as isize;
    }
    strides
}

// Strides of size-1 dimensions never affect addressing, and an empty layout
// addresses nothing, so both are ignored in the comparison.
fn strides_match(shape: &[usize], actual: &[isize], expected: &[isize]) -> bool {
    if shape.contains(&0) {
        return true;
    }
    shape
        .iter()
        .zip(actual.iter().zip(expected.iter()))
        .all(|(&dim, (&a, &e))| dim == 1 || a == e)
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Layout {{ shape: {:?}, strides: {:?}, offset: {} }}",
            self.shape.as_slice(),
            self.strides.as_slice(),
            self.offset
        )
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.shape.as_slice())
    }
}
