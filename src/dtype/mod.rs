//! Data type system for devkern tensors
//!
//! This module provides the `DType` enum representing the element types a
//! tensor can hold, along with the [`Element`] trait that maps Rust scalars
//! onto it.
//!
//! Only `F32` and `F64` are accepted by the numerical kernels. Integer and
//! boolean dtypes exist so that tensors of other types can be represented and
//! rejected with a typed error instead of being unrepresentable.

mod element;

pub use element::Element;

use std::fmt;

/// Data types supported by devkern tensors
///
/// This enum represents the element type of a tensor at runtime.
///
/// # Discriminant Values
///
/// - Floats: 0-9 (F64=0, F32=1)
/// - Signed ints: 10-19 (I64=10, I32=11)
/// - Unsigned ints: 20-29 (U8=23)
/// - Bool: 30
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    F64 = 0,
    /// 32-bit floating point
    F32 = 1,
    /// 64-bit signed integer
    I64 = 10,
    /// 32-bit signed integer
    I32 = 11,
    /// 8-bit unsigned integer
    U8 = 23,
    /// Boolean stored as one byte
    Bool = 30,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::F64 | Self::I64 => 8,
            Self::F32 | Self::I32 => 4,
            Self::U8 | Self::Bool => 1,
        }
    }

    /// Returns true for real floating-point types
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F64 | Self::F32)
    }

    /// Machine epsilon of a floating-point dtype
    ///
    /// Returns `None` for non-float types.
    #[inline]
    pub const fn epsilon(self) -> Option<f64> {
        match self {
            Self::F64 => Some(f64::EPSILON),
            Self::F32 => Some(f32::EPSILON as f64),
            _ => None,
        }
    }

    /// Short lowercase name (e.g. "f32")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::I64 => "i64",
            Self::I32 => "i32",
            Self::U8 => "u8",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Dispatch a block over the real floating-point dtypes.
///
/// Binds `$T` to `f32` or `f64` inside `$body`; any other dtype returns
/// `Err(Error::UnsupportedDType)` from the enclosing function.
#[macro_export]
macro_rules! dispatch_float_dtype {
    ($dtype:expr, $T:ident => $body:block, $error_op:expr) => {
        match $dtype {
            $crate::dtype::DType::F64 => {
                type $T = f64;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $T = f32;
                $body
            }
            other => {
                return Err($crate::error::Error::UnsupportedDType {
                    dtype: other,
                    op: $error_op,
                });
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_size() {
        assert_eq!(DType::F64.size_in_bytes(), 8);
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::I32.size_in_bytes(), 4);
        assert_eq!(DType::Bool.size_in_bytes(), 1);
    }

    #[test]
    fn test_dtype_categories() {
        assert!(DType::F32.is_float());
        assert!(!DType::I64.is_float());
        assert!(!DType::Bool.is_float());
    }

    #[test]
    fn test_epsilon() {
        assert_eq!(DType::F64.epsilon(), Some(f64::EPSILON));
        assert_eq!(DType::F32.epsilon(), Some(f32::EPSILON as f64));
        assert_eq!(DType::I32.epsilon(), None);
    }

    #[test]
    fn test_dispatch_float_dtype() {
        fn width(dtype: DType) -> crate::error::Result<usize> {
            dispatch_float_dtype!(dtype, T => {
                Ok(std::mem::size_of::<T>())
            }, "width")
        }

        assert_eq!(width(DType::F32).unwrap(), 4);
        assert_eq!(width(DType::F64).unwrap(), 8);
        assert!(width(DType::I64).is_err());
    }
}
