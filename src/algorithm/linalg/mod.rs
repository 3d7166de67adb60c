//! Batched linear algebra contracts
//!
//! A backend supplies one native routine, the batched Householder QR on a
//! column-major `(m, n, B)` stack. Everything a caller needs on top of it
//! (argument validation, the empty-input shortcut, layout conversion and
//! synchronization) is provided once, here, for every backend.
//!
//! # Module Structure
//!
//! - `decompositions`: Result type (`QrDecomposition`)
//! - `traits`: `BatchedQrAlgorithms`
//! - `helpers`: Validation utilities and stream planning

pub mod decompositions;
pub mod helpers;
pub mod traits;

pub use decompositions::*;
pub use helpers::*;
pub use traits::*;
