//! Atomic accumulation into float buffers
//!
//! Floats have no native `fetch_add`, so the add is a compare-exchange loop on
//! the bit pattern.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Floats that can be accumulated atomically in place
pub trait AtomicFloat: Copy {
    /// Atomically perform `*ptr += value` (relaxed ordering)
    ///
    /// # Safety
    ///
    /// - `ptr` must be valid for reads and writes and aligned to `Self`
    /// - every concurrent access to `*ptr` must also be atomic
    unsafe fn atomic_add(ptr: *mut Self, value: Self);
}

impl AtomicFloat for f64 {
    #[inline]
    unsafe fn atomic_add(ptr: *mut Self, value: Self) {
        let cell = unsafe { AtomicU64::from_ptr(ptr.cast::<u64>()) };
        let mut current = cell.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}

impl AtomicFloat for f32 {
    #[inline]
    unsafe fn atomic_add(ptr: *mut Self, value: Self) {
        let cell = unsafe { AtomicU32::from_ptr(ptr.cast::<u32>()) };
        let mut current = cell.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(current) + value).to_bits();
            match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}
