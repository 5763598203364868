//! # Kernel synchronization primitives
//!
//! - [`Mutex`] over a pluggable raw lock, with [`SpinMutex`] as the kernel's
//!   default. [`Mutex::lock_pinned`] additionally pins the caller to its CPU
//!   for as long as the lock is held.
//! - [`SyncOnceCell`], a spin-waiting write-once cell.
//! - [`CpuIdentity`] / [`CpuPinGuard`], the scheduler seam that lets per-CPU
//!   data structures pin the caller to its current CPU.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod mutex;
pub mod preempt;
mod raw_spin;
mod sync_once_cell;

pub use mutex::{Mutex, MutexGuard, PinnedMutexGuard};
pub use preempt::{CpuIdentity, CpuPinGuard, UniProcessor};
pub use raw_spin::RawSpin;
pub use sync_once_cell::SyncOnceCell;

/// Test-and-test-and-set spin mutex.
pub type SpinMutex<T> = Mutex<T, RawSpin>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
    /// Racy snapshot, for diagnostics and assertions only.
    fn raw_is_locked(&self) -> bool;
}

pub trait RawUnlock {
    /// # Safety
    /// The lock must be held by the caller.
    unsafe fn raw_unlock(&self);
}
