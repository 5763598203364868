//! # CPU identity and pinning
//!
//! Per-CPU data structures need two things from the scheduler: the index of
//! the CPU the caller runs on, and a way to keep the caller on that CPU while
//! it works on CPU-local state. [`CpuIdentity`] is that seam; the scheduler
//! implements the raw operations and callers only ever use the scoped
//! [`CpuPinGuard`] returned by [`CpuIdentity::pin`].
//!
//! # Examples
//!
//! ```
//! use kernel_sync::{CpuIdentity, UniProcessor};
//!
//! let cpus = UniProcessor;
//! {
//!     let pinned = cpus.pin();
//!     assert_eq!(pinned.cpu_id(), 0);
//!     // work on CPU-local state; no migration until `pinned` drops
//! }
//! ```

use core::marker::PhantomData;

/// Scheduler-provided CPU identity and migration control.
pub trait CpuIdentity {
    /// Logical index (`0..n`) of the CPU the caller currently runs on.
    ///
    /// Only stable while the caller is pinned.
    fn current_cpu_id(&self) -> usize;

    /// Disables preemption and migration for the calling context. Nests.
    fn raw_pin(&self);

    /// Undoes one [`raw_pin`](Self::raw_pin).
    ///
    /// # Safety
    /// Must pair with an earlier `raw_pin` from the same context.
    unsafe fn raw_unpin(&self);

    /// Pins the caller to its current CPU until the guard is dropped.
    #[inline]
    fn pin(&self) -> CpuPinGuard<'_, Self>
    where
        Self: Sized,
    {
        self.raw_pin();
        let cpu = self.current_cpu_id();
        CpuPinGuard {
            owner: self,
            cpu,
            _not_send: PhantomData,
        }
    }
}

/// RAII pin returned by [`CpuIdentity::pin`].
///
/// The guard is `!Send`: it describes the CPU of the context that created it.
#[must_use = "the caller is unpinned as soon as the guard is dropped"]
pub struct CpuPinGuard<'a, C: CpuIdentity> {
    owner: &'a C,
    cpu: usize,
    _not_send: PhantomData<*mut ()>,
}

impl<C: CpuIdentity> CpuPinGuard<'_, C> {
    /// The CPU the caller is pinned to.
    #[inline]
    #[must_use]
    pub const fn cpu_id(&self) -> usize {
        self.cpu
    }
}

impl<C: CpuIdentity> Drop for CpuPinGuard<'_, C> {
    fn drop(&mut self) {
        // SAFETY: paired with the raw_pin in `CpuIdentity::pin`.
        unsafe { self.owner.raw_unpin() }
    }
}

/// Single-CPU systems: always CPU 0, nothing to pin.
#[derive(Debug, Default, Copy, Clone)]
pub struct UniProcessor;

impl CpuIdentity for UniProcessor {
    #[inline]
    fn current_cpu_id(&self) -> usize {
        0
    }

    #[inline]
    fn raw_pin(&self) {}

    #[inline]
    unsafe fn raw_unpin(&self) {}
}
