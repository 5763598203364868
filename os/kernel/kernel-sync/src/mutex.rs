//! # Mutex and guards
//!
//! A [`Mutex`] is only ever released by dropping one of its guards, so every
//! exit path of a critical section (early returns, `?`, unwinding) unlocks.
//!
//! Spin locks shared between CPUs must not be held across a context switch:
//! a preempted holder leaves every other taker spinning until it is
//! scheduled again. [`Mutex::lock_pinned`] pins the caller first and only
//! then spins, and the returned [`PinnedMutexGuard`] unlocks before it
//! unpins.
//!
//! ```text
//!  lock_pinned ──► pin ──► raw_lock ──► critical section ──► raw_unlock ──► unpin
//! ```

use crate::preempt::{CpuIdentity, CpuPinGuard};
use crate::{RawLock, RawUnlock};
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

/// Mutual exclusion over `T`, generic over the raw lock `R`.
pub struct Mutex<T, R> {
    raw: R,
    value: UnsafeCell<T>,
}

// SAFETY: access to `value` is serialized by `raw`.
unsafe impl<T: Send, R: Sync> Sync for Mutex<T, R> {}

impl<T, R> Mutex<T, R> {
    pub const fn from_raw(raw: R, value: T) -> Self {
        Self {
            raw,
            value: UnsafeCell::new(value),
        }
    }
}

impl<T, R> Mutex<T, R>
where
    R: RawLock + RawUnlock,
{
    /// Spins until acquired. The caller may be preempted while holding the
    /// lock; prefer [`lock_pinned`](Self::lock_pinned) for locks other CPUs take.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T, R> {
        self.raw.raw_lock();
        MutexGuard { mutex: self }
    }

    #[inline]
    #[must_use]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, R>> {
        self.raw.raw_try_lock().then(|| MutexGuard { mutex: self })
    }

    /// Pins the caller to its CPU, then spins until acquired.
    #[inline]
    pub fn lock_pinned<'a, C>(&'a self, cpus: &'a C) -> PinnedMutexGuard<'a, T, R, C>
    where
        C: CpuIdentity,
    {
        let pin = cpus.pin();
        let guard = self.lock();
        PinnedMutexGuard { guard, pin }
    }

    /// Racy snapshot of the lock state.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.raw.raw_is_locked()
    }
}

/// Exclusive access to the value of a locked [`Mutex`].
#[must_use = "the mutex is unlocked as soon as the guard is dropped"]
pub struct MutexGuard<'a, T, R>
where
    R: RawUnlock,
{
    mutex: &'a Mutex<T, R>,
}

impl<T, R> Deref for MutexGuard<'_, T, R>
where
    R: RawUnlock,
{
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves the lock is held.
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T, R> DerefMut for MutexGuard<'_, T, R>
where
    R: RawUnlock,
{
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves the lock is held exclusively.
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T, R> Drop for MutexGuard<'_, T, R>
where
    R: RawUnlock,
{
    fn drop(&mut self) {
        // SAFETY: a guard only exists while its lock is held.
        unsafe { self.mutex.raw.raw_unlock() }
    }
}

/// A [`MutexGuard`] that also keeps its holder pinned to one CPU.
#[must_use = "the mutex is unlocked and the caller unpinned as soon as the guard is dropped"]
pub struct PinnedMutexGuard<'a, T, R, C>
where
    R: RawUnlock,
    C: CpuIdentity,
{
    // fields drop in declaration order: unlock first, then unpin
    guard: MutexGuard<'a, T, R>,
    pin: CpuPinGuard<'a, C>,
}

impl<T, R, C> PinnedMutexGuard<'_, T, R, C>
where
    R: RawUnlock,
    C: CpuIdentity,
{
    /// The CPU the holder is pinned to.
    #[inline]
    #[must_use]
    pub const fn cpu_id(&self) -> usize {
        self.pin.cpu_id()
    }
}

impl<T, R, C> Deref for PinnedMutexGuard<'_, T, R, C>
where
    R: RawUnlock,
    C: CpuIdentity,
{
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, R, C> DerefMut for PinnedMutexGuard<'_, T, R, C>
where
    R: RawUnlock,
    C: CpuIdentity,
{
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
