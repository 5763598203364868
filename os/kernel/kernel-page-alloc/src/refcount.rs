//! # Page reference counts
//!
//! One `u32` per page of the [`FrameSpan`], recording how many
//! live mappings point at the page. A count of zero means the page is free
//! (or never left the allocator); copy-on-write sharing raises it above one.
//!
//! All entries share one lock. An update is a bounds check and an add, so
//! the lock is held for a few instructions and does not become the
//! bottleneck the free lists would. Updates never wrap: they fail with a
//! [`RefCountError`] and leave the count alone.

use crate::error::RefCountError;
use crate::layout::{FrameIndex, FrameSpan};
use kernel_memory_addresses::PhysicalAddress;
use kernel_sync::{CpuIdentity, PinnedMutexGuard, RawSpin, SpinMutex};

struct Counts<const PAGES: usize> {
    span: FrameSpan,
    counts: [u32; PAGES],
}

impl<const PAGES: usize> Counts<PAGES> {
    fn slot(&mut self, pa: PhysicalAddress) -> Result<&mut u32, RefCountError> {
        let index = self
            .span
            .index_of(pa)
            .ok_or(RefCountError::OutOfRange(pa))?;
        Ok(&mut self.counts[index.as_usize()])
    }
}

type Locked<'a, C, const PAGES: usize> = PinnedMutexGuard<'a, Counts<PAGES>, RawSpin, C>;

/// Reference counts for up to `PAGES` pages.
///
/// Every operation pins the caller to its CPU before taking the table lock,
/// so a holder is never preempted inside the critical section.
pub(crate) struct RefCountTable<const PAGES: usize> {
    inner: SpinMutex<Counts<PAGES>>,
}

impl<const PAGES: usize> RefCountTable<PAGES> {
    /// A table that manages no pages yet; see [`reset`](Self::reset).
    pub(crate) const fn new() -> Self {
        Self {
            inner: SpinMutex::new(Counts {
                span: FrameSpan::EMPTY,
                counts: [0; PAGES],
            }),
        }
    }

    fn lock<'a, C: CpuIdentity>(&'a self, cpus: &'a C) -> Locked<'a, C, PAGES> {
        self.inner.lock_pinned(cpus)
    }

    /// Starts managing `span` with every count at zero.
    ///
    /// # Panics
    /// If `span` has more than `PAGES` pages.
    pub(crate) fn reset<C: CpuIdentity>(&self, cpus: &C, span: FrameSpan) {
        assert!(span.len() <= PAGES, "span exceeds refcount table capacity");
        let mut inner = self.lock(cpus);
        inner.span = span;
        inner.counts.fill(0);
    }

    /// Current count of the page containing `pa`; zero if `pa` is not managed.
    pub(crate) fn get<C: CpuIdentity>(&self, cpus: &C, pa: PhysicalAddress) -> u32 {
        self.lock(cpus).slot(pa).map_or(0, |c| *c)
    }

    /// Adds one mapping and returns the new count.
    ///
    /// # Errors
    /// [`RefCountError::OutOfRange`] or [`RefCountError::Overflow`]; the
    /// count is left unchanged.
    pub(crate) fn increment<C: CpuIdentity>(
        &self,
        cpus: &C,
        pa: PhysicalAddress,
    ) -> Result<u32, RefCountError> {
        let mut inner = self.lock(cpus);
        let count = inner.slot(pa)?;
        *count = count.checked_add(1).ok_or(RefCountError::Overflow(pa))?;
        Ok(*count)
    }

    /// Drops one mapping and returns the new count. Never frees the page.
    ///
    /// # Errors
    /// [`RefCountError::OutOfRange`] or [`RefCountError::Underflow`]; the
    /// count is left unchanged.
    pub(crate) fn decrement<C: CpuIdentity>(
        &self,
        cpus: &C,
        pa: PhysicalAddress,
    ) -> Result<u32, RefCountError> {
        let mut inner = self.lock(cpus);
        let count = inner.slot(pa)?;
        *count = count.checked_sub(1).ok_or(RefCountError::Underflow(pa))?;
        Ok(*count)
    }

    /// Overwrites the count unconditionally.
    ///
    /// # Errors
    /// [`RefCountError::OutOfRange`] if `pa` is not managed.
    pub(crate) fn set<C: CpuIdentity>(
        &self,
        cpus: &C,
        pa: PhysicalAddress,
        count: u32,
    ) -> Result<(), RefCountError> {
        *self.lock(cpus).slot(pa)? = count;
        Ok(())
    }

    /// Sets the count of a page the caller just took off a free list.
    pub(crate) fn claim<C: CpuIdentity>(&self, cpus: &C, index: FrameIndex) {
        let mut inner = self.lock(cpus);
        debug_assert_eq!(inner.counts[index.as_usize()], 0, "claimed page is in use");
        inner.counts[index.as_usize()] = 1;
    }

    /// Number of pages with a non-zero count.
    pub(crate) fn in_use<C: CpuIdentity>(&self, cpus: &C) -> usize {
        let inner = self.lock(cpus);
        inner.counts[..inner.span.len()]
            .iter()
            .filter(|&&c| c > 0)
            .count()
    }
}
