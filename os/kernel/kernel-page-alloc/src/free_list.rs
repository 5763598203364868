//! # Index-based page free list
//!
//! Every page in the [`FrameSpan`] owns one 32-bit link word in a shared
//! [`FrameLinks`] table. While a page is free its word carries the `free` tag
//! and the index of the next free page; while it is allocated the word is
//! zero. A [`FreeList`] is just a head index and a length, so any number of
//! lists (one per shard) can thread through the same link table.
//!
//! ```text
//! FreeList { head: 4 }
//!
//! index:   0      1      2      3      4      5
//! link:  [ -- ] [F→5 ] [ -- ] [ -- ] [F→1 ] [F→∅ ]
//!                                      ^head
//! ```
//!
//! The page contents are never used for bookkeeping. Pages are junk-filled
//! (see [`Scrub`] and `Frames::fill`) to make use-after-free and
//! use-before-init bugs in callers visible, but that happens outside the
//! list operations: `push` and `pop` only touch link words, so the lock
//! around a list is held for a handful of instructions.
//!
//! # Concurrency
//! A link word is only read or written by whoever holds the lock of the list
//! the page is on (or by the page's exclusive owner, before pushing it).
//! The atomics exist to make that sharing expressible, not to synchronize:
//! all accesses are `Relaxed` and ordering comes from the shard locks.

use crate::layout::{FrameIndex, FrameSpan};
use crate::phys_mapper::PhysMapper;
use bitfield_struct::bitfield;
use core::sync::atomic::{AtomicU32, Ordering};
use kernel_memory_addresses::{PageSize, Size4K};

/// Fill byte written over a page as it is freed.
pub const FREED_JUNK: u8 = 0x01;
/// Fill byte written over a page as it is handed out.
pub const ALLOC_JUNK: u8 = 0x05;

/// Terminates a list.
const NIL: u32 = FrameIndex::MAX + 1;

#[allow(clippy::cast_possible_truncation)]
const PAGE_BYTES: usize = Size4K::SIZE as usize;

/// Whether pages are junk-filled when entering and leaving a free list.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Scrub {
    Enabled,
    Disabled,
}

impl Scrub {
    /// `Enabled` unless the crate is built without the `scrub` feature.
    pub const DEFAULT: Self = if cfg!(feature = "scrub") {
        Self::Enabled
    } else {
        Self::Disabled
    };
}

impl Default for Scrub {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-page link word.
#[bitfield(u32)]
struct FrameLink {
    /// Index of the next free page, or `NIL`.
    #[bits(31)]
    next: u32,
    /// Set while the page sits on a free list.
    free: bool,
}

/// Link words for every page of a span of up to `PAGES` pages.
pub(crate) struct FrameLinks<const PAGES: usize> {
    links: [AtomicU32; PAGES],
}

impl<const PAGES: usize> FrameLinks<PAGES> {
    pub(crate) const fn new() -> Self {
        const { assert!(PAGES <= NIL as usize, "too many pages for 31-bit links") };
        Self {
            links: [const { AtomicU32::new(0) }; PAGES],
        }
    }

    fn load(&self, index: FrameIndex) -> FrameLink {
        FrameLink::from_bits(self.links[index.as_usize()].load(Ordering::Relaxed))
    }

    fn store(&self, index: FrameIndex, link: FrameLink) {
        self.links[index.as_usize()].store(link.into_bits(), Ordering::Relaxed);
    }

    /// Whether `index` is currently linked into some free list.
    pub(crate) fn is_free(&self, index: FrameIndex) -> bool {
        self.load(index).free()
    }
}

/// Everything a free-list operation needs besides the list itself.
pub(crate) struct Frames<'a, M, const PAGES: usize> {
    pub(crate) links: &'a FrameLinks<PAGES>,
    pub(crate) span: FrameSpan,
    pub(crate) mapper: &'a M,
    pub(crate) scrub: Scrub,
}

impl<M: PhysMapper, const PAGES: usize> Frames<'_, M, PAGES> {
    /// Overwrites the page at `index` with `byte`, unless scrubbing is off.
    ///
    /// The caller must own the page exclusively: it is on no list, and is
    /// either being freed by its last holder or was just popped.
    pub(crate) fn fill(&self, index: FrameIndex, byte: u8) {
        if self.scrub == Scrub::Disabled {
            return;
        }
        let pa = self.span.page(index).base();
        // SAFETY: the page belongs to the span handed to `init` (so the mapper
        // covers it) and the caller owns it exclusively.
        let bytes: &mut [u8; PAGE_BYTES] = unsafe { self.mapper.phys_to_mut(pa) };
        bytes.fill(byte);
    }
}

/// LIFO list of free pages.
#[derive(Debug, Default)]
pub(crate) struct FreeList {
    head: Option<FrameIndex>,
    len: usize,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Makes `index` the new head.
    ///
    /// # Panics
    /// If the page is already on a free list (double free).
    pub(crate) fn push<M, const PAGES: usize>(
        &mut self,
        frames: &Frames<'_, M, PAGES>,
        index: FrameIndex,
    ) {
        assert!(
            !frames.links.is_free(index),
            "page {} is already on a free list",
            frames.span.page(index)
        );

        let next = self.head.map_or(NIL, FrameIndex::as_u32);
        frames
            .links
            .store(index, FrameLink::new().with_next(next).with_free(true));
        self.head = Some(index);
        self.len += 1;
    }

    /// Unlinks the head and returns it.
    pub(crate) fn pop<M, const PAGES: usize>(
        &mut self,
        frames: &Frames<'_, M, PAGES>,
    ) -> Option<FrameIndex> {
        let index = self.head?;
        let link = frames.links.load(index);
        debug_assert!(link.free(), "free list head {index:?} is not tagged free");

        self.head = (link.next() != NIL).then(|| FrameIndex::new(link.next() as usize));
        self.len -= 1;
        frames.links.store(index, FrameLink::new());
        Some(index)
    }
}
