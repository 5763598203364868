//! # Page allocator facade
//!
//! [`PageAllocator`] ties the pieces together:
//!
//! ```text
//!            alloc_page / free_page / *_refcount
//!                           │
//!                ┌──────────▼──────────┐
//!                │    PageAllocator    │
//!                └──┬──────────────┬───┘
//!                   │              │
//!        ┌──────────▼───┐   ┌──────▼─────────┐
//!        │ RefCountTable│   │ ShardSet<NCPU> │──► FreeList × NCPU
//!        │ (one lock)   │   │ (lock / shard) │      over FrameLinks
//!        └──────────────┘   └────────────────┘
//! ```
//!
//! # Page states
//! A page of the seeded range is either *free* (on exactly one shard, count
//! zero) or *allocated* (on no shard, count ≥ 1). `alloc_page` moves a page
//! from free to a count of one; `increment_refcount` adds sharers;
//! `free_page` drops one sharer and returns the page to a shard when the
//! count reaches zero.
//!
//! # Lock order
//! No operation holds two locks at once. `free_page` updates the count and
//! releases the table lock before taking a shard lock; stealing releases
//! each shard before trying the next.

use crate::error::{InitError, RefCountError};
use crate::free_list::{FrameLinks, Frames, Scrub};
use crate::layout::{FrameIndex, MemoryLayout, ResolvedLayout};
use crate::phys_mapper::PhysMapper;
use crate::refcount::RefCountTable;
use crate::shard::ShardSet;
use kernel_info::memory::MAX_PAGES;
use kernel_info::smp::NCPU;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_sync::{CpuIdentity, SyncOnceCell};
use log::{debug, info, warn};

/// The allocator sized for the kernel's build-time configuration.
pub type KernelPageAllocator<C, M> = PageAllocator<C, M, NCPU, MAX_PAGES>;

/// Physical page allocator with per-CPU free lists and per-page reference
/// counts, for up to `SHARDS` CPUs and `PAGES` pages.
///
/// Construction is `const` so the allocator can live in a `static`; nothing is
/// usable until [`init`](Self::init) has run.
///
/// # Examples
///
/// ```
/// use kernel_memory_addresses::{PhysicalAddress, PhysicalRange};
/// use kernel_page_alloc::{IdentityMapper, MemoryLayout, PageAllocator, Scrub};
/// use kernel_sync::UniProcessor;
///
/// // Scrubbing disabled: the example never touches the (fake) page memory.
/// let pages: PageAllocator<_, _, 1, 16> =
///     PageAllocator::with_scrub(UniProcessor, IdentityMapper, Scrub::Disabled);
/// let ram = PhysicalRange::new(PhysicalAddress::new(0x8000_0000), PhysicalAddress::new(0x8001_0000));
/// pages.init(MemoryLayout::new(ram)).unwrap();
///
/// let page = pages.alloc_page().unwrap();
/// assert_eq!(pages.get_refcount(page.base()), 1);
///
/// // Share it (copy-on-write fork), then drop both mappings.
/// pages.increment_refcount(page.base()).unwrap();
/// pages.free_page(page.base());
/// assert_eq!(pages.get_refcount(page.base()), 1);
/// pages.free_page(page.base());
/// assert_eq!(pages.get_refcount(page.base()), 0);
/// ```
pub struct PageAllocator<C, M, const SHARDS: usize, const PAGES: usize> {
    cpus: C,
    mapper: M,
    scrub: Scrub,
    layout: SyncOnceCell<ResolvedLayout>,
    refcounts: RefCountTable<PAGES>,
    links: FrameLinks<PAGES>,
    shards: ShardSet<SHARDS>,
}

/// Point-in-time page accounting, see [`PageAllocator::stats`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageAllocatorStats<const SHARDS: usize> {
    /// Pages seeded at `init`.
    pub total: usize,
    /// Length of each shard's free list.
    pub free_per_shard: [usize; SHARDS],
    /// Pages with a non-zero reference count.
    pub in_use: usize,
}

impl<const SHARDS: usize> PageAllocatorStats<SHARDS> {
    #[must_use]
    pub fn free(&self) -> usize {
        self.free_per_shard.iter().sum()
    }
}

impl<C, M, const SHARDS: usize, const PAGES: usize> PageAllocator<C, M, SHARDS, PAGES> {
    /// An uninitialized allocator using the default [`Scrub`] policy.
    #[must_use]
    pub const fn new(cpus: C, mapper: M) -> Self {
        Self::with_scrub(cpus, mapper, Scrub::DEFAULT)
    }

    #[must_use]
    pub const fn with_scrub(cpus: C, mapper: M, scrub: Scrub) -> Self {
        Self {
            cpus,
            mapper,
            scrub,
            layout: SyncOnceCell::new(),
            refcounts: RefCountTable::new(),
            links: FrameLinks::new(),
            shards: ShardSet::new(),
        }
    }

    /// The layout passed to [`init`](Self::init), once it has run.
    #[must_use]
    pub fn layout(&self) -> Option<&ResolvedLayout> {
        self.layout.get()
    }

    fn frames<'a>(&'a self, layout: &ResolvedLayout) -> Frames<'a, M, PAGES> {
        Frames {
            links: &self.links,
            span: layout.span(),
            mapper: &self.mapper,
            scrub: self.scrub,
        }
    }
}

impl<C, M, const SHARDS: usize, const PAGES: usize> PageAllocator<C, M, SHARDS, PAGES>
where
    C: CpuIdentity,
    M: PhysMapper,
{
    /// Takes ownership of every whole page of `layout` above the kernel image
    /// and distributes them round-robin over the shards. Returns the number
    /// of pages seeded.
    ///
    /// Call once, at boot, before any other CPU uses the allocator.
    ///
    /// # Errors
    /// - [`InitError::AlreadyInitialized`] on a second call.
    /// - [`InitError::Layout`] if the layout is empty, inconsistent, or larger
    ///   than `PAGES`.
    pub fn init(&self, layout: MemoryLayout) -> Result<usize, InitError> {
        if self.layout.is_initialized() {
            return Err(InitError::AlreadyInitialized);
        }
        let resolved = layout.resolve(PAGES)?;
        let resolved = *self
            .layout
            .set(resolved)
            .map_err(|_| InitError::AlreadyInitialized)?;

        debug!(
            "page allocator: kernel image ends at {}, first free page {}",
            layout.kernel_end(),
            resolved.seeded().start()
        );

        let span = resolved.span();
        self.refcounts.reset(&self.cpus, span);

        let frames = self.frames(&resolved);
        let mut seeded = 0;
        for page in resolved.seeded().pages::<Size4K>() {
            // seeded pages always lie inside the span
            if let Some(index) = span.index_of(page.base()) {
                self.shards.seed(seeded % SHARDS, &frames, index);
                seeded += 1;
            }
        }

        info!(
            "page allocator: {} pages in {:?}, {} seeded over {} shards (~{} each)",
            span.len(),
            layout.managed(),
            seeded,
            SHARDS,
            seeded.div_ceil(SHARDS),
        );
        Ok(seeded)
    }

    /// Hands out one page with a reference count of 1, or `None` when every
    /// shard is empty (or the allocator is not initialized).
    ///
    /// Running out of pages is an ordinary condition: callers propagate it.
    #[must_use]
    pub fn alloc_page(&self) -> Option<PhysicalPage<Size4K>> {
        let layout = self.layout.get()?;
        let frames = self.frames(layout);

        let Some(index) = self.shards.alloc(&self.cpus, &frames) else {
            warn!("page allocator: out of memory");
            return None;
        };

        self.refcounts.claim(&self.cpus, index);
        Some(layout.span().page(index))
    }

    /// Drops one reference to the page at `pa`; when none remain the page
    /// goes back onto the calling CPU's shard.
    ///
    /// # Panics
    /// Misuse is a kernel bug and halts the system: `pa` fails
    /// [`ResolvedLayout::check_freeable`], or the page is already free (its
    /// count is zero).
    pub fn free_page(&self, pa: PhysicalAddress) {
        let Some(layout) = self.layout.get() else {
            panic!("free_page({pa}): page allocator is not initialized");
        };
        if let Err(e) = layout.check_freeable(pa) {
            panic!("free_page({pa}): {e}");
        }

        match self.refcounts.decrement(&self.cpus, pa) {
            Ok(0) => {}
            Ok(_) => return,
            Err(RefCountError::Underflow(_)) => panic!("free_page({pa}): page is already free"),
            Err(e) => panic!("free_page({pa}): {e}"),
        }

        let index = Self::index_of(layout, pa);
        self.shards.free(&self.cpus, &self.frames(layout), index);
    }

    fn index_of(layout: &ResolvedLayout, pa: PhysicalAddress) -> FrameIndex {
        layout
            .span()
            .index_of(pa)
            .unwrap_or_else(|| panic!("free_page({pa}): address has no table entry"))
    }

    /// Number of mappings of the page containing `pa`; zero if unmanaged.
    #[must_use]
    pub fn get_refcount(&self, pa: PhysicalAddress) -> u32 {
        self.refcounts.get(&self.cpus, pa)
    }

    /// Records one more mapping of the page at `pa` and returns the new
    /// count. Does not touch the free lists.
    ///
    /// # Errors
    /// [`RefCountError::Overflow`] or [`RefCountError::OutOfRange`].
    pub fn increment_refcount(&self, pa: PhysicalAddress) -> Result<u32, RefCountError> {
        traced(self.refcounts.increment(&self.cpus, pa))
    }

    /// Records one mapping fewer and returns the new count. The page is
    /// **not** freed when the count reaches zero; use
    /// [`free_page`](Self::free_page) for that.
    ///
    /// # Errors
    /// [`RefCountError::Underflow`] or [`RefCountError::OutOfRange`].
    pub fn decrement_refcount(&self, pa: PhysicalAddress) -> Result<u32, RefCountError> {
        traced(self.refcounts.decrement(&self.cpus, pa))
    }

    /// Overwrites the count of the page at `pa`.
    ///
    /// Bypasses every free-list invariant. Only meant for code that folds
    /// its own bookkeeping into the table (e.g. pages handed over by boot
    /// code outside [`init`](Self::init)).
    ///
    /// # Errors
    /// [`RefCountError::OutOfRange`] if `pa` is not managed.
    pub fn set_refcount(&self, pa: PhysicalAddress, count: u32) -> Result<(), RefCountError> {
        traced(self.refcounts.set(&self.cpus, pa, count))
    }

    /// Page accounting. Exact only while no other CPU is allocating.
    #[must_use]
    pub fn stats(&self) -> PageAllocatorStats<SHARDS> {
        PageAllocatorStats {
            total: self
                .layout
                .get()
                .map_or(0, |l| l.seeded().page_count::<Size4K>())
                .try_into()
                .unwrap_or(usize::MAX),
            free_per_shard: self.shards.lens(),
            in_use: self.refcounts.in_use(&self.cpus),
        }
    }

    /// Total number of free pages over all shards.
    #[must_use]
    pub fn free_pages(&self) -> usize {
        self.stats().free()
    }

    /// Whether the page at `pa` currently sits on a free list.
    #[must_use]
    pub fn is_free(&self, pa: PhysicalAddress) -> bool {
        self.layout
            .get()
            .and_then(|l| l.span().index_of(pa))
            .is_some_and(|index| self.links.is_free(index))
    }
}

fn traced<T>(result: Result<T, RefCountError>) -> Result<T, RefCountError> {
    if let Err(e) = &result {
        debug!("page allocator: refcount update rejected: {e}");
    }
    result
}
