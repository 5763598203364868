//! # Physical memory layout
//!
//! [`MemoryLayout`] is what boot code hands to the allocator: the physical
//! range that gets bookkeeping (one reference count per page) and the end of
//! the kernel image inside it. Pages between the start of the range and the
//! kernel end are tracked but never handed out.
//!
//! ```text
//! managed.start     kernel_end (rounded up)              managed.end
//!      │ kernel image │ pages seeded into the shards ...      │
//!      └──────────────┴───────────────────────────────────────┘
//!      ◄──────────────── FrameSpan (table index 0..frames) ───►
//! ```

use crate::error::{FreeError, LayoutError};
use kernel_info::memory;
use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalPage, PhysicalRange, Size4K};

/// Input to [`PageAllocator::init`](crate::PageAllocator::init).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryLayout {
    managed: PhysicalRange,
    kernel_end: PhysicalAddress,
}

impl MemoryLayout {
    /// Manage every whole page of `managed`; nothing is reserved for a kernel image.
    #[must_use]
    pub const fn new(managed: PhysicalRange) -> Self {
        Self {
            managed,
            kernel_end: managed.start(),
        }
    }

    /// The build-time RAM range from `kernel-info`, with the kernel image
    /// ending at `kernel_end` (usually the linker's `end` symbol).
    #[must_use]
    pub const fn kernel_default(kernel_end: PhysicalAddress) -> Self {
        Self::new(memory::managed_range()).with_kernel_end(kernel_end)
    }

    /// First address after the kernel image. Pages below it are never seeded,
    /// and freeing one is fatal.
    #[must_use]
    pub const fn with_kernel_end(mut self, kernel_end: PhysicalAddress) -> Self {
        self.kernel_end = kernel_end;
        self
    }

    #[must_use]
    pub const fn managed(&self) -> PhysicalRange {
        self.managed
    }

    #[must_use]
    pub const fn kernel_end(&self) -> PhysicalAddress {
        self.kernel_end
    }

    /// Checks the layout against a table capacity of `capacity` pages.
    ///
    /// # Errors
    /// - [`LayoutError::Empty`] if no whole page fits the managed range.
    /// - [`LayoutError::KernelOutsideRange`] if the kernel end is not within it.
    /// - [`LayoutError::TooLarge`] if the range holds more than `capacity` pages.
    pub fn resolve(&self, capacity: usize) -> Result<ResolvedLayout, LayoutError> {
        let table = self.managed.page_aligned::<Size4K>();
        if table.is_empty() {
            return Err(LayoutError::Empty);
        }

        let kernel_end = self.kernel_end.as_u64();
        if kernel_end < self.managed.start().as_u64() || kernel_end > self.managed.end().as_u64() {
            return Err(LayoutError::KernelOutsideRange {
                kernel_end: self.kernel_end,
                start: self.managed.start(),
                end: self.managed.end(),
            });
        }

        let pages = table.page_count::<Size4K>();
        let frames = usize::try_from(pages)
            .ok()
            .filter(|&n| n <= capacity)
            .ok_or(LayoutError::TooLarge { pages, capacity })?;

        let span = FrameSpan {
            base: PhysicalPage::from_addr(table.start()),
            frames,
        };
        let seeded = PhysicalRange::new(self.kernel_end.max(table.start()), table.end())
            .page_aligned::<Size4K>();

        Ok(ResolvedLayout { span, seeded })
    }
}

/// A validated [`MemoryLayout`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResolvedLayout {
    span: FrameSpan,
    seeded: PhysicalRange,
}

impl ResolvedLayout {
    /// Pages with a table entry.
    #[must_use]
    pub const fn span(&self) -> FrameSpan {
        self.span
    }

    /// Pages owned by the allocator: everything in the span above the kernel image.
    #[must_use]
    pub const fn seeded(&self) -> PhysicalRange {
        self.seeded
    }

    /// Checks that `pa` names a page of the seeded range.
    ///
    /// # Errors
    /// The first rule `pa` breaks, checked in the order alignment, kernel
    /// image, top of memory.
    pub fn check_freeable(&self, pa: PhysicalAddress) -> Result<(), FreeError> {
        if !pa.is_aligned::<Size4K>() {
            return Err(FreeError::Misaligned);
        }
        if pa < self.seeded.start() {
            return Err(FreeError::BelowKernel {
                kernel_end: self.seeded.start(),
            });
        }
        if pa >= self.seeded.end() {
            return Err(FreeError::AboveTop {
                top: self.seeded.end(),
            });
        }
        Ok(())
    }
}

/// Index of a page inside a [`FrameSpan`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameIndex(u32);

impl FrameIndex {
    /// # Panics
    /// If `index` does not fit the 31-bit link encoding.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(index: usize) -> Self {
        assert!(index <= Self::MAX as usize, "frame index out of range");
        Self(index as u32)
    }

    /// Largest representable index; the next value is the free-list terminator.
    pub const MAX: u32 = (1 << 31) - 2;

    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub(crate) const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Contiguous run of pages addressed by [`FrameIndex`]: index `i` is the page
/// at `base + i * 4096`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameSpan {
    base: PhysicalPage<Size4K>,
    frames: usize,
}

impl FrameSpan {
    /// Span with no pages; every lookup misses.
    pub const EMPTY: Self = Self {
        base: PhysicalPage::from_frame_number(0),
        frames: 0,
    };

    #[must_use]
    pub const fn base(&self) -> PhysicalPage<Size4K> {
        self.base
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.frames
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Index of the page containing `pa`, if it lies inside the span.
    #[must_use]
    pub fn index_of(&self, pa: PhysicalAddress) -> Option<FrameIndex> {
        let delta = pa.as_u64().checked_sub(self.base.base().as_u64())?;
        let index = usize::try_from(delta >> Size4K::SHIFT).ok()?;
        (index < self.frames).then(|| FrameIndex::new(index))
    }

    /// Page at `index`.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn page(&self, index: FrameIndex) -> PhysicalPage<Size4K> {
        PhysicalPage::from_frame_number(self.base.frame_number() + index.as_u32() as u64)
    }
}
