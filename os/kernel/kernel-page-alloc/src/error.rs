//! Error types returned by the page allocator.
//!
//! Only recoverable conditions are modelled here. Misuse of
//! [`free_page`](crate::PageAllocator::free_page) is a kernel bug and panics.

use kernel_memory_addresses::PhysicalAddress;

/// Failure of a reference-count update.
///
/// Callers treat these as assertions about their own bookkeeping: typically
/// fatal to the operation in progress, never to the kernel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefCountError {
    #[error("reference count of page {0} is saturated")]
    Overflow(PhysicalAddress),
    #[error("reference count of page {0} is already zero")]
    Underflow(PhysicalAddress),
    #[error("address {0} is not managed by the page allocator")]
    OutOfRange(PhysicalAddress),
}

impl RefCountError {
    /// The address the failed update was issued for.
    #[must_use]
    pub const fn address(&self) -> PhysicalAddress {
        match *self {
            Self::Overflow(pa) | Self::Underflow(pa) | Self::OutOfRange(pa) => pa,
        }
    }
}

/// Why an address can never be passed to
/// [`free_page`](crate::PageAllocator::free_page).
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FreeError {
    #[error("address is not page aligned")]
    Misaligned,
    #[error("address is below the end of the kernel image ({kernel_end})")]
    BelowKernel { kernel_end: PhysicalAddress },
    #[error("address is at or above the top of physical memory ({top})")]
    AboveTop { top: PhysicalAddress },
}

/// Rejected [`MemoryLayout`](crate::MemoryLayout).
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("managed range holds no whole page")]
    Empty,
    #[error("kernel end {kernel_end} lies outside the managed range [{start}..{end})")]
    KernelOutsideRange {
        kernel_end: PhysicalAddress,
        start: PhysicalAddress,
        end: PhysicalAddress,
    },
    #[error("managed range holds {pages} pages, capacity is {capacity}")]
    TooLarge { pages: u64, capacity: usize },
}

/// Failure of [`PageAllocator::init`](crate::PageAllocator::init).
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error("page allocator is already initialized")]
    AlreadyInitialized,
    #[error("invalid memory layout: {0}")]
    Layout(#[from] LayoutError),
}
