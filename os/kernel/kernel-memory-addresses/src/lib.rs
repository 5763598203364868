//! # Physical Memory Address Types
//!
//! Strongly typed wrappers for physical addresses, page frames and frame
//! ranges used by the physical page allocator.
//!
//! ## Overview
//!
//! | Type | Generic | Description |
//! |------|---------|-------------|
//! | [`PhysicalAddress`] | – | A raw 64-bit physical address (RAM or MMIO). |
//! | [`PhysicalPage<S>`] | [`S: PageSize`](PageSize) | The page-aligned base of a physical frame of size `S`. |
//! | [`PhysicalRange`] | – | A half-open `[start, end)` span of physical addresses. |
//!
//! The allocator only ever deals in [`Size4K`] frames; the page size is still
//! carried at the type level so an unaligned address cannot silently become a
//! frame handle.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x8020_1042);
//! assert!(!pa.is_aligned::<Size4K>());
//!
//! let page = pa.page::<Size4K>();
//! assert_eq!(page.base().as_u64(), 0x8020_1000);
//! assert_eq!(page.next().base().as_u64(), 0x8020_2000);
//!
//! let range = PhysicalRange::new(PhysicalAddress::new(0x8000_0000), PhysicalAddress::new(0x8000_4000));
//! assert_eq!(range.page_count::<Size4K>(), 4);
//! assert!(!range.contains(pa));
//! assert!(range.contains(PhysicalAddress::new(0x8000_3FFF)));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod page_size;
mod physical_address;
mod physical_page;
mod physical_range;

pub use page_size::{PageSize, Size4K};
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use physical_range::{Pages, PhysicalRange};

/// Align `x` down to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two.
///
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(4095, 4096), 0);
/// assert_eq!(align_down(8191, 4096), 4096);
/// ```
#[inline]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`, or `None` on overflow.
///
/// `a` must be a non-zero power of two.
///
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(1, 4096), Some(4096));
/// assert_eq!(align_up(4096, 4096), Some(4096));
/// assert_eq!(align_up(u64::MAX, 4096), None);
/// ```
#[inline]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> Option<u64> {
    match x.checked_add(a - 1) {
        Some(v) => Some(v & !(a - 1)),
        None => None,
    }
}
