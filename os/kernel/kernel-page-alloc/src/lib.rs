//! # Physical Page Allocator
//!
//! Hands out and takes back 4 KiB physical pages on a multiprocessor
//! kernel, and tracks how many mappings point at each page so copy-on-write
//! sharing can tell when the last one is gone.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 PageAllocator (facade)              │
//! │    • init / alloc_page / free_page                  │
//! │    • get / increment / decrement / set refcount     │
//! └──────────┬──────────────────────────────┬───────────┘
//!            │                              │
//! ┌──────────▼───────────┐   ┌──────────────▼───────────┐
//! │   Reference counts   │   │      Per-CPU shards      │
//! │  • one u32 per page  │   │  • one FreeList per CPU  │
//! │  • checked updates   │   │  • steal in CPU order    │
//! └──────────────────────┘   └──────────────┬───────────┘
//!                                           │
//!                            ┌──────────────▼───────────┐
//!                            │        FrameLinks        │
//!                            │  • 32-bit link per page  │
//!                            │  • tagged free / next    │
//!                            └──────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! * [`PageAllocator`]: the facade the rest of the kernel talks to. Built
//!   in a `const` context, initialized once from a [`MemoryLayout`].
//! * Reference-count table: per-page sharer counts. Updates never wrap; they
//!   fail with a [`RefCountError`] instead.
//! * Per-CPU shards: each CPU allocates from and frees into its own free
//!   list and only touches another CPU's list when its own is empty.
//! * [`PhysMapper`]: how the allocator reaches page memory to junk-fill it
//!   ([`HhdmPhysMapper`] in the kernel, [`IdentityMapper`] in early boot).
//! * [`FrameAlloc`]: the narrow "give me a frame" interface page-table code
//!   consumes, implemented for `&PageAllocator`.
//!
//! ## Failure Model
//!
//! Running out of pages is an ordinary condition and surfaces as `None`.
//! Reference-count updates that would overflow, underflow or miss the
//! managed range return a [`RefCountError`]. Freeing a page that was never
//! handed out (misaligned, outside the managed range, already free) is a
//! kernel bug and panics.
//!
//! ## Configuration
//!
//! Shard count and table capacity are const generics; the kernel uses the
//! [`KernelPageAllocator`] alias sized from `kernel-info`. The `scrub`
//! feature (on by default) selects [`Scrub::DEFAULT`].
//!
//! ```rust
//! use kernel_memory_addresses::{PhysicalAddress, PhysicalRange};
//! use kernel_page_alloc::{IdentityMapper, MemoryLayout, PageAllocator, Scrub};
//! use kernel_sync::UniProcessor;
//!
//! static PAGES: PageAllocator<UniProcessor, IdentityMapper, 1, 64> =
//!     PageAllocator::with_scrub(UniProcessor, IdentityMapper, Scrub::Disabled);
//!
//! let ram = PhysicalRange::new(PhysicalAddress::new(0x4000_0000), PhysicalAddress::new(0x4004_0000));
//! let layout = MemoryLayout::new(ram).with_kernel_end(PhysicalAddress::new(0x4000_8000));
//! assert_eq!(PAGES.init(layout), Ok(56));
//!
//! let page = PAGES.alloc_page().expect("out of memory");
//! assert!(page.base() >= PhysicalAddress::new(0x4000_8000));
//! PAGES.free_page(page.base());
//! assert_eq!(PAGES.free_pages(), 56);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod allocator;
mod error;
mod frame_alloc;
mod free_list;
mod layout;
mod phys_mapper;
mod refcount;
mod shard;

pub use allocator::{KernelPageAllocator, PageAllocator, PageAllocatorStats};
pub use error::{FreeError, InitError, LayoutError, RefCountError};
pub use frame_alloc::FrameAlloc;
pub use free_list::{ALLOC_JUNK, FREED_JUNK, Scrub};
pub use layout::{FrameIndex, FrameSpan, MemoryLayout, ResolvedLayout};
pub use phys_mapper::{HhdmPhysMapper, IdentityMapper, PhysMapper};
