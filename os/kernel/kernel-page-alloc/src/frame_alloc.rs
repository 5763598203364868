//! Frame allocation as seen by page-table code.
//!
//! Code that builds page tables only needs "give me a zeroable 4 KiB frame"
//! and "take it back"; it should not care about shards or reference counts.

use crate::allocator::PageAllocator;
use crate::phys_mapper::PhysMapper;
use kernel_memory_addresses::{PhysicalPage, Size4K};
use kernel_sync::CpuIdentity;

/// Source of 4 KiB physical frames.
pub trait FrameAlloc {
    /// Allocate one 4 KiB *physical* frame. Must return page-aligned frames.
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>>;

    /// Return a frame obtained from [`alloc_4k`](Self::alloc_4k).
    fn free_4k(&mut self, page: PhysicalPage<Size4K>);
}

/// Frames handed out this way start with a reference count of one; freeing
/// drops that reference.
impl<C, M, const SHARDS: usize, const PAGES: usize> FrameAlloc
    for &PageAllocator<C, M, SHARDS, PAGES>
where
    C: CpuIdentity,
    M: PhysMapper,
{
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
        self.alloc_page()
    }

    fn free_4k(&mut self, page: PhysicalPage<Size4K>) {
        self.free_page(page.base());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IdentityMapper, MemoryLayout, Scrub};
    use kernel_memory_addresses::{PhysicalAddress, PhysicalRange};
    use kernel_sync::UniProcessor;

    /// Page-table style consumer that only knows the trait.
    fn take_two<A: FrameAlloc>(alloc: &mut A) -> Option<[PhysicalPage<Size4K>; 2]> {
        Some([alloc.alloc_4k()?, alloc.alloc_4k()?])
    }

    #[test]
    fn shared_reference_is_a_frame_allocator() {
        let pages: PageAllocator<_, _, 1, 4> =
            PageAllocator::with_scrub(UniProcessor, IdentityMapper, Scrub::Disabled);
        pages
            .init(MemoryLayout::new(PhysicalRange::new(
                PhysicalAddress::new(0x10_0000),
                PhysicalAddress::new(0x10_2000),
            )))
            .unwrap();

        let mut alloc = &pages;
        let [a, b] = take_two(&mut alloc).unwrap();
        assert_ne!(a, b);
        assert_eq!(alloc.alloc_4k(), None);

        alloc.free_4k(a);
        assert_eq!(pages.get_refcount(a.base()), 0);
        assert_eq!(pages.free_pages(), 1);
        assert_eq!(alloc.alloc_4k(), Some(a));
        alloc.free_4k(b);
    }
}
