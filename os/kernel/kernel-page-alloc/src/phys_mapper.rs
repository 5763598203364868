//! # Touching physical pages
//!
//! The allocator itself never dereferences page memory for bookkeeping: its
//! free lists are index based. The only time it writes to a page is when
//! junk-filling it on the way into or out of a free list (see
//! [`Scrub`](crate::Scrub)). To do that it needs a way to turn a physical
//! address into a pointer in the current address space, which is what
//! [`PhysMapper`] abstracts over.
//!
//! - [`HhdmPhysMapper`]: the kernel's higher-half direct map, every physical
//!   address is visible at `base + pa`.
//! - [`IdentityMapper`]: physical equals virtual (early boot, identity-mapped RAM).
//!
//! Tests provide their own mapper backed by host memory.

use kernel_info::memory::HHDM_BASE;
use kernel_memory_addresses::PhysicalAddress;

/// Converts physical addresses to usable mutable references in the current
/// virtual address space.
pub trait PhysMapper {
    /// # Safety
    /// - `pa` must be mapped writable in the current page tables for `'a`.
    /// - The bytes at `pa` must be valid for `T`, and no other reference to
    ///   them may be live while the returned one is.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// [`PhysMapper`] for kernels with a higher-half direct map (HHDM).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HhdmPhysMapper {
    base: u64,
}

impl HhdmPhysMapper {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_base(HHDM_BASE)
    }

    /// Direct map starting at virtual address `base`.
    #[must_use]
    pub const fn with_base(base: u64) -> Self {
        Self { base }
    }
}

impl Default for HhdmPhysMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysMapper for HhdmPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = (self.base + pa.as_u64()) as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and mapped via HHDM.
        unsafe { &mut *va }
    }
}

/// [`PhysMapper`] for identity-mapped physical memory.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct IdentityMapper;

impl PhysMapper for IdentityMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        // SAFETY: Caller guarantees `pa` is identity mapped and exclusively owned.
        unsafe { &mut *(pa.as_u64() as *mut T) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hhdm_offsets_by_base() {
        #[repr(align(4096))]
        struct Page([u8; 4096]);
        let mut page = Page([0; 4096]);
        let host = core::ptr::from_mut(&mut page) as u64;

        // Pretend the page lives at physical 0x1000 inside a direct map at `host - 0x1000`.
        let mapper = HhdmPhysMapper::with_base(host - 0x1000);
        let bytes: &mut [u8; 4096] = unsafe { mapper.phys_to_mut(PhysicalAddress::new(0x1000)) };
        bytes[7] = 0xAB;
        assert_eq!(page.0[7], 0xAB);
    }

    #[test]
    fn default_uses_kernel_hhdm() {
        assert_eq!(HhdmPhysMapper::default(), HhdmPhysMapper::with_base(HHDM_BASE));
    }
}
