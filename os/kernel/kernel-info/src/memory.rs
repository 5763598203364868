//! # Memory Layout

use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalRange, Size4K};

/// Physical address where RAM (and the kernel image) begins.
///
/// # Kernel Build
/// This information is sourced in the kernel's `build.rs` to configure
/// the linker.
pub const KERNEL_BASE_PHYS: u64 = 0x8000_0000;

/// Amount of RAM the kernel expects to find above [`KERNEL_BASE_PHYS`].
pub const PHYS_MEM_SIZE: u64 = 128 * 1024 * 1024;

/// First physical address above usable RAM.
pub const PHYS_TOP: u64 = KERNEL_BASE_PHYS + PHYS_MEM_SIZE;

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything you map at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Number of 4 KiB frames between [`KERNEL_BASE_PHYS`] and [`PHYS_TOP`].
///
/// Page tracking tables are sized from this value.
#[allow(clippy::cast_possible_truncation)]
pub const MAX_PAGES: usize = (PHYS_MEM_SIZE / Size4K::SIZE) as usize;

/// The physical range whose pages have allocator bookkeeping.
#[must_use]
pub const fn managed_range() -> PhysicalRange {
    PhysicalRange::new(
        PhysicalAddress::new(KERNEL_BASE_PHYS),
        PhysicalAddress::new(PHYS_TOP),
    )
}

const _: () = {
    assert!(KERNEL_BASE_PHYS.is_multiple_of(Size4K::SIZE));
    assert!(PHYS_TOP.is_multiple_of(Size4K::SIZE));
    assert!(PHYS_TOP > KERNEL_BASE_PHYS);
    assert!(MAX_PAGES as u64 * Size4K::SIZE == PHYS_MEM_SIZE);
    // frame links are 31-bit indices
    assert!(MAX_PAGES < (1 << 31));
};
