//! Host-side stand-ins for physical memory and the scheduler.

#![allow(dead_code)]

use kernel_memory_addresses::{PhysicalAddress, PhysicalRange};
use kernel_page_alloc::PhysMapper;
use kernel_sync::CpuIdentity;
use std::cell::{Cell, UnsafeCell};
use std::sync::Arc;

/// Physical address of the first byte of [`HostRam`].
pub const BASE: u64 = 0x8000_0000;
pub const PAGE: u64 = 4096;

/// Address of page `n` of the test RAM.
pub fn pa(n: u64) -> PhysicalAddress {
    PhysicalAddress::new(BASE + n * PAGE)
}

/// The first `pages` pages of the test RAM.
pub fn ram_range(pages: u64) -> PhysicalRange {
    PhysicalRange::new(pa(0), pa(pages))
}

#[repr(align(4096))]
struct Frame([u8; 4096]);

/// `pages` frames of host memory posing as physical RAM at [`BASE`].
///
/// Clones share the same frames, so a test can keep one to inspect what the
/// allocator wrote.
#[derive(Clone)]
pub struct HostRam {
    frames: Arc<[UnsafeCell<Frame>]>,
}

// The allocator only touches a frame while it owns it exclusively.
unsafe impl Send for HostRam {}
unsafe impl Sync for HostRam {}

impl HostRam {
    pub fn new(pages: usize) -> Self {
        Self {
            frames: (0..pages).map(|_| UnsafeCell::new(Frame([0; 4096]))).collect(),
        }
    }

    fn frame(&self, pa: PhysicalAddress) -> *mut Frame {
        let index = usize::try_from((pa.as_u64() - BASE) / PAGE).unwrap();
        self.frames[index].get()
    }

    /// Copy of the page at `pa`. Only call for pages nobody else is using.
    pub fn read(&self, pa: PhysicalAddress) -> Vec<u8> {
        unsafe { (*self.frame(pa)).0.to_vec() }
    }

    /// Fills the page at `pa` with `byte`, as a user of the page would.
    pub fn write(&self, pa: PhysicalAddress, byte: u8) {
        unsafe { (*self.frame(pa)).0.fill(byte) }
    }
}

impl PhysMapper for HostRam {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { &mut *self.frame(pa).cast::<T>() }
    }
}

thread_local! {
    static CPU: Cell<usize> = const { Cell::new(0) };
    static PINS: Cell<usize> = const { Cell::new(0) };
}

/// Treats every test thread as a CPU whose id the test chooses with [`on_cpu`].
#[derive(Debug, Default, Copy, Clone)]
pub struct ThreadCpu;

/// Makes the calling thread report itself as CPU `id`.
pub fn on_cpu(id: usize) {
    assert_eq!(PINS.with(Cell::get), 0, "cannot migrate while pinned");
    CPU.with(|c| c.set(id));
}

impl CpuIdentity for ThreadCpu {
    fn current_cpu_id(&self) -> usize {
        CPU.with(Cell::get)
    }

    fn raw_pin(&self) {
        PINS.with(|p| p.set(p.get() + 1));
    }

    unsafe fn raw_unpin(&self) {
        PINS.with(|p| p.set(p.get() - 1));
    }
}
