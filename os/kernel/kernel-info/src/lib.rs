//! # Kernel Configuration
//!
//! Build-time constants shared by the boot code, the linker configuration and
//! the memory subsystems. Everything here is `const` so that subsystems can
//! size static tables from it.
//!
//! ## Modules
//!
//! ### Memory Layout ([`memory`])
//! Physical memory bounds managed by the page allocator and the direct map
//! used to touch physical pages from kernel code:
//!
//! ```text
//! Physical Address Space:
//!
//! KERNEL_BASE_PHYS ┌─────────────────────────────────┐ 0x0000_0000_8000_0000
//!                  │   Kernel Text & Data (image)    │
//!     kernel end   ├─────────────────────────────────┤ (linker symbol)
//!                  │                                 │
//!                  │   Pages owned by the allocator  │
//!                  │                                 │
//! PHYS_TOP         └─────────────────────────────────┘ 0x0000_0000_8800_0000
//! ```
//!
//! ### SMP Configuration ([`smp`])
//! The number of CPUs the kernel supports. Per-CPU tables are sized from it.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod memory;
pub mod smp;
