//! # SMP Configuration

/// Maximum number of CPUs.
pub const NCPU: usize = 8;

const _: () = assert!(NCPU > 0);
