mod common;

use common::{HostRam, ThreadCpu, on_cpu, pa, ram_range};
use kernel_memory_addresses::{PhysicalAddress, PhysicalRange, Size4K};
use kernel_page_alloc::{
    ALLOC_JUNK, FREED_JUNK, InitError, LayoutError, MemoryLayout, PageAllocator, RefCountError,
    Scrub,
};
use std::collections::HashSet;

const SHARDS: usize = 4;
const PAGES: usize = 16;
const KERNEL_PAGES: u64 = 2;
const SEEDED: usize = PAGES - KERNEL_PAGES as usize;

type Alloc = PageAllocator<ThreadCpu, HostRam, SHARDS, PAGES>;

fn layout() -> MemoryLayout {
    MemoryLayout::new(ram_range(PAGES as u64)).with_kernel_end(pa(KERNEL_PAGES))
}

/// 16 pages of RAM, the first two holding the kernel image, scrubbing off.
fn booted() -> Alloc {
    let pages = PageAllocator::with_scrub(ThreadCpu, HostRam::new(PAGES), Scrub::Disabled);
    assert_eq!(pages.init(layout()), Ok(SEEDED));
    pages
}

#[test]
fn alloc_then_free_round_trip() {
    let pages = booted();
    let page = pages.alloc_page().unwrap();
    assert_eq!(pages.get_refcount(page.base()), 1);
    assert!(!pages.is_free(page.base()));
    assert_eq!(pages.free_pages(), SEEDED - 1);

    pages.free_page(page.base());
    assert_eq!(pages.get_refcount(page.base()), 0);
    assert!(pages.is_free(page.base()));
    assert_eq!(pages.free_pages(), SEEDED);
}

#[test]
fn increment_then_decrement_is_a_no_op() {
    let pages = booted();
    let page = pages.alloc_page().unwrap().base();
    assert_eq!(pages.increment_refcount(page), Ok(2));
    assert_eq!(pages.decrement_refcount(page), Ok(1));
    assert_eq!(pages.get_refcount(page), 1);
    assert!(!pages.is_free(page));
}

#[test]
fn shared_page_needs_one_free_per_reference() {
    let pages = booted();
    let page = pages.alloc_page().unwrap().base();
    pages.increment_refcount(page).unwrap();

    pages.free_page(page);
    assert_eq!(pages.get_refcount(page), 1);
    assert!(!pages.is_free(page));
    assert_eq!(pages.free_pages(), SEEDED - 1);

    pages.free_page(page);
    assert_eq!(pages.get_refcount(page), 0);
    assert!(pages.is_free(page));
}

#[test]
fn decrement_to_zero_does_not_free() {
    let pages = booted();
    let page = pages.alloc_page().unwrap().base();
    assert_eq!(pages.decrement_refcount(page), Ok(0));
    assert!(!pages.is_free(page));
    assert_eq!(pages.free_pages(), SEEDED - 1);
}

#[test]
fn pages_are_distinct_aligned_and_above_the_kernel() {
    // a four-page kernel leaves 12 pages, three per shard
    let kernel_pages = 4;
    let pages: Alloc = PageAllocator::with_scrub(ThreadCpu, HostRam::new(PAGES), Scrub::Disabled);
    let layout = MemoryLayout::new(ram_range(PAGES as u64)).with_kernel_end(pa(kernel_pages));
    assert_eq!(pages.init(layout), Ok(3 * SHARDS));
    assert_eq!(pages.stats().free_per_shard, [3; SHARDS]);

    let mut seen = HashSet::new();
    for i in 0..2 * SHARDS {
        on_cpu(i % SHARDS);
        let page = pages.alloc_page().unwrap().base();
        assert!(page.is_aligned::<Size4K>());
        assert!(page >= pa(kernel_pages) && page < pa(PAGES as u64));
        assert!(seen.insert(page), "{page} handed out twice");
    }
    // every CPU was served from its own shard
    assert_eq!(pages.stats().free_per_shard, [1; SHARDS]);
    on_cpu(0);
}

#[test]
fn exhaustion_then_one_free_allows_exactly_one_alloc() {
    let pages = booted();
    // a single CPU drains every shard by stealing
    on_cpu(1);
    let all: Vec<_> = std::iter::from_fn(|| pages.alloc_page()).collect();
    assert_eq!(all.len(), SEEDED);
    assert_eq!(pages.alloc_page(), None);

    pages.free_page(all[5].base());
    assert_eq!(pages.alloc_page(), Some(all[5]));
    assert_eq!(pages.alloc_page(), None);
    on_cpu(0);
}

#[test]
fn seeding_is_round_robin() {
    let pages = booted();
    let stats = pages.stats();
    assert_eq!(stats.total, SEEDED);
    assert_eq!(stats.free_per_shard, [4, 4, 3, 3]);
    assert_eq!(stats.in_use, 0);
}

#[test]
fn free_goes_to_the_freeing_cpu() {
    let pages = booted();
    on_cpu(1);
    let page = pages.alloc_page().unwrap();
    assert_eq!(pages.stats().free_per_shard, [4, 3, 3, 3]);

    on_cpu(3);
    pages.free_page(page.base());
    assert_eq!(pages.stats().free_per_shard, [4, 3, 3, 4]);
    on_cpu(0);
}

#[test]
fn stats_track_pages_in_use() {
    let pages = booted();
    let held: Vec<_> = (0..3).map(|_| pages.alloc_page().unwrap()).collect();
    let stats = pages.stats();
    assert_eq!(stats.in_use, 3);
    assert_eq!(stats.free(), SEEDED - 3);

    for page in held {
        pages.free_page(page.base());
    }
    assert_eq!(pages.stats().in_use, 0);
}

#[test]
fn refcount_errors_leave_counts_alone() {
    let pages = booted();
    let page = pages.alloc_page().unwrap().base();

    pages.set_refcount(page, u32::MAX).unwrap();
    assert_eq!(pages.increment_refcount(page), Err(RefCountError::Overflow(page)));
    assert_eq!(pages.get_refcount(page), u32::MAX);
    pages.set_refcount(page, 1).unwrap();

    let free = pages.alloc_page().unwrap().base();
    pages.free_page(free);
    assert_eq!(pages.decrement_refcount(free), Err(RefCountError::Underflow(free)));

    let outside = pa(PAGES as u64);
    assert_eq!(pages.get_refcount(outside), 0);
    assert_eq!(pages.increment_refcount(outside), Err(RefCountError::OutOfRange(outside)));
    assert_eq!(pages.set_refcount(outside, 1), Err(RefCountError::OutOfRange(outside)));
}

#[test]
fn kernel_pages_have_table_entries_but_are_never_seeded() {
    let pages = booted();
    assert_eq!(pages.get_refcount(pa(0)), 0);
    assert!(!pages.is_free(pa(0)));
    assert_eq!(pages.set_refcount(pa(1), 1), Ok(()));
    assert_eq!(pages.get_refcount(pa(1)), 1);
}

#[test]
fn alloc_before_init_is_none() {
    let pages: Alloc = PageAllocator::new(ThreadCpu, HostRam::new(PAGES));
    assert_eq!(pages.alloc_page(), None);
    assert_eq!(pages.free_pages(), 0);
    assert!(pages.layout().is_none());
}

#[test]
fn init_runs_once() {
    let pages = booted();
    assert_eq!(pages.init(layout()), Err(InitError::AlreadyInitialized));
    assert_eq!(pages.free_pages(), SEEDED);
}

#[test]
fn init_rejects_bad_layouts() {
    let fresh = || -> Alloc { PageAllocator::new(ThreadCpu, HostRam::new(PAGES)) };

    let empty = MemoryLayout::new(PhysicalRange::new(pa(0) + 1, pa(1)));
    assert_eq!(fresh().init(empty), Err(InitError::Layout(LayoutError::Empty)));

    let too_large = MemoryLayout::new(ram_range(2 * PAGES as u64));
    assert_eq!(
        fresh().init(too_large),
        Err(InitError::Layout(LayoutError::TooLarge {
            pages: 2 * PAGES as u64,
            capacity: PAGES
        }))
    );

    let kernel_above = layout().with_kernel_end(pa(PAGES as u64 + 1));
    assert!(matches!(
        fresh().init(kernel_above),
        Err(InitError::Layout(LayoutError::KernelOutsideRange { .. }))
    ));
}

#[test]
fn unaligned_range_is_rounded_inwards() {
    let pages: Alloc = PageAllocator::with_scrub(ThreadCpu, HostRam::new(PAGES), Scrub::Disabled);
    let range = PhysicalRange::new(pa(0) + 0x10, pa(4) + 0x800);
    // pages 1, 2 and 3 are whole; the kernel ends inside page 1
    let seeded = pages
        .init(MemoryLayout::new(range).with_kernel_end(pa(1) + 0x20))
        .unwrap();
    assert_eq!(seeded, 2);
    let got: HashSet<PhysicalAddress> = std::iter::from_fn(|| pages.alloc_page())
        .map(|p| p.base())
        .collect();
    assert_eq!(got, HashSet::from([pa(2), pa(3)]));
}

#[test]
fn scrubbing_junk_fills_pages() {
    let ram = HostRam::new(PAGES);
    let pages: Alloc = PageAllocator::with_scrub(ThreadCpu, ram.clone(), Scrub::Enabled);
    pages.init(layout()).unwrap();

    assert!(ram.read(pa(0)).iter().all(|&b| b == 0), "kernel image touched");
    assert!(ram.read(pa(KERNEL_PAGES)).iter().all(|&b| b == FREED_JUNK));

    let page = pages.alloc_page().unwrap().base();
    assert!(ram.read(page).iter().all(|&b| b == ALLOC_JUNK));

    ram.write(page, 0xAA);
    pages.free_page(page);
    assert!(ram.read(page).iter().all(|&b| b == FREED_JUNK));
}

#[test]
fn shared_page_is_not_scrubbed_until_last_free() {
    let ram = HostRam::new(PAGES);
    let pages: Alloc = PageAllocator::with_scrub(ThreadCpu, ram.clone(), Scrub::Enabled);
    pages.init(layout()).unwrap();

    let page = pages.alloc_page().unwrap().base();
    ram.write(page, 0x42);
    pages.increment_refcount(page).unwrap();
    pages.free_page(page);
    assert!(ram.read(page).iter().all(|&b| b == 0x42));
}

#[test]
#[should_panic(expected = "not page aligned")]
fn freeing_a_misaligned_address_is_fatal() {
    let pages = booted();
    let page = pages.alloc_page().unwrap();
    pages.free_page(page.base() + 8);
}

#[test]
#[should_panic(expected = "below the end of the kernel image")]
fn freeing_a_kernel_page_is_fatal() {
    booted().free_page(pa(KERNEL_PAGES - 1));
}

#[test]
#[should_panic(expected = "at or above the top of physical memory")]
fn freeing_past_the_top_is_fatal() {
    booted().free_page(pa(PAGES as u64));
}

#[test]
#[should_panic(expected = "already free")]
fn double_free_is_fatal() {
    let pages = booted();
    let page = pages.alloc_page().unwrap();
    pages.free_page(page.base());
    pages.free_page(page.base());
}

#[test]
#[should_panic(expected = "already free")]
fn freeing_a_never_allocated_page_is_fatal() {
    booted().free_page(pa(KERNEL_PAGES + 3));
}

#[test]
#[should_panic(expected = "not initialized")]
fn free_before_init_is_fatal() {
    let pages: Alloc = PageAllocator::new(ThreadCpu, HostRam::new(PAGES));
    pages.free_page(pa(4));
}

#[test]
fn page_is_free_iff_its_count_is_zero() {
    let pages = booted();
    let a = pages.alloc_page().unwrap().base();
    let b = pages.alloc_page().unwrap().base();
    let c = pages.alloc_page().unwrap().base();
    pages.increment_refcount(b).unwrap();
    pages.free_page(a);
    pages.free_page(b);

    for n in KERNEL_PAGES..PAGES as u64 {
        let page = pa(n);
        assert_eq!(pages.is_free(page), pages.get_refcount(page) == 0, "{page}");
    }
    assert!(!pages.is_free(c));
}
