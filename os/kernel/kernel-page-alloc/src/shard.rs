//! # Per-CPU free-list shards
//!
//! The free pages are partitioned into `NCPU` [`FreeList`]s, each behind its
//! own spin lock. A CPU allocates from and frees into its own shard, so in
//! the common case no two CPUs ever touch the same lock.
//!
//! When the local shard runs dry, [`ShardSet::alloc`] steals: it visits the
//! other shards in ascending CPU order, locking one at a time, and takes the
//! head of the first non-empty one. At most one shard lock is held at any
//! point, so concurrent stealers cannot deadlock.
//!
//! Pages are always freed into the freeing CPU's shard, whichever shard they
//! came from. Skewed workloads can therefore drain one shard into another;
//! nothing rebalances them.
//!
//! Junk-filling happens outside every shard lock and outside the CPU pin:
//! a freed page is filled before it is pushed, an allocated one after it
//! has been popped. Either way the page is owned by the caller alone.

use crate::free_list::{ALLOC_JUNK, FREED_JUNK, FreeList, Frames};
use crate::layout::FrameIndex;
use crate::phys_mapper::PhysMapper;
use kernel_sync::{CpuIdentity, SpinMutex};
use log::trace;

type Shard = SpinMutex<FreeList>;

/// `NCPU` independently locked free lists.
pub(crate) struct ShardSet<const NCPU: usize> {
    shards: [Shard; NCPU],
}

impl<const NCPU: usize> ShardSet<NCPU> {
    pub(crate) const fn new() -> Self {
        const { assert!(NCPU > 0, "at least one shard is required") };
        Self {
            shards: [const { SpinMutex::new(FreeList::new()) }; NCPU],
        }
    }

    /// # Panics
    /// If the scheduler reports a CPU id outside `0..NCPU`.
    fn home(&self, cpu: usize) -> &Shard {
        self.shards.get(cpu).unwrap_or_else(|| {
            panic!("CPU id {cpu} out of range for {} page allocator shards", NCPU)
        })
    }

    /// Pops a page from the calling CPU's shard, stealing from the others
    /// if it is empty, and fills it with [`ALLOC_JUNK`]. `None` means every
    /// shard is empty.
    pub(crate) fn alloc<C, M, const PAGES: usize>(
        &self,
        cpus: &C,
        frames: &Frames<'_, M, PAGES>,
    ) -> Option<FrameIndex>
    where
        C: CpuIdentity,
        M: PhysMapper,
    {
        let index = self.take(cpus, frames)?;
        frames.fill(index, ALLOC_JUNK);
        Some(index)
    }

    fn take<C, M, const PAGES: usize>(
        &self,
        cpus: &C,
        frames: &Frames<'_, M, PAGES>,
    ) -> Option<FrameIndex>
    where
        C: CpuIdentity,
    {
        let pinned = cpus.pin();
        let cpu = pinned.cpu_id();

        let local = self.home(cpu).lock().pop(frames);
        if local.is_some() {
            return local;
        }

        for (donor, shard) in self.shards.iter().enumerate() {
            if donor == cpu {
                continue;
            }
            let stolen = shard.lock().pop(frames);
            if let Some(index) = stolen {
                trace!("cpu {cpu} stole page {} from shard {donor}", frames.span.page(index));
                return Some(index);
            }
        }

        None
    }

    /// Fills a page with [`FREED_JUNK`] and pushes it onto the calling CPU's
    /// shard.
    pub(crate) fn free<C, M, const PAGES: usize>(
        &self,
        cpus: &C,
        frames: &Frames<'_, M, PAGES>,
        index: FrameIndex,
    ) where
        C: CpuIdentity,
        M: PhysMapper,
    {
        frames.fill(index, FREED_JUNK);
        let pinned = cpus.pin();
        self.home(pinned.cpu_id()).lock().push(frames, index);
    }

    /// Fills a page with [`FREED_JUNK`] and pushes it onto a specific shard.
    /// Used to seed the shards at boot.
    pub(crate) fn seed<M, const PAGES: usize>(
        &self,
        shard: usize,
        frames: &Frames<'_, M, PAGES>,
        index: FrameIndex,
    ) where
        M: PhysMapper,
    {
        frames.fill(index, FREED_JUNK);
        self.shards[shard % NCPU].lock().push(frames, index);
    }

    /// Snapshot of each shard's length. Shards are read one after another,
    /// so the total is only exact when no other CPU is allocating.
    pub(crate) fn lens(&self) -> [usize; NCPU] {
        core::array::from_fn(|i| self.shards[i].lock().len())
    }
}
