use crate::{PageSize, PhysicalAddress, PhysicalPage, align_down, align_up};
use core::fmt;

/// Half-open span `[start, end)` of physical addresses.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct PhysicalRange {
    start: PhysicalAddress,
    end: PhysicalAddress,
}

impl PhysicalRange {
    /// Creates the range `[start, end)`. An `end` below `start` yields an empty range.
    #[inline]
    #[must_use]
    pub const fn new(start: PhysicalAddress, end: PhysicalAddress) -> Self {
        if end.as_u64() < start.as_u64() {
            Self { start, end: start }
        } else {
            Self { start, end }
        }
    }

    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(PhysicalAddress::zero(), PhysicalAddress::zero())
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        self.end
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.as_u64() - self.start.as_u64()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, pa: PhysicalAddress) -> bool {
        pa.as_u64() >= self.start.as_u64() && pa.as_u64() < self.end.as_u64()
    }

    /// Shrinks the range to whole `S` pages: the start is rounded up, the end
    /// is rounded down.
    #[must_use]
    pub const fn page_aligned<S: PageSize>(&self) -> Self {
        let end = align_down(self.end.as_u64(), S::SIZE);
        match align_up(self.start.as_u64(), S::SIZE) {
            Some(start) if start < end => {
                Self::new(PhysicalAddress::new(start), PhysicalAddress::new(end))
            }
            _ => Self::new(PhysicalAddress::new(end), PhysicalAddress::new(end)),
        }
    }

    /// Number of whole `S` pages inside the range.
    #[inline]
    #[must_use]
    pub const fn page_count<S: PageSize>(&self) -> u64 {
        self.page_aligned::<S>().len() >> S::SHIFT
    }

    /// Iterates the whole `S` pages inside the range in ascending order.
    #[must_use]
    pub const fn pages<S: PageSize>(&self) -> Pages<S> {
        let aligned = self.page_aligned::<S>();
        Pages {
            next: PhysicalPage::from_addr(aligned.start),
            remaining: aligned.len() >> S::SHIFT,
        }
    }
}

impl fmt::Debug for PhysicalRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{})", self.start, self.end)
    }
}

/// Iterator returned by [`PhysicalRange::pages`].
#[derive(Clone)]
pub struct Pages<S: PageSize> {
    next: PhysicalPage<S>,
    remaining: u64,
}

impl<S: PageSize> Iterator for Pages<S> {
    type Item = PhysicalPage<S>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let page = self.next;
        self.remaining -= 1;
        if self.remaining > 0 {
            self.next = page.next();
        }
        Some(page)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, usize::try_from(self.remaining).ok())
    }
}
