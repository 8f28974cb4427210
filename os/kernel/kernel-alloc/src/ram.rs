//! Boot-time view of physical RAM.
//!
//! Before the coremap exists the only way to obtain memory is to carve frames
//! off the bottom of the unclaimed RAM range. Frames taken that way are gone
//! for good: the coremap is built over whatever is left afterwards.

use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};

/// Source of unmanaged physical RAM.
pub trait RamSource {
    /// Take `npages` contiguous frames from the bottom of the free range.
    ///
    /// Returns `None` when the range is exhausted or `npages` is zero.
    fn steal_pages(&mut self, npages: u32) -> Option<PhysicalAddress>;

    /// The unclaimed range as `(first, last)`, where `last` is exclusive.
    /// Nothing is claimed; a source may latch the range on the first call.
    fn remaining_range(&mut self) -> (PhysicalAddress, PhysicalAddress);

    /// Hand out everything that is left, as [`remaining_range`] reports it.
    /// The source is empty afterwards.
    ///
    /// [`remaining_range`]: Self::remaining_range
    fn take_remaining(&mut self) -> (PhysicalAddress, PhysicalAddress);
}

/// A `[first, last)` physical range handed over by the boot loader.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BootRam {
    first: PhysicalAddress,
    last: PhysicalAddress,
}

impl BootRam {
    #[must_use]
    pub const fn new(first: PhysicalAddress, last: PhysicalAddress) -> Self {
        Self { first, last }
    }

    /// Bytes not yet claimed.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.last.as_u32().saturating_sub(self.first.as_u32())
    }
}

impl RamSource for BootRam {
    fn steal_pages(&mut self, npages: u32) -> Option<PhysicalAddress> {
        if npages == 0 {
            return None;
        }
        let size = npages.checked_mul(PAGE_SIZE)?;
        if size > self.remaining() {
            return None;
        }
        let pa = self.first;
        self.first += size;
        Some(pa)
    }

    fn remaining_range(&mut self) -> (PhysicalAddress, PhysicalAddress) {
        (self.first, self.last)
    }

    fn take_remaining(&mut self) -> (PhysicalAddress, PhysicalAddress) {
        let range = self.remaining_range();
        self.first = PhysicalAddress::zero();
        self.last = PhysicalAddress::zero();
        range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steal_is_a_bump() {
        let mut ram = BootRam::new(PhysicalAddress::new(0x1000), PhysicalAddress::new(0x5000));
        assert_eq!(ram.steal_pages(1), Some(PhysicalAddress::new(0x1000)));
        assert_eq!(ram.steal_pages(2), Some(PhysicalAddress::new(0x2000)));
        assert_eq!(ram.steal_pages(2), None);
        assert_eq!(ram.steal_pages(0), None);
        assert_eq!(ram.steal_pages(1), Some(PhysicalAddress::new(0x4000)));
        assert_eq!(ram.remaining(), 0);
    }

    #[test]
    fn take_remaining_empties_the_source() {
        let mut ram = BootRam::new(PhysicalAddress::new(0x1000), PhysicalAddress::new(0x9000));
        ram.steal_pages(3);
        assert_eq!(
            ram.remaining_range(),
            (PhysicalAddress::new(0x4000), PhysicalAddress::new(0x9000))
        );
        assert_eq!(
            ram.take_remaining(),
            (PhysicalAddress::new(0x4000), PhysicalAddress::new(0x9000))
        );
        assert_eq!(ram.remaining(), 0);
        assert_eq!(ram.steal_pages(1), None);
    }
}
