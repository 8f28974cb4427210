use crate::tlb::{EntryHi, EntryLo, NUM_TLB, TLB_WIRED, TlbAccess, TlbException};
use core::sync::atomic::{AtomicUsize, Ordering};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_sync::SpinLock;

/// Software model of the R3000 TLB.
///
/// Behaves like the hardware as far as the VM code can observe: indexed reads
/// and writes, and a `Random` register that counts down from `NUM_TLB - 1` to
/// [`TLB_WIRED`] and wraps. [`translate`](Self::translate) performs the lookup
/// the CPU would do on a load or store and reports the exception it would
/// raise.
pub struct SoftTlb {
    slots: SpinLock<[(EntryHi, EntryLo); NUM_TLB]>,
    random: AtomicUsize,
}

impl Default for SoftTlb {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftTlb {
    /// A TLB in its post-flush state: every slot holds its invalid placeholder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SpinLock::new(core::array::from_fn(|i| {
                (EntryHi::invalid(i), EntryLo::invalid())
            })),
            random: AtomicUsize::new(NUM_TLB - 1),
        }
    }

    /// Look up `va` the way the CPU does for a load (`write == false`) or a store.
    ///
    /// # Errors
    /// The exception the access would raise.
    pub fn translate(&self, va: VirtualAddress, write: bool) -> Result<PhysicalAddress, TlbException> {
        let slots = self.slots.lock();
        let Some((_, lo)) = slots
            .iter()
            .find(|(hi, lo)| lo.valid() && hi.matches(va))
        else {
            return Err(if write {
                TlbException::StoreMiss
            } else {
                TlbException::LoadMiss
            });
        };
        if write && !lo.dirty() {
            return Err(TlbException::Modify);
        }
        Ok(lo.frame() + va.page_offset())
    }

    /// Index of the valid slot mapping `va`, if any (`tlbp`).
    pub fn probe(&self, va: VirtualAddress) -> Option<usize> {
        self.slots
            .lock()
            .iter()
            .position(|(hi, lo)| lo.valid() && hi.matches(va))
    }

    /// Number of slots holding a valid translation.
    pub fn valid_count(&self) -> usize {
        self.slots.lock().iter().filter(|(_, lo)| lo.valid()).count()
    }

    /// Slot index the next [`write_random`](TlbAccess::write_random) will use.
    pub fn next_random(&self) -> usize {
        self.random.load(Ordering::Relaxed)
    }

    fn advance_random(&self) -> usize {
        let step = |cur: usize| Some(if cur <= TLB_WIRED { NUM_TLB - 1 } else { cur - 1 });
        match self
            .random
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, step)
        {
            Ok(prev) | Err(prev) => prev,
        }
    }
}

impl TlbAccess for SoftTlb {
    fn read(&self, index: usize) -> (EntryHi, EntryLo) {
        self.slots.lock()[index]
    }

    fn write(&self, hi: EntryHi, lo: EntryLo, index: usize) {
        self.slots.lock()[index] = (hi, lo);
    }

    fn write_random(&self, hi: EntryHi, lo: EntryLo) {
        let index = self.advance_random();
        self.slots.lock()[index] = (hi, lo);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VA: VirtualAddress = VirtualAddress::new(0x0040_0000);
    const PA: PhysicalAddress = PhysicalAddress::new(0x0010_0000);

    #[test]
    fn fresh_tlb_misses_everything() {
        let tlb = SoftTlb::new();
        assert_eq!(tlb.valid_count(), 0);
        assert_eq!(tlb.translate(VA, false), Err(TlbException::LoadMiss));
        assert_eq!(tlb.translate(VA, true), Err(TlbException::StoreMiss));
    }

    #[test]
    fn clean_entry_traps_stores_only() {
        let tlb = SoftTlb::new();
        tlb.write(EntryHi::for_page(VA), EntryLo::mapping(PA, false), 3);
        assert_eq!(tlb.translate(VA + 0x10, false), Ok(PA + 0x10));
        assert_eq!(tlb.translate(VA, true), Err(TlbException::Modify));
        assert_eq!(tlb.probe(VA), Some(3));
    }

    #[test]
    fn random_register_skips_wired_slots_and_wraps() {
        let tlb = SoftTlb::new();
        let hi = EntryHi::for_page(VA);
        let lo = EntryLo::mapping(PA, true);

        let mut used = Vec::new();
        for _ in 0..(NUM_TLB - TLB_WIRED + 1) {
            used.push(tlb.next_random());
            tlb.write_random(hi, lo);
        }
        assert_eq!(used[0], NUM_TLB - 1);
        assert_eq!(used[NUM_TLB - TLB_WIRED - 1], TLB_WIRED);
        assert_eq!(used[NUM_TLB - TLB_WIRED], NUM_TLB - 1);
        assert!(used.iter().all(|&i| i >= TLB_WIRED));
    }

    #[test]
    fn invalidate_all_resets_every_slot() {
        let tlb = SoftTlb::new();
        for i in 0..4 {
            tlb.write(EntryHi::for_page(VA + i * 0x1000), EntryLo::mapping(PA, true), i as usize);
        }
        assert_eq!(tlb.valid_count(), 4);
        tlb.invalidate_all();
        assert_eq!(tlb.valid_count(), 0);
        assert_eq!(tlb.read(2), (EntryHi::invalid(2), EntryLo::invalid()));
    }
}
