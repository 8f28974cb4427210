//! CP0 access through the kernel's assembler TLB routines.

use crate::tlb::{EntryHi, EntryLo, TlbAccess};

unsafe extern "C" {
    fn tlb_random(entryhi: u32, entrylo: u32);
    fn tlb_write(entryhi: u32, entrylo: u32, index: u32);
    fn tlb_read(entryhi: *mut u32, entrylo: *mut u32, index: u32);
}

/// The processor's TLB.
pub struct Cp0Tlb;

impl TlbAccess for Cp0Tlb {
    #[allow(clippy::cast_possible_truncation)]
    fn read(&self, index: usize) -> (EntryHi, EntryLo) {
        let (mut hi, mut lo) = (0u32, 0u32);
        unsafe { tlb_read(&raw mut hi, &raw mut lo, index as u32) };
        (EntryHi::from_bits(hi), EntryLo::from_bits(lo))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write(&self, hi: EntryHi, lo: EntryLo, index: usize) {
        unsafe { tlb_write(hi.into_bits(), lo.into_bits(), index as u32) }
    }

    fn write_random(&self, hi: EntryHi, lo: EntryLo) {
        unsafe { tlb_random(hi.into_bits(), lo.into_bits()) }
    }
}
