use bitfield_struct::bitfield;
use kernel_info::memory::MIPS_KSEG0;
use kernel_memory_addresses::{PAGE_SHIFT, PhysicalAddress, VirtualAddress};

/// Number of TLB slots.
pub const NUM_TLB: usize = 64;

/// Slots below this index are never chosen by `tlbwr`.
pub const TLB_WIRED: usize = 8;

const _: () = assert!(TLB_WIRED < NUM_TLB);

/// `EntryHi` — the virtual side of a TLB entry (R3000 layout).
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct EntryHi {
    /// Bits 0–5 — Reserved.
    #[bits(6)]
    __: u8,

    /// Bits 6–11 — Address space identifier. Always 0 here; the kernel flushes
    /// the whole TLB on every address-space switch instead of tagging entries.
    #[bits(6)]
    pub pid: u8,

    /// Bits 12–31 — Virtual page number.
    #[bits(20)]
    vpn: u32,
}

impl EntryHi {
    /// Entry for the page containing `va`.
    #[must_use]
    pub fn for_page(va: VirtualAddress) -> Self {
        Self::new().with_vpn(va.page_number())
    }

    /// Placeholder for slot `index` that can never match a user access.
    ///
    /// The page lies in KSEG0, which bypasses the TLB; using a distinct page per
    /// slot keeps the hardware from seeing duplicate entries.
    #[must_use]
    pub fn invalid(index: usize) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let index = index as u32;
        Self::new().with_vpn((MIPS_KSEG0 >> PAGE_SHIFT) + index)
    }

    /// Base address of the mapped virtual page.
    #[must_use]
    pub fn page(&self) -> VirtualAddress {
        VirtualAddress::new(self.vpn() << PAGE_SHIFT)
    }

    #[must_use]
    pub fn matches(&self, va: VirtualAddress) -> bool {
        self.vpn() == va.page_number()
    }
}

/// `EntryLo` — the physical side of a TLB entry (R3000 layout).
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct EntryLo {
    /// Bits 0–7 — Reserved.
    #[bits(8)]
    __: u8,

    /// Bit 8 — G: match regardless of PID.
    pub global: bool,

    /// Bit 9 — V: the entry translates; an access through a clear V raises a
    /// TLB miss.
    pub valid: bool,

    /// Bit 10 — D: writes are allowed. Despite the name this is a write-enable;
    /// a store through a clear D raises a TLB modify exception.
    pub dirty: bool,

    /// Bit 11 — N: uncached.
    pub nocache: bool,

    /// Bits 12–31 — Physical frame number.
    #[bits(20)]
    pfn: u32,
}

impl EntryLo {
    /// Valid translation to `frame`; writable if `writable`.
    #[must_use]
    pub fn mapping(frame: PhysicalAddress, writable: bool) -> Self {
        debug_assert!(frame.is_page_aligned(), "TLB frame {frame} not page aligned");
        Self::new()
            .with_pfn(frame.frame_number())
            .with_valid(true)
            .with_dirty(writable)
    }

    /// The all-zero, non-translating entry.
    #[must_use]
    pub fn invalid() -> Self {
        Self::new()
    }

    #[must_use]
    pub fn frame(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.pfn() << PAGE_SHIFT)
    }
}

/// Programming interface of the TLB.
///
/// All methods take `&self`: the TLB is a per-processor hardware resource, not
/// something a Rust value owns. Callers must keep interrupts raised around any
/// read-modify-write sequence (see `kernel_sync::SplGuard`).
pub trait TlbAccess {
    /// Read slot `index` (`tlbr`).
    fn read(&self, index: usize) -> (EntryHi, EntryLo);

    /// Write slot `index` (`tlbwi`).
    fn write(&self, hi: EntryHi, lo: EntryLo, index: usize);

    /// Write the slot selected by the `Random` register (`tlbwr`).
    fn write_random(&self, hi: EntryHi, lo: EntryLo);

    /// Number of slots.
    fn slot_count(&self) -> usize {
        NUM_TLB
    }

    /// Overwrite every slot with a non-matching placeholder.
    fn invalidate_all(&self) {
        for i in 0..self.slot_count() {
            self.write(EntryHi::invalid(i), EntryLo::invalid(), i);
        }
    }
}

/// CP0 exception causes that report a TLB fault.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TlbException {
    /// `Mod` (code 1): store through a valid entry whose D bit is clear.
    Modify,
    /// `TLBL` (code 2): no valid entry for a load or instruction fetch.
    LoadMiss,
    /// `TLBS` (code 3): no valid entry for a store.
    StoreMiss,
}

impl TlbException {
    /// Decode the `ExcCode` field of the CP0 `Cause` register.
    #[must_use]
    pub const fn from_cause_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Modify),
            2 => Some(Self::LoadMiss),
            3 => Some(Self::StoreMiss),
            _ => None,
        }
    }
}
