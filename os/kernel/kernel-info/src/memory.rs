//! # Memory Layout

use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress};

/// Base of the cached, direct-mapped kernel segment.
pub const MIPS_KSEG0: u32 = 0x8000_0000;

/// Base of the uncached, direct-mapped kernel segment.
pub const MIPS_KSEG1: u32 = 0xa000_0000;

/// Base of the TLB-mapped kernel segment.
pub const MIPS_KSEG2: u32 = 0xc000_0000;

/// End of the user address range (exclusive).
pub const USERSPACE_TOP: u32 = MIPS_KSEG0;

/// Initial user stack pointer; the stack grows down from here.
pub const USERSTACK: u32 = USERSPACE_TOP;

/// Number of pages preallocated for every user stack (48 KiB).
pub const STACK_PAGES: u32 = 12;

/// Lowest address of the user stack region.
pub const USERSTACK_BASE: u32 = USERSTACK - STACK_PAGES * PAGE_SIZE;

const _: () = {
    assert!(USERSTACK.is_multiple_of(PAGE_SIZE));
    assert!(MIPS_KSEG1 - MIPS_KSEG0 == 0x2000_0000);
    assert!(USERSTACK_BASE < USERSTACK);
};

/// Kernel (KSEG0) virtual address of a physical address.
///
/// Only valid for physical addresses below 512 MiB.
#[inline]
#[must_use]
pub const fn paddr_to_kvaddr(pa: PhysicalAddress) -> VirtualAddress {
    VirtualAddress::new(pa.as_u32() + MIPS_KSEG0)
}

/// Physical address behind a KSEG0 virtual address.
#[inline]
#[must_use]
pub const fn kvaddr_to_paddr(va: VirtualAddress) -> PhysicalAddress {
    PhysicalAddress::new(va.as_u32() - MIPS_KSEG0)
}

/// Whether `va` lies inside KSEG0.
#[inline]
#[must_use]
pub const fn is_kseg0(va: VirtualAddress) -> bool {
    va.as_u32() >= MIPS_KSEG0 && va.as_u32() < MIPS_KSEG1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kseg0_conversion_is_an_offset() {
        let pa = PhysicalAddress::new(0x0012_3000);
        let va = paddr_to_kvaddr(pa);
        assert_eq!(va.as_u32(), 0x8012_3000);
        assert!(is_kseg0(va));
        assert_eq!(kvaddr_to_paddr(va), pa);
    }

    #[test]
    fn stack_sits_right_below_kseg0() {
        assert_eq!(USERSTACK, 0x8000_0000);
        assert_eq!(USERSTACK_BASE, 0x7FFF_4000);
        assert!(!is_kseg0(VirtualAddress::new(USERSTACK_BASE)));
    }
}
