//! # TLB refill
//!
//! The R3000 traps on every TLB miss. [`handle_fault`] finds the frame behind
//! the faulting address in the current [`AddressSpace`] and writes a
//! translation into the TLB: the first invalid slot if there is one, otherwise
//! the slot the `Random` register picks.
//!
//! The TLB is never shared between address spaces. [`activate`] simply
//! invalidates every slot, so no per-process identifiers are needed and
//! cross-processor shootdowns are not supported.

use crate::address_space::{AddressSpace, RegionKind};
use crate::error::VmFaultError;
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::{EntryHi, EntryLo, TlbAccess, TlbException};
use kernel_sync::{InterruptControl, SplGuard};
use log::debug;

/// What the faulting access tried to do.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(i32)]
pub enum FaultKind {
    /// Load from an unmapped page.
    Read = 0,
    /// Store to an unmapped page.
    Write = 1,
    /// Store through a read-only (clean) mapping.
    ReadOnly = 2,
}

impl TryFrom<i32> for FaultKind {
    type Error = VmFaultError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Read),
            1 => Ok(Self::Write),
            2 => Ok(Self::ReadOnly),
            _ => Err(VmFaultError::InvalidFaultKind(raw)),
        }
    }
}

impl From<TlbException> for FaultKind {
    fn from(e: TlbException) -> Self {
        match e {
            TlbException::Modify => Self::ReadOnly,
            TlbException::LoadMiss => Self::Read,
            TlbException::StoreMiss => Self::Write,
        }
    }
}

/// Opaque request to invalidate a translation on another processor.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(C)]
pub struct TlbShootdown {
    pub va: VirtualAddress,
}

/// Resolve a TLB fault at `fault_address` against `space`.
///
/// # Errors
/// - [`VmFaultError::ReadOnly`] for stores through a read-only mapping.
/// - [`VmFaultError::NoAddressSpace`] if there is no current address space
///   (a kernel thread faulted on a user address).
/// - [`VmFaultError::OutOfRange`] if no region contains the address.
///
/// Segments need not both be defined: a program with a single segment faults
/// like any other, and addresses where the missing segment would be are
/// simply out of range.
///
/// # Panics
/// If `space` has a defined region that is not backed by frames.
pub fn handle_fault<T, I>(
    tlb: &T,
    irq: &I,
    space: Option<&AddressSpace>,
    kind: FaultKind,
    fault_address: VirtualAddress,
) -> Result<(), VmFaultError>
where
    T: TlbAccess + ?Sized,
    I: InterruptControl,
{
    let page = fault_address.page_base();
    debug!(target: "vm", "fault: {fault_address} ({kind:?})");

    if kind == FaultKind::ReadOnly {
        return Err(VmFaultError::ReadOnly(fault_address));
    }
    let space = space.ok_or(VmFaultError::NoAddressSpace)?;
    assert!(space.is_backed(), "fault on an address space that is not loaded");

    let translation = space
        .translate(page)
        .ok_or(VmFaultError::OutOfRange(fault_address))?;
    let writable =
        !(translation.kind == RegionKind::Segment1 && space.is_loaded_readonly());

    let hi = EntryHi::for_page(page);
    let lo = EntryLo::mapping(translation.frame, writable);

    let _spl = SplGuard::raise(irq);
    let free_slot = (0..tlb.slot_count()).find(|&i| !tlb.read(i).1.valid());
    if let Some(slot) = free_slot {
        debug!(target: "vm", "{page} -> {} in slot {slot}", translation.frame);
        tlb.write(hi, lo, slot);
    } else {
        debug!(target: "vm", "{page} -> {} in random slot", translation.frame);
        tlb.write_random(hi, lo);
    }
    Ok(())
}

/// Make `space` the current address space on this processor.
///
/// Invalidates every TLB slot. Does nothing for kernel threads, which have no
/// address space and keep whatever the TLB holds.
pub fn activate<T, I>(tlb: &T, irq: &I, space: Option<&AddressSpace>)
where
    T: TlbAccess + ?Sized,
    I: InterruptControl,
{
    if space.is_none() {
        return;
    }
    let _spl = SplGuard::raise(irq);
    tlb.invalidate_all();
}

/// Counterpart of [`activate`]; nothing to undo.
pub const fn deactivate() {}

/// # Panics
/// Always. Only a single processor is supported.
pub fn tlb_shootdown_all() -> ! {
    panic!("tried to do tlb shootdown on a single-processor VM");
}

/// # Panics
/// Always. Only a single processor is supported.
pub fn tlb_shootdown(request: &TlbShootdown) -> ! {
    panic!("tried to do tlb shootdown for {} on a single-processor VM", request.va);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_fault_kinds() {
        assert_eq!(FaultKind::try_from(0), Ok(FaultKind::Read));
        assert_eq!(FaultKind::try_from(1), Ok(FaultKind::Write));
        assert_eq!(FaultKind::try_from(2), Ok(FaultKind::ReadOnly));
        assert_eq!(
            FaultKind::try_from(3),
            Err(VmFaultError::InvalidFaultKind(3))
        );
        assert_eq!(
            FaultKind::try_from(-1),
            Err(VmFaultError::InvalidFaultKind(-1))
        );
        assert_eq!(FaultKind::Write as i32, 1);
    }

    #[test]
    fn exceptions_map_to_fault_kinds() {
        assert_eq!(FaultKind::from(TlbException::Modify), FaultKind::ReadOnly);
        assert_eq!(FaultKind::from(TlbException::LoadMiss), FaultKind::Read);
        assert_eq!(FaultKind::from(TlbException::StoreMiss), FaultKind::Write);
    }

    #[test]
    #[should_panic(expected = "tlb shootdown")]
    fn shootdown_all_is_fatal() {
        tlb_shootdown_all();
    }

    #[test]
    #[should_panic(expected = "tlb shootdown")]
    fn shootdown_is_fatal() {
        tlb_shootdown(&TlbShootdown {
            va: VirtualAddress::new(0x0040_0000),
        });
    }
}
