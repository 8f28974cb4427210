//! # MIPS coprocessor 0 TLB registers
//!
//! The R3000 has no hardware page-table walker. Every TLB miss traps into the
//! kernel, which writes a translation into one of the [`NUM_TLB`] slots by
//! loading the `EntryHi` and `EntryLo` registers of coprocessor 0 and issuing
//! `tlbwi` (indexed write) or `tlbwr` (write to the slot named by the `Random`
//! register).
//!
//! This crate provides:
//!
//! * [`EntryHi`] / [`EntryLo`]: typed register images (`bitfield-struct`);
//! * [`TlbAccess`]: the seam the VM code programs the TLB through;
//! * [`TlbException`]: the CP0 exception codes that report TLB faults;
//! * [`SoftTlb`] (feature `soft`): a software model of the TLB;
//! * [`Cp0Tlb`] (feature `cp0`, mips only): the real hardware.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(all(feature = "cp0", target_arch = "mips"))]
mod cp0;
#[cfg(feature = "soft")]
mod soft;
mod tlb;

#[cfg(all(feature = "cp0", target_arch = "mips"))]
pub use cp0::Cp0Tlb;
#[cfg(feature = "soft")]
pub use soft::SoftTlb;
pub use tlb::{EntryHi, EntryLo, NUM_TLB, TLB_WIRED, TlbAccess, TlbException};
