//! # Virtual Memory
//!
//! Address spaces and software TLB refill for a single-processor MIPS R3000
//! kernel.
//!
//! ## Overview
//!
//! The R3000 has no page tables the hardware could walk. Instead every
//! process owns an [`AddressSpace`] of at most two loader-defined segments
//! plus a fixed 12-page stack, each page backed by its own physical frame
//! from the start. On a TLB miss the trap handler calls
//! [`handle_fault`](fault::handle_fault), which looks the frame up and writes
//! one TLB entry.
//!
//! ```text
//!  trap ──▶ Vm::fault ──▶ AddressSpace::translate ──▶ TlbAccess::write
//!                                                        (first free slot,
//!  exec ──▶ define_region ×2 ─▶ prepare_load ─▶ ...      else random)
//!           ─▶ complete_load ─▶ define_stack
//!  fork ──▶ Vm::copy          exit ──▶ Vm::destroy
//! ```
//!
//! ## Lifecycle
//!
//! | Step | Effect |
//! |------|--------|
//! | [`AddressSpace::new`] | no segments, stack geometry only |
//! | [`define_region`](AddressSpace::define_region) | segment 1, then segment 2 |
//! | [`prepare_load`](AddressSpace::prepare_load) | one zeroed frame per page |
//! | [`complete_load`](AddressSpace::complete_load) | segment 1 becomes read-only |
//! | [`define_stack`](AddressSpace::define_stack) | returns `USERSTACK` |
//! | [`copy`](AddressSpace::copy) | same layout, private copy of every page |
//! | [`destroy`](AddressSpace::destroy) | frames go back to the allocator |
//!
//! [`Vm`] ties the pieces to one frame allocator, TLB and interrupt
//! controller.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod address_space;
mod error;
pub mod fault;
mod vm;

pub use address_space::{AddressSpace, RegionPermissions};
pub use error::{VmError, VmFaultError};
pub use fault::{FaultKind, TlbShootdown};
pub use vm::Vm;
