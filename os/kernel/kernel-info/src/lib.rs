//! # Kernel Memory Layout
//!
//! This crate is the single source of truth for the layout constants the MIPS
//! virtual memory subsystem relies on. Every other kernel crate reads its
//! geometry from here instead of repeating magic numbers.
//!
//! ## Virtual Address Space Layout
//!
//! The R3000 splits the 32-bit address space into fixed segments. Only KUSEG
//! goes through the TLB; KSEG0 and KSEG1 are hardwired windows onto the first
//! 512 MiB of physical memory.
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │  KUSEG (user, TLB mapped)       │
//!             │    segment 1, segment 2         │
//!             │    ...                          │
//!             │    stack (STACK_PAGES pages)    │
//! USERSTACK   ├─────────────────────────────────┤ 0x8000_0000
//!             │  KSEG0 (kernel, cached,         │
//!             │         direct mapped)          │
//! MIPS_KSEG1  ├─────────────────────────────────┤ 0xa000_0000
//!             │  KSEG1 (kernel, uncached)       │
//! MIPS_KSEG2  ├─────────────────────────────────┤ 0xc000_0000
//!             │  KSEG2 (kernel, TLB mapped)     │
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! The kernel reaches every physical frame through KSEG0, which is why
//! [`memory::paddr_to_kvaddr`] is a plain addition.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
