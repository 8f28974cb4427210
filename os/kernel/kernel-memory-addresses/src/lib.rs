//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw 32-bit memory addresses used by the MIPS
//! virtual memory code.
//!
//! ## Overview
//!
//! The R3000-class MIPS machines this kernel targets have a 32-bit address
//! space and a single page size of 4 KiB. This crate defines two zero-cost
//! wrappers around `u32` that prevent mixing the two kinds of address at
//! compile time:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | An address as seen by a program (user segments, KSEG0, ...). |
//! | [`PhysicalAddress`] | An address on the physical bus (RAM frames). |
//!
//! Both expose the same page helpers: [`page_base`](VirtualAddress::page_base),
//! [`page_offset`](VirtualAddress::page_offset) and
//! [`is_page_aligned`](VirtualAddress::is_page_aligned), built on the free
//! functions [`align_down`] and [`align_up`].
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0040_1234);
//! assert_eq!(va.page_base(), VirtualAddress::new(0x0040_1000));
//! assert_eq!(va.page_offset(), 0x234);
//!
//! let pa = PhysicalAddress::new(0x0020_3000);
//! assert!(pa.is_page_aligned());
//! assert_eq!(pa.frame_number(), 0x203);
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`
//!   and `Hash`, so they can cross the C ABI unchanged.
//! - All helpers are `const fn`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod page;
mod physical_address;
mod virtual_address;

pub use page::{PAGE_FRAME, PAGE_SHIFT, PAGE_SIZE, align_down, align_up, pages_spanned};
pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;
