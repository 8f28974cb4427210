//! # Kernel VM glue
//!
//! Links the Rust VM subsystem into the C kernel. On MIPS this crate exports
//! the `vm_*`, `as_*` and `*_kpages` entry points the rest of the kernel calls,
//! and imports the machine routines the VM needs:
//!
//! | Imported | Used for |
//! |----------|----------|
//! | `ram_stealmem`, `ram_getsize` | boot RAM ([`RamSource`](kernel_alloc::ram::RamSource)) |
//! | `splhigh`, `splx` | interrupt priority ([`InterruptControl`](kernel_sync::InterruptControl)) |
//! | `tlb_read`, `tlb_write`, `tlb_random` | TLB ([`TlbAccess`](kernel_registers::TlbAccess)) |
//! | `curproc_getas` | the current address space |
//! | `kmalloc`, `kfree` | the global allocator |
//! | `putch` | console logging |
//!
//! Errors cross the boundary as errno values, see [`errno`].

#![cfg_attr(not(any(test, doctest)), no_std)]

#[cfg(target_arch = "mips")]
extern crate alloc;

pub mod errno;

#[cfg(target_arch = "mips")]
mod ffi;
#[cfg(target_arch = "mips")]
mod platform;
