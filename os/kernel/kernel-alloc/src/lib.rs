//! # Physical Memory Allocation
//!
//! Frame-level memory management for the MIPS kernel.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            FrameAllocator                    │
//! │  Bootstrapping(RamSource) ─▶ Ready(Coremap)  │
//! │  locked with interrupts raised               │
//! └──────────────┬───────────────────────────────┘
//!                │ zero / copy frames
//! ┌──────────────▼───────────────────────────────┐
//! │            PhysMapper                        │
//! │  KSEG0 direct map, or a host buffer in tests │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Components
//!
//! * [`ram`]: the boot RAM range and the bump allocator used before the
//!   coremap exists.
//! * [`coremap`]: per-frame run tags and first-fit allocation with release.
//! * [`frame_alloc`]: the two-state allocator the rest of the kernel talks to.
//! * [`phys_mapper`]: turns physical addresses into usable pointers.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::FrameAlloc;
//! use kernel_alloc::frame_alloc::FrameAllocator;
//! use kernel_alloc::phys_mapper::DirectMapPhysMapper;
//! use kernel_alloc::ram::BootRam;
//! use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
//! use kernel_sync::SoftInterrupts;
//!
//! #[repr(C, align(4096))]
//! struct Frame([u8; PAGE_SIZE as usize]);
//!
//! let ram: &'static mut [Frame] =
//!     Vec::leak((0..16).map(|_| Frame([0; PAGE_SIZE as usize])).collect());
//! let first = PhysicalAddress::new(0x0010_0000);
//! let mapper = DirectMapPhysMapper::for_host_buffer(first, ram.as_mut_ptr().cast());
//! let alloc = unsafe {
//!     FrameAllocator::new(BootRam::new(first, first.add_frames(16)), mapper, SoftInterrupts::new())
//! };
//!
//! let stats = alloc.bootstrap().unwrap();
//! let run = alloc.alloc_frames(3).unwrap();
//! assert_eq!(run, stats.base);
//! assert_eq!(alloc.free_frames(run), Ok(3));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod coremap;
mod error;
pub mod frame_alloc;
pub mod phys_mapper;
pub mod ram;

pub use error::FrameAllocError;
use kernel_memory_addresses::PhysicalAddress;
use phys_mapper::PhysMapper;

/// Allocation of contiguous physical frames.
///
/// The address space code is written against this trait so it can run over
/// the kernel's [`FrameAllocator`](frame_alloc::FrameAllocator) or anything
/// else that hands out frames.
pub trait FrameAlloc {
    type Mapper: PhysMapper;

    /// Allocate `npages` contiguous frames; `None` when out of memory.
    fn alloc_frames(&self, npages: usize) -> Option<PhysicalAddress>;

    /// Release the run that starts at `pa`, returning its length in frames.
    ///
    /// # Errors
    /// See [`FrameAllocError`].
    fn free_frames(&self, pa: PhysicalAddress) -> Result<usize, FrameAllocError>;

    /// Mapper through which the allocated frames can be accessed.
    fn mapper(&self) -> &Self::Mapper;
}
