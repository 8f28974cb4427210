//! # Direct-mapped access to physical memory
//!
//! Rust code can only dereference virtual addresses. On MIPS the kernel sees
//! all of low physical memory through KSEG0, so turning a frame address into a
//! pointer is a constant offset. [`PhysMapper`] abstracts over that offset so
//! the same allocator and address-space code runs against simulated RAM in
//! host tests.
//!
//! ## Example
//! ```rust
//! use kernel_alloc::phys_mapper::{DirectMapPhysMapper, PhysMapper};
//! use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
//!
//! #[repr(C, align(4096))]
//! struct Frame([u8; PAGE_SIZE as usize]);
//!
//! let mut ram = Box::new(Frame([0xAA; PAGE_SIZE as usize]));
//! let frame = PhysicalAddress::new(0x0010_0000);
//! let mapper = DirectMapPhysMapper::for_host_buffer(frame, ram.0.as_mut_ptr());
//! unsafe { mapper.zero_frame(frame) };
//! assert!(ram.0.iter().all(|&b| b == 0));
//! ```

use core::ptr;
use kernel_info::memory::MIPS_KSEG0;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};

/// Contents of one physical frame.
pub type FrameBytes = [u8; PAGE_SIZE as usize];

/// Converts physical addresses to pointers usable by the kernel.
///
/// # Safety
/// Implementations must return pointers that are valid for reads and writes of
/// whole frames for every physical address the allocator manages.
pub unsafe trait PhysMapper {
    /// Kernel-visible pointer to the byte at `pa`.
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8;

    /// View the frame at `frame` as `T`.
    ///
    /// # Safety
    /// - `T` must match the bytes at `frame` and fit inside the mapped range.
    /// - The caller must hold the only live reference to that memory for `'a`.
    unsafe fn phys_to_mut<'a, T>(&self, frame: PhysicalAddress) -> &'a mut T {
        unsafe { &mut *self.phys_to_ptr(frame).cast::<T>() }
    }

    /// Fill the frame at `frame` with zeros.
    ///
    /// # Safety
    /// The caller must own the frame.
    unsafe fn zero_frame(&self, frame: PhysicalAddress) {
        debug_assert!(frame.is_page_aligned());
        unsafe { ptr::write_bytes(self.phys_to_ptr(frame), 0, PAGE_SIZE as usize) }
    }

    /// Copy the frame at `src` over the frame at `dst`.
    ///
    /// # Safety
    /// The caller must own `dst`, and `src` must not be written concurrently.
    unsafe fn copy_frame(&self, dst: PhysicalAddress, src: PhysicalAddress) {
        debug_assert!(dst.is_page_aligned() && src.is_page_aligned());
        debug_assert_ne!(dst, src, "copying a frame onto itself");
        unsafe {
            ptr::copy_nonoverlapping(
                self.phys_to_ptr(src),
                self.phys_to_ptr(dst),
                PAGE_SIZE as usize,
            );
        }
    }
}

/// [`PhysMapper`] for a linear mapping: `ptr = pa + offset`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DirectMapPhysMapper {
    offset: usize,
}

impl DirectMapPhysMapper {
    /// The MIPS KSEG0 window (`0x8000_0000 + pa`).
    pub const KSEG0: Self = Self {
        offset: MIPS_KSEG0 as usize,
    };

    /// Map `phys_base` to the host allocation at `host`.
    ///
    /// Addresses above `phys_base` land at the same distance above `host`.
    #[must_use]
    pub fn for_host_buffer(phys_base: PhysicalAddress, host: *mut u8) -> Self {
        Self {
            offset: host
                .expose_provenance()
                .wrapping_sub(phys_base.as_u32() as usize),
        }
    }
}

unsafe impl PhysMapper for DirectMapPhysMapper {
    #[inline]
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        ptr::with_exposed_provenance_mut((pa.as_u32() as usize).wrapping_add(self.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C, align(4096))]
    struct TwoFrames([FrameBytes; 2]);

    #[test]
    fn kseg0_is_a_fixed_offset() {
        let p = DirectMapPhysMapper::KSEG0.phys_to_ptr(PhysicalAddress::new(0x1234));
        assert_eq!(p as usize, 0x8000_1234);
    }

    #[test]
    fn copy_frame_duplicates_contents() {
        let mut ram = Box::new(TwoFrames([[0; PAGE_SIZE as usize]; 2]));
        ram.0[0][..4].copy_from_slice(b"mips");
        let base = PhysicalAddress::new(0x0040_0000);
        let mapper = DirectMapPhysMapper::for_host_buffer(base, ram.0.as_mut_ptr().cast());

        unsafe { mapper.copy_frame(base.add_frames(1), base) };
        assert_eq!(&ram.0[1][..4], b"mips");

        let view: &mut FrameBytes = unsafe { mapper.phys_to_mut(base.add_frames(1)) };
        view[0] = b'M';
        assert_eq!(&ram.0[1][..4], b"Mips");
    }
}
