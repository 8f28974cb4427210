//! # User address space
//!
//! A process sees at most three regions:
//!
//! ```text
//! 0x8000_0000 ┌──────────────────────┐ USERSTACK
//!             │ stack (12 pages)     │ grows down
//! 0x7FFF_4000 ├──────────────────────┤
//!             │          ...         │
//!             ├──────────────────────┤
//!             │ segment 2 (data)     │
//!             ├──────────────────────┤
//!             │ segment 1 (text)     │
//!             └──────────────────────┘
//! ```
//!
//! The two segments are declared by the ELF loader through
//! [`define_region`](AddressSpace::define_region); the stack geometry is fixed.
//! [`prepare_load`](AddressSpace::prepare_load) backs every page with a zeroed
//! frame up front. Nothing is demand-paged: once loaded, the TLB fault handler
//! only has to look up the frame behind an address.

use crate::error::VmError;
use alloc::vec::Vec;
use core::fmt;
use kernel_alloc::FrameAlloc;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_info::memory::{STACK_PAGES, USERSTACK, USERSTACK_BASE};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress, pages_spanned};
use log::{debug, warn};

/// Access rights the loader asked for. Recorded only; the TLB cannot express
/// anything but "writable or not".
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct RegionPermissions {
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

impl RegionPermissions {
    #[must_use]
    pub const fn new(readable: bool, writable: bool, executable: bool) -> Self {
        Self {
            readable,
            writable,
            executable,
        }
    }
}

/// A page-aligned run of virtual pages and the frame behind each of them.
pub struct Region {
    base: VirtualAddress,
    npages: u32,
    frames: Vec<PhysicalAddress>,
}

impl Region {
    const fn new(base: VirtualAddress, npages: u32) -> Self {
        Self {
            base,
            npages,
            frames: Vec::new(),
        }
    }

    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        self.base
    }

    #[must_use]
    pub const fn npages(&self) -> u32 {
        self.npages
    }

    /// Frames backing the region, one per page, in page order.
    #[must_use]
    pub fn frames(&self) -> &[PhysicalAddress] {
        &self.frames
    }

    /// Whether every page has a frame.
    #[must_use]
    pub fn is_backed(&self) -> bool {
        self.frames.len() == self.npages as usize
    }

    /// Page index of `va` within the region.
    #[must_use]
    pub fn page_index(&self, va: VirtualAddress) -> Option<usize> {
        va.page_number()
            .checked_sub(self.base.page_number())
            .filter(|&i| i < self.npages)
            .map(|i| i as usize)
    }

    #[must_use]
    pub fn contains(&self, va: VirtualAddress) -> bool {
        self.page_index(va).is_some()
    }

    /// Frame behind the page containing `va`.
    #[must_use]
    pub fn frame_for(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.page_index(va)
            .and_then(|i| self.frames.get(i))
            .copied()
    }

    /// Same geometry, no frames.
    const fn empty_like(&self) -> Self {
        Self::new(self.base, self.npages)
    }

    /// Give every page its own zeroed frame.
    ///
    /// Frames obtained before a failure stay recorded so that releasing the
    /// region returns them.
    fn back<A: FrameAlloc>(&mut self, frames: &A) -> Result<(), VmError> {
        assert!(
            self.frames.is_empty(),
            "region at {} is already backed",
            self.base
        );
        self.frames
            .try_reserve_exact(self.npages as usize)
            .map_err(|_| VmError::OutOfMemory)?;

        for _ in 0..self.npages {
            let pa = frames.alloc_frames(1).ok_or(VmError::OutOfMemory)?;
            // Safety: the frame was just handed to us.
            unsafe { frames.mapper().zero_frame(pa) };
            self.frames.push(pa);
        }
        Ok(())
    }

    /// Return every frame to the allocator. Reports the first failed release.
    fn release<A: FrameAlloc>(&mut self, frames: &A) -> Result<(), VmError> {
        let mut result = Ok(());
        for pa in self.frames.drain(..) {
            match frames.free_frames(pa) {
                Ok(n) => debug_assert_eq!(n, 1, "page frame {pa} was part of a larger run"),
                Err(e) if result.is_ok() => result = Err(e.into()),
                Err(_) => {}
            }
        }
        result
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("base", &self.base)
            .field("npages", &self.npages)
            .field("backed", &self.frames.len())
            .finish()
    }
}

/// A loader-defined region.
#[derive(Debug)]
pub struct Segment {
    region: Region,
    permissions: RegionPermissions,
}

impl Segment {
    #[must_use]
    pub const fn region(&self) -> &Region {
        &self.region
    }

    #[must_use]
    pub const fn permissions(&self) -> RegionPermissions {
        self.permissions
    }
}

/// Which region an address belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegionKind {
    Segment1,
    Stack,
    Segment2,
}

/// Result of looking up a user address.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Translation {
    pub kind: RegionKind,
    /// Frame behind the page.
    pub frame: PhysicalAddress,
}

/// The memory of one process.
#[derive(Debug)]
pub struct AddressSpace {
    seg1: Option<Segment>,
    seg2: Option<Segment>,
    stack: Region,
    loaded_readonly: bool,
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace {
    /// An empty address space: no segments, unbacked stack.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seg1: None,
            seg2: None,
            stack: Region::new(VirtualAddress::new(USERSTACK_BASE), STACK_PAGES),
            loaded_readonly: false,
        }
    }

    #[must_use]
    pub const fn segment1(&self) -> Option<&Segment> {
        self.seg1.as_ref()
    }

    #[must_use]
    pub const fn segment2(&self) -> Option<&Segment> {
        self.seg2.as_ref()
    }

    #[must_use]
    pub const fn stack(&self) -> &Region {
        &self.stack
    }

    /// Whether loading has completed and segment 1 is mapped read-only.
    #[must_use]
    pub const fn is_loaded_readonly(&self) -> bool {
        self.loaded_readonly
    }

    /// Declare the region `[vaddr, vaddr + size)`.
    ///
    /// The start is rounded down and the end up to page boundaries. The first
    /// call defines segment 1, the second segment 2.
    ///
    /// # Errors
    /// Nothing changes on error.
    /// - [`VmError::TooManyRegions`] if both segments exist.
    /// - [`VmError::RegionTooLarge`] if the region would end above the stack.
    pub fn define_region(
        &mut self,
        vaddr: VirtualAddress,
        size: u32,
        permissions: RegionPermissions,
    ) -> Result<(), VmError> {
        let slot = if self.seg1.is_none() {
            &mut self.seg1
        } else if self.seg2.is_none() {
            &mut self.seg2
        } else {
            warn!(target: "vm", "too many regions: {vaddr} + {size:#x} ignored");
            return Err(VmError::TooManyRegions);
        };

        let base = vaddr.page_base();
        let npages = pages_spanned(vaddr.as_u32(), size)
            .filter(|&n| {
                USERSTACK_BASE
                    .checked_sub(base.as_u32())
                    .is_some_and(|room| n <= room / PAGE_SIZE)
            })
            .ok_or(VmError::RegionTooLarge { base: vaddr, size })?;

        let region = Region::new(base, npages);
        debug!(
            target: "vm",
            "region {} pages at {} ({permissions:?})",
            region.npages,
            region.base
        );
        *slot = Some(Segment {
            region,
            permissions,
        });
        Ok(())
    }

    /// Back segment 1, segment 2 and the stack with zeroed frames, in that
    /// order.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`] on the first frame or heap shortage. Frames
    /// obtained so far stay owned by the address space; [`destroy`](Self::destroy)
    /// returns them.
    ///
    /// # Panics
    /// If any region is already backed.
    pub fn prepare_load<A: FrameAlloc>(&mut self, frames: &A) -> Result<(), VmError> {
        for region in self.regions_mut() {
            region.back(frames)?;
        }
        Ok(())
    }

    /// Mark loading as finished. From now on segment 1 is mapped without
    /// write permission.
    pub const fn complete_load(&mut self) {
        self.loaded_readonly = true;
    }

    /// The initial user stack pointer.
    ///
    /// # Panics
    /// If the stack has not been backed by [`prepare_load`](Self::prepare_load).
    #[must_use]
    pub fn define_stack(&self) -> VirtualAddress {
        assert!(self.stack.is_backed(), "user stack is not backed");
        VirtualAddress::new(USERSTACK)
    }

    /// A new address space with the same geometry and a private copy of every
    /// page.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`]; the partial copy is torn down first.
    pub fn copy<A: FrameAlloc>(&self, frames: &A) -> Result<Self, VmError> {
        let mut new = Self {
            seg1: self.seg1.as_ref().map(Segment::empty_like),
            seg2: self.seg2.as_ref().map(Segment::empty_like),
            stack: self.stack.empty_like(),
            loaded_readonly: self.loaded_readonly,
        };

        if let Err(e) = new.prepare_load(frames) {
            // Release errors cannot happen for frames we just allocated.
            let _ = new.destroy(frames);
            return Err(e);
        }

        let mapper = frames.mapper();
        for (dst, src) in new.regions().zip(self.regions()) {
            for (&to, &from) in dst.frames.iter().zip(&src.frames) {
                // Safety: `to` is fresh and `from` belongs to `self`, which we
                // borrow for the whole copy.
                unsafe { mapper.copy_frame(to, from) };
            }
        }
        Ok(new)
    }

    /// Release every owned frame and drop the address space.
    ///
    /// # Errors
    /// The first frame release the allocator rejected. All other frames are
    /// still released.
    pub fn destroy<A: FrameAlloc>(mut self, frames: &A) -> Result<(), VmError> {
        let mut result = Ok(());
        for region in self.regions_mut() {
            let r = region.release(frames);
            if result.is_ok() {
                result = r;
            }
        }
        result
    }

    /// Find the region and frame behind `va`.
    ///
    /// Regions are searched as segment 1, stack, segment 2.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<Translation> {
        let candidates = [
            (RegionKind::Segment1, self.seg1.as_ref().map(Segment::region)),
            (RegionKind::Stack, Some(&self.stack)),
            (RegionKind::Segment2, self.seg2.as_ref().map(Segment::region)),
        ];
        let (kind, region) = candidates
            .into_iter()
            .find_map(|(kind, region)| region.filter(|r| r.contains(va)).map(|r| (kind, r)))?;
        region
            .frame_for(va)
            .map(|frame| Translation { kind, frame })
    }

    /// Whether every defined region has all of its frames.
    #[must_use]
    pub fn is_backed(&self) -> bool {
        self.regions().all(Region::is_backed)
    }

    fn regions(&self) -> impl Iterator<Item = &Region> {
        self.seg1
            .iter()
            .chain(&self.seg2)
            .map(Segment::region)
            .chain(core::iter::once(&self.stack))
    }

    fn regions_mut(&mut self) -> impl Iterator<Item = &mut Region> {
        self.seg1
            .iter_mut()
            .chain(&mut self.seg2)
            .map(|s| &mut s.region)
            .chain(core::iter::once(&mut self.stack))
    }
}

impl Segment {
    fn empty_like(&self) -> Self {
        Self {
            region: self.region.empty_like(),
            permissions: self.permissions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RX: RegionPermissions = RegionPermissions::new(true, false, true);
    const RW: RegionPermissions = RegionPermissions::new(true, true, false);

    #[test]
    fn new_space_has_only_the_stack() {
        let space = AddressSpace::new();
        assert!(space.segment1().is_none());
        assert!(space.segment2().is_none());
        assert_eq!(space.stack().base(), VirtualAddress::new(0x7FFF_4000));
        assert_eq!(space.stack().npages(), 12);
        assert!(!space.stack().is_backed());
        assert!(!space.is_loaded_readonly());
    }

    #[test]
    fn define_region_rounds_to_pages() {
        let mut space = AddressSpace::new();
        space
            .define_region(VirtualAddress::new(0x0040_0010), 2 * PAGE_SIZE, RX)
            .unwrap();
        let seg = space.segment1().unwrap();
        assert_eq!(seg.region().base(), VirtualAddress::new(0x0040_0000));
        assert_eq!(seg.region().npages(), 3);
        assert_eq!(seg.permissions(), RX);
    }

    #[test]
    fn third_region_is_rejected() {
        let mut space = AddressSpace::new();
        space
            .define_region(VirtualAddress::new(0x0040_0000), PAGE_SIZE, RX)
            .unwrap();
        space
            .define_region(VirtualAddress::new(0x0050_0000), PAGE_SIZE, RW)
            .unwrap();
        assert_eq!(
            space.define_region(VirtualAddress::new(0x0060_0000), PAGE_SIZE, RW),
            Err(VmError::TooManyRegions)
        );
        assert_eq!(
            space.segment2().unwrap().region().base(),
            VirtualAddress::new(0x0050_0000)
        );
    }

    #[test]
    fn oversized_regions_are_rejected() {
        let mut space = AddressSpace::new();
        let text = VirtualAddress::new(0x0040_0010);
        assert_eq!(
            space.define_region(text, 0xFFFF_FFF8, RX),
            Err(VmError::RegionTooLarge {
                base: text,
                size: 0xFFFF_FFF8
            })
        );
        // Up to the stack is fine, one byte further is not.
        let below_stack = USERSTACK_BASE - 0x0040_0000;
        assert_eq!(
            space.define_region(VirtualAddress::new(0x0040_0000), below_stack + 1, RW),
            Err(VmError::RegionTooLarge {
                base: VirtualAddress::new(0x0040_0000),
                size: below_stack + 1
            })
        );
        assert_eq!(
            space.define_region(VirtualAddress::new(0x8000_0000), PAGE_SIZE, RW),
            Err(VmError::RegionTooLarge {
                base: VirtualAddress::new(0x8000_0000),
                size: PAGE_SIZE
            })
        );
        assert!(space.segment1().is_none());

        space
            .define_region(VirtualAddress::new(0x0040_0000), below_stack, RW)
            .unwrap();
        let seg = space.segment1().unwrap();
        assert_eq!(seg.region().npages(), below_stack / PAGE_SIZE);
    }

    #[test]
    fn region_page_index() {
        let region = Region::new(VirtualAddress::new(0x0040_0000), 2);
        assert_eq!(region.page_index(VirtualAddress::new(0x0040_0000)), Some(0));
        assert_eq!(region.page_index(VirtualAddress::new(0x0040_1FFF)), Some(1));
        assert_eq!(region.page_index(VirtualAddress::new(0x0040_2000)), None);
        assert_eq!(region.page_index(VirtualAddress::new(0x003F_FFFF)), None);
    }

    #[test]
    fn unbacked_regions_translate_to_nothing() {
        let mut space = AddressSpace::new();
        space
            .define_region(VirtualAddress::new(0x0040_0000), PAGE_SIZE, RX)
            .unwrap();
        assert_eq!(space.translate(VirtualAddress::new(0x0040_0000)), None);
        assert!(!space.is_backed());
    }

    #[test]
    #[should_panic(expected = "user stack is not backed")]
    fn define_stack_requires_backing() {
        let _ = AddressSpace::new().define_stack();
    }
}
