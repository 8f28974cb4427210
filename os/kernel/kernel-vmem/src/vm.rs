//! The VM subsystem as one object.

use crate::address_space::AddressSpace;
use crate::error::{VmError, VmFaultError};
use crate::fault::{self, FaultKind, TlbShootdown};
use kernel_alloc::FrameAllocError;
use kernel_alloc::frame_alloc::{FrameAllocator, FrameStats};
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_alloc::ram::RamSource;
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::TlbAccess;
use kernel_sync::{InterruptControl, SplGuard};

/// Frame allocator, TLB and interrupt control of one processor, bundled so
/// the kernel can keep a single static instance.
pub struct Vm<R, M, T, I> {
    /// Owns the interrupt control; the TLB code borrows it from here.
    frames: FrameAllocator<R, M, I>,
    tlb: T,
}

impl<R, M, T, I> Vm<R, M, T, I>
where
    R: RamSource,
    M: PhysMapper,
    T: TlbAccess,
    I: InterruptControl,
{
    /// # Safety
    /// As [`FrameAllocator::new`].
    pub const unsafe fn new(ram: R, mapper: M, tlb: T, irq: I) -> Self {
        Self {
            frames: unsafe { FrameAllocator::new(ram, mapper, irq) },
            tlb,
        }
    }

    #[must_use]
    pub const fn frames(&self) -> &FrameAllocator<R, M, I> {
        &self.frames
    }

    #[must_use]
    pub const fn tlb(&self) -> &T {
        &self.tlb
    }

    #[must_use]
    pub const fn irq(&self) -> &I {
        self.frames.irq()
    }

    /// Hand the remaining RAM to the coremap.
    ///
    /// # Errors
    /// See [`FrameAllocator::bootstrap`].
    pub fn bootstrap(&self) -> Result<FrameStats, FrameAllocError> {
        self.frames.bootstrap()
    }

    #[must_use]
    pub fn alloc_kpages(&self, npages: usize) -> Option<VirtualAddress> {
        self.frames.alloc_kpages(npages)
    }

    /// # Errors
    /// See [`FrameAllocator::free_kpages`].
    pub fn free_kpages(&self, kva: VirtualAddress) -> Result<usize, FrameAllocError> {
        self.frames.free_kpages(kva)
    }

    /// # Errors
    /// See [`AddressSpace::prepare_load`].
    pub fn prepare_load(&self, space: &mut AddressSpace) -> Result<(), VmError> {
        space.prepare_load(&self.frames)
    }

    /// Finish loading and drop any writable segment 1 mapping from the TLB.
    pub fn complete_load(&self, space: &mut AddressSpace) {
        space.complete_load();
        let _spl = SplGuard::raise(self.irq());
        self.tlb.invalidate_all();
    }

    /// # Errors
    /// See [`AddressSpace::copy`].
    pub fn copy(&self, space: &AddressSpace) -> Result<AddressSpace, VmError> {
        space.copy(&self.frames)
    }

    /// # Errors
    /// See [`AddressSpace::destroy`].
    pub fn destroy(&self, space: AddressSpace) -> Result<(), VmError> {
        space.destroy(&self.frames)
    }

    pub fn activate(&self, space: Option<&AddressSpace>) {
        fault::activate(&self.tlb, self.irq(), space);
    }

    /// # Errors
    /// See [`fault::handle_fault`].
    pub fn fault(
        &self,
        space: Option<&AddressSpace>,
        kind: FaultKind,
        fault_address: VirtualAddress,
    ) -> Result<(), VmFaultError> {
        fault::handle_fault(&self.tlb, self.irq(), space, kind, fault_address)
    }

    /// [`fault`](Self::fault) with the fault type as the trap code passes it.
    ///
    /// # Errors
    /// [`VmFaultError::InvalidFaultKind`] for unknown codes, otherwise as
    /// [`fault`](Self::fault).
    pub fn fault_raw(
        &self,
        space: Option<&AddressSpace>,
        raw_kind: i32,
        fault_address: VirtualAddress,
    ) -> Result<(), VmFaultError> {
        self.fault(space, FaultKind::try_from(raw_kind)?, fault_address)
    }

    /// # Panics
    /// Always; see [`fault::tlb_shootdown_all`].
    #[allow(clippy::unused_self)]
    pub fn tlb_shootdown_all(&self) -> ! {
        fault::tlb_shootdown_all()
    }

    /// # Panics
    /// Always; see [`fault::tlb_shootdown`].
    #[allow(clippy::unused_self)]
    pub fn tlb_shootdown(&self, request: &TlbShootdown) -> ! {
        fault::tlb_shootdown(request)
    }
}
