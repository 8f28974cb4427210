//! # Physical frame allocator
//!
//! The allocator lives through exactly two states:
//!
//! ```text
//!  Bootstrapping(RamSource) ──bootstrap()──▶ Ready(Coremap)
//! ```
//!
//! While bootstrapping, allocations bump-allocate straight off the RAM source
//! and can never be returned. [`FrameAllocator::bootstrap`] hands the rest of
//! RAM to a [`Coremap`], after which frames are allocated first-fit and can be
//! released. The transition happens once; a second `bootstrap` is rejected.
//!
//! All state sits behind one [`SpinLock`], taken with the interrupt priority
//! raised: the kernel heap allocates frames from inside its own critical
//! section, so a holder must never be preempted.

use crate::coremap::Coremap;
use crate::phys_mapper::PhysMapper;
use crate::ram::RamSource;
use crate::{FrameAlloc, FrameAllocError};
use kernel_info::memory::{is_kseg0, kvaddr_to_paddr, paddr_to_kvaddr};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress};
use kernel_sync::{InterruptControl, SpinLock};
use log::{debug, info, warn};

enum State<R> {
    Bootstrapping(R),
    Ready(Coremap<'static>),
}

/// Frame counts of a bootstrapped allocator.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameStats {
    pub base: PhysicalAddress,
    pub total: usize,
    pub free: usize,
}

/// The kernel's physical frame allocator.
pub struct FrameAllocator<R, M, I> {
    state: SpinLock<State<R>>,
    mapper: M,
    irq: I,
}

impl<R: RamSource, M: PhysMapper, I: InterruptControl> FrameAllocator<R, M, I> {
    /// # Safety
    /// `mapper` must map every frame `ram` can ever hand out, and that RAM
    /// must not be used by anything but this allocator.
    pub const unsafe fn new(ram: R, mapper: M, irq: I) -> Self {
        Self {
            state: SpinLock::new(State::Bootstrapping(ram)),
            mapper,
            irq,
        }
    }

    /// Interrupt control the allocator lock is taken under.
    #[must_use]
    pub const fn irq(&self) -> &I {
        &self.irq
    }

    /// Build the coremap over all RAM not stolen so far.
    ///
    /// # Errors
    /// - [`FrameAllocError::AlreadyBootstrapped`] on the second call.
    /// - [`FrameAllocError::InsufficientRam`] if the remaining RAM cannot hold
    ///   the coremap plus one frame. The allocator keeps bootstrapping off the
    ///   untouched RAM source.
    pub fn bootstrap(&self) -> Result<FrameStats, FrameAllocError> {
        let mut state = self.state.lock_irq(&self.irq);
        let State::Bootstrapping(ram) = &mut *state else {
            return Err(FrameAllocError::AlreadyBootstrapped);
        };

        let (first, last) = ram.remaining_range();
        // Safety: the lock keeps anyone from stealing out of the range, and
        // `new` requires the mapper to cover it.
        let coremap = unsafe { Coremap::new_in(&self.mapper, first, last)? };
        ram.take_remaining();
        let stats = stats_of(&coremap);
        info!(
            target: "vm",
            "coremap ready: {} frames at {}, {} frames of RAM {}..{}",
            stats.total,
            stats.base,
            last.as_u32().saturating_sub(first.as_u32()) / PAGE_SIZE,
            first,
            last
        );
        *state = State::Ready(coremap);
        Ok(stats)
    }

    /// Whether [`bootstrap`](Self::bootstrap) has completed.
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.lock_irq(&self.irq), State::Ready(_))
    }

    /// Pool geometry and free count, once bootstrapped.
    pub fn stats(&self) -> Option<FrameStats> {
        match &*self.state.lock_irq(&self.irq) {
            State::Bootstrapping(_) => None,
            State::Ready(map) => Some(stats_of(map)),
        }
    }

    /// Run `f` against the coremap while holding the allocator lock.
    pub fn with_coremap<T>(&self, f: impl FnOnce(&Coremap<'static>) -> T) -> Option<T> {
        match &*self.state.lock_irq(&self.irq) {
            State::Bootstrapping(_) => None,
            State::Ready(map) => Some(f(map)),
        }
    }

    /// Allocate `npages` contiguous frames and return their KSEG0 address.
    pub fn alloc_kpages(&self, npages: usize) -> Option<VirtualAddress> {
        self.alloc_frames(npages).map(paddr_to_kvaddr)
    }

    /// Release a run obtained from [`alloc_kpages`](Self::alloc_kpages).
    ///
    /// # Errors
    /// As [`FrameAlloc::free_frames`]; non-KSEG0 addresses are out of range.
    pub fn free_kpages(&self, kva: VirtualAddress) -> Result<usize, FrameAllocError> {
        if !is_kseg0(kva) {
            return Err(FrameAllocError::OutOfRange(PhysicalAddress::new(kva.as_u32())));
        }
        self.free_frames(kvaddr_to_paddr(kva))
    }
}

impl<R: RamSource, M: PhysMapper, I: InterruptControl> FrameAlloc for FrameAllocator<R, M, I> {
    type Mapper = M;

    fn alloc_frames(&self, npages: usize) -> Option<PhysicalAddress> {
        let pa = self.state.with_lock_irq(&self.irq, |state| match state {
            State::Bootstrapping(ram) => u32::try_from(npages)
                .ok()
                .and_then(|n| ram.steal_pages(n)),
            State::Ready(map) => map.alloc(npages),
        });
        if pa.is_none() {
            debug!(target: "vm", "out of frames for a run of {npages}");
        }
        pa
    }

    fn free_frames(&self, pa: PhysicalAddress) -> Result<usize, FrameAllocError> {
        let result = self.state.with_lock_irq(&self.irq, |state| match state {
            State::Bootstrapping(_) => Err(FrameAllocError::NotBootstrapped),
            State::Ready(map) => map.release(pa),
        });
        if let Err(e) = result {
            warn!(target: "vm", "rejected frame release: {e}");
        }
        result
    }

    fn mapper(&self) -> &M {
        &self.mapper
    }
}

fn stats_of(map: &Coremap<'_>) -> FrameStats {
    FrameStats {
        base: map.base(),
        total: map.frame_count(),
        free: map.free_count(),
    }
}
