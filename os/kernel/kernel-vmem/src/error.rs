use kernel_alloc::FrameAllocError;
use kernel_memory_addresses::VirtualAddress;

/// Errors of the address space lifecycle operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    /// No free frame, or no kernel heap for bookkeeping.
    #[error("out of memory")]
    OutOfMemory,
    /// Both general-purpose segments are already defined.
    #[error("address space already has two segments")]
    TooManyRegions,
    /// The region wraps around or reaches into the stack or kernel space.
    #[error("region {base} + {size:#x} does not fit below the user stack")]
    RegionTooLarge { base: VirtualAddress, size: u32 },
    #[error(transparent)]
    Frame(#[from] FrameAllocError),
}

/// Reasons a TLB fault cannot be resolved. All of them are terminal for the
/// faulting access; the trap dispatcher decides what happens to the thread.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmFaultError {
    #[error("write to read-only page at {0}")]
    ReadOnly(VirtualAddress),
    #[error("unknown fault type {0}")]
    InvalidFaultKind(i32),
    #[error("fault with no current address space")]
    NoAddressSpace,
    #[error("fault address {0} is outside every region")]
    OutOfRange(VirtualAddress),
}
