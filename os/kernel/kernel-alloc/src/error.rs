use kernel_memory_addresses::PhysicalAddress;

/// Failures reported by the physical frame allocator.
///
/// Running out of frames is not an error here: allocation returns `None` and
/// the caller decides what that means.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameAllocError {
    #[error("frame allocator is already bootstrapped")]
    AlreadyBootstrapped,
    #[error("frame allocator is not bootstrapped yet; stolen frames cannot be freed")]
    NotBootstrapped,
    #[error("frame address {0} is not page aligned")]
    Unaligned(PhysicalAddress),
    #[error("frame address {0} is outside the managed pool")]
    OutOfRange(PhysicalAddress),
    #[error("frame address {0} does not start an allocated run")]
    NotRunStart(PhysicalAddress),
    #[error("not enough RAM to hold the coremap and at least one frame")]
    InsufficientRam,
}
