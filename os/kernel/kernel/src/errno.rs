//! Kernel error numbers for the C side.

use kernel_alloc::FrameAllocError;
use kernel_vmem::{VmError, VmFaultError};

/// Function not implemented.
pub const EUNIMP: i32 = 2;
/// Out of memory.
pub const ENOMEM: i32 = 3;
/// Bad memory reference.
pub const EFAULT: i32 = 6;
/// Invalid argument.
pub const EINVAL: i32 = 8;

/// Conversion of an error to the errno the C kernel expects.
pub trait Errno {
    fn errno(&self) -> i32;
}

impl Errno for FrameAllocError {
    fn errno(&self) -> i32 {
        match self {
            Self::InsufficientRam => ENOMEM,
            Self::NotBootstrapped => EUNIMP,
            Self::AlreadyBootstrapped
            | Self::Unaligned(_)
            | Self::OutOfRange(_)
            | Self::NotRunStart(_) => EINVAL,
        }
    }
}

impl Errno for VmError {
    fn errno(&self) -> i32 {
        match self {
            Self::OutOfMemory => ENOMEM,
            Self::TooManyRegions => EUNIMP,
            Self::RegionTooLarge { .. } => EINVAL,
            Self::Frame(e) => e.errno(),
        }
    }
}

impl Errno for VmFaultError {
    fn errno(&self) -> i32 {
        match self {
            Self::InvalidFaultKind(_) => EINVAL,
            Self::ReadOnly(_) | Self::NoAddressSpace | Self::OutOfRange(_) => EFAULT,
        }
    }
}

/// `0` on success, the errno otherwise.
pub fn to_errno<E: Errno>(result: Result<(), E>) -> i32 {
    result.map_or_else(|e| e.errno(), |()| 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

    #[test]
    fn vm_errors() {
        assert_eq!(VmError::OutOfMemory.errno(), ENOMEM);
        assert_eq!(VmError::TooManyRegions.errno(), EUNIMP);
        assert_eq!(
            VmError::RegionTooLarge {
                base: VirtualAddress::new(0x0040_0010),
                size: u32::MAX
            }
            .errno(),
            EINVAL
        );
        assert_eq!(
            VmError::Frame(FrameAllocError::NotRunStart(PhysicalAddress::new(0x1000))).errno(),
            EINVAL
        );
    }

    #[test]
    fn fault_errors() {
        let va = VirtualAddress::new(0x0040_0000);
        assert_eq!(VmFaultError::ReadOnly(va).errno(), EFAULT);
        assert_eq!(VmFaultError::NoAddressSpace.errno(), EFAULT);
        assert_eq!(VmFaultError::OutOfRange(va).errno(), EFAULT);
        assert_eq!(VmFaultError::InvalidFaultKind(9).errno(), EINVAL);
    }

    #[test]
    fn results_collapse_to_zero_or_errno() {
        assert_eq!(to_errno::<VmError>(Ok(())), 0);
        assert_eq!(to_errno(Err(VmError::OutOfMemory)), ENOMEM);
        assert_eq!(to_errno(Err(FrameAllocError::InsufficientRam)), ENOMEM);
    }
}
