//! Entry points called from C.
//!
//! Address spaces handed to C are heap allocations owned by the process
//! structure; C only ever passes them back.

use crate::errno::{EINVAL, ENOMEM, Errno, to_errno};
use crate::platform::{KernelSpl, Putch, SysRam};
use alloc::alloc::{Layout, alloc};
use alloc::boxed::Box;
use core::ptr;
use kernel_alloc::phys_mapper::DirectMapPhysMapper;
use kernel_console::ConsoleLogger;
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::Cp0Tlb;
use kernel_vmem::{AddressSpace, RegionPermissions, TlbShootdown, Vm, fault};
use log::{LevelFilter, error};

type KernelVm = Vm<SysRam, DirectMapPhysMapper, Cp0Tlb, KernelSpl>;

// Safety: KSEG0 maps all RAM the boot code hands out.
static VM: KernelVm = unsafe { Vm::new(SysRam::new(), DirectMapPhysMapper::KSEG0, Cp0Tlb, KernelSpl) };
static CONSOLE: Putch = Putch;

unsafe extern "C" {
    fn curproc_getas() -> *mut AddressSpace;
}

fn current_space<'a>() -> Option<&'a AddressSpace> {
    unsafe { curproc_getas().as_ref() }
}

/// Move `space` to the kernel heap. Gives it back if the heap is exhausted.
fn into_raw(space: AddressSpace) -> Result<*mut AddressSpace, AddressSpace> {
    let p = unsafe { alloc(Layout::new::<AddressSpace>()) }.cast::<AddressSpace>();
    if p.is_null() {
        return Err(space);
    }
    unsafe { p.write(space) };
    Ok(p)
}

#[unsafe(no_mangle)]
pub extern "C" fn vm_bootstrap() {
    ConsoleLogger::new(&CONSOLE, LevelFilter::Info).init().ok();
    if let Err(e) = VM.bootstrap() {
        panic!("vm_bootstrap: {e}");
    }
}

/// KSEG0 address of `npages` fresh contiguous frames, or 0.
#[unsafe(no_mangle)]
pub extern "C" fn alloc_kpages(npages: i32) -> u32 {
    usize::try_from(npages)
        .ok()
        .and_then(|n| VM.alloc_kpages(n))
        .map_or(0, VirtualAddress::as_u32)
}

#[unsafe(no_mangle)]
pub extern "C" fn free_kpages(addr: u32) {
    // The allocator logs rejected releases.
    VM.free_kpages(VirtualAddress::new(addr)).ok();
}

#[unsafe(no_mangle)]
pub extern "C" fn vm_tlbshootdown_all() -> ! {
    VM.tlb_shootdown_all()
}

/// # Safety
/// `ts` is null or points to a live request.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vm_tlbshootdown(ts: *const TlbShootdown) -> ! {
    match unsafe { ts.as_ref() } {
        Some(request) => VM.tlb_shootdown(request),
        None => VM.tlb_shootdown_all(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn vm_fault(faulttype: i32, faultaddress: u32) -> i32 {
    to_errno(VM.fault_raw(
        current_space(),
        faulttype,
        VirtualAddress::new(faultaddress),
    ))
}

/// A new, empty address space, or null.
#[unsafe(no_mangle)]
pub extern "C" fn as_create() -> *mut AddressSpace {
    into_raw(AddressSpace::new()).unwrap_or(ptr::null_mut())
}

/// # Safety
/// `space` is null or came from [`as_create`] / [`as_copy`] and is not used
/// afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn as_destroy(space: *mut AddressSpace) {
    if space.is_null() {
        return;
    }
    let space = unsafe { Box::from_raw(space) };
    if let Err(e) = VM.destroy(*space) {
        error!(target: "vm", "as_destroy: {e}");
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn as_activate() {
    VM.activate(current_space());
}

#[unsafe(no_mangle)]
pub extern "C" fn as_deactivate() {
    fault::deactivate();
}

/// # Safety
/// `space` must be a live address space.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn as_define_region(
    space: *mut AddressSpace,
    vaddr: u32,
    sz: usize,
    readable: i32,
    writeable: i32,
    executable: i32,
) -> i32 {
    let Ok(size) = u32::try_from(sz) else {
        return EINVAL;
    };
    let permissions = RegionPermissions::new(readable != 0, writeable != 0, executable != 0);
    let space = unsafe { &mut *space };
    to_errno(space.define_region(VirtualAddress::new(vaddr), size, permissions))
}

/// # Safety
/// `space` must be a live address space.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn as_prepare_load(space: *mut AddressSpace) -> i32 {
    to_errno(VM.prepare_load(unsafe { &mut *space }))
}

/// # Safety
/// `space` must be a live address space.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn as_complete_load(space: *mut AddressSpace) -> i32 {
    VM.complete_load(unsafe { &mut *space });
    0
}

/// # Safety
/// `space` must be a live address space and `stackptr` writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn as_define_stack(space: *mut AddressSpace, stackptr: *mut u32) -> i32 {
    let sp = unsafe { &*space }.define_stack();
    unsafe { stackptr.write(sp.as_u32()) };
    0
}

/// # Safety
/// `old` must be a live address space and `ret` writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn as_copy(old: *mut AddressSpace, ret: *mut *mut AddressSpace) -> i32 {
    let new = match VM.copy(unsafe { &*old }) {
        Ok(new) => new,
        Err(e) => return e.errno(),
    };
    match into_raw(new) {
        Ok(p) => {
            unsafe { ret.write(p) };
            0
        }
        Err(new) => {
            VM.destroy(new).ok();
            ENOMEM
        }
    }
}
