//! Machine services provided by the C kernel.

use core::alloc::{GlobalAlloc, Layout};
use core::ffi::c_void;
use core::hint::spin_loop;
use kernel_alloc::ram::{BootRam, RamSource};
use kernel_console::ConsoleSink;
use kernel_memory_addresses::PhysicalAddress;
use kernel_sync::InterruptControl;
use log::error;

unsafe extern "C" {
    fn ram_stealmem(npages: u32) -> u32;
    fn ram_getsize(lo: *mut u32, hi: *mut u32);
    fn splhigh() -> i32;
    fn splx(spl: i32) -> i32;
    fn kmalloc(size: usize) -> *mut c_void;
    fn kfree(ptr: *mut c_void);
    fn putch(ch: i32);
}

/// RAM as managed by the machine-dependent boot code.
///
/// `ram_getsize` empties the boot code's range, so the first query latches it
/// here and later steals bump off the latched copy.
pub struct SysRam {
    latched: Option<BootRam>,
}

impl SysRam {
    pub const fn new() -> Self {
        Self { latched: None }
    }

    fn latch(&mut self) -> &mut BootRam {
        self.latched.get_or_insert_with(|| {
            let (mut lo, mut hi) = (0u32, 0u32);
            unsafe { ram_getsize(&raw mut lo, &raw mut hi) };
            BootRam::new(PhysicalAddress::new(lo), PhysicalAddress::new(hi))
        })
    }
}

impl RamSource for SysRam {
    fn steal_pages(&mut self, npages: u32) -> Option<PhysicalAddress> {
        if let Some(ram) = &mut self.latched {
            return ram.steal_pages(npages);
        }
        let pa = PhysicalAddress::new(unsafe { ram_stealmem(npages) });
        (!pa.is_zero()).then_some(pa)
    }

    fn remaining_range(&mut self) -> (PhysicalAddress, PhysicalAddress) {
        self.latch().remaining_range()
    }

    fn take_remaining(&mut self) -> (PhysicalAddress, PhysicalAddress) {
        self.latch().take_remaining()
    }
}

/// `splhigh` / `splx`.
pub struct KernelSpl;

impl InterruptControl for KernelSpl {
    type Level = i32;

    fn raise(&self) -> i32 {
        unsafe { splhigh() }
    }

    fn restore(&self, level: i32) {
        unsafe { splx(level) };
    }
}

/// The system console.
pub struct Putch;

impl ConsoleSink for Putch {
    fn write_bytes(&self, bytes: &[u8]) {
        for &b in bytes {
            unsafe { putch(i32::from(b)) };
        }
    }
}

/// `kmalloc` returns blocks aligned to at least this.
const KMALLOC_ALIGN: usize = 8;

/// Kernel heap for the VM bookkeeping.
struct KmallocAllocator;

#[global_allocator]
static GLOBAL_ALLOCATOR: KmallocAllocator = KmallocAllocator;

unsafe impl GlobalAlloc for KmallocAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > KMALLOC_ALIGN {
            return core::ptr::null_mut();
        }
        unsafe { kmalloc(layout.size()).cast() }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        unsafe { kfree(ptr.cast()) };
    }
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    error!("{info}");
    loop {
        spin_loop();
    }
}
