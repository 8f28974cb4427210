//! # Kernel synchronization primitives
//!
//! * [`SpinLock`]: busy-waiting mutual exclusion; the frame allocator's lock.
//! * [`SyncOnceCell`]: one-time initialization of global singletons.
//! * [`irq`]: interrupt priority levels (`splhigh`/`splx`) behind the
//!   [`InterruptControl`] seam, the RAII [`SplGuard`], and
//!   [`SpinLock::lock_irq`] for locks that interrupt handlers may contend on.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;
mod sync_once_cell;

pub use irq::{InterruptControl, IrqSpinLockGuard, SoftInterrupts, SplGuard};
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
