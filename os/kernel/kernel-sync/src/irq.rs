//! # Interrupt priority levels
//!
//! The VM code never touches the CPU status register directly. It raises the
//! interrupt priority to the maximum while it rewrites TLB slots or holds the
//! frame allocator lock, then drops back to whatever level was active before.
//! Which mechanism does that is hidden behind [`InterruptControl`]:
//!
//! * the kernel build binds it to the kernel's `splhigh()`/`splx()`;
//! * host builds and tests use [`SoftInterrupts`], which only tracks state.
//!
//! ```
//! use kernel_sync::{SoftInterrupts, SplGuard};
//!
//! let irq = SoftInterrupts::new();
//! {
//!     let _spl = SplGuard::raise(&irq);
//!     assert!(!irq.enabled());
//! }
//! assert!(irq.enabled());
//! ```

use crate::spin_lock::{SpinLock, SpinLockGuard};
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Raise-to-maximum / restore pair of the interrupt controller.
pub trait InterruptControl {
    /// Opaque previous priority level returned by [`raise`](Self::raise).
    type Level: Copy;

    /// Disable interrupts on the current processor and return the previous level.
    fn raise(&self) -> Self::Level;

    /// Return to `level`, as obtained from a matching [`raise`](Self::raise).
    fn restore(&self, level: Self::Level);
}

/// RAII guard that holds the interrupt priority at maximum until dropped.
///
/// Nested guards are fine: each restores exactly the level it found.
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct SplGuard<'a, I: InterruptControl> {
    ctl: &'a I,
    prev: I::Level,
}

impl<'a, I: InterruptControl> SplGuard<'a, I> {
    #[inline]
    pub fn raise(ctl: &'a I) -> Self {
        let prev = ctl.raise();
        Self { ctl, prev }
    }
}

impl<I: InterruptControl> Drop for SplGuard<'_, I> {
    #[inline]
    fn drop(&mut self) {
        self.ctl.restore(self.prev);
    }
}

/// A [`SpinLock`] guard that also holds the interrupt priority at maximum.
///
/// Created by [`SpinLock::lock_irq`]. Interrupts are raised before the lock is
/// taken, and the lock is released before the previous level is restored, so
/// no interrupt handler can run while the lock is held.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct IrqSpinLockGuard<'a, T, I: InterruptControl> {
    // Field order is drop order: unlock first, then restore the level.
    lock: SpinLockGuard<'a, T>,
    _spl: SplGuard<'a, I>,
}

impl<T> SpinLock<T> {
    /// Raise the interrupt priority through `ctl`, then spin until acquired.
    #[inline]
    pub fn lock_irq<'a, I: InterruptControl>(
        &'a self,
        ctl: &'a I,
    ) -> IrqSpinLockGuard<'a, T, I> {
        let spl = SplGuard::raise(ctl);
        let lock = self.lock();
        IrqSpinLockGuard { lock, _spl: spl }
    }

    /// Run `f` with interrupts raised and the lock held.
    #[inline]
    pub fn with_lock_irq<I: InterruptControl, R>(
        &self,
        ctl: &I,
        f: impl FnOnce(&mut T) -> R,
    ) -> R {
        let mut g = self.lock_irq(ctl);
        f(&mut g)
    }
}

impl<T, I: InterruptControl> Deref for IrqSpinLockGuard<'_, T, I> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.lock
    }
}

impl<T, I: InterruptControl> DerefMut for IrqSpinLockGuard<'_, T, I> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.lock
    }
}

/// Interrupt controller model for host builds.
///
/// Tracks whether interrupts are currently enabled and how often they have
/// been raised, so callers can check that a critical section was entered and
/// left again.
#[derive(Debug)]
pub struct SoftInterrupts {
    enabled: AtomicBool,
    raises: AtomicUsize,
}

impl Default for SoftInterrupts {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftInterrupts {
    /// Starts with interrupts enabled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            raises: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Number of [`raise`](InterruptControl::raise) calls so far.
    #[inline]
    pub fn raise_count(&self) -> usize {
        self.raises.load(Ordering::Relaxed)
    }
}

impl InterruptControl for SoftInterrupts {
    type Level = bool;

    fn raise(&self) -> bool {
        self.raises.fetch_add(1, Ordering::Relaxed);
        self.enabled.swap(false, Ordering::AcqRel)
    }

    fn restore(&self, level: bool) {
        self.enabled.store(level, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_guards_restore_outer_level() {
        let irq = SoftInterrupts::new();
        {
            let _outer = SplGuard::raise(&irq);
            {
                let _inner = SplGuard::raise(&irq);
                assert!(!irq.enabled());
            }
            // the inner guard found interrupts already off
            assert!(!irq.enabled());
        }
        assert!(irq.enabled());
        assert_eq!(irq.raise_count(), 2);
    }

    #[test]
    fn lock_irq_holds_both_until_dropped() {
        let irq = SoftInterrupts::new();
        let lock = SpinLock::new(0_u32);
        {
            let mut g = lock.lock_irq(&irq);
            *g += 1;
            assert!(lock.is_locked());
            assert!(!irq.enabled());
        }
        assert!(!lock.is_locked());
        assert!(irq.enabled());

        let v = lock.with_lock_irq(&irq, |v| {
            *v += 1;
            *v
        });
        assert_eq!(v, 2);
        assert_eq!(irq.raise_count(), 2);
        assert!(irq.enabled());
    }

    #[test]
    fn restore_keeps_disabled_state_if_it_was_disabled() {
        let irq = SoftInterrupts::new();
        let prev = irq.raise();
        assert!(prev);
        let again = irq.raise();
        assert!(!again);
        irq.restore(again);
        assert!(!irq.enabled());
        irq.restore(prev);
        assert!(irq.enabled());
    }
}
