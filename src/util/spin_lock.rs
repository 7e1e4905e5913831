//! Spin-locked cells for the two sharing patterns this firmware has.
//!
//! [`SpinLock`] covers ordinary shared state (the user configuration, the
//! OSD grid): one side may spin for it, the other side only ever tries and
//! moves on, so a reader on the scanout core can never be stalled by the
//! control loop.
//!
//! [`HwLock`] covers hardware loaned into interrupt handlers: provisioned
//! exactly once at init, then borrowed exclusively each time the handler
//! runs. Contention on a `HwLock` is never legitimate -- it means an IRQ
//! was enabled before its hardware existed, or two handlers share a loan
//! without coordination -- so `borrow` panics loudly instead of offering a
//! fallible path nobody could meaningfully handle.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Protects a `T` so it can't be accessed concurrently or reentrantly.
///
/// Like `std::sync::Mutex` but with no OS to park a thread on: a caller
/// either takes the lock immediately or is told it's busy and decides for
/// itself whether spinning is acceptable.
#[derive(Debug)]
pub struct SpinLock<T> {
    locked: AtomicBool,
    contents: UnsafeCell<T>,
}

unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(contents: T) -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
            contents: UnsafeCell::new(contents),
        }
    }

    /// Takes the lock if it is free, `None` if somebody holds it.
    pub fn try_lock(&self) -> Option<SpinLockGuard<T>> {
        if self.locked.swap(true, Ordering::Acquire) {
            // Old value of `true` implies the cell was already locked.
            None
        } else {
            Some(SpinLockGuard { lock: self })
        }
    }

    /// Spins until the lock is free. Only for thread-mode callers whose
    /// counterpart holds the lock briefly; interrupt-context code uses
    /// `try_lock` and skips.
    pub fn lock(&self) -> SpinLockGuard<T> {
        loop {
            match self.try_lock() {
                Some(guard) => return guard,
                None => core::hint::spin_loop(),
            }
        }
    }
}

#[must_use = "if dropped, the spinlock will immediately unlock"]
#[derive(Debug)]
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<'a, T> core::ops::Deref for SpinLockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: the guard exists, so the false -> true transition was
        // ours and nobody else can observe the contents.
        unsafe { &*self.lock.contents.get() }
    }
}

impl<'a, T> core::ops::DerefMut for SpinLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: as above, and the guard is borrowed uniquely.
        unsafe { &mut *self.lock.contents.get() }
    }
}

impl<'a, T> Drop for SpinLockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

const EMPTY: u8 = 0;
const READY: u8 = 1;
const BORROWED: u8 = 2;

/// A loan cell for hardware owned by an interrupt handler.
///
/// Starts empty; `install` fills it once during provisioning, and every
/// handler invocation `borrow`s the contents exclusively for its duration.
/// There is no release operation -- the loan lasts until power-off.
pub struct HwLock<T> {
    state: AtomicU8,
    contents: UnsafeCell<MaybeUninit<T>>,
}

unsafe impl<T: Send> Sync for HwLock<T> {}

impl<T: Send> HwLock<T> {
    pub const fn new() -> Self {
        HwLock {
            state: AtomicU8::new(EMPTY),
            contents: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Installs the hardware. Call once, before the IRQ that borrows it is
    /// unmasked.
    ///
    /// # Panics
    ///
    /// If the cell has already been installed.
    pub fn install(&self, hw: T) {
        let r = self
            .state
            .compare_exchange(EMPTY, BORROWED, Ordering::Acquire, Ordering::Relaxed);
        assert!(r.is_ok(), "hardware installed twice");
        // Safety: holding BORROWED means no other reference exists.
        unsafe { (*self.contents.get()).write(hw) };
        self.state.store(READY, Ordering::Release);
    }

    /// Borrows the hardware exclusively until the guard drops.
    ///
    /// # Panics
    ///
    /// If nothing has been installed (the IRQ got enabled too early), or
    /// the cell is already borrowed (two handlers are sharing the loan
    /// without coordination, or a previous invocation leaked the guard).
    pub fn borrow(&self) -> HwGuard<T> {
        match self
            .state
            .compare_exchange(READY, BORROWED, Ordering::Acquire, Ordering::Relaxed)
        {
            Ok(_) => HwGuard { cell: self },
            Err(EMPTY) => panic!("ISR fired without HW available"),
            Err(_) => panic!("HW lock held at ISR"),
        }
    }
}

pub struct HwGuard<'a, T: Send> {
    cell: &'a HwLock<T>,
}

impl<'a, T: Send> core::ops::Deref for HwGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: the READY -> BORROWED exchange was ours, and READY is
        // only ever stored after `install` initialised the contents.
        unsafe { &*(*self.cell.contents.get()).as_ptr() }
    }
}

impl<'a, T: Send> core::ops::DerefMut for HwGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: as above, and the guard is borrowed uniquely.
        unsafe { &mut *(*self.cell.contents.get()).as_mut_ptr() }
    }
}

impl<'a, T: Send> Drop for HwGuard<'a, T> {
    fn drop(&mut self) {
        self.cell.state.store(READY, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_lock_excludes_second_lock() {
        let lock = SpinLock::new(0u32);
        let guard = lock.try_lock().unwrap();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn lock_sees_guarded_writes() {
        let lock = SpinLock::new((1u32, 2u32));
        lock.lock().1 = 9;
        assert_eq!(lock.lock().1, 9);
        assert_eq!(lock.try_lock().unwrap().0, 1);
    }

    #[test]
    fn hw_lock_loans_and_releases() {
        let cell: HwLock<u32> = HwLock::new();
        cell.install(7);
        {
            let mut hw = cell.borrow();
            *hw += 1;
        }
        // Guard dropped: the next invocation can borrow again.
        assert_eq!(*cell.borrow(), 8);
    }

    #[test]
    #[should_panic(expected = "without HW")]
    fn borrow_before_install_is_a_boot_bug() {
        let cell: HwLock<u32> = HwLock::new();
        let _ = cell.borrow();
    }

    #[test]
    #[should_panic(expected = "held at ISR")]
    fn reentrant_borrow_is_a_coordination_bug() {
        let cell: HwLock<u32> = HwLock::new();
        cell.install(1);
        let _outer = cell.borrow();
        let _ = cell.borrow();
    }

    #[test]
    #[should_panic(expected = "installed twice")]
    fn double_install_is_a_boot_bug() {
        let cell: HwLock<u32> = HwLock::new();
        cell.install(1);
        cell.install(2);
    }
}
