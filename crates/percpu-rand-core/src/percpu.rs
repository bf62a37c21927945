//! Per-core slot arena with scoped pinning.
//!
//! Each slot holds one generator behind its own mutex. `pin` maps the
//! executing core to a slot and locks it; the guard releases on drop. A thread
//! may migrate after the core id is read, so two threads can land on the same
//! slot: the mutex makes that safe and the slot is still never observed by two
//! readers at once.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

/// One exclusively-owned slot per possible core.
pub struct CoreArena<T> {
    slots: Vec<Mutex<T>>,
}

impl<T> CoreArena<T> {
    /// Reserve room for `cores` slots up front so a failed allocation is
    /// reported instead of aborting.
    pub fn try_with_capacity(cores: usize) -> Result<Self> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(cores).map_err(|_| Error::AllocationFailure {
            bytes: cores.saturating_mul(std::mem::size_of::<Mutex<T>>()),
        })?;
        Ok(Self { slots })
    }

    pub fn push(&mut self, value: T) {
        self.slots.push(Mutex::new(value));
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Lock the slot owned by the executing core. `None` once the arena is
    /// empty.
    pub fn pin(&self) -> Option<CorePin<'_, T>> {
        if self.slots.is_empty() {
            return None;
        }
        Some(self.pin_core(current_core() % self.slots.len()))
    }

    /// Lock a specific slot.
    ///
    /// # Panics
    /// Panics if `core >= len()`.
    pub fn pin_core(&self, core: usize) -> CorePin<'_, T> {
        // A panic while pinned leaves the generator in a valid state, so the
        // poison flag carries no information here.
        let guard = self.slots[core]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        CorePin { core, guard }
    }

    /// Drop every slot. Safe to call repeatedly.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.slots.shrink_to_fit();
    }
}

/// Exclusive access to one core's slot for the guard's lifetime.
pub struct CorePin<'a, T> {
    core: usize,
    guard: MutexGuard<'a, T>,
}

impl<T> CorePin<'_, T> {
    /// Slot index this pin holds.
    pub fn core(&self) -> usize {
        self.core
    }
}

impl<T> Deref for CorePin<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for CorePin<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// Identifier of the core the calling thread is running on.
#[cfg(target_os = "linux")]
pub fn current_core() -> usize {
    // SAFETY: sched_getcpu takes no arguments and touches no caller memory.
    let cpu = unsafe { libc::sched_getcpu() };
    if cpu < 0 {
        return thread_index();
    }
    cpu as usize
}

/// Identifier of the core the calling thread is running on.
#[cfg(not(target_os = "linux"))]
pub fn current_core() -> usize {
    thread_index()
}

/// Stable small index per thread, used where the OS cannot report the core.
fn thread_index() -> usize {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT: AtomicUsize = AtomicUsize::new(0);
    thread_local! {
        static INDEX: usize = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    INDEX.with(|i| *i)
}

/// Number of configured processors, including offline ones.
#[cfg(unix)]
pub fn possible_cores() -> usize {
    // SAFETY: sysconf only reads a system constant.
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_CONF) };
    if n > 0 {
        n as usize
    } else {
        online_cores()
    }
}

/// Number of configured processors.
#[cfg(not(unix))]
pub fn possible_cores() -> usize {
    online_cores()
}

fn online_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
