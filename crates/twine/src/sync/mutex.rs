//! Binary mutex with FIFO handoff.

use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::runtime::{schedule, Runtime};
use crate::types::{MutexHandle, ThreadHandle};

/// Lock record: a held flag plus the FIFO of blocked waiters. The record
/// owns its wait queue, never the threads in it.
pub(crate) struct MutexState {
    pub(crate) locked: bool,
    pub(crate) waiters: VecDeque<ThreadHandle>,
}

impl MutexState {
    pub(crate) fn new() -> Self {
        Self {
            locked: false,
            waiters: VecDeque::new(),
        }
    }
}

fn lookup(table: &mut HashMap<MutexHandle, MutexState>, mutex: MutexHandle) -> &mut MutexState {
    table
        .get_mut(&mutex)
        .unwrap_or_else(|| panic!("operation on unknown or destroyed mutex {}", mutex.val()))
}

impl Runtime {
    /// Create an unlocked mutex.
    pub fn mutex_create(&self) -> MutexHandle {
        let mut inner = self.inner.borrow_mut();
        let handle = MutexHandle::new(inner.next_mutex).unwrap();
        inner.next_mutex += 1;
        inner.mutexes.insert(handle, MutexState::new());
        handle
    }

    /// Acquire `mutex`, suspending while another thread holds it.
    ///
    /// An unlocked mutex is taken without suspension. A contended one parks
    /// the caller in the mutex's wait queue; `mutex_unlock` hands the lock
    /// over directly, so the caller owns it as soon as it resumes, with no
    /// re-check.
    pub fn mutex_lock(&self, mutex: MutexHandle) {
        let current = {
            let mut inner = self.inner.borrow_mut();
            let inner = &mut *inner;
            let state = lookup(&mut inner.mutexes, mutex);
            if !state.locked {
                state.locked = true;
                return;
            }
            let current = inner.threads.block_current();
            state.waiters.push_back(current);
            current
        };
        schedule(&self.inner, current);
    }

    /// Release `mutex`.
    ///
    /// With waiters queued, the front waiter becomes the owner and is made
    /// ready; the lock never reads as unlocked in between. With no waiters
    /// the mutex unlocks; releasing an unheld mutex is a no-op.
    pub fn mutex_unlock(&self, mutex: MutexHandle) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let state = lookup(&mut inner.mutexes, mutex);
        if let Some(next) = state.waiters.pop_front() {
            inner.threads.make_ready(next);
        } else {
            state.locked = false;
        }
    }

    /// Destroy `mutex`. Destroying a held or contended mutex is fatal.
    pub fn mutex_destroy(&self, mutex: MutexHandle) {
        let mut inner = self.inner.borrow_mut();
        let state = lookup(&mut inner.mutexes, mutex);
        if state.locked || !state.waiters.is_empty() {
            panic!("destroy of mutex {} while held or contended", mutex.val());
        }
        inner.mutexes.remove(&mutex);
        debug!("destroyed mutex {}", mutex.val());
    }
}
