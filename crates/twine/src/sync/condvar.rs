//! Condition variables: a wait queue decoupled from lock state.

use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::runtime::{schedule, Runtime};
use crate::types::{CondHandle, MutexHandle, ThreadHandle};

/// Wait-queue record. Carries no lock state and is bound to no particular
/// mutex; callers pass the mutex explicitly, POSIX-style.
pub(crate) struct CondState {
    pub(crate) waiters: VecDeque<ThreadHandle>,
}

impl CondState {
    pub(crate) fn new() -> Self {
        Self {
            waiters: VecDeque::new(),
        }
    }
}

fn lookup(table: &mut HashMap<CondHandle, CondState>, cond: CondHandle) -> &mut CondState {
    table
        .get_mut(&cond)
        .unwrap_or_else(|| panic!("operation on unknown or destroyed condition {}", cond.val()))
}

impl Runtime {
    /// Create a condition variable with an empty wait queue.
    pub fn cond_create(&self) -> CondHandle {
        let mut inner = self.inner.borrow_mut();
        let handle = CondHandle::new(inner.next_cond).unwrap();
        inner.next_cond += 1;
        inner.condvars.insert(handle, CondState::new());
        handle
    }

    /// Release `mutex` and wait on `cond`; re-acquires `mutex` before
    /// returning.
    ///
    /// The caller joins the wait queue before the unlock, and no other
    /// logical thread can run between the unlock and the suspension, so the
    /// unlocked-but-not-yet-waiting window is unobservable.
    pub fn cond_wait(&self, cond: CondHandle, mutex: MutexHandle) {
        let current = {
            let mut inner = self.inner.borrow_mut();
            let inner = &mut *inner;
            assert!(
                inner.mutexes.contains_key(&mutex),
                "cond_wait with unknown or destroyed mutex {}",
                mutex.val()
            );
            let state = lookup(&mut inner.condvars, cond);
            let current = inner.threads.block_current();
            state.waiters.push_back(current);
            current
        };
        self.mutex_unlock(mutex);
        schedule(&self.inner, current);
        self.mutex_lock(mutex);
    }

    /// Wake the longest-waiting thread, if any. Signaling an empty condition
    /// is a no-op. The mutex is untouched; the woken thread re-acquires it
    /// inside [`cond_wait`](Runtime::cond_wait) when it resumes.
    pub fn cond_signal(&self, cond: CondHandle) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let state = lookup(&mut inner.condvars, cond);
        if let Some(next) = state.waiters.pop_front() {
            inner.threads.make_ready(next);
        }
    }

    /// Wake every waiting thread, leaving the wait queue empty.
    pub fn cond_broadcast(&self, cond: CondHandle) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let state = lookup(&mut inner.condvars, cond);
        while let Some(next) = state.waiters.pop_front() {
            inner.threads.make_ready(next);
        }
    }

    /// Destroy `cond`. Fatal while any thread still waits on it.
    pub fn cond_destroy(&self, cond: CondHandle) {
        let mut inner = self.inner.borrow_mut();
        let state = lookup(&mut inner.condvars, cond);
        if !state.waiters.is_empty() {
            panic!("destroy of condition {} with waiting threads", cond.val());
        }
        inner.condvars.remove(&cond);
        debug!("destroyed condition {}", cond.val());
    }
}
