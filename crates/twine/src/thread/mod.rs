//! Thread lifecycle bookkeeping: control blocks, the ready queue, and the
//! sleep registry.

pub(crate) mod scheduler;
pub(crate) mod tcb;

use std::collections::HashMap;
use std::time::Instant;

use log::debug;

use scheduler::{FifoQueue, RunQueue, SleepRegistry};
use tcb::{Tcb, ThreadState};

use crate::arch::{self, RawEntry};
use crate::stack::Stack;
use crate::types::ThreadHandle;

/// Handle of the adopted main thread.
const MAIN_THREAD: u32 = 1;

pub(crate) struct ThreadManager {
    pub(crate) table: HashMap<ThreadHandle, Tcb>,
    pub(crate) run_queue: Box<dyn RunQueue>,
    pub(crate) sleepers: SleepRegistry,
    pub(crate) current: ThreadHandle,
    next_handle: u32,
    stack_size: usize,
    epoch: Instant,
}

impl ThreadManager {
    /// Adopts the calling execution context as the first running thread.
    pub(crate) fn new(stack_size: usize, max_sleeping: Option<usize>) -> Self {
        let main = ThreadHandle::new(MAIN_THREAD).unwrap();
        let mut table = HashMap::new();
        table.insert(main, Tcb::adopted(main));
        Self {
            table,
            run_queue: Box::new(FifoQueue::new()),
            sleepers: SleepRegistry::new(max_sleeping),
            current: main,
            next_handle: MAIN_THREAD + 1,
            stack_size,
            epoch: Instant::now(),
        }
    }

    /// Microseconds since this runtime was initialized.
    pub(crate) fn now_usecs(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    /// Allocate a stack, lay down the initial frame, and put the new thread
    /// at the back of the ready queue.
    ///
    /// # Safety
    /// `entry` must never return: it has to terminate its thread through the
    /// scheduler, and it must honor its own contract for `arg1`/`arg2`.
    pub(crate) unsafe fn create(
        &mut self,
        entry: RawEntry,
        arg1: *mut u8,
        arg2: *mut u8,
    ) -> ThreadHandle {
        let handle = ThreadHandle::new(self.next_handle).unwrap();
        self.next_handle += 1;

        let stack = Stack::new(self.stack_size);
        // SAFETY: the stack is freshly allocated and owned by the new
        // thread's control block for as long as the context can run.
        let context = unsafe { arch::bootstrap_stack(stack.base(), stack.len(), entry, arg1, arg2) };
        debug!(
            "created thread {} ({} KiB stack)",
            handle.val(),
            stack.len() / 1024
        );
        self.table
            .insert(handle, Tcb::bootstrapped(handle, stack, context));
        self.run_queue.push(handle);
        handle
    }

    /// Move a suspended thread to the back of the ready queue.
    pub(crate) fn make_ready(&mut self, handle: ThreadHandle) {
        if let Some(tcb) = self.table.get_mut(&handle) {
            tcb.state = ThreadState::Ready;
        }
        self.run_queue.push(handle);
    }

    /// Mark the current thread blocked and return its handle; the caller
    /// parks it in a wait queue and schedules.
    pub(crate) fn block_current(&mut self) -> ThreadHandle {
        let current = self.current;
        if let Some(tcb) = self.table.get_mut(&current) {
            tcb.state = ThreadState::Blocked;
        }
        current
    }

    /// Move every sleeper whose deadline has passed into the ready queue.
    pub(crate) fn wake_expired(&mut self, now: u64) {
        if self.sleepers.is_empty() {
            return;
        }
        for handle in self.sleepers.drain_expired(now) {
            self.make_ready(handle);
        }
    }

    /// Threads parked in some wait queue; reported on deadlock.
    pub(crate) fn blocked(&self) -> Vec<ThreadHandle> {
        self.table
            .values()
            .filter(|tcb| tcb.state == ThreadState::Blocked)
            .map(|tcb| tcb.handle)
            .collect()
    }
}
