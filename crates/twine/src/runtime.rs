//! The runtime object: scheduling decisions and the public thread API.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{debug, error, trace};

use crate::arch::{self, Context, RawEntry};
use crate::error::RuntimeError;
use crate::stack::DEFAULT_STACK_SIZE;
use crate::sync::condvar::CondState;
use crate::sync::mutex::MutexState;
use crate::thread::tcb::ThreadState;
use crate::thread::ThreadManager;
use crate::types::{CondHandle, MutexHandle, ThreadHandle};

/// Runtime construction parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// Stack size for spawned threads, in bytes. The adopted main thread
    /// keeps its OS stack.
    pub stack_size: usize,
    /// Upper bound on concurrently sleeping threads; `None` leaves the
    /// sleep registry unbounded.
    pub max_sleeping: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            max_sleeping: None,
        }
    }
}

pub(crate) struct Inner {
    pub(crate) threads: ThreadManager,
    pub(crate) mutexes: HashMap<MutexHandle, MutexState>,
    pub(crate) condvars: HashMap<CondHandle, CondState>,
    pub(crate) next_mutex: u32,
    pub(crate) next_cond: u32,
}

/// A cooperative threading runtime.
///
/// One runtime multiplexes any number of logical threads onto the OS thread
/// that created it. All scheduler state hangs off this object; independent
/// runtimes can coexist in one process. The handle is cheap to clone, and
/// every spawned thread's body receives a borrowed handle to the runtime
/// that is running it.
///
/// Exactly one logical thread executes at a time. Control moves only at
/// suspension points: [`yield_now`](Runtime::yield_now),
/// [`exit`](Runtime::exit), [`join`](Runtime::join), a contended
/// [`mutex_lock`](Runtime::mutex_lock), [`cond_wait`](Runtime::cond_wait),
/// and [`sleep_usecs`](Runtime::sleep_usecs).
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RefCell<Inner>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner's side of a spawned thread; redeem it with [`Runtime::join`].
#[must_use = "a thread's stack and return value are only reclaimed by join"]
pub struct JoinHandle<T> {
    handle: ThreadHandle,
    _value: PhantomData<fn() -> T>,
}

impl<T> JoinHandle<T> {
    /// Untyped handle of the underlying thread.
    pub fn thread(&self) -> ThreadHandle {
        self.handle
    }
}

type BoxedBody = Box<dyn FnOnce(&Runtime) -> Box<dyn Any>>;

impl Runtime {
    /// Initialize a runtime, adopting the calling execution context as its
    /// first (and currently running) thread.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let inner = Inner {
            threads: ThreadManager::new(config.stack_size, config.max_sleeping),
            mutexes: HashMap::new(),
            condvars: HashMap::new(),
            next_mutex: 1,
            next_cond: 1,
        };
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// Handle of the currently running thread.
    pub fn current(&self) -> ThreadHandle {
        self.inner.borrow().threads.current
    }

    /// Spawn a thread running `body`. The new thread joins the back of the
    /// ready queue and first runs once the spawner reaches a suspension
    /// point; returning from `body` exits the thread with the returned
    /// value.
    pub fn spawn<T, F>(&self, body: F) -> JoinHandle<T>
    where
        T: 'static,
        F: FnOnce(&Runtime) -> T + 'static,
    {
        let body: BoxedBody = Box::new(move |rt| Box::new(body(rt)) as Box<dyn Any>);
        let body = Box::into_raw(Box::new(body));
        let state = Box::into_raw(Box::new(Rc::downgrade(&self.inner)));
        // SAFETY: `trampoline` consumes exactly these two allocations and
        // terminates through the scheduler.
        let handle = unsafe { self.spawn_raw(trampoline, body.cast(), state.cast()) };
        JoinHandle {
            handle,
            _value: PhantomData,
        }
    }

    /// Spawn a thread with the raw two-argument entry convention. Shares the
    /// stack-bootstrap path with [`spawn`](Runtime::spawn), which is the
    /// one-argument convention wrapped in a trampoline.
    ///
    /// # Safety
    /// `entry` must never return: it has to end its thread via
    /// [`Runtime::exit`], reachable through `arg1`/`arg2` by the caller's
    /// own arrangement. Raw threads are joined with
    /// [`join_raw`](Runtime::join_raw).
    pub unsafe fn spawn_raw(
        &self,
        entry: RawEntry,
        arg1: *mut u8,
        arg2: *mut u8,
    ) -> ThreadHandle {
        let mut inner = self.inner.borrow_mut();
        // SAFETY: forwarded contract.
        unsafe { inner.threads.create(entry, arg1, arg2) }
    }

    /// Give up the processor and rejoin the back of the ready queue.
    pub fn yield_now(&self) {
        let current = {
            let mut inner = self.inner.borrow_mut();
            let current = inner.threads.current;
            inner.threads.make_ready(current);
            current
        };
        schedule(&self.inner, current);
    }

    /// Terminate the current thread, storing `value` for its joiner. Never
    /// returns.
    ///
    /// Stack frames still live on this thread are abandoned without running
    /// their destructors, like `pthread_exit`; prefer returning from the
    /// spawn closure when nothing requires an early exit.
    pub fn exit<T: 'static>(&self, value: T) -> ! {
        exit_current(&self.inner, Box::new(value))
    }

    /// Wait for a spawned thread to exit and collect its value, freeing the
    /// target's stack and control block. Returns without suspending if the
    /// target has already exited.
    pub fn join<T: 'static>(&self, handle: JoinHandle<T>) -> T {
        match self.join_raw(handle.handle).downcast::<T>() {
            Ok(value) => *value,
            Err(_) => panic!(
                "thread {} exited with an unexpected value type",
                handle.handle.val()
            ),
        }
    }

    /// Untyped join.
    ///
    /// Fatal on self-join, on joining an unknown or already-joined handle,
    /// and when the target already has a different waiting joiner.
    pub fn join_raw(&self, target: ThreadHandle) -> Box<dyn Any> {
        loop {
            let current = {
                let mut inner = self.inner.borrow_mut();
                let threads = &mut inner.threads;
                let current = threads.current;
                if current == target {
                    panic!("thread {} cannot join itself", target.val());
                }
                let Some(tcb) = threads.table.get_mut(&target) else {
                    panic!("join of unknown or already-joined thread {}", target.val());
                };
                if tcb.state == ThreadState::Exited {
                    break;
                }
                match tcb.joiner {
                    Some(waiting) if waiting != current => panic!(
                        "thread {} already has a waiting joiner {}",
                        target.val(),
                        waiting.val()
                    ),
                    _ => tcb.joiner = Some(current),
                }
                threads.block_current()
            };
            schedule(&self.inner, current);
        }

        let mut inner = self.inner.borrow_mut();
        let tcb = inner
            .threads
            .table
            .remove(&target)
            .expect("exited thread still registered");
        debug!("joined thread {}", target.val());
        tcb.value.expect("exited thread stored a value")
    }

    /// Suspend the current thread until at least `usecs` microseconds have
    /// passed.
    ///
    /// The bound is one-sided: the thread runs again the first time the
    /// scheduler observes the expired deadline with no more urgent ready
    /// work. Fails only when a configured sleep-registry capacity is
    /// exhausted.
    pub fn sleep_usecs(&self, usecs: u64) -> Result<(), RuntimeError> {
        let current = {
            let mut inner = self.inner.borrow_mut();
            let threads = &mut inner.threads;
            let deadline = threads.now_usecs().saturating_add(usecs);
            let current = threads.current;
            threads.sleepers.register(current, deadline)?;
            if let Some(tcb) = threads.table.get_mut(&current) {
                tcb.state = ThreadState::Sleeping;
            }
            current
        };
        schedule(&self.inner, current);
        Ok(())
    }

    /// [`sleep_usecs`](Runtime::sleep_usecs) with a [`Duration`].
    pub fn sleep(&self, duration: Duration) -> Result<(), RuntimeError> {
        self.sleep_usecs(duration.as_micros() as u64)
    }
}

/// First (and only) Rust frame at the bottom of every spawned thread's
/// stack: runs the boxed body, then exits with its boxed return value.
unsafe extern "C" fn trampoline(body: *mut u8, state: *mut u8) {
    // SAFETY: `spawn` passed ownership of both allocations to this thread.
    let body = unsafe { Box::from_raw(body.cast::<BoxedBody>()) };
    let state = unsafe { Box::from_raw(state.cast::<Weak<RefCell<Inner>>>()) };
    let runtime = Runtime {
        inner: state
            .upgrade()
            .expect("runtime state dropped before thread first ran"),
    };
    drop(state);
    let inner = Rc::as_ptr(&runtime.inner);
    let value = (*body)(&runtime);
    // Release this thread's strong reference before the final switch; see
    // the safety argument below.
    drop(runtime);
    // SAFETY: the runtime state outlives this call. Execution only reaches a
    // spawned thread through a switch made inside a method on a live runtime
    // handle, and the adopted main thread's own handle is either still live
    // in a caller frame or permanently stranded (and thus still counted), so
    // the strong count cannot hit zero here.
    unsafe { exit_current(&*inner, value) }
}

/// Terminate the current thread: store its value, mark it exited, wake a
/// registered joiner, and schedule away forever. The exiting thread is in no
/// queue, so it is never selected again.
pub(crate) fn exit_current(inner: &RefCell<Inner>, value: Box<dyn Any>) -> ! {
    let current = {
        let mut state = inner.borrow_mut();
        let threads = &mut state.threads;
        let current = threads.current;
        let joiner = {
            let tcb = threads
                .table
                .get_mut(&current)
                .expect("current thread is registered");
            tcb.state = ThreadState::Exited;
            tcb.value = Some(value);
            tcb.joiner.take()
        };
        if let Some(joiner) = joiner {
            threads.make_ready(joiner);
        }
        debug!("thread {} exited", current.val());
        current
    };
    schedule(inner, current);
    unreachable!("exited thread was scheduled again")
}

/// One scheduling decision: wake expired sleepers, pick the FIFO front, and
/// switch to it, saving the suspending caller into `save_for`'s control
/// block.
///
/// Callers park the current thread (ready queue, a wait queue, or the sleep
/// registry) *before* calling; `schedule` never enqueues its caller. With
/// nothing ready the whole process sleeps until the earliest wake deadline
/// and rescans. With nothing ready and nothing sleeping, every remaining
/// thread is blocked with no path to resume: total deadlock, reported as
/// fatal rather than spun on.
pub(crate) fn schedule(inner: &RefCell<Inner>, save_for: ThreadHandle) {
    loop {
        let mut state = inner.borrow_mut();
        let threads = &mut state.threads;
        let now = threads.now_usecs();
        threads.wake_expired(now);

        if let Some(next) = threads.run_queue.pick() {
            if next == threads.current {
                // The caller re-enqueued itself and came straight back up.
                if let Some(tcb) = threads.table.get_mut(&next) {
                    tcb.state = ThreadState::Running;
                }
                return;
            }
            let previous = threads.current;
            threads.current = next;
            let target = {
                let tcb = threads
                    .table
                    .get_mut(&next)
                    .expect("ready thread is registered");
                tcb.state = ThreadState::Running;
                tcb.context
            };
            let save: *mut Context = &mut threads
                .table
                .get_mut(&save_for)
                .expect("suspending thread is registered")
                .context;
            trace!("switch {} -> {}", previous.val(), next.val());
            drop(state);
            // SAFETY: `save` points into a control block nothing can touch
            // before the switch writes it, and `target` was stored by an
            // earlier switch or bootstrap on a stack that is still alive.
            unsafe { arch::switch_context(save, target) };
            return;
        }

        match threads.sleepers.earliest() {
            Some(deadline) => {
                let wait = deadline.saturating_sub(now);
                drop(state);
                // Nothing runnable: block the whole process until the next
                // deadline can have passed, then rescan.
                if wait > 0 {
                    std::thread::sleep(Duration::from_micros(wait));
                }
            }
            None => {
                let blocked = threads.blocked();
                error!(
                    "scheduler deadlock: no ready or sleeping threads, {} blocked",
                    blocked.len()
                );
                panic!(
                    "scheduler deadlock: no ready or sleeping threads ({} blocked with no signaler)",
                    blocked.len()
                );
            }
        }
    }
}
