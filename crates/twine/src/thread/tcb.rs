use std::any::Any;

use crate::arch::Context;
use crate::stack::Stack;
use crate::types::ThreadHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThreadState {
    Ready,
    Running,
    /// Parked in a mutex, condition, or joiner wait queue.
    Blocked,
    Sleeping,
    Exited,
}

/// Per-thread control block.
///
/// The saved context is meaningful only while the thread is suspended; the
/// stored value only once it has exited. A thread sits in at most one queue
/// at a time (ready queue, a wait queue, or the sleep registry), or in none
/// while it is the running thread.
pub(crate) struct Tcb {
    pub(crate) handle: ThreadHandle,
    pub(crate) state: ThreadState,
    pub(crate) context: Context,
    /// Owned stack memory. `None` for the adopted main thread, which keeps
    /// the stack the OS gave the process.
    pub(crate) stack: Option<Stack>,
    /// Value passed to exit, held until the joiner collects it.
    pub(crate) value: Option<Box<dyn Any>>,
    /// At most one thread may wait for this one to exit.
    pub(crate) joiner: Option<ThreadHandle>,
}

impl Tcb {
    /// Control block for a freshly bootstrapped thread.
    pub(crate) fn bootstrapped(handle: ThreadHandle, stack: Stack, context: Context) -> Self {
        Self {
            handle,
            state: ThreadState::Ready,
            context,
            stack: Some(stack),
            value: None,
            joiner: None,
        }
    }

    /// Control block adopting the calling OS-provided execution context.
    pub(crate) fn adopted(handle: ThreadHandle) -> Self {
        Self {
            handle,
            state: ThreadState::Running,
            context: Context::null(),
            stack: None,
            value: None,
            joiner: None,
        }
    }
}
