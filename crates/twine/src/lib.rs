//! Cooperative user-level threads: many logical threads multiplexed onto a
//! single OS thread by explicit stack switching.
//!
//! A [`Runtime`] owns all scheduler state (the thread table, the FIFO ready
//! queue, the sleep registry, and the mutex/condition tables) and adopts
//! the calling execution context as its first thread. Spawned threads get
//! their own fixed-size stacks and run only when the current thread reaches
//! a suspension point; between two suspension points a thread is never
//! interrupted, so shared state needs no atomic operations.
//!
//! ```
//! use twine::Runtime;
//!
//! let rt = Runtime::new();
//! let worker = rt.spawn(|rt| {
//!     rt.yield_now();
//!     21
//! });
//! assert_eq!(rt.join(worker) * 2, 42);
//! ```
//!
//! On top of the same ready-queue mechanism the runtime offers a binary
//! mutex with FIFO lock handoff, POSIX-style condition variables, and timed
//! sleep. There is no preemption, no parallelism, and no fairness beyond
//! FIFO: a thread that never yields, blocks, sleeps, or exits runs forever.

mod arch;
mod error;
mod runtime;
mod stack;
mod sync;
mod thread;
mod types;

pub use arch::RawEntry;
pub use error::RuntimeError;
pub use runtime::{Config, JoinHandle, Runtime};
pub use stack::{DEFAULT_STACK_SIZE, MIN_STACK_SIZE};
pub use types::{CondHandle, MutexHandle, ThreadHandle};
