//! x86_64 System V implementation.

use core::arch::naked_asm;

use super::{Context, RawEntry};

/// Words popped by `switch_context` when resuming: r15, r14, r13, r12, rbx,
/// rbp, then the return target.
const FRAME_WORDS: usize = 7;

/// Save the caller's resumable state into `save`, then transfer execution to
/// `target`. Returns only when a later switch resumes the saved context.
///
/// Only the SysV callee-saved set (rbx, rbp, r12–r15) crosses a switch; the
/// compiler treats this as an ordinary call and reloads everything else.
///
/// # Safety
/// `save` must point to writable context storage, and `target` must have
/// been produced by this function or [`bootstrap_stack`] on a stack that is
/// still allocated and not currently executing.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn switch_context(save: *mut Context, target: Context) {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov [rdi], rsp",
        "mov rsp, rsi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    )
}

// First frame of every bootstrapped thread: forwards the two arguments
// staged in r13/r14 into the entry staged in r12. The entry must terminate
// its thread through the scheduler; falling through is a contract violation.
#[unsafe(naked)]
unsafe extern "C" fn thread_start() {
    naked_asm!(
        "mov rdi, r13",
        "mov rsi, r14",
        "call r12",
        "ud2",
    )
}

/// Lay down an initial frame on `stack` so that the first switch into the
/// returned context invokes `entry(arg1, arg2)`.
///
/// # Safety
/// `stack..stack + len` must be writable memory reserved for the new thread
/// and large enough for the restore frame; `entry` must never return.
pub(crate) unsafe fn bootstrap_stack(
    stack: *mut u8,
    len: usize,
    entry: RawEntry,
    arg1: *mut u8,
    arg2: *mut u8,
) -> Context {
    unsafe {
        // Align the top to 16 so `thread_start` begins with rsp ≡ 0 mod 16;
        // its `call` then hands the entry an ABI-aligned stack.
        let top = (stack.add(len) as usize & !0xF) as *mut u64;
        let sp = top.sub(FRAME_WORDS);
        sp.add(0).write(0); // r15
        sp.add(1).write(arg2 as u64); // r14
        sp.add(2).write(arg1 as u64); // r13
        sp.add(3).write(entry as usize as u64); // r12
        sp.add(4).write(0); // rbx
        sp.add(5).write(0); // rbp
        sp.add(6).write(thread_start as usize as u64); // return target
        Context(sp.cast())
    }
}
