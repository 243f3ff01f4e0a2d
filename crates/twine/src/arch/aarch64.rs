//! aarch64 AAPCS64 implementation.

use core::arch::naked_asm;

use super::{Context, RawEntry};

/// Bytes of one restore frame: x19–x28, fp, lr, d8–d15.
const FRAME_BYTES: usize = 160;

/// Save the caller's resumable state into `save`, then transfer execution to
/// `target`. Returns only when a later switch resumes the saved context.
///
/// Only the AAPCS64 callee-saved set (x19–x28, fp, lr, d8–d15) crosses a
/// switch; the compiler treats this as an ordinary call and reloads
/// everything else.
///
/// # Safety
/// `save` must point to writable context storage, and `target` must have
/// been produced by this function or [`bootstrap_stack`] on a stack that is
/// still allocated and not currently executing.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn switch_context(save: *mut Context, target: Context) {
    naked_asm!(
        "sub sp, sp, #160",
        "stp x19, x20, [sp, #0]",
        "stp x21, x22, [sp, #16]",
        "stp x23, x24, [sp, #32]",
        "stp x25, x26, [sp, #48]",
        "stp x27, x28, [sp, #64]",
        "stp x29, x30, [sp, #80]",
        "stp d8, d9, [sp, #96]",
        "stp d10, d11, [sp, #112]",
        "stp d12, d13, [sp, #128]",
        "stp d14, d15, [sp, #144]",
        "mov x2, sp",
        "str x2, [x0]",
        "mov sp, x1",
        "ldp x19, x20, [sp, #0]",
        "ldp x21, x22, [sp, #16]",
        "ldp x23, x24, [sp, #32]",
        "ldp x25, x26, [sp, #48]",
        "ldp x27, x28, [sp, #64]",
        "ldp x29, x30, [sp, #80]",
        "ldp d8, d9, [sp, #96]",
        "ldp d10, d11, [sp, #112]",
        "ldp d12, d13, [sp, #128]",
        "ldp d14, d15, [sp, #144]",
        "add sp, sp, #160",
        "ret",
    )
}

// First frame of every bootstrapped thread: forwards the two arguments
// staged in x20/x21 into the entry staged in x19. The entry must terminate
// its thread through the scheduler; falling through is a contract violation.
#[unsafe(naked)]
unsafe extern "C" fn thread_start() {
    naked_asm!(
        "mov x0, x20",
        "mov x1, x21",
        "blr x19",
        "brk #0",
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
        // sp must stay 16-aligned at every public interface; the frame is a
        // multiple of 16, so align the top and build downward.
        let top = (stack.add(len) as usize & !0xF) as *mut u64;
        let sp = top.sub(FRAME_BYTES / 8);
        core::ptr::write_bytes(sp, 0, FRAME_BYTES / 8);
        sp.add(0).write(entry as usize as u64); // x19
        sp.add(1).write(arg1 as u64); // x20
        sp.add(2).write(arg2 as u64); // x21
        sp.add(11).write(thread_start as usize as u64); // x30: ret target
        Context(sp.cast())
    }
}
