//! Writes one emitted record directly to `stdout`'s file descriptor via
//! `libc::write`, bypassing `std::io::Stdout`.
//!
//! `std::io::Stdout` is backed by a `LineWriter` whose internal buffer is a
//! `Vec<u8>`: growing or dropping it allocates and deallocates through this
//! crate's own `GlobalAlloc` impl. At process exit the runtime flushes and
//! drops that buffer from `std::rt::cleanup`, outside any call this crate's
//! re-entrancy guard protects, and re-entering `std::io::stdout()` from
//! inside that drop panics ("RefCell already borrowed"). Writing to the raw
//! fd through a fixed-size stack buffer touches neither the heap nor that
//! shared buffer, so it is safe to call from both the hot path and from a
//! `Drop` running during process teardown.

use std::io::Cursor;

const BUF_LEN: usize = 256;

/// Builds a record with `build` into a fixed-size stack buffer and writes it
/// to fd 1 in a single syscall. Silently drops the record if `build` fails
/// (buffer too small) or the write itself fails, matching the interposer's
/// stance that logging must never be allowed to fail the allocation.
pub fn emit_line(build: impl FnOnce(&mut Cursor<&mut [u8]>) -> std::io::Result<()>) {
    let mut stack_buf = [0u8; BUF_LEN];
    let mut cursor = Cursor::new(&mut stack_buf[..]);
    if build(&mut cursor).is_err() {
        return;
    }
    let len = cursor.position() as usize;
    // SAFETY: stack_buf is valid for `len` bytes and outlives the call.
    unsafe {
        libc::write(1, stack_buf.as_ptr().cast(), len);
    }
}
