// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use libc::{
    mmap, sigaltstack, MAP_ANON, MAP_FAILED, MAP_PRIVATE, PROT_NONE, PROT_READ, PROT_WRITE,
    SIGSTKSZ,
};
use std::ptr;

/// Allocates a signal altstack for the calling thread, and puts a guard page
/// at the end. The mapping is never released: the handlers may run on it up
/// to the moment the process exits.
/// Inspired by https://github.com/rust-lang/rust/pull/69969/files
///
/// # Safety
/// Replaces any altstack the calling thread already had. Must not be called
/// while running on the current altstack.
pub(crate) unsafe fn create_alt_stack() -> anyhow::Result<()> {
    // The greater of 16 pages or SIGSTKSZ: rendering the fault detail and the
    // condition variable wait are cheap, but chained handlers may not be.
    let page_size = page_size::get();
    let sigalstack_base_size = std::cmp::max(SIGSTKSZ, 16 * page_size);
    let stackp = mmap(
        ptr::null_mut(),
        sigalstack_base_size + page_size,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANON,
        -1,
        0,
    );
    anyhow::ensure!(
        stackp != MAP_FAILED,
        "failed to allocate an alternative stack"
    );
    let guard_result = libc::mprotect(stackp, page_size, PROT_NONE);
    anyhow::ensure!(
        guard_result == 0,
        "failed to set up alternative stack guard page"
    );
    let stackp = stackp.add(page_size);

    let stack = libc::stack_t {
        ss_sp: stackp,
        ss_flags: 0,
        ss_size: sigalstack_base_size,
    };
    let rval = sigaltstack(&stack, ptr::null_mut());
    anyhow::ensure!(
        rval == 0,
        "sigaltstack failed: {}",
        std::io::Error::last_os_error()
    );
    Ok(())
}

/// The altstack currently registered for the calling thread, if any.
pub(crate) fn current_alt_stack() -> Option<libc::stack_t> {
    let mut stack = libc::stack_t {
        ss_sp: ptr::null_mut(),
        ss_flags: 0,
        ss_size: 0,
    };
    // SAFETY: a null new stack only queries the current one.
    let res = unsafe { sigaltstack(ptr::null(), &mut stack) };
    (res == 0 && stack.ss_flags & libc::SS_DISABLE == 0).then_some(stack)
}
