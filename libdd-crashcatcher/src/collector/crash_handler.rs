// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::fault_state::{suspend_forever, Admission, FaultGate, FaultState};
use super::rendezvous::Rendezvous;
use super::signal_handler_manager::{chain_signal_handler, raise_with_default_disposition};
use crate::crash_info::ThreadIdentity;
use crate::shared::constants::{CRASHCATCHER_EXIT_STATUS, CRASHCATCHER_REENTRY_EXIT_STATUS};
use libc::{c_void, siginfo_t};
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::OnceLock;
use std::time::Duration;

// Note that this file makes use of the following async-signal safe functions in a signal
// handler. <https://man7.org/linux/man-pages/man7/signal-safety.7.html>
// - _exit
// - getpid
// - pause
// - prctl / gettid (thread identity)
// - pthread_sigmask
// - raise
// - sigaction
// Two calls are deliberately outside that list: the futex-based mutex/condvar
// of the rendezvous, which only one faulting thread can ever reach, and `exit`,
// so that atexit hooks still run after a handled fault.

pub(crate) static FAULT_GATE: FaultGate = FaultGate::new();
pub(crate) static RENDEZVOUS: Rendezvous = Rendezvous::new();

/// The parts of the configuration the signal handler needs.
#[derive(Debug, Copy, Clone, Default)]
pub(crate) struct HandlingOptions {
    pub report_timeout: Option<Duration>,
    pub restore_default_disposition: bool,
}

static OPTIONS: OnceLock<HandlingOptions> = OnceLock::new();

/// Stores the options for the signal handler. Only the first call has an
/// effect; the caller guarantees it happens once, before handlers are live.
pub(crate) fn set_handling_options(options: HandlingOptions) {
    let _ = OPTIONS.set(options);
}

// The worker thread does not survive fork: only the process that spawned it
// may wait for it.
static WORKER_PID: AtomicI32 = AtomicI32::new(0);

pub(crate) fn set_worker_process() {
    WORKER_PID.store(std::process::id() as i32, SeqCst);
}

fn worker_in_this_process() -> bool {
    // SAFETY: No preconditions.
    WORKER_PID.load(SeqCst) == unsafe { libc::getpid() }
}

/// Current progress of fault handling in this process.
pub fn fault_state() -> FaultState {
    FAULT_GATE.state()
}

pub(crate) extern "C" fn handle_posix_sigaction(
    signum: i32,
    sig_info: *mut siginfo_t,
    ucontext: *mut c_void,
) {
    match FAULT_GATE.enter(ThreadIdentity::current_tid()) {
        Admission::Proceed => {}
        // Only one fault may use the detail buffer and the rendezvous.
        Admission::Suspend => suspend_forever(),
        // The handling thread faulted again before finishing, typically a
        // chained handler calling abort(). Die by this signal instead.
        Admission::Nested => {
            // SAFETY: the process is going down either way.
            unsafe {
                raise_with_default_disposition(signum);
                libc::_exit(CRASHCATCHER_REENTRY_EXIT_STATUS)
            }
        }
        // The teardown after a handled fault crashed: nothing safe is left to do.
        // SAFETY: No preconditions.
        Admission::Terminate => unsafe { libc::_exit(CRASHCATCHER_REENTRY_EXIT_STATUS) },
    }

    let options = OPTIONS.get().copied().unwrap_or_default();
    let si_code = if sig_info.is_null() {
        0
    } else {
        // SAFETY: the kernel hands us a valid siginfo_t for SA_SIGINFO handlers.
        unsafe { (*sig_info).si_code }
    };
    let thread = ThreadIdentity::current();

    // Whether the report was delivered, timed out or had no worker, handling
    // continues: the process must still die the way it would have.
    if worker_in_this_process() {
        let _ = RENDEZVOUS.hand_off(
            |detail| detail.render(signum, si_code, &thread),
            options.report_timeout,
        );
    }

    // SAFETY: the arguments are the ones we were invoked with.
    unsafe {
        chain_signal_handler(
            signum,
            sig_info,
            ucontext,
            options.restore_default_disposition,
        )
    };

    FAULT_GATE.finish();
    // SAFETY: No preconditions.
    unsafe { libc::exit(CRASHCATCHER_EXIT_STATUS) }
}
