// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::crash_handler::handle_posix_sigaction;
use super::signal_set::ConcernedSignal;
use libc::{c_void, siginfo_t};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler};
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;

// Linux seems to have the most, supporting up to 64 inclusive
// https://man7.org/linux/man-pages/man7/signal.7.html
const MAX_SIGNALS: usize = 65;

/// What was installed for a signal before the crash catcher took over.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChainTarget {
    /// `SIG_DFL`.
    Default,
    /// `SIG_IGN`.
    Ignore,
    /// A handler receiving only the signal number.
    Simple(extern "C" fn(libc::c_int)),
    /// An `SA_SIGINFO` handler receiving the fault metadata and machine context.
    Extended(extern "C" fn(libc::c_int, *mut siginfo_t, *mut c_void)),
}

impl From<SigHandler> for ChainTarget {
    fn from(handler: SigHandler) -> Self {
        match handler {
            SigHandler::SigDfl => ChainTarget::Default,
            SigHandler::SigIgn => ChainTarget::Ignore,
            SigHandler::Handler(f) => ChainTarget::Simple(f),
            SigHandler::SigAction(f) => ChainTarget::Extended(f),
        }
    }
}

/// One slot of the handler chain store.
#[derive(Debug, Copy, Clone)]
pub(crate) struct PreviousHandlerEntry {
    signal: ConcernedSignal,
    action: SigAction,
    target: ChainTarget,
}

impl PreviousHandlerEntry {
    fn new(signal: ConcernedSignal, action: SigAction) -> Self {
        Self {
            signal,
            action,
            target: action.handler().into(),
        }
    }

    pub fn target(&self) -> ChainTarget {
        self.target
    }
}

static mut HANDLERS: [Option<PreviousHandlerEntry>; MAX_SIGNALS] = [None; MAX_SIGNALS];
static INIT_STARTED: AtomicBool = AtomicBool::new(false);
static INIT_FINISHED: AtomicBool = AtomicBool::new(false);

/// Result of installing the handlers for a set of signals.
#[derive(Debug, Default)]
pub(crate) struct Registration {
    pub installed: Vec<ConcernedSignal>,
    pub failed: Vec<(ConcernedSignal, String)>,
}

/// Claims the right to populate the handler chain store.
/// Only the first caller in the process gets `true`.
pub(crate) fn claim_registration() -> bool {
    INIT_STARTED
        .compare_exchange(false, true, SeqCst, SeqCst)
        .is_ok()
}

/// Installs the crash handler for every requested signal and records what
/// was there before. A signal that cannot be registered is reported in the
/// result and skipped; the remaining ones are still installed.
///
/// PRECONDITIONS:
///     `claim_registration()` returned true for this caller.
/// ATOMICITY:
///     Setting the crash handler itself is not an atomic operation and hence it is possible that a
///     concurrent operation could see partial execution of this function.
///     If a crash occurs during execution of this function, the crash handler may be registered
///     while the previous handler is not yet stored. The crash is still reported, but chaining is
///     skipped for it.
pub(crate) fn register_crash_handlers(
    signals: &[ConcernedSignal],
    use_alt_stack: bool,
) -> Registration {
    let mut registration = Registration::default();
    for signal in signals {
        let index = signal.signum() as usize;
        if index >= MAX_SIGNALS {
            registration
                .failed
                .push((*signal, format!("signal number {index} out of range")));
            continue;
        }
        // Safety: This function has no documented preconditions.
        match unsafe { register_signal_handler(*signal, use_alt_stack) } {
            // SAFETY:
            // There are only two functions that reference `HANDLERS`.
            // At this point, `INIT_STARTED` is `true` and `INIT_FINISHED` is false.
            // Only the caller that won `claim_registration` gets here, and
            // `chain_signal_handler` does not read until `INIT_FINISHED` is true.
            Ok(old) => {
                unsafe { HANDLERS[index] = Some(PreviousHandlerEntry::new(*signal, old)) };
                registration.installed.push(*signal);
            }
            Err(e) => registration.failed.push((*signal, e.to_string())),
        }
    }
    INIT_FINISHED.store(true, SeqCst);
    registration
}

unsafe fn register_signal_handler(
    signal: ConcernedSignal,
    use_alt_stack: bool,
) -> nix::Result<SigAction> {
    let extra_saflags = if use_alt_stack {
        SaFlags::SA_ONSTACK
    } else {
        SaFlags::empty()
    };

    // SA_NODEFER keeps a fault raised while handling (e.g. during teardown)
    // deliverable, so the fault gate can see it instead of the kernel killing
    // the process with the signal still blocked.
    let sig_action = SigAction::new(
        SigHandler::SigAction(handle_posix_sigaction),
        SaFlags::SA_NODEFER | extra_saflags,
        signal::SigSet::empty(),
    );

    signal::sigaction(signal.signal(), &sig_action)
}

/// The entry recorded for `signum`, if registration has completed and one
/// was stored.
pub(crate) fn previous_handler(signum: libc::c_int) -> Option<PreviousHandlerEntry> {
    if !INIT_FINISHED.load(SeqCst) || signum < 0 || signum >= MAX_SIGNALS as libc::c_int {
        return None;
    }
    // SAFETY: All accesses to `HANDLERS` are guarded by `INIT_STARTED` and `INIT_FINISHED`.
    // Since `INIT_FINISHED` was guaranteed to be true, we know that no code will ever mutate the
    // static, and hence its safe to read.
    unsafe { HANDLERS[signum as usize] }
}

/// Once the fault has been reported, chain to the handler that was installed
/// before ours.
///
/// A missing entry, or a prior `SIG_IGN`, chains to nothing. A prior
/// `SIG_DFL` chains to nothing either, unless `restore_default` is set: the
/// default disposition is then reinstated and the signal re-raised, so the
/// kernel applies the default action (typically a core dump) and this
/// function does not return.
///
/// SAFETY: `sig_info` and `ucontext` must be the ones the kernel passed to the
/// running handler.
pub(crate) unsafe fn chain_signal_handler(
    signum: i32,
    sig_info: *mut siginfo_t,
    ucontext: *mut c_void,
    restore_default: bool,
) {
    let Some(entry) = previous_handler(signum) else {
        return;
    };
    // How we chain depends on what kind of handler we're chaining to.
    // https://www.gnu.org/software/libc/manual/html_node/Signal-Handling.html
    // https://man7.org/linux/man-pages/man2/sigaction.2.html
    match entry.target {
        ChainTarget::Extended(f) => f(signum, sig_info, ucontext),
        ChainTarget::Simple(f) => f(signum),
        ChainTarget::Ignore => (),
        ChainTarget::Default if restore_default => {
            if signal::sigaction(entry.signal.signal(), &entry.action).is_ok() {
                // Signals are only delivered once: re-raise so the default
                // action sees it. SA_NODEFER means it is not blocked here.
                libc::raise(signum);
            }
        }
        ChainTarget::Default => (),
    }
}

/// Puts `SIG_DFL` back for `signum`, unblocks it and raises it, so the
/// kernel's default action ends the process. Returns if that did not happen,
/// e.g. because the signal is not a valid one.
///
/// SAFETY: meant for a signal handler whose process must die; handlers of
/// other threads are bypassed for `signum` from here on.
pub(crate) unsafe fn raise_with_default_disposition(signum: i32) {
    let Ok(signal) = signal::Signal::try_from(signum) else {
        return;
    };
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), signal::SigSet::empty());
    if signal::sigaction(signal, &action).is_err() {
        return;
    }
    let mut unblock = signal::SigSet::empty();
    unblock.add(signal);
    let _ = signal::pthread_sigmask(signal::SigmaskHow::SIG_UNBLOCK, Some(&unblock), None);
    libc::raise(signum);
}
