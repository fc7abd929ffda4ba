// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg(unix)]

use super::alt_stack::create_alt_stack;
use super::crash_handler::{
    set_handling_options, set_worker_process, HandlingOptions, RENDEZVOUS,
};
use super::report_worker::spawn_report_worker;
use super::signal_handler_manager::{claim_registration, register_crash_handlers};
use super::signal_set::ConcernedSignal;
use crate::report_sink::ReportSink;
use crate::{CrashCatcherConfiguration, CrashCatcherError};

/// What `init` managed to set up. Setup failures do not fail `init`; they
/// shrink the coverage instead.
#[derive(Debug, Default)]
pub struct Coverage {
    /// Whether an alternate stack was created for the calling thread.
    pub alt_stack: bool,
    pub installed: Vec<ConcernedSignal>,
    pub failed: Vec<(ConcernedSignal, String)>,
}

impl Coverage {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Initialize the crash-catching infrastructure.
///
/// Creates the alternate stack (if configured), installs the fault handler
/// for every configured signal while recording the previous handlers, and
/// starts the worker thread that hands fault reports to `sink`. Passing
/// `None` as sink keeps handling and chaining but skips reporting.
///
/// PRECONDITIONS:
///     None.
/// SAFETY:
///     May only succeed once per process: any later call returns
///     `CrashCatcherError::AlreadyInitialized` without touching the
///     installed handlers. There is no teardown.
/// ATOMICITY:
///     This function is not atomic. A crash during its execution may lead to
///     unexpected crash-handling behaviour.
pub fn init(
    config: CrashCatcherConfiguration,
    sink: Option<Box<dyn ReportSink>>,
) -> Result<Coverage, CrashCatcherError> {
    config
        .validate()
        .map_err(CrashCatcherError::InvalidConfiguration)?;
    if !claim_registration() {
        tracing::error!("Crash catcher init called more than once, ignoring");
        return Err(CrashCatcherError::AlreadyInitialized);
    }

    // Must be in place before the first handler can fire.
    set_handling_options(HandlingOptions {
        report_timeout: config.report_timeout(),
        restore_default_disposition: config.restore_default_disposition(),
    });

    let mut coverage = Coverage::default();
    if config.create_alt_stack() {
        // SAFETY: init runs in ordinary thread context, never on the altstack.
        match unsafe { create_alt_stack() } {
            Ok(()) => coverage.alt_stack = true,
            Err(e) => tracing::warn!("Unable to create alternate signal stack: {e:#}"),
        }
    }

    let registration = register_crash_handlers(&config.concerned_signals(), config.use_alt_stack());
    for (signal, reason) in &registration.failed {
        tracing::warn!("Unable to install crash handler for {signal}: {reason}");
    }
    coverage.installed = registration.installed;
    coverage.failed = registration.failed;

    if sink.is_none() {
        tracing::warn!("No report sink configured, faults will not be reported");
    }
    set_worker_process();
    spawn_report_worker(config.worker_thread_name(), &RENDEZVOUS, sink).map_err(|e| {
        tracing::error!("Unable to start the crash catcher worker: {e}");
        CrashCatcherError::WorkerSpawn(e)
    })?;

    tracing::info!(
        alt_stack = coverage.alt_stack,
        installed = coverage.installed.len(),
        failed = coverage.failed.len(),
        "Crash catcher initialized"
    );
    Ok(coverage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::alt_stack::current_alt_stack;

    // These tests install process-wide handlers, so each one runs the checks in
    // a forked child and asserts on its exit status. An atypical status per
    // failed check tells which one tripped.
    fn run_in_fork(child: impl FnOnce() -> i32) -> i32 {
        let status = fork_wait(child);
        assert!(libc::WIFEXITED(status), "child did not exit: {status}");
        libc::WEXITSTATUS(status)
    }

    /// Raw wait status of a forked child running `child`.
    fn fork_wait(child: impl FnOnce() -> i32) -> libc::c_int {
        // SAFETY: the child only runs `child` and then `_exit`s.
        match unsafe { libc::fork() } {
            -1 => panic!("Failed to fork"),
            0 => {
                let code = std::panic::catch_unwind(std::panic::AssertUnwindSafe(child))
                    .unwrap_or(101);
                unsafe { libc::_exit(code) }
            }
            pid => {
                let mut status = 0;
                let res = unsafe { libc::waitpid(pid, &mut status, 0) };
                assert_eq!(res, pid, "waitpid failed");
                status
            }
        }
    }

    fn sa_flags(signum: libc::c_int) -> Option<libc::c_int> {
        let mut old: libc::sigaction = unsafe { std::mem::zeroed() };
        let res = unsafe { libc::sigaction(signum, std::ptr::null(), &mut old) };
        (res == 0).then_some(old.sa_flags)
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_altstack_use_create() {
        let status = run_in_fork(|| {
            let initial_sigaltstack = current_alt_stack().map(|s| s.ss_sp);

            // Initialize the crash catcher. This will
            // - create a new altstack
            // - set the SIGBUS/SIGSEGV handlers with SA_ONSTACK
            let config = CrashCatcherConfiguration::default();
            let Ok(coverage) = init(config, None) else {
                return 3;
            };
            if !coverage.alt_stack || !coverage.is_complete() {
                return 4;
            }
            let after_init_sigaltstack = current_alt_stack().map(|s| s.ss_sp);
            if after_init_sigaltstack.is_none() || initial_sigaltstack == after_init_sigaltstack {
                return 5;
            }
            for signum in [libc::SIGBUS, libc::SIGSEGV] {
                match sa_flags(signum) {
                    Some(flags) if flags & libc::SA_ONSTACK == libc::SA_ONSTACK => {}
                    _ => return 6,
                }
            }
            42
        });
        assert_eq!(status, 42);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_altstack_nouse_nocreate() {
        let status = run_in_fork(|| {
            let config =
                CrashCatcherConfiguration::new(false, false, vec![libc::SIGTRAP], None, false);
            let Ok(config) = config else {
                return 3;
            };
            let Ok(coverage) = init(config, None) else {
                return 4;
            };
            if coverage.alt_stack || coverage.installed != vec![ConcernedSignal::Trap] {
                return 5;
            }
            match sa_flags(libc::SIGTRAP) {
                Some(flags) if flags & libc::SA_ONSTACK == 0 => {}
                _ => return 6,
            }
            // Signals that were not requested keep their disposition.
            match sa_flags(libc::SIGQUIT) {
                Some(flags) if flags & libc::SA_SIGINFO == 0 => {}
                _ => return 7,
            }
            42
        });
        assert_eq!(status, 42);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_second_init_is_rejected() {
        let status = run_in_fork(|| {
            if init(CrashCatcherConfiguration::default(), None).is_err() {
                return 3;
            }
            match init(CrashCatcherConfiguration::default(), None) {
                Err(CrashCatcherError::AlreadyInitialized) => 42,
                _ => 4,
            }
        });
        assert_eq!(status, 42);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_invalid_configuration_leaves_process_untouched() {
        let status = run_in_fork(|| {
            let config: CrashCatcherConfiguration =
                match serde_json::from_str(r#"{"create_alt_stack": true, "use_alt_stack": false}"#)
                {
                    Ok(config) => config,
                    Err(_) => return 3,
                };
            match init(config, None) {
                Err(CrashCatcherError::InvalidConfiguration(_)) => {}
                _ => return 4,
            }
            // Registration was never claimed, so a valid init still works.
            match init(CrashCatcherConfiguration::default(), None) {
                Ok(_) => 42,
                Err(_) => 5,
            }
        });
        assert_eq!(status, 42);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_forked_child_exits_without_report() {
        let status = run_in_fork(|| {
            let config =
                CrashCatcherConfiguration::new(false, false, vec![libc::SIGTRAP], None, false);
            let Ok(config) = config else {
                return 3;
            };
            if init(config, None).is_err() {
                return 4;
            }
            // The grandchild has the handler but no worker thread.
            match unsafe { libc::fork() } {
                -1 => 5,
                0 => {
                    unsafe { libc::raise(libc::SIGTRAP) };
                    unsafe { libc::_exit(6) }
                }
                pid => {
                    let mut status = 0;
                    unsafe { libc::waitpid(pid, &mut status, 0) };
                    if libc::WIFEXITED(status)
                        && libc::WEXITSTATUS(status) == crate::CRASHCATCHER_EXIT_STATUS
                    {
                        42
                    } else {
                        7
                    }
                }
            }
        });
        assert_eq!(status, 42);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_fault_is_reported_then_exits() {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let [read_fd, write_fd] = fds;

        let status = run_in_fork(move || {
            unsafe { libc::close(read_fd) };
            let sink = move |detail: &str| {
                let line = format!("{detail}\n");
                unsafe { libc::write(write_fd, line.as_ptr().cast(), line.len()) };
            };
            let config =
                CrashCatcherConfiguration::new(false, false, vec![libc::SIGTRAP], None, false);
            let Ok(config) = config else {
                return 3;
            };
            if init(config, Some(Box::new(sink))).is_err() {
                return 4;
            }
            unsafe { libc::raise(libc::SIGTRAP) };
            // Not reached: the handler exits the process.
            5
        });
        unsafe { libc::close(write_fd) };
        assert_eq!(status, crate::CRASHCATCHER_EXIT_STATUS);

        let mut buf = [0u8; 256];
        let n = unsafe { libc::read(read_fd, buf.as_mut_ptr().cast(), buf.len()) };
        unsafe { libc::close(read_fd) };
        assert!(n > 0, "nothing reported");
        let report = std::str::from_utf8(&buf[..n as usize]).unwrap();
        assert!(report.starts_with("thread="), "{report}");
        // SIGTRAP has no mnemonic, so it is rendered by number.
        assert!(
            report.contains(&format!("),{},", libc::SIGTRAP)),
            "{report}"
        );
    }

    extern "C" fn aborting_handler(_: libc::c_int, _: *mut libc::siginfo_t, _: *mut libc::c_void) {
        unsafe { libc::abort() };
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_chained_handler_abort_does_not_hang() {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let [read_fd, write_fd] = fds;

        let status = fork_wait(move || {
            unsafe { libc::close(read_fd) };
            // Installed first, so it becomes the chained handler for SIGTRAP.
            let previous = nix::sys::signal::SigAction::new(
                nix::sys::signal::SigHandler::SigAction(aborting_handler),
                nix::sys::signal::SaFlags::SA_SIGINFO,
                nix::sys::signal::SigSet::empty(),
            );
            if unsafe {
                nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGTRAP, &previous)
            }
            .is_err()
            {
                return 3;
            }
            let sink = move |detail: &str| {
                let line = format!("{detail}\n");
                unsafe { libc::write(write_fd, line.as_ptr().cast(), line.len()) };
            };
            let config = CrashCatcherConfiguration::new(
                false,
                false,
                vec![libc::SIGTRAP, libc::SIGABRT],
                None,
                false,
            );
            let Ok(config) = config else {
                return 4;
            };
            if init(config, Some(Box::new(sink))).is_err() {
                return 5;
            }
            unsafe { libc::raise(libc::SIGTRAP) };
            6
        });
        unsafe { libc::close(write_fd) };
        // The abort of the chained handler kills the process, it is not
        // reported as a second fault.
        assert!(libc::WIFSIGNALED(status), "child did not die by signal: {status}");
        assert_eq!(libc::WTERMSIG(status), libc::SIGABRT);

        let mut buf = [0u8; 512];
        let n = unsafe { libc::read(read_fd, buf.as_mut_ptr().cast(), buf.len()) };
        unsafe { libc::close(read_fd) };
        assert!(n > 0, "nothing reported");
        let report = std::str::from_utf8(&buf[..n as usize]).unwrap();
        assert_eq!(report.lines().count(), 1, "{report}");
        assert!(
            report.contains(&format!("),{},", libc::SIGTRAP)),
            "{report}"
        );
    }
}
