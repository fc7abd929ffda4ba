// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::modes::behavior::{write_fd_msg, Behavior};
use crate::REPORT_FILE;
use libdd_crashcatcher::CrashCatcherConfiguration;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet};
use std::os::fd::IntoRawFd;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering::SeqCst};

pub const CHAINED_MARKER: &str = "chained";

/// Installs an application SIGILL handler before the crash catcher, and checks
/// the crash catcher chains to it once the report is done.
pub enum Test {
    /// The application handler is installed with `SA_SIGINFO`.
    SigInfo,
    /// The application handler only takes the signal number.
    Simple,
}

// Opened before the crash, so the handler only needs `write(2)`.
static MARKER_FD: AtomicI32 = AtomicI32::new(-1);

fn write_marker(handler_kind: &[u8]) {
    let fd = MARKER_FD.load(SeqCst);
    if fd >= 0 {
        write_fd_msg(fd, CHAINED_MARKER.as_bytes());
        write_fd_msg(fd, handler_kind);
    }
}

extern "C" fn siginfo_handler(
    _signum: i32,
    _sig_info: *mut libc::siginfo_t,
    _ucontext: *mut libc::c_void,
) {
    write_marker(b":siginfo\n");
}

extern "C" fn simple_handler(_signum: i32) {
    write_marker(b":simple\n");
}

impl Behavior for Test {
    fn setup(
        &self,
        _output_dir: &Path,
        _config: &mut CrashCatcherConfiguration,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn pre(&self, output_dir: &Path) -> anyhow::Result<()> {
        // Shares the report file, so the order of report and chaining shows.
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_dir.join(REPORT_FILE))?;
        MARKER_FD.store(file.into_raw_fd(), SeqCst);

        let (handler, flags) = match self {
            Test::SigInfo => (SigHandler::SigAction(siginfo_handler), SaFlags::SA_SIGINFO),
            Test::Simple => (SigHandler::Handler(simple_handler), SaFlags::empty()),
        };
        let sig_action = SigAction::new(handler, flags, SigSet::empty());
        let old_handler = unsafe { signal::sigaction(signal::SIGILL, &sig_action) }?;
        if old_handler.handler() != SigHandler::SigDfl {
            anyhow::bail!("Test found invalid condition: SIGILL already had a handler");
        }
        Ok(())
    }

    fn post(&self, _output_dir: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn crash(&self) {
        // SAFETY: No preconditions.
        unsafe { libc::raise(libc::SIGILL) };
    }
}
