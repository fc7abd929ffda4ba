// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::modes::behavior::{write_fd_msg, Behavior, FileSink};
use crate::REPORT_FILE;
use libdd_crashcatcher::{CrashCatcherConfiguration, ReportSink};
use std::os::fd::IntoRawFd;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering::SeqCst};
use std::sync::{Arc, Barrier};
use std::time::Duration;

/// Written by each thread right before it raises.
pub const RAISING_MARKER: &str = "raising";
/// Written by a thread whose raise returned, which must never happen.
pub const RESUMED_MARKER: &str = "resumed";

/// Two threads fault at the same time. Only one fault may be reported; the
/// other thread stays suspended until the process exits.
pub struct Test;

static MARKER_FD: AtomicI32 = AtomicI32::new(-1);

fn write_marker(marker: &str) {
    let fd = MARKER_FD.load(SeqCst);
    if fd >= 0 {
        write_fd_msg(fd, format!("{marker}\n").as_bytes());
    }
}

/// Keeps the first fault in progress long enough for the second to arrive.
struct SlowSink(FileSink);

impl ReportSink for SlowSink {
    fn report(&self, detail: &str) {
        self.0.report(detail);
        std::thread::sleep(Duration::from_millis(500));
    }
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
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_dir.join(REPORT_FILE))?;
        MARKER_FD.store(file.into_raw_fd(), SeqCst);
        Ok(())
    }

    fn post(&self, _output_dir: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn sink(&self, output_dir: &Path) -> anyhow::Result<Option<Box<dyn ReportSink>>> {
        Ok(Some(Box::new(SlowSink(FileSink::new(output_dir)))))
    }

    fn crash(&self) {
        let barrier = Arc::new(Barrier::new(2));
        let threads: Vec<_> = (0..2)
            .map(|_| {
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    write_marker(RAISING_MARKER);
                    // SAFETY: No preconditions.
                    unsafe { libc::raise(libc::SIGBUS) };
                    write_marker(RESUMED_MARKER);
                })
            })
            .collect();
        for thread in threads {
            let _ = thread.join();
        }
    }
}
