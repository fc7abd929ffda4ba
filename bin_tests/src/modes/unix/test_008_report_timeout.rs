// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::modes::behavior::{Behavior, FileSink};
use libdd_crashcatcher::{CrashCatcherConfiguration, ReportSink};
use std::path::Path;
use std::time::Duration;

pub const REPORT_TIMEOUT: Duration = Duration::from_millis(200);

/// The sink never returns; the bounded wait lets the process exit anyway.
pub struct Test;

struct HangingSink(FileSink);

impl ReportSink for HangingSink {
    fn report(&self, detail: &str) {
        self.0.report(detail);
        loop {
            std::thread::sleep(Duration::from_secs(60));
        }
    }
}

impl Behavior for Test {
    fn setup(
        &self,
        _output_dir: &Path,
        config: &mut CrashCatcherConfiguration,
    ) -> anyhow::Result<()> {
        config.set_report_timeout(Some(REPORT_TIMEOUT));
        Ok(())
    }

    fn pre(&self, _output_dir: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn post(&self, _output_dir: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn sink(&self, output_dir: &Path) -> anyhow::Result<Option<Box<dyn ReportSink>>> {
        Ok(Some(Box::new(HangingSink(FileSink::new(output_dir)))))
    }

    fn crash(&self) {
        // SAFETY: No preconditions.
        unsafe { libc::raise(libc::SIGFPE) };
    }
}
