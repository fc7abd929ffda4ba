// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::modes::behavior::Behavior;
use libdd_crashcatcher::{CrashCatcherConfiguration, ReportSink};
use std::path::Path;

pub struct Test;

impl Behavior for Test {
    fn setup(
        &self,
        _output_dir: &Path,
        _config: &mut CrashCatcherConfiguration,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn pre(&self, _output_dir: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn post(&self, _output_dir: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn sink(&self, _output_dir: &Path) -> anyhow::Result<Option<Box<dyn ReportSink>>> {
        Ok(None)
    }

    fn crash(&self) {
        // SAFETY: No preconditions.
        unsafe { libc::raise(libc::SIGBUS) };
    }
}
