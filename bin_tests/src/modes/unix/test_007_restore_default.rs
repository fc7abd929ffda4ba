// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::modes::behavior::Behavior;
use libdd_crashcatcher::CrashCatcherConfiguration;
use std::path::Path;

/// With a prior `SIG_DFL` and `restore_default_disposition`, the process is
/// killed by the original signal after reporting.
pub struct Test;

impl Behavior for Test {
    fn setup(
        &self,
        _output_dir: &Path,
        config: &mut CrashCatcherConfiguration,
    ) -> anyhow::Result<()> {
        config.set_restore_default_disposition(true);
        Ok(())
    }

    fn pre(&self, _output_dir: &Path) -> anyhow::Result<()> {
        // No core file for the re-raised SIGABRT.
        let limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: `limit` is a valid rlimit.
        let res = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) };
        anyhow::ensure!(res == 0, "setrlimit failed");
        Ok(())
    }

    fn post(&self, _output_dir: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn crash(&self) {
        // SAFETY: No preconditions.
        unsafe { libc::abort() }
    }
}
