// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::modes::behavior::Behavior;
use libdd_crashcatcher::CrashCatcherConfiguration;
use std::path::Path;

/// Faults again from an atexit hook, i.e. after the first fault has been
/// fully handled and the process is exiting.
pub struct Test;

extern "C" fn fault_during_teardown() {
    // SAFETY: No preconditions.
    unsafe { libc::raise(libc::SIGILL) };
}

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
        // SAFETY: the hook is a plain function with no captured state.
        let res = unsafe { libc::atexit(fault_during_teardown) };
        anyhow::ensure!(res == 0, "atexit failed");
        Ok(())
    }

    fn crash(&self) {
        // SAFETY: No preconditions.
        unsafe { libc::raise(libc::SIGTRAP) };
    }
}
