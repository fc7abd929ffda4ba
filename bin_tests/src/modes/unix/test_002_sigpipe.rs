// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::modes::behavior::{write_fd_msg, Behavior};
use libdd_crashcatcher::CrashCatcherConfiguration;
use std::path::Path;

/// The Rust runtime ignores SIGPIPE before `main` runs, so this exercises
/// chaining to a prior `SIG_IGN`: the fault is reported and nothing is
/// chained.
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

    fn crash(&self) {
        let mut fds = [0; 2];
        // SAFETY: `fds` has room for both ends.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return;
        }
        // Writing to a pipe without a reader raises SIGPIPE on this thread.
        unsafe { libc::close(fds[0]) };
        write_fd_msg(fds[1], b"nobody is listening");
    }
}
