// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::modes::behavior::Behavior;
use libdd_crashcatcher::{is_concerned, CrashCatcherConfiguration};
use std::path::Path;

/// Modes are named `catalog:<signum>`, e.g. `catalog:31`.
pub const MODE_PREFIX: &str = "catalog:";

pub fn mode_for(signum: libc::c_int) -> String {
    format!("{MODE_PREFIX}{signum}")
}

/// Raises one catalog signal with the default configuration.
pub struct Test {
    signum: libc::c_int,
}

impl Test {
    pub fn from_mode(mode: &str) -> Option<Self> {
        let signum = mode.strip_prefix(MODE_PREFIX)?.parse().ok()?;
        is_concerned(signum).then_some(Self { signum })
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

    fn pre(&self, _output_dir: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn post(&self, _output_dir: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn crash(&self) {
        // SAFETY: No preconditions.
        unsafe { libc::raise(self.signum) };
    }
}
