// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::modes::behavior::{deref_ptr, unmapped_ptr, Behavior};
use libdd_crashcatcher::CrashCatcherConfiguration;
use std::path::Path;

pub const FAULTY_THREAD_NAME: &str = "faulty-thread";

/// A write to an unmapped address on a named thread other than the one that
/// initialized the crash catcher.
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
        let handle = std::thread::Builder::new()
            .name(FAULTY_THREAD_NAME.to_string())
            .spawn(|| unsafe { deref_ptr(unmapped_ptr()) });
        if let Ok(handle) = handle {
            let _ = handle.join();
        }
    }
}
