// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::modes::behavior::Behavior;
use libdd_crashcatcher::CrashCatcherConfiguration;
use std::path::Path;

pub const OVERFLOWING_THREAD_NAME: &str = "overflowing-thread";

/// Unbounded recursion on a spawned thread. The fault lands on the guard page,
/// so the Rust runtime's SIGSEGV handler we chain to aborts the process from
/// inside our handler.
pub struct Test;

#[inline(never)]
fn recurse(depth: u64) -> u64 {
    if std::hint::black_box(depth) == u64::MAX {
        return 0;
    }
    // Small frames touch every page on the way down, so the guard page is hit
    // rather than skipped.
    let mut frame = [0u8; 128];
    frame[0] = depth as u8;
    let frame = std::hint::black_box(frame);
    recurse(depth + 1).wrapping_add(frame[0] as u64)
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
        let handle = std::thread::Builder::new()
            .name(OVERFLOWING_THREAD_NAME.to_string())
            .stack_size(256 * 1024)
            .spawn(|| recurse(0));
        if let Ok(handle) = handle {
            let _ = handle.join();
        }
    }
}
