// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use libdd_crashcatcher::{CrashCatcherConfiguration, ReportSink};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::modes::unix::*;
use crate::{REPORT_FILE, REPORT_PREFIX};

/// Defines the additional behavior for a given crash catcher test
pub trait Behavior {
    fn setup(&self, output_dir: &Path, config: &mut CrashCatcherConfiguration) -> Result<()>;
    /// Runs before the crash catcher is initialized.
    fn pre(&self, output_dir: &Path) -> Result<()>;
    /// Runs after the crash catcher is initialized.
    fn post(&self, output_dir: &Path) -> Result<()>;

    fn sink(&self, output_dir: &Path) -> Result<Option<Box<dyn ReportSink>>> {
        Ok(Some(Box::new(FileSink::new(output_dir))))
    }

    /// Makes the process fault. Only returns if the fault was not fatal.
    fn crash(&self);
}

/// An address in the never-mapped first page. Not null, so debug builds
/// fault on it instead of panicking in their null-dereference check.
pub fn unmapped_ptr() -> *mut u8 {
    std::ptr::without_provenance_mut(0x10)
}

/// # Safety
/// Writes through `p`; only meant to fault on purpose.
#[inline(never)]
pub unsafe fn deref_ptr(p: *mut u8) {
    *std::hint::black_box(p) = std::hint::black_box(1);
}

/// Appends every report as one `report:<detail>` line to `REPORT_FILE`.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            path: output_dir.join(REPORT_FILE),
        }
    }
}

impl ReportSink for FileSink {
    fn attach(&self) -> Result<()> {
        tracing::debug!("file sink attached, writing to {}", self.path.display());
        Ok(())
    }

    fn report(&self, detail: &str) {
        if let Err(e) = file_append_msg(&self.path, &format!("{REPORT_PREFIX}{detail}\n")) {
            tracing::error!("file sink failed: {e:#}");
        }
    }
}

pub fn file_append_msg(filepath: &Path, contents: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(filepath)
        .with_context(|| format!("Failed to open file: {}", filepath.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write to file: {}", filepath.display()))?;
    Ok(())
}

/// Writes `msg` to `fd` with a single `write(2)`, usable from a signal handler.
pub fn write_fd_msg(fd: libc::c_int, msg: &[u8]) {
    // SAFETY: `msg` is valid for `msg.len()` bytes.
    unsafe { libc::write(fd, msg.as_ptr().cast(), msg.len()) };
}

pub fn get_behavior(mode_str: &str) -> Box<dyn Behavior> {
    match mode_str {
        "segv_thread" => Box::new(test_000_segv_thread::Test),
        "abort" => Box::new(test_001_abort::Test),
        "sigpipe" => Box::new(test_002_sigpipe::Test),
        "no_sink" => Box::new(test_003_no_sink::Test),
        "chained" => Box::new(test_004_chaining::Test::SigInfo),
        "chained_simple" => Box::new(test_004_chaining::Test::Simple),
        "concurrent" => Box::new(test_005_concurrent::Test),
        "reentry" => Box::new(test_006_reentry::Test),
        "restore_default" => Box::new(test_007_restore_default::Test),
        "report_timeout" => Box::new(test_008_report_timeout::Test),
        "stack_overflow" => Box::new(test_009_stack_overflow::Test),
        mode if mode.starts_with(test_010_catalog::MODE_PREFIX) => {
            match test_010_catalog::Test::from_mode(mode) {
                Some(test) => Box::new(test),
                None => panic!("Unknown mode: {mode_str}"),
            }
        }
        _ => panic!("Unknown mode: {mode_str}"),
    }
}
