// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Test modes for the `crashcatcher_bin_test` binary.
//!
//! Every mode initializes the crash catcher in a fresh process, then crashes
//! it in a particular way. The integration tests in `tests/` spawn the binary
//! and check how the process died and what reached the report sink.

#[cfg(unix)]
pub mod modes;

/// Name of the file the [`modes::behavior::FileSink`] appends reports to.
pub const REPORT_FILE: &str = "report.txt";
/// Prefix of every line the file sink writes.
pub const REPORT_PREFIX: &str = "report:";
