// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Exit status once a fault has been reported and chained.
pub const CRASHCATCHER_EXIT_STATUS: libc::c_int = 55;
/// Exit status for a fault that arrives after handling already finished,
/// i.e. the teardown path itself crashed.
pub const CRASHCATCHER_REENTRY_EXIT_STATUS: libc::c_int = 66;

/// Size of the buffer holding the rendered fault description.
pub const FAULT_DETAIL_CAPACITY: usize = 4 * 1024;
/// Large enough for Linux (16) and Darwin (64) thread names.
pub const THREAD_NAME_CAPACITY: usize = 64;

pub const CRASHCATCHER_DEFAULT_WORKER_NAME: &str = "crashcatcher";
