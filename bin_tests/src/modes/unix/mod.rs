// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
pub mod test_000_segv_thread;
pub mod test_001_abort;
pub mod test_002_sigpipe;
pub mod test_003_no_sink;
pub mod test_004_chaining;
pub mod test_005_concurrent;
pub mod test_006_reentry;
pub mod test_007_restore_default;
pub mod test_008_report_timeout;
pub mod test_009_stack_overflow;
pub mod test_010_catalog;
