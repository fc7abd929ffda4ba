// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Host-provided destination for fault reports.
///
/// The sink is only ever called from the crash catcher's worker thread, never
/// from the signal handler, so it may allocate, lock and do I/O. It is called
/// at most once per process, right before the process exits: anything it
/// wants persisted has to be done before `report` returns.
pub trait ReportSink: Send + Sync {
    /// Prepares the worker thread before reporting, e.g. attaching it to a
    /// managed runtime. An error skips the report.
    fn attach(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Receives the rendered fault description.
    fn report(&self, detail: &str);

    /// Undoes [`ReportSink::attach`]. Only called if `attach` succeeded.
    fn detach(&self) {}
}

impl<F> ReportSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, detail: &str) {
        (self)(detail)
    }
}
