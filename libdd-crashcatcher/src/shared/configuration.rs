// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::collector::{default_signals, ConcernedSignal};
use crate::shared::constants::CRASHCATCHER_DEFAULT_WORKER_NAME;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashCatcherConfiguration {
    create_alt_stack: bool,
    // Reinstate SIG_DFL and re-raise when that was the previous disposition
    restore_default_disposition: bool,
    // None waits for the report sink for as long as it takes
    report_timeout: Option<Duration>,
    signals: Vec<i32>,
    use_alt_stack: bool,
    worker_thread_name: String,
}

impl Default for CrashCatcherConfiguration {
    fn default() -> Self {
        Self {
            create_alt_stack: true,
            restore_default_disposition: false,
            report_timeout: None,
            signals: default_signals(),
            use_alt_stack: true,
            worker_thread_name: CRASHCATCHER_DEFAULT_WORKER_NAME.to_string(),
        }
    }
}

impl CrashCatcherConfiguration {
    pub fn new(
        create_alt_stack: bool,
        use_alt_stack: bool,
        mut signals: Vec<i32>,
        report_timeout: Option<Duration>,
        restore_default_disposition: bool,
    ) -> anyhow::Result<Self> {
        if signals.is_empty() {
            signals = default_signals();
        }
        signals.sort();
        let config = Self {
            create_alt_stack,
            use_alt_stack,
            signals,
            report_timeout,
            restore_default_disposition,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants `new` enforces. Deserialized configurations
    /// bypass `new`, so `init` calls this again.
    pub fn validate(&self) -> anyhow::Result<()> {
        // Requesting to create, but not use, the altstack is considered paradoxical.
        anyhow::ensure!(
            !self.create_alt_stack || self.use_alt_stack,
            "Cannot create an altstack without using it"
        );
        // Ensure we don't have double elements in the signals list.
        let mut signals = self.signals.clone();
        signals.sort();
        signals.dedup();
        anyhow::ensure!(
            signals.len() == self.signals.len(),
            "Signals contained duplicate elements"
        );
        if let Some(unknown) = signals
            .iter()
            .find(|s| ConcernedSignal::from_signum(**s).is_none())
        {
            anyhow::bail!("Signal {unknown} is not one the crash catcher handles");
        }
        anyhow::ensure!(
            !self.worker_thread_name.contains('\0'),
            "Worker thread name contains a nul byte"
        );
        Ok(())
    }

    pub fn create_alt_stack(&self) -> bool {
        self.create_alt_stack
    }

    pub fn use_alt_stack(&self) -> bool {
        self.use_alt_stack
    }

    pub fn signals(&self) -> &Vec<i32> {
        &self.signals
    }

    pub fn report_timeout(&self) -> Option<Duration> {
        self.report_timeout
    }

    pub fn restore_default_disposition(&self) -> bool {
        self.restore_default_disposition
    }

    pub fn worker_thread_name(&self) -> &str {
        &self.worker_thread_name
    }

    pub fn set_create_alt_stack(&mut self, create_alt_stack: bool) -> anyhow::Result<()> {
        anyhow::ensure!(
            !create_alt_stack || self.use_alt_stack,
            "Cannot create an altstack without using it"
        );
        self.create_alt_stack = create_alt_stack;
        Ok(())
    }

    pub fn set_use_alt_stack(&mut self, use_alt_stack: bool) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.create_alt_stack || use_alt_stack,
            "Cannot create an altstack without using it"
        );
        self.use_alt_stack = use_alt_stack;
        Ok(())
    }

    pub fn set_report_timeout(&mut self, report_timeout: Option<Duration>) {
        self.report_timeout = report_timeout;
    }

    pub fn set_restore_default_disposition(&mut self, restore: bool) {
        self.restore_default_disposition = restore;
    }

    pub fn set_worker_thread_name(&mut self, name: impl Into<String>) -> anyhow::Result<()> {
        let name = name.into();
        // std::thread::Builder rejects interior nul bytes when spawning.
        anyhow::ensure!(!name.contains('\0'), "Worker thread name contains a nul byte");
        self.worker_thread_name = name;
        Ok(())
    }

    /// The configured signals as catalog entries. An empty list stands for the
    /// whole catalog, as it does in `new`. Entries outside the catalog (only
    /// possible without `validate`) are left out.
    pub fn concerned_signals(&self) -> Vec<ConcernedSignal> {
        if self.signals.is_empty() {
            return ConcernedSignal::ALL.to_vec();
        }
        self.signals
            .iter()
            .filter_map(|s| ConcernedSignal::from_signum(*s))
            .collect()
    }
}
