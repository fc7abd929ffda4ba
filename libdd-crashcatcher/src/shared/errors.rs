// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, thiserror::Error)]
pub enum CrashCatcherError {
    #[error("crash catcher is already initialized in this process")]
    AlreadyInitialized,
    #[error("invalid crash catcher configuration: {0:#}")]
    InvalidConfiguration(anyhow::Error),
    #[error("failed to spawn the crash catcher worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}
