// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! This crate catches fatal UNIX signals in the current process, hands a
//! one-line description of the fault to a reporting callback, and then lets
//! the process die the way it would have without it.
//!
//! Architecturally, it consists of two parts:
//! 1. A signal handler, installed for a fixed catalog of fatal signals
//!    (SIGSEGV, SIGBUS, SIGILL, SIGFPE, SIGABRT, ...). It runs on whichever
//!    thread faulted, possibly on a corrupted stack and with arbitrary locks
//!    held, so it does as little as possible: it renders the fault
//!    description into a fixed buffer without allocating, and wakes the
//!    worker thread.
//!    <https://man7.org/linux/man-pages/man7/signal-safety.7.html>
//! 2. A worker thread, started at initialization and parked until a fault
//!    occurs. It copies the description out and calls the [`ReportSink`],
//!    which may allocate, lock and do I/O freely. Once it is done, the
//!    signal handler chains to the handler that was installed before ours
//!    and exits the process.
//!
//! Only one fault is ever handled: a second thread faulting concurrently is
//! suspended forever, and a fault raised after handling finished (e.g. from
//! an atexit hook) exits immediately with a distinct status.
//!
//! Handling of forks
//! Signal handlers and the alternate stack survive `fork`, but the worker
//! thread does not: a child process keeps the handlers, and a fault in it
//! chains and exits without a report.

#[cfg(unix)]
mod collector;
#[cfg(unix)]
mod crash_info;
#[cfg(unix)]
mod report_sink;
#[cfg(unix)]
mod shared;

#[cfg(unix)]
pub use collector::*;
#[cfg(unix)]
pub use crash_info::*;
#[cfg(unix)]
pub use report_sink::ReportSink;
#[cfg(unix)]
pub use shared::configuration::CrashCatcherConfiguration;
#[cfg(unix)]
pub use shared::constants::*;
#[cfg(unix)]
pub use shared::errors::CrashCatcherError;
