// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Two-phase handshake between the faulting thread and the report worker.
//!
//! 1. The faulting thread renders the fault detail under the lock, moves the
//!    phase to `Requested`, wakes the worker and waits.
//! 2. The worker copies the detail out, releases the lock, reports, then
//!    moves the phase to `Delivered` and wakes the faulting thread.
//!
//! The phase lives under the mutex, so a request made before the worker is
//! waiting is not lost, and spurious wakeups are absorbed by the predicates.
//! The mutex is only ever contended by one faulting thread, since the
//! [`FaultGate`](super::fault_state::FaultGate) admits a single fault.

use crate::crash_info::FaultDetail;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Parked,
    Requested,
    Delivered,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum WorkerStatus {
    /// Not spawned yet; a request made now is served once it runs.
    Pending,
    Running,
    /// Spawning failed; nobody will ever answer.
    Unavailable,
}

/// Result of the faulting side of the handshake.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HandOff {
    Delivered,
    TimedOut,
    NoWorker,
}

struct Exchange {
    phase: Phase,
    worker: WorkerStatus,
    detail: FaultDetail,
}

impl Exchange {
    fn awaiting_delivery(&self) -> bool {
        self.phase != Phase::Delivered && self.worker != WorkerStatus::Unavailable
    }
}

pub(crate) struct Rendezvous {
    exchange: Mutex<Exchange>,
    wakeup: Condvar,
}

impl Rendezvous {
    pub const fn new() -> Self {
        Self {
            exchange: Mutex::new(Exchange {
                phase: Phase::Parked,
                worker: WorkerStatus::Pending,
                detail: FaultDetail::new(),
            }),
            wakeup: Condvar::new(),
        }
    }

    // A panic in the sink must not leave the fault path unable to lock.
    fn lock(&self) -> MutexGuard<'_, Exchange> {
        self.exchange.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_worker_status(&self, status: WorkerStatus) {
        let mut exchange = self.lock();
        exchange.worker = status;
        self.wakeup.notify_all();
    }

    /// Faulting side. Renders the detail, wakes the worker and waits for it
    /// to report, for at most `timeout` if one is given.
    pub fn hand_off(
        &self,
        render: impl FnOnce(&mut FaultDetail),
        timeout: Option<Duration>,
    ) -> HandOff {
        let mut exchange = self.lock();
        render(&mut exchange.detail);
        exchange.phase = Phase::Requested;
        self.wakeup.notify_all();

        let exchange = match timeout {
            None => self
                .wakeup
                .wait_while(exchange, |e| e.awaiting_delivery())
                .unwrap_or_else(PoisonError::into_inner),
            Some(timeout) => {
                self.wakeup
                    .wait_timeout_while(exchange, timeout, |e| e.awaiting_delivery())
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
        };
        match (exchange.phase, exchange.worker) {
            (Phase::Delivered, _) => HandOff::Delivered,
            (_, WorkerStatus::Unavailable) => HandOff::NoWorker,
            _ => HandOff::TimedOut,
        }
    }

    /// Worker side, phase 1: blocks until a fault is handed off and returns a
    /// copy of its detail. The lock is released before returning.
    pub fn wait_for_fault(&self) -> String {
        let exchange = self
            .wakeup
            .wait_while(self.lock(), |e| e.phase != Phase::Requested)
            .unwrap_or_else(PoisonError::into_inner);
        exchange.detail.as_str().to_owned()
    }

    /// Worker side, phase 2: lets the faulting thread resume.
    pub fn complete(&self) {
        let mut exchange = self.lock();
        exchange.phase = Phase::Delivered;
        self.wakeup.notify_all();
    }
}
