// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicI64, AtomicU8};
use std::sync::atomic::Ordering::SeqCst;

/// Process-wide progress of fault handling. Only ever moves forward.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultState {
    /// No fault observed yet.
    Idle = 0,
    /// One fault is being reported; every other faulting thread must wait.
    Handling = 1,
    /// Reporting and chaining are done and the process is exiting.
    Finished = 2,
}

impl FaultState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => FaultState::Idle,
            1 => FaultState::Handling,
            _ => FaultState::Finished,
        }
    }
}

/// What a freshly faulting thread is allowed to do.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Admission {
    /// This thread owns the one handling cycle of the process.
    Proceed,
    /// Another thread is handling a fault: park forever.
    Suspend,
    /// The thread handling the fault faulted again, e.g. a chained handler
    /// aborted. Parking it would hang the process.
    Nested,
    /// The process is already tearing down after a handled fault.
    Terminate,
}

/// Lock-free gate admitting at most one fault per process.
/// Every operation is a single atomic, so it is usable from a signal handler.
pub struct FaultGate {
    state: AtomicU8,
    // Thread id of the `Proceed` caller, 0 until then.
    owner: AtomicI64,
}

impl Default for FaultGate {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultGate {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(FaultState::Idle as u8),
            owner: AtomicI64::new(0),
        }
    }

    pub fn state(&self) -> FaultState {
        FaultState::from_u8(self.state.load(SeqCst))
    }

    /// Called first thing on fault entry with the faulting thread's id.
    pub fn enter(&self, tid: i64) -> Admission {
        match self.state.compare_exchange(
            FaultState::Idle as u8,
            FaultState::Handling as u8,
            SeqCst,
            SeqCst,
        ) {
            Ok(_) => {
                self.owner.store(tid, SeqCst);
                Admission::Proceed
            }
            Err(current) => match FaultState::from_u8(current) {
                // The owner is stored before its handler can run anything
                // that faults again, so a nested entry always sees it.
                FaultState::Handling if self.owner.load(SeqCst) == tid => Admission::Nested,
                // Idle cannot be observed on failure; treat anything unexpected as teardown.
                FaultState::Handling => Admission::Suspend,
                FaultState::Idle | FaultState::Finished => Admission::Terminate,
            },
        }
    }

    /// Closes the handling cycle. Returns false if the gate was not in
    /// `Handling`, in which case nothing changes.
    pub fn finish(&self) -> bool {
        self.state
            .compare_exchange(
                FaultState::Handling as u8,
                FaultState::Finished as u8,
                SeqCst,
                SeqCst,
            )
            .is_ok()
    }
}

/// Parks the calling thread for good. Used for a second fault that arrives
/// while the first one is still being handled.
pub(crate) fn suspend_forever() -> ! {
    loop {
        // SAFETY: pause is async-signal-safe and has no preconditions.
        unsafe { libc::pause() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    #[test]
    fn test_single_cycle() {
        let gate = FaultGate::new();
        assert_eq!(gate.state(), FaultState::Idle);
        assert_eq!(gate.enter(10), Admission::Proceed);
        assert_eq!(gate.state(), FaultState::Handling);
        assert_eq!(gate.enter(11), Admission::Suspend);
        assert!(gate.finish());
        assert_eq!(gate.state(), FaultState::Finished);
        assert_eq!(gate.enter(11), Admission::Terminate);
        // Once finished, even the former owner only gets to terminate.
        assert_eq!(gate.enter(10), Admission::Terminate);
        assert_eq!(gate.state(), FaultState::Finished);
    }

    #[test]
    fn test_never_moves_backward() {
        let gate = FaultGate::new();
        // Finishing without handling is refused.
        assert!(!gate.finish());
        assert_eq!(gate.state(), FaultState::Idle);

        gate.enter(1);
        assert!(gate.finish());
        assert!(!gate.finish());
        assert_eq!(gate.state(), FaultState::Finished);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_concurrent_entry_admits_exactly_one() {
        const THREADS: usize = 8;
        let gate = FaultGate::new();
        let barrier = Barrier::new(THREADS);
        let admissions: Vec<Admission> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|i| {
                    let gate = &gate;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        gate.enter(i as i64 + 1)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let proceeded = admissions
            .iter()
            .filter(|a| **a == Admission::Proceed)
            .count();
        let suspended = admissions
            .iter()
            .filter(|a| **a == Admission::Suspend)
            .count();
        assert_eq!(proceeded, 1);
        assert_eq!(suspended, THREADS - 1);
    }

    #[test]
    fn test_owner_faulting_again_is_nested() {
        let gate = FaultGate::new();
        assert_eq!(gate.enter(42), Admission::Proceed);
        // A chained handler calling abort() on the handling thread.
        assert_eq!(gate.enter(42), Admission::Nested);
        assert_eq!(gate.enter(7), Admission::Suspend);
        assert_eq!(gate.state(), FaultState::Handling);
        assert!(gate.finish());
        assert_eq!(gate.enter(42), Admission::Terminate);
    }

    // Elsewhere thread ids fall back to the pid and cannot tell threads apart.
    #[cfg(any(target_os = "linux", target_os = "android", target_vendor = "apple"))]
    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_nested_entry_on_real_threads() {
        let gate = FaultGate::new();
        let owner = std::thread::scope(|s| {
            s.spawn(|| {
                let tid = crate::ThreadIdentity::current_tid();
                assert_eq!(gate.enter(tid), Admission::Proceed);
                assert_eq!(gate.enter(tid), Admission::Nested);
                tid
            })
            .join()
            .unwrap()
        });
        let other = crate::ThreadIdentity::current_tid();
        assert_ne!(owner, other);
        assert_eq!(gate.enter(other), Admission::Suspend);
    }
}
