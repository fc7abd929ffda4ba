// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::rendezvous::{Rendezvous, WorkerStatus};
use super::signal_set::ConcernedSignal;
use crate::report_sink::ReportSink;
use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow};
use std::panic::{self, AssertUnwindSafe};

/// Starts the long-lived thread that performs the report on behalf of the
/// faulting thread. On failure the rendezvous is told that no worker exists,
/// so a later fault does not wait for one.
pub(crate) fn spawn_report_worker(
    name: &str,
    rendezvous: &'static Rendezvous,
    sink: Option<Box<dyn ReportSink>>,
) -> std::io::Result<()> {
    let spawned = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || run_report_worker(rendezvous, sink));
    match spawned {
        // The worker lives as long as the process: detach it.
        Ok(_handle) => Ok(()),
        Err(e) => {
            rendezvous.set_worker_status(WorkerStatus::Unavailable);
            Err(e)
        }
    }
}

fn run_report_worker(rendezvous: &Rendezvous, sink: Option<Box<dyn ReportSink>>) {
    // A concerned signal delivered to this thread could never be served: the
    // fault would wait on the very thread that is supposed to answer it.
    // With the signals blocked, asynchronous ones go to other threads and a
    // synchronous fault here takes the default action.
    block_concerned_signals();
    rendezvous.set_worker_status(WorkerStatus::Running);
    tracing::debug!("crash catcher worker waiting for faults");

    let detail = rendezvous.wait_for_fault();
    match sink.as_deref() {
        Some(sink) => deliver(sink, &detail),
        None => tracing::warn!("No report sink configured, dropping fault report: {detail}"),
    }
    rendezvous.complete();
}

fn deliver(sink: &dyn ReportSink, detail: &str) {
    if let Err(e) = sink.attach() {
        tracing::error!("Report sink failed to attach, fault report dropped: {e:#}");
        return;
    }
    if panic::catch_unwind(AssertUnwindSafe(|| sink.report(detail))).is_err() {
        tracing::error!("Report sink panicked while reporting a fault");
    }
    sink.detach();
}

fn block_concerned_signals() {
    let mut set = SigSet::empty();
    for signal in ConcernedSignal::ALL {
        set.add(signal.signal());
    }
    if let Err(e) = pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&set), None) {
        tracing::warn!("Unable to block fault signals on the crash catcher worker: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crash_info::ThreadIdentity;
    use crate::HandOff;
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
    use std::sync::{Arc, Mutex};

    fn leak_rendezvous() -> &'static Rendezvous {
        Box::leak(Box::new(Rendezvous::new()))
    }

    fn fault(rendezvous: &Rendezvous) -> HandOff {
        rendezvous.hand_off(
            |d| d.render(libc::SIGBUS, 0, &ThreadIdentity::new(b"bus", 5)),
            None,
        )
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_worker_reports_once_through_sink() {
        let rendezvous = leak_rendezvous();
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink_seen = seen.clone();
        let sink = move |detail: &str| sink_seen.lock().unwrap().push(detail.to_string());

        spawn_report_worker("ct-test-worker", rendezvous, Some(Box::new(sink))).unwrap();
        assert_eq!(fault(rendezvous), HandOff::Delivered);
        assert_eq!(*seen.lock().unwrap(), vec!["thread=bus(5),SIGBUS,0".to_string()]);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_worker_without_sink_still_completes() {
        let rendezvous = leak_rendezvous();
        spawn_report_worker("ct-test-nosink", rendezvous, None).unwrap();
        assert_eq!(fault(rendezvous), HandOff::Delivered);
    }

    #[derive(Default)]
    struct Counts {
        attached: AtomicUsize,
        reported: AtomicUsize,
        detached: AtomicUsize,
    }

    struct CountingSink {
        counts: Arc<Counts>,
        fail_attach: bool,
        panic_on_report: bool,
    }

    impl CountingSink {
        fn boxed(fail_attach: bool, panic_on_report: bool) -> (Box<dyn ReportSink>, Arc<Counts>) {
            let counts = Arc::new(Counts::default());
            let sink = Self {
                counts: counts.clone(),
                fail_attach,
                panic_on_report,
            };
            (Box::new(sink), counts)
        }
    }

    impl ReportSink for CountingSink {
        fn attach(&self) -> anyhow::Result<()> {
            self.counts.attached.fetch_add(1, SeqCst);
            anyhow::ensure!(!self.fail_attach, "runtime refused attach");
            Ok(())
        }

        fn report(&self, _detail: &str) {
            self.counts.reported.fetch_add(1, SeqCst);
            if self.panic_on_report {
                panic!("sink exploded");
            }
        }

        fn detach(&self) {
            self.counts.detached.fetch_add(1, SeqCst);
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_attach_report_detach_sequence() {
        let (sink, counts) = CountingSink::boxed(false, false);
        let rendezvous = leak_rendezvous();
        spawn_report_worker("ct-test-attach", rendezvous, Some(sink)).unwrap();
        assert_eq!(fault(rendezvous), HandOff::Delivered);
        assert_eq!(counts.attached.load(SeqCst), 1);
        assert_eq!(counts.reported.load(SeqCst), 1);
        assert_eq!(counts.detached.load(SeqCst), 1);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_failed_attach_skips_report() {
        let (sink, counts) = CountingSink::boxed(true, false);
        let rendezvous = leak_rendezvous();
        spawn_report_worker("ct-test-noattach", rendezvous, Some(sink)).unwrap();
        assert_eq!(fault(rendezvous), HandOff::Delivered);
        assert_eq!(counts.reported.load(SeqCst), 0);
        assert_eq!(counts.detached.load(SeqCst), 0);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_panicking_sink_does_not_wedge_fault() {
        let (sink, counts) = CountingSink::boxed(false, true);
        let rendezvous = leak_rendezvous();
        spawn_report_worker("ct-test-panic", rendezvous, Some(sink)).unwrap();
        assert_eq!(fault(rendezvous), HandOff::Delivered);
        assert_eq!(counts.reported.load(SeqCst), 1);
        assert_eq!(counts.detached.load(SeqCst), 1);
    }
}
