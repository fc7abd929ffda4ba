// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use nix::sys::signal::Signal;

/// A signal the crash catcher installs itself for.
/// See <https://man7.org/linux/man-pages/man7/signal.7.html>
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConcernedSignal {
    Abort,
    Bus,
    FloatingPoint,
    IllegalInstruction,
    Segmentation,
    BrokenPipe,
    Trap,
    BadSystemCall,
    #[cfg(stack_fault_signal)]
    StackFault,
    /// Sent on application hangs by some runtimes (ANR on Android).
    Quit,
}

impl ConcernedSignal {
    /// The fixed catalog, in installation order.
    pub const ALL: &'static [ConcernedSignal] = &[
        ConcernedSignal::Abort,
        ConcernedSignal::Bus,
        ConcernedSignal::FloatingPoint,
        ConcernedSignal::IllegalInstruction,
        ConcernedSignal::Segmentation,
        ConcernedSignal::BrokenPipe,
        ConcernedSignal::Trap,
        ConcernedSignal::BadSystemCall,
        #[cfg(stack_fault_signal)]
        ConcernedSignal::StackFault,
        ConcernedSignal::Quit,
    ];

    pub fn signal(self) -> Signal {
        match self {
            ConcernedSignal::Abort => Signal::SIGABRT,
            ConcernedSignal::Bus => Signal::SIGBUS,
            ConcernedSignal::FloatingPoint => Signal::SIGFPE,
            ConcernedSignal::IllegalInstruction => Signal::SIGILL,
            ConcernedSignal::Segmentation => Signal::SIGSEGV,
            ConcernedSignal::BrokenPipe => Signal::SIGPIPE,
            ConcernedSignal::Trap => Signal::SIGTRAP,
            ConcernedSignal::BadSystemCall => Signal::SIGSYS,
            #[cfg(stack_fault_signal)]
            ConcernedSignal::StackFault => Signal::SIGSTKFLT,
            ConcernedSignal::Quit => Signal::SIGQUIT,
        }
    }

    pub fn signum(self) -> libc::c_int {
        self.signal() as libc::c_int
    }

    /// Looks a raw signal number up in the catalog.
    pub fn from_signum(signum: libc::c_int) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.signum() == signum)
    }
}

/// Whether `signum` belongs to the catalog.
pub fn is_concerned(signum: libc::c_int) -> bool {
    ConcernedSignal::from_signum(signum).is_some()
}

/// The full catalog as raw signal numbers.
pub fn default_signals() -> Vec<libc::c_int> {
    ConcernedSignal::ALL.iter().map(|s| s.signum()).collect()
}

impl std::fmt::Display for ConcernedSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.signal().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        for signal in ConcernedSignal::ALL {
            assert_eq!(ConcernedSignal::from_signum(signal.signum()), Some(*signal));
            assert!(is_concerned(signal.signum()));
        }
        assert!(!is_concerned(libc::SIGINT));
        assert!(!is_concerned(libc::SIGTERM));
        assert!(!is_concerned(libc::SIGKILL));
        assert!(!is_concerned(-1));
    }

    #[test]
    fn test_catalog_has_no_duplicates() {
        let mut signums = default_signals();
        let before = signums.len();
        signums.sort();
        signums.dedup();
        assert_eq!(before, signums.len());
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_linux_catalog_contains_stack_fault() {
        #[cfg(stack_fault_signal)]
        assert!(is_concerned(libc::SIGSTKFLT));
        assert_eq!(ConcernedSignal::Segmentation.to_string(), "SIGSEGV");
    }
}
