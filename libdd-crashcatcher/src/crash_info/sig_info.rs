// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fixed lookup tables turning raw signal metadata into text.
//!
//! Everything here is called from fault context, so the tables are plain
//! `match` expressions over `'static` strings: no allocation, no locking.

use num_derive::FromPrimitive;

/// Mnemonic for the signals that get a name in fault reports.
/// Any other signal is rendered as its decimal value.
pub fn signal_mnemonic(signum: libc::c_int) -> Option<&'static str> {
    match signum {
        libc::SIGILL => Some("SIGILL"),
        libc::SIGFPE => Some("SIGFPE"),
        libc::SIGSEGV => Some("SIGSEGV"),
        libc::SIGBUS => Some("SIGBUS"),
        libc::SIGABRT => Some("SIGABRT"),
        libc::SIGPIPE => Some("SIGPIPE"),
        _ => None,
    }
}

/// Whether reports for this signal carry a described sub-code.
pub fn carries_si_code(signum: libc::c_int) -> bool {
    matches!(
        signum,
        libc::SIGILL | libc::SIGFPE | libc::SIGSEGV | libc::SIGBUS
    )
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
#[allow(clippy::upper_case_acronyms, non_camel_case_types)]
#[repr(C)]
/// See <https://man7.org/linux/man-pages/man2/sigaction.2.html>
/// MUST REMAIN IN SYNC WITH THE ENUM IN emit_sicodes.c
pub enum SiCodes {
    BUS_ADRALN,
    BUS_ADRERR,
    BUS_OBJERR,
    FPE_FLTDIV,
    FPE_FLTINV,
    FPE_FLTOVF,
    FPE_FLTRES,
    FPE_FLTSUB,
    FPE_FLTUND,
    FPE_INTDIV,
    FPE_INTOVF,
    ILL_BADSTK,
    ILL_COPROC,
    ILL_ILLADR,
    ILL_ILLOPC,
    ILL_ILLOPN,
    ILL_ILLTRP,
    ILL_PRVOPC,
    ILL_PRVREG,
    SEGV_ACCERR,
    SEGV_MAPERR,
    UNKNOWN,
}

impl SiCodes {
    /// The `MNEMONIC(explanation)` token used in fault reports, or `None` for
    /// codes the table does not know about.
    pub fn description(self) -> Option<&'static str> {
        let text = match self {
            SiCodes::BUS_ADRALN => "BUS_ADRALN(invalid address alignment)",
            SiCodes::BUS_ADRERR => "BUS_ADRERR(nonexistent physical address)",
            SiCodes::BUS_OBJERR => "BUS_OBJERR(object-specific hardware error)",
            SiCodes::FPE_FLTDIV => "FPE_FLTDIV(floating-point divide by zero)",
            SiCodes::FPE_FLTINV => "FPE_FLTINV(invalid floating-point operation)",
            SiCodes::FPE_FLTOVF => "FPE_FLTOVF(floating-point overflow)",
            SiCodes::FPE_FLTRES => "FPE_FLTRES(floating-point inexact result)",
            SiCodes::FPE_FLTSUB => "FPE_FLTSUB(subscript out of range)",
            SiCodes::FPE_FLTUND => "FPE_FLTUND(floating-point underflow)",
            SiCodes::FPE_INTDIV => "FPE_INTDIV(integer divide by zero)",
            SiCodes::FPE_INTOVF => "FPE_INTOVF(integer overflow)",
            SiCodes::ILL_BADSTK => "ILL_BADSTK(internal stack error)",
            SiCodes::ILL_COPROC => "ILL_COPROC(coprocessor error)",
            SiCodes::ILL_ILLADR => "ILL_ILLADR(illegal addressing mode)",
            SiCodes::ILL_ILLOPC => "ILL_ILLOPC(illegal opcode)",
            SiCodes::ILL_ILLOPN => "ILL_ILLOPN(illegal operand)",
            SiCodes::ILL_ILLTRP => "ILL_ILLTRP(illegal trap)",
            SiCodes::ILL_PRVOPC => "ILL_PRVOPC(privileged opcode)",
            SiCodes::ILL_PRVREG => "ILL_PRVREG(privileged register)",
            SiCodes::SEGV_ACCERR => "SEGV_ACCERR(invalid permissions for mapped object)",
            SiCodes::SEGV_MAPERR => "SEGV_MAPERR(address not mapped to object)",
            SiCodes::UNKNOWN => return None,
        };
        Some(text)
    }
}

extern "C" {
    /// A bit of C code which can access the constants in <signal.h>.
    /// See the file comment on emit_sicodes.c for full details.
    fn translate_si_code_impl(signum: libc::c_int, si_code: libc::c_int) -> libc::c_int;
}

/// Resolves a raw `si_code` for the given signal. Signals without a sub-code
/// table, and codes missing from it, translate to [`SiCodes::UNKNOWN`].
pub fn translate_si_code(signum: libc::c_int, si_code: libc::c_int) -> SiCodes {
    use num_traits::FromPrimitive;
    // SAFETY: this function has no safety requirements
    let translated = unsafe { translate_si_code_impl(signum, si_code) };
    SiCodes::from_i32(translated).unwrap_or(SiCodes::UNKNOWN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_mnemonics() {
        assert_eq!(signal_mnemonic(libc::SIGSEGV), Some("SIGSEGV"));
        assert_eq!(signal_mnemonic(libc::SIGPIPE), Some("SIGPIPE"));
        // Concerned, but rendered numerically.
        assert_eq!(signal_mnemonic(libc::SIGTRAP), None);
        assert_eq!(signal_mnemonic(libc::SIGQUIT), None);
        assert_eq!(signal_mnemonic(libc::SIGSYS), None);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_si_code() {
        // standard values differ between oses, but it seems like segv match
        // https://github.com/torvalds/linux/blob/master/include/uapi/asm-generic/siginfo.h
        // https://github.com/apple/darwin-xnu/blob/main/bsd/sys/signal.h
        assert_eq!(translate_si_code(libc::SIGSEGV, 1), SiCodes::SEGV_MAPERR);
        assert_eq!(translate_si_code(libc::SIGSEGV, 2), SiCodes::SEGV_ACCERR);

        // An invalid code should translate to UNKNOWN
        assert_eq!(translate_si_code(libc::SIGSEGV, 42), SiCodes::UNKNOWN);
        // So should a signal with no sub-code table
        assert_eq!(translate_si_code(libc::SIGABRT, 1), SiCodes::UNKNOWN);
    }

    #[test]
    #[cfg(target_os = "linux")]
    #[cfg_attr(miri, ignore)]
    fn test_si_code_shares_values_across_signals() {
        // 1 is ILL_ILLOPC, FPE_INTDIV, SEGV_MAPERR and BUS_ADRALN on Linux;
        // the signal number disambiguates.
        assert_eq!(translate_si_code(libc::SIGILL, 1), SiCodes::ILL_ILLOPC);
        assert_eq!(translate_si_code(libc::SIGFPE, 1), SiCodes::FPE_INTDIV);
        assert_eq!(translate_si_code(libc::SIGBUS, 1), SiCodes::BUS_ADRALN);
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            SiCodes::FPE_INTDIV.description(),
            Some("FPE_INTDIV(integer divide by zero)")
        );
        assert_eq!(SiCodes::UNKNOWN.description(), None);
        assert!(carries_si_code(libc::SIGBUS));
        assert!(!carries_si_code(libc::SIGABRT));
    }
}
