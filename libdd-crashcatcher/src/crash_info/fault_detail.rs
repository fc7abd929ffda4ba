// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Rendering of the one-line fault description handed to the report sink.
//!
//! The description has the shape
//! `thread=<name>(<tid>),<signal-name-or-number>,<sub-code-description-or-number>`
//! and is written into a fixed buffer from inside the signal handler. Only
//! `core::fmt` is used, which formats integers and copies string slices
//! without touching the allocator.

use super::sig_info::{carries_si_code, signal_mnemonic, translate_si_code};
use crate::shared::constants::{FAULT_DETAIL_CAPACITY, THREAD_NAME_CAPACITY};
use std::fmt::{self, Write};

/// Name and OS id of the thread a fault was delivered to.
#[derive(Debug, Clone, Copy)]
pub struct ThreadIdentity {
    name: [u8; THREAD_NAME_CAPACITY],
    name_len: usize,
    tid: i64,
}

impl ThreadIdentity {
    /// Builds an identity from raw parts, truncating the name to
    /// [`THREAD_NAME_CAPACITY`] bytes.
    pub fn new(name: &[u8], tid: i64) -> Self {
        let mut identity = Self {
            name: [0; THREAD_NAME_CAPACITY],
            name_len: 0,
            tid,
        };
        let len = name.len().min(THREAD_NAME_CAPACITY);
        identity.name[..len].copy_from_slice(&name[..len]);
        identity.name_len = len;
        identity
    }

    /// Identity of the calling thread. Only issues syscalls, so it may be used
    /// from a signal handler.
    pub fn current() -> Self {
        let mut name = [0u8; THREAD_NAME_CAPACITY];
        current_thread_name(&mut name);
        let name_len = name.iter().position(|b| *b == 0).unwrap_or(name.len());
        Self {
            name,
            name_len,
            tid: current_thread_id(),
        }
    }

    /// OS id of the calling thread, without reading its name.
    pub fn current_tid() -> i64 {
        current_thread_id()
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.name[..self.name_len]
    }

    pub fn tid(&self) -> i64 {
        self.tid
    }

    fn write_name(&self, out: &mut impl Write) -> fmt::Result {
        for chunk in self.name_bytes().utf8_chunks() {
            out.write_str(chunk.valid())?;
            if !chunk.invalid().is_empty() {
                out.write_char('?')?;
            }
        }
        Ok(())
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn current_thread_name(buf: &mut [u8; THREAD_NAME_CAPACITY]) {
    // PR_GET_NAME writes at most 16 bytes, including the terminating nul.
    // SAFETY: the buffer is larger than 16 bytes.
    unsafe { libc::prctl(libc::PR_GET_NAME, buf.as_mut_ptr(), 0, 0, 0) };
}

#[cfg(target_vendor = "apple")]
fn current_thread_name(buf: &mut [u8; THREAD_NAME_CAPACITY]) {
    // SAFETY: the length passed matches the buffer.
    unsafe {
        libc::pthread_getname_np(
            libc::pthread_self(),
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
        )
    };
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_vendor = "apple")))]
fn current_thread_name(_buf: &mut [u8; THREAD_NAME_CAPACITY]) {}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn current_thread_id() -> i64 {
    // SAFETY: syscall(SYS_gettid) has no preconditions for current thread.
    unsafe { libc::syscall(libc::SYS_gettid) as i64 }
}

#[cfg(target_vendor = "apple")]
fn current_thread_id() -> i64 {
    let mut tid: u64 = 0;
    // SAFETY: `pthread_threadid_np` has no preconditions for current thread
    // when pthread_t is 0 and output pointer is valid.
    unsafe { libc::pthread_threadid_np(0, &mut tid) };
    tid as i64
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_vendor = "apple")))]
fn current_thread_id() -> i64 {
    // SAFETY: getpid has no preconditions.
    unsafe { libc::getpid() as i64 }
}

/// Fixed-capacity text buffer holding the most recent fault description.
///
/// Writes past the capacity are truncated on a character boundary, so the
/// content is always valid UTF-8.
pub struct FaultDetail {
    buf: [u8; FAULT_DETAIL_CAPACITY],
    len: usize,
}

impl Default for FaultDetail {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultDetail {
    pub const fn new() -> Self {
        Self {
            buf: [0; FAULT_DETAIL_CAPACITY],
            len: 0,
        }
    }

    /// Zeroes the whole buffer, not only the used prefix.
    pub fn clear(&mut self) {
        self.buf.fill(0);
        self.len = 0;
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Replaces the content with the description of a fault.
    /// Truncation is silent: a cut description is still worth reporting.
    pub fn render(&mut self, signum: libc::c_int, si_code: libc::c_int, thread: &ThreadIdentity) {
        self.clear();
        let _ = self.write_description(signum, si_code, thread);
    }

    fn write_description(
        &mut self,
        signum: libc::c_int,
        si_code: libc::c_int,
        thread: &ThreadIdentity,
    ) -> fmt::Result {
        self.write_str("thread=")?;
        thread.write_name(self)?;
        write!(self, "({}),", thread.tid())?;
        match signal_mnemonic(signum) {
            Some(name) => self.write_str(name)?,
            None => write!(self, "{signum}")?,
        }
        self.write_char(',')?;
        let code = if carries_si_code(signum) {
            translate_si_code(signum, si_code).description()
        } else {
            None
        };
        match code {
            Some(text) => self.write_str(text),
            None => write!(self, "{si_code}"),
        }
    }
}

impl Write for FaultDetail {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let remaining = self.buf.len() - self.len;
        if s.len() <= remaining {
            self.buf[self.len..self.len + s.len()].copy_from_slice(s.as_bytes());
            self.len += s.len();
            return Ok(());
        }
        let mut end = remaining;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.buf[self.len..self.len + end].copy_from_slice(&s.as_bytes()[..end]);
        self.len += end;
        Err(fmt::Error)
    }
}
