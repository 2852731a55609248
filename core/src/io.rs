/*
 * Copyright (c) 2026 Mohamad Al-Zawahreh (dba Sovereign Systems).
 *
 * This file is part of the Ark Sovereign Compiler.
 *
 * LICENSE: DUAL-LICENSED (AGPLv3 or COMMERCIAL).
 *
 * 1. OPEN SOURCE: You may use this file under the terms of the GNU Affero
 * General Public License v3.0. If you link to this code, your ENTIRE
 * application must be open-sourced under AGPLv3.
 *
 * 2. COMMERCIAL: For proprietary use, you must obtain a Commercial License
 * from Sovereign Systems.
 *
 * PATENT NOTICE: Protected by US Patent App #63/935,467.
 * NO IMPLIED LICENSE to rights of Mohamad Al-Zawahreh or Sovereign Systems.
 */

//! Host Output Shim
//!
//! Every textual output path of the runtime (`print`, diagnostics, failure
//! reports) funnels through [`Output`]. The shim renders into a fixed-size
//! stack buffer and hands the bytes to a host-owned [`HostIo`] primitive; it
//! never retries and never grows the buffer.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use thiserror::Error;

/// Capacity of the render buffer used by a single formatted write.
pub const MAX_OUTPUT_LEN: usize = 1024;

/// Returned by [`Output::write_char`] when the byte could not be written.
pub const EOF: i32 = -1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    #[error("Format error: a value failed to render")]
    Format,
    #[error("Short write: requested {requested} bytes, host wrote {written}")]
    ShortWrite { requested: usize, written: usize },
}

/// Opaque stream handle understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
    /// Host-defined handle (e.g. a `FILE*` passed through the C ABI).
    Host(usize),
}

/// Raw transfer primitive supplied by the embedding host.
///
/// `raw_write` follows `fwrite` conventions: it returns the number of whole
/// elements written, which may be less than `element_count`.
pub trait HostIo {
    fn raw_write(
        &self,
        buffer: &[u8],
        element_size: usize,
        element_count: usize,
        stream: Stream,
    ) -> usize;

    fn flush(&self, _stream: Stream) -> i32 {
        0
    }

    fn stdout(&self) -> Stream {
        Stream::Stdout
    }

    fn stderr(&self) -> Stream {
        Stream::Stderr
    }
}

/// Writes to the process' standard streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdHost;

impl HostIo for StdHost {
    fn raw_write(
        &self,
        buffer: &[u8],
        element_size: usize,
        element_count: usize,
        stream: Stream,
    ) -> usize {
        if element_size == 0 {
            return 0;
        }
        let len = (element_size * element_count).min(buffer.len());
        let bytes = &buffer[..len];
        let result = match stream {
            Stream::Stdout => std::io::stdout().write_all(bytes),
            Stream::Stderr => std::io::stderr().write_all(bytes),
            // No OS mapping for host handles
            Stream::Host(_) => return 0,
        };
        match result {
            Ok(()) => len / element_size,
            Err(_) => 0,
        }
    }

    fn flush(&self, stream: Stream) -> i32 {
        let result = match stream {
            Stream::Stdout => std::io::stdout().flush(),
            Stream::Stderr => std::io::stderr().flush(),
            Stream::Host(_) => return EOF,
        };
        if result.is_ok() {
            0
        } else {
            EOF
        }
    }
}

/// In-memory host. Captures each stream separately and can simulate short
/// writes by capping the total number of bytes it accepts.
#[derive(Debug, Default)]
pub struct BufferHost {
    stdout: RefCell<Vec<u8>>,
    stderr: RefCell<Vec<u8>>,
    other: RefCell<Vec<(usize, Vec<u8>)>>,
    remaining: Cell<Option<usize>>,
}

impl BufferHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept at most `limit` bytes in total, then report short writes.
    pub fn with_write_limit(limit: usize) -> Self {
        let host = Self::default();
        host.remaining.set(Some(limit));
        host
    }

    pub fn bytes(&self, stream: Stream) -> Vec<u8> {
        match stream {
            Stream::Stdout => self.stdout.borrow().clone(),
            Stream::Stderr => self.stderr.borrow().clone(),
            Stream::Host(id) => self
                .other
                .borrow()
                .iter()
                .filter(|(h, _)| *h == id)
                .flat_map(|(_, b)| b.iter().copied())
                .collect(),
        }
    }

    pub fn contents(&self, stream: Stream) -> String {
        String::from_utf8_lossy(&self.bytes(stream)).into_owned()
    }

    pub fn clear(&self) {
        self.stdout.borrow_mut().clear();
        self.stderr.borrow_mut().clear();
        self.other.borrow_mut().clear();
    }
}

impl HostIo for BufferHost {
    fn raw_write(
        &self,
        buffer: &[u8],
        element_size: usize,
        element_count: usize,
        stream: Stream,
    ) -> usize {
        if element_size == 0 {
            return 0;
        }
        let requested = (element_size * element_count).min(buffer.len());
        let accepted = match self.remaining.get() {
            Some(left) => {
                let n = requested.min(left);
                self.remaining.set(Some(left - n));
                n
            }
            None => requested,
        };
        // Only whole elements count
        let accepted = accepted - accepted % element_size;
        let bytes = &buffer[..accepted];
        match stream {
            Stream::Stdout => self.stdout.borrow_mut().extend_from_slice(bytes),
            Stream::Stderr => self.stderr.borrow_mut().extend_from_slice(bytes),
            Stream::Host(id) => self.other.borrow_mut().push((id, bytes.to_vec())),
        }
        accepted / element_size
    }
}

/// Fixed-capacity render target. Keeps the first `MAX_OUTPUT_LEN` bytes and
/// counts everything the formatter tried to produce.
struct BoundedBuffer {
    bytes: [u8; MAX_OUTPUT_LEN],
    len: usize,
    rendered: usize,
}

impl BoundedBuffer {
    fn new() -> Self {
        Self {
            bytes: [0; MAX_OUTPUT_LEN],
            len: 0,
            rendered: 0,
        }
    }

    fn visible(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl fmt::Write for BoundedBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = MAX_OUTPUT_LEN - self.len;
        let take = room.min(s.len());
        self.bytes[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        self.rendered += s.len();
        Ok(())
    }
}

/// Cheap-to-clone handle over the host primitive.
#[derive(Clone)]
pub struct Output {
    host: Rc<dyn HostIo>,
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output").finish_non_exhaustive()
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new(Rc::new(StdHost))
    }
}

impl Output {
    pub fn new(host: Rc<dyn HostIo>) -> Self {
        Self { host }
    }

    pub fn stdout(&self) -> Stream {
        self.host.stdout()
    }

    pub fn stderr(&self) -> Stream {
        self.host.stderr()
    }

    pub fn flush(&self, stream: Stream) -> i32 {
        self.host.flush(stream)
    }

    /// Render `args` into the bounded buffer and transfer it.
    ///
    /// Output longer than [`MAX_OUTPUT_LEN`] is truncated; the returned length
    /// is still the full rendered length so callers can detect truncation.
    pub fn try_write_formatted(
        &self,
        stream: Stream,
        args: fmt::Arguments<'_>,
    ) -> Result<usize, OutputError> {
        let mut buffer = BoundedBuffer::new();
        fmt::write(&mut buffer, args).map_err(|_| OutputError::Format)?;

        let to_write = buffer.visible();
        let written = self.host.raw_write(to_write, 1, to_write.len(), stream);
        if written < to_write.len() {
            return Err(OutputError::ShortWrite {
                requested: to_write.len(),
                written,
            });
        }
        Ok(buffer.rendered)
    }

    /// Sentinel form of [`Output::try_write_formatted`]: `-1` on any failure.
    pub fn write_formatted(&self, stream: Stream, args: fmt::Arguments<'_>) -> i32 {
        match self.try_write_formatted(stream, args) {
            Ok(n) => i32::try_from(n).unwrap_or(i32::MAX),
            Err(_) => -1,
        }
    }

    pub fn try_write_char(&self, stream: Stream, code: i32) -> Result<i32, OutputError> {
        // Byte-width: only the low byte is transferred
        let byte = [code as u8];
        let written = self.host.raw_write(&byte, 1, 1, stream);
        if written == 1 {
            Ok(code)
        } else {
            Err(OutputError::ShortWrite {
                requested: 1,
                written,
            })
        }
    }

    /// Returns `code` on success, [`EOF`] otherwise.
    pub fn write_char(&self, stream: Stream, code: i32) -> i32 {
        self.try_write_char(stream, code).unwrap_or(EOF)
    }
}

/// `host_write!(output, stream, "fmt", args...)`: formatted write through the shim.
#[macro_export]
macro_rules! host_write {
    ($out:expr, $stream:expr, $($arg:tt)*) => {
        $out.write_formatted($stream, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture() -> (Rc<BufferHost>, Output) {
        let host = Rc::new(BufferHost::new());
        let out = Output::new(host.clone());
        (host, out)
    }

    struct Failing;

    impl fmt::Display for Failing {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    #[test]
    fn test_formatted_write_fits() {
        let (host, out) = capture();
        let n = host_write!(out, Stream::Stdout, "value={} name={}", 42, "abc");
        assert_eq!(n, 17);
        assert_eq!(host.contents(Stream::Stdout), "value=42 name=abc");
        assert!(host.bytes(Stream::Stderr).is_empty());
    }

    #[test]
    fn test_formatted_write_exact_capacity() {
        let (host, out) = capture();
        let text = "x".repeat(MAX_OUTPUT_LEN);
        let n = out.write_formatted(Stream::Stdout, format_args!("{}", text));
        assert_eq!(n as usize, MAX_OUTPUT_LEN);
        assert_eq!(host.contents(Stream::Stdout), text);
    }

    #[test]
    fn test_formatted_write_truncates_but_reports_full_length() {
        let (host, out) = capture();
        let text = "ab".repeat(MAX_OUTPUT_LEN);
        let n = out.write_formatted(Stream::Stderr, format_args!("{}!", text));
        assert_eq!(n as usize, 2 * MAX_OUTPUT_LEN + 1);
        let written = host.bytes(Stream::Stderr);
        assert_eq!(written.len(), MAX_OUTPUT_LEN);
        assert_eq!(&written[..], &text.as_bytes()[..MAX_OUTPUT_LEN]);
    }

    #[test]
    fn test_format_failure_writes_nothing() {
        let (host, out) = capture();
        let n = out.write_formatted(Stream::Stdout, format_args!("a{}b", Failing));
        assert_eq!(n, -1);
        assert!(host.bytes(Stream::Stdout).is_empty());
        assert_eq!(
            out.try_write_formatted(Stream::Stdout, format_args!("{}", Failing)),
            Err(OutputError::Format)
        );
    }

    #[test]
    fn test_short_write_is_a_single_error() {
        let host = Rc::new(BufferHost::with_write_limit(4));
        let out = Output::new(host.clone());
        let res = out.try_write_formatted(Stream::Stdout, format_args!("hello"));
        assert_eq!(
            res,
            Err(OutputError::ShortWrite {
                requested: 5,
                written: 4
            })
        );
        assert_eq!(out.write_formatted(Stream::Stdout, format_args!("again")), -1);
        assert_eq!(host.contents(Stream::Stdout), "hell");
    }

    #[test]
    fn test_write_char() {
        let (host, out) = capture();
        assert_eq!(out.write_char(Stream::Stdout, 'A' as i32), 'A' as i32);
        assert_eq!(out.write_char(Stream::Host(7), '\n' as i32), '\n' as i32);
        assert_eq!(host.bytes(Stream::Stdout), b"A");
        assert_eq!(host.bytes(Stream::Host(7)), b"\n");
    }

    #[test]
    fn test_write_char_eof_on_short_write() {
        let host = Rc::new(BufferHost::with_write_limit(1));
        let out = Output::new(host.clone());
        assert_eq!(out.write_char(Stream::Stdout, 'x' as i32), 'x' as i32);
        assert_eq!(out.write_char(Stream::Stdout, 'y' as i32), EOF);
        assert_eq!(host.bytes(Stream::Stdout), b"x");
    }

    struct Redirected;

    impl HostIo for Redirected {
        fn raw_write(&self, _: &[u8], _: usize, count: usize, _: Stream) -> usize {
            count
        }

        fn stdout(&self) -> Stream {
            Stream::Host(1)
        }

        fn stderr(&self) -> Stream {
            Stream::Host(2)
        }
    }

    #[test]
    fn test_host_supplied_handles() {
        let out = Output::new(Rc::new(Redirected));
        assert_eq!(out.stdout(), Stream::Host(1));
        assert_eq!(out.stderr(), Stream::Host(2));

        let default = Output::default();
        assert_eq!(default.stdout(), Stream::Stdout);
        assert_eq!(default.stderr(), Stream::Stderr);
    }
}
