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

use crate::interpreter::Interpreter;
use crate::io::{HostIo, Stream, EOF};
use crate::loader::LoadError;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::rc::Rc;

/// `fwrite`-shaped write primitive: returns the number of elements written.
pub type EmberWriteFn =
    extern "C" fn(buffer: *const u8, element_size: usize, element_count: usize, stream: usize) -> usize;

/// `fflush`-shaped flush primitive: 0 on success.
pub type EmberFlushFn = extern "C" fn(stream: usize) -> i32;

/// Host I/O supplied through the C ABI. Stream handles are opaque to the
/// runtime and passed back to the host unchanged.
pub struct CHost {
    write_fn: EmberWriteFn,
    flush_fn: Option<EmberFlushFn>,
    stdout: usize,
    stderr: usize,
}

impl CHost {
    fn handle(&self, stream: Stream) -> usize {
        match stream {
            Stream::Stdout => self.stdout,
            Stream::Stderr => self.stderr,
            Stream::Host(h) => h,
        }
    }
}

impl HostIo for CHost {
    fn raw_write(
        &self,
        buffer: &[u8],
        element_size: usize,
        element_count: usize,
        stream: Stream,
    ) -> usize {
        if element_size.saturating_mul(element_count) > buffer.len() {
            return 0;
        }
        (self.write_fn)(buffer.as_ptr(), element_size, element_count, self.handle(stream))
    }

    fn flush(&self, stream: Stream) -> i32 {
        match self.flush_fn {
            Some(flush) => flush(self.handle(stream)),
            None => 0,
        }
    }

    fn stdout(&self) -> Stream {
        Stream::Host(self.stdout)
    }

    fn stderr(&self) -> Stream {
        Stream::Host(self.stderr)
    }
}

/// Helper to safely create a CString from a Rust String.
/// If the string contains null bytes, they are replaced.
fn safe_cstring(s: String) -> *mut c_char {
    let cleaned = s.replace('\0', "\u{FFFD}");
    match CString::new(cleaned) {
        Ok(c) => c.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

unsafe fn read_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, LoadError> {
    if ptr.is_null() {
        return Err(LoadError::Import(format!("{} pointer is null", what)));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| LoadError::Import(format!("{} is not valid UTF-8: {}", what, e)))
}

/// Creates an interpreter with the default configuration. Free it with
/// `ember_interpreter_free`.
#[no_mangle]
pub extern "C" fn ember_interpreter_new() -> *mut Interpreter {
    Box::into_raw(Box::new(Interpreter::new()))
}

/// # Safety
/// `interp` must be null or a pointer returned by `ember_interpreter_new`
/// that has not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn ember_interpreter_free(interp: *mut Interpreter) {
    if !interp.is_null() {
        drop(Box::from_raw(interp));
    }
}

/// Routes all runtime output through `write_fn`. `stdout` and `stderr` are the
/// host's handles for the two standard streams. Returns 1 on success.
///
/// # Safety
/// `interp` must be a live interpreter pointer.
#[no_mangle]
pub unsafe extern "C" fn ember_set_host_io(
    interp: *mut Interpreter,
    write_fn: Option<EmberWriteFn>,
    flush_fn: Option<EmberFlushFn>,
    stdout: usize,
    stderr: usize,
) -> i32 {
    let (Some(interp), Some(write_fn)) = (interp.as_mut(), write_fn) else {
        return 0;
    };
    interp.set_host(Rc::new(CHost {
        write_fn,
        flush_fn,
        stdout,
        stderr,
    }));
    1
}

/// Loads `source` as module `name`. Returns 1 on success and 0 on failure;
/// the cause of a failure is available through `ember_last_error`.
///
/// # Safety
/// `interp` must be a live interpreter pointer; `source` and `name` must be
/// null or valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn ember_exec_module(
    interp: *mut Interpreter,
    source: *const c_char,
    name: *const c_char,
) -> i32 {
    let Some(interp) = interp.as_mut() else {
        return 0;
    };
    let args = read_str(source, "source").and_then(|s| Ok((s, read_str(name, "name")?)));
    match args {
        Ok((source, name)) => i32::from(interp.load_module(source, name)),
        Err(e) => {
            interp.set_last_error(e);
            0
        }
    }
}

/// Returns 1 if `name` is registered.
///
/// # Safety
/// `interp` must be a live interpreter pointer; `name` a valid C string.
#[no_mangle]
pub unsafe extern "C" fn ember_has_module(interp: *const Interpreter, name: *const c_char) -> i32 {
    let Some(interp) = interp.as_ref() else {
        return 0;
    };
    match read_str(name, "name") {
        Ok(name) => i32::from(interp.registry().contains(name)),
        Err(_) => 0,
    }
}

/// Takes the last load failure as `"<Kind>: <message>"`, or null if there is
/// none. The caller must free the string using `ember_free_string`.
///
/// # Safety
/// `interp` must be a live interpreter pointer.
#[no_mangle]
pub unsafe extern "C" fn ember_last_error(interp: *mut Interpreter) -> *mut c_char {
    let Some(interp) = interp.as_mut() else {
        return std::ptr::null_mut();
    };
    match interp.take_last_error() {
        Some(e) => safe_cstring(format!("{}: {}", e.kind(), e)),
        None => std::ptr::null_mut(),
    }
}

/// Frees a string returned by `ember_last_error`.
///
/// # Safety
/// `ptr` must be null or a string returned by this library, freed once.
#[no_mangle]
pub unsafe extern "C" fn ember_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Flushes a host stream through the interpreter's output shim.
///
/// # Safety
/// `interp` must be a live interpreter pointer.
#[no_mangle]
pub unsafe extern "C" fn ember_flush(interp: *const Interpreter, stream: usize) -> i32 {
    match interp.as_ref() {
        Some(interp) => interp.output().flush(Stream::Host(stream)),
        None => EOF,
    }
}
