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

pub mod ast;
pub mod bootstrap;
pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod context;
pub mod ffi;
pub mod interpreter;
pub mod intrinsics;
pub mod io;
pub mod loader;
pub mod parser;
pub mod registry;
pub mod runtime;
#[cfg(feature = "bundled-libs")]
pub mod stdlib;
pub mod vm;

pub use config::RuntimeConfig;
pub use interpreter::{Interpreter, InterpreterBuilder};
pub use io::{BufferHost, HostIo, Output, StdHost, Stream, MAX_OUTPUT_LEN};
pub use loader::{load_module, try_load_module, ErrorKind, LoadError};
