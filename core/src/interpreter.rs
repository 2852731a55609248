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

use crate::config::RuntimeConfig;
use crate::context::ExecutionContext;
use crate::host_write;
use crate::intrinsics::IntrinsicRegistry;
use crate::io::{HostIo, Output};
use crate::loader::{self, LoadError};
use crate::registry::ModuleRegistry;
use crate::runtime::{ModuleRef, Scope, Value};

use std::fmt;
use std::rc::Rc;

/// Supplies source text for `import`s that miss the registry.
pub type ModuleResolver = dyn Fn(&str) -> Option<String>;

/// One runtime instance: module registry, execution context, output shim and
/// builtin scope. Holds `Rc`s and is therefore bound to its thread.
pub struct Interpreter {
    registry: ModuleRegistry,
    context: ExecutionContext,
    output: Output,
    config: RuntimeConfig,
    builtins: Scope,
    resolver: Option<Rc<ModuleResolver>>,
    last_error: Option<LoadError>,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("modules", &self.registry.names())
            .field("config", &self.config)
            .field("load_depth", &self.context.load_depth())
            .finish_non_exhaustive()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct InterpreterBuilder {
    config: RuntimeConfig,
    host: Option<Rc<dyn HostIo>>,
    resolver: Option<Rc<ModuleResolver>>,
}

impl InterpreterBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(mut self, host: Rc<dyn HostIo>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn resolver(mut self, resolver: impl Fn(&str) -> Option<String> + 'static) -> Self {
        self.resolver = Some(Rc::new(resolver));
        self
    }

    /// Build the interpreter and, unless disabled, register the bundled
    /// modules before any user code can run.
    pub fn build(self) -> Interpreter {
        let mut builtins = Scope::new();
        IntrinsicRegistry::register_all(&mut builtins);

        let mut interp = Interpreter {
            registry: ModuleRegistry::new(),
            context: ExecutionContext::new(),
            output: self.host.map(Output::new).unwrap_or_default(),
            config: self.config,
            builtins,
            resolver: self.resolver,
            last_error: None,
        };

        #[cfg(feature = "bundled-libs")]
        {
            if interp.config.bundle_builtins {
                crate::bootstrap::init_builtin_modules(&mut interp);
            }
        }

        interp
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::default()
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.registry
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    pub fn set_host(&mut self, host: Rc<dyn HostIo>) {
        self.output = Output::new(host);
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn builtin(&self, name: &str) -> Option<Value> {
        self.builtins.get(name)
    }

    pub fn module(&self, name: &str) -> Option<ModuleRef> {
        self.registry.get(name)
    }

    pub fn set_module_resolver(&mut self, resolver: impl Fn(&str) -> Option<String> + 'static) {
        self.resolver = Some(Rc::new(resolver));
    }

    pub fn module_resolver(&self) -> Option<Rc<ModuleResolver>> {
        self.resolver.clone()
    }

    /// See [`loader::load_module`].
    pub fn load_module(&mut self, source: &str, name: &str) -> bool {
        loader::load_module(self, source, name)
    }

    /// See [`loader::try_load_module`].
    pub fn try_load_module(&mut self, source: &str, name: &str) -> Result<ModuleRef, LoadError> {
        loader::try_load_module(self, source, name)
    }

    /// Cause of the most recent failed [`Interpreter::load_module`].
    pub fn last_error(&self) -> Option<&LoadError> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<LoadError> {
        self.last_error.take()
    }

    pub(crate) fn set_last_error(&mut self, error: LoadError) {
        self.last_error = Some(error);
    }

    /// Write a failure report to the host stderr stream.
    pub fn report_error(&self, error: &LoadError) {
        let stream = self.output.stderr();
        host_write!(self.output, stream, "{}: {}\n", error.kind(), error);
        self.output.flush(stream);
    }

    pub(crate) fn trace(&self, args: fmt::Arguments<'_>) {
        if self.config.trace_loads {
            let stream = self.output.stderr();
            host_write!(self.output, stream, "[ember] {}\n", args);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{BufferHost, Stream};

    #[test]
    fn test_builtins_are_installed() {
        let interp = Interpreter::builder().build();
        for name in IntrinsicRegistry::names() {
            assert!(interp.builtin(name).is_some(), "missing {}", name);
        }
        assert!(interp.builtin("nope").is_none());
    }

    #[test]
    fn test_opting_out_of_bundled_modules_starts_empty() {
        let config = RuntimeConfig {
            bundle_builtins: false,
            ..RuntimeConfig::default()
        };
        let interp = Interpreter::builder().config(config).build();
        assert!(interp.registry().is_empty());
        assert!(interp.context().active_module().is_none());
    }

    #[test]
    fn test_report_error_writes_to_stderr() {
        let host = Rc::new(BufferHost::new());
        let interp = Interpreter::builder().host(host.clone()).build();
        interp.report_error(&LoadError::Import("Failed to load module 'x'".into()));
        insta::assert_snapshot!(
            host.contents(Stream::Stderr).trim_end(),
            @"ImportError: Failed to load module 'x'"
        );
        assert!(host.bytes(Stream::Stdout).is_empty());
    }

    #[test]
    fn test_trace_is_silent_unless_enabled() {
        let host = Rc::new(BufferHost::new());
        let interp = Interpreter::builder().host(host.clone()).build();
        interp.trace(format_args!("hello"));
        assert!(host.bytes(Stream::Stderr).is_empty());

        let config = RuntimeConfig {
            trace_loads: true,
            ..RuntimeConfig::default()
        };
        let interp = Interpreter::builder().host(host.clone()).config(config).build();
        host.clear();
        interp.trace(format_args!("hello {}", 1));
        assert_eq!(host.contents(Stream::Stderr), "[ember] hello 1\n");
    }
}
