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

use crate::ast::source_hash;
use crate::compiler::{compile_source, CompileError};
use crate::interpreter::Interpreter;
use crate::runtime::{Exception, ModuleObject, ModuleRef, Value};
use crate::vm::VM;

use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Longest display name, in bytes, given to a loaded module.
pub const MAX_DISPLAY_NAME_LEN: usize = 63;

#[derive(Error, Debug, Clone)]
pub enum LoadError {
    #[error("{0}")]
    Compile(#[from] CompileError),
    #[error("{0}")]
    Runtime(#[from] Exception),
    #[error("{0}")]
    Import(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CompileError,
    RuntimeException,
    ImportError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::CompileError => "CompileError",
            ErrorKind::RuntimeException => "RuntimeException",
            ErrorKind::ImportError => "ImportError",
        };
        f.write_str(s)
    }
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Compile(_) => ErrorKind::CompileError,
            LoadError::Runtime(_) => ErrorKind::RuntimeException,
            LoadError::Import(_) => ErrorKind::ImportError,
        }
    }
}

/// `<name>`, cut to [`MAX_DISPLAY_NAME_LEN`] bytes on a char boundary.
pub fn display_name(name: &str) -> String {
    let mut display = format!("<{}>", name);
    if display.len() > MAX_DISPLAY_NAME_LEN {
        let mut end = MAX_DISPLAY_NAME_LEN;
        while !display.is_char_boundary(end) {
            end -= 1;
        }
        display.truncate(end);
    }
    display
}

/// Execute `source` as the module `name`.
///
/// The module is registered before its code runs, so the code (and anything
/// it imports) can see it. On failure the registry is put back the way it was:
/// a previously committed module under `name` is reinstated, otherwise the
/// name is removed. The enclosing active module is restored on every path.
pub fn try_load_module(
    interp: &mut Interpreter,
    source: &str,
    name: &str,
) -> Result<ModuleRef, LoadError> {
    if name.is_empty() {
        return Err(LoadError::Import("Module name must not be empty".to_string()));
    }
    if interp.context().load_depth() >= interp.config().max_load_depth {
        return Err(LoadError::Import(format!(
            "Maximum module load depth exceeded while loading '{}'",
            name
        )));
    }

    let file = display_name(name);
    interp.trace(format_args!("loading {}", name));

    let enclosing = interp.context().active_module();
    let stack_base = interp.context().stack_len();

    let module = ModuleObject::new_ref();
    {
        let mut m = module.borrow_mut();
        m.set_field("__name__", Value::String(name.to_string()));
        m.set_field("__file__", Value::String(file.clone()));
        m.set_field("__hash__", Value::String(source_hash(source)));
    }
    let previous = interp.registry_mut().insert(name, module.clone());
    interp.context_mut().enter_load(module.clone());

    let outcome = run_module(interp, source, &file, &module);

    interp.context_mut().leave_load(enclosing);

    let produced = interp
        .registry()
        .get(name)
        .is_some_and(|m| Rc::ptr_eq(&m, &module));

    match outcome {
        Ok(()) if produced && !interp.context().has_pending_error() => {
            interp.trace(format_args!("committed {}", name));
            Ok(module)
        }
        outcome => {
            if let Err(cause) = outcome {
                interp.context_mut().raise(cause);
            }
            let error = interp
                .context_mut()
                .take_error()
                .unwrap_or_else(|| LoadError::Import(format!("Failed to load module '{}'", name)));

            match previous {
                Some(prev) => {
                    interp.registry_mut().insert(name, prev);
                }
                None => {
                    interp.registry_mut().remove(name);
                }
            }
            interp.context_mut().reset_stack(stack_base);
            interp.trace(format_args!("rolled back {}: {}", name, error));
            Err(error)
        }
    }
}

fn run_module(
    interp: &mut Interpreter,
    source: &str,
    file: &str,
    module: &ModuleRef,
) -> Result<(), LoadError> {
    let chunk = compile_source(source, file)?;
    VM::new(interp, chunk, module.clone(), file).run()?;
    Ok(())
}

/// Boolean form of [`try_load_module`]. The cause of a failure is kept in
/// [`Interpreter::last_error`].
pub fn load_module(interp: &mut Interpreter, source: &str, name: &str) -> bool {
    match try_load_module(interp, source, name) {
        Ok(_) => true,
        Err(e) => {
            interp.set_last_error(e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::io::{BufferHost, Stream};
    use crate::runtime::RuntimeError;

    fn bare() -> Interpreter {
        bare_with(RuntimeConfig::default())
    }

    fn bare_with(config: RuntimeConfig) -> Interpreter {
        let config = RuntimeConfig {
            bundle_builtins: false,
            ..config
        };
        Interpreter::builder().config(config).build()
    }

    fn field(interp: &Interpreter, module: &str, name: &str) -> Option<Value> {
        interp.module(module)?.borrow().get_field(name)
    }

    #[test]
    fn test_load_registers_module() {
        let mut interp = bare();
        assert!(interp.load_module("let answer := 6 * 7", "m"));
        assert!(interp.registry().contains("m"));
        assert_eq!(field(&interp, "m", "__name__"), Some(Value::String("m".into())));
        assert_eq!(field(&interp, "m", "__file__"), Some(Value::String("<m>".into())));
        assert_eq!(field(&interp, "m", "answer"), Some(Value::Integer(42)));
        assert_eq!(
            field(&interp, "m", "__hash__"),
            Some(Value::String(source_hash("let answer := 6 * 7")))
        );
        assert!(interp.last_error().is_none());
        assert_eq!(interp.context().load_depth(), 0);
    }

    #[test]
    fn test_raising_module_is_rolled_back() {
        let mut interp = bare();
        let outer = ModuleObject::new_ref();
        interp.context_mut().set_active_module(Some(outer.clone()));
        interp.context_mut().push(Value::Integer(1));

        assert!(!interp.load_module("let x := 1\nraise \"bad\"", "m2"));

        assert!(!interp.registry().contains("m2"));
        assert!(interp.context().is_active(&outer));
        assert_eq!(interp.context().stack_len(), 1);
        assert!(!interp.context().has_pending_error());
        let err = interp.take_last_error().unwrap();
        assert_eq!(err.kind(), ErrorKind::RuntimeException);
        assert_eq!(err.to_string(), "bad (at <m2>:2)");
    }

    #[test]
    fn test_rollback_is_idempotent() {
        let mut interp = bare();
        assert!(interp.load_module("let keep := 1", "keep"));
        let before = interp.registry().names();

        assert!(!interp.load_module("raise 1", "m2"));
        assert_eq!(interp.registry().names(), before);
        assert!(!interp.load_module("raise 1", "m2"));
        assert_eq!(interp.registry().names(), before);
    }

    #[test]
    fn test_compile_error_changes_nothing() {
        let mut interp = bare();
        assert!(!interp.load_module("let := 3", "broken"));
        assert!(!interp.registry().contains("broken"));
        assert!(interp.context().active_module().is_none());
        assert_eq!(interp.last_error().unwrap().kind(), ErrorKind::CompileError);
    }

    #[test]
    fn test_failed_reload_keeps_committed_module() {
        let mut interp = bare();
        assert!(interp.load_module("let v := 1", "m"));
        let committed = interp.module("m").unwrap();

        assert!(!interp.load_module("let v := 2\nraise \"no\"", "m"));
        assert!(Rc::ptr_eq(&interp.module("m").unwrap(), &committed));
        assert_eq!(field(&interp, "m", "v"), Some(Value::Integer(1)));

        assert!(interp.load_module("let v := 3", "m"));
        assert_eq!(field(&interp, "m", "v"), Some(Value::Integer(3)));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let mut interp = bare();
        assert!(!interp.load_module("let a := 1", ""));
        assert!(interp.registry().is_empty());
        assert_eq!(interp.last_error().unwrap().kind(), ErrorKind::ImportError);
    }

    #[test]
    fn test_nested_failure_does_not_abort_outer() {
        let mut interp = bare();
        let src = r#"
            let ok := exec_module("raise \"inner\"", "inner")
            let seen := has_module("outer")
        "#;
        assert!(interp.load_module(src, "outer"));
        assert_eq!(field(&interp, "outer", "ok"), Some(Value::Boolean(false)));
        assert_eq!(field(&interp, "outer", "seen"), Some(Value::Boolean(true)));
        assert!(!interp.registry().contains("inner"));
        assert_eq!(
            interp.last_error().map(|e| e.to_string()),
            Some("inner (at <inner>:1)".to_string())
        );
        assert!(interp.context().active_module().is_none());
    }

    #[test]
    fn test_nested_success_commits_both() {
        let mut interp = bare();
        let src = "let ok := exec_module(\"let z := 9\", \"inner\")";
        assert!(interp.load_module(src, "outer"));
        assert_eq!(field(&interp, "inner", "z"), Some(Value::Integer(9)));
        assert_eq!(field(&interp, "outer", "ok"), Some(Value::Boolean(true)));
    }

    #[test]
    fn test_load_depth_is_bounded() {
        let mut interp = bare_with(RuntimeConfig {
            max_load_depth: 1,
            ..RuntimeConfig::default()
        });
        assert!(interp.load_module("let ok := exec_module(\"let y := 1\", \"deep\")", "top"));
        assert_eq!(field(&interp, "top", "ok"), Some(Value::Boolean(false)));
        assert!(!interp.registry().contains("deep"));
        assert_eq!(interp.last_error().unwrap().kind(), ErrorKind::ImportError);
    }

    #[test]
    fn test_replacing_own_name_means_module_not_produced() {
        let mut interp = bare();
        assert!(!interp.load_module("exec_module(\"let y := 2\", \"m\")", "m"));
        assert!(!interp.registry().contains("m"));
        insta::assert_snapshot!(
            interp.last_error().unwrap().to_string(),
            @"Failed to load module 'm'"
        );
    }

    #[test]
    fn test_import_through_resolver() {
        let mut interp = bare();
        interp.set_module_resolver(|name| match name {
            "helper" => Some("func twice(x) { return x * 2 }\nlet base := 5".to_string()),
            "broken" => Some("raise \"nope\"".to_string()),
            _ => None,
        });

        assert!(interp.load_module("import helper as h\nlet v := h.twice(h.base)", "main"));
        assert_eq!(field(&interp, "main", "v"), Some(Value::Integer(10)));
        assert!(interp.registry().contains("helper"));

        assert!(!interp.load_module("import broken", "user"));
        assert!(!interp.registry().contains("broken"));
        assert!(!interp.registry().contains("user"));
        match interp.last_error() {
            Some(LoadError::Runtime(exc)) => {
                assert!(matches!(&exc.error, RuntimeError::ImportFailed { name, .. } if name == "broken"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_functions_keep_their_module_globals() {
        let mut interp = bare();
        interp.set_module_resolver(|name| match name {
            "counter" => Some("let n := 0\nfunc bump() { n := 1\n return n }".to_string()),
            _ => None,
        });
        // `n := 1` inside a function binds a local; the module global is untouched
        assert!(interp.load_module("import counter\nlet r := counter.bump()", "main"));
        assert_eq!(field(&interp, "main", "r"), Some(Value::Integer(1)));
        assert_eq!(field(&interp, "counter", "n"), Some(Value::Integer(0)));
        assert!(field(&interp, "main", "n").is_none());
    }

    #[test]
    fn test_display_name_is_capped() {
        assert_eq!(display_name("m"), "<m>");
        let long = "x".repeat(100);
        assert_eq!(display_name(&long).len(), MAX_DISPLAY_NAME_LEN);
        let wide = "é".repeat(40);
        let shown = display_name(&wide);
        assert!(shown.len() <= MAX_DISPLAY_NAME_LEN);
        assert!(shown.starts_with("<é"));
    }

    #[test]
    fn test_trace_lines() {
        let host = Rc::new(BufferHost::new());
        let config = RuntimeConfig {
            bundle_builtins: false,
            trace_loads: true,
            ..RuntimeConfig::default()
        };
        let mut interp = Interpreter::builder().host(host.clone()).config(config).build();
        assert!(interp.load_module("print(\"hi\", 1)", "a"));
        assert!(!interp.load_module("raise \"x\"", "b"));
        assert_eq!(host.contents(Stream::Stdout), "hi 1\n");
        insta::assert_snapshot!(host.contents(Stream::Stderr).trim_end(), @r###"
        [ember] loading a
        [ember] committed a
        [ember] loading b
        [ember] rolled back b: x (at <b>:1)
        "###);
    }

    #[test]
    fn test_deeply_nested_source_is_a_compile_error() {
        let mut interp = bare();
        let src = format!("let x := {}1{}", "(".repeat(5_000), ")".repeat(5_000));
        assert!(!interp.load_module(&src, "deep"));
        assert!(!interp.registry().contains("deep"));
        assert!(interp.context().active_module().is_none());
        let err = interp.take_last_error().unwrap();
        assert_eq!(err.kind(), ErrorKind::CompileError);
        assert!(err.to_string().contains("Expression nested too deeply"));

        let chain = format!("let s := 0{}", " + 1".repeat(5_000));
        assert!(!interp.load_module(&chain, "chain"));
        assert!(!interp.registry().contains("chain"));
    }

    #[test]
    fn test_module_cannot_import_itself() {
        let mut interp = bare();
        assert!(!interp.load_module("let a := 1\nimport selfish", "selfish"));
        assert!(!interp.registry().contains("selfish"));
        insta::assert_snapshot!(
            interp.last_error().unwrap().to_string(),
            @"Module 'selfish' cannot import itself (at <selfish>:2)"
        );
    }
}
