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

//! Initializers for the bundled modules.

use crate::compiler::compile_source;
use crate::interpreter::Interpreter;
use crate::intrinsics::{expect_args, expect_number, expect_string};
use crate::runtime::{ModuleObject, ModuleRef, NativeFn, RuntimeError, Value};

use rand::Rng;
use std::fmt::Write;

fn module_with(fields: Vec<(&'static str, Value)>) -> ModuleRef {
    let module = ModuleObject::new_ref();
    {
        let mut m = module.borrow_mut();
        for (name, value) in fields {
            m.set_field(name, value);
        }
    }
    module
}

fn native(name: &'static str, func: NativeFn) -> (&'static str, Value) {
    (name, Value::native(name, func))
}

fn expect_integer(value: &Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Integer(i) => Ok(*i),
        other => Err(RuntimeError::TypeMismatch(
            "Integer".to_string(),
            other.clone(),
        )),
    }
}

pub fn init_pheap() -> ModuleRef {
    module_with(vec![
        ("__doc__", Value::String("Pairing heap primitives".to_string())),
        native("lt", pheap_lt),
    ])
}

/// Ordering predicate used by heap code.
fn pheap_lt(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("lt", &args, 2)?;
    let ord = crate::intrinsics::intrinsic_compare(&args[0], &args[1])?;
    Ok(Value::Boolean(ord == std::cmp::Ordering::Less))
}

pub fn init_dis() -> ModuleRef {
    module_with(vec![native("dis", dis_dis)])
}

fn dis_dis(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("dis", &args, 1)?;
    let source = expect_string(&args[0])?;
    let chunk = compile_source(source, "<dis>")
        .map_err(|e| RuntimeError::InvalidOperation(e.to_string()))?;
    Ok(Value::String(chunk.disassemble("<dis>")))
}

pub fn init_fileio() -> ModuleRef {
    module_with(vec![native("read", fileio_read), native("exists", fileio_exists)])
}

fn fileio_read(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("read", &args, 1)?;
    let path = expect_string(&args[0])?;
    std::fs::read_to_string(path)
        .map(Value::String)
        .map_err(|e| RuntimeError::InvalidOperation(format!("{}: {}", path, e)))
}

fn fileio_exists(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("exists", &args, 1)?;
    let path = expect_string(&args[0])?;
    Ok(Value::Boolean(std::path::Path::new(path).exists()))
}

pub fn init_gc() -> ModuleRef {
    module_with(vec![native("collect", gc_collect), native("isenabled", gc_isenabled)])
}

// Values are reference counted; there is never anything left to collect.
fn gc_collect(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("collect", &args, 0)?;
    Ok(Value::Integer(0))
}

fn gc_isenabled(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("isenabled", &args, 0)?;
    Ok(Value::Boolean(true))
}

pub fn init_locale() -> ModuleRef {
    module_with(vec![native("getlocale", locale_getlocale)])
}

fn locale_getlocale(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("getlocale", &args, 0)?;
    let locale = ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| "C".to_string());
    Ok(Value::String(locale))
}

pub fn init_math() -> ModuleRef {
    module_with(vec![
        ("pi", Value::Float(std::f64::consts::PI)),
        ("e", Value::Float(std::f64::consts::E)),
        native("sqrt", math_sqrt),
        native("pow", math_pow),
        native("floor", math_floor),
        native("ceil", math_ceil),
        native("fabs", math_fabs),
        native("sin", math_sin),
        native("cos", math_cos),
    ])
}

fn math_sqrt(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("sqrt", &args, 1)?;
    let n = expect_number(&args[0])?;
    if n < 0.0 {
        return Err(RuntimeError::InvalidOperation(
            "Square root of negative number".to_string(),
        ));
    }
    Ok(Value::Float(n.sqrt()))
}

fn math_pow(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("pow", &args, 2)?;
    let base = expect_number(&args[0])?;
    let exp = expect_number(&args[1])?;
    Ok(Value::Float(base.powf(exp)))
}

fn math_floor(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("floor", &args, 1)?;
    Ok(Value::Integer(expect_number(&args[0])?.floor() as i64))
}

fn math_ceil(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("ceil", &args, 1)?;
    Ok(Value::Integer(expect_number(&args[0])?.ceil() as i64))
}

fn math_fabs(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("fabs", &args, 1)?;
    Ok(Value::Float(expect_number(&args[0])?.abs()))
}

fn math_sin(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("sin", &args, 1)?;
    Ok(Value::Float(expect_number(&args[0])?.sin()))
}

fn math_cos(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("cos", &args, 1)?;
    Ok(Value::Float(expect_number(&args[0])?.cos()))
}

pub fn init_os() -> ModuleRef {
    let name = if cfg!(windows) { "nt" } else { "posix" };
    module_with(vec![
        ("name", Value::String(name.to_string())),
        ("sep", Value::String(std::path::MAIN_SEPARATOR.to_string())),
        native("getenv", os_getenv),
        native("getcwd", os_getcwd),
    ])
}

fn os_getenv(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("getenv", &args, 1)?;
    let key = expect_string(&args[0])?;
    Ok(std::env::var(key).map(Value::String).unwrap_or(Value::None))
}

fn os_getcwd(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("getcwd", &args, 0)?;
    let cwd = std::env::current_dir().map_err(|e| RuntimeError::InvalidOperation(e.to_string()))?;
    Ok(Value::String(cwd.display().to_string()))
}

pub fn init_random() -> ModuleRef {
    module_with(vec![native("random", random_random), native("randint", random_randint)])
}

fn random_random(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("random", &args, 0)?;
    Ok(Value::Float(rand::thread_rng().gen::<f64>()))
}

/// `randint(a, b)`: uniform over the closed range.
fn random_randint(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("randint", &args, 2)?;
    let low = expect_integer(&args[0])?;
    let high = expect_integer(&args[1])?;
    if low > high {
        return Err(RuntimeError::InvalidOperation(format!(
            "empty range for randint({}, {})",
            low, high
        )));
    }
    Ok(Value::Integer(rand::thread_rng().gen_range(low..=high)))
}

const S_IFMT: i64 = 0o170000;
const S_IFDIR: i64 = 0o040000;
const S_IFREG: i64 = 0o100000;

pub fn init_stat() -> ModuleRef {
    module_with(vec![
        ("S_IFMT", Value::Integer(S_IFMT)),
        ("S_IFDIR", Value::Integer(S_IFDIR)),
        ("S_IFREG", Value::Integer(S_IFREG)),
        native("S_ISDIR", stat_isdir),
        native("S_ISREG", stat_isreg),
    ])
}

fn stat_isdir(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("S_ISDIR", &args, 1)?;
    Ok(Value::Boolean(expect_integer(&args[0])? & S_IFMT == S_IFDIR))
}

fn stat_isreg(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("S_ISREG", &args, 1)?;
    Ok(Value::Boolean(expect_integer(&args[0])? & S_IFMT == S_IFREG))
}

pub fn init_time() -> ModuleRef {
    module_with(vec![
        native("time", time_time),
        native("time_ns", time_time_ns),
        native("strftime", time_strftime),
    ])
}

pub fn init_timeit() -> ModuleRef {
    module_with(vec![native("default_timer", time_time)])
}

fn time_time(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("time", &args, 0)?;
    let now = chrono::Utc::now();
    Ok(Value::Float(now.timestamp_micros() as f64 / 1_000_000.0))
}

fn time_time_ns(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("time_ns", &args, 0)?;
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .map(Value::Integer)
        .ok_or(RuntimeError::Overflow)
}

/// `strftime(format)` on the local clock. Unknown specifiers raise instead of
/// producing partial output.
fn time_strftime(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("strftime", &args, 1)?;
    let format = expect_string(&args[0])?;
    let mut out = String::new();
    write!(out, "{}", chrono::Local::now().format(format)).map_err(|_| {
        RuntimeError::InvalidOperation(format!("Invalid time format: {}", format))
    })?;
    Ok(Value::String(out))
}

pub fn init_wcwidth() -> ModuleRef {
    module_with(vec![native("wcwidth", wcwidth_wcwidth), native("wcswidth", wcwidth_wcswidth)])
}

/// Terminal columns taken by `c`: -1 for control characters, 0 for
/// combining marks, 2 for wide East Asian characters.
pub fn char_width(c: char) -> i64 {
    let cp = c as u32;
    match cp {
        0 => 0,
        0x01..=0x1F | 0x7F..=0x9F => -1,
        0x0300..=0x036F | 0x200B..=0x200F | 0xFE00..=0xFE0F => 0,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x1F300..=0x1F64F
        | 0x1F900..=0x1F9FF
        | 0x20000..=0x3FFFD => 2,
        _ => 1,
    }
}

fn wcwidth_wcwidth(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("wcwidth", &args, 1)?;
    let s = expect_string(&args[0])?;
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::Integer(char_width(c))),
        _ => Err(RuntimeError::InvalidOperation(
            "wcwidth() expects a single character".to_string(),
        )),
    }
}

fn wcwidth_wcswidth(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("wcswidth", &args, 1)?;
    let s = expect_string(&args[0])?;
    let mut total = 0;
    for c in s.chars() {
        let w = char_width(c);
        if w < 0 {
            return Ok(Value::Integer(-1));
        }
        total += w;
    }
    Ok(Value::Integer(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(module: ModuleRef, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut interp = Interpreter::new();
        let f = module.borrow().get_field(name).unwrap();
        match f {
            Value::NativeFunction(n) => (n.func)(&mut interp, args),
            other => panic!("{} is not native: {:?}", name, other),
        }
    }

    #[test]
    fn test_math() {
        assert_eq!(
            call(init_math(), "sqrt", vec![Value::Integer(16)]).unwrap(),
            Value::Float(4.0)
        );
        assert!(call(init_math(), "sqrt", vec![Value::Integer(-1)]).is_err());
        assert_eq!(
            call(init_math(), "pow", vec![Value::Integer(2), Value::Integer(10)]).unwrap(),
            Value::Float(1024.0)
        );
        assert_eq!(
            call(init_math(), "floor", vec![Value::Float(-1.5)]).unwrap(),
            Value::Integer(-2)
        );
    }

    #[test]
    fn test_math_from_script() {
        let mut interp = Interpreter::new();
        assert!(interp.load_module("import math\nlet r := math.floor(math.pi * 100)", "m"));
        let m = interp.module("m").unwrap();
        assert_eq!(m.borrow().get_field("r"), Some(Value::Integer(314)));
    }

    #[test]
    fn test_random_ranges() {
        for _ in 0..50 {
            match call(init_random(), "random", vec![]).unwrap() {
                Value::Float(f) => assert!((0.0..1.0).contains(&f)),
                other => panic!("unexpected {:?}", other),
            }
            match call(init_random(), "randint", vec![Value::Integer(3), Value::Integer(5)]) {
                Ok(Value::Integer(i)) => assert!((3..=5).contains(&i)),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(call(init_random(), "randint", vec![Value::Integer(5), Value::Integer(3)]).is_err());
    }

    #[test]
    fn test_strftime() {
        match call(init_time(), "strftime", vec![Value::String("%Y".into())]).unwrap() {
            Value::String(year) => assert_eq!(year.len(), 4),
            other => panic!("unexpected {:?}", other),
        }
        assert!(call(init_time(), "strftime", vec![Value::String("%Q".into())]).is_err());
        assert!(matches!(call(init_time(), "time", vec![]), Ok(Value::Float(t)) if t > 0.0));
    }

    #[test]
    fn test_stat_predicates() {
        let dir = Value::Integer(S_IFDIR | 0o755);
        assert_eq!(call(init_stat(), "S_ISDIR", vec![dir.clone()]).unwrap(), Value::Boolean(true));
        assert_eq!(call(init_stat(), "S_ISREG", vec![dir]).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_wcwidth() {
        assert_eq!(char_width('a'), 1);
        assert_eq!(char_width('\u{4E2D}'), 2);
        assert_eq!(char_width('\u{0301}'), 0);
        assert_eq!(char_width('\n'), -1);
        assert_eq!(
            call(init_wcwidth(), "wcswidth", vec![Value::String("a\u{4E2D}".into())]).unwrap(),
            Value::Integer(3)
        );
        assert!(call(init_wcwidth(), "wcwidth", vec![Value::String("ab".into())]).is_err());
    }

    #[test]
    fn test_dis_lists_opcodes() {
        let listing = call(init_dis(), "dis", vec![Value::String("let a := 1".into())]).unwrap();
        insta::assert_snapshot!(listing.to_string().trim_end(), @r###"
        == <dis> ==
        0000    1 Push(Integer(1))
        0001    1 Store("a")
        "###);
    }
}
