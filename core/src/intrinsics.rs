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

use crate::host_write;
use crate::interpreter::Interpreter;
use crate::loader;
use crate::runtime::{NativeFn, RuntimeError, Scope, Value};

use std::cmp::Ordering;

pub struct IntrinsicRegistry;

impl IntrinsicRegistry {
    pub fn resolve(name: &str) -> Option<NativeFn> {
        match name {
            "print" => Some(intrinsic_print),
            "str" => Some(intrinsic_str),
            "len" => Some(intrinsic_len),
            "type" => Some(intrinsic_type),
            "exec_module" => Some(intrinsic_exec_module),
            "has_module" => Some(intrinsic_has_module),
            _ => None,
        }
    }

    pub fn names() -> &'static [&'static str] {
        &["print", "str", "len", "type", "exec_module", "has_module"]
    }

    /// Install every builtin into `scope`.
    pub fn register_all(scope: &mut Scope) {
        for name in Self::names() {
            if let Some(func) = Self::resolve(name) {
                scope.set(name.to_string(), Value::native(name, func));
            }
        }
    }
}

pub(crate) fn expect_args(name: &str, args: &[Value], expected: usize) -> Result<(), RuntimeError> {
    if args.len() != expected {
        return Err(RuntimeError::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

pub(crate) fn expect_string(value: &Value) -> Result<&str, RuntimeError> {
    value
        .as_str()
        .ok_or_else(|| RuntimeError::TypeMismatch("String".to_string(), value.clone()))
}

pub(crate) fn expect_number(value: &Value) -> Result<f64, RuntimeError> {
    match value {
        Value::Integer(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(RuntimeError::TypeMismatch(
            "Number".to_string(),
            other.clone(),
        )),
    }
}

/// Space-separated, newline-terminated, through the output shim. Output
/// failures are the host's concern and do not raise.
pub fn intrinsic_print(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let out = interp.output().clone();
    let stream = out.stdout();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.write_char(stream, ' ' as i32);
        }
        host_write!(out, stream, "{}", arg);
    }
    out.write_char(stream, '\n' as i32);
    Ok(Value::None)
}

pub fn intrinsic_str(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("str", &args, 1)?;
    Ok(Value::String(args[0].to_string()))
}

pub fn intrinsic_len(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("len", &args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(Value::Integer(s.chars().count() as i64)),
        Value::Module(m) => Ok(Value::Integer(m.borrow().field_names().len() as i64)),
        other => Err(RuntimeError::TypeMismatch(
            "String or Module".to_string(),
            other.clone(),
        )),
    }
}

pub fn intrinsic_type(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    expect_args("type", &args, 1)?;
    Ok(Value::String(args[0].type_name().to_string()))
}

/// `exec_module(source, name)`: nested loader entry point. Failure is reported
/// as `false`; the cause stays available through `Interpreter::last_error`.
pub fn intrinsic_exec_module(
    interp: &mut Interpreter,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    expect_args("exec_module", &args, 2)?;
    let source = expect_string(&args[0])?;
    let name = expect_string(&args[1])?;
    Ok(Value::Boolean(loader::load_module(interp, source, name)))
}

pub fn intrinsic_has_module(
    interp: &mut Interpreter,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    expect_args("has_module", &args, 1)?;
    let name = expect_string(&args[0])?;
    Ok(Value::Boolean(interp.registry().contains(name)))
}

pub fn intrinsic_add(left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => {
            a.checked_add(b).map(Value::Integer).ok_or(RuntimeError::Overflow)
        }
        (Value::String(mut a), Value::String(b)) => {
            a.push_str(&b);
            Ok(Value::String(a))
        }
        (Value::String(mut a), b @ (Value::Integer(_) | Value::Float(_) | Value::Boolean(_))) => {
            a.push_str(&b.to_string());
            Ok(Value::String(a))
        }
        (a @ (Value::Integer(_) | Value::Float(_) | Value::Boolean(_)), Value::String(b)) => {
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (a, b) => float_op(a, b, |x, y| x + y),
    }
}

pub fn intrinsic_sub(left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => {
            a.checked_sub(b).map(Value::Integer).ok_or(RuntimeError::Overflow)
        }
        (a, b) => float_op(a, b, |x, y| x - y),
    }
}

pub fn intrinsic_mul(left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => {
            a.checked_mul(b).map(Value::Integer).ok_or(RuntimeError::Overflow)
        }
        (a, b) => float_op(a, b, |x, y| x * y),
    }
}

pub fn intrinsic_div(left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Integer(_), Value::Integer(0)) => Err(RuntimeError::DivisionByZero),
        (Value::Integer(a), Value::Integer(b)) => {
            a.checked_div(b).map(Value::Integer).ok_or(RuntimeError::Overflow)
        }
        (a, b) => {
            if expect_number(&b)? == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            float_op(a, b, |x, y| x / y)
        }
    }
}

pub fn intrinsic_mod(left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Integer(_), Value::Integer(0)) => Err(RuntimeError::DivisionByZero),
        (Value::Integer(a), Value::Integer(b)) => {
            a.checked_rem(b).map(Value::Integer).ok_or(RuntimeError::Overflow)
        }
        (a, b) => {
            if expect_number(&b)? == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            float_op(a, b, |x, y| x % y)
        }
    }
}

pub fn intrinsic_neg(value: Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Integer(i) => i.checked_neg().map(Value::Integer).ok_or(RuntimeError::Overflow),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(RuntimeError::TypeMismatch("Number".to_string(), other)),
    }
}

fn float_op(left: Value, right: Value, op: fn(f64, f64) -> f64) -> Result<Value, RuntimeError> {
    let a = expect_number(&left)?;
    let b = expect_number(&right)?;
    Ok(Value::Float(op(a, b)))
}

pub fn intrinsic_compare(left: &Value, right: &Value) -> Result<Ordering, RuntimeError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (a, b) => {
            let x = expect_number(a)?;
            let y = expect_number(b)?;
            x.partial_cmp(&y).ok_or_else(|| {
                RuntimeError::InvalidOperation("Comparison with NaN".to_string())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{BufferHost, Stream};
    use crate::interpreter::Interpreter;
    use std::rc::Rc;

    #[test]
    fn test_add_variants() {
        assert_eq!(
            intrinsic_add(Value::Integer(2), Value::Integer(3)).unwrap(),
            Value::Integer(5)
        );
        assert_eq!(
            intrinsic_add(Value::String("n=".into()), Value::Integer(3)).unwrap(),
            Value::String("n=3".into())
        );
        assert_eq!(
            intrinsic_add(Value::Integer(1), Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
        assert!(matches!(
            intrinsic_add(Value::Integer(i64::MAX), Value::Integer(1)),
            Err(RuntimeError::Overflow)
        ));
        assert!(matches!(
            intrinsic_add(Value::None, Value::Integer(1)),
            Err(RuntimeError::TypeMismatch(..))
        ));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            intrinsic_div(Value::Integer(1), Value::Integer(0)),
            Err(RuntimeError::DivisionByZero)
        ));
        assert!(matches!(
            intrinsic_mod(Value::Float(1.0), Value::Integer(0)),
            Err(RuntimeError::DivisionByZero)
        ));
        assert_eq!(
            intrinsic_div(Value::Integer(7), Value::Integer(2)).unwrap(),
            Value::Integer(3)
        );
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            intrinsic_compare(&Value::Integer(1), &Value::Float(1.5)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            intrinsic_compare(&Value::String("b".into()), &Value::String("a".into())).unwrap(),
            Ordering::Greater
        );
        assert!(intrinsic_compare(&Value::String("a".into()), &Value::Integer(1)).is_err());
    }

    #[test]
    fn test_print_goes_through_output_shim() {
        let host = Rc::new(BufferHost::new());
        let mut interp = Interpreter::builder().host(host.clone()).build();
        intrinsic_print(
            &mut interp,
            vec![Value::String("a".into()), Value::Integer(1), Value::Float(2.0)],
        )
        .unwrap();
        assert_eq!(host.contents(Stream::Stdout), "a 1 2.0\n");
    }

    #[test]
    fn test_builtin_arity_is_checked() {
        let mut interp = Interpreter::builder().build();
        let err = intrinsic_len(&mut interp, vec![]).unwrap_err();
        assert_eq!(err.to_string(), "len() takes 1 arguments, got 0");
    }
}
