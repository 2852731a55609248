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

use crate::bytecode::Chunk;
use crate::interpreter::Interpreter;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;

pub type ModuleRef = Rc<RefCell<ModuleObject>>;

pub type NativeFn = fn(&mut Interpreter, Vec<Value>) -> Result<Value, RuntimeError>;

#[derive(Clone)]
pub enum Value {
    None,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Function(Rc<FunctionObject>),
    NativeFunction(NativeFunction),
    Module(ModuleRef),
}

#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub func: NativeFn,
}

/// Compiled function body plus the module whose fields serve as its globals.
pub struct FunctionObject {
    pub name: String,
    pub params: Vec<String>,
    pub chunk: Rc<Chunk>,
    pub module: Weak<RefCell<ModuleObject>>,
}

impl Value {
    pub fn native(name: &'static str, func: NativeFn) -> Self {
        Value::NativeFunction(NativeFunction { name, func })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "nil",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
            Value::Function(_) => "function",
            Value::NativeFunction(_) => "native",
            Value::Module(_) => "module",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            // String truthiness consistency
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFunction(a), Value::NativeFunction(b)) => a.name == b.name,
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// Modules are shown by name only; fields may refer back to the module.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Integer(i) => write!(f, "Integer({})", i),
            Value::Float(x) => write!(f, "Float({:?})", x),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Function(func) => write!(f, "Function({})", func.name),
            Value::NativeFunction(n) => write!(f, "NativeFunction({})", n.name),
            Value::Module(m) => write!(f, "Module({})", m.borrow().name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Function(func) => write!(f, "<function {}>", func.name),
            Value::NativeFunction(n) => write!(f, "<native {}>", n.name),
            Value::Module(m) => write!(f, "<module '{}'>", m.borrow().name()),
        }
    }
}

/// A module namespace. Top-level bindings of the module's code live in
/// `fields` next to the `__name__` / `__file__` metadata.
#[derive(Debug, Default)]
pub struct ModuleObject {
    fields: HashMap<String, Value>,
}

impl ModuleObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_ref() -> ModuleRef {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn get_field(&self, key: &str) -> Option<Value> {
        self.fields.get(key).cloned()
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.keys().cloned().collect();
        names.sort();
        names
    }

    /// `__name__`, or `"?"` for a module that was never named.
    pub fn name(&self) -> String {
        match self.fields.get("__name__") {
            Some(Value::String(s)) => s.clone(),
            _ => "?".to_string(),
        }
    }

    /// `__file__`; `None` is the "no file" sentinel of built-in modules.
    pub fn file(&self) -> Option<String> {
        match self.fields.get("__file__") {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Function-local variables.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: HashMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            variables: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    pub fn set(&mut self, name: String, value: Value) {
        self.variables.insert(name, value);
    }
}

#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("Type mismatch: expected {0}, got {1:?}")]
    TypeMismatch(String, Value),
    #[error("Name '{0}' is not defined")]
    UndefinedName(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow")]
    Overflow,
    #[error("{name}() takes {expected} arguments, got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("Value is not callable: {0:?}")]
    NotCallable(Value),
    #[error("'{owner}' has no attribute '{attr}'")]
    MissingAttribute { owner: String, attr: String },
    #[error("{0}")]
    Raised(Value),
    #[error("No module named '{0}'")]
    ModuleNotFound(String),
    #[error("Module '{0}' cannot import itself")]
    SelfImport(String),
    #[error("Import of '{name}' failed: {cause}")]
    ImportFailed {
        name: String,
        cause: Box<crate::loader::LoadError>,
    },
    #[error("Maximum call depth exceeded")]
    StackOverflow,
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// A runtime error together with where it happened.
#[derive(Error, Debug, Clone)]
#[error("{error} (at {file}:{line})")]
pub struct Exception {
    pub error: RuntimeError,
    pub file: String,
    pub line: u32,
}
