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

use crate::bytecode::{Chunk, OpCode};
use crate::interpreter::Interpreter;
use crate::intrinsics;
use crate::loader;
use crate::runtime::{Exception, FunctionObject, ModuleRef, RuntimeError, Scope, Value};
use std::cmp::Ordering;
use std::rc::Rc;

struct CallFrame {
    ip: usize,
    chunk: Rc<Chunk>,
    globals: ModuleRef,
    stack_base: usize,
}

/// Executes one module body. Operands live on the interpreter's execution
/// context stack; globals are the fields of the module being run.
pub struct VM<'a> {
    interp: &'a mut Interpreter,
    chunk: Rc<Chunk>,
    ip: usize,
    globals: ModuleRef,
    frames: Vec<CallFrame>,
    scopes: Vec<Scope>,
    file: String,
}

impl<'a> VM<'a> {
    pub fn new(interp: &'a mut Interpreter, chunk: Chunk, module: ModuleRef, file: &str) -> Self {
        Self {
            interp,
            chunk: Rc::new(chunk),
            ip: 0,
            globals: module,
            frames: Vec::new(),
            scopes: Vec::new(),
            file: file.to_string(),
        }
    }

    /// Run to the end of the module body.
    pub fn run(&mut self) -> Result<(), Exception> {
        self.execute().map_err(|error| Exception {
            error,
            file: self.file.clone(),
            line: self.chunk.line_at(self.ip.saturating_sub(1)),
        })
    }

    fn execute(&mut self) -> Result<(), RuntimeError> {
        loop {
            if self.ip >= self.chunk.code.len() {
                // Function bodies always end in Ret, so this is the module end
                return Ok(());
            }

            let op = self.chunk.code[self.ip].clone();
            self.ip += 1;

            match op {
                OpCode::Push(v) => self.push(v),
                OpCode::Pop => {
                    self.pop()?;
                }

                OpCode::Add => self.binary_op(intrinsics::intrinsic_add)?,
                OpCode::Sub => self.binary_op(intrinsics::intrinsic_sub)?,
                OpCode::Mul => self.binary_op(intrinsics::intrinsic_mul)?,
                OpCode::Div => self.binary_op(intrinsics::intrinsic_div)?,
                OpCode::Mod => self.binary_op(intrinsics::intrinsic_mod)?,
                OpCode::Neg => {
                    let a = self.pop()?;
                    self.push(intrinsics::intrinsic_neg(a)?);
                }

                OpCode::Eq => self.binary_op(|a, b| Ok(Value::Boolean(a == b)))?,
                OpCode::Neq => self.binary_op(|a, b| Ok(Value::Boolean(a != b)))?,
                OpCode::Gt => self.compare_op(|o| o == Ordering::Greater)?,
                OpCode::Lt => self.compare_op(|o| o == Ordering::Less)?,
                OpCode::Ge => self.compare_op(|o| o != Ordering::Less)?,
                OpCode::Le => self.compare_op(|o| o != Ordering::Greater)?,

                OpCode::Not => {
                    let a = self.pop()?;
                    self.push(Value::Boolean(!a.is_truthy()));
                }

                OpCode::Load(name) => {
                    let val = self
                        .find_var(&name)
                        .ok_or(RuntimeError::UndefinedName(name))?;
                    self.push(val);
                }
                OpCode::Store(name) => {
                    let val = self.pop()?;
                    self.store(name, val);
                }
                OpCode::GetAttr(attr) => {
                    let obj = self.pop()?;
                    let val = get_attr(&obj, &attr)?;
                    self.push(val);
                }
                OpCode::SetAttr(attr) => {
                    let obj = self.pop()?;
                    let val = self.pop()?;
                    match obj {
                        Value::Module(m) => m.borrow_mut().set_field(attr, val),
                        other => {
                            return Err(RuntimeError::TypeMismatch("Module".to_string(), other));
                        }
                    }
                }

                OpCode::Jmp(offset) => {
                    self.ip = offset;
                }
                OpCode::JmpIfFalse(offset) => {
                    let val = self.pop()?;
                    if !val.is_truthy() {
                        self.ip = offset;
                    }
                }

                OpCode::MakeFunction(proto) => {
                    let func = FunctionObject {
                        name: proto.name.clone(),
                        params: proto.params.clone(),
                        chunk: proto.chunk.clone(),
                        module: Rc::downgrade(&self.globals),
                    };
                    self.push(Value::Function(Rc::new(func)));
                }
                OpCode::Call(arg_count) => self.call(arg_count)?,
                OpCode::Ret => {
                    let result = self.pop()?;
                    let frame = self.frames.pop().ok_or_else(|| {
                        RuntimeError::InvalidOperation("return outside function".to_string())
                    })?;
                    self.scopes.pop();
                    self.interp.context_mut().truncate_stack(frame.stack_base);
                    self.chunk = frame.chunk;
                    self.ip = frame.ip;
                    self.globals = frame.globals;
                    self.push(result);
                }

                OpCode::Import(name) => {
                    let module = self.import(&name)?;
                    self.push(Value::Module(module));
                }
                OpCode::Raise => {
                    let val = self.pop()?;
                    return Err(RuntimeError::Raised(val));
                }
            }
        }
    }

    fn push(&mut self, value: Value) {
        self.interp.context_mut().push(value);
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.interp.context_mut().pop()
    }

    fn binary_op<F>(&mut self, op_fn: F) -> Result<(), RuntimeError>
    where
        F: Fn(Value, Value) -> Result<Value, RuntimeError>,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        let res = op_fn(a, b)?;
        self.push(res);
        Ok(())
    }

    fn compare_op<F>(&mut self, test: F) -> Result<(), RuntimeError>
    where
        F: Fn(Ordering) -> bool,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        let ordering = intrinsics::intrinsic_compare(&a, &b)?;
        self.push(Value::Boolean(test(ordering)));
        Ok(())
    }

    fn call(&mut self, arg_count: usize) -> Result<(), RuntimeError> {
        let args = self.interp.context_mut().pop_n(arg_count)?;
        let callee = self.pop()?;
        match callee {
            Value::Function(func) => {
                if args.len() != func.params.len() {
                    return Err(RuntimeError::Arity {
                        name: func.name.clone(),
                        expected: func.params.len(),
                        got: args.len(),
                    });
                }
                if self.frames.len() >= self.interp.config().max_call_depth {
                    return Err(RuntimeError::StackOverflow);
                }
                let globals = func.module.upgrade().ok_or_else(|| {
                    RuntimeError::InvalidOperation(format!(
                        "module of function '{}' no longer exists",
                        func.name
                    ))
                })?;

                let mut scope = Scope::new();
                for (param, arg) in func.params.iter().zip(args) {
                    scope.set(param.clone(), arg);
                }

                self.frames.push(CallFrame {
                    ip: self.ip,
                    chunk: self.chunk.clone(),
                    globals: self.globals.clone(),
                    stack_base: self.interp.context().stack_len(),
                });
                self.scopes.push(scope);
                self.chunk = func.chunk.clone();
                self.ip = 0;
                self.globals = globals;
                Ok(())
            }
            Value::NativeFunction(native) => {
                let result = (native.func)(&mut *self.interp, args)?;
                self.push(result);
                Ok(())
            }
            other => Err(RuntimeError::NotCallable(other)),
        }
    }

    fn store(&mut self, name: String, value: Value) {
        match self.scopes.last_mut() {
            Some(scope) => scope.set(name, value),
            None => self.globals.borrow_mut().set_field(name, value),
        }
    }

    fn find_var(&self, name: &str) -> Option<Value> {
        if let Some(scope) = self.scopes.last() {
            if let Some(val) = scope.get(name) {
                return Some(val);
            }
        }
        if let Some(val) = self.globals.borrow().get_field(name) {
            return Some(val);
        }
        self.interp.builtin(name)
    }

    /// Registry first, then the host resolver through a nested load.
    fn import(&mut self, name: &str) -> Result<ModuleRef, RuntimeError> {
        if let Some(module) = self.interp.module(name) {
            // Binding a module into its own fields would form an Rc cycle
            if Rc::ptr_eq(&module, &self.globals) {
                return Err(RuntimeError::SelfImport(name.to_string()));
            }
            return Ok(module);
        }
        let resolver = self
            .interp
            .module_resolver()
            .ok_or_else(|| RuntimeError::ModuleNotFound(name.to_string()))?;
        let source =
            (*resolver)(name).ok_or_else(|| RuntimeError::ModuleNotFound(name.to_string()))?;
        loader::try_load_module(&mut *self.interp, &source, name).map_err(|cause| {
            RuntimeError::ImportFailed {
                name: name.to_string(),
                cause: Box::new(cause),
            }
        })
    }
}

fn get_attr(obj: &Value, attr: &str) -> Result<Value, RuntimeError> {
    match obj {
        Value::Module(m) => {
            let module = m.borrow();
            module
                .get_field(attr)
                .ok_or_else(|| RuntimeError::MissingAttribute {
                    owner: module.name(),
                    attr: attr.to_string(),
                })
        }
        other => Err(RuntimeError::MissingAttribute {
            owner: other.type_name().to_string(),
            attr: attr.to_string(),
        }),
    }
}
