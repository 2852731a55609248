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

use crate::ast::{BinaryOp, Expression, FunctionDef, Program, Statement, StatementKind, UnaryOp};
use crate::bytecode::{Chunk, FunctionProto, OpCode};
use crate::parser::{parse_source, ParseError};
use crate::runtime::Value;
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("'return' outside function at {file}:{line}")]
    ReturnOutsideFunction { file: String, line: u32 },
}

pub struct Compiler {
    chunk: Chunk,
    file: String,
    in_function: bool,
}

impl Compiler {
    pub fn new(file: &str) -> Self {
        Self {
            chunk: Chunk::new(),
            file: file.to_string(),
            in_function: false,
        }
    }

    pub fn compile(mut self, program: &Program) -> Result<Chunk, CompileError> {
        self.visit_block(&program.statements)?;
        Ok(self.chunk)
    }

    fn visit_block(&mut self, stmts: &[Statement]) -> Result<(), CompileError> {
        for stmt in stmts {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        self.chunk.set_line(stmt.line);
        match &stmt.kind {
            StatementKind::Expression(e) => {
                self.visit_expr(e);
                self.chunk.write(OpCode::Pop);
            }
            StatementKind::Let { name, value } => {
                self.visit_expr(value);
                self.chunk.write(OpCode::Store(name.clone()));
            }
            StatementKind::SetAttr {
                object,
                attr,
                value,
            } => {
                self.visit_expr(value);
                self.visit_expr(object);
                self.chunk.write(OpCode::SetAttr(attr.clone()));
            }
            StatementKind::Function(func_def) => {
                let proto = self.compile_function(func_def, stmt.line)?;
                self.chunk.set_line(stmt.line);
                self.chunk.write(OpCode::MakeFunction(Rc::new(proto)));
                self.chunk.write(OpCode::Store(func_def.name.clone()));
            }
            StatementKind::If {
                condition,
                then_block,
                else_block,
            } => {
                self.visit_expr(condition);
                let jump_idx = self.chunk.write(OpCode::JmpIfFalse(0));
                self.visit_block(then_block)?;

                match else_block {
                    Some(stmts) => {
                        let else_jump_idx = self.chunk.write(OpCode::Jmp(0));
                        let else_start = self.chunk.code.len();
                        self.chunk.patch(jump_idx, OpCode::JmpIfFalse(else_start));
                        self.visit_block(stmts)?;
                        let end_idx = self.chunk.code.len();
                        self.chunk.patch(else_jump_idx, OpCode::Jmp(end_idx));
                    }
                    None => {
                        let end_idx = self.chunk.code.len();
                        self.chunk.patch(jump_idx, OpCode::JmpIfFalse(end_idx));
                    }
                }
            }
            StatementKind::While { condition, body } => {
                let loop_start_idx = self.chunk.code.len();
                self.visit_expr(condition);
                let jump_idx = self.chunk.write(OpCode::JmpIfFalse(0));
                self.visit_block(body)?;
                self.chunk.write(OpCode::Jmp(loop_start_idx));
                let end_idx = self.chunk.code.len();
                self.chunk.patch(jump_idx, OpCode::JmpIfFalse(end_idx));
            }
            StatementKind::Return(expr) => {
                if !self.in_function {
                    return Err(CompileError::ReturnOutsideFunction {
                        file: self.file.clone(),
                        line: stmt.line,
                    });
                }
                match expr {
                    Some(e) => self.visit_expr(e),
                    None => {
                        self.chunk.write(OpCode::Push(Value::None));
                    }
                }
                self.chunk.write(OpCode::Ret);
            }
            StatementKind::Import { name, alias } => {
                self.chunk.write(OpCode::Import(name.clone()));
                // `import a.b` binds `a.b` under its last segment unless aliased
                let binding = alias
                    .clone()
                    .unwrap_or_else(|| name.rsplit('.').next().unwrap_or(name).to_string());
                self.chunk.write(OpCode::Store(binding));
            }
            StatementKind::Raise(expr) => {
                self.visit_expr(expr);
                self.chunk.write(OpCode::Raise);
            }
        }
        Ok(())
    }

    fn compile_function(&self, func_def: &FunctionDef, line: u32) -> Result<FunctionProto, CompileError> {
        let mut func_compiler = Compiler::new(&self.file);
        func_compiler.in_function = true;
        func_compiler.chunk.set_line(line);
        func_compiler.visit_block(&func_def.body)?;

        // Falling off the end returns nil
        func_compiler.chunk.write(OpCode::Push(Value::None));
        func_compiler.chunk.write(OpCode::Ret);

        Ok(FunctionProto {
            name: func_def.name.clone(),
            params: func_def.params.clone(),
            chunk: Rc::new(func_compiler.chunk),
        })
    }

    /// `left and right`: the right operand only runs when the left is truthy.
    fn visit_and(&mut self, left: &Expression, right: &Expression) {
        self.visit_expr(left);
        let skip = self.chunk.write(OpCode::JmpIfFalse(0));
        self.visit_truthiness(right);
        let done = self.chunk.write(OpCode::Jmp(0));
        let false_at = self.chunk.write(OpCode::Push(Value::Boolean(false)));
        self.chunk.patch(skip, OpCode::JmpIfFalse(false_at));
        let end = self.chunk.code.len();
        self.chunk.patch(done, OpCode::Jmp(end));
    }

    /// `left or right`: the right operand only runs when the left is falsy.
    fn visit_or(&mut self, left: &Expression, right: &Expression) {
        self.visit_expr(left);
        let try_right = self.chunk.write(OpCode::JmpIfFalse(0));
        self.chunk.write(OpCode::Push(Value::Boolean(true)));
        let done = self.chunk.write(OpCode::Jmp(0));
        let right_at = self.chunk.code.len();
        self.chunk.patch(try_right, OpCode::JmpIfFalse(right_at));
        self.visit_truthiness(right);
        let end = self.chunk.code.len();
        self.chunk.patch(done, OpCode::Jmp(end));
    }

    /// `expr` coerced to a boolean.
    fn visit_truthiness(&mut self, expr: &Expression) {
        self.visit_expr(expr);
        self.chunk.write(OpCode::Not);
        self.chunk.write(OpCode::Not);
    }

    fn visit_expr(&mut self, expr: &Expression) {
        match expr {
            Expression::Integer(n) => {
                self.chunk.write(OpCode::Push(Value::Integer(*n)));
            }
            Expression::Float(f) => {
                self.chunk.write(OpCode::Push(Value::Float(*f)));
            }
            Expression::Literal(s) => {
                self.chunk.write(OpCode::Push(Value::String(s.clone())));
            }
            Expression::Boolean(b) => {
                self.chunk.write(OpCode::Push(Value::Boolean(*b)));
            }
            Expression::Nil => {
                self.chunk.write(OpCode::Push(Value::None));
            }
            Expression::Variable(name) => {
                self.chunk.write(OpCode::Load(name.clone()));
            }
            Expression::Binary { op, left, right } => {
                let code = match op {
                    BinaryOp::And => return self.visit_and(left, right),
                    BinaryOp::Or => return self.visit_or(left, right),
                    BinaryOp::Add => OpCode::Add,
                    BinaryOp::Sub => OpCode::Sub,
                    BinaryOp::Mul => OpCode::Mul,
                    BinaryOp::Div => OpCode::Div,
                    BinaryOp::Mod => OpCode::Mod,
                    BinaryOp::Eq => OpCode::Eq,
                    BinaryOp::Neq => OpCode::Neq,
                    BinaryOp::Lt => OpCode::Lt,
                    BinaryOp::Gt => OpCode::Gt,
                    BinaryOp::Le => OpCode::Le,
                    BinaryOp::Ge => OpCode::Ge,
                };
                self.visit_expr(left);
                self.visit_expr(right);
                self.chunk.write(code);
            }
            Expression::Unary { op, operand } => {
                self.visit_expr(operand);
                self.chunk.write(match op {
                    UnaryOp::Neg => OpCode::Neg,
                    UnaryOp::Not => OpCode::Not,
                });
            }
            Expression::Call { callee, args } => {
                // Stack at call time: [callee, arg1, ..., argN (top)]
                self.visit_expr(callee);
                for arg in args {
                    self.visit_expr(arg);
                }
                self.chunk.write(OpCode::Call(args.len()));
            }
            Expression::GetAttr { object, attr } => {
                self.visit_expr(object);
                self.chunk.write(OpCode::GetAttr(attr.clone()));
            }
        }
    }
}

/// Parse and compile module source in one step.
pub fn compile_source(source: &str, file: &str) -> Result<Chunk, CompileError> {
    let program = parse_source(source, file)?;
    Compiler::new(file).compile(&program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if_else_jump_targets() {
        let chunk = compile_source("if c { a := 1 } else { a := 2 }", "<t>").unwrap();
        // Load c, JmpIfFalse, Push 1, Store a, Jmp, Push 2, Store a
        assert!(matches!(chunk.code[1], OpCode::JmpIfFalse(5)));
        assert!(matches!(chunk.code[4], OpCode::Jmp(7)));
        assert_eq!(chunk.code.len(), 7);
    }

    #[test]
    fn test_while_loops_back_to_condition() {
        let chunk = compile_source("while x { x := x - 1 }", "<t>").unwrap();
        let last = chunk.code.len() - 1;
        assert!(matches!(chunk.code[last], OpCode::Jmp(0)));
        assert!(matches!(chunk.code[1], OpCode::JmpIfFalse(n) if n == chunk.code.len()));
    }

    #[test]
    fn test_function_body_is_separate_chunk() {
        let chunk = compile_source("func f(a) {\n  return a\n}", "<t>").unwrap();
        assert_eq!(chunk.code.len(), 2);
        let OpCode::MakeFunction(proto) = &chunk.code[0] else {
            panic!("expected MakeFunction, got {:?}", chunk.code[0]);
        };
        assert_eq!(proto.params, vec!["a".to_string()]);
        assert!(matches!(proto.chunk.code.last(), Some(OpCode::Ret)));
        assert_eq!(proto.chunk.line_at(0), 2);
    }

    #[test]
    fn test_import_binds_last_segment_or_alias() {
        let chunk = compile_source("import pkg.util\nimport math as m", "<t>").unwrap();
        assert!(matches!(&chunk.code[1], OpCode::Store(n) if n == "util"));
        assert!(matches!(&chunk.code[3], OpCode::Store(n) if n == "m"));
    }

    #[test]
    fn test_return_at_module_level_is_rejected() {
        let err = compile_source("let a := 1\nreturn a", "<m>").unwrap_err();
        assert_eq!(
            err,
            CompileError::ReturnOutsideFunction {
                file: "<m>".into(),
                line: 2
            }
        );
    }

    #[test]
    fn test_and_jumps_over_right_operand() {
        let chunk = compile_source("let r := a and b", "<t>").unwrap();
        // Load a, JmpIfFalse, Load b, Not, Not, Jmp, Push false, Store r
        assert!(matches!(chunk.code[1], OpCode::JmpIfFalse(6)));
        assert!(matches!(chunk.code[5], OpCode::Jmp(7)));
        assert!(matches!(chunk.code[6], OpCode::Push(Value::Boolean(false))));
        assert_eq!(chunk.code.len(), 8);
    }

    #[test]
    fn test_or_jumps_over_right_operand() {
        let chunk = compile_source("let r := a or b", "<t>").unwrap();
        // Load a, JmpIfFalse, Push true, Jmp, Load b, Not, Not, Store r
        assert!(matches!(chunk.code[1], OpCode::JmpIfFalse(4)));
        assert!(matches!(chunk.code[2], OpCode::Push(Value::Boolean(true))));
        assert!(matches!(chunk.code[3], OpCode::Jmp(7)));
        assert_eq!(chunk.code.len(), 8);
    }
}
