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

use crate::runtime::Value;
use std::fmt::Write;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum OpCode {
    // Stack
    Push(Value),
    Pop,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,

    // Comparison
    Eq,
    Neq,
    Gt,
    Lt,
    Ge,
    Le,

    // Logic
    Not,

    // Variables
    Load(String),
    Store(String),
    GetAttr(String),
    SetAttr(String),

    // Control Flow
    Jmp(usize),
    JmpIfFalse(usize),

    // Functions
    MakeFunction(Rc<FunctionProto>),
    Call(usize), // Argument count
    Ret,

    // Modules
    Import(String),
    Raise,
}

/// Compile-time half of a function; bound to its defining module by
/// `OpCode::MakeFunction`.
#[derive(Debug)]
pub struct FunctionProto {
    pub name: String,
    pub params: Vec<String>,
    pub chunk: Rc<Chunk>,
}

#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<OpCode>,
    /// Source line of each instruction.
    pub lines: Vec<u32>,
    current_line: u32,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source line for subsequent writes
    pub fn set_line(&mut self, line: u32) {
        self.current_line = line;
    }

    pub fn write(&mut self, op: OpCode) -> usize {
        self.code.push(op);
        self.lines.push(self.current_line);
        self.code.len() - 1
    }

    pub fn patch(&mut self, index: usize, op: OpCode) {
        self.code[index] = op;
    }

    pub fn line_at(&self, ip: usize) -> u32 {
        self.lines.get(ip).copied().unwrap_or(0)
    }

    /// Human readable listing, nested function bodies included.
    pub fn disassemble(&self, name: &str) -> String {
        let mut out = String::new();
        self.disassemble_into(name, &mut out);
        out
    }

    fn disassemble_into(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "== {} ==", name);
        for (ip, op) in self.code.iter().enumerate() {
            let _ = match op {
                OpCode::MakeFunction(proto) => {
                    writeln!(out, "{:04} {:>4} MakeFunction({})", ip, self.line_at(ip), proto.name)
                }
                other => writeln!(out, "{:04} {:>4} {:?}", ip, self.line_at(ip), other),
            };
        }
        for op in &self.code {
            if let OpCode::MakeFunction(proto) = op {
                proto.chunk.disassemble_into(&proto.name, out);
            }
        }
    }
}
