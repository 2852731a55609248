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

use crate::loader::LoadError;
use crate::runtime::{ModuleRef, RuntimeError, Value};
use std::rc::Rc;

/// Per-thread execution state: the active module, the pending-error slot and
/// the shared operand stack.
///
/// The active module is a back-reference. The loader saves it before entering
/// a module and restores it on every exit path.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    active_module: Option<ModuleRef>,
    pending_error: Option<LoadError>,
    stack: Vec<Value>,
    load_depth: usize,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_module(&self) -> Option<ModuleRef> {
        self.active_module.clone()
    }

    pub fn set_active_module(&mut self, module: Option<ModuleRef>) {
        self.active_module = module;
    }

    pub fn is_active(&self, module: &ModuleRef) -> bool {
        self.active_module
            .as_ref()
            .is_some_and(|m| Rc::ptr_eq(m, module))
    }

    /// Number of loads currently in progress on this context.
    pub fn load_depth(&self) -> usize {
        self.load_depth
    }

    pub(crate) fn enter_load(&mut self, module: ModuleRef) {
        self.load_depth += 1;
        self.active_module = Some(module);
    }

    pub(crate) fn leave_load(&mut self, enclosing: Option<ModuleRef>) {
        self.load_depth = self.load_depth.saturating_sub(1);
        self.active_module = enclosing;
    }

    /// Record an error. The first recorded cause wins.
    pub fn raise(&mut self, error: LoadError) {
        if self.pending_error.is_none() {
            self.pending_error = Some(error);
        }
    }

    pub fn has_pending_error(&self) -> bool {
        self.pending_error.is_some()
    }

    pub fn take_error(&mut self) -> Option<LoadError> {
        self.pending_error.take()
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    pub fn peek(&self, distance: usize) -> Result<&Value, RuntimeError> {
        let len = self.stack.len();
        if distance >= len {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(&self.stack[len - 1 - distance])
    }

    /// Removes the top `count` values, preserving their order.
    pub fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        if count > self.stack.len() {
            return Err(RuntimeError::StackUnderflow);
        }
        let at = self.stack.len() - count;
        Ok(self.stack.split_off(at))
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn truncate_stack(&mut self, base: usize) {
        self.stack.truncate(base);
    }

    /// Drop everything above `base` and clear any pending error.
    pub fn reset_stack(&mut self, base: usize) {
        self.stack.truncate(base);
        self.pending_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ModuleObject;

    #[test]
    fn test_enter_leave_restores_enclosing() {
        let mut cx = ExecutionContext::new();
        let outer = ModuleObject::new_ref();
        let inner = ModuleObject::new_ref();

        cx.enter_load(outer.clone());
        let saved = cx.active_module();
        cx.enter_load(inner.clone());
        assert!(cx.is_active(&inner));
        assert_eq!(cx.load_depth(), 2);

        cx.leave_load(saved);
        assert!(cx.is_active(&outer));
        cx.leave_load(None);
        assert!(cx.active_module().is_none());
        assert_eq!(cx.load_depth(), 0);
    }

    #[test]
    fn test_first_raised_error_wins() {
        let mut cx = ExecutionContext::new();
        cx.raise(LoadError::Import("first".into()));
        cx.raise(LoadError::Import("second".into()));
        assert!(cx.has_pending_error());
        assert!(matches!(cx.take_error(), Some(LoadError::Import(m)) if m == "first"));
        assert!(!cx.has_pending_error());
    }

    #[test]
    fn test_stack_reset_to_base() {
        let mut cx = ExecutionContext::new();
        cx.push(Value::Integer(1));
        let base = cx.stack_len();
        cx.push(Value::Integer(2));
        cx.push(Value::Integer(3));
        assert_eq!(cx.peek(1).unwrap(), &Value::Integer(2));
        assert_eq!(cx.pop_n(2).unwrap(), vec![Value::Integer(2), Value::Integer(3)]);
        cx.push(Value::None);
        cx.raise(LoadError::Import("x".into()));

        cx.reset_stack(base);
        assert_eq!(cx.stack_len(), 1);
        assert!(!cx.has_pending_error());
        assert!(matches!(cx.pop_n(2), Err(RuntimeError::StackUnderflow)));
    }
}
