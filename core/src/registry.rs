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

use crate::runtime::ModuleRef;
use std::collections::HashMap;

/// Name → module table owned by an [`Interpreter`](crate::interpreter::Interpreter).
///
/// Mutation requires `&mut`, so a single writer is enforced by the borrow
/// checker. Outside of an in-flight load, every entry is a fully initialized
/// module.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleRef>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the module previously registered under `name`, if any.
    pub fn insert(&mut self, name: impl Into<String>, module: ModuleRef) -> Option<ModuleRef> {
        self.modules.insert(name.into(), module)
    }

    pub fn get(&self, name: &str) -> Option<ModuleRef> {
        self.modules.get(name).cloned()
    }

    pub fn remove(&mut self, name: &str) -> Option<ModuleRef> {
        self.modules.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }
}
