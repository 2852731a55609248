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

use crate::interpreter::Interpreter;
use crate::runtime::{ModuleRef, Value};

/// A built-in module: its registry name and a factory for its namespace.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinModule {
    pub name: &'static str,
    pub init: fn() -> ModuleRef,
}

/// The modules bundled with the runtime. Initializers do not depend on each
/// other, so the order only decides registration order.
#[cfg(feature = "bundled-libs")]
pub static BUILTIN_MODULES: &[BuiltinModule] = &[
    BuiltinModule { name: "_pheap", init: crate::stdlib::init_pheap },
    BuiltinModule { name: "dis", init: crate::stdlib::init_dis },
    BuiltinModule { name: "fileio", init: crate::stdlib::init_fileio },
    BuiltinModule { name: "gc", init: crate::stdlib::init_gc },
    BuiltinModule { name: "locale", init: crate::stdlib::init_locale },
    BuiltinModule { name: "math", init: crate::stdlib::init_math },
    BuiltinModule { name: "os", init: crate::stdlib::init_os },
    BuiltinModule { name: "random", init: crate::stdlib::init_random },
    BuiltinModule { name: "stat", init: crate::stdlib::init_stat },
    BuiltinModule { name: "time", init: crate::stdlib::init_time },
    BuiltinModule { name: "timeit", init: crate::stdlib::init_timeit },
    BuiltinModule { name: "wcwidth", init: crate::stdlib::init_wcwidth },
];

/// Register every module of `table`. Each gets `__name__` set to its
/// identifier and `__file__` set to nil, since built-ins have no source.
pub fn init_modules(interp: &mut Interpreter, table: &[BuiltinModule]) {
    for entry in table {
        let module = (entry.init)();
        interp.registry_mut().insert(entry.name, module.clone());
        {
            let mut m = module.borrow_mut();
            m.set_field("__name__", Value::String(entry.name.to_string()));
            m.set_field("__file__", Value::None);
        }
        interp.trace(format_args!("registered builtin {}", entry.name));
    }
}

#[cfg(feature = "bundled-libs")]
pub fn init_builtin_modules(interp: &mut Interpreter) {
    init_modules(interp, BUILTIN_MODULES);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::runtime::ModuleObject;

    fn empty() -> Interpreter {
        let config = RuntimeConfig {
            bundle_builtins: false,
            ..RuntimeConfig::default()
        };
        Interpreter::builder().config(config).build()
    }

    fn host_module() -> ModuleRef {
        let m = ModuleObject::new_ref();
        m.borrow_mut().set_field("version", Value::Integer(3));
        // Overwritten by registration
        m.borrow_mut().set_field("__name__", Value::String("wrong".into()));
        m
    }

    #[test]
    fn test_host_table_registration() {
        let mut interp = empty();
        let table = [BuiltinModule { name: "host", init: host_module }];
        init_modules(&mut interp, &table);

        let m = interp.module("host").unwrap();
        assert_eq!(m.borrow().name(), "host");
        assert_eq!(m.borrow().get_field("__file__"), Some(Value::None));
        assert_eq!(m.borrow().get_field("version"), Some(Value::Integer(3)));
    }

    #[test]
    fn test_user_code_sees_host_modules() {
        let mut interp = empty();
        init_modules(&mut interp, &[BuiltinModule { name: "host", init: host_module }]);
        assert!(interp.load_module("import host\nlet v := host.version + 1", "user"));
        let user = interp.module("user").unwrap();
        assert_eq!(user.borrow().get_field("v"), Some(Value::Integer(4)));
    }

    #[cfg(feature = "bundled-libs")]
    #[test]
    fn test_every_builtin_is_registered_without_file() {
        let interp = Interpreter::new();
        assert_eq!(interp.registry().len(), BUILTIN_MODULES.len());
        for entry in BUILTIN_MODULES {
            let m = interp.module(entry.name).unwrap();
            let m = m.borrow();
            assert_eq!(m.name(), entry.name);
            assert_eq!(m.get_field("__file__"), Some(Value::None));
            assert_eq!(m.file(), None);
        }
    }

    #[cfg(feature = "bundled-libs")]
    #[test]
    fn test_builtin_names_are_unique() {
        let mut names: Vec<&str> = BUILTIN_MODULES.iter().map(|b| b.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), BUILTIN_MODULES.len());
    }
}
