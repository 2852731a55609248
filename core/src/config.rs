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

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("JSON Parse Error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime knobs. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Register the bundled modules at startup. Has no effect when the crate
    /// is built without the `bundled-libs` feature.
    pub bundle_builtins: bool,
    /// Emit `[ember]` load tracing on the host stderr stream.
    pub trace_loads: bool,
    /// Maximum nesting of in-progress module loads.
    pub max_load_depth: usize,
    /// Maximum interpreted call frames per module execution.
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bundle_builtins: true,
            trace_loads: false,
            max_load_depth: 200,
            max_call_depth: 1000,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_load_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_load_depth must be at least 1".to_string(),
            ));
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_call_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(RuntimeConfig::from_json("{}").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config =
            RuntimeConfig::from_json(r#"{"trace_loads": true, "max_load_depth": 8}"#).unwrap();
        assert!(config.trace_loads);
        assert_eq!(config.max_load_depth, 8);
        assert!(config.bundle_builtins);
    }

    #[test]
    fn test_rejects_unknown_and_invalid() {
        assert!(matches!(
            RuntimeConfig::from_json(r#"{"trace": true}"#),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_json(r#"{"max_call_depth": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_serializes_all_fields() {
        insta::assert_json_snapshot!(RuntimeConfig::default(), @r###"
        {
          "bundle_builtins": true,
          "trace_loads": false,
          "max_load_depth": 200,
          "max_call_depth": 1000
        }
        "###);
    }
}
