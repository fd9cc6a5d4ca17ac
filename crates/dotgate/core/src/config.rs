// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::semantics::MAX_TABLES;

/// Planner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Log every fusion and join decision at debug level
    pub verbose: bool,
    /// Largest number of tables a statement may reference
    pub max_tables: usize,
    /// Send compatible union arms down as a single route
    pub union_merge: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            max_tables: MAX_TABLES,
            union_merge: true,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_tables must be between 1 and {MAX_TABLES}, got {0}")]
    MaxTables(usize),
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

impl PlannerConfig {
    /// Defaults overridden by `DOTGATE_MAX_TABLES` and `DOTGATE_VERBOSE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&'static str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = lookup("DOTGATE_MAX_TABLES") {
            self.max_tables = value.trim().parse().map_err(|_| ConfigError::InvalidEnv { var: "DOTGATE_MAX_TABLES", value })?;
        }
        if let Some(value) = lookup("DOTGATE_VERBOSE") {
            self.verbose = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => return Err(ConfigError::InvalidEnv { var: "DOTGATE_VERBOSE", value }),
            };
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tables == 0 || self.max_tables > MAX_TABLES {
            return Err(ConfigError::MaxTables(self.max_tables));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let vars: HashMap<&'static str, String> = vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.max_tables, 64);
        assert!(config.union_merge);
        assert!(!config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = PlannerConfig::default();
        config.apply_env(lookup(&[("DOTGATE_MAX_TABLES", "8"), ("DOTGATE_VERBOSE", "true")])).unwrap();
        assert_eq!(config.max_tables, 8);
        assert!(config.verbose);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let mut config = PlannerConfig::default();
        let err = config.apply_env(lookup(&[("DOTGATE_MAX_TABLES", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "DOTGATE_MAX_TABLES", .. }));
        let err = config.apply_env(lookup(&[("DOTGATE_MAX_TABLES", "65")])).unwrap_err();
        assert_eq!(err, ConfigError::MaxTables(65));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PlannerConfig = serde_json::from_str(r#"{"verbose": true}"#).unwrap();
        assert!(config.verbose);
        assert_eq!(config.max_tables, 64);
    }
}
