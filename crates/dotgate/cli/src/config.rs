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

use anyhow::{Context, Result};
use dotgate_core::PlannerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub planner: PlannerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl CliConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `--config` wins over `DOTGATE_CONFIG`, which wins over the defaults.
    /// Individual settings can then be overridden from the environment.
    pub fn resolve_config(cli_config: Option<PathBuf>) -> Result<Self> {
        Self::resolve_with(cli_config, |var| std::env::var(var).ok())
    }

    fn resolve_with(cli_config: Option<PathBuf>, lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self> {
        let mut config = if let Some(config_path) = cli_config {
            Self::load_from_file(config_path)?
        } else if let Some(env_config) = lookup("DOTGATE_CONFIG") {
            Self::load_from_file(env_config)?
        } else {
            Self::default()
        };

        if let Some(level) = lookup("DOTGATE_LOG_LEVEL") {
            config.logging.level = level;
        }
        config.planner.apply_env(&lookup)?;
        Ok(config)
    }
}
