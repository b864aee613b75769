use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Recognized configuration keys, with their defaults.
/// Loaded the same way as the teacher's `Config::load` — a JSON file on
/// disk, falling back to environment variables, falling back to the
/// documented default — and written back out the first time it is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub primary_provider_min_interval_s: u64,
    pub backup_provider_min_interval_s: u64,
    pub research_deadline_s: u64,
    pub adapter_timeout_s: u64,
    pub so_base_count: u32,
    pub so_max_count: u32,
    pub devto_primary_window_days: i64,
    pub devto_fallback_window_days: i64,
    pub module_assembly_deadline_s: u64,
    pub schema_version: u32,
    pub worker_concurrency: usize,
    pub shutdown_grace_period_s: u64,
    pub ai_call_deadline_s: u64,
    pub transcription_deadline_s: u64,
}

impl Config {
    /// Layers the documented defaults, then the on-disk JSON file, then
    /// environment variables (highest precedence), the same order the
    /// teacher's `Config::load` applies them, but via the `config` crate's
    /// layered-source builder instead of a hand-rolled override pass.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let default_config = Self::default();
            default_config.save()?;
            return Ok(default_config);
        }

        let defaults = Self::default();
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&defaults).context("failed to seed config defaults")?)
            .add_source(config::File::from(config_path).required(false))
            .add_source(config::Environment::default())
            .build()
            .context("failed to assemble configuration layers")?;

        settings.try_deserialize().context("failed to parse configuration")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(dir) = config_path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).context("failed to create config directory")?;
            }
        }

        let config_str =
            serde_json::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&config_path, config_str)
            .context(format!("failed to write config to {config_path:?}"))?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = env::var("LESSONFORGE_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let current_dir_config = Path::new("lessonforge_config.json");
        if current_dir_config.exists() {
            return Ok(current_dir_config.to_path_buf());
        }

        Ok(PathBuf::from("lessonforge_config.json"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_provider_min_interval_s: 3,
            backup_provider_min_interval_s: 6,
            research_deadline_s: 30,
            adapter_timeout_s: 15,
            so_base_count: 5,
            so_max_count: 8,
            devto_primary_window_days: 365,
            devto_fallback_window_days: 730,
            module_assembly_deadline_s: 600,
            schema_version: 1,
            worker_concurrency: 1,
            shutdown_grace_period_s: 30,
            ai_call_deadline_s: 60,
            transcription_deadline_s: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_key_table() {
        let config = Config::default();
        assert_eq!(config.primary_provider_min_interval_s, 3);
        assert_eq!(config.backup_provider_min_interval_s, 6);
        assert_eq!(config.research_deadline_s, 30);
        assert_eq!(config.so_base_count, 5);
        assert_eq!(config.so_max_count, 8);
    }
}
