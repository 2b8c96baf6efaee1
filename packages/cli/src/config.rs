use formloom_engine::{Breakpoint, FormConfig, FormOptions, StoreMode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_NAME: &str = "formloom.config.json";

/// Formloom configuration file format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Engine timings (debounce windows, apply retries)
    #[serde(flatten)]
    pub engine: FormConfig,

    /// Who owns the document
    #[serde(default)]
    pub mode: StoreMode,

    #[serde(default)]
    pub breakpoint: Breakpoint,

    /// Passed to every predicate
    #[serde(default)]
    pub payload: Value,
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(Config::default())
        }
    }

    pub fn form_options(&self) -> FormOptions {
        FormOptions::default()
            .with_config(self.engine.clone())
            .with_mode(self.mode)
            .with_breakpoint(self.breakpoint)
            .with_payload(self.payload.clone())
    }
}
