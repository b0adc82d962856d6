//! Bridge configuration loader.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::BridgeError;
use crate::internals::AssetScheme;

/// How callback ids are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Random 32-bit draws, redrawn on collision, counter fallback.
    #[default]
    Random,
    /// Wrapping counter only.
    Sequential,
}

impl IdStrategy {
    fn parse(raw: &str) -> Result<Self, BridgeError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(IdStrategy::Random),
            "sequential" => Ok(IdStrategy::Sequential),
            other => Err(BridgeError::Config(format!(
                "Unknown id strategy: {}",
                other
            ))),
        }
    }
}

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub id_strategy: IdStrategy,
    pub max_id_retries: u32,
    pub asset_scheme: Option<AssetScheme>,
    /// Include argument and result payloads in debug logs.
    pub log_payloads: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            id_strategy: IdStrategy::Random,
            max_id_retries: 16,
            asset_scheme: None,
            log_payloads: false,
        }
    }
}

impl BridgeConfig {
    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, BridgeError> {
        if content.trim().is_empty() {
            return Err(BridgeError::Config("Config file is empty".to_string()));
        }

        serde_yaml::from_str(content)
            .map_err(|e| BridgeError::Config(format!("Invalid YAML: {}", e)))
    }

    /// Apply `HOSTLINK_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("HOSTLINK_ID_STRATEGY") {
            self.id_strategy = IdStrategy::parse(&raw)?;
        }

        if let Some(raw) = lookup("HOSTLINK_LOG_PAYLOADS") {
            self.log_payloads = matches!(raw.trim(), "1" | "true" | "yes");
        }

        Ok(self)
    }

    pub fn with_env_overrides(self) -> Result<Self, BridgeError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }
}

/// Load bridge configuration from a YAML file and apply environment overrides.
///
/// # Errors
/// Returns error if the file is missing, empty or not valid YAML
pub fn load_bridge_config(config_path: &str) -> Result<BridgeConfig, BridgeError> {
    let config_file = Path::new(config_path);

    if !config_file.exists() {
        return Err(BridgeError::Config(format!(
            "Config file not found: {}",
            config_path
        )));
    }

    let content = std::fs::read_to_string(config_file)?;
    BridgeConfig::from_yaml_str(&content)?.with_env_overrides()
}
