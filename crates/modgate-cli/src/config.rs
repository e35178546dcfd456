//! CLI configuration

use modgate_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Moderation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Policy document, YAML or JSON by extension
    #[serde(default)]
    pub policy_path: Option<String>,

    /// Consult policies before the blacklist
    #[serde(default = "default_true")]
    pub policies_enabled: bool,

    /// Fallback keyword blacklist
    #[serde(default = "default_blacklist")]
    pub blacklist: Vec<String>,
}

impl ModerationConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &crate::Cli) -> Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| Error::config(format!("failed to read {}: {}", config_path, e)))?;
            serde_yaml::from_str(&content)
                .map_err(|e| Error::config(format!("failed to parse {}: {}", config_path, e)))?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(policy) = &cli.policy {
            config.policy_path = Some(policy.clone());
        }

        if cli.no_policies {
            config.policies_enabled = false;
        }

        Ok(config)
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            policy_path: None,
            policies_enabled: true,
            blacklist: default_blacklist(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_blacklist() -> Vec<String> {
    vec!["spam".to_string(), "scam".to_string(), "illegal".to_string()]
}
