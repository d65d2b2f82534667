use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use brainboard_client::{API_BASE_ENV, DEFAULT_API_BASE};

/// Operator console configuration, loaded from
/// `<config_root>/config/brainboard.yaml`. Every section is optional; the
/// `BRAINBOARD_API_BASE` environment variable overrides the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub identity: IdentitySection,
    #[serde(default)]
    pub chat: ChatSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySection {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_org_id")]
    pub org_id: String,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            org_id: default_org_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSection {
    #[serde(default = "default_max_context_items")]
    pub max_context_items: u32,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            max_context_items: default_max_context_items(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_user_id() -> String {
    "operator".to_string()
}

fn default_org_id() -> String {
    "default".to_string()
}

fn default_max_context_items() -> u32 {
    10
}

pub fn load_config(config_root: &Path) -> Result<AppConfig> {
    let path = config_root.join("config").join("brainboard.yaml");
    let mut config = if path.exists() {
        let raw = std::fs::read_to_string(&path)?;
        serde_yaml::from_str(&raw)?
    } else {
        AppConfig::default()
    };

    if let Ok(base) = std::env::var(API_BASE_ENV) {
        if !base.trim().is_empty() {
            config.api.base_url = base;
        }
    }

    Ok(config)
}
