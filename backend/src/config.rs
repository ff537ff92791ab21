//! # Configuration
//!
//! Runtime settings for the terminal process, read from
//! `buyback_config.yaml` and then overridden by environment variables.
//!
//! ```yaml
//! data_directory: /srv/kb-gold
//! app_id: kb-gold-buyback
//! log_level: info
//! owner_contact: owner@example.com
//! ```
//!
//! | Variable                 | Field            |
//! |--------------------------|------------------|
//! | `BUYBACK_DATA_DIR`       | `data_directory` |
//! | `BUYBACK_APP_ID`         | `app_id`         |
//! | `BUYBACK_LOG_LEVEL`      | `log_level`      |
//! | `BUYBACK_OWNER_CONTACT`  | `owner_contact`  |
//!
//! Shop data (store name, locations, codes) is not configured here; it lives
//! in the settings document.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::storage::csv::CsvConnection;

pub const CONFIG_FILE_NAME: &str = "buyback_config.yaml";
pub const DEFAULT_APP_ID: &str = "kb-gold-buyback";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Data directory; `None` means `~/Documents/KB Gold Buyback`
    pub data_directory: Option<PathBuf>,
    /// Scopes the purchases and settings documents
    pub app_id: String,
    /// Default tracing filter when `RUST_LOG` is not set
    pub log_level: String,
    /// Recipient of the lockout reset request
    pub owner_contact: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_directory: None,
            app_id: DEFAULT_APP_ID.to_string(),
            log_level: "info".to_string(),
            owner_contact: None,
        }
    }
}

impl AppConfig {
    /// Load from `path` (or `buyback_config.yaml` in the working directory
    /// when it exists), then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `BUYBACK_*` overrides; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("BUYBACK_DATA_DIR") {
            self.data_directory = Some(PathBuf::from(dir));
        }
        if let Some(app_id) = get("BUYBACK_APP_ID") {
            self.app_id = app_id;
        }
        if let Some(level) = get("BUYBACK_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(contact) = get("BUYBACK_OWNER_CONTACT") {
            self.owner_contact = Some(contact);
        }
    }

    /// The configured data directory, or the default one under Documents
    pub fn resolve_data_directory(&self) -> Result<PathBuf> {
        match &self.data_directory {
            Some(dir) => Ok(dir.clone()),
            None => CsvConnection::default_data_directory(),
        }
    }
}
