//! # Settings Repository
//!
//! Keeps the singleton settings document in `apps/{app_id}/settings/main.yaml`.
//!
//! ## YAML Format
//!
//! ```yaml
//! storeName: KB GOLD JEWELRY
//! phone: 555-0123
//! terms: I, the seller, certify ...
//! stores:
//!   - name: Main Store
//!     address: 123 Main St, Holland, MI
//! pin: "9812"
//! masterCode: "159753"
//! ```
//!
//! Keys missing from the file take their default value, so an older or
//! hand-edited document still loads.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_yaml::{Mapping, Value};
use shared::Settings;
use std::fs;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use super::connection::CsvConnection;
use crate::storage::traits::{GatewayError, SettingsGateway, SettingsPatch};

/// YAML-backed settings document
#[derive(Clone)]
pub struct SettingsRepository {
    connection: CsvConnection,
    write_lock: Arc<AsyncMutex<()>>,
}

impl SettingsRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self {
            connection,
            write_lock: Arc::new(AsyncMutex::new(())),
        }
    }

    fn read_settings(&self) -> Result<Option<Settings>> {
        let path = self.connection.settings_file_path();
        if !path.exists() {
            debug!("No settings document at {}", path.display());
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let stored: Value = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        // Overlay what is on disk onto the defaults, key by key
        let mut merged = serde_yaml::to_value(Settings::default())?;
        if let (Value::Mapping(base), Value::Mapping(stored)) = (&mut merged, stored) {
            overlay(base, stored);
        }

        Ok(Some(serde_yaml::from_value(merged)?))
    }

    fn write_settings(&self, settings: &Settings) -> Result<()> {
        let yaml = serde_yaml::to_string(settings)?;
        CsvConnection::write_atomic(&self.connection.settings_file_path(), yaml.as_bytes())
    }
}

fn overlay(base: &mut Mapping, stored: Mapping) {
    for (key, value) in stored {
        if !value.is_null() {
            base.insert(key, value);
        }
    }
}

#[async_trait]
impl SettingsGateway for SettingsRepository {
    async fn get_settings(&self) -> Result<Option<Settings>, GatewayError> {
        self.read_settings()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))
    }

    async fn merge_settings(&self, patch: SettingsPatch) -> Result<(), GatewayError> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self
            .read_settings()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?
            .unwrap_or_default();

        let section = match &patch {
            SettingsPatch::General(_) => "general",
            SettingsPatch::Security(_) => "security",
        };
        patch.apply(&mut settings);

        self.write_settings(&settings)
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        info!("Saved {} settings", section);
        Ok(())
    }
}
