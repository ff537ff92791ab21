//! Settings store: loads the settings document once per session and saves
//! its two halves independently.
//!
//! Saving store information never touches the codes, and saving the codes
//! never touches store information.

use shared::{GeneralSettings, SecurityCodes, Settings};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::access_control::{MIN_MASTER_CODE_LENGTH, MIN_PIN_LENGTH};
use super::context::SessionContext;
use super::errors::{BuybackError, ValidationError};
use crate::storage::{SettingsGateway, SettingsPatch};

#[derive(Clone)]
pub struct SettingsService {
    gateway: Arc<dyn SettingsGateway>,
    context: SessionContext,
}

impl SettingsService {
    pub fn new(gateway: Arc<dyn SettingsGateway>, context: SessionContext) -> Self {
        Self { gateway, context }
    }

    /// Read the settings document into the session cache.
    ///
    /// Never fails: a missing or unreadable document yields the built-in
    /// defaults so the terminal stays usable.
    pub async fn load(&self) -> Settings {
        let mut settings = match self.gateway.get_settings().await {
            Ok(Some(settings)) => {
                info!("Loaded settings for {}", settings.general.store_name);
                settings
            }
            Ok(None) => {
                info!("No settings document yet, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                Settings::default()
            }
        };

        if settings.general.stores.is_empty() {
            settings.general.stores = GeneralSettings::default().stores;
        }

        self.context.replace_settings(settings.clone());
        settings
    }

    /// Current cached settings
    pub fn current(&self) -> Settings {
        self.context.settings()
    }

    /// Save store name, phone, terms and locations
    pub async fn save_general(&self, general: GeneralSettings) -> Result<(), BuybackError> {
        validate_general(&general)?;
        self.context.require_identity()?;

        self.gateway
            .merge_settings(SettingsPatch::General(general.clone()))
            .await
            .map_err(|e| {
                error!("Failed to save general settings: {}", e);
                BuybackError::from(e)
            })?;

        info!("✅ SETTINGS: saved store info ({} locations)", general.stores.len());
        self.context.set_general_settings(general);
        Ok(())
    }

    /// Save a new PIN and master code. Requires the security settings gate
    /// to be open. The new codes take effect immediately.
    pub async fn save_security(&self, pin: &str, master_code: &str) -> Result<(), BuybackError> {
        if !self.context.security_gate_open() {
            return Err(BuybackError::SecurityGateLocked);
        }
        if pin.len() < MIN_PIN_LENGTH {
            return Err(ValidationError::PinTooShort(MIN_PIN_LENGTH).into());
        }
        if master_code.len() < MIN_MASTER_CODE_LENGTH {
            return Err(ValidationError::MasterCodeTooShort(MIN_MASTER_CODE_LENGTH).into());
        }
        self.context.require_identity()?;

        let codes = SecurityCodes {
            pin: pin.to_string(),
            master_code: master_code.to_string(),
        };
        self.gateway
            .merge_settings(SettingsPatch::Security(codes.clone()))
            .await
            .map_err(|e| {
                error!("Failed to save security codes: {}", e);
                BuybackError::from(e)
            })?;

        info!("✅ SETTINGS: security codes updated");
        self.context.set_security_codes(codes);
        Ok(())
    }
}

fn validate_general(general: &GeneralSettings) -> Result<(), ValidationError> {
    if general.stores.is_empty() {
        return Err(ValidationError::NoStoreLocations);
    }
    let incomplete = general
        .stores
        .iter()
        .any(|s| s.name.trim().is_empty() || s.address.trim().is_empty());
    if incomplete {
        return Err(ValidationError::IncompleteStoreLocation);
    }

    let mut seen = HashSet::new();
    for store in &general.stores {
        let name = store.name.trim();
        if !seen.insert(name) {
            return Err(ValidationError::DuplicateStoreLocation(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access_control::AccessControlService;
    use crate::storage::{GatewayError, Identity, InMemoryGateway, MemoryHaltFlag};
    use shared::StoreLocation;

    fn signed_in_context() -> SessionContext {
        let context = SessionContext::new();
        context.set_identity(Some(Identity {
            uid: "anon-1".to_string(),
        }));
        context
    }

    #[tokio::test]
    async fn test_load_falls_back_to_defaults() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.fail_next_with(GatewayError::Unavailable("offline".into()));
        let context = SessionContext::new();
        let service = SettingsService::new(gateway, context.clone());

        let settings = service.load().await;
        assert_eq!(settings, Settings::default());
        assert!(context.settings_loaded());
    }

    #[tokio::test]
    async fn test_load_fills_empty_store_list() {
        let mut stored = Settings::default();
        stored.general.store_name = "Westside".to_string();
        stored.general.stores.clear();
        let gateway = Arc::new(InMemoryGateway::with_settings(stored));
        let service = SettingsService::new(gateway, SessionContext::new());

        let settings = service.load().await;
        assert_eq!(settings.general.store_name, "Westside");
        assert_eq!(settings.general.stores.len(), 1);
        assert_eq!(settings.general.stores[0].name, "Main Store");
    }

    #[tokio::test]
    async fn test_incomplete_locations_are_rejected_before_saving() {
        let gateway = Arc::new(InMemoryGateway::new());
        let service = SettingsService::new(gateway.clone(), signed_in_context());

        let cases = vec![
            (vec![], ValidationError::NoStoreLocations),
            (
                vec![StoreLocation {
                    name: " ".to_string(),
                    address: "1 Main".to_string(),
                }],
                ValidationError::IncompleteStoreLocation,
            ),
            (
                vec![StoreLocation {
                    name: "North".to_string(),
                    address: String::new(),
                }],
                ValidationError::IncompleteStoreLocation,
            ),
            (
                vec![
                    StoreLocation {
                        name: "North".to_string(),
                        address: "1 Main".to_string(),
                    },
                    StoreLocation {
                        name: "North ".to_string(),
                        address: "9 Oak".to_string(),
                    },
                ],
                ValidationError::DuplicateStoreLocation("North".to_string()),
            ),
        ];

        for (stores, expected) in cases {
            let general = GeneralSettings {
                stores,
                ..GeneralSettings::default()
            };
            assert_eq!(
                service.save_general(general).await,
                Err(BuybackError::Validation(expected))
            );
        }
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_general_save_never_changes_codes() {
        let gateway = Arc::new(InMemoryGateway::new());
        let context = signed_in_context();
        let service = SettingsService::new(gateway.clone(), context.clone());
        service.load().await;

        let mut general = GeneralSettings::default();
        general.phone = "616-555-0199".to_string();
        service.save_general(general.clone()).await.unwrap();

        let stored = gateway.stored_settings().unwrap();
        assert_eq!(stored.general, general);
        assert_eq!(stored.security, SecurityCodes::default());
        assert_eq!(context.general_settings().phone, "616-555-0199");
    }

    #[tokio::test]
    async fn test_security_save_requires_gate_and_lengths() {
        let gateway = Arc::new(InMemoryGateway::new());
        let context = signed_in_context();
        let access = AccessControlService::new(context.clone(), Arc::new(MemoryHaltFlag::new(false)));
        let service = SettingsService::new(gateway.clone(), context.clone());

        assert_eq!(
            service.save_security("1234", "123456").await,
            Err(BuybackError::SecurityGateLocked)
        );

        access.submit("9812");
        access.unlock_security_settings("159753").unwrap();

        assert_eq!(
            service.save_security("123", "123456").await,
            Err(ValidationError::PinTooShort(4).into())
        );
        assert_eq!(
            service.save_security("1234", "12345").await,
            Err(ValidationError::MasterCodeTooShort(6).into())
        );
        assert_eq!(gateway.call_count(), 0);

        service.save_security("1234", "123456").await.unwrap();
        assert_eq!(gateway.stored_settings().unwrap().security.pin, "1234");

        // New codes work without a reload
        access.lock();
        assert_eq!(
            access.submit("1234"),
            crate::domain::access_control::PinOutcome::Unlocked
        );
    }

    #[tokio::test]
    async fn test_save_without_identity() {
        let gateway = Arc::new(InMemoryGateway::new());
        let service = SettingsService::new(gateway, SessionContext::new());
        assert_eq!(
            service.save_general(GeneralSettings::default()).await,
            Err(BuybackError::Unauthenticated)
        );
    }
}
