//! Process-local session state shared by access control, settings and the
//! purchase repository.
//!
//! Holds the cached settings document, the signed-in identity and the
//! security settings gate. None of it is persisted: everything here is
//! re-derived from the gateway on the next start. The halt flag is the one
//! piece of session state that is durable, and it lives behind
//! [`HaltFlagStorage`](crate::storage::HaltFlagStorage) instead.

use shared::{GeneralSettings, SecurityCodes, Settings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::errors::BuybackError;
use crate::storage::Identity;

/// Cheap to clone; every clone sees the same session
#[derive(Clone, Default)]
pub struct SessionContext {
    settings: Arc<RwLock<Settings>>,
    settings_loaded: Arc<AtomicBool>,
    identity: Arc<RwLock<Option<Identity>>>,
    security_gate_open: Arc<AtomicBool>,
}

impl SessionContext {
    /// A fresh session using the built-in fallback settings until a load
    /// completes
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn general_settings(&self) -> GeneralSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .general
            .clone()
    }

    /// The codes currently accepted by access control
    pub fn security_codes(&self) -> SecurityCodes {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .security
            .clone()
    }

    /// Replace the cached document after a load
    pub fn replace_settings(&self, settings: Settings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
        self.settings_loaded.store(true, Ordering::SeqCst);
    }

    pub fn set_general_settings(&self, general: GeneralSettings) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .general = general;
    }

    pub fn set_security_codes(&self, codes: SecurityCodes) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .security = codes;
    }

    pub fn settings_loaded(&self) -> bool {
        self.settings_loaded.load(Ordering::SeqCst)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_identity(&self, identity: Option<Identity>) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = identity;
    }

    /// The signed-in identity, or `Unauthenticated` for mutations attempted
    /// without one
    pub fn require_identity(&self) -> Result<Identity, BuybackError> {
        self.identity().ok_or(BuybackError::Unauthenticated)
    }

    pub fn security_gate_open(&self) -> bool {
        self.security_gate_open.load(Ordering::SeqCst)
    }

    pub(crate) fn set_security_gate(&self, open: bool) {
        self.security_gate_open.store(open, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_codes_before_load() {
        let context = SessionContext::new();
        assert!(!context.settings_loaded());
        assert_eq!(context.security_codes().pin, "9812");
        assert_eq!(context.security_codes().master_code, "159753");
    }

    #[test]
    fn test_clones_share_state() {
        let context = SessionContext::new();
        let other = context.clone();

        other.set_security_codes(SecurityCodes {
            pin: "2468".to_string(),
            master_code: "13579135".to_string(),
        });
        other.set_identity(Some(Identity {
            uid: "anon-7".to_string(),
        }));

        assert_eq!(context.security_codes().pin, "2468");
        assert_eq!(context.require_identity().unwrap().uid, "anon-7");
    }

    #[test]
    fn test_require_identity_without_sign_in() {
        let context = SessionContext::new();
        assert_eq!(
            context.require_identity().unwrap_err(),
            BuybackError::Unauthenticated
        );
    }
}
