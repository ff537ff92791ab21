//! # Storage Traits
//!
//! This module defines the contracts the domain layer expects from the
//! persistence gateway, the identity provider and the device-local halt flag.
//! Implementations live in [`super::memory`] and [`super::csv`].

use anyhow::Result;
use async_trait::async_trait;
use shared::{GeneralSettings, SecurityCodes, Settings, Transaction};
use tokio::sync::{mpsc, watch};

use crate::domain::models::transaction::TransactionPatch;

/// Errors reported by the document store or identity provider
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("request is not authenticated")]
    Unauthenticated,
    #[error("document is {size} bytes, limit is {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Other(String),
}

/// One push of the live purchase feed: the full result set, newest first
pub type SnapshotEvent = std::result::Result<Vec<Transaction>, GatewayError>;

/// Receiving end of a live purchase subscription. Dropping it ends the
/// subscription.
pub type SnapshotFeed = mpsc::UnboundedReceiver<SnapshotEvent>;

/// Trait defining the purchase collection operations of the document store
///
/// The only query the application ever runs is "all purchases ordered by
/// date descending", so `subscribe_transactions` takes no arguments.
#[async_trait]
pub trait TransactionGateway: Send + Sync {
    /// Add a new purchase document. The `id` on the incoming record is
    /// ignored; the store assigns one and returns it.
    async fn add_transaction(&self, doc: &Transaction) -> std::result::Result<String, GatewayError>;

    /// Point read of a single purchase
    async fn get_transaction(&self, id: &str) -> std::result::Result<Option<Transaction>, GatewayError>;

    /// Merge the patch into an existing purchase. `date` and `createdBy` are
    /// never part of a patch.
    async fn update_transaction(
        &self,
        id: &str,
        patch: &TransactionPatch,
    ) -> std::result::Result<(), GatewayError>;

    /// Remove a purchase document
    async fn delete_transaction(&self, id: &str) -> std::result::Result<(), GatewayError>;

    /// Open a live feed. The current result set is pushed immediately and
    /// again after every change.
    async fn subscribe_transactions(&self) -> std::result::Result<SnapshotFeed, GatewayError>;
}

/// Partial write to the settings document (`set` with merge)
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsPatch {
    General(GeneralSettings),
    Security(SecurityCodes),
}

impl SettingsPatch {
    /// Apply the patch on top of an existing document, leaving the other
    /// half untouched
    pub fn apply(self, settings: &mut Settings) {
        match self {
            SettingsPatch::General(general) => settings.general = general,
            SettingsPatch::Security(security) => settings.security = security,
        }
    }
}

/// Trait defining the settings document operations
#[async_trait]
pub trait SettingsGateway: Send + Sync {
    /// Point read of `settings/main`; `None` when the document was never written
    async fn get_settings(&self) -> std::result::Result<Option<Settings>, GatewayError>;

    /// Merge a partial write into `settings/main`, creating it from defaults
    /// if it does not exist yet
    async fn merge_settings(&self, patch: SettingsPatch) -> std::result::Result<(), GatewayError>;
}

/// A document store exposing both the purchase collection and settings
pub trait DocumentStore: TransactionGateway + SettingsGateway {}

impl<T: TransactionGateway + SettingsGateway> DocumentStore for T {}

/// An authenticated (anonymous) operator identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
}

/// Trait defining the identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in without credentials, returning the new identity
    async fn sign_in_anonymously(&self) -> std::result::Result<Identity, GatewayError>;

    /// Sign the current identity out
    async fn sign_out(&self);

    /// Auth state changes: the current identity, or `None` when signed out
    fn auth_state(&self) -> watch::Receiver<Option<Identity>>;
}

/// Trait defining the device-local durable halt flag
///
/// This is the only piece of access-control state that survives a restart.
pub trait HaltFlagStorage: Send + Sync {
    /// Read the persisted flag
    fn is_halted(&self) -> Result<bool>;

    /// Persist (`true`) or remove (`false`) the flag
    fn set_halted(&self, halted: bool) -> Result<()>;
}
