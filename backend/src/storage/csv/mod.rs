//! # File-backed Storage
//!
//! A document store kept in a local data directory:
//!
//! - `purchases.csv`: the purchases collection, one row per purchase
//! - `settings/main.yaml`: the settings document
//! - `.gb_system_halted`: device-local halt marker
//!
//! [`CsvGateway`] bundles the purchase and settings repositories behind the
//! same gateway traits as the in-memory store.

pub mod connection;
pub mod halt_flag_repository;
pub mod settings_repository;
pub mod transaction_repository;

#[cfg(test)]
pub mod test_utils;

pub use connection::CsvConnection;
pub use halt_flag_repository::HaltFlagRepository;
pub use settings_repository::SettingsRepository;
pub use transaction_repository::CsvTransactionRepository;

use async_trait::async_trait;
use shared::{Settings, Transaction};

use super::traits::{
    GatewayError, SettingsGateway, SettingsPatch, SnapshotFeed, TransactionGateway,
};
use crate::domain::models::transaction::TransactionPatch;

/// Purchases and settings in one data directory
#[derive(Clone)]
pub struct CsvGateway {
    transactions: CsvTransactionRepository,
    settings: SettingsRepository,
}

impl CsvGateway {
    pub fn new(connection: CsvConnection) -> Self {
        Self {
            transactions: CsvTransactionRepository::new(connection.clone()),
            settings: SettingsRepository::new(connection),
        }
    }
}

#[async_trait]
impl TransactionGateway for CsvGateway {
    async fn add_transaction(&self, doc: &Transaction) -> Result<String, GatewayError> {
        self.transactions.add_transaction(doc).await
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, GatewayError> {
        self.transactions.get_transaction(id).await
    }

    async fn update_transaction(
        &self,
        id: &str,
        patch: &TransactionPatch,
    ) -> Result<(), GatewayError> {
        self.transactions.update_transaction(id, patch).await
    }

    async fn delete_transaction(&self, id: &str) -> Result<(), GatewayError> {
        self.transactions.delete_transaction(id).await
    }

    async fn subscribe_transactions(&self) -> Result<SnapshotFeed, GatewayError> {
        self.transactions.subscribe_transactions().await
    }
}

#[async_trait]
impl SettingsGateway for CsvGateway {
    async fn get_settings(&self) -> Result<Option<Settings>, GatewayError> {
        self.settings.get_settings().await
    }

    async fn merge_settings(&self, patch: SettingsPatch) -> Result<(), GatewayError> {
        self.settings.merge_settings(patch).await
    }
}
