//! # CSV Purchase Repository
//!
//! Stores the purchases collection in `apps/{app_id}/purchases.csv`.
//!
//! ## CSV Format
//!
//! One row per purchase. Category specific columns are left empty for the
//! other categories:
//!
//! ```csv
//! id,date,item_type,customer_name,...,weight,karat,stone_carat,stone_clarity,brand,model,serial_number,price,...
//! 3f2a..,2025-03-01T15:00:00Z,Gold,Jane Doe,...,5.5,14k,,,,,,100.0,...
//! ```
//!
//! ## Features
//!
//! - Whole-file rewrite through a temp file for every write
//! - Writes serialized by an async lock
//! - Full ordered snapshot pushed to subscribers after every write

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Writer};
use serde::{Deserialize, Serialize};
use shared::{ItemDetails, ItemType, Karat, PaymentMethod, Transaction};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::connection::CsvConnection;
use crate::domain::models::transaction::TransactionPatch;
use crate::storage::traits::{GatewayError, SnapshotEvent, SnapshotFeed, TransactionGateway};
use crate::storage::{check_document_size, sort_newest_first, MAX_DOCUMENT_BYTES};

/// CSV record structure for a purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PurchaseRecord {
    id: String,
    date: DateTime<Utc>,
    item_type: ItemType,
    customer_name: String,
    customer_id: String,
    phone: String,
    item_description: String,
    weight: Option<f64>,
    karat: Option<Karat>,
    stone_carat: Option<f64>,
    stone_clarity: Option<String>,
    brand: Option<String>,
    model: Option<String>,
    serial_number: Option<String>,
    price: f64,
    payment_method: PaymentMethod,
    check_number: Option<String>,
    store_location: String,
    notes: String,
    id_image: Option<String>,
    signature_image: String,
    created_by: String,
    last_modified: Option<DateTime<Utc>>,
    modified_by: Option<String>,
}

impl From<&Transaction> for PurchaseRecord {
    fn from(tx: &Transaction) -> Self {
        let mut record = PurchaseRecord {
            id: tx.id.clone(),
            date: tx.date,
            item_type: tx.item_type(),
            customer_name: tx.customer_name.clone(),
            customer_id: tx.customer_id.clone(),
            phone: tx.phone.clone(),
            item_description: tx.item_description.clone(),
            weight: None,
            karat: None,
            stone_carat: None,
            stone_clarity: None,
            brand: None,
            model: None,
            serial_number: None,
            price: tx.price,
            payment_method: tx.payment_method,
            check_number: tx.check_number.clone(),
            store_location: tx.store_location.clone(),
            notes: tx.notes.clone(),
            id_image: tx.id_image.clone(),
            signature_image: tx.signature_image.clone(),
            created_by: tx.created_by.clone(),
            last_modified: tx.last_modified,
            modified_by: tx.modified_by.clone(),
        };

        match &tx.item {
            ItemDetails::Gold { weight, karat } => {
                record.weight = Some(*weight);
                record.karat = Some(*karat);
            }
            ItemDetails::Diamond {
                stone_carat,
                stone_clarity,
            } => {
                record.stone_carat = Some(*stone_carat);
                record.stone_clarity = Some(stone_clarity.clone());
            }
            ItemDetails::Watch {
                brand,
                model,
                serial_number,
            } => {
                record.brand = Some(brand.clone());
                record.model = Some(model.clone());
                record.serial_number = Some(serial_number.clone());
            }
        }

        record
    }
}

impl TryFrom<PurchaseRecord> for Transaction {
    type Error = anyhow::Error;

    fn try_from(record: PurchaseRecord) -> Result<Self> {
        let item = match record.item_type {
            ItemType::Gold => ItemDetails::Gold {
                weight: record.weight.unwrap_or(0.0),
                karat: record
                    .karat
                    .ok_or_else(|| anyhow!("gold purchase {} has no karat", record.id))?,
            },
            ItemType::Diamond => ItemDetails::Diamond {
                stone_carat: record.stone_carat.unwrap_or(0.0),
                stone_clarity: record.stone_clarity.unwrap_or_default(),
            },
            ItemType::Watch => ItemDetails::Watch {
                brand: record
                    .brand
                    .filter(|b| !b.is_empty())
                    .ok_or_else(|| anyhow!("watch purchase {} has no brand", record.id))?,
                model: record.model.unwrap_or_default(),
                serial_number: record.serial_number.unwrap_or_default(),
            },
        };

        Ok(Transaction {
            id: record.id,
            customer_name: record.customer_name,
            customer_id: record.customer_id,
            phone: record.phone,
            item_description: record.item_description,
            item,
            price: record.price,
            payment_method: record.payment_method,
            check_number: record.check_number,
            store_location: record.store_location,
            notes: record.notes,
            id_image: record.id_image,
            signature_image: record.signature_image,
            date: record.date,
            created_by: record.created_by,
            last_modified: record.last_modified,
            modified_by: record.modified_by,
        })
    }
}

/// CSV-based purchase repository
#[derive(Clone)]
pub struct CsvTransactionRepository {
    connection: CsvConnection,
    write_lock: Arc<AsyncMutex<()>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<SnapshotEvent>>>>,
    document_limit: usize,
}

impl CsvTransactionRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self {
            connection,
            write_lock: Arc::new(AsyncMutex::new(())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            document_limit: MAX_DOCUMENT_BYTES,
        }
    }

    /// Lower the per-document size limit
    pub fn with_document_limit(mut self, limit: usize) -> Self {
        self.document_limit = limit;
        self
    }

    /// Read all purchases. Rows that can not be turned into a purchase are
    /// skipped with a warning rather than failing the whole feed.
    fn read_transactions(&self) -> Result<Vec<Transaction>> {
        let file_path = self.connection.purchases_file_path();
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new().from_path(&file_path)?;
        let mut transactions = Vec::new();

        for (line, result) in reader.deserialize::<PurchaseRecord>().enumerate() {
            let parsed = result
                .map_err(anyhow::Error::from)
                .and_then(Transaction::try_from);
            match parsed {
                Ok(tx) => transactions.push(tx),
                Err(e) => warn!("Skipping unreadable purchase row {}: {}", line + 1, e),
            }
        }

        Ok(transactions)
    }

    /// Rewrite the whole purchases file
    fn write_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        let mut csv_writer = Writer::from_writer(Vec::new());
        for tx in transactions {
            csv_writer.serialize(PurchaseRecord::from(tx))?;
        }
        let bytes = csv_writer
            .into_inner()
            .map_err(|e| anyhow!("failed to flush purchases: {}", e))?;

        CsvConnection::write_atomic(&self.connection.purchases_file_path(), &bytes)?;
        debug!("Wrote {} purchases", transactions.len());
        Ok(())
    }

    fn publish(&self, mut snapshot: Vec<Transaction>) {
        sort_newest_first(&mut snapshot);
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
    }

    /// Read, change and write back under the write lock, then publish
    async fn modify<F, T>(&self, change: F) -> Result<T, GatewayError>
    where
        F: FnOnce(&mut Vec<Transaction>) -> Result<T, GatewayError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut transactions = self.read_transactions().map_err(storage_error)?;
        let result = change(&mut transactions)?;
        self.write_transactions(&transactions).map_err(storage_error)?;
        self.publish(transactions);
        Ok(result)
    }
}

/// File system failures surface as the store being unavailable
fn storage_error(e: anyhow::Error) -> GatewayError {
    GatewayError::Unavailable(e.to_string())
}

#[async_trait]
impl TransactionGateway for CsvTransactionRepository {
    async fn add_transaction(&self, doc: &Transaction) -> Result<String, GatewayError> {
        check_document_size(doc, self.document_limit)?;
        let id = Uuid::new_v4().simple().to_string();

        let mut stored = doc.clone();
        stored.id = id.clone();
        self.modify(move |all| {
            all.push(stored);
            Ok(())
        })
        .await?;

        info!("Stored purchase {}", id);
        Ok(id)
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, GatewayError> {
        let transactions = self.read_transactions().map_err(storage_error)?;
        Ok(transactions.into_iter().find(|t| t.id == id))
    }

    async fn update_transaction(
        &self,
        id: &str,
        patch: &TransactionPatch,
    ) -> Result<(), GatewayError> {
        let limit = self.document_limit;
        self.modify(|all| {
            let existing = all
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
            let mut updated = existing.clone();
            patch.apply_to(&mut updated);
            check_document_size(&updated, limit)?;
            *existing = updated;
            Ok(())
        })
        .await?;

        info!("Updated purchase {}", id);
        Ok(())
    }

    async fn delete_transaction(&self, id: &str) -> Result<(), GatewayError> {
        let removed = self
            .modify(|all| {
                let before = all.len();
                all.retain(|t| t.id != id);
                Ok(before != all.len())
            })
            .await?;

        if removed {
            info!("Deleted purchase {}", id);
        }
        Ok(())
    }

    async fn subscribe_transactions(&self) -> Result<SnapshotFeed, GatewayError> {
        // Held so no write lands between the first push and registration
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.read_transactions().map_err(storage_error)?;
        sort_newest_first(&mut snapshot);

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(snapshot));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Ok(rx)
    }
}
