//! # In-Memory Storage
//!
//! A document store kept entirely in process memory. It behaves like the
//! hosted store as far as the domain layer can observe: ids are assigned on
//! add, oversized documents are rejected, and every write pushes the full
//! ordered snapshot to all live subscribers.
//!
//! Tests can inject failures with [`InMemoryGateway::fail_next_with`] and
//! count how many calls reached the store with [`InMemoryGateway::call_count`].

use async_trait::async_trait;
use shared::{Settings, Transaction};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::traits::{
    GatewayError, HaltFlagStorage, SettingsGateway, SettingsPatch, SnapshotEvent, SnapshotFeed,
    TransactionGateway,
};
use super::{check_document_size, sort_newest_first, MAX_DOCUMENT_BYTES};
use crate::domain::models::transaction::TransactionPatch;

struct MemoryState {
    transactions: HashMap<String, Transaction>,
    settings: Option<Settings>,
    subscribers: Vec<mpsc::UnboundedSender<SnapshotEvent>>,
    document_limit: usize,
    fail_next: Option<GatewayError>,
    fail_subscriptions: Option<GatewayError>,
    calls: usize,
}

impl MemoryState {
    fn snapshot(&self) -> Vec<Transaction> {
        let mut all: Vec<Transaction> = self.transactions.values().cloned().collect();
        sort_newest_first(&mut all);
        all
    }

    /// Count the call and pop an injected failure, if any
    fn begin_call(&mut self) -> Result<(), GatewayError> {
        self.calls += 1;
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.subscribers
            .retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
        debug!(
            "Pushed snapshot of {} purchases to {} subscribers",
            snapshot.len(),
            self.subscribers.len()
        );
    }
}

/// Document store held in memory
#[derive(Clone)]
pub struct InMemoryGateway {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                transactions: HashMap::new(),
                settings: None,
                subscribers: Vec::new(),
                document_limit: MAX_DOCUMENT_BYTES,
                fail_next: None,
                fail_subscriptions: None,
                calls: 0,
            })),
        }
    }

    /// Start with an existing settings document
    pub fn with_settings(settings: Settings) -> Self {
        let gateway = Self::new();
        gateway.lock().settings = Some(settings);
        gateway
    }

    /// Lower the per-document size limit
    pub fn with_document_limit(self, limit: usize) -> Self {
        self.lock().document_limit = limit;
        self
    }

    /// Seed a purchase directly, bypassing id assignment and call counting
    pub fn seed(&self, tx: Transaction) {
        let mut state = self.lock();
        state.transactions.insert(tx.id.clone(), tx);
        state.publish();
    }

    /// Make the next gateway call fail with `error`
    pub fn fail_next_with(&self, error: GatewayError) {
        self.lock().fail_next = Some(error);
    }

    /// Make every new subscription fail with `error` (`None` to clear)
    pub fn fail_subscriptions_with(&self, error: Option<GatewayError>) {
        self.lock().fail_subscriptions = error;
    }

    /// Push an error event to every live subscriber
    pub fn break_feeds(&self, error: GatewayError) {
        let mut state = self.lock();
        state
            .subscribers
            .retain(|tx| tx.send(Err(error.clone())).is_ok());
    }

    /// Number of calls that reached the store
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }

    pub fn len(&self) -> usize {
        self.lock().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stored_settings(&self) -> Option<Settings> {
        self.lock().settings.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TransactionGateway for InMemoryGateway {
    async fn add_transaction(&self, doc: &Transaction) -> Result<String, GatewayError> {
        let mut state = self.lock();
        state.begin_call()?;
        check_document_size(doc, state.document_limit)?;

        let id = Uuid::new_v4().simple().to_string();
        let mut stored = doc.clone();
        stored.id = id.clone();
        state.transactions.insert(id.clone(), stored);
        state.publish();
        Ok(id)
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, GatewayError> {
        let mut state = self.lock();
        state.begin_call()?;
        Ok(state.transactions.get(id).cloned())
    }

    async fn update_transaction(
        &self,
        id: &str,
        patch: &TransactionPatch,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.begin_call()?;
        let limit = state.document_limit;

        let existing = state
            .transactions
            .get(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        let mut updated = existing.clone();
        patch.apply_to(&mut updated);
        check_document_size(&updated, limit)?;

        state.transactions.insert(id.to_string(), updated);
        state.publish();
        Ok(())
    }

    async fn delete_transaction(&self, id: &str) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.begin_call()?;
        // Deleting a missing document succeeds, as in the hosted store
        if state.transactions.remove(id).is_some() {
            state.publish();
        }
        Ok(())
    }

    async fn subscribe_transactions(&self) -> Result<SnapshotFeed, GatewayError> {
        let mut state = self.lock();
        state.begin_call()?;
        if let Some(err) = state.fail_subscriptions.clone() {
            return Err(err);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive, the send cannot fail
        let _ = tx.send(Ok(state.snapshot()));
        state.subscribers.push(tx);
        Ok(rx)
    }
}

#[async_trait]
impl SettingsGateway for InMemoryGateway {
    async fn get_settings(&self) -> Result<Option<Settings>, GatewayError> {
        let mut state = self.lock();
        state.begin_call()?;
        Ok(state.settings.clone())
    }

    async fn merge_settings(&self, patch: SettingsPatch) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.begin_call()?;
        let mut settings = state.settings.clone().unwrap_or_default();
        patch.apply(&mut settings);
        state.settings = Some(settings);
        Ok(())
    }
}

/// Halt flag that lives only as long as the process; used by tests
#[derive(Clone, Default)]
pub struct MemoryHaltFlag {
    halted: Arc<AtomicBool>,
}

impl MemoryHaltFlag {
    pub fn new(halted: bool) -> Self {
        Self {
            halted: Arc::new(AtomicBool::new(halted)),
        }
    }
}

impl HaltFlagStorage for MemoryHaltFlag {
    fn is_halted(&self) -> anyhow::Result<bool> {
        Ok(self.halted.load(Ordering::SeqCst))
    }

    fn set_halted(&self, halted: bool) -> anyhow::Result<()> {
        self.halted.store(halted, Ordering::SeqCst);
        Ok(())
    }
}
