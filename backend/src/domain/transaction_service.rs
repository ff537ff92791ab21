//! # Transaction Service
//!
//! The purchase repository: a local copy of the purchases collection kept
//! in sync with the store's live feed, plus create, update and delete.
//!
//! ## Key Responsibilities
//!
//! - Hold the latest full snapshot pushed by the store. Every push replaces
//!   the local collection; writes are never merged in optimistically.
//! - Validate new purchases before any store call and stamp the audit fields
//! - Print a receipt from the locally built record once the store accepts it
//! - Gate deletion behind the code challenge and an explicit confirmation
//! - Serve analytics, filters and reports computed from the snapshot
//!
//! A failed subscription empties the local collection and reports the
//! failure through [`FeedStatus::Failed`], so stale data is never shown.

use chrono::{Local, NaiveDate, Utc};
use shared::{PeriodAnalytics, Timeframe, Transaction};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::access_control::delete_code_matches;
use super::analytics;
use super::commands::reports::{DateRangeQuery, MonthlyReportQuery};
use super::commands::transactions::{
    CreateTransactionResult, DeleteTransactionCommand, UpdateTransactionCommand,
};
use super::context::SessionContext;
use super::errors::{BuybackError, ValidationError};
use super::models::transaction::TransactionDraft;
use super::transaction_filter::{self, FilterCriteria};
use crate::io::{DateRangeReport, Receipt, ReceiptPrinter};
use crate::storage::{SnapshotEvent, TransactionGateway};

/// Health of the live purchase feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    /// Not subscribed
    Idle,
    Live,
    Failed(String),
}

/// Feed status plus a counter bumped every time the local collection is
/// replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    pub status: FeedStatus,
    pub revision: u64,
}

/// Local collection shared with the feed task.
///
/// Every subscription gets a new generation; events tagged with an older
/// generation are dropped, so a feed task that is still running after it
/// was aborted can not overwrite a newer state.
struct LiveView {
    transactions: RwLock<Vec<Transaction>>,
    generation: AtomicU64,
    state: watch::Sender<FeedState>,
}

impl LiveView {
    fn new() -> Self {
        let (state, _) = watch::channel(FeedState {
            status: FeedStatus::Idle,
            revision: 0,
        });
        Self {
            transactions: RwLock::new(Vec::new()),
            generation: AtomicU64::new(0),
            state,
        }
    }

    /// Retire every earlier subscription
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn replace(&self, transactions: Vec<Transaction>, status: FeedStatus) {
        let mut current = self
            .transactions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.store(&mut current, transactions, status);
    }

    fn store(
        &self,
        current: &mut Vec<Transaction>,
        transactions: Vec<Transaction>,
        status: FeedStatus,
    ) {
        *current = transactions;
        self.state.send_modify(|state| {
            state.status = status;
            state.revision += 1;
        });
    }

    fn apply(&self, generation: u64, event: SnapshotEvent) {
        let mut current = self
            .transactions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Dropping snapshot from a closed subscription");
            return;
        }

        match event {
            Ok(transactions) => {
                debug!("Received snapshot of {} purchases", transactions.len());
                self.store(&mut current, transactions, FeedStatus::Live);
            }
            Err(e) => {
                error!("Purchase feed failed: {}", e);
                self.store(&mut current, Vec::new(), FeedStatus::Failed(e.to_string()));
            }
        }
    }
}

#[derive(Clone)]
pub struct TransactionService {
    gateway: Arc<dyn TransactionGateway>,
    context: SessionContext,
    printer: Arc<dyn ReceiptPrinter>,
    view: Arc<LiveView>,
    feed_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TransactionService {
    pub fn new(
        gateway: Arc<dyn TransactionGateway>,
        context: SessionContext,
        printer: Arc<dyn ReceiptPrinter>,
    ) -> Self {
        Self {
            gateway,
            context,
            printer,
            view: Arc::new(LiveView::new()),
            feed_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Open the live feed, replacing any previous subscription.
    ///
    /// The first snapshot arrives asynchronously; use [`Self::watch_feed`]
    /// or [`Self::wait_for_revision`] to observe it.
    pub async fn subscribe(&self) -> Result<(), BuybackError> {
        self.stop_feed_task();
        let generation = self.view.next_generation();

        let mut feed = match self.gateway.subscribe_transactions().await {
            Ok(feed) => feed,
            Err(e) => {
                error!("Failed to subscribe to purchases: {}", e);
                self.view
                    .replace(Vec::new(), FeedStatus::Failed(e.to_string()));
                return Err(e.into());
            }
        };

        let view = Arc::clone(&self.view);
        let handle = tokio::spawn(async move {
            while let Some(event) = feed.recv().await {
                view.apply(generation, event);
            }
            debug!("Purchase feed closed by the store");
        });

        *self.feed_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!("Subscribed to purchases");
        Ok(())
    }

    /// Tear the subscription down and forget the local collection
    pub fn unsubscribe(&self) {
        if self.stop_feed_task() {
            info!("Unsubscribed from purchases");
        }
        self.view.next_generation();
        self.view.replace(Vec::new(), FeedStatus::Idle);
    }

    fn stop_feed_task(&self) -> bool {
        let task = self
            .feed_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match task {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// The latest processed snapshot, newest first
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.view
            .transactions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Transaction> {
        self.view
            .transactions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    pub fn feed_state(&self) -> FeedState {
        self.view.state.borrow().clone()
    }

    pub fn watch_feed(&self) -> watch::Receiver<FeedState> {
        self.view.state.subscribe()
    }

    /// Wait until the feed state satisfies `predicate`
    pub async fn wait_for_feed<F>(&self, predicate: F) -> FeedState
    where
        F: FnMut(&FeedState) -> bool,
    {
        let mut rx = self.view.state.subscribe();
        let state = match rx.wait_for(predicate).await {
            Ok(state) => state.clone(),
            Err(_) => self.feed_state(),
        };
        state
    }

    /// Wait until the local collection has been replaced `revision` times
    pub async fn wait_for_revision(&self, revision: u64) -> FeedState {
        self.wait_for_feed(|state| state.revision >= revision).await
    }

    /// Record a new purchase.
    ///
    /// Every local check runs before the store is called. On success the
    /// receipt is printed from the record that was sent.
    pub async fn create(
        &self,
        draft: TransactionDraft,
    ) -> Result<CreateTransactionResult, BuybackError> {
        let identity = self.context.require_identity()?;
        let general = self.context.general_settings();

        let validated = draft.validate_for_create(&general).map_err(|e| {
            warn!("Purchase rejected before saving: {}", e);
            e
        })?;
        let warnings = validated.warnings.clone();
        for warning in &warnings {
            warn!("Purchase saved with warning: {}", warning);
        }

        let mut transaction = draft.into_transaction(validated, &identity.uid, Utc::now());
        let id = self
            .gateway
            .add_transaction(&transaction)
            .await
            .map_err(|e| {
                error!("❌ PURCHASE: failed to save: {}", e);
                BuybackError::from(e)
            })?;
        transaction.id = id.clone();

        info!(
            "✅ PURCHASE: recorded {} ({} for ${:.2})",
            id,
            transaction.item_type(),
            transaction.price
        );

        let receipt = Receipt::build(&general, &transaction, &Local);
        if let Err(e) = self.printer.print(&receipt) {
            warn!("Receipt for {} could not be printed: {}", id, e);
        }

        Ok(CreateTransactionResult {
            id,
            transaction,
            receipt,
            warnings,
        })
    }

    /// Edit a purchase. `id`, `date` and `createdBy` never change.
    pub async fn update(&self, command: UpdateTransactionCommand) -> Result<(), BuybackError> {
        let identity = self.context.require_identity()?;
        let patch = command.draft.to_patch(
            &self.context.general_settings(),
            &identity.uid,
            Utc::now(),
        )?;

        self.gateway
            .update_transaction(&command.id, &patch)
            .await
            .map_err(|e| {
                error!("❌ PURCHASE: failed to update {}: {}", command.id, e);
                BuybackError::from(e)
            })?;

        info!("✅ PURCHASE: updated {}", command.id);
        Ok(())
    }

    /// Delete a purchase after the code challenge and confirmation
    pub async fn delete(&self, command: DeleteTransactionCommand) -> Result<(), BuybackError> {
        if !delete_code_matches(&self.context.security_codes(), &command.code) {
            warn!(
                "Delete of {} refused: wrong code (length {})",
                command.id,
                command.code.len()
            );
            return Err(BuybackError::InvalidCode);
        }
        if !command.confirmed {
            return Err(ValidationError::DeletionNotConfirmed.into());
        }
        self.context.require_identity()?;

        self.gateway
            .delete_transaction(&command.id)
            .await
            .map_err(|e| {
                error!("❌ PURCHASE: failed to delete {}: {}", command.id, e);
                BuybackError::from(e)
            })?;

        info!("🗑️ PURCHASE: deleted {}", command.id);
        Ok(())
    }

    pub fn analytics(&self, timeframe: Timeframe) -> PeriodAnalytics {
        analytics::aggregate(&self.snapshot(), timeframe, &Local::now())
    }

    pub fn filter(&self, criteria: &FilterCriteria) -> Vec<Transaction> {
        transaction_filter::filter_by_criteria(&self.snapshot(), criteria, &Local)
    }

    pub fn filter_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>, BuybackError> {
        Ok(transaction_filter::filter_by_date_range(
            &self.snapshot(),
            start,
            end,
            &Local,
        )?)
    }

    pub fn search_history(&self, term: &str) -> Vec<Transaction> {
        transaction_filter::search_history(&self.snapshot(), term)
    }

    pub fn date_range_report(&self, query: DateRangeQuery) -> Result<DateRangeReport, BuybackError> {
        let store_name = self.context.general_settings().store_name;
        Ok(DateRangeReport::for_date_range(
            &store_name,
            &self.snapshot(),
            query.start,
            query.end,
            &Local,
        )?)
    }

    /// `None` for a month outside 1..=12
    pub fn monthly_report(&self, query: MonthlyReportQuery) -> Option<DateRangeReport> {
        let store_name = self.context.general_settings().store_name;
        DateRangeReport::for_month(&store_name, &self.snapshot(), query.month, query.year, &Local)
    }
}
