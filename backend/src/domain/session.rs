//! # Session
//!
//! Wires the services together for one terminal and follows the identity
//! provider.
//!
//! ## Start-up order
//!
//! 1. Access control reads the persisted halt flag (at construction)
//! 2. Sign in anonymously
//! 3. Load settings into the session cache
//! 4. Subscribe to the purchases feed
//!
//! Whenever the identity changes the purchases subscription is torn down and,
//! if someone is signed in again, re-established.

use shared::SystemStatus;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::access_control::AccessControlService;
use super::context::SessionContext;
use super::settings_service::SettingsService;
use super::transaction_service::{FeedStatus, TransactionService};
use crate::io::ReceiptPrinter;
use crate::storage::{
    DocumentStore, HaltFlagStorage, Identity, IdentityProvider, SettingsGateway,
    TransactionGateway,
};

#[derive(Clone)]
pub struct Session {
    context: SessionContext,
    identity_provider: Arc<dyn IdentityProvider>,
    access: Arc<AccessControlService>,
    settings: SettingsService,
    transactions: TransactionService,
    last_error: Arc<Mutex<Option<String>>>,
    auth_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Session {
    pub fn new<S: DocumentStore + 'static>(
        store: Arc<S>,
        identity_provider: Arc<dyn IdentityProvider>,
        halt_flag: Arc<dyn HaltFlagStorage>,
        printer: Arc<dyn ReceiptPrinter>,
        owner_contact: Option<String>,
    ) -> Self {
        let context = SessionContext::new();
        let access = AccessControlService::new(context.clone(), halt_flag)
            .with_owner_contact(owner_contact);
        let settings_gateway: Arc<dyn SettingsGateway> = store.clone();
        let transaction_gateway: Arc<dyn TransactionGateway> = store;

        Self {
            settings: SettingsService::new(settings_gateway, context.clone()),
            transactions: TransactionService::new(transaction_gateway, context.clone(), printer),
            access: Arc::new(access),
            context,
            identity_provider,
            last_error: Arc::new(Mutex::new(None)),
            auth_task: Arc::new(Mutex::new(None)),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn access(&self) -> &AccessControlService {
        &self.access
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn transactions(&self) -> &TransactionService {
        &self.transactions
    }

    /// Sign in and bring the session up. Failures are recorded in the
    /// status rather than returned; the lock screen works without a store.
    pub async fn start(&self) -> SystemStatus {
        match self.identity_provider.sign_in_anonymously().await {
            Ok(identity) => self.on_identity_changed(Some(identity)).await,
            Err(e) => {
                error!("Anonymous sign-in failed: {}", e);
                self.record_error(e.to_string());
                // Codes still come from settings even without an identity
                self.settings.load().await;
            }
        }
        self.watch_auth_state();

        let status = self.status();
        info!(
            "Session started: auth={} gateway={} data_loaded={}",
            status.auth, status.gateway, status.data_loaded
        );
        status
    }

    /// React to a new identity (or sign-out)
    pub async fn on_identity_changed(&self, identity: Option<Identity>) {
        self.transactions.unsubscribe();
        self.context.set_identity(identity.clone());

        let Some(identity) = identity else {
            info!("Signed out, purchases feed closed");
            return;
        };

        info!("Session identity is {}", identity.uid);
        self.settings.load().await;
        if let Err(e) = self.transactions.subscribe().await {
            self.record_error(e.to_string());
        }
    }

    /// Follow auth-state changes for the rest of the session
    fn watch_auth_state(&self) {
        let mut auth_state = self.identity_provider.auth_state();
        let session = self.clone();

        let handle = tokio::spawn(async move {
            while auth_state.changed().await.is_ok() {
                let identity = auth_state.borrow_and_update().clone();
                if identity != session.context.identity() {
                    session.on_identity_changed(identity).await;
                }
            }
        });

        let previous = self
            .auth_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Connection health for the dashboard
    pub fn status(&self) -> SystemStatus {
        let feed = self.transactions.feed_state();
        let mut last_error = self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let FeedStatus::Failed(message) = &feed.status {
            last_error = Some(message.clone());
        }

        SystemStatus {
            auth: self.context.identity().is_some(),
            gateway: feed.status == FeedStatus::Live,
            data_loaded: self.context.settings_loaded(),
            last_error,
        }
    }

    fn record_error(&self, message: String) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(message);
    }

    /// Close the feed, sign out and lock the terminal
    pub async fn end(&self) {
        let task = self
            .auth_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }

        self.transactions.unsubscribe();
        self.identity_provider.sign_out().await;
        self.context.set_identity(None);
        self.access.lock();
        if self.access.failed_attempts() > 0 {
            warn!(
                "Session ended with {} failed PIN attempts",
                self.access.failed_attempts()
            );
        }
        info!("Session ended");
    }
}
