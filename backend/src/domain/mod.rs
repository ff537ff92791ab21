//! # Domain Module
//!
//! Business logic of the buy-back terminal, independent of where purchases
//! are stored.
//!
//! ## Module Organization
//!
//! - **access_control**: PIN lock, lockout and the security settings gate
//! - **settings_service**: loading and saving the settings document
//! - **transaction_service**: the live purchase repository and its mutations
//! - **analytics**: time-windowed aggregates for the dashboard
//! - **transaction_filter**: criteria filters, date ranges and search
//! - **session**: start-up, identity changes and system status
//!
//! ## Business Rules
//!
//! - A purchase needs a signature, customer name, customer ID, description
//!   and a positive price before it is sent to the store
//! - `date` is set once at creation and survives every edit
//! - Five consecutive wrong PINs halt the terminal until the master code is
//!   entered, and the halt survives a restart
//! - Deleting a purchase needs the PIN or master code plus a confirmation

pub mod access_control;
pub mod analytics;
pub mod commands;
pub mod context;
pub mod errors;
pub mod models;
pub mod session;
pub mod settings_service;
pub mod transaction_filter;
pub mod transaction_service;

pub use access_control::{AccessControlService, PinOutcome, ResetRequest};
pub use context::SessionContext;
pub use errors::{BuybackError, ValidationError};
pub use models::transaction::{DraftWarning, ItemDraft, TransactionDraft};
pub use session::Session;
pub use settings_service::SettingsService;
pub use transaction_filter::{FilterCriteria, Subtype};
pub use transaction_service::{FeedState, FeedStatus, TransactionService};
