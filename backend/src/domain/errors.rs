//! Error taxonomy surfaced to the operator.
//!
//! Validation errors are raised before any gateway call. Gateway failures are
//! mapped onto [`BuybackError`] at the call site and never retried.

use chrono::NaiveDate;

use crate::storage::GatewayError;

/// A local precondition that blocks the operation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please ask the customer to sign before saving")]
    MissingSignature,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Price must be greater than zero")]
    NonPositivePrice,
    #[error("Watch purchases require a brand")]
    MissingBrand,
    #[error("Unknown store location: {0}")]
    UnknownStoreLocation(String),
    #[error("At least one store location is required")]
    NoStoreLocations,
    #[error("Every store location needs both a name and an address")]
    IncompleteStoreLocation,
    #[error("Store location {0} is listed more than once")]
    DuplicateStoreLocation(String),
    #[error("Start date {start} is after end date {end}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
    #[error("PIN must be at least {0} digits")]
    PinTooShort(usize),
    #[error("Master code must be at least {0} digits")]
    MasterCodeTooShort(usize),
    #[error("Deletion must be confirmed")]
    DeletionNotConfirmed,
}

/// Everything a backend operation can fail with
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuybackError {
    #[error("Permission denied: {0}. Check the document store security rules.")]
    PermissionDenied(String),
    #[error("Network error: {0}. Please check your internet connection.")]
    Unavailable(String),
    #[error("Not connected or not authenticated")]
    Unauthenticated,
    #[error("An image is too large to save ({size} bytes, limit {limit}). Please retake the photo at a lower quality.")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Incorrect code")]
    InvalidCode,
    #[error("Security settings are locked. Enter the master code first.")]
    SecurityGateLocked,
    #[error("Transaction not found: {0}")]
    NotFound(String),
    #[error("Error: {0}")]
    Unclassified(String),
}

impl From<GatewayError> for BuybackError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::PermissionDenied(msg) => BuybackError::PermissionDenied(msg),
            GatewayError::Unavailable(msg) => BuybackError::Unavailable(msg),
            GatewayError::Unauthenticated => BuybackError::Unauthenticated,
            GatewayError::PayloadTooLarge { size, limit } => {
                BuybackError::PayloadTooLarge { size, limit }
            }
            GatewayError::NotFound(id) => BuybackError::NotFound(id),
            GatewayError::Other(msg) => BuybackError::Unclassified(msg),
        }
    }
}

impl BuybackError {
    pub fn is_validation(&self) -> bool {
        matches!(self, BuybackError::Validation(_))
    }
}
