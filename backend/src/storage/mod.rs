//! # Storage Module
//!
//! Handles persistence for the buy-back backend.
//!
//! The domain layer only talks to the traits in [`traits`]: a document store
//! (purchases collection + settings document), an anonymous identity
//! provider, and a device-local halt flag. Two implementations are provided:
//!
//! - **memory**: everything in process memory, used by tests and demos
//! - **csv**: a data directory with `purchases.csv`, `settings/main.yaml`
//!   and the halt marker file
//!
//! Both push full snapshots to subscribers after every successful write, so
//! the domain layer can not tell them apart.

pub mod csv;
pub mod identity;
pub mod memory;
pub mod traits;

pub use identity::AnonymousIdentityProvider;
pub use memory::{InMemoryGateway, MemoryHaltFlag};
pub use traits::*;

use shared::Transaction;

/// Maximum encoded size of a single document, matching the hosted store
pub const MAX_DOCUMENT_BYTES: usize = 1_048_576;

/// Reject a purchase whose encoded form would exceed `limit` bytes.
///
/// Almost all of a purchase document is the embedded id photo and signature,
/// so this is what trips when a photo was captured at too high a quality.
pub fn check_document_size(doc: &Transaction, limit: usize) -> Result<(), GatewayError> {
    let size = serde_json::to_vec(doc)
        .map_err(|e| GatewayError::Other(format!("failed to encode purchase: {}", e)))?
        .len();
    if size > limit {
        return Err(GatewayError::PayloadTooLarge { size, limit });
    }
    Ok(())
}

/// Order a snapshot the way the live query does: newest first
pub fn sort_newest_first(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
}
