//! Domain models that only live inside the backend. Stored documents are
//! the `shared` crate types.

pub mod transaction;
