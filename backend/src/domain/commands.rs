//! Domain-level command and result types used by the services.

pub mod transactions {
    use crate::domain::models::transaction::{DraftWarning, TransactionDraft};
    use crate::io::Receipt;
    use shared::Transaction;

    /// Edit an existing purchase
    #[derive(Debug, Clone)]
    pub struct UpdateTransactionCommand {
        pub id: String,
        pub draft: TransactionDraft,
    }

    /// Delete a purchase. `code` is the challenge answer (PIN or master
    /// code); `confirmed` is the operator's explicit confirmation.
    #[derive(Debug, Clone)]
    pub struct DeleteTransactionCommand {
        pub id: String,
        pub code: String,
        pub confirmed: bool,
    }

    /// Result of recording a new purchase
    #[derive(Debug, Clone)]
    pub struct CreateTransactionResult {
        pub id: String,
        /// The record as it was sent, with the assigned id
        pub transaction: Transaction,
        pub receipt: Receipt,
        pub warnings: Vec<DraftWarning>,
    }
}

pub mod reports {
    use chrono::NaiveDate;

    #[derive(Debug, Clone, Copy)]
    pub struct DateRangeQuery {
        pub start: NaiveDate,
        pub end: NaiveDate,
    }

    /// `month` is 1..=12
    #[derive(Debug, Clone, Copy)]
    pub struct MonthlyReportQuery {
        pub month: u32,
        pub year: i32,
    }
}
