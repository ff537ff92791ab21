//! Printable outputs: single purchase receipts and date-range reports.

pub mod receipt;
pub mod report;

pub use receipt::{LogReceiptPrinter, Receipt, ReceiptPrinter, RecordingReceiptPrinter};
pub use report::{DateRangeReport, ReportRow};
