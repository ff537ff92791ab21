//! Buy-back receipt for a single purchase.
//!
//! A [`Receipt`] is built from the cached settings and the locally
//! assembled purchase record, so it can be printed the moment the store
//! accepts the write, before the live feed catches up.

use anyhow::Result;
use chrono::{NaiveDateTime, TimeZone};
use shared::{GeneralSettings, ItemDetails, ItemType, PaymentMethod, Transaction};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Characters of the purchase id printed on the receipt
pub const RECEIPT_ID_LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub store_name: String,
    pub store_phone: String,
    pub location_name: String,
    /// `None` when the location was removed from settings after the sale
    pub location_address: Option<String>,
    pub receipt_id: String,
    /// Local wall-clock time of the purchase
    pub date: NaiveDateTime,
    pub customer_name: String,
    pub customer_id: String,
    pub phone: String,
    pub payment_method: PaymentMethod,
    pub check_number: Option<String>,
    pub item_type: ItemType,
    pub item_description: String,
    /// Category specific lines, in print order
    pub item_lines: Vec<(&'static str, String)>,
    pub amount: f64,
    pub terms: String,
    pub signature_image: String,
    pub id_image: Option<String>,
}

impl Receipt {
    pub fn build<Tz: TimeZone>(settings: &GeneralSettings, tx: &Transaction, tz: &Tz) -> Self {
        let location = settings.find_store(&tx.store_location);

        let item_lines = match &tx.item {
            ItemDetails::Gold { weight, karat } => vec![
                ("Weight", format!("{}g", weight)),
                ("Karat", karat.to_string()),
            ],
            ItemDetails::Diamond {
                stone_carat,
                stone_clarity,
            } => vec![
                ("Carat", format!("{}ct", stone_carat)),
                ("Details", stone_clarity.clone()),
            ],
            ItemDetails::Watch {
                brand,
                model,
                serial_number,
            } => vec![
                ("Brand", brand.clone()),
                ("Model", model.clone()),
                ("Serial", serial_number.clone()),
            ],
        };

        Self {
            store_name: settings.store_name.clone(),
            store_phone: settings.phone.clone(),
            location_name: tx.store_location.clone(),
            location_address: location.map(|l| l.address.clone()),
            receipt_id: tx.id.chars().take(RECEIPT_ID_LENGTH).collect(),
            date: tx.date.with_timezone(tz).naive_local(),
            customer_name: tx.customer_name.clone(),
            customer_id: tx.customer_id.clone(),
            phone: tx.phone.clone(),
            payment_method: tx.payment_method,
            check_number: tx.check_number.clone(),
            item_type: tx.item_type(),
            item_description: tx.item_description.clone(),
            item_lines,
            amount: tx.price,
            terms: settings.terms.clone(),
            signature_image: tx.signature_image.clone(),
            id_image: tx.id_image.clone(),
        }
    }

    /// `Check #1234`, or just the method name
    pub fn payment_line(&self) -> String {
        match (&self.payment_method, &self.check_number) {
            (PaymentMethod::Check, Some(number)) => format!("Check #{}", number),
            (method, _) => method.to_string(),
        }
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.store_name)?;
        match &self.location_address {
            Some(address) => writeln!(f, "{} - {}", self.location_name, address)?,
            None => writeln!(f, "{}", self.location_name)?,
        }
        writeln!(f, "Phone: {}", self.store_phone)?;
        writeln!(f)?;
        writeln!(f, "BUY-BACK RECEIPT")?;
        writeln!(f, "Date: {}", self.date.format("%m/%d/%Y %I:%M %p"))?;
        writeln!(f, "Transaction ID: {}", self.receipt_id)?;
        writeln!(f, "Customer: {}", self.customer_name)?;
        writeln!(f, "ID/License: {}", self.customer_id)?;
        writeln!(f, "Phone: {}", self.phone)?;
        writeln!(f, "Payment: {}", self.payment_line())?;
        writeln!(f)?;
        writeln!(f, "ITEM DETAILS")?;
        writeln!(f, "Type: {}", self.item_type)?;
        writeln!(f, "Description: {}", self.item_description)?;
        for (label, value) in &self.item_lines {
            writeln!(f, "{}: {}", label, value)?;
        }
        writeln!(f)?;
        writeln!(f, "AMOUNT PAID: ${:.2}", self.amount)?;
        writeln!(f)?;
        writeln!(f, "TERMS & CONDITIONS:")?;
        writeln!(f, "{}", self.terms)?;
        writeln!(f)?;
        writeln!(f, "Customer signature: [attached]")?;
        if self.id_image.is_some() {
            writeln!(f, "Customer ID: [attached]")?;
        }
        writeln!(f)?;
        writeln!(f, "Thank you for your business!")?;
        write!(f, "This is your official receipt. Please retain for your records.")
    }
}

/// Where receipts go once a purchase is stored
pub trait ReceiptPrinter: Send + Sync {
    fn print(&self, receipt: &Receipt) -> Result<()>;
}

/// Writes the rendered receipt to the log
#[derive(Debug, Default, Clone)]
pub struct LogReceiptPrinter;

impl ReceiptPrinter for LogReceiptPrinter {
    fn print(&self, receipt: &Receipt) -> Result<()> {
        info!("🧾 RECEIPT {}\n{}", receipt.receipt_id, receipt);
        Ok(())
    }
}

/// Keeps every printed receipt in memory
#[derive(Debug, Default)]
pub struct RecordingReceiptPrinter {
    printed: Mutex<Vec<Receipt>>,
}

impl RecordingReceiptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn printed(&self) -> Vec<Receipt> {
        self.printed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ReceiptPrinter for RecordingReceiptPrinter {
    fn print(&self, receipt: &Receipt) -> Result<()> {
        self.printed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(receipt.clone());
        Ok(())
    }
}
