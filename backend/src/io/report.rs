//! # Purchase Reports
//!
//! Date-range and monthly reports: one row per purchase plus a grand total.
//!
//! ## Key Responsibilities
//!
//! - Select purchases through the filter engine
//! - Render a plain-text report for printing
//! - Export the same rows as CSV, either as content or written to a folder
//!
//! ## CSV Format
//!
//! ```csv
//! date,customer,customer_id,item,amount
//! 2025/05/01,Jane Doe,D123,Gold: Chain,100.00
//! ,TOTAL,,,100.00
//! ```

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate, TimeZone};
use shared::Transaction;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::domain::errors::ValidationError;
use crate::domain::transaction_filter::{filter_by_date_range, filter_by_month};

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Local calendar day of the purchase
    pub date: NaiveDate,
    pub customer_name: String,
    pub customer_id: String,
    /// `Gold: Wedding band`
    pub item: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateRangeReport {
    pub store_name: String,
    pub title: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Oldest first
    pub rows: Vec<ReportRow>,
    pub grand_total: f64,
}

impl DateRangeReport {
    /// Report over the inclusive range `start..=end`
    pub fn for_date_range<Tz: TimeZone>(
        store_name: &str,
        transactions: &[Transaction],
        start: NaiveDate,
        end: NaiveDate,
        tz: &Tz,
    ) -> Result<Self, ValidationError> {
        let selected = filter_by_date_range(transactions, start, end, tz)?;
        let title = format!(
            "Transaction Report {} - {}",
            start.format("%m/%d/%Y"),
            end.format("%m/%d/%Y")
        );
        Ok(Self::from_selection(store_name, title, start, end, &selected, tz))
    }

    /// Report over one calendar month (`month` is 1..=12)
    pub fn for_month<Tz: TimeZone>(
        store_name: &str,
        transactions: &[Transaction],
        month: u32,
        year: i32,
        tz: &Tz,
    ) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = last_day_of_month(start)?;
        let selected = filter_by_month(transactions, month, year, tz);
        let title = format!("Monthly Transaction Report {}", start.format("%B %Y"));
        Some(Self::from_selection(store_name, title, start, end, &selected, tz))
    }

    fn from_selection<Tz: TimeZone>(
        store_name: &str,
        title: String,
        start: NaiveDate,
        end: NaiveDate,
        selected: &[Transaction],
        tz: &Tz,
    ) -> Self {
        let mut ordered: Vec<&Transaction> = selected.iter().collect();
        ordered.sort_by_key(|t| t.date);

        let rows: Vec<ReportRow> = ordered
            .into_iter()
            .map(|t| ReportRow {
                date: t.date.with_timezone(tz).date_naive(),
                customer_name: t.customer_name.clone(),
                customer_id: t.customer_id.clone(),
                item: format!("{}: {}", t.item_type(), t.item_description),
                amount: t.price,
            })
            .collect();
        let grand_total = rows.iter().map(|r| r.amount).sum();

        Self {
            store_name: store_name.to_string(),
            title,
            start,
            end,
            rows,
            grand_total,
        }
    }

    /// CSV rendering of the rows with a trailing total row
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["date", "customer", "customer_id", "item", "amount"])?;
        for row in &self.rows {
            writer.write_record([
                row.date.format("%Y/%m/%d").to_string(),
                row.customer_name.clone(),
                row.customer_id.clone(),
                row.item.clone(),
                format!("{:.2}", row.amount),
            ])?;
        }
        writer.write_record([
            String::new(),
            "TOTAL".to_string(),
            String::new(),
            String::new(),
            format!("{:.2}", self.grand_total),
        ])?;

        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow!("failed to flush report: {}", e))?;
        Ok(String::from_utf8(bytes)?)
    }

    /// `kb_gold_jewelry_report_20250501_20250531.csv`
    pub fn export_filename(&self) -> String {
        format!(
            "{}_report_{}_{}.csv",
            self.store_name.trim().replace(' ', "_").to_lowercase(),
            self.start.format("%Y%m%d"),
            self.end.format("%Y%m%d")
        )
    }

    /// Write the CSV export into `directory`, or the Documents folder when
    /// none is given. Returns the written file's path.
    pub fn export_to_directory(&self, directory: Option<&Path>) -> Result<PathBuf> {
        let export_dir = match directory {
            Some(dir) => dir.to_path_buf(),
            None => dirs::document_dir()
                .or_else(dirs::home_dir)
                .ok_or_else(|| anyhow!("Could not determine default export directory"))?,
        };

        fs::create_dir_all(&export_dir)
            .with_context(|| format!("failed to create {}", export_dir.display()))?;
        let path = export_dir.join(self.export_filename());
        let content = self.to_csv()?;

        if let Err(e) = fs::write(&path, &content) {
            error!("❌ EXPORT: failed to write {}: {}", path.display(), e);
            return Err(e.into());
        }

        info!(
            "✅ EXPORT: wrote {} rows ({} bytes) to {}",
            self.rows.len(),
            content.len(),
            path.display()
        );
        Ok(path)
    }
}

fn last_day_of_month(first: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
}

impl fmt::Display for DateRangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.store_name)?;
        writeln!(f, "{}", self.title)?;
        writeln!(f)?;
        writeln!(f, "{:<10}  {:<30}  {:<30}  {:>12}", "Date", "Customer", "Item", "Amount")?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<10}  {:<30}  {:<30}  {:>12}",
                row.date.format("%m/%d/%Y"),
                format!("{} ({})", row.customer_name, row.customer_id),
                row.item,
                format!("${:.2}", row.amount)
            )?;
        }
        write!(f, "{:>76}  {:>12}", "TOTAL:", format!("${:.2}", self.grand_total))
    }
}
