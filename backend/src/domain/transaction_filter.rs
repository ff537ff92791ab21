//! Filtering and search over a purchase snapshot.
//!
//! All functions are pure and keep the snapshot order (newest first).
//! Calendar dates are interpreted in the time zone passed in.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone};
use shared::{ItemDetails, ItemType, Karat, Transaction};

use super::analytics::local_midnight;
use super::errors::ValidationError;

/// Narrower match within an item type
#[derive(Debug, Clone, PartialEq)]
pub enum Subtype {
    /// Gold purity, or Silver / Platinum
    Karat(Karat),
    /// Watch brand, compared case-insensitively
    Brand(String),
}

/// Criteria for the history screen. Every populated field must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub item_type: Option<ItemType>,
    pub subtype: Option<Subtype>,
    /// Case-insensitive substring of customer name, phone, description or price
    pub text: String,
    /// Local calendar day of the purchase
    pub exact_date: Option<NaiveDate>,
}

impl FilterCriteria {
    fn matches<Tz: TimeZone>(&self, tx: &Transaction, tz: &Tz) -> bool {
        if let Some(item_type) = self.item_type {
            if tx.item_type() != item_type {
                return false;
            }
        }

        if let Some(subtype) = &self.subtype {
            let hit = match (subtype, &tx.item) {
                (Subtype::Karat(wanted), ItemDetails::Gold { karat, .. }) => karat == wanted,
                (Subtype::Brand(wanted), ItemDetails::Watch { brand, .. }) => {
                    brand.trim().eq_ignore_ascii_case(wanted.trim())
                }
                _ => false,
            };
            if !hit {
                return false;
            }
        }

        let needle = self.text.trim().to_lowercase();
        if !needle.is_empty() {
            let haystacks = [
                tx.customer_name.to_lowercase(),
                tx.phone.to_lowercase(),
                tx.item_description.to_lowercase(),
                tx.price.to_string(),
            ];
            if !haystacks.iter().any(|h| h.contains(&needle)) {
                return false;
            }
        }

        if let Some(day) = self.exact_date {
            if local_date(&tx.date, tz) != day {
                return false;
            }
        }

        true
    }
}

fn local_date<Tz: TimeZone>(date: &DateTime<chrono::Utc>, tz: &Tz) -> NaiveDate {
    date.with_timezone(tz).date_naive()
}

pub fn filter_by_criteria<Tz: TimeZone>(
    transactions: &[Transaction],
    criteria: &FilterCriteria,
    tz: &Tz,
) -> Vec<Transaction> {
    transactions
        .iter()
        .filter(|tx| criteria.matches(tx, tz))
        .cloned()
        .collect()
}

/// Purchases from local midnight of `start` through the end of `end`
pub fn filter_by_date_range<Tz: TimeZone>(
    transactions: &[Transaction],
    start: NaiveDate,
    end: NaiveDate,
    tz: &Tz,
) -> Result<Vec<Transaction>, ValidationError> {
    if start > end {
        return Err(ValidationError::InvertedDateRange { start, end });
    }

    let from = local_midnight(tz, start);
    let until = local_midnight(tz, end + Days::new(1));
    Ok(transactions
        .iter()
        .filter(|tx| tx.date >= from && tx.date < until)
        .cloned()
        .collect())
}

/// Purchases in a local calendar month (`month` is 1..=12)
pub fn filter_by_month<Tz: TimeZone>(
    transactions: &[Transaction],
    month: u32,
    year: i32,
    tz: &Tz,
) -> Vec<Transaction> {
    transactions
        .iter()
        .filter(|tx| {
            let day = local_date(&tx.date, tz);
            day.month() == month && day.year() == year
        })
        .cloned()
        .collect()
}

/// Quick search: customer name and item description only
pub fn search_history(transactions: &[Transaction], term: &str) -> Vec<Transaction> {
    let needle = term.trim().to_lowercase();
    transactions
        .iter()
        .filter(|tx| {
            needle.is_empty()
                || tx.customer_name.to_lowercase().contains(&needle)
                || tx.item_description.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::tests::sample_purchase;
    use chrono::{FixedOffset, Utc};

    fn pacific() -> FixedOffset {
        FixedOffset::west_opt(8 * 3600).unwrap()
    }

    fn snapshot() -> Vec<Transaction> {
        let mut ring = sample_purchase("Maria Lopez", 3, 120.0);
        ring.id = "ring".to_string();
        ring.phone = "616-555-0101".to_string();
        ring.item_description = "Wedding band".to_string();

        let mut silver = sample_purchase("Tom Baker", 4, 15.5);
        silver.id = "silver".to_string();
        silver.item = ItemDetails::Gold {
            weight: 30.0,
            karat: Karat::Silver,
        };
        silver.item_description = "Spoons".to_string();

        let mut watch = sample_purchase("Ana Ruiz", 5, 2500.0);
        watch.id = "watch".to_string();
        watch.item = ItemDetails::Watch {
            brand: "Rolex".to_string(),
            model: "Datejust".to_string(),
            serial_number: "X1".to_string(),
        };
        watch.item_description = "Two-tone watch".to_string();

        let mut stone = sample_purchase("Lee Park", 6, 800.0);
        stone.id = "stone".to_string();
        stone.item = ItemDetails::Diamond {
            stone_carat: 1.0,
            stone_clarity: "VVS2".to_string(),
        };
        stone.item_description = "Loose stone".to_string();

        vec![stone, watch, silver, ring]
    }

    fn ids(txs: &[Transaction]) -> Vec<&str> {
        txs.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_criteria_combinations() {
        let all = snapshot();
        let cases = vec![
            (FilterCriteria::default(), vec!["stone", "watch", "silver", "ring"]),
            (
                FilterCriteria {
                    item_type: Some(ItemType::Gold),
                    ..Default::default()
                },
                vec!["silver", "ring"],
            ),
            (
                FilterCriteria {
                    item_type: Some(ItemType::Gold),
                    subtype: Some(Subtype::Karat(Karat::Silver)),
                    ..Default::default()
                },
                vec!["silver"],
            ),
            (
                FilterCriteria {
                    subtype: Some(Subtype::Brand("ROLEX".to_string())),
                    ..Default::default()
                },
                vec!["watch"],
            ),
            (
                FilterCriteria {
                    text: "555-0101".to_string(),
                    ..Default::default()
                },
                vec!["ring"],
            ),
            (
                FilterCriteria {
                    text: "15.5".to_string(),
                    ..Default::default()
                },
                vec!["silver"],
            ),
            (
                FilterCriteria {
                    text: "STONE".to_string(),
                    item_type: Some(ItemType::Watch),
                    ..Default::default()
                },
                vec![],
            ),
        ];

        for (criteria, expected) in cases {
            let result = filter_by_criteria(&all, &criteria, &Utc);
            assert_eq!(ids(&result), expected, "{:?}", criteria);
        }
    }

    #[test]
    fn test_exact_date_uses_local_calendar_day() {
        // sample purchases are stamped 12:00 UTC, which is 04:00 in UTC-8
        let all = snapshot();
        let criteria = FilterCriteria {
            exact_date: NaiveDate::from_ymd_opt(2025, 5, 4),
            ..Default::default()
        };
        assert_eq!(ids(&filter_by_criteria(&all, &criteria, &pacific())), vec!["silver"]);

        let mut late = sample_purchase("Night Owl", 4, 1.0);
        late.id = "late".to_string();
        late.date = Utc.with_ymd_and_hms(2025, 5, 5, 7, 0, 0).unwrap();
        assert_eq!(
            ids(&filter_by_criteria(&[late], &criteria, &pacific())),
            vec!["late"]
        );
    }

    #[test]
    fn test_date_range_is_inclusive_of_both_days() {
        let all = snapshot();
        let start = NaiveDate::from_ymd_opt(2025, 5, 4).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 5, 5).unwrap();
        let result = filter_by_date_range(&all, start, end, &Utc).unwrap();
        assert_eq!(ids(&result), vec!["watch", "silver"]);

        let same_day = filter_by_date_range(&all, end, end, &Utc).unwrap();
        assert_eq!(ids(&same_day), vec!["watch"]);
    }

    #[test]
    fn test_date_range_last_second_of_end_day() {
        let mut tx = sample_purchase("Edge", 1, 10.0);
        tx.date = Utc.with_ymd_and_hms(2025, 5, 5, 23, 59, 59).unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 5, 5).unwrap();
        assert_eq!(filter_by_date_range(&[tx.clone()], day, day, &Utc).unwrap().len(), 1);

        tx.date = Utc.with_ymd_and_hms(2025, 5, 6, 0, 0, 0).unwrap();
        assert!(filter_by_date_range(&[tx], day, day, &Utc).unwrap().is_empty());
    }

    #[test]
    fn test_inverted_date_range() {
        let start = NaiveDate::from_ymd_opt(2025, 5, 9).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        assert_eq!(
            filter_by_date_range(&snapshot(), start, end, &Utc),
            Err(ValidationError::InvertedDateRange { start, end })
        );
    }

    #[test]
    fn test_month_filter() {
        let mut april = sample_purchase("April", 1, 10.0);
        april.date = Utc.with_ymd_and_hms(2025, 4, 30, 12, 0, 0).unwrap();
        let mut all = snapshot();
        all.push(april);

        assert_eq!(filter_by_month(&all, 5, 2025, &Utc).len(), 4);
        assert_eq!(filter_by_month(&all, 4, 2025, &Utc).len(), 1);
        assert!(filter_by_month(&all, 5, 2024, &Utc).is_empty());
    }

    #[test]
    fn test_search_ignores_phone_and_price() {
        let all = snapshot();
        assert_eq!(ids(&search_history(&all, "maria")), vec!["ring"]);
        assert_eq!(ids(&search_history(&all, "WATCH")), vec!["watch"]);
        assert!(search_history(&all, "555-0101").is_empty());
        assert!(search_history(&all, "2500").is_empty());
        assert_eq!(search_history(&all, "  ").len(), 4);
    }
}
