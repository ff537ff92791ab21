//! # Analytics
//!
//! Pure aggregates over a purchase snapshot, recomputed on every read.
//!
//! Every function takes the current time (and with it the time zone) as an
//! argument. Production passes `Local::now()`; tests pass a fixed instant in
//! a fixed zone.
//!
//! ## Windows
//!
//! | Timeframe | Window start (local midnight) |
//! |-----------|-------------------------------|
//! | Weekly    | most recent Sunday            |
//! | Monthly   | first day of the month        |
//! | Yearly    | January 1st                   |
//!
//! The window is open-ended: it runs up to and including `now`.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use shared::{ItemDetails, Karat, PeriodAnalytics, Timeframe, Transaction};
use std::collections::BTreeMap;

/// Half-open in the past, closed at `now`: `start <= date <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Local calendar day the window starts on
    pub start_date: NaiveDate,
}

impl TimeWindow {
    pub fn contains(&self, date: &DateTime<Utc>) -> bool {
        *date >= self.start && *date <= self.end
    }
}

/// The instant a local calendar day begins.
///
/// When midnight does not exist (a DST jump at 00:00) the day begins at the
/// first valid local time after the gap.
pub fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let mut naive = date.and_time(NaiveTime::MIN);
    for _ in 0..4 {
        if let Some(start) = tz.from_local_datetime(&naive).earliest() {
            return start.with_timezone(&Utc);
        }
        naive += chrono::Duration::minutes(30);
    }
    // No real zone has a gap this long; fall back to reading the day as UTC
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// First local calendar day of the timeframe containing `today`
pub fn period_start_date(timeframe: Timeframe, today: NaiveDate) -> NaiveDate {
    match timeframe {
        Timeframe::Weekly => {
            today - Days::new(u64::from(today.weekday().num_days_from_sunday()))
        }
        Timeframe::Monthly => today.with_day(1).unwrap_or(today),
        Timeframe::Yearly => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
    }
}

pub fn time_window<Tz: TimeZone>(timeframe: Timeframe, now: &DateTime<Tz>) -> TimeWindow {
    let start_date = period_start_date(timeframe, now.date_naive());
    TimeWindow {
        start: local_midnight(&now.timezone(), start_date),
        end: now.with_timezone(&Utc),
        start_date,
    }
}

/// Spend, counts and per-category breakdowns for the purchases inside the
/// timeframe's window
pub fn aggregate<Tz: TimeZone>(
    transactions: &[Transaction],
    timeframe: Timeframe,
    now: &DateTime<Tz>,
) -> PeriodAnalytics {
    let window = time_window(timeframe, now);

    let mut analytics = PeriodAnalytics {
        timeframe,
        period_start: window.start_date,
        total_spent_period: 0.0,
        count: 0,
        gold_grams_by_karat: Karat::ALL
            .iter()
            .filter(|k| k.is_gold_purity())
            .map(|k| (*k, 0.0))
            .collect(),
        silver_grams: 0.0,
        platinum_grams: 0.0,
        diamond_carats: 0.0,
        diamond_count: 0,
        watch_brands: BTreeMap::new(),
    };

    for tx in transactions.iter().filter(|t| window.contains(&t.date)) {
        analytics.total_spent_period += tx.price;
        analytics.count += 1;

        match &tx.item {
            ItemDetails::Gold { weight, karat } => match karat {
                Karat::Silver => analytics.silver_grams += weight,
                Karat::Platinum => analytics.platinum_grams += weight,
                gold => *analytics.gold_grams_by_karat.entry(*gold).or_insert(0.0) += weight,
            },
            ItemDetails::Diamond { stone_carat, .. } => {
                analytics.diamond_carats += stone_carat;
                analytics.diamond_count += 1;
            }
            ItemDetails::Watch { brand, .. } => {
                *analytics
                    .watch_brands
                    .entry(brand.trim().to_uppercase())
                    .or_insert(0) += 1;
            }
        }
    }

    analytics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::tests::sample_purchase;
    use chrono::FixedOffset;

    fn eastern() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        eastern().with_ymd_and_hms(2025, 5, day, hour, 0, 0).unwrap()
    }

    fn purchase_at(when: DateTime<FixedOffset>, item: ItemDetails, price: f64) -> Transaction {
        let mut tx = sample_purchase("Ann", 1, price);
        tx.date = when.with_timezone(&Utc);
        tx.item = item;
        tx
    }

    fn gold(weight: f64, karat: Karat) -> ItemDetails {
        ItemDetails::Gold { weight, karat }
    }

    #[test]
    fn test_window_starts() {
        // Wednesday 2025-05-14
        let now = at(14, 15);
        let cases = vec![
            (Timeframe::Weekly, NaiveDate::from_ymd_opt(2025, 5, 11).unwrap()),
            (Timeframe::Monthly, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()),
            (Timeframe::Yearly, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()),
        ];

        for (timeframe, expected) in cases {
            let window = time_window(timeframe, &now);
            assert_eq!(window.start_date, expected, "{}", timeframe);
            assert_eq!(
                window.start,
                eastern()
                    .from_local_datetime(&expected.and_time(NaiveTime::MIN))
                    .unwrap()
                    .with_timezone(&Utc)
            );
            assert_eq!(window.end, now.with_timezone(&Utc));
        }
    }

    #[test]
    fn test_week_starting_on_sunday_includes_sunday() {
        // Sunday 2025-05-11
        let now = at(11, 8);
        assert_eq!(
            time_window(Timeframe::Weekly, &now).start_date,
            NaiveDate::from_ymd_opt(2025, 5, 11).unwrap()
        );
    }

    #[test]
    fn test_monthly_total_and_count() {
        let now = at(20, 12);
        let snapshot = vec![
            purchase_at(at(2, 10), gold(1.0, Karat::K14), 50.0),
            purchase_at(at(18, 10), gold(2.0, Karat::K18), 75.0),
            // Last day of April in local time, outside the month
            purchase_at(
                eastern().with_ymd_and_hms(2025, 4, 30, 23, 30, 0).unwrap(),
                gold(9.0, Karat::K14),
                500.0,
            ),
            // Later today, after `now`
            purchase_at(at(20, 18), gold(9.0, Karat::K14), 500.0),
        ];

        let analytics = aggregate(&snapshot, Timeframe::Monthly, &now);
        assert_eq!(analytics.count, 2);
        assert_eq!(analytics.total_spent_period, 125.0);
        assert_eq!(analytics.gold_grams(), 3.0);
    }

    #[test]
    fn test_local_midnight_boundary() {
        let now = at(20, 12);
        let first_second = eastern().with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        let snapshot = vec![purchase_at(first_second, gold(1.0, Karat::K10), 10.0)];

        // Local midnight is 05:00 UTC
        assert_eq!(aggregate(&snapshot, Timeframe::Monthly, &now).count, 1);

        let just_before = vec![purchase_at(
            first_second - chrono::Duration::seconds(1),
            gold(1.0, Karat::K10),
            10.0,
        )];
        assert_eq!(aggregate(&just_before, Timeframe::Monthly, &now).count, 0);
    }

    #[test]
    fn test_silver_and_platinum_kept_out_of_karat_histogram() {
        let now = at(20, 12);
        let snapshot = vec![
            purchase_at(at(3, 9), gold(5.0, Karat::Silver), 20.0),
            purchase_at(at(3, 10), gold(2.0, Karat::Platinum), 60.0),
            purchase_at(at(3, 11), gold(1.5, Karat::K24), 90.0),
        ];

        let analytics = aggregate(&snapshot, Timeframe::Monthly, &now);
        assert_eq!(analytics.silver_grams, 5.0);
        assert_eq!(analytics.platinum_grams, 2.0);
        assert_eq!(analytics.gold_grams(), 1.5);
        assert_eq!(analytics.gold_grams_by_karat.len(), 5);
        assert!(!analytics.gold_grams_by_karat.contains_key(&Karat::Silver));
        assert!(!analytics.gold_grams_by_karat.contains_key(&Karat::Platinum));
        assert_eq!(analytics.gold_grams_by_karat[&Karat::K10], 0.0);
    }

    #[test]
    fn test_diamonds_and_watch_brands() {
        let now = at(20, 12);
        let watch = |brand: &str| ItemDetails::Watch {
            brand: brand.to_string(),
            model: String::new(),
            serial_number: String::new(),
        };
        let snapshot = vec![
            purchase_at(
                at(5, 9),
                ItemDetails::Diamond {
                    stone_carat: 0.75,
                    stone_clarity: "VS2".to_string(),
                },
                300.0,
            ),
            purchase_at(
                at(6, 9),
                ItemDetails::Diamond {
                    stone_carat: 1.25,
                    stone_clarity: "SI1".to_string(),
                },
                700.0,
            ),
            purchase_at(at(7, 9), watch("Rolex"), 4000.0),
            purchase_at(at(8, 9), watch("rolex "), 3500.0),
            purchase_at(at(9, 9), watch("Omega"), 1200.0),
        ];

        let analytics = aggregate(&snapshot, Timeframe::Yearly, &now);
        assert_eq!(analytics.diamond_carats, 2.0);
        assert_eq!(analytics.diamond_count, 2);
        assert_eq!(analytics.watch_brands["ROLEX"], 2);
        assert_eq!(analytics.watch_brands["OMEGA"], 1);
        assert_eq!(analytics.count, 5);
    }
}
