use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::FuelGrade;

/// Number of stations the selector keeps per grade unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 10;

/// One row as handed over by the acquisition collaborator.
///
/// `grade` is still free text here; it is parsed into a [`FuelGrade`] when the
/// store ingests the record, and rows with an unknown grade are rejected there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPriceRecord {
    pub grade: String,
    pub station: String,
    pub price: Decimal,
    /// Human-readable age of the price as published, e.g. `"2 hours ago"`.
    pub freshness_label: String,
}

/// One stored observation of a station's price for a grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub grade: FuelGrade,
    pub station: String,
    pub price: Decimal,
    pub freshness_label: String,
    /// Capture instant of the ingestion cycle that wrote the row.
    pub observed_at: DateTime<Utc>,
}

/// Orders the latest-per-station records ascending by price and keeps `k`.
///
/// The sort is stable, so equal prices keep the order of `latest` (the store
/// returns stations in ascending name order, which makes name the effective
/// tie-break). A station is never listed twice even if `latest` repeats one.
#[must_use]
pub fn top_cheapest(mut latest: Vec<PriceRecord>, k: usize) -> Vec<PriceRecord> {
    latest.sort_by(|a, b| a.price.cmp(&b.price));

    let mut seen = HashSet::new();
    latest.retain(|record| seen.insert(record.station.clone()));
    latest.truncate(k);
    latest
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn record(station: &str, price: &str) -> PriceRecord {
        PriceRecord {
            grade: FuelGrade::Diesel,
            station: station.to_owned(),
            price: Decimal::from_str(price).expect("decimal"),
            freshness_label: "just now".to_owned(),
            observed_at: Utc::now(),
        }
    }

    fn stations(records: &[PriceRecord]) -> Vec<&str> {
        records.iter().map(|r| r.station.as_str()).collect()
    }

    #[test]
    fn sorts_ascending_and_truncates() {
        let latest = vec![
            record("A", "1.80"),
            record("B", "1.60"),
            record("C", "1.70"),
            record("D", "1.50"),
        ];

        let top = top_cheapest(latest, 3);
        assert_eq!(stations(&top), ["D", "B", "C"]);
    }

    #[test]
    fn returns_fewer_than_k_when_data_is_short() {
        let top = top_cheapest(vec![record("A", "1.80")], DEFAULT_TOP_K);
        assert_eq!(top.len(), 1);
        assert!(top_cheapest(Vec::new(), 5).is_empty());
    }

    #[test]
    fn equal_prices_keep_input_order() {
        let latest = vec![
            record("Alpha", "1.65"),
            record("Bravo", "1.60"),
            record("Charlie", "1.65"),
        ];

        let top = top_cheapest(latest, 10);
        assert_eq!(stations(&top), ["Bravo", "Alpha", "Charlie"]);
    }

    #[test]
    fn never_lists_a_station_twice() {
        let latest = vec![record("A", "1.70"), record("A", "1.50"), record("B", "1.60")];

        let top = top_cheapest(latest, 10);
        assert_eq!(stations(&top), ["A", "B"]);
        assert_eq!(top[0].price, Decimal::from_str("1.50").expect("decimal"));
    }

    #[test]
    fn zero_k_yields_nothing() {
        assert!(top_cheapest(vec![record("A", "1.70")], 0).is_empty());
    }
}
