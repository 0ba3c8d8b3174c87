//! Threshold matching and per-recipient batching of price alerts.

use std::collections::HashMap;
use std::fmt::Write as _;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{FuelGrade, PriceRecord, Subscription};

pub const ALERT_SUBJECT: &str = "Fuel Price Alert";

const BODY_PREAMBLE: &str = "The following fuel prices have dropped below your thresholds:";

/// A single station that satisfied one subscription's threshold this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCandidate {
    pub email: String,
    pub grade: FuelGrade,
    pub station: String,
    pub price: Decimal,
    pub threshold: Decimal,
    pub freshness_label: String,
}

/// One outbound message covering every alert a recipient earned in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub alert_count: usize,
}

/// Evaluates every subscription against the cycle's Top-K snapshot.
///
/// `top_k_by_grade` is computed once per cycle by the caller, so all
/// subscriptions on a grade see the same set. The comparison is inclusive:
/// a price equal to the threshold triggers. Grades missing from the snapshot
/// produce no candidates.
#[must_use]
pub fn match_subscriptions(
    subscriptions: &[Subscription],
    top_k_by_grade: &HashMap<FuelGrade, Vec<PriceRecord>>,
) -> Vec<AlertCandidate> {
    let mut candidates = Vec::new();

    for subscription in subscriptions {
        let Some(top_k) = top_k_by_grade.get(&subscription.grade) else {
            continue;
        };
        candidates.extend(
            top_k
                .iter()
                .filter(|record| record.price <= subscription.threshold)
                .map(|record| AlertCandidate {
                    email: subscription.email.clone(),
                    grade: subscription.grade,
                    station: record.station.clone(),
                    price: record.price,
                    threshold: subscription.threshold,
                    freshness_label: record.freshness_label.clone(),
                }),
        );
    }

    candidates
}

/// Groups candidates by recipient into exactly one message each.
///
/// Recipients appear in the order of their first candidate, and lines within
/// a message keep the order the candidates were produced in.
#[must_use]
pub fn aggregate_alerts(candidates: &[AlertCandidate]) -> Vec<ComposedMessage> {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<&AlertCandidate>> = HashMap::new();

    for candidate in candidates {
        grouped
            .entry(candidate.email.as_str())
            .or_insert_with(|| {
                order.push(candidate.email.as_str());
                Vec::new()
            })
            .push(candidate);
    }

    order
        .into_iter()
        .filter_map(|email| {
            let alerts = grouped.remove(email)?;
            Some(ComposedMessage {
                recipient: email.to_owned(),
                subject: ALERT_SUBJECT.to_owned(),
                body: compose_body(&alerts),
                alert_count: alerts.len(),
            })
        })
        .collect()
}

/// Renders the plain-text body for one recipient's alerts.
#[must_use]
pub fn compose_body(alerts: &[&AlertCandidate]) -> String {
    let mut body = format!("{BODY_PREAMBLE}\n\n");
    for alert in alerts {
        // Writing to a String cannot fail.
        let _ = writeln!(
            body,
            "- {} at {}: €{} (Threshold: €{}, Updated: {})",
            alert.grade, alert.station, alert.price, alert.threshold, alert.freshness_label
        );
    }
    body
}
