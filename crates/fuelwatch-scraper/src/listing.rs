//! Extraction of price rows from the listing page.
//!
//! The page carries one `<table class="table">` per grade, always in the
//! order of [`LISTING_GRADES`]. Each data row holds the station in its
//! second cell, the price in the third and a Finnish freshness phrase in
//! the fourth.

use std::str::FromStr;
use std::sync::LazyLock;

use fuelwatch_core::RawPriceRecord;
use regex::Regex;
use rust_decimal::Decimal;

/// Grade labels in table order.
pub const LISTING_GRADES: [&str; 3] = ["95 E10", "98 E5", "Diesel"];

static TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<table\b[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?table(?:\s[^"']*)?["'][^>]*>(.*?)</table>"#)
        .expect("valid regex")
});
static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("valid regex"));
static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").expect("valid regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[.,]\d+)").expect("valid regex"));

// Plural phrases come before singular ones so "tuntia" never half-matches.
const FRESHNESS_TRANSLATIONS: [(&str, &str); 9] = [
    ("tuntia sitten", "hours ago"),
    ("minuuttia sitten", "minutes ago"),
    ("sekuntia sitten", "seconds ago"),
    ("päivää sitten", "days ago"),
    ("tunti sitten", "hour ago"),
    ("minuutti sitten", "minute ago"),
    ("sekunti sitten", "second ago"),
    ("päivä sitten", "day ago"),
    ("juuri nyt", "just now"),
];

/// Translates a Finnish "N units ago" phrase into English.
///
/// Phrases that are not recognized are returned unchanged.
#[must_use]
pub fn translate_freshness(phrase: &str) -> String {
    let phrase = phrase.trim();
    FRESHNESS_TRANSLATIONS
        .iter()
        .find(|(finnish, _)| phrase.contains(finnish))
        .map_or_else(
            || phrase.to_owned(),
            |(finnish, english)| phrase.replace(finnish, english),
        )
}

/// Pulls the first decimal number out of a price cell such as `"1,799 €"`.
///
/// A comma is read as the decimal point.
#[must_use]
pub fn parse_price(text: &str) -> Option<Decimal> {
    let raw = PRICE_RE.captures(text)?.get(1)?.as_str().replace(',', ".");
    Decimal::from_str(&raw).ok()
}

fn cell_text(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, " ");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses every grade table on the page into raw records.
///
/// Tables beyond the known grades are skipped with a warning, the header row
/// of each table is ignored, rows with fewer than four cells are ignored and
/// rows whose price cell holds no number are logged and dropped.
#[must_use]
pub fn parse_listing(html: &str) -> Vec<RawPriceRecord> {
    let mut records = Vec::new();

    for (index, table) in TABLE_RE.captures_iter(html).enumerate() {
        let Some(grade) = LISTING_GRADES.get(index) else {
            tracing::warn!(table_index = index, "unexpected extra price table, skipping");
            continue;
        };
        let body = table.get(1).map_or("", |m| m.as_str());
        let before = records.len();

        for row in ROW_RE.captures_iter(body).skip(1) {
            let row_html = row.get(1).map_or("", |m| m.as_str());
            let cells: Vec<String> = CELL_RE
                .captures_iter(row_html)
                .filter_map(|c| c.get(1).map(|m| cell_text(m.as_str())))
                .collect();
            if cells.len() < 4 {
                continue;
            }

            let station = cells[1].clone();
            let Some(price) = parse_price(&cells[2]) else {
                tracing::warn!(
                    grade,
                    station = %station,
                    price_text = %cells[2],
                    "could not extract price"
                );
                continue;
            };

            records.push(RawPriceRecord {
                grade: (*grade).to_owned(),
                station,
                price,
                freshness_label: translate_freshness(&cells[3]),
            });
        }

        tracing::debug!(grade, count = records.len() - before, "parsed price table");
    }

    records
}

#[cfg(test)]
#[path = "listing_test.rs"]
mod tests;
