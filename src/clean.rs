use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::schema::COLUMNS;
use crate::types::{AuctionRecord, RawRow};

/// Wall-clock format the raw export writes timestamps in.
const RAW_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// UTC format every snapshot carries.
const UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Per-column cleaning function. Every variant is total: dirty content passes
/// through rather than failing the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Trim,
    TrimLower,
    TrimTitle,
    Decimal,
    DatetimeToUtc,
    QuotedField,
}

/// Applies the canonical transform table to structurally valid rows.
pub struct FieldCleaner {
    tz: Tz,
}

impl FieldCleaner {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Cleans one row into a canonical record. The transform table covers the
    /// first 25 columns; the trailing raw error column falls away here.
    pub fn clean_row(&self, row: &RawRow) -> AuctionRecord {
        let fields = COLUMNS
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                self.apply(column.transform, row.get(idx).map(String::as_str).unwrap_or(""))
            })
            .collect();
        AuctionRecord::new(fields)
    }

    pub fn apply(&self, transform: Transform, val: &str) -> String {
        match transform {
            Transform::Trim => val.trim().to_string(),
            Transform::TrimLower => val.trim().to_lowercase(),
            Transform::TrimTitle => title_case(val),
            Transform::Decimal => normalize_decimal(val),
            Transform::DatetimeToUtc => self.datetime_to_utc(val),
            Transform::QuotedField => strip_quote_artifacts(val),
        }
    }

    /// Parses a wall-clock timestamp in the configured zone and renders it in
    /// UTC. Empty stays empty; anything unparseable passes through trimmed.
    fn datetime_to_utc(&self, val: &str) -> String {
        let val = val.trim();
        if val.is_empty() {
            return String::new();
        }
        let Ok(naive) = NaiveDateTime::parse_from_str(val, RAW_DATETIME_FORMAT) else {
            return val.to_string();
        };
        match self.tz.from_local_datetime(&naive).earliest() {
            Some(local) => local.with_timezone(&Utc).format(UTC_FORMAT).to_string(),
            // Wall-clock time skipped by a DST transition
            None => val.to_string(),
        }
    }
}

/// Replaces a comma decimal separator, parses, and renders with two-digit
/// scale. Empty means zero, never an error.
fn normalize_decimal(val: &str) -> String {
    let val = val.trim();
    if val.is_empty() {
        return "0.00".to_string();
    }
    match Decimal::from_str(&val.replace(',', ".")) {
        Ok(d) => format!("{:.2}", d.round_dp(2)),
        Err(_) => val.to_string(),
    }
}

/// Removes the `"=` artifacts spreadsheet exports wrap identifier columns in.
fn strip_quote_artifacts(val: &str) -> String {
    val.trim().trim_matches(|c| c == '"' || c == '=').to_string()
}

fn title_case(val: &str) -> String {
    val.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
