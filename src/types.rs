use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::schema::{col, CLEANED_ARITY};

/// One raw CSV row, straight out of the reader.
pub type RawRow = Vec<String>;

/// A cleaned auction record: the canonical 25 fields in serialization order,
/// plus the derived suspicious-bid annotation. Immutable after cleaning apart
/// from that annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRecord {
    fields: Vec<String>,
    suspicious: bool,
}

impl AuctionRecord {
    /// Wraps cleaned fields, padding or truncating to the canonical arity.
    pub fn new(mut fields: Vec<String>) -> Self {
        fields.resize(CLEANED_ARITY, String::new());
        Self { fields, suspicious: false }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field(&self, idx: usize) -> &str {
        self.fields.get(idx).map(String::as_str).unwrap_or("")
    }

    pub fn auction_id(&self) -> &str {
        self.field(col::AUC_ID)
    }

    pub fn email(&self) -> &str {
        self.field(col::CUST_EMAIL)
    }

    pub fn high_bid(&self) -> Decimal {
        parse_decimal(self.field(col::HIGH_BID))
    }

    pub fn admin_cost(&self) -> Decimal {
        parse_decimal(self.field(col::ADMIN_COST))
    }

    pub fn is_paid(&self) -> bool {
        !self.field(col::PAY_DATE).is_empty()
    }

    pub fn is_cancelled(&self) -> bool {
        !self.field(col::ANNUL_DATE).is_empty()
    }

    pub fn suspicious(&self) -> bool {
        self.suspicious
    }

    pub fn set_suspicious(&mut self, flag: bool) {
        self.suspicious = flag;
    }

    /// Fields as written to a snapshot: the cleaned columns with the derived
    /// flag appended last.
    pub fn output_row(&self) -> Vec<String> {
        let mut row = self.fields.clone();
        row.push(self.suspicious.to_string());
        row
    }
}

/// Monetary accessor used by the classifier; dirty content that survived the
/// permissive cleaner reads as zero rather than failing the run.
fn parse_decimal(val: &str) -> Decimal {
    Decimal::from_str(val).unwrap_or(Decimal::ZERO)
}

/// A raw row rejected on structural grounds, keyed by its 0-based position in
/// the export. Never enters a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct BadLine {
    pub index: usize,
    pub fields: RawRow,
}

impl BadLine {
    /// One line of the aggregated operational warning.
    pub fn summary(&self) -> String {
        format!("{}:{}", self.index, self.fields.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(idx: usize, val: &str) -> AuctionRecord {
        let mut fields = vec![String::new(); CLEANED_ARITY];
        fields[idx] = val.to_string();
        AuctionRecord::new(fields)
    }

    #[test]
    fn pads_to_canonical_arity() {
        let record = AuctionRecord::new(vec!["x".to_string()]);
        assert_eq!(record.fields().len(), CLEANED_ARITY);
        assert_eq!(record.field(0), "x");
        assert_eq!(record.field(CLEANED_ARITY - 1), "");
    }

    #[test]
    fn typed_accessors_read_canonical_fields() {
        let record = record_with(col::HIGH_BID, "12.50");
        assert_eq!(record.high_bid(), Decimal::new(1250, 2));
        assert_eq!(record.admin_cost(), Decimal::ZERO);
        assert!(!record.is_paid());

        let paid = record_with(col::PAY_DATE, "2017-01-12T16:23:29Z");
        assert!(paid.is_paid());
        assert!(!paid.is_cancelled());
    }

    #[test]
    fn dirty_money_reads_as_zero() {
        let record = record_with(col::HIGH_BID, "n/a");
        assert_eq!(record.high_bid(), Decimal::ZERO);
    }

    #[test]
    fn output_row_appends_flag() {
        let mut record = record_with(col::AUC_ID, "41");
        record.set_suspicious(true);
        let row = record.output_row();
        assert_eq!(row.len(), CLEANED_ARITY + 1);
        assert_eq!(row.last().map(String::as_str), Some("true"));
    }

    #[test]
    fn bad_line_summary_keeps_index() {
        let bad = BadLine { index: 7, fields: vec!["a".into(), "b".into()] };
        assert_eq!(bad.summary(), "7:a,b");
    }
}
