use once_cell::sync::Lazy;

use crate::clean::Transform;
use crate::error::{PipelineError, Result};
use crate::types::RawRow;

/// Field count of a cleaned record.
pub const CLEANED_ARITY: usize = 25;
/// Field count of a current-layout raw row (cleaned columns + trailing error column).
pub const RAW_ARITY: usize = 26;

/// Derived column appended as the last field of every serialized record.
pub const SUSPICIOUS_COLUMN: &str = "bid_is_suspicious";

/// Trailing raw column carrying upstream CRM sync errors; dropped on cleaning.
pub const RAW_ERROR_COLUMN: &str = "Clang Error";

/// Column positions in a cleaned record.
pub mod col {
    pub const OGM: usize = 0;
    pub const PA_TITLE: usize = 1;
    pub const AUC_TITLE: usize = 2;
    pub const AUC_ID: usize = 3;
    pub const AUC_LINK: usize = 4;
    pub const HIGH_BID: usize = 5;
    pub const ADMIN_COST: usize = 6;
    pub const GARANT_PRICE: usize = 7;
    pub const DATE_HIGH_BID: usize = 8;
    pub const PAY_DATE: usize = 9;
    pub const ANNUL_INS: usize = 10;
    pub const FULL_OPTION: usize = 11;
    pub const ANNUL_DATE: usize = 12;
    pub const COLLECT_DATE: usize = 13;
    pub const EXTRA_INFO: usize = 14;
    pub const CLANG_ID: usize = 15;
    pub const CUST_FNAME: usize = 16;
    pub const CUST_LNAME: usize = 17;
    pub const CUST_EMAIL: usize = 18;
    pub const CUST_STREET: usize = 19;
    pub const CUST_HOUSENR: usize = 20;
    pub const CUST_HNR_SUFF: usize = 21;
    pub const CUST_POST_CODE: usize = 22;
    pub const CUST_TOWN: usize = 23;
    pub const CUST_PHONE: usize = 24;
}

/// One cleaned column: the raw export header it comes from, the name it is
/// serialized under, how it is cleaned, and whether it participates in the
/// day-over-day diff key.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub raw_name: &'static str,
    pub clean_name: &'static str,
    pub transform: Transform,
    pub relevant: bool,
}

const fn column(
    raw_name: &'static str,
    clean_name: &'static str,
    transform: Transform,
    relevant: bool,
) -> ColumnSpec {
    ColumnSpec { raw_name, clean_name, transform, relevant }
}

/// Canonical column catalog, in serialization order. The trailing raw error
/// column and the derived suspicious flag are intentionally absent: neither
/// has a cleaning transform.
pub static COLUMNS: [ColumnSpec; CLEANED_ARITY] = [
    column("OGM", "ogm", Transform::QuotedField, false),
    column("Partner", "pa_title", Transform::Trim, false),
    column("Titel Veiling", "auc_title", Transform::Trim, false),
    column("Veiling ID", "auc_id", Transform::QuotedField, true),
    column("Link Veiling", "auc_link", Transform::Trim, false),
    column("Hoogste Bod", "high_bid", Transform::Decimal, false),
    column("Administratiekosten", "admin_cost", Transform::Decimal, false),
    column("Gegarandeerde Prijs", "garant_price", Transform::Decimal, false),
    column("Datum Hoogste Bod", "date_high_bid", Transform::DatetimeToUtc, false),
    column("Betaaldatum", "pay_date", Transform::DatetimeToUtc, true),
    column("Annulatieverzekering", "annul_ins", Transform::Decimal, false),
    column("Full Option", "full_option", Transform::Decimal, false),
    column("Annulatiedatum", "annul_date", Transform::DatetimeToUtc, true),
    column("Afhaaldatum", "collect_date", Transform::DatetimeToUtc, true),
    column("Extra Info", "extra_info", Transform::Trim, false),
    column("Clang ID", "clang_id", Transform::Trim, false),
    column("Klant Voornaam", "cust_fname", Transform::TrimTitle, false),
    column("Klant Naam", "cust_lname", Transform::TrimTitle, false),
    column("Klant E-mail", "cust_email", Transform::TrimLower, false),
    column("Klant Straat", "cust_street", Transform::TrimTitle, false),
    column("Klant Huisnummer", "cust_housenr", Transform::Trim, false),
    column("Klant Toevoeging", "cust_hnr_suff", Transform::Trim, false),
    column("Klant Postcode", "cust_post_code", Transform::Trim, false),
    column("Klant Gemeente", "cust_town", Transform::TrimTitle, false),
    column("Klant Telefoon", "cust_phone", Transform::Trim, false),
];

/// Header row of every snapshot: clean names plus the derived flag.
pub static CLEAN_HEADER: Lazy<Vec<&'static str>> = Lazy::new(|| {
    COLUMNS
        .iter()
        .map(|c| c.clean_name)
        .chain(std::iter::once(SUSPICIOUS_COLUMN))
        .collect()
});

/// Header row of a current-layout raw export.
pub static RAW_HEADER_CURRENT: Lazy<Vec<&'static str>> = Lazy::new(|| {
    COLUMNS
        .iter()
        .map(|c| c.raw_name)
        .chain(std::iter::once(RAW_ERROR_COLUMN))
        .collect()
});

/// Cleaned-column indices that make up the diff key.
pub static PROJECTION: Lazy<Vec<usize>> = Lazy::new(|| {
    COLUMNS
        .iter()
        .enumerate()
        .filter(|(_, c)| c.relevant)
        .map(|(idx, _)| idx)
        .collect()
});

/// How a recognized raw layout is rewritten to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeRule {
    PassThrough,
    /// The layout predates one column; an empty field is inserted at this
    /// position so every downstream index lines up.
    InsertEmptyAt(usize),
}

/// Signature of a recognized raw export layout.
#[derive(Debug, Clone, Copy)]
pub struct RawSchema {
    pub name: &'static str,
    pub arity: usize,
    /// Header names that must be present.
    pub markers: &'static [&'static str],
    /// Header names that must be absent.
    pub absent: &'static [&'static str],
    pub rule: NormalizeRule,
}

impl RawSchema {
    fn matches(&self, header: &[String]) -> bool {
        header.len() == self.arity
            && self.markers.iter().all(|m| header.iter().any(|h| h.trim() == *m))
            && self.absent.iter().all(|m| header.iter().all(|h| h.trim() != *m))
    }

    /// Rewrites one raw row to the current layout.
    pub fn normalize_row(&self, mut row: RawRow) -> RawRow {
        match self.rule {
            NormalizeRule::PassThrough => row,
            NormalizeRule::InsertEmptyAt(idx) => {
                let at = idx.min(row.len());
                row.insert(at, String::new());
                row
            }
        }
    }
}

/// Recognized layouts, newest first. Adding a layout means adding an entry
/// here, not branching in the reader.
pub static SCHEMAS: [RawSchema; 2] = [
    RawSchema {
        name: "v2-toevoeging",
        arity: RAW_ARITY,
        markers: &["Klant Toevoeging"],
        absent: &[],
        rule: NormalizeRule::PassThrough,
    },
    RawSchema {
        name: "v1-legacy",
        arity: RAW_ARITY - 1,
        markers: &["Klant E-mail", "Betaaldatum"],
        absent: &["Klant Toevoeging"],
        rule: NormalizeRule::InsertEmptyAt(col::CUST_HNR_SUFF),
    },
];

/// Picks the first layout whose signature matches the raw header. No match is
/// fatal for the run: there is no safe default column order.
pub fn detect(header: &[String]) -> Result<&'static RawSchema> {
    SCHEMAS
        .iter()
        .find(|s| s.matches(header))
        .ok_or_else(|| PipelineError::UnrecognizedSchema {
            arity: header.len(),
            detail: header.iter().take(6).cloned().collect::<Vec<_>>().join(";"),
        })
}

/// Rewrites all rows of a recognized layout to the current one.
pub fn normalize_rows(schema: &RawSchema, rows: Vec<RawRow>) -> Vec<RawRow> {
    match schema.rule {
        NormalizeRule::PassThrough => rows,
        _ => rows.into_iter().map(|r| schema.normalize_row(r)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_header() -> Vec<String> {
        RAW_HEADER_CURRENT.iter().map(|s| s.to_string()).collect()
    }

    fn legacy_header() -> Vec<String> {
        RAW_HEADER_CURRENT
            .iter()
            .filter(|h| **h != "Klant Toevoeging")
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn catalog_is_consistent() {
        assert_eq!(COLUMNS.len(), CLEANED_ARITY);
        assert_eq!(CLEAN_HEADER.len(), CLEANED_ARITY + 1);
        assert_eq!(CLEAN_HEADER.last(), Some(&SUSPICIOUS_COLUMN));
        assert_eq!(COLUMNS[col::AUC_ID].clean_name, "auc_id");
        assert_eq!(COLUMNS[col::CUST_EMAIL].clean_name, "cust_email");
        assert_eq!(*PROJECTION, vec![col::AUC_ID, col::PAY_DATE, col::ANNUL_DATE, col::COLLECT_DATE]);
    }

    #[test]
    fn detects_current_layout() {
        let schema = detect(&current_header()).unwrap();
        assert_eq!(schema.name, "v2-toevoeging");
        assert_eq!(schema.rule, NormalizeRule::PassThrough);
    }

    #[test]
    fn detects_legacy_layout_and_widens_rows() {
        let schema = detect(&legacy_header()).unwrap();
        assert_eq!(schema.name, "v1-legacy");

        let row: RawRow = (0..RAW_ARITY - 1).map(|i| format!("f{i}")).collect();
        let widened = schema.normalize_row(row);
        assert_eq!(widened.len(), RAW_ARITY);
        assert_eq!(widened[col::CUST_HNR_SUFF], "");
        // Neighbours keep their values
        assert_eq!(widened[col::CUST_HOUSENR], format!("f{}", col::CUST_HOUSENR));
        assert_eq!(widened[col::CUST_POST_CODE], format!("f{}", col::CUST_HNR_SUFF));
    }

    #[test]
    fn widening_clamps_short_rows() {
        let schema = detect(&legacy_header()).unwrap();
        let widened = schema.normalize_row(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(widened, vec!["a".to_string(), "b".to_string(), String::new()]);
    }

    #[test]
    fn unknown_header_is_fatal() {
        let header: Vec<String> = vec!["id".into(), "amount".into(), "email".into()];
        match detect(&header) {
            Err(PipelineError::UnrecognizedSchema { arity, .. }) => assert_eq!(arity, 3),
            other => panic!("expected UnrecognizedSchema, got {other:?}"),
        }
    }
}
