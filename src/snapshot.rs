use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::schema::{self, CLEANED_ARITY};
use crate::storage::{ObjectStore, Tags};
use crate::types::{AuctionRecord, RawRow};

/// Well-known snapshot keys. At most one object exists per logical name;
/// rotation is the only operation that moves content between them.
pub mod keys {
    pub const TODAY: &str = "clean_csv/latest.csv";
    pub const YESTERDAY: &str = "clean_csv/yesterday.csv";
    pub const DIFF: &str = "clean_csv/diff.csv";
    pub const ALL: &str = "clean_csv/all.csv";
}

pub const CONTENT_TYPE: &str = "text/csv";

/// Tag marking which run wrote an object; rotation uses it to stay idempotent.
pub const TAG_RUN_DATE: &str = "run-date";
pub const TAG_SHA256: &str = "sha256";
pub const TAG_RAW_OBJECT: &str = "raw-object";

/// Hex digest of a snapshot body, stored alongside the run date.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn snapshot_tags(run_date: &str, bytes: &[u8], raw_object: Option<&str>) -> Tags {
    let mut tags = Tags::new();
    tags.insert(TAG_RUN_DATE.to_string(), run_date.to_string());
    tags.insert(TAG_SHA256.to_string(), content_digest(bytes));
    if let Some(raw) = raw_object {
        tags.insert(TAG_RAW_OBJECT.to_string(), raw.to_string());
    }
    tags
}

/// Reads a raw export: semicolon-delimited, quoted fields, header first.
/// Rows keep whatever arity they came with; the structural check runs later.
pub fn read_raw_csv(bytes: &[u8]) -> Result<(RawRow, Vec<RawRow>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = rdr.records();
    let header: RawRow = match records.next() {
        Some(rec) => rec?.iter().map(str::to_string).collect(),
        None => {
            return Err(PipelineError::UnrecognizedSchema {
                arity: 0,
                detail: "empty export".to_string(),
            })
        }
    };

    let mut rows = Vec::new();
    for rec in records {
        rows.push(rec?.iter().map(str::to_string).collect());
    }
    Ok((header, rows))
}

/// Serializes records to snapshot form: comma-delimited, every field quoted,
/// header row of clean names with the derived flag last.
pub fn to_csv(records: &[AuctionRecord]) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    wtr.write_record(schema::CLEAN_HEADER.iter())?;
    for record in records {
        wtr.write_record(record.output_row())?;
    }
    wtr.flush()?;
    wtr.into_inner()
        .map_err(|e| PipelineError::Storage(format!("snapshot encoding: {e}")))
}

/// Reads a snapshot back into records, tolerating rows written before the
/// derived flag existed.
pub fn from_csv(bytes: &[u8]) -> Result<Vec<AuctionRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let mut records = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let mut fields: Vec<String> = rec.iter().map(str::to_string).collect();
        let mut suspicious = false;
        if fields.len() > CLEANED_ARITY {
            suspicious = fields.pop().map(|v| v == "true").unwrap_or(false);
            fields.truncate(CLEANED_ARITY);
        }
        let mut record = AuctionRecord::new(fields);
        record.set_suspicious(suspicious);
        records.push(record);
    }
    Ok(records)
}

/// Moves `today` to `yesterday` by copy-then-delete (the store has no rename).
/// Returns `true` when a rotation happened, `false` when `today` was already
/// written by this run's date and rotating again would shift `yesterday` onto
/// content it should not hold.
pub async fn rotate_today(store: &dyn ObjectStore, run_date: &str) -> Result<bool> {
    let tags = match store.tags(keys::TODAY).await {
        Ok(tags) => tags,
        Err(PipelineError::KeyNotFound(_)) => {
            return Err(PipelineError::RotationMissingSource {
                key: keys::TODAY.to_string(),
            })
        }
        Err(e) => return Err(e),
    };

    if tags.get(TAG_RUN_DATE).map(String::as_str) == Some(run_date) {
        info!(
            "'{}' already carries run-date {}; skipping rotation",
            keys::TODAY, run_date
        );
        return Ok(false);
    }

    match store.copy(keys::TODAY, keys::YESTERDAY).await {
        Ok(()) => {}
        Err(PipelineError::KeyNotFound(_)) => {
            return Err(PipelineError::RotationMissingSource {
                key: keys::TODAY.to_string(),
            })
        }
        Err(e) => return Err(e),
    }
    store.delete(keys::TODAY).await?;
    debug!("Rotated '{}' to '{}'", keys::TODAY, keys::YESTERDAY);
    Ok(true)
}

/// Appends today's rows to the monotonically growing `all` snapshot. The
/// header is written once, on first creation; duplicates across runs are by
/// design.
pub async fn append_all(store: &dyn ObjectStore, today_bytes: &[u8], run_date: &str) -> Result<()> {
    let merged = match store.get(keys::ALL).await {
        Ok(mut existing) => {
            existing.extend_from_slice(strip_header(today_bytes));
            existing
        }
        Err(PipelineError::KeyNotFound(_)) => today_bytes.to_vec(),
        Err(e) => return Err(e),
    };
    let tags = snapshot_tags(run_date, &merged, None);
    store.put(keys::ALL, merged, CONTENT_TYPE, &tags).await
}

fn strip_header(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == b'\n') {
        Some(pos) => &bytes[pos + 1..],
        None => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::col;
    use crate::storage::InMemoryStore;

    fn record(auc_id: &str) -> AuctionRecord {
        let mut fields = vec![String::new(); CLEANED_ARITY];
        fields[col::AUC_ID] = auc_id.to_string();
        fields[col::CUST_EMAIL] = format!("bidder{auc_id}@other.com");
        AuctionRecord::new(fields)
    }

    #[test]
    fn raw_reader_keeps_header_and_uneven_rows() {
        let raw = b"a;b;c\n\"1\";\"2\";\"3\"\n\"1\";\"2\"\n";
        let (header, rows) = read_raw_csv(raw).unwrap();
        assert_eq!(header, vec!["a", "b", "c"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[1].len(), 2);
    }

    #[test]
    fn empty_export_is_rejected() {
        assert!(matches!(
            read_raw_csv(b""),
            Err(PipelineError::UnrecognizedSchema { arity: 0, .. })
        ));
    }

    #[test]
    fn snapshot_round_trip_preserves_records_and_flag() {
        let mut records = vec![record("1"), record("2")];
        records[1].set_suspicious(true);

        let bytes = to_csv(&records).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("\"ogm\""));
        assert!(header.ends_with("\"bid_is_suspicious\""));

        let decoded = from_csv(&bytes).unwrap();
        assert_eq!(decoded, records);
    }

    #[tokio::test]
    async fn rotation_moves_today_to_yesterday() {
        let store = InMemoryStore::new();
        let bytes = to_csv(&[record("1")]).unwrap();
        let tags = snapshot_tags("2017-01-11", &bytes, None);
        store.put(keys::TODAY, bytes.clone(), CONTENT_TYPE, &tags).await.unwrap();

        let rotated = rotate_today(&store, "2017-01-12").await.unwrap();
        assert!(rotated);
        assert_eq!(store.get(keys::YESTERDAY).await.unwrap(), bytes);
        assert!(matches!(
            store.get(keys::TODAY).await,
            Err(PipelineError::KeyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn rotation_without_source_reports_missing() {
        let store = InMemoryStore::new();
        assert!(matches!(
            rotate_today(&store, "2017-01-12").await,
            Err(PipelineError::RotationMissingSource { .. })
        ));
    }

    #[tokio::test]
    async fn rotation_skips_when_today_was_written_by_this_run() {
        let store = InMemoryStore::new();
        let old = to_csv(&[record("1")]).unwrap();
        let old_tags = snapshot_tags("2017-01-11", &old, None);
        store.put(keys::YESTERDAY, old.clone(), CONTENT_TYPE, &old_tags).await.unwrap();

        let new = to_csv(&[record("2")]).unwrap();
        let new_tags = snapshot_tags("2017-01-12", &new, None);
        store.put(keys::TODAY, new.clone(), CONTENT_TYPE, &new_tags).await.unwrap();

        // A retry of the 2017-01-12 run must not rotate again
        let rotated = rotate_today(&store, "2017-01-12").await.unwrap();
        assert!(!rotated);
        assert_eq!(store.get(keys::YESTERDAY).await.unwrap(), old);
        assert_eq!(store.get(keys::TODAY).await.unwrap(), new);
    }

    #[tokio::test]
    async fn all_snapshot_accumulates_runs() {
        let store = InMemoryStore::new();
        let first = to_csv(&[record("1")]).unwrap();
        let second = to_csv(&[record("2"), record("3")]).unwrap();

        append_all(&store, &first, "2017-01-11").await.unwrap();
        append_all(&store, &second, "2017-01-12").await.unwrap();

        let all = from_csv(&store.get(keys::ALL).await.unwrap()).unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.auction_id()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);

        let text = String::from_utf8(store.get(keys::ALL).await.unwrap()).unwrap();
        assert_eq!(text.matches("bid_is_suspicious").count(), 1);
    }

    #[test]
    fn digest_is_stable_hex() {
        let d = content_digest(b"abc");
        assert_eq!(d.len(), 64);
        assert_eq!(d, content_digest(b"abc"));
        assert_ne!(d, content_digest(b"abd"));
    }
}
