use chrono::NaiveDate;
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::classify::BidClassifier;
use crate::clean::FieldCleaner;
use crate::config::Config;
use crate::diff;
use crate::error::{PipelineError, Result};
use crate::fetch::Fetcher;
use crate::filter::ExclusionFilter;
use crate::notify::Notifier;
use crate::schema;
use crate::snapshot::{self, keys, CONTENT_TYPE};
use crate::storage::ObjectStore;
use crate::types::{AuctionRecord, BadLine};
use crate::validate;

/// How far a run got. Fatal conditions abort before `Persisted`; everything
/// already rotated stays rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize)]
pub enum Stage {
    Fetched,
    Normalized,
    Validated,
    Cleaned,
    Filtered,
    Rotated,
    Diffed,
    Persisted,
}

/// Result of a complete ingestion run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub raw_key: String,
    pub run_date: NaiveDate,
    pub stage: Stage,
    pub schema: String,
    pub total_rows: usize,
    pub bad_rows: usize,
    pub cleaned: usize,
    pub excluded: usize,
    pub suspicious: usize,
    pub new_today: usize,
    pub rotated: bool,
    pub elapsed_secs: f64,
}

/// Sequences one daily run: normalize, validate, clean, filter, classify,
/// rotate, diff, persist. All collaborators come in at construction.
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
    cleaner: FieldCleaner,
    filter: ExclusionFilter,
    classifier: BidClassifier,
    fetcher: Option<Fetcher>,
    subject_prefix: String,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Result<Self> {
        let fetcher = if config.source.export_url.is_empty() {
            None
        } else {
            Some(Fetcher::new(&config.source)?)
        };
        Ok(Self {
            store,
            notifier,
            cleaner: FieldCleaner::new(config.clean.tz()?),
            filter: ExclusionFilter::new(config.filter.domain_set(), config.filter.email_set()),
            classifier: BidClassifier::new(config.suspicious.max_bid, config.suspicious.ratio),
            fetcher,
            subject_prefix: config.notify.subject_prefix.clone(),
        })
    }

    /// Downloads the raw export for `date` into the store. Fetch failures are
    /// reported through the notifier before they propagate.
    pub async fn fetch_raw(&self, date: NaiveDate) -> Result<String> {
        let fetcher = self.fetcher.as_ref().ok_or_else(|| {
            PipelineError::Config("source.export_url is not configured".to_string())
        })?;
        match fetcher.fetch(self.store.as_ref(), date).await {
            Ok(key) => Ok(key),
            Err(e) => {
                let subject = format!("{}: export fetch failed", self.subject_prefix);
                self.notifier.warn(&subject, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Fetch and process in one go.
    pub async fn fetch_and_run(&self, date: NaiveDate) -> Result<RunReport> {
        let raw_key = self.fetch_raw(date).await?;
        self.run(&raw_key, date).await
    }

    /// Processes one already-stored raw export.
    #[instrument(skip(self), fields(raw_key = %raw_key))]
    pub async fn run(&self, raw_key: &str, run_date: NaiveDate) -> Result<RunReport> {
        let started = std::time::Instant::now();
        counter!("auction_ingest_runs_total").increment(1);
        info!("Starting ingestion run for '{}'", raw_key);

        let raw = self.store.get(raw_key).await?;
        let mut report = RunReport {
            raw_key: raw_key.to_string(),
            run_date,
            stage: Stage::Fetched,
            schema: String::new(),
            total_rows: 0,
            bad_rows: 0,
            cleaned: 0,
            excluded: 0,
            suspicious: 0,
            new_today: 0,
            rotated: false,
            elapsed_secs: 0.0,
        };

        // Reconcile the raw layout before anything looks at field positions
        let (header, rows) = snapshot::read_raw_csv(&raw)?;
        let raw_schema = schema::detect(&header)?;
        report.schema = raw_schema.name.to_string();
        report.total_rows = rows.len();
        let rows = schema::normalize_rows(raw_schema, rows);
        report.stage = Stage::Normalized;
        debug!(schema = raw_schema.name, rows = report.total_rows, "Raw layout normalized");

        let validated = validate::split_bad_rows(rows);
        report.bad_rows = validated.bad.len();
        if report.bad_rows > 0 {
            counter!("auction_ingest_bad_rows_total").increment(report.bad_rows as u64);
            self.send_bad_lines_warning(raw_key, &validated.bad).await;
        }
        report.stage = Stage::Validated;

        let records: Vec<AuctionRecord> = validated
            .good
            .iter()
            .map(|row| self.cleaner.clean_row(row))
            .collect();
        report.cleaned = records.len();
        report.stage = Stage::Cleaned;
        debug!("Cleaned {} records", report.cleaned);

        let (mut records, excluded) = self.filter.retain(records);
        report.excluded = excluded;
        counter!("auction_ingest_rows_excluded_total").increment(excluded as u64);
        report.stage = Stage::Filtered;
        debug!("Filtered {} records ({} excluded)", records.len(), excluded);

        report.suspicious = self.classifier.annotate(&mut records);
        counter!("auction_ingest_suspicious_total").increment(report.suspicious as u64);

        let run_date_str = run_date.format("%Y-%m-%d").to_string();
        report.rotated = match snapshot::rotate_today(self.store.as_ref(), &run_date_str).await {
            Ok(rotated) => rotated,
            Err(PipelineError::RotationMissingSource { key }) => {
                info!("Nothing to rotate: '{}' does not exist yet", key);
                false
            }
            Err(e) => return Err(e),
        };
        report.stage = Stage::Rotated;

        let filename = raw_key.rsplit('/').next().unwrap_or(raw_key);
        let today_bytes = snapshot::to_csv(&records)?;
        let today_tags = snapshot::snapshot_tags(&run_date_str, &today_bytes, Some(filename));
        self.store
            .put(keys::TODAY, today_bytes.clone(), CONTENT_TYPE, &today_tags)
            .await?;

        let yesterday = match self.store.get(keys::YESTERDAY).await {
            Ok(bytes) => snapshot::from_csv(&bytes)?,
            // First run: nothing to compare against
            Err(PipelineError::KeyNotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        let new_today = diff::new_records(&yesterday, &records);
        report.new_today = new_today.len();
        let diff_bytes = snapshot::to_csv(&new_today)?;
        let diff_tags = snapshot::snapshot_tags(&run_date_str, &diff_bytes, Some(filename));
        self.store
            .put(keys::DIFF, diff_bytes, CONTENT_TYPE, &diff_tags)
            .await?;
        report.stage = Stage::Diffed;
        debug!("{} records new since yesterday", report.new_today);

        snapshot::append_all(self.store.as_ref(), &today_bytes, &run_date_str).await?;
        report.stage = Stage::Persisted;

        report.elapsed_secs = started.elapsed().as_secs_f64();
        histogram!("auction_ingest_run_duration_seconds").record(report.elapsed_secs);
        info!(
            "Run complete: {} cleaned, {} excluded, {} suspicious, {} new, rotated={}",
            report.cleaned, report.excluded, report.suspicious, report.new_today, report.rotated
        );
        Ok(report)
    }

    /// One aggregated warning per run, however many bad lines were found.
    async fn send_bad_lines_warning(&self, raw_key: &str, bad: &BTreeMap<usize, BadLine>) {
        let filename = raw_key.rsplit('/').next().unwrap_or(raw_key);
        let subject = format!(
            "{}: {} corrupt lines in {}",
            self.subject_prefix,
            bad.len(),
            filename
        );
        let message = bad.values().map(BadLine::summary).collect::<Vec<_>>().join("\n");
        warn!("{} bad lines found in '{}'", bad.len(), filename);
        self.notifier.warn(&subject, &message).await;
    }
}
