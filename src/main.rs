use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

use auction_ingest::config::Config;
use auction_ingest::fetch::Fetcher;
use auction_ingest::logging;
use auction_ingest::notify::{LogNotifier, Notifier, WebhookNotifier};
use auction_ingest::pipeline::{Pipeline, RunReport};
use auction_ingest::storage::{FsStore, ObjectStore};

#[derive(Parser)]
#[command(name = "auction_ingest")]
#[command(about = "Daily auction CSV ingestion and snapshot pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the raw export for a date and store it
    Fetch {
        /// Export date (yyyy-mm-dd), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Clean, filter, rotate and diff an already-stored raw export
    Process {
        /// Export date (yyyy-mm-dd), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Raw object key; derived from the date when omitted
        #[arg(long)]
        key: Option<String>,
    },
    /// Fetch and process in one go
    Run {
        /// Export date (yyyy-mm-dd), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn print_report(report: &RunReport) {
    println!("\n📊 Run results for {}:", report.raw_key);
    println!("   Schema: {}", report.schema);
    println!("   Total rows: {}", report.total_rows);
    println!("   Bad rows: {}", report.bad_rows);
    println!("   Cleaned: {}", report.cleaned);
    println!("   Excluded: {}", report.excluded);
    println!("   Suspicious: {}", report.suspicious);
    println!("   New since yesterday: {}", report.new_today);
    println!("   Rotated: {}", report.rotated);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    let store: Arc<dyn ObjectStore> = Arc::new(FsStore::new(config.store.root.clone()));
    let notifier: Arc<dyn Notifier> = match &config.notify.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone(), config.source.timeout_seconds)),
        None => Arc::new(LogNotifier),
    };
    let pipeline = Pipeline::new(store, notifier, &config)?;

    let today = || chrono::Local::now().date_naive();

    match cli.command {
        Commands::Fetch { date } => {
            let date = date.unwrap_or_else(today);
            println!("📡 Fetching raw export for {date}...");
            match pipeline.fetch_raw(date).await {
                Ok(key) => println!("✅ Stored raw export at '{key}'"),
                Err(e) => {
                    error!("Fetch failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Process { date, key } => {
            let date = date.unwrap_or_else(today);
            let key = key.unwrap_or_else(|| Fetcher::raw_key(date));
            println!("🔧 Processing '{key}'...");
            match pipeline.run(&key, date).await {
                Ok(report) => print_report(&report),
                Err(e) => {
                    error!("Run failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Run { date } => {
            let date = date.unwrap_or_else(today);
            println!("🚀 Running full pipeline for {date}...");
            match pipeline.fetch_and_run(date).await {
                Ok(report) => print_report(&report),
                Err(e) => {
                    error!("Run failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }
    Ok(())
}
