mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use knd_core::InspectorRef;
use knd_ingest::{Ingestor, UpdateOutcome, run_isolated, stage_upload};
use knd_registry::{BrowserRegistry, Registry, ScraperConfig};
use knd_store::{DuckStore, MemoryStore, RecordStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "knd", version, about = "Ingest ERKNM inspection records from QR photos")]
struct Cli {
    /// DuckDB database file; an in-memory store is used when omitted
    #[arg(long, env = "KND_DB", global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Reference of the inspector performing the ingestion
    #[arg(long, env = "KND_INSPECTOR", global = true)]
    inspector: Option<String>,

    /// Chrome/Chromium executable used for scraping
    #[arg(long, env = "KND_CHROME", global = true, value_name = "PATH")]
    chrome: Option<PathBuf>,

    /// Registry page load timeout
    #[arg(long, default_value_t = 30, global = true)]
    nav_timeout_secs: u64,

    /// Time allowed for each field to appear on the page
    #[arg(long, default_value_t = 3, global = true)]
    field_timeout_secs: u64,

    /// Directory uploads are copied to before decoding (default: system temp dir)
    #[arg(long, env = "KND_STAGING", global = true, value_name = "DIR")]
    staging_dir: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a QR photo, scrape the linked registry page and record the inspection
    Ingest { image: PathBuf },
    /// Re-scrape a stored inspection and record a status change
    Refresh { id: i64 },
    /// Decode a QR photo and print its payload
    Decode { image: PathBuf },
    /// Scrape a registry page and print the raw fields
    Scrape { url: String },
    /// List stored inspections
    List,
    /// Show one stored inspection
    Show { id: i64 },
}

impl Cli {
    fn scraper_config(&self) -> ScraperConfig {
        ScraperConfig {
            nav_timeout: Duration::from_secs(self.nav_timeout_secs),
            field_timeout: Duration::from_secs(self.field_timeout_secs),
            chrome_executable: self.chrome.clone(),
            ..ScraperConfig::default()
        }
    }

    fn inspector(&self) -> Option<InspectorRef> {
        self.inspector.as_deref().map(InspectorRef::new)
    }

    fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

type Pipeline = Ingestor<Arc<dyn RecordStore>, BrowserRegistry>;

fn open_store(db: Option<&Path>) -> anyhow::Result<Arc<dyn RecordStore>> {
    match db {
        Some(path) => {
            let store = DuckStore::open_persistent(path)
                .with_context(|| format!("opening database {}", path.display()))?;
            info!(path = %path.display(), "database opened");
            Ok(Arc::new(store))
        }
        None => {
            warn!("no database configured, records will not outlive this run");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    info!("knd v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    match &cli.command {
        Command::Ingest { image } => cmd_ingest(&cli, image).await,
        Command::Refresh { id } => cmd_refresh(&cli, *id).await,
        Command::Decode { image } => cmd_decode(&cli, image).await,
        Command::Scrape { url } => cmd_scrape(&cli, url).await,
        Command::List => cmd_list(&cli).await,
        Command::Show { id } => cmd_show(&cli, *id).await,
    }
}

fn pipeline(cli: &Cli) -> anyhow::Result<Arc<Pipeline>> {
    let store = open_store(cli.db.as_deref())?;
    let registry = BrowserRegistry::new(cli.scraper_config());
    Ok(Arc::new(Ingestor::new(store, registry)))
}

/// Open the pipeline, then stage the upload; nothing is staged if the store
/// cannot be opened.
fn prepare_ingest(cli: &Cli, image: &Path) -> anyhow::Result<(Arc<Pipeline>, PathBuf)> {
    let ingestor = pipeline(cli)?;
    let staged = stage_upload(image, &cli.staging_dir())
        .with_context(|| format!("staging {}", image.display()))?;
    Ok((ingestor, staged))
}

async fn cmd_ingest(cli: &Cli, image: &Path) -> anyhow::Result<()> {
    let (ingestor, staged) = prepare_ingest(cli, image)?;
    let inspector = cli.inspector();

    let record = run_isolated(async move { ingestor.ingest_image(&staged, inspector.as_ref()).await })
        .await
        .map_err(|e| anyhow::anyhow!("ingestion failed ({}): {e}", e.status_code()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", display::render_card(&record));
    }
    Ok(())
}

async fn cmd_refresh(cli: &Cli, id: i64) -> anyhow::Result<()> {
    let ingestor = pipeline(cli)?;
    let inspector = cli.inspector();

    let outcome = run_isolated(async move { ingestor.update(id, inspector.as_ref()).await })
        .await
        .map_err(|e| anyhow::anyhow!("refresh failed ({}): {e}", e.status_code()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(outcome.record())?);
        return Ok(());
    }
    match &outcome {
        UpdateOutcome::Unchanged(_) => println!("No changes detected."),
        UpdateOutcome::Updated { previous, record } => println!(
            "Status changed: {} -> {}",
            previous.as_ref().map_or("-", |s| s.as_str()),
            record.status.as_ref().map_or("-", |s| s.as_str()),
        ),
    }
    println!();
    print!("{}", display::render_card(outcome.record()));
    Ok(())
}

async fn cmd_decode(cli: &Cli, image: &Path) -> anyhow::Result<()> {
    let staged = stage_upload(image, &cli.staging_dir())
        .with_context(|| format!("staging {}", image.display()))?;
    let payload = tokio::task::spawn_blocking(move || knd_qr::extract(&staged))
        .await
        .context("QR decode task failed")?
        .with_context(|| format!("decoding {}", image.display()))?;

    if cli.json {
        println!("{}", serde_json::json!({ "payload": payload }));
    } else {
        println!("{payload}");
    }
    Ok(())
}

async fn cmd_scrape(cli: &Cli, url: &str) -> anyhow::Result<()> {
    let registry = BrowserRegistry::new(cli.scraper_config());
    let fields = registry
        .fetch(url)
        .await
        .with_context(|| format!("scraping {url}"))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
    } else {
        print!("{}", display::render_fields(&fields));
    }
    Ok(())
}

async fn cmd_list(cli: &Cli) -> anyhow::Result<()> {
    let store = open_store(cli.db.as_deref())?;
    let records = store.list().await.context("listing records")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print!("{}", display::render_table(&records));
        println!("{} record(s)", records.len());
    }
    Ok(())
}

async fn cmd_show(cli: &Cli, id: i64) -> anyhow::Result<()> {
    let store = open_store(cli.db.as_deref())?;
    let record = store
        .get(id)
        .await
        .context("reading record")?
        .ok_or_else(|| anyhow::anyhow!("inspection record {id} not found"))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", display::render_card(&record));
    }
    Ok(())
}
