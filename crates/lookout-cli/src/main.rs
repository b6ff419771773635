use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lookout_client::{ReqwestFetcher, SelectorExtractor};
use lookout_core::registry::{AddOutcome, Registry, SharedRegistry};
use lookout_core::{Engine, EngineConfig, Outcome, PageArchive, Scheduler, SnapshotCollection, store};

#[derive(Parser)]
#[command(name = "lookout", version, about = "Track CSS selectors on web pages over time")]
struct Cli {
    /// JSON file holding tracked URLs and their selectors
    #[arg(long, global = true, env = "LOOKOUT_REGISTRY", default_value = "tracked.json")]
    registry: PathBuf,

    /// JSON file holding collected snapshots
    #[arg(long, global = true, env = "LOOKOUT_SNAPSHOTS", default_value = "snapshots.json")]
    snapshots: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a CSS selector on a URL
    Add {
        #[arg(short, long)]
        url: String,

        #[arg(short, long)]
        selector: String,
    },

    /// Stop tracking a URL, or only one of its selectors
    Remove {
        #[arg(short, long)]
        url: String,

        /// Selector to remove; removes the whole URL when omitted
        #[arg(short, long)]
        selector: Option<String>,
    },

    /// List tracked URLs and selectors
    List,

    /// Fetch every tracked URL once and append the snapshot
    Run {
        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Fetch every tracked URL periodically until Ctrl-C
    Watch {
        /// Seconds between the end of one run and the start of the next
        #[arg(short, long, default_value_t = 300)]
        interval: u64,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Export collected snapshots as CSV
    Export {
        /// Destination CSV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show every collected outcome for one URL
    History {
        #[arg(short, long)]
        url: String,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// Per-URL fetch timeout in seconds
    #[arg(short, long, env = "LOOKOUT_TIMEOUT", default_value_t = 10)]
    timeout: u64,

    /// Save every fetched page into this directory
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Also export all snapshots to this CSV file after each run
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("lookout=info".parse()?)
                .add_directive("lookout_core=info".parse()?)
                .add_directive("lookout_client=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Add { url, selector } => cmd_add(&cli.registry, &url, &selector)?,
        Commands::Remove { url, selector } => {
            cmd_remove(&cli.registry, &url, selector.as_deref())?
        }
        Commands::List => cmd_list(&cli.registry)?,
        Commands::Run { fetch } => cmd_run(&cli.registry, &cli.snapshots, &fetch).await?,
        Commands::Watch { interval, fetch } => {
            cmd_watch(&cli.registry, &cli.snapshots, interval, &fetch).await?
        }
        Commands::Export { output } => cmd_export(&cli.snapshots, &output)?,
        Commands::History { url } => cmd_history(&cli.snapshots, &url)?,
    }

    Ok(())
}

/// Load the registry file, or start empty if it does not exist yet.
fn load_registry(path: &Path) -> Result<Registry> {
    if !path.exists() {
        return Ok(Registry::new());
    }
    store::load_registry(path)
        .with_context(|| format!("Failed to load tracked URLs from {}", path.display()))
}

/// Load the snapshot file, or start empty if it does not exist yet.
fn load_snapshots(path: &Path) -> Result<SnapshotCollection> {
    if !path.exists() {
        return Ok(SnapshotCollection::new());
    }
    store::load(path).with_context(|| format!("Failed to load snapshots from {}", path.display()))
}

fn cmd_add(registry_path: &Path, url: &str, selector: &str) -> Result<()> {
    let (url, selector) = (url.trim(), selector.trim());
    if url.is_empty() || selector.is_empty() {
        bail!("Both --url and --selector must be non-empty");
    }

    let mut registry = load_registry(registry_path)?;
    match registry.add(url, selector) {
        AddOutcome::NewSource => tracing::info!(%url, %selector, "Tracking new URL"),
        AddOutcome::NewRule => tracing::info!(%url, %selector, "Added selector to tracked URL"),
        AddOutcome::Duplicate => {
            tracing::warn!(%url, %selector, "Selector is already tracked for this URL");
            return Ok(());
        }
    }

    store::save_registry(&registry, registry_path)?;
    Ok(())
}

fn cmd_remove(registry_path: &Path, url: &str, selector: Option<&str>) -> Result<()> {
    let mut registry = load_registry(registry_path)?;

    let removed = match selector {
        Some(selector) => {
            let removed = registry.remove_rule(url, selector);
            if removed {
                tracing::info!(%url, %selector, "Removed selector");
                if !registry.contains(url) {
                    tracing::info!(%url, "Last selector removed, URL no longer tracked");
                }
            }
            removed
        }
        None => {
            let removed = registry.remove_source(url);
            if removed {
                tracing::info!(%url, "Removed URL and all its selectors");
            }
            removed
        }
    };

    if !removed {
        bail!("Nothing to remove for {url}");
    }

    store::save_registry(&registry, registry_path)?;
    Ok(())
}

fn cmd_list(registry_path: &Path) -> Result<()> {
    let registry = load_registry(registry_path)?;
    if registry.is_empty() {
        println!("No URLs tracked. Add one with `lookout add --url <URL> --selector <SELECTOR>`.");
        return Ok(());
    }

    for (url, selectors) in registry.iter() {
        println!("{url}");
        for selector in selectors {
            println!("  {selector}");
        }
    }
    Ok(())
}

fn build_engine(fetch: &FetchArgs) -> Result<Engine<ReqwestFetcher, SelectorExtractor>> {
    let timeout = Duration::from_secs(fetch.timeout);
    let fetcher = ReqwestFetcher::with_timeout(timeout).context("Failed to create HTTP client")?;

    let mut config = EngineConfig::new(timeout);
    if let Some(dir) = &fetch.archive {
        config = config.with_archive(PageArchive::new(dir));
    }

    Ok(Engine::with_config(fetcher, SelectorExtractor::new(), config))
}

/// Save the collection and, if requested, the CSV export.
fn persist(collection: &SnapshotCollection, snapshots_path: &Path, csv: Option<&Path>) -> Result<()> {
    store::save(collection, snapshots_path)?;
    if let Some(csv_path) = csv {
        let rows = store::export_csv(collection, csv_path)?;
        tracing::info!(path = %csv_path.display(), %rows, "Exported CSV");
    }
    Ok(())
}

async fn cmd_run(registry_path: &Path, snapshots_path: &Path, fetch: &FetchArgs) -> Result<()> {
    let registry = load_registry(registry_path)?;
    let mut collection = load_snapshots(snapshots_path)?;

    // The returned snapshot is used directly; the published copy is freed
    // with the receiver when this function returns.
    let (scheduler, _snapshots) = Scheduler::new(build_engine(fetch)?, SharedRegistry::new(registry));
    let snapshot = scheduler.manual_run().await?;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    collection.insert(snapshot);
    persist(&collection, snapshots_path, fetch.csv.as_deref())?;
    tracing::info!(
        path = %snapshots_path.display(),
        snapshots = collection.len(),
        "Saved snapshots"
    );
    Ok(())
}

async fn cmd_watch(
    registry_path: &Path,
    snapshots_path: &Path,
    interval: u64,
    fetch: &FetchArgs,
) -> Result<()> {
    let registry = load_registry(registry_path)?;
    let mut collection = load_snapshots(snapshots_path)?;

    let (mut scheduler, mut snapshots) =
        Scheduler::new(build_engine(fetch)?, SharedRegistry::new(registry));
    scheduler.start(Duration::from_secs(interval))?;

    loop {
        tokio::select! {
            received = snapshots.recv() => {
                let Some(snapshot) = received else { break };
                collection.insert(snapshot);
                // A failed save is reported; the in-memory collection stays authoritative.
                if let Err(e) = persist(&collection, snapshots_path, fetch.csv.as_deref()) {
                    tracing::error!(error = %format!("{e:#}"), "Failed to persist snapshots");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Ctrl-C received, waiting for the current run to finish");
                break;
            }
        }
    }

    scheduler.shutdown().await;
    while let Ok(snapshot) = snapshots.try_recv() {
        collection.insert(snapshot);
    }

    persist(&collection, snapshots_path, fetch.csv.as_deref())?;
    tracing::info!(
        path = %snapshots_path.display(),
        snapshots = collection.len(),
        "Saved snapshots"
    );
    Ok(())
}

fn cmd_export(snapshots_path: &Path, output: &Path) -> Result<()> {
    let collection = store::load(snapshots_path)
        .with_context(|| format!("Failed to load snapshots from {}", snapshots_path.display()))?;
    let rows = store::export_csv(&collection, output)?;
    println!("Exported {} rows to {}", rows, output.display());
    Ok(())
}

fn cmd_history(snapshots_path: &Path, url: &str) -> Result<()> {
    let collection = load_snapshots(snapshots_path)?;
    let history: Vec<_> = collection.history(url).collect();

    if history.is_empty() {
        println!("No snapshots found for {url}");
        return Ok(());
    }

    println!("History for {url}:\n");
    for (timestamp, outcome) in &history {
        match outcome {
            Outcome::Failed => println!("  [{timestamp}] no data (fetch failed)"),
            Outcome::Extracted(result) => {
                println!("  [{timestamp}]");
                for (selector, texts) in result {
                    println!("    {selector}: {}", serde_json::to_string(texts)?);
                }
            }
        }
    }

    println!("\nTotal: {} snapshots", history.len());
    Ok(())
}
