// municrawl: collect municipal code documents and zoning feature sets.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing_subscriber::EnvFilter;

use municrawl::collect::{library, municode, municode::MunicodeCollector, Collector};
use municrawl::engine::{RunSummary, WorkUnit, WorkerPool};
use municrawl::{
    CdpSessionFactory, CollectConfig, FeatureServerClient, LocalMirrorStore, SessionFactory,
};

#[derive(Parser)]
#[command(name = "municrawl", about = "Municipal code and zoning data collector", version)]
struct Cli {
    /// Root directory for downloaded artifacts
    #[arg(long, default_value = "downloads", env = "MUNICRAWL_DOWNLOAD_ROOT")]
    download_root: PathBuf,

    /// Run the browser with a visible window
    #[arg(long)]
    headed: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download a municipality's code of ordinances section by section
    Ordinance {
        /// Two-letter state abbreviation, e.g. fl
        state: String,
        /// Municipality slug as used by the library site, e.g. gainesville
        municipality: String,
        /// Resource URL; resolved from the library site when omitted
        #[arg(long)]
        url: Option<String>,
        /// Mirror artifacts into this directory after the run
        #[arg(long)]
        mirror: Option<PathBuf>,
        /// Discover and list the sections without downloading anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Download ordinances for several municipalities concurrently
    Batch {
        /// Two-letter state abbreviation
        state: String,
        /// Municipality slugs to collect
        #[arg(required = true)]
        municipalities: Vec<String>,
        /// Concurrent browser sessions
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Mirror artifacts into this directory after each run
        #[arg(long)]
        mirror: Option<PathBuf>,
    },
    /// List the states the library publishes
    States,
    /// List the municipalities a state publishes
    Municipalities { state: String },
    /// Download every feature of an ArcGIS-style feature service
    Features {
        /// Service URL, e.g. https://host/arcgis/rest/services/Zoning/FeatureServer
        url: String,
        /// Output JSON file
        #[arg(long, default_value = "features.json")]
        out: PathBuf,
        /// Also upsert recognizable zoning records into this SQLite database
        #[arg(long, requires = "municipality", requires = "state")]
        db: Option<PathBuf>,
        /// Municipality name for the database records
        #[arg(long)]
        municipality: Option<String>,
        /// State abbreviation for the database records
        #[arg(long)]
        state: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("municrawl=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ordinance {
            state,
            municipality,
            url,
            mirror,
            dry_run,
        } => {
            if dry_run {
                return run_dry_run(cli.download_root, !cli.headed, state, municipality, url).await;
            }
            let summary = collect_one(
                cli.download_root,
                !cli.headed,
                state,
                municipality,
                url,
                mirror,
            )
            .await?;
            println!(
                "downloaded: {}  skipped: {}  failed: {}",
                summary.succeeded,
                summary.skipped,
                summary.failed.len()
            );
            for failure in &summary.failed {
                eprintln!("  failed: {} ({})", failure.section, failure.error);
            }
            if !summary.is_clean() {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Batch {
            state,
            municipalities,
            workers,
            mirror,
        } => run_batch(cli.download_root, !cli.headed, state, municipalities, workers, mirror).await,
        Command::States => run_states(!cli.headed).await,
        Command::Municipalities { state } => run_municipalities(!cli.headed, state).await,
        Command::Features {
            url,
            out,
            db,
            municipality,
            state,
        } => run_features(url, out, db, municipality, state).await,
    }
}

/// Run the full pipeline for one municipality and return its summary.
async fn collect_one(
    download_root: PathBuf,
    headless: bool,
    state: String,
    municipality: String,
    url: Option<String>,
    mirror: Option<PathBuf>,
) -> Result<RunSummary> {
    let resource_url = match url {
        Some(url) => url,
        None => resolve_codes_url(headless, &download_root, &state, &municipality).await?,
    };

    let config = CollectConfig::builder()
        .download_root(download_root)
        .resource_url(resource_url)
        .headless(headless)
        .build()?;

    let factory = CdpSessionFactory::new(
        config.headless(),
        config
            .download_root()
            .join(state.to_lowercase())
            .join(municipality.to_lowercase()),
    );

    let mut collector = MunicodeCollector::new(state, municipality, config, factory);
    if let Some(mirror_root) = mirror {
        collector = collector.with_store(Arc::new(LocalMirrorStore::new(mirror_root)));
    }
    collector.collect().await
}

async fn run_dry_run(
    download_root: PathBuf,
    headless: bool,
    state: String,
    municipality: String,
    url: Option<String>,
) -> Result<()> {
    let resource_url = match url {
        Some(url) => url,
        None => resolve_codes_url(headless, &download_root, &state, &municipality).await?,
    };
    let config = CollectConfig::builder()
        .download_root(&download_root)
        .resource_url(resource_url)
        .headless(headless)
        .build()?;

    let factory = CdpSessionFactory::new(headless, download_root.join("tmp"));
    let session = factory.create().await?;
    let result = municode::preview_tasks(&session, &config).await;
    if let Err(e) = factory.destroy(session).await {
        tracing::warn!("Session teardown failed: {}", e);
    }

    let tasks = result?;
    for task in &tasks {
        println!("{}\t{}", task.node_id, task.label());
    }
    eprintln!("{} sections", tasks.len());
    Ok(())
}

async fn run_batch(
    download_root: PathBuf,
    headless: bool,
    state: String,
    municipalities: Vec<String>,
    workers: usize,
    mirror: Option<PathBuf>,
) -> Result<()> {
    let units: Vec<WorkUnit> = municipalities
        .iter()
        .map(|m| WorkUnit::new(m.clone()).with_meta("state", state.clone()))
        .collect();

    let pool = WorkerPool::new(workers);
    let outcome = pool
        .run_all(units, move |unit| {
            let download_root = download_root.clone();
            let state = state.clone();
            let mirror = mirror.clone();
            async move {
                let summary = collect_one(
                    download_root,
                    headless,
                    state,
                    unit.external_ref.clone(),
                    None,
                    mirror,
                )
                .await?;
                for failure in &summary.failed {
                    eprintln!(
                        "  {}: failed {} ({})",
                        unit.external_ref, failure.section, failure.error
                    );
                }
                Ok(())
            }
        })
        .await;

    println!(
        "municipalities done: {}  failed: {}",
        outcome.succeeded.len(),
        outcome.failed.len()
    );
    for (unit, reason) in &outcome.failed {
        eprintln!("  failed: {} ({})", unit.external_ref, reason);
    }
    if !outcome.failed.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

async fn resolve_codes_url(
    headless: bool,
    download_root: &std::path::Path,
    state: &str,
    municipality: &str,
) -> Result<String> {
    let factory = CdpSessionFactory::new(headless, download_root.join("tmp"));
    let session = factory.create().await?;
    let resolved = library::find_codes_url(&session, state, municipality).await;
    if let Err(e) = factory.destroy(session).await {
        tracing::warn!("Session teardown failed: {}", e);
    }
    resolved?.with_context(|| format!("no code of ordinances found for {state}/{municipality}"))
}

async fn run_states(headless: bool) -> Result<()> {
    let factory =
        CdpSessionFactory::new(headless, std::env::temp_dir().join("municrawl_discovery"));
    let session = factory.create().await?;
    let result = library::list_states(&session).await;
    if let Err(e) = factory.destroy(session).await {
        tracing::warn!("Session teardown failed: {}", e);
    }
    for state in result? {
        println!("{state}");
    }
    Ok(())
}

async fn run_municipalities(headless: bool, state: String) -> Result<()> {
    let factory =
        CdpSessionFactory::new(headless, std::env::temp_dir().join("municrawl_discovery"));
    let session = factory.create().await?;
    let result = library::list_municipalities(&session, &state).await;
    if let Err(e) = factory.destroy(session).await {
        tracing::warn!("Session teardown failed: {}", e);
    }
    let municipalities = result?;
    for m in &municipalities {
        println!("{}\t{}", m.slug, m.name);
    }
    eprintln!("{} municipalities", municipalities.len());
    Ok(())
}

async fn run_features(
    url: String,
    out: PathBuf,
    db: Option<PathBuf>,
    municipality: Option<String>,
    state: Option<String>,
) -> Result<()> {
    let client = FeatureServerClient::new();
    let features = client.download_all(&url).await?;
    let doc = serde_json::json!({ "features": features });
    std::fs::write(&out, serde_json::to_vec_pretty(&doc)?)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("{} features -> {}", features.len(), out.display());

    if let (Some(db_path), Some(municipality), Some(state)) = (db, municipality, state) {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open {}", db_path.display()))?;
        municrawl::db::ensure_schema(&pool).await?;
        let muni_id = municrawl::db::get_or_create_municipality(&pool, &municipality, &state).await?;
        let mut stored = 0;
        for feature in &features {
            if let Some(zone) = municrawl::db::zone_from_feature(feature) {
                municrawl::db::upsert_zone(&pool, muni_id, &zone).await?;
                stored += 1;
            }
        }
        println!("{} zoning records -> {}", stored, db_path.display());
    }
    Ok(())
}
