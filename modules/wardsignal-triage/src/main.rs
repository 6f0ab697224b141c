use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use wardsignal_common::{Config, GeoPoint, MemoryReportStore, ReportStore};
use wardsignal_geo::BoundaryIndex;
use wardsignal_store::PgReportStore;
use wardsignal_triage::{live_context, TriageService};

#[derive(Parser)]
#[command(name = "wardsignal")]
#[command(about = "Issue-report triage: duplicates, severity, ward resolution")]
#[command(version)]
struct Cli {
    /// GeoJSON FeatureCollection of wards and districts (falls back to BOUNDARIES_PATH)
    #[arg(long, global = true)]
    boundaries: Option<PathBuf>,

    /// JSON array of reports to work on instead of Postgres; mutating commands write it back
    #[arg(long, global = true)]
    reports: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Active reports ordered by severity
    Rank {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Report count, upvotes and mean severity per ward
    WardStats,

    /// Report count, upvotes and mean severity per district
    DistrictStats,

    /// Closest active report to a coordinate
    Nearest {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },

    /// Route from a coordinate to a report (straight line if routing is down)
    Route {
        report_id: Uuid,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },

    /// Likely duplicates of a report
    Similar { report_id: Uuid },

    /// Embed, deduplicate, score and locate one report
    Triage { report_id: Uuid },

    /// Mark DUPLICATE as a restatement of ORIGINAL
    Merge { duplicate: Uuid, original: Uuid },

    /// Re-score every live report
    Recompute,

    /// Embed reports that are missing embeddings
    Backfill {
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },

    /// Re-run the image classifier on a report photo
    Reanalyze { report_id: Uuid },
}

impl Commands {
    /// Commands that write triage fields back to the store.
    fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Triage { .. }
                | Commands::Merge { .. }
                | Commands::Recompute
                | Commands::Backfill { .. }
                | Commands::Reanalyze { .. }
        )
    }
}

/// Where reports live for this run.
enum Backing {
    Postgres(Arc<PgReportStore>),
    /// JSON dump loaded into memory; written back after mutating commands.
    Dump {
        path: PathBuf,
        store: Arc<MemoryReportStore>,
    },
}

impl Backing {
    fn store(&self) -> Arc<dyn ReportStore> {
        match self {
            Backing::Postgres(store) => store.clone(),
            Backing::Dump { store, .. } => store.clone(),
        }
    }

    async fn persist(&self) -> Result<()> {
        if let Backing::Dump { path, store } = self {
            let json = store.to_json_string().await?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Report dump updated");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("wardsignal=info".parse()?))
        .init();

    let cli = Cli::parse();

    // A report dump means offline mode: no Postgres, keys optional.
    let config = match cli.reports {
        Some(_) => Config::offline_from_env()?,
        None => Config::from_env()?,
    };
    config.log_redacted();

    let boundaries = load_boundaries(cli.boundaries.as_ref(), &config)?;
    let backing = open_store(cli.reports, &config).await?;
    let service = TriageService::new(live_context(&config, backing.store(), boundaries));

    let mutates = cli.command.mutates();
    run(&service, cli.command).await?;
    if mutates {
        backing.persist().await?;
    }
    Ok(())
}

async fn run(service: &TriageService, command: Commands) -> Result<()> {
    let now = Utc::now();
    match command {
        Commands::Rank { limit } => print_json(&service.ranked_reports(limit).await?),
        Commands::WardStats => print_json(&service.ward_stats().await?),
        Commands::DistrictStats => print_json(&service.district_stats().await?),
        Commands::Nearest { lat, lng } => {
            print_json(&service.nearest_report(GeoPoint::new(lat, lng)?).await?)
        }
        Commands::Route {
            report_id,
            lat,
            lng,
        } => {
            let estimate = service
                .route_to_report(GeoPoint::new(lat, lng)?, report_id)
                .await?;
            info!(source = ?estimate.source, "Route computed");
            println!(
                "{} ({})",
                estimate.distance_text(),
                estimate
                    .duration_text()
                    .unwrap_or_else(|| "straight line".to_string())
            );
            Ok(())
        }
        Commands::Similar { report_id } => print_json(&service.similar_reports(report_id).await?),
        Commands::Triage { report_id } => print_json(&service.triage_report(report_id, now).await?),
        Commands::Merge {
            duplicate,
            original,
        } => print_json(&service.merge_duplicate(duplicate, original).await?),
        Commands::Recompute => print_json(&service.recompute_severity(now).await?),
        Commands::Backfill { limit } => print_json(&service.backfill_embeddings(limit).await?),
        Commands::Reanalyze { report_id } => {
            print_json(&service.reanalyze_image(report_id, now).await?)
        }
    }
}

fn load_boundaries(flag: Option<&PathBuf>, config: &Config) -> Result<Arc<BoundaryIndex>> {
    let path = flag
        .cloned()
        .or_else(|| config.boundaries_path.as_ref().map(PathBuf::from))
        .ok_or_else(|| anyhow!("No boundary file: pass --boundaries or set BOUNDARIES_PATH"))?;

    let index = BoundaryIndex::from_geojson_path(&path)
        .with_context(|| format!("Failed to load boundaries from {}", path.display()))?;
    Ok(Arc::new(index))
}

async fn open_store(reports: Option<PathBuf>, config: &Config) -> Result<Backing> {
    match reports {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let store = MemoryReportStore::from_json_str(&json)?;
            info!(reports = store.count_reports().await?, "Loaded report dump");
            Ok(Backing::Dump {
                path,
                store: Arc::new(store),
            })
        }
        None => {
            let store = PgReportStore::connect(&config.database_url).await?;
            store.migrate().await?;
            Ok(Backing::Postgres(Arc::new(store)))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
