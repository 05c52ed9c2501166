//! Agora listing CLI.
//!
//! Runs one article or tag listing against PostgreSQL and prints the page as
//! JSON.
//!
//! Usage:
//!   agora articles --query '{"limit": 5, "sorts": {"votes": "DESC"}}'
//!   agora tags --query-file request.json --metrics

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use agora_kernel::config::{Config, ListingConfig};
use agora_kernel::db;
use agora_kernel::listing::{Articles, ListQuery, ListingQuery, PaginatedList, Tags};
use agora_kernel::metrics::Metrics;

/// Entities that can be listed.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Entity {
    Articles,
    Tags,
}

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Entity to list.
    #[arg(value_enum)]
    entity: Entity,

    /// Listing request as inline JSON.
    #[arg(long, conflicts_with = "query_file")]
    query: Option<String>,

    /// Path to a JSON file holding the listing request.
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// Print Prometheus metrics to stderr after the listing.
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();
    let request = read_request(&args)?;

    let config = Config::from_env().context("failed to load configuration")?;
    let pool = db::create_pool(&config)
        .await
        .context("failed to create database pool")?;
    if !db::check_health(&pool).await {
        warn!("database health check failed");
    }

    let metrics = Arc::new(Metrics::new());
    let output = match args.entity {
        Entity::Articles => {
            run::<Articles>(&pool, &request, &config.listing, metrics.clone()).await?
        }
        Entity::Tags => run::<Tags>(&pool, &request, &config.listing, metrics.clone()).await?,
    };

    println!("{output}");
    if args.metrics {
        eprintln!("{}", metrics.encode());
    }

    Ok(())
}

fn read_request(args: &Args) -> Result<ListQuery> {
    let raw = match (&args.query, &args.query_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => return Ok(ListQuery::default()),
    };
    serde_json::from_str(&raw).context("listing request is not valid JSON")
}

/// Run one listing and render its output as pretty JSON.
async fn run<Q>(
    pool: &PgPool,
    request: &ListQuery,
    listing: &ListingConfig,
    metrics: Arc<Metrics>,
) -> Result<String>
where
    Q: ListingQuery,
    Q::Entity: Serialize,
{
    let entity = Q::schema().entity;
    let mut list = match PaginatedList::<Q>::new(request, listing) {
        Ok(list) => list.with_metrics(metrics),
        Err(err) => {
            metrics.record_error(entity, err.kind());
            return Err(err).context("invalid listing request");
        }
    };

    list.set_data(pool).await.context("listing failed")?;

    for timing in list.timings() {
        info!(
            entity,
            statement = timing.statement,
            elapsed_ms = timing.elapsed.as_secs_f64() * 1000.0,
            "statement timing"
        );
    }

    let output = list.into_output();
    info!(entity, total = output.total, returned = output.data.len(), "listing complete");
    serde_json::to_string_pretty(&output).context("failed to serialize listing")
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
