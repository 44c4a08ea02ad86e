//! Operator-facing CLI. Per-sport prediction browsing and data fetching are
//! served by the HTTP API and the scheduler/worker pipeline respectively —
//! this binary only starts the service and runs the one maintenance job
//! that's deliberately kept outside the automatic pipeline (§9): merging
//! duplicate team rows that accrued from independently auto-created
//! unbounded-sport teams (§4.D).

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use strsim::jaro_winkler;

use crate::api::{self, AppState};
use crate::config::Config;
use crate::db;
use crate::fetch::browser::ChromiumoxideBrowserDriver;
use crate::fetch::ratelimit::SourceRateLimiters;
use crate::fetch::robots::RobotsCache;
use crate::fetch::HttpFetcher;
use crate::grading;
use crate::scheduler::Scheduler;
use crate::scoring::AccuracyCache;
use crate::snapshot::SnapshotStore;
use crate::worker::{self, WorkerContext};

#[derive(Parser)]
#[command(name = "pickforge", about = "Prediction aggregation and scoring service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Runs the API, scheduler, and worker pools until killed.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Creates tables if they don't exist yet.
    InitDb,
    /// Grades one sport/date against a scoreboard endpoint.
    Grade {
        sport: String,
        date: NaiveDate,
        #[arg(long)]
        scores_url: String,
    },
    /// Merges teams in `sport` whose aliases are near-duplicates of each
    /// other's, above `threshold` Jaro-Winkler similarity. Run manually;
    /// never invoked by the scheduler or worker pools.
    MergeAliases {
        sport: String,
        #[arg(long, default_value_t = 0.92)]
        threshold: f64,
        #[arg(long)]
        dry_run: bool,
    },
}

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port } => serve(config, port).await,
        Commands::InitDb => init_db(config).await,
        Commands::Grade { sport, date, scores_url } => grade(config, sport, date, scores_url).await,
        Commands::MergeAliases { sport, threshold, dry_run } => {
            merge_aliases(config, sport, threshold, dry_run).await
        }
    }
}

async fn init_db(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config.database_url, config.db_pool_size).await?;
    db::init_database(&pool).await?;
    tracing::info!("database initialized");
    Ok(())
}

/// Resolves every configured adapter into a `sources` row (idempotent),
/// so the worker pool's `get_source_by_slug` lookups never miss.
async fn register_adapters(pool: &sqlx::SqlitePool, registry: &crate::adapters::Registry) -> anyhow::Result<()> {
    for adapter in registry.all() {
        db::upsert_source(
            pool,
            &adapter.config.id,
            &adapter.config.name,
            &adapter.config.base_url,
            adapter.config.fetch_method.as_str(),
        )
        .await?;
    }
    Ok(())
}

async fn serve(config: Config, port: u16) -> anyhow::Result<()> {
    let pool = db::create_pool(&config.database_url, config.db_pool_size).await?;
    db::init_database(&pool).await?;

    let registry = crate::adapters::build_registry();
    register_adapters(&pool, &registry).await?;

    let redis_client = redis::Client::open(config.kv_url.clone())?;
    let kv = redis::aio::ConnectionManager::new(redis_client).await?;

    let browser: Arc<dyn crate::fetch::browser::BrowserDriver> = Arc::new(
        ChromiumoxideBrowserDriver::launch(config.browser_context_count).await?,
    );
    let worker_ctx = Arc::new(WorkerContext {
        pool: pool.clone(),
        registry,
        robots: RobotsCache::new(reqwest::Client::new()),
        rate_limiters: SourceRateLimiters::new(),
        fetcher: Arc::new(HttpFetcher::new()),
        browser,
        snapshots: SnapshotStore::new(config.snapshot_dir.clone()),
        fetch_timeout: Duration::from_secs(20),
    });

    let scheduler = Arc::new(Scheduler::new(crate::adapters::build_registry())?);
    let node_id = uuid::Uuid::new_v4().to_string();

    tokio::spawn({
        let scheduler = scheduler.clone();
        let pool = pool.clone();
        let kv = kv.clone();
        async move { scheduler.run(pool, kv, node_id).await }
    });
    tokio::spawn(worker::run_fetch_pool(
        worker_ctx.clone(),
        config.fetch_worker_count,
        Duration::from_secs(2),
    ));
    tokio::spawn(worker::run_parse_pool(
        worker_ctx,
        config.parse_worker_count,
        Duration::from_secs(2),
    ));

    let state = AppState {
        pool,
        kv,
        config: Arc::new(config),
        accuracy_cache: Arc::new(AccuracyCache::new()),
    };
    let router = api::create_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(%port, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn grade(config: Config, sport: String, date: NaiveDate, scores_url: String) -> anyhow::Result<()> {
    let pool = db::create_pool(&config.database_url, config.db_pool_size).await?;
    let source = grading::sources::HttpResultSource::new(scores_url);
    let graded = grading::run_once(&pool, &source, &sport, date).await?;
    tracing::info!(graded, "grading pass complete");
    Ok(())
}

/// Two aliases count as the same club when their normalized text is
/// Jaro-Winkler-similar above `threshold`; teams are merged pairwise,
/// always folding the newer team id into the older (first-seen) one so
/// `created_at`-derived ordering from `teams.id` stays stable.
async fn merge_aliases(config: Config, sport: String, threshold: f64, dry_run: bool) -> anyhow::Result<()> {
    let pool = db::create_pool(&config.database_url, config.db_pool_size).await?;
    let teams = db::get_teams_by_sport(&pool, &sport).await?;
    let aliases = db::get_aliases_for_sport(&pool, &sport).await?;

    let mut best_alias: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    for alias in &aliases {
        best_alias.entry(alias.team_id.clone()).or_insert_with(|| alias.alias.clone());
    }

    let mut merged = std::collections::HashSet::new();
    for i in 0..teams.len() {
        if merged.contains(&teams[i].id) {
            continue;
        }
        for j in (i + 1)..teams.len() {
            if merged.contains(&teams[j].id) {
                continue;
            }
            let a = best_alias.get(&teams[i].id).map(String::as_str).unwrap_or(&teams[i].name);
            let b = best_alias.get(&teams[j].id).map(String::as_str).unwrap_or(&teams[j].name);
            let similarity = jaro_winkler(&a.to_lowercase(), &b.to_lowercase());
            if similarity >= threshold {
                tracing::info!(
                    winner = %teams[i].name,
                    loser = %teams[j].name,
                    similarity,
                    "merging duplicate team"
                );
                if !dry_run {
                    db::merge_teams(&pool, &teams[i].id, &teams[j].id).await?;
                }
                merged.insert(teams[j].id.clone());
            }
        }
    }

    tracing::info!(merged = merged.len(), dry_run, "alias merge pass complete");
    Ok(())
}
