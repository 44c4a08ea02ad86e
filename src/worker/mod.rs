//! Bounded-concurrency fetch/parse worker pools (§4.H), draining the
//! durable `jobs` table via `db::claim_jobs`. Generalizes the teacher's
//! single-future `background_scheduler` into a JDSB123-style pool bounded
//! by a `tokio::sync::Semaphore`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::Semaphore;

use crate::adapters::{Adapter, Registry};
use crate::db;
use crate::error::FetchError;
use crate::fetch::browser::BrowserDriver;
use crate::fetch::ratelimit::SourceRateLimiters;
use crate::fetch::robots::RobotsCache;
use crate::fetch::Fetcher;
use crate::models::{FetchMethod, Job, JobKind, SnapshotMeta};
use crate::normalize;
use crate::snapshot::SnapshotStore;

pub struct WorkerContext {
    pub pool: SqlitePool,
    pub registry: Registry,
    pub robots: RobotsCache,
    pub rate_limiters: SourceRateLimiters,
    pub fetcher: Arc<dyn Fetcher>,
    pub browser: Arc<dyn BrowserDriver>,
    pub snapshots: SnapshotStore,
    pub fetch_timeout: Duration,
}

/// Drains the `fetch` queue, bounded to `worker_count` concurrent fetches.
/// Per-source rate limits still serialize fetches within a source
/// regardless of how many workers are free.
pub async fn run_fetch_pool(ctx: Arc<WorkerContext>, worker_count: usize, poll_interval: Duration) {
    let semaphore = Arc::new(Semaphore::new(worker_count));
    loop {
        let jobs = match db::claim_jobs(&ctx.pool, JobKind::Fetch, worker_count as i64).await {
            Ok(jobs) => jobs,
            Err(error) => {
                tracing::warn!(%error, "failed to claim fetch jobs");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };
        if jobs.is_empty() {
            tokio::time::sleep(poll_interval).await;
            continue;
        }

        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            let ctx = ctx.clone();
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                run_fetch_job(&ctx, job).await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn run_fetch_job(ctx: &WorkerContext, job: Job) {
    let Some(adapter) = ctx.registry.get(&job.adapter_id) else {
        tracing::warn!(adapter_id = %job.adapter_id, "fetch job references an unknown adapter");
        let _ = db::delete_job(&ctx.pool, &job.id).await;
        return;
    };

    let path_to_check = if job.is_sub_url {
        job.url
            .strip_prefix(&adapter.config.base_url)
            .unwrap_or(&job.url)
            .to_string()
    } else {
        job.path.clone()
    };
    if !ctx
        .robots
        .is_allowed(&adapter.config.base_url, &path_to_check)
        .await
    {
        tracing::warn!(url = %job.url, "robots.txt disallows this fetch, dropping job");
        let _ = db::delete_job(&ctx.pool, &job.id).await;
        return;
    }

    ctx.rate_limiters
        .acquire(&adapter.config.id, adapter.config.rate_limit_ms)
        .await;

    let fetch_result = dispatch_fetch(ctx, adapter, &job.url).await;
    let (body, http_status) = match fetch_result {
        Ok(result) => result,
        Err(error) => {
            handle_fetch_failure(ctx, &job, adapter, error).await;
            return;
        }
    };

    let fetched_at = Utc::now();
    let meta = SnapshotMeta {
        source_id: adapter.config.id.clone(),
        sport: job.sport.clone(),
        url: job.url.clone(),
        fetch_method: adapter.config.fetch_method,
        http_status,
        duration_ms: 0,
        size_bytes: body.len() as u64,
        fetched_at,
    };
    let storage_path = match ctx.snapshots.save(&meta, &body).await {
        Ok(path) => path,
        Err(error) => {
            tracing::warn!(%error, "failed to save snapshot, dropping job");
            let _ = db::delete_job(&ctx.pool, &job.id).await;
            return;
        }
    };

    if let Ok(Some(source)) = db::get_source_by_slug(&ctx.pool, &adapter.config.id).await {
        let _ = db::update_source_last_fetched(&ctx.pool, &source.id, fetched_at).await;
    }

    if !job.is_sub_url {
        if let Some(discover) = &adapter.discover_urls {
            if let Ok(text) = std::str::from_utf8(&body) {
                for sub_url in discover(text, &job.sport) {
                    let full_url = if sub_url.starts_with("http") {
                        sub_url
                    } else {
                        format!("{}{}", adapter.config.base_url, sub_url)
                    };
                    let _ = db::enqueue_job(
                        &ctx.pool,
                        JobKind::Fetch,
                        &adapter.config.id,
                        &job.sport,
                        &job.path,
                        &full_url,
                        true,
                        None,
                    )
                    .await;
                }
            }
        }
    }

    let _ = db::enqueue_job(
        &ctx.pool,
        JobKind::Parse,
        &adapter.config.id,
        &job.sport,
        &job.path,
        &job.url,
        job.is_sub_url,
        Some(&storage_path),
    )
    .await;
    let _ = db::delete_job(&ctx.pool, &job.id).await;
}

async fn dispatch_fetch(
    ctx: &WorkerContext,
    adapter: &Adapter,
    url: &str,
) -> Result<(Vec<u8>, Option<u16>), FetchError> {
    match adapter.config.fetch_method {
        FetchMethod::Http => ctx
            .fetcher
            .fetch_http(url, ctx.fetch_timeout)
            .await
            .map(|(body, status)| (body, Some(status))),
        FetchMethod::Browser => ctx
            .browser
            .render(url, None)
            .await
            .map(|html| (html.into_bytes(), None)),
    }
}

/// On fetch failure, re-enqueue with exponential backoff up to
/// `maxRetries`, then give up and log (§4.H retry policy).
async fn handle_fetch_failure(ctx: &WorkerContext, job: &Job, adapter: &Adapter, error: FetchError) {
    tracing::warn!(url = %job.url, %error, attempt = job.attempt, "fetch failed");
    let attempt = job.attempt.max(0) as u32;
    if attempt >= adapter.config.max_retries {
        tracing::warn!(url = %job.url, "giving up after max retries");
        let _ = db::delete_job(&ctx.pool, &job.id).await;
        return;
    }
    let delay_ms = adapter.config.backoff.delay_for_attempt(attempt);
    let next_fire_at = Utc::now() + chrono::Duration::milliseconds(delay_ms as i64);
    let _ = db::reschedule_job(&ctx.pool, &job.id, next_fire_at).await;
}

/// Drains the `parse` queue. Parsing is CPU-bound, so this pool scales
/// independently of the fetch pool's I/O-bound concurrency.
pub async fn run_parse_pool(ctx: Arc<WorkerContext>, worker_count: usize, poll_interval: Duration) {
    let semaphore = Arc::new(Semaphore::new(worker_count));
    loop {
        let jobs = match db::claim_jobs(&ctx.pool, JobKind::Parse, worker_count as i64).await {
            Ok(jobs) => jobs,
            Err(error) => {
                tracing::warn!(%error, "failed to claim parse jobs");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };
        if jobs.is_empty() {
            tokio::time::sleep(poll_interval).await;
            continue;
        }

        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            let ctx = ctx.clone();
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                run_parse_job(&ctx, job).await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn run_parse_job(ctx: &WorkerContext, job: Job) {
    let Some(adapter) = ctx.registry.get(&job.adapter_id) else {
        let _ = db::delete_job(&ctx.pool, &job.id).await;
        return;
    };
    let Some(storage_path) = job.payload.as_deref() else {
        let _ = db::delete_job(&ctx.pool, &job.id).await;
        return;
    };
    let bytes = match ctx.snapshots.read(storage_path).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!(%error, path = storage_path, "failed to re-read snapshot");
            let _ = db::delete_job(&ctx.pool, &job.id).await;
            return;
        }
    };

    let source_id = match db::get_source_by_slug(&ctx.pool, &adapter.config.id).await {
        Ok(Some(source)) => source.id,
        _ => {
            tracing::warn!(adapter = %adapter.config.id, "no source row for adapter, dropping parse job");
            let _ = db::delete_job(&ctx.pool, &job.id).await;
            return;
        }
    };

    let fetched_at = Utc::now();
    let mut raw_predictions = (adapter.parse)(&bytes, &job.sport, fetched_at);
    for raw in &mut raw_predictions {
        raw.source_id = source_id.clone();
    }

    let (mut inserted, mut duplicates, mut dropped) = (0u32, 0u32, 0u32);
    for raw in &raw_predictions {
        match normalize::normalize(&ctx.pool, &adapter.config.id, raw).await {
            Ok(Some(true)) => inserted += 1,
            Ok(Some(false)) => duplicates += 1,
            Ok(None) => dropped += 1,
            Err(error) => {
                tracing::debug!(%error, "normalize failed for one row, continuing batch");
                dropped += 1;
            }
        }
    }

    tracing::info!(
        adapter = %adapter.config.id,
        total = raw_predictions.len(),
        inserted,
        duplicates,
        dropped,
        "parse batch complete"
    );
    let _ = db::delete_job(&ctx.pool, &job.id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::build_registry;
    use crate::db::{create_pool, init_database, seed};
    use crate::fetch::browser::FixedHtmlBrowserDriver;
    use crate::fetch::robots::RobotsCache;
    use crate::fetch::FakeFetcher;

    async fn test_context(body: &'static str) -> WorkerContext {
        let pool = create_pool("sqlite::memory:", 1).await.unwrap();
        init_database(&pool).await.unwrap();
        seed::seed_data(&pool).await.unwrap();

        let dir = std::env::temp_dir().join(format!("pickforge-worker-test-{}", uuid::Uuid::new_v4()));
        WorkerContext {
            pool,
            registry: build_registry(),
            robots: RobotsCache::new(reqwest::Client::new()),
            rate_limiters: SourceRateLimiters::new(),
            fetcher: Arc::new(FakeFetcher {
                body: body.as_bytes().to_vec(),
                status: 200,
            }),
            browser: Arc::new(FixedHtmlBrowserDriver {
                html: body.to_string(),
            }),
            snapshots: SnapshotStore::new(dir),
            fetch_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn fetch_job_saves_a_snapshot_and_enqueues_a_parse_job() {
        let ctx = test_context("<html><body></body></html>").await;
        db::enqueue_job(
            &ctx.pool,
            JobKind::Fetch,
            "covers-consensus",
            "nba",
            "/nba",
            "https://www.coversconsensus.test/nba",
            false,
            None,
        )
        .await
        .unwrap();

        let jobs = db::claim_jobs(&ctx.pool, JobKind::Fetch, 1).await.unwrap();
        assert_eq!(jobs.len(), 1);
        run_fetch_job(&ctx, jobs.into_iter().next().unwrap()).await;

        let parse_jobs = db::claim_jobs(&ctx.pool, JobKind::Parse, 10).await.unwrap();
        assert_eq!(parse_jobs.len(), 1);
        assert!(parse_jobs[0].payload.is_some());
    }

    #[tokio::test]
    async fn fetch_failure_reschedules_with_backoff_until_max_retries() {
        struct AlwaysFails;

        #[async_trait::async_trait]
        impl Fetcher for AlwaysFails {
            async fn fetch_http(
                &self,
                url: &str,
                _timeout: Duration,
            ) -> Result<(Vec<u8>, u16), FetchError> {
                Err(FetchError::Timeout(url.to_string()))
            }
        }

        let mut ctx = test_context("<html></html>").await;
        ctx.fetcher = Arc::new(AlwaysFails);

        db::enqueue_job(
            &ctx.pool,
            JobKind::Fetch,
            "covers-consensus",
            "nba",
            "/nba",
            "https://www.coversconsensus.test/nba",
            false,
            None,
        )
        .await
        .unwrap();

        let jobs = db::claim_jobs(&ctx.pool, JobKind::Fetch, 1).await.unwrap();
        let job = jobs.into_iter().next().unwrap();
        run_fetch_job(&ctx, job).await;

        // Rescheduled, not deleted: it should reappear once its backoff
        // window is rewound into the past.
        db::reschedule_job(&ctx.pool, "missing-id", Utc::now()).await.ok();
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE kind = 'fetch'")
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }
}
