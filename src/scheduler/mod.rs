//! Cron-driven job enqueue (§4.G) with leader election over a KV lease
//! (§3.1, §5). Generalizes the teacher's fixed `tokio::time::interval(60s)`
//! `background_scheduler` loop into per-adapter variable-interval firing:
//! each adapter tracks its own `next_fire_at`, recomputed from its 6-field
//! cron expression after every fire.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::adapters::{Adapter, Registry};
use crate::db;
use crate::error::SchedulerError;
use crate::models::JobKind;

const LEASE_KEY: &str = "scheduler:leader";
const LEASE_TTL_SECS: u64 = 15;

/// Attempts to become (or remain) the active scheduler node. Only the
/// lease holder fires cron jobs; followers keep polling in case the lease
/// expires (e.g. the leader crashed).
pub async fn try_acquire_leader(
    conn: &mut ConnectionManager,
    node_id: &str,
) -> Result<bool, SchedulerError> {
    let acquired: Option<String> = redis::cmd("SET")
        .arg(LEASE_KEY)
        .arg(node_id)
        .arg("NX")
        .arg("EX")
        .arg(LEASE_TTL_SECS)
        .query_async(conn)
        .await?;
    if acquired.is_some() {
        return Ok(true);
    }

    let holder: Option<String> = conn.get(LEASE_KEY).await?;
    if holder.as_deref() == Some(node_id) {
        let _: () = conn.expire(LEASE_KEY, LEASE_TTL_SECS as i64).await?;
        return Ok(true);
    }
    Ok(false)
}

fn next_fire_after(adapter: &Adapter, after: DateTime<Utc>) -> Result<DateTime<Utc>, SchedulerError> {
    let schedule =
        Schedule::from_str(&adapter.config.cron).map_err(|source| SchedulerError::InvalidCron {
            expr: adapter.config.cron.clone(),
            source,
        })?;
    // A well-formed cron expression always has an upcoming fire time; fall
    // back to an hour out rather than failing the tick if one is somehow
    // missing (e.g. a malformed test fixture).
    Ok(schedule
        .after(&after)
        .next()
        .unwrap_or_else(|| after + chrono::Duration::hours(1)))
}

/// Enqueues one fetch job per `(sport, path)` entry for the adapter (§4.G).
async fn fire_adapter(pool: &SqlitePool, adapter: &Adapter) -> Result<(), SchedulerError> {
    for (sport, path) in &adapter.config.paths {
        let url = format!("{}{}", adapter.config.base_url, path);
        db::enqueue_job(
            pool,
            JobKind::Fetch,
            &adapter.config.id,
            sport,
            path,
            &url,
            false,
            None,
        )
        .await?;
        tracing::info!(adapter = %adapter.config.id, sport = %sport, "enqueued scheduled fetch");
    }
    Ok(())
}

pub struct Scheduler {
    registry: Registry,
    next_fire: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl Scheduler {
    pub fn new(registry: Registry) -> Result<Self, SchedulerError> {
        let now = Utc::now();
        let mut next_fire = HashMap::new();
        for adapter in registry.all() {
            next_fire.insert(adapter.config.id.clone(), next_fire_after(adapter, now)?);
        }
        Ok(Self {
            registry,
            next_fire: RwLock::new(next_fire),
        })
    }

    /// Fires every adapter whose `next_fire_at` has elapsed, then schedules
    /// each one's following fire time.
    async fn tick(&self, pool: &SqlitePool) -> Result<(), SchedulerError> {
        let now = Utc::now();
        let due: Vec<String> = {
            let next_fire = self.next_fire.read().await;
            next_fire
                .iter()
                .filter(|(_, fire_at)| **fire_at <= now)
                .map(|(id, _)| id.clone())
                .collect()
        };

        for adapter_id in due {
            let Some(adapter) = self.registry.get(&adapter_id) else {
                continue;
            };
            fire_adapter(pool, adapter).await?;
            let following = next_fire_after(adapter, now)?;
            self.next_fire.write().await.insert(adapter_id, following);
        }
        Ok(())
    }

    /// Runs forever, polling for the leader lease once per second and
    /// firing due adapters only while holding it.
    pub async fn run(&self, pool: SqlitePool, mut kv: ConnectionManager, node_id: String) {
        loop {
            match try_acquire_leader(&mut kv, &node_id).await {
                Ok(true) => {
                    if let Err(error) = self.tick(&pool).await {
                        tracing::warn!(%error, "scheduler tick failed");
                    }
                }
                Ok(false) => {}
                Err(error) => tracing::warn!(%error, "leader lease check failed"),
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::build_registry;

    #[test]
    fn computes_an_upcoming_fire_time_for_every_registered_adapter() {
        let registry = build_registry();
        let now = Utc::now();
        for adapter in registry.all() {
            let fire_at = next_fire_after(adapter, now).unwrap();
            assert!(fire_at > now);
        }
    }

    #[tokio::test]
    async fn scheduler_builds_from_the_full_registry() {
        let scheduler = Scheduler::new(build_registry()).unwrap();
        let expected = scheduler.registry.all().count();
        assert_eq!(scheduler.next_fire.read().await.len(), expected);
    }
}
