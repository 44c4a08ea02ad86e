use std::env;

/// Centralized runtime configuration, populated once from the environment.
///
/// Every field has a working default; nothing here hard-fails on a missing
/// variable the way a Docker-secrets-only deployment would.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub kv_url: String,
    pub snapshot_dir: String,
    pub log_level: String,
    pub fetch_worker_count: usize,
    pub parse_worker_count: usize,
    pub browser_context_count: usize,
    pub db_pool_size: u32,
    pub notification_webhook: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/pickforge.db".to_string(),
            kv_url: "redis://127.0.0.1:6379".to_string(),
            snapshot_dir: "./data/snapshots".to_string(),
            log_level: "info".to_string(),
            fetch_worker_count: 3,
            parse_worker_count: 4,
            browser_context_count: 2,
            db_pool_size: 10,
            notification_webhook: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            kv_url: env::var("KV_URL").unwrap_or(defaults.kv_url),
            snapshot_dir: env::var("SNAPSHOT_DIR").unwrap_or(defaults.snapshot_dir),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            fetch_worker_count: env::var("FETCH_WORKER_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.fetch_worker_count),
            parse_worker_count: env::var("PARSE_WORKER_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.parse_worker_count),
            browser_context_count: env::var("BROWSER_CONTEXT_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.browser_context_count),
            db_pool_size: env::var("DB_POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.db_pool_size),
            notification_webhook: env::var("NOTIFICATION_WEBHOOK").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_without_env() {
        let cfg = Config::default();
        assert!(cfg.database_url.starts_with("sqlite://"));
        assert_eq!(cfg.db_pool_size, 10);
    }
}
