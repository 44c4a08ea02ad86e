//! Module-boundary error enums (§7). Each component fails with its own
//! typed error; `anyhow` is reserved for top-level orchestration
//! (CLI commands, the worker loop) where the particular variant no longer
//! matters and only `?`-propagation and context annotation are needed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("timeout fetching {0}")]
    Timeout(String),
    #[error("non-2xx status {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("robots.txt disallows fetching {0}")]
    RobotsDisallowed(String),
    #[error("browser render error: {0}")]
    BrowserRender(String),
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("missing selector: {0}")]
    MissingSelector(String),
    #[error("invalid json: {0}")]
    InvalidJson(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("could not resolve team: {raw} ({sport})")]
    TeamUnresolved { raw: String, sport: String },
    #[error("database unavailable")]
    DbUnavailable(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum GradeError {
    #[error("result unmatched to an internal match")]
    ResultUnmatched,
    #[error("database unavailable")]
    DbUnavailable(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("insufficient data to score match {0}")]
    InsufficientData(String),
    #[error("database unavailable")]
    DbUnavailable(#[from] sqlx::Error),
    #[error("cache unavailable")]
    CacheUnavailable(#[from] redis::RedisError),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression `{expr}`: {source}")]
    InvalidCron {
        expr: String,
        #[source]
        source: cron::error::Error,
    },
    #[error("database unavailable")]
    DbUnavailable(#[from] sqlx::Error),
    #[error("cache unavailable")]
    CacheUnavailable(#[from] redis::RedisError),
}
