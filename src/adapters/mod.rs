pub mod action_network;
pub mod covers_consensus;
pub mod framework;
pub mod oddsshark;
pub mod vsin;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{FetchMethod, RawPrediction, Sport};

#[derive(Debug, Clone, Copy)]
pub enum BackoffKind {
    Exponential,
}

#[derive(Debug, Clone)]
pub struct Backoff {
    pub kind: BackoffKind,
    pub delay_ms: u64,
}

impl Backoff {
    /// `delay × 2^attempt` (§4.H retry policy).
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        match self.kind {
            BackoffKind::Exponential => self.delay_ms.saturating_mul(2u64.saturating_pow(attempt)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub fetch_method: FetchMethod,
    /// sport -> URL path, relative to `base_url`.
    pub paths: HashMap<Sport, String>,
    /// 6-field cron expression (seconds precision).
    pub cron: String,
    pub rate_limit_ms: u64,
    pub max_retries: u32,
    pub backoff: Backoff,
}

type ParseFn = dyn Fn(&[u8], &str, DateTime<Utc>) -> Vec<RawPrediction> + Send + Sync;
type DiscoverFn = dyn Fn(&str, &str) -> Vec<String> + Send + Sync;

/// A tagged record, not a trait object: `config` plus plain closures for
/// `parse` and the optional `discoverUrls` (§9 adapter polymorphism note).
/// Adding a source means building one more `Adapter` value, not a new type.
pub struct Adapter {
    pub config: AdapterConfig,
    pub parse: Box<ParseFn>,
    pub discover_urls: Option<Box<DiscoverFn>>,
}

impl Adapter {
    pub fn is_two_stage(&self) -> bool {
        self.discover_urls.is_some()
    }
}

pub struct Registry {
    adapters: HashMap<String, Adapter>,
}

impl Registry {
    pub fn get(&self, id: &str) -> Option<&Adapter> {
        self.adapters.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Adapter> {
        self.adapters.values()
    }

    fn insert(&mut self, adapter: Adapter) {
        self.adapters.insert(adapter.config.id.clone(), adapter);
    }
}

/// Builds the full adapter registry once at startup. Stateless: every
/// `Adapter` value is self-contained, no shared mutable state between
/// sources.
pub fn build_registry() -> Registry {
    let mut registry = Registry {
        adapters: HashMap::new(),
    };
    registry.insert(covers_consensus::adapter());
    registry.insert(action_network::adapter());
    registry.insert(vsin::adapter());
    registry.insert(oddsshark::adapter());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_all_representative_shapes() {
        let registry = build_registry();
        assert!(registry.get("covers-consensus").is_some());
        assert!(registry.get("action-network").is_some());
        assert!(registry.get("vsin").is_some());
        assert!(registry.get("oddsshark").is_some());
        assert!(registry.get("not-a-real-source").is_none());
    }

    #[test]
    fn oddsshark_is_two_stage() {
        let registry = build_registry();
        let adapter = registry.get("oddsshark").unwrap();
        assert!(adapter.is_two_stage());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let backoff = Backoff {
            kind: BackoffKind::Exponential,
            delay_ms: 500,
        };
        assert_eq!(backoff.delay_for_attempt(0), 500);
        assert_eq!(backoff.delay_for_attempt(1), 1000);
        assert_eq!(backoff.delay_for_attempt(3), 4000);
    }
}
