//! Filesystem-backed snapshot store (§4.B): `save(meta, bytes) ->
//! storage_path`, idempotent for identical `(source_id, url, fetched_at)`.
//! The downstream parse job is handed only the path and re-reads bytes,
//! keeping fetch and parse decoupled.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio::fs;

use crate::models::SnapshotMeta;

pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key(source_id: &str, url: &str, fetched_at: DateTime<Utc>) -> String {
        let joined = format!("{source_id}\u{1f}{url}\u{1f}{}", fetched_at.to_rfc3339());
        blake3::hash(joined.as_bytes()).to_hex().to_string()
    }

    fn body_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.bin"))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Writes `bytes` and a sidecar metadata file, both named from a stable
    /// hash of `(source_id, url, fetched_at)`. Re-saving the same triple
    /// overwrites rather than duplicates.
    pub async fn save(&self, meta: &SnapshotMeta, bytes: &[u8]) -> Result<String, std::io::Error> {
        fs::create_dir_all(&self.dir).await?;

        let key = Self::key(&meta.source_id, &meta.url, meta.fetched_at);
        let body_path = self.body_path(&key);
        fs::write(&body_path, bytes).await?;

        let meta_json = serde_json::to_vec_pretty(meta)?;
        fs::write(self.meta_path(&key), meta_json).await?;

        Ok(body_path.to_string_lossy().to_string())
    }

    pub async fn read(&self, storage_path: &str) -> Result<Vec<u8>, std::io::Error> {
        fs::read(storage_path).await
    }

    pub async fn read_meta(&self, storage_path: &str) -> Result<SnapshotMeta, std::io::Error> {
        let body_path = PathBuf::from(storage_path);
        let meta_path = body_path.with_extension("json");
        let bytes = fs::read(meta_path).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchMethod;

    fn sample_meta(fetched_at: DateTime<Utc>) -> SnapshotMeta {
        SnapshotMeta {
            source_id: "src-1".to_string(),
            sport: "nba".to_string(),
            url: "https://example.test/picks".to_string(),
            fetch_method: FetchMethod::Http,
            http_status: Some(200),
            duration_ms: 120,
            size_bytes: 13,
            fetched_at,
        }
    }

    #[tokio::test]
    async fn save_then_read_round_trips_bytes_and_metadata() {
        let dir = std::env::temp_dir().join(format!("pickforge-snapshot-test-{}", uuid::Uuid::new_v4()));
        let store = SnapshotStore::new(&dir);
        let fetched_at = Utc::now();
        let meta = sample_meta(fetched_at);

        let path = store.save(&meta, b"<html></html>").await.unwrap();
        let bytes = store.read(&path).await.unwrap();
        assert_eq!(bytes, b"<html></html>");

        let read_meta = store.read_meta(&path).await.unwrap();
        assert_eq!(read_meta.source_id, meta.source_id);
        assert_eq!(read_meta.url, meta.url);

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn saving_the_same_url_and_fetched_at_twice_overwrites() {
        let dir = std::env::temp_dir().join(format!("pickforge-snapshot-test-{}", uuid::Uuid::new_v4()));
        let store = SnapshotStore::new(&dir);
        let fetched_at = Utc::now();
        let meta = sample_meta(fetched_at);

        let path_a = store.save(&meta, b"first").await.unwrap();
        let path_b = store.save(&meta, b"second").await.unwrap();
        assert_eq!(path_a, path_b);

        let bytes = store.read(&path_b).await.unwrap();
        assert_eq!(bytes, b"second");

        let _ = fs::remove_dir_all(&dir).await;
    }
}
