pub mod browser;
pub mod ratelimit;
pub mod robots;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;

/// Given (source, URL, method), return page bytes and metadata, obeying
/// robots.txt and per-source rate limits — enforced upstream by the
/// worker, not here (§4.A). The Fetcher is oblivious to source semantics.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_http(&self, url: &str, timeout: Duration) -> Result<(Vec<u8>, u16), FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/124.0 Safari/537.36",
            )
            .build()
            .expect("reqwest client builds with a static user agent");
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_http(&self, url: &str, timeout: Duration) -> Result<(Vec<u8>, u16), FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    FetchError::Timeout(url.to_string())
                } else {
                    FetchError::Network {
                        url: url.to_string(),
                        source,
                    }
                }
            })?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;
        Ok((bytes.to_vec(), status))
    }
}

/// Canned-response test double, usable from any module's tests (worker
/// pool tests in particular need a `Fetcher` that never touches the
/// network).
#[cfg(test)]
pub struct FakeFetcher {
    pub body: Vec<u8>,
    pub status: u16,
}

#[cfg(test)]
#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch_http(&self, _url: &str, _timeout: Duration) -> Result<(Vec<u8>, u16), FetchError> {
        Ok((self.body.clone(), self.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_fetcher_returns_canned_response() {
        let fetcher = FakeFetcher {
            body: b"<html></html>".to_vec(),
            status: 200,
        };
        let (body, status) = fetcher
            .fetch_http("https://example.test", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, b"<html></html>");
    }
}
