//! Per-base-URL robots.txt cache (§6 "a robots.txt fetcher caches
//! per-base-URL for reuse"). Parsing is delegated to the `robotstxt`
//! crate rather than hand-rolled, matching the "never fall back to
//! stdlib where an ecosystem crate exists" rule.

use std::collections::HashMap;
use std::sync::Arc;

use robotstxt::DefaultMatcher;
use tokio::sync::RwLock;

const USER_AGENT: &str = "PickforgeBot";

pub struct RobotsCache {
    client: reqwest::Client,
    cache: RwLock<HashMap<String, Arc<String>>>,
}

impl RobotsCache {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn robots_txt_for(&self, base_url: &str) -> Arc<String> {
        if let Some(cached) = self.cache.read().await.get(base_url) {
            return cached.clone();
        }

        let body = self
            .client
            .get(format!("{base_url}/robots.txt"))
            .send()
            .await
            .ok()
            .and_then(|r| if r.status().is_success() { Some(r) } else { None });

        let text = match body {
            Some(response) => response.text().await.unwrap_or_default(),
            None => String::new(),
        };

        let text = Arc::new(text);
        self.cache
            .write()
            .await
            .insert(base_url.to_string(), text.clone());
        text
    }

    /// Returns `true` when `path` on `base_url` is allowed for our agent.
    /// A missing/unreachable robots.txt is treated as allow-all (empty
    /// content permits everything under the matcher's semantics).
    pub async fn is_allowed(&self, base_url: &str, path: &str) -> bool {
        let robots_txt = self.robots_txt_for(base_url).await;
        let url = format!("{base_url}{path}");
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&robots_txt, USER_AGENT, &url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_robots_txt_allows_everything() {
        let mut matcher = DefaultMatcher::default();
        let allowed =
            matcher.one_agent_allowed_by_robots("", USER_AGENT, "https://example.test/picks");
        assert!(allowed);
    }

    #[test]
    fn disallow_rule_blocks_matching_path() {
        let robots_txt = "User-agent: *\nDisallow: /private/";
        let mut matcher = DefaultMatcher::default();
        assert!(!matcher.one_agent_allowed_by_robots(
            robots_txt,
            USER_AGENT,
            "https://example.test/private/odds"
        ));
        assert!(matcher.one_agent_allowed_by_robots(
            robots_txt,
            USER_AGENT,
            "https://example.test/picks"
        ));
    }
}
