//! The headless browser is treated as an external capability behind an
//! interface (§9): `{ render(url, actions) -> html }`. Production uses
//! `chromiumoxide`; tests use a fixed-HTML double so adapter/worker tests
//! never spawn a real browser.

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::target::CreateBrowserContextParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::{Mutex, Semaphore};

use crate::error::FetchError;

/// A callback run against the rendered page before HTML is captured: wait
/// for a selector, scroll, inject JS. Expected to never throw — a
/// selector-wait timeout is swallowed and parsing proceeds on whatever was
/// captured (§4.A, §7 `Browser-render-timeout`).
pub type BrowserActions = Box<dyn Fn(&Page) -> BoxFuture + Send + Sync>;
pub type BoxFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn render(
        &self,
        url: &str,
        actions: Option<&BrowserActions>,
    ) -> Result<String, FetchError>;
}

/// One leased incognito browser context. Kept separate from its siblings so
/// a page crash inside one lease can't take down a concurrent render
/// running in another context.
struct BrowserContext {
    id: chromiumoxide::cdp::browser_protocol::target::BrowserContextId,
}

/// A bounded pool of persistent browser contexts (§5): one `Browser`
/// process, `config.browser_context_count` isolated contexts, each page
/// leased from its own context and closed after. Concurrency is capped by
/// a `Semaphore` sized to the pool so callers past the limit wait for a
/// context to free up instead of piling pages onto a single one.
pub struct ChromiumoxideBrowserDriver {
    browser: Browser,
    contexts: Vec<Arc<Mutex<BrowserContext>>>,
    permits: Semaphore,
}

impl ChromiumoxideBrowserDriver {
    pub async fn launch(context_count: usize) -> Result<Self, FetchError> {
        let context_count = context_count.max(1);
        let config = BrowserConfig::builder()
            .build()
            .map_err(|e| FetchError::BrowserRender(e.to_string()))?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::BrowserRender(e.to_string()))?;
        tokio::spawn(async move { while handler.next().await.is_some() {} });

        let mut contexts = Vec::with_capacity(context_count);
        for _ in 0..context_count {
            let id = browser
                .create_browser_context(CreateBrowserContextParams::default())
                .await
                .map_err(|e| FetchError::BrowserRender(e.to_string()))?;
            contexts.push(Arc::new(Mutex::new(BrowserContext { id })));
        }

        Ok(Self {
            browser,
            permits: Semaphore::new(contexts.len()),
            contexts,
        })
    }

    /// Finds a context not currently leased by another in-flight render. A
    /// held `Semaphore` permit guarantees at least one is free.
    async fn lease_context(&self) -> Arc<Mutex<BrowserContext>> {
        loop {
            for context in &self.contexts {
                if let Ok(guard) = context.clone().try_lock_owned() {
                    drop(guard);
                    return context.clone();
                }
            }
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumoxideBrowserDriver {
    async fn render(
        &self,
        url: &str,
        actions: Option<&BrowserActions>,
    ) -> Result<String, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| FetchError::BrowserRender(e.to_string()))?;
        let context = self.lease_context().await;
        let context = context.lock().await;

        let page = self
            .browser
            .new_page_in_context(context.id.clone(), url)
            .await
            .map_err(|e| FetchError::BrowserRender(e.to_string()))?;

        if let Some(actions) = actions {
            // Selector-wait timeouts inside `actions` are swallowed by the
            // caller's own closure; we never propagate them as an error.
            actions(&page).await;
        }

        let html = page
            .content()
            .await
            .map_err(|e| FetchError::BrowserRender(e.to_string()))?;
        let _ = page.close().await;
        Ok(html)
    }
}

/// Test double returning canned HTML; satisfies §9's "a test
/// implementation returns fixed HTML".
pub struct FixedHtmlBrowserDriver {
    pub html: String,
}

#[async_trait]
impl BrowserDriver for FixedHtmlBrowserDriver {
    async fn render(
        &self,
        _url: &str,
        _actions: Option<&BrowserActions>,
    ) -> Result<String, FetchError> {
        Ok(self.html.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_html_driver_ignores_url_and_actions() {
        let driver = FixedHtmlBrowserDriver {
            html: "<html>fixed</html>".to_string(),
        };
        let html = driver.render("https://example.test", None).await.unwrap();
        assert_eq!(html, "<html>fixed</html>");
    }
}
