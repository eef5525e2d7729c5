//! Page sources for the in-process backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;
use uiprobe_core::{Error, HttpClient, Result};
use url::Url;

/// Produces the markup for a URL. The environment parses whatever the
/// loader returns into its embedded document.
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<String>;
}

/// Fetches pages over HTTP.
pub struct HttpLoader {
    client: HttpClient,
}

impl HttpLoader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: HttpClient::new()?,
        })
    }
}

#[async_trait]
impl PageLoader for HttpLoader {
    async fn load(&self, url: &str) -> Result<String> {
        debug!(url, "loading page");
        let response = self.client.request("get", url, None, &[]).await?;
        if response.status >= 400 {
            return Err(Error::Page(format!(
                "page load failed with status {} for {url}",
                response.status
            )));
        }
        Ok(response.body)
    }
}

/// Serves pages from an in-memory map keyed by URL path. Used by tests
/// and by suites that run against static fixtures.
#[derive(Default)]
pub struct FixtureLoader {
    pages: HashMap<String, String>,
}

impl FixtureLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, html: &str) {
        self.pages.insert(path.to_string(), html.to_string());
    }

    pub fn with_page(mut self, path: &str, html: &str) -> Self {
        self.insert(path, html);
        self
    }
}

#[async_trait]
impl PageLoader for FixtureLoader {
    async fn load(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url).map_err(|e| Error::Config(format!("invalid URL {url}: {e}")))?;
        self.pages
            .get(parsed.path())
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no fixture for {}", parsed.path())))
    }
}
