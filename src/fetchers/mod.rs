pub mod http;
pub mod webdriver;

use crate::config::{FetchBackend, FetchConfig};
use crate::error::FetchError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub use http::HttpFetcher;
pub use webdriver::WebDriverFetcher;

/// A successfully retrieved page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL the body was finally served from (after redirects)
    pub url: Url,
    pub body: String,
    pub content_type: Option<String>,
}

/// Retrieves one source page. Implementations enforce their own timeout and
/// report it as [`FetchError::Timeout`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// Build the fetcher selected by configuration
pub fn from_config(config: &FetchConfig) -> Result<Arc<dyn PageFetcher>, FetchError> {
    match config.backend {
        FetchBackend::Http => Ok(Arc::new(HttpFetcher::new(config)?)),
        FetchBackend::WebDriver => Ok(Arc::new(WebDriverFetcher::new(config))),
    }
}

/// Fetcher serving canned pages, keyed by URL string. Unknown URLs fail with 404.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, Result<String, u16>>,
    stalled: HashSet<String>,
}

/// How long a stalled page is waited on before timing out
const STALL_TIMEOUT_SECS: u64 = 1;

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`
    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    /// Fail `url` with the given HTTP status
    pub fn with_failure(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), Err(status));
        self
    }

    /// Never answer `url`; the fetch times out after one second
    pub fn with_stall(mut self, url: &str) -> Self {
        self.stalled.insert(url.to_string());
        self
    }

    /// Replace the body served for `url`
    pub fn set_page(&mut self, url: &str, body: &str) {
        self.pages.insert(url.to_string(), Ok(body.to_string()));
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        if self.stalled.contains(url.as_str()) {
            let wait = Duration::from_secs(STALL_TIMEOUT_SECS);
            let _ = tokio::time::timeout(wait, std::future::pending::<()>()).await;
            return Err(FetchError::Timeout(STALL_TIMEOUT_SECS));
        }
        match self.pages.get(url.as_str()) {
            Some(Ok(body)) => Ok(FetchedPage {
                url: url.clone(),
                body: body.clone(),
                content_type: Some("text/html".to_string()),
            }),
            Some(Err(status)) => Err(FetchError::Status(*status)),
            None => Err(FetchError::Status(404)),
        }
    }
}
