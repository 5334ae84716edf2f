use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::fetchers::{FetchedPage, PageFetcher};
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

/// Fetches pages through a WebDriver server so script-built listings are rendered.
///
/// Each fetch opens its own session and closes it afterwards; sources are few
/// and a shared session would serialize them.
pub struct WebDriverFetcher {
    webdriver_url: String,
    timeout_secs: u64,
}

impl WebDriverFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    async fn connect(&self) -> Result<Client, FetchError> {
        ClientBuilder::native()
            .connect(&self.webdriver_url)
            .await
            .map_err(|e| {
                FetchError::WebDriver(format!(
                    "failed to connect to WebDriver at {}: {}",
                    self.webdriver_url, e
                ))
            })
    }

    async fn render(client: &Client, url: &Url) -> Result<FetchedPage, FetchError> {
        client
            .goto(url.as_str())
            .await
            .map_err(|e| navigation_error(e, "accessing", url))?;
        let body = client
            .source()
            .await
            .map_err(|e| navigation_error(e, "getting source for", url))?;
        let final_url = client.current_url().await.unwrap_or_else(|_| url.clone());
        Ok(FetchedPage {
            url: final_url,
            body,
            content_type: None,
        })
    }
}

#[async_trait]
impl PageFetcher for WebDriverFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        // Connecting counts against the same deadline as rendering
        let mut session = None;
        let result = timeout(Duration::from_secs(self.timeout_secs), async {
            let client = session.insert(self.connect().await?);
            ::log::debug!("Connected to WebDriver at {}", self.webdriver_url);
            Self::render(client, url).await
        })
        .await;

        if let Some(client) = session {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver client: {}", e);
            }
        }

        match result {
            Ok(page) => page,
            Err(_) => {
                ::log::error!("Timeout rendering: {}", url);
                Err(FetchError::Timeout(self.timeout_secs))
            }
        }
    }
}

/// Map a WebDriver command error, noting lost sessions separately
fn navigation_error(error: fantoccini::error::CmdError, context: &str, url: &Url) -> FetchError {
    if error.to_string().contains("Unable to find session") {
        ::log::warn!("Lost WebDriver session while {} {}", context, url);
    }
    FetchError::WebDriver(format!("failed {} {}: {}", context, url, error))
}
