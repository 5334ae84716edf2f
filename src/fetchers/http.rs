use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::fetchers::{FetchedPage, PageFetcher};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

/// Plain HTTP GET fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        ::log::debug!("GET {}", url);
        let start = std::time::Instant::now();

        let request = async {
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            let final_url = response.url().clone();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await?;
            Ok::<_, FetchError>(FetchedPage {
                url: final_url,
                body,
                content_type,
            })
        };

        let page = match timeout(Duration::from_secs(self.timeout_secs), request).await {
            Ok(result) => result.map_err(|e| match e {
                FetchError::Transport(err) if err.is_timeout() => {
                    FetchError::Timeout(self.timeout_secs)
                }
                other => other,
            })?,
            Err(_) => return Err(FetchError::Timeout(self.timeout_secs)),
        };

        ::log::debug!(
            "Fetched {} ({} bytes) in {:.2} seconds",
            page.url,
            page.body.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(page)
    }
}
