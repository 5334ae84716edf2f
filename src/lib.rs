pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetchers;
pub mod filter;
pub mod parsers;
pub mod poller;
pub mod report;
pub mod results;
pub mod store;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{MonitorConfig, SourceConfig};
pub use error::{ConfigError, RunError, StoreError};
pub use results::{CandidateLink, RunResult, SourceError};
pub use store::{JsonFileStore, MemoryStore, SeenSet, SeenStore};

use classifier::RelevanceClassifier;
use coordinator::RunCoordinator;
use fetchers::PageFetcher;
use poller::SourcePoller;
use std::sync::Arc;

/// Main builder for one monitoring run over a configured source list
pub struct RfpMonitor {
    config: MonitorConfig,
    fetcher: Option<Arc<dyn PageFetcher>>,
    classifier: Option<Arc<dyn RelevanceClassifier>>,
    force_refresh: bool,
}

impl RfpMonitor {
    /// Create a new monitor for the given configuration
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            fetcher: None,
            classifier: None,
            force_refresh: false,
        }
    }

    /// Load configuration from a YAML file
    pub fn from_config_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        Ok(Self::new(MonitorConfig::from_file(path)?))
    }

    /// Use a specific fetcher instead of the configured backend
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use a specific classifier instead of the configured one
    pub fn with_classifier(mut self, classifier: Arc<dyn RelevanceClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Set the maximum number of sources fetched at once
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.config.fetch.max_concurrency = max_concurrency;
        self
    }

    /// Set the per-fetch timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.config.fetch.timeout_secs = timeout_secs;
        self
    }

    /// Ignore previously seen URLs for this run
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Run the pipeline once against `store`.
    ///
    /// Configuration problems and seen-store failures are fatal; everything that
    /// can be pinned on a single source ends up in [`RunResult::errors`].
    pub async fn run(&self, store: &mut dyn SeenStore) -> Result<RunResult, RunError> {
        self.config.validate()?;

        let fetcher = match &self.fetcher {
            Some(fetcher) => Arc::clone(fetcher),
            None => fetchers::from_config(&self.config.fetch)?,
        };
        let classifier = match &self.classifier {
            Some(classifier) => Arc::clone(classifier),
            None => classifier::from_config(
                &self.config.llm,
                self.config.fetch.timeout_secs,
                config::process_env,
            ),
        };

        let poller = SourcePoller::new(fetcher, classifier)
            .with_global_rules(&self.config.drop_keywords, &self.config.skip_url_patterns);

        RunCoordinator::new(poller)
            .with_max_concurrency(self.config.fetch.max_concurrency)
            .with_force_refresh(self.force_refresh)
            .run(&self.config.sources, store)
            .await
    }
}
