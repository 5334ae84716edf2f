use crate::config::SourceConfig;
use crate::error::RunError;
use crate::poller::{SourcePoll, SourcePoller};
use crate::results::{RunResult, SourceError};
use crate::store::{SeenSession, SeenSet, SeenStore};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Polls every source once and commits the newly reported URLs
pub struct RunCoordinator {
    poller: Arc<SourcePoller>,
    max_concurrency: usize,
    force_refresh: bool,
}

impl RunCoordinator {
    pub fn new(poller: SourcePoller) -> Self {
        Self {
            poller: Arc::new(poller),
            max_concurrency: 4,
            force_refresh: false,
        }
    }

    /// Set the maximum number of sources polled at once
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Ignore the stored seen set for this run
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// Run the pipeline over all sources.
    ///
    /// The store is read once before polling and written once after every
    /// source has finished. Per-source failures land in [`RunResult::errors`];
    /// only store failures are fatal, and a fatal error leaves the store
    /// untouched.
    pub async fn run(
        &self,
        sources: &[SourceConfig],
        store: &mut dyn SeenStore,
    ) -> Result<RunResult, RunError> {
        let session = if self.force_refresh {
            SeenSession::open_fresh(store)?
        } else {
            SeenSession::open(store)?
        };

        let polls = self.poll_all(sources, session.snapshot()).await;

        let mut result = RunResult::default();
        let mut reported = HashSet::new();
        for poll in polls {
            if let Some(message) = poll.error {
                result.errors.push(SourceError {
                    source_name: poll.source_name,
                    message,
                });
                continue;
            }
            for item in poll.new_items {
                if reported.insert(item.url.clone()) {
                    result.new_items.push(item);
                } else {
                    ::log::debug!("Already reported by an earlier source this run: {}", item.url);
                }
            }
        }

        session.commit(&result.new_items)?;

        ::log::info!(
            "Run complete: {} new items, {} source errors",
            result.new_items.len(),
            result.errors.len()
        );
        Ok(result)
    }

    /// Poll sources concurrently, returning results in source order
    async fn poll_all(&self, sources: &[SourceConfig], seen: &SeenSet) -> Vec<SourcePoll> {
        let seen = Arc::new(seen.clone());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let handles: Vec<_> = sources
            .iter()
            .cloned()
            .map(|source| {
                let poller = Arc::clone(&self.poller);
                let seen = Arc::clone(&seen);
                let semaphore = Arc::clone(&semaphore);
                let name = source.name.clone();
                let handle = tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    poller.poll(&source, &seen).await
                });
                (name, handle)
            })
            .collect();

        let mut polls = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok(poll) => polls.push(poll),
                Err(e) => {
                    ::log::error!("Polling task for {} failed: {}", name, e);
                    polls.push(SourcePoll {
                        source_name: name,
                        new_items: Vec::new(),
                        error: Some(format!("poll task failed: {e}")),
                    });
                }
            }
        }
        polls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PassThrough;
    use crate::fetchers::StaticFetcher;
    use crate::store::MemoryStore;

    fn coordinator(fetcher: StaticFetcher) -> RunCoordinator {
        RunCoordinator::new(SourcePoller::new(Arc::new(fetcher), Arc::new(PassThrough)))
    }

    #[tokio::test]
    async fn test_cross_source_duplicates_reported_once() {
        let page = r#"<a href="https://shared.org/rfp/1">RFP shared</a>"#;
        let fetcher = StaticFetcher::new()
            .with_page("https://a.gov/", page)
            .with_page("https://b.gov/", page);
        let sources = vec![
            SourceConfig::new("A", "https://a.gov/"),
            SourceConfig::new("B", "https://b.gov/"),
        ];
        let mut store = MemoryStore::new();

        let result = coordinator(fetcher).run(&sources, &mut store).await.unwrap();
        assert_eq!(result.new_items.len(), 1);
        assert_eq!(result.new_items[0].source_name, "A");
        assert_eq!(store.set.len(), 1);
    }

    #[tokio::test]
    async fn test_timed_out_source_is_recorded_and_others_report() {
        let fetcher = StaticFetcher::new()
            .with_stall("https://slow.gov/")
            .with_page("https://a.gov/", r#"<a href="/rfp/1">RFP 1</a>"#);
        let sources = vec![
            SourceConfig::new("Slow", "https://slow.gov/"),
            SourceConfig::new("A", "https://a.gov/"),
        ];
        let mut store = MemoryStore::new();

        let result = coordinator(fetcher).run(&sources, &mut store).await.unwrap();
        assert_eq!(result.error_for("Slow"), Some("timed out after 1 seconds"));
        assert_eq!(result.new_items.len(), 1);
        assert_eq!(result.new_items[0].url, "https://a.gov/rfp/1");
        assert!(store.set.contains("https://a.gov/rfp/1"));
    }

    #[tokio::test]
    async fn test_corrupt_store_is_fatal() {
        let fetcher = StaticFetcher::new().with_page("https://a.gov/", "<a href='/x'>RFP</a>");
        let mut store = MemoryStore {
            corrupted: true,
            ..MemoryStore::default()
        };
        let sources = vec![SourceConfig::new("A", "https://a.gov/")];

        let err = coordinator(fetcher).run(&sources, &mut store).await.unwrap_err();
        assert!(matches!(err, RunError::Store(_)));
        assert_eq!(store.persists, 0);
    }

    #[tokio::test]
    async fn test_quiet_run_is_ok_and_commits_once() {
        let fetcher = StaticFetcher::new().with_page("https://a.gov/", "<p>nothing here</p>");
        let mut store = MemoryStore::new();
        let sources = vec![SourceConfig::new("A", "https://a.gov/")];

        let result = coordinator(fetcher).run(&sources, &mut store).await.unwrap();
        assert!(result.is_quiet());
        assert_eq!(store.persists, 1);
    }
}
