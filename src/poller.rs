use crate::classifier::{self, RelevanceClassifier};
use crate::config::SourceConfig;
use crate::fetchers::PageFetcher;
use crate::filter::KeywordFilter;
use crate::parsers::{self, ParserType};
use crate::results::CandidateLink;
use crate::store::SeenSet;
use std::sync::Arc;
use url::Url;

/// Outcome of polling one source
#[derive(Debug, Clone, Default)]
pub struct SourcePoll {
    pub source_name: String,

    /// New relevant links, in page order
    pub new_items: Vec<CandidateLink>,

    /// Why the source could not be polled, if it could not
    pub error: Option<String>,
}

impl SourcePoll {
    fn failed(source: &SourceConfig, error: String) -> Self {
        Self {
            source_name: source.name.clone(),
            new_items: Vec::new(),
            error: Some(error),
        }
    }
}

/// Runs one fetch, extract, filter, classify, dedupe cycle per source
pub struct SourcePoller {
    fetcher: Arc<dyn PageFetcher>,
    classifier: Arc<dyn RelevanceClassifier>,
    drop_keywords: Vec<String>,
    skip_url_patterns: Vec<String>,
}

impl SourcePoller {
    pub fn new(fetcher: Arc<dyn PageFetcher>, classifier: Arc<dyn RelevanceClassifier>) -> Self {
        Self {
            fetcher,
            classifier,
            drop_keywords: Vec::new(),
            skip_url_patterns: Vec::new(),
        }
    }

    /// Apply the global trade-word and navigation-URL drop lists to every source
    pub fn with_global_rules(mut self, drop_keywords: &[String], skip_url_patterns: &[String]) -> Self {
        self.drop_keywords = drop_keywords.to_vec();
        self.skip_url_patterns = skip_url_patterns.to_vec();
        self
    }

    /// Poll one source against the run's seen snapshot.
    ///
    /// Never fails: fetch problems come back in [`SourcePoll::error`] so the
    /// caller can carry on with the remaining sources. The snapshot is only read.
    pub async fn poll(&self, source: &SourceConfig, seen: &SeenSet) -> SourcePoll {
        ::log::info!("Checking {} …", source.name);

        let filter = match KeywordFilter::new(source, &self.drop_keywords, &self.skip_url_patterns) {
            Ok(filter) => filter,
            Err(e) => return SourcePoll::failed(source, e.to_string()),
        };
        let url = match Url::parse(&source.url) {
            Ok(url) => url,
            Err(e) => return SourcePoll::failed(source, format!("invalid url {}: {}", source.url, e)),
        };

        let page = match self.fetcher.fetch(&url).await {
            Ok(page) => page,
            Err(e) => {
                ::log::error!("Error fetching {}: {}", source.url, e);
                return SourcePoll::failed(source, e.to_string());
            }
        };

        let parser_type = ParserType::detect(page.content_type.as_deref(), page.url.as_str());
        let candidates = parsers::extract(&page.body, &page.url, parser_type, &source.name);
        let total = candidates.len();

        let matching: Vec<CandidateLink> =
            candidates.into_iter().filter(|c| filter.passes(c)).collect();
        ::log::info!("  Found {} candidate links.", matching.len());

        let mut new_items = Vec::new();
        let mut previously_seen = 0;
        for mut candidate in matching {
            // Already reported: the verdict could not change the outcome
            if seen.contains(&candidate.url) {
                previously_seen += 1;
                continue;
            }

            let classification =
                classifier::classify_fail_open(self.classifier.as_ref(), &candidate).await;
            if !classification.relevance.keeps() {
                ::log::debug!("  Classifier dropped: {}", candidate.anchor_text);
                continue;
            }
            candidate.reason = classification.reason;
            new_items.push(candidate);
        }

        ::log::debug!(
            "  Deduplication: {} extracted, {} previously seen, {} new",
            total,
            previously_seen,
            new_items.len()
        );

        SourcePoll {
            source_name: source.name.clone(),
            new_items,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classification, PassThrough};
    use crate::error::ClassifyError;
    use crate::fetchers::StaticFetcher;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAGE: &str = r#"<ul>
        <li><a href="/rfp/web">2024 RFP — Website Redesign</a></li>
        <li><a href="/reports/annual">Annual Report</a></li>
        <li><a href="/rfp/roads">RFP Road Resurfacing</a></li>
        <li><a href="/rfp/data">RFP Data Warehouse</a></li>
    </ul>"#;

    /// Drops anything mentioning "warehouse", counting calls
    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RelevanceClassifier for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn classify(&self, c: &CandidateLink) -> Result<Classification, ClassifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if c.anchor_text.to_lowercase().contains("warehouse") {
                Ok(Classification::irrelevant())
            } else {
                Ok(Classification::relevant().with_reason("digital work"))
            }
        }
    }

    fn source() -> SourceConfig {
        SourceConfig::new("City", "https://city.gov/bids").with_include(&["RFP"])
    }

    fn poller(classifier: Arc<dyn RelevanceClassifier>) -> SourcePoller {
        let fetcher = StaticFetcher::new().with_page("https://city.gov/bids", PAGE);
        SourcePoller::new(Arc::new(fetcher), classifier)
            .with_global_rules(&["road".to_string()], &[])
    }

    #[tokio::test]
    async fn test_filters_in_page_order() {
        let poll = poller(Arc::new(PassThrough)).poll(&source(), &SeenSet::new()).await;
        assert!(poll.error.is_none());
        let urls: Vec<_> = poll.new_items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://city.gov/rfp/web", "https://city.gov/rfp/data"]);
    }

    #[tokio::test]
    async fn test_classifier_narrows_and_skips_seen() {
        let counting = Arc::new(Counting::default());
        let mut seen = SeenSet::new();
        seen.add_candidates(
            &[CandidateLink::new(
                "https://city.gov/rfp/web".to_string(),
                String::new(),
                String::new(),
                "City",
            )],
            chrono::Utc::now(),
        );

        let poll = poller(counting.clone()).poll(&source(), &seen).await;
        assert!(poll.new_items.is_empty());
        // Only the unseen keyword match reached the classifier
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reason_is_attached() {
        let poll = poller(Arc::new(Counting::default()))
            .poll(&source(), &SeenSet::new())
            .await;
        assert_eq!(poll.new_items.len(), 1);
        assert_eq!(poll.new_items[0].reason.as_deref(), Some("digital work"));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported_not_raised() {
        let fetcher = StaticFetcher::new().with_failure("https://city.gov/bids", 503);
        let poll = SourcePoller::new(Arc::new(fetcher), Arc::new(PassThrough))
            .poll(&source(), &SeenSet::new())
            .await;
        assert!(poll.new_items.is_empty());
        assert_eq!(poll.error.as_deref(), Some("HTTP 503"));
    }
}
