pub mod openai;

use crate::config::LlmConfig;
use crate::error::ClassifyError;
use crate::results::CandidateLink;
use async_trait::async_trait;
use std::sync::Arc;

pub use openai::OpenAiClassifier;

/// Three-way relevance decision for a keyword-passing candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    Relevant,
    Irrelevant,
    /// The classifier could not decide (or failed); treated as relevant
    Unknown,
}

impl Relevance {
    /// Whether the candidate stays in the result set
    pub fn keeps(self) -> bool {
        !matches!(self, Relevance::Irrelevant)
    }
}

/// A classifier's answer, with an optional one-line rationale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub relevance: Relevance,
    pub reason: Option<String>,
}

impl Classification {
    pub fn relevant() -> Self {
        Self {
            relevance: Relevance::Relevant,
            reason: None,
        }
    }

    pub fn irrelevant() -> Self {
        Self {
            relevance: Relevance::Irrelevant,
            reason: None,
        }
    }

    pub fn unknown() -> Self {
        Self {
            relevance: Relevance::Unknown,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Secondary relevance stage run on candidates that already passed the keyword filter.
///
/// Implementations may fail; callers go through [`classify_fail_open`] so a
/// failure never drops a candidate.
#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn classify(&self, candidate: &CandidateLink) -> Result<Classification, ClassifyError>;
}

/// Classifier used when the semantic stage is disabled: every candidate is relevant
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

#[async_trait]
impl RelevanceClassifier for PassThrough {
    fn name(&self) -> &str {
        "pass-through"
    }

    async fn classify(&self, _candidate: &CandidateLink) -> Result<Classification, ClassifyError> {
        Ok(Classification::relevant())
    }
}

/// Run the classifier, mapping any failure to [`Relevance::Unknown`]
pub async fn classify_fail_open(
    classifier: &dyn RelevanceClassifier,
    candidate: &CandidateLink,
) -> Classification {
    match classifier.classify(candidate).await {
        Ok(classification) => classification,
        Err(e) => {
            ::log::warn!(
                "{} classifier failed for {}: {}; keeping it",
                classifier.name(),
                candidate.url,
                e
            );
            Classification::unknown()
        }
    }
}

/// Pick the classifier implementation the configuration asks for.
///
/// Falls back to [`PassThrough`] when the stage is disabled or no API key is
/// available, logging why.
pub fn from_config(
    llm: &LlmConfig,
    timeout_secs: u64,
    env: impl Fn(&str) -> Option<String>,
) -> Arc<dyn RelevanceClassifier> {
    if !llm.resolved_enabled(&env) {
        ::log::info!("LLM disabled via config/env; skipping LLM filtering.");
        return Arc::new(PassThrough);
    }

    let Some(api_key) = env(&llm.api_key_env).filter(|k| !k.trim().is_empty()) else {
        ::log::info!(
            "No API key found in env {}; skipping LLM filtering.",
            llm.api_key_env
        );
        return Arc::new(PassThrough);
    };

    let model = llm.resolved_model(&env);
    match OpenAiClassifier::new(&api_key, &model, timeout_secs) {
        Ok(classifier) => {
            ::log::info!("Running LLM filter with model '{}'", model);
            Arc::new(
                classifier
                    .with_base_url(&llm.base_url)
                    .with_rationale(llm.rationale),
            )
        }
        Err(e) => {
            ::log::warn!("Could not build LLM client ({}); skipping LLM filtering.", e);
            Arc::new(PassThrough)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl RelevanceClassifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn classify(&self, _: &CandidateLink) -> Result<Classification, ClassifyError> {
            Err(ClassifyError::Malformed("not json".to_string()))
        }
    }

    fn candidate() -> CandidateLink {
        CandidateLink::new(
            "https://city.gov/rfp/1".to_string(),
            "RFP 1".to_string(),
            "RFP 1".to_string(),
            "City",
        )
    }

    #[tokio::test]
    async fn test_pass_through_keeps_everything() {
        let result = classify_fail_open(&PassThrough, &candidate()).await;
        assert_eq!(result.relevance, Relevance::Relevant);
    }

    #[tokio::test]
    async fn test_failure_is_unknown_and_kept() {
        let result = classify_fail_open(&Failing, &candidate()).await;
        assert_eq!(result.relevance, Relevance::Unknown);
        assert!(result.relevance.keeps());
    }

    #[test]
    fn test_only_irrelevant_drops() {
        assert!(Relevance::Relevant.keeps());
        assert!(Relevance::Unknown.keeps());
        assert!(!Relevance::Irrelevant.keeps());
    }

    #[test]
    fn test_from_config_selects_pass_through() {
        let disabled = LlmConfig::default();
        assert_eq!(from_config(&disabled, 5, |_| None).name(), "pass-through");

        let enabled_without_key = LlmConfig {
            enabled: true,
            ..LlmConfig::default()
        };
        assert_eq!(
            from_config(&enabled_without_key, 5, |_| None).name(),
            "pass-through"
        );

        let env = |k: &str| (k == "OPENAI_API_KEY").then(|| "sk-test".to_string());
        assert_eq!(from_config(&enabled_without_key, 5, env).name(), "openai");
    }
}
