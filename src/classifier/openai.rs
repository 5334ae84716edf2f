use crate::classifier::{Classification, RelevanceClassifier};
use crate::error::ClassifyError;
use crate::results::CandidateLink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You triage procurement postings. Keep only opportunities that involve \
software, web, digital products, data/analytics, platforms, portals, LMS, edtech, or technical \
consulting. Drop construction, fleet/vehicles, physical supplies, janitorial, roads, HVAC, \
plumbing, landscaping, hardware-only, or general maintenance.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_completion_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// The JSON object the model is asked to return
#[derive(Debug, Deserialize)]
struct Verdict {
    keep: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Relevance classifier backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiClassifier {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    rationale: bool,
}

impl OpenAiClassifier {
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Result<Self, ClassifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: OPENAI_API_URL.to_string(),
            rationale: false,
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Keep the model's one-line reason on relevant items
    pub fn with_rationale(mut self, rationale: bool) -> Self {
        self.rationale = rationale;
        self
    }

    fn request<'a>(&'a self, candidate: &CandidateLink) -> ChatRequest<'a> {
        let user = format!(
            "Classify this posting as keep (true/false) and give a 1-line reason. \
             Return a JSON object like {{\"keep\":true,\"reason\":\"...\"}}.\n\
             Title: {}\nContext: {}\nURL: {}",
            candidate.anchor_text, candidate.context, candidate.url
        );
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_completion_tokens: 400,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

/// Turn the model's message content into a classification
fn parse_verdict(content: &str, rationale: bool) -> Result<Classification, ClassifyError> {
    let verdict: Verdict = serde_json::from_str(content.trim())
        .map_err(|e| ClassifyError::Malformed(format!("{e}: {content}")))?;
    let classification = if verdict.keep {
        Classification::relevant()
    } else {
        Classification::irrelevant()
    };
    Ok(match verdict.reason.filter(|r| rationale && !r.trim().is_empty()) {
        Some(reason) => classification.with_reason(reason.trim()),
        None => classification,
    })
}

#[async_trait]
impl RelevanceClassifier for OpenAiClassifier {
    fn name(&self) -> &str {
        "openai"
    }

    async fn classify(&self, candidate: &CandidateLink) -> Result<Classification, ClassifyError> {
        let url = format!("{}/chat/completions", self.base_url);
        ::log::debug!("Classifying {} with model {}", candidate.url, self.model);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request(candidate))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Api { status, body });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassifyError::Malformed(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClassifyError::Malformed("no choices in response".to_string()))?;

        parse_verdict(&content, self.rationale)
    }
}
