pub mod html;
pub mod text;

#[cfg(test)]
mod tests;

use crate::results::CandidateLink;
use url::Url;

/// Maximum length of the context snippet attached to a candidate
pub const CONTEXT_MAX_CHARS: usize = 300;

/// Enum to represent the kinds of page body we know how to pull links from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserType {
    /// HTML parser
    Html,
    /// Plain text parser (bare URLs, one context per line)
    Text,
}

impl ParserType {
    /// Determines the parser type from the response content type, falling back to the URL
    pub fn detect(content_type: Option<&str>, url: &str) -> Self {
        if let Some(content_type) = content_type {
            let content_type = content_type.to_ascii_lowercase();
            if content_type.starts_with("text/plain") {
                ::log::debug!("Classifying as Text (content-type): {}", url);
                return ParserType::Text;
            }
            if content_type.contains("html") || content_type.contains("xml") {
                return ParserType::Html;
            }
        }
        Self::from_url(url)
    }

    /// Determines the parser type based on the URL
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.ends_with(".txt") {
            ::log::debug!("Classifying as Text: {}", url);
            ParserType::Text
        } else {
            ParserType::Html
        }
    }
}

/// Extract candidate links from a fetched page body.
///
/// Every link is resolved against `base_url` and normalized; links that do not
/// resolve to an http(s) URL are skipped, and later duplicates of a URL on the
/// same page are dropped in favour of the first occurrence. Never fails:
/// malformed input yields whatever links could be recovered.
pub fn extract(
    page_body: &str,
    base_url: &Url,
    parser_type: ParserType,
    source_name: &str,
) -> Vec<CandidateLink> {
    let links = match parser_type {
        ParserType::Html => html::extract_links(page_body, base_url, source_name),
        ParserType::Text => text::extract_links(page_body, source_name),
    };
    ::log::debug!("Extracted {} candidate links from {}", links.len(), base_url);
    links
}
