use crate::parsers::CONTEXT_MAX_CHARS;
use crate::results::CandidateLink;
use crate::utils::{clip, collapse_whitespace, normalize_url};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'`]+"#).expect("static URL pattern"));

/// Trailing characters that belong to the sentence, not the URL
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', ')', ']', '!', '?'];

/// Extracts bare absolute URLs from plain text.
///
/// The line a URL appears on is used as its context; plain text has no anchor
/// text, so the URL itself stands in.
pub fn extract_links(text: &str, source_name: &str) -> Vec<CandidateLink> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for line in text.lines() {
        let context = clip(&collapse_whitespace(line), CONTEXT_MAX_CHARS);
        for found in URL_PATTERN.find_iter(line) {
            let raw = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
            let Ok(parsed) = Url::parse(raw) else {
                continue;
            };
            if parsed.host_str().is_none() {
                continue;
            }
            let url = normalize_url(&parsed);
            if !seen.insert(url.clone()) {
                continue;
            }
            links.push(CandidateLink::new(
                url.clone(),
                url,
                context.clone(),
                source_name,
            ));
        }
    }

    ::log::debug!("Text parser found {} links", links.len());
    links
}
