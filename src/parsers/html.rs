use crate::parsers::CONTEXT_MAX_CHARS;
use crate::results::CandidateLink;
use crate::utils::{clip, collapse_whitespace, resolve_link};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements whose text is a reasonable "surrounding context" for a link
const CONTEXT_ELEMENTS: &[&str] = &[
    "li", "tr", "td", "p", "dd", "dt", "article", "section", "div", "h1", "h2", "h3", "h4",
];

/// Parses HTML content and extracts every `<a href>` as a candidate link
pub fn extract_links(html: &str, base_url: &Url, source_name: &str) -> Vec<CandidateLink> {
    let doc = Html::parse_document(html);
    let Ok(link_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in doc.select(&link_selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_link(base_url, href) else {
            ::log::trace!("Skipping unresolvable link: {}", href);
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        let mut anchor_text = collapse_whitespace(&anchor.text().collect::<String>());
        if anchor_text.is_empty() {
            anchor_text = url.clone();
        }
        let context = surrounding_context(&anchor).unwrap_or_else(|| anchor_text.clone());

        links.push(CandidateLink::new(url, anchor_text, context, source_name));
    }

    ::log::debug!("HTML parser found {} links", links.len());
    if !links.is_empty() {
        ::log::debug!(
            "First few links: {:?}",
            links.iter().take(5).map(|l| &l.url).collect::<Vec<_>>()
        );
    }

    links
}

/// Text of the closest enclosing block element, clipped.
///
/// Text belonging to other links in the same block is left out so that a
/// neighbouring anchor's keywords never count towards this one.
fn surrounding_context(anchor: &ElementRef<'_>) -> Option<String> {
    let container = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| CONTEXT_ELEMENTS.contains(&el.value().name()))?;

    let mut parts = Vec::new();
    for node in container.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let inside_other_link = node
            .ancestors()
            .take_while(|ancestor| ancestor.id() != container.id())
            .filter_map(ElementRef::wrap)
            .any(|el| el.value().name() == "a" && el.id() != anchor.id());
        if !inside_other_link {
            parts.push(&**text);
        }
    }

    let text = collapse_whitespace(&parts.join(" "));
    if text.is_empty() {
        None
    } else {
        Some(clip(&text, CONTEXT_MAX_CHARS))
    }
}
