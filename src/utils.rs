use url::Url;

/// Canonical string form of a URL used as the dedupe key.
///
/// Scheme and host are lowercased (the `url` crate already does this when
/// parsing), the fragment and any trailing slashes on the path are removed,
/// and the query string is kept verbatim.
pub fn normalize_url(url: &Url) -> String {
    let mut stripped = url.clone();
    stripped.set_fragment(None);
    let query = stripped.query().map(str::to_owned);
    stripped.set_query(None);

    let mut normalized = stripped.to_string();
    while normalized.ends_with('/') && !normalized.ends_with("://") {
        normalized.pop();
    }
    if let Some(query) = query {
        normalized.push('?');
        normalized.push_str(&query);
    }
    normalized
}

/// Resolve `href` against `base` and normalize it.
///
/// Returns `None` for references that do not resolve to an http(s) URL with a
/// host, and for same-page anchors.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") || resolved.host_str().is_none() {
        return None;
    }
    let normalized = normalize_url(&resolved);
    if normalized.trim().is_empty() {
        return None;
    }
    Some(normalized)
}

/// Collapse all runs of whitespace to a single space and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}
