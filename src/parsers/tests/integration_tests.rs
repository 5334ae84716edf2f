use crate::parsers::{self, ParserType};
use url::Url;

#[test]
fn test_extract_dispatches_on_parser_type() {
    let base = Url::parse("https://example.org/notices/").unwrap();
    let html = r#"<html><body><p>Hello</p><a href="rfp.html">RFP</a></body></html>"#;
    let links = parsers::extract(html, &base, ParserType::Html, "S");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].url, "https://example.org/notices/rfp.html");

    let text = "see https://example.org/rfp/1 for details";
    let links = parsers::extract(text, &base, ParserType::Text, "S");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].url, "https://example.org/rfp/1");
}

#[test]
fn test_detect_parser_type() {
    let cases = [
        (Some("text/html; charset=utf-8"), "https://x.org/list.txt", ParserType::Html),
        (Some("text/plain"), "https://x.org/page", ParserType::Text),
        (None, "https://x.org/list.txt", ParserType::Text),
        (None, "https://x.org/list.txt?v=2", ParserType::Text),
        (None, "https://x.org/page", ParserType::Html),
        (Some("application/octet-stream"), "https://x.org/page", ParserType::Html),
    ];

    for (content_type, url, expected) in cases {
        assert_eq!(
            ParserType::detect(content_type, url),
            expected,
            "{:?} {} should be parsed as {:?}",
            content_type,
            url,
            expected
        );
    }
}
