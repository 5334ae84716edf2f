use crate::parsers::text;

#[test]
fn test_empty_text() {
    assert!(text::extract_links("", "Feed").is_empty());
    assert!(text::extract_links("   \n   \t   \r\n   ", "Feed").is_empty());
}

#[test]
fn test_line_is_context() {
    let input = "Notices\n  RFP 24-17   software portal: https://bids.example.org/24-17.\nOther line";
    let links = text::extract_links(input, "Feed");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].url, "https://bids.example.org/24-17");
    assert_eq!(links[0].anchor_text, links[0].url);
    assert_eq!(
        links[0].context,
        "RFP 24-17 software portal: https://bids.example.org/24-17."
    );
}

#[test]
fn test_duplicate_urls_keep_first_line() {
    let input = "first https://a.example.org/x/\nsecond https://A.example.org/x";
    let links = text::extract_links(input, "Feed");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].context, "first https://a.example.org/x/");
}

#[test]
fn test_ignores_non_http_schemes() {
    let input = "ftp://files.example.org/a mailto:x@example.org";
    assert!(text::extract_links(input, "Feed").is_empty());
}
