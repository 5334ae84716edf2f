use crate::parsers::html;
use url::Url;

fn base() -> Url {
    Url::parse("https://city.gov/procurement/").unwrap()
}

#[test]
fn test_resolves_relative_links() {
    let page = r#"<html><body>
        <a href="bids/2024-web.html">2024 RFP Website Redesign</a>
        <a href="/about">About</a>
        <a href="https://other.org/x">External</a>
    </body></html>"#;
    let links = html::extract_links(page, &base(), "City");
    let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://city.gov/procurement/bids/2024-web.html",
            "https://city.gov/about",
            "https://other.org/x",
        ]
    );
    assert!(links.iter().all(|l| l.source_name == "City"));
}

#[test]
fn test_keeps_first_occurrence_of_duplicate_url() {
    let page = r#"<ul>
        <li><a href="/rfp/1">RFP 1 first</a></li>
        <li><a href="/rfp/1/#details">RFP 1 again</a></li>
    </ul>"#;
    let links = html::extract_links(page, &base(), "City");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].anchor_text, "RFP 1 first");
}

#[test]
fn test_skips_non_http_and_anchor_links() {
    let page = r##"<p>
        <a href="mailto:buyer@city.gov">Email</a>
        <a href="#top">Top</a>
        <a href="javascript:void(0)">Menu</a>
        <a href="">Empty</a>
        <a>No href</a>
    </p>"##;
    assert!(html::extract_links(page, &base(), "City").is_empty());
}

#[test]
fn test_context_is_enclosing_block() {
    let page = r#"<table><tr>
        <td>Closes March 3</td>
        <td><a href="/bid/9">Bid 9</a></td>
    </tr></table>"#;
    let links = html::extract_links(page, &base(), "City");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].anchor_text, "Bid 9");
    assert_eq!(links[0].context, "Bid 9");

    let page = r#"<li>Request for Proposal: <a href="/bid/10">Bid 10</a> due May</li>"#;
    let links = html::extract_links(page, &base(), "City");
    assert_eq!(links[0].context, "Request for Proposal: Bid 10 due May");
}

#[test]
fn test_context_leaves_out_neighbouring_links() {
    let page = r#"<div class="content">
        <a href="/rfp/web">2024 RFP — Website Redesign</a><br>
        <a href="/reports/annual">Annual Report</a>
    </div>"#;
    let links = html::extract_links(page, &base(), "City");
    let contexts: Vec<_> = links.iter().map(|l| l.context.as_str()).collect();
    assert_eq!(contexts, vec!["2024 RFP — Website Redesign", "Annual Report"]);

    let page = r#"<p>Posted <a href="/bid/11">Bid 11</a> see <a href="/rfp/12">RFP 12</a> today</p>"#;
    let links = html::extract_links(page, &base(), "City");
    let contexts: Vec<_> = links.iter().map(|l| l.context.as_str()).collect();
    assert_eq!(contexts, vec!["Posted Bid 11 see today", "Posted see RFP 12 today"]);
}

#[test]
fn test_empty_anchor_text_falls_back_to_url() {
    let page = r#"<a href="/doc.pdf"><img src="icon.png"></a>"#;
    let links = html::extract_links(page, &base(), "City");
    assert_eq!(links[0].anchor_text, "https://city.gov/doc.pdf");
}

#[test]
fn test_malformed_markup_is_best_effort() {
    let page = r#"<div><a href="/one">One<a href="/two">Two</div></span><a href="/three">Three"#;
    let links = html::extract_links(page, &base(), "City");
    let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://city.gov/one",
            "https://city.gov/two",
            "https://city.gov/three",
        ]
    );
}
