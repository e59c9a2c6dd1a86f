use feed_transform::core::document::{Document, Element};
use feed_transform::{RuleSet, TransformEngine};

const FEED: &str = r#"<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <item><title>[Tech] Rust 2.0</title><link>https://blog.example/rust?id=1&amp;ref=rss</link><dc:creator>ann</dc:creator></item>
    <item><title>[Life] Coffee</title><link>https://blog.example/coffee</link></item>
    <item><title></title><guid>x</guid></item>
  </channel>
</rss>"#;

fn titles(doc: &Document) -> Vec<Option<&str>> {
    doc.channel()
        .unwrap()
        .find_all("item")
        .map(|item| item.find("title").and_then(Element::text))
        .collect()
}

#[test]
fn test_realistic_rule_set() {
    let rules = RuleSet::from_json(
        r#"[
            {"field": "title", "regex": "^\\[(\\w+)\\] (.*)$", "replacement": "\\2 | \\1"},
            {"field": "title", "regex": "\\s+\\|", "replacement": " -"},
            {"field": "Link", "regex": "^https://.*$", "replacement": "https://go.example/?to=$1"},
            {"field": "dc:creator", "regex": "^(\\w)", "replacement": "@\\1"},
            {"field": "guid", "regex": "x"}
        ]"#,
    );
    assert_eq!(rules.len(), 5);
    let engine = TransformEngine::new(rules);
    let mut doc = Document::parse(FEED).unwrap();

    let report = engine.apply(&mut doc);

    assert_eq!(
        titles(&doc),
        vec![Some("Rust 2.0 - Tech"), Some("Coffee - Life"), None]
    );
    let first = doc.channel().unwrap().find("item").unwrap();
    assert_eq!(first.find("dc:creator").and_then(Element::text), Some("@ann"));
    // "Link" does not name the lowercase element, tag lookup is exact
    assert_eq!(
        first.find("link").and_then(Element::text),
        Some("https://blog.example/rust?id=1&ref=rss")
    );
    assert_eq!(report.items, 3);
    assert_eq!(report.rules_skipped, 3);
}

#[test]
fn test_link_rule_with_lowercase_field() {
    let engine = TransformEngine::new(RuleSet::from_json(
        r#"[{"field": "link", "regex": "^https://.*$", "replacement": "https://go.example/?to=$1"}]"#,
    ));
    let mut doc = Document::parse(FEED).unwrap();

    engine.apply(&mut doc);

    let links: Vec<_> = doc
        .channel()
        .unwrap()
        .find_all("item")
        .map(|item| item.find("link").and_then(Element::text))
        .collect();
    assert_eq!(
        links,
        vec![
            Some("https://go.example/?to=https%3A%2F%2Fblog.example%2Frust%3Fid%3D1%26ref%3Drss"),
            Some("https://go.example/?to=https%3A%2F%2Fblog.example%2Fcoffee"),
            None
        ]
    );
}

#[test]
fn test_output_is_well_formed_and_keeps_items() {
    let engine = TransformEngine::new(RuleSet::from_json(
        r#"[{"field": "title", "regex": ".+", "replacement": "<b>&\"'</b>"}]"#,
    ));
    let mut doc = Document::parse(FEED).unwrap();
    engine.apply(&mut doc);

    let bytes = doc.to_bytes().unwrap();
    let reparsed = Document::parse(std::str::from_utf8(&bytes).unwrap()).unwrap();

    assert_eq!(reparsed, doc);
    assert_eq!(
        titles(&reparsed),
        vec![Some("<b>&\"'</b>"), Some("<b>&\"'</b>"), None]
    );
}
