use crate::core::document::Document;
use crate::core::template::{expand_template, TemplateError};
use crate::domain::model::{PreparedRule, RuleSet};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{Captures, Regex, Replacer};

/// Bytes left unescaped when embedding a link: ASCII alphanumerics and `-._~`.
const LINK_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub fn encode_link(text: &str) -> String {
    utf8_percent_encode(text, LINK_COMPONENT).to_string()
}

/// How a rule's replacement is applied to the field it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRewrite {
    /// Replacement is a template with group references.
    Pattern,
    /// `$1` in the replacement stands for the whole original field, percent-encoded.
    EncodedLink,
}

impl FieldRewrite {
    pub fn for_field(field: &str) -> Self {
        if field.eq_ignore_ascii_case("link") {
            FieldRewrite::EncodedLink
        } else {
            FieldRewrite::Pattern
        }
    }

    pub fn rewrite(
        self,
        regex: &Regex,
        replacement: &str,
        original: &str,
    ) -> Result<String, TemplateError> {
        match self {
            FieldRewrite::Pattern => {
                let template = expand_template(replacement, regex)?;
                Ok(regex.replace_all(original, template.as_str()).into_owned())
            }
            FieldRewrite::EncodedLink => Ok(regex
                .replace_all(original, EncodedLink::new(replacement, original))
                .into_owned()),
        }
    }
}

/// Replacer that substitutes the encoded original text for `$1` on every match.
pub struct EncodedLink<'t> {
    template: &'t str,
    encoded_original: String,
}

impl<'t> EncodedLink<'t> {
    pub fn new(template: &'t str, original: &str) -> Self {
        Self {
            template,
            encoded_original: encode_link(original),
        }
    }
}

impl Replacer for EncodedLink<'_> {
    fn replace_append(&mut self, _caps: &Captures<'_>, dst: &mut String) {
        dst.push_str(&self.template.replace("$1", &self.encoded_original));
    }
}

/// Counters describing one pass over a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub items: usize,
    pub fields_rewritten: usize,
    pub rules_skipped: usize,
    pub rule_errors: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TransformEngine {
    rules: RuleSet,
}

impl TransformEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Rewrites item fields in place. Failures stay local to one rule on one item.
    pub fn apply(&self, document: &mut Document) -> TransformReport {
        let mut report = TransformReport::default();

        let Some(channel) = document.channel_mut() else {
            tracing::warn!(
                "No <channel> element found in feed; transformation rules not applied."
            );
            return report;
        };

        for item in channel.find_all_mut("item") {
            report.items += 1;
            for prepared in self.rules.iter() {
                let PreparedRule { rule, pattern } = prepared;

                let Some((field, _, replacement)) = rule.parts() else {
                    tracing::warn!("Incomplete transformation rule skipped: {}", rule);
                    report.rules_skipped += 1;
                    continue;
                };

                let Some(element) = item.find_mut(field) else {
                    continue;
                };
                let Some(original) = element.text().map(str::to_owned) else {
                    continue;
                };

                let regex = match pattern {
                    Some(Ok(regex)) => regex,
                    Some(Err(e)) => {
                        tracing::error!("Regex error in rule {}: {}", rule, e);
                        report.rule_errors += 1;
                        continue;
                    }
                    None => continue,
                };

                match FieldRewrite::for_field(field).rewrite(regex, replacement, &original) {
                    Ok(rewritten) => {
                        tracing::debug!(
                            "Transformed '{}' to '{}' using rule: {}",
                            original,
                            rewritten,
                            rule
                        );
                        element.set_text(rewritten);
                        report.fields_rewritten += 1;
                    }
                    Err(e) => {
                        tracing::error!("Regex error in rule {}: {}", rule, e);
                        report.rule_errors += 1;
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::Element;
    use crate::domain::model::Rule;

    fn feed(items: &[&str]) -> Document {
        let body: String = items
            .iter()
            .map(|item| format!("<item>{}</item>", item))
            .collect();
        Document::parse(&format!("<rss><channel>{}</channel></rss>", body)).unwrap()
    }

    fn field<'a>(doc: &'a Document, index: usize, name: &str) -> Option<&'a str> {
        doc.channel()?
            .find_all("item")
            .nth(index)?
            .find(name)
            .and_then(Element::text)
    }

    #[test]
    fn test_simple_substitution() {
        let engine = TransformEngine::new(RuleSet::new(vec![Rule::new("title", "foo", "bar")]));
        let mut doc = feed(&["<title>foobaz</title>"]);

        let report = engine.apply(&mut doc);

        assert_eq!(field(&doc, 0, "title"), Some("barbaz"));
        assert_eq!(report.items, 1);
        assert_eq!(report.fields_rewritten, 1);
    }

    #[test]
    fn test_link_rule_embeds_encoded_original() {
        let engine = TransformEngine::new(RuleSet::new(vec![Rule::new(
            "link",
            "^(.*)$",
            "https://track.example/r?u=$1",
        )]));
        let mut doc = feed(&["<link>http://a.com/x y</link>"]);

        engine.apply(&mut doc);

        assert_eq!(
            field(&doc, 0, "link"),
            Some("https://track.example/r?u=http%3A%2F%2Fa.com%2Fx%20y")
        );
    }

    #[test]
    fn test_link_field_name_is_case_insensitive() {
        assert_eq!(FieldRewrite::for_field("LINK"), FieldRewrite::EncodedLink);
        assert_eq!(FieldRewrite::for_field("Link"), FieldRewrite::EncodedLink);
        assert_eq!(FieldRewrite::for_field("title"), FieldRewrite::Pattern);
        assert_eq!(FieldRewrite::for_field("linkage"), FieldRewrite::Pattern);
    }

    #[test]
    fn test_link_dollar_one_ignores_capture_groups() {
        let regex = Regex::new(r"^http://(a\.com)").unwrap();
        let out = FieldRewrite::EncodedLink
            .rewrite(&regex, "go?to=$1&x=$1", "http://a.com/p")
            .unwrap();
        assert_eq!(
            out,
            "go?to=http%3A%2F%2Fa.com%2Fp&x=http%3A%2F%2Fa.com%2Fp/p"
        );
    }

    #[test]
    fn test_general_case_uses_group_references() {
        let engine = TransformEngine::new(RuleSet::new(vec![Rule::new(
            "title",
            r"\[(\w+)\] (.*)",
            r"\2 (\1)",
        )]));
        let mut doc = feed(&["<title>[News] Big day</title>"]);

        engine.apply(&mut doc);

        assert_eq!(field(&doc, 0, "title"), Some("Big day (News)"));
    }

    #[test]
    fn test_empty_replacement_clears_matches() {
        let engine = TransformEngine::new(RuleSet::new(vec![Rule::new(
            "description",
            "<[^>]*>",
            "",
        )]));
        let mut doc = feed(&["<description>&lt;p&gt;Hello&lt;/p&gt;</description>"]);

        engine.apply(&mut doc);

        assert_eq!(field(&doc, 0, "description"), Some("Hello"));
    }

    #[test]
    fn test_incomplete_rule_leaves_items_untouched() {
        let rules = RuleSet::from_json(r#"[{"field": "title", "regex": "foo"}]"#);
        let engine = TransformEngine::new(rules);
        let mut doc = feed(&["<title>foo</title>", "<title>foo again</title>"]);
        let before = doc.clone();

        let report = engine.apply(&mut doc);

        assert_eq!(doc, before);
        assert_eq!(report.rules_skipped, 2);
        assert_eq!(report.fields_rewritten, 0);
    }

    #[test]
    fn test_bad_regex_is_isolated() {
        let engine = TransformEngine::new(RuleSet::new(vec![
            Rule::new("title", "(unclosed", "x"),
            Rule::new("title", "a", "b"),
        ]));
        let mut doc = feed(&["<title>aaa</title>", "<title>cat</title>"]);

        let report = engine.apply(&mut doc);

        assert_eq!(field(&doc, 0, "title"), Some("bbb"));
        assert_eq!(field(&doc, 1, "title"), Some("cbt"));
        assert_eq!(report.rule_errors, 2);
    }

    #[test]
    fn test_bad_template_is_isolated() {
        let engine = TransformEngine::new(RuleSet::new(vec![Rule::new("title", "a", r"\3")]));
        let mut doc = feed(&["<title>abc</title>"]);

        let report = engine.apply(&mut doc);

        assert_eq!(field(&doc, 0, "title"), Some("abc"));
        assert_eq!(report.rule_errors, 1);
    }

    #[test]
    fn test_rules_chain_on_same_field() {
        let engine = TransformEngine::new(RuleSet::new(vec![
            Rule::new("title", "foo", "bar"),
            Rule::new("title", "bar", "qux"),
        ]));
        let mut doc = feed(&["<title>foo bar</title>"]);

        engine.apply(&mut doc);

        assert_eq!(field(&doc, 0, "title"), Some("qux qux"));
    }

    #[test]
    fn test_missing_or_empty_fields_are_skipped() {
        let engine = TransformEngine::new(RuleSet::new(vec![Rule::new("author", ".*", "x")]));
        let mut doc = feed(&["<title>t</title>", "<author></author>", "<author/>"]);
        let before = doc.clone();

        let report = engine.apply(&mut doc);

        assert_eq!(doc, before);
        assert_eq!(report.items, 3);
        assert_eq!(report.fields_rewritten, 0);
    }

    #[test]
    fn test_missing_channel_is_a_no_op() {
        let engine = TransformEngine::new(RuleSet::new(vec![Rule::new("title", "a", "b")]));
        let mut doc = Document::parse("<rss><item><title>a</title></item></rss>").unwrap();
        let before = doc.clone();

        let report = engine.apply(&mut doc);

        assert_eq!(doc, before);
        assert_eq!(report, TransformReport::default());
    }

    #[test]
    fn test_second_pass_sees_transformed_text() {
        let engine = TransformEngine::new(RuleSet::new(vec![Rule::new("title", "a", "aa")]));
        let mut doc = feed(&["<title>a</title>"]);

        engine.apply(&mut doc);
        assert_eq!(field(&doc, 0, "title"), Some("aa"));

        engine.apply(&mut doc);
        assert_eq!(field(&doc, 0, "title"), Some("aaaa"));
    }

    #[test]
    fn test_empty_match_after_match_is_skipped() {
        let regex = Regex::new(".*").unwrap();
        let out = FieldRewrite::EncodedLink.rewrite(&regex, "T?u=$1", "ab").unwrap();
        assert_eq!(out, "T?u=ab");
    }

    #[test]
    fn test_dollar_anchor_matches_only_at_end() {
        let regex = Regex::new("$").unwrap();
        let out = FieldRewrite::Pattern.rewrite(&regex, "!", "a\n").unwrap();
        assert_eq!(out, "a\n!");
    }

    #[test]
    fn test_encode_link_escapes_everything_but_unreserved() {
        assert_eq!(encode_link("a-b_c.d~e"), "a-b_c.d~e");
        assert_eq!(encode_link("/?&= "), "%2F%3F%26%3D%20");
        assert_eq!(encode_link("é"), "%C3%A9");
    }
}
