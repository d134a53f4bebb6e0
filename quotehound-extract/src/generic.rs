//! Generic structural + lexical quote extractor
//!
//! Used for any page without a site parser, or when the site parser finds
//! nothing. Candidates are block-level text nodes; each must be long enough,
//! free of listing boilerplate, no longer than a short paragraph, and either
//! quote-shaped or mention the entity by name.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use quotehound_core::{RawQuote, MAX_CANDIDATE_CHARS, MIN_CANDIDATE_CHARS};

use crate::{element_text, PageExtractor};

/// Block-level candidates, in document order
static CANDIDATES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("blockquote, q, li, p").unwrap());

/// A quotation mark followed by at least six more characters
static QUOTE_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["“”'«»‘’].{6,}"#).unwrap());

/// Lexical markers of site chrome rather than quotes
pub static JUNK_MARKERS: &[&str] = &[
    "vote",
    "photo",
    "ranker",
    "comment",
    "episode",
    "great quote",
    "quotes list",
];

/// Heuristic extractor for pages without known markup
#[derive(Debug, Clone, Default)]
pub struct GenericExtractor {
    entity: Option<String>,
}

impl GenericExtractor {
    /// Extractor that also accepts lines naming `entity` (case-insensitive)
    pub fn new(entity: Option<&str>) -> Self {
        let entity = entity
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        Self { entity }
    }

    /// Apply the candidate rules to already-cleaned text
    pub fn accepts(&self, text: &str) -> bool {
        let len = text.chars().count();
        if len < MIN_CANDIDATE_CHARS {
            return false;
        }

        let lower = text.to_lowercase();
        if is_junk(&lower) {
            return false;
        }

        let mentions_entity = self
            .entity
            .as_deref()
            .is_some_and(|name| lower.contains(name));

        (looks_quoted(text) || mentions_entity) && len <= MAX_CANDIDATE_CHARS
    }
}

impl PageExtractor for GenericExtractor {
    fn name(&self) -> &str {
        "generic"
    }

    fn extract(&self, document: &Html, url: &str) -> Vec<RawQuote> {
        document
            .select(&CANDIDATES)
            .map(element_text)
            .filter(|txt| self.accepts(txt))
            .map(|txt| RawQuote::new(url, txt))
            .collect()
    }
}

/// True when the text carries a quotation mark with enough text after it
pub fn looks_quoted(text: &str) -> bool {
    QUOTE_LIKE.is_match(text)
}

fn is_junk(lower: &str) -> bool {
    JUNK_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://fan.example/luffy";

    fn run(entity: Option<&str>, html: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        GenericExtractor::new(entity)
            .extract(&doc, URL)
            .into_iter()
            .map(|q| q.text)
            .collect()
    }

    #[test]
    fn test_quote_shaped_candidates() {
        let html = r#"
            <blockquote>"I don't want to conquer anything."</blockquote>
            <p>Just a regular sentence without marks.</p>
            <li>‘Short’</li>
            <q>«Whatever happens, happens»</q>
        "#;

        assert_eq!(
            run(None, html),
            vec![
                "\"I don't want to conquer anything.\"",
                "«Whatever happens, happens»"
            ]
        );
    }

    #[test]
    fn test_entity_mention_accepted() {
        let html = r#"
            <p>Luffy says he will never give up on his friends.</p>
            <p>Zoro says nothing at all about it today.</p>
        "#;

        assert_eq!(
            run(Some("LUFFY"), html),
            vec!["Luffy says he will never give up on his friends."]
        );
        assert!(run(None, html).is_empty());
    }

    #[test]
    fn test_junk_rejected() {
        let html = r#"
            <p>"Great line" - 1,203 votes so far</p>
            <p>"See this" Photo credit: studio</p>
            <li>"Read more in the comments section"</li>
            <li>"Episode 1024 is where this happens"</li>
            <p>"Ranker users loved this one"</p>
        "#;
        assert!(run(Some("luffy"), html).is_empty());
    }

    #[test]
    fn test_length_bounds() {
        let long = format!("\"{}\"", "word ".repeat(80));
        let html = format!(
            "<p>'Tiny'</p><p>{}</p><p>\"Exactly fine length line\"</p>",
            long
        );
        assert_eq!(run(None, &html), vec!["\"Exactly fine length line\""]);
    }

    #[test]
    fn test_malformed_html_yields_empty() {
        assert!(run(Some("luffy"), "<<<>>> </p></li><blockquote").is_empty());
        assert!(run(Some("luffy"), "").is_empty());
    }

    #[test]
    fn test_looks_quoted() {
        assert!(looks_quoted("He said \"go on now\""));
        assert!(!looks_quoted("\"short"));
        assert!(!looks_quoted("no marks here at all"));
    }
}
