//! Text normalization and deduplication
//!
//! `normalize` is a fixed point: running it on its own output changes nothing.
//! `dedupe` is a single linear pass keyed on the case-folded normalized text.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::{Quote, RawQuote, MIN_QUOTE_CHARS};

/// Invisible characters removed outright
const ZERO_WIDTH: &[char] = &['\u{200b}', '\u{200c}', '\u{200d}', '\u{2060}', '\u{feff}'];

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").unwrap());

static VOTES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b\d+\s+votes?\b").unwrap());

static PHOTO_CAPTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)photo:.*").unwrap());

static GREAT_QUOTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)great quote\??").unwrap());

/// Clean a text fragment: decode HTML entities, drop inline tags and
/// invisible characters, strip listing boilerplate, collapse whitespace.
///
/// Passes repeat until the text stops changing. A pass that changes the text
/// always makes it shorter, so the loop terminates.
pub fn normalize(text: &str) -> String {
    let mut current = clean_pass(text);

    loop {
        let next = clean_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_pass(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);
    let untagged = TAG_REGEX.replace_all(&decoded, " ");

    let collapsed = clean_text(&untagged);
    let stripped = VOTES_REGEX.replace_all(&collapsed, "");
    let stripped = PHOTO_CAPTION_REGEX.replace_all(&stripped, "");
    let stripped = GREAT_QUOTE_REGEX.replace_all(&stripped, "");

    collapse_whitespace(&stripped)
}

/// Light cleanup applied at extraction time: invisible characters and
/// whitespace only, no entity decoding or boilerplate stripping
pub fn clean_text(text: &str) -> String {
    let visible: String = text
        .chars()
        .filter(|c| !ZERO_WIDTH.contains(c))
        .map(|c| if c == '\u{a0}' { ' ' } else { c })
        .collect();

    collapse_whitespace(&visible)
}

/// Collapse whitespace runs to single spaces and trim both ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize, length-filter, and deduplicate raw quotes.
///
/// First occurrence wins and keeps its source URL and casing. Items whose
/// normalized text is shorter than [`MIN_QUOTE_CHARS`] are dropped.
pub fn dedupe<I>(raw: I) -> Vec<Quote>
where
    I: IntoIterator<Item = RawQuote>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for item in raw {
        let text = normalize(&item.text);
        if text.chars().count() < MIN_QUOTE_CHARS {
            continue;
        }

        let key = crate::dedup_key(&text);
        if seen.insert(key) {
            out.push(Quote::new(item.source_url, text));
        }
    }

    out
}
