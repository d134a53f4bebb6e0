//! Per-site quote parsers
//!
//! Each parser targets one aggregator's known markup and returns nothing
//! when the markup is absent, letting the registry fall through to the
//! generic extractor.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use quotehound_core::RawQuote;

use crate::{element_text, PageExtractor, OPENING_QUOTES};

static RANKER_CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.richText_container__Kvtj0").unwrap());

static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());

static SCATTERED_BLOCKQUOTE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("blockquote.quote").unwrap());

static EPIC_ENTRY_PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.entry-content p").unwrap());

static GOODREADS_QUOTE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.quoteText").unwrap());

/// ranker.com list items: a rich-text container whose first paragraph opens
/// with a quotation mark
#[derive(Debug, Default, Clone, Copy)]
pub struct RankerExtractor;

impl PageExtractor for RankerExtractor {
    fn name(&self) -> &str {
        "ranker"
    }

    fn extract(&self, document: &Html, url: &str) -> Vec<RawQuote> {
        document
            .select(&RANKER_CONTAINER)
            .filter_map(|div| div.select(&PARAGRAPH).next())
            .map(element_text)
            .filter(|txt| txt.starts_with(OPENING_QUOTES))
            .map(|txt| RawQuote::new(url, txt))
            .collect()
    }

    fn watch_selector(&self) -> Option<&str> {
        Some("div.richText_container__Kvtj0")
    }
}

/// scatteredquotes.com: every `blockquote.quote`
#[derive(Debug, Default, Clone, Copy)]
pub struct ScatteredQuotesExtractor;

impl PageExtractor for ScatteredQuotesExtractor {
    fn name(&self) -> &str {
        "scatteredquotes"
    }

    fn extract(&self, document: &Html, url: &str) -> Vec<RawQuote> {
        document
            .select(&SCATTERED_BLOCKQUOTE)
            .map(element_text)
            .filter(|txt| !txt.is_empty())
            .map(|txt| RawQuote::new(url, txt))
            .collect()
    }

    fn watch_selector(&self) -> Option<&str> {
        Some("blockquote.quote")
    }
}

/// epicquotes.com: article paragraphs longer than four words
#[derive(Debug, Default, Clone, Copy)]
pub struct EpicQuotesExtractor;

impl PageExtractor for EpicQuotesExtractor {
    fn name(&self) -> &str {
        "epicquotes"
    }

    fn extract(&self, document: &Html, url: &str) -> Vec<RawQuote> {
        document
            .select(&EPIC_ENTRY_PARAGRAPH)
            .map(element_text)
            .filter(|txt| txt.split_whitespace().count() > 4)
            .map(|txt| RawQuote::new(url, txt))
            .collect()
    }

    fn watch_selector(&self) -> Option<&str> {
        Some("div.entry-content p")
    }
}

/// goodreads.com quote pages: the quoted sentence ahead of the `―` attribution
#[derive(Debug, Default, Clone, Copy)]
pub struct GoodreadsExtractor;

impl PageExtractor for GoodreadsExtractor {
    fn name(&self) -> &str {
        "goodreads"
    }

    fn extract(&self, document: &Html, url: &str) -> Vec<RawQuote> {
        document
            .select(&GOODREADS_QUOTE)
            .map(element_text)
            .filter_map(|txt| {
                let quote = txt.split('―').next().unwrap_or_default().trim();
                (!quote.is_empty()).then(|| RawQuote::new(url, quote))
            })
            .collect()
    }

    fn watch_selector(&self) -> Option<&str> {
        Some("div.quoteText")
    }
}
