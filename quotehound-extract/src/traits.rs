//! Extraction capability shared by site parsers and the generic extractor

use scraper::{ElementRef, Html};

use quotehound_core::{clean_text, RawQuote};

/// Pulls quote candidates out of a parsed page
pub trait PageExtractor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Extract raw quotes from `document`, attributing each to `url`
    fn extract(&self, document: &Html, url: &str) -> Vec<RawQuote>;

    /// Selector the renderer should watch while scrolling this site
    fn watch_selector(&self) -> Option<&str> {
        None
    }
}

/// Visible text of an element: trimmed text nodes joined by single spaces
pub fn element_text(element: ElementRef<'_>) -> String {
    let joined = element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    clean_text(&joined)
}

/// Opening quotation marks a quote-shaped line may start with
pub const OPENING_QUOTES: &[char] = &['"', '“', '\''];
