//! Domain → parser dispatch
//!
//! The registry looks up a site parser by the page's host; when no parser
//! matches, or the matched parser finds nothing, the generic extractor runs.

use scraper::Html;
use tracing::debug;

use quotehound_core::RawQuote;
use quotehound_net::{host_matches, host_of, DEFAULT_SCROLL_SELECTOR};

use crate::{
    EpicQuotesExtractor, GenericExtractor, GoodreadsExtractor, PageExtractor, RankerExtractor,
    ScatteredQuotesExtractor,
};

struct SiteEntry {
    domain: String,
    extractor: Box<dyn PageExtractor>,
}

/// Table of per-domain parsers with a generic fallback
pub struct ExtractorRegistry {
    sites: Vec<SiteEntry>,
}

impl ExtractorRegistry {
    /// Registry with no site parsers; every page goes to the generic extractor
    pub fn empty() -> Self {
        Self { sites: Vec::new() }
    }

    /// Registry with the built-in aggregator parsers
    pub fn with_builtin_sites() -> Self {
        let mut registry = Self::empty();
        registry.register("ranker.com", RankerExtractor);
        registry.register("scatteredquotes.com", ScatteredQuotesExtractor);
        registry.register("epicquotes.com", EpicQuotesExtractor);
        registry.register("goodreads.com", GoodreadsExtractor);
        registry
    }

    /// Add a parser for `domain` and its subdomains. Later registrations for
    /// the same domain are shadowed by earlier ones.
    pub fn register<E: PageExtractor + 'static>(&mut self, domain: &str, extractor: E) {
        self.sites.push(SiteEntry {
            domain: domain.trim().to_ascii_lowercase(),
            extractor: Box::new(extractor),
        });
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.sites.iter().map(|s| s.domain.as_str())
    }

    /// Site parser responsible for `url`, if any
    pub fn site_for(&self, url: &str) -> Option<&dyn PageExtractor> {
        let host = host_of(url)?;
        self.sites
            .iter()
            .find(|s| host_matches(&host, &s.domain))
            .map(|s| s.extractor.as_ref())
    }

    /// Selector the renderer should watch for `url`
    pub fn scroll_selector(&self, url: &str) -> String {
        match self.site_for(url).and_then(|site| site.watch_selector()) {
            Some(site_selector) => format!("{}, {}", site_selector, DEFAULT_SCROLL_SELECTOR),
            None => DEFAULT_SCROLL_SELECTOR.to_string(),
        }
    }

    /// Extract raw quotes from `html`. Never fails: unusable markup yields
    /// an empty list.
    pub fn extract(&self, html: &str, url: &str, entity: &str) -> Vec<RawQuote> {
        if html.trim().is_empty() {
            return Vec::new();
        }

        let document = Html::parse_document(html);

        if let Some(site) = self.site_for(url) {
            let quotes = site.extract(&document, url);
            if !quotes.is_empty() {
                debug!("{} parser found {} quotes on {}", site.name(), quotes.len(), url);
                return quotes;
            }
            debug!("{} parser found nothing on {}, falling back", site.name(), url);
        }

        let quotes = GenericExtractor::new(Some(entity)).extract(&document, url);
        debug!("generic extractor found {} quotes on {}", quotes.len(), url);
        quotes
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_builtin_sites()
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("domains", &self.domains().collect::<Vec<_>>())
            .finish()
    }
}
