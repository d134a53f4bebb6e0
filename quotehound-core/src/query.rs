//! Search query builder
//!
//! Biases a plain entity name toward quote-bearing pages by appending
//! quote keywords and `site:` filters for known quote aggregators.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of search results requested
pub const DEFAULT_MAX_URLS: usize = 30;

/// A known high-yield quote aggregator
#[derive(Debug, Clone, Serialize)]
pub struct QuoteSite {
    /// Human-readable name
    pub name: &'static str,
    /// Registrable domain used for `site:` filters
    pub domain: &'static str,
}

impl QuoteSite {
    /// `site:` filter term for this aggregator
    pub fn site_filter(&self) -> String {
        format!("site:{}", self.domain)
    }
}

/// Aggregators added to every query, in filter order
pub static QUOTE_SITES: &[QuoteSite] = &[
    QuoteSite { name: "Ranker", domain: "ranker.com" },
    QuoteSite { name: "CBR", domain: "cbr.com" },
    QuoteSite { name: "Epic Quotes", domain: "epicquotes.com" },
    QuoteSite { name: "Sportskeeda", domain: "sportskeeda.com" },
    QuoteSite { name: "Scattered Quotes", domain: "scatteredquotes.com" },
    QuoteSite { name: "Anime Motivation", domain: "animemotivation.com" },
    QuoteSite { name: "Goodreads", domain: "goodreads.com" },
];

/// Exact-phrase keywords appended after the entity
const BIAS_PHRASES: &[&str] = &["\"best quotes\"", "\"quotes\""];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Entity name must not be empty")]
    EmptyEntity,
}

/// A built search query. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    entity: String,
    query: String,
    max_results: usize,
}

impl SearchQuery {
    /// Build a query for `entity` requesting up to `max_results` results
    pub fn build(entity: &str, max_results: usize) -> Result<Self, QueryError> {
        Self::build_with_context(entity, None, max_results)
    }

    /// Like [`SearchQuery::build`], with extra disambiguating terms after the
    /// entity (e.g. the franchise a character belongs to)
    pub fn build_with_context(
        entity: &str,
        context: Option<&str>,
        max_results: usize,
    ) -> Result<Self, QueryError> {
        let entity = entity.trim();
        if entity.is_empty() {
            return Err(QueryError::EmptyEntity);
        }

        Ok(Self {
            entity: entity.to_string(),
            query: build_query(entity, context),
            max_results,
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }
}

/// Compose the biased query string
fn build_query(entity: &str, context: Option<&str>) -> String {
    let mut parts = vec![format!("{} quotes", entity)];

    if let Some(ctx) = context.map(str::trim).filter(|c| !c.is_empty()) {
        parts.push(ctx.to_string());
    }

    parts.extend(BIAS_PHRASES.iter().map(|p| p.to_string()));

    let sites = QUOTE_SITES
        .iter()
        .map(QuoteSite::site_filter)
        .collect::<Vec<_>>()
        .join(" OR ");
    parts.push(sites);

    parts.join(" ")
}
