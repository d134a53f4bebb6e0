//! quotehound extraction layer
//!
//! Turns fetched HTML into raw quotes and screens the cleaned result:
//! - **Sites**: parsers for known aggregator markup (ranker, scatteredquotes, epicquotes, goodreads)
//! - **Generic**: structural + lexical heuristic for every other page
//! - **Registry**: host → parser dispatch with generic fallback
//! - **Moderation**: fail-closed safety filter over a moderation classifier

pub mod generic;
pub mod moderation;
pub mod registry;
pub mod sites;
pub mod traits;

pub use generic::*;
pub use moderation::*;
pub use registry::*;
pub use sites::*;
pub use traits::*;
