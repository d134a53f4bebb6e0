//! quotehound network layer
//!
//! Everything that touches the network:
//! - HTTP client with a fixed identifying user agent
//! - Static page fetcher
//! - Headless Chrome renderer behind a browser gate
//! - Client-side rendering heuristic
//! - Search API discovery with URL filtering

pub mod client;
pub mod discovery;
pub mod fetch;
pub mod heuristic;
pub mod render;

pub use client::*;
pub use discovery::*;
pub use fetch::*;
pub use heuristic::*;
pub use render::*;
