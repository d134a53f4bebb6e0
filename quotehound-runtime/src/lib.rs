//! quotehound runtime
//!
//! Drives a harvest end to end:
//! - **Orchestrator**: bounded worker pool, one isolated task per URL with
//!   static fetch, dynamic fallback and extraction
//! - **Pipeline**: discovery, scrape, dedupe and the optional safety pass,
//!   reported through [`quotehound_core::PipelineMetrics`]
//! - **Settings**: optional TOML overlay for every config struct

pub mod orchestrator;
pub mod pipeline;
pub mod settings;

pub use orchestrator::*;
pub use pipeline::*;
pub use settings::*;
