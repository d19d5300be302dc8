// src/pipeline/mod.rs

//! Pipeline entry points.
//!
//! - `seed_frontier`: load start URLs and sitemap entries into the frontier
//! - `run_pipeline`: crawl, classify, and store records for a whole site

pub mod crawl;
pub mod seed;

pub use crawl::{PipelineStats, run_pipeline};
pub use seed::seed_frontier;
