// src/models/mod.rs

//! Domain models for the classification crawler.
//!
//! This module contains the data structures exchanged between pipeline
//! stages, organized by their primary purpose.

mod config;
mod label;
mod page;
mod record;
mod ruleset;
mod terms;

// Re-export all public types
pub use config::{
    ClassifierConfig, Config, CrawlConfig, OutputConfig, RenderConfig, RulesConfig,
    ThresholdConfig,
};
pub use label::Label;
pub use page::{FetchMode, PageMeta, PagePackage, TermScores, Verdict};
pub use record::ClassificationRecord;
pub use ruleset::{Rule, Ruleset};
pub use terms::TermDictionary;
