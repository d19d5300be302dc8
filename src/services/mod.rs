// src/services/mod.rs

//! Service layer: core pipeline components and collaborator seams.
//!
//! Extractor, rule engine, reconciler, and validator are pure/stateless;
//! the frontier is the single mutable crawl state. Fetcher and classifier
//! are external collaborators behind narrow trait contracts.

pub mod classifier;
pub mod extractor;
pub mod fetch;
pub mod frontier;
pub mod reconcile;
pub mod rules;
pub mod validate;

pub use classifier::{Classifier, LlmClassifier};
pub use extractor::{Extractor, FetchContext};
pub use fetch::{FetchResult, Fetcher, HttpFetcher};
pub use frontier::{CrawlOutcome, Frontier, UrlState, UrlStatus};
pub use reconcile::Reconciler;
pub use rules::{RuleEngine, RuleMatch};
pub use validate::Validator;
