// src/utils/mod.rs

//! Utility functions and helpers.

pub mod http;
pub mod url;

pub use url::{get_domain, normalize as normalize_url, resolve_and_normalize};
