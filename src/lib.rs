// src/lib.rs

//! pageclass library
//!
//! Crawls a bounded website, extracts page content, and assigns each page
//! one or more audience labels by merging deterministic rule signals with
//! an external classifier's verdict.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
