// src/models/page.rs

//! Page package: the canonical extracted representation of a fetched page.

use serde::{Deserialize, Serialize};

use crate::models::Label;

/// How the page HTML was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchMode {
    /// Plain HTTP response body
    Static,
    /// Headless-browser rendered DOM
    Rendered,
}

/// Meta information extracted from the document head.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Contents of `<title>`, if present
    pub title: Option<String>,

    /// `meta[name=description]` or `og:description`
    pub description: Option<String>,

    /// `lang` attribute of the root element
    pub lang: Option<String>,
}

/// Normalized keyword-frequency scores per audience category.
///
/// Each score is the count of dictionary-term occurrences in the normalized
/// text divided by the document word count. OTHER has no dictionary and
/// always scores zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TermScores {
    #[serde(default)]
    pub investor_beginner: f64,
    #[serde(default)]
    pub investor_qualified: f64,
    #[serde(default)]
    pub issuer_beginner: f64,
    #[serde(default)]
    pub issuer_advanced: f64,
    #[serde(default)]
    pub professional: f64,
}

impl TermScores {
    /// Score for a label's category. `Other` has no category and scores 0.
    pub fn get(&self, label: Label) -> f64 {
        match label {
            Label::InvestorBeginner => self.investor_beginner,
            Label::InvestorQualified => self.investor_qualified,
            Label::IssuerBeginner => self.issuer_beginner,
            Label::IssuerAdvanced => self.issuer_advanced,
            Label::Professional => self.professional,
            Label::Other => 0.0,
        }
    }

    /// Set the score for a label's category. `Other` is ignored.
    pub fn set(&mut self, label: Label, score: f64) {
        match label {
            Label::InvestorBeginner => self.investor_beginner = score,
            Label::InvestorQualified => self.investor_qualified = score,
            Label::IssuerBeginner => self.issuer_beginner = score,
            Label::IssuerAdvanced => self.issuer_advanced = score,
            Label::Professional => self.professional = score,
            Label::Other => {}
        }
    }
}

/// Canonical extracted representation of a fetched page.
///
/// Built once by the extractor and immutable thereafter; consumed by the
/// rule engine and the external classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagePackage {
    /// Normalized URL the page was dequeued as
    pub url: String,

    /// URL after redirects
    pub final_url: String,

    /// HTTP status code of the fetch
    pub http_status: u16,

    /// STATIC or RENDERED
    pub fetch_mode: FetchMode,

    /// Original HTML input, unmodified
    pub raw_text: String,

    /// Boilerplate-stripped, whitespace-collapsed, lowercased text
    pub normalized_text: String,

    /// Title/description/lang from the document head
    pub meta: PageMeta,

    /// Per-category normalized keyword scores
    pub term_scores: TermScores,

    /// Hex SHA-256 of `normalized_text`, for change detection and replay
    pub content_hash: String,

    /// Outbound absolute URLs in document order, deduplicated within the page
    pub extracted_links: Vec<String>,
}

/// Verdict returned by the external classifier.
///
/// The core validates only its shape; semantic correctness belongs to the
/// collaborator that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Labels the classifier assigned
    pub labels: Vec<Label>,

    /// Classifier self-reported confidence in [0, 1]
    pub confidence: f64,

    /// Free-text explanation
    #[serde(default)]
    pub rationale: String,

    /// Supporting evidence snippets ("field=value" style)
    #[serde(default)]
    pub evidence: Vec<String>,
}
