// src/models/terms.rs

//! Static keyword dictionaries per audience category.
//!
//! Loaded once at startup and immutable at runtime. The extractor counts
//! occurrences of these terms to produce per-category term scores.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Label;

/// Keyword sets per audience category. OTHER carries no keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermDictionary {
    #[serde(default)]
    pub investor_beginner: Vec<String>,
    #[serde(default)]
    pub investor_qualified: Vec<String>,
    #[serde(default)]
    pub issuer_beginner: Vec<String>,
    #[serde(default)]
    pub issuer_advanced: Vec<String>,
    #[serde(default)]
    pub professional: Vec<String>,
}

impl TermDictionary {
    /// Load a dictionary from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let dict: TermDictionary = toml::from_str(&content)?;
        dict.validate()?;
        Ok(dict)
    }

    /// Load a dictionary or fall back to the built-in default.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(&path) {
            Ok(dict) => dict,
            Err(e) => {
                log::warn!(
                    "Term dictionary load failed from {:?}: {}. Using built-in terms.",
                    path.as_ref(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Validate that at least one category has keywords.
    pub fn validate(&self) -> Result<()> {
        if Label::ALL
            .iter()
            .all(|&label| self.terms_for(label).is_empty())
        {
            return Err(AppError::validation("term dictionary has no keywords"));
        }
        Ok(())
    }

    /// Keywords for a label's category. OTHER has none.
    pub fn terms_for(&self, label: Label) -> &[String] {
        match label {
            Label::InvestorBeginner => &self.investor_beginner,
            Label::InvestorQualified => &self.investor_qualified,
            Label::IssuerBeginner => &self.issuer_beginner,
            Label::IssuerAdvanced => &self.issuer_advanced,
            Label::Professional => &self.professional,
            Label::Other => &[],
        }
    }

    /// Total keyword count across all categories.
    pub fn term_count(&self) -> usize {
        Label::ALL
            .iter()
            .map(|&label| self.terms_for(label).len())
            .sum()
    }
}

impl Default for TermDictionary {
    fn default() -> Self {
        defaults::default_terms()
    }
}

mod defaults {
    use super::TermDictionary;

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    pub fn default_terms() -> TermDictionary {
        TermDictionary {
            investor_beginner: terms(&[
                "how to invest",
                "open an account",
                "first investment",
                "getting started",
                "beginner",
                "savings",
                "learn to trade",
            ]),
            investor_qualified: terms(&[
                "qualified investor",
                "derivatives",
                "structured products",
                "margin trading",
                "futures",
                "options",
                "leverage",
            ]),
            issuer_beginner: terms(&[
                "ipo",
                "initial listing",
                "first bond",
                "go public",
                "placement",
                "listing requirements",
            ]),
            issuer_advanced: terms(&[
                "disclosure",
                "corporate actions",
                "secondary offering",
                "listed company",
                "reporting obligations",
                "delisting",
            ]),
            professional: terms(&[
                "broker",
                "clearing",
                "depository",
                "market maker",
                "trading gateway",
                "api access",
                "colocation",
                "fix protocol",
            ]),
        }
    }
}
