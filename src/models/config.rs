// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Crawl scope, limits, and HTTP behavior
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// When to ask the fetcher for a rendered DOM
    #[serde(default)]
    pub render: RenderConfig,

    /// External classifier settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Reconciliation thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Ruleset and term dictionary file locations
    #[serde(default)]
    pub rules: RulesConfig,

    /// Output sink settings
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawl.start_urls.is_empty() {
            return Err(AppError::validation("crawl.start_urls is empty"));
        }
        for url in &self.crawl.start_urls {
            url::Url::parse(url)
                .map_err(|e| AppError::validation(format!("bad start URL {url}: {e}")))?;
        }
        if self.crawl.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawl.user_agent is empty"));
        }
        if self.crawl.timeout_secs == 0 {
            return Err(AppError::validation("crawl.timeout_secs must be > 0"));
        }
        if self.crawl.max_concurrent == 0 {
            return Err(AppError::validation("crawl.max_concurrent must be > 0"));
        }
        if self.classifier.timeout_secs == 0 {
            return Err(AppError::validation("classifier.timeout_secs must be > 0"));
        }
        for (name, value) in [
            ("thresholds.low_confidence", self.thresholds.low_confidence),
            ("thresholds.disagreement_cap", self.thresholds.disagreement_cap),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::validation(format!("{name} must be in [0, 1]")));
            }
        }
        if self.thresholds.agreement < 0.0 {
            return Err(AppError::validation("thresholds.agreement must be >= 0"));
        }
        if self.output.path.trim().is_empty() {
            return Err(AppError::validation("output.path is empty"));
        }
        Ok(())
    }
}

/// Crawl scope, limits, and HTTP behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Seed URLs, enqueued at depth 0
    #[serde(default)]
    pub start_urls: Vec<String>,

    /// Host whitelist; empty means "hosts of the start URLs"
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    /// Maximum link depth from the seeds
    #[serde(default = "defaults::max_depth")]
    pub max_depth: usize,

    /// Maximum number of pages dequeued for processing
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    /// Minimum interval between dequeues in milliseconds
    #[serde(default = "defaults::rate_interval")]
    pub rate_interval_ms: u64,

    /// Maximum concurrent workers
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Retry attempts for transport-level fetch failures
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// Backoff between retries in milliseconds (linear)
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Try `/sitemap.xml` on each start host before crawling
    #[serde(default = "defaults::use_sitemap")]
    pub use_sitemap: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_urls: Vec::new(),
            allowed_domains: Vec::new(),
            max_depth: defaults::max_depth(),
            max_pages: defaults::max_pages(),
            rate_interval_ms: defaults::rate_interval(),
            max_concurrent: defaults::max_concurrent(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            retry_attempts: defaults::retry_attempts(),
            retry_backoff_ms: defaults::retry_backoff(),
            use_sitemap: defaults::use_sitemap(),
        }
    }
}

/// Render policy: when to ask the fetcher for a browser-rendered DOM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Always render, regardless of heuristics
    #[serde(default)]
    pub force_render: bool,

    /// Static HTML with less visible text than this triggers rendering
    #[serde(default = "defaults::min_text_chars")]
    pub min_text_chars: usize,

    /// Any of these markers in the static HTML triggers rendering
    #[serde(default = "defaults::spa_markers")]
    pub spa_markers: Vec<String>,
}

impl RenderConfig {
    /// Decide whether a statically fetched page should be re-fetched
    /// through the rendering path. `text_len` is the visible-text length
    /// the extractor found in the static HTML.
    pub fn should_render(&self, raw_html: &str, text_len: usize) -> bool {
        if self.force_render {
            return true;
        }
        if text_len < self.min_text_chars {
            return true;
        }
        self.spa_markers.iter().any(|m| raw_html.contains(m))
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            force_render: false,
            min_text_chars: defaults::min_text_chars(),
            spa_markers: defaults::spa_markers(),
        }
    }
}

/// External classifier (LLM collaborator) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "defaults::classifier_endpoint")]
    pub endpoint: String,

    /// Model name, recorded as model_version in output
    #[serde(default = "defaults::classifier_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "defaults::api_key_env")]
    pub api_key_env: String,

    /// Per-call timeout in seconds; expiry routes the page to needs_review
    #[serde(default = "defaults::classifier_timeout")]
    pub timeout_secs: u64,

    /// Completion token budget
    #[serde(default = "defaults::max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::classifier_endpoint(),
            model: defaults::classifier_model(),
            api_key_env: defaults::api_key_env(),
            timeout_secs: defaults::classifier_timeout(),
            max_tokens: defaults::max_tokens(),
            temperature: 0.0,
        }
    }
}

/// Thresholds driving reconciliation of rule and classifier signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Minimum term score for a rule match to join the label union
    #[serde(default = "defaults::agreement")]
    pub agreement: f64,

    /// Confidence below this forces needs_review
    #[serde(default = "defaults::low_confidence")]
    pub low_confidence: f64,

    /// Confidence ceiling applied on total rule/verdict disagreement
    #[serde(default = "defaults::disagreement_cap")]
    pub disagreement_cap: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            agreement: defaults::agreement(),
            low_confidence: defaults::low_confidence(),
            disagreement_cap: defaults::disagreement_cap(),
        }
    }
}

/// Ruleset and term dictionary locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Path to the ruleset TOML
    #[serde(default = "defaults::ruleset_path")]
    pub ruleset_path: String,

    /// Path to the term dictionary TOML
    #[serde(default = "defaults::terms_path")]
    pub terms_path: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            ruleset_path: defaults::ruleset_path(),
            terms_path: defaults::terms_path(),
        }
    }
}

/// Output sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSONL output file, one record per line
    #[serde(default = "defaults::output_path")]
    pub path: String,

    /// Append to an existing file instead of starting fresh
    #[serde(default)]
    pub append: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: defaults::output_path(),
            append: false,
        }
    }
}

mod defaults {
    // Crawl defaults
    pub fn max_depth() -> usize {
        3
    }
    pub fn max_pages() -> usize {
        1000
    }
    pub fn rate_interval() -> u64 {
        500
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; pageclass/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn retry_attempts() -> u32 {
        3
    }
    pub fn retry_backoff() -> u64 {
        2000
    }
    pub fn use_sitemap() -> bool {
        true
    }

    // Render defaults
    pub fn min_text_chars() -> usize {
        300
    }
    pub fn spa_markers() -> Vec<String> {
        vec![
            "__NEXT_DATA__".into(),
            "data-reactroot".into(),
            "__NUXT__".into(),
            "ng-version".into(),
        ]
    }

    // Classifier defaults
    pub fn classifier_endpoint() -> String {
        "https://api.openai.com/v1/chat/completions".into()
    }
    pub fn classifier_model() -> String {
        "gpt-4o-mini".into()
    }
    pub fn api_key_env() -> String {
        "OPENAI_API_KEY".into()
    }
    pub fn classifier_timeout() -> u64 {
        60
    }
    pub fn max_tokens() -> u32 {
        1024
    }

    // Threshold defaults
    pub fn agreement() -> f64 {
        0.01
    }
    pub fn low_confidence() -> f64 {
        0.5
    }
    pub fn disagreement_cap() -> f64 {
        0.3
    }

    // Path defaults
    pub fn ruleset_path() -> String {
        "config/ruleset.toml".into()
    }
    pub fn terms_path() -> String {
        "config/terms.toml".into()
    }
    pub fn output_path() -> String {
        "output/records.jsonl".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_seed() -> Config {
        let mut config = Config::default();
        config.crawl.start_urls = vec!["https://example.com/".to_string()];
        config
    }

    #[test]
    fn test_validate_requires_start_urls() {
        assert!(Config::default().validate().is_err());
        assert!(config_with_seed().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_start_url() {
        let mut config = config_with_seed();
        config.crawl.start_urls.push("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = config_with_seed();
        config.crawl.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_thresholds() {
        let mut config = config_with_seed();
        config.thresholds.low_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_should_render_force_flag() {
        let render = RenderConfig {
            force_render: true,
            ..RenderConfig::default()
        };
        assert!(render.should_render("<html></html>", 10_000));
    }

    #[test]
    fn test_should_render_thin_text() {
        let render = RenderConfig::default();
        assert!(render.should_render("<html><body>hi</body></html>", 2));
    }

    #[test]
    fn test_should_render_spa_marker() {
        let render = RenderConfig::default();
        let html = "<html><script id=\"__NEXT_DATA__\"></script></html>";
        assert!(render.should_render(html, 10_000));
        assert!(!render.should_render("<html>plain</html>", 10_000));
    }

    #[test]
    fn test_toml_partial_overrides() {
        let text = r#"
            [crawl]
            start_urls = ["https://exchange.example/"]
            max_pages = 50

            [thresholds]
            agreement = 0.02
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.crawl.max_pages, 50);
        assert_eq!(config.crawl.max_depth, 3);
        assert_eq!(config.thresholds.agreement, 0.02);
        assert_eq!(config.thresholds.low_confidence, 0.5);
    }
}
