// src/pipeline/crawl.rs

//! Pipeline orchestration: frontier-driven worker pool running
//! fetch -> extract -> rules -> classify -> reconcile -> validate -> store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::error::Result;
use crate::models::{Config, FetchMode, Ruleset, TermDictionary};
use crate::pipeline::seed::seed_frontier;
use crate::services::{
    Classifier, CrawlOutcome, Extractor, FetchContext, Fetcher, Frontier, Reconciler, RuleEngine,
    Validator,
};
use crate::storage::RecordSink;

/// HTTP statuses that mark a URL SKIPPED instead of FAILED: the page is
/// knowingly absent, not broken.
const SKIP_STATUSES: [u16; 3] = [403, 404, 410];

/// Summary of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// URLs dequeued and handed to a worker
    pub processed: usize,
    /// Records accepted and persisted
    pub stored: usize,
    /// Fetch/persist failures and non-2xx responses
    pub failed: usize,
    /// Pages absent by design (403/404/410)
    pub skipped: usize,
    /// Records rejected by the validator
    pub rejected: usize,
}

#[derive(Default)]
struct Tally {
    processed: AtomicUsize,
    stored: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    rejected: AtomicUsize,
}

impl Tally {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct PipelineCtx {
    config: Arc<Config>,
    frontier: Frontier,
    fetcher: Arc<dyn Fetcher>,
    classifier: Arc<dyn Classifier>,
    sink: Arc<dyn RecordSink>,
    extractor: Extractor,
    engine: RuleEngine,
    reconciler: Reconciler,
    validator: Validator,
    tally: Tally,
}

/// Run the crawl-extract-classify-validate pipeline to completion.
///
/// Spawns `max_concurrent` workers looping on the frontier. The run ends
/// when the frontier drains or max_pages is reached; in-flight pages
/// always complete, are validated, and are stored. No single page failure
/// aborts the run.
pub async fn run_pipeline(
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    classifier: Arc<dyn Classifier>,
    sink: Arc<dyn RecordSink>,
) -> Result<PipelineStats> {
    let started_at = Utc::now();

    let ruleset = Ruleset::load_or_default(&config.rules.ruleset_path);
    let terms = TermDictionary::load_or_default(&config.rules.terms_path);
    log::info!(
        "Ruleset {} ({} rules), {} dictionary terms",
        ruleset.version,
        ruleset.rules.len(),
        terms.term_count()
    );

    let engine = RuleEngine::new(&ruleset)?;
    let validator = Validator::new(&ruleset);
    let reconciler = Reconciler::new(
        config.thresholds.clone(),
        ruleset.version.clone(),
        classifier.model_version(),
    );
    let extractor = Extractor::new(terms);

    let frontier = Frontier::new(&config.crawl);
    let seeded = seed_frontier(&frontier, &config.crawl, fetcher.as_ref()).await;
    log::info!(
        "Seeded {} URLs (max_depth={}, max_pages={})",
        seeded,
        config.crawl.max_depth,
        config.crawl.max_pages
    );

    let workers = config.crawl.max_concurrent.max(1);
    let ctx = Arc::new(PipelineCtx {
        config,
        frontier,
        fetcher,
        classifier,
        sink,
        extractor,
        engine,
        reconciler,
        validator,
        tally: Tally::default(),
    });

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                while let Some(url_state) = ctx.frontier.next().await {
                    process_page(&ctx, &url_state.normalized_url, url_state.depth).await;
                }
            })
        })
        .collect();
    join_all(handles).await;

    let stats = PipelineStats {
        started_at,
        finished_at: Utc::now(),
        processed: ctx.tally.processed.load(Ordering::Relaxed),
        stored: ctx.tally.stored.load(Ordering::Relaxed),
        failed: ctx.tally.failed.load(Ordering::Relaxed),
        skipped: ctx.tally.skipped.load(Ordering::Relaxed),
        rejected: ctx.tally.rejected.load(Ordering::Relaxed),
    };
    log::info!(
        "Pipeline finished: {} processed, {} stored, {} failed, {} skipped, {} rejected",
        stats.processed,
        stats.stored,
        stats.failed,
        stats.skipped,
        stats.rejected
    );
    Ok(stats)
}

/// Process one dequeued URL end to end. Every exit path reports a terminal
/// outcome back to the frontier; failures never touch any other URL's state.
async fn process_page(ctx: &PipelineCtx, url: &str, depth: usize) {
    Tally::bump(&ctx.tally.processed);
    log::debug!("Processing {} (depth {})", url, depth);

    let fetched = match ctx.fetcher.fetch(url).await {
        Ok(result) => result,
        Err(e) => {
            log::warn!("Fetch failed for {}: {}", url, e);
            ctx.frontier.report(url, CrawlOutcome::Failed, &[]);
            Tally::bump(&ctx.tally.failed);
            return;
        }
    };

    if SKIP_STATUSES.contains(&fetched.http_status) {
        log::debug!("Skipping {} (HTTP {})", url, fetched.http_status);
        ctx.frontier.report(url, CrawlOutcome::Skipped, &[]);
        Tally::bump(&ctx.tally.skipped);
        return;
    }
    if !(200..300).contains(&fetched.http_status) {
        log::warn!("HTTP {} for {}", fetched.http_status, url);
        ctx.frontier.report(url, CrawlOutcome::Failed, &[]);
        Tally::bump(&ctx.tally.failed);
        return;
    }

    let mut package = ctx.extractor.extract(
        &fetched.raw_html,
        &FetchContext {
            url: url.to_string(),
            final_url: fetched.final_url.clone(),
            http_status: fetched.http_status,
            fetch_mode: FetchMode::Static,
        },
    );

    // Render policy: rendering is optional and a render failure falls
    // back to the static extraction.
    if ctx
        .config
        .render
        .should_render(&fetched.raw_html, package.normalized_text.len())
    {
        match ctx.fetcher.render(url).await {
            Ok(rendered) => {
                package = ctx.extractor.extract(
                    &rendered.raw_html,
                    &FetchContext {
                        url: url.to_string(),
                        final_url: rendered.final_url.clone(),
                        http_status: fetched.http_status,
                        fetch_mode: FetchMode::Rendered,
                    },
                );
            }
            Err(e) => {
                log::debug!("Render unavailable for {}: {}. Using static HTML.", url, e);
            }
        }
    }

    let rule_matches = ctx.engine.evaluate(&package);

    let timeout = Duration::from_secs(ctx.config.classifier.timeout_secs);
    let verdict = match tokio::time::timeout(
        timeout,
        ctx.classifier.classify(&package, &rule_matches),
    )
    .await
    {
        Ok(Ok(verdict)) => Some(verdict),
        Ok(Err(e)) => {
            log::warn!("Classifier unavailable for {}: {}", url, e);
            None
        }
        Err(_) => {
            log::warn!("Classifier timed out after {:?} for {}", timeout, url);
            None
        }
    };

    let record = ctx.reconciler.reconcile(&package, &rule_matches, verdict.as_ref());

    let reasons = ctx.validator.check(&record);
    if !reasons.is_empty() {
        log::warn!("Record rejected for {}: {}", url, reasons.join("; "));
        ctx.frontier.report(url, CrawlOutcome::Failed, &[]);
        Tally::bump(&ctx.tally.rejected);
        return;
    }

    match ctx.sink.persist(&record).await {
        Ok(()) => {
            ctx.frontier
                .report(url, CrawlOutcome::Done, &package.extracted_links);
            Tally::bump(&ctx.tally.stored);
        }
        Err(e) => {
            log::error!("Persist failed for {}: {}", url, e);
            ctx.frontier.report(url, CrawlOutcome::Failed, &[]);
            Tally::bump(&ctx.tally.failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use async_trait::async_trait;

    use crate::error::{AppError, Result};
    use crate::models::{Label, PagePackage, Verdict};
    use crate::services::{FetchResult, RuleMatch};
    use crate::storage::JsonlSink;

    struct StubFetcher {
        pages: HashMap<String, (u16, String)>,
    }

    impl StubFetcher {
        fn new(pages: &[(&str, u16, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, status, html)| {
                        (url.to_string(), (*status, html.to_string()))
                    })
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchResult> {
            match self.pages.get(url) {
                Some((status, html)) => Ok(FetchResult {
                    raw_html: html.clone(),
                    http_status: *status,
                    final_url: url.to_string(),
                }),
                None => Err(AppError::fetch(url, "connection refused")),
            }
        }
    }

    struct StubClassifier {
        labels: Vec<Label>,
        confidence: f64,
    }

    #[async_trait]
    impl Classifier for StubClassifier {
        async fn classify(&self, _page: &PagePackage, _hint: &[RuleMatch]) -> Result<Verdict> {
            Ok(Verdict {
                labels: self.labels.clone(),
                confidence: self.confidence,
                rationale: "stub".to_string(),
                evidence: vec![],
            })
        }

        fn model_version(&self) -> String {
            "stub-model".to_string()
        }
    }

    struct UnavailableClassifier;

    #[async_trait]
    impl Classifier for UnavailableClassifier {
        async fn classify(&self, _page: &PagePackage, _hint: &[RuleMatch]) -> Result<Verdict> {
            Err(AppError::classifier("no API key configured"))
        }

        fn model_version(&self) -> String {
            "stub-model".to_string()
        }
    }

    fn test_config(output: &std::path::Path) -> Arc<Config> {
        let mut config = Config::default();
        config.crawl.start_urls = vec!["https://site.test/".to_string()];
        config.crawl.rate_interval_ms = 0;
        config.crawl.max_concurrent = 2;
        config.crawl.use_sitemap = false;
        config.render.min_text_chars = 0;
        config.output.path = output.to_string_lossy().into_owned();
        // Point at missing files so the built-in ruleset/terms load
        config.rules.ruleset_path = "/nonexistent/ruleset.toml".to_string();
        config.rules.terms_path = "/nonexistent/terms.toml".to_string();
        Arc::new(config)
    }

    async fn run(
        config: Arc<Config>,
        fetcher: StubFetcher,
        classifier: impl Classifier + 'static,
    ) -> PipelineStats {
        let sink = JsonlSink::create(&config.output.path, false).await.unwrap();
        run_pipeline(
            Arc::clone(&config),
            Arc::new(fetcher),
            Arc::new(classifier),
            Arc::new(sink),
        )
        .await
        .unwrap()
    }

    const ROOT: &str = r#"<html><body>
        <p>Welcome to the exchange.</p>
        <a href="/brokers">Brokers</a>
        <a href="/missing">Missing</a>
        <a href="https://offsite.test/page">Offsite</a>
    </body></html>"#;

    const BROKERS: &str = r#"<html><head><title>Brokers</title></head><body>
        <p>Broker clearing and depository services. Trading gateway and api access for every broker and market maker.</p>
    </body></html>"#;

    #[tokio::test]
    async fn test_end_to_end_records_for_reachable_pages_only() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("records.jsonl");
        let config = test_config(&output);

        let fetcher = StubFetcher::new(&[
            ("https://site.test/", 200, ROOT),
            ("https://site.test/brokers", 200, BROKERS),
            ("https://site.test/missing", 404, ""),
        ]);
        let classifier = StubClassifier {
            labels: vec![Label::Professional],
            confidence: 0.9,
        };

        let stats = run(Arc::clone(&config), fetcher, classifier).await;
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.stored, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 0);

        let records = JsonlSink::read_all(&output).await.unwrap();
        assert_eq!(records.len(), 2);
        let urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
        assert!(urls.contains(&"https://site.test/"));
        assert!(urls.contains(&"https://site.test/brokers"));
        // Offsite link never left the frontier gate
        assert!(!urls.iter().any(|u| u.contains("offsite")));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("records.jsonl");
        let config = test_config(&output);

        // /brokers is linked but the stub has no entry for it: fetch error
        let fetcher = StubFetcher::new(&[
            ("https://site.test/", 200, ROOT),
            ("https://site.test/missing", 404, ""),
        ]);
        let classifier = StubClassifier {
            labels: vec![Label::Other],
            confidence: 0.8,
        };

        let stats = run(Arc::clone(&config), fetcher, classifier).await;
        assert_eq!(stats.stored, 1);
        assert_eq!(stats.failed, 1); // /brokers
        assert_eq!(stats.skipped, 1); // /missing returns 404

        let records = JsonlSink::read_all(&output).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://site.test/");
    }

    #[tokio::test]
    async fn test_unavailable_classifier_yields_rule_only_review_records() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("records.jsonl");
        let config = test_config(&output);

        let fetcher = StubFetcher::new(&[("https://site.test/", 200, BROKERS)]);
        let stats = run(Arc::clone(&config), fetcher, UnavailableClassifier).await;
        assert_eq!(stats.stored, 1);

        let records = JsonlSink::read_all(&output).await.unwrap();
        assert!(records[0].needs_review);
        assert_eq!(records[0].confidence, 0.0);
        assert_eq!(records[0].model_version, "stub-model");
        // BROKERS is dense with professional vocabulary
        assert_eq!(records[0].label(), Label::Professional);
    }

    #[tokio::test]
    async fn test_max_pages_caps_processing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("records.jsonl");
        let config = {
            let mut c = (*test_config(&output)).clone();
            c.crawl.max_pages = 1;
            Arc::new(c)
        };

        let fetcher = StubFetcher::new(&[
            ("https://site.test/", 200, ROOT),
            ("https://site.test/brokers", 200, BROKERS),
        ]);
        let classifier = StubClassifier {
            labels: vec![Label::Other],
            confidence: 0.9,
        };

        let stats = run(Arc::clone(&config), fetcher, classifier).await;
        assert_eq!(stats.processed, 1);
        assert_eq!(JsonlSink::read_all(&output).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_max_depth_zero_discovers_but_never_visits() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("records.jsonl");
        let config = {
            let mut c = (*test_config(&output)).clone();
            c.crawl.max_depth = 0;
            Arc::new(c)
        };

        let fetcher = StubFetcher::new(&[
            ("https://site.test/", 200, ROOT),
            ("https://site.test/brokers", 200, BROKERS),
        ]);
        let classifier = StubClassifier {
            labels: vec![Label::Other],
            confidence: 0.9,
        };

        let stats = run(Arc::clone(&config), fetcher, classifier).await;
        assert_eq!(stats.processed, 1);
        let records = JsonlSink::read_all(&output).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://site.test/");
    }

    #[tokio::test]
    async fn test_records_carry_ruleset_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("records.jsonl");
        let config = test_config(&output);

        let fetcher = StubFetcher::new(&[("https://site.test/", 200, BROKERS)]);
        let classifier = StubClassifier {
            labels: vec![Label::Professional],
            confidence: 0.9,
        };

        run(Arc::clone(&config), fetcher, classifier).await;
        let records = JsonlSink::read_all(&output).await.unwrap();
        let record = &records[0];
        assert_eq!(record.ruleset_version, "builtin-v1");
        assert_eq!(record.content_hash.len(), 64);
        assert!(!record.matched_rules.is_empty());
    }
}
