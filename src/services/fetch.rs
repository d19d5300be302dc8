// src/services/fetch.rs

//! Fetch collaborator: trait contract plus the plain-HTTP adapter.
//!
//! The pipeline core only depends on the `Fetcher` trait; rendering and
//! retry behavior live entirely inside adapters.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::CrawlConfig;
use crate::utils::http;

/// Raw result of fetching one URL.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub raw_html: String,
    pub http_status: u16,
    pub final_url: String,
}

/// Collaborator that retrieves page HTML.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the URL over plain HTTP, following redirects.
    async fn fetch(&self, url: &str) -> Result<FetchResult>;

    /// Fetch the URL through a rendering engine. Adapters without a
    /// browser report the render path as unsupported; the pipeline then
    /// falls back to the static fetch.
    async fn render(&self, url: &str) -> Result<FetchResult> {
        Err(AppError::fetch(url, "rendering not supported by this fetcher"))
    }
}

/// Plain-HTTP fetcher with bounded retry for transport errors.
///
/// Retry is an adapter concern: the frontier treats fetch failures as
/// terminal, so any retrying must happen before the failure is reported.
pub struct HttpFetcher {
    client: reqwest::Client,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(config)?,
            retry_attempts: config.retry_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult> {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let http_status = response.status().as_u16();
                    let final_url = response.url().to_string();
                    let raw_html = response.text().await.unwrap_or_default();
                    return Ok(FetchResult {
                        raw_html,
                        http_status,
                        final_url,
                    });
                }
                Err(e) => {
                    log::debug!("Fetch attempt {}/{} failed for {}: {}", attempt, self.retry_attempts, url, e);
                    last_error = Some(e);
                    if attempt < self.retry_attempts {
                        tokio::time::sleep(self.retry_backoff * attempt).await;
                    }
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown transport error".to_string());
        Err(AppError::fetch(url, message))
    }
}
