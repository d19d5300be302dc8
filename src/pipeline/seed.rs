// src/pipeline/seed.rs

//! Frontier seeding: start URLs plus best-effort sitemap discovery.

use std::collections::HashSet;

use regex::Regex;

use crate::models::CrawlConfig;
use crate::services::{Fetcher, Frontier};
use crate::utils;

/// Seed the frontier with the configured start URLs and, when enabled,
/// every `<loc>` entry of each start host's `/sitemap.xml`. Sitemap URLs
/// go through the same normalization/domain/depth gate as any link;
/// sitemap fetch failures are ignored. Returns the number of URLs admitted.
pub async fn seed_frontier(
    frontier: &Frontier,
    config: &CrawlConfig,
    fetcher: &dyn Fetcher,
) -> usize {
    let mut seeded = 0;
    for url in &config.start_urls {
        if frontier.seed(url) {
            seeded += 1;
        }
    }

    if !config.use_sitemap {
        return seeded;
    }

    let mut tried = HashSet::new();
    for url in &config.start_urls {
        let Some(sitemap) = utils::url::sitemap_url(url) else {
            continue;
        };
        if !tried.insert(sitemap.clone()) {
            continue;
        }

        match fetcher.fetch(&sitemap).await {
            Ok(result) if (200..300).contains(&result.http_status) => {
                let locs = parse_sitemap_locs(&result.raw_html);
                log::info!("Sitemap {} listed {} URLs", sitemap, locs.len());
                for loc in locs {
                    if frontier.seed(&loc) {
                        seeded += 1;
                    }
                }
            }
            Ok(result) => {
                log::debug!("Sitemap {} returned HTTP {}", sitemap, result.http_status);
            }
            Err(e) => {
                log::debug!("Sitemap {} not available: {}", sitemap, e);
            }
        }
    }

    seeded
}

/// Extract `<loc>` entries from sitemap XML, in document order.
pub fn parse_sitemap_locs(xml: &str) -> Vec<String> {
    let pattern = Regex::new(r"<loc>\s*([^<]+?)\s*</loc>").expect("static pattern");
    pattern
        .captures_iter(xml)
        .map(|caps| caps[1].to_string())
        .collect()
}
