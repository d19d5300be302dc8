// src/services/frontier.rs

//! URL frontier: queue, visited-set, and crawl limits.
//!
//! The frontier is the single serialization point of the pipeline. It owns
//! every `UrlState`, enforces the depth/page/domain limits, deduplicates by
//! normalized URL, and paces dequeues to the configured rate. Any number of
//! workers may call `next`/`report` concurrently; all state lives behind
//! one mutex and the lock is never held across an await point.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::models::CrawlConfig;
use crate::utils;

/// Poll interval while the queue is empty but pages are still in flight.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Processing status of a known URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlStatus {
    Pending,
    InProgress,
    Done,
    Failed,
    Skipped,
}

/// Terminal outcome a worker reports for a dequeued URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    Done,
    Failed,
    Skipped,
}

impl From<CrawlOutcome> for UrlStatus {
    fn from(outcome: CrawlOutcome) -> Self {
        match outcome {
            CrawlOutcome::Done => UrlStatus::Done,
            CrawlOutcome::Failed => UrlStatus::Failed,
            CrawlOutcome::Skipped => UrlStatus::Skipped,
        }
    }
}

/// State of one discovered URL. Owned exclusively by the frontier.
#[derive(Debug, Clone)]
pub struct UrlState {
    /// Canonical dedup key (see `utils::url::normalize`)
    pub normalized_url: String,

    /// Minimum depth at which this URL was discovered
    pub depth: usize,

    /// When the URL was first discovered
    pub discovered_at: DateTime<Utc>,

    /// Current processing status
    pub status: UrlStatus,
}

struct FrontierState {
    /// At most one entry per normalized URL
    entries: HashMap<String, UrlState>,

    /// FIFO queues bucketed by depth; lowest depth is served first
    queue: BTreeMap<usize, VecDeque<String>>,

    /// Pages handed out so far, counted against max_pages
    dequeued: usize,

    /// Pages dequeued but not yet reported back
    in_flight: usize,

    /// Earliest instant the next dequeue may happen
    next_allowed: Option<Instant>,
}

enum Step {
    Ready(UrlState),
    Wait(Duration),
    Idle,
    Exhausted,
}

/// Concurrent-safe URL frontier with breadth-first order and rate limiting.
pub struct Frontier {
    max_depth: usize,
    max_pages: usize,
    interval: Duration,
    allowed_domains: HashSet<String>,
    state: Mutex<FrontierState>,
}

impl Frontier {
    /// Build a frontier from crawl configuration. When `allowed_domains`
    /// is empty the hosts of the start URLs form the whitelist.
    pub fn new(config: &CrawlConfig) -> Self {
        let mut allowed: HashSet<String> = config
            .allowed_domains
            .iter()
            .map(|d| d.to_lowercase())
            .collect();
        if allowed.is_empty() {
            allowed = config
                .start_urls
                .iter()
                .filter_map(|u| utils::get_domain(u))
                .collect();
        }

        Self {
            max_depth: config.max_depth,
            max_pages: config.max_pages,
            interval: Duration::from_millis(config.rate_interval_ms),
            allowed_domains: allowed,
            state: Mutex::new(FrontierState {
                entries: HashMap::new(),
                queue: BTreeMap::new(),
                dequeued: 0,
                in_flight: 0,
                next_allowed: None,
            }),
        }
    }

    /// Enqueue a seed URL at depth 0 through the normal admission gate.
    /// Returns true if the URL was newly admitted.
    pub fn seed(&self, url: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        self.enqueue_locked(&mut state, url, 0)
    }

    /// Dequeue the next URL to process, honoring breadth-first order, the
    /// global rate limit, and the max_pages ceiling.
    ///
    /// Suspends the caller while the rate interval has not elapsed or while
    /// the queue is empty but other workers still have pages in flight.
    /// Returns `None` only when the crawl is over: the page budget is spent,
    /// or nothing is queued and nothing is in flight.
    pub async fn next(&self) -> Option<UrlState> {
        loop {
            let step = {
                let mut state = self.state.lock().unwrap();
                self.next_step(&mut state)
            };

            match step {
                Step::Ready(url_state) => return Some(url_state),
                Step::Wait(wait) => tokio::time::sleep(wait).await,
                Step::Idle => tokio::time::sleep(IDLE_POLL).await,
                Step::Exhausted => return None,
            }
        }
    }

    /// Report the outcome for a dequeued URL and feed back discovered links.
    ///
    /// The IN_PROGRESS -> DONE/FAILED/SKIPPED transition and the enqueue of
    /// the links happen atomically under the frontier lock. Links are
    /// admitted at the reporting URL's depth + 1; out-of-scope links are
    /// silently dropped.
    pub fn report(&self, url: &str, outcome: CrawlOutcome, discovered_links: &[String]) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        let parent_depth = {
            let Some(entry) = state.entries.get_mut(url) else {
                log::debug!("Ignoring report for unknown URL {}", url);
                return;
            };
            if entry.status != UrlStatus::InProgress {
                log::debug!("Ignoring report for {} in status {:?}", url, entry.status);
                return;
            }
            entry.status = outcome.into();
            state.in_flight -= 1;
            entry.depth
        };

        for link in discovered_links {
            self.enqueue_locked(state, link, parent_depth + 1);
        }
    }

    /// Number of URLs dequeued so far.
    pub fn dequeued_count(&self) -> usize {
        self.state.lock().unwrap().dequeued
    }

    /// Number of known URLs per status.
    pub fn status_counts(&self) -> HashMap<UrlStatus, usize> {
        let state = self.state.lock().unwrap();
        let mut counts = HashMap::new();
        for entry in state.entries.values() {
            *counts.entry(entry.status).or_insert(0) += 1;
        }
        counts
    }

    /// Fetch the recorded state of a URL, if known.
    pub fn get(&self, normalized_url: &str) -> Option<UrlState> {
        self.state.lock().unwrap().entries.get(normalized_url).cloned()
    }

    fn next_step(&self, state: &mut FrontierState) -> Step {
        if state.dequeued >= self.max_pages {
            return Step::Exhausted;
        }

        let Some(url) = Self::peek_pending(state) else {
            return if state.in_flight > 0 {
                Step::Idle
            } else {
                Step::Exhausted
            };
        };

        let now = Instant::now();
        if let Some(next_allowed) = state.next_allowed {
            if next_allowed > now {
                return Step::Wait(next_allowed - now);
            }
        }

        let depth = state.entries[&url].depth;
        if let Some(bucket) = state.queue.get_mut(&depth) {
            bucket.pop_front();
            if bucket.is_empty() {
                state.queue.remove(&depth);
            }
        }

        let entry = state.entries.get_mut(&url).expect("peeked entry exists");
        entry.status = UrlStatus::InProgress;
        let ready = entry.clone();

        state.dequeued += 1;
        state.in_flight += 1;
        state.next_allowed = Some(now + self.interval);

        Step::Ready(ready)
    }

    /// Front of the lowest non-empty depth bucket, discarding stale queue
    /// entries (re-queued at a lower depth, or no longer PENDING) on the way.
    fn peek_pending(state: &mut FrontierState) -> Option<String> {
        loop {
            let depth = *state.queue.keys().next()?;
            let bucket = state.queue.get_mut(&depth).expect("key just observed");

            let Some(url) = bucket.front() else {
                state.queue.remove(&depth);
                continue;
            };

            let fresh = state
                .entries
                .get(url)
                .is_some_and(|e| e.status == UrlStatus::Pending && e.depth == depth);
            if !fresh {
                bucket.pop_front();
                if bucket.is_empty() {
                    state.queue.remove(&depth);
                }
                continue;
            }

            return Some(url.clone());
        }
    }

    fn enqueue_locked(&self, state: &mut FrontierState, raw: &str, depth: usize) -> bool {
        let Some(normalized) = utils::normalize_url(raw) else {
            return false;
        };
        let Some(host) = utils::get_domain(&normalized) else {
            return false;
        };
        if !self.allowed_domains.contains(&host) {
            return false;
        }
        if depth > self.max_depth {
            return false;
        }

        match state.entries.get_mut(&normalized) {
            Some(entry) => {
                // Dedup: keep the minimum observed depth
                if depth < entry.depth {
                    entry.depth = depth;
                    if entry.status == UrlStatus::Pending {
                        state
                            .queue
                            .entry(depth)
                            .or_default()
                            .push_back(normalized);
                    }
                }
                false
            }
            None => {
                state.entries.insert(
                    normalized.clone(),
                    UrlState {
                        normalized_url: normalized.clone(),
                        depth,
                        discovered_at: Utc::now(),
                        status: UrlStatus::Pending,
                    },
                );
                state.queue.entry(depth).or_default().push_back(normalized);
                true
            }
        }
    }
}
