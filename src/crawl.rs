//! Listing-page enumeration and per-page fan-out.
//!
//! One control thread walks the listing pages of a seed in order. The item
//! links of each page are handed to at most `max_workers` scoped worker
//! threads, and the controller joins the whole batch before it looks at the
//! download limit or moves on to the next page. Limits and error budgets are
//! therefore only checked at page boundaries.

use crate::config::GrabConfig;
use crate::extract;
use crate::fetch::{self, Fetcher, HeaderList};
use crate::ledger::PinLedger;
use crate::parser::PageParser;
use crate::paths::AppPaths;
use crate::pipeline::{ItemOutcome, ItemPipeline};
use crate::{GrabError, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use tracing::{info, warn};
use url::Url;

/// Per-seed request context: listing URL template, base URL and headers.
#[derive(Debug, Clone)]
pub struct SeedContext {
    pub seed: String,
    /// Listing URL with a `{page}` placeholder.
    pub page_template: String,
    pub base_url: Url,
    pub headers: HeaderList,
}

impl SeedContext {
    pub fn new(seed: &str, config: &GrabConfig) -> Result<Self> {
        let page_template = listing_template(seed, config);
        let probe = page_template.replace("{page}", &config.first_page.to_string());
        let parsed = Url::parse(&probe).map_err(|_| GrabError::InvalidSeed(seed.to_string()))?;
        if parsed.host_str().is_none() {
            return Err(GrabError::InvalidSeed(seed.to_string()));
        }
        let origin = parsed.origin().ascii_serialization();
        let base_url = Url::parse(&origin).map_err(|_| GrabError::InvalidSeed(seed.to_string()))?;
        let headers = fetch::request_headers(&config.user_agent, &origin);
        Ok(Self {
            seed: seed.to_string(),
            page_template,
            base_url,
            headers,
        })
    }

    pub fn page_url(&self, page: u32) -> String {
        self.page_template.replace("{page}", &page.to_string())
    }

    pub fn item_url(&self, href: &str) -> Option<String> {
        self.base_url.join(href).ok().map(|u| u.to_string())
    }
}

/// Seed plus page suffix; bare host names get `www.` (if configured) and `http://`.
pub fn listing_template(seed: &str, config: &GrabConfig) -> String {
    let seed = seed.trim();
    let mut suffix = config.page_suffix.clone();
    if seed.contains('?') {
        suffix = suffix.replace('?', "&");
    }
    if seed.ends_with('/') && suffix.starts_with('/') {
        suffix.remove(0);
    }
    let mut url = format!("{seed}{suffix}");

    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        if config.force_www && !lower.starts_with("www.") {
            url = format!("www.{url}");
        }
        url = format!("http://{url}");
    }
    url
}

/// Run-wide counters shared by every seed of one invocation.
#[derive(Debug, Default)]
pub struct RunState {
    downloads: AtomicUsize,
}

impl RunState {
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Returns the new cumulative total.
    pub fn add_downloads(&self, n: usize) -> usize {
        self.downloads.fetch_add(n, Ordering::SeqCst) + n
    }

    /// True once the total has gone past `limit`.
    pub fn limit_reached(&self, limit: Option<usize>) -> bool {
        limit.is_some_and(|limit| self.downloads() > limit)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchTally {
    pub items: usize,
    pub saved: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchTally {
    fn record(&mut self, outcome: &ItemOutcome) {
        self.items += 1;
        match outcome {
            ItemOutcome::Saved { .. } => self.saved += 1,
            ItemOutcome::Rejected { .. } => self.rejected += 1,
            ItemOutcome::NoIdentifier | ItemOutcome::AlreadyRecorded { .. } => self.skipped += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.items - self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedEnd {
    PagesExhausted,
    TooManyPageErrors,
    DownloadLimitReached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub seed: String,
    pub pages_fetched: usize,
    pub page_errors: usize,
    pub items: BatchTally,
    pub end: SeedEnd,
}

impl SeedSummary {
    fn new(seed: &str) -> Self {
        Self {
            seed: seed.to_string(),
            pages_fetched: 0,
            page_errors: 0,
            items: BatchTally::default(),
            end: SeedEnd::PagesExhausted,
        }
    }

    fn absorb(&mut self, batch: &BatchTally) {
        self.items.items += batch.items;
        self.items.saved += batch.saved;
        self.items.rejected += batch.rejected;
        self.items.skipped += batch.skipped;
        self.items.failed += batch.failed;
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub seeds: Vec<SeedSummary>,
    pub invalid_seeds: usize,
    /// Seeds never started because the download limit was already reached.
    pub skipped_seeds: usize,
    pub downloads: usize,
}

pub struct CrawlController<'a> {
    config: &'a GrabConfig,
    ledger: &'a PinLedger,
    fetcher: &'a dyn Fetcher,
    parser: &'a dyn PageParser,
    pipeline: ItemPipeline<'a>,
    state: RunState,
}

impl<'a> CrawlController<'a> {
    pub fn new(
        config: &'a GrabConfig,
        paths: &'a AppPaths,
        ledger: &'a PinLedger,
        fetcher: &'a dyn Fetcher,
        parser: &'a dyn PageParser,
    ) -> Self {
        Self {
            config,
            ledger,
            fetcher,
            parser,
            pipeline: ItemPipeline::new(config, paths, ledger, fetcher, parser),
            state: RunState::default(),
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Crawls each seed in order, stopping once the download limit is reached.
    pub fn crawl_all(&self, seeds: &[String]) -> RunSummary {
        let mut run = RunSummary::default();
        for (i, seed) in seeds.iter().enumerate() {
            if self.state.limit_reached(self.config.download_limit()) {
                run.skipped_seeds = seeds.len() - i;
                info!(
                    event = "download_limit_reached",
                    downloads = self.state.downloads(),
                    "download limit reached, no more seed urls"
                );
                break;
            }
            match self.crawl_seed(seed) {
                Ok(summary) => run.seeds.push(summary),
                Err(error) => {
                    warn!(event = "seed_invalid", seed = %seed, error = %error);
                    run.invalid_seeds += 1;
                }
            }
            if let Err(error) = self.ledger.flush() {
                warn!(event = "ledger_flush_failed", seed = %seed, error = %error);
            }
        }
        run.downloads = self.state.downloads();
        run
    }

    pub fn crawl_seed(&self, seed: &str) -> Result<SeedSummary> {
        let ctx = SeedContext::new(seed, self.config)?;
        let mut summary = SeedSummary::new(seed);
        let mut sequential_errors = 0_usize;

        for page in self.config.first_page..=self.config.last_page {
            let page_url = ctx.page_url(page);
            info!(event = "page_requested", page, url = %page_url);

            let body = match self.fetcher.get(&page_url, &ctx.headers) {
                Ok(body) => body,
                Err(error) => {
                    summary.page_errors += 1;
                    sequential_errors += 1;
                    warn!(event = "page_fetch_failed", page, url = %page_url, error = %error);
                    if sequential_errors >= self.config.max_sequential_page_errors {
                        warn!(
                            event = "seed_aborted",
                            seed = %seed,
                            errors = sequential_errors,
                            "too many errors, giving up on this url"
                        );
                        summary.end = SeedEnd::TooManyPageErrors;
                        return Ok(summary);
                    }
                    continue;
                }
            };
            sequential_errors = 0;
            summary.pages_fetched += 1;

            let body = String::from_utf8_lossy(&body);
            let links = dedup_by_pin(
                self.parser
                    .item_links(&body)
                    .iter()
                    .filter_map(|href| ctx.item_url(href)),
            );
            info!(event = "page_links_found", page, count = links.len(), "sublinks found");

            let tally = self.run_batch(&links, &ctx.headers);
            summary.absorb(&tally);
            let downloads = self.state.add_downloads(tally.saved);
            info!(
                event = "page_processed",
                page,
                succeeded = tally.succeeded(),
                failed = tally.failed,
                saved = tally.saved,
                downloads,
                "{} of {} items processed successfully from {}",
                tally.succeeded(),
                tally.items,
                page_url
            );

            if self.state.limit_reached(self.config.download_limit()) {
                info!(
                    event = "download_limit_reached",
                    downloads,
                    "download limit reached, no more pages of current url"
                );
                summary.end = SeedEnd::DownloadLimitReached;
                return Ok(summary);
            }

            if page < self.config.last_page && self.config.page_delay_ms > 0 {
                thread::sleep(self.config.page_delay());
            }
        }

        Ok(summary)
    }

    /// Runs the item pipeline for every link on `max_workers` threads and waits for all of them.
    pub fn run_batch(&self, links: &[String], headers: &[(String, String)]) -> BatchTally {
        let workers = self.config.max_workers.max(1).min(links.len());
        let next = AtomicUsize::new(0);
        let tally = Mutex::new(BatchTally::default());

        thread::scope(|scope| {
            for worker in 0..workers {
                let next = &next;
                let tally = &tally;
                let pipeline = &self.pipeline;
                scope.spawn(move || loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(link) = links.get(index) else {
                        break;
                    };
                    let outcome = pipeline.process(worker, link, headers);
                    tally
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .record(&outcome);
                });
            }
        });

        tally.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps the first link per identifier so no two workers of a batch share one.
/// Links without an identifier pass through.
fn dedup_by_pin(links: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| match extract::parse_pin(link) {
            Some(pin) => seen.insert(pin),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_www_scheme_and_suffix() {
        let cfg = GrabConfig::default();
        assert_eq!(
            listing_template("example.com/", &cfg),
            "http://www.example.com/?page={page}"
        );
        assert_eq!(
            listing_template("www.example.com/popular", &cfg),
            "http://www.example.com/popular?page={page}"
        );
    }

    #[test]
    fn existing_query_switches_suffix_separator() {
        let cfg = GrabConfig::default();
        assert_eq!(
            listing_template("http://www.example.com/search?q=lake", &cfg),
            "http://www.example.com/search?q=lake&page={page}"
        );
    }

    #[test]
    fn doubled_slash_is_dropped() {
        let cfg = GrabConfig {
            page_suffix: "/page/{page}".to_string(),
            ..GrabConfig::default()
        };
        assert_eq!(
            listing_template("https://example.com/", &cfg),
            "https://example.com/page/{page}"
        );
    }

    #[test]
    fn seed_context_derives_referer_and_item_urls() {
        let cfg = GrabConfig::default();
        let ctx = SeedContext::new("example.com/popular", &cfg).expect("ctx");
        assert_eq!(ctx.page_url(3), "http://www.example.com/popular?page=3");
        assert!(ctx
            .headers
            .iter()
            .any(|(k, v)| k == "Referer" && v == "http://www.example.com"));
        assert_eq!(
            ctx.item_url("/123456-lake").as_deref(),
            Some("http://www.example.com/123456-lake")
        );
    }

    #[test]
    fn seed_without_host_is_invalid() {
        let cfg = GrabConfig::default();
        assert!(matches!(
            SeedContext::new("http://", &cfg),
            Err(GrabError::InvalidSeed(_))
        ));
    }

    #[test]
    fn run_state_limit() {
        let state = RunState::default();
        assert!(!state.limit_reached(Some(3)));
        assert_eq!(state.add_downloads(2), 2);
        assert!(!state.limit_reached(Some(3)));
        assert_eq!(state.add_downloads(1), 3);
        assert!(!state.limit_reached(Some(3)));
        assert_eq!(state.add_downloads(1), 4);
        assert!(state.limit_reached(Some(3)));
        assert!(!state.limit_reached(None));
    }

    #[test]
    fn links_are_deduplicated_by_identifier() {
        let links = vec![
            "http://www.example.com/700001-a".to_string(),
            "http://www.example.com/about".to_string(),
            "http://www.example.com/700001-b".to_string(),
            "http://www.example.com/700002-c".to_string(),
            "http://www.example.com/contact".to_string(),
        ];
        assert_eq!(
            dedup_by_pin(links),
            vec![
                "http://www.example.com/700001-a".to_string(),
                "http://www.example.com/about".to_string(),
                "http://www.example.com/700002-c".to_string(),
                "http://www.example.com/contact".to_string(),
            ]
        );
    }
}
