//! Competitor discovery by scraping a search engine's result page.
//!
//! One [`ScrapedSerpSource`] per engine. A block page or non-200 status fails
//! the whole source; surviving results are fetched one at a time with a
//! randomized pause before each page.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use seoforge_shared::text::truncate_chars;
use seoforge_shared::{CompetitorRecord, Result, ScrapingConfig, SeoForgeError};
use tracing::{debug, info, instrument};

use crate::engines::SerpEngine;
use crate::fetch::{PageFetcher, browser_client};
use crate::policy::{DelayPolicy, DomainDenylist, is_block_page};

/// Capability: produce competitor pages for a keyword.
#[async_trait]
pub trait CompetitorSource: Send + Sync {
    /// Source name, recorded as provenance.
    fn name(&self) -> &str;

    /// Up to `count` competitor records in rank order.
    async fn search(&self, keyword: &str, count: usize) -> Result<Vec<CompetitorRecord>>;
}

/// Limits applied to scraped text.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeLimits {
    pub snippet_max_chars: usize,
    pub page_max_chars: usize,
}

impl From<&ScrapingConfig> for ScrapeLimits {
    fn from(config: &ScrapingConfig) -> Self {
        Self {
            snippet_max_chars: config.snippet_max_chars,
            page_max_chars: config.page_max_chars,
        }
    }
}

impl Default for ScrapeLimits {
    fn default() -> Self {
        Self::from(&ScrapingConfig::default())
    }
}

/// [`CompetitorSource`] backed by a search engine result page.
pub struct ScrapedSerpSource {
    engine: Box<dyn SerpEngine>,
    client: Client,
    fetcher: Arc<dyn PageFetcher>,
    denylist: DomainDenylist,
    delay: DelayPolicy,
    limits: ScrapeLimits,
}

impl ScrapedSerpSource {
    pub fn new(
        engine: Box<dyn SerpEngine>,
        fetcher: Arc<dyn PageFetcher>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            engine,
            client: browser_client(timeout)?,
            fetcher,
            denylist: DomainDenylist::default(),
            delay: DelayPolicy::default(),
            limits: ScrapeLimits::default(),
        })
    }

    pub fn with_delay(mut self, delay: DelayPolicy) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_limits(mut self, limits: ScrapeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_denylist(mut self, denylist: DomainDenylist) -> Self {
        self.denylist = denylist;
        self
    }
}

#[async_trait]
impl CompetitorSource for ScrapedSerpSource {
    fn name(&self) -> &str {
        self.engine.name()
    }

    #[instrument(skip_all, fields(engine = %self.engine.name(), keyword = %keyword, count = count))]
    async fn search(&self, keyword: &str, count: usize) -> Result<Vec<CompetitorRecord>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let engine = self.engine.name();

        let response = self
            .engine
            .request(&self.client, keyword, count)
            .send()
            .await
            .map_err(|e| SeoForgeError::Network(format!("{engine}: {e}")))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SeoForgeError::Network(format!("{engine}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SeoForgeError::Network(format!("{engine}: body read failed: {e}")))?;

        if is_block_page(&body) {
            return Err(SeoForgeError::Network(format!(
                "{engine}: block page detected"
            )));
        }

        let mut seen = HashSet::new();
        let hits: Vec<_> = self
            .engine
            .parse(&body, &self.denylist)
            .into_iter()
            .filter(|hit| seen.insert(hit.url.clone()))
            .take(count)
            .collect();
        debug!(hits = hits.len(), "result page parsed");

        let mut records = Vec::with_capacity(hits.len());
        for hit in hits {
            self.delay.pause().await;
            let body_excerpt = self
                .fetcher
                .fetch_text(&hit.url, self.limits.page_max_chars)
                .await;
            records.push(CompetitorRecord {
                snippet: truncate_chars(&hit.snippet, self.limits.snippet_max_chars).to_string(),
                url: hit.url,
                title: hit.title,
                body_excerpt,
            });
        }

        info!(records = records.len(), "competitor pages collected");
        Ok(records)
    }
}
