//! Scraping policy: which result domains are worth fetching, what a block
//! page looks like, and how long to pause between page fetches.

use std::collections::HashSet;
use std::time::Duration;

use rand::Rng;
use url::Url;

/// Domains never worth analyzing as competitors: social networks, search
/// engines, marketplaces and general encyclopedias.
const DEFAULT_DENYLIST: &[&str] = &[
    "google.com",
    "google.fr",
    "youtube.com",
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "linkedin.com",
    "amazon.com",
    "amazon.fr",
    "wikipedia.org",
    "reddit.com",
    "pinterest.com",
    "duckduckgo.com",
    "bing.com",
];

/// Phrases that mark a CAPTCHA or soft-block page (matched case-insensitively).
const BLOCK_MARKERS: &[&str] = &[
    "captcha",
    "unusual traffic",
    "avant d'accéder",
    "trafic inhabituel",
    "verify you are human",
    "not a robot",
];

// ---------------------------------------------------------------------------
// Domain filtering
// ---------------------------------------------------------------------------

/// Host of `url` without a leading `www.`, lowercased.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Set of domains whose results are dropped, subdomains included.
#[derive(Debug, Clone)]
pub struct DomainDenylist {
    domains: HashSet<String>,
}

impl Default for DomainDenylist {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST.iter().copied())
    }
}

impl DomainDenylist {
    pub fn new<'a>(domains: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            domains: domains.into_iter().map(str::to_lowercase).collect(),
        }
    }

    /// True for absolute http(s) URLs on a domain not in the list.
    pub fn allows(&self, url: &str) -> bool {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return false;
        }
        let Some(domain) = domain_of(url) else {
            return false;
        };
        !self.is_denied(&domain)
    }

    fn is_denied(&self, domain: &str) -> bool {
        let mut candidate = domain;
        loop {
            if self.domains.contains(candidate) {
                return true;
            }
            match candidate.split_once('.') {
                Some((_, parent)) if parent.contains('.') => candidate = parent,
                _ => return false,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Block detection
// ---------------------------------------------------------------------------

/// True if the body looks like a CAPTCHA/soft-block interstitial.
pub fn is_block_page(body: &str) -> bool {
    let lower = body.to_lowercase();
    BLOCK_MARKERS.iter().any(|marker| lower.contains(marker))
}

// ---------------------------------------------------------------------------
// Delay
// ---------------------------------------------------------------------------

/// Randomized pause between successive page fetches.
#[derive(Debug, Clone, Copy)]
pub struct DelayPolicy {
    min: Duration,
    max: Duration,
}

impl DelayPolicy {
    pub fn new(min: Duration, max: Duration) -> Self {
        if max < min {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    /// No pause at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Draw a duration uniformly from `[min, max]`.
    pub fn sample(&self) -> Duration {
        if self.max == self.min {
            return self.min;
        }
        let millis = rand::thread_rng().gen_range(self.min.as_millis()..=self.max.as_millis());
        Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    pub async fn pause(&self) {
        let wait = self.sample();
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_millis(1500))
    }
}
