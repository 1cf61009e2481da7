//! Page fetching, content extraction, and search result scraping.
//!
//! This crate provides:
//! - [`PageFetcher`] / [`HttpPageFetcher`]: fetch a page as cleaned main text
//! - [`extract_main_text`]: content container heuristics over raw HTML
//! - [`engines`]: Google and DuckDuckGo result-page adapters
//! - [`ScrapedSerpSource`]: a [`CompetitorSource`] over one engine

pub mod engines;
pub mod extract;
pub mod fetch;
pub mod policy;
pub mod serp;

pub use engines::{DuckDuckGoEngine, GoogleEngine, SerpEngine, SerpHit};
pub use extract::extract_main_text;
pub use fetch::{BROWSER_USER_AGENT, HttpPageFetcher, PageFetcher, browser_client};
pub use policy::{DelayPolicy, DomainDenylist, domain_of, is_block_page};
pub use serp::{CompetitorSource, ScrapeLimits, ScrapedSerpSource};
