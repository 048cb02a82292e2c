//! Crawl engine and the building blocks drivers are assembled from.

pub mod browser;
pub mod config;
pub mod configurable;
pub mod context;
pub mod crawler;
pub mod http_client;
pub mod markup;
pub mod pagination;
pub mod rate_limiter;
pub mod site;

pub use browser::{BrowserEngineConfig, BrowserSession, ChromeSession, ReplaySession};
pub use config::SiteConfig;
pub use configurable::ConfiguredSite;
pub use context::{RunContext, RunEvent, RunSettings, RunSummary, Skip};
pub use crawler::{crawl, drive};
pub use http_client::{HttpClient, RetryPolicy};
pub use markup::Markup;
pub use pagination::{PageCursor, PageObservation, Pagination};
pub use rate_limiter::RateLimiter;
pub use site::{BrowserDriver, ListingEntry, ListingSite, Processed, Section, SiteInfo};
