mod browser;
mod http;

pub use browser::{BrowserFetcher, DEFAULT_WEBDRIVER_URL};
pub use http::HttpFetcher;

use crate::error::FetchError;
use crate::types::{SiteDescriptor, SiteKind};
use async_trait::async_trait;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Plain GET of static HTML
    Http,
    /// Rendered through a WebDriver session
    Browser,
}

/// How one kind of site is fetched and where its listings live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingStrategy {
    pub kind: SiteKind,
    pub fetch_mode: FetchMode,
    /// Tried in order; the first selector matching anything is used.
    pub listing_selectors: &'static [&'static str],
    pub limit: usize,
}

pub fn strategy_for(kind: SiteKind) -> ListingStrategy {
    match kind {
        SiteKind::Ungm => ListingStrategy {
            kind,
            fetch_mode: FetchMode::Browser,
            listing_selectors: &["div.notice-card", "tr.notice-row"],
            limit: 20,
        },
        SiteKind::WorldBank => ListingStrategy {
            kind,
            fetch_mode: FetchMode::Http,
            listing_selectors: &["div.procurement-item", "a[href*='procurement']"],
            limit: 15,
        },
        SiteKind::Ted => ListingStrategy {
            kind,
            fetch_mode: FetchMode::Http,
            listing_selectors: &["div.notice", "article.tender"],
            limit: 15,
        },
        SiteKind::Generic => ListingStrategy {
            kind,
            fetch_mode: FetchMode::Http,
            listing_selectors: &[
                ".tender",
                ".opportunity",
                ".notice",
                ".procurement",
                "[class*='tender']",
                "[class*='opportunity']",
            ],
            limit: 20,
        },
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, site: &SiteDescriptor) -> Result<FetchedPage, FetchError>;
}

/// Site URL with the descriptor's search parameters appended as a query.
pub fn search_url(site: &SiteDescriptor) -> Result<Url, FetchError> {
    let mut url = Url::parse(&site.url).map_err(|source| FetchError::InvalidUrl {
        url: site.url.clone(),
        source,
    })?;
    if !site.search_params.is_empty() {
        url.query_pairs_mut().extend_pairs(site.search_params.iter());
    }
    Ok(url)
}

/// Routes each site to the HTTP or browser fetcher named by its strategy.
pub struct StrategyFetcher {
    http: Box<dyn PageFetcher>,
    browser: Box<dyn PageFetcher>,
}

impl StrategyFetcher {
    pub fn new(http: Box<dyn PageFetcher>, browser: Box<dyn PageFetcher>) -> Self {
        Self { http, browser }
    }
}

#[async_trait]
impl PageFetcher for StrategyFetcher {
    async fn fetch(&self, site: &SiteDescriptor) -> Result<FetchedPage, FetchError> {
        match strategy_for(site.kind).fetch_mode {
            FetchMode::Http => self.http.fetch(site).await,
            FetchMode::Browser => self.browser.fetch(site).await,
        }
    }
}
