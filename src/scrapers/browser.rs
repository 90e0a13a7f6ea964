use super::{search_url, FetchedPage, PageFetcher};
use crate::error::FetchError;
use crate::types::SiteDescriptor;
use async_trait::async_trait;
use std::time::Duration;
use thirtyfour::prelude::*;
use tracing::{debug, warn};

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

const CHROME_ARGS: &[&str] = &[
    "--headless=new",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--window-size=1920,1080",
];

/// Renders JavaScript-heavy listing pages through a headless Chrome session.
pub struct BrowserFetcher {
    webdriver_url: String,
    settle_delay: Duration,
}

impl BrowserFetcher {
    pub fn new(webdriver_url: impl Into<String>, settle_delay: Duration) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            settle_delay,
        }
    }

    async fn render(&self, driver: &WebDriver, url: &str) -> WebDriverResult<String> {
        driver.goto(url).await?;
        driver.query(By::Tag("body")).first().await?;

        // Scripts keep filling the listing after the body exists
        tokio::time::sleep(self.settle_delay).await;

        driver.source().await
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, site: &SiteDescriptor) -> Result<FetchedPage, FetchError> {
        let url = search_url(site)?.to_string();
        let browser_err = |e: WebDriverError| FetchError::Browser {
            url: url.clone(),
            message: e.to_string(),
        };
        debug!(site = %site.name, url = %url, "Browser fetch");

        let mut caps = DesiredCapabilities::chrome();
        for arg in CHROME_ARGS {
            caps.add_chrome_arg(arg).map_err(browser_err)?;
        }

        let driver = WebDriver::new(&self.webdriver_url, caps)
            .await
            .map_err(browser_err)?;

        let result = self.render(&driver, &url).await;

        // Close the browser on both paths
        if let Err(e) = driver.quit().await {
            warn!(error = %e, "Failed to quit browser");
        }

        let html = result.map_err(browser_err)?;
        Ok(FetchedPage { url, html })
    }
}
