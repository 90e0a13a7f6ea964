use super::{search_url, FetchedPage, PageFetcher};
use crate::error::FetchError;
use crate::types::SiteDescriptor;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Fetches static listing pages over plain HTTP.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, site: &SiteDescriptor) -> Result<FetchedPage, FetchError> {
        let url = search_url(site)?;
        let url_str = url.to_string();
        debug!(site = %site.name, url = %url_str, "HTTP fetch");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Http { url: url_str.clone(), source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url_str, status: status.as_u16() });
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|source| FetchError::Http { url: url_str, source })?;

        Ok(FetchedPage { url: final_url, html })
    }
}
