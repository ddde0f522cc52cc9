//! Scraper for the mobile Naver finance IPO pages: a paged listing api
//! for enumerating stock codes, and server-rendered detail pages for
//! everything else.

pub mod detail;
pub mod listing;

use anyhow::Result;

pub(crate) const BASE_URL: &str = "https://m.stock.naver.com";

/// Shared HTTP client for both the listing api and the detail pages.
/// Implements [`gongmo_core::ListingEnumerator`] and
/// [`gongmo_core::DetailFetcher`].
pub struct NaverClient {
    pub(crate) client: reqwest::Client,
}

impl NaverClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub(crate) async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}
