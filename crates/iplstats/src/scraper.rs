use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Page not found: {0}")]
    NotFound(String),
}

/// Where pages come from. The pipeline only ever asks for a body by URL.
pub trait PageSource {
    fn fetch_page(&self, url: &str) -> impl Future<Output = Result<String, ScraperError>>;
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
}

impl WebScraper {
    pub fn new(timeout: Duration) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self { client })
    }

    async fn get_html(&self, url: &str) -> Result<String, ScraperError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound(url.to_string()));
        }

        Ok(response
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}

impl PageSource for WebScraper {
    async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        log::info!("Fetching {}", url);
        let body = self.get_html(url).await?;
        log::debug!("Received {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
