use crate::model::ScraperError;
use crate::scraper::traits::{FetchRequest, Fetcher};

use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// reqwest-backed fetcher. Sleeps a fixed delay before every request it sends.
#[derive(Clone)]
pub struct HttpFetcher {
    pub client: Client,
    pub delay: Duration,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ScraperError::Http(e.to_string()))?;

        Ok(Self {
            client,
            delay: Duration::ZERO,
        })
    }

    /// Same connection pool, separate pacing.
    pub fn with_delay(&self, delay: Duration) -> Self {
        Self {
            client: self.client.clone(),
            delay,
        }
    }

    async fn pace(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<String, ScraperError> {
        self.pace().await;
        debug!("GET {}", req.url);

        let mut builder = self.client.get(&req.url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(user) = &req.basic_auth {
            builder = builder.basic_auth(user, Some(""));
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(ScraperError::InvalidResponse(response.status().as_u16()));
        }

        Ok(response.text().await?)
    }

    async fn head_ok(&self, url: &str) -> bool {
        self.pace().await;
        debug!("HEAD {}", url);

        match self.client.head(url).send().await {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(_) => false,
        }
    }
}
