use crate::model::ScraperError;
use crate::scraper::traits::{FetchRequest, Fetcher};
use std::sync::Mutex;

enum Scripted {
    Page(String),
    Status(u16),
}

/// In-memory fetcher: answers from scripted pages and records every request.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: Vec<(String, Scripted)>,
    live_urls: Vec<String>,
    pub requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for any request whose URL (with query) contains `pattern`.
    pub fn page(mut self, pattern: &str, body: &str) -> Self {
        self.pages.push((pattern.to_string(), Scripted::Page(body.to_string())));
        self
    }

    pub fn status(mut self, pattern: &str, status: u16) -> Self {
        self.pages.push((pattern.to_string(), Scripted::Status(status)));
        self
    }

    pub fn live(mut self, url: &str) -> Self {
        self.live_urls.push(url.to_string());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_matching(&self, pattern: &str) -> usize {
        self.requested().iter().filter(|r| r.contains(pattern)).count()
    }

    fn full_url(req: &FetchRequest) -> String {
        if req.query.is_empty() {
            return req.url.clone();
        }
        let query: Vec<String> = req.query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("{}?{}", req.url, query.join("&"))
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<String, ScraperError> {
        let url = Self::full_url(req);
        self.requests.lock().unwrap().push(url.clone());

        match self.pages.iter().find(|(pattern, _)| url.contains(pattern.as_str())) {
            Some((_, Scripted::Page(body))) => Ok(body.clone()),
            Some((_, Scripted::Status(status))) => Err(ScraperError::InvalidResponse(*status)),
            None => Err(ScraperError::Http(format!("connection refused: {}", url))),
        }
    }

    async fn head_ok(&self, url: &str) -> bool {
        self.requests.lock().unwrap().push(format!("HEAD {}", url));
        self.live_urls.iter().any(|u| u == url)
    }
}
