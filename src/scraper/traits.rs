use crate::model::{RawRecord, ScraperError};

/// One outbound GET, as an adapter describes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Basic auth user name; the password is always empty.
    pub basic_auth: Option<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn basic_auth(mut self, user: impl Into<String>) -> Self {
        self.basic_auth = Some(user.into());
        self
    }
}

/// Transport seam: the HTTP client in production, scripted pages in tests.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<String, ScraperError>;

    /// True iff a HEAD request answers 200.
    async fn head_ok(&self, url: &str) -> bool;
}

/// One external data source behind the uniform fetch contract.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, term: &str, location: Option<&str>) -> Result<Vec<RawRecord>, ScraperError>;
}
