// Core structs: RawRecord, BusinessRecord, StoredBusiness, OutreachLog, run summaries
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Outreach lifecycle of a business. The pipeline only ever writes `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BusinessStatus {
    #[default]
    New,
    Contacted,
    Interested,
    #[serde(rename = "Not Interested")]
    NotInterested,
}

impl BusinessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessStatus::New => "New",
            BusinessStatus::Contacted => "Contacted",
            BusinessStatus::Interested => "Interested",
            BusinessStatus::NotInterested => "Not Interested",
        }
    }
}

impl fmt::Display for BusinessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BusinessStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(BusinessStatus::New),
            "Contacted" => Ok(BusinessStatus::Contacted),
            "Interested" => Ok(BusinessStatus::Interested),
            "Not Interested" => Ok(BusinessStatus::NotInterested),
            other => Err(StorageError::InvalidData(format!("unknown status '{}'", other))),
        }
    }
}

/// Fields only the company registry provides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryDetails {
    pub company_number: Option<String>,
    pub company_status: Option<String>,
    pub company_type: Option<String>,
    pub date_of_creation: Option<String>,
}

/// What an adapter hands to the normalizer: loosely structured, nothing canonical yet.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub name: String,
    /// Location the adapter searched in or scraped off the card, if any.
    pub location_hint: Option<String>,
    /// Search term that produced the record.
    pub search_term: Option<String>,
    pub address: Option<String>,
    pub telephone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub source: String,
    pub registry: RegistryDetails,
}

/// The unit flowing through Normalize → Deduplicate → Persist.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessRecord {
    pub name: String,
    pub location: String,
    pub address: Option<String>,
    pub telephone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub source: String,
    pub status: BusinessStatus,
    pub registry: RegistryDetails,
}

impl BusinessRecord {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, location: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            address: None,
            telephone: None,
            email: None,
            website: None,
            source: source.into(),
            status: BusinessStatus::New,
            registry: RegistryDetails::default(),
        }
    }

    /// `lowercase(name) + "-" + lowercase(location)`; exact match only.
    pub fn identity_key(&self) -> String {
        crate::utils::identity_key(&self.name, &self.location)
    }
}

/// A business row as the store returns it.
#[derive(Debug, Clone)]
pub struct StoredBusiness {
    pub id: i64,
    pub record: BusinessRecord,
    pub industry: Option<String>,
    pub employee_count: Option<String>,
    pub description: Option<String>,
    /// JSON object of platform -> profile URL.
    pub social_media: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_contacted: Option<DateTime<Utc>>,
}

/// Partial update produced by the enricher. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusinessPatch {
    pub email: Option<String>,
    pub website: Option<String>,
    pub telephone: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<String>,
    pub social_media: Option<String>,
}

impl BusinessPatch {
    /// Column name / value pairs for every field that is set.
    pub fn columns(&self) -> Vec<(&'static str, &str)> {
        let fields = [
            ("email", &self.email),
            ("website", &self.website),
            ("telephone", &self.telephone),
            ("description", &self.description),
            ("industry", &self.industry),
            ("employee_count", &self.employee_count),
            ("social_media", &self.social_media),
        ];
        fields
            .into_iter()
            .filter_map(|(column, value)| value.as_deref().map(|v| (column, v)))
            .collect()
    }

    pub fn field_count(&self) -> usize {
        self.columns().len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }
}

/// Which records `list_needing_enrichment` returns.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentFilter {
    pub missing_email: bool,
    pub missing_website: bool,
    pub missing_telephone: bool,
    pub limit: Option<usize>,
}

impl Default for EnrichmentFilter {
    fn default() -> Self {
        Self {
            missing_email: true,
            missing_website: true,
            missing_telephone: false,
            limit: None,
        }
    }
}

/// One contact attempt. Only `response_received` changes after creation.
#[derive(Debug, Clone)]
pub struct OutreachLog {
    pub id: i64,
    pub business_id: i64,
    pub email_sent: bool,
    pub phone_called: bool,
    pub notes: Option<String>,
    pub template_used: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub response_received: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewOutreachLog {
    pub business_id: i64,
    pub email_sent: bool,
    pub phone_called: bool,
    pub notes: Option<String>,
    pub template_used: Option<String>,
}

/// Per-source breakdown of what the store holds.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCoverage {
    pub source: String,
    pub count: usize,
    pub with_email: usize,
    pub with_website: usize,
    pub with_phone: usize,
}

/// Counts for one adapter within a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceStats {
    pub source: String,
    pub fetched: usize,
    pub out_of_region: usize,
    pub kept: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PersistOutcome {
    pub inserted: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Completion report of a discovery run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub sources: Vec<SourceStats>,
    pub collected: usize,
    pub deduplicated: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Completion report of an enrichment run.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentSummary {
    pub total: usize,
    pub enriched_records: usize,
    pub fields_filled: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("http error: {0}")]
    Http(String),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {0}")]
    InvalidResponse(u16),
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
}

impl From<reqwest::Error> for ScraperError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ScraperError::Timeout
        } else if let Some(status) = e.status() {
            ScraperError::InvalidResponse(status.as_u16())
        } else {
            ScraperError::Http(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("business {0} not found")]
    NotFound(i64),
}

/// Anything here aborts a run before the first request goes out.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing credential: {0}")]
    MissingCredential(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
