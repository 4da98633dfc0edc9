use crate::model::{RawRecord, RegistryDetails, ScraperError};
use crate::scraper::traits::{FetchRequest, Fetcher, SourceAdapter};
use crate::utils::non_empty;

use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub const SEARCH_URL: &str = "https://api.company-information.service.gov.uk/search/companies";
pub const COMPANY_URL: &str = "https://api.company-information.service.gov.uk/company";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Option<Vec<CompanyItem>>,
}

#[derive(Debug, Deserialize)]
struct CompanyItem {
    title: Option<String>,
    address_snippet: Option<String>,
    company_number: Option<String>,
    company_status: Option<String>,
    company_type: Option<String>,
    date_of_creation: Option<String>,
}

/// The parts of a registry company profile enrichment uses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompanyProfile {
    #[serde(default)]
    pub sic_codes: Vec<String>,
    pub description: Option<String>,
}

pub fn profile_request(api_key: &str, company_number: &str) -> FetchRequest {
    FetchRequest::get(format!("{}/{}", COMPANY_URL, company_number.trim())).basic_auth(api_key)
}

pub fn parse_profile(body: &str) -> Result<CompanyProfile, ScraperError> {
    let mut profile: CompanyProfile =
        serde_json::from_str(body).map_err(|e| ScraperError::UnexpectedShape(e.to_string()))?;
    profile.description = non_empty(profile.description);
    Ok(profile)
}

/// Companies House registry search, authenticated with the API key as Basic-auth user.
pub struct CompaniesHouseAdapter {
    fetcher: Arc<dyn Fetcher>,
    api_key: String,
    page_size: u32,
}

impl CompaniesHouseAdapter {
    pub fn new(fetcher: Arc<dyn Fetcher>, api_key: String, page_size: u32) -> Self {
        Self {
            fetcher,
            api_key,
            page_size,
        }
    }

    fn build_request(&self, term: &str) -> FetchRequest {
        FetchRequest::get(SEARCH_URL)
            .query("q", term)
            .query("items_per_page", self.page_size)
            .query("start_index", 0)
            .basic_auth(self.api_key.clone())
    }

    fn parse(&self, body: &str) -> Result<Vec<RawRecord>, ScraperError> {
        let response: SearchResponse =
            serde_json::from_str(body).map_err(|e| ScraperError::UnexpectedShape(e.to_string()))?;
        let items = response
            .items
            .ok_or_else(|| ScraperError::UnexpectedShape("missing 'items'".into()))?;

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let name = non_empty(item.title)?;
                Some(RawRecord {
                    name,
                    address: non_empty(item.address_snippet),
                    source: "companies_house".to_string(),
                    registry: RegistryDetails {
                        company_number: item.company_number,
                        company_status: item.company_status,
                        company_type: item.company_type,
                        date_of_creation: item.date_of_creation,
                    },
                    ..RawRecord::default()
                })
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl SourceAdapter for CompaniesHouseAdapter {
    fn name(&self) -> &str {
        "companies_house"
    }

    async fn fetch(&self, term: &str, _location: Option<&str>) -> Result<Vec<RawRecord>, ScraperError> {
        let body = self.fetcher.fetch(&self.build_request(term)).await?;
        let records = self.parse(&body)?;
        info!("Found {} companies for \"{}\"", records.len(), term);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::testing::ScriptedFetcher;

    const BODY: &str = r#"{
        "items": [
            { "title": "ACME LTD", "address_snippet": "1 High Street, Hull, HU1 1AA",
              "company_number": "01234567", "company_status": "active",
              "company_type": "ltd", "date_of_creation": "2001-02-03" },
            { "title": "", "address_snippet": "nowhere" },
            { "title": "BETA CO", "address_snippet": null }
        ]
    }"#;

    fn adapter(fetcher: ScriptedFetcher) -> (Arc<ScriptedFetcher>, CompaniesHouseAdapter) {
        let fetcher = Arc::new(fetcher);
        let adapter = CompaniesHouseAdapter::new(fetcher.clone(), "secret".into(), 100);
        (fetcher, adapter)
    }

    #[tokio::test]
    async fn maps_registry_items() {
        let (fetcher, adapter) = adapter(ScriptedFetcher::new().page("search/companies", BODY));
        let records = adapter.fetch("Hull business", None).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "ACME LTD");
        assert_eq!(records[0].address.as_deref(), Some("1 High Street, Hull, HU1 1AA"));
        assert_eq!(records[0].registry.company_number.as_deref(), Some("01234567"));
        assert_eq!(records[0].source, "companies_house");
        assert_eq!(records[1].address, None);

        let requested = fetcher.requested();
        assert_eq!(requested.len(), 1);
        assert!(requested[0].contains("q=Hull business"));
        assert!(requested[0].contains("items_per_page=100"));
    }

    #[test]
    fn request_carries_credentials() {
        let (_, adapter) = adapter(ScriptedFetcher::new());
        assert_eq!(adapter.build_request("x").basic_auth.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn missing_items_is_unexpected_shape() {
        let (_, adapter) = adapter(ScriptedFetcher::new().page("search/companies", r#"{"errors": []}"#));
        let err = adapter.fetch("Hull business", None).await.unwrap_err();
        assert!(matches!(err, ScraperError::UnexpectedShape(_)));
    }

    #[tokio::test]
    async fn sic_code_queries_pass_through() {
        let (fetcher, adapter) = adapter(ScriptedFetcher::new().page("search/companies", BODY));
        adapter.fetch("sic_code:62020", None).await.unwrap();
        assert_eq!(fetcher.requested_matching("q=sic_code:62020"), 1);
    }

    #[test]
    fn reads_company_profile() {
        let req = profile_request("secret", " 01234567 ");
        assert_eq!(req.url, "https://api.company-information.service.gov.uk/company/01234567");
        assert_eq!(req.basic_auth.as_deref(), Some("secret"));

        let profile = parse_profile(r#"{"company_name": "ACME LTD", "sic_codes": ["62020", "70229"], "description": " "}"#)
            .unwrap();
        assert_eq!(profile.sic_codes, vec!["62020", "70229"]);
        assert_eq!(profile.description, None);

        assert_eq!(parse_profile(r#"{"company_name": "BETA CO"}"#).unwrap(), CompanyProfile::default());
        assert!(matches!(parse_profile("<html>"), Err(ScraperError::UnexpectedShape(_))));
    }

    #[tokio::test]
    async fn http_failure_surfaces_as_error() {
        let (_, adapter) = adapter(ScriptedFetcher::new().status("search/companies", 401));
        let err = adapter.fetch("Hull business", None).await.unwrap_err();
        assert!(matches!(err, ScraperError::InvalidResponse(401)));
    }
}
