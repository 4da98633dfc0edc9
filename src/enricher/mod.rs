pub mod contact;

use crate::config::{sic_label, AppConfig, AreaCode, Lexicon, SicCode};
use crate::model::{BusinessPatch, BusinessRecord, EnrichmentFilter, EnrichmentSummary, StoredBusiness};
use crate::scraper::sources::companies_house::{parse_profile, profile_request, CompanyProfile};
use crate::scraper::{FetchRequest, Fetcher};
use crate::storage::BusinessStore;

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const SEARCH_URL: &str = "https://www.google.com/search";

/// Best-effort backfill of missing fields on stored businesses.
pub struct Enricher {
    fetcher: Arc<dyn Fetcher>,
    registry_key: Option<String>,
    sic_codes: Vec<SicCode>,
    area_codes: Vec<AreaCode>,
    industry: Lexicon,
    size: Lexicon,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

impl Enricher {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &AppConfig) -> Self {
        Self {
            fetcher,
            registry_key: config
                .companies_house_api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            sic_codes: config.sic_codes.clone(),
            area_codes: config.area_codes.clone(),
            industry: config.industry_lexicon.clone(),
            size: config.size_lexicon.clone(),
        }
    }

    /// Only fields that were missing and got resolved end up in the patch.
    pub async fn enrich(&self, business: &StoredBusiness) -> BusinessPatch {
        let record = &business.record;
        let mut patch = BusinessPatch::default();

        let needs_site = is_blank(&record.email) || is_blank(&business.description) || is_blank(&business.social_media);
        let site_page = match record.website.as_deref() {
            Some(url) if needs_site && !url.trim().is_empty() => self.get(FetchRequest::get(url.trim())).await,
            _ => None,
        };

        let needs_profile = is_blank(&business.description) || is_blank(&business.industry);
        let profile = match record.registry.company_number.as_deref() {
            Some(number) if needs_profile && !number.trim().is_empty() => self.company_profile(number).await,
            _ => None,
        };

        if is_blank(&record.email) {
            patch.email = self.find_email(record, site_page.as_deref()).await;
        }
        if is_blank(&record.website) {
            patch.website = self.find_website(record).await;
        }
        if is_blank(&record.telephone) {
            patch.telephone = self.find_phone(record).await;
        }
        if is_blank(&business.description) {
            patch.description = profile
                .as_ref()
                .and_then(|p| p.description.clone())
                .or_else(|| site_page.as_deref().and_then(contact::meta_description));
        }
        if is_blank(&business.social_media) {
            patch.social_media = site_page.as_deref().and_then(contact::social_links);
        }
        if is_blank(&business.industry) {
            let registered = profile
                .as_ref()
                .and_then(|p| p.sic_codes.first())
                .map(|code| sic_label(&self.sic_codes, code));
            patch.industry = Some(registered.unwrap_or_else(|| self.industry.classify(&record.name)));
        }
        if is_blank(&business.employee_count) {
            patch.employee_count = Some(self.size.classify(&record.name));
        }

        patch
    }

    /// Registry profile for a known company number; needs the registry key.
    async fn company_profile(&self, company_number: &str) -> Option<CompanyProfile> {
        let key = self.registry_key.as_deref()?;
        let body = self.get(profile_request(key, company_number)).await?;
        match parse_profile(&body) {
            Ok(profile) => Some(profile),
            Err(e) => {
                debug!("Company profile {} unreadable: {}", company_number, e);
                None
            }
        }
    }

    async fn find_email(&self, record: &BusinessRecord, site_page: Option<&str>) -> Option<String> {
        if let Some(email) = site_page.and_then(contact::find_email) {
            return Some(email);
        }
        let page = self.search(&format!("\"{}\" \"{}\" email contact", record.name, record.location)).await?;
        contact::find_email(&page)
    }

    async fn find_website(&self, record: &BusinessRecord) -> Option<String> {
        let found = self
            .search(&format!("\"{}\" \"{}\" website", record.name, record.location))
            .await
            .and_then(|page| contact::find_website(&page));
        if found.is_some() {
            return found;
        }
        let guess = contact::guess_domain(&record.name)?;
        if self.fetcher.head_ok(&guess).await {
            return Some(guess);
        }
        None
    }

    async fn find_phone(&self, record: &BusinessRecord) -> Option<String> {
        let found = self
            .search(&format!("\"{}\" \"{}\" phone", record.name, record.location))
            .await
            .and_then(|page| contact::find_phone(&page));
        if found.is_some() {
            return found;
        }
        self.area_code_for(&record.location)
    }

    /// Location -> area-code heuristic, first matching keyword wins.
    pub fn area_code_for(&self, location: &str) -> Option<String> {
        let location = location.to_lowercase();
        self.area_codes
            .iter()
            .find(|a| location.contains(&a.location_keyword.to_lowercase()))
            .map(|a| a.phone.clone())
    }

    async fn search(&self, query: &str) -> Option<String> {
        self.get(FetchRequest::get(SEARCH_URL).query("q", query)).await
    }

    async fn get(&self, req: FetchRequest) -> Option<String> {
        match self.fetcher.fetch(&req).await {
            Ok(body) => Some(body),
            Err(e) => {
                debug!("Lookup {} failed: {}", req.url, e);
                None
            }
        }
    }
}

/// Enriches every stored business the filter selects and writes non-empty patches back.
pub async fn run_enrichment<S: BusinessStore>(
    store: &Arc<Mutex<S>>,
    enricher: &Enricher,
    filter: EnrichmentFilter,
) -> EnrichmentSummary {
    let mut summary = EnrichmentSummary::default();

    let listed = store.lock().await.list_needing_enrichment(filter);
    let businesses = match listed {
        Ok(b) => b,
        Err(e) => {
            warn!("Cannot list businesses needing enrichment: {}", e);
            summary.errors.push(e.to_string());
            return summary;
        }
    };
    summary.total = businesses.len();
    info!("Found {} businesses needing enrichment", summary.total);

    for business in &businesses {
        let patch = enricher.enrich(business).await;
        if patch.is_empty() {
            debug!("No additional data found for {}", business.record.name);
            continue;
        }

        let updated = store.lock().await.update_fields(business.id, &patch);
        match updated {
            Ok(_) => {
                info!("Enriched {} with {} fields", business.record.name, patch.field_count());
                summary.enriched_records += 1;
                summary.fields_filled += patch.field_count();
            }
            Err(e) => {
                warn!("Error enriching {}: {}", business.record.name, e);
                summary.errors.push(format!("{}: {}", business.record.name, e));
            }
        }
    }

    info!(
        "Enrichment finished: {} of {} records, {} fields, {} errors",
        summary.enriched_records,
        summary.total,
        summary.fields_filled,
        summary.errors.len()
    );
    summary
}
