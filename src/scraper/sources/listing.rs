// HTML listing pages: search results, maps, directories and social search
use crate::model::{ConfigError, RawRecord, ScraperError};
use crate::parser::{parse_selectors, FieldExtractor, FieldSelectors};
use crate::scraper::traits::{FetchRequest, Fetcher, SourceAdapter};

use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Where a listing page lives and how its cards are laid out.
#[derive(Debug)]
pub struct ListingLayout {
    pub source: &'static str,
    /// `{query}` and `{location}` are replaced URL-encoded.
    pub url_template: &'static str,
    pub containers: &'static [&'static str],
    pub fields: FieldSelectors,
}

pub const GOOGLE_SEARCH: ListingLayout = ListingLayout {
    source: "google_search",
    url_template: "https://www.google.com/search?q={query}&tbm=lcl",
    containers: &[".VkpGBb", ".rllt__details", ".dbg0pd"],
    fields: FieldSelectors {
        name: &["h3", ".dbg0pd"],
        address: &[".rllt__details", ".VkpGBb"],
        phone: &["[data-value=\"Phone\"]"],
        website: &["a[href*=\"http\"]"],
        location: &[],
        name_from_text: true,
        phone_from_text: true,
    },
};

pub const GOOGLE_MAPS: ListingLayout = ListingLayout {
    source: "google_maps",
    url_template: "https://www.google.com/maps/search/{query}",
    containers: &[".Nv2PK", ".THOPZb", "[data-value=\"Directions\"]"],
    fields: FieldSelectors {
        name: &["h3", ".fontHeadlineSmall"],
        address: &[".fontBodyMedium", ".W4Efsd", "[data-value=\"Address\"]"],
        phone: &["[data-value=\"Phone\"]"],
        website: &["a[href*=\"http\"]"],
        location: &[],
        name_from_text: true,
        phone_from_text: true,
    },
};

pub const YELL: ListingLayout = ListingLayout {
    source: "yell",
    url_template: "https://www.yell.com/ucs/UcsSearchAction.do?keywords={query}&location={location}",
    containers: &[".listing"],
    fields: FieldSelectors {
        name: &[".listing-name"],
        address: &[".listing-address"],
        phone: &[".listing-phone"],
        website: &[".listing-website a"],
        location: &[],
        name_from_text: false,
        phone_from_text: true,
    },
};

pub const YELP: ListingLayout = ListingLayout {
    source: "yelp",
    url_template: "https://www.yelp.co.uk/search?find_desc={query}&find_loc={location}",
    containers: &["[data-testid=\"serp-ia-card\"]"],
    fields: FieldSelectors {
        name: &["h3"],
        address: &["[data-testid=\"address\"]"],
        phone: &["[data-testid=\"phone\"]"],
        website: &["a[href*=\"biz\"]"],
        location: &[],
        name_from_text: false,
        phone_from_text: false,
    },
};

pub const FACEBOOK: ListingLayout = ListingLayout {
    source: "facebook",
    url_template: "https://www.facebook.com/search/pages/?q={query}",
    containers: &["[data-testid=\"search-results\"] .x1i10hfl"],
    fields: FieldSelectors {
        name: &["span[dir=\"auto\"]"],
        address: &[],
        phone: &[],
        website: &["a"],
        location: &[".x1lliihq"],
        name_from_text: false,
        phone_from_text: false,
    },
};

pub const LINKEDIN: ListingLayout = ListingLayout {
    source: "linkedin",
    url_template: "https://www.linkedin.com/search/results/companies/?keywords={query}",
    containers: &[".search-results-container .entity-result"],
    fields: FieldSelectors {
        name: &[".entity-result__title-text a"],
        address: &[],
        phone: &[],
        website: &[".entity-result__title-text a"],
        location: &[".entity-result__secondary-subtitle"],
        name_from_text: false,
        phone_from_text: false,
    },
};

const LAYOUTS: &[&ListingLayout] = &[&GOOGLE_SEARCH, &GOOGLE_MAPS, &YELL, &YELP, &FACEBOOK, &LINKEDIN];

pub fn layout_for(source: &str) -> Option<&'static ListingLayout> {
    LAYOUTS.iter().copied().find(|layout| layout.source == source)
}

pub struct ListingAdapter {
    layout: &'static ListingLayout,
    containers: Vec<Selector>,
    extractor: FieldExtractor,
    fetcher: Arc<dyn Fetcher>,
}

impl ListingAdapter {
    pub fn new(
        layout: &'static ListingLayout,
        fetcher: Arc<dyn Fetcher>,
        min_name_length: usize,
        denylist: &[String],
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            layout,
            containers: parse_selectors(layout.containers)?,
            extractor: FieldExtractor::new(&layout.fields, min_name_length, denylist)?,
            fetcher,
        })
    }

    pub fn build_url(&self, term: &str, location: Option<&str>) -> String {
        self.layout
            .url_template
            .replace("{query}", &urlencoding::encode(term))
            .replace("{location}", &urlencoding::encode(location.unwrap_or_default()))
    }

    /// Every card matched by any container selector, in document order per selector.
    /// Elements nested inside an already-visited card are not cards of their own.
    pub fn parse(&self, html: &str, term: &str, location: Option<&str>) -> Vec<RawRecord> {
        let document = Html::parse_document(html);
        let mut visited = HashSet::new();
        let mut cards = 0;
        let mut records = Vec::new();

        for selector in &self.containers {
            for element in document.select(selector) {
                let nested = element.ancestors().any(|node| visited.contains(&node.id()));
                if nested || !visited.insert(element.id()) {
                    continue;
                }
                cards += 1;
                let Some(fields) = self.extractor.extract(element) else {
                    continue;
                };
                records.push(RawRecord {
                    name: fields.name,
                    location_hint: fields.location.or_else(|| location.map(str::to_string)),
                    search_term: Some(term.to_string()),
                    address: fields.address,
                    telephone: fields.phone,
                    website: fields.website,
                    source: self.layout.source.to_string(),
                    ..RawRecord::default()
                });
            }
        }

        debug!(
            "{}: {} cards, {} rejected by extraction",
            self.layout.source,
            cards,
            cards - records.len()
        );
        records
    }
}

#[async_trait::async_trait]
impl SourceAdapter for ListingAdapter {
    fn name(&self) -> &str {
        self.layout.source
    }

    async fn fetch(&self, term: &str, location: Option<&str>) -> Result<Vec<RawRecord>, ScraperError> {
        let url = self.build_url(term, location);
        let html = self.fetcher.fetch(&FetchRequest::get(url)).await?;
        let records = self.parse(&html, term, location);
        match location {
            Some(loc) => info!("Found {} businesses in {} for \"{}\"", records.len(), loc, term),
            None => info!("Found {} results for \"{}\"", records.len(), term),
        }
        Ok(records)
    }
}
