use crate::config::{AppConfig, PlaceKeyword};
use crate::model::{BusinessRecord, BusinessStatus, RawRecord};
use crate::utils::{collapse_whitespace, non_empty};

/// Canonical location tagging and target-region filtering.
#[derive(Debug, Clone)]
pub struct Normalizer {
    places: Vec<PlaceKeyword>,
    default_location: String,
    target_region: Vec<String>,
}

impl Normalizer {
    pub fn new(places: Vec<PlaceKeyword>, default_location: String, target_region: Vec<String>) -> Self {
        Self {
            places: places
                .into_iter()
                .map(|p| PlaceKeyword {
                    keyword: p.keyword.to_lowercase(),
                    label: p.label,
                })
                .collect(),
            default_location,
            target_region: target_region
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.place_keywords.clone(),
            config.default_location.clone(),
            config.target_region.clone(),
        )
    }

    /// Same places and default, different target region.
    #[cfg(test)]
    pub fn with_target_region(&self, target_region: Vec<String>) -> Self {
        Self::new(self.places.clone(), self.default_location.clone(), target_region)
    }

    pub fn normalize(&self, raw: RawRecord) -> BusinessRecord {
        let address = non_empty(raw.address.map(|a| collapse_whitespace(&a)));
        let hint = non_empty(raw.location_hint);
        let location = self.resolve_location(hint.as_deref(), address.as_deref(), raw.search_term.as_deref());

        BusinessRecord {
            name: collapse_whitespace(&raw.name),
            location,
            address,
            telephone: non_empty(raw.telephone),
            email: non_empty(raw.email),
            website: non_empty(raw.website),
            source: raw.source,
            status: BusinessStatus::New,
            registry: raw.registry,
        }
    }

    /// Never returns an empty string.
    pub fn resolve_location(&self, hint: Option<&str>, address: Option<&str>, term: Option<&str>) -> String {
        if let Some(label) = hint.and_then(|h| self.match_place(h)) {
            return label;
        }
        if let Some(label) = address.and_then(|a| self.match_address(a)) {
            return label;
        }
        if let Some(label) = term.and_then(|t| self.match_place(t)) {
            return label;
        }
        if let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) {
            return hint.to_string();
        }
        if let Some(last) = address.and_then(|a| a.split(',').map(str::trim).filter(|s| !s.is_empty()).last()) {
            return last.to_string();
        }
        self.default_location.clone()
    }

    pub fn is_in_target_region(&self, record: &BusinessRecord) -> bool {
        let location = record.location.to_lowercase();
        let address = record.address.as_deref().unwrap_or_default().to_lowercase();
        self.target_region
            .iter()
            .any(|k| location.contains(k.as_str()) || address.contains(k.as_str()))
    }

    fn match_place(&self, text: &str) -> Option<String> {
        let text = text.to_lowercase();
        self.places
            .iter()
            .find(|p| text.contains(p.keyword.as_str()))
            .map(|p| p.label.clone())
    }

    fn match_address(&self, address: &str) -> Option<String> {
        address.split(',').find_map(|segment| self.match_place(segment.trim()))
    }
}
