use crate::model::ConfigError;
use serde::Deserialize;
use std::fs;

pub const COMPANIES_HOUSE: &str = "companies_house";

/// Every source name the driver knows how to build an adapter for.
pub const KNOWN_SOURCES: &[&str] = &[
    COMPANIES_HOUSE,
    "google_search",
    "google_maps",
    "yell",
    "yelp",
    "facebook",
    "linkedin",
];

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Falls back to `AppConfig::search_terms` when empty.
    #[serde(default)]
    pub search_terms: Vec<String>,
    /// Each term is searched once per location; once without one when empty.
    #[serde(default)]
    pub locations: Vec<String>,
    pub delay_ms: Option<u64>,
    /// Registry only: industry codes searched as `sic_code:<code>` next to the terms.
    #[serde(default)]
    pub sic_codes: Vec<String>,
}

impl SourceConfig {
    pub fn new(name: &str, delay_ms: u64, search_terms: &[&str], locations: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            search_terms: search_terms.iter().map(|s| s.to_string()).collect(),
            locations: locations.iter().map(|s| s.to_string()).collect(),
            delay_ms: Some(delay_ms),
            sic_codes: Vec::new(),
        }
    }
}

/// A place name recognised in addresses and search terms, e.g. `hull` -> `Hull`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceKeyword {
    pub keyword: String,
    pub label: String,
}

/// Label for a standard industrial classification code.
#[derive(Debug, Clone, Deserialize)]
pub struct SicCode {
    pub code: String,
    pub description: String,
}

pub fn sic_label(table: &[SicCode], code: &str) -> String {
    table
        .iter()
        .find(|s| s.code == code)
        .map(|s| s.description.clone())
        .unwrap_or_else(|| format!("SIC {}", code))
}

#[derive(Debug, Clone, Deserialize)]
pub struct AreaCode {
    pub location_keyword: String,
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LexiconEntry {
    pub keywords: Vec<String>,
    pub label: String,
}

/// Ordered keyword lexicon; first entry with a keyword contained in the name wins.
#[derive(Debug, Clone, Deserialize)]
pub struct Lexicon {
    pub entries: Vec<LexiconEntry>,
    pub fallback: String,
}

impl Lexicon {
    fn from_pairs(pairs: &[(&[&str], &str)], fallback: &str) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(keywords, label)| LexiconEntry {
                    keywords: keywords.iter().map(|k| k.to_string()).collect(),
                    label: label.to_string(),
                })
                .collect(),
            fallback: fallback.to_string(),
        }
    }

    pub fn classify(&self, name: &str) -> String {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .find(|entry| entry.keywords.iter().any(|k| name.contains(&k.to_lowercase())))
            .map(|entry| entry.label.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub companies_house_api_key: Option<String>,
    pub companies_house_page_size: u32,
    pub db_path: String,
    pub user_agent: String,
    pub request_timeout_seconds: u64,
    pub default_delay_ms: u64,
    pub enrichment_delay_ms: u64,
    pub check_interval_seconds: u64,
    pub enrich_after_run: bool,
    /// Businesses older than this are deleted on every tick; never when unset.
    pub retention_days: Option<i64>,
    pub enrichment_limit: Option<usize>,
    pub target_region: Vec<String>,
    pub default_location: String,
    /// Most specific first.
    pub place_keywords: Vec<PlaceKeyword>,
    pub min_name_length: usize,
    pub name_denylist: Vec<String>,
    pub area_codes: Vec<AreaCode>,
    pub industry_lexicon: Lexicon,
    pub size_lexicon: Lexicon,
    pub sic_codes: Vec<SicCode>,
    pub search_terms: Vec<String>,
    pub sources: Vec<SourceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            companies_house_api_key: None,
            companies_house_page_size: 100,
            db_path: "data.db".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
            request_timeout_seconds: 15,
            default_delay_ms: 1000,
            enrichment_delay_ms: 1000,
            check_interval_seconds: 6 * 60 * 60,
            enrich_after_run: true,
            retention_days: None,
            enrichment_limit: None,
            target_region: strings(&["hull", "yorkshire"]),
            default_location: "Hull".to_string(),
            place_keywords: vec![
                PlaceKeyword { keyword: "hull".into(), label: "Hull".into() },
                PlaceKeyword { keyword: "yorkshire".into(), label: "Yorkshire".into() },
            ],
            min_name_length: 3,
            name_denylist: strings(&[
                "directions", "website", "phone", "address", "search", "google", "call", "menu",
                "sponsored", "reviews",
            ]),
            area_codes: vec![
                AreaCode { location_keyword: "hull".into(), phone: "+44 1482 123456".into() },
                AreaCode { location_keyword: "yorkshire".into(), phone: "+44 113 123456".into() },
            ],
            industry_lexicon: Lexicon::from_pairs(
                &[
                    (&["consulting", "consultant"], "Consulting"),
                    (&["marketing", "advertising"], "Marketing"),
                    (&["technology", "tech"], "Technology"),
                    (&["automation", "ai"], "Automation"),
                    (&["business", "services"], "Business Services"),
                ],
                "Business Services",
            ),
            size_lexicon: Lexicon::from_pairs(
                &[
                    (&["group", "holdings"], "Large (50+ employees)"),
                    (&["limited", "ltd"], "Medium (10-50 employees)"),
                    (&["solutions", "services"], "Medium (10-50 employees)"),
                ],
                "Small (1-10 employees)",
            ),
            sic_codes: POPULAR_SIC_CODES
                .iter()
                .map(|(code, description)| SicCode {
                    code: code.to_string(),
                    description: description.to_string(),
                })
                .collect(),
            search_terms: strings(&["business services Hull", "consulting Hull", "business services Yorkshire"]),
            sources: default_sources(),
        }
    }
}

const POPULAR_SIC_CODES: &[(&str, &str)] = &[
    ("62020", "Computer consultancy activities"),
    ("62010", "Computer programming activities"),
    ("82990", "Other business support service activities"),
    ("70229", "Management consultancy activities"),
    ("62090", "Other information technology service activities"),
    ("47110", "Retail sale in non-specialised stores"),
    ("47190", "Other retail sale in non-specialised stores"),
    ("56101", "Licensed restaurants"),
    ("56102", "Unlicensed restaurants and cafes"),
    ("68201", "Renting and operating of own or leased real estate"),
];

fn default_sources() -> Vec<SourceConfig> {
    let yorkshire_towns = ["Hull", "Leeds", "Sheffield", "Bradford", "York"];
    let mut registry = SourceConfig::new(
        COMPANIES_HOUSE,
        1000,
        &["Hull business", "Yorkshire business", "Hull company", "Yorkshire company", "Hull limited", "Yorkshire limited"],
        &[],
    );
    registry.sic_codes = POPULAR_SIC_CODES.iter().map(|(code, _)| code.to_string()).collect();

    vec![
        registry,
        SourceConfig::new(
            "google_search",
            2000,
            &["business services Hull", "consulting Hull", "marketing Hull", "technology Hull", "automation Hull",
              "business services Yorkshire", "consulting Yorkshire", "marketing Yorkshire", "technology Yorkshire",
              "automation Yorkshire"],
            &[],
        ),
        SourceConfig::new(
            "google_maps",
            2000,
            &["business services near Hull", "consulting near Hull", "marketing near Hull", "technology near Hull",
              "business services near Yorkshire", "consulting near Yorkshire"],
            &[],
        ),
        SourceConfig::new(
            "yell",
            1000,
            &["business-services", "consultants", "marketing", "technology", "automation"],
            &yorkshire_towns,
        ),
        SourceConfig::new(
            "yelp",
            1000,
            &["business-services", "consulting", "marketing", "technology"],
            &yorkshire_towns,
        ),
        SourceConfig::new("facebook", 2000, &["Hull business", "Yorkshire business", "Hull company", "Yorkshire company"], &[]),
        SourceConfig::new(
            "linkedin",
            2000,
            &["Hull business", "Yorkshire business", "Hull company", "Yorkshire company", "Hull limited", "Yorkshire limited"],
            &[],
        ),
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Environment variables win over the file for secrets and paths.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("COMPANIES_HOUSE_API_KEY") {
            self.companies_house_api_key = Some(key);
        }
        if let Ok(path) = std::env::var("PROSPECTOR_DB_PATH") {
            self.db_path = path;
        }
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Terms for a source: its own list, else the global one.
    pub fn terms_for<'a>(&'a self, source: &'a SourceConfig) -> &'a [String] {
        if source.search_terms.is_empty() {
            &self.search_terms
        } else {
            &source.search_terms
        }
    }

    /// Everything a source searches for: its terms, then one `sic_code:` query per code.
    pub fn queries_for(&self, source: &SourceConfig) -> Vec<String> {
        let mut queries = self.terms_for(source).to_vec();
        queries.extend(source.sic_codes.iter().map(|code| format!("sic_code:{}", code)));
        queries
    }

    /// Industry label for a SIC code, falling back to the bare code.
    pub fn sic_label(&self, code: &str) -> String {
        sic_label(&self.sic_codes, code)
    }

    pub fn delay_for(&self, source: &SourceConfig) -> u64 {
        source.delay_ms.unwrap_or(self.default_delay_ms)
    }

    /// Checks everything a run needs before any request is made.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_region.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid("target_region must contain at least one keyword".into()));
        }
        if self.default_location.trim().is_empty() {
            return Err(ConfigError::Invalid("default_location must not be empty".into()));
        }
        if self.retention_days.is_some_and(|d| d < 1) {
            return Err(ConfigError::Invalid("retention_days must be at least 1".into()));
        }
        if self.min_name_length == 0 {
            return Err(ConfigError::Invalid("min_name_length must be at least 1".into()));
        }
        for source in &self.sources {
            if !KNOWN_SOURCES.contains(&source.name.as_str()) {
                return Err(ConfigError::Invalid(format!("unknown source '{}'", source.name)));
            }
        }
        let registry_enabled = self.enabled_sources().any(|s| s.name == COMPANIES_HOUSE);
        let has_key = self
            .companies_house_api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        if registry_enabled && !has_key {
            return Err(ConfigError::MissingCredential("COMPANIES_HOUSE_API_KEY".into()));
        }
        Ok(())
    }
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: AppConfig = serde_json::from_str(&content)?;
    config.apply_env_overrides();
    Ok(config)
}
