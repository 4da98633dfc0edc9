// Discovery driver and the fire-and-forget run trigger
use crate::config::{AppConfig, COMPANIES_HOUSE, KNOWN_SOURCES, SourceConfig};
use crate::dedup::dedupe;
use crate::enricher::{Enricher, run_enrichment};
use crate::model::{BusinessRecord, ConfigError, EnrichmentFilter, EnrichmentSummary, RunSummary, SourceStats};
use crate::normalizer::Normalizer;
use crate::persister::persist;
use crate::scraper::sources::listing::layout_for;
use crate::scraper::sources::{CompaniesHouseAdapter, ListingAdapter};
use crate::scraper::{Fetcher, HttpFetcher, SourceAdapter};
use crate::storage::BusinessStore;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Overrides for a single run; empty fields keep the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub sources: Vec<String>,
    pub search_terms: Vec<String>,
    pub target_region: Vec<String>,
}

/// One adapter and the searches it should perform.
pub struct SourcePlan {
    pub adapter: Arc<dyn SourceAdapter>,
    pub terms: Vec<String>,
    pub locations: Vec<String>,
}

/// Applies the request overrides to a copy of the config and validates the result.
pub fn effective_config(config: &AppConfig, request: &RunRequest) -> Result<AppConfig, ConfigError> {
    let mut effective = config.clone();

    if !request.sources.is_empty() {
        for name in &request.sources {
            if !KNOWN_SOURCES.contains(&name.as_str()) {
                return Err(ConfigError::Invalid(format!("unknown source '{}'", name)));
            }
            if effective.source(name).is_none() {
                effective
                    .sources
                    .push(SourceConfig::new(name, effective.default_delay_ms, &[], &[]));
            }
        }
        for source in &mut effective.sources {
            source.enabled = request.sources.contains(&source.name);
        }
    }
    if !request.search_terms.is_empty() {
        effective.search_terms = request.search_terms.clone();
        for source in &mut effective.sources {
            source.search_terms.clear();
            source.sic_codes.clear();
        }
    }
    if !request.target_region.is_empty() {
        effective.target_region = request.target_region.clone();
    }

    effective.validate()?;
    Ok(effective)
}

/// Builds an adapter per enabled source. `fetcher_for` receives the source's request delay.
pub fn plan_sources(
    config: &AppConfig,
    fetcher_for: impl Fn(Duration) -> Arc<dyn Fetcher>,
) -> Result<Vec<SourcePlan>, ConfigError> {
    let mut plans = Vec::new();

    for source in config.enabled_sources() {
        let fetcher = fetcher_for(Duration::from_millis(config.delay_for(source)));
        let adapter: Arc<dyn SourceAdapter> = if source.name == COMPANIES_HOUSE {
            let api_key = config
                .companies_house_api_key
                .clone()
                .ok_or_else(|| ConfigError::MissingCredential("COMPANIES_HOUSE_API_KEY".into()))?;
            Arc::new(CompaniesHouseAdapter::new(fetcher, api_key, config.companies_house_page_size))
        } else {
            let layout = layout_for(&source.name)
                .ok_or_else(|| ConfigError::Invalid(format!("no listing layout for '{}'", source.name)))?;
            Arc::new(ListingAdapter::new(
                layout,
                fetcher,
                config.min_name_length,
                &config.name_denylist,
            )?)
        };

        plans.push(SourcePlan {
            adapter,
            terms: config.queries_for(source),
            locations: source.locations.clone(),
        });
    }

    Ok(plans)
}

struct SourceRun {
    stats: SourceStats,
    records: Vec<BusinessRecord>,
    errors: Vec<String>,
}

/// Terms run one after another; a failing term contributes nothing and the source moves on.
async fn collect_source(plan: &SourcePlan, normalizer: &Normalizer) -> SourceRun {
    let name = plan.adapter.name().to_string();
    let mut stats = SourceStats {
        source: name.clone(),
        ..SourceStats::default()
    };
    let mut records = Vec::new();
    let mut errors = Vec::new();

    let locations: Vec<Option<&str>> = if plan.locations.is_empty() {
        vec![None]
    } else {
        plan.locations.iter().map(|l| Some(l.as_str())).collect()
    };

    info!("Scraping {} ({} terms)", name, plan.terms.len());
    for term in &plan.terms {
        for location in &locations {
            match plan.adapter.fetch(term, *location).await {
                Ok(raw) => {
                    stats.fetched += raw.len();
                    for record in raw.into_iter().map(|r| normalizer.normalize(r)) {
                        if normalizer.is_in_target_region(&record) {
                            records.push(record);
                        } else {
                            stats.out_of_region += 1;
                        }
                    }
                }
                Err(e) => {
                    let search = match location {
                        Some(loc) => format!("{} '{}' in {}", name, term, loc),
                        None => format!("{} '{}'", name, term),
                    };
                    warn!("{} failed: {}", search, e);
                    errors.push(format!("{}: {}", search, e));
                }
            }
        }
    }

    let records = dedupe(records);
    stats.kept = records.len();
    info!(
        "{}: {} fetched, {} outside target region, {} unique kept",
        name, stats.fetched, stats.out_of_region, stats.kept
    );

    SourceRun { stats, records, errors }
}

/// Collect -> normalize/filter -> dedupe -> persist across all planned sources.
pub async fn run_discovery<S: BusinessStore>(
    store: &Arc<Mutex<S>>,
    plans: &[SourcePlan],
    normalizer: &Normalizer,
) -> RunSummary {
    let runs = join_all(plans.iter().map(|plan| collect_source(plan, normalizer))).await;

    let mut summary = RunSummary::default();
    let mut records = Vec::new();
    for run in runs {
        summary.sources.push(run.stats);
        summary.errors.extend(run.errors);
        records.extend(run.records);
    }
    summary.collected = records.len();

    let unique = dedupe(records);
    summary.deduplicated = unique.len();
    info!(
        "Collected {} records, {} unique across sources",
        summary.collected, summary.deduplicated
    );

    let outcome = persist(store, &unique).await;
    summary.inserted = outcome.inserted;
    summary.skipped = outcome.skipped;
    summary.errors.extend(outcome.errors);

    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Discovery,
    Enrichment,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Discovery => f.write_str("discovery"),
            RunKind::Enrichment => f.write_str("enrichment"),
        }
    }
}

/// Returned as soon as a run is spawned; the outcome only shows up in the logs.
#[derive(Debug, Clone)]
pub struct RunAck {
    pub run_id: u64,
    pub kind: RunKind,
    pub started_at: DateTime<Utc>,
}

/// Starts runs in the background on the tokio runtime.
pub struct RunTrigger<S> {
    config: Arc<AppConfig>,
    store: Arc<Mutex<S>>,
    http: HttpFetcher,
    next_id: AtomicU64,
}

impl<S: BusinessStore + 'static> RunTrigger<S> {
    pub fn new(config: Arc<AppConfig>, store: Arc<Mutex<S>>, http: HttpFetcher) -> Self {
        Self {
            config,
            store,
            http,
            next_id: AtomicU64::new(1),
        }
    }

    fn ack(&self, kind: RunKind) -> RunAck {
        RunAck {
            run_id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            started_at: Utc::now(),
        }
    }

    fn enricher(&self) -> Enricher {
        let fetcher = Arc::new(
            self.http
                .with_delay(Duration::from_millis(self.config.enrichment_delay_ms)),
        );
        Enricher::new(fetcher, &self.config)
    }

    fn enrichment_filter(&self) -> EnrichmentFilter {
        EnrichmentFilter {
            limit: self.config.enrichment_limit,
            ..EnrichmentFilter::default()
        }
    }

    /// Validates and plans synchronously, so configuration errors surface before any request.
    pub fn start_run(&self, request: RunRequest) -> Result<RunAck, ConfigError> {
        let effective = effective_config(&self.config, &request)?;
        let plans = plan_sources(&effective, |delay| Arc::new(self.http.with_delay(delay)))?;
        let normalizer = Normalizer::from_config(&effective);
        let follow_up = self.config.enrich_after_run.then(|| (self.enricher(), self.enrichment_filter()));

        let ack = self.ack(RunKind::Discovery);
        let run_id = ack.run_id;
        let store = self.store.clone();
        info!("Run #{} started with {} sources", run_id, plans.len());

        tokio::spawn(async move {
            let summary = run_discovery(&store, &plans, &normalizer).await;
            log_run_summary(run_id, &summary);

            if let Some((enricher, filter)) = follow_up {
                let summary = run_enrichment(&store, &enricher, filter).await;
                log_enrichment_summary(run_id, &summary);
            }
        });

        Ok(ack)
    }

    pub fn start_enrichment(&self) -> RunAck {
        let ack = self.ack(RunKind::Enrichment);
        let run_id = ack.run_id;
        let store = self.store.clone();
        let enricher = self.enricher();
        let filter = self.enrichment_filter();
        info!("Run #{} started: enrichment", run_id);

        tokio::spawn(async move {
            let summary = run_enrichment(&store, &enricher, filter).await;
            log_enrichment_summary(run_id, &summary);
        });

        ack
    }
}

fn log_run_summary(run_id: u64, summary: &RunSummary) {
    info!(
        "Run #{} finished: {} collected, {} unique, {} inserted, {} already known, {} errors",
        run_id,
        summary.collected,
        summary.deduplicated,
        summary.inserted,
        summary.skipped,
        summary.errors.len()
    );
    for stats in &summary.sources {
        info!(
            "  {}: fetched {}, out of region {}, kept {}",
            stats.source, stats.fetched, stats.out_of_region, stats.kept
        );
    }
    for e in &summary.errors {
        error!("Run #{}: {}", run_id, e);
    }
}

fn log_enrichment_summary(run_id: u64, summary: &EnrichmentSummary) {
    info!(
        "Run #{} enrichment finished: {}/{} records enriched, {} fields filled, {} errors",
        run_id,
        summary.enriched_records,
        summary.total,
        summary.fields_filled,
        summary.errors.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawRecord, ScraperError};
    use crate::scraper::testing::ScriptedFetcher;
    use crate::storage::SqliteStorage;

    struct StaticAdapter {
        name: &'static str,
        records: Vec<RawRecord>,
    }

    #[async_trait::async_trait]
    impl SourceAdapter for StaticAdapter {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, term: &str, location: Option<&str>) -> Result<Vec<RawRecord>, ScraperError> {
            Ok(self
                .records
                .iter()
                .cloned()
                .map(|mut r| {
                    r.search_term = Some(term.to_string());
                    r.location_hint = r.location_hint.or(location.map(str::to_string));
                    r
                })
                .collect())
        }
    }

    struct BrokenAdapter;

    #[async_trait::async_trait]
    impl SourceAdapter for BrokenAdapter {
        fn name(&self) -> &str {
            "broken"
        }

        async fn fetch(&self, _term: &str, _location: Option<&str>) -> Result<Vec<RawRecord>, ScraperError> {
            Err(ScraperError::InvalidResponse(503))
        }
    }

    fn raw(name: &str, hint: &str) -> RawRecord {
        RawRecord {
            name: name.into(),
            location_hint: Some(hint.into()),
            source: "static".into(),
            ..RawRecord::default()
        }
    }

    fn plan(adapter: impl SourceAdapter + 'static, terms: &[&str]) -> SourcePlan {
        SourcePlan {
            adapter: Arc::new(adapter),
            terms: terms.iter().map(|t| t.to_string()).collect(),
            locations: Vec::new(),
        }
    }

    fn store() -> Arc<Mutex<SqliteStorage>> {
        Arc::new(Mutex::new(SqliteStorage::new(":memory:").unwrap()))
    }

    fn hull_only() -> Normalizer {
        Normalizer::from_config(&AppConfig::default()).with_target_region(vec!["Hull".into()])
    }

    #[tokio::test]
    async fn collapses_case_variants_and_drops_other_regions() {
        let store = store();
        let adapter = StaticAdapter {
            name: "static",
            records: vec![raw("Acme Ltd", "Hull"), raw("ACME LTD", "hull"), raw("Beta Co", "Leeds")],
        };

        let summary = run_discovery(&store, &[plan(adapter, &["consulting"])], &hull_only()).await;

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.deduplicated, 1);
        assert!(summary.errors.is_empty());
        assert_eq!(
            summary.sources,
            vec![SourceStats {
                source: "static".into(),
                fetched: 3,
                out_of_region: 1,
                kept: 1,
            }]
        );
        assert_eq!(store.lock().await.count_businesses().unwrap(), 1);
    }

    #[tokio::test]
    async fn failing_source_does_not_abort_the_run() {
        let store = store();
        let plans = vec![
            plan(BrokenAdapter, &["a", "b"]),
            plan(
                StaticAdapter {
                    name: "static",
                    records: vec![raw("Acme Ltd", "Hull")],
                },
                &["a"],
            ),
        ];

        let summary = run_discovery(&store, &plans, &hull_only()).await;

        assert_eq!(summary.inserted, 1);
        assert_eq!(
            summary.errors,
            vec!["broken 'a': unexpected status 503", "broken 'b': unexpected status 503"]
        );
        assert_eq!(summary.sources[0].fetched, 0);
    }

    #[tokio::test]
    async fn errors_name_the_location_searched() {
        let mut broken = plan(BrokenAdapter, &["marketing"]);
        broken.locations = vec!["Hull".into(), "Leeds".into()];

        let summary = run_discovery(&store(), &[broken], &hull_only()).await;
        assert_eq!(
            summary.errors,
            vec![
                "broken 'marketing' in Hull: unexpected status 503",
                "broken 'marketing' in Leeds: unexpected status 503",
            ]
        );
    }

    #[tokio::test]
    async fn same_business_from_two_sources_is_stored_once() {
        let store = store();
        let plans = vec![
            plan(StaticAdapter { name: "one", records: vec![raw("Acme Ltd", "Hull")] }, &["x"]),
            plan(StaticAdapter { name: "two", records: vec![raw("acme ltd", "HULL")] }, &["y"]),
        ];

        let first = run_discovery(&store, &plans, &hull_only()).await;
        assert_eq!(first.collected, 2);
        assert_eq!(first.deduplicated, 1);
        assert_eq!(first.inserted, 1);

        let second = run_discovery(&store, &plans, &hull_only()).await;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 1);
    }

    #[tokio::test]
    async fn every_location_is_searched_per_term() {
        let store = store();
        let gamma = RawRecord {
            name: "Gamma Ltd".into(),
            source: "dir".into(),
            ..RawRecord::default()
        };
        let mut p = plan(StaticAdapter { name: "dir", records: vec![gamma] }, &["t1", "t2"]);
        p.locations = vec!["Hull".into(), "Leeds".into()];

        let summary = run_discovery(&store, &[p], &hull_only()).await;
        assert_eq!(summary.sources[0].fetched, 4);
        assert_eq!(summary.sources[0].out_of_region, 2);
        assert_eq!(summary.inserted, 1);
    }

    #[test]
    fn registry_without_key_is_fatal() {
        let err = effective_config(&AppConfig::default(), &RunRequest::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(_)));

        let request = RunRequest {
            sources: vec!["yell".into()],
            ..RunRequest::default()
        };
        assert!(effective_config(&AppConfig::default(), &request).is_ok());
    }

    #[test]
    fn request_overrides_are_applied() {
        let request = RunRequest {
            sources: vec!["yell".into(), "google_search".into()],
            search_terms: vec!["joinery".into()],
            target_region: vec!["leeds".into()],
        };
        let config = effective_config(&AppConfig::default(), &request).unwrap();
        let enabled: Vec<&str> = config.enabled_sources().map(|s| s.name.as_str()).collect();
        assert_eq!(enabled, vec!["google_search", "yell"]);
        assert_eq!(config.target_region, vec!["leeds".to_string()]);

        let plans = plan_sources(&config, |_| Arc::new(ScriptedFetcher::new())).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].adapter.name(), "google_search");
        assert_eq!(plans[1].terms, vec!["joinery".to_string()]);
        assert_eq!(plans[1].locations.len(), 5);
    }

    #[test]
    fn unknown_source_is_rejected() {
        let request = RunRequest {
            sources: vec!["myspace".into()],
            ..RunRequest::default()
        };
        let err = effective_config(&AppConfig::default(), &request).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn registry_adapter_is_planned_with_key() {
        let config = AppConfig {
            companies_house_api_key: Some("key".into()),
            ..AppConfig::default()
        };
        let delays = std::sync::Mutex::new(Vec::new());
        let plans = plan_sources(&config, |d| {
            delays.lock().unwrap().push(d.as_millis());
            Arc::new(ScriptedFetcher::new())
        })
        .unwrap();
        assert_eq!(plans.len(), KNOWN_SOURCES.len());
        assert_eq!(plans[0].adapter.name(), COMPANIES_HOUSE);
        assert!(plans[0].terms.contains(&"sic_code:62020".to_string()));
        assert_eq!(delays.lock().unwrap()[..2], [1000, 2000]);
    }

    #[tokio::test]
    async fn trigger_rejects_bad_config_and_acks_runs() {
        let http = HttpFetcher::new("test", Duration::from_secs(1)).unwrap();
        let trigger = RunTrigger::new(Arc::new(AppConfig::default()), store(), http);

        assert!(trigger.start_run(RunRequest::default()).is_err());

        let first = trigger.start_enrichment();
        let second = trigger.start_enrichment();
        assert_eq!(first.kind, RunKind::Enrichment);
        assert!(second.run_id > first.run_id);
    }
}
