use crate::model::{BusinessRecord, PersistOutcome};
use crate::storage::BusinessStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Inserts records whose identity is not stored yet. Existing rows are never touched.
pub async fn persist<S: BusinessStore>(store: &Arc<Mutex<S>>, records: &[BusinessRecord]) -> PersistOutcome {
    let mut outcome = PersistOutcome::default();

    for record in records {
        let exists = store.lock().await.exists_by_identity(&record.name, &record.location);
        match exists {
            Ok(true) => {
                debug!("Already stored: {} ({})", record.name, record.location);
                outcome.skipped += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Identity check failed for \"{}\": {}", record.name, e);
                outcome.errors.push(format!("{}: {}", record.name, e));
                continue;
            }
        }

        let inserted = store.lock().await.insert(record);
        match inserted {
            Ok(stored) => {
                debug!("Saved #{}: {} ({})", stored.id, record.name, record.location);
                outcome.inserted += 1;
            }
            Err(e) => {
                warn!("Error saving business \"{}\": {}", record.name, e);
                outcome.errors.push(format!("{}: {}", record.name, e));
            }
        }
    }

    info!(
        "Persisted {} new, {} already known, {} failed",
        outcome.inserted,
        outcome.skipped,
        outcome.errors.len()
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    fn store() -> Arc<Mutex<SqliteStorage>> {
        Arc::new(Mutex::new(SqliteStorage::new(":memory:").unwrap()))
    }

    fn records() -> Vec<BusinessRecord> {
        vec![
            BusinessRecord::new("Acme Ltd", "Hull", "google_search"),
            BusinessRecord::new("Beta Co", "Hull", "yell"),
        ]
    }

    #[tokio::test]
    async fn second_call_inserts_nothing() {
        let store = store();
        let first = persist(&store, &records()).await;
        assert_eq!(first.inserted, 2);
        assert_eq!(first.skipped, 0);

        let second = persist(&store, &records()).await;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 2);
        assert!(second.errors.is_empty());
        assert_eq!(store.lock().await.count_businesses().unwrap(), 2);
    }

    #[tokio::test]
    async fn case_variants_of_a_stored_business_are_skipped() {
        let store = store();
        persist(&store, &records()).await;
        let outcome = persist(&store, &[BusinessRecord::new("ACME LTD", "hull", "yelp")]).await;
        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.skipped, 1);
    }
}
