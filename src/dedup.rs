use crate::model::BusinessRecord;
use std::collections::HashSet;

/// Keeps the first record per identity key, preserving order.
///
/// Identity is exact on `lowercase(name)` + `lowercase(location)`: "Acme Ltd" and
/// "Acme Limited" stay separate businesses.
pub fn dedupe(records: Vec<BusinessRecord>) -> Vec<BusinessRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.identity_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, location: &str, source: &str) -> BusinessRecord {
        BusinessRecord::new(name, location, source)
    }

    fn sample() -> Vec<BusinessRecord> {
        vec![
            record("Acme Ltd", "Hull", "google_search"),
            record("ACME LTD", "hull", "companies_house"),
            record("Beta Co", "Leeds", "yell"),
            record("Acme Limited", "Hull", "yell"),
            record("Acme Ltd", "Yorkshire", "yelp"),
            record("beta co", "LEEDS", "google_maps"),
        ]
    }

    #[test]
    fn first_occurrence_wins_and_order_is_kept() {
        let out = dedupe(sample());
        let summary: Vec<(&str, &str, &str)> = out
            .iter()
            .map(|r| (r.name.as_str(), r.location.as_str(), r.source.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Acme Ltd", "Hull", "google_search"),
                ("Beta Co", "Leeds", "yell"),
                ("Acme Limited", "Hull", "yell"),
                ("Acme Ltd", "Yorkshire", "yelp"),
            ]
        );
    }

    #[test]
    fn is_idempotent() {
        let once = dedupe(sample());
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn output_keys_are_unique_and_never_grow() {
        let input = sample();
        let len = input.len();
        let out = dedupe(input);
        assert!(out.len() <= len);
        let keys: HashSet<String> = out.iter().map(BusinessRecord::identity_key).collect();
        assert_eq!(keys.len(), out.len());
    }

    #[test]
    fn empty_input() {
        assert!(dedupe(Vec::new()).is_empty());
    }
}
