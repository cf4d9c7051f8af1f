//! Search and verification-status predicates over the accumulated record set.

use std::sync::Arc;

use shared::domain::{BreachRecord, FilterMode};

pub fn filter_by_search(records: &[Arc<BreachRecord>], query: &str) -> Vec<Arc<BreachRecord>> {
    let query = query.to_lowercase();
    records
        .iter()
        .filter(|record| record.matches_query(&query))
        .cloned()
        .collect()
}

pub fn filter_by_mode(records: Vec<Arc<BreachRecord>>, mode: FilterMode) -> Vec<Arc<BreachRecord>> {
    if mode == FilterMode::All {
        return records;
    }
    records
        .into_iter()
        .filter(|record| mode.admits(record))
        .collect()
}

/// Search narrows first, then the mode filter. Always computed from the full set.
pub fn visible_records(
    records: &[Arc<BreachRecord>],
    query: &str,
    mode: FilterMode,
) -> Vec<Arc<BreachRecord>> {
    filter_by_mode(filter_by_search(records, query), mode)
}
