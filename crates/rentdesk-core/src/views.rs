//! Pure read-side helpers over an in-memory collection.

use std::collections::BTreeMap;

use serde::Serialize;

/// Client-side predicate for a filter set. `all` or empty values match
/// everything; active predicates combine with AND.
pub trait EntityFilter<E> {
    fn matches(&self, entity: &E) -> bool;
}

pub fn filter_items<E: Clone, F: EntityFilter<E>>(items: &[E], filter: &F) -> Vec<E> {
    items
        .iter()
        .filter(|item| filter.matches(item))
        .cloned()
        .collect()
}

pub fn count_by<E>(items: &[E], key: impl Fn(&E) -> String) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for item in items {
        *counts.entry(key(item)).or_insert(0) += 1;
    }
    counts
}

pub fn count_where<E>(items: &[E], predicate: impl Fn(&E) -> bool) -> usize {
    items.iter().filter(|item| predicate(item)).count()
}

pub fn sum_by<E>(items: &[E], value: impl Fn(&E) -> f64) -> f64 {
    items.iter().map(value).sum()
}

/// Counts and running sums grouped by one field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Breakdown {
    pub counts: BTreeMap<String, usize>,
    pub sums: BTreeMap<String, f64>,
    pub total_count: usize,
    pub total_sum: f64,
}

pub fn breakdown<E>(
    items: &[E],
    key: impl Fn(&E) -> String,
    value: impl Fn(&E) -> f64,
) -> Breakdown {
    let mut out = Breakdown::default();
    for item in items {
        let group = key(item);
        let amount = value(item);
        *out.counts.entry(group.clone()).or_insert(0) += 1;
        *out.sums.entry(group).or_insert(0.0) += amount;
        out.total_count += 1;
        out.total_sum += amount;
    }
    out
}
