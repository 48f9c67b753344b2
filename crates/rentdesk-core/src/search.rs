//! Client-side text search shared by the stores.
//!
//! A query is one case-insensitive substring; `+` and spaces are literal.

/// Check if text contains `term`, ignoring case
pub fn text_contains_term(text: &str, term: &str) -> bool {
    term.is_empty() || text.to_lowercase().contains(&term.to_lowercase())
}

/// True when `query` occurs in at least one of `fields`.
/// An empty query matches everything.
pub fn matches_search(fields: &[&str], query: &str) -> bool {
    query.is_empty() || fields.iter().any(|field| text_contains_term(field, query))
}
