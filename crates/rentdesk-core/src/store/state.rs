//! List state shared by the entity stores and the immutable-update
//! functions applied after a successful remote call.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::bulk::BulkOperationState;
use crate::api::{ListPage, PageMeta};
use crate::constants::DEFAULT_PAGE_LIMIT;
use crate::models::Entity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_more: bool,
    pub total_pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::with_limit(DEFAULT_PAGE_LIMIT)
    }
}

impl Pagination {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            page: 1,
            limit,
            total: 0,
            has_more: true,
            total_pages: 0,
        }
    }

    /// Take over the server's view of the collection. Missing fields fall
    /// back to the requested page and to values derived from `total`.
    pub fn apply_meta(&mut self, meta: &PageMeta, requested_page: u32) {
        self.page = meta.page.unwrap_or(requested_page);
        if let Some(limit) = meta.limit.filter(|limit| *limit > 0) {
            self.limit = limit;
        }
        self.total = meta.total.unwrap_or(0);
        self.total_pages = meta.total_pages.unwrap_or_else(|| {
            if self.limit == 0 {
                0
            } else {
                self.total.div_ceil(u64::from(self.limit)) as u32
            }
        });
        self.has_more = meta
            .has_more
            .unwrap_or(self.page < self.total_pages);
    }
}

/// Insert at the head unless an entity with the same id exists.
pub fn prepend_unique<E: Entity>(items: &mut Vec<E>, entity: E) -> bool {
    if items.iter().any(|item| item.id() == entity.id()) {
        return false;
    }
    items.insert(0, entity);
    true
}

pub fn replace_by_id<E: Entity>(items: &mut [E], entity: E) -> bool {
    match items.iter_mut().find(|item| item.id() == entity.id()) {
        Some(slot) => {
            *slot = entity;
            true
        }
        None => false,
    }
}

pub fn remove_by_id<E: Entity>(items: &mut Vec<E>, id: &str) -> Option<E> {
    let index = items.iter().position(|item| item.id() == id)?;
    Some(items.remove(index))
}

/// Shallow JSON merge of `patch` over `entity`.
pub fn merge_json<E: Entity>(entity: &E, patch: &Map<String, Value>) -> Result<E, serde_json::Error> {
    let mut value = serde_json::to_value(entity)?;
    if let Value::Object(map) = &mut value {
        for (key, member) in patch {
            map.insert(key.clone(), member.clone());
        }
    }
    serde_json::from_value(value)
}

#[derive(Debug, Clone)]
pub struct ListState<E, F> {
    pub items: Vec<E>,
    pub filters: F,
    pub pagination: Pagination,
    pub loading: bool,
    pub error: Option<String>,
    pub last_sync: Option<DateTime<Utc>>,
    pub bulk: BulkOperationState<E>,
}

impl<E, F: Default> Default for ListState<E, F> {
    fn default() -> Self {
        Self::new(F::default(), DEFAULT_PAGE_LIMIT)
    }
}

impl<E, F> ListState<E, F> {
    pub fn new(filters: F, page_limit: u32) -> Self {
        Self {
            items: Vec::new(),
            filters,
            pagination: Pagination::with_limit(page_limit),
            loading: false,
            error: None,
            last_sync: None,
            bulk: BulkOperationState::default(),
        }
    }
}

impl<E: Entity, F> ListState<E, F> {
    pub fn find(&self, id: &str) -> Option<&E> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    // ===== Immutable updates =====

    /// Prepend a new entity and count it. Duplicate ids are ignored.
    pub fn with_created(mut self, entity: E) -> Self {
        if prepend_unique(&mut self.items, entity) {
            self.pagination.total += 1;
        }
        self
    }

    /// Patch the entity with `id` in place; no-op when it is not loaded.
    pub fn with_updated(mut self, id: &str, update: impl FnOnce(&mut E)) -> Self {
        if let Some(entity) = self.items.iter_mut().find(|item| item.id() == id) {
            update(entity);
        }
        self
    }

    pub fn with_replaced(mut self, entity: E) -> Self {
        replace_by_id(&mut self.items, entity);
        self
    }

    /// Shallow-merge server fields into the entity with `id`.
    pub fn with_merged(mut self, id: &str, patch: &Map<String, Value>) -> Self {
        if let Some(slot) = self.items.iter_mut().find(|item| item.id() == id) {
            match merge_json(slot, patch) {
                Ok(merged) => *slot = merged,
                Err(e) => warn!(id, "ignoring patch that does not fit the entity: {}", e),
            }
        }
        self
    }

    /// Remove by id. `total` drops by one (floored at zero) even when the
    /// entity was not on a loaded page.
    pub fn with_removed(mut self, id: &str) -> Self {
        remove_by_id(&mut self.items, id);
        self.pagination.total = self.pagination.total.saturating_sub(1);
        self.bulk.deselect(&[id.to_string()]);
        self
    }

    pub fn with_removed_many(mut self, ids: &[String]) -> Self {
        let unique: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.items.retain(|item| !unique.contains(item.id()));
        self.pagination.total = self.pagination.total.saturating_sub(unique.len() as u64);
        self.bulk.deselect(ids);
        self
    }

    /// Replace the collection with a fetched page, or append it (skipping
    /// ids already present) when loading further pages.
    pub fn with_page(mut self, page: ListPage<E>, requested_page: u32, append: bool) -> Self {
        if append {
            for item in page.items {
                if !self.items.iter().any(|existing| existing.id() == item.id()) {
                    self.items.push(item);
                }
            }
        } else {
            self.items = page.items;
        }
        self.pagination.apply_meta(&page.meta, requested_page);
        self.loading = false;
        self
    }

    pub fn synced_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_sync = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Notification, NotificationFilters};
    use serde_json::json;

    type State = ListState<Notification, NotificationFilters>;

    fn n(id: &str) -> Notification {
        Notification::new(id, format!("title {}", id), "body")
    }

    fn page(ids: &[&str], meta: PageMeta) -> ListPage<Notification> {
        ListPage {
            items: ids.iter().map(|id| n(id)).collect(),
            meta,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_create_then_remove_restores_len_and_total() {
        let mut state = State::default();
        state.items = vec![n("a"), n("b")];
        state.pagination.total = 2;

        let created = state.with_created(n("c"));
        assert_eq!(created.items[0].id, "c");
        assert_eq!(created.pagination.total, 3);

        let removed = created.with_removed("c");
        assert_eq!(removed.items.len(), 2);
        assert_eq!(removed.pagination.total, 2);
    }

    #[test]
    fn test_create_ignores_duplicates_and_remove_floors_total() {
        let state = State::default().with_created(n("a")).with_created(n("a"));
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.pagination.total, 1);

        let state = state.with_removed("a").with_removed("missing");
        assert_eq!(state.pagination.total, 0);
    }

    #[test]
    fn test_update_and_merge_by_id() {
        let state = State::default()
            .with_created(n("a"))
            .with_updated("a", |item| item.read = true)
            .with_updated("missing", |item| item.read = false);
        assert!(state.items[0].read);

        let patch = json!({"title": "Renamed", "propertyId": "p1"});
        let state = state.with_merged("a", patch.as_object().unwrap());
        assert_eq!(state.items[0].title, "Renamed");
        assert_eq!(state.items[0].extra.get("propertyId"), Some(&json!("p1")));
        assert!(state.items[0].read);
    }

    #[test]
    fn test_page_replace_and_append() {
        let meta = PageMeta {
            page: Some(1),
            total: Some(3),
            has_more: Some(true),
            ..Default::default()
        };
        let state = State::default().with_page(page(&["a", "b"], meta), 1, false);
        assert_eq!(state.items.len(), 2);
        assert!(state.pagination.has_more);

        let meta = PageMeta {
            total: Some(3),
            ..Default::default()
        };
        let state = state.with_page(page(&["b", "c"], meta), 2, true);
        let ids: Vec<_> = state.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(state.pagination.page, 2);
        assert_eq!(state.pagination.total_pages, 1);
        assert!(!state.pagination.has_more);
    }

    #[test]
    fn test_remove_many_updates_total_and_selection() {
        let mut state = State::default();
        state.items = vec![n("a"), n("b"), n("c")];
        state.pagination.total = 10;
        state.bulk.set_selected(vec!["a".into(), "c".into()]);

        let state = state.with_removed_many(&["a".into(), "c".into(), "a".into()]);
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.pagination.total, 8);
        assert!(state.bulk.selected.is_empty());
    }
}
