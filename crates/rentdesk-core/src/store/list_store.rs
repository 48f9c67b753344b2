//! Generic entity store: collection state, TTL cache and REST sync for one
//! [`Resource`].
//!
//! Guards on the state lock are never held across an `.await`. Concurrent
//! fetches race and the last one to resolve wins.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::bulk::BulkOperation;
use super::error::StoreError;
use super::state::{ListState, Pagination};
use crate::api::{
    cache_key, overlay_params, ApiError, ListPage, QueryFilters, Resource, ResourceClient,
    Transport,
};
use crate::cache::TtlCache;
use crate::config::CoreConfig;
use crate::models::Entity;
use crate::views::filter_items;

/// What the per-store cache holds: list pages and single entities.
#[derive(Debug, Clone)]
pub enum Cached<E> {
    Page(ListPage<E>),
    Item(E),
}

pub type EntityCache<E> = TtlCache<Cached<E>>;

/// Overrides for one list fetch. Unset values come from the current state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Extra query parameters, applied last
    pub extra: Vec<(String, String)>,
}

impl FetchParams {
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }
}

type State<R> = ListState<<R as Resource>::Entity, <R as Resource>::Filters>;

pub struct EntityStore<R: Resource> {
    client: ResourceClient<R>,
    state: RwLock<State<R>>,
    cache: Arc<EntityCache<R::Entity>>,
}

impl<R: Resource> EntityStore<R> {
    pub fn new(transport: Arc<dyn Transport>, config: &CoreConfig) -> Self {
        Self {
            client: ResourceClient::new(transport),
            state: RwLock::new(ListState::new(R::Filters::default(), config.page_limit)),
            cache: Arc::new(TtlCache::new(config.cache_expiry)),
        }
    }

    pub fn client(&self) -> &ResourceClient<R> {
        &self.client
    }

    /// Shared handle for the background sweeper.
    pub fn cache(&self) -> Arc<EntityCache<R::Entity>> {
        self.cache.clone()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    // ===== State access =====

    pub fn snapshot(&self) -> State<R> {
        self.state.read().clone()
    }

    pub fn read<T>(&self, f: impl FnOnce(&State<R>) -> T) -> T {
        f(&self.state.read())
    }

    pub fn mutate<T>(&self, f: impl FnOnce(&mut State<R>) -> T) -> T {
        f(&mut self.state.write())
    }

    /// Swap the state for the result of an immutable-update function.
    pub fn apply(&self, f: impl FnOnce(State<R>) -> State<R>) {
        let mut guard = self.state.write();
        let current = std::mem::take(&mut *guard);
        *guard = f(current);
    }

    pub fn items(&self) -> Vec<R::Entity> {
        self.state.read().items.clone()
    }

    pub fn find(&self, id: &str) -> Option<R::Entity> {
        self.state.read().find(id).cloned()
    }

    pub fn filters(&self) -> R::Filters {
        self.state.read().filters.clone()
    }

    pub fn pagination(&self) -> Pagination {
        self.state.read().pagination.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn clear_error(&self) {
        self.state.write().error = None;
    }

    /// Record a failed call and hand the error back to the caller.
    pub fn fail(&self, err: impl Into<StoreError>) -> StoreError {
        let err = err.into();
        warn!(resource = R::COLLECTION_KEY, "{}", err);
        let mut state = self.state.write();
        state.error = Some(err.user_message());
        state.loading = false;
        err
    }

    // ===== Remote sync =====

    fn list_query(&self, params: &FetchParams) -> (Vec<(String, String)>, u32) {
        let state = self.state.read();
        let page = params.page.unwrap_or(state.pagination.page);
        let limit = params.limit.unwrap_or(state.pagination.limit);

        let mut pairs = state.filters.query_pairs();
        pairs.push(("page".to_string(), page.to_string()));
        pairs.push(("limit".to_string(), limit.to_string()));
        (overlay_params(pairs, &params.extra), page)
    }

    /// Fetch one page. An explicit page above 1 appends to the collection,
    /// anything else replaces it. A fresh cache entry for the same effective
    /// query skips the network.
    pub async fn fetch_list(
        &self,
        params: FetchParams,
    ) -> Result<ListPage<R::Entity>, StoreError> {
        let (query, page) = self.list_query(&params);
        let key = cache_key(R::COLLECTION_KEY, &query);
        let append = params.page.is_some_and(|requested| requested > 1);

        {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
        }

        if let Some(Cached::Page(cached)) = self.cache.get(&key) {
            debug!(%key, "cache hit");
            let result = cached.clone();
            self.apply(|state| state.with_page(cached, page, append));
            return Ok(result);
        }
        debug!(%key, "cache miss");

        match self.client.list(query).await {
            Ok(result) => {
                let fetched = result.clone();
                self.apply(|state| state.with_page(fetched, page, append).synced_at(Utc::now()));
                self.cache.put(key, Cached::Page(result.clone()));
                Ok(result)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Fetch the next page unless a fetch is running or nothing is left.
    pub async fn load_more(&self) -> Result<Option<ListPage<R::Entity>>, StoreError> {
        let next = {
            let mut state = self.state.write();
            if state.loading || !state.pagination.has_more {
                return Ok(None);
            }
            state.loading = true;
            state.pagination.page + 1
        };
        self.fetch_list(FetchParams::page(next)).await.map(Some)
    }

    /// Merge into the filters, go back to page 1 and drop cached results.
    pub fn set_filters(&self, patch: <R::Filters as QueryFilters>::Patch) {
        {
            let mut state = self.state.write();
            state.filters.merge(patch);
            state.pagination.page = 1;
        }
        self.cache.clear();
    }

    pub fn replace_filters(&self, filters: R::Filters) {
        {
            let mut state = self.state.write();
            state.filters = filters;
            state.pagination.page = 1;
        }
        self.cache.clear();
    }

    pub fn set_page(&self, page: u32) {
        self.state.write().pagination.page = page.max(1);
    }

    /// Single entity, cached under `<entity key>_<id>`.
    pub async fn fetch_one(&self, id: &str) -> Result<R::Entity, StoreError> {
        let key = format!("{}_{}", R::ENTITY_KEY, id);
        if let Some(Cached::Item(entity)) = self.cache.get(&key) {
            debug!(%key, "cache hit");
            return Ok(entity);
        }

        match self.client.get(id).await {
            Ok(entity) => {
                self.cache.put(key, Cached::Item(entity.clone()));
                Ok(entity)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    pub async fn create(&self, payload: Value) -> Result<R::Entity, StoreError> {
        match self.client.create(payload).await {
            Ok(entity) => {
                info!(resource = R::COLLECTION_KEY, id = entity.id(), "created");
                let created = entity.clone();
                self.apply(|state| state.with_created(created));
                self.cache.clear();
                Ok(entity)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    pub async fn update(&self, id: &str, payload: Value) -> Result<R::Entity, StoreError> {
        match self.client.update(id, payload).await {
            Ok(entity) => {
                info!(resource = R::COLLECTION_KEY, id, "updated");
                let updated = entity.clone();
                self.apply(|state| state.with_replaced(updated));
                self.cache.clear();
                Ok(entity)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Returns the removed entity when it was loaded.
    pub async fn delete(&self, id: &str) -> Result<Option<R::Entity>, StoreError> {
        match self.client.delete(id).await {
            Ok(()) => {
                info!(resource = R::COLLECTION_KEY, id, "deleted");
                let removed = self.find(id);
                self.apply(|state| state.with_removed(id));
                self.cache.clear();
                Ok(removed)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Apply a server-pushed partial update without a round trip.
    pub fn apply_patch(&self, id: &str, patch: &Map<String, Value>) {
        self.apply(|state| state.with_merged(id, patch));
        self.cache.clear();
    }

    // ===== Bulk operations =====

    /// Run `call` as bulk `operation`: the flag is set before the request and
    /// cleared on failure. Callers finish a success with `complete_bulk`.
    pub async fn track_bulk<T, Fut>(
        &self,
        operation: BulkOperation,
        call: Fut,
    ) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.state.write().bulk.begin(operation);
        match call.await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.state.write().bulk.fail();
                Err(self.fail(e))
            }
        }
    }

    /// Finish a successful bulk call: apply `update`, record the results and
    /// clear the cache.
    pub fn complete_bulk(
        &self,
        results: Vec<R::Entity>,
        update: impl FnOnce(State<R>) -> State<R>,
    ) {
        self.apply(|state| {
            let mut state = update(state);
            state.bulk.complete(results);
            state
        });
        self.cache.clear();
    }

    pub async fn bulk_update(
        &self,
        ids: &[String],
        updates: Value,
    ) -> Result<Vec<R::Entity>, StoreError> {
        let updated = self
            .track_bulk(BulkOperation::Update, self.client.bulk_update(ids, updates))
            .await?;
        info!(resource = R::COLLECTION_KEY, count = updated.len(), "bulk updated");

        let replacements = updated.clone();
        self.complete_bulk(updated.clone(), |state| {
            replacements
                .into_iter()
                .fold(state, |state, entity| state.with_replaced(entity))
        });
        Ok(updated)
    }

    /// Returns the loaded entities that were removed.
    pub async fn bulk_delete(&self, ids: &[String]) -> Result<Vec<R::Entity>, StoreError> {
        self.track_bulk(BulkOperation::Delete, self.client.bulk_delete(ids))
            .await?;
        info!(resource = R::COLLECTION_KEY, count = ids.len(), "bulk deleted");

        let removed: Vec<R::Entity> = self.read(|state| {
            state
                .items
                .iter()
                .filter(|item| ids.iter().any(|id| id == item.id()))
                .cloned()
                .collect()
        });
        self.complete_bulk(Vec::new(), |state| state.with_removed_many(ids));
        Ok(removed)
    }

    // ===== Selection =====

    pub fn selected(&self) -> Vec<String> {
        self.state.read().bulk.selected.clone()
    }

    pub fn toggle_selection(&self, id: &str) {
        self.state.write().bulk.toggle(id);
    }

    pub fn set_selected(&self, ids: Vec<String>) {
        self.state.write().bulk.set_selected(ids);
    }

    pub fn select_all(&self) {
        let mut state = self.state.write();
        let ids = state.items.iter().map(|item| item.id().to_string()).collect();
        state.bulk.set_selected(ids);
    }

    pub fn clear_selection(&self) {
        self.state.write().bulk.clear_selection();
    }

    // ===== Views =====

    /// Loaded entities matching the current filters.
    pub fn filtered(&self) -> Vec<R::Entity> {
        let state = self.state.read();
        filter_items(&state.items, &state.filters)
    }
}
