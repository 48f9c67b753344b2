use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::error::StoreError;
use super::list_store::{EntityStore, FetchParams};
use super::state::{prepend_unique, remove_by_id, replace_by_id, ListState};
use crate::api::{decode_list, decode_member, ApiError, ApiRequest, ListPage, Resource, Transport};
use crate::config::CoreConfig;
use crate::constants::storage_keys;
use crate::models::{
    Entity, MapCenter, Property, PropertyAnalytics, PropertyDraft, PropertyFilters,
    PropertyFiltersPatch, PropertyForm, PropertyStats, PropertyUpdate, Tenant, Unit, ViewMode,
};
use crate::persist::Persistable;
use crate::validation::{validate_property_create, validate_property_update};
use crate::views::{breakdown, count_where, sum_by, Breakdown};

pub struct PropertyResource;

impl Resource for PropertyResource {
    type Entity = Property;
    type Filters = PropertyFilters;
    const PATH: &'static str = "/properties";
    const COLLECTION_KEY: &'static str = "properties";
    const ENTITY_KEY: &'static str = "property";
    const BULK_IDS_KEY: &'static str = "propertyIds";
    const UPDATED_KEY: &'static str = "updatedProperties";
}

const DEFAULT_MAP_ZOOM: u8 = 10;

/// A per-property sub-collection (units, tenants) with its own flags.
#[derive(Debug, Clone)]
pub struct RelatedList<E> {
    pub items: Vec<E>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<E> Default for RelatedList<E> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PropertySession {
    pub current_property: Option<Property>,
    pub units: RelatedList<Unit>,
    pub tenants: RelatedList<Tenant>,
    pub analytics: PropertyAnalytics,
    pub real_time_enabled: bool,
    pub view_mode: ViewMode,
    pub map_center: MapCenter,
    pub map_zoom: u8,
    pub form: PropertyForm,
}

impl Default for PropertySession {
    fn default() -> Self {
        Self {
            current_property: None,
            units: RelatedList::default(),
            tenants: RelatedList::default(),
            analytics: PropertyAnalytics::new(),
            real_time_enabled: true,
            view_mode: ViewMode::default(),
            map_center: MapCenter::default(),
            map_zoom: DEFAULT_MAP_ZOOM,
            form: PropertyForm::default(),
        }
    }
}

/// Persisted subset of the property store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertySnapshot {
    pub filters: PropertyFilters,
    pub view_mode: ViewMode,
    pub map_center: MapCenter,
    pub map_zoom: u8,
    pub real_time_enabled: bool,
}

impl Default for PropertySnapshot {
    fn default() -> Self {
        Self {
            filters: PropertyFilters::default(),
            view_mode: ViewMode::default(),
            map_center: MapCenter::default(),
            map_zoom: DEFAULT_MAP_ZOOM,
            real_time_enabled: true,
        }
    }
}

fn property_path(property_id: &str) -> String {
    format!("/properties/{}", urlencoding::encode(property_id))
}

fn unit_path(property_id: &str, unit_id: &str) -> String {
    format!("{}/units/{}", property_path(property_id), urlencoding::encode(unit_id))
}

pub struct PropertyStore {
    list: EntityStore<PropertyResource>,
    session: RwLock<PropertySession>,
}

impl PropertyStore {
    pub fn new(transport: Arc<dyn Transport>, config: &CoreConfig) -> Self {
        Self {
            list: EntityStore::new(transport, config),
            session: RwLock::new(PropertySession::default()),
        }
    }

    pub fn list(&self) -> &EntityStore<PropertyResource> {
        &self.list
    }

    // ===== Getters =====

    pub fn properties(&self) -> Vec<Property> {
        self.list.items()
    }

    pub fn state(&self) -> ListState<Property, PropertyFilters> {
        self.list.snapshot()
    }

    pub fn session(&self) -> PropertySession {
        self.session.read().clone()
    }

    pub fn current_property(&self) -> Option<Property> {
        self.session.read().current_property.clone()
    }

    pub fn units(&self) -> Vec<Unit> {
        self.session.read().units.items.clone()
    }

    pub fn tenants(&self) -> Vec<Tenant> {
        self.session.read().tenants.items.clone()
    }

    pub fn form(&self) -> PropertyForm {
        self.session.read().form.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.list.error()
    }

    /// Clears the collection error and the unit/tenant errors.
    pub fn clear_error(&self) {
        self.list.clear_error();
        let mut session = self.session.write();
        session.units.error = None;
        session.tenants.error = None;
    }

    fn set_loading(&self, loading: bool) {
        self.list.mutate(|state| {
            state.loading = loading;
            if loading {
                state.error = None;
            }
        });
    }

    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.list.client().send(request).await
    }

    // ===== Properties =====

    pub async fn fetch_properties(
        &self,
        params: FetchParams,
    ) -> Result<ListPage<Property>, StoreError> {
        self.list.fetch_list(params).await
    }

    pub async fn load_more(&self) -> Result<Option<ListPage<Property>>, StoreError> {
        self.list.load_more().await
    }

    /// Load one property into `current_property`. Cached as `property_<id>`.
    pub async fn fetch_property(&self, id: &str) -> Result<Property, StoreError> {
        self.set_loading(true);
        let property = self.list.fetch_one(id).await?;
        self.session.write().current_property = Some(property.clone());
        self.set_loading(false);
        Ok(property)
    }

    /// Validate locally, then `POST /properties`. Field errors from either
    /// side land in the form; the store error is only set when the form has
    /// none to show.
    pub async fn create_property(&self, draft: &PropertyDraft) -> Result<Property, StoreError> {
        let validation = validate_property_create(draft);
        if !validation.is_valid() {
            self.session.write().form.errors = validation.errors.clone();
            return Err(StoreError::Validation(validation));
        }

        {
            let mut session = self.session.write();
            session.form.is_submitting = true;
            session.form.errors.clear();
        }

        let payload = serde_json::to_value(draft).map_err(ApiError::from)?;
        match self.list.client().create(payload).await {
            Ok(property) => {
                info!(id = property.id(), "property created");
                let created = property.clone();
                self.list.apply(|state| state.with_created(created));
                self.list.clear_cache();
                self.session.write().form = PropertyForm::default();
                Ok(property)
            }
            Err(e) => {
                let show_error = {
                    let mut session = self.session.write();
                    session.form.is_submitting = false;
                    if let Some(field_errors) = e.field_errors() {
                        session.form.errors = field_errors.clone();
                    }
                    session.form.errors.is_empty()
                };
                if show_error {
                    Err(self.list.fail(e))
                } else {
                    Err(StoreError::from(e))
                }
            }
        }
    }

    pub async fn update_property(
        &self,
        id: &str,
        update: &PropertyUpdate,
    ) -> Result<Property, StoreError> {
        let validation = validate_property_update(update);
        if !validation.is_valid() {
            self.session.write().form.errors = validation.errors.clone();
            return Err(StoreError::Validation(validation));
        }

        self.session.write().form.errors.clear();
        self.set_loading(true);
        let payload = serde_json::to_value(update).map_err(|e| self.list.fail(ApiError::from(e)))?;
        let property = self.list.update(id, payload).await?;

        {
            let mut session = self.session.write();
            if session.current_property.as_ref().is_some_and(|p| p.id == id) {
                session.current_property = Some(property.clone());
            }
        }
        self.set_loading(false);
        Ok(property)
    }

    /// Delete and drop the property from the selection and `current_property`.
    pub async fn delete_property(&self, id: &str) -> Result<(), StoreError> {
        self.set_loading(true);
        self.list.delete(id).await?;

        {
            let mut session = self.session.write();
            if session.current_property.as_ref().is_some_and(|p| p.id == id) {
                session.current_property = None;
            }
        }
        self.set_loading(false);
        Ok(())
    }

    pub async fn bulk_update(
        &self,
        ids: &[String],
        updates: Value,
    ) -> Result<Vec<Property>, StoreError> {
        self.list.bulk_update(ids, updates).await
    }

    /// Bulk delete; the whole selection is cleared afterwards.
    pub async fn bulk_delete(&self, ids: &[String]) -> Result<(), StoreError> {
        self.list.bulk_delete(ids).await?;
        self.list.clear_selection();
        Ok(())
    }

    /// `GET /properties/search`. Results are returned, not stored.
    pub async fn search(
        &self,
        term: &str,
        filters: Vec<(String, String)>,
    ) -> Result<Vec<Property>, StoreError> {
        self.set_loading(true);

        let mut query = vec![("search".to_string(), term.to_string())];
        query.extend(filters);
        let request = ApiRequest::get("/properties/search")
            .with_query(query)
            .or_fail_with("Search failed");
        let body = self.send(request).await.map_err(|e| self.list.fail(e))?;

        self.set_loading(false);
        decode_list(body, PropertyResource::COLLECTION_KEY).map_err(|e| self.list.fail(e))
    }

    pub async fn fetch_analytics(
        &self,
        property_id: &str,
        timeframe: &str,
    ) -> Result<PropertyAnalytics, StoreError> {
        self.set_loading(true);

        let request = ApiRequest::get(format!("{}/analytics", property_path(property_id)))
            .with_query(vec![("timeframe".to_string(), timeframe.to_string())])
            .or_fail_with("Failed to fetch analytics");
        let mut body = self.send(request).await.map_err(|e| self.list.fail(e))?;

        let analytics = match body.get_mut("analytics").map(Value::take) {
            Some(value) if !value.is_null() => {
                serde_json::from_value(value).map_err(|e| self.list.fail(ApiError::from(e)))?
            }
            _ => PropertyAnalytics::new(),
        };
        self.session.write().analytics = analytics.clone();
        self.set_loading(false);
        Ok(analytics)
    }

    // ===== Units =====

    fn fail_units(&self, err: impl Into<StoreError>) -> StoreError {
        let err = err.into();
        let mut session = self.session.write();
        session.units.error = Some(err.user_message());
        session.units.loading = false;
        err
    }

    pub async fn fetch_units(&self, property_id: &str) -> Result<Vec<Unit>, StoreError> {
        {
            let mut session = self.session.write();
            session.units.loading = true;
            session.units.error = None;
        }

        let request = ApiRequest::get(format!("{}/units", property_path(property_id)))
            .or_fail_with("Failed to fetch units");
        let body = self.send(request).await.map_err(|e| self.fail_units(e))?;
        let units: Vec<Unit> = decode_list(body, "units").map_err(|e| self.fail_units(e))?;

        let mut session = self.session.write();
        session.units.items = units.clone();
        session.units.loading = false;
        Ok(units)
    }

    pub async fn create_unit(&self, property_id: &str, payload: Value) -> Result<Unit, StoreError> {
        let request = ApiRequest::post(format!("{}/units", property_path(property_id)), payload)
            .or_fail_with("Failed to create unit");
        let body = self.send(request).await.map_err(|e| self.fail_units(e))?;
        let unit: Unit = decode_member(body, "unit").map_err(|e| self.fail_units(e))?;

        prepend_unique(&mut self.session.write().units.items, unit.clone());
        Ok(unit)
    }

    pub async fn update_unit(
        &self,
        property_id: &str,
        unit_id: &str,
        payload: Value,
    ) -> Result<Unit, StoreError> {
        let request = ApiRequest::put(unit_path(property_id, unit_id))
            .with_body(payload)
            .or_fail_with("Failed to update unit");
        let body = self.send(request).await.map_err(|e| self.fail_units(e))?;
        let unit: Unit = decode_member(body, "unit").map_err(|e| self.fail_units(e))?;

        replace_by_id(&mut self.session.write().units.items, unit.clone());
        Ok(unit)
    }

    pub async fn delete_unit(&self, property_id: &str, unit_id: &str) -> Result<(), StoreError> {
        let request =
            ApiRequest::delete(unit_path(property_id, unit_id)).or_fail_with("Failed to delete unit");
        self.send(request).await.map_err(|e| self.fail_units(e))?;

        remove_by_id(&mut self.session.write().units.items, unit_id);
        Ok(())
    }

    // ===== Tenants =====

    fn fail_tenants(&self, err: impl Into<StoreError>) -> StoreError {
        let err = err.into();
        let mut session = self.session.write();
        session.tenants.error = Some(err.user_message());
        session.tenants.loading = false;
        err
    }

    pub async fn fetch_tenants(&self, property_id: &str) -> Result<Vec<Tenant>, StoreError> {
        {
            let mut session = self.session.write();
            session.tenants.loading = true;
            session.tenants.error = None;
        }

        let request = ApiRequest::get(format!("{}/tenants", property_path(property_id)))
            .or_fail_with("Failed to fetch tenants");
        let body = self.send(request).await.map_err(|e| self.fail_tenants(e))?;
        let tenants: Vec<Tenant> = decode_list(body, "tenants").map_err(|e| self.fail_tenants(e))?;

        let mut session = self.session.write();
        session.tenants.items = tenants.clone();
        session.tenants.loading = false;
        Ok(tenants)
    }

    // ===== Filters and selection =====

    pub fn set_filters(&self, patch: PropertyFiltersPatch) {
        self.list.set_filters(patch);
    }

    pub fn filters(&self) -> PropertyFilters {
        self.list.filters()
    }

    pub fn set_page(&self, page: u32) {
        self.list.set_page(page);
    }

    pub fn set_selected(&self, ids: Vec<String>) {
        self.list.set_selected(ids);
    }

    pub fn toggle_selection(&self, id: &str) {
        self.list.toggle_selection(id);
    }

    pub fn select_all(&self) {
        self.list.select_all();
    }

    pub fn clear_selection(&self) {
        self.list.clear_selection();
    }

    pub fn clear_cache(&self) {
        self.list.clear_cache();
    }

    // ===== View settings =====

    pub fn set_view_mode(&self, mode: ViewMode) {
        self.session.write().view_mode = mode;
    }

    pub fn set_map_center(&self, center: MapCenter) {
        self.session.write().map_center = center;
    }

    pub fn set_map_zoom(&self, zoom: u8) {
        self.session.write().map_zoom = zoom;
    }

    pub fn toggle_real_time(&self, enabled: bool) {
        self.session.write().real_time_enabled = enabled;
    }

    // ===== Form =====

    pub fn update_form(&self, fields: Map<String, Value>) {
        self.session.write().form.data.extend(fields);
    }

    pub fn set_form_errors(&self, errors: BTreeMap<String, String>) {
        self.session.write().form.errors = errors;
    }

    pub fn set_form_touched(&self, field: &str, touched: bool) {
        let mut session = self.session.write();
        if touched {
            session.form.touched.insert(field.to_string());
        } else {
            session.form.touched.remove(field);
        }
    }

    pub fn reset_form(&self) {
        self.session.write().form = PropertyForm::default();
    }

    // ===== Views =====

    /// Loaded properties matching the filters, in the filters' sort order.
    pub fn filtered(&self) -> Vec<Property> {
        let filters = self.list.filters();
        let mut items = self.list.filtered();
        items.sort_by(|a, b| filters.compare(a, b));
        items
    }

    pub fn stats(&self) -> PropertyStats {
        let items = self.list.items();
        let total = items.len();
        let occupied = count_where(&items, |p| p.status == "occupied");
        let (average_rent, occupancy_rate) = if total > 0 {
            (
                sum_by(&items, |p| p.rent) / total as f64,
                occupied as f64 / total as f64 * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        PropertyStats {
            total,
            occupied,
            vacant: count_where(&items, |p| p.status == "vacant"),
            maintenance: count_where(&items, |p| p.status == "maintenance"),
            total_units: items.iter().map(|p| u64::from(p.unit_count)).sum(),
            total_revenue: sum_by(&items, |p| p.monthly_revenue),
            average_rent,
            occupancy_rate,
        }
    }

    /// Counts and monthly revenue grouped by `status`, `type`, or any string
    /// field the server sent.
    pub fn breakdown(&self, field: &str) -> Breakdown {
        let items = self.list.items();
        breakdown(
            &items,
            |p| match field {
                "status" => p.status.clone(),
                "type" => p.kind.clone(),
                other => p
                    .extra
                    .get(other)
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            },
            |p| p.monthly_revenue,
        )
    }
}

impl Persistable for PropertyStore {
    const STORAGE_KEY: &'static str = storage_keys::PROPERTY_STORE;
    type Snapshot = PropertySnapshot;

    fn to_persistable(&self) -> PropertySnapshot {
        let session = self.session.read();
        PropertySnapshot {
            filters: self.list.filters(),
            view_mode: session.view_mode,
            map_center: session.map_center,
            map_zoom: session.map_zoom,
            real_time_enabled: session.real_time_enabled,
        }
    }

    fn from_persistable(&self, snapshot: PropertySnapshot) {
        {
            let mut session = self.session.write();
            session.view_mode = snapshot.view_mode;
            session.map_center = snapshot.map_center;
            session.map_zoom = snapshot.map_zoom;
            session.real_time_enabled = snapshot.real_time_enabled;
        }
        self.list.replace_filters(snapshot.filters);
    }
}
