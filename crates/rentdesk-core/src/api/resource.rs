use std::marker::PhantomData;
use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::error::ApiError;
use super::query::QueryFilters;
use super::transport::{ApiRequest, Transport};
use crate::models::Entity;
use crate::views::EntityFilter;

/// A REST collection and the JSON keys its responses use.
pub trait Resource: Send + Sync + 'static {
    type Entity: Entity;
    type Filters: QueryFilters + EntityFilter<Self::Entity>;

    /// Collection path, e.g. `/properties`
    const PATH: &'static str;
    /// Key of the item array in list responses
    const COLLECTION_KEY: &'static str;
    /// Key of the single item in detail and mutation responses
    const ENTITY_KEY: &'static str;
    /// Key of the id array in bulk request bodies
    const BULK_IDS_KEY: &'static str;
    /// Key of the item array in bulk-update responses
    const UPDATED_KEY: &'static str;
}

/// Server-reported pagination. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageMeta {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub total: Option<u64>,
    pub has_more: Option<bool>,
    pub total_pages: Option<u32>,
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage<E> {
    pub items: Vec<E>,
    pub meta: PageMeta,
    /// Remaining top-level members, e.g. `unreadCount`
    pub extra: Map<String, Value>,
}

impl<E: DeserializeOwned> ListPage<E> {
    pub fn from_body(body: Value, collection_key: &str) -> Result<Self, ApiError> {
        let mut map = match body {
            Value::Object(map) => map,
            Value::Array(items) => {
                return Ok(Self {
                    items: serde_json::from_value(Value::Array(items))?,
                    meta: PageMeta::default(),
                    extra: Map::new(),
                })
            }
            Value::Null => Map::new(),
            other => {
                return Err(ApiError::Decode(format!(
                    "expected an object with `{}`, got {}",
                    collection_key, other
                )))
            }
        };

        let items = match map.remove(collection_key) {
            Some(value) if !value.is_null() => serde_json::from_value(value)?,
            _ => Vec::new(),
        };
        let meta = match map.remove("pagination") {
            Some(value) if !value.is_null() => serde_json::from_value(value)?,
            _ => PageMeta::default(),
        };

        Ok(Self {
            items,
            meta,
            extra: map,
        })
    }

    pub fn extra_u64(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(Value::as_u64)
    }
}

/// Decode `body[key]`, or the whole body when the key is absent.
pub fn decode_member<T: DeserializeOwned>(mut body: Value, key: &str) -> Result<T, ApiError> {
    if let Some(member) = body.get_mut(key) {
        return Ok(serde_json::from_value(member.take())?);
    }
    Ok(serde_json::from_value(body)?)
}

/// Decode `body[key]` as a list; a missing or null member is empty.
pub fn decode_list<T: DeserializeOwned>(mut body: Value, key: &str) -> Result<Vec<T>, ApiError> {
    match body.get_mut(key).map(Value::take) {
        Some(value) if !value.is_null() => Ok(serde_json::from_value(value)?),
        _ => Ok(Vec::new()),
    }
}

/// Typed CRUD and bulk calls for one [`Resource`].
pub struct ResourceClient<R> {
    transport: Arc<dyn Transport>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for ResourceClient<R> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> ResourceClient<R> {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            _resource: PhantomData,
        }
    }

    fn item_path(id: &str) -> String {
        format!("{}/{}", R::PATH, urlencoding::encode(id))
    }

    pub async fn list(
        &self,
        query: Vec<(String, String)>,
    ) -> Result<ListPage<R::Entity>, ApiError> {
        let request = ApiRequest::get(R::PATH)
            .with_query(query)
            .or_fail_with(format!("Failed to fetch {}", R::COLLECTION_KEY));
        let body = self.transport.send(request).await?;
        ListPage::from_body(body, R::COLLECTION_KEY)
    }

    pub async fn get(&self, id: &str) -> Result<R::Entity, ApiError> {
        let request = ApiRequest::get(Self::item_path(id))
            .or_fail_with(format!("Failed to fetch {}", R::ENTITY_KEY));
        let body = self.transport.send(request).await?;
        decode_member(body, R::ENTITY_KEY)
    }

    pub async fn create(&self, payload: Value) -> Result<R::Entity, ApiError> {
        let request = ApiRequest::post(R::PATH, payload)
            .or_fail_with(format!("Failed to create {}", R::ENTITY_KEY));
        let body = self.transport.send(request).await?;
        decode_member(body, R::ENTITY_KEY)
    }

    pub async fn update(&self, id: &str, payload: Value) -> Result<R::Entity, ApiError> {
        let request = ApiRequest::put(Self::item_path(id))
            .with_body(payload)
            .or_fail_with(format!("Failed to update {}", R::ENTITY_KEY));
        let body = self.transport.send(request).await?;
        decode_member(body, R::ENTITY_KEY)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let request = ApiRequest::delete(Self::item_path(id))
            .or_fail_with(format!("Failed to delete {}", R::ENTITY_KEY));
        self.transport.send(request).await?;
        Ok(())
    }

    /// `<method> <PATH>/<action>` with `{<ids key>: ids, updates?}`.
    pub async fn bulk(
        &self,
        method: Method,
        action: &str,
        ids: &[String],
        updates: Option<Value>,
    ) -> Result<Value, ApiError> {
        let mut body = Map::new();
        body.insert(R::BULK_IDS_KEY.to_string(), json!(ids));
        if let Some(updates) = updates {
            body.insert("updates".to_string(), updates);
        }
        let request = ApiRequest::new(method, format!("{}/{}", R::PATH, action))
            .with_body(Value::Object(body))
            .or_fail_with(format!(
                "Bulk {} failed",
                action.trim_start_matches("bulk-").replace('-', " ")
            ));
        self.transport.send(request).await
    }

    pub async fn bulk_update(
        &self,
        ids: &[String],
        updates: Value,
    ) -> Result<Vec<R::Entity>, ApiError> {
        let body = self.bulk(Method::PUT, "bulk-update", ids, Some(updates)).await?;
        decode_list(body, R::UPDATED_KEY)
    }

    pub async fn bulk_delete(&self, ids: &[String]) -> Result<(), ApiError> {
        self.bulk(Method::DELETE, "bulk-delete", ids, None).await?;
        Ok(())
    }

    /// Resource-specific endpoints outside the CRUD set.
    pub async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.transport.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedTransport;
    use crate::models::{Property, PropertyFilters};

    struct Props;

    impl Resource for Props {
        type Entity = Property;
        type Filters = PropertyFilters;
        const PATH: &'static str = "/properties";
        const COLLECTION_KEY: &'static str = "properties";
        const ENTITY_KEY: &'static str = "property";
        const BULK_IDS_KEY: &'static str = "propertyIds";
        const UPDATED_KEY: &'static str = "updatedProperties";
    }

    #[test]
    fn test_list_page_splits_items_meta_and_extra() {
        let page: ListPage<Property> = ListPage::from_body(
            json!({
                "properties": [{"id": "1", "name": "Elm"}],
                "pagination": {"page": 2, "total": 41, "totalPages": 3},
                "unreadCount": 4
            }),
            "properties",
        )
        .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.meta.page, Some(2));
        assert_eq!(page.meta.total, Some(41));
        assert_eq!(page.meta.has_more, None);
        assert_eq!(page.extra_u64("unreadCount"), Some(4));
    }

    #[test]
    fn test_list_page_tolerates_missing_members() {
        let page: ListPage<Property> = ListPage::from_body(json!({}), "properties").unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.meta, PageMeta::default());

        let err = ListPage::<Property>::from_body(json!("nope"), "properties").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_bulk_update_posts_ids_and_decodes_updated() {
        let transport = ScriptedTransport::new(|req| {
            assert_eq!(req.method, Method::PUT);
            assert_eq!(req.path, "/properties/bulk-update");
            let body = req.body.clone().unwrap_or_default();
            assert_eq!(body["propertyIds"], json!(["1", "2"]));
            assert_eq!(body["updates"]["status"], "vacant");
            Ok(json!({"updatedProperties": [{"id": "1", "status": "vacant"}]}))
        });
        let client = ResourceClient::<Props>::new(transport.clone());

        let updated = client
            .bulk_update(&["1".into(), "2".into()], json!({"status": "vacant"}))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].status, "vacant");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_get_accepts_wrapped_or_bare_entity() {
        let transport = ScriptedTransport::new(|req| match req.path.as_str() {
            "/properties/1" => Ok(json!({"property": {"id": "1", "name": "Wrapped"}})),
            _ => Ok(json!({"id": "2", "name": "Bare"})),
        });
        let client = ResourceClient::<Props>::new(transport);

        assert_eq!(client.get("1").await.unwrap().name, "Wrapped");
        assert_eq!(client.get("2").await.unwrap().name, "Bare");
    }
}
