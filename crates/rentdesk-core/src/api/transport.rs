use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use super::auth::TokenSource;
use super::error::ApiError;

/// One call against the REST backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base, e.g. `/properties/42`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Message used when a failure body carries none
    pub failure_message: String,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            failure_message: "Request failed".to_string(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn or_fail_with(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    /// Query parameter lookup, mostly for tests and logging.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Sends requests to the backend. Implementations return the decoded JSON
/// body on 2xx and an [`ApiError`] otherwise. Single attempt, no retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError>;
}

/// reqwest-backed transport with bearer authentication.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = self.url(&request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        // Without a token the backend decides; a 401 comes back as a status error.
        if let Some(token) = self.tokens.token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, path = %request.path, "api request");

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(body) => body,
                Err(e) if status.is_success() => return Err(ApiError::Decode(e.to_string())),
                Err(_) => Value::Null,
            }
        };

        if !status.is_success() {
            let err = ApiError::from_body(status.as_u16(), &body, &request.failure_message);
            warn!(
                method = %request.method,
                path = %request.path,
                status = status.as_u16(),
                "api request failed: {}",
                err
            );
            return Err(err);
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::MemoryTokens;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{delete, get};
    use axum::{extract::Query, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api", addr)
    }

    async fn echo(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Json(json!({ "auth": auth, "query": params }))
    }

    fn router() -> Router {
        Router::new()
            .route("/api/properties", get(echo))
            .route(
                "/api/properties/missing",
                get(|| async {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({ "message": "Property not found" })),
                    )
                }),
            )
            .route(
                "/api/properties/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
            )
            .route(
                "/api/properties/7",
                delete(|| async { StatusCode::NO_CONTENT }),
            )
    }

    fn transport(base: String, token: Option<&str>) -> HttpTransport {
        let tokens = Arc::new(MemoryTokens::new(token.map(str::to_string)));
        HttpTransport::new(base, tokens, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_sends_bearer_token_and_query() {
        let base = serve(router()).await;
        let http = transport(base, Some("secret"));

        let body = http
            .send(
                ApiRequest::get("/properties")
                    .with_query(vec![("status".into(), "vacant".into())]),
            )
            .await
            .unwrap();

        assert_eq!(body["auth"], "Bearer secret");
        assert_eq!(body["query"]["status"], "vacant");
    }

    #[tokio::test]
    async fn test_missing_token_sends_no_header() {
        let base = serve(router()).await;
        let http = transport(base, None);

        let body = http.send(ApiRequest::get("/properties")).await.unwrap();
        assert!(body["auth"].is_null());
    }

    #[tokio::test]
    async fn test_error_status_carries_server_message() {
        let base = serve(router()).await;
        let http = transport(base, Some("secret"));

        let err = http
            .send(ApiRequest::get("/properties/missing").or_fail_with("Failed to fetch property"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.user_message(), "Property not found");

        let err = http
            .send(ApiRequest::get("/properties/broken").or_fail_with("Failed to fetch property"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.user_message(), "Failed to fetch property");
    }

    #[tokio::test]
    async fn test_empty_success_body_is_null() {
        let base = serve(router()).await;
        let http = transport(base, Some("secret"));

        let body = http.send(ApiRequest::delete("/properties/7")).await.unwrap();
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let http = transport("http://127.0.0.1:9/api".to_string(), None);
        let err = http.send(ApiRequest::get("/properties")).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }
}
