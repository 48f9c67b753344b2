//! In-memory transport for store tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::error::ApiError;
use super::transport::{ApiRequest, Transport};

type Handler = Box<dyn Fn(&ApiRequest) -> Result<Value, ApiError> + Send + Sync>;

/// Answers every request with `handler` and records what was sent.
pub struct ScriptedTransport {
    handler: Handler,
    calls: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(
        handler: impl Fn(&ApiRequest) -> Result<Value, ApiError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// `"GET /properties"` style summaries of the recorded calls
    pub fn routes(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|call| format!("{} {}", call.method, call.path))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.calls.lock().push(request.clone());
        (self.handler)(&request)
    }
}

/// Shorthand for a 4xx/5xx failure with a message.
pub fn status_error(status: u16, message: &str) -> ApiError {
    ApiError::Status {
        status,
        message: message.to_string(),
        field_errors: Default::default(),
    }
}
