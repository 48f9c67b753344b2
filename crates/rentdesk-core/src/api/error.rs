use std::collections::BTreeMap;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, TLS...)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response
    #[error("{message} (HTTP {status})")]
    Status {
        status: u16,
        message: String,
        /// Per-field messages from the `errors` member of the body
        field_errors: BTreeMap<String, String>,
    },

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Build a status error from a failure body, taking the message from
    /// `message` (or `error`) and falling back to `fallback`.
    pub fn from_body(status: u16, body: &Value, fallback: &str) -> Self {
        let message = ["message", "error"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
            .filter(|message| !message.is_empty())
            .unwrap_or(fallback)
            .to_string();

        ApiError::Status {
            status,
            message,
            field_errors: parse_field_errors(body.get("errors")),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            ApiError::Status { field_errors, .. } if !field_errors.is_empty() => {
                Some(field_errors)
            }
            _ => None,
        }
    }

    /// The text stored in a store's `error` field.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// `errors` comes either as `{field: message}` or as
/// `[{field|path|param, message|msg}]`.
fn parse_field_errors(errors: Option<&Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    match errors {
        Some(Value::Object(map)) => {
            for (field, message) in map {
                let text = match message {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                out.insert(field.clone(), text);
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                let field = ["field", "path", "param"]
                    .iter()
                    .find_map(|key| item.get(*key).and_then(Value::as_str));
                let message = ["message", "msg"]
                    .iter()
                    .find_map(|key| item.get(*key).and_then(Value::as_str));
                if let (Some(field), Some(message)) = (field, message) {
                    out.entry(field.to_string())
                        .or_insert_with(|| message.to_string());
                }
            }
        }
        _ => {}
    }
    out
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
