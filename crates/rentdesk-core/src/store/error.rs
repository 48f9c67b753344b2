use crate::api::ApiError;
use crate::persist::PersistError;
use crate::validation::ValidationResult;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Client-side validation rejected the input before any request was sent
    #[error("Validation failed: {}", .0.first_message().unwrap_or("invalid input"))]
    Validation(ValidationResult),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl StoreError {
    /// Text recorded in a store's `error` field.
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    pub fn api(&self) -> Option<&ApiError> {
        match self {
            StoreError::Api(e) => Some(e),
            _ => None,
        }
    }
}
