use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::constants::storage_keys;
use crate::persist::{PersistError, SnapshotStorage};
use crate::secure_storage::{SecureKey, SecureStorage, SecureStorageError};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error(transparent)]
    Storage(#[from] PersistError),

    #[error(transparent)]
    Keyring(#[from] SecureStorageError),
}

/// Holds the bearer token attached to every request.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Option<String>;
    fn save(&self, token: &str) -> Result<(), TokenError>;
    /// Forget the access token and any refresh token.
    fn clear(&self) -> Result<(), TokenError>;
}

/// Process-local token, never written anywhere.
#[derive(Default)]
pub struct MemoryTokens(RwLock<Option<String>>);

impl MemoryTokens {
    pub fn new(token: Option<String>) -> Self {
        Self(RwLock::new(token))
    }
}

impl TokenSource for MemoryTokens {
    fn token(&self) -> Option<String> {
        self.0.read().clone()
    }

    fn save(&self, token: &str) -> Result<(), TokenError> {
        *self.0.write() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenError> {
        *self.0.write() = None;
        Ok(())
    }
}

/// Tokens kept in the local snapshot storage under `token` or `accessToken`.
pub struct StoredTokens {
    storage: Arc<dyn SnapshotStorage>,
}

impl StoredTokens {
    pub fn new(storage: Arc<dyn SnapshotStorage>) -> Self {
        Self { storage }
    }

    fn read(&self, key: &str) -> Option<String> {
        let raw = match self.storage.get_item(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Failed to read {} from storage: {}", key, e);
                return None;
            }
        };
        // Values are JSON strings; tolerate bare tokens written by other tools.
        let token = serde_json::from_str::<String>(&raw).unwrap_or_else(|_| raw.trim().to_string());
        (!token.is_empty()).then_some(token)
    }
}

impl TokenSource for StoredTokens {
    fn token(&self) -> Option<String> {
        self.read(storage_keys::TOKEN)
            .or_else(|| self.read(storage_keys::ACCESS_TOKEN))
    }

    fn save(&self, token: &str) -> Result<(), TokenError> {
        let encoded = serde_json::to_string(token).map_err(PersistError::from)?;
        self.storage.set_item(storage_keys::TOKEN, &encoded)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenError> {
        for key in [
            storage_keys::TOKEN,
            storage_keys::ACCESS_TOKEN,
            storage_keys::REFRESH_TOKEN,
        ] {
            self.storage.remove_item(key)?;
        }
        Ok(())
    }
}

/// Session tokens in the OS keyring.
pub struct KeyringTokens;

impl TokenSource for KeyringTokens {
    fn token(&self) -> Option<String> {
        match SecureStorage::get(SecureKey::AccessToken) {
            Ok(token) => Some(token),
            Err(SecureStorageError::KeyNotFound(_)) => None,
            Err(e) => {
                warn!("Failed to read token from keyring: {}", e);
                None
            }
        }
    }

    fn save(&self, token: &str) -> Result<(), TokenError> {
        SecureStorage::store_session(token, None)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenError> {
        SecureStorage::clear_session()?;
        Ok(())
    }
}
