/// OS-backed storage for session tokens
///
/// - macOS: Keychain
/// - Linux: Secret Service API
/// - Windows: Credential Manager
use keyring::Entry;
use std::fmt;

const SERVICE_NAME: &str = "com.rentdesk.client";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureKey {
    AccessToken,
    RefreshToken,
}

impl SecureKey {
    fn key_name(&self) -> &'static str {
        match self {
            SecureKey::AccessToken => "access_token",
            SecureKey::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for SecureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key_name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SecureStorageError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Key not found: {0}")]
    KeyNotFound(SecureKey),
}

pub struct SecureStorage;

impl SecureStorage {
    pub fn set(key: SecureKey, value: &str) -> Result<(), SecureStorageError> {
        let entry = Entry::new(SERVICE_NAME, key.key_name())?;
        entry.set_password(value)?;
        Ok(())
    }

    pub fn get(key: SecureKey) -> Result<String, SecureStorageError> {
        let entry = Entry::new(SERVICE_NAME, key.key_name())?;
        match entry.get_password() {
            Ok(value) => Ok(value),
            Err(keyring::Error::NoEntry) => Err(SecureStorageError::KeyNotFound(key)),
            Err(e) => Err(SecureStorageError::Keyring(e)),
        }
    }

    /// Missing entries count as deleted.
    pub fn delete(key: SecureKey) -> Result<(), SecureStorageError> {
        let entry = Entry::new(SERVICE_NAME, key.key_name())?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SecureStorageError::Keyring(e)),
        }
    }

    /// Store both halves of a login session.
    pub fn store_session(access: &str, refresh: Option<&str>) -> Result<(), SecureStorageError> {
        Self::set(SecureKey::AccessToken, access)?;
        match refresh {
            Some(refresh) => Self::set(SecureKey::RefreshToken, refresh),
            None => Self::delete(SecureKey::RefreshToken),
        }
    }

    pub fn clear_session() -> Result<(), SecureStorageError> {
        Self::delete(SecureKey::AccessToken)?;
        Self::delete(SecureKey::RefreshToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_are_stable() {
        assert_eq!(SecureKey::AccessToken.to_string(), "access_token");
        assert_eq!(SecureKey::RefreshToken.to_string(), "refresh_token");
    }

    #[test]
    #[ignore] // Requires an OS keyring
    fn test_session_roundtrip() {
        SecureStorage::store_session("access-123", Some("refresh-456")).unwrap();
        assert_eq!(SecureStorage::get(SecureKey::AccessToken).unwrap(), "access-123");
        assert_eq!(SecureStorage::get(SecureKey::RefreshToken).unwrap(), "refresh-456");

        SecureStorage::clear_session().unwrap();
        match SecureStorage::get(SecureKey::AccessToken) {
            Err(SecureStorageError::KeyNotFound(key)) => assert_eq!(key, SecureKey::AccessToken),
            other => panic!("expected KeyNotFound, got {:?}", other),
        }
    }
}
