use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    API_BASE_ENV, DEFAULT_API_BASE, DEFAULT_CACHE_EXPIRY, DEFAULT_PAGE_LIMIT,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SWEEP_INTERVAL,
};

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Directory holding the persisted store snapshots
    pub data_dir: PathBuf,
    pub api_base: String,
    pub cache_expiry: Duration,
    pub sweep_interval: Duration,
    pub page_limit: u32,
    pub request_timeout: Duration,
    /// Keep the bearer token in the OS keyring instead of `data_dir`
    pub use_keyring: bool,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            api_base: DEFAULT_API_BASE.to_string(),
            cache_expiry: DEFAULT_CACHE_EXPIRY,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            page_limit: DEFAULT_PAGE_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            use_keyring: false,
        }
    }

    /// Defaults with the API base URL taken from `RENTDESK_API_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(api_base) = std::env::var(API_BASE_ENV) {
            if !api_base.trim().is_empty() {
                config.api_base = api_base;
            }
        }
        config
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_cache_expiry(mut self, expiry: Duration) -> Self {
        self.cache_expiry = expiry;
        self
    }

    pub fn with_keyring(mut self, use_keyring: bool) -> Self {
        self.use_keyring = use_keyring;
        self
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|dir| dir.join("rentdesk"))
            .unwrap_or_else(|| PathBuf::from("rentdesk_data"));
        Self::new(data_dir)
    }
}
