use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rentdesk_core::CoreConfig;
use serde::{Deserialize, Serialize};

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// REST API base URL, e.g. `https://rent.example.com/api`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Directory for store snapshots and the stored token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Bearer token written to storage before the command runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Keep the token in the OS keyring rather than the data directory
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_keyring: bool,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize config")
    }

    /// Core settings from the environment, overridden by this file and then
    /// by the `--data-dir` flag.
    pub fn core_config(&self, data_dir_flag: Option<&Path>) -> CoreConfig {
        let mut core = CoreConfig::from_env();
        if let Some(api_url) = &self.api_url {
            core = core.with_api_base(api_url.clone());
        }
        if let Some(dir) = data_dir_flag.or(self.data_dir.as_deref()) {
            core.data_dir = dir.to_path_buf();
        }
        core.with_keyring(self.use_keyring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_full() {
        let json = r#"{
            "apiUrl": "https://rent.example.com/api",
            "dataDir": "/tmp/rentdesk",
            "token": "abc",
            "useKeyring": true
        }"#;
        let config = CliConfig::from_json(json).unwrap();
        assert_eq!(config.api_url.as_deref(), Some("https://rent.example.com/api"));
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/rentdesk")));
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert!(config.core_config(None).use_keyring);
    }

    #[test]
    fn test_parse_config_minimal() {
        let config = CliConfig::from_json("{}").unwrap();
        assert!(config.api_url.is_none());
        assert!(config.data_dir.is_none());
        assert!(config.token.is_none());
        assert!(!config.use_keyring);
    }

    #[test]
    fn test_data_dir_flag_wins() {
        let config = CliConfig {
            api_url: Some("http://api.test".to_string()),
            data_dir: Some(PathBuf::from("/from/file")),
            token: None,
            use_keyring: false,
        };
        let core = config.core_config(Some(Path::new("/from/flag")));
        assert_eq!(core.data_dir, PathBuf::from("/from/flag"));
        assert_eq!(core.api_base, "http://api.test");

        let core = config.core_config(None);
        assert_eq!(core.data_dir, PathBuf::from("/from/file"));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CliConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
