use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::api::{HttpTransport, KeyringTokens, StoredTokens, TokenSource, Transport};
use crate::cache::Sweep;
use crate::config::CoreConfig;
use crate::persist::{restore_snapshot, save_snapshot, JsonFileStorage, Persistable, SnapshotStorage};
use crate::store::{NotificationStore, PropertyStore, UiStore};
use crate::sweeper::CacheSweeper;

/// Owns the stores, their shared storage and the cache sweeper.
pub struct CoreRuntime {
    config: CoreConfig,
    storage: Arc<dyn SnapshotStorage>,
    tokens: Arc<dyn TokenSource>,
    notifications: Arc<NotificationStore>,
    properties: Arc<PropertyStore>,
    ui: Arc<UiStore>,
    sweeper: Mutex<Option<CacheSweeper>>,
}

impl CoreRuntime {
    /// Runtime talking HTTP to `config.api_base`, with snapshots stored as
    /// JSON files under `config.data_dir`. The bearer token lives next to
    /// them, or in the OS keyring when `config.use_keyring` is set.
    pub fn new(config: CoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("Failed to create data directory {}", config.data_dir.display())
        })?;
        let storage: Arc<dyn SnapshotStorage> = Arc::new(JsonFileStorage::new(&config.data_dir));
        let tokens = token_source(&config, storage.clone());
        let transport =
            HttpTransport::new(config.api_base.clone(), tokens.clone(), config.request_timeout)?;
        Ok(Self::with_tokens(config, storage, Arc::new(transport), tokens))
    }

    /// Runtime over an existing transport, with the token source picked
    /// from `config` as in [`CoreRuntime::new`].
    pub fn with_parts(
        config: CoreConfig,
        storage: Arc<dyn SnapshotStorage>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let tokens = token_source(&config, storage.clone());
        Self::with_tokens(config, storage, transport, tokens)
    }

    pub fn with_tokens(
        config: CoreConfig,
        storage: Arc<dyn SnapshotStorage>,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            notifications: Arc::new(NotificationStore::new(transport.clone(), &config)),
            properties: Arc::new(PropertyStore::new(transport, &config)),
            ui: Arc::new(UiStore::new()),
            config,
            storage,
            tokens,
            sweeper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn notifications(&self) -> &Arc<NotificationStore> {
        &self.notifications
    }

    pub fn properties(&self) -> &Arc<PropertyStore> {
        &self.properties
    }

    pub fn ui(&self) -> &Arc<UiStore> {
        &self.ui
    }

    // ===== Session =====

    pub fn login(&self, token: &str) -> Result<()> {
        self.tokens.save(token).context("Failed to store token")?;
        info!("Token stored");
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        self.tokens.clear().context("Failed to clear tokens")?;
        self.notifications.list().clear_cache();
        self.properties.clear_cache();
        info!("Logged out");
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.tokens.token().is_some()
    }

    // ===== Lifecycle =====

    /// Restore persisted snapshots. Unreadable snapshots are discarded and
    /// leave the store at its defaults.
    pub fn restore(&self) {
        restore_logged(&*self.notifications, &*self.storage);
        restore_logged(&*self.properties, &*self.storage);
        restore_logged(&*self.ui, &*self.storage);
    }

    /// Restore snapshots and start the cache sweeper. Must run inside a
    /// tokio runtime.
    pub fn init(&self) {
        self.restore();
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_none() {
            let caches: Vec<Arc<dyn Sweep>> = vec![
                self.notifications.list().cache(),
                self.properties.list().cache(),
            ];
            *sweeper = Some(CacheSweeper::start(self.config.sweep_interval, caches));
        }
    }

    pub fn persist(&self) -> Result<()> {
        save_snapshot(&*self.notifications, &*self.storage)
            .context("Failed to save notification store")?;
        save_snapshot(&*self.properties, &*self.storage)
            .context("Failed to save property store")?;
        save_snapshot(&*self.ui, &*self.storage).context("Failed to save UI store")?;
        Ok(())
    }

    /// Stop the sweeper and write the final snapshots.
    pub fn dispose(&self) -> Result<()> {
        if let Some(mut sweeper) = self.sweeper.lock().take() {
            sweeper.dispose();
        }
        self.persist()
    }
}

fn token_source(config: &CoreConfig, storage: Arc<dyn SnapshotStorage>) -> Arc<dyn TokenSource> {
    if config.use_keyring {
        Arc::new(KeyringTokens)
    } else {
        Arc::new(StoredTokens::new(storage))
    }
}

fn restore_logged<P: Persistable>(store: &P, storage: &dyn SnapshotStorage) {
    match restore_snapshot(store, storage) {
        Ok(true) => info!(key = P::STORAGE_KEY, "restored snapshot"),
        Ok(false) => {}
        Err(e) => warn!(key = P::STORAGE_KEY, "failed to restore snapshot: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedTransport;
    use crate::api::MemoryTokens;
    use crate::models::{Theme, ViewMode};
    use crate::persist::MemoryStorage;
    use serde_json::json;

    fn runtime(storage: Arc<dyn SnapshotStorage>) -> CoreRuntime {
        let transport = ScriptedTransport::new(|_| Ok(json!({})));
        CoreRuntime::with_parts(CoreConfig::new("/tmp/rentdesk-runtime-test"), storage, transport)
    }

    #[tokio::test]
    async fn test_dispose_then_init_restores_all_stores() {
        let storage: Arc<dyn SnapshotStorage> = Arc::new(MemoryStorage::default());

        let first = runtime(storage.clone());
        first.init();
        first.ui().set_theme(Theme::Dark);
        first.properties().set_view_mode(ViewMode::Map);
        first.notifications().toggle_sound(false);
        first.dispose().unwrap();

        let second = runtime(storage);
        second.init();
        assert_eq!(second.ui().snapshot().theme, Theme::Dark);
        assert_eq!(second.properties().session().view_mode, ViewMode::Map);
        assert!(!second.notifications().session().sound_enabled);
        second.dispose().unwrap();
    }

    #[test]
    fn test_login_and_logout_manage_token() {
        let runtime = runtime(Arc::new(MemoryStorage::default()));
        assert!(!runtime.is_logged_in());
        runtime.login("abc123").unwrap();
        assert!(runtime.is_logged_in());
        runtime.logout().unwrap();
        assert!(!runtime.is_logged_in());
    }

    #[test]
    fn test_login_goes_through_the_given_token_source() {
        let storage: Arc<dyn SnapshotStorage> = Arc::new(MemoryStorage::default());
        let tokens = Arc::new(MemoryTokens::default());
        let transport = ScriptedTransport::new(|_| Ok(json!({})));
        let runtime = CoreRuntime::with_tokens(
            CoreConfig::new("/tmp/rentdesk-runtime-test").with_keyring(true),
            storage.clone(),
            transport,
            tokens.clone(),
        );

        runtime.login("abc123").unwrap();
        assert_eq!(tokens.token().as_deref(), Some("abc123"));
        assert_eq!(storage.get_item("token").unwrap(), None);
        assert!(runtime.is_logged_in());

        runtime.logout().unwrap();
        assert_eq!(tokens.token(), None);
        assert!(!runtime.is_logged_in());
    }

    #[test]
    fn test_stored_tokens_by_default() {
        let storage: Arc<dyn SnapshotStorage> = Arc::new(MemoryStorage::default());
        let runtime = runtime(storage.clone());
        runtime.login("abc123").unwrap();
        assert_eq!(storage.get_item("token").unwrap().as_deref(), Some("\"abc123\""));
    }

    #[test]
    fn test_corrupt_snapshot_is_ignored() {
        let storage: Arc<dyn SnapshotStorage> = Arc::new(MemoryStorage::default());
        storage.set_item("ui-store", "{not json").unwrap();
        let runtime = runtime(storage);
        runtime.restore();
        assert_eq!(runtime.ui().snapshot().theme, Theme::System);
    }
}
