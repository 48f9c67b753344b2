use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::bulk::BulkOperation;
use super::error::StoreError;
use super::list_store::{EntityStore, FetchParams};
use super::state::ListState;
use crate::api::{decode_list, decode_member, ApiError, ApiRequest, ListPage, Resource, Transport};
use crate::config::CoreConfig;
use crate::constants::{storage_keys, HIGH_PRIORITY_TOAST_MS, URGENT_TOAST_MS};
use crate::desktop::{should_alert, DesktopAlert, DesktopNotifier, LogNotifier};
use crate::models::{
    ConnectionStatus, DesktopPermission, Notification, NotificationAnalytics, NotificationFilters,
    NotificationFiltersPatch, NotificationPreferences, NotificationStats, Priority, QuietHours,
    Toast,
};
use crate::persist::Persistable;
use crate::views::count_by;

pub struct NotificationResource;

impl Resource for NotificationResource {
    type Entity = Notification;
    type Filters = NotificationFilters;
    const PATH: &'static str = "/notifications";
    const COLLECTION_KEY: &'static str = "notifications";
    const ENTITY_KEY: &'static str = "notification";
    const BULK_IDS_KEY: &'static str = "notificationIds";
    const UPDATED_KEY: &'static str = "updatedNotifications";
}

const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Everything the notification store tracks beside the collection itself.
#[derive(Debug, Clone)]
pub struct NotificationSession {
    pub unread_count: u64,
    pub marking_as_read: bool,
    pub preferences: NotificationPreferences,
    pub real_time_enabled: bool,
    pub connection_status: ConnectionStatus,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    /// Notifications waiting for `/notifications/sync`
    pub queue: Vec<Notification>,
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    pub browser_permission: DesktopPermission,
    pub analytics: NotificationAnalytics,
    pub toasts: Vec<Toast>,
    pub toast_counter: u64,
}

impl Default for NotificationSession {
    fn default() -> Self {
        Self {
            unread_count: 0,
            marking_as_read: false,
            preferences: NotificationPreferences::default(),
            real_time_enabled: true,
            connection_status: ConnectionStatus::default(),
            reconnect_attempts: 0,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            queue: Vec::new(),
            sound_enabled: true,
            vibration_enabled: true,
            browser_permission: DesktopPermission::default(),
            analytics: NotificationAnalytics::default(),
            toasts: Vec::new(),
            toast_counter: 0,
        }
    }
}

/// Persisted subset of the notification store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSnapshot {
    pub preferences: NotificationPreferences,
    pub real_time_enabled: bool,
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    pub browser_permission: DesktopPermission,
    pub filters: NotificationFilters,
}

impl Default for NotificationSnapshot {
    fn default() -> Self {
        let session = NotificationSession::default();
        Self {
            preferences: session.preferences,
            real_time_enabled: session.real_time_enabled,
            sound_enabled: session.sound_enabled,
            vibration_enabled: session.vibration_enabled,
            browser_permission: session.browser_permission,
            filters: NotificationFilters::default(),
        }
    }
}

/// Shallow merge of server-sent preference fields over the current ones.
fn merge_preferences(
    current: &NotificationPreferences,
    patch: Value,
) -> Result<NotificationPreferences, ApiError> {
    let mut merged = serde_json::to_value(current)?;
    if let (Value::Object(target), Value::Object(fields)) = (&mut merged, patch) {
        target.extend(fields);
    }
    Ok(serde_json::from_value(merged)?)
}

pub struct NotificationStore {
    list: EntityStore<NotificationResource>,
    session: RwLock<NotificationSession>,
    notifier: Arc<dyn DesktopNotifier>,
}

impl NotificationStore {
    pub fn new(transport: Arc<dyn Transport>, config: &CoreConfig) -> Self {
        Self::with_notifier(transport, config, Arc::new(LogNotifier))
    }

    pub fn with_notifier(
        transport: Arc<dyn Transport>,
        config: &CoreConfig,
        notifier: Arc<dyn DesktopNotifier>,
    ) -> Self {
        let session = NotificationSession {
            browser_permission: notifier.permission(),
            ..Default::default()
        };
        Self {
            list: EntityStore::new(transport, config),
            session: RwLock::new(session),
            notifier,
        }
    }

    /// The underlying collection store (pagination, selection, cache).
    pub fn list(&self) -> &EntityStore<NotificationResource> {
        &self.list
    }

    // ===== Getters =====

    pub fn notifications(&self) -> Vec<Notification> {
        self.list.items()
    }

    pub fn state(&self) -> ListState<Notification, NotificationFilters> {
        self.list.snapshot()
    }

    pub fn session(&self) -> NotificationSession {
        self.session.read().clone()
    }

    pub fn unread_count(&self) -> u64 {
        self.session.read().unread_count
    }

    pub fn preferences(&self) -> NotificationPreferences {
        self.session.read().preferences.clone()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.session.read().toasts.clone()
    }

    pub fn queue(&self) -> Vec<Notification> {
        self.session.read().queue.clone()
    }

    pub fn browser_permission(&self) -> DesktopPermission {
        self.session.read().browser_permission
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.session.read().connection_status
    }

    pub fn error(&self) -> Option<String> {
        self.list.error()
    }

    pub fn clear_error(&self) {
        self.list.clear_error();
    }

    fn set_loading(&self, loading: bool) {
        self.list.mutate(|state| {
            state.loading = loading;
            if loading {
                state.error = None;
            }
        });
    }

    fn fail(&self, err: impl Into<StoreError>) -> StoreError {
        self.list.fail(err)
    }

    // ===== Remote sync =====

    /// Fetch a page of notifications and take over the server's unread count.
    pub async fn fetch_notifications(
        &self,
        params: FetchParams,
    ) -> Result<ListPage<Notification>, StoreError> {
        let page = self.list.fetch_list(params).await?;
        self.session.write().unread_count = page.extra_u64("unreadCount").unwrap_or(0);
        Ok(page)
    }

    pub async fn load_more(&self) -> Result<Option<ListPage<Notification>>, StoreError> {
        let page = self.list.load_more().await?;
        if let Some(page) = &page {
            self.session.write().unread_count = page.extra_u64("unreadCount").unwrap_or(0);
        }
        Ok(page)
    }

    /// `PUT /notifications/:id/read`. The unread count only drops when the
    /// notification was loaded and unread.
    pub async fn mark_as_read(&self, id: &str) -> Result<(), StoreError> {
        self.session.write().marking_as_read = true;

        let request = ApiRequest::put(format!("/notifications/{}/read", urlencoding::encode(id)))
            .or_fail_with("Failed to mark as read");
        if let Err(e) = self.list.client().send(request).await {
            self.session.write().marking_as_read = false;
            return Err(self.fail(e));
        }

        let now = Utc::now();
        let mut newly_read = false;
        self.list.apply(|state| state.with_updated(id, |n| newly_read = n.mark_read(now)));
        self.list.clear_cache();

        let mut session = self.session.write();
        if newly_read {
            session.unread_count = session.unread_count.saturating_sub(1);
        }
        session.marking_as_read = false;
        Ok(())
    }

    pub async fn mark_all_as_read(&self) -> Result<(), StoreError> {
        self.set_loading(true);

        let request = ApiRequest::put("/notifications/read-all").or_fail_with("Failed to mark all as read");
        if let Err(e) = self.list.client().send(request).await {
            return Err(self.fail(e));
        }

        let now = Utc::now();
        self.list.mutate(|state| {
            for n in state.items.iter_mut() {
                n.mark_read(now);
            }
            state.loading = false;
        });
        self.list.clear_cache();
        self.session.write().unread_count = 0;
        info!("marked all notifications as read");
        Ok(())
    }

    pub async fn delete_notification(&self, id: &str) -> Result<(), StoreError> {
        let removed = self.list.delete(id).await?;
        if removed.is_some_and(|n| !n.read) {
            let mut session = self.session.write();
            session.unread_count = session.unread_count.saturating_sub(1);
        }
        Ok(())
    }

    /// `DELETE /notifications/delete-read`, then drop every loaded read item.
    pub async fn delete_all_read(&self) -> Result<usize, StoreError> {
        self.set_loading(true);

        let request =
            ApiRequest::delete("/notifications/delete-read").or_fail_with("Failed to delete read notifications");
        if let Err(e) = self.list.client().send(request).await {
            return Err(self.fail(e));
        }

        let read_ids: Vec<String> = self.list.read(|state| {
            state
                .items
                .iter()
                .filter(|n| n.read)
                .map(|n| n.id.clone())
                .collect()
        });
        self.list.apply(|state| {
            let mut state = state.with_removed_many(&read_ids);
            state.loading = false;
            state
        });
        self.list.clear_cache();
        info!(count = read_ids.len(), "deleted read notifications");
        Ok(read_ids.len())
    }

    pub async fn bulk_mark_as_read(&self, ids: &[String]) -> Result<(), StoreError> {
        let request = ApiRequest::put("/notifications/bulk-read")
            .with_body(json!({ "notificationIds": ids }))
            .or_fail_with("Bulk mark as read failed");
        self.list
            .track_bulk(BulkOperation::MarkRead, self.list.client().send(request))
            .await?;

        let now = Utc::now();
        let mut unread_reduced = 0u64;
        self.list.complete_bulk(Vec::new(), |state| {
            ids.iter().fold(state, |state, id| {
                state.with_updated(id, |n| {
                    if n.mark_read(now) {
                        unread_reduced += 1;
                    }
                })
            })
        });

        let mut session = self.session.write();
        session.unread_count = session.unread_count.saturating_sub(unread_reduced);
        info!(count = ids.len(), "bulk marked notifications as read");
        Ok(())
    }

    pub async fn bulk_delete(&self, ids: &[String]) -> Result<(), StoreError> {
        let removed = self.list.bulk_delete(ids).await?;
        let unread_removed = removed.iter().filter(|n| !n.read).count() as u64;

        let mut session = self.session.write();
        session.unread_count = session.unread_count.saturating_sub(unread_removed);
        Ok(())
    }

    /// `GET /notifications/search?q=`. Results are returned, not stored.
    pub async fn search(&self, term: &str) -> Result<Vec<Notification>, StoreError> {
        self.set_loading(true);

        let request = ApiRequest::get("/notifications/search")
            .with_query(vec![("q".to_string(), term.to_string())])
            .or_fail_with("Search failed");
        let body = match self.list.client().send(request).await {
            Ok(body) => body,
            Err(e) => return Err(self.fail(e)),
        };

        self.set_loading(false);
        decode_list(body, NotificationResource::COLLECTION_KEY).map_err(|e| self.fail(e))
    }

    pub async fn fetch_analytics(&self, timeframe: &str) -> Result<NotificationAnalytics, StoreError> {
        let request = ApiRequest::get("/notifications/analytics")
            .with_query(vec![("timeframe".to_string(), timeframe.to_string())])
            .or_fail_with("Failed to fetch analytics");
        let analytics: NotificationAnalytics = match self.list.client().send(request).await {
            Ok(body) => decode_member(body, "analytics").map_err(|e| self.fail(e))?,
            Err(e) => return Err(self.fail(e)),
        };

        self.session.write().analytics = analytics.clone();
        Ok(analytics)
    }

    // ===== Preferences =====

    pub async fn fetch_preferences(&self) -> Result<NotificationPreferences, StoreError> {
        let request =
            ApiRequest::get("/notifications/preferences").or_fail_with("Failed to fetch preferences");
        match self.list.client().send(request).await {
            Ok(body) => self.merge_server_preferences(body).map_err(|e| self.fail(e)),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// `PUT /notifications/preferences` with a partial preferences object.
    pub async fn update_preferences(&self, patch: Value) -> Result<NotificationPreferences, StoreError> {
        self.set_loading(true);

        let request = ApiRequest::put("/notifications/preferences")
            .with_body(patch)
            .or_fail_with("Failed to update preferences");
        let body = match self.list.client().send(request).await {
            Ok(body) => body,
            Err(e) => return Err(self.fail(e)),
        };

        let merged = self.merge_server_preferences(body).map_err(|e| self.fail(e))?;
        self.set_loading(false);
        Ok(merged)
    }

    fn merge_server_preferences(&self, mut body: Value) -> Result<NotificationPreferences, ApiError> {
        let fields = body.get_mut("preferences").map(Value::take).unwrap_or(Value::Null);
        let mut session = self.session.write();
        let merged = merge_preferences(&session.preferences, fields)?;
        session.preferences = merged.clone();
        Ok(merged)
    }

    /// Edit preferences locally without a round trip.
    pub fn edit_preferences(&self, edit: impl FnOnce(&mut NotificationPreferences)) {
        edit(&mut self.session.write().preferences);
    }

    pub fn set_do_not_disturb(&self, enabled: bool) {
        self.edit_preferences(|prefs| prefs.do_not_disturb = enabled);
    }

    pub fn set_quiet_hours(&self, quiet_hours: QuietHours) {
        self.edit_preferences(|prefs| prefs.quiet_hours = quiet_hours);
    }

    pub fn set_category_enabled(&self, category: &str, enabled: bool) {
        self.edit_preferences(|prefs| {
            prefs.categories.insert(category.to_string(), enabled);
        });
    }

    // ===== Desktop alerts =====

    /// Ask for desktop alert permission. A grant also turns on the
    /// `browser` preference on the server.
    pub async fn request_permission(&self) -> Result<bool, StoreError> {
        if !self.notifier.supported() {
            self.session.write().browser_permission = DesktopPermission::Denied;
            self.list.mutate(|state| state.error = Some("Browser notifications not supported".to_string()));
            return Ok(false);
        }

        let permission = match self.notifier.permission() {
            DesktopPermission::Default => self.notifier.request_permission(),
            current => current,
        };
        self.session.write().browser_permission = permission;

        if permission != DesktopPermission::Granted {
            return Ok(false);
        }
        self.update_preferences(json!({"browser": true})).await?;
        Ok(true)
    }

    fn alert_desktop(&self, n: &Notification) {
        let (prefs, permission, sound, vibration) = {
            let session = self.session.read();
            (
                session.preferences.clone(),
                session.browser_permission,
                session.sound_enabled,
                session.vibration_enabled,
            )
        };

        if should_alert(&prefs, permission, &n.category, Local::now().time()) {
            self.notifier.show(&DesktopAlert::for_notification(n, &prefs));
        }
        if prefs.sound && sound {
            debug!(id = %n.id, "notification sound");
        }
        if prefs.vibration && vibration {
            debug!(id = %n.id, "notification vibration");
        }
    }

    // ===== Incoming notifications =====

    /// Insert a pushed notification. Returns false for a duplicate id.
    pub fn add_notification(&self, n: Notification) -> bool {
        if self.list.read(|state| state.contains(&n.id)) {
            return false;
        }

        self.list.apply(|state| state.with_created(n.clone()));
        self.list.clear_cache();
        if !n.read {
            self.session.write().unread_count += 1;
        }

        self.alert_desktop(&n);

        if n.priority.wants_toast() {
            let duration_ms = if n.priority == Priority::Urgent {
                URGENT_TOAST_MS
            } else {
                HIGH_PRIORITY_TOAST_MS
            };
            self.add_toast(&n.title, &n.message, n.priority, duration_ms);
        }
        true
    }

    // ===== Toasts =====

    /// Prepend a toast and return its id.
    pub fn add_toast(&self, title: &str, message: &str, priority: Priority, duration_ms: u64) -> u64 {
        let mut session = self.session.write();
        let id = session.toast_counter + 1;
        session.toast_counter = id;
        session.toasts.insert(
            0,
            Toast {
                id,
                title: title.to_string(),
                message: message.to_string(),
                priority,
                duration_ms,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn remove_toast(&self, id: u64) {
        self.session.write().toasts.retain(|t| t.id != id);
    }

    pub fn clear_toasts(&self) {
        self.session.write().toasts.clear();
    }

    /// Drop timed toasts whose duration has elapsed.
    pub fn prune_expired_toasts(&self, now: DateTime<Utc>) -> usize {
        let mut session = self.session.write();
        let before = session.toasts.len();
        session.toasts.retain(|t| !t.is_expired(now));
        before - session.toasts.len()
    }

    // ===== Filters and selection =====

    pub fn set_filters(&self, patch: NotificationFiltersPatch) {
        self.list.set_filters(patch);
    }

    pub fn filters(&self) -> NotificationFilters {
        self.list.filters()
    }

    pub fn toggle_selection(&self, id: &str) {
        self.list.toggle_selection(id);
    }

    pub fn select_all(&self) {
        self.list.select_all();
    }

    pub fn clear_selection(&self) {
        self.list.clear_selection();
    }

    // ===== Connection and toggles =====

    pub fn set_connection_status(&self, status: ConnectionStatus) {
        self.session.write().connection_status = status;
    }

    pub fn set_reconnect_attempts(&self, attempts: u32) {
        self.session.write().reconnect_attempts = attempts;
    }

    pub fn can_reconnect(&self) -> bool {
        let session = self.session.read();
        session.reconnect_attempts < session.max_reconnect_attempts
    }

    pub fn toggle_real_time(&self, enabled: bool) {
        self.session.write().real_time_enabled = enabled;
    }

    pub fn toggle_sound(&self, enabled: bool) {
        self.session.write().sound_enabled = enabled;
    }

    pub fn toggle_vibration(&self, enabled: bool) {
        self.session.write().vibration_enabled = enabled;
    }

    // ===== Offline queue =====

    pub fn enqueue(&self, n: Notification) {
        self.session.write().queue.push(n);
    }

    pub fn remove_from_queue(&self, id: &str) {
        self.session.write().queue.retain(|n| n.id != id);
    }

    pub fn clear_queue(&self) {
        self.session.write().queue.clear();
    }

    /// POST queued notifications to `/notifications/sync` in order, stopping
    /// at the first failure. Does nothing unless connected. Returns how many
    /// were synced.
    pub async fn process_queue(&self) -> usize {
        let queued = {
            let session = self.session.read();
            if session.connection_status != ConnectionStatus::Connected {
                return 0;
            }
            session.queue.clone()
        };

        let mut synced = 0;
        for n in queued {
            let body = match serde_json::to_value(&n) {
                Ok(body) => body,
                Err(e) => {
                    warn!(id = %n.id, "Failed to encode queued notification: {}", e);
                    break;
                }
            };
            let request = ApiRequest::post("/notifications/sync", body)
                .or_fail_with("Failed to sync queued notification");
            if let Err(e) = self.list.client().send(request).await {
                warn!(id = %n.id, "Failed to sync queued notification: {}", e);
                break;
            }
            self.remove_from_queue(&n.id);
            synced += 1;
        }
        synced
    }

    // ===== Views =====

    pub fn filtered(&self) -> Vec<Notification> {
        self.list.filtered()
    }

    pub fn unread(&self) -> Vec<Notification> {
        self.list.read(|state| state.items.iter().filter(|n| !n.read).cloned().collect())
    }

    /// Notifications created within `hours` of `now`. Items without a
    /// timestamp are not recent.
    pub fn recent(&self, hours: i64, now: DateTime<Utc>) -> Vec<Notification> {
        let cutoff = now - Duration::hours(hours);
        self.list.read(|state| {
            state
                .items
                .iter()
                .filter(|n| n.created_at.is_some_and(|at| at > cutoff))
                .cloned()
                .collect()
        })
    }

    pub fn stats(&self, now: DateTime<Utc>) -> NotificationStats {
        let items = self.list.items();
        let unread = self.unread_count();
        NotificationStats {
            total: items.len(),
            unread,
            read: (items.len() as u64).saturating_sub(unread),
            by_type: count_by(&items, |n| n.kind.clone()),
            by_priority: count_by(&items, |n| n.priority.as_str().to_string()),
            by_category: count_by(&items, |n| n.category.clone()),
            recent: self.recent(24, now).len(),
        }
    }
}

impl Persistable for NotificationStore {
    const STORAGE_KEY: &'static str = storage_keys::NOTIFICATION_STORE;
    type Snapshot = NotificationSnapshot;

    fn to_persistable(&self) -> NotificationSnapshot {
        let session = self.session.read();
        NotificationSnapshot {
            preferences: session.preferences.clone(),
            real_time_enabled: session.real_time_enabled,
            sound_enabled: session.sound_enabled,
            vibration_enabled: session.vibration_enabled,
            browser_permission: session.browser_permission,
            filters: self.list.filters(),
        }
    }

    fn from_persistable(&self, snapshot: NotificationSnapshot) {
        {
            let mut session = self.session.write();
            session.preferences = snapshot.preferences;
            session.real_time_enabled = snapshot.real_time_enabled;
            session.sound_enabled = snapshot.sound_enabled;
            session.vibration_enabled = snapshot.vibration_enabled;
            session.browser_permission = snapshot.browser_permission;
        }
        self.list.replace_filters(snapshot.filters);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{status_error, ScriptedTransport};
    use crate::persist::{restore_snapshot, save_snapshot, MemoryStorage};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        shown: Mutex<Vec<DesktopAlert>>,
    }

    impl DesktopNotifier for RecordingNotifier {
        fn supported(&self) -> bool {
            true
        }

        fn permission(&self) -> DesktopPermission {
            DesktopPermission::Default
        }

        fn request_permission(&self) -> DesktopPermission {
            DesktopPermission::Granted
        }

        fn show(&self, alert: &DesktopAlert) {
            self.shown.lock().push(alert.clone());
        }
    }

    fn n(id: &str, read: bool) -> Notification {
        let mut n = Notification::new(id, format!("Title {}", id), "body");
        n.read = read;
        n
    }

    fn backend() -> Arc<ScriptedTransport> {
        ScriptedTransport::new(|req| match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/notifications") => Ok(json!({
                "notifications": [
                    {"id": "a", "title": "Leak", "read": false, "type": "maintenance"},
                    {"id": "b", "title": "Rent", "read": true, "type": "payment", "priority": "emergency"},
                    {"id": "c", "title": "Lease", "read": false, "type": "lease"}
                ],
                "unreadCount": 2,
                "pagination": {"page": 1, "total": 3, "hasMore": false}
            })),
            ("GET", "/notifications/preferences") => Ok(json!({"preferences": {"sms": true}})),
            ("PUT", "/notifications/preferences") => Ok(json!({"preferences": {"browser": true}})),
            ("GET", "/notifications/search") => Ok(json!({"notifications": [{"id": "s1"}]})),
            ("POST", "/notifications/sync") => match req.body.as_ref().and_then(|b| b.get("id")) {
                Some(id) if id == "q2" => Err(status_error(503, "Sync unavailable")),
                _ => Ok(json!({"ok": true})),
            },
            ("PUT", "/notifications/c/read") => Err(status_error(500, "Failed to mark as read")),
            ("PUT", _) | ("DELETE", _) => Ok(json!({"success": true})),
            _ => Err(status_error(404, "Not found")),
        })
    }

    fn store(transport: Arc<ScriptedTransport>) -> NotificationStore {
        NotificationStore::new(transport, &CoreConfig::new("unused"))
    }

    #[tokio::test]
    async fn test_fetch_takes_unread_count_from_response() {
        let store = store(backend());
        store.fetch_notifications(FetchParams::default()).await.unwrap();
        assert_eq!(store.notifications().len(), 3);
        assert_eq!(store.unread_count(), 2);
        assert!(!store.list().pagination().has_more);
    }

    #[tokio::test]
    async fn test_unknown_priority_does_not_fail_the_page() {
        let store = store(backend());
        let page = store.fetch_notifications(FetchParams::default()).await.unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].priority, Priority::Medium);
        assert_eq!(page.items[1].priority, Priority::Urgent);
    }

    #[tokio::test]
    async fn test_mark_as_read_only_counts_unread_items() {
        let transport = backend();
        let store = store(transport.clone());
        store.fetch_notifications(FetchParams::default()).await.unwrap();

        store.mark_as_read("a").await.unwrap();
        assert_eq!(store.unread_count(), 1);
        store.mark_as_read("b").await.unwrap();
        assert_eq!(store.unread_count(), 1);

        let a = store.list().find("a").unwrap();
        assert!(a.read);
        assert!(a.read_at.is_some());
        assert!(!store.session().marking_as_read);

        let err = store.mark_as_read("c").await.unwrap_err();
        assert_eq!(err.user_message(), "Failed to mark as read");
        assert_eq!(store.unread_count(), 1);
        assert!(!store.session().marking_as_read);
    }

    #[tokio::test]
    async fn test_mark_all_and_delete_all_read() {
        let store = store(backend());
        store.fetch_notifications(FetchParams::default()).await.unwrap();

        store.mark_all_as_read().await.unwrap();
        assert_eq!(store.unread_count(), 0);
        assert!(store.notifications().iter().all(|n| n.read));

        let removed = store.delete_all_read().await.unwrap();
        assert_eq!(removed, 3);
        assert!(store.notifications().is_empty());
        assert_eq!(store.list().pagination().total, 0);
        assert!(!store.list().is_loading());
    }

    #[tokio::test]
    async fn test_bulk_delete_reduces_unread_and_total() {
        let transport = backend();
        let store = store(transport.clone());
        store.fetch_notifications(FetchParams::default()).await.unwrap();

        store.bulk_delete(&["a".to_string(), "b".to_string()]).await.unwrap();
        let ids: Vec<_> = store.notifications().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["c".to_string()]);
        assert_eq!(store.unread_count(), 1);
        assert_eq!(store.list().pagination().total, 1);
        assert_eq!(store.state().bulk.operation, None);
        assert!(transport.routes().contains(&"DELETE /notifications/bulk-delete".to_string()));
    }

    #[tokio::test]
    async fn test_bulk_mark_as_read() {
        let transport = backend();
        let store = store(transport.clone());
        store.fetch_notifications(FetchParams::default()).await.unwrap();

        store
            .bulk_mark_as_read(&["a".to_string(), "b".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(store.unread_count(), 1);
        assert_eq!(store.state().bulk.progress, 100);
        let body = transport.calls().last().unwrap().body.clone().unwrap();
        assert_eq!(body["notificationIds"], json!(["a", "b", "zzz"]));
    }

    #[test]
    fn test_add_urgent_notification_adds_sticky_toast() {
        let store = store(backend());
        store.session.write().unread_count = 3;

        let urgent = n("n1", false).with_priority(Priority::Urgent);
        assert!(store.add_notification(urgent.clone()));
        assert_eq!(store.unread_count(), 4);
        assert_eq!(store.list().pagination().total, 1);

        let toasts = store.toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].duration_ms, 0);
        assert!(toasts[0].is_sticky());

        assert!(!store.add_notification(urgent));
        assert_eq!(store.unread_count(), 4);
        assert_eq!(store.notifications().len(), 1);
    }

    #[test]
    fn test_toast_durations_by_priority() {
        let store = store(backend());
        store.add_notification(n("h", false).with_priority(Priority::High));
        store.add_notification(n("l", false).with_priority(Priority::Low));

        let toasts = store.toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].duration_ms, 5000);

        let later = toasts[0].created_at + Duration::milliseconds(5000);
        assert_eq!(store.prune_expired_toasts(later), 1);
        assert!(store.toasts().is_empty());
    }

    #[test]
    fn test_toast_ids_increase_and_remove() {
        let store = store(backend());
        let first = store.add_toast("a", "b", Priority::Low, 1000);
        let second = store.add_toast("c", "d", Priority::Low, 1000);
        assert_eq!(second, first + 1);
        assert_eq!(store.toasts()[0].id, second);

        store.remove_toast(first);
        assert_eq!(store.toasts().len(), 1);
        store.clear_toasts();
        assert!(store.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_desktop_alert_after_permission_grant() {
        let transport = backend();
        let notifier = Arc::new(RecordingNotifier::default());
        let store =
            NotificationStore::with_notifier(transport.clone(), &CoreConfig::new("unused"), notifier.clone());

        store.add_notification(n("before", false).with_category("payments"));
        assert!(notifier.shown.lock().is_empty());

        assert!(store.request_permission().await.unwrap());
        assert_eq!(store.browser_permission(), DesktopPermission::Granted);
        assert!(transport.routes().contains(&"PUT /notifications/preferences".to_string()));

        store.add_notification(n("after", false).with_category("payments"));
        store.add_notification(n("promo", false).with_category("marketing"));
        let shown = notifier.shown.lock();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].tag, "after");
    }

    #[tokio::test]
    async fn test_preferences_merge_server_fields() {
        let store = store(backend());
        let prefs = store.fetch_preferences().await.unwrap();
        assert!(prefs.sms);
        assert!(prefs.email);
        assert!(store.preferences().sms);

        store.set_category_enabled("marketing", true);
        assert!(store.preferences().category_enabled("marketing"));
    }

    #[tokio::test]
    async fn test_search_returns_without_storing() {
        let transport = backend();
        let store = store(transport.clone());
        let results = store.search("leak").await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(store.notifications().is_empty());
        assert_eq!(transport.calls()[0].query_value("q"), Some("leak"));
        assert!(!store.list().is_loading());
    }

    #[tokio::test]
    async fn test_process_queue_requires_connection_and_stops_on_failure() {
        let transport = backend();
        let store = store(transport.clone());
        store.enqueue(n("q1", false));
        store.enqueue(n("q2", false));
        store.enqueue(n("q3", false));

        assert_eq!(store.process_queue().await, 0);
        assert_eq!(transport.call_count(), 0);

        store.set_connection_status(ConnectionStatus::Connected);
        assert_eq!(store.process_queue().await, 1);
        let remaining: Vec<_> = store.queue().into_iter().map(|n| n.id).collect();
        assert_eq!(remaining, vec!["q2".to_string(), "q3".to_string()]);
    }

    #[test]
    fn test_stats_and_recent_views() {
        let store = store(backend());
        let now = Utc::now();
        let mut old = n("old", true);
        old.created_at = Some(now - Duration::hours(48));
        store.add_notification(old);
        store.add_notification(n("new", false));

        let stats = store.stats(now);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.unread, 1);
        assert_eq!(stats.read, 1);
        assert_eq!(stats.recent, 1);
        assert_eq!(stats.by_priority.get("medium"), Some(&2));
        assert_eq!(store.unread().len(), 1);
    }

    #[test]
    fn test_set_filters_resets_page() {
        let store = store(backend());
        store.list().set_page(3);
        store.set_filters(NotificationFiltersPatch {
            status: Some("unread".to_string()),
            ..Default::default()
        });
        assert_eq!(store.list().pagination().page, 1);
        assert_eq!(store.filters().status, "unread");
    }

    #[test]
    fn test_snapshot_roundtrip_keeps_preference_fields_only() {
        let storage = MemoryStorage::default();
        let store = store(backend());
        store.toggle_sound(false);
        store.set_do_not_disturb(true);
        store.add_toast("t", "m", Priority::Low, 0);
        store.set_filters(NotificationFiltersPatch {
            category: Some("payments".to_string()),
            ..Default::default()
        });
        save_snapshot(&store, &storage).unwrap();

        let restored = NotificationStore::new(backend(), &CoreConfig::new("unused"));
        assert!(restore_snapshot(&restored, &storage).unwrap());
        let session = restored.session();
        assert!(!session.sound_enabled);
        assert!(session.preferences.do_not_disturb);
        assert!(session.toasts.is_empty());
        assert_eq!(restored.filters().category, "payments");
    }
}
