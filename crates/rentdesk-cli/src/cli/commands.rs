use anyhow::{bail, Context, Result};
use chrono::Utc;
use rentdesk_core::models::Theme;
use rentdesk_core::store::FetchParams;
use rentdesk_core::CoreRuntime;
use serde_json::{json, Value};
use tracing::warn;

/// CLI command parsed from arguments
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Store a bearer token for later requests
    Login { token: String },
    /// Forget stored tokens
    Logout,
    ListProperties {
        page: Option<u32>,
        limit: Option<u32>,
        status: Option<String>,
        search: Option<String>,
    },
    ShowProperty { id: String },
    /// Portfolio stats over the first page of properties
    PropertyStats,
    DeleteProperty { id: String },
    ListNotifications { page: Option<u32>, unread_only: bool },
    MarkRead { id: String },
    MarkAllRead,
    NotificationStats,
    SetTheme { theme: String },
    ShowUi,
}

impl CliCommand {
    /// Commands that work without a stored token.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            CliCommand::Login { .. }
                | CliCommand::Logout
                | CliCommand::SetTheme { .. }
                | CliCommand::ShowUi
        )
    }
}

fn fetch_params(page: Option<u32>, limit: Option<u32>) -> FetchParams {
    FetchParams {
        page,
        limit,
        ..Default::default()
    }
}

/// Run `command` against the runtime and return the JSON to print.
pub async fn execute(runtime: &CoreRuntime, command: CliCommand) -> Result<Value> {
    match command {
        CliCommand::Login { token } => {
            if token.trim().is_empty() {
                bail!("Token must not be empty");
            }
            runtime.login(token.trim())?;
            Ok(json!({ "loggedIn": true }))
        }
        CliCommand::Logout => {
            runtime.logout()?;
            Ok(json!({ "loggedIn": false }))
        }
        CliCommand::ListProperties {
            page,
            limit,
            status,
            search,
        } => {
            let mut params = fetch_params(page, limit);
            if let Some(status) = status {
                params = params.with_param("status", status);
            }
            if let Some(search) = search {
                params = params.with_param("search", search);
            }
            let page = runtime
                .properties()
                .fetch_properties(params)
                .await
                .context("Failed to list properties")?;
            Ok(json!({ "items": page.items, "meta": page.meta }))
        }
        CliCommand::ShowProperty { id } => {
            let property = runtime
                .properties()
                .fetch_property(&id)
                .await
                .with_context(|| format!("Failed to load property {}", id))?;
            Ok(serde_json::to_value(property)?)
        }
        CliCommand::PropertyStats => {
            let properties = runtime.properties();
            properties
                .fetch_properties(FetchParams::default())
                .await
                .context("Failed to list properties")?;
            Ok(serde_json::to_value(properties.stats())?)
        }
        CliCommand::DeleteProperty { id } => {
            runtime
                .properties()
                .delete_property(&id)
                .await
                .with_context(|| format!("Failed to delete property {}", id))?;
            Ok(json!({ "deleted": id }))
        }
        CliCommand::ListNotifications { page, unread_only } => {
            let notifications = runtime.notifications();
            let page = notifications
                .fetch_notifications(fetch_params(page, None))
                .await
                .context("Failed to list notifications")?;
            let items = if unread_only {
                page.items.into_iter().filter(|n| !n.read).collect()
            } else {
                page.items
            };
            Ok(json!({
                "items": items,
                "meta": page.meta,
                "unreadCount": notifications.unread_count(),
            }))
        }
        CliCommand::MarkRead { id } => {
            runtime
                .notifications()
                .mark_as_read(&id)
                .await
                .with_context(|| format!("Failed to mark notification {} as read", id))?;
            Ok(json!({ "read": id }))
        }
        CliCommand::MarkAllRead => {
            runtime
                .notifications()
                .mark_all_as_read()
                .await
                .context("Failed to mark all notifications as read")?;
            Ok(json!({ "unreadCount": runtime.notifications().unread_count() }))
        }
        CliCommand::NotificationStats => {
            let notifications = runtime.notifications();
            notifications
                .fetch_notifications(FetchParams::default())
                .await
                .context("Failed to list notifications")?;
            Ok(serde_json::to_value(notifications.stats(Utc::now()))?)
        }
        CliCommand::SetTheme { theme } => {
            let theme: Theme = theme.parse().map_err(anyhow::Error::msg)?;
            runtime.ui().set_theme(theme);
            Ok(json!({ "theme": theme }))
        }
        CliCommand::ShowUi => Ok(serde_json::to_value(runtime.ui().snapshot())?),
    }
}

/// Combine a command result with the outcome of the final store save.
/// The command's own error wins; a failed save is only logged.
pub fn settle(result: Result<Value>, persisted: Result<()>) -> Result<Value> {
    if let Err(e) = persisted {
        warn!("Failed to persist stores: {:#}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use rentdesk_core::api::{ApiError, ApiRequest, Transport};
    use rentdesk_core::persist::{MemoryStorage, SnapshotStorage};
    use rentdesk_core::CoreConfig;

    struct FixedTransport;

    #[async_trait]
    impl Transport for FixedTransport {
        async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
            match (request.method.as_str(), request.path.as_str()) {
                ("GET", "/properties") => Ok(json!({
                    "properties": [
                        {"id": "p1", "name": "Maple Court", "status": "active", "type": "apartment"},
                        {"id": "p2", "name": "Elm House", "status": "inactive", "type": "house"}
                    ],
                    "pagination": {"total": 2, "page": 1}
                })),
                ("GET", "/notifications") => Ok(json!({
                    "notifications": [
                        {"id": "n1", "title": "Rent due", "message": "Unit 4", "read": false},
                        {"id": "n2", "title": "Paid", "message": "Unit 2", "read": true}
                    ],
                    "unreadCount": 1
                })),
                _ => Err(ApiError::Status {
                    status: 404,
                    message: "Not found".to_string(),
                    field_errors: Default::default(),
                }),
            }
        }
    }

    fn runtime() -> CoreRuntime {
        let storage: Arc<dyn SnapshotStorage> = Arc::new(MemoryStorage::default());
        CoreRuntime::with_parts(
            CoreConfig::new("/tmp/rentdesk-cli-test"),
            storage,
            Arc::new(FixedTransport),
        )
    }

    #[tokio::test]
    async fn test_list_properties_returns_items_and_meta() {
        let runtime = runtime();
        let out = execute(
            &runtime,
            CliCommand::ListProperties {
                page: None,
                limit: None,
                status: None,
                search: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(out["items"].as_array().map(Vec::len), Some(2));
        assert_eq!(out["items"][0]["name"], "Maple Court");
    }

    #[tokio::test]
    async fn test_unread_only_filters_list() {
        let runtime = runtime();
        let out = execute(
            &runtime,
            CliCommand::ListNotifications {
                page: None,
                unread_only: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(out["items"].as_array().map(Vec::len), Some(1));
        assert_eq!(out["unreadCount"], 1);
    }

    #[tokio::test]
    async fn test_missing_property_is_an_error() {
        let runtime = runtime();
        let err = execute(&runtime, CliCommand::ShowProperty { id: "zzz".to_string() })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to load property zzz"));
    }

    #[tokio::test]
    async fn test_theme_round_trip_and_rejection() {
        let runtime = runtime();
        let out = execute(&runtime, CliCommand::SetTheme { theme: "dark".to_string() })
            .await
            .unwrap();
        assert_eq!(out["theme"], "dark");
        assert!(execute(&runtime, CliCommand::SetTheme { theme: "neon".to_string() })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_login_rejects_blank_token() {
        let runtime = runtime();
        assert!(execute(&runtime, CliCommand::Login { token: "  ".to_string() })
            .await
            .is_err());
        execute(&runtime, CliCommand::Login { token: "t0k".to_string() })
            .await
            .unwrap();
        assert!(runtime.is_logged_in());
    }

    #[test]
    fn test_settle_keeps_command_outcome() {
        let err = settle(
            Err(anyhow::anyhow!("Failed to list properties")),
            Err(anyhow::anyhow!("disk full")),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Failed to list properties");

        let out = settle(Ok(json!({"ok": true})), Err(anyhow::anyhow!("disk full"))).unwrap();
        assert_eq!(out["ok"], true);
    }

    #[test]
    fn test_local_commands() {
        assert!(CliCommand::ShowUi.is_local());
        assert!(!CliCommand::MarkAllRead.is_local());
    }
}
