//! Desktop (OS-level) alerts raised for incoming notifications.

use chrono::NaiveTime;
use tracing::info;

use crate::models::{DesktopPermission, Notification, NotificationPreferences, Priority};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopAlert {
    pub title: String,
    pub body: String,
    /// Notification id, so repeated alerts replace each other
    pub tag: String,
    pub require_interaction: bool,
    pub silent: bool,
}

impl DesktopAlert {
    pub fn for_notification(n: &Notification, prefs: &NotificationPreferences) -> Self {
        Self {
            title: n.title.clone(),
            body: n.message.clone(),
            tag: n.id.clone(),
            require_interaction: n.priority == Priority::Urgent,
            silent: !prefs.sound,
        }
    }
}

pub trait DesktopNotifier: Send + Sync {
    fn supported(&self) -> bool;
    fn permission(&self) -> DesktopPermission;
    /// Ask the platform for permission; returns the resulting state.
    fn request_permission(&self) -> DesktopPermission;
    fn show(&self, alert: &DesktopAlert);
}

/// Notifier for headless environments: alerts go to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl DesktopNotifier for LogNotifier {
    fn supported(&self) -> bool {
        true
    }

    fn permission(&self) -> DesktopPermission {
        DesktopPermission::Granted
    }

    fn request_permission(&self) -> DesktopPermission {
        DesktopPermission::Granted
    }

    fn show(&self, alert: &DesktopAlert) {
        info!(tag = %alert.tag, urgent = alert.require_interaction, "{}: {}", alert.title, alert.body);
    }
}

/// Whether a notification in `category` may raise a desktop alert at `now`.
pub fn should_alert(
    prefs: &NotificationPreferences,
    permission: DesktopPermission,
    category: &str,
    now: NaiveTime,
) -> bool {
    prefs.browser
        && permission == DesktopPermission::Granted
        && !prefs.quiet_hours.contains(now)
        && !prefs.do_not_disturb
        && prefs.category_enabled(category)
}
