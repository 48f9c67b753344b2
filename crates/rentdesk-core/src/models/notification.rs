use std::collections::BTreeMap;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{is_wildcard, Entity};
use crate::api::QueryFilters;
use crate::search::matches_search;
use crate::views::EntityFilter;

/// Decoding never fails: `normal` and unknown values read as `Medium`,
/// `emergency` and `critical` as `Urgent`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl From<Option<String>> for Priority {
    fn from(raw: Option<String>) -> Self {
        match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("low") => Priority::Low,
            Some("high") => Priority::High,
            Some("urgent" | "emergency" | "critical") => Priority::Urgent,
            _ => Priority::Medium,
        }
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// High and urgent notifications also surface as in-app toasts
    pub fn wants_toast(&self) -> bool {
        matches!(self, Priority::High | Priority::Urgent)
    }
}

fn default_kind() -> String {
    "info".to_string()
}

fn default_category() -> String {
    "system".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    /// Server fields without a typed counterpart
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notification {
    pub fn new(id: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            message: message.into(),
            kind: default_kind(),
            category: default_category(),
            priority: Priority::default(),
            read: false,
            read_at: None,
            created_at: Some(Utc::now()),
            action_url: None,
            extra: Map::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn mark_read(&mut self, at: DateTime<Utc>) -> bool {
        if self.read {
            return false;
        }
        self.read = true;
        self.read_at = Some(at);
        true
    }
}

impl Entity for Notification {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationFilters {
    #[serde(rename = "type")]
    pub kind: String,
    /// `all`, `read` or `unread`
    pub status: String,
    pub priority: String,
    pub category: String,
    pub search: String,
}

impl Default for NotificationFilters {
    fn default() -> Self {
        Self {
            kind: "all".to_string(),
            status: "all".to_string(),
            priority: "all".to_string(),
            category: "all".to_string(),
            search: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationFiltersPatch {
    pub kind: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl QueryFilters for NotificationFilters {
    type Patch = NotificationFiltersPatch;

    fn query_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("type".to_string(), self.kind.clone()),
            ("status".to_string(), self.status.clone()),
            ("priority".to_string(), self.priority.clone()),
            ("category".to_string(), self.category.clone()),
            ("search".to_string(), self.search.clone()),
        ]
    }

    fn merge(&mut self, patch: NotificationFiltersPatch) {
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(search) = patch.search {
            self.search = search;
        }
    }
}

impl EntityFilter<Notification> for NotificationFilters {
    fn matches(&self, n: &Notification) -> bool {
        let matches_type = is_wildcard(&self.kind) || n.kind == self.kind;
        let matches_status = match self.status.as_str() {
            "read" => n.read,
            "unread" => !n.read,
            _ => true,
        };
        let matches_priority = is_wildcard(&self.priority) || n.priority.as_str() == self.priority;
        let matches_category = is_wildcard(&self.category) || n.category == self.category;
        let matches_text = matches_search(&[n.title.as_str(), n.message.as_str()], &self.search);

        matches_type && matches_status && matches_priority && matches_category && matches_text
    }
}

/// Do-not-disturb window, stored as `HH:MM` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuietHours {
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "22:00".to_string(),
            end: "08:00".to_string(),
        }
    }
}

fn parse_hhmm(value: &str) -> Option<u32> {
    let (hours, minutes) = value.trim().split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    (hours < 24 && minutes < 60).then_some(hours * 100 + minutes)
}

impl QuietHours {
    /// Whether `time` falls inside the window. Both bounds are inclusive and a
    /// start later than the end wraps past midnight.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if !self.enabled {
            return false;
        }
        let (Some(start), Some(end)) = (parse_hhmm(&self.start), parse_hhmm(&self.end)) else {
            return false;
        };
        let current = time.hour() * 100 + time.minute();

        if start > end {
            current >= start || current <= end
        } else {
            current >= start && current <= end
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryFrequency {
    pub immediate: bool,
    pub daily: bool,
    pub weekly: bool,
}

impl Default for DeliveryFrequency {
    fn default() -> Self {
        Self {
            immediate: true,
            daily: false,
            weekly: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub email: bool,
    pub push: bool,
    pub sms: bool,
    /// Desktop (OS-level) alerts
    pub browser: bool,
    pub sound: bool,
    pub vibration: bool,
    pub do_not_disturb: bool,
    pub quiet_hours: QuietHours,
    pub categories: BTreeMap<String, bool>,
    pub frequency: DeliveryFrequency,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        let categories = [
            ("maintenance", true),
            ("payments", true),
            ("leases", true),
            ("messages", true),
            ("system", true),
            ("marketing", false),
            ("security", true),
            ("reminders", true),
        ]
        .into_iter()
        .map(|(name, enabled)| (name.to_string(), enabled))
        .collect();

        Self {
            email: true,
            push: true,
            sms: false,
            browser: true,
            sound: true,
            vibration: true,
            do_not_disturb: false,
            quiet_hours: QuietHours::default(),
            categories,
            frequency: DeliveryFrequency::default(),
        }
    }
}

impl NotificationPreferences {
    pub fn category_enabled(&self, category: &str) -> bool {
        self.categories.get(category).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesktopPermission {
    #[default]
    Default,
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationAnalytics {
    pub total_sent: u64,
    pub total_read: u64,
    pub read_rate: f64,
    pub by_type: BTreeMap<String, u64>,
    pub by_category: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
    pub trends: Vec<Value>,
}

/// In-app toast. A zero duration keeps it until dismissed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub id: u64,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl Toast {
    pub fn is_sticky(&self) -> bool {
        self.duration_ms == 0
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.is_sticky() {
            return false;
        }
        let elapsed = now.signed_duration_since(self.created_at);
        elapsed.num_milliseconds() >= self.duration_ms as i64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub total: usize,
    pub unread: u64,
    pub read: u64,
    pub by_type: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub recent: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(hours: u32, minutes: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hours, minutes, 0).unwrap()
    }

    #[test]
    fn test_deserialize_numeric_id_and_extra_fields() {
        let n: Notification = serde_json::from_value(json!({
            "id": 42,
            "title": "Rent due",
            "type": "payment",
            "priority": "urgent",
            "createdAt": "2024-05-01T10:00:00Z",
            "propertyId": "p-7"
        }))
        .unwrap();

        assert_eq!(n.id, "42");
        assert_eq!(n.kind, "payment");
        assert_eq!(n.priority, Priority::Urgent);
        assert_eq!(n.category, "system");
        assert!(!n.read);
        assert_eq!(n.extra.get("propertyId"), Some(&json!("p-7")));
    }

    #[test]
    fn test_priority_decoding_tolerates_unknown_values() {
        let decode = |value: Value| -> Priority {
            let n: Notification =
                serde_json::from_value(json!({"id": "n1", "priority": value})).unwrap();
            n.priority
        };
        assert_eq!(decode(json!("normal")), Priority::Medium);
        assert_eq!(decode(json!("HIGH")), Priority::High);
        assert_eq!(decode(json!("emergency")), Priority::Urgent);
        assert_eq!(decode(json!("whenever")), Priority::Medium);
        assert_eq!(decode(Value::Null), Priority::Medium);
        assert_eq!(serde_json::to_value(Priority::Urgent).unwrap(), json!("urgent"));
    }

    #[test]
    fn test_filters_match_all_by_default() {
        let filters = NotificationFilters::default();
        let n = Notification::new("1", "Leak", "Kitchen sink leaking");
        assert!(filters.matches(&n));
    }

    #[test]
    fn test_filters_combine_predicates() {
        let mut filters = NotificationFilters::default();
        filters.merge(NotificationFiltersPatch {
            status: Some("unread".to_string()),
            search: Some("sink".to_string()),
            ..Default::default()
        });

        let mut read = Notification::new("1", "Leak", "Kitchen sink leaking");
        read.read = true;
        let unread = Notification::new("2", "Leak", "Bathroom SINK leaking");
        let other = Notification::new("3", "Payment", "Rent received");

        assert!(!filters.matches(&read));
        assert!(filters.matches(&unread));
        assert!(!filters.matches(&other));
    }

    #[test]
    fn test_quiet_hours_overnight_window() {
        let quiet = QuietHours {
            enabled: true,
            ..Default::default()
        };
        assert!(quiet.contains(at(23, 30)));
        assert!(quiet.contains(at(22, 0)));
        assert!(quiet.contains(at(8, 0)));
        assert!(!quiet.contains(at(12, 0)));
    }

    #[test]
    fn test_quiet_hours_same_day_window() {
        let quiet = QuietHours {
            enabled: true,
            start: "13:00".to_string(),
            end: "14:30".to_string(),
        };
        assert!(quiet.contains(at(14, 0)));
        assert!(!quiet.contains(at(15, 0)));
    }

    #[test]
    fn test_quiet_hours_disabled_or_malformed() {
        assert!(!QuietHours::default().contains(at(23, 0)));
        let broken = QuietHours {
            enabled: true,
            start: "late".to_string(),
            end: "08:00".to_string(),
        };
        assert!(!broken.contains(at(23, 0)));
    }

    #[test]
    fn test_partial_preferences_keep_defaults() {
        let prefs: NotificationPreferences =
            serde_json::from_value(json!({"sms": true, "quietHours": {"enabled": true}})).unwrap();
        assert!(prefs.sms);
        assert!(prefs.email);
        assert!(prefs.quiet_hours.enabled);
        assert_eq!(prefs.quiet_hours.start, "22:00");
        assert!(!prefs.category_enabled("marketing"));
        assert!(prefs.category_enabled("payments"));
    }

    #[test]
    fn test_toast_expiry() {
        let created_at = Utc::now();
        let toast = Toast {
            id: 1,
            title: "t".to_string(),
            message: "m".to_string(),
            priority: Priority::High,
            duration_ms: 5000,
            created_at,
        };
        assert!(!toast.is_expired(created_at + chrono::Duration::milliseconds(4999)));
        assert!(toast.is_expired(created_at + chrono::Duration::milliseconds(5000)));

        let sticky = Toast { duration_ms: 0, ..toast };
        assert!(!sticky.is_expired(created_at + chrono::Duration::days(3)));
    }
}
