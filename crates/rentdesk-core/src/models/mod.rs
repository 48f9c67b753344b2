pub mod notification;
pub mod property;
pub mod ui;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Debug;

pub use notification::{
    ConnectionStatus, DesktopPermission, Notification, NotificationAnalytics,
    NotificationFilters, NotificationFiltersPatch, NotificationPreferences, NotificationStats,
    Priority, QuietHours, Toast,
};
pub use property::{
    LocationDetails, MapCenter, PriceRange, Property, PropertyAnalytics, PropertyDimensions,
    PropertyDraft, PropertyFilters, PropertyFiltersPatch, PropertyForm, PropertyLocation,
    PropertyStats, PropertyUpdate, SortKey, SortOrder, Tenant, Unit, ViewMode,
};
pub use ui::{
    Accessibility, Alert, Breadcrumb, DashboardSettings, DashboardWidget, Density, FontSize,
    KeyboardShortcuts, LayoutOptions, Overlay, PerformanceOptions, RecentCommand, ScreenSize,
    Theme, TourState, UiErrorEntry, UserPreferences, ViewPreferences,
};

/// A record tracked by a store. Identity is the server-assigned `id`.
pub trait Entity: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;
}

/// Accepts ids sent either as JSON strings or numbers.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
}

/// Numbers may arrive as JSON numbers or as numeric strings (`"1500.00"` from
/// DECIMAL columns). Null and blank strings read as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawNumber::Number(n)) => Ok(Some(n)),
        Some(RawNumber::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(RawNumber::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a number, got \"{}\"", text))),
    }
}

fn to_count(value: f64) -> Option<u32> {
    (value.is_finite() && value >= 0.0).then(|| value.trunc().min(u32::MAX as f64) as u32)
}

pub(crate) fn deserialize_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.unwrap_or_default())
}

pub(crate) fn deserialize_opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_number(deserializer)
}

/// Counts; negative or non-finite values read as absent.
pub(crate) fn deserialize_opt_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.and_then(to_count))
}

pub(crate) fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_opt_count(deserializer)?.unwrap_or_default())
}

/// Filter values equal to `all` (or empty) match every entity.
pub(crate) fn is_wildcard(value: &str) -> bool {
    value.is_empty() || value == "all"
}
