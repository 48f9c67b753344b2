use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::SortOrder;
use crate::constants::breakpoints;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenSize {
    Mobile,
    Tablet,
    #[default]
    Desktop,
    Wide,
}

impl ScreenSize {
    pub fn from_width(width: u32) -> Self {
        if width < breakpoints::TABLET {
            ScreenSize::Mobile
        } else if width < breakpoints::DESKTOP {
            ScreenSize::Tablet
        } else if width >= breakpoints::WIDE {
            ScreenSize::Wide
        } else {
            ScreenSize::Desktop
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    Compact,
    #[default]
    Comfortable,
    Spacious,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewPreferences {
    /// `grid`, `list` or `table`
    pub list_view: String,
    pub items_per_page: u32,
    pub sort_by: String,
    pub sort_order: SortOrder,
}

impl Default for ViewPreferences {
    fn default() -> Self {
        Self {
            list_view: "grid".to_string(),
            items_per_page: 20,
            sort_by: "name".to_string(),
            sort_order: SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyboardShortcuts {
    pub enabled: bool,
    pub custom_shortcuts: BTreeMap<String, String>,
}

impl Default for KeyboardShortcuts {
    fn default() -> Self {
        Self {
            enabled: true,
            custom_shortcuts: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Accessibility {
    pub high_contrast: bool,
    pub reduced_motion: bool,
    pub screen_reader: bool,
    pub keyboard_navigation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PerformanceOptions {
    pub enable_animations: bool,
    pub lazy_loading: bool,
    pub virtual_scrolling: bool,
}

impl Default for PerformanceOptions {
    fn default() -> Self {
        Self {
            enable_animations: true,
            lazy_loading: true,
            virtual_scrolling: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserPreferences {
    pub language: String,
    pub timezone: String,
    pub date_format: String,
    pub time_format: String,
    pub currency: String,
    pub number_format: String,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            timezone: "UTC".to_string(),
            date_format: "MM/DD/YYYY".to_string(),
            time_format: "12h".to_string(),
            currency: "USD".to_string(),
            number_format: "US".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutOptions {
    pub show_breadcrumbs: bool,
    pub show_page_title: bool,
    pub show_quick_actions: bool,
    pub compact_header: bool,
    pub sticky_header: bool,
    pub show_footer: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            show_breadcrumbs: true,
            show_page_title: true,
            show_quick_actions: true,
            compact_header: false,
            sticky_header: true,
            show_footer: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardWidget {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardSettings {
    pub widgets: Vec<DashboardWidget>,
    pub layout: String,
    pub columns: u32,
    pub customizable: bool,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            widgets: Vec::new(),
            layout: "grid".to_string(),
            columns: 3,
            customizable: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TourState {
    pub active: bool,
    pub current_step: u32,
    pub completed: bool,
    pub skipped: bool,
}

/// Open/closed state plus props for a modal or drawer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
    pub is_open: bool,
    pub props: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: u64,
    /// `info`, `success`, `warning` or `error`
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message: String,
    /// Zero keeps the alert until it is removed
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.duration_ms > 0
            && now.signed_duration_since(self.created_at).num_milliseconds()
                >= self.duration_ms as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub label: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentCommand {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiErrorEntry {
    pub id: u64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_size_breakpoints() {
        assert_eq!(ScreenSize::from_width(375), ScreenSize::Mobile);
        assert_eq!(ScreenSize::from_width(640), ScreenSize::Tablet);
        assert_eq!(ScreenSize::from_width(1023), ScreenSize::Tablet);
        assert_eq!(ScreenSize::from_width(1024), ScreenSize::Desktop);
        assert_eq!(ScreenSize::from_width(1920), ScreenSize::Wide);
    }

    #[test]
    fn test_theme_from_str() {
        assert_eq!("Dark".parse::<Theme>(), Ok(Theme::Dark));
        assert!("sepia".parse::<Theme>().is_err());
    }
}
