//! Local UI and session preferences. Nothing here talks to the backend.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{
    storage_keys, DASHBOARD_COLUMNS_RANGE, HEADER_HEIGHT_RANGE, MAX_ERROR_LOG,
    MAX_NAVIGATION_HISTORY, MAX_RECENT_COMMANDS, MAX_RECENT_SEARCHES, SIDEBAR_WIDTH_RANGE,
};
use crate::models::{
    Accessibility, Alert, Breadcrumb, DashboardSettings, DashboardWidget, Density, FontSize,
    KeyboardShortcuts, LayoutOptions, Overlay, PerformanceOptions, RecentCommand, ScreenSize,
    Theme, TourState, UiErrorEntry, UserPreferences, ViewPreferences,
};
use crate::persist::Persistable;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSearch {
    pub query: String,
    pub results: Vec<Value>,
    pub is_open: bool,
    pub loading: bool,
    pub recent_searches: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPalette {
    pub is_open: bool,
    pub query: String,
    pub results: Vec<Value>,
    pub recent_commands: Vec<RecentCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub sidebar_open: bool,
    pub sidebar_collapsed: bool,
    pub sidebar_width: u32,
    pub header_height: u32,
    pub screen_size: ScreenSize,

    pub theme: Theme,
    pub color_scheme: String,
    pub font_size: FontSize,
    pub density: Density,

    pub active_route: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub navigation_history: Vec<String>,

    pub modals: BTreeMap<String, Overlay>,
    pub active_modal: Option<String>,
    pub modal_stack: Vec<String>,
    pub drawers: BTreeMap<String, Overlay>,
    pub active_drawer: Option<String>,

    pub global_loading: bool,
    pub page_loading: bool,
    pub component_loading: BTreeSet<String>,

    pub alerts: Vec<Alert>,
    pub alert_counter: u64,

    pub global_search: GlobalSearch,
    pub global_filters: Map<String, Value>,
    pub view_preferences: ViewPreferences,
    pub keyboard_shortcuts: KeyboardShortcuts,
    pub accessibility: Accessibility,
    pub performance: PerformanceOptions,
    pub user_preferences: UserPreferences,
    pub layout: LayoutOptions,
    pub dashboard: DashboardSettings,
    pub tour: TourState,
    pub command_palette: CommandPalette,

    pub scroll_positions: BTreeMap<String, f64>,
    pub window_focused: bool,
    pub is_online: bool,
    pub feature_flags: BTreeMap<String, bool>,
    pub errors: Vec<UiErrorEntry>,
    pub error_counter: u64,
    pub debug_mode: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            sidebar_open: true,
            sidebar_collapsed: false,
            sidebar_width: 256,
            header_height: 64,
            screen_size: ScreenSize::default(),
            theme: Theme::default(),
            color_scheme: "blue".to_string(),
            font_size: FontSize::default(),
            density: Density::default(),
            active_route: "/".to_string(),
            breadcrumbs: Vec::new(),
            navigation_history: Vec::new(),
            modals: BTreeMap::new(),
            active_modal: None,
            modal_stack: Vec::new(),
            drawers: BTreeMap::new(),
            active_drawer: None,
            global_loading: false,
            page_loading: false,
            component_loading: BTreeSet::new(),
            alerts: Vec::new(),
            alert_counter: 0,
            global_search: GlobalSearch::default(),
            global_filters: Map::new(),
            view_preferences: ViewPreferences::default(),
            keyboard_shortcuts: KeyboardShortcuts::default(),
            accessibility: Accessibility::default(),
            performance: PerformanceOptions::default(),
            user_preferences: UserPreferences::default(),
            layout: LayoutOptions::default(),
            dashboard: DashboardSettings::default(),
            tour: TourState::default(),
            command_palette: CommandPalette::default(),
            scroll_positions: BTreeMap::new(),
            window_focused: true,
            is_online: true,
            feature_flags: BTreeMap::new(),
            errors: Vec::new(),
            error_counter: 0,
            debug_mode: false,
        }
    }
}

impl UiState {
    pub fn is_mobile(&self) -> bool {
        self.screen_size == ScreenSize::Mobile
    }

    pub fn is_tablet(&self) -> bool {
        self.screen_size == ScreenSize::Tablet
    }
}

/// Persisted subset of the UI store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiSnapshot {
    pub sidebar_collapsed: bool,
    pub sidebar_width: u32,
    pub theme: Theme,
    pub color_scheme: String,
    pub font_size: FontSize,
    pub density: Density,
    pub view_preferences: ViewPreferences,
    pub keyboard_shortcuts: KeyboardShortcuts,
    pub accessibility: Accessibility,
    pub performance: PerformanceOptions,
    pub user_preferences: UserPreferences,
    pub layout: LayoutOptions,
    pub dashboard: DashboardSettings,
    pub tour: TourState,
    pub recent_searches: Vec<String>,
    pub recent_commands: Vec<RecentCommand>,
}

impl Default for UiSnapshot {
    fn default() -> Self {
        UiSnapshot::from(&UiState::default())
    }
}

impl From<&UiState> for UiSnapshot {
    fn from(state: &UiState) -> Self {
        Self {
            sidebar_collapsed: state.sidebar_collapsed,
            sidebar_width: state.sidebar_width,
            theme: state.theme,
            color_scheme: state.color_scheme.clone(),
            font_size: state.font_size,
            density: state.density,
            view_preferences: state.view_preferences.clone(),
            keyboard_shortcuts: state.keyboard_shortcuts.clone(),
            accessibility: state.accessibility.clone(),
            performance: state.performance.clone(),
            user_preferences: state.user_preferences.clone(),
            layout: state.layout.clone(),
            dashboard: state.dashboard.clone(),
            tour: state.tour.clone(),
            recent_searches: state.global_search.recent_searches.clone(),
            recent_commands: state.command_palette.recent_commands.clone(),
        }
    }
}

fn clamp(value: u32, (min, max): (u32, u32)) -> u32 {
    value.clamp(min, max)
}

fn merge_object<T: Serialize + serde::de::DeserializeOwned>(
    current: &T,
    patch: &Map<String, Value>,
) -> Result<T, serde_json::Error> {
    let mut value = serde_json::to_value(current)?;
    if let Value::Object(map) = &mut value {
        for (key, member) in patch {
            map.insert(key.clone(), member.clone());
        }
    }
    serde_json::from_value(value)
}

#[derive(Default)]
pub struct UiStore {
    state: RwLock<UiState>,
}

impl UiStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> UiState {
        self.state.read().clone()
    }

    pub fn read<T>(&self, f: impl FnOnce(&UiState) -> T) -> T {
        f(&self.state.read())
    }

    fn update(&self, f: impl FnOnce(&mut UiState)) {
        f(&mut self.state.write());
    }

    // ===== Layout =====

    pub fn toggle_sidebar(&self) {
        self.update(|s| s.sidebar_open = !s.sidebar_open);
    }

    pub fn set_sidebar_open(&self, open: bool) {
        self.update(|s| s.sidebar_open = open);
    }

    pub fn toggle_sidebar_collapsed(&self) {
        self.update(|s| s.sidebar_collapsed = !s.sidebar_collapsed);
    }

    pub fn set_sidebar_width(&self, width: u32) {
        self.update(|s| s.sidebar_width = clamp(width, SIDEBAR_WIDTH_RANGE));
    }

    pub fn set_header_height(&self, height: u32) {
        self.update(|s| s.header_height = clamp(height, HEADER_HEIGHT_RANGE));
    }

    /// Switching to mobile closes the sidebar.
    pub fn set_screen_size(&self, size: ScreenSize) {
        self.update(|s| {
            s.screen_size = size;
            if size == ScreenSize::Mobile {
                s.sidebar_open = false;
            }
        });
    }

    pub fn update_screen_size(&self, width: u32) {
        self.set_screen_size(ScreenSize::from_width(width));
    }

    // ===== Appearance =====

    pub fn set_theme(&self, theme: Theme) {
        self.update(|s| s.theme = theme);
    }

    pub fn set_color_scheme(&self, scheme: impl Into<String>) {
        let scheme = scheme.into();
        self.update(|s| s.color_scheme = scheme);
    }

    pub fn set_font_size(&self, size: FontSize) {
        self.update(|s| s.font_size = size);
    }

    pub fn set_density(&self, density: Density) {
        self.update(|s| s.density = density);
    }

    // ===== Navigation =====

    /// Record a route change. Consecutive duplicates are not added to the
    /// history, which keeps the most recent entries only.
    pub fn set_active_route(&self, route: &str) {
        self.update(|s| {
            s.active_route = route.to_string();
            if s.navigation_history.last().map(String::as_str) != Some(route) {
                s.navigation_history.push(route.to_string());
                let overflow = s.navigation_history.len().saturating_sub(MAX_NAVIGATION_HISTORY);
                s.navigation_history.drain(..overflow);
            }
        });
    }

    pub fn set_breadcrumbs(&self, breadcrumbs: Vec<Breadcrumb>) {
        self.update(|s| s.breadcrumbs = breadcrumbs);
    }

    /// The route before the current one, if any.
    pub fn previous_route(&self) -> Option<String> {
        self.read(|s| {
            let history = &s.navigation_history;
            (history.len() > 1).then(|| history[history.len() - 2].clone())
        })
    }

    // ===== Modals and drawers =====

    pub fn open_modal(&self, id: &str, props: Map<String, Value>) {
        self.update(|s| {
            s.modals.insert(id.to_string(), Overlay { is_open: true, props });
            s.active_modal = Some(id.to_string());
            s.modal_stack.push(id.to_string());
        });
    }

    /// Close `id`; the topmost remaining modal becomes active.
    pub fn close_modal(&self, id: &str) {
        self.update(|s| {
            if let Some(modal) = s.modals.get_mut(id) {
                modal.is_open = false;
            }
            s.modal_stack.retain(|m| m != id);
            s.active_modal = s.modal_stack.last().cloned();
        });
    }

    pub fn close_all_modals(&self) {
        self.update(|s| {
            for modal in s.modals.values_mut() {
                modal.is_open = false;
            }
            s.active_modal = None;
            s.modal_stack.clear();
        });
    }

    pub fn update_modal_props(&self, id: &str, props: Map<String, Value>) {
        self.update(|s| {
            if let Some(modal) = s.modals.get_mut(id) {
                modal.props.extend(props);
            }
        });
    }

    pub fn is_modal_open(&self, id: &str) -> bool {
        self.read(|s| s.modals.get(id).is_some_and(|m| m.is_open))
    }

    pub fn open_drawer(&self, id: &str, props: Map<String, Value>) {
        self.update(|s| {
            s.drawers.insert(id.to_string(), Overlay { is_open: true, props });
            s.active_drawer = Some(id.to_string());
        });
    }

    pub fn close_drawer(&self, id: &str) {
        self.update(|s| {
            if let Some(drawer) = s.drawers.get_mut(id) {
                drawer.is_open = false;
            }
            if s.active_drawer.as_deref() == Some(id) {
                s.active_drawer = None;
            }
        });
    }

    pub fn toggle_drawer(&self, id: &str, props: Map<String, Value>) {
        if self.is_drawer_open(id) {
            self.close_drawer(id);
        } else {
            self.open_drawer(id, props);
        }
    }

    pub fn is_drawer_open(&self, id: &str) -> bool {
        self.read(|s| s.drawers.get(id).is_some_and(|d| d.is_open))
    }

    // ===== Loading =====

    pub fn set_global_loading(&self, loading: bool) {
        self.update(|s| s.global_loading = loading);
    }

    pub fn set_page_loading(&self, loading: bool) {
        self.update(|s| s.page_loading = loading);
    }

    pub fn set_component_loading(&self, component: &str, loading: bool) {
        self.update(|s| {
            if loading {
                s.component_loading.insert(component.to_string());
            } else {
                s.component_loading.remove(component);
            }
        });
    }

    pub fn is_component_loading(&self, component: &str) -> bool {
        self.read(|s| s.component_loading.contains(component))
    }

    // ===== Alerts =====

    /// Prepend an alert and return its id. A zero duration keeps it until
    /// removed.
    pub fn add_alert(
        &self,
        kind: &str,
        title: Option<String>,
        message: &str,
        duration_ms: u64,
    ) -> u64 {
        let mut state = self.state.write();
        let id = state.alert_counter + 1;
        state.alert_counter = id;
        state.alerts.insert(
            0,
            Alert {
                id,
                kind: kind.to_string(),
                title,
                message: message.to_string(),
                duration_ms,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn remove_alert(&self, id: u64) {
        self.update(|s| s.alerts.retain(|a| a.id != id));
    }

    pub fn clear_alerts(&self) {
        self.update(|s| s.alerts.clear());
    }

    pub fn prune_expired_alerts(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.write();
        let before = state.alerts.len();
        state.alerts.retain(|a| !a.is_expired(now));
        before - state.alerts.len()
    }

    // ===== Search =====

    pub fn set_search_query(&self, query: &str) {
        self.update(|s| s.global_search.query = query.to_string());
    }

    pub fn set_search_results(&self, results: Vec<Value>) {
        self.update(|s| s.global_search.results = results);
    }

    pub fn set_search_open(&self, open: bool) {
        self.update(|s| s.global_search.is_open = open);
    }

    pub fn set_search_loading(&self, loading: bool) {
        self.update(|s| s.global_search.loading = loading);
    }

    /// Remember a query at the head of the recent list. Empty or already
    /// remembered queries are ignored.
    pub fn add_recent_search(&self, query: &str) {
        self.update(|s| {
            let recent = &mut s.global_search.recent_searches;
            if query.is_empty() || recent.iter().any(|q| q == query) {
                return;
            }
            recent.insert(0, query.to_string());
            recent.truncate(MAX_RECENT_SEARCHES);
        });
    }

    pub fn clear_recent_searches(&self) {
        self.update(|s| s.global_search.recent_searches.clear());
    }

    pub fn set_global_filter(&self, key: &str, value: Value) {
        self.update(|s| {
            s.global_filters.insert(key.to_string(), value);
        });
    }

    pub fn remove_global_filter(&self, key: &str) {
        self.update(|s| {
            s.global_filters.remove(key);
        });
    }

    pub fn clear_global_filters(&self) {
        self.update(|s| s.global_filters.clear());
    }

    // ===== Preferences =====

    pub fn update_view_preferences(&self, patch: &Map<String, Value>) -> Result<(), serde_json::Error> {
        let merged = merge_object(&self.read(|s| s.view_preferences.clone()), patch)?;
        self.update(|s| s.view_preferences = merged);
        Ok(())
    }

    pub fn set_keyboard_shortcuts_enabled(&self, enabled: bool) {
        self.update(|s| s.keyboard_shortcuts.enabled = enabled);
    }

    pub fn set_custom_shortcut(&self, key: &str, action: &str) {
        self.update(|s| {
            s.keyboard_shortcuts
                .custom_shortcuts
                .insert(key.to_string(), action.to_string());
        });
    }

    pub fn remove_custom_shortcut(&self, key: &str) {
        self.update(|s| {
            s.keyboard_shortcuts.custom_shortcuts.remove(key);
        });
    }

    pub fn update_accessibility(&self, patch: &Map<String, Value>) -> Result<(), serde_json::Error> {
        let merged = merge_object(&self.read(|s| s.accessibility.clone()), patch)?;
        self.update(|s| s.accessibility = merged);
        Ok(())
    }

    pub fn update_performance(&self, patch: &Map<String, Value>) -> Result<(), serde_json::Error> {
        let merged = merge_object(&self.read(|s| s.performance.clone()), patch)?;
        self.update(|s| s.performance = merged);
        Ok(())
    }

    pub fn update_user_preferences(&self, patch: &Map<String, Value>) -> Result<(), serde_json::Error> {
        let merged = merge_object(&self.read(|s| s.user_preferences.clone()), patch)?;
        self.update(|s| s.user_preferences = merged);
        Ok(())
    }

    pub fn update_layout(&self, patch: &Map<String, Value>) -> Result<(), serde_json::Error> {
        let merged = merge_object(&self.read(|s| s.layout.clone()), patch)?;
        self.update(|s| s.layout = merged);
        Ok(())
    }

    // ===== Dashboard =====

    pub fn set_dashboard_widgets(&self, widgets: Vec<DashboardWidget>) {
        self.update(|s| s.dashboard.widgets = widgets);
    }

    pub fn add_dashboard_widget(&self, widget: DashboardWidget) {
        self.update(|s| s.dashboard.widgets.push(widget));
    }

    pub fn remove_dashboard_widget(&self, id: &str) {
        self.update(|s| s.dashboard.widgets.retain(|w| w.id != id));
    }

    /// Shallow-merge `patch` into the widget's fields; unknown ids are ignored.
    pub fn update_dashboard_widget(
        &self,
        id: &str,
        patch: &Map<String, Value>,
    ) -> Result<(), serde_json::Error> {
        let Some(current) = self.read(|s| s.dashboard.widgets.iter().find(|w| w.id == id).cloned())
        else {
            return Ok(());
        };
        let merged: DashboardWidget = merge_object(&current, patch)?;
        self.update(|s| {
            if let Some(slot) = s.dashboard.widgets.iter_mut().find(|w| w.id == id) {
                *slot = merged;
            }
        });
        Ok(())
    }

    pub fn set_dashboard_layout(&self, layout: &str) {
        self.update(|s| s.dashboard.layout = layout.to_string());
    }

    pub fn set_dashboard_columns(&self, columns: u32) {
        self.update(|s| s.dashboard.columns = clamp(columns, DASHBOARD_COLUMNS_RANGE));
    }

    // ===== Tour =====

    pub fn start_tour(&self) {
        self.update(|s| {
            s.tour.active = true;
            s.tour.current_step = 0;
        });
    }

    pub fn next_tour_step(&self) {
        self.update(|s| s.tour.current_step += 1);
    }

    pub fn previous_tour_step(&self) {
        self.update(|s| s.tour.current_step = s.tour.current_step.saturating_sub(1));
    }

    pub fn set_tour_step(&self, step: u32) {
        self.update(|s| s.tour.current_step = step);
    }

    pub fn complete_tour(&self) {
        self.update(|s| {
            s.tour.active = false;
            s.tour.completed = true;
        });
    }

    pub fn skip_tour(&self) {
        self.update(|s| {
            s.tour.active = false;
            s.tour.skipped = true;
        });
    }

    pub fn reset_tour(&self) {
        self.update(|s| s.tour = TourState::default());
    }

    // ===== Command palette =====

    pub fn open_command_palette(&self) {
        self.update(|s| s.command_palette.is_open = true);
    }

    pub fn close_command_palette(&self) {
        self.update(|s| {
            s.command_palette.is_open = false;
            s.command_palette.query.clear();
            s.command_palette.results.clear();
        });
    }

    pub fn set_command_query(&self, query: &str) {
        self.update(|s| s.command_palette.query = query.to_string());
    }

    pub fn add_recent_command(&self, command: RecentCommand) {
        self.update(|s| {
            let recent = &mut s.command_palette.recent_commands;
            if recent.iter().any(|c| c.id == command.id) {
                return;
            }
            recent.insert(0, command);
            recent.truncate(MAX_RECENT_COMMANDS);
        });
    }

    // ===== Session =====

    pub fn save_scroll_position(&self, key: &str, position: f64) {
        self.update(|s| {
            s.scroll_positions.insert(key.to_string(), position);
        });
    }

    pub fn scroll_position(&self, key: &str) -> f64 {
        self.read(|s| s.scroll_positions.get(key).copied().unwrap_or(0.0))
    }

    pub fn set_window_focused(&self, focused: bool) {
        self.update(|s| s.window_focused = focused);
    }

    pub fn set_online(&self, online: bool) {
        self.update(|s| s.is_online = online);
    }

    pub fn set_feature_flag(&self, flag: &str, enabled: bool) {
        self.update(|s| {
            s.feature_flags.insert(flag.to_string(), enabled);
        });
    }

    pub fn is_feature_enabled(&self, flag: &str) -> bool {
        self.read(|s| s.feature_flags.get(flag).copied().unwrap_or(false))
    }

    // ===== Error log =====

    /// Append to the error log, keeping the newest entries.
    pub fn add_error(&self, message: &str, source: Option<String>) -> u64 {
        let mut state = self.state.write();
        let id = state.error_counter + 1;
        state.error_counter = id;
        state.errors.push(UiErrorEntry {
            id,
            message: message.to_string(),
            source,
            timestamp: Utc::now(),
        });
        let overflow = state.errors.len().saturating_sub(MAX_ERROR_LOG);
        state.errors.drain(..overflow);
        id
    }

    pub fn remove_error(&self, id: u64) {
        self.update(|s| s.errors.retain(|e| e.id != id));
    }

    pub fn clear_errors(&self) {
        self.update(|s| s.errors.clear());
    }

    pub fn toggle_debug_mode(&self) {
        self.update(|s| s.debug_mode = !s.debug_mode);
    }

    /// Back to defaults, keeping theme, color scheme, user preferences,
    /// accessibility and keyboard shortcuts.
    pub fn reset_ui(&self) {
        self.update(|s| {
            let kept = std::mem::take(s);
            *s = UiState {
                theme: kept.theme,
                color_scheme: kept.color_scheme,
                user_preferences: kept.user_preferences,
                accessibility: kept.accessibility,
                keyboard_shortcuts: kept.keyboard_shortcuts,
                ..UiState::default()
            };
        });
    }
}

impl Persistable for UiStore {
    const STORAGE_KEY: &'static str = storage_keys::UI_STORE;
    type Snapshot = UiSnapshot;

    fn to_persistable(&self) -> UiSnapshot {
        UiSnapshot::from(&*self.state.read())
    }

    fn from_persistable(&self, snapshot: UiSnapshot) {
        self.update(|s| {
            s.sidebar_collapsed = snapshot.sidebar_collapsed;
            s.sidebar_width = clamp(snapshot.sidebar_width, SIDEBAR_WIDTH_RANGE);
            s.theme = snapshot.theme;
            s.color_scheme = snapshot.color_scheme;
            s.font_size = snapshot.font_size;
            s.density = snapshot.density;
            s.view_preferences = snapshot.view_preferences;
            s.keyboard_shortcuts = snapshot.keyboard_shortcuts;
            s.accessibility = snapshot.accessibility;
            s.performance = snapshot.performance;
            s.user_preferences = snapshot.user_preferences;
            s.layout = snapshot.layout;
            s.dashboard = snapshot.dashboard;
            s.tour = snapshot.tour;
            s.global_search.recent_searches = snapshot.recent_searches;
            s.command_palette.recent_commands = snapshot.recent_commands;
        });
    }
}
