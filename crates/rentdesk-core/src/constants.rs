//! Application-wide constants
//!
//! Centralized location for storage keys, endpoint defaults and the
//! tuning values shared by the stores.

use std::time::Duration;

/// Default REST API base URL
pub const DEFAULT_API_BASE: &str = "http://localhost:5000/api";

/// Environment variable overriding the API base URL
pub const API_BASE_ENV: &str = "RENTDESK_API_URL";

/// Environment variable enabling file logging
pub const LOG_FILE_ENV: &str = "RENTDESK_LOG_FILE";

/// Cached list pages and entities are served for this long (5 minutes)
pub const DEFAULT_CACHE_EXPIRY: Duration = Duration::from_secs(5 * 60);

/// How often the background sweeper drops expired cache entries
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Request timeout for the HTTP transport
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Version written into every persisted snapshot envelope.
/// Snapshots with a different version are discarded on restore.
pub const SNAPSHOT_VERSION: u32 = 0;

/// Keys in the persisted key-value storage
pub mod storage_keys {
    pub const TOKEN: &str = "token";
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const NOTIFICATION_STORE: &str = "notification-store";
    pub const PROPERTY_STORE: &str = "property-store";
    pub const UI_STORE: &str = "ui-store";
}

// Toast durations (milliseconds, 0 = sticky until dismissed)
pub const HIGH_PRIORITY_TOAST_MS: u64 = 5000;
pub const URGENT_TOAST_MS: u64 = 0;

// UI store bounds
pub const SIDEBAR_WIDTH_RANGE: (u32, u32) = (200, 400);
pub const HEADER_HEIGHT_RANGE: (u32, u32) = (48, 80);
pub const DASHBOARD_COLUMNS_RANGE: (u32, u32) = (1, 6);
pub const MAX_NAVIGATION_HISTORY: usize = 50;
pub const MAX_RECENT_SEARCHES: usize = 10;
pub const MAX_RECENT_COMMANDS: usize = 10;
pub const MAX_ERROR_LOG: usize = 50;

/// Screen width breakpoints in pixels
pub mod breakpoints {
    pub const TABLET: u32 = 640;
    pub const DESKTOP: u32 = 1024;
    pub const WIDE: u32 = 1920;
}
