/// Tunables for the background core, optionally overridden from storage
use crate::host::Store;
use crate::storage::{keys, StoreExt};
use serde::{Deserialize, Serialize};

pub const MINUTE_MS: i64 = 60_000;
pub const HOUR_MS: i64 = 3_600_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Period of the flush tick while a tab is tracked.
    pub tick_period_ms: u32,
    /// In-process interval for the expired-block sweep.
    pub block_sweep_period_ms: u32,
    /// Period of the persistent `blockCleanup` alarm.
    pub block_cleanup_alarm_minutes: f64,
    pub social_media_threshold_ms: i64,
    pub productive_threshold_ms: i64,
    /// Website goal progress at which the warning fires.
    pub website_warning_percent: f64,
    pub message_retry_attempts: u32,
    pub message_retry_delay_ms: u32,
    pub visit_log_cap: usize,
    /// Expiry stamped on focus-mode redirects.
    pub focus_redirect_window_ms: i64,
    /// Cached AI classifications older than this are ignored.
    pub ai_cache_ttl_ms: i64,
    pub dashboard_path: String,
    pub blocked_page_path: String,
    pub notification_icon: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tick_period_ms: 1000,
            block_sweep_period_ms: 60_000,
            block_cleanup_alarm_minutes: 1.0,
            social_media_threshold_ms: 30 * MINUTE_MS,
            productive_threshold_ms: 60 * MINUTE_MS,
            website_warning_percent: 80.0,
            message_retry_attempts: 3,
            message_retry_delay_ms: 1000,
            visit_log_cap: 1000,
            focus_redirect_window_ms: 24 * HOUR_MS,
            ai_cache_ttl_ms: 30 * MINUTE_MS,
            dashboard_path: "dashboard.html".to_string(),
            blocked_page_path: "blocked.html".to_string(),
            notification_icon: "icons/icon128.png".to_string(),
        }
    }
}

impl Config {
    /// Load overrides from the `config` key; a missing or malformed entry
    /// falls back to defaults.
    pub async fn load<S: Store>(store: &S) -> Config {
        match store.load_or_default::<Config>(keys::CONFIG).await {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring stored config: {}", e);
                Config::default()
            }
        }
    }
}
