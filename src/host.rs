/// The seams between the background core and the browser
///
/// Everything the core needs from the outside world goes through one of
/// these traits. The extension build implements them over `chrome.*` (see
/// `chrome.rs`); tests use an in-memory fake. The runtime is a single
/// thread, so none of the futures need to be `Send`.
use crate::error::Result;
use crate::notify::Notification;
use crate::rules::RedirectRule;
use crate::tab_data::{TabInfo, TabQuery};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `chrome.storage.local`: whole-value reads and writes, no transactions
#[allow(async_fn_in_trait)]
pub trait Store {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn remove(&self, keys: &[String]) -> Result<()>;
    async fn keys(&self) -> Result<Vec<String>>;
}

/// `chrome.declarativeNetRequest` dynamic rules
#[allow(async_fn_in_trait)]
pub trait RuleEngine {
    async fn dynamic_rule_ids(&self) -> Result<Vec<u32>>;

    /// Removes and adds in one batch; the engine applies it atomically.
    async fn update_dynamic_rules(
        &self,
        remove_rule_ids: Vec<u32>,
        add_rules: Vec<RedirectRule>,
    ) -> Result<()>;
}

#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

#[allow(async_fn_in_trait)]
pub trait Tabs {
    async fn get_tab(&self, tab_id: i32) -> Result<Option<TabInfo>>;
    async fn query_tabs(&self, query: &TabQuery) -> Result<Vec<TabInfo>>;
    async fn redirect_tab(&self, tab_id: i32, url: &str) -> Result<()>;
    async fn send_message(&self, tab_id: i32, message: &Value) -> Result<()>;

    /// Absolute URL of a page bundled with the extension
    fn extension_url(&self, path: &str) -> String;
}

/// `chrome.alarms`: survives the service worker being suspended
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_in_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_in_minutes: Option<f64>,
}

#[allow(async_fn_in_trait)]
pub trait Alarms {
    async fn create_alarm(&self, name: &str, alarm: &AlarmSpec) -> Result<()>;
    async fn clear_alarm(&self, name: &str) -> Result<()>;
}

/// In-process timers. These die with the service worker, which is why the
/// block sweep is backed by an alarm as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Timer {
    Tick,
    Midnight,
    BlockSweep,
}

impl Timer {
    pub fn name(self) -> &'static str {
        match self {
            Timer::Tick => "tick",
            Timer::Midnight => "midnight",
            Timer::BlockSweep => "blockSweep",
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait Timers {
    /// Arm (or re-arm) a named timer. When it fires the host calls back into
    /// `Background::on_timer`.
    fn set_timer(&self, timer: Timer, delay_ms: u64, repeat: bool);
    fn clear_timer(&self, timer: Timer);
    async fn sleep(&self, ms: u32);
}

pub trait Clock {
    /// Current local time, carrying the local UTC offset
    fn now(&self) -> DateTime<FixedOffset>;

    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }

    /// Local calendar day as `YYYY-MM-DD`
    fn today(&self) -> String {
        day_key(&self.now())
    }
}

pub fn day_key(at: &DateTime<FixedOffset>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// Everything the background core needs
pub trait Host: Store + RuleEngine + Notifier + Tabs + Alarms + Timers + Clock {}

impl<T> Host for T where T: Store + RuleEngine + Notifier + Tabs + Alarms + Timers + Clock {}
