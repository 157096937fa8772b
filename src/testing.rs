/// In-memory host for unit tests
use crate::error::{Error, Result};
use crate::host::{AlarmSpec, Alarms, Clock, Notifier, RuleEngine, Store, Tabs, Timer, Timers};
use crate::notify::Notification;
use crate::rules::RedirectRule;
use crate::tab_data::{TabInfo, TabQuery};
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// 2024-05-01T10:00:00Z
pub const START_MS: i64 = 1_714_557_600_000;

pub struct FakeHost {
    store: RefCell<Map<String, Value>>,
    rules: RefCell<Vec<RedirectRule>>,
    fail_rules: Cell<bool>,
    notifications: RefCell<Vec<Notification>>,
    fail_notifications: Cell<bool>,
    tabs: RefCell<Vec<TabInfo>>,
    redirects: RefCell<Vec<(i32, String)>>,
    messages: RefCell<Vec<(i32, Value)>>,
    message_failures: Cell<u32>,
    alarms: RefCell<BTreeMap<String, AlarmSpec>>,
    timers: RefCell<BTreeMap<Timer, (u64, bool)>>,
    sleeps: RefCell<Vec<u32>>,
    now_ms: Cell<i64>,
    yielding: Cell<bool>,
}

impl FakeHost {
    pub fn new() -> Self {
        FakeHost {
            store: RefCell::new(Map::new()),
            rules: RefCell::new(Vec::new()),
            fail_rules: Cell::new(false),
            notifications: RefCell::new(Vec::new()),
            fail_notifications: Cell::new(false),
            tabs: RefCell::new(Vec::new()),
            redirects: RefCell::new(Vec::new()),
            messages: RefCell::new(Vec::new()),
            message_failures: Cell::new(0),
            alarms: RefCell::new(BTreeMap::new()),
            timers: RefCell::new(BTreeMap::new()),
            sleeps: RefCell::new(Vec::new()),
            now_ms: Cell::new(START_MS),
            yielding: Cell::new(false),
        }
    }

    pub fn put(&self, key: &str, value: Value) {
        self.store.borrow_mut().insert(key.to_string(), value);
    }

    pub fn peek(&self, key: &str) -> Option<Value> {
        self.store.borrow().get(key).cloned()
    }

    pub fn rules(&self) -> Vec<RedirectRule> {
        self.rules.borrow().clone()
    }

    pub fn fail_rules(&self, fail: bool) {
        self.fail_rules.set(fail);
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.borrow().clone()
    }

    pub fn fail_notifications(&self, fail: bool) {
        self.fail_notifications.set(fail);
    }

    pub fn set_tabs(&self, tabs: Vec<TabInfo>) {
        *self.tabs.borrow_mut() = tabs;
    }

    pub fn redirects(&self) -> Vec<(i32, String)> {
        self.redirects.borrow().clone()
    }

    pub fn messages(&self) -> Vec<(i32, Value)> {
        self.messages.borrow().clone()
    }

    /// The next `count` messages fail as if no content script listened
    pub fn fail_messages(&self, count: u32) {
        self.message_failures.set(count);
    }

    pub fn alarm(&self, name: &str) -> Option<AlarmSpec> {
        self.alarms.borrow().get(name).cloned()
    }

    pub fn timer(&self, timer: Timer) -> Option<(u64, bool)> {
        self.timers.borrow().get(&timer).copied()
    }

    pub fn sleeps(&self) -> Vec<u32> {
        self.sleeps.borrow().clone()
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }

    pub fn set_now_ms(&self, ms: i64) {
        self.now_ms.set(ms);
    }

    /// Suspend on every storage read and write, like `chrome.storage` does
    pub fn set_yielding(&self, yielding: bool) {
        self.yielding.set(yielding);
    }

    async fn storage_round_trip(&self) {
        if self.yielding.get() {
            tokio::task::yield_now().await;
        }
    }
}

impl Store for FakeHost {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.storage_round_trip().await;
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.storage_round_trip().await;
        self.put(key, value);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        let mut store = self.store.borrow_mut();
        for key in keys {
            store.remove(key);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.store.borrow().keys().cloned().collect())
    }
}

impl RuleEngine for FakeHost {
    async fn dynamic_rule_ids(&self) -> Result<Vec<u32>> {
        Ok(self.rules.borrow().iter().map(|rule| rule.id).collect())
    }

    async fn update_dynamic_rules(&self, remove_rule_ids: Vec<u32>, add_rules: Vec<RedirectRule>) -> Result<()> {
        if self.fail_rules.get() {
            return Err(Error::Rules("rule engine unavailable".to_string()));
        }

        let mut next: Vec<RedirectRule> = self
            .rules
            .borrow()
            .iter()
            .filter(|rule| !remove_rule_ids.contains(&rule.id))
            .cloned()
            .collect();
        for rule in add_rules {
            if next.iter().any(|existing| existing.id == rule.id) {
                return Err(Error::Rules(format!("Rule with id {} already exists", rule.id)));
            }
            next.push(rule);
        }
        *self.rules.borrow_mut() = next;
        Ok(())
    }
}

impl Notifier for FakeHost {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        if self.fail_notifications.get() {
            return Err(Error::Notification("notifications unavailable".to_string()));
        }
        self.notifications.borrow_mut().push(notification.clone());
        Ok(())
    }
}

impl Tabs for FakeHost {
    async fn get_tab(&self, tab_id: i32) -> Result<Option<TabInfo>> {
        Ok(self.tabs.borrow().iter().find(|tab| tab.id == tab_id).cloned())
    }

    async fn query_tabs(&self, query: &TabQuery) -> Result<Vec<TabInfo>> {
        Ok(self
            .tabs
            .borrow()
            .iter()
            .filter(|tab| query.active.is_none_or(|active| tab.active == active))
            .filter(|tab| query.window_id.is_none_or(|window_id| tab.window_id == window_id))
            .cloned()
            .collect())
    }

    async fn redirect_tab(&self, tab_id: i32, url: &str) -> Result<()> {
        let mut tabs = self.tabs.borrow_mut();
        let tab = tabs
            .iter_mut()
            .find(|tab| tab.id == tab_id)
            .ok_or_else(|| Error::Tabs(format!("No tab with id: {}", tab_id)))?;
        tab.url = url.to_string();
        self.redirects.borrow_mut().push((tab_id, url.to_string()));
        Ok(())
    }

    async fn send_message(&self, tab_id: i32, message: &Value) -> Result<()> {
        let failures = self.message_failures.get();
        if failures > 0 {
            self.message_failures.set(failures - 1);
            return Err(Error::Tabs("Receiving end does not exist".to_string()));
        }
        self.messages.borrow_mut().push((tab_id, message.clone()));
        Ok(())
    }

    fn extension_url(&self, path: &str) -> String {
        format!("chrome-extension://test/{}", path.trim_start_matches('/'))
    }
}

impl Alarms for FakeHost {
    async fn create_alarm(&self, name: &str, alarm: &AlarmSpec) -> Result<()> {
        self.alarms.borrow_mut().insert(name.to_string(), alarm.clone());
        Ok(())
    }

    async fn clear_alarm(&self, name: &str) -> Result<()> {
        self.alarms.borrow_mut().remove(name);
        Ok(())
    }
}

impl Timers for FakeHost {
    fn set_timer(&self, timer: Timer, delay_ms: u64, repeat: bool) {
        self.timers.borrow_mut().insert(timer, (delay_ms, repeat));
    }

    fn clear_timer(&self, timer: Timer) {
        self.timers.borrow_mut().remove(&timer);
    }

    async fn sleep(&self, ms: u32) {
        self.sleeps.borrow_mut().push(ms);
        self.advance_ms(ms as i64);
    }
}

impl Clock for FakeHost {
    fn now(&self) -> DateTime<FixedOffset> {
        DateTime::from_timestamp_millis(self.now_ms.get())
            .expect("fake clock in range")
            .fixed_offset()
    }
}
