/// `chrome.*` implementation of the host traits, over the `background.js` bridge
use crate::error::{Error, Result};
use crate::host::{AlarmSpec, Alarms, Clock, Notifier, RuleEngine, Store, Tabs, Timer, Timers};
use crate::notify::Notification;
use crate::rules::RedirectRule;
use crate::tab_data::{TabInfo, TabQuery};
use chrono::{DateTime, FixedOffset, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

// Import JS bridge functions
#[wasm_bindgen(module = "/background.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getStorage(key: &str) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(key: &str, value: JsValue) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn removeStorage(keys: JsValue) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn getStorageKeys() -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getDynamicRuleIds() -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn updateDynamicRules(remove_rule_ids: JsValue, add_rules: JsValue) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn createNotification(id: &str, options: JsValue) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn getTab(tab_id: i32) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn queryTabs(query: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn updateTabUrl(tab_id: i32, url: &str) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendTabMessage(tab_id: i32, message: JsValue) -> std::result::Result<(), JsValue>;

    fn extensionUrl(path: &str) -> String;

    #[wasm_bindgen(catch)]
    async fn createAlarm(name: &str, info: JsValue) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn clearAlarm(name: &str) -> std::result::Result<(), JsValue>;

    fn setTimer(name: &str, delay_ms: f64, repeat: bool, callback: &js_sys::Function);

    fn clearTimer(name: &str);

    async fn sleep(ms: u32);
}

fn js_message(value: JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return error.message().into();
    }
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| Error::InvalidInput(e.to_string()))
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T> {
    serde_wasm_bindgen::from_value(value).map_err(|e| Error::InvalidInput(e.to_string()))
}

/// Host backed by the extension APIs. Timer callbacks are kept alive here
/// until the timer is re-armed or cleared.
pub struct ChromeHost {
    on_timer: Rc<dyn Fn(Timer)>,
    timers: RefCell<HashMap<Timer, Closure<dyn FnMut()>>>,
}

impl ChromeHost {
    pub fn new(on_timer: impl Fn(Timer) + 'static) -> Self {
        ChromeHost {
            on_timer: Rc::new(on_timer),
            timers: RefCell::new(HashMap::new()),
        }
    }
}

impl Store for ChromeHost {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let value = getStorage(key).await.map_err(|e| Error::Storage(js_message(e)))?;
        if value.is_undefined() || value.is_null() {
            return Ok(None);
        }
        Ok(Some(from_js(value)?))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        setStorage(key, to_js(&value)?)
            .await
            .map_err(|e| Error::Storage(js_message(e)))
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        removeStorage(to_js(keys)?)
            .await
            .map_err(|e| Error::Storage(js_message(e)))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let keys = getStorageKeys().await.map_err(|e| Error::Storage(js_message(e)))?;
        from_js(keys)
    }
}

impl RuleEngine for ChromeHost {
    async fn dynamic_rule_ids(&self) -> Result<Vec<u32>> {
        let ids = getDynamicRuleIds().await.map_err(|e| Error::Rules(js_message(e)))?;
        from_js(ids)
    }

    async fn update_dynamic_rules(&self, remove_rule_ids: Vec<u32>, add_rules: Vec<RedirectRule>) -> Result<()> {
        updateDynamicRules(to_js(&remove_rule_ids)?, to_js(&add_rules)?)
            .await
            .map_err(|e| Error::Rules(js_message(e)))
    }
}

impl Notifier for ChromeHost {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let options = json!({
            "type": "basic",
            "iconUrl": notification.icon_url,
            "title": notification.title,
            "message": notification.message,
        });
        createNotification(&notification.id, to_js(&options)?)
            .await
            .map_err(|e| Error::Notification(js_message(e)))
    }
}

impl Tabs for ChromeHost {
    async fn get_tab(&self, tab_id: i32) -> Result<Option<TabInfo>> {
        let tab = getTab(tab_id).await.map_err(|e| Error::Tabs(js_message(e)))?;
        if tab.is_undefined() || tab.is_null() {
            return Ok(None);
        }
        Ok(Some(from_js(tab)?))
    }

    async fn query_tabs(&self, query: &TabQuery) -> Result<Vec<TabInfo>> {
        let tabs = queryTabs(to_js(query)?).await.map_err(|e| Error::Tabs(js_message(e)))?;
        from_js(tabs)
    }

    async fn redirect_tab(&self, tab_id: i32, url: &str) -> Result<()> {
        updateTabUrl(tab_id, url).await.map_err(|e| Error::Tabs(js_message(e)))
    }

    async fn send_message(&self, tab_id: i32, message: &Value) -> Result<()> {
        sendTabMessage(tab_id, to_js(message)?)
            .await
            .map_err(|e| Error::Tabs(js_message(e)))
    }

    fn extension_url(&self, path: &str) -> String {
        extensionUrl(path.trim_start_matches('/'))
    }
}

impl Alarms for ChromeHost {
    async fn create_alarm(&self, name: &str, alarm: &AlarmSpec) -> Result<()> {
        createAlarm(name, to_js(alarm)?)
            .await
            .map_err(|e| Error::Alarm(js_message(e)))
    }

    async fn clear_alarm(&self, name: &str) -> Result<()> {
        clearAlarm(name).await.map_err(|e| Error::Alarm(js_message(e)))
    }
}

impl Timers for ChromeHost {
    fn set_timer(&self, timer: Timer, delay_ms: u64, repeat: bool) {
        let on_timer = self.on_timer.clone();
        let callback = Closure::<dyn FnMut()>::new(move || on_timer(timer));

        // The bridge clears any previous handle for this name before arming
        setTimer(timer.name(), delay_ms as f64, repeat, callback.as_ref().unchecked_ref());
        self.timers.borrow_mut().insert(timer, callback);
    }

    fn clear_timer(&self, timer: Timer) {
        clearTimer(timer.name());
        self.timers.borrow_mut().remove(&timer);
    }

    async fn sleep(&self, ms: u32) {
        sleep(ms).await;
    }
}

impl Clock for ChromeHost {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}
