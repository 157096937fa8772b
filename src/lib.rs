/// TimeSetu - Chrome Extension for Time Tracking and Focus
/// Built with Rust + WASM + Yew

pub mod background;
pub mod chrome;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod error;
pub mod focus;
pub mod goals;
pub mod host;
pub mod ledger;
pub mod messages;
pub mod notify;
pub mod retry;
pub mod rules;
pub mod scheduler;
pub mod storage;
pub mod tab_data;
pub mod taxonomy;
pub mod tracker;
pub mod ui;

#[cfg(test)]
mod testing;

use background::Background;
use chrome::ChromeHost;
use config::Config;
use host::Timer;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;
use tab_data::TabInfo;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

thread_local! {
    static BACKGROUND: RefCell<Option<Rc<Background<ChromeHost>>>> = const { RefCell::new(None) };
}

/// The worker's single background instance, created on first use
fn background() -> Rc<Background<ChromeHost>> {
    BACKGROUND.with(|slot| {
        slot.borrow_mut()
            .get_or_insert_with(|| Rc::new(Background::new(ChromeHost::new(fire_timer), Config::default())))
            .clone()
    })
}

fn fire_timer(timer: Timer) {
    let bg = background();
    spawn_local(async move { bg.on_timer(timer).await });
}

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// `runtime.onInstalled` reason ("install", "update"), or anything else for
/// a plain worker start
#[wasm_bindgen]
pub async fn start_background(reason: String) {
    let bg = background();
    match reason.as_str() {
        "install" | "update" => bg.on_installed().await,
        _ => bg.on_startup().await,
    }
}

#[wasm_bindgen]
pub async fn on_tab_activated(tab_id: i32) {
    background().on_tab_activated(tab_id).await;
}

#[wasm_bindgen]
pub async fn on_tab_updated(tab_id: i32, status: String, tab: JsValue) {
    match serde_wasm_bindgen::from_value::<TabInfo>(tab) {
        Ok(tab) => background().on_tab_updated(tab_id, &status, &tab).await,
        Err(e) => log::warn!("Unreadable tab {}: {}", tab_id, e),
    }
}

#[wasm_bindgen]
pub async fn on_window_focus_changed(window_id: i32) {
    background().on_window_focus_changed(window_id).await;
}

#[wasm_bindgen]
pub async fn on_alarm(name: String) {
    background().on_alarm(&name).await;
}

#[wasm_bindgen]
pub async fn on_storage_changed(changes: JsValue) {
    match serde_wasm_bindgen::from_value::<Map<String, Value>>(changes) {
        Ok(changes) => background().on_storage_changed(&changes).await,
        Err(e) => log::warn!("Unreadable storage change: {}", e),
    }
}

/// Answer a `runtime.onMessage` request; resolves to the response object
#[wasm_bindgen]
pub async fn on_message(message: JsValue) -> Result<JsValue, JsValue> {
    let message: Value = serde_wasm_bindgen::from_value(message).unwrap_or(Value::Null);
    let response = background().on_message(message).await;
    response
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

// Start the Yew app for the blocked page
#[wasm_bindgen]
pub fn start_blocked_page() {
    yew::Renderer::<ui::blocked::BlockedPage>::new().render();
}
