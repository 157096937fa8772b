/// Popup UI for TimeSetu

use yew::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use patternfly_yew::prelude::*;
use crate::domain::{time_by_domain, top_domains};
use crate::host::day_key;
use crate::ledger::TimeLedger;
use crate::rules::BlockedSite;
use crate::storage::keys;
use serde::Serialize;
use serde_json::{json, Value};

// Import JS bridge functions
#[wasm_bindgen(module = "/popup.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getStorage(key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendMessage(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn openDashboard() -> Result<(), JsValue>;
}

const TOP_SITES: usize = 5;

#[derive(Clone, PartialEq, Default)]
struct Snapshot {
    categories: Vec<(String, u64)>,
    top_sites: Vec<(String, u64)>,
    focus_active: bool,
    blocked: Vec<BlockedSite>,
}

#[derive(Clone, PartialEq)]
enum AppState {
    Idle,
    Loading(String),
    Error(String),
}

/// "1h 05m", "12m 30s", "45s"
pub fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    let (hours, minutes, seconds) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Category totals (largest first) and the top sites for one day
fn summarize(ledger: &TimeLedger, day: &str) -> (Vec<(String, u64)>, Vec<(String, u64)>) {
    let Some(record) = ledger.day(day) else {
        return (Vec::new(), Vec::new());
    };

    let mut categories: Vec<(String, u64)> = record
        .categories
        .iter()
        .filter(|(_, ms)| **ms > 0)
        .map(|(name, ms)| (name.clone(), *ms))
        .collect();
    categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let top_sites = top_domains(&time_by_domain(&record.sites), TOP_SITES);
    (categories, top_sites)
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_state(|| AppState::Loading("Loading today's usage...".to_string()));
    let snapshot = use_state(Snapshot::default);
    let refresh_count = use_state(|| 0u32);
    let block_input = use_node_ref();
    let minutes_input = use_node_ref();

    // Reload whenever an action bumps the counter
    {
        let state = state.clone();
        let snapshot = snapshot.clone();
        use_effect_with(*refresh_count, move |_| {
            spawn_local(async move {
                match load_snapshot().await {
                    Ok(loaded) => {
                        snapshot.set(loaded);
                        state.set(AppState::Idle);
                    }
                    Err(e) => state.set(AppState::Error(e)),
                }
            });
            || ()
        });
    }

    let run = {
        let state = state.clone();
        let refresh_count = refresh_count.clone();
        move |message: Value, busy: &'static str| {
            let state = state.clone();
            let refresh_count = refresh_count.clone();
            state.set(AppState::Loading(busy.to_string()));
            spawn_local(async move {
                match send(message).await {
                    Ok(()) => refresh_count.set(*refresh_count + 1),
                    Err(e) => state.set(AppState::Error(e)),
                }
            });
        }
    };

    let on_toggle_focus = {
        let run = run.clone();
        let active = snapshot.focus_active;
        Callback::from(move |_| {
            run(json!({ "action": "setFocus", "active": !active }), "Switching focus mode...");
        })
    };

    let on_block = {
        let run = run.clone();
        let block_input = block_input.clone();
        let minutes_input = minutes_input.clone();
        Callback::from(move |_| {
            let (Some(site), Some(minutes)) = (
                block_input.cast::<HtmlInputElement>(),
                minutes_input.cast::<HtmlInputElement>(),
            ) else {
                return;
            };
            let duration: f64 = minutes.value().trim().parse().unwrap_or(0.0);
            run(json!({ "action": "addBlock", "url": site.value(), "duration": duration }), "Blocking...");
            site.set_value("");
        })
    };

    let on_unblock = {
        let run = run.clone();
        move |url: String| {
            let run = run.clone();
            Callback::from(move |_| {
                run(json!({ "action": "removeBlock", "url": url }), "Unblocking...");
            })
        }
    };

    let on_dashboard = Callback::from(move |_| {
        spawn_local(async move {
            if let Err(e) = openDashboard().await {
                log::warn!("Failed to open dashboard: {:?}", e);
            }
        });
    });

    let is_busy = matches!(*state, AppState::Loading(_));
    let now = js_sys::Date::now() as i64;

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"TimeSetu"}</h1>

            {match &*state {
                AppState::Loading(msg) => html! {
                    <div class="loading-text-center">
                        <Spinner />
                        <p class="loading-text">{msg}</p>
                    </div>
                },
                AppState::Error(err) => html! {
                    <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                        {err.clone()}
                    </Alert>
                },
                AppState::Idle => html! {}
            }}

            <div class="stats-container">
                <h2 class="stats-title">{"Today"}</h2>
                if snapshot.categories.is_empty() {
                    <p class="message-text">{"No browsing recorded yet."}</p>
                }
                <div class="stats-box">
                    {for snapshot.categories.iter().map(|(name, ms)| html! {
                        <div class="stat-item">
                            <span class="stat-domain">{name}</span>
                            <span class="stat-count">{format_duration(*ms)}</span>
                        </div>
                    })}
                </div>
            </div>

            if !snapshot.top_sites.is_empty() {
                <div class="stats-container">
                    <h2 class="stats-title">{"Top Sites"}</h2>
                    <div class="stats-box">
                        {for snapshot.top_sites.iter().map(|(domain, ms)| html! {
                            <div class="stat-item">
                                <span class="stat-domain">{domain}</span>
                                <span class="stat-count">{format_duration(*ms)}</span>
                            </div>
                        })}
                    </div>
                </div>
            }

            <div class="flex-column-gap">
                <Button onclick={on_toggle_focus} disabled={is_busy} variant={ButtonVariant::Secondary} block={true}>
                    {if snapshot.focus_active { "Turn Focus Mode Off" } else { "Turn Focus Mode On" }}
                </Button>

                <div class="block-form">
                    <input ref={block_input} class="pf-v5-c-form-control" type="text" placeholder="reddit.com" />
                    <input ref={minutes_input} class="pf-v5-c-form-control" type="number" min="1" value="30" />
                    <Button onclick={on_block} disabled={is_busy} variant={ButtonVariant::Secondary}>
                        {"Block"}
                    </Button>
                </div>

                {for snapshot.blocked.iter().filter(|site| site.is_active(now)).map(|site| html! {
                    <div class="stat-item">
                        <span class="stat-domain">{&site.url}</span>
                        <span class="stat-count">{format_duration((site.expires_at - now).max(0) as u64)}</span>
                        <Button onclick={on_unblock(site.url.clone())} disabled={is_busy} variant={ButtonVariant::Link}>
                            {"Remove"}
                        </Button>
                    </div>
                })}

                <Button onclick={on_dashboard} variant={ButtonVariant::Primary} block={true}>
                    {"Open Dashboard"}
                </Button>
            </div>

            <p class="footer-popup">
                {"TimeSetu v0.1.0"}
            </p>
        </div>
    }
}

// Helper functions

async fn load<T: serde::de::DeserializeOwned + Default>(key: &str) -> Result<T, String> {
    let value_js = getStorage(key)
        .await
        .map_err(|e| format!("Failed to read {}: {:?}", key, e))?;
    if value_js.is_null() || value_js.is_undefined() {
        return Ok(T::default());
    }
    serde_wasm_bindgen::from_value(value_js).map_err(|e| format!("Failed to parse {}: {}", key, e))
}

async fn load_snapshot() -> Result<Snapshot, String> {
    let ledger: TimeLedger = load(keys::TIME_DATA).await?;
    let today = day_key(&chrono::Local::now().fixed_offset());
    let (categories, top_sites) = summarize(&ledger, &today);

    Ok(Snapshot {
        categories,
        top_sites,
        focus_active: load(keys::FOCUS_ACTIVE).await?,
        blocked: load(keys::BLOCKED_SITES).await?,
    })
}

async fn send(message: Value) -> Result<(), String> {
    let message_js = message
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| format!("Failed to serialize: {}", e))?;
    let response_js = sendMessage(message_js)
        .await
        .map_err(|e| format!("Background not reachable: {:?}", e))?;
    let response: Value = serde_wasm_bindgen::from_value(response_js).unwrap_or(Value::Null);

    if response.get("success").and_then(Value::as_bool) == Some(false) {
        let error = response.get("error").and_then(Value::as_str).unwrap_or("Request failed");
        return Err(error.to_string());
    }
    Ok(())
}
