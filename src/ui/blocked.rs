/// Page shown in place of a blocked site

use yew::prelude::*;
use wasm_bindgen::prelude::*;
use patternfly_yew::prelude::*;
use url::form_urlencoded;

// Import JS bridge functions
#[wasm_bindgen(module = "/blocked.js")]
extern "C" {
    fn onFocusEnded(callback: &js_sys::Function);

    fn everySecond(callback: &js_sys::Function) -> i32;

    fn stopTimer(handle: i32);
}

/// Query parameters the redirect rule (or focus mode) put on the page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockedParams {
    pub site: String,
    pub expires_at: Option<i64>,
    pub focus: bool,
}

impl BlockedParams {
    /// Parse `?focus=1&url=<site>&expires=<ms>`; a leading `?` is optional.
    pub fn from_query(search: &str) -> BlockedParams {
        let mut params = BlockedParams::default();
        for (key, value) in form_urlencoded::parse(search.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "url" => params.site = value.into_owned(),
                "expires" => params.expires_at = value.parse::<f64>().ok().map(|ms| ms.floor() as i64),
                "focus" => params.focus = value == "1",
                _ => {}
            }
        }
        params
    }
}

/// "1:02:03" or "12:05"; `None` once the block has expired
pub fn format_remaining(expires_at: i64, now_ms: i64) -> Option<String> {
    let remaining = expires_at - now_ms;
    if remaining <= 0 {
        return None;
    }
    let seconds = (remaining + 999) / 1000;
    let (hours, minutes, seconds) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    Some(if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    })
}

#[function_component(BlockedPage)]
pub fn blocked_page() -> Html {
    let params = use_memo((), |_| {
        let search = web_sys::window()
            .and_then(|window| window.location().search().ok())
            .unwrap_or_default();
        BlockedParams::from_query(&search)
    });
    let now = use_state(|| js_sys::Date::now() as i64);
    let focus_ended = use_state(|| false);

    // Countdown
    {
        let now = now.clone();
        use_effect_with((), move |_| {
            let tick = Closure::<dyn FnMut()>::new(move || now.set(js_sys::Date::now() as i64));
            let handle = everySecond(tick.as_ref().unchecked_ref());
            move || {
                stopTimer(handle);
                drop(tick);
            }
        });
    }

    // Focus mode switched off by its alarm
    {
        let focus_ended = focus_ended.clone();
        use_effect_with((), move |_| {
            let listener = Closure::<dyn FnMut()>::new(move || focus_ended.set(true));
            onFocusEnded(listener.as_ref().unchecked_ref());
            listener.forget();
            || ()
        });
    }

    let remaining = params.expires_at.and_then(|expires_at| format_remaining(expires_at, *now));
    let unblocked = *focus_ended || (params.expires_at.is_some() && remaining.is_none());
    let title = if params.focus { "Focus Mode is on" } else { "This site is blocked" };

    html! {
        <div class="padding-20 blocked-page">
            <h1 class="popup-title">{title}</h1>
            <p class="message-text">
                <strong>{&params.site}</strong>
            </p>

            {match (unblocked, remaining) {
                (true, _) => html! {
                    <Alert r#type={AlertType::Success} title={"You can visit this site again"} inline={true}>
                        <a href={format!("https://{}", params.site)}>{format!("Go to {}", params.site)}</a>
                    </Alert>
                },
                (false, Some(remaining)) => html! {
                    <p class="message-text">{format!("Unblocked in {}", remaining)}</p>
                },
                (false, None) => html! {}
            }}
        </div>
    }
}
