/// Browser tab shapes exchanged with the JS bridge
use serde::{Deserialize, Serialize};

/// Information about a browser tab, as reported by `chrome.tabs`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: i32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub window_id: i32,
}

impl TabInfo {
    pub fn new(id: i32, url: &str, window_id: i32) -> TabInfo {
        TabInfo {
            id,
            url: url.to_string(),
            title: String::new(),
            active: true,
            window_id,
        }
    }

    /// Tabs without a URL (still loading, or no permission) are never tracked.
    pub fn has_url(&self) -> bool {
        !self.url.is_empty()
    }
}

/// Filter for `chrome.tabs.query`; unset fields are left out of the query
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<i32>,
}

impl TabQuery {
    pub fn all() -> TabQuery {
        TabQuery::default()
    }

    pub fn active_in(window_id: i32) -> TabQuery {
        TabQuery {
            active: Some(true),
            window_id: Some(window_id),
        }
    }
}

/// `chrome.windows.WINDOW_ID_NONE`: every browser window lost focus
pub const WINDOW_ID_NONE: i32 = -1;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tab_from_chrome_shape() {
        let tab: TabInfo = serde_json::from_value(json!({
            "id": 7,
            "url": "https://github.com/rust-lang",
            "title": "rust-lang",
            "active": true,
            "windowId": 3,
            "pinned": false
        }))
        .unwrap();

        assert_eq!(tab.id, 7);
        assert_eq!(tab.window_id, 3);
        assert!(tab.active);
        assert!(tab.has_url());
    }

    #[test]
    fn test_tab_without_url() {
        let tab: TabInfo = serde_json::from_value(json!({ "id": 1 })).unwrap();
        assert!(!tab.has_url());
        assert!(!tab.active);
    }

    #[test]
    fn test_query_skips_unset_fields() {
        assert_eq!(serde_json::to_value(TabQuery::all()).unwrap(), json!({}));
        assert_eq!(
            serde_json::to_value(TabQuery::active_in(4)).unwrap(),
            json!({ "active": true, "windowId": 4 })
        );
    }
}
