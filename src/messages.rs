/// Runtime messages from the popup, dashboard, blocked page and content scripts
use crate::config::Config;
use crate::error::Result;
use crate::focus::FocusMode;
use crate::host::Host;
use crate::ledger::Ledger;
use crate::notify::NotificationEvaluator;
use crate::rules::{BlockedSite, RuleSynchronizer};
use crate::storage::{keys, StoreExt};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Requests from extension pages, tagged by `action`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ActionRequest {
    AddBlock {
        url: String,
        /// Minutes
        duration: f64,
    },
    RemoveBlock {
        url: String,
    },
    GetBlockedSites,
    ClearNotificationFlags,
    TestWebsiteGoalNotification {
        domain: String,
    },
    SetFocus {
        active: bool,
        #[serde(default)]
        duration: Option<f64>,
    },
    AddFocusSite {
        url: String,
    },
    RemoveFocusSite {
        url: String,
    },
    ResetData,
}

/// Messages from content scripts, tagged by `type`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum EventRequest {
    #[serde(rename = "PING")]
    Ping,
    #[serde(rename = "PAGE_VISIT")]
    PageVisit {
        #[serde(default)]
        data: Map<String, Value>,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Request {
    Action(ActionRequest),
    Event(EventRequest),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Response {
    Ack {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    BlockedSites { blocked_sites: Vec<BlockedSite> },
}

impl Response {
    pub fn ok() -> Response {
        Response::Ack {
            success: true,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Response {
        Response::Ack {
            success: false,
            error: Some(message.into()),
        }
    }
}

impl From<Result<()>> for Response {
    fn from(result: Result<()>) -> Response {
        match result {
            Ok(()) => Response::ok(),
            Err(e) => Response::error(e.to_string()),
        }
    }
}

/// Parse a raw message; anything unrecognised gets an error response.
pub fn parse(message: Value) -> std::result::Result<Request, Response> {
    serde_json::from_value(message).map_err(|e| {
        log::debug!("Unrecognised message: {}", e);
        Response::error("Unknown message")
    })
}

pub struct MessageHandler<'a, H> {
    host: &'a H,
    config: &'a Config,
}

impl<'a, H: Host> MessageHandler<'a, H> {
    pub fn new(host: &'a H, config: &'a Config) -> Self {
        MessageHandler { host, config }
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Action(action) => self.handle_action(action).await,
            Request::Event(EventRequest::Ping) => Response::ok(),
            Request::Event(EventRequest::PageVisit { data }) => self.record_visit(data).await.into(),
        }
    }

    async fn handle_action(&self, action: ActionRequest) -> Response {
        let rules = RuleSynchronizer::new(self.host, self.config);
        let focus = FocusMode::new(self.host, self.config);
        let notifications = NotificationEvaluator::new(self.host, self.config);

        match action {
            ActionRequest::AddBlock { url, duration } => rules.add_blocked_site(&url, duration).await.map(|_| ()).into(),
            ActionRequest::RemoveBlock { url } => rules.remove_blocked_site(&url).await.map(|_| ()).into(),
            ActionRequest::GetBlockedSites => match rules.blocked_sites().await {
                Ok(blocked_sites) => Response::BlockedSites { blocked_sites },
                Err(e) => Response::error(e.to_string()),
            },
            ActionRequest::ClearNotificationFlags => notifications.sweep_flags().await.map(|_| ()).into(),
            ActionRequest::TestWebsiteGoalNotification { domain } => {
                notifications.test_website_goal(&domain).await.map(|_| ()).into()
            }
            ActionRequest::SetFocus { active, duration } => focus.set_active(active, duration).await.into(),
            ActionRequest::AddFocusSite { url } => focus.add_site(&url).await.map(|_| ()).into(),
            ActionRequest::RemoveFocusSite { url } => focus.remove_site(&url).await.map(|_| ()).into(),
            ActionRequest::ResetData => Ledger::new(self.host).reset().await.into(),
        }
    }

    /// Append to `visits`, keeping only the most recent entries
    async fn record_visit(&self, mut data: Map<String, Value>) -> Result<()> {
        let timestamp = self
            .host
            .now()
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        data.insert("timestamp".to_string(), Value::String(timestamp));

        let mut visits: Vec<Value> = self.host.load_or_default(keys::VISITS).await?;
        visits.push(Value::Object(data));
        if visits.len() > self.config.visit_log_cap {
            let excess = visits.len() - self.config.visit_log_cap;
            visits.drain(..excess);
        }
        self.host.save(keys::VISITS, &visits).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Clock;
    use crate::testing::FakeHost;
    use serde_json::json;

    async fn send(host: &FakeHost, config: &Config, message: Value) -> Value {
        let response = match parse(message) {
            Ok(request) => MessageHandler::new(host, config).handle(request).await,
            Err(response) => response,
        };
        serde_json::to_value(response).unwrap()
    }

    #[test]
    fn test_parse_requests() {
        assert_eq!(
            parse(json!({ "action": "addBlock", "url": "reddit.com", "duration": 30 })),
            Ok(Request::Action(ActionRequest::AddBlock {
                url: "reddit.com".to_string(),
                duration: 30.0
            }))
        );
        assert_eq!(
            parse(json!({ "action": "setFocus", "active": true })),
            Ok(Request::Action(ActionRequest::SetFocus {
                active: true,
                duration: None
            }))
        );
        assert_eq!(parse(json!({ "type": "PING" })), Ok(Request::Event(EventRequest::Ping)));
        assert!(parse(json!({ "action": "selfDestruct" })).is_err());
        assert!(parse(json!("hello")).is_err());
    }

    #[tokio::test]
    async fn test_block_round_trip() {
        let host = FakeHost::new();
        let config = Config::default();

        let added = send(&host, &config, json!({ "action": "addBlock", "url": "https://www.reddit.com/", "duration": 15 })).await;
        assert_eq!(added, json!({ "success": true }));

        let listed = send(&host, &config, json!({ "action": "getBlockedSites" })).await;
        assert_eq!(
            listed,
            json!({ "blockedSites": [{ "url": "reddit.com", "expiresAt": host.now_ms() + 15 * 60_000 }] })
        );

        send(&host, &config, json!({ "action": "removeBlock", "url": "reddit.com" })).await;
        assert_eq!(send(&host, &config, json!({ "action": "getBlockedSites" })).await, json!({ "blockedSites": [] }));
    }

    #[tokio::test]
    async fn test_errors_become_responses() {
        let host = FakeHost::new();
        let config = Config::default();

        let response = send(&host, &config, json!({ "action": "addBlock", "url": "reddit.com", "duration": -5 })).await;
        assert_eq!(response["success"], json!(false));
        assert!(response["error"].as_str().unwrap().contains("positive"));

        let unknown = send(&host, &config, json!({ "action": "launch" })).await;
        assert_eq!(unknown, json!({ "success": false, "error": "Unknown message" }));
    }

    #[tokio::test]
    async fn test_focus_messages() {
        let host = FakeHost::new();
        let config = Config::default();

        send(&host, &config, json!({ "action": "addFocusSite", "url": "youtube.com" })).await;
        send(&host, &config, json!({ "action": "setFocus", "active": true, "duration": 50 })).await;

        assert_eq!(host.peek(keys::FOCUS_ACTIVE), Some(json!(true)));
        assert_eq!(host.peek(keys::FOCUS_BLOCK_LIST), Some(json!(["youtube.com"])));
        assert!(host.alarm(crate::focus::FOCUS_OFF_ALARM).is_some());

        send(&host, &config, json!({ "action": "removeFocusSite", "url": "youtube.com" })).await;
        assert_eq!(host.peek(keys::FOCUS_BLOCK_LIST), Some(json!([])));
    }

    #[tokio::test]
    async fn test_page_visits_are_capped() {
        let host = FakeHost::new();
        let config = Config {
            visit_log_cap: 3,
            ..Config::default()
        };

        for i in 0..5 {
            let response = send(&host, &config, json!({ "type": "PAGE_VISIT", "data": { "url": format!("https://example.org/{}", i) } })).await;
            assert_eq!(response, json!({ "success": true }));
        }

        let visits = host.peek(keys::VISITS).unwrap();
        let urls: Vec<&str> = visits.as_array().unwrap().iter().map(|v| v["url"].as_str().unwrap()).collect();
        assert_eq!(urls, vec!["https://example.org/2", "https://example.org/3", "https://example.org/4"]);
        assert_eq!(visits[0]["timestamp"], json!("2024-05-01T10:00:00.000Z"));
    }

    #[tokio::test]
    async fn test_reset_and_flag_actions() {
        let host = FakeHost::new();
        let config = Config::default();
        host.put(keys::TIME_DATA, json!({ "2024-05-01": { "sites": {}, "categories": {} } }));
        let today = json!({ "kind": "websiteGoal", "id": "x.com", "day": host.today() });
        host.put(
            keys::NOTIFICATION_FLAGS,
            json!([today.clone(), { "kind": "categoryGoal", "id": "newsHours", "day": "2024-04-30" }]),
        );

        assert_eq!(send(&host, &config, json!({ "action": "resetData" })).await, json!({ "success": true }));
        assert_eq!(
            send(&host, &config, json!({ "action": "clearNotificationFlags" })).await,
            json!({ "success": true })
        );

        assert_eq!(host.peek(keys::TIME_DATA), None);
        // Today's alerts stay suppressed
        assert_eq!(host.peek(keys::NOTIFICATION_FLAGS), Some(json!([today])));
    }

    #[tokio::test]
    async fn test_ping() {
        let host = FakeHost::new();
        assert_eq!(send(&host, &Config::default(), json!({ "type": "PING" })).await, json!({ "success": true }));
    }
}
