/// Storage keys and typed access to chrome.storage.local
use crate::error::Result;
use crate::host::Store;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Keys shared with the popup and dashboard pages
pub mod keys {
    pub const TIME_DATA: &str = "timeData";
    pub const CATEGORIES: &str = "categories";
    pub const GOALS: &str = "goals";
    pub const BLOCKED_SITES: &str = "blockedSites";
    pub const FOCUS_ACTIVE: &str = "focusActive";
    pub const FOCUS_BLOCK_LIST: &str = "focusBlockList";
    pub const FOCUS_EXPIRES_AT: &str = "focusExpiresAt";
    pub const NOTIFICATIONS_ENABLED: &str = "notifications";
    pub const NOTIFICATION_FLAGS: &str = "notificationFlags";
    pub const YOUTUBE_CLASSIFICATION: &str = "youtubeClassification";
    pub const FACEBOOK_CLASSIFICATION: &str = "facebookClassification";
    pub const VISITS: &str = "visits";
    pub const CONFIG: &str = "config";

    /// Prefixes of the per-day flag keys older versions wrote
    pub const LEGACY_FLAG_PREFIXES: [&str; 2] = ["notification_", "goalNotified_"];
}

/// Typed helpers on top of any [`Store`]
#[allow(async_fn_in_trait)]
pub trait StoreExt: Store {
    /// `None` when the key is absent or explicitly null
    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    async fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        Ok(self.load(key).await?.unwrap_or_default())
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set(key, serde_json::to_value(value)?).await
    }

    async fn remove_key(&self, key: &str) -> Result<()> {
        self.remove(&[key.to_string()]).await
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

/// JS stores every number as a double; accept either form for timestamps.
pub fn de_millis<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    Ok(value.floor() as i64)
}

pub fn de_opt_millis<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(|v| v.floor() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Stamp {
        #[serde(deserialize_with = "de_millis")]
        at: i64,
    }

    #[tokio::test]
    async fn test_load_missing_and_null() {
        let host = FakeHost::new();
        host.put("nothing", Value::Null);

        let missing: Option<Vec<String>> = host.load("absent").await.unwrap();
        let null: Option<Vec<String>> = host.load("nothing").await.unwrap();

        assert!(missing.is_none());
        assert!(null.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let host = FakeHost::new();
        host.save(keys::FOCUS_BLOCK_LIST, &vec!["reddit.com".to_string()])
            .await
            .unwrap();

        let list: Vec<String> = host.load_or_default(keys::FOCUS_BLOCK_LIST).await.unwrap();
        assert_eq!(list, vec!["reddit.com".to_string()]);
        assert_eq!(host.peek(keys::FOCUS_BLOCK_LIST), Some(json!(["reddit.com"])));
    }

    #[tokio::test]
    async fn test_load_wrong_shape_is_error() {
        let host = FakeHost::new();
        host.put(keys::FOCUS_ACTIVE, json!("yes"));

        let result: Result<Option<bool>> = host.load(keys::FOCUS_ACTIVE).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_remove_key() {
        let host = FakeHost::new();
        host.put(keys::FOCUS_EXPIRES_AT, json!(1));
        host.remove_key(keys::FOCUS_EXPIRES_AT).await.unwrap();
        assert_eq!(host.peek(keys::FOCUS_EXPIRES_AT), None);
    }

    #[test]
    fn test_millis_accepts_float() {
        let stamp: Stamp = serde_json::from_value(json!({ "at": 1700000000123.7 })).unwrap();
        assert_eq!(stamp.at, 1_700_000_000_123);

        let stamp: Stamp = serde_json::from_value(json!({ "at": 42 })).unwrap();
        assert_eq!(stamp.at, 42);
    }
}
