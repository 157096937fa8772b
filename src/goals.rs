/// Daily goals (`goals`): target hours per category and per website
use crate::config::HOUR_MS;
use crate::error::Result;
use crate::host::Store;
use crate::storage::{keys, StoreExt};
use crate::taxonomy::{goal_key, website_goal_key};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys written by earlier releases, renamed to the derived form
const LEGACY_GOAL_KEYS: [(&str, &str); 3] = [
    ("productiveHours", "productiveeducationalHours"),
    ("socialMediaHours", "socialmediaHours"),
    ("otherHours", "otheruncategorizedHours"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Goals {
    #[serde(default)]
    pub streak: u32,
    /// `<goalKey>` -> hours, for both category and `website_*` keys
    #[serde(flatten)]
    pub targets: BTreeMap<String, f64>,
}

impl Goals {
    /// Goals seeded on install
    pub fn initial() -> Goals {
        let targets = [
            ("productiveeducationalHours", 4.0),
            ("entertainmentHours", 2.0),
            ("newsHours", 1.0),
            ("socialmediaHours", 1.0),
            ("gamesHours", 1.0),
            ("shoppingHours", 0.5),
            ("otheruncategorizedHours", 0.0),
        ];

        Goals {
            streak: 0,
            targets: targets
                .into_iter()
                .map(|(key, hours)| (key.to_string(), hours))
                .collect(),
        }
    }

    /// Positive target for a category, in milliseconds
    pub fn category_target_ms(&self, category: &str) -> Option<f64> {
        self.target_ms(&goal_key(category))
    }

    /// Positive target for a website, in milliseconds
    pub fn website_target_ms(&self, domain: &str) -> Option<f64> {
        self.target_ms(&website_goal_key(domain))
    }

    fn target_ms(&self, key: &str) -> Option<f64> {
        self.targets
            .get(key)
            .copied()
            .filter(|hours| *hours > 0.0)
            .map(|hours| hours * HOUR_MS as f64)
    }

    /// Rename legacy keys in place; returns whether anything changed
    pub fn migrate(&mut self) -> bool {
        let mut changed = false;
        for (old, new) in LEGACY_GOAL_KEYS {
            if let Some(hours) = self.targets.remove(old) {
                self.targets.insert(new.to_string(), hours);
                changed = true;
            }
        }
        changed
    }
}

pub async fn load<S: Store>(store: &S) -> Result<Goals> {
    store.load_or_default(keys::GOALS).await
}

pub async fn migrate_stored<S: Store>(store: &S) -> Result<()> {
    let mut goals = load(store).await?;
    if goals.migrate() {
        store.save(keys::GOALS, &goals).await?;
        log::info!("Goals migrated to derived keys: {:?}", goals.targets.keys().collect::<Vec<_>>());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use crate::taxonomy::{PRODUCTIVE, SHOPPING, OTHER};
    use serde_json::json;

    #[test]
    fn test_wire_format_flattens_targets() {
        let goals: Goals = serde_json::from_value(json!({
            "streak": 3,
            "productiveeducationalHours": 4,
            "website_githubcomHours": 0.5
        }))
        .unwrap();

        assert_eq!(goals.streak, 3);
        assert_eq!(goals.targets.get("productiveeducationalHours"), Some(&4.0));
        assert_eq!(goals.website_target_ms("github.com"), Some(1_800_000.0));
    }

    #[test]
    fn test_zero_goal_is_no_goal() {
        let goals = Goals::initial();
        assert_eq!(goals.category_target_ms(OTHER), None);
        assert_eq!(goals.category_target_ms(SHOPPING), Some(1_800_000.0));
        assert_eq!(goals.category_target_ms(PRODUCTIVE), Some(4.0 * 3_600_000.0));
        assert_eq!(goals.category_target_ms("Unknown"), None);
    }

    #[test]
    fn test_migrate_renames_legacy_keys() {
        let mut goals: Goals = serde_json::from_value(json!({
            "streak": 1,
            "productiveHours": 3,
            "socialMediaHours": 1,
            "newsHours": 2
        }))
        .unwrap();

        assert!(goals.migrate());
        assert_eq!(goals.targets.get("productiveeducationalHours"), Some(&3.0));
        assert_eq!(goals.targets.get("socialmediaHours"), Some(&1.0));
        assert!(!goals.targets.contains_key("productiveHours"));
        assert_eq!(goals.targets.get("newsHours"), Some(&2.0));
        assert!(!goals.migrate());
    }

    #[tokio::test]
    async fn test_migrate_stored_only_writes_when_needed() {
        let host = FakeHost::new();
        host.put(keys::GOALS, json!({ "streak": 0, "otherHours": 1 }));

        migrate_stored(&host).await.unwrap();

        assert_eq!(
            host.peek(keys::GOALS),
            Some(json!({ "streak": 0, "otheruncategorizedHours": 1.0 }))
        );
    }
}
