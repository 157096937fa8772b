/// Category taxonomy: ordered category -> example domains table
use crate::domain::{alnum_key, clean_website_domain, domain_matches};
use crate::error::Result;
use crate::host::Store;
use crate::storage::{keys, StoreExt};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const PRODUCTIVE: &str = "Productive / Educational";
pub const ENTERTAINMENT: &str = "Entertainment";
pub const NEWS: &str = "News";
pub const SOCIAL_MEDIA: &str = "Social Media";
pub const GAMES: &str = "Games";
pub const SHOPPING: &str = "Shopping";
pub const OTHER: &str = "Other / Uncategorized";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryInfo {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl CategoryInfo {
    fn new(description: &str, examples: &[&str]) -> Self {
        CategoryInfo {
            description: description.to_string(),
            examples: examples.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Categories in match order. Persisted as a JSON object whose key order is
/// the match order; defaults always come first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Taxonomy {
    entries: Vec<(String, CategoryInfo)>,
}

impl Taxonomy {
    pub fn defaults() -> Taxonomy {
        let entries = vec![
            (PRODUCTIVE, CategoryInfo::new(
                "Websites that promote learning, work, coding, and personal growth",
                &["wikipedia.org", "khanacademy.org", "pw.live", "physicswallah.com", "coursera.org",
                  "udemy.com", "edx.org", "leetcode.com", "notion.so", "trello.com", "slack.com",
                  "linkedin.com/learning", "docs.google.com", "chat.openai.com"],
            )),
            (ENTERTAINMENT, CategoryInfo::new(
                "Time-pass, media consumption, and fun-focused websites",
                &["youtube.com", "netflix.com", "spotify.com", "twitch.tv", "hotstar.com",
                  "primevideo.com", "disneyplus.com", "9gag.com"],
            )),
            (NEWS, CategoryInfo::new(
                "Websites focused on current events, politics, and general news",
                &["cnn.com", "bbc.com", "nytimes.com", "reuters.com", "foxnews.com", "aljazeera.com"],
            )),
            (SOCIAL_MEDIA, CategoryInfo::new(
                "Websites focused on social interaction and communication",
                &["facebook.com", "instagram.com", "twitter.com", "tiktok.com", "snapchat.com",
                  "linkedin.com", "reddit.com", "pinterest.com"],
            )),
            (GAMES, CategoryInfo::new(
                "Online gaming platforms or game-related content",
                &["roblox.com", "epicgames.com", "steampowered.com", "miniclip.com", "ign.com", "chess.com"],
            )),
            (SHOPPING, CategoryInfo::new(
                "E-commerce and online retail platforms",
                &["amazon.com", "ebay.com", "aliexpress.com", "walmart.com", "flipkart.com", "etsy.com"],
            )),
            (OTHER, CategoryInfo::new(
                "Anything that doesn't clearly fit the above or is new/unknown",
                &["medium.com", "quora.com", "openai.com", "duckduckgo.com"],
            )),
        ];

        Taxonomy {
            entries: entries
                .into_iter()
                .map(|(name, info)| (name.to_string(), info))
                .collect(),
        }
    }

    /// Defaults overlaid with user entries: a user entry with a default's
    /// name replaces it in place, new names are appended in their own order.
    pub fn merged_with(user: &Taxonomy) -> Taxonomy {
        let mut merged = Taxonomy::defaults();
        for (name, info) in &user.entries {
            merged.upsert(name, info.clone());
        }
        merged
    }

    pub fn upsert(&mut self, name: &str, info: CategoryInfo) {
        match self.entries.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, slot)) => *slot = info,
            None => self.entries.push((name.to_string(), info)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&CategoryInfo> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, info)| info)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First category (in table order) with an example matching `domain`
    pub fn match_domain(&self, domain: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, info)| info.examples.iter().any(|example| domain_matches(domain, example)))
            .map(|(name, _)| name.as_str())
    }
}

impl Serialize for Taxonomy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, info) in &self.entries {
            map.serialize_entry(name, info)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Taxonomy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TaxonomyVisitor;

        impl<'de> Visitor<'de> for TaxonomyVisitor {
            type Value = Taxonomy;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category name to category info")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Taxonomy, A::Error> {
                let mut taxonomy = Taxonomy::default();
                while let Some((name, info)) = access.next_entry::<String, CategoryInfo>()? {
                    taxonomy.upsert(&name, info);
                }
                Ok(taxonomy)
            }
        }

        deserializer.deserialize_map(TaxonomyVisitor)
    }
}

/// Older keyword table, still consulted after the taxonomy so sites
/// categorised by earlier versions keep their category.
const LEGACY_DOMAINS: &[(&str, &[&str])] = &[
    (PRODUCTIVE, &["wikipedia.org", "khanacademy.org", "pw.live", "physicswallah.com", "coursera.org",
                   "udemy.com", "edx.org", "leetcode.com", "notion.so", "trello.com", "slack.com",
                   "linkedin.com", "docs.google.com", "chat.openai.com"]),
    (ENTERTAINMENT, &["youtube.com", "netflix.com", "spotify.com", "twitch.tv", "hotstar.com",
                      "primevideo.com", "disneyplus.com", "9gag.com"]),
    (NEWS, &["cnn.com", "bbc.com", "nytimes.com", "reuters.com", "foxnews.com", "aljazeera.com"]),
    (SOCIAL_MEDIA, &["facebook.com", "instagram.com", "twitter.com", "x.com", "tiktok.com",
                     "snapchat.com", "linkedin.com", "reddit.com", "pinterest.com"]),
    (GAMES, &["roblox.com", "epicgames.com", "steampowered.com", "miniclip.com", "ign.com", "chess.com"]),
    (SHOPPING, &["amazon.com", "ebay.com", "aliexpress.com", "walmart.com", "flipkart.com", "etsy.com"]),
];

pub fn match_legacy_domain(domain: &str) -> Option<&'static str> {
    LEGACY_DOMAINS
        .iter()
        .find(|(_, domains)| domains.iter().any(|d| domain_matches(domain, d)))
        .map(|(name, _)| *name)
}

/// Goal key for a category: "Productive / Educational" -> "productiveeducationalHours"
pub fn goal_key(category: &str) -> String {
    format!("{}Hours", alnum_key(category))
}

/// Goal key for a website: "www.GitHub.com" -> "website_githubcomHours"
pub fn website_goal_key(domain: &str) -> String {
    format!("website_{}Hours", alnum_key(&clean_website_domain(domain)))
}

/// Load the stored taxonomy merged over the defaults
pub async fn load_merged<S: Store>(store: &S) -> Result<Taxonomy> {
    let user: Taxonomy = store.load_or_default(keys::CATEGORIES).await?;
    Ok(Taxonomy::merged_with(&user))
}

/// Rewrite `categories` so every default is present
pub async fn ensure_up_to_date<S: Store>(store: &S) -> Result<Taxonomy> {
    let merged = load_merged(store).await?;
    store.save(keys::CATEGORIES, &merged).await?;
    Ok(merged)
}
