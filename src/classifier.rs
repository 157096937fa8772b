/// URL -> category resolution
///
/// Policy, first match wins:
/// 1. a fresh cached AI classification for a special platform page
/// 2. the merged taxonomy (defaults first, then user categories)
/// 3. the legacy domain table
/// 4. "Other / Uncategorized"
use crate::config::Config;
use crate::domain::domain_from_url;
use crate::host::{Clock, Store, Tabs};
use crate::storage::{de_opt_millis, keys, StoreExt};
use crate::taxonomy::{self, match_legacy_domain, Taxonomy, ENTERTAINMENT, NEWS, OTHER, PRODUCTIVE, SOCIAL_MEDIA};
use serde::{Deserialize, Serialize};

/// Platforms whose pages are classified by content rather than by domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
    Facebook,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::YouTube, Platform::Facebook];

    /// Which platform, if any, a URL belongs to
    pub fn for_url(url: &str) -> Option<Platform> {
        Platform::ALL
            .into_iter()
            .find(|platform| url.contains(platform.url_marker()))
    }

    fn url_marker(self) -> &'static str {
        match self {
            Platform::YouTube => "youtube.com/watch",
            Platform::Facebook => "facebook.com",
        }
    }

    pub fn cache_key(self) -> &'static str {
        match self {
            Platform::YouTube => keys::YOUTUBE_CLASSIFICATION,
            Platform::Facebook => keys::FACEBOOK_CLASSIFICATION,
        }
    }

    /// Raw labels the content classifier may produce for this platform
    fn accepted_labels(self) -> &'static [&'static str] {
        match self {
            Platform::YouTube => &["Productive", "Entertainment", "News", "Other"],
            Platform::Facebook => &["Productive", "Entertainment", "News", "Social Media", "Other"],
        }
    }
}

/// Cached AI verdict for the page currently open on a platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiHint {
    pub category: String,
    /// Fingerprint of the classified content (video or post title)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de_opt_millis", skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<i64>,
}

impl AiHint {
    /// Hints without a timestamp predate expiry and are taken as fresh.
    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        self.cached_at.is_none_or(|at| now_ms - at <= ttl_ms)
    }
}

/// Map a raw classifier label onto a taxonomy category
fn translate_label(platform: Platform, label: &str) -> Option<&'static str> {
    if !platform.accepted_labels().contains(&label) {
        return None;
    }
    match label {
        "Productive" => Some(PRODUCTIVE),
        "Entertainment" => Some(ENTERTAINMENT),
        "News" => Some(NEWS),
        "Social Media" => Some(SOCIAL_MEDIA),
        "Other" => Some(OTHER),
        _ => None,
    }
}

/// Domain-only part of the policy (steps 2-4)
pub fn category_for_domain(taxonomy: &Taxonomy, domain: &str) -> String {
    if let Some(category) = taxonomy.match_domain(domain) {
        log::debug!("Matched domain \"{}\" to category \"{}\"", domain, category);
        return category.to_string();
    }
    if let Some(category) = match_legacy_domain(domain) {
        log::debug!("Matched domain \"{}\" to category \"{}\" via legacy table", domain, category);
        return category.to_string();
    }
    OTHER.to_string()
}

pub struct Classifier<'a, H> {
    host: &'a H,
    config: &'a Config,
}

impl<'a, H: Store + Clock + Tabs> Classifier<'a, H> {
    pub fn new(host: &'a H, config: &'a Config) -> Self {
        Classifier { host, config }
    }

    /// Category for a URL. Never fails: storage problems fall through to the
    /// next tier and ultimately to "Other / Uncategorized".
    pub async fn category_for(&self, url: &str) -> String {
        let dashboard_url = self.host.extension_url(&self.config.dashboard_path);
        let Some(domain) = domain_from_url(url, &dashboard_url) else {
            return OTHER.to_string();
        };

        if let Some(platform) = Platform::for_url(url) {
            if let Some(category) = self.cached_category(platform).await {
                return category.to_string();
            }
        }

        let taxonomy = match taxonomy::load_merged(self.host).await {
            Ok(taxonomy) => taxonomy,
            Err(e) => {
                log::warn!("Falling back to default categories: {}", e);
                Taxonomy::defaults()
            }
        };

        category_for_domain(&taxonomy, &domain)
    }

    async fn cached_category(&self, platform: Platform) -> Option<&'static str> {
        let hint: AiHint = match self.host.load(platform.cache_key()).await {
            Ok(hint) => hint?,
            Err(e) => {
                log::debug!("Ignoring unreadable {:?} classification: {}", platform, e);
                return None;
            }
        };

        if !hint.is_fresh(self.host.now_ms(), self.config.ai_cache_ttl_ms) {
            log::debug!("Cached {:?} classification is stale", platform);
            return None;
        }
        translate_label(platform, &hint.category)
    }

    /// Drop the cached verdict for a platform
    pub async fn invalidate(&self, platform: Platform) -> crate::error::Result<()> {
        self.host.remove_key(platform.cache_key()).await
    }
}
