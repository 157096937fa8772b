/// Time-limited site blocking via declarativeNetRequest redirect rules
use crate::config::{Config, MINUTE_MS};
use crate::domain::normalize_site_input;
use crate::error::{Error, Result};
use crate::host::{Clock, RuleEngine, Store};
use crate::storage::{de_millis, keys, StoreExt};
use serde::{Deserialize, Serialize};
use url::form_urlencoded::byte_serialize;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockedSite {
    pub url: String,
    #[serde(deserialize_with = "de_millis")]
    pub expires_at: i64,
}

impl BlockedSite {
    pub fn is_active(&self, now_ms: i64) -> bool {
        self.expires_at > now_ms
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub extension_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub redirect: Redirect,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub url_filter: String,
    pub resource_types: Vec<String>,
}

/// One `declarativeNetRequest` dynamic rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RedirectRule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

/// Query-string component encoding for the blocked page parameters
fn encode_component(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

/// Extension path of the blocked page for a site
pub fn blocked_page_path(blocked_page: &str, site: &str, expires_at: i64, focus: bool) -> String {
    let focus_param = if focus { "focus=1&" } else { "" };
    format!(
        "/{}?{}url={}&expires={}",
        blocked_page.trim_start_matches('/'),
        focus_param,
        encode_component(site),
        expires_at
    )
}

/// Rule table for the given sites: rule `i + 1` redirects top-level
/// navigations to site `i` onto the blocked page.
pub fn build_rules(sites: &[BlockedSite], blocked_page: &str) -> Vec<RedirectRule> {
    sites
        .iter()
        .enumerate()
        .map(|(index, site)| RedirectRule {
            id: index as u32 + 1,
            priority: 1,
            action: RuleAction {
                kind: "redirect".to_string(),
                redirect: Redirect {
                    extension_path: blocked_page_path(blocked_page, &site.url, site.expires_at, false),
                },
            },
            condition: RuleCondition {
                url_filter: format!("||{}", site.url),
                resource_types: vec!["main_frame".to_string()],
            },
        })
        .collect()
}

/// What a resync left in place
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub active_sites: Vec<BlockedSite>,
    pub pruned: usize,
    /// `false` when the rule engine rejected the update
    pub applied: bool,
}

pub struct RuleSynchronizer<'a, H> {
    host: &'a H,
    config: &'a Config,
}

impl<'a, H: Store + RuleEngine + Clock> RuleSynchronizer<'a, H> {
    pub fn new(host: &'a H, config: &'a Config) -> Self {
        RuleSynchronizer { host, config }
    }

    pub async fn blocked_sites(&self) -> Result<Vec<BlockedSite>> {
        self.host.load_or_default(keys::BLOCKED_SITES).await
    }

    /// Drop expired sites from storage and replace the whole dynamic rule
    /// table with one rule per remaining site.
    ///
    /// A rule engine failure is logged and reported in the outcome; the
    /// stored list is never rolled back.
    pub async fn resync(&self) -> Result<SyncOutcome> {
        let sites = self.blocked_sites().await?;
        let now = self.host.now_ms();
        let active_sites: Vec<BlockedSite> =
            sites.iter().filter(|site| site.is_active(now)).cloned().collect();
        let pruned = sites.len() - active_sites.len();

        if pruned > 0 {
            self.host.save(keys::BLOCKED_SITES, &active_sites).await?;
            log::info!("Dropped {} expired block(s)", pruned);
        }

        let rules = build_rules(&active_sites, &self.config.blocked_page_path);
        let applied = match self.replace_rules(rules).await {
            Ok(()) => {
                log::debug!("Blocking rules updated: {} active", active_sites.len());
                true
            }
            Err(e) => {
                log::error!("Error updating blocking rules: {}", e);
                false
            }
        };

        Ok(SyncOutcome {
            active_sites,
            pruned,
            applied,
        })
    }

    async fn replace_rules(&self, rules: Vec<RedirectRule>) -> Result<()> {
        let existing = self.host.dynamic_rule_ids().await?;
        self.host.update_dynamic_rules(existing, rules).await
    }

    /// Block `raw_url` for `duration_minutes`, replacing any earlier block of
    /// the same site.
    pub async fn add_blocked_site(&self, raw_url: &str, duration_minutes: f64) -> Result<BlockedSite> {
        let url = normalize_site_input(raw_url)
            .ok_or_else(|| Error::InvalidInput(format!("not a site: {:?}", raw_url)))?;
        if duration_minutes.is_nan() || duration_minutes <= 0.0 {
            return Err(Error::InvalidInput(format!("block duration must be positive, got {}", duration_minutes)));
        }

        let expires_at = (self.host.now_ms() as f64 + duration_minutes * MINUTE_MS as f64).floor() as i64;
        let site = BlockedSite { url, expires_at };

        let mut sites = self.blocked_sites().await?;
        sites.retain(|existing| existing.url != site.url);
        sites.push(site.clone());
        self.host.save(keys::BLOCKED_SITES, &sites).await?;

        self.resync().await?;
        Ok(site)
    }

    /// Returns whether the site was blocked
    pub async fn remove_blocked_site(&self, raw_url: &str) -> Result<bool> {
        let url = normalize_site_input(raw_url).unwrap_or_else(|| raw_url.to_string());

        let mut sites = self.blocked_sites().await?;
        let before = sites.len();
        sites.retain(|existing| existing.url != url);
        let removed = sites.len() < before;
        self.host.save(keys::BLOCKED_SITES, &sites).await?;

        self.resync().await?;
        Ok(removed)
    }
}
