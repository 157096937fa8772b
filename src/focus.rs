/// Focus Mode: a user-toggled block of a dedicated domain list
use crate::config::{Config, MINUTE_MS};
use crate::domain::{domain_from_url, is_same_or_subdomain, normalize_site_input};
use crate::error::{Error, Result};
use crate::host::{AlarmSpec, Alarms, Clock, Store, Tabs, Timers};
use crate::retry::send_with_retry;
use crate::rules::blocked_page_path;
use crate::storage::{keys, StoreExt};
use crate::tab_data::{TabInfo, TabQuery};
use serde_json::json;

pub const FOCUS_OFF_ALARM: &str = "focusModeOff";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FocusState {
    pub active: bool,
    pub block_list: Vec<String>,
    pub expires_at: Option<i64>,
}

impl FocusState {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_ms)
    }

    /// The list entry blocking `domain`, if focus is on
    pub fn blocking(&self, domain: &str) -> Option<&str> {
        if !self.active {
            return None;
        }
        self.block_list
            .iter()
            .find(|site| is_same_or_subdomain(domain, site))
            .map(String::as_str)
    }
}

pub struct FocusMode<'a, H> {
    host: &'a H,
    config: &'a Config,
}

impl<'a, H: Store + Tabs + Alarms + Timers + Clock> FocusMode<'a, H> {
    pub fn new(host: &'a H, config: &'a Config) -> Self {
        FocusMode { host, config }
    }

    pub async fn state(&self) -> Result<FocusState> {
        let expires_at: Option<f64> = self.host.load(keys::FOCUS_EXPIRES_AT).await?;
        Ok(FocusState {
            active: self.host.load(keys::FOCUS_ACTIVE).await?.unwrap_or(false),
            block_list: self.host.load_or_default(keys::FOCUS_BLOCK_LIST).await?,
            expires_at: expires_at.map(|at| at.floor() as i64),
        })
    }

    /// Current state, turning focus off first if its expiry already passed
    /// (the alarm may not have fired while the worker was asleep).
    pub async fn current(&self) -> Result<FocusState> {
        let state = self.state().await?;
        if state.active && state.is_expired(self.host.now_ms()) {
            log::info!("Focus mode expired while suspended");
            self.on_auto_off().await?;
            return self.state().await;
        }
        Ok(state)
    }

    /// Redirect `tab` to the blocked page if focus mode blocks it. Returns
    /// whether the tab was redirected.
    pub async fn enforce(&self, tab: &TabInfo) -> Result<bool> {
        if !tab.has_url() {
            return Ok(false);
        }
        let dashboard_url = self.host.extension_url(&self.config.dashboard_path);
        let Some(domain) = domain_from_url(&tab.url, &dashboard_url) else {
            return Ok(false);
        };

        let state = self.current().await?;
        let Some(site) = state.blocking(&domain) else {
            return Ok(false);
        };

        let expires = self.host.now_ms() + self.config.focus_redirect_window_ms;
        let path = blocked_page_path(&self.config.blocked_page_path, site, expires, true);
        self.host.redirect_tab(tab.id, &self.host.extension_url(&path)).await?;
        log::info!("Focus mode blocked {} in tab {}", domain, tab.id);
        Ok(true)
    }

    /// Enforce across every open tab; returns how many were redirected
    pub async fn sweep_all_tabs(&self) -> Result<usize> {
        let mut redirected = 0;
        for tab in self.host.query_tabs(&TabQuery::all()).await? {
            match self.enforce(&tab).await {
                Ok(true) => redirected += 1,
                Ok(false) => {}
                Err(e) => log::warn!("Could not enforce focus mode on tab {}: {}", tab.id, e),
            }
        }
        Ok(redirected)
    }

    /// Turn focus on or off. A positive duration arms the auto-off alarm;
    /// anything else leaves focus on until turned off by hand.
    pub async fn set_active(&self, active: bool, duration_minutes: Option<f64>) -> Result<()> {
        self.host.save(keys::FOCUS_ACTIVE, &active).await?;

        match duration_minutes.filter(|minutes| active && *minutes > 0.0) {
            Some(minutes) => {
                let expires_at = (self.host.now_ms() as f64 + minutes * MINUTE_MS as f64).floor() as i64;
                self.host.save(keys::FOCUS_EXPIRES_AT, &expires_at).await?;
                self.host
                    .create_alarm(
                        FOCUS_OFF_ALARM,
                        &AlarmSpec {
                            delay_in_minutes: Some(minutes),
                            period_in_minutes: None,
                        },
                    )
                    .await?;
                log::info!("Focus mode on for {} min", minutes);
            }
            None => {
                self.host.remove_key(keys::FOCUS_EXPIRES_AT).await?;
                self.host.clear_alarm(FOCUS_OFF_ALARM).await?;
                log::info!("Focus mode {}", if active { "on" } else { "off" });
            }
        }
        Ok(())
    }

    /// Add a site to the focus list; returns the stored form
    pub async fn add_site(&self, raw: &str) -> Result<String> {
        let site = normalize_site_input(raw).ok_or_else(|| Error::InvalidInput(format!("not a site: {:?}", raw)))?;

        let mut list: Vec<String> = self.host.load_or_default(keys::FOCUS_BLOCK_LIST).await?;
        if !list.contains(&site) {
            list.push(site.clone());
            self.host.save(keys::FOCUS_BLOCK_LIST, &list).await?;
        }
        Ok(site)
    }

    pub async fn remove_site(&self, raw: &str) -> Result<bool> {
        let site = normalize_site_input(raw).unwrap_or_else(|| raw.to_string());

        let mut list: Vec<String> = self.host.load_or_default(keys::FOCUS_BLOCK_LIST).await?;
        let before = list.len();
        list.retain(|existing| *existing != site);
        if list.len() == before {
            return Ok(false);
        }
        self.host.save(keys::FOCUS_BLOCK_LIST, &list).await?;
        Ok(true)
    }

    /// Timed focus session ended: switch off and tell open blocked pages.
    pub async fn on_auto_off(&self) -> Result<()> {
        self.host.save(keys::FOCUS_ACTIVE, &false).await?;
        self.host.remove_key(keys::FOCUS_EXPIRES_AT).await?;
        self.host.clear_alarm(FOCUS_OFF_ALARM).await?;
        log::info!("Focus mode auto-disabled");

        let blocked_page = self.host.extension_url(&self.config.blocked_page_path);
        let message = json!({ "type": "FOCUS_ENDED" });
        for tab in self.host.query_tabs(&TabQuery::all()).await? {
            if !tab.url.starts_with(&blocked_page) {
                continue;
            }
            if let Err(e) = send_with_retry(
                self.host,
                tab.id,
                &message,
                self.config.message_retry_attempts,
                self.config.message_retry_delay_ms,
            )
            .await
            {
                log::warn!("FOCUS_ENDED not delivered to tab {}: {}", tab.id, e);
            }
        }
        Ok(())
    }
}
