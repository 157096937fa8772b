/// Threshold, goal and website-goal notifications, at most once per day each
use crate::config::{Config, HOUR_MS, MINUTE_MS};
use crate::domain::clean_website_domain;
use crate::error::Result;
use crate::goals::{self, Goals};
use crate::host::{Clock, Notifier, Store};
use crate::ledger::Totals;
use crate::storage::{keys, StoreExt};
use crate::taxonomy::{goal_key, PRODUCTIVE, SOCIAL_MEDIA};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub icon_url: String,
}

impl Notification {
    fn new(config: &Config, title: &str, message: String) -> Self {
        Notification {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            message,
            icon_url: config.notification_icon.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FlagKind {
    CategoryThreshold,
    CategoryGoal,
    WebsiteGoal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlagRow {
    pub kind: FlagKind,
    pub id: String,
    pub day: String,
}

/// `(kind, id, day)` rows for conditions that already fired
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct FlagTable {
    rows: Vec<FlagRow>,
}

impl FlagTable {
    pub fn is_set(&self, kind: FlagKind, id: &str, day: &str) -> bool {
        self.rows
            .iter()
            .any(|row| row.kind == kind && row.id == id && row.day == day)
    }

    /// Returns `true` if the flag was not set before
    pub fn set(&mut self, kind: FlagKind, id: &str, day: &str) -> bool {
        if self.is_set(kind, id, day) {
            return false;
        }
        self.rows.push(FlagRow {
            kind,
            id: id.to_string(),
            day: day.to_string(),
        });
        true
    }

    /// Drop every row not for `today`; returns how many went
    pub fn sweep(&mut self, today: &str) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| row.day == today);
        before - self.rows.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn format_span(ms: i64) -> String {
    if ms >= HOUR_MS && ms % HOUR_MS == 0 {
        let hours = ms / HOUR_MS;
        format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else {
        format!("{} min", ms / MINUTE_MS)
    }
}

/// Hardcoded per-category alert, if `category` has one and it is exceeded
fn threshold_alert(config: &Config, category: &str, category_ms: u64) -> Option<Notification> {
    let category_ms = category_ms as i64;
    if category == SOCIAL_MEDIA && category_ms > config.social_media_threshold_ms {
        return Some(Notification::new(
            config,
            "⚠️ Social Media Alert",
            format!("Over {} spent on social media!", format_span(config.social_media_threshold_ms)),
        ));
    }
    if category == PRODUCTIVE && category_ms > config.productive_threshold_ms {
        return Some(Notification::new(
            config,
            "🎉 Productivity Milestone!",
            format!("{} spent productively!", format_span(config.productive_threshold_ms)),
        ));
    }
    None
}

/// Warning past the configured percentage, achieved at 100%. Evaluates the
/// current progress, so a jump straight past 100% yields the achieved form.
fn website_goal_alert(config: &Config, domain: &str, site_ms: u64, target_ms: f64) -> Option<Notification> {
    let progress = site_ms as f64 / target_ms * 100.0;
    if progress >= 100.0 {
        Some(Notification::new(
            config,
            "🎯 Website Goal Achieved!",
            format!("You've reached your daily goal for {}!", domain),
        ))
    } else if progress >= config.website_warning_percent {
        Some(Notification::new(
            config,
            "⚠️ Website Goal Warning",
            format!("You're approaching your daily goal for {} ({}%)", domain, progress.round()),
        ))
    } else {
        None
    }
}

pub struct NotificationEvaluator<'a, H> {
    host: &'a H,
    config: &'a Config,
}

impl<'a, H: Store + Notifier + Clock> NotificationEvaluator<'a, H> {
    pub fn new(host: &'a H, config: &'a Config) -> Self {
        NotificationEvaluator { host, config }
    }

    async fn enabled(&self) -> Result<bool> {
        Ok(self.host.load(keys::NOTIFICATIONS_ENABLED).await?.unwrap_or(true))
    }

    async fn load_flags(&self) -> Result<FlagTable> {
        self.host.load_or_default(keys::NOTIFICATION_FLAGS).await
    }

    /// Run every check against the totals a flush just produced. Returns
    /// the number of notifications shown.
    pub async fn on_ledger_updated(&self, category: &str, site: &str, totals: Totals) -> Result<usize> {
        if !self.enabled().await? {
            return Ok(0);
        }

        let today = self.host.today();
        let goals = goals::load(self.host).await?;
        let mut flags = self.load_flags().await?;
        let mut pending = Vec::new();

        if let Some(alert) = threshold_alert(self.config, category, totals.category_ms) {
            if flags.set(FlagKind::CategoryThreshold, category, &today) {
                pending.push(alert);
            }
        }

        if let Some(target_ms) = goals.category_target_ms(category) {
            if totals.category_ms as f64 >= target_ms && flags.set(FlagKind::CategoryGoal, &goal_key(category), &today) {
                pending.push(Notification::new(
                    self.config,
                    "🎯 Goal Completed!",
                    format!("You've achieved your daily goal for {}!", category),
                ));
            }
        }

        pending.extend(self.check_website(&goals, &mut flags, site, totals.site_ms, &today));

        self.dispatch(&flags, pending).await
    }

    fn check_website(
        &self,
        goals: &Goals,
        flags: &mut FlagTable,
        site: &str,
        site_ms: u64,
        today: &str,
    ) -> Option<Notification> {
        let domain = clean_website_domain(site);
        let target_ms = goals.website_target_ms(&domain)?;
        let alert = website_goal_alert(self.config, &domain, site_ms, target_ms)?;

        if flags.set(FlagKind::WebsiteGoal, &domain, today) {
            Some(alert)
        } else {
            None
        }
    }

    /// Persist the flags first so a failed notification is never repeated.
    async fn dispatch(&self, flags: &FlagTable, pending: Vec<Notification>) -> Result<usize> {
        if pending.is_empty() {
            return Ok(0);
        }
        self.host.save(keys::NOTIFICATION_FLAGS, flags).await?;

        let mut shown = 0;
        for notification in pending {
            match self.host.notify(&notification).await {
                Ok(()) => {
                    log::info!("Notified: {}", notification.title);
                    shown += 1;
                }
                Err(e) => log::warn!("Could not show \"{}\": {}", notification.title, e),
            }
        }
        Ok(shown)
    }

    /// Fire the website goal check as if the goal had just been reached
    pub async fn test_website_goal(&self, domain: &str) -> Result<usize> {
        let goals = goals::load(self.host).await?;
        let domain = clean_website_domain(domain);
        let Some(target_ms) = goals.website_target_ms(&domain) else {
            log::info!("No goal found for {}", domain);
            return Ok(0);
        };

        let today = self.host.today();
        let mut flags = self.load_flags().await?;
        let pending: Vec<Notification> = self
            .check_website(&goals, &mut flags, &domain, target_ms.ceil() as u64, &today)
            .into_iter()
            .collect();
        self.dispatch(&flags, pending).await
    }

    /// Forget flags from earlier days, including the per-key flags older
    /// versions stored (`notification_*`, `goalNotified_*`).
    pub async fn sweep_flags(&self) -> Result<usize> {
        let today = self.host.today();

        let mut flags = self.load_flags().await?;
        let mut removed = flags.sweep(&today);
        if removed > 0 {
            self.host.save(keys::NOTIFICATION_FLAGS, &flags).await?;
        }

        let legacy: Vec<String> = self
            .host
            .keys()
            .await?
            .into_iter()
            .filter(|key| keys::LEGACY_FLAG_PREFIXES.iter().any(|prefix| key.starts_with(prefix)))
            .filter(|key| !key.contains(&today))
            .collect();
        if !legacy.is_empty() {
            self.host.remove(&legacy).await?;
            removed += legacy.len();
        }

        if removed > 0 {
            log::info!("Cleaned up {} old notification flag(s)", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{ENTERTAINMENT, OTHER};
    use crate::testing::FakeHost;
    use serde_json::json;

    const MIN: u64 = 60_000;

    fn totals(site_ms: u64, category_ms: u64) -> Totals {
        Totals { site_ms, category_ms }
    }

    #[test]
    fn test_flag_table_set_and_sweep() {
        let mut flags = FlagTable::default();
        assert!(flags.set(FlagKind::CategoryThreshold, SOCIAL_MEDIA, "2024-05-01"));
        assert!(!flags.set(FlagKind::CategoryThreshold, SOCIAL_MEDIA, "2024-05-01"));
        assert!(flags.set(FlagKind::CategoryGoal, SOCIAL_MEDIA, "2024-05-01"));
        assert!(flags.set(FlagKind::CategoryThreshold, SOCIAL_MEDIA, "2024-05-02"));

        assert_eq!(flags.sweep("2024-05-02"), 2);
        assert_eq!(flags.len(), 1);
        assert!(flags.is_set(FlagKind::CategoryThreshold, SOCIAL_MEDIA, "2024-05-02"));
    }

    #[test]
    fn test_format_span() {
        assert_eq!(format_span(30 * MINUTE_MS), "30 min");
        assert_eq!(format_span(HOUR_MS), "1 hour");
        assert_eq!(format_span(2 * HOUR_MS), "2 hours");
        assert_eq!(format_span(90 * MINUTE_MS), "90 min");
    }

    #[tokio::test]
    async fn test_social_media_alert_fires_once() {
        let host = FakeHost::new();
        let config = Config::default();
        let evaluator = NotificationEvaluator::new(&host, &config);

        let first = evaluator.on_ledger_updated(SOCIAL_MEDIA, "reddit.com", totals(31 * MIN, 31 * MIN)).await.unwrap();
        let second = evaluator.on_ledger_updated(SOCIAL_MEDIA, "reddit.com", totals(32 * MIN, 32 * MIN)).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 0);
        let shown = host.notifications();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "⚠️ Social Media Alert");
        assert_eq!(shown[0].message, "Over 30 min spent on social media!");
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let host = FakeHost::new();
        let config = Config::default();
        let evaluator = NotificationEvaluator::new(&host, &config);

        evaluator.on_ledger_updated(SOCIAL_MEDIA, "reddit.com", totals(30 * MIN, 30 * MIN)).await.unwrap();
        evaluator.on_ledger_updated(PRODUCTIVE, "github.com", totals(60 * MIN, 60 * MIN)).await.unwrap();
        assert!(host.notifications().is_empty());

        evaluator.on_ledger_updated(PRODUCTIVE, "github.com", totals(60 * MIN + 1, 60 * MIN + 1)).await.unwrap();
        assert_eq!(host.notifications()[0].message, "1 hour spent productively!");
    }

    #[tokio::test]
    async fn test_goal_and_threshold_are_independent() {
        let host = FakeHost::new();
        host.put(keys::GOALS, json!({ "streak": 0, "socialmediaHours": 0.5 }));
        let config = Config::default();
        let evaluator = NotificationEvaluator::new(&host, &config);

        let shown = evaluator
            .on_ledger_updated(SOCIAL_MEDIA, "reddit.com", totals(31 * MIN, 31 * MIN))
            .await
            .unwrap();

        assert_eq!(shown, 2);
        let titles: Vec<String> = host.notifications().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["⚠️ Social Media Alert".to_string(), "🎯 Goal Completed!".to_string()]);
    }

    #[tokio::test]
    async fn test_goal_reached_exactly() {
        let host = FakeHost::new();
        host.put(keys::GOALS, json!({ "entertainmentHours": 1 }));
        let config = Config::default();
        let evaluator = NotificationEvaluator::new(&host, &config);

        evaluator.on_ledger_updated(ENTERTAINMENT, "youtube.com", totals(59 * MIN, 59 * MIN)).await.unwrap();
        assert!(host.notifications().is_empty());
        evaluator.on_ledger_updated(ENTERTAINMENT, "youtube.com", totals(60 * MIN, 60 * MIN)).await.unwrap();
        assert_eq!(host.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_website_warning_then_silent_at_goal() {
        let host = FakeHost::new();
        host.put(keys::GOALS, json!({ "website_youtubecomHours": 1 }));
        let config = Config::default();
        let evaluator = NotificationEvaluator::new(&host, &config);

        evaluator.on_ledger_updated(OTHER, "youtube.com", totals(50 * MIN, 0)).await.unwrap();
        evaluator.on_ledger_updated(OTHER, "youtube.com", totals(61 * MIN, 0)).await.unwrap();

        let shown = host.notifications();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "⚠️ Website Goal Warning");
        assert_eq!(shown[0].message, "You're approaching your daily goal for youtube.com (83%)");
    }

    #[tokio::test]
    async fn test_website_jump_past_goal_is_achieved() {
        let host = FakeHost::new();
        host.put(keys::GOALS, json!({ "website_youtubecomHours": 1 }));
        let config = Config::default();
        let evaluator = NotificationEvaluator::new(&host, &config);

        evaluator.on_ledger_updated(OTHER, "youtube.com", totals(10 * MIN, 0)).await.unwrap();
        evaluator.on_ledger_updated(OTHER, "youtube.com", totals(70 * MIN, 0)).await.unwrap();

        let shown = host.notifications();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "🎯 Website Goal Achieved!");
    }

    #[tokio::test]
    async fn test_disabled_notifications() {
        let host = FakeHost::new();
        host.put(keys::NOTIFICATIONS_ENABLED, json!(false));
        let config = Config::default();
        let evaluator = NotificationEvaluator::new(&host, &config);

        let shown = evaluator.on_ledger_updated(SOCIAL_MEDIA, "reddit.com", totals(40 * MIN, 40 * MIN)).await.unwrap();
        assert_eq!(shown, 0);
        assert!(host.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_failed_notification_not_retried() {
        let host = FakeHost::new();
        host.fail_notifications(true);
        let config = Config::default();
        let evaluator = NotificationEvaluator::new(&host, &config);

        let shown = evaluator.on_ledger_updated(SOCIAL_MEDIA, "reddit.com", totals(40 * MIN, 40 * MIN)).await.unwrap();
        assert_eq!(shown, 0);

        host.fail_notifications(false);
        evaluator.on_ledger_updated(SOCIAL_MEDIA, "reddit.com", totals(41 * MIN, 41 * MIN)).await.unwrap();
        assert!(host.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_flags_keeps_today_only() {
        let host = FakeHost::new();
        let today = host.today();
        let mut flags = FlagTable::default();
        flags.set(FlagKind::CategoryThreshold, SOCIAL_MEDIA, "2000-01-01");
        flags.set(FlagKind::WebsiteGoal, "youtube.com", &today);
        host.save(keys::NOTIFICATION_FLAGS, &flags).await.unwrap();
        host.put("notification_Social Media_2000-01-01", json!(true));
        host.put(&format!("goalNotified_{}_newsHours", today), json!(true));
        host.put("notifications", json!(true));

        let config = Config::default();
        let removed = NotificationEvaluator::new(&host, &config).sweep_flags().await.unwrap();

        assert_eq!(removed, 2);
        let kept: FlagTable = host.load_or_default(keys::NOTIFICATION_FLAGS).await.unwrap();
        assert_eq!(kept.len(), 1);
        assert!(host.peek("notification_Social Media_2000-01-01").is_none());
        assert!(host.peek(&format!("goalNotified_{}_newsHours", today)).is_some());
        assert!(host.peek("notifications").is_some());
    }

    #[tokio::test]
    async fn test_website_goal_test_hook() {
        let host = FakeHost::new();
        host.put(keys::GOALS, json!({ "website_githubcomHours": 2 }));
        let config = Config::default();
        let evaluator = NotificationEvaluator::new(&host, &config);

        assert_eq!(evaluator.test_website_goal("https://www.github.com/").await.unwrap(), 1);
        assert_eq!(evaluator.test_website_goal("reddit.com").await.unwrap(), 0);
        assert_eq!(host.notifications()[0].title, "🎯 Website Goal Achieved!");
    }
}
