/// Service worker core: routes browser events to the components
///
/// Every handler logs its errors and returns normally; one failed storage
/// write or classification must never take the worker down.
use crate::classifier::{Classifier, Platform};
use crate::config::Config;
use crate::error::Result;
use crate::focus::{FocusMode, FOCUS_OFF_ALARM};
use crate::goals::{self, Goals};
use crate::host::{Host, Timer};
use crate::messages::{self, MessageHandler};
use crate::notify::NotificationEvaluator;
use crate::rules::{BlockedSite, RuleSynchronizer};
use crate::scheduler::{Scheduler, BLOCK_CLEANUP_ALARM};
use crate::storage::{keys, StoreExt};
use crate::tab_data::{TabInfo, TabQuery, WINDOW_ID_NONE};
use crate::taxonomy::{self, Taxonomy};
use crate::tracker::Tracker;
use serde_json::{Map, Value};
use std::cell::RefCell;

fn log_failure(what: &str, result: Result<()>) {
    if let Err(e) = result {
        log::error!("{} failed: {}", what, e);
    }
}

pub struct Background<H> {
    host: H,
    config: RefCell<Config>,
    tracker: Tracker,
}

impl<H: Host> Background<H> {
    pub fn new(host: H, config: Config) -> Self {
        Background {
            host,
            config: RefCell::new(config),
            tracker: Tracker::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    fn config(&self) -> Config {
        self.config.borrow().clone()
    }

    /// First install or update: seed missing defaults, then start up.
    pub async fn on_installed(&self) {
        log::info!("TimeSetu installed");
        log_failure("Seeding defaults", self.seed_defaults().await);
        self.on_startup().await;
    }

    async fn seed_defaults(&self) -> Result<()> {
        if self.host.get(keys::CATEGORIES).await?.is_none() {
            self.host.save(keys::CATEGORIES, &Taxonomy::defaults()).await?;
        }
        if self.host.get(keys::BLOCKED_SITES).await?.is_none() {
            self.host.save(keys::BLOCKED_SITES, &Vec::<BlockedSite>::new()).await?;
        }
        if self.host.get(keys::GOALS).await?.is_none() {
            self.host.save(keys::GOALS, &Goals::initial()).await?;
        }
        Ok(())
    }

    /// Every worker start: bring stored data up to date and arm the timers.
    pub async fn on_startup(&self) {
        self.config.replace(Config::load(&self.host).await);
        let config = self.config();

        log_failure(
            "Updating categories",
            taxonomy::ensure_up_to_date(&self.host).await.map(|_| ()),
        );
        log_failure("Migrating goals", goals::migrate_stored(&self.host).await);

        let scheduler = Scheduler::new(&self.host, &config);
        log_failure("Initial block sync", scheduler.on_block_sweep().await);
        scheduler.arm_midnight();
        log_failure("Arming block sweep", scheduler.arm_block_sweep().await);

        log_failure(
            "Sweeping notification flags",
            NotificationEvaluator::new(&self.host, &config).sweep_flags().await.map(|_| ()),
        );
        log_failure(
            "Checking focus expiry",
            FocusMode::new(&self.host, &config).current().await.map(|_| ()),
        );
    }

    pub async fn on_tab_activated(&self, tab_id: i32) {
        let config = self.config();
        let result = self
            .tracker
            .switch_with(&self.host, &config, self.host.get_tab(tab_id))
            .await;
        log_failure("Tab activation", result);
    }

    pub async fn on_tab_updated(&self, tab_id: i32, status: &str, tab: &TabInfo) {
        let config = self.config();
        let result: Result<()> = async {
            match status {
                "loading" => {
                    if let Some(platform) = Platform::for_url(&tab.url) {
                        Classifier::new(&self.host, &config).invalidate(platform).await?;
                    }
                    Ok(())
                }
                "complete" if tab.active => self.tracker.switch_to(&self.host, &config, tab).await,
                "complete" => FocusMode::new(&self.host, &config).enforce(tab).await.map(|_| ()),
                _ => Ok(()),
            }
        }
        .await;
        log_failure(&format!("Tab {} update", tab_id), result);
    }

    pub async fn on_window_focus_changed(&self, window_id: i32) {
        let config = self.config();
        if window_id == WINDOW_ID_NONE {
            self.tracker.stop(&self.host, &config).await;
            return;
        }

        let active_tab = async {
            let active = self.host.query_tabs(&TabQuery::active_in(window_id)).await?;
            Result::Ok(active.into_iter().next())
        };
        let result = self.tracker.switch_with(&self.host, &config, active_tab).await;
        log_failure("Window focus change", result);
    }

    pub async fn on_alarm(&self, name: &str) {
        let config = self.config();
        match name {
            BLOCK_CLEANUP_ALARM => log_failure(
                "Block cleanup",
                Scheduler::new(&self.host, &config).on_block_sweep().await,
            ),
            FOCUS_OFF_ALARM => log_failure(
                "Focus auto-off",
                FocusMode::new(&self.host, &config).on_auto_off().await,
            ),
            other => log::debug!("Ignoring alarm {}", other),
        }
    }

    pub async fn on_timer(&self, timer: Timer) {
        let config = self.config();
        let scheduler = Scheduler::new(&self.host, &config);
        match timer {
            Timer::Tick => self.tracker.tick(&self.host, &config).await,
            Timer::Midnight => scheduler.on_midnight(&self.tracker).await,
            Timer::BlockSweep => log_failure("Block sweep", scheduler.on_block_sweep().await),
        }
    }

    /// `chrome.storage.onChanged`: `{ key: { oldValue, newValue } }`
    pub async fn on_storage_changed(&self, changes: &Map<String, Value>) {
        let config = self.config();

        if changes.contains_key(keys::BLOCKED_SITES) {
            log_failure(
                "Resync after block list change",
                RuleSynchronizer::new(&self.host, &config).resync().await.map(|_| ()),
            );
        }

        let focus_on = changes
            .get(keys::FOCUS_ACTIVE)
            .and_then(|change| change.get("newValue"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if focus_on {
            match FocusMode::new(&self.host, &config).sweep_all_tabs().await {
                Ok(count) => log::info!("Focus mode on; redirected {} tab(s)", count),
                Err(e) => log::error!("Focus sweep failed: {}", e),
            }
        }
    }

    pub async fn on_message(&self, message: Value) -> Value {
        let config = self.config();
        let response = match messages::parse(message) {
            Ok(request) => MessageHandler::new(&self.host, &config).handle(request).await,
            Err(response) => response,
        };
        serde_json::to_value(response).unwrap_or(Value::Null)
    }
}
