/// Tracking engine: attributes wall-clock time to the active tab
///
/// The session is the only in-memory state. Every transition mutates it
/// synchronously, before the first await, so a tick that fires while a
/// flush is suspended sees the new state. Each transition also takes a
/// generation number on entry; a start that resumes after a newer
/// transition began is dropped, so the last event to arrive wins.
/// Flushes go through a single queue and are written one at a time, which
/// keeps the ledger and the notification flags free of lost updates
/// between interleaved events.
use crate::classifier::Classifier;
use crate::config::Config;
use crate::domain::domain_from_url;
use crate::error::Result;
use crate::focus::FocusMode;
use crate::host::{Host, Timer};
use crate::ledger::{Ledger, Totals};
use crate::notify::NotificationEvaluator;
use crate::tab_data::TabInfo;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum TrackingSession {
    #[default]
    Idle,
    Tracking {
        url: String,
        tab_id: i32,
        start_ms: i64,
    },
}

/// Elapsed time waiting to be written, stamped with the day it accrued on
#[derive(Debug, Clone, PartialEq)]
struct PendingFlush {
    url: String,
    elapsed_ms: u64,
    day: String,
}

#[derive(Default)]
pub struct Tracker {
    session: RefCell<TrackingSession>,
    pending: RefCell<VecDeque<PendingFlush>>,
    draining: Cell<bool>,
    generation: Cell<u64>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> TrackingSession {
        self.session.borrow().clone()
    }

    pub fn is_tracking(&self) -> bool {
        matches!(*self.session.borrow(), TrackingSession::Tracking { .. })
    }

    pub fn tracked_tab(&self) -> Option<i32> {
        match *self.session.borrow() {
            TrackingSession::Tracking { tab_id, .. } => Some(tab_id),
            TrackingSession::Idle => None,
        }
    }

    fn next_generation(&self) -> u64 {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        generation
    }

    /// Begin tracking `tab`, unless focus mode redirects it away
    pub async fn start<H: Host>(&self, host: &H, config: &Config, tab: &TabInfo) -> Result<()> {
        let generation = self.next_generation();
        self.start_as(generation, host, config, tab).await
    }

    async fn start_as<H: Host>(&self, generation: u64, host: &H, config: &Config, tab: &TabInfo) -> Result<()> {
        if !tab.has_url() {
            return Ok(());
        }
        let redirected = FocusMode::new(host, config).enforce(tab).await?;
        if self.generation.get() != generation {
            log::debug!("Tab {} superseded before tracking began", tab.id);
            return Ok(());
        }
        if redirected {
            return Ok(());
        }

        self.session.replace(TrackingSession::Tracking {
            url: tab.url.clone(),
            tab_id: tab.id,
            start_ms: host.now_ms(),
        });
        host.set_timer(Timer::Tick, config.tick_period_ms as u64, true);
        log::debug!("Tracking tab {}: {}", tab.id, tab.url);
        Ok(())
    }

    /// Flush whatever accrued since the last tick and go idle
    pub async fn stop<H: Host>(&self, host: &H, config: &Config) {
        self.next_generation();
        self.end_session(host, config).await;
    }

    async fn end_session<H: Host>(&self, host: &H, config: &Config) {
        let previous = self.session.replace(TrackingSession::Idle);
        host.clear_timer(Timer::Tick);

        if let TrackingSession::Tracking { url, start_ms, .. } = previous {
            self.flush(host, config, url, host.now_ms() - start_ms).await;
        }
    }

    pub async fn switch_to<H: Host>(&self, host: &H, config: &Config, tab: &TabInfo) -> Result<()> {
        self.switch_with(host, config, async { Result::Ok(Some(tab.clone())) }).await
    }

    /// Stop, then track whichever tab `next` resolves to (`None` stays idle).
    /// `next` is only awaited after the current session has been closed.
    pub async fn switch_with<H, F>(&self, host: &H, config: &Config, next: F) -> Result<()>
    where
        H: Host,
        F: Future<Output = Result<Option<TabInfo>>>,
    {
        let generation = self.next_generation();
        self.end_session(host, config).await;
        match next.await? {
            Some(tab) => self.start_as(generation, host, config, &tab).await,
            None => Ok(()),
        }
    }

    /// Periodic tick: flush the delta and restart the clock
    pub async fn tick<H: Host>(&self, host: &H, config: &Config) {
        let now = host.now_ms();
        let (url, elapsed_ms) = match &mut *self.session.borrow_mut() {
            TrackingSession::Idle => return,
            TrackingSession::Tracking { url, start_ms, .. } => {
                let elapsed_ms = now - *start_ms;
                *start_ms = now;
                (url.clone(), elapsed_ms)
            }
        };

        self.flush(host, config, url, elapsed_ms).await;
    }

    /// Queue `elapsed_ms` for `url`. Non-positive time is dropped. If a drain
    /// is already running it picks the new entry up; otherwise this call
    /// drains the queue itself.
    async fn flush<H: Host>(&self, host: &H, config: &Config, url: String, elapsed_ms: i64) {
        if elapsed_ms <= 0 {
            return;
        }
        self.pending.borrow_mut().push_back(PendingFlush {
            url,
            elapsed_ms: elapsed_ms as u64,
            day: host.today(),
        });

        if self.draining.replace(true) {
            return;
        }
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(flush) = next else {
                break;
            };
            if let Err(e) = update_time(host, config, &flush.url, flush.elapsed_ms, &flush.day).await {
                log::error!("Error updating time for {}: {}", flush.url, e);
            }
        }
        self.draining.set(false);
    }
}

/// Classify `url`, add the time to the ledger and run the notification
/// checks. Returns `None` when the URL has no trackable domain.
pub async fn update_time<H: Host>(
    host: &H,
    config: &Config,
    url: &str,
    elapsed_ms: u64,
    day: &str,
) -> Result<Option<Totals>> {
    let dashboard_url = host.extension_url(&config.dashboard_path);
    let Some(domain) = domain_from_url(url, &dashboard_url) else {
        log::debug!("Not tracking {}", url);
        return Ok(None);
    };

    let category = Classifier::new(host, config).category_for(url).await;
    let totals = Ledger::new(host).add_time(day, &domain, &category, elapsed_ms).await?;
    log::debug!("+{} ms to {} ({})", elapsed_ms, domain, category);

    if let Err(e) = NotificationEvaluator::new(host, config)
        .on_ledger_updated(&category, &domain, totals)
        .await
    {
        log::warn!("Notification checks failed: {}", e);
    }
    Ok(Some(totals))
}
