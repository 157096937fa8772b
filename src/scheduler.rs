/// Midnight rollover and expired-block sweeps
use crate::config::Config;
use crate::error::Result;
use crate::host::{AlarmSpec, Host, Timer};
use crate::notify::NotificationEvaluator;
use crate::rules::RuleSynchronizer;
use crate::tracker::Tracker;
use chrono::{DateTime, FixedOffset};

pub const BLOCK_CLEANUP_ALARM: &str = "blockCleanup";

/// Slack added so the timer lands just after the day boundary
const MIDNIGHT_SLACK_MS: i64 = 1000;

/// Milliseconds from `now` until just past the next local midnight.
/// Recomputed after every rollover, so a day of 23 or 25 hours is handled.
pub fn ms_until_midnight(now: &DateTime<FixedOffset>) -> u64 {
    let today = now.date_naive();
    let Some(next_midnight) = today.succ_opt().and_then(|day| day.and_hms_opt(0, 0, 0)) else {
        return 0;
    };
    let until = (next_midnight - now.naive_local()).num_milliseconds() + MIDNIGHT_SLACK_MS;
    until.max(0) as u64
}

pub struct Scheduler<'a, H> {
    host: &'a H,
    config: &'a Config,
}

impl<'a, H: Host> Scheduler<'a, H> {
    pub fn new(host: &'a H, config: &'a Config) -> Self {
        Scheduler { host, config }
    }

    pub fn arm_midnight(&self) {
        let delay_ms = ms_until_midnight(&self.host.now());
        self.host.set_timer(Timer::Midnight, delay_ms, false);
        log::debug!("Midnight rollover in {} ms", delay_ms);
    }

    /// In-process interval plus a persistent alarm; the interval is lost
    /// whenever the worker is suspended, the alarm is not.
    pub async fn arm_block_sweep(&self) -> Result<()> {
        self.host
            .set_timer(Timer::BlockSweep, self.config.block_sweep_period_ms as u64, true);

        let minutes = self.config.block_cleanup_alarm_minutes;
        self.host
            .create_alarm(
                BLOCK_CLEANUP_ALARM,
                &AlarmSpec {
                    delay_in_minutes: Some(minutes),
                    period_in_minutes: Some(minutes),
                },
            )
            .await
    }

    /// Day boundary: forget yesterday's notification flags, end the current
    /// session so it does not span two days, and re-arm for tomorrow.
    pub async fn on_midnight(&self, tracker: &Tracker) {
        log::info!("Midnight rollover");
        if let Err(e) = NotificationEvaluator::new(self.host, self.config).sweep_flags().await {
            log::warn!("Could not sweep notification flags: {}", e);
        }
        tracker.stop(self.host, self.config).await;
        self.arm_midnight();
    }

    pub async fn on_block_sweep(&self) -> Result<()> {
        let outcome = RuleSynchronizer::new(self.host, self.config).resync().await?;
        if outcome.pruned > 0 {
            log::info!("Block sweep removed {} expired site(s)", outcome.pruned);
        }
        Ok(())
    }
}
