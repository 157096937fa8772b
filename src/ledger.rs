/// Day-bucketed time ledger (`timeData`)
use crate::error::Result;
use crate::host::Store;
use crate::storage::{keys, StoreExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Time accumulated during one local day
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DayRecord {
    /// Cleaned domain -> milliseconds
    #[serde(default)]
    pub sites: BTreeMap<String, u64>,
    /// Category name -> milliseconds
    #[serde(default)]
    pub categories: BTreeMap<String, u64>,
}

impl DayRecord {
    pub fn site_total(&self) -> u64 {
        self.sites.values().sum()
    }

    pub fn category_total(&self) -> u64 {
        self.categories.values().sum()
    }
}

/// Totals right after a flush, handed to the notification checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub site_ms: u64,
    pub category_ms: u64,
}

/// `YYYY-MM-DD` -> record. Day entries are created on first write and only
/// removed by an explicit reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct TimeLedger {
    pub days: BTreeMap<String, DayRecord>,
}

impl TimeLedger {
    pub fn new() -> Self {
        TimeLedger {
            days: BTreeMap::new(),
        }
    }

    /// Add `elapsed_ms` to both the site and its category, keeping the
    /// per-day site and category sums equal.
    pub fn record(&mut self, day: &str, site: &str, category: &str, elapsed_ms: u64) -> Totals {
        let record = self.days.entry(day.to_string()).or_default();

        let site_ms = record.sites.entry(site.to_string()).or_insert(0);
        *site_ms += elapsed_ms;
        let site_ms = *site_ms;

        let category_ms = record.categories.entry(category.to_string()).or_insert(0);
        *category_ms += elapsed_ms;

        Totals {
            site_ms,
            category_ms: *category_ms,
        }
    }

    pub fn day(&self, day: &str) -> Option<&DayRecord> {
        self.days.get(day)
    }

    pub fn category_ms(&self, day: &str, category: &str) -> u64 {
        self.day(day)
            .and_then(|record| record.categories.get(category))
            .copied()
            .unwrap_or(0)
    }
}

/// Read-modify-write access to the persisted ledger
pub struct Ledger<'a, S> {
    store: &'a S,
}

impl<'a, S: Store> Ledger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Ledger { store }
    }

    pub async fn load(&self) -> Result<TimeLedger> {
        self.store.load_or_default(keys::TIME_DATA).await
    }

    pub async fn add_time(
        &self,
        day: &str,
        site: &str,
        category: &str,
        elapsed_ms: u64,
    ) -> Result<Totals> {
        let mut ledger = self.load().await?;
        let totals = ledger.record(day, site, category, elapsed_ms);
        self.store.save(keys::TIME_DATA, &ledger).await?;
        Ok(totals)
    }

    pub async fn reset(&self) -> Result<()> {
        self.store.remove_key(keys::TIME_DATA).await
    }
}
