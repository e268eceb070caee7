//! Time-windowed alert cache and region flagging
//!
//! The cache lock is held across the upstream call, so concurrent misses
//! wait for the one fetch in flight and then read its result. A failed
//! fetch leaves the cache empty, so the next caller fetches again.

use crate::feed::{extract_region_codes, AlertFeed};
use crate::{AlertFeedConfig, Result};
use chrono::{DateTime, Utc};
use resilience_pipeline::CriRecord;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Region identifiers under an active alert at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSnapshot {
    pub regions: BTreeSet<String>,
    pub alert_count: usize,
    pub fetched_at: DateTime<Utc>,
}

impl AlertSnapshot {
    pub fn contains(&self, fips: &str) -> bool {
        self.regions.contains(fips)
    }
}

/// Cache entry with expiry
struct CacheEntry {
    snapshot: Arc<AlertSnapshot>,
    expires_at: Instant,
}

pub struct AlertOverlay<F> {
    feed: F,
    state_prefix: String,
    ttl: Duration,
    cache: Mutex<Option<CacheEntry>>,
}

impl<F: AlertFeed> AlertOverlay<F> {
    pub fn new(feed: F, state_prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            feed,
            state_prefix: state_prefix.into(),
            ttl,
            cache: Mutex::new(None),
        }
    }

    pub fn with_config(feed: F, config: &AlertFeedConfig) -> Self {
        Self::new(feed, config.state_prefix.clone(), config.cache_ttl())
    }

    /// Alerted regions, served from cache inside the window
    pub async fn active_regions(&self) -> Result<Arc<AlertSnapshot>> {
        let mut cache = self.cache.lock().await;

        if let Some(entry) = cache.as_ref() {
            if entry.expires_at > Instant::now() {
                return Ok(entry.snapshot.clone());
            }
        }

        let alerts = match self.feed.fetch_active().await {
            Ok(alerts) => alerts,
            Err(e) => {
                warn!("Alert feed fetch failed: {}", e);
                return Err(e);
            }
        };

        let snapshot = Arc::new(AlertSnapshot {
            regions: extract_region_codes(&alerts, &self.state_prefix),
            alert_count: alerts.len(),
            fetched_at: Utc::now(),
        });
        debug!(
            "Cached {} alerted regions from {} alerts",
            snapshot.regions.len(),
            snapshot.alert_count
        );

        *cache = Some(CacheEntry {
            snapshot: snapshot.clone(),
            expires_at: Instant::now() + self.ttl,
        });

        Ok(snapshot)
    }

    /// Drop the cached snapshot
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}

/// A region annotated with its alert status
#[derive(Debug, Clone, Serialize)]
pub struct FlaggedRegion<'a> {
    #[serde(flatten)]
    pub record: &'a CriRecord,
    pub alerted: bool,
}

/// Annotate `records` with alert status; the records are not modified
pub fn flag_regions<'a>(snapshot: &AlertSnapshot, records: &[&'a CriRecord]) -> Vec<FlaggedRegion<'a>> {
    records
        .iter()
        .map(|&record| FlaggedRegion {
            record,
            alerted: snapshot.contains(&record.fips()),
        })
        .collect()
}
