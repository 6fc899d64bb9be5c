//! Liveness Cache: name-keyed expiration state for every tracked asset
//!
//! The cache is a pure-logic structure. It receives already-decoded events
//! together with the caller's notion of "now" and answers two questions:
//! which assets went silent past their grace period, and which sensors hang
//! off a given port of a given parent device.
//!
//! # Design
//!
//! Liveness is never stored as a state. Every query recomputes
//! `last_seen + 2 * ttl <= now` for each entry, so no background timer is
//! needed to mark anything dead. The caller owns the clock and decides how
//! often to sweep.
//!
//! The cache provides no internal locking. Callers that share it across
//! tasks must serialize access themselves.
//!
//! # Example
//!
//! ```
//! use outage_core_liveness::{
//!     AssetEvent, AssetOperation, LivenessCache, LivenessEvent, MetricEvent,
//! };
//!
//! let mut cache = LivenessCache::new();
//! cache.set_default_ttl(60);
//!
//! let ups = AssetEvent::device("ups-1", AssetOperation::Create, "ups");
//! cache.ingest(LivenessEvent::Asset(ups), 1_000).unwrap();
//!
//! let reading = MetricEvent::new("ups-1", 30).at(1_010);
//! cache.ingest(LivenessEvent::Metric(reading), 1_010).unwrap();
//!
//! assert!(cache.dead_assets(1_069).is_empty());
//! assert_eq!(cache.dead_assets(1_070), vec!["ups-1".to_string()]);
//! ```

use crate::entry::ExpirationEntry;
use crate::error::{LivenessError, Result};
use crate::event::{AssetEvent, LivenessEvent, MetricEvent};
use std::collections::HashMap;
use tracing::{debug, info};

/// Default TTL for newly tracked assets [s].
///
/// Alerts fire after `2 * ttl`, so 450 s puts the first alert at 15 minutes.
pub const DEFAULT_TTL_SEC: u64 = 15 * 60 / 2;

/// Configuration for a [`LivenessCache`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessConfig {
    /// TTL seeded into every newly created entry [s]
    pub default_ttl_sec: u64,

    /// Emit per-operation debug tracing
    pub verbose: bool,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            default_ttl_sec: DEFAULT_TTL_SEC,
            verbose: false,
        }
    }
}

/// What [`LivenessCache::ingest`] did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new asset started being tracked
    Created { expires_at: u64 },

    /// A tracked asset was removed
    Removed,

    /// A metric was applied to a tracked asset
    Refreshed { ttl_sec: u64, expires_at: u64 },

    /// The metric's TTL was applied but its timestamp lies in the future
    FromFuture { timestamp_sec: u64, now_sec: u64 },

    /// A metric for an asset that is not tracked
    Untracked,

    /// A lifecycle event that changes nothing (duplicate, unknown, untracked type)
    Ignored,
}

impl IngestOutcome {
    /// True if the event modified the cache contents or an entry
    pub fn is_change(&self) -> bool {
        !matches!(self, IngestOutcome::Untracked | IngestOutcome::Ignored)
    }
}

/// Map of asset name to expiration state
#[derive(Debug, Default)]
pub struct LivenessCache {
    entries: HashMap<String, ExpirationEntry>,
    config: LivenessConfig,
}

impl LivenessCache {
    /// Create an empty cache with the default configuration
    pub fn new() -> Self {
        Self::with_config(LivenessConfig::default())
    }

    /// Create an empty cache with the given configuration
    pub fn with_config(config: LivenessConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
        }
    }

    /// Create a cache with room for `capacity` assets.
    ///
    /// Fails without producing a cache if the memory cannot be reserved.
    pub fn try_with_capacity(config: LivenessConfig, capacity: usize) -> Result<Self> {
        let mut entries = HashMap::new();
        entries
            .try_reserve(capacity)
            .map_err(|e| LivenessError::allocation(capacity, e))?;
        Ok(Self { entries, config })
    }

    /// TTL given to assets created from now on [s]
    pub fn default_ttl(&self) -> u64 {
        self.config.default_ttl_sec
    }

    /// Change the TTL given to assets created from now on.
    ///
    /// Existing entries keep their TTL.
    pub fn set_default_ttl(&mut self, seconds: u64) {
        self.config.default_ttl_sec = seconds;
    }

    pub fn is_verbose(&self) -> bool {
        self.config.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.config.verbose = verbose;
    }

    /// Apply an event observed at `now_sec`
    pub fn ingest(&mut self, event: LivenessEvent, now_sec: u64) -> Result<IngestOutcome> {
        match event {
            LivenessEvent::Metric(metric) => Ok(self.ingest_metric(&metric, now_sec)),
            LivenessEvent::Asset(asset) => self.ingest_asset(asset, now_sec),
        }
    }

    fn ingest_metric(&mut self, metric: &MetricEvent, now_sec: u64) -> IngestOutcome {
        let verbose = self.config.verbose;

        // Unknown assets are not monitored
        let Some(entry) = self.entries.get_mut(&metric.source) else {
            return IngestOutcome::Untracked;
        };

        entry.tighten_ttl(metric.ttl_sec);
        if verbose {
            debug!(asset = %metric.source, ttl_sec = entry.ttl_sec(), "ttl updated");
        }

        let timestamp_sec = metric.effective_timestamp(now_sec);
        if timestamp_sec > now_sec {
            info!(
                "metric '{}@{}' from future ({}s > now {}s), ignoring timestamp",
                metric.quantity, metric.source, timestamp_sec, now_sec
            );
            return IngestOutcome::FromFuture {
                timestamp_sec,
                now_sec,
            };
        }

        entry.advance_last_seen(timestamp_sec);
        if verbose {
            debug!(
                asset = %metric.source,
                last_seen_sec = entry.last_seen_sec(),
                expires_at = entry.expires_at(),
                "last seen updated"
            );
        }

        IngestOutcome::Refreshed {
            ttl_sec: entry.ttl_sec(),
            expires_at: entry.expires_at(),
        }
    }

    fn ingest_asset(&mut self, asset: AssetEvent, now_sec: u64) -> Result<IngestOutcome> {
        if self.config.verbose {
            debug!(asset = %asset.name, operation = %asset.operation, "asset event");
        }

        if asset.is_removal() {
            return Ok(if self.delete(&asset.name) {
                IngestOutcome::Removed
            } else {
                IngestOutcome::Ignored
            });
        }

        // Only ups, epdu and sensor devices are tracked; known assets keep
        // the attributes they were created with.
        if !asset.is_trackable() || self.entries.contains_key(&asset.name) {
            return Ok(IngestOutcome::Ignored);
        }

        self.entries
            .try_reserve(1)
            .map_err(|e| LivenessError::allocation(1, e))?;

        let mut entry = ExpirationEntry::new(self.config.default_ttl_sec, asset);
        entry.advance_last_seen(now_sec);
        let expires_at = entry.expires_at();

        if self.config.verbose {
            debug!(
                asset = %entry.snapshot().name,
                now_sec,
                expires_at,
                "asset added"
            );
        }

        self.entries.insert(entry.snapshot().name.clone(), entry);
        Ok(IngestOutcome::Created { expires_at })
    }

    /// Stop tracking `asset_name`. Returns `false` if it was not tracked.
    pub fn delete(&mut self, asset_name: &str) -> bool {
        let removed = self.entries.remove(asset_name).is_some();
        if removed && self.config.verbose {
            debug!(asset = %asset_name, "asset removed");
        }
        removed
    }

    /// Names of every asset whose expiration time is at or before `now_sec`.
    ///
    /// Order is unspecified.
    pub fn dead_assets(&self, now_sec: u64) -> Vec<String> {
        if self.config.verbose {
            debug!(now_sec, tracked = self.entries.len(), "collecting dead assets");
        }

        self.entries
            .iter()
            .filter(|(name, entry)| {
                if self.config.verbose {
                    debug!(
                        asset = %name,
                        ttl_sec = entry.ttl_sec(),
                        expires_at = entry.expires_at(),
                        "checking expiration"
                    );
                }
                entry.is_expired(now_sec)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names of assets plugged into `port` of `parent_name`.
    ///
    /// Matches on the attributes captured at creation time. Order is
    /// unspecified and the result may be empty.
    pub fn sensors_on_port(&self, port: &str, parent_name: &str) -> Vec<String> {
        self.entries
            .values()
            .filter(|entry| {
                let snapshot = entry.snapshot();
                snapshot.port() == port && snapshot.parent_name() == parent_name
            })
            .map(|entry| entry.snapshot().name.clone())
            .collect()
    }

    pub fn get(&self, asset_name: &str) -> Option<&ExpirationEntry> {
        self.entries.get(asset_name)
    }

    pub fn contains(&self, asset_name: &str) -> bool {
        self.entries.contains_key(asset_name)
    }

    /// Expiration time of a tracked asset
    pub fn expires_at(&self, asset_name: &str) -> Option<u64> {
        self.entries.get(asset_name).map(ExpirationEntry::expires_at)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExpirationEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Number of tracked assets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
