//! Expiration Entry: per-asset liveness state
//!
//! Each tracked asset carries the shortest reporting interval it has ever
//! declared and the latest time it was observed. From those two numbers the
//! entry derives when the asset should be considered unresponsive:
//!
//! ```text
//! expires_at = last_seen_sec + 2 * ttl_sec
//! ```
//!
//! The factor of two is the grace period: an asset is declared dead only
//! after missing roughly two reporting cycles.
//!
//! # Example
//!
//! ```
//! use outage_core_liveness::{AssetEvent, AssetOperation, ExpirationEntry};
//!
//! let snapshot = AssetEvent::device("ups-1", AssetOperation::Create, "ups");
//! let mut entry = ExpirationEntry::new(300, snapshot);
//!
//! entry.tighten_ttl(60);
//! entry.advance_last_seen(1_000);
//! assert_eq!(entry.expires_at(), 1_120);
//!
//! // Older readings never move the expiration backwards
//! entry.advance_last_seen(900);
//! assert_eq!(entry.last_seen_sec(), 1_000);
//! ```

use crate::event::AssetEvent;

/// Liveness state of a single tracked asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirationEntry {
    /// Minimal TTL seen for this asset [s]
    ttl_sec: u64,
    /// Latest accepted observation [s]
    last_seen_sec: u64,
    /// Creation payload, kept for port/parent lookups
    snapshot: AssetEvent,
}

impl ExpirationEntry {
    /// Create an entry that has never been seen, seeded with `default_ttl_sec`
    pub fn new(default_ttl_sec: u64, snapshot: AssetEvent) -> Self {
        Self {
            ttl_sec: default_ttl_sec,
            last_seen_sec: 0,
            snapshot,
        }
    }

    /// Move the last-seen time forward to `candidate_sec`.
    ///
    /// A candidate older than or equal to the recorded value is ignored, so a
    /// long-window average reported with an old timestamp cannot fabricate an
    /// outage. Returns `true` if the value changed.
    pub fn advance_last_seen(&mut self, candidate_sec: u64) -> bool {
        if candidate_sec > self.last_seen_sec {
            self.last_seen_sec = candidate_sec;
            true
        } else {
            false
        }
    }

    /// Lower the TTL to `candidate_ttl` if it is shorter than the current one.
    ///
    /// An asset may publish several metric streams; alerting follows the
    /// fastest of them. Returns `true` if the value changed.
    pub fn tighten_ttl(&mut self, candidate_ttl: u64) -> bool {
        if candidate_ttl < self.ttl_sec {
            self.ttl_sec = candidate_ttl;
            true
        } else {
            false
        }
    }

    /// Instant at which the asset becomes dead: `last_seen + 2 * ttl`
    pub fn expires_at(&self) -> u64 {
        self.last_seen_sec.saturating_add(self.ttl_sec.saturating_mul(2))
    }

    /// Whether the asset is dead at `now_sec`
    pub fn is_expired(&self, now_sec: u64) -> bool {
        self.expires_at() <= now_sec
    }

    pub fn ttl_sec(&self) -> u64 {
        self.ttl_sec
    }

    pub fn last_seen_sec(&self) -> u64 {
        self.last_seen_sec
    }

    /// The retained creation payload
    pub fn snapshot(&self) -> &AssetEvent {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AssetOperation;

    fn entry(ttl: u64) -> ExpirationEntry {
        ExpirationEntry::new(ttl, AssetEvent::device("ups-1", AssetOperation::Create, "ups"))
    }

    #[test]
    fn test_new_entry() {
        let e = entry(10);
        assert_eq!(e.ttl_sec(), 10);
        assert_eq!(e.last_seen_sec(), 0);
        assert_eq!(e.expires_at(), 20);
        assert_eq!(e.snapshot().name, "ups-1");
    }

    #[test]
    fn test_ttl_only_decreases() {
        let mut e = entry(10);

        assert!(!e.tighten_ttl(15));
        assert_eq!(e.ttl_sec(), 10);

        assert!(e.tighten_ttl(3));
        assert_eq!(e.ttl_sec(), 3);

        assert!(!e.tighten_ttl(3));
        assert!(!e.tighten_ttl(7));
        assert_eq!(e.ttl_sec(), 3);
    }

    #[test]
    fn test_last_seen_only_increases() {
        let mut e = entry(10);

        assert!(e.advance_last_seen(100));
        assert!(!e.advance_last_seen(50));
        assert!(!e.advance_last_seen(100));
        assert_eq!(e.last_seen_sec(), 100);

        assert!(e.advance_last_seen(101));
        assert_eq!(e.last_seen_sec(), 101);
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let mut e = entry(5);
        e.advance_last_seen(100);

        assert_eq!(e.expires_at(), 110);
        assert!(!e.is_expired(109));
        assert!(e.is_expired(110));
        assert!(e.is_expired(111));
    }

    #[test]
    fn test_expires_at_saturates() {
        let mut e = entry(u64::MAX);
        e.advance_last_seen(10);
        assert_eq!(e.expires_at(), u64::MAX);
    }
}
