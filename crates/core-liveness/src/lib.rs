//! Outage Core Liveness: Pure-logic outage detection cache
//!
//! # Overview
//!
//! This crate tracks, per monitored device, the shortest reporting interval
//! it has declared and the last time it was seen. From that it answers:
//!
//! - **Dead set**: which devices have been silent longer than `2 * ttl`
//! - **Port lookup**: which sensors are plugged into a port of a parent device
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - Message buses and wire formats
//! - Wall clocks (callers pass `now` explicitly)
//! - Alerting (callers decide what an outage means)
//!
//! # Architecture
//!
//! ```text
//!   decoded bus message
//!           │
//!           ▼
//! ┌─────────────────────────────────────────┐
//! │       LivenessEvent                     │  ← Metric | Asset
//! └─────────────┬───────────────────────────┘
//!               │ ingest(event, now)
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       LivenessCache                     │  ← name → ExpirationEntry
//! │  (create / delete / tighten / advance)  │
//! └─────────────┬───────────────────────────┘
//!               │
//!     dead_assets(now)   sensors_on_port(port, parent)
//! ```
//!
//! # Example
//!
//! ```
//! use outage_core_liveness::prelude::*;
//!
//! let mut cache = LivenessCache::new();
//! cache.set_default_ttl(2);
//!
//! cache
//!     .ingest(AssetEvent::device("X", AssetOperation::Create, "ups").into(), 0)
//!     .unwrap();
//!
//! assert!(cache.dead_assets(3).is_empty());
//! assert_eq!(cache.dead_assets(4), vec!["X".to_string()]);
//! ```

pub mod cache;
pub mod entry;
pub mod error;
pub mod event;

// Re-export main types for convenience
pub use cache::{IngestOutcome, LivenessCache, LivenessConfig, DEFAULT_TTL_SEC};
pub use entry::ExpirationEntry;
pub use error::LivenessError;
pub use event::{AssetEvent, AssetOperation, LivenessEvent, MetricEvent};

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::cache::{IngestOutcome, LivenessCache, LivenessConfig};
    pub use super::entry::ExpirationEntry;
    pub use super::error::LivenessError;
    pub use super::event::{AssetEvent, AssetOperation, LivenessEvent, MetricEvent};
}
