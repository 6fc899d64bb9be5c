//! Events consumed by the liveness cache
//!
//! The cache never decodes bus messages itself. A caller turns each inbound
//! message into one of the two shapes below and hands it to
//! [`LivenessCache::ingest`](crate::LivenessCache::ingest).
//!
//! Asset attributes stay as free-form string maps (`aux` and `ext`) so the
//! event can be retained verbatim as the snapshot of a tracked asset.
//!
//! These are in-memory types. Only [`AssetOperation`] has a serialized
//! form, the lowercase operation name used on the bus.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Aux key holding the asset type (`device`, `rack`, ...)
pub const AUX_TYPE: &str = "type";
/// Aux key holding the device subtype (`ups`, `epdu`, `sensor`, ...)
pub const AUX_SUBTYPE: &str = "subtype";
/// Aux key holding the lifecycle status (`active`, `nonactive`, `retired`)
pub const AUX_STATUS: &str = "status";
/// Aux key holding the name of the direct parent
pub const AUX_PARENT_NAME: &str = "parent_name.1";
/// Ext key holding the port a sensor is plugged into
pub const EXT_PORT: &str = "port";

/// Asset type that qualifies for tracking
pub const DEVICE_TYPE: &str = "device";
/// Status value that retires an asset
pub const STATUS_RETIRED: &str = "retired";
/// Device subtypes the cache is able to report outages for
pub const TRACKED_SUBTYPES: [&str; 3] = ["ups", "epdu", "sensor"];

/// Operation carried by an asset lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetOperation {
    #[default]
    Create,
    Update,
    Delete,
    Retire,
    Inventory,
    /// Any operation this crate does not know about
    #[serde(other)]
    Unknown,
}

impl fmt::Display for AssetOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetOperation::Create => write!(f, "create"),
            AssetOperation::Update => write!(f, "update"),
            AssetOperation::Delete => write!(f, "delete"),
            AssetOperation::Retire => write!(f, "retire"),
            AssetOperation::Inventory => write!(f, "inventory"),
            AssetOperation::Unknown => write!(f, "unknown"),
        }
    }
}

/// A periodic metric reading emitted by a monitored device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEvent {
    /// Name of the asset the reading belongs to
    pub source: String,

    /// Metric quantity (`load.default`, `status.ups`, ...). Informational only.
    pub quantity: String,

    /// Reporting interval declared by the producer, in seconds
    pub ttl_sec: u64,

    /// Observation time in seconds since the epoch, if the producer supplied one
    pub timestamp_sec: Option<u64>,

    /// Port the reading was taken on, for sensors reported through a parent
    pub port: Option<String>,
}

impl MetricEvent {
    /// Create a reading without timestamp or port
    pub fn new(source: impl Into<String>, ttl_sec: u64) -> Self {
        Self {
            source: source.into(),
            quantity: String::new(),
            ttl_sec,
            timestamp_sec: None,
            port: None,
        }
    }

    /// Set the observation timestamp
    pub fn at(mut self, timestamp_sec: u64) -> Self {
        self.timestamp_sec = Some(timestamp_sec);
        self
    }

    /// Set the metric quantity
    pub fn with_quantity(mut self, quantity: impl Into<String>) -> Self {
        self.quantity = quantity.into();
        self
    }

    /// Set the port the reading was taken on
    pub fn on_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Effective observation time: the carried timestamp, else `now_sec`
    pub fn effective_timestamp(&self, now_sec: u64) -> u64 {
        self.timestamp_sec.unwrap_or(now_sec)
    }
}

/// An asset lifecycle change (create, update, delete, retire, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEvent {
    /// Unique asset name
    pub name: String,

    /// Lifecycle operation
    pub operation: AssetOperation,

    /// Auxiliary attributes (type, subtype, status, parent_name.1, ...)
    pub aux: BTreeMap<String, String>,

    /// Extended attributes (port, ...)
    pub ext: BTreeMap<String, String>,
}

impl AssetEvent {
    /// Create an event with no attributes
    pub fn new(name: impl Into<String>, operation: AssetOperation) -> Self {
        Self {
            name: name.into(),
            operation,
            aux: BTreeMap::new(),
            ext: BTreeMap::new(),
        }
    }

    /// Convenience constructor for a `device` asset of the given subtype
    pub fn device(name: impl Into<String>, operation: AssetOperation, subtype: &str) -> Self {
        Self::new(name, operation)
            .with_aux(AUX_TYPE, DEVICE_TYPE)
            .with_aux(AUX_SUBTYPE, subtype)
    }

    pub fn with_aux(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.aux.insert(key.into(), value.into());
        self
    }

    pub fn with_ext(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ext.insert(key.into(), value.into());
        self
    }

    /// Aux attribute lookup, empty string when absent
    pub fn aux_str(&self, key: &str) -> &str {
        self.aux.get(key).map(String::as_str).unwrap_or("")
    }

    /// Ext attribute lookup, empty string when absent
    pub fn ext_str(&self, key: &str) -> &str {
        self.ext.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn device_type(&self) -> &str {
        self.aux_str(AUX_TYPE)
    }

    pub fn subtype(&self) -> &str {
        self.aux_str(AUX_SUBTYPE)
    }

    pub fn status(&self) -> &str {
        self.aux_str(AUX_STATUS)
    }

    pub fn parent_name(&self) -> &str {
        self.aux_str(AUX_PARENT_NAME)
    }

    pub fn port(&self) -> &str {
        self.ext_str(EXT_PORT)
    }

    /// True for a delete operation or a retired status
    pub fn is_removal(&self) -> bool {
        self.operation == AssetOperation::Delete || self.status() == STATUS_RETIRED
    }

    /// True for a `device` whose subtype is one of [`TRACKED_SUBTYPES`]
    pub fn is_trackable(&self) -> bool {
        self.device_type() == DEVICE_TYPE && TRACKED_SUBTYPES.contains(&self.subtype())
    }
}

/// Every event the cache can ingest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessEvent {
    Metric(MetricEvent),
    Asset(AssetEvent),
}

impl LivenessEvent {
    /// Name of the asset this event refers to
    pub fn asset_name(&self) -> &str {
        match self {
            LivenessEvent::Metric(m) => &m.source,
            LivenessEvent::Asset(a) => &a.name,
        }
    }
}

impl From<MetricEvent> for LivenessEvent {
    fn from(event: MetricEvent) -> Self {
        LivenessEvent::Metric(event)
    }
}

impl From<AssetEvent> for LivenessEvent {
    fn from(event: AssetEvent) -> Self {
        LivenessEvent::Asset(event)
    }
}
