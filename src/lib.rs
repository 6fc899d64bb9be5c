/*!
 * Outage - liveness-based outage detection agent
 *
 * Watches the asset and metric streams of monitored power devices and
 * raises an alert when a device stops reporting:
 * - Tracks UPS, ePDU and sensor assets from lifecycle events
 * - Keeps the shortest reporting interval seen per device
 * - Declares a device dead after two missed reporting cycles
 * - Credits port-attached sensors through their parent's readings
 * - Publishes ACTIVE / RESOLVED outage alerts as JSON lines
 *
 * The detection logic itself lives in `outage-core-liveness`.
 */

pub mod agent;
pub mod alert;
pub mod config;
pub mod error;
pub mod logging;
pub mod wire;

// Re-export commonly used types
pub use agent::{AgentStats, Clock, ManualClock, OutageAgent, SystemClock};
pub use alert::{AlertSink, AlertState, AlertTracker, JsonLinesSink, MemorySink, OutageAlert};
pub use config::{AgentConfig, LogLevel};
pub use error::{AgentError, Result};
pub use outage_core_liveness as liveness;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
