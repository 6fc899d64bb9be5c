/*!
 * Outage alerts
 *
 * The liveness cache only reports which assets are dead right now. This
 * module turns successive dead sets into alert transitions: an asset that
 * becomes dead raises an `ACTIVE` alert once, and the alert is `RESOLVED`
 * when the asset reports again or stops being tracked.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{AgentError, Result};

/// Prefix of every outage rule name
pub const RULE_PREFIX: &str = "outage@";

/// State carried by an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertState {
    Active,
    Resolved,
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertState::Active => write!(f, "ACTIVE"),
            AlertState::Resolved => write!(f, "RESOLVED"),
        }
    }
}

/// A single outage alert transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageAlert {
    /// Rule name, `outage@<asset>`
    pub rule: String,
    pub asset: String,
    pub state: AlertState,
    pub severity: String,
    pub description: String,
    /// Time the transition was detected [s since epoch]
    pub time_sec: u64,
}

impl OutageAlert {
    pub fn active(asset: &str, severity: &str, time_sec: u64) -> Self {
        Self {
            rule: rule_name(asset),
            asset: asset.to_string(),
            state: AlertState::Active,
            severity: severity.to_string(),
            description: "Device does not provide expected data. It may be offline or not correctly configured.".to_string(),
            time_sec,
        }
    }

    pub fn resolved(asset: &str, severity: &str, time_sec: u64) -> Self {
        Self {
            rule: rule_name(asset),
            asset: asset.to_string(),
            state: AlertState::Resolved,
            severity: severity.to_string(),
            description: "Device is providing data again.".to_string(),
            time_sec,
        }
    }
}

/// Rule name used for an asset's outage alert
pub fn rule_name(asset: &str) -> String {
    format!("{}{}", RULE_PREFIX, asset)
}

/// Remembers which assets currently have an active outage alert
#[derive(Debug, Clone)]
pub struct AlertTracker {
    active: HashSet<String>,
    severity: String,
}

impl AlertTracker {
    pub fn new(severity: impl Into<String>) -> Self {
        Self {
            active: HashSet::new(),
            severity: severity.into(),
        }
    }

    /// Compare the current dead set with the active alerts.
    ///
    /// Returns `ACTIVE` alerts for newly dead assets followed by `RESOLVED`
    /// alerts for assets that came back. Both groups are sorted by asset name.
    pub fn evaluate(&mut self, dead: &[String], now_sec: u64) -> Vec<OutageAlert> {
        let dead_set: HashSet<&str> = dead.iter().map(String::as_str).collect();

        let mut raised: Vec<&str> = dead_set
            .iter()
            .copied()
            .filter(|asset| !self.active.contains(*asset))
            .collect();
        raised.sort_unstable();

        let mut recovered: Vec<String> = self
            .active
            .iter()
            .filter(|asset| !dead_set.contains(asset.as_str()))
            .cloned()
            .collect();
        recovered.sort_unstable();

        let mut alerts = Vec::with_capacity(raised.len() + recovered.len());
        for asset in raised {
            self.active.insert(asset.to_string());
            alerts.push(OutageAlert::active(asset, &self.severity, now_sec));
        }
        for asset in recovered {
            self.active.remove(&asset);
            alerts.push(OutageAlert::resolved(&asset, &self.severity, now_sec));
        }
        alerts
    }

    /// Drop an asset that is no longer tracked, resolving its alert if any
    pub fn forget(&mut self, asset: &str, now_sec: u64) -> Option<OutageAlert> {
        self.active
            .remove(asset)
            .then(|| OutageAlert::resolved(asset, &self.severity, now_sec))
    }

    pub fn is_active(&self, asset: &str) -> bool {
        self.active.contains(asset)
    }

    /// Number of assets with an active alert
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

/// Destination for outage alerts
#[async_trait]
pub trait AlertSink: Send {
    /// Publish a single alert
    async fn publish(&mut self, alert: &OutageAlert) -> Result<()>;

    /// Flush any buffered alerts
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes each alert as one JSON document per line
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> AlertSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish(&mut self, alert: &OutageAlert) -> Result<()> {
        let mut line = serde_json::to_vec(alert)
            .map_err(|e| AgentError::Alert(format!("Failed to encode alert: {}", e)))?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Keeps alerts in memory (embedding and tests)
#[derive(Debug, Default)]
pub struct MemorySink {
    alerts: Vec<OutageAlert>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> &[OutageAlert] {
        &self.alerts
    }

    /// Take all collected alerts
    pub fn drain(&mut self) -> Vec<OutageAlert> {
        std::mem::take(&mut self.alerts)
    }
}

#[async_trait]
impl AlertSink for MemorySink {
    async fn publish(&mut self, alert: &OutageAlert) -> Result<()> {
        self.alerts.push(alert.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(dead: &[&str]) -> Vec<String> {
        dead.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_dead_assets_raise_once() {
        let mut tracker = AlertTracker::new("CRITICAL");

        let alerts = tracker.evaluate(&names(&["ups-2", "ups-1"]), 100);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].asset, "ups-1");
        assert_eq!(alerts[1].asset, "ups-2");
        assert!(alerts.iter().all(|a| a.state == AlertState::Active));

        // Still dead: nothing new
        assert!(tracker.evaluate(&names(&["ups-1", "ups-2"]), 130).is_empty());
        assert_eq!(tracker.active_count(), 2);
    }

    #[test]
    fn test_recovered_assets_resolve() {
        let mut tracker = AlertTracker::new("CRITICAL");
        tracker.evaluate(&names(&["ups-1", "epdu-1"]), 100);

        let alerts = tracker.evaluate(&names(&["epdu-1", "sensor-1"]), 130);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].asset, "sensor-1");
        assert_eq!(alerts[0].state, AlertState::Active);
        assert_eq!(alerts[1].asset, "ups-1");
        assert_eq!(alerts[1].state, AlertState::Resolved);
        assert_eq!(alerts[1].time_sec, 130);

        assert!(!tracker.is_active("ups-1"));
        assert!(tracker.is_active("epdu-1"));
    }

    #[test]
    fn test_forget_resolves_active_alert_only() {
        let mut tracker = AlertTracker::new("CRITICAL");
        tracker.evaluate(&names(&["ups-1"]), 100);

        let resolved = tracker.forget("ups-1", 110).unwrap();
        assert_eq!(resolved.state, AlertState::Resolved);
        assert_eq!(resolved.rule, "outage@ups-1");

        assert!(tracker.forget("ups-1", 120).is_none());
        assert!(tracker.forget("never-seen", 120).is_none());
    }

    #[test]
    fn test_alert_json_shape() {
        let alert = OutageAlert::active("ups-1", "CRITICAL", 42);
        let json = serde_json::to_value(&alert).unwrap();

        assert_eq!(json["rule"], "outage@ups-1");
        assert_eq!(json["state"], "ACTIVE");
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["time_sec"], 42);
    }

    #[tokio::test]
    async fn test_json_lines_sink() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.publish(&OutageAlert::active("a", "CRITICAL", 1))
            .await
            .unwrap();
        sink.publish(&OutageAlert::resolved("a", "CRITICAL", 2))
            .await
            .unwrap();
        sink.flush().await.unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: OutageAlert = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.state, AlertState::Resolved);
        assert_eq!(second.time_sec, 2);
    }

    #[tokio::test]
    async fn test_memory_sink_drain() {
        let mut sink = MemorySink::new();
        sink.publish(&OutageAlert::active("a", "WARNING", 1))
            .await
            .unwrap();
        assert_eq!(sink.alerts().len(), 1);

        let drained = sink.drain();
        assert_eq!(drained[0].severity, "WARNING");
        assert!(sink.alerts().is_empty());
    }
}
