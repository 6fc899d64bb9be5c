//! Outage Agent: the dispatcher loop
//!
//! The agent owns the liveness cache and is its only user, so the cache
//! needs no locking. A single task alternates between two duties:
//!
//! - **Ingest:** decode each bus line and feed it to the cache
//! - **Sweep:** every `sweep_interval_secs`, collect the dead set and turn
//!   it into alert transitions
//!
//! ```text
//!  bus lines ──decode──> LivenessCache ──dead_assets──> AlertTracker ──> AlertSink
//!                              ▲                                          │
//!                              └──────────── interval tick ───────────────┘
//! ```

use outage_core_liveness::{IngestOutcome, LivenessCache, LivenessEvent, MetricEvent};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::alert::{AlertSink, AlertState, AlertTracker, OutageAlert};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::wire;

/// Room reserved in the cache up front
const INITIAL_CAPACITY: usize = 64;

/// Source of the current time, in seconds since the epoch
pub trait Clock: Send + Sync {
    fn now_sec(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_sec(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(now_sec: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now_sec)),
        }
    }

    pub fn set(&self, now_sec: u64) {
        self.now.store(now_sec, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_sec(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Counters collected while the agent runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentStats {
    pub lines_read: u64,
    pub events_ingested: u64,
    pub decode_failures: u64,
    pub sensor_refreshes: u64,
    pub sweeps: u64,
    pub alerts_raised: u64,
    pub alerts_resolved: u64,
}

impl AgentStats {
    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} lines, {} events, {} decode failures, {} sweeps, {} alerts raised, {} resolved",
            self.lines_read,
            self.events_ingested,
            self.decode_failures,
            self.sweeps,
            self.alerts_raised,
            self.alerts_resolved
        )
    }
}

/// Feeds bus events into the liveness cache and publishes outage alerts
pub struct OutageAgent<S, C = SystemClock> {
    cache: LivenessCache,
    tracker: AlertTracker,
    sink: S,
    clock: C,
    sweep_interval: Duration,
    stats: AgentStats,
}

impl<S, C> OutageAgent<S, C>
where
    S: AlertSink,
    C: Clock,
{
    /// Create an agent from a validated configuration
    pub fn new(config: &AgentConfig, sink: S, clock: C) -> Result<Self> {
        config.validate()?;

        let cache = LivenessCache::try_with_capacity(config.liveness(), INITIAL_CAPACITY)?;

        Ok(Self {
            cache,
            tracker: AlertTracker::new(config.alert_severity.clone()),
            sink,
            clock,
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            stats: AgentStats::default(),
        })
    }

    /// Apply a decoded event.
    ///
    /// A metric that carries a port is also credited to every sensor plugged
    /// into that port of the metric's source, since sensor readings travel
    /// through their parent device.
    pub async fn handle_event(&mut self, event: LivenessEvent) -> Result<IngestOutcome> {
        let now = self.clock.now_sec();
        let asset_name = event.asset_name().to_string();
        let fanout = match &event {
            LivenessEvent::Metric(metric) if metric.port.is_some() => Some(metric.clone()),
            _ => None,
        };

        let outcome = self.cache.ingest(event, now)?;
        self.stats.events_ingested += 1;
        debug!(asset = %asset_name, ?outcome, "event ingested");

        if outcome == IngestOutcome::Removed {
            if let Some(alert) = self.tracker.forget(&asset_name, now) {
                self.publish(alert).await?;
            }
        }

        if let Some(metric) = fanout {
            self.refresh_sensors(metric, now)?;
        }

        Ok(outcome)
    }

    fn refresh_sensors(&mut self, metric: MetricEvent, now: u64) -> Result<()> {
        let Some(port) = metric.port.as_deref() else {
            return Ok(());
        };

        for sensor in self.cache.sensors_on_port(port, &metric.source) {
            if sensor == metric.source {
                continue;
            }
            let reading = MetricEvent {
                source: sensor,
                port: None,
                ..metric.clone()
            };
            self.cache.ingest(LivenessEvent::Metric(reading), now)?;
            self.stats.sensor_refreshes += 1;
        }
        Ok(())
    }

    /// Decode and apply one bus line. Malformed lines are logged and skipped.
    pub async fn handle_line(&mut self, line: &str) -> Result<()> {
        self.stats.lines_read += 1;

        match wire::decode_line(line) {
            Ok(Some(event)) => self.handle_event(event).await.map(|_| ()),
            Ok(None) => Ok(()),
            Err(e) if e.is_recoverable() => {
                self.stats.decode_failures += 1;
                warn!("Skipping undecodable message: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Query the dead set and publish the resulting alert transitions
    pub async fn sweep(&mut self) -> Result<Vec<OutageAlert>> {
        let now = self.clock.now_sec();
        let dead = self.cache.dead_assets(now);
        let alerts = self.tracker.evaluate(&dead, now);

        self.stats.sweeps += 1;
        debug!(
            now_sec = now,
            tracked = self.cache.len(),
            dead = dead.len(),
            transitions = alerts.len(),
            "sweep finished"
        );

        for alert in &alerts {
            self.publish(alert.clone()).await?;
        }
        if !alerts.is_empty() {
            self.sink.flush().await?;
        }

        Ok(alerts)
    }

    async fn publish(&mut self, alert: OutageAlert) -> Result<()> {
        match alert.state {
            AlertState::Active => {
                self.stats.alerts_raised += 1;
                warn!("Outage detected: {} is not responding", alert.asset);
            }
            AlertState::Resolved => {
                self.stats.alerts_resolved += 1;
                info!("Outage resolved: {}", alert.asset);
            }
        }
        self.sink.publish(&alert).await
    }

    /// Process `input` until it ends, sweeping on every interval tick.
    ///
    /// A final sweep runs once the input is exhausted.
    pub async fn run<R>(&mut self, input: R) -> Result<AgentStats>
    where
        R: AsyncBufRead + Unpin,
    {
        info!(
            "Outage agent active | Default TTL: {}s | Sweep Interval: {}s",
            self.cache.default_ttl(),
            self.sweep_interval.as_secs()
        );

        let mut lines = input.lines();
        let mut ticker = tokio::time::interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line).await?,
                    None => break,
                },
                _ = ticker.tick() => {
                    self.sweep().await?;
                }
            }
        }

        self.sweep().await?;
        self.sink.flush().await?;
        info!("Input exhausted: {}", self.stats.summary());

        Ok(self.stats.clone())
    }

    pub fn cache(&self) -> &LivenessCache {
        &self.cache
    }

    pub fn tracker(&self) -> &AlertTracker {
        &self.tracker
    }

    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::MemorySink;
    use crate::error::AgentError;
    use crate::logging::init_test_logging;
    use outage_core_liveness::{AssetEvent, AssetOperation};

    fn agent(ttl: u64, clock: &ManualClock) -> OutageAgent<MemorySink, ManualClock> {
        init_test_logging();
        let config = AgentConfig {
            default_ttl_sec: ttl,
            ..Default::default()
        };
        OutageAgent::new(&config, MemorySink::new(), clock.clone()).unwrap()
    }

    const UPS: &str =
        r#"{"kind":"asset","name":"ups-1","operation":"create","aux":{"type":"device","subtype":"ups"}}"#;

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new(10);
        let other = clock.clone();
        clock.advance(5);
        assert_eq!(other.now_sec(), 15);
        other.set(100);
        assert_eq!(clock.now_sec(), 100);
    }

    #[test]
    fn test_system_clock_is_past_2020() {
        assert!(SystemClock.now_sec() > 1_577_836_800);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = AgentConfig {
            sweep_interval_secs: 0,
            ..Default::default()
        };
        let result = OutageAgent::new(&config, MemorySink::new(), ManualClock::new(0));
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[tokio::test]
    async fn test_sweep_raises_and_resolves() {
        let clock = ManualClock::new(1_000);
        let mut agent = agent(60, &clock);
        agent.handle_line(UPS).await.unwrap();

        clock.set(1_119);
        assert!(agent.sweep().await.unwrap().is_empty());

        clock.set(1_120);
        let alerts = agent.sweep().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].state, AlertState::Active);
        assert_eq!(alerts[0].rule, "outage@ups-1");

        // Still dead: no duplicate alert
        clock.set(1_150);
        assert!(agent.sweep().await.unwrap().is_empty());

        agent
            .handle_line(r#"{"kind":"metric","source":"ups-1","ttl":60}"#)
            .await
            .unwrap();
        let alerts = agent.sweep().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].state, AlertState::Resolved);

        assert_eq!(agent.stats().alerts_raised, 1);
        assert_eq!(agent.stats().alerts_resolved, 1);
        assert_eq!(agent.sink().alerts().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_resolves_active_alert() {
        let clock = ManualClock::new(0);
        let mut agent = agent(1, &clock);
        agent.handle_line(UPS).await.unwrap();

        clock.set(10);
        agent.sweep().await.unwrap();
        assert!(agent.tracker().is_active("ups-1"));

        let outcome = agent
            .handle_event(AssetEvent::new("ups-1", AssetOperation::Delete).into())
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Removed);
        assert!(!agent.tracker().is_active("ups-1"));

        let alerts = agent.sink_mut().drain();
        assert_eq!(alerts.last().unwrap().state, AlertState::Resolved);
        assert!(agent.sweep().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_port_metric_refreshes_attached_sensors() {
        let clock = ManualClock::new(100);
        let mut agent = agent(30, &clock);
        agent.handle_line(UPS).await.unwrap();
        for (name, port) in [("sensor-1", "GPI1"), ("sensor-2", "GPI1"), ("sensor-3", "GPI2")] {
            let line = format!(
                r#"{{"kind":"asset","name":"{}","operation":"create","aux":{{"type":"device","subtype":"sensor","parent_name.1":"ups-1"}},"ext":{{"port":"{}"}}}}"#,
                name, port
            );
            agent.handle_line(&line).await.unwrap();
        }

        clock.set(150);
        agent
            .handle_line(
                r#"{"kind":"metric","source":"ups-1","type":"status.GPI1","ttl":10,"aux":{"port":"GPI1"}}"#,
            )
            .await
            .unwrap();

        let cache = agent.cache();
        assert_eq!(cache.get("sensor-1").unwrap().last_seen_sec(), 150);
        assert_eq!(cache.get("sensor-1").unwrap().ttl_sec(), 10);
        assert_eq!(cache.get("sensor-2").unwrap().last_seen_sec(), 150);
        assert_eq!(cache.get("sensor-3").unwrap().last_seen_sec(), 100);
        assert_eq!(agent.stats().sensor_refreshes, 2);
    }

    #[tokio::test]
    async fn test_bad_lines_are_counted_not_fatal() {
        let clock = ManualClock::new(0);
        let mut agent = agent(30, &clock);

        agent.handle_line("{broken").await.unwrap();
        agent.handle_line("").await.unwrap();
        agent.handle_line(UPS).await.unwrap();

        assert_eq!(agent.stats().lines_read, 3);
        assert_eq!(agent.stats().decode_failures, 1);
        assert_eq!(agent.stats().events_ingested, 1);
        assert!(agent.cache().contains("ups-1"));
    }

    #[tokio::test]
    async fn test_run_until_end_of_input() {
        let clock = ManualClock::new(500);
        let mut agent = agent(0, &clock);

        let input = format!(
            "{}\n\nnot json\n{}\n",
            UPS, r#"{"kind":"metric","source":"ghost","ttl":5}"#
        );
        let stats = agent.run(input.as_bytes()).await.unwrap();

        assert_eq!(stats.lines_read, 4);
        assert_eq!(stats.events_ingested, 2);
        assert_eq!(stats.decode_failures, 1);
        // A zero TTL expires immediately, so the final sweep raises it
        assert_eq!(stats.alerts_raised, 1);
        assert!(stats.sweeps >= 1);
        assert_eq!(agent.sink().alerts()[0].asset, "ups-1");
    }

    #[test]
    fn test_stats_summary() {
        let stats = AgentStats {
            lines_read: 3,
            sweeps: 2,
            ..Default::default()
        };
        assert!(stats.summary().starts_with("3 lines"));
        assert!(stats.summary().contains("2 sweeps"));
    }
}
