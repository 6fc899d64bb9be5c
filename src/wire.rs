/*!
 * Wire decoding of bus messages
 *
 * The agent reads one JSON document per line. Two message kinds are
 * understood:
 *
 * ```text
 * {"kind":"metric","source":"ups-1","type":"load.default","ttl":300,
 *  "aux":{"time":"1700000000","port":"GPI1"}}
 * {"kind":"asset","name":"ups-1","operation":"create",
 *  "aux":{"type":"device","subtype":"ups","parent_name.1":"rack-1"},
 *  "ext":{"port":"GPI1"}}
 * ```
 *
 * Attribute values may be JSON strings or scalars; scalars are converted
 * to their textual form so they can be kept in the asset snapshot.
 */

use outage_core_liveness::{AssetEvent, AssetOperation, LivenessEvent, MetricEvent};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{AgentError, Result};

/// Metric aux key carrying the observation time
pub const AUX_TIME: &str = "time";
/// Metric aux key carrying the port a sensor reading was taken on
pub const AUX_PORT: &str = "port";

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum WireMessage {
    Metric(WireMetric),
    Asset(WireAsset),
}

#[derive(Debug, Deserialize)]
struct WireMetric {
    source: String,
    #[serde(rename = "type", default)]
    quantity: String,
    ttl: u64,
    #[serde(default)]
    aux: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct WireAsset {
    name: String,
    operation: AssetOperation,
    #[serde(default)]
    aux: BTreeMap<String, Value>,
    #[serde(default)]
    ext: BTreeMap<String, Value>,
}

/// Decode one bus line. Blank lines yield `Ok(None)`.
pub fn decode_line(line: &str) -> Result<Option<LivenessEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let message: WireMessage = serde_json::from_str(line)?;
    let event = match message {
        WireMessage::Metric(metric) => LivenessEvent::Metric(decode_metric(metric)?),
        WireMessage::Asset(asset) => LivenessEvent::Asset(decode_asset(asset)?),
    };
    Ok(Some(event))
}

fn decode_metric(wire: WireMetric) -> Result<MetricEvent> {
    if wire.source.is_empty() {
        return Err(AgentError::Decode("metric without source".to_string()));
    }

    let timestamp_sec = wire.aux.get(AUX_TIME).map(parse_timestamp).transpose()?;
    let port = wire
        .aux
        .get(AUX_PORT)
        .map(stringify)
        .transpose()?
        .filter(|p| !p.is_empty());

    Ok(MetricEvent {
        source: wire.source,
        quantity: wire.quantity,
        ttl_sec: wire.ttl,
        timestamp_sec,
        port,
    })
}

fn decode_asset(wire: WireAsset) -> Result<AssetEvent> {
    if wire.name.is_empty() {
        return Err(AgentError::Decode("asset without name".to_string()));
    }

    Ok(AssetEvent {
        name: wire.name,
        operation: wire.operation,
        aux: stringify_map(wire.aux)?,
        ext: stringify_map(wire.ext)?,
    })
}

/// Parse the `time` attribute: decimal seconds, as string or number
fn parse_timestamp(value: &Value) -> Result<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| AgentError::Decode(format!("invalid metric time: {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| AgentError::Decode(format!("invalid metric time '{}': {}", s, e))),
        other => Err(AgentError::Decode(format!("invalid metric time: {}", other))),
    }
}

fn stringify(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(AgentError::Decode(format!("attribute must be a scalar, got {}", other))),
    }
}

fn stringify_map(map: BTreeMap<String, Value>) -> Result<BTreeMap<String, String>> {
    map.into_iter()
        .map(|(key, value)| stringify(&value).map(|v| (key, v)))
        .collect()
}
