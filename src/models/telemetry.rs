//! Telemetry model
//!
//! Wire payloads from capture agents and the validated events built from
//! them. The `type` field selects the variant; anything else is rejected
//! before shared state is touched.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::logic::features::{FeatureVector, FeatureVectorBuilder};
use crate::logic::flow::{Endpoint, PacketDescriptor, TcpFlags};

// ============================================================================
// VALIDATION ERROR
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("field '{field}' {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        ValidationError::Malformed(err.to_string())
    }
}

// ============================================================================
// HOST METRICS
// ============================================================================

/// Agents report `null` for attributes they could not read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cpu_percent: Option<f64>,
    #[serde(default)]
    pub memory_percent: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Host metrics snapshot; unknown fields pass through to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub cpu_load: f64,
    pub top_processes: Vec<ProcessDescriptor>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// NETWORK FLOW
// ============================================================================

/// Flat network flow payload as agents send it
#[derive(Debug, Deserialize)]
struct WireFlow {
    len: f64,
    packet_rate: f64,
    byte_count: f64,
    src_bytes: f64,
    dst_bytes: f64,
    flow_duration: f64,
    flow_key: String,
    #[serde(default)]
    packet_count: Option<f64>,
    #[serde(default)]
    byte_rate: Option<f64>,
    #[serde(default, alias = "syn")]
    syn_flag_count: Option<f64>,
    #[serde(default, alias = "fin")]
    fin_flag_count: Option<f64>,
    #[serde(default, alias = "rst")]
    rst_flag_count: Option<f64>,
    #[serde(default, alias = "ack")]
    ack_flag_count: Option<f64>,
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    flags: Option<String>,
    /// Sender endpoint (`addr:port`); `flow_key` is canonical and carries no direction
    #[serde(default)]
    src: Option<String>,
    #[serde(default)]
    dst: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePayload {
    SystemMetrics { metrics: SystemMetrics },
    NetworkFlow(WireFlow),
}

/// Validated network flow event
#[derive(Debug, Clone)]
pub struct NetworkFlow {
    pub flow_key: String,
    /// Raw packet length that produced this update
    pub len: u64,
    /// Agent capture time (epoch seconds)
    pub timestamp: Option<f64>,
    pub flags: TcpFlags,
    /// Sender and receiver, when the agent reported them
    pub direction: Option<(Endpoint, Endpoint)>,
    /// Features as reported by the agent
    pub features: FeatureVector,
}

impl NetworkFlow {
    /// Packet descriptor for the server-side flow table.
    ///
    /// Only available when the agent sent explicit `src`/`dst` endpoints.
    pub fn packet_descriptor(&self, fallback_time: f64) -> Option<PacketDescriptor> {
        let (src, dst) = self.direction?;
        let time = self.timestamp.unwrap_or(fallback_time);
        Some(PacketDescriptor::tcp(src, dst, self.flags, self.len, time))
    }

    pub fn packet_rate(&self) -> Option<f64> {
        self.features.get_by_name("packet_rate")
    }
}

// ============================================================================
// TELEMETRY EVENT
// ============================================================================

#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    SystemMetrics(SystemMetrics),
    NetworkFlow(NetworkFlow),
}

impl TelemetryEvent {
    /// Parse and validate a raw request body
    pub fn parse(body: &[u8]) -> Result<Self, ValidationError> {
        let payload: WirePayload = serde_json::from_slice(body)?;

        match payload {
            WirePayload::SystemMetrics { metrics } => {
                check_metric("cpu_usage", metrics.cpu_usage)?;
                check_metric("memory_usage", metrics.memory_usage)?;
                check_metric("cpu_load", metrics.cpu_load)?;
                Ok(TelemetryEvent::SystemMetrics(metrics))
            }
            WirePayload::NetworkFlow(wire) => Ok(TelemetryEvent::NetworkFlow(validate_flow(wire)?)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryEvent::SystemMetrics(_) => "system_metrics",
            TelemetryEvent::NetworkFlow(_) => "network_flow",
        }
    }
}

fn check_metric(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidField { field, reason: "must be a finite number" });
    }
    if value < 0.0 {
        return Err(ValidationError::InvalidField { field, reason: "must not be negative" });
    }
    Ok(value)
}

fn check_optional(field: &'static str, value: Option<f64>) -> Result<Option<f64>, ValidationError> {
    value.map(|v| check_metric(field, v)).transpose()
}

fn check_endpoint(field: &'static str, value: &str) -> Result<Endpoint, ValidationError> {
    value.trim()
        .parse::<SocketAddr>()
        .map(Endpoint::from)
        .map_err(|_| ValidationError::InvalidField { field, reason: "must be addr:port" })
}

fn check_direction(
    src: Option<&str>,
    dst: Option<&str>,
) -> Result<Option<(Endpoint, Endpoint)>, ValidationError> {
    match (src, dst) {
        (Some(src), Some(dst)) => Ok(Some((check_endpoint("src", src)?, check_endpoint("dst", dst)?))),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ValidationError::InvalidField { field: "dst", reason: "is required with src" }),
        (None, Some(_)) => Err(ValidationError::InvalidField { field: "src", reason: "is required with dst" }),
    }
}

fn validate_flow(wire: WireFlow) -> Result<NetworkFlow, ValidationError> {
    let len = check_metric("len", wire.len)?;

    if wire.flow_key.trim().is_empty() {
        return Err(ValidationError::InvalidField { field: "flow_key", reason: "must not be empty" });
    }

    let features = FeatureVectorBuilder::new()
        .flow_duration(check_metric("flow_duration", wire.flow_duration)?)
        .packet_rate(check_metric("packet_rate", wire.packet_rate)?)
        .byte_count(check_metric("byte_count", wire.byte_count)?)
        .src_bytes(check_metric("src_bytes", wire.src_bytes)?)
        .dst_bytes(check_metric("dst_bytes", wire.dst_bytes)?)
        .maybe("packet_count", check_optional("packet_count", wire.packet_count)?)
        .maybe("byte_rate", check_optional("byte_rate", wire.byte_rate)?)
        .maybe("syn_flag_count", check_optional("syn_flag_count", wire.syn_flag_count)?)
        .maybe("fin_flag_count", check_optional("fin_flag_count", wire.fin_flag_count)?)
        .maybe("rst_flag_count", check_optional("rst_flag_count", wire.rst_flag_count)?)
        .maybe("ack_flag_count", check_optional("ack_flag_count", wire.ack_flag_count)?)
        .build();

    Ok(NetworkFlow {
        flow_key: wire.flow_key,
        len: len as u64,
        timestamp: check_optional("timestamp", wire.timestamp)?,
        flags: wire.flags.as_deref().map(TcpFlags::parse).unwrap_or_default(),
        direction: check_direction(wire.src.as_deref(), wire.dst.as_deref())?,
        features,
    })
}
