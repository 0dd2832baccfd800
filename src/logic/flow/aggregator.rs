//! Flow Aggregator - per-flow running statistics
//!
//! Every packet updates one FlowRecord under a short lock; the feature vector
//! is derived afterwards from a copied snapshot so scoring never runs while
//! the table is held.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::key::FlowKey;
use super::packet::{PacketDescriptor, TcpFlag};
use crate::logic::features::FeatureVector;

/// Durations at or below zero are floored to this value
pub const MIN_FLOW_DURATION: f64 = 1e-6;

// ============================================================================
// FLOW RECORD
// ============================================================================

/// Running statistics for one flow
#[derive(Debug, Clone)]
pub struct FlowRecord {
    pub packet_count: u64,
    pub byte_count: u64,
    /// Capture time of the first packet (epoch seconds)
    pub start_time: f64,
    /// Capture time of the latest packet (epoch seconds)
    pub last_time: f64,
    pub src_bytes: u64,
    pub dst_bytes: u64,
    pub flag_histogram: HashMap<TcpFlag, u64>,
    /// Server clock at the latest packet, drives idle expiry
    pub last_seen: Instant,
}

impl FlowRecord {
    fn new(time: f64, now: Instant) -> Self {
        Self {
            packet_count: 0,
            byte_count: 0,
            start_time: time,
            last_time: time,
            src_bytes: 0,
            dst_bytes: 0,
            flag_histogram: HashMap::new(),
            last_seen: now,
        }
    }

    fn flag_count(&self, flag: TcpFlag) -> u64 {
        self.flag_histogram.get(&flag).copied().unwrap_or(0)
    }

    fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            packet_count: self.packet_count,
            byte_count: self.byte_count,
            start_time: self.start_time,
            last_time: self.last_time,
            src_bytes: self.src_bytes,
            dst_bytes: self.dst_bytes,
            syn: self.flag_count(TcpFlag::Syn),
            fin: self.flag_count(TcpFlag::Fin),
            rst: self.flag_count(TcpFlag::Rst),
            ack: self.flag_count(TcpFlag::Ack),
        }
    }
}

/// Copy of a record taken inside the critical section
#[derive(Debug, Clone, Copy)]
struct FlowSnapshot {
    packet_count: u64,
    byte_count: u64,
    start_time: f64,
    last_time: f64,
    src_bytes: u64,
    dst_bytes: u64,
    syn: u64,
    fin: u64,
    rst: u64,
    ack: u64,
}

impl FlowSnapshot {
    fn duration(&self) -> f64 {
        let raw = self.last_time - self.start_time;
        if raw.is_finite() && raw > 0.0 {
            raw
        } else {
            MIN_FLOW_DURATION
        }
    }

    fn features(&self) -> FeatureVector {
        let duration = self.duration();
        let mut v = FeatureVector::new();

        v.set_by_name("flow_duration", duration);
        v.set_by_name("packet_count", self.packet_count as f64);
        v.set_by_name("byte_count", self.byte_count as f64);
        v.set_by_name("packet_rate", self.packet_count as f64 / duration);
        v.set_by_name("byte_rate", self.byte_count as f64 / duration);
        v.set_by_name("src_bytes", self.src_bytes as f64);
        v.set_by_name("dst_bytes", self.dst_bytes as f64);
        v.set_by_name("syn_flag_count", self.syn as f64);
        v.set_by_name("fin_flag_count", self.fin as f64);
        v.set_by_name("rst_flag_count", self.rst as f64);
        v.set_by_name("ack_flag_count", self.ack as f64);
        v
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

/// Flow table shared by all ingestion handlers
pub struct FlowAggregator {
    flows: Mutex<HashMap<FlowKey, FlowRecord>>,
    idle_timeout: Duration,
}

impl FlowAggregator {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            flows: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Fold one packet into its flow and return the updated features.
    ///
    /// Packets without both IP and TCP layers return `None` and leave the
    /// table untouched.
    pub fn ingest(&self, packet: &PacketDescriptor) -> Option<FeatureVector> {
        self.ingest_at(packet, Instant::now())
    }

    pub fn ingest_at(&self, packet: &PacketDescriptor, now: Instant) -> Option<FeatureVector> {
        let (src, dst) = packet.endpoints()?;
        let flags = packet.tcp?.flags;
        let key = FlowKey::new(src, dst);

        let snapshot = {
            let mut flows = self.flows.lock();
            let record = flows
                .entry(key)
                .or_insert_with(|| FlowRecord::new(packet.time, now));

            if record.packet_count == 0 {
                record.start_time = packet.time;
            }
            record.last_time = packet.time;
            record.last_seen = now;
            record.packet_count = record.packet_count.saturating_add(1);
            record.byte_count = record.byte_count.saturating_add(packet.len);

            if src == key.first() {
                record.src_bytes = record.src_bytes.saturating_add(packet.len);
            } else {
                record.dst_bytes = record.dst_bytes.saturating_add(packet.len);
            }

            for flag in flags.iter() {
                let count = record.flag_histogram.entry(flag).or_insert(0);
                *count = count.saturating_add(1);
            }

            record.snapshot()
        };

        Some(snapshot.features())
    }

    /// Copy of one flow's record
    pub fn get(&self, key: &FlowKey) -> Option<FlowRecord> {
        self.flows.lock().get(key).cloned()
    }

    /// Drop flows idle for at least the configured timeout
    pub fn sweep_idle(&self, now: Instant) -> usize {
        let mut flows = self.flows.lock();
        let before = flows.len();
        flows.retain(|_, record| now.saturating_duration_since(record.last_seen) < self.idle_timeout);
        before - flows.len()
    }

    pub fn len(&self) -> usize {
        self.flows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
