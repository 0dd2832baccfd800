//! Event Bus - in-process publish/subscribe
//!
//! Fans telemetry updates and alerts out to every live subscriber
//! (WebSocket clients, tests). Best effort: no replay, and a subscriber
//! that falls behind loses its oldest messages.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;

/// Default buffer per subscriber
pub const DEFAULT_CAPACITY: usize = 1000;

/// Serialized as its wire name, see [`Channel::as_str`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Metrics,
    Throughput,
    Alert,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Metrics, Channel::Throughput, Channel::Alert];

    /// Channel name as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Metrics => "system_metrics_update",
            Channel::Throughput => "network_traffic_update",
            Channel::Alert => "new_alert",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown channel '{0}'")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(de::Error::custom)
    }
}

/// One published message: `{"event": <channel>, "data": <payload>}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub event: Channel,
    pub data: serde_json::Value,
}

// ============================================================================
// BUS
// ============================================================================

pub struct EventBus {
    tx: broadcast::Sender<BusMessage>,
    shutdown: watch::Sender<bool>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        let (shutdown, _) = watch::channel(false);
        Self { tx, shutdown }
    }

    /// Publish to current subscribers; returns how many received it.
    ///
    /// Never blocks. With no subscribers the message is dropped.
    pub fn publish<S: Serialize>(&self, channel: Channel, payload: &S) -> usize {
        if self.is_closed() {
            return 0;
        }

        let data = match serde_json::to_value(payload) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to serialize {} payload: {}", channel, e);
                return 0;
            }
        };

        self.tx.send(BusMessage { event: channel, data }).unwrap_or(0)
    }

    /// Subscribe to `channels`; an empty slice means every channel
    pub fn subscribe(&self, channels: &[Channel]) -> Subscription {
        let filter = if channels.is_empty() {
            Channel::ALL.into_iter().collect()
        } else {
            channels.iter().copied().collect()
        };

        Subscription {
            rx: self.tx.subscribe(),
            filter,
            shutdown: self.shutdown.subscribe(),
        }
    }

    /// Tell every subscriber the process is shutting down
    pub fn close(&self) {
        self.shutdown.send_replace(true);
        tracing::info!("Event bus closed");
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ============================================================================
// SUBSCRIPTION
// ============================================================================

pub struct Subscription {
    rx: broadcast::Receiver<BusMessage>,
    filter: HashSet<Channel>,
    shutdown: watch::Receiver<bool>,
}

impl Subscription {
    /// Next message on a subscribed channel, or `None` once the bus closes
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            if *self.shutdown.borrow() {
                return None;
            }

            tokio::select! {
                received = self.rx.recv() => match received {
                    Ok(msg) if self.filter.contains(&msg.event) => return Some(msg),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Subscriber lagged, {} messages dropped", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => return None,
                },
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }
}
