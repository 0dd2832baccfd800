//! Background eviction task for the flow table.
//!
//! The aggregator never removes flows on the packet path. This task wakes
//! every sweep interval, drops flows idle longer than the aggregator's
//! timeout, and does one last pass when shutdown is signalled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::aggregator::FlowAggregator;

/// Spawn the sweep loop. Join the handle on shutdown.
pub fn spawn_sweeper(
    flows: Arc<FlowAggregator>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = flows.sweep_idle(Instant::now());
                    if removed > 0 {
                        tracing::debug!("Evicted {} idle flows ({} live)", removed, flows.len());
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        let removed = flows.sweep_idle(Instant::now());
                        tracing::info!("Flow sweeper stopping (final pass evicted {})", removed);
                        return;
                    }
                }
            }
        }
    })
}
