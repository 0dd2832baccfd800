//! Rule Evaluator
//!
//! Threshold table applied to every event before any model runs.

use serde::{Deserialize, Serialize};

use crate::logic::features::FeatureVector;
use crate::models::{Alert, AlertKind, Severity, SystemMetrics};

// ============================================================================
// THRESHOLDS
// ============================================================================

/// Packets per second above which a flow is treated as a flood
pub const MAX_PACKET_RATE: f64 = 1000.0;

/// Host CPU usage (percent) above which an alert is raised
pub const MAX_CPU_USAGE: f64 = 95.0;

pub const PACKET_RATE_DESCRIPTION: &str = "High Packet Rate Detected (Potential Flood Attack)";
pub const CPU_USAGE_DESCRIPTION: &str = "High CPU Utilization";

/// Rule thresholds (configurable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleThresholds {
    pub max_packet_rate: f64,
    pub max_cpu_usage: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            max_packet_rate: MAX_PACKET_RATE,
            max_cpu_usage: MAX_CPU_USAGE,
        }
    }
}

// ============================================================================
// EVALUATOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RuleEvaluator {
    thresholds: RuleThresholds,
}

impl RuleEvaluator {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate_flow(&self, flow_key: &str, features: &FeatureVector) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if let Some(rate) = features.get_by_name("packet_rate") {
            if rate > self.thresholds.max_packet_rate {
                alerts.push(Alert::new(
                    AlertKind::RuleBased,
                    Severity::Critical,
                    PACKET_RATE_DESCRIPTION,
                    format!("Packet rate is {:.2} pps for flow {}", rate, flow_key),
                ));
            }
        }

        alerts
    }

    pub fn evaluate_metrics(&self, metrics: &SystemMetrics) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if metrics.cpu_usage > self.thresholds.max_cpu_usage {
            alerts.push(Alert::new(
                AlertKind::RuleBased,
                Severity::High,
                CPU_USAGE_DESCRIPTION,
                format!(
                    "CPU usage is {:.1}% (threshold {:.1}%)",
                    metrics.cpu_usage, self.thresholds.max_cpu_usage
                ),
            ));
        }

        alerts
    }
}
