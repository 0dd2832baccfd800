//! Configuration module

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::*;
use crate::logic::detection::{
    DetectionConfig, RuleThresholds, DEFAULT_ANOMALY_THRESHOLD, DEFAULT_BENIGN_LABEL,
    MAX_CPU_USAGE, MAX_PACKET_RATE,
};
use crate::logic::events::DEFAULT_CAPACITY;
use crate::logic::model::ArtifactPaths;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Throughput window
    pub rate_interval: Duration,

    /// Idle time after which a flow is evicted
    pub flow_idle_timeout: Duration,

    /// Eviction task period
    pub flow_sweep_interval: Duration,

    /// Per-subscriber event buffer
    pub event_bus_capacity: usize,

    pub packet_rate_threshold: f64,
    pub cpu_usage_threshold: f64,
    pub anomaly_threshold: f32,

    pub anomaly_model_path: PathBuf,
    pub classifier_model_path: PathBuf,
    pub label_decoder_path: PathBuf,

    /// Classifier label that means "no attack"
    pub benign_label: String,

    /// Run the signature classifier on every flow
    pub signature_in_pipeline: bool,

    /// Environment (development, production)
    pub environment: String,

    /// `json` for structured logs, anything else for human-readable
    pub log_format: String,
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),

            port: parsed("PORT", DEFAULT_PORT),

            rate_interval: Duration::from_millis(parsed("RATE_INTERVAL_MS", DEFAULT_RATE_INTERVAL_MS)),

            flow_idle_timeout: Duration::from_secs(parsed("FLOW_IDLE_TIMEOUT_SECS", DEFAULT_FLOW_IDLE_TIMEOUT_SECS)),

            flow_sweep_interval: Duration::from_secs(
                parsed("FLOW_SWEEP_INTERVAL_SECS", DEFAULT_FLOW_SWEEP_INTERVAL_SECS).max(1),
            ),

            event_bus_capacity: parsed("EVENT_BUS_CAPACITY", DEFAULT_CAPACITY).max(1),

            packet_rate_threshold: parsed("PACKET_RATE_THRESHOLD", MAX_PACKET_RATE),

            cpu_usage_threshold: parsed("CPU_USAGE_THRESHOLD", MAX_CPU_USAGE),

            anomaly_threshold: parsed("ANOMALY_THRESHOLD", DEFAULT_ANOMALY_THRESHOLD),

            anomaly_model_path: env::var("ANOMALY_MODEL_PATH")
                .unwrap_or_else(|_| DEFAULT_ANOMALY_MODEL_PATH.to_string())
                .into(),

            classifier_model_path: env::var("CLASSIFIER_MODEL_PATH")
                .unwrap_or_else(|_| DEFAULT_CLASSIFIER_MODEL_PATH.to_string())
                .into(),

            label_decoder_path: env::var("LABEL_DECODER_PATH")
                .unwrap_or_else(|_| DEFAULT_LABEL_DECODER_PATH.to_string())
                .into(),

            benign_label: env::var("BENIGN_LABEL")
                .unwrap_or_else(|_| DEFAULT_BENIGN_LABEL.to_string()),

            signature_in_pipeline: flag("SIGNATURE_IN_PIPELINE"),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),

            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "text".to_string()),
        }
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Detection engine settings derived from this config
    pub fn detection(&self) -> DetectionConfig {
        DetectionConfig {
            thresholds: RuleThresholds {
                max_packet_rate: self.packet_rate_threshold,
                max_cpu_usage: self.cpu_usage_threshold,
            },
            anomaly_threshold: self.anomaly_threshold,
            artifacts: ArtifactPaths {
                anomaly_model: self.anomaly_model_path.clone(),
                classifier_model: self.classifier_model_path.clone(),
                label_decoder: self.label_decoder_path.clone(),
            },
            benign_label: self.benign_label.clone(),
            signature_in_pipeline: self.signature_in_pipeline,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            rate_interval: Duration::from_millis(DEFAULT_RATE_INTERVAL_MS),
            flow_idle_timeout: Duration::from_secs(DEFAULT_FLOW_IDLE_TIMEOUT_SECS),
            flow_sweep_interval: Duration::from_secs(DEFAULT_FLOW_SWEEP_INTERVAL_SECS),
            event_bus_capacity: DEFAULT_CAPACITY,
            packet_rate_threshold: MAX_PACKET_RATE,
            cpu_usage_threshold: MAX_CPU_USAGE,
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            anomaly_model_path: DEFAULT_ANOMALY_MODEL_PATH.into(),
            classifier_model_path: DEFAULT_CLASSIFIER_MODEL_PATH.into(),
            label_decoder_path: DEFAULT_LABEL_DECODER_PATH.into(),
            benign_label: DEFAULT_BENIGN_LABEL.to_string(),
            signature_in_pipeline: false,
            environment: "development".to_string(),
            log_format: "text".to_string(),
        }
    }
}
