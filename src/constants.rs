//! Configuration defaults
//!
//! Single source of truth for values used when an environment variable is
//! not set.

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "flowguard";

/// Default bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Agents post to this port out of the box
pub const DEFAULT_PORT: u16 = 5000;

/// Throughput window (milliseconds)
pub const DEFAULT_RATE_INTERVAL_MS: u64 = 1000;

/// Flows untouched for this long are evicted (seconds)
pub const DEFAULT_FLOW_IDLE_TIMEOUT_SECS: u64 = 120;

/// How often the eviction task runs (seconds)
pub const DEFAULT_FLOW_SWEEP_INTERVAL_SECS: u64 = 30;

pub const DEFAULT_ANOMALY_MODEL_PATH: &str = "models/isolation_forest_model.onnx";
pub const DEFAULT_CLASSIFIER_MODEL_PATH: &str = "models/random_forest_model.onnx";
pub const DEFAULT_LABEL_DECODER_PATH: &str = "models/label_encoder.json";

/// Default tracing filter when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "flowguard=debug,tower_http=debug";
