//! Detection Module
//!
//! Hybrid detection over telemetry events.
//!
//! ## Structure
//! - `types`: ScoreError, EngineState, EngineStatus
//! - `rules`: threshold table (RuleEvaluator)
//! - `anomaly`: unsupervised scorer
//! - `signature`: supervised classifier + label decoding
//! - `engine`: ordered pipeline and lifecycle
//!
//! ## Usage
//! ```ignore
//! use crate::logic::detection::{DetectionEngine, DetectionConfig};
//!
//! let engine = DetectionEngine::load(&config);
//! for alert in engine.detect(&event) {
//!     bus.publish(Channel::Alert, &alert);
//! }
//! ```

pub mod types;
pub mod rules;
pub mod anomaly;
pub mod signature;
pub mod engine;


pub use types::{EngineState, EngineStatus, ScoreError, StageStatus};
pub use rules::{RuleEvaluator, RuleThresholds, MAX_CPU_USAGE, MAX_PACKET_RATE};
pub use anomaly::{AnomalyScorer, DEFAULT_ANOMALY_THRESHOLD};
pub use signature::{Classification, SignatureClassifier, DEFAULT_BENIGN_LABEL};
pub use engine::{DetectionConfig, DetectionEngine};
