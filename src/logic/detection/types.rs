//! Detection Types
//!
//! Stage errors, engine lifecycle and the status snapshot.

use serde::{Deserialize, Serialize};

use crate::logic::features::LayoutInfo;
use crate::logic::model::InferenceError;

// ============================================================================
// SCORE ERROR
// ============================================================================

/// Why a scoring stage produced no verdict
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScoreError {
    /// The vector lacks columns the model was trained on
    #[error("feature mismatch, missing: {}", .missing.join(", "))]
    FeatureMismatch { missing: Vec<String> },

    #[error("compute failed: {0}")]
    Compute(#[from] InferenceError),

    #[error("stage not loaded")]
    Unavailable,
}

// ============================================================================
// ENGINE LIFECYCLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Unloaded,
    Loaded,
    /// All stages available
    Active,
    /// Artifacts failed to load; only the rule table runs
    RulesOnly,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Unloaded => "unloaded",
            EngineState::Loaded => "loaded",
            EngineState::Active => "active",
            EngineState::RulesOnly => "rules_only",
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageStatus {
    pub available: bool,
    /// Whether `detect` runs this stage
    pub in_pipeline: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub feature_names: Vec<String>,
    /// Mean inference time since startup
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub latency_ms: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub rules: StageStatus,
    pub anomaly: StageStatus,
    pub signature: StageStatus,
    pub layout: LayoutInfo,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub load_error: Option<String>,
}
