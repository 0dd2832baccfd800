//! Anomaly Scorer
//!
//! Wraps the unsupervised model. Decision-function semantics: the lower
//! the score, the more anomalous the flow.

use crate::logic::features::FeatureVector;
use crate::logic::model::{AnomalyModel, InferenceError};
use crate::models::{Alert, AlertKind, Severity};

use super::types::ScoreError;

/// Scores strictly below this raise an alert
pub const DEFAULT_ANOMALY_THRESHOLD: f32 = -0.1;

pub const ANOMALY_DESCRIPTION: &str = "Anomalous Behavior Detected";

pub struct AnomalyScorer {
    model: Box<dyn AnomalyModel>,
    threshold: f32,
}

impl AnomalyScorer {
    pub fn new(model: Box<dyn AnomalyModel>, threshold: f32) -> Self {
        Self { model, threshold }
    }

    pub fn feature_names(&self) -> &[String] {
        self.model.feature_names()
    }

    pub fn avg_latency_ms(&self) -> Option<f32> {
        self.model.avg_latency_ms()
    }

    /// Raw decision score for one vector
    pub fn score(&self, features: &FeatureVector) -> Result<f32, ScoreError> {
        let row = features
            .select(self.model.feature_names())
            .map_err(|missing| ScoreError::FeatureMismatch { missing })?;

        let score = self.model.decision_score(&row)?;
        if !score.is_finite() {
            return Err(InferenceError(format!("non-finite score {}", score)).into());
        }
        Ok(score)
    }

    pub fn evaluate(&self, features: &FeatureVector) -> Result<Option<Alert>, ScoreError> {
        let score = self.score(features)?;

        if score < self.threshold {
            return Ok(Some(Alert::new(
                AlertKind::AnomalyBased,
                Severity::Medium,
                ANOMALY_DESCRIPTION,
                format!("Anomaly score of {:.2}.", score),
            )));
        }
        Ok(None)
    }
}
