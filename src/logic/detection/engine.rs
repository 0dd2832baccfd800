//! Detection Engine
//!
//! Runs the rule table, the anomaly scorer and (optionally) the signature
//! classifier over one event, in that order. A failing or panicking stage is
//! logged and contributes no alerts; the others still run.

use std::panic::{self, AssertUnwindSafe};

use crate::logic::features::{FeatureVector, LayoutInfo};
use crate::logic::model::{
    AnomalyModel, ArtifactPaths, ClassifierModel, InferenceError, LabelDecoder, ModelArtifacts,
};
use crate::models::{Alert, TelemetryEvent};

use super::anomaly::AnomalyScorer;
use super::rules::{RuleEvaluator, RuleThresholds};
use super::signature::{Classification, SignatureClassifier};
use super::types::{EngineState, EngineStatus, ScoreError, StageStatus};

/// Everything the engine needs at startup
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub thresholds: RuleThresholds,
    pub anomaly_threshold: f32,
    pub artifacts: ArtifactPaths,
    pub benign_label: String,
    /// Run the signature classifier inside `detect`
    pub signature_in_pipeline: bool,
}

pub struct DetectionEngine {
    rules: RuleEvaluator,
    anomaly: Option<AnomalyScorer>,
    signature: Option<SignatureClassifier>,
    signature_in_pipeline: bool,
    state: EngineState,
    load_error: Option<String>,
}

impl DetectionEngine {
    /// Load model artifacts; any failure leaves the engine in rules-only mode.
    pub fn load(config: &DetectionConfig) -> Self {
        let mut state = EngineState::Unloaded;
        tracing::debug!("Detection engine {}", state);

        match ModelArtifacts::load(&config.artifacts) {
            Ok(artifacts) => {
                state = EngineState::Loaded;
                tracing::debug!("Detection engine {}", state);
                Self::with_models(config, artifacts.anomaly, artifacts.classifier, artifacts.labels)
            }
            Err(e) => {
                tracing::warn!("Model artifacts unavailable, running rules only: {}", e);
                let mut engine = Self::rules_only(config);
                engine.load_error = Some(e.to_string());
                engine
            }
        }
    }

    pub fn rules_only(config: &DetectionConfig) -> Self {
        Self {
            rules: RuleEvaluator::new(config.thresholds.clone()),
            anomaly: None,
            signature: None,
            signature_in_pipeline: config.signature_in_pipeline,
            state: EngineState::RulesOnly,
            load_error: None,
        }
    }

    pub fn with_models(
        config: &DetectionConfig,
        anomaly: Box<dyn AnomalyModel>,
        classifier: Box<dyn ClassifierModel>,
        labels: LabelDecoder,
    ) -> Self {
        let engine = Self {
            rules: RuleEvaluator::new(config.thresholds.clone()),
            anomaly: Some(AnomalyScorer::new(anomaly, config.anomaly_threshold)),
            signature: Some(SignatureClassifier::new(classifier, labels, config.benign_label.clone())),
            signature_in_pipeline: config.signature_in_pipeline,
            state: EngineState::Active,
            load_error: None,
        };

        tracing::info!(
            "Detection engine {} (signature stage {})",
            engine.state,
            if engine.signature_in_pipeline { "in pipeline" } else { "on demand" }
        );
        engine
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Evaluate one event. Never fails; stage errors become log lines.
    pub fn detect(&self, event: &TelemetryEvent) -> Vec<Alert> {
        match event {
            TelemetryEvent::SystemMetrics(metrics) => self.rules.evaluate_metrics(metrics),
            TelemetryEvent::NetworkFlow(flow) => self.detect_flow(&flow.flow_key, &flow.features),
        }
    }

    pub fn detect_flow(&self, flow_key: &str, features: &FeatureVector) -> Vec<Alert> {
        let mut alerts = self.rules.evaluate_flow(flow_key, features);

        if let Some(scorer) = &self.anomaly {
            let outcome = guarded("anomaly", || scorer.evaluate(features));
            collect("anomaly", flow_key, outcome, &mut alerts);
        }

        if self.signature_in_pipeline {
            if let Some(classifier) = &self.signature {
                let outcome = guarded("signature", || classifier.evaluate(flow_key, features));
                collect("signature", flow_key, outcome, &mut alerts);
            }
        }

        alerts
    }

    /// Run the signature classifier directly, regardless of pipeline wiring
    pub fn classify(&self, features: &FeatureVector) -> Result<Classification, ScoreError> {
        let classifier = self.signature.as_ref().ok_or(ScoreError::Unavailable)?;
        guarded("signature", || classifier.classify(features))
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.state,
            rules: StageStatus {
                available: true,
                in_pipeline: true,
                feature_names: Vec::new(),
                latency_ms: None,
            },
            anomaly: StageStatus {
                available: self.anomaly.is_some(),
                in_pipeline: self.anomaly.is_some(),
                feature_names: self.anomaly.as_ref()
                    .map(|s| s.feature_names().to_vec())
                    .unwrap_or_default(),
                latency_ms: self.anomaly.as_ref().and_then(|s| s.avg_latency_ms()),
            },
            signature: StageStatus {
                available: self.signature.is_some(),
                in_pipeline: self.signature.is_some() && self.signature_in_pipeline,
                feature_names: self.signature.as_ref()
                    .map(|s| s.feature_names().to_vec())
                    .unwrap_or_default(),
                latency_ms: self.signature.as_ref().and_then(|s| s.avg_latency_ms()),
            },
            layout: LayoutInfo::current(),
            load_error: self.load_error.clone(),
        }
    }
}

/// Run one model stage, turning a panic inside the backend into a stage error
/// so earlier alerts for the same event survive.
fn guarded<T>(stage: &str, run: impl FnOnce() -> Result<T, ScoreError>) -> Result<T, ScoreError> {
    panic::catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|payload| {
        let reason = payload.downcast_ref::<&str>().map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(ScoreError::Compute(InferenceError(format!("{} stage panicked: {}", stage, reason))))
    })
}

fn collect(stage: &str, flow_key: &str, outcome: Result<Option<Alert>, ScoreError>, alerts: &mut Vec<Alert>) {
    match outcome {
        Ok(Some(alert)) => alerts.push(alert),
        Ok(None) => {}
        Err(ScoreError::FeatureMismatch { missing }) => {
            tracing::debug!("Skipping {} stage for {}: missing {:?}", stage, flow_key, missing);
        }
        Err(e) => {
            tracing::warn!("{} stage failed for {}: {}", stage, flow_key, e);
        }
    }
}
