//! Signature Classifier
//!
//! Supervised model that names known attack classes. Any class other than
//! the benign one is reported as Critical.

use serde::Serialize;

use crate::logic::features::FeatureVector;
use crate::logic::model::{ClassifierModel, InferenceError, LabelDecoder};
use crate::models::{Alert, AlertKind, Severity};

use super::types::ScoreError;

pub const DEFAULT_BENIGN_LABEL: &str = "BENIGN";

/// Decoded classifier verdict
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub class_index: i64,
    pub label: String,
    pub benign: bool,
}

pub struct SignatureClassifier {
    model: Box<dyn ClassifierModel>,
    labels: LabelDecoder,
    benign_label: String,
}

impl SignatureClassifier {
    pub fn new(model: Box<dyn ClassifierModel>, labels: LabelDecoder, benign_label: impl Into<String>) -> Self {
        Self {
            model,
            labels,
            benign_label: benign_label.into(),
        }
    }

    pub fn feature_names(&self) -> &[String] {
        self.model.feature_names()
    }

    pub fn avg_latency_ms(&self) -> Option<f32> {
        self.model.avg_latency_ms()
    }

    pub fn classify(&self, features: &FeatureVector) -> Result<Classification, ScoreError> {
        let row = features
            .select(self.model.feature_names())
            .map_err(|missing| ScoreError::FeatureMismatch { missing })?;

        let class_index = self.model.predict_class(&row)?;
        let label = self.labels.decode(class_index).ok_or_else(|| {
            InferenceError(format!(
                "class index {} outside label decoder ({} classes)",
                class_index,
                self.labels.classes().len()
            ))
        })?;

        Ok(Classification {
            class_index,
            label: label.to_string(),
            benign: label == self.benign_label,
        })
    }

    pub fn evaluate(&self, flow_key: &str, features: &FeatureVector) -> Result<Option<Alert>, ScoreError> {
        let verdict = self.classify(features)?;
        if verdict.benign {
            return Ok(None);
        }

        Ok(Some(Alert::new(
            AlertKind::SignatureBased,
            Severity::Critical,
            format!("Known Attack Signature: {}", verdict.label),
            format!("Classifier matched {} for flow {}", verdict.label, flow_key),
        )))
    }
}
