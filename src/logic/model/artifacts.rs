//! Model artifacts
//!
//! The anomaly model, the classifier and the label decoder are loaded
//! together. A model may carry a `<model>.manifest.json` listing its input
//! columns; without one the default training columns are assumed.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::inference::{
    AnomalyModel, ClassifierModel, InferenceError, OnnxAnomalyModel, OnnxClassifierModel,
};
use crate::logic::features::DEFAULT_MODEL_FEATURES;

pub const MANIFEST_SUFFIX: &str = ".manifest.json";

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("{artifact} not found at {}", .path.display())]
    Missing { artifact: &'static str, path: PathBuf },

    #[error("failed to read {artifact} at {}: {reason}", .path.display())]
    Unreadable {
        artifact: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("{artifact} rejected by runtime: {source}")]
    Runtime {
        artifact: &'static str,
        #[source]
        source: InferenceError,
    },
}

// ============================================================================
// MANIFEST
// ============================================================================

#[derive(Debug, Deserialize)]
struct ModelManifest {
    feature_names: Vec<String>,
}

pub fn manifest_path(model: &Path) -> PathBuf {
    let mut path = model.as_os_str().to_owned();
    path.push(MANIFEST_SUFFIX);
    PathBuf::from(path)
}

/// Ordered input columns for the model at `model`
pub fn load_feature_names(model: &Path) -> Result<Vec<String>, ModelLoadError> {
    let path = manifest_path(model);
    if !path.exists() {
        tracing::debug!("No manifest at {}, using default feature list", path.display());
        return Ok(DEFAULT_MODEL_FEATURES.iter().map(|s| s.to_string()).collect());
    }

    let unreadable = |reason: String| ModelLoadError::Unreadable {
        artifact: "model manifest",
        path: path.clone(),
        reason,
    };

    let raw = std::fs::read_to_string(&path).map_err(|e| unreadable(e.to_string()))?;
    let manifest: ModelManifest = serde_json::from_str(&raw).map_err(|e| unreadable(e.to_string()))?;

    if manifest.feature_names.is_empty() {
        return Err(unreadable("feature_names is empty".to_string()));
    }
    Ok(manifest.feature_names)
}

// ============================================================================
// LABEL DECODER
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelFile {
    List(Vec<String>),
    Object { classes: Vec<String> },
}

/// Maps encoded class indices back to class names
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDecoder {
    classes: Vec<String>,
}

impl LabelDecoder {
    pub fn from_classes(classes: Vec<String>) -> Self {
        Self { classes }
    }

    /// Accepts either `["BENIGN", ...]` or `{"classes": ["BENIGN", ...]}`
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        if !path.exists() {
            return Err(ModelLoadError::Missing { artifact: "label decoder", path: path.to_path_buf() });
        }

        let unreadable = |reason: String| ModelLoadError::Unreadable {
            artifact: "label decoder",
            path: path.to_path_buf(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        let classes = match serde_json::from_str::<LabelFile>(&raw).map_err(|e| unreadable(e.to_string()))? {
            LabelFile::List(classes) | LabelFile::Object { classes } => classes,
        };

        if classes.is_empty() {
            return Err(unreadable("no classes".to_string()));
        }
        Ok(Self { classes })
    }

    pub fn decode(&self, index: i64) -> Option<&str> {
        usize::try_from(index).ok()
            .and_then(|i| self.classes.get(i))
            .map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

// ============================================================================
// ARTIFACT SET
// ============================================================================

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub anomaly_model: PathBuf,
    pub classifier_model: PathBuf,
    pub label_decoder: PathBuf,
}

/// Everything the scoring stages need, loaded all-or-nothing
pub struct ModelArtifacts {
    pub anomaly: Box<dyn AnomalyModel>,
    pub classifier: Box<dyn ClassifierModel>,
    pub labels: LabelDecoder,
}

impl ModelArtifacts {
    pub fn load(paths: &ArtifactPaths) -> Result<Self, ModelLoadError> {
        for (artifact, path) in [
            ("anomaly model", &paths.anomaly_model),
            ("classifier model", &paths.classifier_model),
            ("label decoder", &paths.label_decoder),
        ] {
            if !path.exists() {
                return Err(ModelLoadError::Missing { artifact, path: path.clone() });
            }
        }

        let labels = LabelDecoder::load(&paths.label_decoder)?;

        let anomaly_features = load_feature_names(&paths.anomaly_model)?;
        let anomaly = OnnxAnomalyModel::load(&paths.anomaly_model, anomaly_features)
            .map_err(|source| ModelLoadError::Runtime { artifact: "anomaly model", source })?;

        let classifier_features = load_feature_names(&paths.classifier_model)?;
        let classifier = OnnxClassifierModel::load(&paths.classifier_model, classifier_features)
            .map_err(|source| ModelLoadError::Runtime { artifact: "classifier model", source })?;

        tracing::info!("Model artifacts loaded ({} classes)", labels.classes().len());

        Ok(Self {
            anomaly: Box::new(anomaly),
            classifier: Box::new(classifier),
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_path_appends_suffix() {
        let path = manifest_path(Path::new("models/anomaly.onnx"));
        assert_eq!(path, PathBuf::from("models/anomaly.onnx.manifest.json"));
    }

    #[test]
    fn test_feature_names_default_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let names = load_feature_names(&dir.path().join("anomaly.onnx")).unwrap();
        assert_eq!(names.len(), DEFAULT_MODEL_FEATURES.len());
        assert_eq!(names[0], "flow_duration");
    }

    #[test]
    fn test_feature_names_from_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("anomaly.onnx");
        std::fs::write(
            manifest_path(&model),
            r#"{"feature_names": ["packet_rate", "syn_flag_count"]}"#,
        ).unwrap();

        let names = load_feature_names(&model).unwrap();
        assert_eq!(names, vec!["packet_rate", "syn_flag_count"]);
    }

    #[test]
    fn test_broken_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("anomaly.onnx");
        std::fs::write(manifest_path(&model), "{").unwrap();

        assert!(matches!(load_feature_names(&model), Err(ModelLoadError::Unreadable { .. })));
    }

    #[test]
    fn test_label_decoder_formats() {
        let dir = tempfile::tempdir().unwrap();

        let list = dir.path().join("list.json");
        std::fs::write(&list, r#"["BENIGN", "DDoS", "PortScan"]"#).unwrap();
        let decoder = LabelDecoder::load(&list).unwrap();
        assert_eq!(decoder.decode(1), Some("DDoS"));
        assert_eq!(decoder.decode(3), None);
        assert_eq!(decoder.decode(-1), None);

        let object = dir.path().join("object.json");
        std::fs::write(&object, r#"{"classes": ["BENIGN", "Bot"]}"#).unwrap();
        assert_eq!(LabelDecoder::load(&object).unwrap().decode(1), Some("Bot"));
    }

    #[test]
    fn test_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths {
            anomaly_model: dir.path().join("anomaly.onnx"),
            classifier_model: dir.path().join("classifier.onnx"),
            label_decoder: dir.path().join("labels.json"),
        };

        match ModelArtifacts::load(&paths) {
            Err(ModelLoadError::Missing { artifact, .. }) => assert_eq!(artifact, "anomaly model"),
            Err(other) => panic!("expected Missing, got {}", other),
            Ok(_) => panic!("expected load failure"),
        }
    }
}
