//! Inference Engine - ONNX Runtime Integration
//!
//! Loads exported scikit-learn models and runs single-row inference.
//! Scoring stages only see the traits below, so tests and future runtimes
//! can swap the backend.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::tensor::PrimitiveTensorElementType;
use ort::value::Value;
use parking_lot::Mutex;

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
#[error("InferenceError: {0}")]
pub struct InferenceError(pub String);

// ============================================================================
// SCORING TRAITS
// ============================================================================

/// Unsupervised scorer: lower scores are more anomalous
pub trait AnomalyModel: Send + Sync {
    /// Input columns, in the order the model was trained on
    fn feature_names(&self) -> &[String];

    fn decision_score(&self, row: &[f32]) -> Result<f32, InferenceError>;

    /// Mean inference time, if the backend tracks it
    fn avg_latency_ms(&self) -> Option<f32> {
        None
    }
}

/// Supervised multi-class classifier producing an encoded class index
pub trait ClassifierModel: Send + Sync {
    fn feature_names(&self) -> &[String];

    fn predict_class(&self, row: &[f32]) -> Result<i64, InferenceError>;

    fn avg_latency_ms(&self) -> Option<f32> {
        None
    }
}

// ============================================================================
// ONNX SESSION WRAPPER
// ============================================================================

/// One loaded ONNX session.
///
/// `Session::run` needs `&mut`, so the session sits behind its own mutex;
/// concurrent scorers queue here, not on the flow table.
pub struct OnnxModel {
    session: Mutex<Session>,
    output_name: String,
    runs: AtomicU64,
    latency_us: AtomicU64,
}

impl OnnxModel {
    /// Load a model from file, reading `preferred_output` if the graph has it
    /// and the first output otherwise.
    pub fn load(path: &Path, preferred_output: &str) -> Result<Self, InferenceError> {
        tracing::info!("Loading ONNX model from: {}", path.display());

        if !path.exists() {
            return Err(InferenceError(format!("Model not found: {}", path.display())));
        }

        let session = Session::builder()
            .map_err(|e| InferenceError(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError(format!("Failed to set optimization: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| InferenceError(format!("Failed to load model: {}", e)))?;

        let output_name = session.outputs.iter()
            .find(|o| o.name == preferred_output)
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .ok_or_else(|| InferenceError("No output defined".to_string()))?;

        tracing::info!("ONNX model loaded ({} -> output '{}')", path.display(), output_name);

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            runs: AtomicU64::new(0),
            latency_us: AtomicU64::new(0),
        })
    }

    fn input_array(row: &[f32]) -> Result<Array2<f32>, InferenceError> {
        Array2::<f32>::from_shape_vec((1, row.len()), row.to_vec())
            .map_err(|e| InferenceError(format!("Array error: {}", e)))
    }

    /// Run one row and return the first element of the selected output
    pub fn run_first<T>(&self, row: &[f32]) -> Result<T, InferenceError>
    where
        T: PrimitiveTensorElementType + Copy + std::fmt::Debug,
    {
        let start = Instant::now();
        let input = Value::from_array(Self::input_array(row)?)
            .map_err(|e| InferenceError(format!("Tensor error: {}", e)))?;

        let value = {
            let mut session = self.session.lock();
            let outputs = session.run(ort::inputs![input])
                .map_err(|e| InferenceError(format!("Inference failed: {}", e)))?;

            let output = outputs.get(&self.output_name)
                .ok_or_else(|| InferenceError("No output".to_string()))?;
            let (_, data) = output.try_extract_tensor::<T>()
                .map_err(|e| InferenceError(format!("Extract error: {}", e)))?;

            let first = data.first().copied()
                .ok_or_else(|| InferenceError("Empty output tensor".to_string()))?;
            first
        };

        self.track(start);
        Ok(value)
    }

    fn track(&self, start: Instant) {
        self.latency_us.fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Average latency in milliseconds, `None` before the first run
    pub fn avg_latency_ms(&self) -> Option<f32> {
        let runs = self.runs.load(Ordering::Relaxed);
        if runs == 0 {
            return None;
        }
        Some((self.latency_us.load(Ordering::Relaxed) as f32 / runs as f32) / 1000.0)
    }
}

// ============================================================================
// ONNX-BACKED SCORERS
// ============================================================================

/// Isolation forest exported with its `scores` (decision function) output
pub struct OnnxAnomalyModel {
    model: OnnxModel,
    features: Vec<String>,
}

impl OnnxAnomalyModel {
    pub const SCORE_OUTPUT: &'static str = "scores";

    pub fn load(path: &Path, features: Vec<String>) -> Result<Self, InferenceError> {
        Ok(Self {
            model: OnnxModel::load(path, Self::SCORE_OUTPUT)?,
            features,
        })
    }
}

impl AnomalyModel for OnnxAnomalyModel {
    fn feature_names(&self) -> &[String] {
        &self.features
    }

    fn decision_score(&self, row: &[f32]) -> Result<f32, InferenceError> {
        self.model.run_first::<f32>(row)
    }

    fn avg_latency_ms(&self) -> Option<f32> {
        self.model.avg_latency_ms()
    }
}

/// Random forest exported with its `output_label` output
pub struct OnnxClassifierModel {
    model: OnnxModel,
    features: Vec<String>,
}

impl OnnxClassifierModel {
    pub const LABEL_OUTPUT: &'static str = "output_label";

    pub fn load(path: &Path, features: Vec<String>) -> Result<Self, InferenceError> {
        Ok(Self {
            model: OnnxModel::load(path, Self::LABEL_OUTPUT)?,
            features,
        })
    }
}

impl ClassifierModel for OnnxClassifierModel {
    fn feature_names(&self) -> &[String] {
        &self.features
    }

    fn predict_class(&self, row: &[f32]) -> Result<i64, InferenceError> {
        self.model.run_first::<i64>(row)
    }

    fn avg_latency_ms(&self) -> Option<f32> {
        self.model.avg_latency_ms()
    }
}
