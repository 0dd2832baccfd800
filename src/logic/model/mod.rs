//! Model runtime: ONNX sessions and the artifacts that configure them

pub mod artifacts;
pub mod inference;

pub use artifacts::{ArtifactPaths, LabelDecoder, ModelArtifacts, ModelLoadError};
pub use inference::{
    AnomalyModel, ClassifierModel, InferenceError, OnnxAnomalyModel, OnnxClassifierModel,
};
