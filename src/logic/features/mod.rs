//! Features Module - Flow Feature Schema
//!
//! Named, versioned feature vectors shared by the flow aggregator, the
//! ingestion gateway and every scoring stage.

pub mod layout;
pub mod vector;

// Re-export common types
pub use layout::{LayoutInfo, DEFAULT_MODEL_FEATURES, FEATURE_COUNT, FEATURE_LAYOUT};
pub use vector::{FeatureVector, FeatureVectorBuilder};
