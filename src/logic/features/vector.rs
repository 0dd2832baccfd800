//! Feature Vector - Core data structure for scorer input
//!
//! **Versioned, named flow features**
//!
//! Slots are optional: agents may omit columns, and a scorer that needs a
//! missing column is skipped rather than fed a made-up value.

use serde::{Deserialize, Serialize};
use super::layout::{
    feature_index, layout_hash, FEATURE_COUNT, FEATURE_VERSION,
};

// ============================================================================
// VERSIONED FEATURE VECTOR
// ============================================================================

/// Versioned Feature Vector with layout metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Feature layout version
    pub version: u8,
    /// CRC32 hash of the feature layout
    pub layout_hash: u32,
    /// Feature values in order defined by FEATURE_LAYOUT
    pub values: [Option<f64>; FEATURE_COUNT],
}

impl FeatureVector {
    /// Create an empty feature vector with current version
    pub fn new() -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values: [None; FEATURE_COUNT],
        }
    }

    /// Get feature by index
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    /// Get feature by name
    pub fn get_by_name(&self, name: &str) -> Option<f64> {
        feature_index(name).and_then(|i| self.get(i))
    }

    /// Set feature by name. Returns false for names outside the layout.
    pub fn set_by_name(&mut self, name: &str, value: f64) -> bool {
        match feature_index(name) {
            Some(index) => {
                self.values[index] = Some(value);
                true
            }
            None => false,
        }
    }

    /// Build a model input row in the order of `names`.
    ///
    /// Returns the names that are absent (or unknown to the layout) as the
    /// error so the caller can report a schema mismatch.
    pub fn select(&self, names: &[String]) -> Result<Vec<f32>, Vec<String>> {
        let mut row = Vec::with_capacity(names.len());
        let mut missing = Vec::new();

        for name in names {
            match self.get_by_name(name) {
                Some(v) => row.push(v as f32),
                None => missing.push(name.clone()),
            }
        }

        if missing.is_empty() {
            Ok(row)
        } else {
            Err(missing)
        }
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// BUILDER PATTERN
// ============================================================================

/// Builder for creating FeatureVector with named setters
pub struct FeatureVectorBuilder {
    vector: FeatureVector,
}

impl FeatureVectorBuilder {
    pub fn new() -> Self {
        Self { vector: FeatureVector::new() }
    }

    pub fn flow_duration(mut self, value: f64) -> Self {
        self.vector.set_by_name("flow_duration", value);
        self
    }

    pub fn packet_count(mut self, value: f64) -> Self {
        self.vector.set_by_name("packet_count", value);
        self
    }

    pub fn byte_count(mut self, value: f64) -> Self {
        self.vector.set_by_name("byte_count", value);
        self
    }

    pub fn packet_rate(mut self, value: f64) -> Self {
        self.vector.set_by_name("packet_rate", value);
        self
    }

    pub fn byte_rate(mut self, value: f64) -> Self {
        self.vector.set_by_name("byte_rate", value);
        self
    }

    pub fn src_bytes(mut self, value: f64) -> Self {
        self.vector.set_by_name("src_bytes", value);
        self
    }

    pub fn dst_bytes(mut self, value: f64) -> Self {
        self.vector.set_by_name("dst_bytes", value);
        self
    }

    /// Optional columns are only set when present
    pub fn maybe(mut self, name: &str, value: Option<f64>) -> Self {
        if let Some(v) = value {
            self.vector.set_by_name(name, v);
        }
        self
    }

    pub fn build(self) -> FeatureVector {
        self.vector
    }
}

impl Default for FeatureVectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_vector_is_empty() {
        let v = FeatureVector::new();
        assert!(v.values.iter().all(Option::is_none));
        assert_eq!(v.get_by_name("packet_rate"), None);
    }

    #[test]
    fn test_select_reports_missing_columns() {
        let v = FeatureVectorBuilder::new()
            .packet_rate(10.0)
            .byte_count(500.0)
            .build();

        let names = vec!["packet_rate".to_string(), "dst_bytes".to_string()];
        let missing = v.select(&names).unwrap_err();
        assert_eq!(missing, vec!["dst_bytes".to_string()]);
    }

    #[test]
    fn test_select_keeps_model_order() {
        let v = FeatureVectorBuilder::new()
            .src_bytes(1.0)
            .dst_bytes(2.0)
            .build();

        let names = vec!["dst_bytes".to_string(), "src_bytes".to_string()];
        assert_eq!(v.select(&names).unwrap(), vec![2.0, 1.0]);
    }

    #[test]
    fn test_unknown_name_rejected() {
        let mut v = FeatureVector::new();
        assert!(!v.set_by_name("not_a_feature", 1.0));
    }
}
