//! Feature Layout - Centralized Flow Feature Definition
//!
//! **This file controls the flow feature schema**
//!
//! ## Rules:
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! Models are trained against named columns, so the names here must match
//! what the capture agents emit and what the training pipeline reads.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Feature names in exact order they appear in the vector
pub const FEATURE_LAYOUT: &[&str] = &[
    // === Flow timing (0) ===
    "flow_duration",         // 0: Seconds between first and last packet (floored)

    // === Volume (1-2) ===
    "packet_count",          // 1: Packets observed in both directions
    "byte_count",            // 2: Bytes observed in both directions

    // === Rates (3-4) ===
    "packet_rate",           // 3: packet_count / flow_duration
    "byte_rate",             // 4: byte_count / flow_duration

    // === Direction (5-6) ===
    "src_bytes",             // 5: Bytes sent by the canonical first endpoint
    "dst_bytes",             // 6: Bytes sent by the other endpoint

    // === TCP flags (7-10) ===
    "syn_flag_count",        // 7
    "fin_flag_count",        // 8
    "rst_flag_count",        // 9
    "ack_flag_count",        // 10
];

/// Total number of features
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const FEATURE_COUNT: usize = 11;

/// Columns the default anomaly model is trained on, in training order.
pub const DEFAULT_MODEL_FEATURES: &[&str] = &[
    "flow_duration",
    "packet_count",
    "byte_count",
    "packet_rate",
    "byte_rate",
    "src_bytes",
    "dst_bytes",
];

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of the feature layout
pub fn compute_layout_hash() -> u32 {
    let mut hasher = Hasher::new();

    hasher.update(&[FEATURE_VERSION]);

    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

/// Get layout hash
pub fn layout_hash() -> u32 {
    compute_layout_hash()
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Complete layout information for status reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_count: FEATURE_COUNT,
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// FEATURE INDEX LOOKUP
// ============================================================================

/// Get feature index by name (O(n) but features are few)
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

// ============================================================================
// TESTS
// ============================================================================
