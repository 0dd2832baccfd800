//! Data models

pub mod alert;
pub mod telemetry;

pub use alert::*;
pub use telemetry::*;
