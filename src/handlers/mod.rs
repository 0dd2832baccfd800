//! HTTP handlers

pub mod health;
pub mod ingest;
pub mod status;
pub mod stream;
