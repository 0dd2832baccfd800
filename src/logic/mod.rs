//! Core logic: flow tracking, detection and event fan-out

pub mod features;
pub mod flow;
pub mod rate;
pub mod model;
pub mod detection;
pub mod events;
pub mod gateway;
