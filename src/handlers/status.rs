//! Engine status handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::logic::detection::EngineStatus;
use crate::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    engine: EngineStatus,
    live_flows: usize,
    pending_bytes: u64,
    subscribers: usize,
}

pub async fn engine_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        engine: state.engine.status(),
        live_flows: state.flows.len(),
        pending_bytes: state.rate.pending_bytes(),
        subscribers: state.bus.subscriber_count(),
    })
}
