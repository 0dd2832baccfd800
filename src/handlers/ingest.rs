//! Agent telemetry ingestion

use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Value};

use crate::{AppResult, AppState};

/// Accept one telemetry payload from a capture agent
pub async fn receive(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let ack = state.gateway.submit(&body).await?;

    tracing::debug!("Accepted {} payload ({} alerts)", ack.kind, ack.alerts);

    Ok(Json(json!({ "status": "success" })))
}
