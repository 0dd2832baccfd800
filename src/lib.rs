//! flowguard - flow telemetry ingestion and hybrid threat detection
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   POST /api/data   ┌──────────────────────────────────────┐
//! │ host / net   │ ─────────────────▶ │  IngestionGateway                    │
//! │ agents       │                    │   ├─ RateMeter      (throughput)     │
//! └──────────────┘                    │   ├─ FlowAggregator (flow table)     │
//!                                     │   └─ DetectionEngine                 │
//!                                     │        rules → anomaly → signature   │
//!                                     └──────────────────┬───────────────────┘
//!                                                        ▼
//!                                     ┌──────────────────────────────────────┐
//!                                     │  EventBus ── GET /ws ──▶ dashboards  │
//!                                     └──────────────────────────────────────┘
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod logic;
pub mod models;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use logic::detection::DetectionEngine;
use logic::events::EventBus;
use logic::flow::FlowAggregator;
use logic::gateway::IngestionGateway;
use logic::rate::RateMeter;

pub use config::Config;
pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<IngestionGateway>,
    pub engine: Arc<DetectionEngine>,
    pub flows: Arc<FlowAggregator>,
    pub rate: Arc<RateMeter>,
    pub bus: Arc<EventBus>,
}

impl AppState {
    /// Wire the ingestion components around an already-loaded engine
    pub fn new(config: Config, engine: DetectionEngine) -> Self {
        let engine = Arc::new(engine);
        let flows = Arc::new(FlowAggregator::new(config.flow_idle_timeout));
        let rate = Arc::new(RateMeter::new(config.rate_interval));
        let bus = Arc::new(EventBus::new(config.event_bus_capacity));

        let gateway = Arc::new(IngestionGateway::new(
            Arc::clone(&flows),
            Arc::clone(&rate),
            Arc::clone(&engine),
            Arc::clone(&bus),
        ));

        Self { config, gateway, engine, flows, rate, bus }
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/data", post(handlers::ingest::receive))
        .route("/api/engine/status", get(handlers::status::engine_status))
        .route("/ws", get(handlers::stream::ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
