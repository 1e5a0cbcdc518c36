//! vri-ai library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod types;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::models::PipelineRun;
use crate::services::PipelineOrchestrator;

/// Run currently executing in the background
#[derive(Debug, Clone)]
pub struct ActiveRun {
    pub run_id: Uuid,
    pub cancel_token: CancellationToken,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    /// At most one run at a time
    pub active_run: Arc<Mutex<Option<ActiveRun>>>,
    /// Report of the run in progress or the last finished one
    pub last_run: Arc<RwLock<Option<PipelineRun>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last run failure for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self {
            orchestrator,
            active_run: Arc::new(Mutex::new(None)),
            last_run: Arc::new(RwLock::new(None)),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::pipeline_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
