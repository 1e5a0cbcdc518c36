//! Pipeline trigger API handlers
//!
//! POST /pipeline/run, GET /pipeline/status, POST /pipeline/cancel

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{PipelineRun, PipelineState},
    ActiveRun, AppState,
};

/// POST /pipeline/run response
#[derive(Debug, Serialize)]
pub struct StartRunResponse {
    pub run_id: Uuid,
    pub state: PipelineState,
    pub started_at: DateTime<Utc>,
}

/// GET /pipeline/status response
#[derive(Debug, Serialize)]
pub struct RunStatusResponse {
    /// Run still executing
    pub running: bool,
    pub elapsed_seconds: u64,
    #[serde(flatten)]
    pub run: PipelineRun,
}

/// POST /pipeline/cancel response
#[derive(Debug, Serialize)]
pub struct CancelRunResponse {
    pub run_id: Uuid,
    pub cancellation_requested: bool,
}

/// POST /pipeline/run
///
/// Start a full pass in the background. Returns 202 Accepted with the run id,
/// 409 Conflict while another run is in progress.
pub async fn start_run(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<StartRunResponse>)> {
    let mut active = state.active_run.lock().await;
    if let Some(current) = active.as_ref() {
        return Err(ApiError::Conflict(format!(
            "Pipeline run {} already in progress",
            current.run_id
        )));
    }

    let run = PipelineRun::new();
    let cancel_token = CancellationToken::new();
    *active = Some(ActiveRun {
        run_id: run.run_id,
        cancel_token: cancel_token.clone(),
    });
    drop(active);

    *state.last_run.write().await = Some(run.clone());

    let response = StartRunResponse {
        run_id: run.run_id,
        state: run.state,
        started_at: run.started_at,
    };

    tracing::info!(run_id = %response.run_id, "Pipeline run accepted");

    tokio::spawn(execute_pipeline_run(state.clone(), run, cancel_token));

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /pipeline/status
///
/// Report of the run in progress, or of the last finished run.
pub async fn get_run_status(State(state): State<AppState>) -> ApiResult<Json<RunStatusResponse>> {
    let running = state.active_run.lock().await.is_some();

    let mut run = state
        .last_run
        .read()
        .await
        .clone()
        .ok_or_else(|| ApiError::NotFound("No pipeline run has been started".to_string()))?;

    if running && !run.is_terminal() {
        run.state = *state.orchestrator.subscribe_stage().borrow();
    }

    tracing::debug!(run_id = %run.run_id, state = ?run.state, "Status query");

    Ok(Json(RunStatusResponse {
        running,
        elapsed_seconds: run.elapsed_seconds(),
        run,
    }))
}

/// POST /pipeline/cancel
///
/// Signal the run in progress to stop at its next item boundary.
pub async fn cancel_run(State(state): State<AppState>) -> ApiResult<Json<CancelRunResponse>> {
    let active = state.active_run.lock().await;
    let current = active
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("No pipeline run in progress".to_string()))?;

    current.cancel_token.cancel();

    tracing::info!(run_id = %current.run_id, "Pipeline run cancellation requested");

    Ok(Json(CancelRunResponse {
        run_id: current.run_id,
        cancellation_requested: true,
    }))
}

/// Background task executing one run
async fn execute_pipeline_run(state: AppState, mut run: PipelineRun, cancel_token: CancellationToken) {
    let run_id = run.run_id;
    tracing::info!(run_id = %run_id, "Background pipeline task started");

    match state.orchestrator.execute_run(&mut run, &cancel_token).await {
        Ok(()) => {
            tracing::info!(
                run_id = %run_id,
                state = ?run.state,
                warnings = run.warnings.len(),
                "Background pipeline task finished"
            );
            *state.last_error.write().await = None;
        }
        Err(e) => {
            tracing::error!(run_id = %run_id, error = %e, "Background pipeline task failed");
            *state.last_error.write().await = Some(e.to_string());
        }
    }

    *state.last_run.write().await = Some(run);
    *state.active_run.lock().await = None;
}

/// Build pipeline routes
pub fn pipeline_routes() -> Router<AppState> {
    Router::new()
        .route("/pipeline/run", post(start_run))
        .route("/pipeline/status", get(get_run_status))
        .route("/pipeline/cancel", post(cancel_run))
}
