//! HTTP surface of the live assistant.
//!
//! Stateless: every request carries the session state, and the response carries
//! the state after the chosen action has been applied.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use veritas_core::action::{AssistantAction, WireAction};
use veritas_core::catalogue::{Procedure, ProcedureCatalogue, StaticCatalogue};
use veritas_core::engine::DecisionEngine;
use veritas_core::error::CatalogueError;
use veritas_core::reducer;
use veritas_core::state::SessionState;
use veritas_core::transcript::{TranscriptBuffer, TranscriptEntry};

#[derive(Clone)]
pub struct AppState {
    pub catalogue: Arc<StaticCatalogue>,
    pub engine: Arc<DecisionEngine>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Catalogue(CatalogueError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Catalogue(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(%status, "Request failed: {}", self);
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub procedure_id: String,
    #[serde(default)]
    pub transcript: Vec<TranscriptEntry>,
    #[serde(default)]
    pub session_state: SessionState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub procedure_id: String,
    #[serde(default)]
    pub session_state: SessionState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub action: WireAction,
    pub session_state: SessionState,
}

impl ActionResponse {
    fn applied(state: &SessionState, action: AssistantAction) -> Self {
        Self {
            session_state: reducer::apply(state, &action),
            action: action.to_wire(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureSummary {
    pub id: String,
    pub name: String,
    pub step_count: usize,
}

/// Builds the router with a permissive CORS policy for browser clients.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/v1/assistant/evaluate", post(evaluate))
        .route("/v1/assistant/check-in", post(check_in))
        .route("/v1/procedures", get(list_procedures))
        .route("/v1/procedures/{id}", get(get_procedure))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn evaluate(
    State(app): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let procedure = app.catalogue.get_procedure(&request.procedure_id)?;

    let mut transcript = TranscriptBuffer::default();
    for entry in request.transcript {
        transcript.append(entry);
    }

    let action = app
        .engine
        .evaluate(transcript.recent_window(), &request.session_state, procedure)
        .await;
    tracing::info!(procedure = %procedure.id, action = %action.kind(), "Evaluated transcript");
    Ok(Json(ActionResponse::applied(&request.session_state, action)))
}

async fn check_in(
    State(app): State<AppState>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let procedure = app.catalogue.get_procedure(&request.procedure_id)?;
    let action = app.engine.check_in(&request.session_state, procedure);
    Ok(Json(ActionResponse::applied(&request.session_state, action)))
}

async fn list_procedures(State(app): State<AppState>) -> Json<Vec<ProcedureSummary>> {
    let summaries = app
        .catalogue
        .procedure_ids()
        .into_iter()
        .filter_map(|id| app.catalogue.get_procedure(id).ok())
        .map(|p| ProcedureSummary {
            id: p.id.clone(),
            name: p.name.clone(),
            step_count: p.steps.len(),
        })
        .collect();
    Json(summaries)
}

async fn get_procedure(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Procedure>, ApiError> {
    Ok(Json(app.catalogue.get_procedure(&id)?.clone()))
}
