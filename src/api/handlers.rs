//! API request handlers

use crate::store::models::{ConnectionConfig, ExternalRef, PersistedTestCase, SuiteSnapshot};
use crate::sync::{SuitesView, SyncError, SyncOrchestrator, SyncReport};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared server state
pub struct ServerState {
    pub orchestrator: Arc<SyncOrchestrator>,
}

pub type OrchestratorState = Arc<ServerState>;

// ============================================================================
// Health check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
}

/// Health check: 200 when the document store answers, 503 otherwise.
pub async fn health(State(state): State<OrchestratorState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, store) = match state.orchestrator.store().list_connections().await {
        Ok(_) => (StatusCode::OK, "connected"),
        Err(e) => {
            tracing::warn!("Health check: document store unavailable: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "disconnected")
        }
    };

    (
        status,
        Json(HealthResponse {
            status: if status == StatusCode::OK { "ok" } else { "unhealthy" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: store.to_string(),
        }),
    )
}

// ============================================================================
// Scopes and connections
// ============================================================================

/// Connection fields accepted on PUT; the scope comes from the path
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub organization: String,
    pub project: String,
    #[serde(default)]
    pub issue_repository: Option<String>,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub plan_ids: Vec<u32>,
}

pub async fn list_scopes(
    State(state): State<OrchestratorState>,
) -> Result<Json<Vec<ConnectionConfig>>, AppError> {
    Ok(Json(state.orchestrator.list_connections().await?))
}

pub async fn get_connection(
    State(state): State<OrchestratorState>,
    Path(scope): Path<String>,
) -> Result<Json<ConnectionConfig>, AppError> {
    Ok(Json(state.orchestrator.get_connection(&scope).await?))
}

pub async fn put_connection(
    State(state): State<OrchestratorState>,
    Path(scope): Path<String>,
    Json(req): Json<ConnectionRequest>,
) -> Result<Json<ConnectionConfig>, AppError> {
    let connection = ConnectionConfig {
        resource_scope: scope,
        organization: req.organization,
        project: req.project,
        issue_repository: req.issue_repository.filter(|r| !r.trim().is_empty()),
        requirements: req.requirements,
        plan_ids: req.plan_ids,
    };
    state.orchestrator.save_connection(&connection).await?;
    Ok(Json(connection))
}

// ============================================================================
// Suites
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SuitesQuery {
    #[serde(default)]
    pub refresh: bool,
}

pub async fn list_suites(
    State(state): State<OrchestratorState>,
    Path(scope): Path<String>,
    Query(query): Query<SuitesQuery>,
) -> Result<Json<SuitesView>, AppError> {
    Ok(Json(state.orchestrator.read_suites(&scope, query.refresh).await?))
}

pub async fn get_suite(
    State(state): State<OrchestratorState>,
    Path((scope, suite_key)): Path<(String, String)>,
) -> Result<Json<SuiteSnapshot>, AppError> {
    Ok(Json(state.orchestrator.get_snapshot(&scope, &suite_key).await?))
}

pub async fn sync_scope(
    State(state): State<OrchestratorState>,
    Path(scope): Path<String>,
) -> Result<Json<SyncReport>, AppError> {
    Ok(Json(state.orchestrator.refresh(&scope).await?))
}

// ============================================================================
// Test case decoration
// ============================================================================

pub async fn link_issue(
    State(state): State<OrchestratorState>,
    Path((scope, suite_key, test_case_id)): Path<(String, String, u32)>,
) -> Result<Json<ExternalRef>, AppError> {
    Ok(Json(
        state
            .orchestrator
            .link_issue(&scope, &suite_key, test_case_id)
            .await?,
    ))
}

pub async fn enhance_test_case(
    State(state): State<OrchestratorState>,
    Path((scope, suite_key, test_case_id)): Path<(String, String, u32)>,
) -> Result<Json<PersistedTestCase>, AppError> {
    Ok(Json(
        state
            .orchestrator
            .enhance_test_case(&scope, &suite_key, test_case_id)
            .await?,
    ))
}

// ============================================================================
// Error handling
// ============================================================================

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    NotImplemented(String),
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::NotImplemented(msg) => (StatusCode::NOT_IMPLEMENTED, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        let message = err.to_string();
        match err {
            SyncError::ConnectionNotFound(_)
            | SyncError::SnapshotNotFound { .. }
            | SyncError::TestCaseNotFound { .. } => AppError::NotFound(message),
            SyncError::InvalidInput(_) => AppError::BadRequest(message),
            SyncError::EmptyRefresh(_) => AppError::Conflict(message),
            SyncError::NotConfigured(_) => AppError::NotImplemented(message),
            SyncError::Remote(_) | SyncError::Integration(_) => AppError::BadGateway(message),
            SyncError::ClientSetup(_) => AppError::Internal(anyhow::anyhow!(message)),
            SyncError::Store(e) => AppError::Internal(e),
        }
    }
}
