//! # Mission API
//!
//! Status board, command history and the mission report.

use aeroguard_core::squads::SquadStatus;
use aeroguard_core::state::{LogEntry, MissionReport};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ApiResponse;
use crate::state::SharedState;

const DEFAULT_LOG_LIMIT: usize = 50;

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub squads_total: usize,
    pub idle: usize,
    pub busy: usize,
    pub deployed: usize,
    pub latest_observation: Option<String>,
    pub hazard_level: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogEntryView {
    pub timestamp: String,
    pub kind: String,
    pub summary: String,
    pub observation: String,
}

impl From<LogEntry> for LogEntryView {
    fn from(entry: LogEntry) -> Self {
        Self {
            timestamp: entry.timestamp.to_rfc3339(),
            kind: entry.kind.as_str().to_string(),
            summary: entry.summary,
            observation: entry.observation,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogResponse {
    pub entries: Vec<LogEntryView>,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
}

pub fn mission_routes() -> Router<SharedState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/log", get(get_log).delete(clear_log))
        .route("/report", get(get_report))
}

/// Squad counts and the latest scan
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "mission",
    responses(
        (status = 200, description = "Current mission status", body = StatusResponse)
    )
)]
pub async fn get_status(State(state): State<SharedState>) -> Json<StatusResponse> {
    let scene = state.scene.read().await.clone();
    let registry = state.registry.read().await;
    Json(StatusResponse {
        squads_total: registry.len(),
        idle: registry.count_by_status(SquadStatus::Idle),
        busy: registry.count_by_status(SquadStatus::Busy),
        deployed: registry.count_by_status(SquadStatus::Deployed),
        latest_observation: scene.latest_observation,
        hazard_level: scene.severity.map(|s| s.to_string()),
    })
}

/// Command history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/log",
    tag = "mission",
    params(("limit" = Option<usize>, Query, description = "Maximum entries (default 50)")),
    responses(
        (status = 200, description = "Recent log entries", body = LogResponse),
        (status = 500, description = "Database error", body = ApiResponse)
    )
)]
pub async fn get_log(
    State(state): State<SharedState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<LogResponse>, (StatusCode, Json<ApiResponse>)> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    let entries = state.mission_log.recent(limit).map_err(internal)?;
    Ok(Json(LogResponse {
        entries: entries.into_iter().map(LogEntryView::from).collect(),
    }))
}

/// Clear the command history
#[utoipa::path(
    delete,
    path = "/api/v1/log",
    tag = "mission",
    responses(
        (status = 200, description = "Log cleared", body = ApiResponse),
        (status = 500, description = "Database error", body = ApiResponse)
    )
)]
pub async fn clear_log(
    State(state): State<SharedState>,
) -> Result<Json<ApiResponse>, (StatusCode, Json<ApiResponse>)> {
    let removed = state.mission_log.clear().map_err(internal)?;
    Ok(Json(ApiResponse::success(format!(
        "Removed {} log entries",
        removed
    ))))
}

/// Mission report as markdown
#[utoipa::path(
    get,
    path = "/api/v1/report",
    tag = "mission",
    responses(
        (status = 200, description = "Markdown mission report", body = String, content_type = "text/markdown"),
        (status = 500, description = "Database error", body = ApiResponse)
    )
)]
pub async fn get_report(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiResponse>)> {
    let history = state.mission_log.history().map_err(internal)?;
    let scene = state.scene.read().await.clone();
    let registry = state.registry.read().await;

    let report = MissionReport::render(
        scene.latest_observation.as_deref(),
        scene.severity,
        &registry,
        &history,
    );

    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        report,
    ))
}

fn internal(e: anyhow::Error) -> (StatusCode, Json<ApiResponse>) {
    tracing::error!(error = %e, "Mission log query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::failure(e.to_string())),
    )
}
