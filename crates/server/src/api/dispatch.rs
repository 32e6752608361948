//! # Dispatch API
//!
//! Scan a frame into an observation, then run a dispatch cycle on it with the
//! cycle's events streamed back as SSE.

use aeroguard_core::dispatch::{describe, DispatchEvent};
use aeroguard_core::tools::VisionError;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use utoipa::ToSchema;

use super::ApiResponse;
use crate::state::SharedState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct DispatchRequest {
    /// Free-text hazard observation, e.g. the line produced by `/scan`
    pub observation: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HazardStatsView {
    pub hazard_type: String,
    pub coverage_pct: f64,
    pub mask_count: u32,
    pub hazard_confidence: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScanResponse {
    pub observation: String,
    pub severity: String,
    pub stats: HazardStatsView,
    /// Annotated frame, base64 encoded
    pub annotated_image: String,
}

pub fn dispatch_routes() -> Router<SharedState> {
    Router::new()
        .route("/dispatch", post(dispatch))
        .route("/scan", post(scan))
}

/// Convert a dispatch event to an SSE frame named after its kind
pub(crate) fn to_sse(event: &DispatchEvent) -> Event {
    let json = serde_json::to_string(event).unwrap_or_default();
    Event::default().event(event.kind().as_str()).data(json)
}

/// Run one dispatch cycle and stream its events
#[utoipa::path(
    post,
    path = "/api/v1/dispatch",
    tag = "dispatch",
    request_body = DispatchRequest,
    responses(
        (status = 200, description = "SSE stream of the cycle's events, ending with status, warning or error", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Empty observation", body = ApiResponse)
    )
)]
pub async fn dispatch(
    State(state): State<SharedState>,
    Json(req): Json<DispatchRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<ApiResponse>)> {
    let observation = req.observation.trim().to_string();
    if observation.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::failure("observation must not be empty")),
        ));
    }

    tracing::info!(observation = %observation, "Dispatch requested");

    let (tx, rx) = mpsc::channel::<DispatchEvent>(64);
    tokio::spawn(async move {
        state.run_cycle(&observation, Some(tx)).await;
    });

    let stream = ReceiverStream::new(rx).map(|event| Ok(to_sse(&event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Send a raw frame to the vision server and turn its stats into an observation
#[utoipa::path(
    post,
    path = "/api/v1/scan",
    tag = "dispatch",
    request_body(content = Vec<u8>, description = "Raw image frame", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Observation derived from the frame", body = ScanResponse),
        (status = 400, description = "Empty frame", body = ApiResponse),
        (status = 502, description = "Vision server failed", body = ApiResponse),
        (status = 504, description = "Vision server timed out", body = ApiResponse)
    )
)]
pub async fn scan(
    State(state): State<SharedState>,
    frame: Bytes,
) -> Result<Json<ScanResponse>, (StatusCode, Json<ApiResponse>)> {
    if frame.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::failure("request body must contain an image frame")),
        ));
    }

    let vision = state.vision.read().await.clone();
    let analysis = vision.analyze_frame(frame.to_vec()).await.map_err(|e| {
        tracing::warn!(error = %e, "Scan failed");
        let status = match e {
            VisionError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        };
        (status, Json(ApiResponse::failure(e.to_string())))
    })?;

    let observation = describe(&analysis.stats);
    let severity = analysis.stats.severity();
    {
        let mut scene = state.scene.write().await;
        scene.latest_observation = Some(observation.clone());
        scene.severity = Some(severity);
    }

    let stats = analysis.stats;
    Ok(Json(ScanResponse {
        observation,
        severity: severity.to_string(),
        stats: HazardStatsView {
            hazard_type: stats.hazard_type,
            coverage_pct: stats.coverage_pct,
            mask_count: stats.mask_count,
            hazard_confidence: stats.hazard_confidence,
        },
        annotated_image: STANDARD.encode(&analysis.annotated_image),
    }))
}
