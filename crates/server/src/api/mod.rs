//! # AeroGuard API
//!
//! All routes live under `/api/v1`.

pub mod config;
pub mod dispatch;
pub mod mission;
pub mod squads;

use axum::{
    body::Body,
    extract::State,
    http::{header, Response, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use serde::Serialize;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use utoipa::{OpenApi, ToSchema};

use crate::state::SharedState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AeroGuard API",
        version = "0.1.0",
        description = "Incident commander: squad registry, dispatch cycles and mission log"
    ),
    paths(
        squads::list_squads,
        squads::get_squad,
        dispatch::dispatch,
        dispatch::scan,
        mission::get_status,
        mission::get_log,
        mission::clear_log,
        mission::get_report,
        config::get_config,
        config::update_config,
    ),
    components(
        schemas(
            ApiResponse,
            squads::SquadView,
            dispatch::DispatchRequest,
            dispatch::ScanResponse,
            dispatch::HazardStatsView,
            mission::StatusResponse,
            mission::LogResponse,
            mission::LogEntryView,
            config::ConfigResponse,
            crate::config::PersistedConfig,
            crate::config::ConfigDefaults
        )
    ),
    tags(
        (name = "squads", description = "Squad registry"),
        (name = "dispatch", description = "Scanning and dispatch cycles"),
        (name = "mission", description = "Status, command history and report"),
        (name = "config", description = "Configuration management")
    )
)]
pub struct ApiDoc;

/// All v1 routes, ready to be nested under `/api/v1`
pub fn routes() -> Router<SharedState> {
    Router::new()
        .nest("/squads", squads::squad_routes())
        .merge(dispatch::dispatch_routes())
        .merge(mission::mission_routes())
        .merge(config::config_routes())
        .route("/events", get(events))
        .route("/openapi.json", get(serve_openapi))
}

/// SSE endpoint for every cycle's events, with heartbeat
async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            let timeout =
                tokio::time::timeout(std::time::Duration::from_secs(15), rx.recv()).await;

            match timeout {
                Ok(Ok(event)) => return Some((Ok(dispatch::to_sse(&event)), rx)),
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "Event subscriber lagged");
                }
                Ok(Err(RecvError::Closed)) => return None,
                // Timeout - send heartbeat comment
                Err(_) => return Some((Ok(Event::default().comment("heartbeat")), rx)),
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn serve_openapi() -> impl IntoResponse {
    match ApiDoc::openapi().to_json() {
        Ok(spec) => Response::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(spec))
            .unwrap_or_default(),
        Err(e) => Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::from(e.to_string()))
            .unwrap_or_default(),
    }
}
