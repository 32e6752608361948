//! # Config API
//!
//! Read and patch persisted overrides. A patch rebuilds the service clients
//! so the next cycle or scan uses the new endpoints.

use aeroguard_core::reasoning::ChatCompletionsClient;
use aeroguard_core::tools::VisionClient;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::ApiResponse;
use crate::config::{ConfigDefaults, PersistedConfig};
use crate::state::SharedState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    pub config: PersistedConfig,
    pub defaults: ConfigDefaults,
}

pub fn config_routes() -> Router<SharedState> {
    Router::new().route("/config", get(get_config).patch(update_config))
}

/// Get current configuration
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Current configuration and defaults", body = ConfigResponse)
    )
)]
pub async fn get_config() -> Json<ConfigResponse> {
    let config = PersistedConfig::load().await;
    Json(ConfigResponse {
        config,
        defaults: ConfigDefaults::default(),
    })
}

/// Update configuration (partial merge)
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body = PersistedConfig,
    responses(
        (status = 200, description = "Updated configuration", body = ConfigResponse),
        (status = 400, description = "Invalid override", body = ApiResponse),
        (status = 500, description = "Client rebuild failed", body = ApiResponse)
    )
)]
pub async fn update_config(
    State(state): State<SharedState>,
    Json(updates): Json<PersistedConfig>,
) -> Result<Json<ConfigResponse>, (StatusCode, Json<ApiResponse>)> {
    updates
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiResponse::failure(e))))?;

    let mut config = PersistedConfig::load().await;
    config.merge(updates);

    if let Err(e) = config.save().await {
        tracing::warn!(error = %e, "Failed to save config");
    }

    let failure = |e: String| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::failure(e)),
        )
    };
    let reasoning =
        ChatCompletionsClient::new(config.reasoning_config()).map_err(|e| failure(e.to_string()))?;
    let vision = VisionClient::new(config.vision_config()).map_err(|e| failure(e.to_string()))?;

    *state.reasoning.write().await = Arc::new(reasoning);
    *state.vision.write().await = vision;
    tracing::info!("Service clients rebuilt from updated config");

    Ok(Json(ConfigResponse {
        config,
        defaults: ConfigDefaults::default(),
    }))
}
