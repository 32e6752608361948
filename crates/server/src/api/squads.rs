//! # Squads API
//!
//! Read-only views of the squad registry.

use aeroguard_core::squads::Squad;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::ApiResponse;
use crate::state::SharedState;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SquadView {
    pub name: String,
    pub status: String,
    #[serde(rename = "type")]
    pub unit_type: String,
    pub location: String,
    pub capacity: u32,
    pub equipment: Vec<String>,
}

impl From<&Squad> for SquadView {
    fn from(squad: &Squad) -> Self {
        Self {
            name: squad.name().to_string(),
            status: squad.status().to_string(),
            unit_type: squad.unit_type().to_string(),
            location: squad.location().to_string(),
            capacity: squad.capacity(),
            equipment: squad.equipment().to_vec(),
        }
    }
}

pub fn squad_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_squads))
        .route("/:name", get(get_squad))
}

/// List all squads in name order
#[utoipa::path(
    get,
    path = "/api/v1/squads",
    tag = "squads",
    responses(
        (status = 200, description = "Every squad in the registry", body = Vec<SquadView>)
    )
)]
pub async fn list_squads(State(state): State<SharedState>) -> Json<Vec<SquadView>> {
    let registry = state.registry.read().await;
    Json(registry.iter().map(SquadView::from).collect())
}

/// Get one squad by name
#[utoipa::path(
    get,
    path = "/api/v1/squads/{name}",
    tag = "squads",
    params(("name" = String, Path, description = "Squad name")),
    responses(
        (status = 200, description = "The squad", body = SquadView),
        (status = 404, description = "No such squad", body = ApiResponse)
    )
)]
pub async fn get_squad(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<SquadView>, (StatusCode, Json<ApiResponse>)> {
    let registry = state.registry.read().await;
    registry
        .get(&name)
        .map(|squad| Json(SquadView::from(squad)))
        .map_err(|e| (StatusCode::NOT_FOUND, Json(ApiResponse::failure(e.to_string()))))
}
