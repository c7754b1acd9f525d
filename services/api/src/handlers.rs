//! Axum Handlers for the REST API
//!
//! Read-only catalog endpoints for clients that do not hold a WebSocket
//! session. Documented with `utoipa` doc attributes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use salescoach_core::DifficultyLevel;
use salescoach_core::catalog::find_scenario;
use std::sync::Arc;
use tracing::{error, warn};

use crate::{
    models::{CatalogResponse, DifficultyDto, ErrorResponse, ScenarioDto},
    state::AppState,
};

pub enum ApiError {
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// List all practice scenarios, grouped by category.
///
/// Degrades to an empty catalog when the backend is unreachable, matching
/// the in-session behavior: selection has no options, nothing blocks.
#[utoipa::path(
    get,
    path = "/scenarios",
    responses(
        (status = 200, description = "Categorized scenario directory", body = CatalogResponse)
    )
)]
pub async fn list_scenarios(State(state): State<Arc<AppState>>) -> Json<CatalogResponse> {
    match state.backend.fetch_scenarios().await {
        Ok(catalog) => Json(CatalogResponse::from(&catalog)),
        Err(e) => {
            warn!(error = %e, "Scenario catalog unavailable; returning empty directory");
            Json(CatalogResponse(Default::default()))
        }
    }
}

/// Get a single scenario by its id.
#[utoipa::path(
    get,
    path = "/scenarios/{id}",
    responses(
        (status = 200, description = "Scenario details", body = ScenarioDto),
        (status = 404, description = "Scenario not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "Scenario id")
    )
)]
pub async fn get_scenario(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let catalog = state.backend.fetch_scenarios().await?;
    let scenario = find_scenario(&catalog, &id)
        .ok_or_else(|| ApiError::NotFound(format!("Scenario with id '{}' not found", id)))?;

    Ok((StatusCode::OK, Json(ScenarioDto::from(scenario))))
}

/// List the difficulty levels offered for practice sessions.
#[utoipa::path(
    get,
    path = "/difficulties",
    responses(
        (status = 200, description = "Available difficulty levels", body = [DifficultyDto])
    )
)]
pub async fn list_difficulties() -> Json<Vec<DifficultyDto>> {
    Json(
        DifficultyLevel::presets()
            .iter()
            .map(DifficultyDto::from)
            .collect(),
    )
}
