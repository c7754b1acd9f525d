//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{CatalogResponse, DifficultyDto, ErrorResponse, ScenarioDto},
    state::AppState,
    ws::ws_handler,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_scenarios,
        handlers::get_scenario,
        handlers::list_difficulties,
    ),
    components(
        schemas(CatalogResponse, ScenarioDto, DifficultyDto, ErrorResponse)
    ),
    tags(
        (name = "Salescoach API", description = "Catalog lookup and practice sessions for the sales rehearsal tool")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/scenarios", get(handlers::list_scenarios))
        .route("/scenarios/{id}", get(handlers::get_scenario))
        .route("/difficulties", get(handlers::list_difficulties))
        .route("/ws", get(ws_handler))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
