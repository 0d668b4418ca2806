//! HTTP surface.

use crate::{db::Recipe, error::RecipeError, workflow::RecipeWorkflow};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::PathRejection},
    routing::get,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    workflow: Arc<RecipeWorkflow>,
}

/// Build the service router.
pub fn router(workflow: Arc<RecipeWorkflow>) -> Router {
    Router::new()
        .route("/get-recipe/{id}", get(get_recipe))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { workflow })
}

async fn get_recipe(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<Recipe>, RecipeError> {
    let Path(id) = id.map_err(|_| RecipeError::InvalidId)?;
    state
        .workflow
        .handle_request(id)
        .await?
        .map(Json)
        .ok_or(RecipeError::NotFound { id })
}

// Liveness only; touches neither Vault nor the database.
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
