//! # API Endpoint Handlers
//!
//! Every core call is synchronous and may touch disk or fan out over the
//! dispatch pool, so it runs under `spawn_blocking`.

use super::{
    AppState,
    types::{
        AddGraphRequest, ErrorResponse, ExecuteResponse, GraphsResponse, HealthResponse,
        RemoveGraphResponse, TraitsResponse, status_for,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use fedgraph_core::{FederatedStore, FederationError, GraphConfigEntry, Operation, Schema, User};
use std::sync::Arc;

/// Header naming the caller an operation runs for.
pub const USER_HEADER: &str = "x-fedgraph-user";

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn error_response(error: &FederationError) -> (StatusCode, Json<ErrorResponse>) {
    (status_for(error), Json(ErrorResponse::new(error.to_string())))
}

/// Run a store call on the blocking pool.
async fn with_store<T, F>(state: &AppState, call: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&FederatedStore) -> Result<T, FederationError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    match tokio::task::spawn_blocking(move || call(&store)).await {
        Ok(Ok(value)) => Ok(Json(value)),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "request failed");
            Err(error_response(&e))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("Task failed: {}", e))),
        )),
    }
}

fn user_from(headers: &HeaderMap) -> User {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(User::new)
        .unwrap_or_default()
}

// =============================================================================
// HEALTH
// =============================================================================

pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// REGISTRY
// =============================================================================

pub async fn graphs_handler(State(state): State<AppState>) -> ApiResult<GraphsResponse> {
    with_store(&state, |store| Ok(store.graph_ids().into())).await
}

/// Add one graph; a conflicting id is 409.
pub async fn add_graph_handler(
    State(state): State<AppState>,
    Json(request): Json<AddGraphRequest>,
) -> ApiResult<GraphsResponse> {
    with_store(&state, move |store| {
        let entry = GraphConfigEntry::inline(request.schema, request.properties);
        store.add_graph(&request.graph_id, &entry)?;
        Ok(store.graph_ids().into())
    })
    .await
}

/// Remove a graph. Removing an unknown id is not an error.
pub async fn remove_graph_handler(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
) -> ApiResult<RemoveGraphResponse> {
    with_store(&state, move |store| {
        let removed = store.remove(&graph_id);
        Ok(RemoveGraphResponse { graph_id, removed })
    })
    .await
}

// =============================================================================
// SCHEMA & TRAITS
// =============================================================================

pub async fn schema_handler(State(state): State<AppState>) -> ApiResult<Schema> {
    with_store(&state, |store| store.schema().map(|s| s.as_ref().clone())).await
}

pub async fn traits_handler(State(state): State<AppState>) -> ApiResult<TraitsResponse> {
    with_store(&state, |store| Ok(store.traits().into())).await
}

// =============================================================================
// EXECUTE
// =============================================================================

pub async fn execute_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(operation): Json<Operation>,
) -> ApiResult<ExecuteResponse> {
    let user = user_from(&headers);
    with_store(&state, move |store| {
        store
            .execute(&operation, &user)
            .map(ExecuteResponse::from)
    })
    .await
}
