//! # fedgraph HTTP API Module
//!
//! REST API over one federated store, built on axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /graphs` - Registered graph ids
//! - `POST /graphs` - Add a graph from an inline schema and properties
//! - `DELETE /graphs/{graph_id}` - Remove a graph
//! - `GET /schema` - Merged schema of the federation
//! - `GET /traits` - Traits every graph supports
//! - `POST /execute` - Execute an operation
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `FEDGRAPH_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `FEDGRAPH_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod types;

pub use auth::get_api_key_from_env;
pub use handlers::{
    add_graph_handler, execute_handler, graphs_handler, health_handler, remove_graph_handler,
    schema_handler, traits_handler,
};
pub use types::{
    AddGraphRequest, ErrorResponse, ExecuteResponse, GraphsResponse, HealthResponse,
    RemoveGraphResponse, TraitsResponse, status_for,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use fedgraph_core::{FederatedStore, FederationError};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
///
/// The store is internally synchronised (copy-on-write registry), so no
/// outer lock is needed.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FederatedStore>,
}

impl AppState {
    #[must_use]
    pub fn new(store: FederatedStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `FEDGRAPH_CORS_ORIGINS`.
///
/// - "*": allows all origins
/// - not set: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("FEDGRAPH_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (FEDGRAPH_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in FEDGRAPH_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No FEDGRAPH_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router, taking the API key from `FEDGRAPH_API_KEY`.
pub fn create_router(state: AppState) -> Router {
    create_router_with_api_key(state, get_api_key_from_env())
}

/// Create the router with an explicit API key (`None` disables auth).
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Authentication - validates API key (if configured)
pub fn create_router_with_api_key(state: AppState, api_key: Option<String>) -> Router {
    let cors = build_cors_layer();

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/graphs",
            get(handlers::graphs_handler).post(handlers::add_graph_handler),
        )
        .route("/graphs/{graph_id}", delete(handlers::remove_graph_handler))
        .route("/schema", get(handlers::schema_handler))
        .route("/traits", get(handlers::traits_handler))
        .route("/execute", post(handlers::execute_handler));

    match api_key {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            router = router.layer(axum_middleware::from_fn_with_state(
                Arc::new(key),
                auth::api_key_auth_middleware,
            ));
        }
        None => {
            tracing::warn!(
                "API key authentication DISABLED - all endpoints are publicly accessible! \
                 Set FEDGRAPH_API_KEY environment variable to enable authentication."
            );
        }
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(8 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, store: FederatedStore) -> Result<(), FederationError> {
    let router = create_router(AppState::new(store));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| FederationError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("fedgraph HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| FederationError::Io(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
