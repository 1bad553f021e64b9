//! # API Request/Response Types
//!
//! JSON structures for the HTTP API.

use axum::http::StatusCode;
use fedgraph_core::{
    CloseableIterator, Element, FederationError, OperationResult, Schema, StoreProperties,
    StoreTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// GRAPHS
// =============================================================================

/// Registered graph ids, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphsResponse {
    pub graph_ids: Vec<String>,
}

impl From<BTreeSet<String>> for GraphsResponse {
    fn from(ids: BTreeSet<String>) -> Self {
        Self {
            graph_ids: ids.into_iter().collect(),
        }
    }
}

/// Add a graph from inline parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddGraphRequest {
    pub graph_id: String,
    pub schema: Schema,
    pub properties: StoreProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveGraphResponse {
    pub graph_id: String,
    pub removed: bool,
}

// =============================================================================
// TRAITS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitsResponse {
    pub traits: Vec<StoreTrait>,
}

impl From<BTreeSet<StoreTrait>> for TraitsResponse {
    fn from(traits: BTreeSet<StoreTrait>) -> Self {
        Self {
            traits: traits.into_iter().collect(),
        }
    }
}

// =============================================================================
// EXECUTE RESPONSE
// =============================================================================

/// Materialised result of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum ExecuteResponse {
    Elements {
        elements: Vec<Element>,
    },
    Count {
        count: u64,
    },
    #[serde(rename_all = "camelCase")]
    GraphIds {
        graph_ids: Vec<String>,
    },
    Done,
}

impl From<OperationResult> for ExecuteResponse {
    /// Element results are drained and closed.
    fn from(result: OperationResult) -> Self {
        match result {
            OperationResult::Elements(mut iter) => {
                let elements: Vec<Element> = iter.by_ref().collect();
                iter.close();
                ExecuteResponse::Elements { elements }
            }
            OperationResult::Count(count) => ExecuteResponse::Count { count },
            OperationResult::GraphIds(ids) => ExecuteResponse::GraphIds {
                graph_ids: ids.into_iter().collect(),
            },
            OperationResult::Done => ExecuteResponse::Done,
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every non-2xx response produced by a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// HTTP status for a federation error.
#[must_use]
pub fn status_for(error: &FederationError) -> StatusCode {
    match error {
        FederationError::Configuration(_)
        | FederationError::InvalidElement(_)
        | FederationError::Serialization(_) => StatusCode::BAD_REQUEST,
        FederationError::Conflict(_) | FederationError::SchemaMerge(_) => StatusCode::CONFLICT,
        FederationError::UnsupportedOperation(_) => StatusCode::NOT_IMPLEMENTED,
        FederationError::Dispatch { .. }
        | FederationError::Library(_)
        | FederationError::Cache(_)
        | FederationError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
