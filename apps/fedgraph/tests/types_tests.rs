//! Unit tests for API types serialization/deserialization.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use fedgraph::api::{
    AddGraphRequest, ErrorResponse, ExecuteResponse, GraphsResponse, HealthResponse,
    RemoveGraphResponse, TraitsResponse, status_for,
};
use fedgraph_core::{
    Element, FederationError, OperationResult, StoreTrait, UnionIterator, VecIterator,
};
use serde_json::json;
use std::collections::BTreeSet;

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_deserialization() {
    let json = r#"{"status":"healthy","version":"1.0.0"}"#;
    let health: HealthResponse = serde_json::from_str(json).unwrap();

    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, "1.0.0");
}

// =============================================================================
// REGISTRY TYPES TESTS
// =============================================================================

#[test]
fn test_graphs_response_is_camel_case_and_ordered() {
    let ids: BTreeSet<String> = ["b".to_string(), "a".to_string()].into();
    let json = serde_json::to_value(GraphsResponse::from(ids)).unwrap();
    assert_eq!(json, json!({ "graphIds": ["a", "b"] }));
}

#[test]
fn test_add_graph_request_deserialization() {
    let request: AddGraphRequest = serde_json::from_value(json!({
        "graphId": "g1",
        "schema": {
            "entities": { "E": { "vertex": "vertex.string" } },
            "types": { "vertex.string": { "class": "string" } }
        },
        "properties": { "fedgraph.store.kind": "map" }
    }))
    .unwrap();

    assert_eq!(request.graph_id, "g1");
    assert!(request.schema.entities.contains_key("E"));
    assert_eq!(request.properties.kind(), Some("map"));
}

#[test]
fn test_add_graph_request_requires_graph_id() {
    let result: Result<AddGraphRequest, _> = serde_json::from_value(json!({
        "schema": {},
        "properties": {}
    }));
    assert!(result.is_err());
}

#[test]
fn test_remove_graph_response_serialization() {
    let json = serde_json::to_value(RemoveGraphResponse {
        graph_id: "g1".to_string(),
        removed: true,
    })
    .unwrap();
    assert_eq!(json, json!({ "graphId": "g1", "removed": true }));
}

#[test]
fn test_traits_response_uses_trait_names() {
    let traits: BTreeSet<StoreTrait> = [StoreTrait::Ordered, StoreTrait::StoreAggregation].into();
    let json = serde_json::to_value(TraitsResponse::from(traits)).unwrap();
    let names = json["traits"].as_array().unwrap();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&json!("ORDERED")));
    assert!(names.contains(&json!("STORE_AGGREGATION")));
}

// =============================================================================
// EXECUTE RESPONSE TESTS
// =============================================================================

#[test]
fn test_execute_response_shapes() {
    assert_eq!(
        serde_json::to_value(ExecuteResponse::Count { count: 3 }).unwrap(),
        json!({ "result": "count", "count": 3 })
    );
    assert_eq!(
        serde_json::to_value(ExecuteResponse::GraphIds {
            graph_ids: vec!["a".to_string()]
        })
        .unwrap(),
        json!({ "result": "graphIds", "graphIds": ["a"] })
    );
    assert_eq!(
        serde_json::to_value(ExecuteResponse::Done).unwrap(),
        json!({ "result": "done" })
    );
}

#[test]
fn test_execute_response_drains_element_results() {
    let parts: Vec<Box<dyn fedgraph_core::CloseableIterator<Item = Element>>> = vec![
        Box::new(VecIterator::new(vec![Element::entity("E", "a")])),
        Box::new(VecIterator::<Element>::new(vec![])),
        Box::new(VecIterator::new(vec![Element::entity("E", "b")])),
    ];
    let result = OperationResult::Elements(Box::new(UnionIterator::new(parts)));

    assert_eq!(
        ExecuteResponse::from(result),
        ExecuteResponse::Elements {
            elements: vec![Element::entity("E", "a"), Element::entity("E", "b")]
        }
    );
}

#[test]
fn test_execute_response_from_scalars() {
    assert_eq!(
        ExecuteResponse::from(OperationResult::Count(7)),
        ExecuteResponse::Count { count: 7 }
    );
    assert_eq!(
        ExecuteResponse::from(OperationResult::Done),
        ExecuteResponse::Done
    );
}

// =============================================================================
// ERROR MAPPING TESTS
// =============================================================================

#[test]
fn test_error_status_mapping() {
    assert_eq!(
        status_for(&FederationError::Configuration("x".into())),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        status_for(&FederationError::overwrite("g1")),
        StatusCode::CONFLICT
    );
    assert_eq!(
        status_for(&FederationError::SchemaMerge("x".into())),
        StatusCode::CONFLICT
    );
    assert_eq!(
        status_for(&FederationError::UnsupportedOperation("GetWalks".into())),
        StatusCode::NOT_IMPLEMENTED
    );
    assert_eq!(
        status_for(&FederationError::dispatch(
            "g1",
            "GetAllElements",
            FederationError::Io("gone".into())
        )),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_error_response_round_trip() {
    let json = serde_json::to_string(&ErrorResponse::new("boom")).unwrap();
    assert_eq!(json, r#"{"error":"boom"}"#);
}
