//! # Core Type Definitions
//!
//! This module contains the small shared types of the federation:
//! - Error types (`FederationError`, `CreationKind`)
//! - Caller identity (`User`) and execution context (`Context`)
//! - Graph identifier validation
//!
//! Larger domain types live in their own modules (`schema`, `element`,
//! `properties`, `traits`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// GRAPH IDENTIFIERS
// =============================================================================

/// Validate a constituent graph identifier.
///
/// Identifiers are non-empty and restricted to `[A-Za-z0-9_]`, which keeps
/// them safe to embed in configuration keys and library file names.
pub fn validate_graph_id(graph_id: &str) -> Result<(), FederationError> {
    if graph_id.is_empty() {
        return Err(FederationError::Configuration(
            "graphId is required".to_string(),
        ));
    }
    if !graph_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(FederationError::Configuration(format!(
            "graphId is invalid: {}, it must match regex: [a-zA-Z0-9_]*",
            graph_id
        )));
    }
    Ok(())
}

// =============================================================================
// USER & CONTEXT
// =============================================================================

/// The identity an operation is executed on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub data_auths: BTreeSet<String>,
}

impl User {
    /// Id used when no caller identity is supplied.
    pub const UNKNOWN_USER_ID: &'static str = "UNKNOWN";

    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            data_auths: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_data_auths<I, S>(mut self, auths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_auths.extend(auths.into_iter().map(Into::into));
        self
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new(Self::UNKNOWN_USER_ID)
    }
}

/// Per-execution context handed to backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub user: User,
    pub job_id: String,
}

impl Context {
    #[must_use]
    pub fn new(user: User, job_id: impl Into<String>) -> Self {
        Self {
            user,
            job_id: job_id.into(),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Which part of a constituent graph failed to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationKind {
    Schema,
    Property,
    Graph,
}

impl CreationKind {
    /// Label used in front of the failing path, e.g. `schemaPath`.
    #[must_use]
    pub fn path_label(self) -> &'static str {
        match self {
            CreationKind::Schema => "schemaPath",
            CreationKind::Property => "propertyPath",
            CreationKind::Graph => "graphPath",
        }
    }
}

impl fmt::Display for CreationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CreationKind::Schema => "Schema",
            CreationKind::Property => "Property",
            CreationKind::Graph => "Graph",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in the federation.
///
/// - No silent failures
/// - Nothing is retried inside the core; every error reaches the caller
/// - Configuration and conflict messages are part of the public contract and
///   are rendered verbatim
#[derive(Debug, Error)]
pub enum FederationError {
    /// A schema or properties source was missing, unreadable or invalid.
    #[error("{0}")]
    Configuration(String),

    /// A graph id collided with the registry or with the library.
    #[error("{0}")]
    Conflict(String),

    /// Nothing in the federation can service the requested operation.
    #[error("Operation is not supported: {0}")]
    UnsupportedOperation(String),

    /// Two schema definitions for the same group or type are incompatible.
    #[error("Unable to merge the schemas: {0}")]
    SchemaMerge(String),

    /// A constituent graph failed while executing part of a federated call.
    #[error("Failed to execute {operation} on graph {graph_id}: {source}")]
    Dispatch {
        graph_id: String,
        operation: String,
        #[source]
        source: Box<FederationError>,
    },

    /// The named-configuration library failed.
    #[error("Graph library error: {0}")]
    Library(String),

    /// The cache service is shut down or a cache entry could not be stored.
    #[error("Cache error: {0}")]
    Cache(String),

    /// An element does not conform to the schema it is written against.
    #[error("Invalid element: {0}")]
    InvalidElement(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FederationError {
    /// `<Kind> was not able to be created with the supplied properties <detail>`
    #[must_use]
    pub fn creation_failed(kind: CreationKind, detail: impl fmt::Display) -> Self {
        FederationError::Configuration(format!(
            "{} was not able to be created with the supplied properties {}",
            kind, detail
        ))
    }

    /// Creation failure naming the graph and the failing path or identifier.
    #[must_use]
    pub fn creation_failed_at(kind: CreationKind, graph_id: &str, path: &str) -> Self {
        Self::creation_failed(
            kind,
            format_args!("graphId: {} {}: {}", graph_id, kind.path_label(), path),
        )
    }

    #[must_use]
    pub fn overwrite(graph_id: &str) -> Self {
        FederationError::Conflict(format!(
            "User is attempting to overwrite a graph within federated store, graphId: {}",
            graph_id
        ))
    }

    #[must_use]
    pub fn library_override() -> Self {
        FederationError::Conflict("User is attempting to override a known graph in library.".to_string())
    }

    /// Wrap a constituent failure with the federation-level context.
    #[must_use]
    pub fn dispatch(graph_id: &str, operation: &str, source: FederationError) -> Self {
        FederationError::Dispatch {
            graph_id: graph_id.to_string(),
            operation: operation.to_string(),
            source: Box::new(source),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_id_validation() {
        assert!(validate_graph_id("mockMapGraphId1").is_ok());
        assert!(validate_graph_id("graph_2").is_ok());
        assert!(validate_graph_id("").is_err());
        assert!(validate_graph_id("bad-id").is_err());
        assert!(validate_graph_id("inv@lid").is_err());
    }

    #[test]
    fn creation_message_templates() {
        let err = FederationError::creation_failed_at(CreationKind::Schema, "g1", "nothing.json");
        assert_eq!(
            err.to_string(),
            "Schema was not able to be created with the supplied properties graphId: g1 schemaPath: nothing.json"
        );

        let err = FederationError::creation_failed_at(CreationKind::Property, "g1", "p.toml");
        assert_eq!(
            err.to_string(),
            "Property was not able to be created with the supplied properties graphId: g1 propertyPath: p.toml"
        );
    }

    #[test]
    fn conflict_message_templates() {
        assert_eq!(
            FederationError::overwrite("g1").to_string(),
            "User is attempting to overwrite a graph within federated store, graphId: g1"
        );
        assert_eq!(
            FederationError::library_override().to_string(),
            "User is attempting to override a known graph in library."
        );
    }

    #[test]
    fn dispatch_error_keeps_source() {
        let err = FederationError::dispatch(
            "g1",
            "GetAllElements",
            FederationError::Io("disk gone".to_string()),
        );
        assert!(matches!(err, FederationError::Dispatch { ref graph_id, .. } if graph_id == "g1"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn default_user_is_unknown() {
        let user = User::default();
        assert_eq!(user.user_id, User::UNKNOWN_USER_ID);
        let user = User::new("u").with_data_auths(["public"]);
        assert!(user.data_auths.contains("public"));
    }
}
