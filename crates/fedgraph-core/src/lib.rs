//! # fedgraph-core
//!
//! The federation engine for fedgraph - THE LOGIC.
//!
//! A federated store is one logical graph backed by a live set of
//! independently configured backend graphs. This crate:
//! - resolves each constituent's schema and properties from inline values,
//!   files and a shared named-configuration library
//! - keeps the constituents in a copy-on-write registry
//! - merges their schemas and reconciles their traits into one view
//! - dispatches operations across them and merges the results
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - The registry is the only shared mutable state
//! - Backends are reached only through the [`Store`] trait, built by kind tag
//! - Every failure surfaces to the caller; nothing is retried here

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod dispatch;
pub mod element;
pub mod federated;
pub mod graph;
pub mod iterable;
pub mod jobs;
pub mod library;
pub mod merge;
pub mod operation;
pub mod primitives;
pub mod properties;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod traits;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Context, CreationKind, FederationError, User, validate_graph_id};

// =============================================================================
// RE-EXPORTS: Data Model
// =============================================================================

pub use element::{Edge, Element, ElementKey, Entity, Properties, PropertyValue, View};
pub use properties::StoreProperties;
pub use schema::{Schema, SchemaEdgeDefinition, SchemaEntityDefinition, TypeDefinition};
pub use traits::StoreTrait;

// =============================================================================
// RE-EXPORTS: Federation
// =============================================================================

pub use config::{FederationConfig, GraphConfigEntry, WriteTargetPolicy};
pub use dispatch::Dispatcher;
pub use federated::FederatedStore;
pub use graph::{Graph, GraphBuilder, GraphConfig};
pub use iterable::{CloseableIterator, ElementIterator, UnionIterator, VecIterator};
pub use jobs::{CacheHandle, CacheService, JobDetail, JobStatus, JobTracker};
pub use library::{FileGraphLibrary, GraphLibrary, HashMapGraphLibrary, NoGraphLibrary};
pub use operation::{Operation, OperationOptions, OperationResult, OperationShape, OutputKind};
pub use registry::{GraphRegistry, RegistrySnapshot};
pub use store::{MapStore, RedbStore, Store, StoreFactory};
