//! # Constituent Graphs
//!
//! A [`Graph`] is one backend store registered in the federation, together
//! with the id, schema and properties it was built from. Graphs are built by a
//! [`GraphBuilder`] and never change once built; the registry shares them
//! behind `Arc`.

use crate::library::GraphLibrary;
use crate::operation::{Operation, OperationResult};
use crate::properties::StoreProperties;
use crate::schema::Schema;
use crate::store::{Store, StoreFactory};
use crate::traits::StoreTrait;
use crate::types::{CreationKind, validate_graph_id};
use crate::{Context, FederationError};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// GRAPH CONFIG
// =============================================================================

/// Validated identity of a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    graph_id: String,
}

impl GraphConfig {
    /// Fails immediately if the id is empty or has characters outside `[A-Za-z0-9_]`.
    pub fn new(graph_id: impl Into<String>) -> Result<Self, FederationError> {
        let graph_id = graph_id.into();
        validate_graph_id(&graph_id)?;
        Ok(Self { graph_id })
    }

    #[must_use]
    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// A built constituent graph.
pub struct Graph {
    config: GraphConfig,
    properties: StoreProperties,
    store: Box<dyn Store>,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("graph_id", &self.config.graph_id)
            .field("kind", &self.properties.kind())
            .field("store", &self.store)
            .finish()
    }
}

impl Graph {
    #[must_use]
    pub fn builder<'a>() -> GraphBuilder<'a> {
        GraphBuilder::default()
    }

    #[must_use]
    pub fn graph_id(&self) -> &str {
        &self.config.graph_id
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        self.store.schema()
    }

    #[must_use]
    pub fn properties(&self) -> &StoreProperties {
        &self.properties
    }

    #[must_use]
    pub fn traits(&self) -> &BTreeSet<StoreTrait> {
        self.store.traits()
    }

    pub fn execute(
        &self,
        operation: &Operation,
        ctx: &Context,
    ) -> Result<OperationResult, FederationError> {
        self.store.execute(operation, ctx)
    }

    /// True if this graph was built from exactly this schema and these properties.
    #[must_use]
    pub fn has_content(&self, schema: &Schema, properties: &StoreProperties) -> bool {
        self.schema() == schema && &self.properties == properties
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Collects the parts of a graph and builds it through a [`StoreFactory`].
///
/// Any failure is reported as a Graph creation error carrying the builder's
/// `Debug` rendering, so the message says which parts were present.
#[derive(Default)]
pub struct GraphBuilder<'a> {
    graph_id: Option<String>,
    library: Option<&'a dyn GraphLibrary>,
    schema: Option<Schema>,
    properties: Option<StoreProperties>,
}

impl fmt::Debug for GraphBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("graph_id", &self.graph_id)
            .field(
                "library",
                &self.library.map_or("NoGraphLibrary", |l| l.name()),
            )
            .field(
                "schema",
                &self.schema.as_ref().map(|s| {
                    s.entity_groups()
                        .into_iter()
                        .chain(s.edge_groups())
                        .collect::<Vec<_>>()
                }),
            )
            .field("properties", &self.properties)
            .finish()
    }
}

impl<'a> GraphBuilder<'a> {
    #[must_use]
    pub fn graph_id(mut self, graph_id: impl Into<String>) -> Self {
        self.graph_id = Some(graph_id.into());
        self
    }

    #[must_use]
    pub fn library(mut self, library: &'a dyn GraphLibrary) -> Self {
        self.library = Some(library);
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn properties(mut self, properties: StoreProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Validate the parts and initialise the backend.
    pub fn build(self, factory: &StoreFactory) -> Result<Graph, FederationError> {
        let dump = format!("{:?}", self);
        let fail = |cause: FederationError| {
            tracing::warn!(%cause, builder = %dump, "graph construction failed");
            FederationError::creation_failed(CreationKind::Graph, &dump)
        };

        let (Some(graph_id), Some(schema), Some(properties)) =
            (self.graph_id, self.schema, self.properties)
        else {
            return Err(fail(FederationError::Configuration(
                "graph id, schema and properties are all required".to_string(),
            )));
        };
        let config = GraphConfig::new(graph_id).map_err(&fail)?;
        schema.validate().map_err(&fail)?;

        let store = factory
            .create(config.graph_id(), schema, properties.clone(), self.library)
            .map_err(&fail)?;

        Ok(Graph {
            config,
            properties,
            store,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
