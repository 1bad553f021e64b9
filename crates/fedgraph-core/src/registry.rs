//! # Graph Registry
//!
//! The live set of constituent graphs, keyed by graph id.
//!
//! The registry is copy-on-write:
//! - readers `load` the current [`RegistrySnapshot`] without locking and keep
//!   a complete, consistent view for as long as they hold it
//! - writers serialise on a writer mutex, build a new graph map from the
//!   current snapshot and swap it in with one atomic store
//!
//! The merged schema and merged traits are cached inside the snapshot, so the
//! swap that installs a new graph set also drops the stale views.

use crate::graph::Graph;
use crate::library::GraphLibrary;
use crate::merge::merge_schemas;
use crate::schema::Schema;
use crate::traits::{StoreTrait, reconcile};
use crate::FederationError;
use arc_swap::ArcSwap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, OnceLock};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// An immutable version of the registry.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    graphs: BTreeMap<String, Arc<Graph>>,
    /// Merge failures are cached as their message.
    merged_schema: OnceLock<Result<Arc<Schema>, String>>,
    merged_traits: OnceLock<BTreeSet<StoreTrait>>,
}

impl RegistrySnapshot {
    fn with_graphs(graphs: BTreeMap<String, Arc<Graph>>) -> Self {
        Self {
            graphs,
            merged_schema: OnceLock::new(),
            merged_traits: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    #[must_use]
    pub fn get(&self, graph_id: &str) -> Option<&Arc<Graph>> {
        self.graphs.get(graph_id)
    }

    #[must_use]
    pub fn contains(&self, graph_id: &str) -> bool {
        self.graphs.contains_key(graph_id)
    }

    /// Graphs in id order.
    pub fn graphs(&self) -> impl Iterator<Item = &Arc<Graph>> {
        self.graphs.values()
    }

    #[must_use]
    pub fn graph_ids(&self) -> BTreeSet<String> {
        self.graphs.keys().cloned().collect()
    }

    /// Union of every constituent schema, computed on first use.
    pub fn schema(&self) -> Result<Arc<Schema>, FederationError> {
        self.merged_schema
            .get_or_init(|| {
                merge_schemas(self.graphs.values().map(|g| g.schema()))
                    .map(Arc::new)
                    .map_err(|e| match e {
                        FederationError::SchemaMerge(detail) => detail,
                        other => other.to_string(),
                    })
            })
            .clone()
            .map_err(FederationError::SchemaMerge)
    }

    /// Intersection of every constituent trait set, computed on first use.
    #[must_use]
    pub fn traits(&self) -> &BTreeSet<StoreTrait> {
        self.merged_traits
            .get_or_init(|| reconcile(self.graphs.values().map(|g| g.traits())))
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Copy-on-write registry of constituent graphs.
#[derive(Debug, Default)]
pub struct GraphRegistry {
    current: ArcSwap<RegistrySnapshot>,
    writer: Mutex<()>,
}

impl GraphRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot. Later writes do not affect it.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    /// Install a batch of graphs, all or nothing.
    ///
    /// Fails with a conflict if any id is already registered, is repeated in
    /// the batch, or is known to `library` with a different schema or
    /// properties. On failure the registry is unchanged.
    pub fn add_graphs(
        &self,
        graphs: Vec<Graph>,
        library: &dyn GraphLibrary,
    ) -> Result<(), FederationError> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.current.load();

        let mut next = current.graphs.clone();
        for graph in graphs {
            let graph_id = graph.graph_id().to_string();
            if next.contains_key(&graph_id) {
                return Err(FederationError::overwrite(&graph_id));
            }
            if let Some((schema, properties)) = library
                .get(&graph_id)
                .map_err(|e| FederationError::Library(format!("graphId: {} {}", graph_id, e)))?
                && !graph.has_content(&schema, &properties)
            {
                return Err(FederationError::library_override());
            }
            next.insert(graph_id, Arc::new(graph));
        }

        let added = next.len() - current.len();
        self.current
            .store(Arc::new(RegistrySnapshot::with_graphs(next)));
        tracing::info!(added, total = current.len() + added, "graphs added to federation");
        Ok(())
    }

    /// Remove a graph. Returns false, and changes nothing, if the id is unknown.
    pub fn remove(&self, graph_id: &str) -> bool {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.current.load();
        if !current.contains(graph_id) {
            return false;
        }

        let mut next = current.graphs.clone();
        next.remove(graph_id);
        self.current
            .store(Arc::new(RegistrySnapshot::with_graphs(next)));
        tracing::info!(graph_id, "graph removed from federation");
        true
    }

    /// Point-in-time list of graphs.
    #[must_use]
    pub fn graphs(&self) -> Vec<Arc<Graph>> {
        self.current.load().graphs().cloned().collect()
    }

    #[must_use]
    pub fn graph_ids(&self) -> BTreeSet<String> {
        self.current.load().graph_ids()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    pub fn schema(&self) -> Result<Arc<Schema>, FederationError> {
        self.snapshot().schema()
    }

    #[must_use]
    pub fn traits(&self) -> BTreeSet<StoreTrait> {
        self.snapshot().traits().clone()
    }
}

// =============================================================================
// TESTS
// =============================================================================
