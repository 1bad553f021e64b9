//! # Federated Store
//!
//! One logical graph over a live registry of constituent graphs.
//!
//! ```text
//! FederationConfig ──► resolver ──► Graph ──► GraphRegistry (ArcSwap snapshot)
//!                                                  │
//!                      execute(op) ──► Dispatcher ◄┘ (rayon fan-out, merge)
//! ```
//!
//! The store itself serves the registry operations (`GetAllGraphIds`,
//! `AddGraph`, `RemoveGraph`); everything else goes to the dispatcher.

use crate::config::{FederationConfig, GraphConfigEntry};
use crate::dispatch::Dispatcher;
use crate::graph::Graph;
use crate::jobs::{JobDetail, JobStatus, JobTracker};
use crate::library::{GraphLibrary, NoGraphLibrary};
use crate::operation::{Operation, OperationResult, OperationShape};
use crate::properties::StoreProperties;
use crate::registry::GraphRegistry;
use crate::resolver::resolve;
use crate::schema::Schema;
use crate::store::StoreFactory;
use crate::traits::StoreTrait;
use crate::{Context, FederationError, User};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// The federated graph store.
pub struct FederatedStore {
    store_id: String,
    config: FederationConfig,
    library: Arc<dyn GraphLibrary>,
    factory: StoreFactory,
    registry: GraphRegistry,
    dispatcher: Dispatcher,
    jobs: Option<JobTracker>,
    next_job: AtomicU64,
}

impl std::fmt::Debug for FederatedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedStore")
            .field("store_id", &self.store_id)
            .field("library", &self.library.name())
            .field("graphs", &self.registry.graph_ids())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl FederatedStore {
    /// An empty federation using `config` for dispatch settings and for any
    /// graph later added by id.
    pub fn new(
        store_id: impl Into<String>,
        config: FederationConfig,
        library: Arc<dyn GraphLibrary>,
        factory: StoreFactory,
    ) -> Result<Self, FederationError> {
        let dispatcher = Dispatcher::new(config.parallelism(), config.write_policy)?;
        Ok(Self {
            store_id: store_id.into(),
            config,
            library,
            factory,
            registry: GraphRegistry::new(),
            dispatcher,
            jobs: None,
            next_job: AtomicU64::new(1),
        })
    }

    /// Build a federation and register every graph named in `properties`.
    ///
    /// The configured graphs are added as one batch: if any fails to resolve
    /// or conflicts, no graph is registered.
    pub fn initialise(
        store_id: impl Into<String>,
        properties: &StoreProperties,
        library: Option<Arc<dyn GraphLibrary>>,
    ) -> Result<Self, FederationError> {
        let config = FederationConfig::from_properties(properties, None)?;
        Self::from_config(store_id, config, library, StoreFactory::default())
    }

    /// Build a federation from a parsed configuration and register its graphs.
    pub fn from_config(
        store_id: impl Into<String>,
        config: FederationConfig,
        library: Option<Arc<dyn GraphLibrary>>,
        factory: StoreFactory,
    ) -> Result<Self, FederationError> {
        let library = library.unwrap_or_else(|| Arc::new(NoGraphLibrary));
        let graph_ids = config.graph_ids.clone();
        let store = Self::new(store_id, config, library, factory)?;
        store.add_graph_ids(&graph_ids)?;
        tracing::info!(
            store_id = %store.store_id,
            graphs = store.registry.len(),
            "federated store initialised"
        );
        Ok(store)
    }

    /// Record jobs for every `execute` call.
    #[must_use]
    pub fn with_job_tracker(mut self, tracker: JobTracker) -> Self {
        self.jobs = Some(tracker);
        self
    }

    #[must_use]
    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    #[must_use]
    pub fn library(&self) -> &dyn GraphLibrary {
        self.library.as_ref()
    }

    #[must_use]
    pub fn factory(&self) -> &StoreFactory {
        &self.factory
    }

    #[must_use]
    pub fn registry(&self) -> &GraphRegistry {
        &self.registry
    }

    #[must_use]
    pub fn job_tracker(&self) -> Option<&JobTracker> {
        self.jobs.as_ref()
    }

    // -------------------------------------------------------------------------
    // Registry
    // -------------------------------------------------------------------------

    /// Register already built graphs, all or nothing.
    pub fn add_graphs(&self, graphs: Vec<Graph>) -> Result<(), FederationError> {
        self.registry.add_graphs(graphs, self.library.as_ref())
    }

    /// Resolve and register one graph from an explicit entry.
    pub fn add_graph(&self, graph_id: &str, entry: &GraphConfigEntry) -> Result<(), FederationError> {
        self.reject_known_ids(&[graph_id])?;
        let graph = resolve(graph_id, entry, self.library.as_ref(), &self.factory)?;
        self.add_graphs(vec![graph])
    }

    /// Resolve and register graphs by id, using the configured entries (or
    /// the library alone for ids with no entry). All or nothing.
    pub fn add_graph_ids<S: AsRef<str>>(&self, graph_ids: &[S]) -> Result<(), FederationError> {
        self.reject_known_ids(graph_ids)?;
        let graphs = graph_ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                resolve(id, &self.config.entry(id), self.library.as_ref(), &self.factory)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.add_graphs(graphs)
    }

    /// Fail fast on ids that are registered or repeated, before any backend
    /// is opened. `GraphRegistry::add_graphs` repeats the check under its
    /// writer lock.
    fn reject_known_ids<S: AsRef<str>>(&self, graph_ids: &[S]) -> Result<(), FederationError> {
        let snapshot = self.registry.snapshot();
        let mut batch = BTreeSet::new();
        for id in graph_ids {
            let id = id.as_ref();
            if snapshot.contains(id) || !batch.insert(id) {
                return Err(FederationError::overwrite(id));
            }
        }
        Ok(())
    }

    /// Remove a graph; false if it was not registered.
    pub fn remove(&self, graph_id: &str) -> bool {
        self.registry.remove(graph_id)
    }

    #[must_use]
    pub fn graphs(&self) -> Vec<Arc<Graph>> {
        self.registry.graphs()
    }

    #[must_use]
    pub fn graph_ids(&self) -> BTreeSet<String> {
        self.registry.graph_ids()
    }

    /// The merged schema of every constituent.
    pub fn schema(&self) -> Result<Arc<Schema>, FederationError> {
        self.registry.schema()
    }

    /// Traits every constituent supports.
    #[must_use]
    pub fn traits(&self) -> BTreeSet<StoreTrait> {
        self.registry.traits()
    }

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------

    /// Execute an operation on behalf of `user`.
    pub fn execute(
        &self,
        operation: &Operation,
        user: &User,
    ) -> Result<OperationResult, FederationError> {
        let job_id = format!(
            "{}-{}",
            self.store_id,
            self.next_job.fetch_add(1, Ordering::Relaxed)
        );
        let ctx = Context::new(user.clone(), job_id);
        let job = self.start_job(operation, &ctx)?;

        let result = match operation.shape() {
            OperationShape::Registry => self.execute_builtin(operation, &ctx),
            OperationShape::Output(_) | OperationShape::Mutation => {
                let snapshot = self.registry.snapshot();
                self.dispatcher.dispatch(&snapshot, operation, &ctx)
            }
        };

        if let Some(job) = job {
            let ended = match &result {
                Ok(_) => job.ended(JobStatus::Finished, None),
                Err(e) => job.ended(JobStatus::Failed, Some(e.to_string())),
            };
            // The operation has already taken effect; its outcome wins.
            if let Err(e) = self.record_job(&ended, user) {
                tracing::warn!(job_id = %ctx.job_id, error = %e, "failed to record job end");
            }
        }
        result
    }

    /// Fallback for operations nothing in the federation handles.
    pub fn do_unhandled_operation(
        &self,
        operation: &Operation,
        _ctx: &Context,
    ) -> Result<OperationResult, FederationError> {
        Err(FederationError::UnsupportedOperation(
            operation.name().to_string(),
        ))
    }

    fn execute_builtin(
        &self,
        operation: &Operation,
        ctx: &Context,
    ) -> Result<OperationResult, FederationError> {
        match operation {
            Operation::GetAllGraphIds => Ok(OperationResult::GraphIds(self.graph_ids())),
            Operation::AddGraph {
                graph_id,
                schema,
                properties,
            } => {
                let entry = GraphConfigEntry::inline(schema.clone(), properties.clone());
                self.add_graph(graph_id, &entry)?;
                Ok(OperationResult::Done)
            }
            Operation::RemoveGraph { graph_id } => {
                self.remove(graph_id);
                Ok(OperationResult::Done)
            }
            other => self.do_unhandled_operation(other, ctx),
        }
    }

    fn start_job(
        &self,
        operation: &Operation,
        ctx: &Context,
    ) -> Result<Option<JobDetail>, FederationError> {
        if self.jobs.is_none() {
            return Ok(None);
        }
        let job = JobDetail::running(ctx.job_id.clone(), &ctx.user, operation.name());
        self.record_job(&job, &ctx.user)?;
        Ok(Some(job))
    }

    fn record_job(&self, job: &JobDetail, user: &User) -> Result<(), FederationError> {
        match &self.jobs {
            Some(tracker) => tracker.add_or_update_job(job, user),
            None => Ok(()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::jobs::CacheService;
    use crate::schema::{SchemaEntityDefinition, TypeDefinition};
    use crate::store::{MapStore, Store};

    fn schema() -> Schema {
        Schema::new()
            .entity(
                "BasicEntity",
                SchemaEntityDefinition {
                    vertex: "vertex.string".into(),
                    properties: Default::default(),
                    description: None,
                },
            )
            .type_def("vertex.string", TypeDefinition::new("string"))
    }

    fn store() -> FederatedStore {
        FederatedStore::from_config(
            "federated",
            FederationConfig::new(),
            None,
            StoreFactory::default(),
        )
        .expect("store")
    }

    #[test]
    fn builtins_manage_the_registry() {
        let store = store();
        let user = User::default();
        store
            .execute(
                &Operation::AddGraph {
                    graph_id: "g1".into(),
                    schema: schema(),
                    properties: StoreProperties::for_kind("map"),
                },
                &user,
            )
            .expect("add graph");

        let ids = store
            .execute(&Operation::GetAllGraphIds, &user)
            .and_then(OperationResult::into_graph_ids)
            .expect("ids");
        assert_eq!(ids, ["g1".to_string()].into());

        store
            .execute(&Operation::RemoveGraph { graph_id: "g1".into() }, &user)
            .expect("remove");
        assert!(store.graph_ids().is_empty());
    }

    #[test]
    fn unknown_operation_is_unsupported() {
        let err = store()
            .execute(
                &Operation::Other {
                    name: "GetWalks".into(),
                    options: Default::default(),
                },
                &User::default(),
            )
            .expect_err("unsupported");
        assert!(matches!(err, FederationError::UnsupportedOperation(_)));
    }

    /// Map backend that stops the cache service while a write runs.
    #[derive(Debug)]
    struct CacheStoppingStore {
        inner: MapStore,
        service: Arc<CacheService>,
    }

    impl Store for CacheStoppingStore {
        fn initialise(
            &mut self,
            graph_id: &str,
            schema: Schema,
            properties: StoreProperties,
            library: Option<&dyn GraphLibrary>,
        ) -> Result<(), FederationError> {
            self.inner.initialise(graph_id, schema, properties, library)
        }

        fn execute(
            &self,
            operation: &Operation,
            ctx: &Context,
        ) -> Result<OperationResult, FederationError> {
            self.service.shutdown();
            self.inner.execute(operation, ctx)
        }

        fn schema(&self) -> &Schema {
            self.inner.schema()
        }

        fn traits(&self) -> &BTreeSet<StoreTrait> {
            self.inner.traits()
        }
    }

    #[test]
    fn failed_job_record_keeps_the_operation_result() {
        let service = CacheService::initialise();
        let tracker = JobTracker::new(&service).expect("tracker");
        let stopping = Arc::clone(&service);
        let factory = StoreFactory::default().with_kind("stopping", move || {
            Box::new(CacheStoppingStore {
                inner: MapStore::new(),
                service: Arc::clone(&stopping),
            })
        });
        let store = FederatedStore::from_config("federated", FederationConfig::new(), None, factory)
            .expect("store")
            .with_job_tracker(tracker);
        store
            .add_graph(
                "g1",
                &GraphConfigEntry::inline(schema(), StoreProperties::for_kind("stopping")),
            )
            .expect("add");

        let written = store.execute(
            &Operation::add_elements(vec![Element::entity("BasicEntity", "v")]),
            &User::default(),
        );
        assert!(matches!(written, Ok(OperationResult::Done)));
        assert!(!service.is_running());
    }

    #[test]
    fn jobs_are_recorded_when_tracked() {
        let service = CacheService::initialise();
        let tracker = JobTracker::new(&service).expect("tracker");
        let store = store().with_job_tracker(tracker.clone());
        let user = User::new("alice");

        store
            .add_graph(
                "g1",
                &GraphConfigEntry::inline(schema(), StoreProperties::for_kind("map")),
            )
            .expect("add");
        store
            .execute(
                &Operation::add_elements(vec![Element::entity("BasicEntity", "v")]),
                &user,
            )
            .expect("write");
        let _ = store.execute(
            &Operation::Other {
                name: "Nope".into(),
                options: Default::default(),
            },
            &user,
        );

        let jobs = tracker.all_jobs(&user).expect("jobs");
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.user_id == "alice"));
        assert!(jobs.iter().any(|j| j.status == JobStatus::Finished));
        assert!(jobs.iter().any(|j| j.status == JobStatus::Failed));
    }
}
