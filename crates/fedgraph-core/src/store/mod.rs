//! # Backend Stores
//!
//! The contract every constituent backend implements, and the factory that
//! builds backends from their properties.
//!
//! Backends are picked by the `fedgraph.store.kind` property. The factory maps
//! each kind tag to a constructor; there is no runtime type inspection.
//!
//! Two reference backends ship with the crate:
//! - `map`: [`MapStore`], in memory
//! - `redb`: [`RedbStore`], on disk

mod map_store;
mod redb_store;

pub use map_store::MapStore;
pub use redb_store::RedbStore;

use crate::element::{Element, View};
use crate::library::GraphLibrary;
use crate::operation::{Operation, OperationResult};
use crate::properties::StoreProperties;
use crate::schema::Schema;
use crate::traits::StoreTrait;
use crate::{Context, FederationError};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// STORE CONTRACT
// =============================================================================

/// A backend graph store.
///
/// `initialise` is called exactly once, before the store is shared. After
/// that the store is only reached through `&self`; any interior state is the
/// backend's own concern.
pub trait Store: Send + Sync + fmt::Debug {
    /// Configure the store. Invalid setup is a `Configuration` error.
    fn initialise(
        &mut self,
        graph_id: &str,
        schema: Schema,
        properties: StoreProperties,
        library: Option<&dyn GraphLibrary>,
    ) -> Result<(), FederationError>;

    /// Run an operation.
    fn execute(&self, operation: &Operation, ctx: &Context)
    -> Result<OperationResult, FederationError>;

    fn schema(&self) -> &Schema;

    fn traits(&self) -> &BTreeSet<StoreTrait>;

    /// Fallback for operations the store has no handler for.
    fn do_unhandled_operation(
        &self,
        operation: &Operation,
        _ctx: &Context,
    ) -> Result<OperationResult, FederationError> {
        Err(FederationError::UnsupportedOperation(
            operation.name().to_string(),
        ))
    }
}

/// Traits declared by the in-memory backend.
pub const MAP_STORE_TRAITS: [StoreTrait; 5] = [
    StoreTrait::StoreAggregation,
    StoreTrait::PreAggregationFiltering,
    StoreTrait::PostAggregationFiltering,
    StoreTrait::PostTransformationFiltering,
    StoreTrait::Transformation,
];

/// Traits declared by the redb backend.
pub const REDB_STORE_TRAITS: [StoreTrait; 9] = [
    StoreTrait::StoreAggregation,
    StoreTrait::PreAggregationFiltering,
    StoreTrait::PostAggregationFiltering,
    StoreTrait::PostTransformationFiltering,
    StoreTrait::Transformation,
    StoreTrait::Ordered,
    StoreTrait::Visibility,
    StoreTrait::StoreValidation,
    StoreTrait::MatchedVertex,
];

// =============================================================================
// READ FILTER
// =============================================================================

/// Which stored elements a read operation selects.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadFilter<'a> {
    seeds: Option<&'a [String]>,
    view: Option<&'a View>,
}

impl<'a> ReadFilter<'a> {
    /// `None` if the operation is not an element read.
    pub(crate) fn for_operation(operation: &'a Operation) -> Option<Self> {
        match operation {
            Operation::GetAllElements { view, .. } => Some(Self {
                seeds: None,
                view: view.as_ref(),
            }),
            Operation::GetElements { seeds, view, .. } => Some(Self {
                seeds: Some(seeds),
                view: view.as_ref(),
            }),
            _ => None,
        }
    }

    pub(crate) fn accepts(&self, element: &Element) -> bool {
        let seeded = self
            .seeds
            .is_none_or(|seeds| seeds.iter().any(|s| element.touches(s)));
        seeded && self.view.is_none_or(|v| v.matches(element))
    }
}

/// Validate every element before any of them is written.
pub(crate) fn validate_all(elements: &[Element], schema: &Schema) -> Result<(), FederationError> {
    elements.iter().try_for_each(|e| e.validate(schema))
}

// =============================================================================
// FACTORY
// =============================================================================

/// Constructor for an uninitialised store.
pub type StoreConstructor = Arc<dyn Fn() -> Box<dyn Store> + Send + Sync>;

/// Builds backends from their properties' kind tag.
#[derive(Clone)]
pub struct StoreFactory {
    constructors: BTreeMap<String, StoreConstructor>,
}

impl fmt::Debug for StoreFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreFactory")
            .field("kinds", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for StoreFactory {
    fn default() -> Self {
        Self::empty()
            .with_kind("map", || Box::new(MapStore::new()))
            .with_kind("redb", || Box::new(RedbStore::new()))
    }
}

impl StoreFactory {
    /// A factory with no kinds registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Register (or replace) the constructor for a kind tag.
    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn Store> + Send + Sync + 'static,
    {
        self.constructors.insert(kind.into(), Arc::new(constructor));
    }

    #[must_use]
    pub fn with_kind<F>(mut self, kind: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn Store> + Send + Sync + 'static,
    {
        self.register(kind, constructor);
        self
    }

    #[must_use]
    pub fn kinds(&self) -> BTreeSet<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Construct and initialise the backend named by `properties`.
    pub fn create(
        &self,
        graph_id: &str,
        schema: Schema,
        properties: StoreProperties,
        library: Option<&dyn GraphLibrary>,
    ) -> Result<Box<dyn Store>, FederationError> {
        let kind = properties.kind().map(str::to_string).ok_or_else(|| {
            FederationError::Configuration(format!(
                "store properties for graph {} have no {}",
                graph_id,
                crate::primitives::STORE_KIND_KEY
            ))
        })?;
        let constructor = self.constructors.get(&kind).ok_or_else(|| {
            FederationError::Configuration(format!("unknown store kind {}", kind))
        })?;

        let mut store = constructor();
        store.initialise(graph_id, schema, properties, library)?;
        tracing::debug!(graph_id, kind = %kind, "store initialised");
        Ok(store)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_factory_knows_reference_backends() {
        let factory = StoreFactory::default();
        let kinds = factory.kinds();
        assert!(kinds.contains("map"));
        assert!(kinds.contains("redb"));
    }

    #[test]
    fn map_traits_are_subset_of_redb_traits() {
        let map: BTreeSet<_> = MAP_STORE_TRAITS.into_iter().collect();
        let redb: BTreeSet<_> = REDB_STORE_TRAITS.into_iter().collect();
        assert!(map.is_subset(&redb));
        assert_eq!(map.len(), 5);
        assert_eq!(redb.len(), 9);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = StoreFactory::default()
            .create("g1", Schema::new(), StoreProperties::for_kind("cassandra"), None)
            .expect_err("unknown kind");
        assert!(err.to_string().contains("cassandra"));
    }

    #[test]
    fn missing_kind_is_rejected() {
        assert!(StoreFactory::default()
            .create("g1", Schema::new(), StoreProperties::new(), None)
            .is_err());
    }

    #[test]
    fn read_filter_combines_seeds_and_view() {
        let op = Operation::get_elements(["a"]).with_view(View {
            entities: ["E".to_string()].into(),
            edges: BTreeSet::new(),
        });
        let filter = ReadFilter::for_operation(&op).expect("read");
        assert!(filter.accepts(&Element::entity("E", "a")));
        assert!(!filter.accepts(&Element::entity("E", "b")));
        assert!(!filter.accepts(&Element::edge("X", "a", "b", true)));
        assert!(ReadFilter::for_operation(&Operation::GetAllGraphIds).is_none());
    }
}
