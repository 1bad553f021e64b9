//! In-memory backend keyed by element identity.

use super::{MAP_STORE_TRAITS, ReadFilter, Store, validate_all};
use crate::element::{Element, ElementKey};
use crate::iterable::VecIterator;
use crate::library::GraphLibrary;
use crate::operation::{Operation, OperationResult};
use crate::properties::StoreProperties;
use crate::schema::Schema;
use crate::traits::StoreTrait;
use crate::{Context, FederationError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Elements held in a `BTreeMap`; same-key writes aggregate.
#[derive(Debug)]
pub struct MapStore {
    graph_id: String,
    schema: Schema,
    properties: StoreProperties,
    traits: BTreeSet<StoreTrait>,
    elements: RwLock<BTreeMap<ElementKey, Element>>,
}

impl Default for MapStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MapStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph_id: String::new(),
            schema: Schema::new(),
            properties: StoreProperties::new(),
            traits: MAP_STORE_TRAITS.into_iter().collect(),
            elements: RwLock::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    #[must_use]
    pub fn properties(&self) -> &StoreProperties {
        &self.properties
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<ElementKey, Element>>, FederationError> {
        self.elements
            .read()
            .map_err(|_| FederationError::Io(format!("graph {} lock poisoned", self.graph_id)))
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<ElementKey, Element>>, FederationError> {
        self.elements
            .write()
            .map_err(|_| FederationError::Io(format!("graph {} lock poisoned", self.graph_id)))
    }

    fn add_elements(&self, elements: &[Element]) -> Result<(), FederationError> {
        validate_all(elements, &self.schema)?;
        let mut stored = self.write()?;
        for element in elements {
            match stored.get_mut(&element.key()) {
                Some(existing) => existing.aggregate(element, &self.schema),
                None => {
                    stored.insert(element.key(), element.clone());
                }
            }
        }
        Ok(())
    }
}

impl Store for MapStore {
    fn initialise(
        &mut self,
        graph_id: &str,
        schema: Schema,
        properties: StoreProperties,
        _library: Option<&dyn GraphLibrary>,
    ) -> Result<(), FederationError> {
        schema.validate()?;
        self.graph_id = graph_id.to_string();
        self.schema = schema;
        self.properties = properties;
        Ok(())
    }

    fn execute(
        &self,
        operation: &Operation,
        ctx: &Context,
    ) -> Result<OperationResult, FederationError> {
        if let Some(filter) = ReadFilter::for_operation(operation) {
            let selected: Vec<Element> = self
                .read()?
                .values()
                .filter(|e| filter.accepts(e))
                .cloned()
                .collect();
            return Ok(OperationResult::Elements(Box::new(VecIterator::new(selected))));
        }

        match operation {
            Operation::AddElements { elements, .. } => {
                self.add_elements(elements)?;
                Ok(OperationResult::Done)
            }
            Operation::CountAllElements { .. } => Ok(OperationResult::Count(self.read()?.len() as u64)),
            other => self.do_unhandled_operation(other, ctx),
        }
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn traits(&self) -> &BTreeSet<StoreTrait> {
        &self.traits
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::PropertyValue;
    use crate::schema::{SchemaEntityDefinition, TypeDefinition};
    use crate::User;

    fn schema() -> Schema {
        Schema::new()
            .entity(
                "BasicEntity",
                SchemaEntityDefinition {
                    vertex: "vertex.string".into(),
                    properties: [("count".to_string(), "prop.count".to_string())].into(),
                    description: None,
                },
            )
            .type_def("vertex.string", TypeDefinition::new("string"))
            .type_def("prop.count", TypeDefinition::new("integer").aggregated_by("sum"))
    }

    fn store() -> MapStore {
        let mut store = MapStore::new();
        store
            .initialise("g1", schema(), StoreProperties::for_kind("map"), None)
            .expect("init");
        store
    }

    fn ctx() -> Context {
        Context::new(User::default(), "job")
    }

    #[test]
    fn add_then_read_aggregates_duplicates() {
        let store = store();
        let e = Element::entity("BasicEntity", "v").property("count", 1);
        store
            .execute(&Operation::add_elements(vec![e.clone(), e]), &ctx())
            .expect("add");

        let all: Vec<Element> = store
            .execute(&Operation::get_all_elements(), &ctx())
            .and_then(OperationResult::into_elements)
            .expect("read")
            .collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].properties().get("count"), Some(&PropertyValue::Integer(2)));
    }

    #[test]
    fn invalid_batch_writes_nothing() {
        let store = store();
        let batch = vec![
            Element::entity("BasicEntity", "v"),
            Element::entity("Unknown", "v"),
        ];
        assert!(store.execute(&Operation::add_elements(batch), &ctx()).is_err());
        let count = store
            .execute(&Operation::CountAllElements { options: Default::default() }, &ctx())
            .and_then(OperationResult::into_count)
            .expect("count");
        assert_eq!(count, 0);
    }

    #[test]
    fn seeded_read_filters_by_vertex() {
        let store = store();
        store
            .execute(
                &Operation::add_elements(vec![
                    Element::entity("BasicEntity", "a"),
                    Element::entity("BasicEntity", "b"),
                ]),
                &ctx(),
            )
            .expect("add");
        let found: Vec<Element> = store
            .execute(&Operation::get_elements(["b"]), &ctx())
            .and_then(OperationResult::into_elements)
            .expect("read")
            .collect();
        assert_eq!(found, vec![Element::entity("BasicEntity", "b")]);
    }

    #[test]
    fn unknown_operations_fall_back_to_unhandled() {
        let err = store()
            .execute(&Operation::GetAllGraphIds, &ctx())
            .expect_err("unsupported");
        assert!(matches!(err, FederationError::UnsupportedOperation(_)));
    }

    #[test]
    fn incomplete_schema_fails_initialise() {
        let mut store = MapStore::new();
        let incomplete = Schema::new().entity(
            "BasicEntity",
            SchemaEntityDefinition {
                vertex: "vertex.string".into(),
                properties: Default::default(),
                description: None,
            },
        );
        assert!(store
            .initialise("g1", incomplete, StoreProperties::for_kind("map"), None)
            .is_err());
    }
}
