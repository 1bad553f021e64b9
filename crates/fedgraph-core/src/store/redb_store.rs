//! # redb-backed Store
//!
//! Elements persisted in a redb database, one table:
//! - key: postcard-encoded [`ElementKey`]
//! - value: postcard-encoded [`Element`]
//!
//! Writes run in a single write transaction per batch, so a batch with an
//! invalid element is rejected before the transaction opens and a failed
//! commit leaves nothing behind.

use super::{REDB_STORE_TRAITS, ReadFilter, Store, validate_all};
use crate::element::Element;
use crate::iterable::VecIterator;
use crate::library::GraphLibrary;
use crate::operation::{Operation, OperationResult};
use crate::primitives::REDB_PATH_KEY;
use crate::properties::StoreProperties;
use crate::schema::Schema;
use crate::traits::StoreTrait;
use crate::{Context, FederationError};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeSet;

/// Table for elements: encoded ElementKey -> encoded Element
const ELEMENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("elements");

fn io(e: impl std::fmt::Display) -> FederationError {
    FederationError::Io(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, FederationError> {
    postcard::to_allocvec(value).map_err(|e| FederationError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Element, FederationError> {
    postcard::from_bytes(bytes).map_err(|e| FederationError::Serialization(e.to_string()))
}

/// Disk-backed store. Requires `fedgraph.store.redb.path`.
pub struct RedbStore {
    graph_id: String,
    schema: Schema,
    traits: BTreeSet<StoreTrait>,
    db: Option<Database>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("graph_id", &self.graph_id)
            .field("open", &self.db.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for RedbStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RedbStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph_id: String::new(),
            schema: Schema::new(),
            traits: REDB_STORE_TRAITS.into_iter().collect(),
            db: None,
        }
    }

    fn db(&self) -> Result<&Database, FederationError> {
        self.db.as_ref().ok_or_else(|| {
            FederationError::Configuration(format!("graph {} is not initialised", self.graph_id))
        })
    }

    fn add_elements(&self, elements: &[Element]) -> Result<(), FederationError> {
        validate_all(elements, &self.schema)?;

        let write_txn = self.db()?.begin_write().map_err(io)?;
        {
            let mut table = write_txn.open_table(ELEMENTS).map_err(io)?;
            for element in elements {
                let key = encode(&element.key())?;
                let existing = table
                    .get(key.as_slice())
                    .map_err(io)?
                    .map(|guard| guard.value().to_vec());
                let merged = match existing {
                    Some(bytes) => {
                        let mut stored = decode(&bytes)?;
                        stored.aggregate(element, &self.schema);
                        stored
                    }
                    None => element.clone(),
                };
                table
                    .insert(key.as_slice(), encode(&merged)?.as_slice())
                    .map_err(io)?;
            }
        }
        write_txn.commit().map_err(io)?;
        Ok(())
    }

    fn read_elements(&self, filter: ReadFilter<'_>) -> Result<Vec<Element>, FederationError> {
        let read_txn = self.db()?.begin_read().map_err(io)?;
        let table = read_txn.open_table(ELEMENTS).map_err(io)?;
        let mut selected = Vec::new();
        for entry in table.iter().map_err(io)? {
            let (_, value) = entry.map_err(io)?;
            let element = decode(value.value())?;
            if filter.accepts(&element) {
                selected.push(element);
            }
        }
        Ok(selected)
    }

    fn count(&self) -> Result<u64, FederationError> {
        let read_txn = self.db()?.begin_read().map_err(io)?;
        let table = read_txn.open_table(ELEMENTS).map_err(io)?;
        table.len().map_err(io)
    }
}

impl Store for RedbStore {
    fn initialise(
        &mut self,
        graph_id: &str,
        schema: Schema,
        properties: StoreProperties,
        _library: Option<&dyn GraphLibrary>,
    ) -> Result<(), FederationError> {
        schema.validate()?;
        let path = properties.get(REDB_PATH_KEY).ok_or_else(|| {
            FederationError::Configuration(format!(
                "graph {} has no {} configured",
                graph_id, REDB_PATH_KEY
            ))
        })?;

        let db = Database::create(path).map_err(io)?;
        // Create the table so reads on an empty store succeed.
        {
            let write_txn = db.begin_write().map_err(io)?;
            let _ = write_txn.open_table(ELEMENTS).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }

        self.graph_id = graph_id.to_string();
        self.schema = schema;
        self.db = Some(db);
        Ok(())
    }

    fn execute(
        &self,
        operation: &Operation,
        ctx: &Context,
    ) -> Result<OperationResult, FederationError> {
        if let Some(filter) = ReadFilter::for_operation(operation) {
            let selected = self.read_elements(filter)?;
            return Ok(OperationResult::Elements(Box::new(VecIterator::new(selected))));
        }

        match operation {
            Operation::AddElements { elements, .. } => {
                self.add_elements(elements)?;
                Ok(OperationResult::Done)
            }
            Operation::CountAllElements { .. } => Ok(OperationResult::Count(self.count()?)),
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
