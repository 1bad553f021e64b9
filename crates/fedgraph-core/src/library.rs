//! # Named-Configuration Library
//!
//! A shared catalogue of schemas and store properties that graphs can refer
//! to by id instead of carrying them inline.
//!
//! A library holds three kinds of entry:
//! - schemas by schema id
//! - store properties by properties id
//! - graphs by graph id, each pointing at a schema id and a properties id
//!
//! Entries are add-only: re-adding an id with the same content is accepted,
//! re-adding it with different content is a [`FederationError::Conflict`].
//! The federation only ever reads from a library while resolving graphs.

use crate::properties::StoreProperties;
use crate::schema::Schema;
use crate::FederationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// The library interface used by the resolver and the registry.
pub trait GraphLibrary: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Schema and properties registered for a graph id.
    fn get(&self, graph_id: &str) -> Result<Option<(Schema, StoreProperties)>, FederationError>;

    fn get_schema(&self, schema_id: &str) -> Result<Option<Schema>, FederationError>;

    fn get_properties(&self, properties_id: &str)
    -> Result<Option<StoreProperties>, FederationError>;

    /// Register a graph, storing its schema and properties under the graph id.
    fn add(
        &self,
        graph_id: &str,
        schema: &Schema,
        properties: &StoreProperties,
    ) -> Result<(), FederationError>;

    fn add_schema(&self, schema_id: &str, schema: &Schema) -> Result<(), FederationError>;

    fn add_properties(
        &self,
        properties_id: &str,
        properties: &StoreProperties,
    ) -> Result<(), FederationError>;

    fn exists(&self, graph_id: &str) -> Result<bool, FederationError> {
        Ok(self.get(graph_id)?.is_some())
    }
}

impl fmt::Debug for dyn GraphLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pointer from a graph id to its schema and properties entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEntry {
    pub schema_id: String,
    pub properties_id: String,
}

fn different_content(what: &str, id: &str) -> FederationError {
    FederationError::Conflict(format!(
        "{} {} already exists with different content",
        what, id
    ))
}

/// `Ok(true)` if the value must be written, `Ok(false)` if it is already there.
fn needs_insert<T: PartialEq>(
    existing: Option<&T>,
    incoming: &T,
    what: &str,
    id: &str,
) -> Result<bool, FederationError> {
    match existing {
        None => Ok(true),
        Some(current) if current == incoming => Ok(false),
        Some(_) => Err(different_content(what, id)),
    }
}

// =============================================================================
// NO LIBRARY
// =============================================================================

/// The empty library: nothing is found, nothing is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGraphLibrary;

impl GraphLibrary for NoGraphLibrary {
    fn name(&self) -> &str {
        "NoGraphLibrary"
    }

    fn get(&self, _graph_id: &str) -> Result<Option<(Schema, StoreProperties)>, FederationError> {
        Ok(None)
    }

    fn get_schema(&self, _schema_id: &str) -> Result<Option<Schema>, FederationError> {
        Ok(None)
    }

    fn get_properties(
        &self,
        _properties_id: &str,
    ) -> Result<Option<StoreProperties>, FederationError> {
        Ok(None)
    }

    fn add(
        &self,
        _graph_id: &str,
        _schema: &Schema,
        _properties: &StoreProperties,
    ) -> Result<(), FederationError> {
        Ok(())
    }

    fn add_schema(&self, _schema_id: &str, _schema: &Schema) -> Result<(), FederationError> {
        Ok(())
    }

    fn add_properties(
        &self,
        _properties_id: &str,
        _properties: &StoreProperties,
    ) -> Result<(), FederationError> {
        Ok(())
    }
}

// =============================================================================
// IN-MEMORY LIBRARY
// =============================================================================

#[derive(Debug, Default)]
struct Entries {
    graphs: BTreeMap<String, GraphEntry>,
    schemas: BTreeMap<String, Schema>,
    properties: BTreeMap<String, StoreProperties>,
}

/// In-memory library, shared by reference between federations and tests.
#[derive(Debug, Default)]
pub struct HashMapGraphLibrary {
    entries: RwLock<Entries>,
}

impl HashMapGraphLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Entries>, FederationError> {
        self.entries
            .read()
            .map_err(|_| FederationError::Library("library lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Entries>, FederationError> {
        self.entries
            .write()
            .map_err(|_| FederationError::Library("library lock poisoned".to_string()))
    }

    /// Drop every entry.
    pub fn clear(&self) -> Result<(), FederationError> {
        *self.write()? = Entries::default();
        Ok(())
    }
}

impl GraphLibrary for HashMapGraphLibrary {
    fn name(&self) -> &str {
        "HashMapGraphLibrary"
    }

    fn get(&self, graph_id: &str) -> Result<Option<(Schema, StoreProperties)>, FederationError> {
        let entries = self.read()?;
        let Some(entry) = entries.graphs.get(graph_id) else {
            return Ok(None);
        };
        let schema = entries.schemas.get(&entry.schema_id).cloned().ok_or_else(|| {
            FederationError::Library(format!(
                "graph {} refers to missing schema {}",
                graph_id, entry.schema_id
            ))
        })?;
        let properties = entries
            .properties
            .get(&entry.properties_id)
            .cloned()
            .ok_or_else(|| {
                FederationError::Library(format!(
                    "graph {} refers to missing properties {}",
                    graph_id, entry.properties_id
                ))
            })?;
        Ok(Some((schema, properties)))
    }

    fn get_schema(&self, schema_id: &str) -> Result<Option<Schema>, FederationError> {
        Ok(self.read()?.schemas.get(schema_id).cloned())
    }

    fn get_properties(
        &self,
        properties_id: &str,
    ) -> Result<Option<StoreProperties>, FederationError> {
        Ok(self.read()?.properties.get(properties_id).cloned())
    }

    fn add(
        &self,
        graph_id: &str,
        schema: &Schema,
        properties: &StoreProperties,
    ) -> Result<(), FederationError> {
        let mut entries = self.write()?;
        let entry = GraphEntry {
            schema_id: graph_id.to_string(),
            properties_id: graph_id.to_string(),
        };
        // Check all three before writing any of them.
        let add_graph = needs_insert(entries.graphs.get(graph_id), &entry, "GraphId", graph_id)?;
        let add_schema = needs_insert(entries.schemas.get(graph_id), schema, "SchemaId", graph_id)?;
        let add_props = needs_insert(
            entries.properties.get(graph_id),
            properties,
            "PropertiesId",
            graph_id,
        )?;

        if add_schema {
            entries.schemas.insert(graph_id.to_string(), schema.clone());
        }
        if add_props {
            entries
                .properties
                .insert(graph_id.to_string(), properties.clone());
        }
        if add_graph {
            entries.graphs.insert(graph_id.to_string(), entry);
        }
        Ok(())
    }

    fn add_schema(&self, schema_id: &str, schema: &Schema) -> Result<(), FederationError> {
        let mut entries = self.write()?;
        if needs_insert(entries.schemas.get(schema_id), schema, "SchemaId", schema_id)? {
            entries.schemas.insert(schema_id.to_string(), schema.clone());
        }
        Ok(())
    }

    fn add_properties(
        &self,
        properties_id: &str,
        properties: &StoreProperties,
    ) -> Result<(), FederationError> {
        let mut entries = self.write()?;
        if needs_insert(
            entries.properties.get(properties_id),
            properties,
            "PropertiesId",
            properties_id,
        )? {
            entries
                .properties
                .insert(properties_id.to_string(), properties.clone());
        }
        Ok(())
    }
}

// =============================================================================
// FILE LIBRARY
// =============================================================================

/// Library persisted as files in one directory:
/// - `<graphId>Graphs.json` holds the [`GraphEntry`]
/// - `<schemaId>Schema.json` holds the schema
/// - `<propertiesId>Props.toml` holds the store properties
#[derive(Debug, Clone)]
pub struct FileGraphLibrary {
    dir: PathBuf,
}

impl FileGraphLibrary {
    /// Use `dir` as the library directory. It is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, FederationError> {
        let dir = dir.into();
        let text = dir.to_string_lossy();
        if let Some(bad) = text
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || "_/\\-.:".contains(*c)))
        {
            return Err(FederationError::Configuration(format!(
                "graph library path {} contains invalid character {:?}",
                text, bad
            )));
        }
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn graph_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}Graphs.json", id))
    }

    fn schema_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}Schema.json", id))
    }

    fn properties_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}Props.toml", id))
    }

    fn read_entry(&self, graph_id: &str) -> Result<Option<GraphEntry>, FederationError> {
        let path = self.graph_path(graph_id);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|e| FederationError::Io(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| FederationError::Serialization(e.to_string()))
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<(), FederationError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| FederationError::Io(format!("{}: {}", self.dir.display(), e)))?;
        std::fs::write(path, contents)
            .map_err(|e| FederationError::Io(format!("{}: {}", path.display(), e)))
    }
}

impl GraphLibrary for FileGraphLibrary {
    fn name(&self) -> &str {
        "FileGraphLibrary"
    }

    fn get(&self, graph_id: &str) -> Result<Option<(Schema, StoreProperties)>, FederationError> {
        let Some(entry) = self.read_entry(graph_id)? else {
            return Ok(None);
        };
        let schema = self.get_schema(&entry.schema_id)?.ok_or_else(|| {
            FederationError::Library(format!(
                "graph {} refers to missing schema {}",
                graph_id, entry.schema_id
            ))
        })?;
        let properties = self.get_properties(&entry.properties_id)?.ok_or_else(|| {
            FederationError::Library(format!(
                "graph {} refers to missing properties {}",
                graph_id, entry.properties_id
            ))
        })?;
        Ok(Some((schema, properties)))
    }

    fn get_schema(&self, schema_id: &str) -> Result<Option<Schema>, FederationError> {
        let path = self.schema_path(schema_id);
        if !path.exists() {
            return Ok(None);
        }
        Schema::load(path).map(Some)
    }

    fn get_properties(
        &self,
        properties_id: &str,
    ) -> Result<Option<StoreProperties>, FederationError> {
        let path = self.properties_path(properties_id);
        if !path.exists() {
            return Ok(None);
        }
        StoreProperties::load(path).map(Some)
    }

    fn add(
        &self,
        graph_id: &str,
        schema: &Schema,
        properties: &StoreProperties,
    ) -> Result<(), FederationError> {
        let entry = GraphEntry {
            schema_id: graph_id.to_string(),
            properties_id: graph_id.to_string(),
        };
        let existing_entry = self.read_entry(graph_id)?;
        let existing_schema = self.get_schema(graph_id)?;
        let existing_props = self.get_properties(graph_id)?;
        let add_graph = needs_insert(existing_entry.as_ref(), &entry, "GraphId", graph_id)?;
        let add_schema = needs_insert(existing_schema.as_ref(), schema, "SchemaId", graph_id)?;
        let add_props = needs_insert(
            existing_props.as_ref(),
            properties,
            "PropertiesId",
            graph_id,
        )?;

        if add_schema {
            self.write_file(&self.schema_path(graph_id), &schema.to_json()?)?;
        }
        if add_props {
            self.write_file(&self.properties_path(graph_id), &properties.to_toml_string()?)?;
        }
        if add_graph {
            let json = serde_json::to_string_pretty(&entry)
                .map_err(|e| FederationError::Serialization(e.to_string()))?;
            self.write_file(&self.graph_path(graph_id), &json)?;
        }
        Ok(())
    }

    fn add_schema(&self, schema_id: &str, schema: &Schema) -> Result<(), FederationError> {
        let existing = self.get_schema(schema_id)?;
        if needs_insert(existing.as_ref(), schema, "SchemaId", schema_id)? {
            self.write_file(&self.schema_path(schema_id), &schema.to_json()?)?;
        }
        Ok(())
    }

    fn add_properties(
        &self,
        properties_id: &str,
        properties: &StoreProperties,
    ) -> Result<(), FederationError> {
        let existing = self.get_properties(properties_id)?;
        if needs_insert(existing.as_ref(), properties, "PropertiesId", properties_id)? {
            self.write_file(
                &self.properties_path(properties_id),
                &properties.to_toml_string()?,
            )?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
