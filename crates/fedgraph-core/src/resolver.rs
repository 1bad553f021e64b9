//! # Graph Resolver
//!
//! Turns a [`GraphConfigEntry`] into a built [`Graph`].
//!
//! Schema and properties are resolved independently, by the same rules:
//! 1. inline value and explicit file(s); several schema files are union-merged
//! 2. library entry named by `schema.id` / `properties.id`
//! 3. `library.get(graphId)` when neither of the above gave a value
//!
//! When both (1) and (2) are configured, the library value is the base and
//! the explicit value is laid over it: explicit wins on every conflicting key
//! or group, library-only content is kept.
//!
//! Each library accessor is called at most once per resolution.

use crate::config::GraphConfigEntry;
use crate::graph::Graph;
use crate::library::GraphLibrary;
use crate::properties::StoreProperties;
use crate::schema::Schema;
use crate::store::StoreFactory;
use crate::types::CreationKind;
use crate::FederationError;

/// Resolved, not yet validated parts of a graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParts {
    pub schema: Option<Schema>,
    pub properties: Option<StoreProperties>,
}

/// Resolve and build one constituent graph.
pub fn resolve(
    graph_id: &str,
    entry: &GraphConfigEntry,
    library: &dyn GraphLibrary,
    factory: &StoreFactory,
) -> Result<Graph, FederationError> {
    let parts = resolve_parts(graph_id, entry, library)?;

    let mut builder = Graph::builder().graph_id(graph_id).library(library);
    if let Some(schema) = parts.schema {
        builder = builder.schema(schema);
    }
    if let Some(properties) = parts.properties {
        builder = builder.properties(properties);
    }
    builder.build(factory)
}

/// Resolve schema and properties without building the graph.
///
/// Parts that no source provides are left `None`.
pub fn resolve_parts(
    graph_id: &str,
    entry: &GraphConfigEntry,
    library: &dyn GraphLibrary,
) -> Result<ResolvedParts, FederationError> {
    let mut schema = resolve_schema(graph_id, entry, library)?;
    let mut properties = resolve_properties(graph_id, entry, library)?;

    if schema.is_none() || properties.is_none() {
        if let Some((lib_schema, lib_properties)) =
            library.get(graph_id).map_err(|e| library_failure(graph_id, e))?
        {
            tracing::debug!(graph_id, "falling back to library entry for graph");
            schema.get_or_insert(lib_schema);
            properties.get_or_insert(lib_properties);
        }
    }

    Ok(ResolvedParts { schema, properties })
}

fn library_failure(graph_id: &str, cause: FederationError) -> FederationError {
    FederationError::Library(format!("graphId: {} {}", graph_id, cause))
}

fn resolve_schema(
    graph_id: &str,
    entry: &GraphConfigEntry,
    library: &dyn GraphLibrary,
) -> Result<Option<Schema>, FederationError> {
    let mut explicit = entry.schema.clone();
    for path in &entry.schema_files {
        let loaded = Schema::load(path).map_err(|_| {
            FederationError::creation_failed_at(
                CreationKind::Schema,
                graph_id,
                &path.display().to_string(),
            )
        })?;
        explicit = Some(match explicit {
            Some(acc) => acc.merge(&loaded)?,
            None => loaded,
        });
    }

    let from_library = match &entry.schema_id {
        Some(id) => Some(
            library
                .get_schema(id)
                .map_err(|e| library_failure(graph_id, e))?
                .ok_or_else(|| FederationError::creation_failed_at(CreationKind::Schema, graph_id, id))?,
        ),
        None => None,
    };

    Ok(match (from_library, explicit) {
        (Some(base), Some(overlay)) => Some(base.overlaid_with(&overlay)),
        (base, overlay) => overlay.or(base),
    })
}

fn resolve_properties(
    graph_id: &str,
    entry: &GraphConfigEntry,
    library: &dyn GraphLibrary,
) -> Result<Option<StoreProperties>, FederationError> {
    let mut explicit = entry.properties.clone();
    if let Some(path) = &entry.properties_file {
        let loaded = StoreProperties::load(path).map_err(|_| {
            FederationError::creation_failed_at(
                CreationKind::Property,
                graph_id,
                &path.display().to_string(),
            )
        })?;
        explicit = Some(match explicit {
            Some(inline) => loaded.overlaid_with(&inline),
            None => loaded,
        });
    }

    let from_library = match &entry.properties_id {
        Some(id) => Some(
            library
                .get_properties(id)
                .map_err(|e| library_failure(graph_id, e))?
                .ok_or_else(|| {
                    FederationError::creation_failed_at(CreationKind::Property, graph_id, id)
                })?,
        ),
        None => None,
    };

    Ok(match (from_library, explicit) {
        (Some(base), Some(overlay)) => Some(base.overlaid_with(&overlay)),
        (base, overlay) => overlay.or(base),
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{HashMapGraphLibrary, NoGraphLibrary};
    use crate::schema::{SchemaEntityDefinition, TypeDefinition};

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

    #[test]
    fn inline_parts_build_a_graph() {
        let entry = GraphConfigEntry::inline(schema(), StoreProperties::for_kind("map"));
        let graph = resolve("g1", &entry, &NoGraphLibrary, &StoreFactory::default())
            .expect("resolve");
        assert_eq!(graph.graph_id(), "g1");
    }

    #[test]
    fn missing_schema_file_uses_schema_template() {
        let entry = GraphConfigEntry::new()
            .with_schema_file("/does/not/exist.json")
            .with_properties(StoreProperties::for_kind("map"));
        let err = resolve_parts("g1", &entry, &NoGraphLibrary).expect_err("missing");
        assert_eq!(
            err.to_string(),
            "Schema was not able to be created with the supplied properties graphId: g1 schemaPath: /does/not/exist.json"
        );
    }

    #[test]
    fn missing_library_id_uses_path_template() {
        let entry = GraphConfigEntry::new()
            .with_schema(schema())
            .with_properties_id("nothing");
        let err = resolve_parts("g1", &entry, &NoGraphLibrary).expect_err("missing");
        assert_eq!(
            err.to_string(),
            "Property was not able to be created with the supplied properties graphId: g1 propertyPath: nothing"
        );
    }

    #[test]
    fn explicit_properties_overlay_library_properties() {
        let library = HashMapGraphLibrary::new();
        library
            .add_properties(
                "shared",
                &StoreProperties::for_kind("redb").with("unusualKey", "fromLibrary"),
            )
            .expect("add");
        let entry = GraphConfigEntry::new()
            .with_schema(schema())
            .with_properties_id("shared")
            .with_properties(StoreProperties::for_kind("map"));

        let parts = resolve_parts("g1", &entry, &library).expect("resolve");
        let props = parts.properties.expect("properties");
        assert_eq!(props.kind(), Some("map"));
        assert_eq!(props.get("unusualKey"), Some("fromLibrary"));
    }

    #[test]
    fn library_graph_entry_is_the_fallback() {
        let library = HashMapGraphLibrary::new();
        library
            .add("g1", &schema(), &StoreProperties::for_kind("map"))
            .expect("add");
        let parts = resolve_parts("g1", &GraphConfigEntry::new(), &library).expect("resolve");
        assert_eq!(parts.schema, Some(schema()));
        assert_eq!(
            parts.properties.and_then(|p| p.kind().map(str::to_string)),
            Some("map".to_string())
        );
    }

    #[test]
    fn nothing_configured_is_an_incomplete_builder() {
        let err = resolve("g1", &GraphConfigEntry::new(), &NoGraphLibrary, &StoreFactory::default())
            .expect_err("nothing");
        assert!(err
            .to_string()
            .starts_with("Graph was not able to be created with the supplied properties"));
    }
}
