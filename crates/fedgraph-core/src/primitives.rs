//! # Configuration Primitives
//!
//! Fixed configuration keys and defaults for the federation.
//!
//! Keys are flat and dot-separated. TOML files are flattened into this shape
//! before they are read (see [`crate::properties::StoreProperties`]).

/// Prefix shared by every federation-level key.
pub const FEDERATION_PREFIX: &str = "fedgraph.federation";

/// Comma-separated list of constituent graph ids.
pub const GRAPH_IDS_KEY: &str = "fedgraph.federation.graphIds";

/// Write-target policy when an operation carries no graph selector
/// (`all` or `reject`).
pub const WRITE_POLICY_KEY: &str = "fedgraph.federation.writePolicy";

/// Upper bound on constituent graphs executed in parallel.
pub const MAX_PARALLELISM_KEY: &str = "fedgraph.federation.maxParallelism";

/// Per-graph key suffixes, appended to `fedgraph.federation.<graphId>`.
pub const SCHEMA_FILE_SUFFIX: &str = "schema.file";
pub const SCHEMA_ID_SUFFIX: &str = "schema.id";
pub const PROPERTIES_FILE_SUFFIX: &str = "properties.file";
pub const PROPERTIES_ID_SUFFIX: &str = "properties.id";

/// Store properties key naming the backend kind for the store factory.
pub const STORE_KIND_KEY: &str = "fedgraph.store.kind";

/// Store properties key holding the redb database path.
pub const REDB_PATH_KEY: &str = "fedgraph.store.redb.path";

/// Separator for multi-valued keys (graph ids, schema files).
pub const LIST_SEPARATOR: char = ',';

/// Build the full key for a per-graph setting.
#[must_use]
pub fn graph_key(graph_id: &str, suffix: &str) -> String {
    format!("{}.{}.{}", FEDERATION_PREFIX, graph_id, suffix)
}

/// Split a comma-separated value, trimming whitespace and dropping blanks.
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_key_shape() {
        assert_eq!(
            graph_key("mapGraph", SCHEMA_FILE_SUFFIX),
            "fedgraph.federation.mapGraph.schema.file"
        );
    }

    #[test]
    fn split_list_trims_and_drops_blanks() {
        let items: Vec<_> = split_list(" a, b ,,c ").collect();
        assert_eq!(items, vec!["a", "b", "c"]);
    }
}
