//! # Federation Configuration
//!
//! Reads the flat federation keys (see [`crate::primitives`]) into validated,
//! immutable structs:
//! - [`GraphConfigEntry`]: where one constituent's schema and properties come from
//! - [`FederationConfig`]: the constituent ids plus federation-wide settings
//!
//! Relative file paths are resolved against the directory of the
//! configuration file they were read from.

use crate::primitives::{
    GRAPH_IDS_KEY, MAX_PARALLELISM_KEY, PROPERTIES_FILE_SUFFIX, PROPERTIES_ID_SUFFIX,
    SCHEMA_FILE_SUFFIX, SCHEMA_ID_SUFFIX, WRITE_POLICY_KEY, graph_key, split_list,
};
use crate::properties::StoreProperties;
use crate::schema::Schema;
use crate::types::validate_graph_id;
use crate::FederationError;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// =============================================================================
// GRAPH CONFIG ENTRY
// =============================================================================

/// Sources for one constituent graph's schema and properties.
///
/// Any combination may be set; the resolver decides precedence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphConfigEntry {
    pub schema: Option<Schema>,
    pub schema_files: Vec<PathBuf>,
    pub schema_id: Option<String>,
    pub properties: Option<StoreProperties>,
    pub properties_file: Option<PathBuf>,
    pub properties_id: Option<String>,
}

impl GraphConfigEntry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry with both parts given inline.
    #[must_use]
    pub fn inline(schema: Schema, properties: StoreProperties) -> Self {
        Self::new().with_schema(schema).with_properties(properties)
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_schema_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_files.push(path.into());
        self
    }

    #[must_use]
    pub fn with_schema_id(mut self, id: impl Into<String>) -> Self {
        self.schema_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: StoreProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    #[must_use]
    pub fn with_properties_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.properties_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_properties_id(mut self, id: impl Into<String>) -> Self {
        self.properties_id = Some(id.into());
        self
    }

    /// True when no source at all is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Read the per-graph keys for `graph_id`.
    #[must_use]
    pub fn from_properties(
        props: &StoreProperties,
        graph_id: &str,
        base_dir: Option<&Path>,
    ) -> Self {
        let resolve = |p: &str| match base_dir {
            Some(dir) if Path::new(p).is_relative() => dir.join(p),
            _ => PathBuf::from(p),
        };
        let get = |suffix: &str| props.get(&graph_key(graph_id, suffix));

        Self {
            schema: None,
            schema_files: get(SCHEMA_FILE_SUFFIX)
                .map(|v| split_list(v).map(resolve).collect())
                .unwrap_or_default(),
            schema_id: get(SCHEMA_ID_SUFFIX).map(str::to_string),
            properties: None,
            properties_file: get(PROPERTIES_FILE_SUFFIX).map(resolve),
            properties_id: get(PROPERTIES_ID_SUFFIX).map(str::to_string),
        }
    }
}

// =============================================================================
// WRITE TARGET POLICY
// =============================================================================

/// Where a mutation goes when it names no target graphs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteTargetPolicy {
    /// Every graph whose schema accepts part of the write.
    #[default]
    AllGraphs,
    /// Refuse the write; callers must name the target graphs.
    RejectAmbiguous,
}

impl FromStr for WriteTargetPolicy {
    type Err = FederationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(WriteTargetPolicy::AllGraphs),
            "reject" => Ok(WriteTargetPolicy::RejectAmbiguous),
            other => Err(FederationError::Configuration(format!(
                "{} must be one of all, reject; got {}",
                WRITE_POLICY_KEY, other
            ))),
        }
    }
}

// =============================================================================
// FEDERATION CONFIG
// =============================================================================

/// Validated federation configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FederationConfig {
    /// Constituent ids in configuration order.
    pub graph_ids: Vec<String>,
    pub entries: BTreeMap<String, GraphConfigEntry>,
    pub write_policy: WriteTargetPolicy,
    /// `None` means one worker per available core.
    pub max_parallelism: Option<NonZeroUsize>,
}

impl FederationConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the federation keys out of a flat property map.
    pub fn from_properties(
        props: &StoreProperties,
        base_dir: Option<&Path>,
    ) -> Result<Self, FederationError> {
        let graph_ids: Vec<String> = props
            .get(GRAPH_IDS_KEY)
            .map(|v| split_list(v).map(str::to_string).collect())
            .unwrap_or_default();
        for id in &graph_ids {
            validate_graph_id(id)?;
        }

        let entries = graph_ids
            .iter()
            .map(|id| {
                (
                    id.clone(),
                    GraphConfigEntry::from_properties(props, id, base_dir),
                )
            })
            .collect();

        let write_policy = props
            .get(WRITE_POLICY_KEY)
            .map(WriteTargetPolicy::from_str)
            .transpose()?
            .unwrap_or_default();

        let max_parallelism = props
            .get(MAX_PARALLELISM_KEY)
            .map(|v| {
                v.trim().parse::<NonZeroUsize>().map_err(|_| {
                    FederationError::Configuration(format!(
                        "{} must be a positive integer, got {}",
                        MAX_PARALLELISM_KEY, v
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            graph_ids,
            entries,
            write_policy,
            max_parallelism,
        })
    }

    /// Load a TOML federation file; relative paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FederationError> {
        let path = path.as_ref();
        let props = StoreProperties::load(path)?;
        Self::from_properties(&props, path.parent())
    }

    /// Add or replace the entry for a graph id.
    #[must_use]
    pub fn with_graph(mut self, graph_id: impl Into<String>, entry: GraphConfigEntry) -> Self {
        let graph_id = graph_id.into();
        if !self.graph_ids.contains(&graph_id) {
            self.graph_ids.push(graph_id.clone());
        }
        self.entries.insert(graph_id, entry);
        self
    }

    #[must_use]
    pub fn with_write_policy(mut self, policy: WriteTargetPolicy) -> Self {
        self.write_policy = policy;
        self
    }

    #[must_use]
    pub fn with_max_parallelism(mut self, workers: NonZeroUsize) -> Self {
        self.max_parallelism = Some(workers);
        self
    }

    /// Effective dispatch worker count.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.max_parallelism
            .or_else(|| std::thread::available_parallelism().ok())
            .map_or(1, NonZeroUsize::get)
    }

    /// Entry for a graph id; an unknown id gets an empty entry (library fallback).
    #[must_use]
    pub fn entry(&self, graph_id: &str) -> GraphConfigEntry {
        self.entries.get(graph_id).cloned().unwrap_or_default()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_graph_ids_and_entries() {
        let props = StoreProperties::new()
            .with(GRAPH_IDS_KEY, " mapGraph , redbGraph ")
            .with(
                "fedgraph.federation.mapGraph.schema.file",
                "entity.json, edge.json",
            )
            .with("fedgraph.federation.mapGraph.properties.file", "/abs/map.toml")
            .with("fedgraph.federation.redbGraph.schema.id", "sharedSchema")
            .with("fedgraph.federation.redbGraph.properties.id", "sharedProps");

        let config =
            FederationConfig::from_properties(&props, Some(Path::new("/conf"))).expect("config");

        assert_eq!(config.graph_ids, vec!["mapGraph", "redbGraph"]);
        let map = config.entry("mapGraph");
        assert_eq!(
            map.schema_files,
            vec![PathBuf::from("/conf/entity.json"), PathBuf::from("/conf/edge.json")]
        );
        assert_eq!(map.properties_file, Some(PathBuf::from("/abs/map.toml")));

        let redb = config.entry("redbGraph");
        assert_eq!(redb.schema_id.as_deref(), Some("sharedSchema"));
        assert_eq!(redb.properties_id.as_deref(), Some("sharedProps"));
        assert!(redb.schema_files.is_empty());
        assert_eq!(config.write_policy, WriteTargetPolicy::AllGraphs);
    }

    #[test]
    fn invalid_graph_id_is_rejected() {
        let props = StoreProperties::new().with(GRAPH_IDS_KEY, "good,bad-id");
        assert!(FederationConfig::from_properties(&props, None).is_err());
    }

    #[test]
    fn write_policy_and_parallelism() {
        let props = StoreProperties::new()
            .with(WRITE_POLICY_KEY, "reject")
            .with(MAX_PARALLELISM_KEY, "3");
        let config = FederationConfig::from_properties(&props, None).expect("config");
        assert_eq!(config.write_policy, WriteTargetPolicy::RejectAmbiguous);
        assert_eq!(config.parallelism(), 3);

        let bad = StoreProperties::new().with(MAX_PARALLELISM_KEY, "0");
        assert!(FederationConfig::from_properties(&bad, None).is_err());
        let bad = StoreProperties::new().with(WRITE_POLICY_KEY, "some");
        assert!(FederationConfig::from_properties(&bad, None).is_err());
    }

    #[test]
    fn unknown_graph_gets_empty_entry() {
        let config = FederationConfig::new();
        assert!(config.entry("anything").is_empty());
        assert!(config.parallelism() >= 1);
    }

    #[test]
    fn load_resolves_relative_to_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("federation.toml");
        std::fs::write(
            &path,
            r#"
            [fedgraph.federation]
            graphIds = ["g1"]

            [fedgraph.federation.g1.schema]
            file = "schema.json"
            "#,
        )
        .expect("write");

        let config = FederationConfig::load(&path).expect("load");
        assert_eq!(
            config.entry("g1").schema_files,
            vec![dir.path().join("schema.json")]
        );
    }
}
