//! # Schema
//!
//! The element schema of a graph: entity groups, edge groups and the type
//! definitions they reference.
//!
//! JSON shape:
//!
//! ```json
//! {
//!   "entities": { "BasicEntity": { "vertex": "vertex.string",
//!                                   "properties": { "count": "prop.integer" } } },
//!   "edges":    { "BasicEdge":   { "source": "vertex.string",
//!                                   "destination": "vertex.string",
//!                                   "directed": "directed.true" } },
//!   "types":    { "vertex.string": { "class": "string" },
//!                 "prop.integer":  { "class": "integer", "aggregateFunction": "sum" } }
//! }
//! ```
//!
//! ## Merging
//!
//! [`Schema::merge`] is the federation's union: groups and types are unioned
//! by name, two definitions of the same name are combined when compatible and
//! rejected with [`FederationError::SchemaMerge`] otherwise. The merge is
//! commutative and associative for well-formed input.
//!
//! [`Schema::overlaid_with`] is the configuration override used when an
//! explicit schema is layered over a library schema: the overlay silently
//! replaces any same-named definition.

use crate::FederationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// =============================================================================
// DEFINITIONS
// =============================================================================

/// Property name -> type name.
pub type PropertyTypes = BTreeMap<String, String>;

/// Definition of an entity group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntityDefinition {
    pub vertex: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: PropertyTypes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Definition of an edge group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEdgeDefinition {
    pub source: String,
    pub destination: String,
    pub directed: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: PropertyTypes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Definition of a named type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefinition {
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialiser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TypeDefinition {
    #[must_use]
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            aggregate_function: None,
            serialiser: None,
            description: None,
        }
    }

    #[must_use]
    pub fn aggregated_by(mut self, function: impl Into<String>) -> Self {
        self.aggregate_function = Some(function.into());
        self
    }
}

// =============================================================================
// SCHEMA
// =============================================================================

/// A graph schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub entities: BTreeMap<String, SchemaEntityDefinition>,
    #[serde(default)]
    pub edges: BTreeMap<String, SchemaEdgeDefinition>,
    #[serde(default)]
    pub types: BTreeMap<String, TypeDefinition>,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entity(mut self, group: impl Into<String>, def: SchemaEntityDefinition) -> Self {
        self.entities.insert(group.into(), def);
        self
    }

    #[must_use]
    pub fn edge(mut self, group: impl Into<String>, def: SchemaEdgeDefinition) -> Self {
        self.edges.insert(group.into(), def);
        self
    }

    #[must_use]
    pub fn type_def(mut self, name: impl Into<String>, def: TypeDefinition) -> Self {
        self.types.insert(name.into(), def);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.edges.is_empty() && self.types.is_empty()
    }

    #[must_use]
    pub fn entity_groups(&self) -> BTreeSet<String> {
        self.entities.keys().cloned().collect()
    }

    #[must_use]
    pub fn edge_groups(&self) -> BTreeSet<String> {
        self.edges.keys().cloned().collect()
    }

    #[must_use]
    pub fn has_group(&self, group: &str) -> bool {
        self.entities.contains_key(group) || self.edges.contains_key(group)
    }

    /// Declared properties of a group, if the group exists.
    #[must_use]
    pub fn group_properties(&self, group: &str) -> Option<&PropertyTypes> {
        self.entities
            .get(group)
            .map(|d| &d.properties)
            .or_else(|| self.edges.get(group).map(|d| &d.properties))
    }

    /// Aggregate function configured for a property of a group.
    #[must_use]
    pub fn aggregate_function(&self, group: &str, property: &str) -> Option<&str> {
        let type_name = self.group_properties(group)?.get(property)?;
        self.types.get(type_name)?.aggregate_function.as_deref()
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    pub fn from_json(text: &str) -> Result<Self, FederationError> {
        serde_json::from_str(text).map_err(|e| FederationError::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, FederationError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FederationError::Serialization(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FederationError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            FederationError::Io(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&text)
    }

    // -------------------------------------------------------------------------
    // Merging
    // -------------------------------------------------------------------------

    /// Union two schemas, rejecting incompatible definitions.
    pub fn merge(&self, other: &Schema) -> Result<Schema, FederationError> {
        Ok(Schema {
            entities: union_by_name(&self.entities, &other.entities, "entity group", merge_entity)?,
            edges: union_by_name(&self.edges, &other.edges, "edge group", merge_edge)?,
            types: union_by_name(&self.types, &other.types, "type", merge_type)?,
        })
    }

    /// Layer `overlay` on top of `self`; same-named definitions are replaced.
    #[must_use]
    pub fn overlaid_with(mut self, overlay: &Schema) -> Schema {
        self.entities
            .extend(overlay.entities.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.edges
            .extend(overlay.edges.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.types
            .extend(overlay.types.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Check that every type a group references is defined.
    ///
    /// Returns the list of problems, empty when the schema is complete.
    #[must_use]
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut require = |group: &str, role: &str, type_name: &str| {
            if !self.types.contains_key(type_name) {
                errors.push(format!(
                    "group {} {} references undefined type {}",
                    group, role, type_name
                ));
            }
        };

        for (group, def) in &self.entities {
            require(group, "vertex", &def.vertex);
            for (prop, type_name) in &def.properties {
                require(group, &format!("property {}", prop), type_name);
            }
        }
        for (group, def) in &self.edges {
            require(group, "source", &def.source);
            require(group, "destination", &def.destination);
            require(group, "directed", &def.directed);
            for (prop, type_name) in &def.properties {
                require(group, &format!("property {}", prop), type_name);
            }
        }
        errors
    }

    pub fn validate(&self) -> Result<(), FederationError> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FederationError::Configuration(format!(
                "Schema is not valid: {}",
                errors.join("; ")
            )))
        }
    }
}

// =============================================================================
// MERGE HELPERS
// =============================================================================

fn union_by_name<V: Clone>(
    left: &BTreeMap<String, V>,
    right: &BTreeMap<String, V>,
    what: &str,
    combine: fn(&V, &V) -> Option<V>,
) -> Result<BTreeMap<String, V>, FederationError> {
    let mut merged = left.clone();
    for (name, def) in right {
        let combined = match merged.get(name) {
            None => def.clone(),
            Some(existing) => combine(existing, def).ok_or_else(|| {
                FederationError::SchemaMerge(format!(
                    "conflicting definitions for {} {}",
                    what, name
                ))
            })?,
        };
        merged.insert(name.clone(), combined);
    }
    Ok(merged)
}

/// Union two property maps; a property typed differently on each side is a conflict.
fn merge_properties(a: &PropertyTypes, b: &PropertyTypes) -> Option<PropertyTypes> {
    let mut merged = a.clone();
    for (name, type_name) in b {
        match merged.get(name) {
            Some(existing) if existing != type_name => return None,
            _ => {
                merged.insert(name.clone(), type_name.clone());
            }
        }
    }
    Some(merged)
}

/// Combine two optional attributes: equal or one-sided values are fine.
fn merge_optional(a: &Option<String>, b: &Option<String>) -> Option<Option<String>> {
    match (a, b) {
        (Some(x), Some(y)) if x != y => None,
        (Some(x), _) | (None, Some(x)) => Some(Some(x.clone())),
        (None, None) => Some(None),
    }
}

/// Descriptions never conflict; the smaller one is kept so the merge commutes.
fn merge_description(a: &Option<String>, b: &Option<String>) -> Option<String> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y).clone()),
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (None, None) => None,
    }
}

fn merge_entity(
    a: &SchemaEntityDefinition,
    b: &SchemaEntityDefinition,
) -> Option<SchemaEntityDefinition> {
    if a.vertex != b.vertex {
        return None;
    }
    Some(SchemaEntityDefinition {
        vertex: a.vertex.clone(),
        properties: merge_properties(&a.properties, &b.properties)?,
        description: merge_description(&a.description, &b.description),
    })
}

fn merge_edge(a: &SchemaEdgeDefinition, b: &SchemaEdgeDefinition) -> Option<SchemaEdgeDefinition> {
    if a.source != b.source || a.destination != b.destination || a.directed != b.directed {
        return None;
    }
    Some(SchemaEdgeDefinition {
        source: a.source.clone(),
        destination: a.destination.clone(),
        directed: a.directed.clone(),
        properties: merge_properties(&a.properties, &b.properties)?,
        description: merge_description(&a.description, &b.description),
    })
}

fn merge_type(a: &TypeDefinition, b: &TypeDefinition) -> Option<TypeDefinition> {
    if a.class != b.class {
        return None;
    }
    Some(TypeDefinition {
        class: a.class.clone(),
        aggregate_function: merge_optional(&a.aggregate_function, &b.aggregate_function)?,
        serialiser: merge_optional(&a.serialiser, &b.serialiser)?,
        description: merge_description(&a.description, &b.description),
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_schema() -> Schema {
        Schema::new()
            .entity(
                "BasicEntity",
                SchemaEntityDefinition {
                    vertex: "vertex.string".into(),
                    properties: [("property1".to_string(), "prop.integer".to_string())].into(),
                    description: None,
                },
            )
            .type_def("vertex.string", TypeDefinition::new("string"))
            .type_def("prop.integer", TypeDefinition::new("integer").aggregated_by("sum"))
    }

    fn edge_schema() -> Schema {
        Schema::new()
            .edge(
                "BasicEdge",
                SchemaEdgeDefinition {
                    source: "vertex.string".into(),
                    destination: "vertex.string".into(),
                    directed: "directed.true".into(),
                    properties: [("property1".to_string(), "prop.integer".to_string())].into(),
                    description: None,
                },
            )
            .type_def("vertex.string", TypeDefinition::new("string"))
            .type_def("directed.true", TypeDefinition::new("boolean"))
            .type_def("prop.integer", TypeDefinition::new("integer").aggregated_by("sum"))
    }

    #[test]
    fn disjoint_groups_are_unioned() {
        let merged = entity_schema().merge(&edge_schema()).expect("merge");
        assert!(merged.entities.contains_key("BasicEntity"));
        assert!(merged.edges.contains_key("BasicEdge"));
        assert_eq!(merged.types.len(), 3);
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn merge_commutes() {
        let ab = entity_schema().merge(&edge_schema()).expect("merge");
        let ba = edge_schema().merge(&entity_schema()).expect("merge");
        assert_eq!(ab, ba);
    }

    #[test]
    fn identical_duplicates_merge() {
        let merged = entity_schema().merge(&entity_schema()).expect("merge");
        assert_eq!(merged, entity_schema());
    }

    #[test]
    fn conflicting_property_types_fail() {
        let mut other = entity_schema();
        if let Some(def) = other.entities.get_mut("BasicEntity") {
            def.properties
                .insert("property1".to_string(), "vertex.string".to_string());
        }
        let err = entity_schema().merge(&other).expect_err("conflict");
        assert!(matches!(err, FederationError::SchemaMerge(_)));
    }

    #[test]
    fn conflicting_type_class_fails() {
        let other = Schema::new().type_def("prop.integer", TypeDefinition::new("long"));
        assert!(entity_schema().merge(&other).is_err());
    }

    #[test]
    fn optional_type_attributes_fill_in() {
        let bare = Schema::new().type_def("prop.integer", TypeDefinition::new("integer"));
        let merged = bare.merge(&entity_schema()).expect("merge");
        assert_eq!(
            merged.aggregate_function("BasicEntity", "property1"),
            Some("sum")
        );
    }

    #[test]
    fn overlay_replaces_without_error() {
        let explicit = Schema::new().type_def("prop.integer", TypeDefinition::new("long"));
        let result = entity_schema().overlaid_with(&explicit);
        assert!(result.entities.contains_key("BasicEntity"));
        assert_eq!(
            result.types.get("prop.integer").map(|t| t.class.as_str()),
            Some("long")
        );
    }

    #[test]
    fn missing_types_fail_validation() {
        let incomplete = Schema::new().edge(
            "BasicEdge",
            SchemaEdgeDefinition {
                source: "vertex.string".into(),
                destination: "vertex.string".into(),
                directed: "directed.true".into(),
                properties: PropertyTypes::new(),
                description: None,
            },
        );
        let errors = incomplete.validation_errors();
        assert_eq!(errors.len(), 3);
        assert!(incomplete.validate().is_err());
    }

    #[test]
    fn json_round_trip() {
        let json = edge_schema().to_json().expect("json");
        assert!(json.contains("aggregateFunction"));
        let back = Schema::from_json(&json).expect("parse");
        assert_eq!(back, edge_schema());
    }
}
