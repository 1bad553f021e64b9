//! # Elements
//!
//! Entities and edges, the property values they carry, and the schema-driven
//! rules shared by every backend:
//! - validation of an element against a schema
//! - element identity (`ElementKey`) used to collapse duplicates
//! - ingest aggregation of properties by each type's aggregate function
//! - group-based `View` filtering

use crate::schema::Schema;
use crate::FederationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// PROPERTY VALUES
// =============================================================================

/// A property value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Integer(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Boolean(v)
    }
}

/// Property name -> value.
pub type Properties = BTreeMap<String, PropertyValue>;

// =============================================================================
// ELEMENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub group: String,
    pub vertex: String,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub group: String,
    pub source: String,
    pub destination: String,
    pub directed: bool,
    #[serde(default)]
    pub properties: Properties,
}

/// A graph element.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Element {
    Entity(Entity),
    Edge(Edge),
}

/// Identity of an element, ignoring its properties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ElementKey {
    Entity {
        group: String,
        vertex: String,
    },
    Edge {
        group: String,
        source: String,
        destination: String,
        directed: bool,
    },
}

impl Element {
    #[must_use]
    pub fn entity(group: impl Into<String>, vertex: impl Into<String>) -> Self {
        Element::Entity(Entity {
            group: group.into(),
            vertex: vertex.into(),
            properties: Properties::new(),
        })
    }

    #[must_use]
    pub fn edge(
        group: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
        directed: bool,
    ) -> Self {
        Element::Edge(Edge {
            group: group.into(),
            source: source.into(),
            destination: destination.into(),
            directed,
            properties: Properties::new(),
        })
    }

    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties_mut().insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn group(&self) -> &str {
        match self {
            Element::Entity(e) => &e.group,
            Element::Edge(e) => &e.group,
        }
    }

    #[must_use]
    pub fn properties(&self) -> &Properties {
        match self {
            Element::Entity(e) => &e.properties,
            Element::Edge(e) => &e.properties,
        }
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        match self {
            Element::Entity(e) => &mut e.properties,
            Element::Edge(e) => &mut e.properties,
        }
    }

    #[must_use]
    pub fn key(&self) -> ElementKey {
        match self {
            Element::Entity(e) => ElementKey::Entity {
                group: e.group.clone(),
                vertex: e.vertex.clone(),
            },
            Element::Edge(e) => ElementKey::Edge {
                group: e.group.clone(),
                source: e.source.clone(),
                destination: e.destination.clone(),
                directed: e.directed,
            },
        }
    }

    /// True if the element touches the given vertex.
    #[must_use]
    pub fn touches(&self, vertex: &str) -> bool {
        match self {
            Element::Entity(e) => e.vertex == vertex,
            Element::Edge(e) => e.source == vertex || e.destination == vertex,
        }
    }

    /// Check the element against a schema.
    ///
    /// The group must exist with the right element kind and every property
    /// must be declared on that group.
    pub fn validate(&self, schema: &Schema) -> Result<(), FederationError> {
        let declared = match self {
            Element::Entity(e) => schema.entities.get(&e.group).map(|d| &d.properties),
            Element::Edge(e) => schema.edges.get(&e.group).map(|d| &d.properties),
        }
        .ok_or_else(|| {
            FederationError::InvalidElement(format!("group {} is not in the schema", self.group()))
        })?;

        if let Some(unknown) = self.properties().keys().find(|p| !declared.contains_key(*p)) {
            return Err(FederationError::InvalidElement(format!(
                "property {} is not declared on group {}",
                unknown,
                self.group()
            )));
        }
        Ok(())
    }

    /// Fold `incoming` into `self` using the schema's aggregate functions.
    ///
    /// Both elements must share the same key. Properties without an aggregate
    /// function, or whose values cannot be aggregated, take the incoming value.
    pub fn aggregate(&mut self, incoming: &Element, schema: &Schema) {
        let group = incoming.group().to_string();
        let props = self.properties_mut();
        for (name, value) in incoming.properties() {
            let combined = match (props.get(name), schema.aggregate_function(&group, name)) {
                (Some(existing), Some(function)) => {
                    aggregate_values(function, existing, value).unwrap_or_else(|| value.clone())
                }
                _ => value.clone(),
            };
            props.insert(name.clone(), combined);
        }
    }
}

fn aggregate_values(
    function: &str,
    current: &PropertyValue,
    incoming: &PropertyValue,
) -> Option<PropertyValue> {
    use PropertyValue::{Boolean, Integer, String as Str};
    match (function, current, incoming) {
        ("sum", Integer(a), Integer(b)) => Some(Integer(a.saturating_add(*b))),
        ("min", a, b) if std::mem::discriminant(a) == std::mem::discriminant(b) => {
            Some(a.min(b).clone())
        }
        ("max", a, b) if std::mem::discriminant(a) == std::mem::discriminant(b) => {
            Some(a.max(b).clone())
        }
        ("concat", Str(a), Str(b)) => Some(Str(format!("{},{}", a, b))),
        ("and", Boolean(a), Boolean(b)) => Some(Boolean(*a && *b)),
        ("or", Boolean(a), Boolean(b)) => Some(Boolean(*a || *b)),
        _ => None,
    }
}

// =============================================================================
// VIEW
// =============================================================================

/// Group filter for read operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    #[serde(default)]
    pub entities: BTreeSet<String>,
    #[serde(default)]
    pub edges: BTreeSet<String>,
}

impl View {
    /// A view selecting every group of a schema.
    #[must_use]
    pub fn of_schema(schema: &Schema) -> Self {
        Self {
            entities: schema.entity_groups(),
            edges: schema.edge_groups(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.edges.is_empty()
    }

    #[must_use]
    pub fn matches(&self, element: &Element) -> bool {
        match element {
            Element::Entity(e) => self.entities.contains(&e.group),
            Element::Edge(e) => self.edges.contains(&e.group),
        }
    }

    /// Keep only the groups the schema defines.
    #[must_use]
    pub fn restricted_to(&self, schema: &Schema) -> View {
        View {
            entities: self
                .entities
                .iter()
                .filter(|g| schema.entities.contains_key(*g))
                .cloned()
                .collect(),
            edges: self
                .edges
                .iter()
                .filter(|g| schema.edges.contains_key(*g))
                .cloned()
                .collect(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaEdgeDefinition, TypeDefinition};

    fn schema() -> Schema {
        Schema::new()
            .edge(
                "BasicEdge",
                SchemaEdgeDefinition {
                    source: "vertex.string".into(),
                    destination: "vertex.string".into(),
                    directed: "directed.true".into(),
                    properties: [
                        ("count".to_string(), "prop.count".to_string()),
                        ("label".to_string(), "prop.string".to_string()),
                    ]
                    .into(),
                    description: None,
                },
            )
            .type_def("vertex.string", TypeDefinition::new("string"))
            .type_def("directed.true", TypeDefinition::new("boolean"))
            .type_def("prop.count", TypeDefinition::new("integer").aggregated_by("sum"))
            .type_def("prop.string", TypeDefinition::new("string"))
    }

    #[test]
    fn key_ignores_properties() {
        let a = Element::edge("BasicEdge", "a", "b", true).property("count", 1);
        let b = Element::edge("BasicEdge", "a", "b", true).property("count", 7);
        assert_eq!(a.key(), b.key());
        assert_ne!(a, b);
    }

    #[test]
    fn validation_checks_group_and_properties() {
        let schema = schema();
        assert!(Element::edge("BasicEdge", "a", "b", true)
            .property("count", 1)
            .validate(&schema)
            .is_ok());
        assert!(Element::entity("BasicEdge", "a").validate(&schema).is_err());
        assert!(Element::edge("Unknown", "a", "b", true).validate(&schema).is_err());
        assert!(Element::edge("BasicEdge", "a", "b", true)
            .property("nope", 1)
            .validate(&schema)
            .is_err());
    }

    #[test]
    fn aggregation_sums_and_replaces() {
        let schema = schema();
        let mut stored = Element::edge("BasicEdge", "a", "b", true)
            .property("count", 2)
            .property("label", "old");
        let incoming = Element::edge("BasicEdge", "a", "b", true)
            .property("count", 3)
            .property("label", "new");

        stored.aggregate(&incoming, &schema);

        assert_eq!(stored.properties().get("count"), Some(&PropertyValue::Integer(5)));
        assert_eq!(stored.properties().get("label"), Some(&PropertyValue::from("new")));
    }

    #[test]
    fn aggregate_functions() {
        use PropertyValue::Integer;
        assert_eq!(aggregate_values("min", &Integer(3), &Integer(1)), Some(Integer(1)));
        assert_eq!(aggregate_values("max", &Integer(3), &Integer(1)), Some(Integer(3)));
        assert_eq!(
            aggregate_values("concat", &"a".into(), &"b".into()),
            Some(PropertyValue::from("a,b"))
        );
        assert_eq!(aggregate_values("sum", &Integer(i64::MAX), &Integer(1)), Some(Integer(i64::MAX)));
        assert_eq!(aggregate_values("sum", &Integer(1), &"x".into()), None);
    }

    #[test]
    fn view_restriction_and_matching() {
        let view = View {
            entities: ["Missing".to_string()].into(),
            edges: ["BasicEdge".to_string()].into(),
        };
        let restricted = view.restricted_to(&schema());
        assert!(restricted.entities.is_empty());
        assert!(restricted.matches(&Element::edge("BasicEdge", "a", "b", true)));
        assert!(!restricted.matches(&Element::entity("Missing", "a")));
    }

    #[test]
    fn touches_vertex() {
        let edge = Element::edge("BasicEdge", "a", "b", true);
        assert!(edge.touches("a"));
        assert!(edge.touches("b"));
        assert!(!edge.touches("c"));
    }
}
