//! # Operations
//!
//! Structured operations executed against the federation.
//!
//! Every operation declares its [`OperationShape`]. The dispatcher routes and
//! merges purely on that shape:
//! - `Output(kind)`: run on every selected graph, merge results by `kind`
//! - `Mutation`: run on the graphs picked by the graph-id selector
//! - `Registry`: served by the federation itself against its registry

use crate::element::{Element, View};
use crate::iterable::{CloseableIterator, ElementIterator};
use crate::properties::StoreProperties;
use crate::schema::Schema;
use crate::FederationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// SHAPES & OPTIONS
// =============================================================================

/// How the results of an output operation are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Lazily unioned, closeable element iterators.
    Elements,
    /// Counts summed across graphs.
    Count,
    /// Graph id sets unioned.
    GraphIds,
}

/// Declared shape of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationShape {
    Output(OutputKind),
    Mutation,
    Registry,
}

/// Per-operation routing options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOptions {
    /// Restrict execution to these graphs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_ids: Option<Vec<String>>,
    /// Skip failing graphs instead of failing the whole call.
    #[serde(default)]
    pub best_effort: bool,
}

impl OperationOptions {
    #[must_use]
    pub fn on_graphs<I, S>(graph_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            graph_ids: Some(graph_ids.into_iter().map(Into::into).collect()),
            best_effort: false,
        }
    }

    #[must_use]
    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }
}

static NO_OPTIONS: OperationOptions = OperationOptions {
    graph_ids: None,
    best_effort: false,
};

// =============================================================================
// OPERATION
// =============================================================================

/// An operation against the federated graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation")]
pub enum Operation {
    AddElements {
        elements: Vec<Element>,
        #[serde(default)]
        options: OperationOptions,
    },
    GetAllElements {
        #[serde(default)]
        view: Option<View>,
        #[serde(default)]
        options: OperationOptions,
    },
    /// Elements touching any of the seed vertices.
    GetElements {
        seeds: Vec<String>,
        #[serde(default)]
        view: Option<View>,
        #[serde(default)]
        options: OperationOptions,
    },
    CountAllElements {
        #[serde(default)]
        options: OperationOptions,
    },
    GetAllGraphIds,
    #[serde(rename_all = "camelCase")]
    AddGraph {
        graph_id: String,
        schema: Schema,
        properties: StoreProperties,
    },
    #[serde(rename_all = "camelCase")]
    RemoveGraph { graph_id: String },
    /// An operation this build has no handler for.
    Other {
        name: String,
        #[serde(default)]
        options: OperationOptions,
    },
}

impl Operation {
    #[must_use]
    pub fn add_elements(elements: Vec<Element>) -> Self {
        Operation::AddElements {
            elements,
            options: OperationOptions::default(),
        }
    }

    #[must_use]
    pub fn get_all_elements() -> Self {
        Operation::GetAllElements {
            view: None,
            options: OperationOptions::default(),
        }
    }

    #[must_use]
    pub fn get_elements<I, S>(seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Operation::GetElements {
            seeds: seeds.into_iter().map(Into::into).collect(),
            view: None,
            options: OperationOptions::default(),
        }
    }

    /// Replace the routing options (registry operations carry none).
    #[must_use]
    pub fn with_options(mut self, new_options: OperationOptions) -> Self {
        match &mut self {
            Operation::AddElements { options, .. }
            | Operation::GetAllElements { options, .. }
            | Operation::GetElements { options, .. }
            | Operation::CountAllElements { options }
            | Operation::Other { options, .. } => *options = new_options,
            Operation::GetAllGraphIds
            | Operation::AddGraph { .. }
            | Operation::RemoveGraph { .. } => {}
        }
        self
    }

    /// Attach a group view to a read operation.
    #[must_use]
    pub fn with_view(mut self, new_view: View) -> Self {
        if let Operation::GetAllElements { view, .. } | Operation::GetElements { view, .. } =
            &mut self
        {
            *view = Some(new_view);
        }
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Operation::AddElements { .. } => "AddElements",
            Operation::GetAllElements { .. } => "GetAllElements",
            Operation::GetElements { .. } => "GetElements",
            Operation::CountAllElements { .. } => "CountAllElements",
            Operation::GetAllGraphIds => "GetAllGraphIds",
            Operation::AddGraph { .. } => "AddGraph",
            Operation::RemoveGraph { .. } => "RemoveGraph",
            Operation::Other { name, .. } => name,
        }
    }

    #[must_use]
    pub fn shape(&self) -> OperationShape {
        match self {
            Operation::AddElements { .. } => OperationShape::Mutation,
            Operation::GetAllElements { .. }
            | Operation::GetElements { .. }
            | Operation::Other { .. } => OperationShape::Output(OutputKind::Elements),
            Operation::CountAllElements { .. } => OperationShape::Output(OutputKind::Count),
            Operation::GetAllGraphIds | Operation::AddGraph { .. } | Operation::RemoveGraph { .. } => {
                OperationShape::Registry
            }
        }
    }

    /// False for operations no handler in this build recognises.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Operation::Other { .. })
    }

    #[must_use]
    pub fn options(&self) -> &OperationOptions {
        match self {
            Operation::AddElements { options, .. }
            | Operation::GetAllElements { options, .. }
            | Operation::GetElements { options, .. }
            | Operation::CountAllElements { options }
            | Operation::Other { options, .. } => options,
            Operation::GetAllGraphIds
            | Operation::AddGraph { .. }
            | Operation::RemoveGraph { .. } => &NO_OPTIONS,
        }
    }

    /// Elements carried by a write operation.
    #[must_use]
    pub fn elements(&self) -> Option<&[Element]> {
        match self {
            Operation::AddElements { elements, .. } => Some(elements),
            _ => None,
        }
    }

    /// The part of this operation a graph with `schema` can service.
    ///
    /// Elements and view groups the schema does not define are dropped.
    /// `None` means the graph has nothing to do and is skipped.
    #[must_use]
    pub fn scoped_to(&self, schema: &Schema) -> Option<Operation> {
        match self {
            Operation::AddElements { elements, options } => {
                let kept: Vec<Element> = elements
                    .iter()
                    .filter(|e| schema.has_group(e.group()))
                    .cloned()
                    .collect();
                (!kept.is_empty()).then(|| Operation::AddElements {
                    elements: kept,
                    options: options.clone(),
                })
            }
            Operation::GetAllElements { view, options } => {
                let view = scope_view(view.as_ref(), schema)?;
                Some(Operation::GetAllElements {
                    view,
                    options: options.clone(),
                })
            }
            Operation::GetElements {
                seeds,
                view,
                options,
            } => {
                let view = scope_view(view.as_ref(), schema)?;
                Some(Operation::GetElements {
                    seeds: seeds.clone(),
                    view,
                    options: options.clone(),
                })
            }
            other => Some(other.clone()),
        }
    }
}

/// `None` when a view is present but none of its groups exist in the schema.
fn scope_view(view: Option<&View>, schema: &Schema) -> Option<Option<View>> {
    match view {
        None => Some(None),
        Some(view) => {
            let restricted = view.restricted_to(schema);
            (!restricted.is_empty()).then_some(Some(restricted))
        }
    }
}

// =============================================================================
// RESULT
// =============================================================================

/// Result of executing an operation.
pub enum OperationResult {
    Elements(ElementIterator),
    Count(u64),
    GraphIds(BTreeSet<String>),
    Done,
}

impl std::fmt::Debug for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationResult::Elements(_) => f.write_str("Elements(..)"),
            OperationResult::Count(n) => f.debug_tuple("Count").field(n).finish(),
            OperationResult::GraphIds(ids) => f.debug_tuple("GraphIds").field(ids).finish(),
            OperationResult::Done => f.write_str("Done"),
        }
    }
}

impl OperationResult {
    pub fn into_elements(self) -> Result<ElementIterator, FederationError> {
        match self {
            OperationResult::Elements(iter) => Ok(iter),
            other => Err(unexpected("Elements", &other)),
        }
    }

    pub fn into_count(self) -> Result<u64, FederationError> {
        match self {
            OperationResult::Count(n) => Ok(n),
            other => Err(unexpected("Count", &other)),
        }
    }

    pub fn into_graph_ids(self) -> Result<BTreeSet<String>, FederationError> {
        match self {
            OperationResult::GraphIds(ids) => Ok(ids),
            other => Err(unexpected("GraphIds", &other)),
        }
    }

    /// Release any resources held by the result.
    pub fn close(&mut self) {
        if let OperationResult::Elements(iter) = self {
            iter.close();
        }
    }
}

fn unexpected(expected: &str, actual: &OperationResult) -> FederationError {
    FederationError::Serialization(format!("expected {} result, got {:?}", expected, actual))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
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
    fn shapes_are_declared_per_operation() {
        assert_eq!(Operation::add_elements(vec![]).shape(), OperationShape::Mutation);
        assert_eq!(
            Operation::get_all_elements().shape(),
            OperationShape::Output(OutputKind::Elements)
        );
        assert_eq!(
            Operation::CountAllElements {
                options: OperationOptions::default()
            }
            .shape(),
            OperationShape::Output(OutputKind::Count)
        );
        assert_eq!(Operation::GetAllGraphIds.shape(), OperationShape::Registry);
    }

    #[test]
    fn scoping_drops_unknown_elements() {
        let op = Operation::add_elements(vec![
            Element::entity("BasicEntity", "a"),
            Element::edge("BasicEdge", "a", "b", true),
        ]);
        let scoped = op.scoped_to(&schema()).expect("something to do");
        assert_eq!(scoped.elements().map(<[Element]>::len), Some(1));

        let only_edges = Operation::add_elements(vec![Element::edge("BasicEdge", "a", "b", true)]);
        assert!(only_edges.scoped_to(&schema()).is_none());
    }

    #[test]
    fn scoping_restricts_views() {
        let view = View {
            entities: ["BasicEntity".to_string()].into(),
            edges: ["BasicEdge".to_string()].into(),
        };
        let scoped = Operation::get_all_elements()
            .with_view(view)
            .scoped_to(&schema())
            .expect("entity group survives");
        match scoped {
            Operation::GetAllElements { view: Some(v), .. } => {
                assert!(v.edges.is_empty());
                assert_eq!(v.entities.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }

        let edges_only = View {
            entities: BTreeSet::new(),
            edges: ["BasicEdge".to_string()].into(),
        };
        assert!(Operation::get_all_elements()
            .with_view(edges_only)
            .scoped_to(&schema())
            .is_none());
    }

    #[test]
    fn options_round_trip_through_json() {
        let op = Operation::get_all_elements()
            .with_options(OperationOptions::on_graphs(["g1"]).best_effort());
        let json = serde_json::to_string(&op).expect("json");
        assert!(json.contains("\"operation\":\"GetAllElements\""));
        assert!(json.contains("graphIds"));
        let back: Operation = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, op);
        assert!(back.options().best_effort);
    }

    #[test]
    fn unknown_operations_are_flagged() {
        let op = Operation::Other {
            name: "GetWalks".into(),
            options: OperationOptions::default(),
        };
        assert!(!op.is_known());
        assert_eq!(op.name(), "GetWalks");
    }

    #[test]
    fn result_accessors() {
        assert_eq!(OperationResult::Count(3).into_count().expect("count"), 3);
        assert!(OperationResult::Done.into_count().is_err());
    }
}
