//! # Operation Dispatcher
//!
//! Fans an operation out over constituent graphs and merges what comes back.
//!
//! 1. **Select** target graphs: the operation's graph-id selector, or every
//!    graph. A mutation without a selector follows the [`WriteTargetPolicy`].
//! 2. **Scope** the operation to each target's schema; graphs left with
//!    nothing to do are skipped.
//! 3. **Run** the sub-invocations on a bounded rayon pool and wait for all of
//!    them (barrier) before looking at any result.
//! 4. **Merge** by the operation's declared shape.
//!
//! A failing graph fails the whole call and every iterator already produced
//! is closed, unless the operation is best-effort.

use crate::config::WriteTargetPolicy;
use crate::graph::Graph;
use crate::iterable::{ElementIterator, UnionIterator};
use crate::operation::{Operation, OperationResult, OperationShape, OutputKind};
use crate::registry::RegistrySnapshot;
use crate::{Context, FederationError};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Runs operations against a registry snapshot.
#[derive(Debug)]
pub struct Dispatcher {
    pool: rayon::ThreadPool,
    write_policy: WriteTargetPolicy,
}

impl Dispatcher {
    /// A dispatcher running at most `parallelism` graphs at once.
    pub fn new(
        parallelism: usize,
        write_policy: WriteTargetPolicy,
    ) -> Result<Self, FederationError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism.max(1))
            .thread_name(|i| format!("fedgraph-dispatch-{}", i))
            .build()
            .map_err(|e| FederationError::Configuration(format!("dispatch pool: {}", e)))?;
        Ok(Self { pool, write_policy })
    }

    #[must_use]
    pub fn write_policy(&self) -> WriteTargetPolicy {
        self.write_policy
    }

    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run an output or mutation operation across the snapshot's graphs.
    pub fn dispatch(
        &self,
        snapshot: &RegistrySnapshot,
        operation: &Operation,
        ctx: &Context,
    ) -> Result<OperationResult, FederationError> {
        let shape = operation.shape();
        if shape == OperationShape::Registry {
            return Err(FederationError::UnsupportedOperation(
                operation.name().to_string(),
            ));
        }

        let selected = self.select(snapshot, operation)?;
        if let Some(elements) = operation.elements()
            && let Some(orphan) = elements
                .iter()
                .find(|e| !selected.iter().any(|g| g.schema().has_group(e.group())))
        {
            return Err(FederationError::InvalidElement(format!(
                "no target graph accepts group {}",
                orphan.group()
            )));
        }

        let targets: Vec<(Arc<Graph>, Operation)> = selected
            .into_iter()
            .filter_map(|graph| {
                let scoped = operation.scoped_to(graph.schema())?;
                Some((graph, scoped))
            })
            .collect();

        if targets.is_empty() && !operation.is_known() {
            return Err(FederationError::UnsupportedOperation(
                operation.name().to_string(),
            ));
        }

        tracing::debug!(
            operation = operation.name(),
            job_id = %ctx.job_id,
            graphs = targets.len(),
            "dispatching operation"
        );

        let results: Vec<(String, Result<OperationResult, FederationError>)> =
            self.pool.install(|| {
                targets
                    .par_iter()
                    .map(|(graph, scoped)| {
                        (graph.graph_id().to_string(), graph.execute(scoped, ctx))
                    })
                    .collect()
            });

        collect_results(operation, shape, results)
    }

    fn select(
        &self,
        snapshot: &RegistrySnapshot,
        operation: &Operation,
    ) -> Result<Vec<Arc<Graph>>, FederationError> {
        match &operation.options().graph_ids {
            // A graph named twice still runs the operation once.
            Some(ids) => {
                let mut seen = BTreeSet::new();
                ids.iter()
                    .filter(|id| seen.insert(id.as_str()))
                    .map(|id| {
                        snapshot.get(id).cloned().ok_or_else(|| {
                            FederationError::Configuration(format!(
                                "graphId {} is not in the federation",
                                id
                            ))
                        })
                    })
                    .collect()
            }
            None if operation.shape() == OperationShape::Mutation
                && self.write_policy == WriteTargetPolicy::RejectAmbiguous =>
            {
                Err(FederationError::Configuration(format!(
                    "{} names no target graphs and ambiguous writes are rejected",
                    operation.name()
                )))
            }
            None => Ok(snapshot.graphs().cloned().collect()),
        }
    }
}

/// Apply the failure policy, then merge.
fn collect_results(
    operation: &Operation,
    shape: OperationShape,
    results: Vec<(String, Result<OperationResult, FederationError>)>,
) -> Result<OperationResult, FederationError> {
    let attempted = results.len();
    let mut unsupported = 0;
    let mut failure: Option<(String, FederationError)> = None;
    let mut produced = Vec::with_capacity(attempted);

    for (graph_id, result) in results {
        match result {
            Ok(output) => produced.push(output),
            Err(err) => {
                if matches!(err, FederationError::UnsupportedOperation(_)) {
                    unsupported += 1;
                }
                if operation.options().best_effort {
                    tracing::warn!(
                        graph_id = %graph_id,
                        operation = operation.name(),
                        error = %err,
                        "skipping failed graph"
                    );
                } else if failure.is_none() {
                    failure = Some((graph_id, err));
                }
            }
        }
    }

    if attempted > 0 && unsupported == attempted {
        close_all(&mut produced);
        return Err(FederationError::UnsupportedOperation(
            operation.name().to_string(),
        ));
    }
    if let Some((graph_id, err)) = failure {
        close_all(&mut produced);
        return Err(FederationError::dispatch(&graph_id, operation.name(), err));
    }

    merge(shape, produced)
}

fn close_all(results: &mut [OperationResult]) {
    for result in results {
        result.close();
    }
}

fn merge(
    shape: OperationShape,
    produced: Vec<OperationResult>,
) -> Result<OperationResult, FederationError> {
    match shape {
        OperationShape::Mutation | OperationShape::Registry => Ok(OperationResult::Done),
        OperationShape::Output(OutputKind::Elements) => {
            let mut parts: Vec<ElementIterator> = Vec::with_capacity(produced.len());
            let mut rest = produced.into_iter();
            while let Some(result) = rest.next() {
                match result {
                    OperationResult::Elements(iter) => parts.push(iter),
                    other => {
                        drop(UnionIterator::new(parts));
                        for mut remaining in rest {
                            remaining.close();
                        }
                        return Err(FederationError::Serialization(format!(
                            "expected Elements result, got {:?}",
                            other
                        )));
                    }
                }
            }
            Ok(OperationResult::Elements(Box::new(UnionIterator::new(parts))))
        }
        OperationShape::Output(OutputKind::Count) => produced
            .into_iter()
            .try_fold(0u64, |total, result| {
                Ok(total.saturating_add(result.into_count()?))
            })
            .map(OperationResult::Count),
        OperationShape::Output(OutputKind::GraphIds) => produced
            .into_iter()
            .try_fold(BTreeSet::new(), |mut ids, result| {
                ids.extend(result.into_graph_ids()?);
                Ok(ids)
            })
            .map(OperationResult::GraphIds),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterable::{CloseableIterator, VecIterator};
    use crate::User;

    fn elements(n: u32) -> OperationResult {
        let items = (0..n)
            .map(|i| crate::element::Element::entity("E", i.to_string()))
            .collect();
        OperationResult::Elements(Box::new(VecIterator::new(items)))
    }

    #[test]
    fn counts_are_summed() {
        let merged = merge(
            OperationShape::Output(OutputKind::Count),
            vec![OperationResult::Count(2), OperationResult::Count(3)],
        )
        .and_then(OperationResult::into_count)
        .expect("count");
        assert_eq!(merged, 5);
    }

    #[test]
    fn element_results_are_unioned() {
        let mut merged = merge(
            OperationShape::Output(OutputKind::Elements),
            vec![elements(2), elements(0), elements(1)],
        )
        .and_then(OperationResult::into_elements)
        .expect("elements");
        assert_eq!(merged.by_ref().count(), 3);
        merged.close();
    }

    #[test]
    fn graph_ids_are_unioned() {
        let merged = merge(
            OperationShape::Output(OutputKind::GraphIds),
            vec![
                OperationResult::GraphIds(["a".to_string()].into()),
                OperationResult::GraphIds(["a".to_string(), "b".to_string()].into()),
            ],
        )
        .and_then(OperationResult::into_graph_ids)
        .expect("ids");
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn one_failure_fails_the_call() {
        let op = Operation::get_all_elements();
        let err = collect_results(
            &op,
            op.shape(),
            vec![
                ("a".to_string(), Ok(elements(1))),
                ("b".to_string(), Err(FederationError::Io("gone".to_string()))),
            ],
        )
        .expect_err("failure");
        assert!(matches!(err, FederationError::Dispatch { ref graph_id, .. } if graph_id == "b"));
    }

    #[test]
    fn best_effort_skips_failures() {
        let op = Operation::get_all_elements().with_options(
            crate::operation::OperationOptions::default().best_effort(),
        );
        let merged = collect_results(
            &op,
            op.shape(),
            vec![
                ("a".to_string(), Ok(elements(2))),
                ("b".to_string(), Err(FederationError::Io("gone".to_string()))),
            ],
        )
        .and_then(OperationResult::into_elements)
        .expect("best effort");
        assert_eq!(merged.count(), 2);
    }

    #[test]
    fn unsupported_everywhere_is_unsupported() {
        let op = Operation::CountAllElements {
            options: Default::default(),
        };
        let err = collect_results(
            &op,
            op.shape(),
            vec![(
                "a".to_string(),
                Err(FederationError::UnsupportedOperation("CountAllElements".into())),
            )],
        )
        .expect_err("unsupported");
        assert!(matches!(err, FederationError::UnsupportedOperation(_)));
    }

    #[test]
    fn registry_operations_are_not_dispatched() {
        let dispatcher = Dispatcher::new(2, WriteTargetPolicy::AllGraphs).expect("pool");
        let snapshot = RegistrySnapshot::default();
        let ctx = Context::new(User::default(), "job");
        assert!(dispatcher
            .dispatch(&snapshot, &Operation::GetAllGraphIds, &ctx)
            .is_err());
    }

    #[test]
    fn reject_policy_needs_a_selector() {
        let dispatcher = Dispatcher::new(1, WriteTargetPolicy::RejectAmbiguous).expect("pool");
        let snapshot = RegistrySnapshot::default();
        let ctx = Context::new(User::default(), "job");
        let err = dispatcher
            .dispatch(&snapshot, &Operation::add_elements(vec![]), &ctx)
            .expect_err("ambiguous");
        assert!(matches!(err, FederationError::Configuration(_)));
    }

    #[test]
    fn empty_federation_reads_nothing() {
        let dispatcher = Dispatcher::new(1, WriteTargetPolicy::AllGraphs).expect("pool");
        let snapshot = RegistrySnapshot::default();
        let ctx = Context::new(User::default(), "job");
        let result = dispatcher
            .dispatch(&snapshot, &Operation::get_all_elements(), &ctx)
            .and_then(OperationResult::into_elements)
            .expect("read");
        assert_eq!(result.count(), 0);
    }
}
