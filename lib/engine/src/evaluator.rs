use crate::operators::{distinct, project, union, values};
use crate::source::{pattern_variables, ActiveGraph, MemoryQuadSnapshot};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use rdf_federation_common::error::JoinError;
use rdf_federation_common::{
    BindingStreamOutput, Cardinality, JoinResult, LogicalJoinType, Metadata, MetadataAccessor,
    QueryContext, QueryEvaluator,
};
use rdf_federation_model::{Binding, GraphPattern, TriplePattern};
use rdf_federation_physical::join::{JoinAction, JoinEntry, JoinMediator};
use std::sync::Arc;

/// Evaluates graph patterns over a [MemoryQuadSnapshot].
///
/// Every join in the pattern, including the implicit joins between the triple patterns of a basic
/// graph pattern, is handed to the [JoinMediator]. Operations that the join engine creates itself
/// (e.g., bound operations of a bind join) are evaluated by the same evaluator.
#[derive(Debug)]
pub struct MemoryQueryEvaluator {
    snapshot: MemoryQuadSnapshot,
    mediator: Arc<JoinMediator>,
}

impl MemoryQueryEvaluator {
    /// Creates a new [MemoryQueryEvaluator].
    pub fn new(snapshot: MemoryQuadSnapshot, mediator: Arc<JoinMediator>) -> Self {
        Self { snapshot, mediator }
    }

    fn evaluate_in<'a>(
        &'a self,
        pattern: &'a GraphPattern,
        graph: &'a ActiveGraph,
        context: &'a QueryContext,
    ) -> BoxFuture<'a, JoinResult<BindingStreamOutput>> {
        async move {
            match pattern {
                GraphPattern::Bgp { patterns } => self.evaluate_bgp(patterns, graph, context).await,
                GraphPattern::Join { .. } => {
                    let mut children = Vec::new();
                    flatten_join(pattern, &mut children);
                    self.evaluate_join(LogicalJoinType::Inner, children, graph, context)
                        .await
                }
                GraphPattern::LeftJoin {
                    left,
                    right,
                    expression: None,
                } => {
                    let children = vec![left.as_ref(), right.as_ref()];
                    self.evaluate_join(LogicalJoinType::Optional, children, graph, context)
                        .await
                }
                GraphPattern::Union { left, right } => {
                    let left = self.evaluate_in(left, graph, context).await?;
                    let right = self.evaluate_in(right, graph, context).await?;
                    Ok(union(left, right))
                }
                GraphPattern::Project { inner, variables } => {
                    let inner = self.evaluate_in(inner, graph, context).await?;
                    Ok(project(inner, variables.clone()))
                }
                GraphPattern::Distinct { inner } => {
                    let inner = self.evaluate_in(inner, graph, context).await?;
                    Ok(distinct(inner))
                }
                GraphPattern::Graph { name, inner } => {
                    let graph = ActiveGraph::from_pattern(name);
                    self.evaluate_in(inner, &graph, context).await
                }
                GraphPattern::Values {
                    variables,
                    bindings,
                } => Ok(values(variables, bindings)),
                _ => Err(JoinError::Unsupported(format!(
                    "Evaluating the operation {pattern}"
                ))),
            }
        }
        .boxed()
    }

    async fn evaluate_bgp(
        &self,
        patterns: &[TriplePattern],
        graph: &ActiveGraph,
        context: &QueryContext,
    ) -> JoinResult<BindingStreamOutput> {
        match patterns {
            [] => Ok(BindingStreamOutput::from_bindings(
                vec![Binding::empty()],
                Metadata::new(Cardinality::exact(1.0), Vec::new()),
            )),
            [pattern] => Ok(self.scan(pattern, graph)),
            _ => {
                let entries = patterns
                    .iter()
                    .map(|pattern| {
                        let operation = GraphPattern::Bgp {
                            patterns: vec![pattern.clone()],
                        };
                        JoinEntry::new(within_graph(&operation, graph), self.scan(pattern, graph))
                    })
                    .collect();
                self.mediator
                    .join(JoinAction::new(
                        LogicalJoinType::Inner,
                        entries,
                        context.clone(),
                    ))
                    .await
            }
        }
    }

    async fn evaluate_join(
        &self,
        join_type: LogicalJoinType,
        children: Vec<&GraphPattern>,
        graph: &ActiveGraph,
        context: &QueryContext,
    ) -> JoinResult<BindingStreamOutput> {
        let mut entries = Vec::with_capacity(children.len());
        for child in children {
            let output = self.evaluate_in(child, graph, context).await?;
            entries.push(JoinEntry::new(within_graph(child, graph), output));
        }
        self.mediator
            .join(JoinAction::new(join_type, entries, context.clone()))
            .await
    }

    /// Creates a lazy scan of `pattern`.
    ///
    /// Neither the metadata nor the bindings are computed before they are requested.
    fn scan(&self, pattern: &TriplePattern, graph: &ActiveGraph) -> BindingStreamOutput {
        let variables = pattern_variables(pattern, graph);

        let metadata = {
            let snapshot = self.snapshot.clone();
            let pattern = pattern.clone();
            let graph = graph.clone();
            MetadataAccessor::new(async move {
                let count = snapshot.matches(&pattern, &graph).count();
                #[allow(
                    clippy::cast_precision_loss,
                    reason = "Cardinalities are approximate for huge inputs"
                )]
                let cardinality = Cardinality::exact(count as f64);
                Ok(Metadata::new(cardinality, variables))
            })
        };

        let snapshot = self.snapshot.clone();
        let pattern = pattern.clone();
        let graph = graph.clone();
        let bindings = futures::stream::once(async move {
            snapshot.matches(&pattern, &graph).collect::<Vec<_>>()
        })
        .flat_map(|bindings| futures::stream::iter(bindings.into_iter().map(Ok)))
        .boxed();

        BindingStreamOutput::new(bindings, metadata)
    }
}

#[async_trait]
impl QueryEvaluator for MemoryQueryEvaluator {
    async fn evaluate(
        &self,
        operation: &GraphPattern,
        context: QueryContext,
    ) -> JoinResult<BindingStreamOutput> {
        tracing::trace!(%operation, "Evaluating operation");
        self.evaluate_in(operation, &ActiveGraph::DefaultGraph, &context)
            .await
    }
}

/// Collects the operands of nested inner joins.
fn flatten_join<'a>(pattern: &'a GraphPattern, children: &mut Vec<&'a GraphPattern>) {
    match pattern {
        GraphPattern::Join { left, right } => {
            flatten_join(left, children);
            flatten_join(right, children);
        }
        _ => children.push(pattern),
    }
}

/// Returns an operation that evaluates `operation` within `graph`.
///
/// Join entries are re-evaluated outside of their enclosing `GRAPH` pattern, for example, by a bind
/// join. Hence, their operation must carry the active graph.
fn within_graph(operation: &GraphPattern, graph: &ActiveGraph) -> GraphPattern {
    match graph.name_pattern() {
        None => operation.clone(),
        Some(name) => GraphPattern::Graph {
            name,
            inner: Box::new(operation.clone()),
        },
    }
}
