use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt};
use rdf_federation_common::error::JoinError;
use rdf_federation_common::{
    BindingStream, BindingStreamOutput, Cardinality, JoinResult, LogicalJoinType, Metadata,
    MetadataAccessor, QueryContext, QueryEvaluator,
};
use rdf_federation_model::{
    Binding, GraphPattern, GroundTerm, Literal, NamedNode, NamedNodePattern, Term, Variable,
};
use rdf_federation_physical::join::{JoinAction, JoinEntry, JoinMediator, PhysicalJoin};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

pub fn var(name: &str) -> Variable {
    Variable::new_unchecked(name)
}

pub fn vars(names: &[&str]) -> Vec<Variable> {
    names.iter().map(|n| var(n)).collect()
}

/// Creates a binding with simple literal values, e.g., `binding(&[("a", "1")])`.
/// The only named graph of the [ValuesEvaluator].
pub fn graph_name() -> NamedNode {
    NamedNode::new_unchecked("http://example.com/graph")
}

pub fn binding(values: &[(&str, &str)]) -> Binding {
    values
        .iter()
        .map(|(name, value)| (var(name), Term::from(Literal::new_simple_literal(*value))))
        .collect()
}

/// Observes what happens to the binding stream and the metadata of a test entry.
#[derive(Clone, Debug, Default)]
pub struct EntryProbe {
    closed: Arc<AtomicBool>,
    polls: Arc<AtomicUsize>,
    metadata_resolutions: Arc<AtomicUsize>,
}

impl EntryProbe {
    /// Whether the binding stream has been dropped.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn metadata_resolutions(&self) -> usize {
        self.metadata_resolutions.load(Ordering::SeqCst)
    }
}

/// A binding stream that reports to an [EntryProbe].
struct ProbedStream {
    inner: BindingStream,
    probe: EntryProbe,
}

impl Stream for ProbedStream {
    type Item = JoinResult<Binding>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.probe.polls.fetch_add(1, Ordering::SeqCst);
        this.inner.poll_next_unpin(cx)
    }
}

impl Drop for ProbedStream {
    fn drop(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}

/// Builds a [JoinEntry] from materialized bindings.
pub struct TestEntry {
    variables: Vec<Variable>,
    bindings: Vec<Binding>,
    cardinality: Option<Cardinality>,
    undefs: Option<bool>,
    fail_after: Option<usize>,
    operation: Option<GraphPattern>,
}

impl TestEntry {
    pub fn new(variables: &[&str], bindings: Vec<Binding>) -> Self {
        Self {
            variables: vars(variables),
            bindings,
            cardinality: None,
            undefs: None,
            fail_after: None,
            operation: None,
        }
    }

    /// Overrides the exact cardinality derived from the bindings.
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    pub fn with_undefs(mut self, undefs: bool) -> Self {
        self.undefs = Some(undefs);
        self
    }

    /// Emits an error after the first `count` bindings.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Overrides the VALUES operation derived from the bindings.
    pub fn with_operation(mut self, operation: GraphPattern) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn metadata(&self) -> Metadata {
        #[allow(clippy::cast_precision_loss, reason = "Test data is small")]
        let cardinality = self
            .cardinality
            .unwrap_or_else(|| Cardinality::exact(self.bindings.len() as f64));
        let undefs = self.undefs.unwrap_or_else(|| {
            self.bindings
                .iter()
                .any(|b| self.variables.iter().any(|v| !b.contains(v)))
        });
        Metadata::new(cardinality, self.variables.clone()).with_undefs(undefs)
    }

    pub fn build(self) -> (JoinEntry, EntryProbe) {
        let probe = EntryProbe::default();
        let metadata = self.metadata();
        let operation = self
            .operation
            .clone()
            .unwrap_or_else(|| values_pattern(&self.variables, &self.bindings));

        let mut items = self.bindings.into_iter().map(Ok).collect::<Vec<_>>();
        if let Some(count) = self.fail_after {
            items.truncate(count);
            items.push(Err(JoinError::external("The source failed.")));
        }
        let bindings = ProbedStream {
            inner: Box::pin(futures::stream::iter(items)),
            probe: probe.clone(),
        };

        let resolutions = Arc::clone(&probe.metadata_resolutions);
        let accessor = MetadataAccessor::new(async move {
            resolutions.fetch_add(1, Ordering::SeqCst);
            Ok(metadata)
        });

        let output = BindingStreamOutput::new(Box::pin(bindings), accessor);
        let entry = JoinEntry::new(operation, output);
        (entry, probe)
    }
}

pub fn values_pattern(variables: &[Variable], bindings: &[Binding]) -> GraphPattern {
    GraphPattern::Values {
        variables: variables.to_vec(),
        bindings: bindings
            .iter()
            .map(|b| {
                variables
                    .iter()
                    .map(|v| match b.get(v) {
                        Some(Term::NamedNode(n)) => Some(GroundTerm::NamedNode(n.clone())),
                        Some(Term::Literal(l)) => Some(GroundTerm::Literal(l.clone())),
                        _ => None,
                    })
                    .collect()
            })
            .collect(),
    }
}

/// Records an evaluation that has been requested from the [ValuesEvaluator].
#[derive(Clone, Debug)]
pub struct RecordedEvaluation {
    pub operation: GraphPattern,
    pub bound_binding: Option<Binding>,
    pub left_metadata: Option<Arc<Metadata>>,
    pub right_metadatas: usize,
}

/// Evaluates VALUES operations and binary joins of them.
///
/// A `GRAPH` operation places its VALUES in the single named graph [graph_name].
#[derive(Debug)]
pub struct ValuesEvaluator {
    mediator: Arc<JoinMediator>,
    evaluations: Mutex<Vec<RecordedEvaluation>>,
}

impl ValuesEvaluator {
    pub fn new(mediator: Arc<JoinMediator>) -> Arc<Self> {
        Arc::new(Self {
            mediator,
            evaluations: Mutex::new(Vec::new()),
        })
    }

    pub fn evaluations(&self) -> Vec<RecordedEvaluation> {
        self.evaluations.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryEvaluator for ValuesEvaluator {
    async fn evaluate(
        &self,
        operation: &GraphPattern,
        context: QueryContext,
    ) -> JoinResult<BindingStreamOutput> {
        self.evaluations.lock().unwrap().push(RecordedEvaluation {
            operation: operation.clone(),
            bound_binding: context.bound_binding().cloned(),
            left_metadata: context.left_metadata().cloned(),
            right_metadatas: context.right_metadatas().map_or(0, <[_]>::len),
        });

        match operation {
            GraphPattern::Values {
                variables,
                bindings,
            } => {
                let bindings = bindings
                    .iter()
                    .map(|row| {
                        variables
                            .iter()
                            .zip(row)
                            .filter_map(|(v, value)| match value {
                                Some(GroundTerm::NamedNode(n)) => {
                                    Some((v.clone(), Term::from(n.clone())))
                                }
                                Some(GroundTerm::Literal(l)) => {
                                    Some((v.clone(), Term::from(l.clone())))
                                }
                                _ => None,
                            })
                            .collect::<Binding>()
                    })
                    .collect::<Vec<_>>();
                let undefs = bindings.iter().any(|b| b.len() < variables.len());
                #[allow(clippy::cast_precision_loss, reason = "Test data is small")]
                let metadata =
                    Metadata::new(Cardinality::exact(bindings.len() as f64), variables.clone())
                        .with_undefs(undefs);
                Ok(BindingStreamOutput::from_bindings(bindings, metadata))
            }
            GraphPattern::Join { left, right } => {
                let left_output = context.evaluate(left).await?;
                let right_output = context.evaluate(right).await?;
                let entries = vec![
                    JoinEntry::new(left.as_ref().clone(), left_output),
                    JoinEntry::new(right.as_ref().clone(), right_output),
                ];
                self.mediator
                    .join(JoinAction::new(LogicalJoinType::Inner, entries, context))
                    .await
            }
            GraphPattern::Graph { name, inner } => {
                let output = context.evaluate(inner).await?;
                match name {
                    NamedNodePattern::NamedNode(name) if *name == graph_name() => Ok(output),
                    NamedNodePattern::NamedNode(_) => {
                        let metadata = output.metadata.resolve().await?;
                        let metadata = Metadata::new(
                            Cardinality::exact(0.0),
                            metadata.variables.clone(),
                        );
                        Ok(BindingStreamOutput::from_bindings(Vec::new(), metadata))
                    }
                    NamedNodePattern::Variable(variable) => {
                        let metadata = output.metadata;
                        let graph_variable = variable.clone();
                        let accessor = MetadataAccessor::new(async move {
                            let mut metadata = metadata.resolve().await?.as_ref().clone();
                            metadata.variables.push(graph_variable);
                            Ok(metadata)
                        });

                        let graph_variable = variable.clone();
                        let bindings = output
                            .bindings
                            .map_ok(move |binding| {
                                let graph = Binding::new([(
                                    graph_variable.clone(),
                                    Term::from(graph_name()),
                                )]);
                                binding.merge_preferring(&graph)
                            })
                            .boxed();
                        Ok(BindingStreamOutput::new(bindings, accessor))
                    }
                }
            }
            _ => Err(JoinError::Unsupported(operation.to_string())),
        }
    }
}

/// Creates a driver that binds `?g` to a literal and to [graph_name], and a larger entry that
/// matches `GRAPH ?g { VALUES ?b { "1" } }`.
///
/// A literal cannot be substituted as a graph name.
pub fn graph_entries() -> Vec<JoinEntry> {
    let left_bindings = vec![
        binding(&[("g", "x")]),
        Binding::new([(var("g"), Term::from(graph_name()))]),
    ];
    let (left, _) = TestEntry::new(&["g"], left_bindings).build();

    let right_bindings = vec![Binding::new([
        (var("b"), Term::from(Literal::new_simple_literal("1"))),
        (var("g"), Term::from(graph_name())),
    ])];
    let operation = GraphPattern::Graph {
        name: var("g").into(),
        inner: Box::new(values_pattern(&vars(&["b"]), &[binding(&[("b", "1")])])),
    };
    let (right, _) = TestEntry::new(&["b", "g"], right_bindings)
        .with_cardinality(Cardinality::exact(5.0))
        .with_operation(operation)
        .build();
    vec![left, right]
}

/// Creates a context whose evaluator joins with `mediator`.
pub fn create_context(mediator: &Arc<JoinMediator>) -> (QueryContext, Arc<ValuesEvaluator>) {
    let evaluator = ValuesEvaluator::new(Arc::clone(mediator));
    let query_evaluator: Arc<dyn QueryEvaluator> = Arc::<ValuesEvaluator>::clone(&evaluator);
    let context = QueryContext::new(query_evaluator);
    (context, evaluator)
}

/// Executes `strategy` directly, bypassing the strategy selection.
pub async fn execute_strategy(
    strategy: &dyn PhysicalJoin,
    join_type: LogicalJoinType,
    entries: Vec<JoinEntry>,
) -> JoinResult<BindingStreamOutput> {
    let mediator = Arc::new(JoinMediator::default());
    let (context, _) = create_context(&mediator);
    let metadatas =
        futures::future::try_join_all(entries.iter().map(|e| e.output.metadata.resolve())).await?;
    strategy
        .test(join_type, &entries, &metadatas)
        .map_err(|rejection| JoinError::Internal(rejection.to_string()))?;
    strategy
        .execute(JoinAction::new(join_type, entries, context), metadatas, &mediator)
        .await
}

/// Collects all bindings of `output` as sorted strings.
pub async fn collect_sorted(output: BindingStreamOutput) -> JoinResult<String> {
    let mut bindings = output
        .bindings
        .map_ok(|b| b.to_string())
        .try_collect::<Vec<_>>()
        .await?;
    bindings.sort();
    Ok(bindings.join("\n"))
}
