use crate::evaluator::MemoryQueryEvaluator;
use crate::source::MemoryQuadSource;
use rdf_federation_common::error::JoinError;
use rdf_federation_common::{BindingStreamOutput, JoinResult, QueryContext, QueryEvaluator};
use rdf_federation_model::{GraphPattern, Query};
use rdf_federation_physical::join::{JoinConfig, JoinMediator};
use std::sync::Arc;

/// Evaluates SPARQL queries over a [MemoryQuadSource].
///
/// Each query sees a snapshot of the source that is taken when the evaluation starts. All joins of
/// the query are executed by the strategies of the engine's [JoinMediator].
#[derive(Debug)]
pub struct QueryEngine {
    source: Arc<MemoryQuadSource>,
    mediator: Arc<JoinMediator>,
}

impl QueryEngine {
    /// Creates a new [QueryEngine] with the default join configuration.
    pub fn new(source: Arc<MemoryQuadSource>) -> Self {
        Self::with_config(source, JoinConfig::default())
    }

    /// Creates a new [QueryEngine] whose default strategies are configured by `config`.
    pub fn with_config(source: Arc<MemoryQuadSource>, config: JoinConfig) -> Self {
        Self::with_mediator(source, Arc::new(JoinMediator::with_config(config)))
    }

    /// Creates a new [QueryEngine] that executes joins with `mediator`.
    pub fn with_mediator(source: Arc<MemoryQuadSource>, mediator: Arc<JoinMediator>) -> Self {
        Self { source, mediator }
    }

    pub fn source(&self) -> &Arc<MemoryQuadSource> {
        &self.source
    }

    pub fn mediator(&self) -> &Arc<JoinMediator> {
        &self.mediator
    }

    /// Evaluates `pattern` and returns the resulting bindings.
    pub async fn execute(&self, pattern: &GraphPattern) -> JoinResult<BindingStreamOutput> {
        let snapshot = self.source.snapshot().await;
        tracing::debug!(quads = snapshot.len(), %pattern, "Executing graph pattern");

        let evaluator: Arc<dyn QueryEvaluator> = Arc::new(MemoryQueryEvaluator::new(
            snapshot,
            Arc::clone(&self.mediator),
        ));
        let context = QueryContext::new(Arc::clone(&evaluator));
        evaluator.evaluate(pattern, context).await
    }

    /// Parses and evaluates a SPARQL `SELECT` query.
    ///
    /// `FROM` clauses are not supported, as the engine always queries the whole source.
    pub async fn query(&self, query: &str) -> JoinResult<BindingStreamOutput> {
        let query = Query::parse(query, None).map_err(JoinError::external)?;
        match query {
            Query::Select {
                dataset: None,
                pattern,
                ..
            } => self.execute(&pattern).await,
            Query::Select { .. } => Err(JoinError::Unsupported(
                "SELECT queries with a FROM clause".to_owned(),
            )),
            _ => Err(JoinError::Unsupported(
                "Queries other than SELECT".to_owned(),
            )),
        }
    }
}
