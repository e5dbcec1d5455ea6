use crate::{BindingStreamOutput, JoinResult, Metadata, QueryEvaluator};
use rdf_federation_model::{Binding, GraphPattern};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// The immutable context of an evaluation.
///
/// Besides a handle to the [QueryEvaluator], the context carries information about the join that
/// triggered the evaluation. Sources and nested join selections may use it to specialize their
/// behavior. Each `with_*` method returns a new context and leaves the original untouched.
#[derive(Clone)]
pub struct QueryContext {
    evaluator: Arc<dyn QueryEvaluator>,
    /// The metadata of the left (or driver) entry of the enclosing join.
    left_metadata: Option<Arc<Metadata>>,
    /// The metadata of the remaining entries of the enclosing join.
    right_metadatas: Option<Vec<Arc<Metadata>>>,
    /// The binding whose values have been substituted into the evaluated operation.
    bound_binding: Option<Binding>,
}

impl QueryContext {
    /// Creates a new [QueryContext] without any join information.
    pub fn new(evaluator: Arc<dyn QueryEvaluator>) -> Self {
        Self {
            evaluator,
            left_metadata: None,
            right_metadatas: None,
            bound_binding: None,
        }
    }

    pub fn evaluator(&self) -> &Arc<dyn QueryEvaluator> {
        &self.evaluator
    }

    pub fn left_metadata(&self) -> Option<&Arc<Metadata>> {
        self.left_metadata.as_ref()
    }

    pub fn right_metadatas(&self) -> Option<&[Arc<Metadata>]> {
        self.right_metadatas.as_deref()
    }

    pub fn bound_binding(&self) -> Option<&Binding> {
        self.bound_binding.as_ref()
    }

    /// Returns a context that records the metadata of the enclosing join.
    #[must_use]
    pub fn with_join_metadata(
        &self,
        left_metadata: Arc<Metadata>,
        right_metadatas: Vec<Arc<Metadata>>,
    ) -> Self {
        Self {
            left_metadata: Some(left_metadata),
            right_metadatas: Some(right_metadatas),
            ..self.clone()
        }
    }

    /// Returns a context that records the binding used for substitution.
    #[must_use]
    pub fn with_bound_binding(&self, binding: Binding) -> Self {
        Self {
            bound_binding: Some(binding),
            ..self.clone()
        }
    }

    /// Evaluates `operation` with the evaluator of this context.
    pub async fn evaluate(&self, operation: &GraphPattern) -> JoinResult<BindingStreamOutput> {
        self.evaluator.evaluate(operation, self.clone()).await
    }
}

impl Debug for QueryContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContext")
            .field("left_metadata", &self.left_metadata)
            .field("right_metadatas", &self.right_metadatas)
            .field("bound_binding", &self.bound_binding)
            .finish_non_exhaustive()
    }
}
