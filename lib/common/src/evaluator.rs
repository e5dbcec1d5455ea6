use crate::{BindingStreamOutput, JoinResult, QueryContext};
use async_trait::async_trait;
use rdf_federation_model::GraphPattern;

/// Evaluates (sub-)queries into binding streams.
///
/// The join engine calls back into the evaluator whenever it needs to evaluate an operation that it
/// has created itself, for example, an operation in which the values of a driver binding have been
/// substituted.
#[async_trait]
pub trait QueryEvaluator: Send + Sync {
    /// Evaluates `operation` within `context`.
    ///
    /// Evaluation must be lazy: the returned stream should only start producing bindings once it
    /// is polled.
    async fn evaluate(
        &self,
        operation: &GraphPattern,
        context: QueryContext,
    ) -> JoinResult<BindingStreamOutput>;
}
