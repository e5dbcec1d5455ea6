use crate::join::{
    BindJoin, JoinAction, JoinCoefficients, JoinConfig, NestedLoopJoin, NoneJoin, OptionalBindJoin,
    OptionalNestedLoopJoin, PhysicalJoin, SequentialJoin, SingleJoin, SmallestFirstJoin,
    SymmetricHashJoin,
};
use futures::future::try_join_all;
use itertools::Itertools;
use rdf_federation_common::error::JoinError;
use rdf_federation_common::{
    BindingStreamOutput, Cardinality, JoinResult, LogicalJoinType, Metadata, MetadataAccessor,
};
use std::sync::Arc;

/// The strategy that has been selected for a join, together with its estimated cost.
#[derive(Clone, Debug)]
pub struct JoinSelection {
    pub strategy: Arc<dyn PhysicalJoin>,
    pub coefficients: JoinCoefficients,
    /// The coefficients weighted by the [CoefficientWeights](crate::join::CoefficientWeights) of
    /// the mediator.
    pub cost: f64,
}

/// Selects and executes the cheapest applicable [PhysicalJoin] for a join.
///
/// Strategies that decompose a join into smaller joins call back into the mediator. Each of
/// these joins is planned on its own, so the overall plan is composed greedily.
#[derive(Debug)]
pub struct JoinMediator {
    strategies: Vec<Arc<dyn PhysicalJoin>>,
    config: JoinConfig,
}

impl JoinMediator {
    /// Creates a new [JoinMediator] that selects among `strategies`.
    ///
    /// The order of `strategies` breaks ties between strategies with an equal cost.
    pub fn new(strategies: Vec<Arc<dyn PhysicalJoin>>, config: JoinConfig) -> Self {
        Self { strategies, config }
    }

    /// Creates a new [JoinMediator] with the default strategies for `config`.
    pub fn with_config(config: JoinConfig) -> Self {
        Self::new(default_strategies(&config), config)
    }

    pub fn strategies(&self) -> &[Arc<dyn PhysicalJoin>] {
        &self.strategies
    }

    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    /// Selects the cheapest strategy that accepts `action`.
    ///
    /// `metadatas` holds the resolved metadata of each entry of `action`. No entry stream is read.
    pub fn select(
        &self,
        action: &JoinAction,
        metadatas: &[Arc<Metadata>],
    ) -> JoinResult<JoinSelection> {
        let mut rejections = Vec::new();
        let mut selection: Option<JoinSelection> = None;

        for strategy in &self.strategies {
            if let Err(rejection) = strategy.test(action.join_type, &action.entries, metadatas) {
                tracing::trace!(%rejection, "Rejected join strategy");
                rejections.push(rejection);
                continue;
            }

            let coefficients = strategy.estimate(&action.entries, metadatas);
            let cost = self.config.weights.cost(&coefficients);
            tracing::trace!(
                strategy = strategy.name(),
                cost,
                ?coefficients,
                "Estimated join strategy"
            );

            match &selection {
                Some(current) if current.cost.total_cmp(&cost).is_le() => {}
                _ => {
                    selection = Some(JoinSelection {
                        strategy: Arc::clone(strategy),
                        coefficients,
                        cost,
                    });
                }
            }
        }

        selection.ok_or_else(|| JoinError::NoApplicableStrategy {
            join_type: action.join_type,
            entries: metadatas.len(),
            rejections,
        })
    }

    /// Joins the entries of `action` with the cheapest applicable strategy.
    ///
    /// If an entry that determines the result is known to be empty, the result is empty and no
    /// entry stream is read.
    pub async fn join(&self, action: JoinAction) -> JoinResult<BindingStreamOutput> {
        let metadatas = try_join_all(action.entries.iter().map(|e| e.output.metadata.resolve()))
            .await?;

        if let Some(metadata) = empty_result(action.join_type, &metadatas) {
            tracing::debug!(
                join_type = %action.join_type,
                entries = metadatas.len(),
                "Skipping join with an empty entry"
            );
            return Ok(BindingStreamOutput::new(
                Box::pin(futures::stream::empty()),
                MetadataAccessor::ready(metadata),
            ));
        }

        let selection = self.select(&action, &metadatas)?;
        tracing::debug!(
            strategy = selection.strategy.name(),
            join_type = %action.join_type,
            entries = metadatas.len(),
            cost = selection.cost,
            coefficients = ?selection.coefficients,
            operations = %action.entries.iter().map(|e| &e.operation).join(", "),
            "Selected join strategy"
        );
        selection.strategy.execute(action, metadatas, self).await
    }
}

impl Default for JoinMediator {
    fn default() -> Self {
        Self::with_config(JoinConfig::default())
    }
}

/// Returns the strategies of a [JoinMediator] created with [JoinMediator::with_config].
pub fn default_strategies(config: &JoinConfig) -> Vec<Arc<dyn PhysicalJoin>> {
    let order = config.bind_order;
    let buffer_size = config.bind_join_buffer_size;
    vec![
        Arc::new(NoneJoin),
        Arc::new(SingleJoin),
        Arc::new(NestedLoopJoin),
        Arc::new(SymmetricHashJoin),
        Arc::new(BindJoin::binary(order, buffer_size)),
        Arc::new(BindJoin::multi(order, buffer_size)),
        Arc::new(SequentialJoin),
        Arc::new(SmallestFirstJoin),
        Arc::new(OptionalNestedLoopJoin),
        Arc::new(OptionalBindJoin::new(order, buffer_size)),
    ]
}

/// Computes the metadata of an empty join result if an entry guarantees that the result is empty.
///
/// An inner join is empty if any entry is empty, an optional join only if its left entry is.
fn empty_result(join_type: LogicalJoinType, metadatas: &[Arc<Metadata>]) -> Option<Metadata> {
    let is_empty = match join_type {
        LogicalJoinType::Inner => metadatas.iter().any(|m| m.cardinality.is_exactly_empty()),
        LogicalJoinType::Optional => metadatas
            .first()
            .is_some_and(|m| m.cardinality.is_exactly_empty()),
    };
    if !is_empty {
        return None;
    }

    let mut metadata = Metadata::merge(metadatas.iter().map(Arc::as_ref));
    metadata.cardinality = Cardinality::exact(0.0);
    if join_type == LogicalJoinType::Optional {
        metadata.can_contain_undefs = true;
    }
    Some(metadata)
}
