use crate::join::strategy::{cardinality_product, sequential_request_time};
use crate::join::{
    combine_operations, JoinAction, JoinCoefficients, JoinEntry, JoinMediator, JoinProperties,
    PhysicalJoin,
};
use async_trait::async_trait;
use rdf_federation_common::{
    BindingStreamOutput, JoinResult, LogicalJoinType, Metadata, QueryContext,
};
use rdf_federation_model::GraphPattern;
use std::sync::Arc;

/// Joins three or more entries by folding them from left to right.
///
/// The first two entries are joined with the strategy that the [JoinMediator] selects for them.
/// The result replaces both entries and the process repeats until a single binary join is left.
#[derive(Debug, Default)]
pub struct SequentialJoin;

#[async_trait]
impl PhysicalJoin for SequentialJoin {
    fn properties(&self) -> JoinProperties {
        JoinProperties {
            name: "sequential",
            join_type: LogicalJoinType::Inner,
            min_entries: 3,
            max_entries: None,
            can_handle_undefs: true,
        }
    }

    fn estimate(&self, _entries: &[JoinEntry], metadatas: &[Arc<Metadata>]) -> JoinCoefficients {
        decomposition_coefficients(metadatas)
    }

    async fn execute(
        &self,
        action: JoinAction,
        metadatas: Vec<Arc<Metadata>>,
        mediator: &JoinMediator,
    ) -> JoinResult<BindingStreamOutput> {
        let JoinAction {
            join_type,
            mut entries,
            context,
        } = action;
        let mut metadatas = metadatas;

        while entries.len() > 2 {
            let pair = entries.drain(..2).collect::<Vec<_>>();
            let pair_metadatas = metadatas.drain(..2).collect::<Vec<_>>();
            tracing::debug!(
                strategy = self.name(),
                remaining = entries.len(),
                "Joining the first two entries"
            );

            let entry = join_pair(mediator, pair, pair_metadatas, &context).await?;
            let metadata = entry.output.metadata.resolve().await?;
            entries.insert(0, entry);
            metadatas.insert(0, metadata);
        }

        mediator
            .join(JoinAction::new(join_type, entries, context))
            .await
    }
}

/// Both N-ary decompositions are estimated with the size of the cross product of all entries.
///
/// The estimate is an upper bound that ignores the selectivity of the intermediate joins.
pub(super) fn decomposition_coefficients(metadatas: &[Arc<Metadata>]) -> JoinCoefficients {
    JoinCoefficients {
        iterations: cardinality_product(metadatas),
        persisted_items: 0.0,
        blocking_items: 0.0,
        request_time: sequential_request_time(metadatas),
    }
}

/// Joins two entries with the strategy that `mediator` selects and wraps the result into a new
/// entry.
///
/// `pair` and `metadatas` must each hold exactly two elements.
pub(super) async fn join_pair(
    mediator: &JoinMediator,
    pair: Vec<JoinEntry>,
    metadatas: Vec<Arc<Metadata>>,
    context: &QueryContext,
) -> JoinResult<JoinEntry> {
    let operation = combine_operations(pair.iter().map(|e| e.operation.clone()))
        .unwrap_or_else(|| GraphPattern::Bgp {
            patterns: Vec::new(),
        });

    let mut metadatas = metadatas.into_iter();
    let context = match (metadatas.next(), metadatas.next()) {
        (Some(left), Some(right)) => context.with_join_metadata(left, vec![right]),
        _ => context.clone(),
    };

    let output = mediator
        .join(JoinAction::new(LogicalJoinType::Inner, pair, context))
        .await?;
    Ok(JoinEntry::new(operation, output))
}
