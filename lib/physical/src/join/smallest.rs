use crate::join::sequential::{decomposition_coefficients, join_pair};
use crate::join::{
    JoinAction, JoinCoefficients, JoinEntry, JoinMediator, JoinProperties, PhysicalJoin,
};
use async_trait::async_trait;
use rdf_federation_common::{BindingStreamOutput, JoinResult, LogicalJoinType, Metadata};
use std::sync::Arc;

/// Joins three or more entries by repeatedly joining the two entries with the lowest cardinality.
///
/// The joined pair is replaced by its result, which is placed in front of the remaining entries.
/// This keeps intermediate results small, while the estimate equals the one of the
/// [SequentialJoin](crate::join::SequentialJoin).
#[derive(Debug, Default)]
pub struct SmallestFirstJoin;

#[async_trait]
impl PhysicalJoin for SmallestFirstJoin {
    fn properties(&self) -> JoinProperties {
        JoinProperties {
            name: "smallest-first",
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
            let Some((first, second)) = select_smallest_pair(&metadatas) else {
                break;
            };
            tracing::debug!(
                strategy = self.name(),
                first,
                second,
                remaining = entries.len() - 2,
                "Joining the two smallest entries"
            );

            // `first < second`, so removing `second` first keeps `first` valid.
            let second_entry = entries.remove(second);
            let first_entry = entries.remove(first);
            let second_metadata = metadatas.remove(second);
            let first_metadata = metadatas.remove(first);

            let entry = join_pair(
                mediator,
                vec![first_entry, second_entry],
                vec![first_metadata, second_metadata],
                &context,
            )
            .await?;
            let metadata = entry.output.metadata.resolve().await?;
            entries.insert(0, entry);
            metadatas.insert(0, metadata);
        }

        mediator
            .join(JoinAction::new(join_type, entries, context))
            .await
    }
}

/// Selects the two entries with the lowest cardinality, returned in index order.
///
/// Entries are scanned in order and an entry replaces the current minimum if its cardinality is
/// lower *or equal*. Hence, the last of multiple equally small entries wins.
///
/// Returns [None] if there are fewer than two entries.
pub fn select_smallest_pair(metadatas: &[Arc<Metadata>]) -> Option<(usize, usize)> {
    let mut smallest: Option<(usize, f64)> = None;
    let mut second_smallest: Option<(usize, f64)> = None;

    for (i, metadata) in metadatas.iter().enumerate() {
        let cardinality = metadata.cardinality.value;
        if replaces(smallest, cardinality) {
            second_smallest = smallest;
            smallest = Some((i, cardinality));
        } else if replaces(second_smallest, cardinality) {
            second_smallest = Some((i, cardinality));
        }
    }

    let ((a, _), (b, _)) = (smallest?, second_smallest?);
    Some((a.min(b), a.max(b)))
}

fn replaces(candidate: Option<(usize, f64)>, cardinality: f64) -> bool {
    candidate.map_or(true, |(_, value)| cardinality <= value)
}
