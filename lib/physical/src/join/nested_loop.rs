use crate::join::entry::into_pair;
use crate::join::optional::{optional_output_metadata, OptionalMatches};
use crate::join::strategy::{cardinality_product, sequential_request_time};
use crate::join::{
    JoinAction, JoinCoefficients, JoinEntry, JoinMediator, JoinProperties, PhysicalJoin,
};
use async_trait::async_trait;
use futures::future::ready;
use futures::{StreamExt, TryStreamExt};
use rdf_federation_common::{
    terminate_on_error, BindingStream, BindingStreamOutput, JoinResult, LogicalJoinType, Metadata,
    MetadataAccessor, ReplayableBindings,
};
use rdf_federation_model::Binding;
use std::sync::Arc;

/// Joins two entries by scanning the right entry once for every left binding.
///
/// The right entry is read only once; a [ReplayableBindings] buffers it for the later scans.
#[derive(Debug, Default)]
pub struct NestedLoopJoin;

#[async_trait]
impl PhysicalJoin for NestedLoopJoin {
    fn properties(&self) -> JoinProperties {
        JoinProperties {
            name: "nested-loop",
            join_type: LogicalJoinType::Inner,
            min_entries: 2,
            max_entries: Some(2),
            can_handle_undefs: true,
        }
    }

    fn estimate(&self, _entries: &[JoinEntry], metadatas: &[Arc<Metadata>]) -> JoinCoefficients {
        nested_loop_coefficients(metadatas)
    }

    async fn execute(
        &self,
        action: JoinAction,
        metadatas: Vec<Arc<Metadata>>,
        _mediator: &JoinMediator,
    ) -> JoinResult<BindingStreamOutput> {
        let (left, right) = into_pair(action.entries)?;
        let right = ReplayableBindings::new(right.output.bindings);

        let bindings = left
            .output
            .bindings
            .map_ok(move |left| scan_matches(&right, left))
            .try_flatten();

        Ok(BindingStreamOutput::new(
            terminate_on_error(Box::pin(bindings)),
            MetadataAccessor::ready(Metadata::merge(metadatas.iter().map(Arc::as_ref))),
        ))
    }
}

/// Left outer join variant of the [NestedLoopJoin].
///
/// Left bindings without a compatible right binding are emitted unchanged.
#[derive(Debug, Default)]
pub struct OptionalNestedLoopJoin;

#[async_trait]
impl PhysicalJoin for OptionalNestedLoopJoin {
    fn properties(&self) -> JoinProperties {
        JoinProperties {
            name: "optional-nested-loop",
            join_type: LogicalJoinType::Optional,
            min_entries: 2,
            max_entries: Some(2),
            can_handle_undefs: true,
        }
    }

    fn estimate(&self, _entries: &[JoinEntry], metadatas: &[Arc<Metadata>]) -> JoinCoefficients {
        nested_loop_coefficients(metadatas)
    }

    async fn execute(
        &self,
        action: JoinAction,
        metadatas: Vec<Arc<Metadata>>,
        _mediator: &JoinMediator,
    ) -> JoinResult<BindingStreamOutput> {
        let (left, right) = into_pair(action.entries)?;
        let right = ReplayableBindings::new(right.output.bindings);

        let bindings = left
            .output
            .bindings
            .map_ok(move |left| {
                let matches = scan_matches(&right, left.clone());
                let optional: BindingStream = Box::pin(OptionalMatches::new(left, matches));
                optional
            })
            .try_flatten();

        Ok(BindingStreamOutput::new(
            terminate_on_error(Box::pin(bindings)),
            MetadataAccessor::ready(optional_output_metadata(&metadatas)),
        ))
    }
}

/// Scans a new cursor of `right` and joins each binding with `left`.
fn scan_matches(right: &ReplayableBindings, left: Binding) -> BindingStream {
    right
        .cursor()
        .try_filter_map(move |candidate| ready(Ok(left.merge(&candidate))))
        .boxed()
}

/// Both entries are read once, but the number of comparisons is quadratic. The request time
/// underestimates the real cost, which is dominated by the iterations anyway.
fn nested_loop_coefficients(metadatas: &[Arc<Metadata>]) -> JoinCoefficients {
    JoinCoefficients {
        iterations: cardinality_product(metadatas),
        persisted_items: 0.0,
        blocking_items: 0.0,
        request_time: sequential_request_time(metadatas),
    }
}
