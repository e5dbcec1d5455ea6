use crate::join::entry::into_pair;
use crate::join::strategy::sequential_request_time;
use crate::join::{
    JoinAction, JoinCoefficients, JoinEntry, JoinMediator, JoinProperties, PhysicalJoin,
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use rdf_federation_common::{
    terminate_on_error, BindingStream, BindingStreamOutput, JoinResult, LogicalJoinType, Metadata,
    MetadataAccessor,
};
use rdf_federation_model::{Binding, Variable};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Joins two entries by hashing the values of their shared variables.
///
/// Both entries are consumed concurrently. Each incoming binding probes the hash table of the
/// other side and is then inserted into the table of its own side. Results are therefore produced
/// as soon as both join partners have arrived.
///
/// Bindings with unbound join variables would need to be compatible with every bucket. Hence, the
/// strategy rejects entries that can contain undefined values.
#[derive(Debug, Default)]
pub struct SymmetricHashJoin;

#[async_trait]
impl PhysicalJoin for SymmetricHashJoin {
    fn properties(&self) -> JoinProperties {
        JoinProperties {
            name: "symmetric-hash",
            join_type: LogicalJoinType::Inner,
            min_entries: 2,
            max_entries: Some(2),
            can_handle_undefs: false,
        }
    }

    fn estimate(&self, _entries: &[JoinEntry], metadatas: &[Arc<Metadata>]) -> JoinCoefficients {
        let items: f64 = metadatas.iter().map(|m| m.cardinality.value).sum();
        JoinCoefficients {
            iterations: items,
            persisted_items: items,
            blocking_items: 0.0,
            request_time: sequential_request_time(metadatas),
        }
    }

    async fn execute(
        &self,
        action: JoinAction,
        metadatas: Vec<Arc<Metadata>>,
        _mediator: &JoinMediator,
    ) -> JoinResult<BindingStreamOutput> {
        let (left, right) = into_pair(action.entries)?;
        let join_variables = metadatas[0]
            .variables
            .iter()
            .filter(|v| metadatas[1].variables.contains(v))
            .cloned()
            .collect();

        let stream = SymmetricHashJoinStream::new(
            left.output.bindings,
            right.output.bindings,
            join_variables,
        );
        Ok(BindingStreamOutput::new(
            terminate_on_error(Box::pin(stream)),
            MetadataAccessor::ready(Metadata::merge(metadatas.iter().map(Arc::as_ref))),
        ))
    }
}

/// One input of a [SymmetricHashJoinStream].
struct HashJoinSide {
    /// [None] once the input is exhausted.
    stream: Option<BindingStream>,
    /// The bindings of this side that wait for join partners, grouped by their hash key.
    table: FxHashMap<String, Vec<Binding>>,
}

impl HashJoinSide {
    fn new(stream: BindingStream) -> Self {
        Self {
            stream: Some(stream),
            table: FxHashMap::default(),
        }
    }

    fn is_finished(&self) -> bool {
        self.stream.is_none()
    }
}

/// The stream that implements the [SymmetricHashJoin].
struct SymmetricHashJoinStream {
    left: HashJoinSide,
    right: HashJoinSide,
    /// The variables shared between both sides, in a stable order.
    join_variables: Vec<Variable>,
    /// Joined bindings that have not been emitted yet.
    pending: VecDeque<Binding>,
    /// Alternates between the sides to consume both inputs fairly.
    poll_left_first: bool,
}

impl SymmetricHashJoinStream {
    fn new(left: BindingStream, right: BindingStream, join_variables: Vec<Variable>) -> Self {
        Self {
            left: HashJoinSide::new(left),
            right: HashJoinSide::new(right),
            join_variables,
            pending: VecDeque::new(),
            poll_left_first: true,
        }
    }

    /// Polls one side once. Joined bindings are queued in `pending`. Returns [Poll::Pending] if the
    /// side is exhausted or has no binding available yet.
    fn poll_side(&mut self, cx: &mut Context<'_>, left: bool) -> Poll<JoinResult<()>> {
        let (this, other) = if left {
            (&mut self.left, &mut self.right)
        } else {
            (&mut self.right, &mut self.left)
        };
        let Some(stream) = this.stream.as_mut() else {
            return Poll::Pending;
        };

        match stream.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(binding))) => {
                let key = binding.hash_key(&self.join_variables);
                if let Some(candidates) = other.table.get(&key) {
                    self.pending.extend(
                        candidates
                            .iter()
                            .filter_map(|candidate| binding.merge(candidate)),
                    );
                }
                // Only store the binding if the other side can still probe it.
                if !other.is_finished() {
                    this.table.entry(key).or_default().push(binding);
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Some(Err(error))) => Poll::Ready(Err(error)),
            Poll::Ready(None) => {
                this.stream = None;
                // Nothing will probe the other table anymore.
                other.table.clear();
                Poll::Ready(Ok(()))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Stream for SymmetricHashJoinStream {
    type Item = JoinResult<Binding>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(binding) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(binding)));
            }
            if this.left.is_finished() && this.right.is_finished() {
                return Poll::Ready(None);
            }

            let first = this.poll_left_first;
            this.poll_left_first = !first;

            let mut progress = false;
            for side in [first, !first] {
                match this.poll_side(cx, side) {
                    Poll::Ready(Ok(())) => {
                        progress = true;
                        break;
                    }
                    Poll::Ready(Err(error)) => {
                        this.left.stream = None;
                        this.right.stream = None;
                        this.pending.clear();
                        return Poll::Ready(Some(Err(error)));
                    }
                    Poll::Pending => {}
                }
            }

            if !progress {
                return Poll::Pending;
            }
        }
    }
}
