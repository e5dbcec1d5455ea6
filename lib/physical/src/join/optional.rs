use futures::{Stream, StreamExt};
use rdf_federation_common::{BindingStream, JoinResult, Metadata};
use rdf_federation_model::Binding;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

/// Yields the joined bindings of a single left binding. If there are none, the left binding is
/// yielded on its own.
pub(super) struct OptionalMatches {
    /// The joined bindings of `left`.
    matches: BindingStream,
    /// [None] once `left` has been matched or yielded.
    left: Option<Binding>,
}

impl OptionalMatches {
    pub(super) fn new(left: Binding, matches: BindingStream) -> Self {
        Self {
            matches,
            left: Some(left),
        }
    }
}

impl Stream for OptionalMatches {
    type Item = JoinResult<Binding>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match ready!(this.matches.poll_next_unpin(cx)) {
            Some(Ok(binding)) => {
                this.left = None;
                Poll::Ready(Some(Ok(binding)))
            }
            Some(Err(error)) => {
                this.left = None;
                Poll::Ready(Some(Err(error)))
            }
            None => Poll::Ready(this.left.take().map(Ok)),
        }
    }
}

/// Computes the output metadata of an optional join.
///
/// Every left binding is part of the result, hence the cardinality is at least the left
/// cardinality. Right variables may stay unbound.
pub(super) fn optional_output_metadata(metadatas: &[Arc<Metadata>]) -> Metadata {
    let mut metadata = Metadata::merge(metadatas.iter().map(Arc::as_ref)).with_undefs(true);
    if let Some(left) = metadatas.first() {
        metadata.cardinality.value = metadata.cardinality.value.max(left.cardinality.value);
    }
    metadata
}
