use crate::{Cardinality, JoinResult, Metadata, MetadataAccessor};
use futures::Stream;
use rdf_federation_model::{Binding, Variable};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// A lazy, pull-based stream of bindings.
///
/// Dropping the stream closes it. Composed streams own their inputs, so dropping the result of a
/// join transitively closes every input that is still open.
pub type BindingStream = Pin<Box<dyn Stream<Item = JoinResult<Binding>> + Send>>;

/// The result of evaluating an operation: a binding stream and its metadata.
pub struct BindingStreamOutput {
    pub bindings: BindingStream,
    pub metadata: MetadataAccessor,
}

impl BindingStreamOutput {
    /// Creates a new [BindingStreamOutput].
    pub fn new(bindings: BindingStream, metadata: MetadataAccessor) -> Self {
        Self { bindings, metadata }
    }

    /// Creates an output that yields no bindings at all.
    pub fn empty(variables: Vec<Variable>) -> Self {
        Self::new(
            Box::pin(futures::stream::empty()),
            MetadataAccessor::ready(Metadata::new(Cardinality::exact(0.0), variables)),
        )
    }

    /// Creates an output from materialized `bindings`.
    pub fn from_bindings(bindings: Vec<Binding>, metadata: Metadata) -> Self {
        Self::new(
            Box::pin(futures::stream::iter(bindings.into_iter().map(Ok))),
            MetadataAccessor::ready(metadata),
        )
    }
}

/// Wraps `stream` such that the first error terminates it.
pub fn terminate_on_error(stream: BindingStream) -> BindingStream {
    Box::pin(TerminateOnError::new(stream))
}

/// A stream adapter that forwards the first error and then ends.
///
/// The inner stream is dropped as soon as it yields an error. As composed streams own their
/// inputs, this closes all sibling streams that are still open.
pub struct TerminateOnError<S> {
    inner: Option<S>,
}

impl<S> TerminateOnError<S> {
    pub fn new(inner: S) -> Self {
        Self { inner: Some(inner) }
    }
}

impl<S> Stream for TerminateOnError<S>
where
    S: Stream<Item = JoinResult<Binding>> + Unpin,
{
    type Item = JoinResult<Binding>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(Pin::new(inner).poll_next(cx)) {
            Some(Ok(binding)) => Poll::Ready(Some(Ok(binding))),
            Some(Err(error)) => {
                this.inner = None;
                Poll::Ready(Some(Err(error)))
            }
            None => {
                this.inner = None;
                Poll::Ready(None)
            }
        }
    }
}
