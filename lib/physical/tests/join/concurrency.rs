use crate::test_utils::{binding, TestEntry};
use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt};
use rdf_federation_common::{
    BindingStream, BindingStreamOutput, Cardinality, JoinResult, LogicalJoinType, Metadata,
    MetadataAccessor, QueryContext, QueryEvaluator,
};
use rdf_federation_model::{Binding, GraphPattern};
use rdf_federation_physical::join::{BindJoin, BindOrder, JoinAction, JoinMediator, PhysicalJoin};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// Counts the sub-streams that have been created but not yet dropped.
#[derive(Debug, Default)]
struct LiveStreams {
    live: AtomicUsize,
    max_live: AtomicUsize,
    created: AtomicUsize,
}

impl LiveStreams {
    fn open(self: &Arc<Self>, inner: BindingStream) -> CountedStream {
        self.created.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
        CountedStream {
            inner,
            streams: Arc::clone(self),
        }
    }
}

struct CountedStream {
    inner: BindingStream,
    streams: Arc<LiveStreams>,
}

impl Stream for CountedStream {
    type Item = JoinResult<Binding>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_next_unpin(cx)
    }
}

impl Drop for CountedStream {
    fn drop(&mut self) {
        self.streams.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Answers every operation with a single empty binding.
#[derive(Debug, Default)]
struct CountingEvaluator {
    streams: Arc<LiveStreams>,
}

#[async_trait]
impl QueryEvaluator for CountingEvaluator {
    async fn evaluate(
        &self,
        _operation: &GraphPattern,
        _context: QueryContext,
    ) -> JoinResult<BindingStreamOutput> {
        let inner = futures::stream::iter([Ok(Binding::empty())]).boxed();
        let bindings = self.streams.open(inner).boxed();
        let metadata = Metadata::new(Cardinality::exact(1.0), Vec::new());
        Ok(BindingStreamOutput::new(bindings, MetadataAccessor::ready(metadata)))
    }
}

/// Runs a bind join over 50 driver bindings and returns the number of results.
async fn bind_fifty(
    order: BindOrder,
    buffer_size: usize,
) -> JoinResult<(usize, Arc<LiveStreams>)> {
    let driver_bindings = (0..50)
        .map(|i| {
            let value = i.to_string();
            binding(&[("a", value.as_str())])
        })
        .collect::<Vec<_>>();
    let (driver, _) = TestEntry::new(&["a"], driver_bindings).build();
    let (other, _) = TestEntry::new(&["a"], Vec::new())
        .with_cardinality(Cardinality::exact(100.0))
        .build();
    let entries = vec![driver, other];

    let evaluator = Arc::new(CountingEvaluator::default());
    let streams = Arc::clone(&evaluator.streams);
    let query_evaluator: Arc<dyn QueryEvaluator> = evaluator;
    let context = QueryContext::new(query_evaluator);

    let mediator = JoinMediator::default();
    let metadatas =
        futures::future::try_join_all(entries.iter().map(|e| e.output.metadata.resolve())).await?;
    let strategy = BindJoin::binary(order, buffer_size);
    let output = strategy
        .execute(
            JoinAction::new(LogicalJoinType::Inner, entries, context),
            metadatas,
            &mediator,
        )
        .await?;

    let results = output.bindings.try_collect::<Vec<_>>().await?;
    Ok((results.len(), streams))
}

#[tokio::test]
async fn breadth_first_bind_join_bounds_live_sub_streams() -> JoinResult<()> {
    let (results, streams) = bind_fifty(BindOrder::BreadthFirst, 4).await?;

    assert_eq!(results, 50);
    assert_eq!(streams.created.load(Ordering::SeqCst), 50);
    assert_eq!(streams.live.load(Ordering::SeqCst), 0);
    let max_live = streams.max_live.load(Ordering::SeqCst);
    assert!((1..=4).contains(&max_live), "{max_live} live sub-streams");
    Ok(())
}

#[tokio::test]
async fn depth_first_bind_join_has_one_live_sub_stream() -> JoinResult<()> {
    let (results, streams) = bind_fifty(BindOrder::DepthFirst, 4).await?;

    assert_eq!(results, 50);
    assert_eq!(streams.created.load(Ordering::SeqCst), 50);
    assert_eq!(streams.max_live.load(Ordering::SeqCst), 1);
    Ok(())
}
