use crate::error::JoinError;
use crate::{BindingStream, JoinResult};
use futures::{Stream, StreamExt};
use rdf_federation_model::Binding;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

/// A binding stream that can be read by multiple independent cursors.
///
/// The underlying stream is read at most once. Every binding is buffered such that cursors that
/// are created later (or that lag behind) replay the same sequence from the start. This is the
/// clone capability required by nested-loop joins, which scan the inner side once per outer
/// binding.
///
/// The source is dropped (closed) once it is exhausted or once the [ReplayableBindings] and all of
/// its cursors are dropped.
#[derive(Clone)]
pub struct ReplayableBindings {
    state: Arc<Mutex<ReplayState>>,
}

struct ReplayState {
    /// The source stream. [None] once the source has finished.
    source: Option<BindingStream>,
    /// All bindings that have been read from the source so far.
    buffer: Vec<Binding>,
    /// The error that terminated the source, if any.
    error: Option<JoinError>,
    /// Cursors waiting for the next binding of the source.
    waiting: Vec<Waker>,
}

impl ReplayableBindings {
    /// Creates a new [ReplayableBindings] over `source`.
    pub fn new(source: BindingStream) -> Self {
        Self {
            state: Arc::new(Mutex::new(ReplayState {
                source: Some(source),
                buffer: Vec::new(),
                error: None,
                waiting: Vec::new(),
            })),
        }
    }

    /// Creates a new cursor that starts at the first binding.
    pub fn cursor(&self) -> ReplayCursor {
        ReplayCursor {
            state: Arc::clone(&self.state),
            position: 0,
        }
    }

    /// Returns the number of bindings that have been read from the source.
    pub fn buffered(&self) -> usize {
        lock(&self.state).buffer.len()
    }
}

/// An independent position in a [ReplayableBindings].
pub struct ReplayCursor {
    state: Arc<Mutex<ReplayState>>,
    position: usize,
}

impl Stream for ReplayCursor {
    type Item = JoinResult<Binding>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let mut state = lock(&this.state);

        if let Some(binding) = state.buffer.get(this.position) {
            this.position += 1;
            return Poll::Ready(Some(Ok(binding.clone())));
        }

        let Some(source) = state.source.as_mut() else {
            // An error is reported once per cursor, after the buffered bindings.
            if let Some(error) = state.error.clone() {
                this.position += 1;
                if this.position == state.buffer.len() + 1 {
                    return Poll::Ready(Some(Err(error)));
                }
            }
            return Poll::Ready(None);
        };

        match source.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(binding))) => {
                state.buffer.push(binding.clone());
                this.position += 1;
                state.wake_waiting();
                Poll::Ready(Some(Ok(binding)))
            }
            Poll::Ready(Some(Err(error))) => {
                state.source = None;
                state.error = Some(error.clone());
                this.position += 1;
                state.wake_waiting();
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                state.source = None;
                state.wake_waiting();
                Poll::Ready(None)
            }
            Poll::Pending => {
                if !state.waiting.iter().any(|w| w.will_wake(cx.waker())) {
                    state.waiting.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl ReplayState {
    fn wake_waiting(&mut self) {
        for waker in self.waiting.drain(..) {
            waker.wake();
        }
    }
}

fn lock(state: &Mutex<ReplayState>) -> MutexGuard<'_, ReplayState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
