//! Push-style stream handlers.
//!
//! [`to_stream_handler`] turns a handler that calls `emit` as it goes into
//! one that returns a [`Stream`]. Emitted values travel through an unbounded
//! queue; each slot is freed as soon as the consumer reads it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::Stream;
use tokio::sync::mpsc;

/// Push handle given to a bridged handler. Cheap to clone.
pub struct StreamEmitter<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for StreamEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> StreamEmitter<T> {
    /// Queue a value for the consumer. Values emitted after the consumer
    /// went away are dropped.
    pub fn emit(&self, value: T) {
        let _ = self.tx.send(value);
    }
}

/// Stream produced by a bridged handler.
///
/// Polling drives the handler future. The stream yields queued values in
/// emission order; once the handler has returned and the queue is empty it
/// ends, or yields the handler's error as its last item.
#[must_use = "streams do nothing unless polled"]
pub struct PushStream<T, E> {
    rx: mpsc::UnboundedReceiver<T>,
    handler: Option<BoxFuture<'static, Result<(), E>>>,
    error: Option<E>,
    finished: bool,
}

impl<T, E> Unpin for PushStream<T, E> {}

impl<T, E> PushStream<T, E> {
    fn new<Fut>(rx: mpsc::UnboundedReceiver<T>, handler: Fut) -> Self
    where
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        Self {
            rx,
            handler: Some(Box::pin(handler)),
            error: None,
            finished: false,
        }
    }
}

impl<T, E> Stream for PushStream<T, E> {
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        if let Poll::Ready(Some(value)) = this.rx.poll_recv(cx) {
            return Poll::Ready(Some(Ok(value)));
        }

        if let Some(handler) = this.handler.as_mut() {
            match handler.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(result) => {
                    this.handler = None;
                    this.error = result.err();
                }
            }
        }

        // The handler is done: whatever it emitted is already queued.
        if let Ok(value) = this.rx.try_recv() {
            return Poll::Ready(Some(Ok(value)));
        }

        this.finished = true;
        this.rx.close();
        Poll::Ready(this.error.take().map(Err))
    }
}

/// Adapt a push-style handler into a stream handler.
///
/// ```ignore
/// let handler = to_stream_handler(|job: Job, emit: StreamEmitter<Progress>| async move {
///     for step in 0..job.steps {
///         emit.emit(Progress::Step(step));
///     }
///     emit.emit(Progress::Done);
///     Ok::<_, HandlerError>(())
/// });
/// define_stream_invoke_handler(&ctx, &events, Arc::new(handler));
/// ```
pub fn to_stream_handler<Req, Res, E, F, Fut>(
    handler: F,
) -> impl Fn(Req) -> PushStream<Res, E> + Send + Sync + 'static
where
    F: Fn(Req, StreamEmitter<Res>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    move |request| {
        let (tx, rx) = mpsc::unbounded_channel();
        PushStream::new(rx, handler(request, StreamEmitter { tx }))
    }
}
