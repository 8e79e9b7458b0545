//! Calling side of the stream protocol.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use futures::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::context::{Context, EmitOptions, ListenerId};
use crate::error::InvokeError;
use crate::event::Event;
use crate::invoke::{error_message, InvokeEvents, InvokePayload, PendingCalls};
use crate::tag::generate_id;

enum Frame {
    Item(Value),
    Error(InvokeError),
}

type FrameSender = mpsc::UnboundedSender<Frame>;

/// A typed streaming caller bound to one context and endpoint.
///
/// Holds stable listeners on the receive, receive-error and
/// receive-stream-end events; each stream registers only an entry in the
/// pending map.
pub struct StreamInvoke<Res, Req = ()> {
    ctx: Context,
    events: InvokeEvents<Res, Req>,
    pending: PendingCalls<FrameSender>,
    listeners: [ListenerId; 3],
}

impl<Res, Req> fmt::Debug for StreamInvoke<Res, Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamInvoke")
            .field("events", &self.events)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Build a streaming caller for `events` on `ctx`.
pub fn define_stream_invoke<Res, Req>(
    ctx: &Context,
    events: &InvokeEvents<Res, Req>,
) -> StreamInvoke<Res, Req> {
    let pending: PendingCalls<FrameSender> = PendingCalls::default();

    let on_item = pending.clone();
    let item_listener = ctx.on(&events.receive, move |event, _| {
        let Some(payload) = InvokePayload::from_event(event) else {
            return;
        };
        on_item.with(&payload.invoke_id, |tx| {
            let _ = tx.send(Frame::Item(payload.content.clone()));
        });
    });

    let on_error = pending.clone();
    let error_listener = ctx.on(&events.receive_error, move |event, _| {
        let Some(payload) = InvokePayload::from_event(event) else {
            return;
        };
        if let Some(tx) = on_error.take(&payload.invoke_id) {
            let _ = tx.send(Frame::Error(InvokeError::Handler {
                message: error_message(&payload.content),
            }));
        }
    });

    let on_end = pending.clone();
    let end_listener = ctx.on(&events.receive_stream_end, move |event, _| {
        if let Some(payload) = InvokePayload::from_event(event) {
            // Dropping the sender ends the stream after queued items.
            on_end.take(&payload.invoke_id);
        }
    });

    StreamInvoke {
        ctx: ctx.clone(),
        events: events.clone(),
        pending,
        listeners: [item_listener, error_listener, end_listener],
    }
}

/// Build one streaming caller per named endpoint.
pub fn define_stream_invokes<Res, Req>(
    ctx: &Context,
    events: &BTreeMap<String, InvokeEvents<Res, Req>>,
) -> BTreeMap<String, StreamInvoke<Res, Req>> {
    events
        .iter()
        .map(|(name, events)| (name.clone(), define_stream_invoke(ctx, events)))
        .collect()
}

impl<Res, Req> StreamInvoke<Res, Req>
where
    Res: DeserializeOwned,
    Req: Serialize,
{
    /// Start a streamed call. Nothing is sent until the stream is first
    /// polled.
    pub fn call(&self, request: Req) -> InvokeStream<Res> {
        self.call_with(request, EmitOptions::default())
    }

    /// [`call`](Self::call) with options passed through to the request emit.
    pub fn call_with(&self, request: Req, options: EmitOptions) -> InvokeStream<Res> {
        let content =
            serde_json::to_value(&request).map_err(|e| InvokeError::EncodeFailed(e.to_string()));
        InvokeStream {
            state: State::Idle(content),
            ctx: self.ctx.clone(),
            send: self.events.send.clone(),
            options,
            pending: self.pending.clone(),
            invoke_id: generate_id(),
            _res: PhantomData,
        }
    }
}

impl<Res, Req> StreamInvoke<Res, Req> {
    pub fn events(&self) -> &InvokeEvents<Res, Req> {
        &self.events
    }

    /// Number of streams still open.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl<Res, Req> Drop for StreamInvoke<Res, Req> {
    fn drop(&mut self) {
        let [item, error, end] = self.listeners;
        self.ctx.remove_listener(&self.events.receive, item);
        self.ctx.remove_listener(&self.events.receive_error, error);
        self.ctx.remove_listener(&self.events.receive_stream_end, end);
        for tx in self.pending.drain() {
            let _ = tx.send(Frame::Error(InvokeError::Closed));
        }
    }
}

enum State {
    Idle(Result<Value, InvokeError>),
    Running(mpsc::UnboundedReceiver<Frame>),
    Done,
}

/// Responses of one streamed call, in the order the handler produced them.
///
/// Ends after the handler's stream-end, or with one `Err` item when the
/// handler fails or a response does not decode. Dropping it stops listening
/// for further responses.
#[must_use = "streams do nothing unless polled"]
pub struct InvokeStream<Res> {
    state: State,
    ctx: Context,
    send: Event,
    options: EmitOptions,
    pending: PendingCalls<FrameSender>,
    invoke_id: String,
    _res: PhantomData<fn() -> Res>,
}

impl<Res> fmt::Debug for InvokeStream<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Idle(_) => "idle",
            State::Running(_) => "running",
            State::Done => "done",
        };
        f.debug_struct("InvokeStream")
            .field("send", &self.send.id)
            .field("invoke_id", &self.invoke_id)
            .field("state", &state)
            .finish()
    }
}

impl<Res> InvokeStream<Res> {
    pub fn invoke_id(&self) -> &str {
        &self.invoke_id
    }

    fn start(
        &mut self,
        content: Result<Value, InvokeError>,
    ) -> Result<mpsc::UnboundedReceiver<Frame>, InvokeError> {
        let body = InvokePayload::new(self.invoke_id.clone(), content?).into_value();
        if !self.ctx.is_deliverable(&self.send.with_body(body.clone())) {
            return Err(InvokeError::NoHandler(self.send.id.clone()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.pending.insert(self.invoke_id.clone(), tx);
        self.ctx.emit_with(&self.send, body, &self.options);
        Ok(rx)
    }

    fn finish(&mut self) {
        self.state = State::Done;
        self.pending.take(&self.invoke_id);
    }
}

impl<Res: DeserializeOwned> Stream for InvokeStream<Res> {
    type Item = Result<Res, InvokeError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let State::Idle(_) = this.state {
            let State::Idle(content) = std::mem::replace(&mut this.state, State::Done) else {
                return Poll::Ready(None);
            };
            match this.start(content) {
                Ok(rx) => this.state = State::Running(rx),
                Err(e) => return Poll::Ready(Some(Err(e))),
            }
        }

        let State::Running(rx) = &mut this.state else {
            return Poll::Ready(None);
        };

        match rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Frame::Item(content))) => match serde_json::from_value(content) {
                Ok(item) => Poll::Ready(Some(Ok(item))),
                Err(e) => {
                    this.finish();
                    Poll::Ready(Some(Err(InvokeError::DecodeFailed(e.to_string()))))
                }
            },
            Poll::Ready(Some(Frame::Error(e))) => {
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
        }
    }
}

impl<Res> Drop for InvokeStream<Res> {
    fn drop(&mut self) {
        self.pending.take(&self.invoke_id);
    }
}
