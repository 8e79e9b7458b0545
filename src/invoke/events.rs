//! The five-event family behind one invoke endpoint.

use std::fmt;
use std::marker::PhantomData;

use crate::event::{Event, EventKind};
use crate::tag::Tag;

/// Events for one request/response endpoint, typed by response `Res` and
/// request `Req`. The types carry no runtime weight.
///
/// Tags are derived from a base tag:
///
/// | field | tag |
/// |---|---|
/// | `send` | `{tag}-send` |
/// | `send_error` | `{tag}-send-error` |
/// | `receive` | `{tag}-receive` |
/// | `receive_error` | `{tag}-receive-error` |
/// | `receive_stream_end` | `{tag}-receive-stream-end` |
pub struct InvokeEvents<Res, Req = ()> {
    pub send: Event,
    pub send_error: Event,
    pub receive: Event,
    pub receive_error: Event,
    pub receive_stream_end: Event,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<Res, Req> InvokeEvents<Res, Req> {
    pub fn new(tag: impl Into<Tag>) -> Self {
        let tag = tag.into();
        let event = |suffix: &str, kind| Event::new(tag.derive(suffix)).with_kind(kind);
        Self {
            send: event("send", EventKind::InvokeSend),
            send_error: event("send-error", EventKind::InvokeSendError),
            receive: event("receive", EventKind::InvokeReceive),
            receive_error: event("receive-error", EventKind::InvokeReceiveError),
            receive_stream_end: event("receive-stream-end", EventKind::InvokeReceiveStreamEnd),
            _types: PhantomData,
        }
    }
}

impl<Res, Req> Clone for InvokeEvents<Res, Req> {
    fn clone(&self) -> Self {
        Self {
            send: self.send.clone(),
            send_error: self.send_error.clone(),
            receive: self.receive.clone(),
            receive_error: self.receive_error.clone(),
            receive_stream_end: self.receive_stream_end.clone(),
            _types: PhantomData,
        }
    }
}

impl<Res, Req> fmt::Debug for InvokeEvents<Res, Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokeEvents")
            .field("send", &self.send.id)
            .field("receive", &self.receive.id)
            .finish_non_exhaustive()
    }
}

/// Define an invoke endpoint, generating a base tag when none is given.
pub fn define_invoke_events<Res, Req>(tag: Option<&str>) -> InvokeEvents<Res, Req> {
    match tag {
        Some(tag) => InvokeEvents::new(tag),
        None => InvokeEvents::new(Tag::generate()),
    }
}
