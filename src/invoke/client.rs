//! Calling side of the invoke protocol.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;

use super::envelope::{error_message, InvokePayload};
use super::events::InvokeEvents;
use super::pending::{PendingCalls, PendingGuard};
use crate::context::{Context, EmitOptions, ListenerId};
use crate::error::InvokeError;
use crate::tag::generate_id;

type Resolver = oneshot::Sender<Result<Value, InvokeError>>;

/// A typed request/response caller bound to one context and endpoint.
///
/// Holds one listener on the receive event and one on the receive-error
/// event for its whole life; every call registers only an entry in the
/// pending map. Dropping the `Invoke` removes both listeners.
pub struct Invoke<Res, Req = ()> {
    ctx: Context,
    events: InvokeEvents<Res, Req>,
    pending: PendingCalls<Resolver>,
    listeners: [ListenerId; 2],
    _types: PhantomData<fn(Req) -> Res>,
}

impl<Res, Req> fmt::Debug for Invoke<Res, Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoke")
            .field("events", &self.events)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Build a caller for `events` on `ctx`.
pub fn define_invoke<Res, Req>(ctx: &Context, events: &InvokeEvents<Res, Req>) -> Invoke<Res, Req> {
    let pending: PendingCalls<Resolver> = PendingCalls::default();

    let on_reply = pending.clone();
    let reply_listener = ctx.on(&events.receive, move |event, _| {
        let Some(payload) = InvokePayload::from_event(event) else {
            return;
        };
        if let Some(resolver) = on_reply.take(&payload.invoke_id) {
            let _ = resolver.send(Ok(payload.content));
        }
    });

    let on_error = pending.clone();
    let error_listener = ctx.on(&events.receive_error, move |event, _| {
        let Some(payload) = InvokePayload::from_event(event) else {
            return;
        };
        if let Some(resolver) = on_error.take(&payload.invoke_id) {
            let _ = resolver.send(Err(InvokeError::Handler {
                message: error_message(&payload.content),
            }));
        }
    });

    Invoke {
        ctx: ctx.clone(),
        events: events.clone(),
        pending,
        listeners: [reply_listener, error_listener],
        _types: PhantomData,
    }
}

/// Build one caller per named endpoint.
pub fn define_invokes<Res, Req>(
    ctx: &Context,
    events: &BTreeMap<String, InvokeEvents<Res, Req>>,
) -> BTreeMap<String, Invoke<Res, Req>> {
    events
        .iter()
        .map(|(name, events)| (name.clone(), define_invoke(ctx, events)))
        .collect()
}

impl<Res, Req> Invoke<Res, Req>
where
    Res: DeserializeOwned,
    Req: Serialize,
{
    /// Send `request` and wait for the correlated reply.
    ///
    /// Fails immediately with [`InvokeError::NoHandler`] when nothing in the
    /// context would receive the request. There is no deadline; see
    /// [`call_with_timeout`](Self::call_with_timeout).
    pub async fn call(&self, request: Req) -> Result<Res, InvokeError> {
        self.call_with(request, &EmitOptions::default()).await
    }

    /// [`call`](Self::call) with options passed through to the request emit.
    pub async fn call_with(&self, request: Req, options: &EmitOptions) -> Result<Res, InvokeError> {
        let content =
            serde_json::to_value(&request).map_err(|e| InvokeError::EncodeFailed(e.to_string()))?;
        drop(request);

        let invoke_id = generate_id();
        let body = InvokePayload::new(invoke_id.clone(), content).into_value();
        if !self.ctx.is_deliverable(&self.events.send.with_body(body.clone())) {
            return Err(InvokeError::NoHandler(self.events.send.id.clone()));
        }

        let (resolver, reply) = oneshot::channel();
        self.pending.insert(invoke_id.clone(), resolver);
        let _guard = PendingGuard::new(self.pending.clone(), invoke_id);

        self.ctx.emit_with(&self.events.send, body, options);

        let content = reply.await.map_err(|_| InvokeError::Closed)??;
        serde_json::from_value(content).map_err(|e| InvokeError::DecodeFailed(e.to_string()))
    }

    /// [`call`](Self::call) that gives up after `timeout`.
    pub async fn call_with_timeout(&self, request: Req, timeout: Duration) -> Result<Res, InvokeError> {
        tokio::time::timeout(timeout, self.call(request))
            .await
            .map_err(|_| InvokeError::Timeout(timeout))?
    }
}

impl<Res, Req> Invoke<Res, Req> {
    pub fn events(&self) -> &InvokeEvents<Res, Req> {
        &self.events
    }

    /// Number of calls still waiting for a reply.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl<Res, Req> Drop for Invoke<Res, Req> {
    fn drop(&mut self) {
        let [reply, error] = self.listeners;
        self.ctx.remove_listener(&self.events.receive, reply);
        self.ctx.remove_listener(&self.events.receive_error, error);
        self.pending.clear();
    }
}
