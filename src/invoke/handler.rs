//! Handling side of the invoke protocol.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::envelope::{InvokePayload, Replier};
use super::events::InvokeEvents;
use crate::context::{Context, HandlerKey, Target, WeakContext};
use crate::error::{HandlerError, InvokeError};
use crate::event::Event;

/// A type-erased async invoke handler, for registering handlers of
/// different closure types through [`define_invoke_handlers`].
pub type BoxedInvokeHandler<Res, Req> =
    Arc<dyn Fn(Req) -> BoxFuture<'static, Result<Res, HandlerError>> + Send + Sync>;

/// Erase a handler's closure type.
pub fn boxed_invoke_handler<Res, Req, F, Fut>(handler: F) -> BoxedInvokeHandler<Res, Req>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, HandlerError>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(handler(req)) as BoxFuture<'static, _>)
}

/// Registration handle returned by the `define_*_handler` functions.
///
/// Registering the same `Arc` on the same endpoint twice yields equal
/// tokens backed by one subscription. Disposing any of them removes it.
#[derive(Clone)]
pub struct InvokeHandlerToken {
    ctx: Context,
    send: Event,
    key: HandlerKey,
}

impl InvokeHandlerToken {
    /// Remove this handler's subscription. Returns whether it was registered.
    pub fn dispose(&self) -> bool {
        remove_registration(&self.ctx, &self.send, &self.key)
    }

    pub fn is_registered(&self) -> bool {
        self.ctx.handler_registrations().contains_key(&self.key)
    }
}

impl PartialEq for InvokeHandlerToken {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for InvokeHandlerToken {}

impl fmt::Debug for InvokeHandlerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokeHandlerToken")
            .field("send", &self.send.id)
            .field("handler", &format_args!("{:#x}", self.key.1))
            .finish()
    }
}

/// Answer requests on `events` with `handler`.
///
/// Each request is decoded, passed to the handler on the context's runtime,
/// and answered with a correlated reply, or a correlated error when the
/// handler fails or the request content does not decode. Requests without an
/// invoke id are ignored.
pub fn define_invoke_handler<Res, Req, F, Fut, E>(
    ctx: &Context,
    events: &InvokeEvents<Res, Req>,
    handler: Arc<F>,
) -> InvokeHandlerToken
where
    F: Fn(Req) -> Fut + Send + Sync + ?Sized + 'static,
    Fut: Future<Output = Result<Res, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
    Req: DeserializeOwned + 'static,
    Res: Serialize + Send + 'static,
{
    let key = handler_key(&events.send, &handler);
    register_wrapper(ctx, &events.send, key, |weak| {
        let events = events.clone();
        move |event: &Event| {
            let Some((ctx, replier, request)) = accept::<Req, _, _>(&weak, &events, event) else {
                return;
            };
            let Some(runtime) = ctx.runtime_handle() else {
                tracing::warn!(send = %events.send.id, "no async runtime for invoke handler");
                replier.error("no async runtime available to run invoke handler");
                return;
            };
            let pending = (*handler)(request);
            runtime.spawn(async move {
                match pending.await {
                    Ok(response) => {
                        replier.reply(&response);
                    }
                    Err(e) => replier.error(&e.to_string()),
                }
            });
        }
    })
}

/// Remove a handler registration, or every handler registration on the
/// endpoint when `token` is `None`. Returns whether anything was removed.
pub fn undefine_invoke_handler<Res, Req>(
    ctx: &Context,
    events: &InvokeEvents<Res, Req>,
    token: Option<&InvokeHandlerToken>,
) -> bool {
    match token {
        Some(token) => remove_registration(ctx, &events.send, &token.key),
        None => {
            let removed: Vec<_> = {
                let mut registrations = ctx.handler_registrations();
                let keys: Vec<HandlerKey> = registrations
                    .keys()
                    .filter(|(tag, _)| *tag == events.send.id)
                    .cloned()
                    .collect();
                keys.iter()
                    .filter_map(|key| registrations.remove(key))
                    .collect()
            };
            for id in &removed {
                ctx.remove_listener(&events.send, *id);
            }
            !removed.is_empty()
        }
    }
}

/// Register one handler per named endpoint. The key sets must match exactly.
pub fn define_invoke_handlers<Res, Req>(
    ctx: &Context,
    events: &BTreeMap<String, InvokeEvents<Res, Req>>,
    handlers: &BTreeMap<String, BoxedInvokeHandler<Res, Req>>,
) -> Result<BTreeMap<String, InvokeHandlerToken>, InvokeError>
where
    Req: DeserializeOwned + 'static,
    Res: Serialize + Send + 'static,
{
    check_keys(events, handlers)?;

    Ok(events
        .iter()
        .map(|(name, events)| {
            let token = define_invoke_handler(ctx, events, Arc::clone(&handlers[name]));
            (name.clone(), token)
        })
        .collect())
}

/// Fail unless `events` and `handlers` name exactly the same endpoints.
pub(crate) fn check_keys<E, H>(
    events: &BTreeMap<String, E>,
    handlers: &BTreeMap<String, H>,
) -> Result<(), InvokeError> {
    let missing_handlers: Vec<String> = events
        .keys()
        .filter(|name| !handlers.contains_key(*name))
        .cloned()
        .collect();
    let missing_events: Vec<String> = handlers
        .keys()
        .filter(|name| !events.contains_key(*name))
        .cloned()
        .collect();
    if missing_handlers.is_empty() && missing_events.is_empty() {
        return Ok(());
    }
    Err(InvokeError::MismatchedKeys {
        missing_handlers,
        missing_events,
    })
}

pub(crate) fn handler_key<F: ?Sized>(send: &Event, handler: &Arc<F>) -> HandlerKey {
    (send.id.clone(), Arc::as_ptr(handler) as *const () as usize)
}

/// Subscribe a wrapper on `send` unless `key` is already registered.
pub(crate) fn register_wrapper<B, W>(
    ctx: &Context,
    send: &Event,
    key: HandlerKey,
    build: B,
) -> InvokeHandlerToken
where
    B: FnOnce(WeakContext) -> W,
    W: Fn(&Event) + Send + Sync + 'static,
{
    let token = InvokeHandlerToken {
        ctx: ctx.clone(),
        send: send.clone(),
        key: key.clone(),
    };

    let mut registrations = ctx.handler_registrations();
    if registrations.contains_key(&key) {
        tracing::debug!(send = %send.id, "handler already registered");
        return token;
    }

    let wrapper = build(ctx.downgrade());
    let id = ctx.on(Target::from(send), move |event, _| wrapper(event));
    registrations.insert(key, id);
    token
}

/// Decode an incoming request. `None` when the event is not a request for
/// us; malformed content is answered with a correlated error.
pub(crate) fn accept<Req, Res, ReqT>(
    weak: &WeakContext,
    events: &InvokeEvents<Res, ReqT>,
    event: &Event,
) -> Option<(Context, Replier, Req)>
where
    Req: DeserializeOwned,
{
    let Some(payload) = InvokePayload::from_event(event) else {
        tracing::debug!(tag = %event.id, "ignoring request without invoke id");
        return None;
    };
    let ctx = weak.upgrade()?;
    let replier = Replier {
        ctx: ctx.clone(),
        receive: events.receive.clone(),
        receive_error: events.receive_error.clone(),
        receive_stream_end: events.receive_stream_end.clone(),
        invoke_id: payload.invoke_id,
    };
    match serde_json::from_value(payload.content) {
        Ok(request) => Some((ctx, replier, request)),
        Err(e) => {
            replier.error(&format!("decode failed: {}", e));
            None
        }
    }
}

fn remove_registration(ctx: &Context, send: &Event, key: &HandlerKey) -> bool {
    let removed = ctx.handler_registrations().remove(key);
    match removed {
        Some(id) => ctx.remove_listener(send, id),
        None => false,
    }
}
