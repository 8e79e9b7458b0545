//! Handling side of the stream protocol.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::Context;
use crate::error::{HandlerError, InvokeError};
use crate::event::Event;
use crate::invoke::{
    accept, check_keys, handler_key, register_wrapper, InvokeEvents, InvokeHandlerToken, Replier,
};

/// A type-erased stream handler, for [`define_stream_invoke_handlers`].
pub type BoxedStreamHandler<Res, Req> =
    Arc<dyn Fn(Req) -> BoxStream<'static, Result<Res, HandlerError>> + Send + Sync>;

/// Erase a stream handler's closure and stream types.
pub fn boxed_stream_handler<Res, Req, F, S>(handler: F) -> BoxedStreamHandler<Res, Req>
where
    F: Fn(Req) -> S + Send + Sync + 'static,
    S: Stream<Item = Result<Res, HandlerError>> + Send + 'static,
{
    Arc::new(move |req| handler(req).boxed())
}

/// Answer streamed requests on `events` with `handler`.
///
/// For each request the returned stream is drained on the context's
/// runtime: one correlated reply per item, then a stream-end. The first
/// `Err` item is sent as a correlated error and nothing follows it.
pub fn define_stream_invoke_handler<Res, Req, F, S, E>(
    ctx: &Context,
    events: &InvokeEvents<Res, Req>,
    handler: Arc<F>,
) -> InvokeHandlerToken
where
    F: Fn(Req) -> S + Send + Sync + ?Sized + 'static,
    S: Stream<Item = Result<Res, E>> + Send + 'static,
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
                tracing::warn!(send = %events.send.id, "no async runtime for stream handler");
                replier.error("no async runtime available to run stream handler");
                return;
            };
            let responses = (*handler)(request);
            runtime.spawn(drain(responses, replier));
        }
    })
}

async fn drain<S, Res, E>(responses: S, replier: Replier)
where
    S: Stream<Item = Result<Res, E>>,
    Res: Serialize,
    E: fmt::Display,
{
    let mut responses = std::pin::pin!(responses);
    while let Some(item) = responses.next().await {
        match item {
            Ok(value) => {
                if !replier.reply(&value) {
                    return;
                }
            }
            Err(e) => {
                replier.error(&e.to_string());
                return;
            }
        }
    }
    replier.end();
}

/// Remove a stream handler registration, or every one on the endpoint when
/// `token` is `None`.
pub fn undefine_stream_invoke_handler<Res, Req>(
    ctx: &Context,
    events: &InvokeEvents<Res, Req>,
    token: Option<&InvokeHandlerToken>,
) -> bool {
    crate::invoke::undefine_invoke_handler(ctx, events, token)
}

/// Register one stream handler per named endpoint. The key sets must match.
pub fn define_stream_invoke_handlers<Res, Req>(
    ctx: &Context,
    events: &BTreeMap<String, InvokeEvents<Res, Req>>,
    handlers: &BTreeMap<String, BoxedStreamHandler<Res, Req>>,
) -> Result<BTreeMap<String, InvokeHandlerToken>, InvokeError>
where
    Req: DeserializeOwned + 'static,
    Res: Serialize + Send + 'static,
{
    check_keys(events, handlers)?;

    Ok(events
        .iter()
        .map(|(name, events)| {
            let token = define_stream_invoke_handler(ctx, events, Arc::clone(&handlers[name]));
            (name.clone(), token)
        })
        .collect())
}
