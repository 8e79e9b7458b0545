//! Transport-agnostic event bus with request/response and streaming calls.
//!
//! Everything is built on one primitive, the [`Context`]: register
//! listeners by tag or match expression, emit events synchronously.
//! [`invoke`] layers correlated request/response calls over it and
//! [`stream`] adds multi-value responses. A [`transport`] bridges a context
//! to a physical channel so the same calls work across threads, processes
//! or sockets.

mod context;
mod error;
mod event;
mod matcher;
mod tag;

pub mod invoke;
pub mod stream;
pub mod transport;

pub use context::{
    Context, ContextConfig, ContextHooks, EmitOptions, ListenerId, Target, WeakContext,
};
pub use error::{HandlerError, InvokeError, TransportError};
pub use event::{define_event, Event, EventKind, FlowDirection};
pub use matcher::{and, match_any, match_by, or, outbound_filter, MatchExpression};
pub use tag::{generate_id, Tag};

pub use invoke::{
    boxed_invoke_handler, define_invoke, define_invoke_events, define_invoke_handler,
    define_invoke_handlers, define_invokes, undefine_invoke_handler, BoxedInvokeHandler, Invoke,
    InvokeEvents, InvokeHandlerToken, InvokePayload,
};
pub use stream::{
    boxed_stream_handler, define_stream_invoke, define_stream_invoke_handler,
    define_stream_invoke_handlers, define_stream_invokes, to_stream_handler,
    undefine_stream_invoke_handler, BoxedStreamHandler, InvokeStream, PushStream, StreamEmitter,
    StreamInvoke,
};
pub use transport::{TransportHandle, TransportStats, WireEnvelope};

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
