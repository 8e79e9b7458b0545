//! Streamed responses over plain events.
//!
//! Uses the same [`InvokeEvents`](crate::invoke::InvokeEvents) family as
//! invoke. The handler answers one request with any number of `receive`
//! events, then one `receive_stream_end`, or a `receive_error` that ends the
//! stream with a failure. Responses for one call arrive in the order they
//! were produced.

mod bridge;
mod client;
mod handler;

pub use bridge::{to_stream_handler, PushStream, StreamEmitter};
pub use client::{define_stream_invoke, define_stream_invokes, InvokeStream, StreamInvoke};
pub use handler::{
    boxed_stream_handler, define_stream_invoke_handler, define_stream_invoke_handlers,
    undefine_stream_invoke_handler, BoxedStreamHandler,
};
