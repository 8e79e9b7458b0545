//! Request/response over plain events.
//!
//! An endpoint is an [`InvokeEvents`] family. The caller emits
//! `{invokeId, content}` on `send`; the handler answers on `receive` or
//! `receive_error` with the same `invokeId`. Because both sides only use
//! `on`/`emit`, an invoke works unchanged across any transport bridging two
//! contexts.
//!
//! ```ignore
//! let events = define_invoke_events::<Greeting, User>(Some("greet"));
//! define_invoke_handler(&ctx, &events, Arc::new(|user: User| async move {
//!     Ok::<_, HandlerError>(Greeting { text: format!("hi {}", user.name) })
//! }));
//! let greet = define_invoke(&ctx, &events);
//! let greeting = greet.call(User { name: "alice".into() }).await?;
//! ```

mod client;
mod envelope;
mod events;
mod handler;
mod pending;

pub use client::{define_invoke, define_invokes, Invoke};
pub use envelope::InvokePayload;
pub use events::{define_invoke_events, InvokeEvents};
pub use handler::{
    boxed_invoke_handler, define_invoke_handler, define_invoke_handlers, undefine_invoke_handler,
    BoxedInvokeHandler, InvokeHandlerToken,
};

pub(crate) use envelope::{error_message, Replier};
pub(crate) use handler::{accept, check_keys, handler_key, register_wrapper};
pub(crate) use pending::PendingCalls;
