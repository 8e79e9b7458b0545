//! Dispatch registry: listener registration, matching and delivery.
//!
//! A `Context` is the only shared mutable state in the crate. Every other
//! layer (invoke, stream, transports) is built from `on`/`once`/`off`/`emit`
//! on a context.
//!
//! ## Delivery order
//!
//! ```text
//! emit(event, body)
//!   1. persistent listeners on the exact tag
//!   2. once listeners on the exact tag (removed as they fire)
//!   3. for each match expression accepting the event:
//!        its persistent listeners, then its once listeners
//!   4. ContextHooks::on_sent
//! ```
//!
//! `emit` is synchronous: when it returns, every in-process listener has
//! seen the event. Listeners run with no lock held and may emit again.
//!
//! A panicking listener unwinds out of `emit`; listeners after it are not
//! called for that emission.
//!
//! ## Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use eventa_rust::{Context, Event};
//! use serde_json::json;
//!
//! let ctx = Context::new();
//! let greeted = Event::define(Some("greeted"));
//! let count = Arc::new(AtomicUsize::new(0));
//!
//! let seen = Arc::clone(&count);
//! ctx.on(&greeted, move |event, _| {
//!     assert_eq!(event.body, Some(json!("hi")));
//!     seen.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! ctx.emit(&greeted, json!("hi"));
//! assert_eq!(count.load(Ordering::SeqCst), 1);
//! ```

mod config;
mod hooks;
mod registry;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tokio::runtime::Handle;

pub use config::{ContextConfig, EmitOptions};
pub use hooks::ContextHooks;

use crate::event::Event;
use crate::matcher::MatchExpression;
use crate::tag::Tag;
use registry::{Listener, Registry};

/// Handle for one registered listener, used for targeted removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// What a listener is bound to: an exact tag or a match expression.
#[derive(Debug, Clone)]
pub enum Target {
    Tag(Tag),
    Match(MatchExpression),
}

impl From<&Event> for Target {
    fn from(event: &Event) -> Self {
        Target::Tag(event.id.clone())
    }
}

impl From<&Tag> for Target {
    fn from(tag: &Tag) -> Self {
        Target::Tag(tag.clone())
    }
}

impl From<Tag> for Target {
    fn from(tag: Tag) -> Self {
        Target::Tag(tag)
    }
}

impl From<&MatchExpression> for Target {
    fn from(expr: &MatchExpression) -> Self {
        Target::Match(expr.clone())
    }
}

impl From<MatchExpression> for Target {
    fn from(expr: MatchExpression) -> Self {
        Target::Match(expr)
    }
}

/// Identity of an invoke/stream handler registration: the send tag plus the
/// address of the handler's `Arc` allocation.
pub(crate) type HandlerKey = (Tag, usize);

struct ContextInner {
    registry: Mutex<Registry>,
    handlers: Mutex<HashMap<HandlerKey, ListenerId>>,
    next_listener: AtomicU64,
    config: ContextConfig,
}

/// The dispatch registry. Cheap to clone; clones share listeners.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

/// Non-owning reference to a [`Context`].
#[derive(Clone)]
pub struct WeakContext {
    inner: Weak<ContextInner>,
}

impl WeakContext {
    pub fn upgrade(&self) -> Option<Context> {
        self.inner.upgrade().map(|inner| Context { inner })
    }
}

impl fmt::Debug for WeakContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakContext")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                registry: Mutex::new(Registry::default()),
                handlers: Mutex::new(HashMap::new()),
                next_listener: AtomicU64::new(1),
                config,
            }),
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// Register a persistent listener.
    pub fn on<T, F>(&self, target: T, listener: F) -> ListenerId
    where
        T: Into<Target>,
        F: Fn(&Event, &EmitOptions) + Send + Sync + 'static,
    {
        self.register(target.into(), Arc::new(listener), false)
    }

    /// Register a listener that fires at most once.
    pub fn once<T, F>(&self, target: T, listener: F) -> ListenerId
    where
        T: Into<Target>,
        F: Fn(&Event, &EmitOptions) + Send + Sync + 'static,
    {
        self.register(target.into(), Arc::new(listener), true)
    }

    /// Remove every listener, persistent and once, bound to the target.
    pub fn off<T: Into<Target>>(&self, target: T) {
        let target = target.into();
        let removed = self.registry().remove_all(&target);
        tracing::trace!(?target, removed, "listeners removed");
    }

    /// Remove one listener. Returns whether it was still registered.
    pub fn remove_listener<T: Into<Target>>(&self, target: T, id: ListenerId) -> bool {
        self.registry().remove(&target.into(), id)
    }

    pub fn listener_count<T: Into<Target>>(&self, target: T) -> usize {
        self.registry().count(&target.into())
    }

    /// Deliver `event` with `body` to every interested listener.
    pub fn emit(&self, event: &Event, body: Value) {
        self.emit_with(event, body, &EmitOptions::default());
    }

    /// [`emit`](Self::emit) with per-call options passed through to
    /// listeners and hooks.
    pub fn emit_with(&self, event: &Event, body: Value, options: &EmitOptions) {
        let event = event.with_body(body);

        let (persistent, once, expressions) = {
            let mut registry = self.registry();
            let (persistent, once) = registry.take_for_tag(&event.id);
            (persistent, once, registry.expressions())
        };

        for listener in persistent.iter().chain(once.iter()) {
            self.deliver(listener, &event, options);
        }

        let matched: Vec<MatchExpression> = expressions
            .into_iter()
            .filter(|expr| expr.matches(&event))
            .collect();

        if !matched.is_empty() {
            let batches = self.registry().take_for_matches(&matched);
            for batch in batches {
                for listener in batch.persistent.iter().chain(batch.once.iter()) {
                    self.deliver(listener, &event, options);
                }
            }
        }

        if let Some(hooks) = &self.inner.config.hooks {
            hooks.on_sent(&event.id, &event, options);
        }
    }

    /// Emit `body` on `tag` marked as having arrived from a transport.
    pub fn emit_inbound(&self, tag: impl Into<Tag>, body: Value) {
        self.emit(&Event::inbound(tag), body);
    }

    /// Whether emitting this event would reach anything: a listener on its
    /// tag, a match expression that accepts it, or installed hooks.
    pub fn is_deliverable(&self, event: &Event) -> bool {
        if self.inner.config.hooks.is_some() {
            return true;
        }
        let expressions = {
            let registry = self.registry();
            if registry.has_tag_listeners(&event.id) {
                return true;
            }
            registry.expressions()
        };
        expressions.iter().any(|expr| expr.matches(event))
    }

    /// The runtime handlers run on: the configured one, else the current one.
    pub(crate) fn runtime_handle(&self) -> Option<Handle> {
        self.inner
            .config
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
    }

    /// A handle that does not keep the context alive. Listeners stored in
    /// the context use this to reach it without forming a cycle.
    pub fn downgrade(&self) -> WeakContext {
        WeakContext {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn handler_registrations(&self) -> MutexGuard<'_, HashMap<HandlerKey, ListenerId>> {
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, target: Target, listener: Listener, once: bool) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.registry().add(&target, id, listener, once);
        id
    }

    fn deliver(&self, listener: &Listener, event: &Event, options: &EmitOptions) {
        listener(event, options);
        if let Some(hooks) = &self.inner.config.hooks {
            hooks.on_received(&event.id, event);
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
