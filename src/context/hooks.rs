//! Adapter hooks invoked by the dispatch registry.

use crate::context::EmitOptions;
use crate::event::Event;
use crate::tag::Tag;

/// Hook pair a transport can install to mirror every local interaction
/// onto a physical channel instead of subscribing with a match expression.
///
/// Both methods default to no-ops.
pub trait ContextHooks: Send + Sync {
    /// Called once per `emit`, after all in-process delivery.
    fn on_sent(&self, tag: &Tag, event: &Event, options: &EmitOptions) {
        let _ = (tag, event, options);
    }

    /// Called after each listener registered with `on`/`once` has run.
    fn on_received(&self, tag: &Tag, event: &Event) {
        let _ = (tag, event);
    }
}
