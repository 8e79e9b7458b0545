//! Match expressions: named predicates over materialized events.
//!
//! A listener bound to a match expression fires for every emitted event the
//! predicate accepts, regardless of the event's tag.
//!
//! ```ignore
//! // Forward everything that is not an inbound echo
//! ctx.on(&outbound_filter(), |event, _| wire.send(event));
//!
//! // Combine predicates
//! let errors = and([outbound_filter(), match_by(|e| e.kind == Some(EventKind::TransportError))]);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::event::Event;
use crate::tag::generate_id;

type Predicate = dyn Fn(&Event) -> bool + Send + Sync;

/// A named predicate selecting a class of events.
///
/// Identity is the generated id, never the predicate itself: two expressions
/// built from the same closure are distinct subscriptions.
#[derive(Clone)]
pub struct MatchExpression {
    id: String,
    predicate: Arc<Predicate>,
}

impl MatchExpression {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        Self {
            id: format!("match-{}", generate_id()),
            predicate: Arc::new(predicate),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn matches(&self, event: &Event) -> bool {
        (self.predicate)(event)
    }
}

impl fmt::Debug for MatchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchExpression")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

pub fn match_by<F>(predicate: F) -> MatchExpression
where
    F: Fn(&Event) -> bool + Send + Sync + 'static,
{
    MatchExpression::new(predicate)
}

/// Accepts every event.
pub fn match_any() -> MatchExpression {
    MatchExpression::new(|_| true)
}

/// Accepts an event when every expression does.
pub fn and(expressions: impl IntoIterator<Item = MatchExpression>) -> MatchExpression {
    let expressions: Vec<MatchExpression> = expressions.into_iter().collect();
    MatchExpression::new(move |event| expressions.iter().all(|e| e.matches(event)))
}

/// Accepts an event when any expression does.
pub fn or(expressions: impl IntoIterator<Item = MatchExpression>) -> MatchExpression {
    let expressions: Vec<MatchExpression> = expressions.into_iter().collect();
    MatchExpression::new(move |event| expressions.iter().any(|e| e.matches(event)))
}

/// Events a transport should write to the wire: direction `Outbound` or unset.
pub fn outbound_filter() -> MatchExpression {
    MatchExpression::new(Event::is_outbound_or_undirected)
}
