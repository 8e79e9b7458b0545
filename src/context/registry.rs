//! Listener storage behind a [`Context`](super::Context).
//!
//! Pure bookkeeping: nothing here runs user code. The context snapshots what
//! it needs under the lock and calls listeners after releasing it.

use std::collections::HashMap;
use std::sync::Arc;

use super::{EmitOptions, ListenerId, Target};
use crate::event::Event;
use crate::matcher::MatchExpression;
use crate::tag::Tag;

pub(crate) type Listener = Arc<dyn Fn(&Event, &EmitOptions) + Send + Sync>;

struct Entry {
    id: ListenerId,
    listener: Listener,
}

/// Listeners snapshotted for one match expression during an emit.
pub(crate) struct MatchedListeners {
    pub persistent: Vec<Listener>,
    pub once: Vec<Listener>,
}

#[derive(Default)]
pub(crate) struct Registry {
    listeners: HashMap<Tag, Vec<Entry>>,
    once_listeners: HashMap<Tag, Vec<Entry>>,
    /// Expressions that currently have listeners, in registration order.
    expressions: Vec<MatchExpression>,
    match_listeners: HashMap<String, Vec<Entry>>,
    match_once_listeners: HashMap<String, Vec<Entry>>,
}

impl Registry {
    pub fn add(&mut self, target: &Target, id: ListenerId, listener: Listener, once: bool) {
        let entry = Entry { id, listener };
        match target {
            Target::Tag(tag) => {
                let map = if once {
                    &mut self.once_listeners
                } else {
                    &mut self.listeners
                };
                map.entry(tag.clone()).or_default().push(entry);
            }
            Target::Match(expr) => {
                if !self.expressions.iter().any(|e| e.id() == expr.id()) {
                    self.expressions.push(expr.clone());
                }
                let map = if once {
                    &mut self.match_once_listeners
                } else {
                    &mut self.match_listeners
                };
                map.entry(expr.id().to_string()).or_default().push(entry);
            }
        }
    }

    /// Remove every listener bound to the target. Returns how many were removed.
    pub fn remove_all(&mut self, target: &Target) -> usize {
        match target {
            Target::Tag(tag) => {
                let persistent = self.listeners.remove(tag).map_or(0, |v| v.len());
                let once = self.once_listeners.remove(tag).map_or(0, |v| v.len());
                persistent + once
            }
            Target::Match(expr) => {
                let persistent = self.match_listeners.remove(expr.id()).map_or(0, |v| v.len());
                let once = self
                    .match_once_listeners
                    .remove(expr.id())
                    .map_or(0, |v| v.len());
                self.expressions.retain(|e| e.id() != expr.id());
                persistent + once
            }
        }
    }

    /// Remove a single listener by its id.
    pub fn remove(&mut self, target: &Target, id: ListenerId) -> bool {
        let removed = match target {
            Target::Tag(tag) => {
                remove_entry(&mut self.listeners, tag, id)
                    || remove_entry(&mut self.once_listeners, tag, id)
            }
            Target::Match(expr) => {
                let key = expr.id().to_string();
                remove_entry(&mut self.match_listeners, &key, id)
                    || remove_entry(&mut self.match_once_listeners, &key, id)
            }
        };
        if let Target::Match(expr) = target {
            self.prune_expression(expr.id());
        }
        removed
    }

    /// Persistent listeners for a tag, plus its once listeners which are
    /// removed from the registry as they are handed out.
    pub fn take_for_tag(&mut self, tag: &Tag) -> (Vec<Listener>, Vec<Listener>) {
        let persistent = self
            .listeners
            .get(tag)
            .map(|entries| entries.iter().map(|e| Arc::clone(&e.listener)).collect())
            .unwrap_or_default();
        let once = self
            .once_listeners
            .remove(tag)
            .map(|entries| entries.into_iter().map(|e| e.listener).collect())
            .unwrap_or_default();
        (persistent, once)
    }

    pub fn expressions(&self) -> Vec<MatchExpression> {
        self.expressions.clone()
    }

    /// Snapshot listeners for the given expressions, consuming once listeners.
    pub fn take_for_matches(&mut self, matched: &[MatchExpression]) -> Vec<MatchedListeners> {
        let mut batches = Vec::with_capacity(matched.len());
        for expr in matched {
            let persistent = self
                .match_listeners
                .get(expr.id())
                .map(|entries| entries.iter().map(|e| Arc::clone(&e.listener)).collect())
                .unwrap_or_default();
            let once = self
                .match_once_listeners
                .remove(expr.id())
                .map(|entries| entries.into_iter().map(|e| e.listener).collect())
                .unwrap_or_default();
            batches.push(MatchedListeners { persistent, once });
        }
        for expr in matched {
            self.prune_expression(expr.id());
        }
        batches
    }

    pub fn count(&self, target: &Target) -> usize {
        match target {
            Target::Tag(tag) => {
                self.listeners.get(tag).map_or(0, Vec::len)
                    + self.once_listeners.get(tag).map_or(0, Vec::len)
            }
            Target::Match(expr) => {
                self.match_listeners.get(expr.id()).map_or(0, Vec::len)
                    + self.match_once_listeners.get(expr.id()).map_or(0, Vec::len)
            }
        }
    }

    pub fn has_tag_listeners(&self, tag: &Tag) -> bool {
        self.count(&Target::Tag(tag.clone())) > 0
    }

    fn prune_expression(&mut self, id: &str) {
        let empty = |map: &HashMap<String, Vec<Entry>>| map.get(id).map_or(true, Vec::is_empty);
        if empty(&self.match_listeners) && empty(&self.match_once_listeners) {
            self.match_listeners.remove(id);
            self.match_once_listeners.remove(id);
            self.expressions.retain(|e| e.id() != id);
        }
    }
}

fn remove_entry<K, Q>(map: &mut HashMap<K, Vec<Entry>>, key: &Q, id: ListenerId) -> bool
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
{
    let Some(entries) = map.get_mut(key) else {
        return false;
    };
    let before = entries.len();
    entries.retain(|e| e.id != id);
    let removed = entries.len() != before;
    if entries.is_empty() {
        map.remove(key);
    }
    removed
}
