//! Transport over an `event_emitter_rs::EventEmitter`.
//!
//! Requires the `emitter` feature. `EventEmitter::emit` runs every callback
//! on a fresh thread, so outgoing envelopes go through one forwarder thread
//! that waits for each delivery before starting the next. Replies for one
//! invocation therefore arrive in the order they were emitted.
//!
//! Arrivals land on the emitter's threads, so contexts bridged this way
//! should be built with
//! [`ContextConfig::with_runtime`](crate::ContextConfig::with_runtime) for
//! their handlers to have a runtime to run on.
//!
//! Two contexts sharing one emitter use mirrored configs, so that each one
//! listens on the name the other sends on:
//!
//! ```ignore
//! let emitter = Arc::new(Mutex::new(EventEmitter::new()));
//! let config = EmitterConfig::default();
//! let a = emitter::attach(&ctx_a, emitter.clone(), config.clone());
//! let b = emitter::attach(&ctx_b, emitter, config.mirrored());
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use event_emitter_rs::EventEmitter;
use tokio::sync::mpsc;

use super::{receive_text, report_error, wire_filter, StatsCounter, TransportHandle, WireEnvelope};
use crate::context::Context;
use crate::error::TransportError;

pub type SharedEmitter = Arc<Mutex<EventEmitter>>;

/// Emitter event names used by one side of the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterConfig {
    /// Name outgoing envelopes are emitted under.
    /// Default: "eventa-message-out".
    pub send_event: String,
    /// Name incoming envelopes are read from.
    /// Default: "eventa-message-in".
    pub receive_event: String,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            send_event: "eventa-message-out".to_string(),
            receive_event: "eventa-message-in".to_string(),
        }
    }
}

impl EmitterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_send_event(mut self, name: impl Into<String>) -> Self {
        self.send_event = name.into();
        self
    }

    pub fn with_receive_event(mut self, name: impl Into<String>) -> Self {
        self.receive_event = name.into();
        self
    }

    /// The config for the other side: send and receive names swapped.
    pub fn mirrored(&self) -> Self {
        Self {
            send_event: self.receive_event.clone(),
            receive_event: self.send_event.clone(),
        }
    }
}

fn lock(emitter: &SharedEmitter) -> MutexGuard<'_, EventEmitter> {
    emitter.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bridge `ctx` to `emitter`.
///
/// Spawns the forwarder thread. It exits once the returned handle detaches.
pub fn attach(ctx: &Context, emitter: SharedEmitter, config: EmitterConfig) -> TransportHandle {
    let stats = Arc::new(StatsCounter::default());
    let (queue_tx, queue_rx) = mpsc::unbounded_channel::<String>();

    let filter = wire_filter();
    let weak = ctx.downgrade();
    let out_stats = Arc::clone(&stats);
    let listener = ctx.on(&filter, move |event, _| {
        let queued = WireEnvelope::from_event(event).encode().and_then(|text| {
            queue_tx
                .send(text)
                .map_err(|_| TransportError::Disconnected("emitter forwarder stopped".into()))
        });
        if let Err(e) = queued {
            out_stats.failed();
            if let Some(ctx) = weak.upgrade() {
                report_error(&ctx, &e);
            }
        }
    });

    forward(
        Arc::clone(&emitter),
        config.send_event.clone(),
        queue_rx,
        Arc::clone(&stats),
    );

    let weak = ctx.downgrade();
    let in_stats = Arc::clone(&stats);
    let receiver_id = lock(&emitter).on(&config.receive_event, move |text: String| {
        let Some(ctx) = weak.upgrade() else {
            return;
        };
        match receive_text(&ctx, &text) {
            Ok(()) => in_stats.received(),
            Err(_) => in_stats.failed(),
        }
    });

    tracing::debug!(
        send = %config.send_event,
        receive = %config.receive_event,
        "emitter transport attached"
    );

    TransportHandle::new(ctx, filter, listener, stats).with_detach(move || {
        lock(&emitter).remove_listener(&receiver_id);
    })
}

/// Drain `queue` onto `emitter`, one envelope at a time.
///
/// The emitter lock is released before the callback threads are joined, so
/// a receiver that replies synchronously only enqueues.
fn forward(
    emitter: SharedEmitter,
    send_event: String,
    mut queue: mpsc::UnboundedReceiver<String>,
    stats: Arc<StatsCounter>,
) {
    thread::spawn(move || {
        while let Some(text) = queue.blocking_recv() {
            let callbacks = lock(&emitter).emit(&send_event, text);
            for callback in callbacks {
                if callback.join().is_err() {
                    tracing::warn!(event = %send_event, "emitter listener panicked");
                }
            }
            stats.sent();
        }
        tracing::debug!(event = %send_event, "emitter forwarder stopped");
    });
}
