//! Bridges between a [`Context`] and a physical channel.
//!
//! Every transport follows the same contract:
//!
//! 1. A listener on [`wire_filter`] serializes each outbound or undirected
//!    event into a [`WireEnvelope`] and hands the text to the channel.
//! 2. Text arriving from the channel is decoded and re-emitted as an
//!    `Inbound` event, which the wire filter never forwards again.
//! 3. Decode and connection failures are emitted on
//!    [`transport_error_event`] instead of escaping the receive callback.
//!
//! Available transports:
//!
//! - [`channel`]: in-process duplex pair over Tokio channels
//! - [`emitter`]: `event_emitter_rs` bridge (requires "emitter" feature)
//! - [`ws`]: axum WebSocket hub (requires "ws" feature)

pub mod channel;
#[cfg(feature = "emitter")]
pub mod emitter;
#[cfg(feature = "ws")]
pub mod ws;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::context::{Context, ListenerId, WeakContext};
use crate::error::TransportError;
use crate::event::{Event, EventKind};
use crate::matcher::{and, match_by, outbound_filter, MatchExpression};
use crate::tag::{generate_id, Tag};

/// Tag of the event carrying transport failures. Body: `{"error": String}`.
pub const TRANSPORT_ERROR: &str = "eventa:transport:error";
/// Tag of the event emitted when a peer connects. Body: `{"id": String}`.
pub const PEER_CONNECTED: &str = "eventa:transport:connected";
/// Tag of the event emitted when a peer disconnects. Body: `{"id": String}`.
pub const PEER_DISCONNECTED: &str = "eventa:transport:disconnected";

pub fn transport_error_event() -> Event {
    Event::new(TRANSPORT_ERROR).with_kind(EventKind::TransportError)
}

pub fn peer_connected_event() -> Event {
    Event::new(PEER_CONNECTED).with_kind(EventKind::PeerConnected)
}

pub fn peer_disconnected_event() -> Event {
    Event::new(PEER_DISCONNECTED).with_kind(EventKind::PeerDisconnected)
}

/// Events a transport writes to the wire: outbound or undirected, and not
/// one of the transport's own local notifications.
pub fn wire_filter() -> MatchExpression {
    and([
        outbound_filter(),
        match_by(|event| {
            !matches!(
                event.kind,
                Some(EventKind::TransportError | EventKind::PeerConnected | EventKind::PeerDisconnected)
            )
        }),
    ])
}

/// Body of a wire envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePayload {
    #[serde(default)]
    pub body: Value,
}

/// What travels over the wire: `{"id", "type", "payload": {"body"}, "timestamp"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub tag: Tag,
    pub payload: WirePayload,
    /// Milliseconds since the Unix epoch at encoding time.
    #[serde(default)]
    pub timestamp: u64,
}

impl WireEnvelope {
    pub fn from_event(event: &Event) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        Self {
            id: generate_id(),
            tag: event.id.clone(),
            payload: WirePayload {
                body: event.body.clone().unwrap_or(Value::Null),
            },
            timestamp,
        }
    }

    pub fn encode(&self) -> Result<String, TransportError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self, TransportError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Re-emit the carried event on `ctx`, marked inbound.
    pub fn emit_inbound(self, ctx: &Context) {
        ctx.emit_inbound(self.tag, self.payload.body);
    }
}

/// Decode wire text and re-emit it inbound, reporting failures on `ctx`.
pub(crate) fn receive_text(ctx: &Context, text: &str) -> Result<(), TransportError> {
    match WireEnvelope::decode(text) {
        Ok(envelope) => {
            envelope.emit_inbound(ctx);
            Ok(())
        }
        Err(e) => {
            report_error(ctx, &e);
            Err(e)
        }
    }
}

pub(crate) fn report_error(ctx: &Context, error: &TransportError) {
    tracing::warn!(error = %error, "transport failure");
    ctx.emit(&transport_error_event(), json!({ "error": error.to_string() }));
}

/// Message counts for one attached transport.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransportStats {
    /// Envelopes handed to the channel.
    pub sent: usize,
    /// Envelopes decoded and re-emitted.
    pub received: usize,
    /// Envelopes that failed to encode, send or decode.
    pub failed: usize,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    sent: AtomicUsize,
    received: AtomicUsize,
    failed: AtomicUsize,
}

impl StatsCounter {
    pub fn sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransportStats {
        TransportStats {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Handle to an attached transport. Drop or call `stop()` to detach.
pub struct TransportHandle {
    ctx: WeakContext,
    filter: MatchExpression,
    listener: ListenerId,
    stats: Arc<StatsCounter>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("filter", &self.filter)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl TransportHandle {
    pub(crate) fn new(
        ctx: &Context,
        filter: MatchExpression,
        listener: ListenerId,
        stats: Arc<StatsCounter>,
    ) -> Self {
        Self {
            ctx: ctx.downgrade(),
            filter,
            listener,
            stats,
            stop_tx: None,
            task: None,
            detach: None,
        }
    }

    pub(crate) fn with_task(mut self, stop_tx: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        self.stop_tx = Some(stop_tx);
        self.task = Some(task);
        self
    }

    #[cfg_attr(not(feature = "emitter"), allow(dead_code))]
    pub(crate) fn with_detach(mut self, detach: impl FnOnce() + Send + 'static) -> Self {
        self.detach = Some(Box::new(detach));
        self
    }

    /// Counts so far.
    pub fn stats(&self) -> TransportStats {
        self.stats.snapshot()
    }

    /// Detach from the context and the channel, wait for the reader to
    /// finish, and return final counts.
    pub async fn stop(mut self) -> TransportStats {
        self.shutdown();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.stats.snapshot()
    }

    /// Detach without waiting for the reader.
    pub fn signal_stop(&mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(ctx) = self.ctx.upgrade() {
            ctx.remove_listener(&self.filter, self.listener);
        }
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
