//! WebSocket hub transport.
//!
//! Requires the `ws` feature. Uses axum for the upgrade route. Every
//! outbound event is sent to every connected peer; text frames from any
//! peer are re-emitted inbound. Peers coming and going are reported on
//! [`peer_connected_event`] and [`peer_disconnected_event`] with body
//! `{"id": <peer id>}`.
//!
//! ```ignore
//! let hub = WsHub::attach(&ctx, WsConfig::default());
//! let app = hub.router();   // compose with other axum routes
//! hub.serve("0.0.0.0:3000").await?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use super::{
    peer_connected_event, peer_disconnected_event, receive_text, report_error, wire_filter,
    StatsCounter, TransportStats, WireEnvelope,
};
use crate::context::{Context, ListenerId};
use crate::error::TransportError;
use crate::matcher::MatchExpression;
use crate::tag::generate_id;

/// Configuration for a [`WsHub`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsConfig {
    /// Route the upgrade handler is mounted on. Default: "/ws".
    pub path: String,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            path: "/ws".to_string(),
        }
    }
}

impl WsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

type Peers = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<String>>>>;

fn lock(peers: &Peers) -> MutexGuard<'_, HashMap<String, mpsc::UnboundedSender<String>>> {
    peers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A context bridged to any number of WebSocket peers. Cheap to clone.
///
/// The hub stops forwarding when the last clone is dropped.
#[derive(Clone)]
pub struct WsHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    ctx: Context,
    config: WsConfig,
    peers: Peers,
    stats: Arc<StatsCounter>,
    filter: MatchExpression,
    listener: ListenerId,
}

impl Drop for HubInner {
    fn drop(&mut self) {
        self.ctx.remove_listener(&self.filter, self.listener);
    }
}

impl std::fmt::Debug for WsHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsHub")
            .field("config", &self.inner.config)
            .field("peers", &self.peer_count())
            .finish_non_exhaustive()
    }
}

impl WsHub {
    /// Start forwarding `ctx`'s outbound events to connected peers.
    pub fn attach(ctx: &Context, config: WsConfig) -> Self {
        let peers: Peers = Arc::default();
        let stats = Arc::new(StatsCounter::default());

        let filter = wire_filter();
        let out_peers = Arc::clone(&peers);
        let out_stats = Arc::clone(&stats);
        let weak = ctx.downgrade();
        let listener = ctx.on(&filter, move |event, _| {
            let text = match WireEnvelope::from_event(event).encode() {
                Ok(text) => text,
                Err(e) => {
                    out_stats.failed();
                    if let Some(ctx) = weak.upgrade() {
                        report_error(&ctx, &e);
                    }
                    return;
                }
            };
            for (id, peer) in lock(&out_peers).iter() {
                match peer.send(text.clone()) {
                    Ok(()) => out_stats.sent(),
                    Err(_) => {
                        tracing::debug!(peer = %id, "dropping message for closing peer");
                        out_stats.failed();
                    }
                }
            }
        });

        Self {
            inner: Arc::new(HubInner {
                ctx: ctx.clone(),
                config,
                peers,
                stats,
                filter,
                listener,
            }),
        }
    }

    /// Register a peer. Returns the receiver of the text frames to write to it.
    pub fn add_peer(&self, id: impl Into<String>) -> mpsc::UnboundedReceiver<String> {
        let id = id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.inner.peers).insert(id.clone(), tx);
        tracing::debug!(peer = %id, "peer connected");
        self.inner.ctx.emit(&peer_connected_event(), json!({ "id": id }));
        rx
    }

    /// Forget a peer. Returns whether it was registered.
    pub fn remove_peer(&self, id: &str) -> bool {
        let removed = lock(&self.inner.peers).remove(id).is_some();
        if removed {
            tracing::debug!(peer = %id, "peer disconnected");
            self.inner.ctx.emit(&peer_disconnected_event(), json!({ "id": id }));
        }
        removed
    }

    /// Handle one text frame from a peer.
    pub fn handle_text(&self, text: &str) -> Result<(), TransportError> {
        let result = receive_text(&self.inner.ctx, text);
        match &result {
            Ok(()) => self.inner.stats.received(),
            Err(_) => self.inner.stats.failed(),
        }
        result
    }

    pub fn peer_count(&self) -> usize {
        lock(&self.inner.peers).len()
    }

    pub fn stats(&self) -> TransportStats {
        self.inner.stats.snapshot()
    }

    /// Build an axum `Router` serving the upgrade route.
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.inner.config.path, get(upgrade_handler))
            .with_state(self.clone())
    }

    /// Serve the hub at the given address (e.g. `"0.0.0.0:3000"`).
    pub async fn serve(&self, addr: &str) -> Result<(), std::io::Error> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await
    }

    /// Stop forwarding and drop every peer. Returns final counts.
    pub fn close(&self) -> TransportStats {
        self.inner.ctx.remove_listener(&self.inner.filter, self.inner.listener);
        let ids: Vec<String> = lock(&self.inner.peers).keys().cloned().collect();
        for id in ids {
            self.remove_peer(&id);
        }
        self.inner.stats.snapshot()
    }

    async fn run_peer(self, socket: WebSocket) {
        let id = generate_id();
        let mut outgoing = self.add_peer(id.clone());
        let (mut sink, mut incoming) = socket.split();

        let writer = tokio::spawn(async move {
            while let Some(text) = outgoing.recv().await {
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        });

        while let Some(frame) = incoming.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    let _ = self.handle_text(&text);
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    report_error(&self.inner.ctx, &TransportError::Disconnected(e.to_string()));
                    break;
                }
            }
        }

        self.remove_peer(&id);
        writer.abort();
    }
}

/// `GET {path}`: upgrade to a WebSocket and join the hub.
async fn upgrade_handler(State(hub): State<WsHub>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| hub.run_peer(socket))
}
