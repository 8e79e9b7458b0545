//! In-process duplex transport over Tokio channels.
//!
//! Stands in for a worker port or IPC pipe: envelopes cross as JSON text,
//! exactly as they would over a real byte channel.
//!
//! ```ignore
//! let (left, right) = channel::pair(&ChannelConfig::default());
//! let main = left.attach(&main_ctx)?;
//! let worker = right.attach(&worker_ctx)?;
//! // invokes defined on main_ctx now reach handlers on worker_ctx
//! let stats = main.stop().await;
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::{receive_text, report_error, wire_filter, StatsCounter, TransportHandle, WireEnvelope};
use crate::context::Context;
use crate::error::TransportError;

/// Configuration for a channel pair.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Envelopes buffered per direction before sends fail.
    /// Default: 1024.
    ///
    /// Sends never wait. A stream handler that produces more replies than
    /// this without yielding overflows the buffer: the extra replies and the
    /// stream-end are dropped (each reported as a transport error event),
    /// and the consumer's stream never ends. Size it above the longest
    /// burst, or bound such calls with a timeout.
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl ChannelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

/// One end of a duplex channel.
#[derive(Debug)]
pub struct ChannelEndpoint {
    tx: mpsc::Sender<String>,
    rx: mpsc::Receiver<String>,
}

/// Create two connected endpoints.
pub fn pair(config: &ChannelConfig) -> (ChannelEndpoint, ChannelEndpoint) {
    let capacity = config.capacity.max(1);
    let (left_tx, right_rx) = mpsc::channel(capacity);
    let (right_tx, left_rx) = mpsc::channel(capacity);
    (
        ChannelEndpoint {
            tx: left_tx,
            rx: left_rx,
        },
        ChannelEndpoint {
            tx: right_tx,
            rx: right_rx,
        },
    )
}

impl ChannelEndpoint {
    /// A raw sender into the peer, bypassing envelope encoding.
    pub fn raw_sender(&self) -> mpsc::Sender<String> {
        self.tx.clone()
    }

    /// Bridge this endpoint to `ctx`.
    ///
    /// The reader task runs on the context's runtime; fails when there is
    /// none.
    pub fn attach(self, ctx: &Context) -> Result<TransportHandle, TransportError> {
        let runtime = ctx
            .runtime_handle()
            .ok_or_else(|| TransportError::Other("no async runtime to attach channel".into()))?;
        let stats = Arc::new(StatsCounter::default());
        let ChannelEndpoint { tx, mut rx } = self;

        let filter = wire_filter();
        let weak = ctx.downgrade();
        let out_stats = Arc::clone(&stats);
        let listener = ctx.on(&filter, move |event, _| {
            let sent = WireEnvelope::from_event(event).encode().and_then(|text| {
                tx.try_send(text)
                    .map_err(|e| TransportError::Disconnected(e.to_string()))
            });
            match sent {
                Ok(()) => out_stats.sent(),
                Err(e) => {
                    out_stats.failed();
                    if let Some(ctx) = weak.upgrade() {
                        report_error(&ctx, &e);
                    }
                }
            }
        });

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let weak = ctx.downgrade();
        let in_stats = Arc::clone(&stats);
        let task = runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    message = rx.recv() => {
                        let Some(ctx) = weak.upgrade() else {
                            break;
                        };
                        match message {
                            Some(text) => match receive_text(&ctx, &text) {
                                Ok(()) => in_stats.received(),
                                Err(_) => in_stats.failed(),
                            },
                            None => {
                                report_error(&ctx, &TransportError::Disconnected("peer closed".into()));
                                break;
                            }
                        }
                    }
                }
            }
            tracing::debug!("channel reader stopped");
        });

        Ok(TransportHandle::new(ctx, filter, listener, stats).with_task(stop_tx, task))
    }
}
