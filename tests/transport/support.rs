//! Helpers shared by the transport suites.

use std::time::Duration;

use eventa_rust::{Context, Event};
use serde_json::Value;
use tokio::sync::mpsc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Collect every event emitted on `event`'s tag in `ctx`.
pub fn record(ctx: &Context, event: &Event) -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    ctx.on(event, move |event, _| {
        let _ = tx.send(event.clone());
    });
    rx
}

/// Next recorded event, failing the test after one second.
pub async fn next(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("recorder closed")
}

pub fn body(event: &Event) -> &Value {
    event.body.as_ref().expect("event without body")
}
