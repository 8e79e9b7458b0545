//! Correlated bodies carried by invoke events, and the reply side helper.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::Context;
use crate::event::Event;

/// Body of every invoke event: `{"invokeId": ..., "content": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokePayload {
    pub invoke_id: String,
    #[serde(default)]
    pub content: Value,
}

impl InvokePayload {
    pub fn new(invoke_id: impl Into<String>, content: Value) -> Self {
        Self {
            invoke_id: invoke_id.into(),
            content,
        }
    }

    /// Extract the payload of an event. `None` for foreign or malformed
    /// traffic: no body, or no non-empty `invokeId`.
    pub fn from_event(event: &Event) -> Option<Self> {
        let body = event.body.as_ref()?;
        let payload: InvokePayload = serde_json::from_value(body.clone()).ok()?;
        if payload.invoke_id.is_empty() {
            return None;
        }
        Some(payload)
    }

    pub fn into_value(self) -> Value {
        json!({ "invokeId": self.invoke_id, "content": self.content })
    }
}

/// Error content: `{"message": ...}`.
pub(crate) fn error_content(message: &str) -> Value {
    json!({ "message": message })
}

/// Recover a message from error content, tolerating peers that send a bare
/// string or some other shape.
pub(crate) fn error_message(content: &Value) -> String {
    match content {
        Value::String(message) => message.clone(),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => content.to_string(),
        },
        other => other.to_string(),
    }
}

/// Emits correlated replies for one invocation.
pub(crate) struct Replier {
    pub ctx: Context,
    pub receive: Event,
    pub receive_error: Event,
    pub receive_stream_end: Event,
    pub invoke_id: String,
}

impl Replier {
    pub fn reply<T: Serialize>(&self, value: &T) -> bool {
        match serde_json::to_value(value) {
            Ok(content) => {
                self.emit(&self.receive, content);
                true
            }
            Err(e) => {
                self.error(&format!("encode failed: {}", e));
                false
            }
        }
    }

    pub fn error(&self, message: &str) {
        self.emit(&self.receive_error, error_content(message));
    }

    pub fn end(&self) {
        self.emit(&self.receive_stream_end, Value::Null);
    }

    fn emit(&self, event: &Event, content: Value) {
        let body = InvokePayload::new(self.invoke_id.clone(), content).into_value();
        self.ctx.emit(event, body);
    }
}
