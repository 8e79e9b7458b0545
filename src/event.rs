//! The event value delivered to listeners.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tag::Tag;

/// Which side of a transport an event is travelling towards.
///
/// Transports forward events that are `Outbound` or carry no direction and
/// never forward `Inbound` ones, which keeps two bridged contexts from
/// bouncing the same event back and forth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    Inbound,
    Outbound,
}

/// Category discriminant that does not consume the tag namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    InvokeSend,
    InvokeSendError,
    InvokeReceive,
    InvokeReceiveError,
    InvokeReceiveStreamEnd,
    TransportError,
    PeerConnected,
    PeerDisconnected,
}

/// An event: its tag, optional category and direction, and the body
/// attached at emission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Tag,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EventKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Event {
    pub fn new(id: impl Into<Tag>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            flow: None,
            body: None,
        }
    }

    /// Define an event, generating a tag when none is given.
    pub fn define(tag: Option<&str>) -> Self {
        match tag {
            Some(tag) => Self::new(tag),
            None => Self::new(Tag::generate()),
        }
    }

    pub fn inbound(id: impl Into<Tag>) -> Self {
        Self::new(id).with_flow(FlowDirection::Inbound)
    }

    pub fn outbound(id: impl Into<Tag>) -> Self {
        Self::new(id).with_flow(FlowDirection::Outbound)
    }

    pub fn with_kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_flow(mut self, flow: FlowDirection) -> Self {
        self.flow = Some(flow);
        self
    }

    /// Materialize this event with a body.
    pub fn with_body(&self, body: Value) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind,
            flow: self.flow,
            body: Some(body),
        }
    }

    pub fn tag(&self) -> &Tag {
        &self.id
    }

    pub fn is_inbound(&self) -> bool {
        self.flow == Some(FlowDirection::Inbound)
    }

    /// True for events a transport should put on the wire.
    pub fn is_outbound_or_undirected(&self) -> bool {
        matches!(self.flow, None | Some(FlowDirection::Outbound))
    }
}

/// Shorthand for [`Event::define`].
pub fn define_event(tag: Option<&str>) -> Event {
    Event::define(tag)
}
