//! Message, event and listener types
//!
//! Serializable types use camelCase JSON, matching the managed service's
//! REST representation.

use crate::delivery::SubscriptionCore;
use crate::error::{PubSubError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};

/// Message attributes (string keys to string values)
pub type Attributes = HashMap<String, String>;

/// A message delivered to a `"message"` listener
///
/// Each delivery carries its own `ack_id`; acking or nacking settles exactly
/// that delivery. Settling twice, or settling after the subscription was
/// deleted, does nothing.
#[derive(Clone)]
pub struct Message {
    /// Server-assigned message id, shared by every subscription's copy
    pub id: String,

    /// Identifies this delivery attempt on this subscription
    pub ack_id: String,

    /// Raw payload
    pub data: Bytes,

    /// Key-value attributes supplied at publish time
    pub attributes: Attributes,

    /// When the topic accepted the message
    pub publish_time: DateTime<Utc>,

    /// 1 on first delivery, incremented on every nack
    pub delivery_attempt: u32,

    pub(crate) core: Weak<SubscriptionCore>,
}

impl Message {
    /// Acknowledge the delivery, removing the message for good
    pub fn ack(&self) {
        if let Some(core) = self.core.upgrade() {
            core.ack(&self.ack_id);
        }
    }

    /// Return the message to the head of the queue for redelivery
    pub fn nack(&self) {
        if let Some(core) = self.core.upgrade() {
            core.nack(&self.ack_id);
        }
    }

    /// Decode the payload as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.data)?)
    }

    /// Payload as UTF-8 text, lossily decoded
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Look up a single attribute
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("ack_id", &self.ack_id)
            .field("data", &self.data)
            .field("attributes", &self.attributes)
            .field("publish_time", &self.publish_time)
            .field("delivery_attempt", &self.delivery_attempt)
            .finish()
    }
}

/// Payload of an outgoing message
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw bytes, sent as-is
    Data(Bytes),
    /// JSON value, serialized to bytes on publish
    Json(serde_json::Value),
}

/// An outgoing message for [`Topic::publish_message`](crate::Topic::publish_message)
#[derive(Debug, Clone, PartialEq)]
pub struct PublishMessage {
    /// Raw or JSON payload
    pub payload: Payload,

    /// Key-value attributes
    pub attributes: Attributes,
}

impl PublishMessage {
    /// Message with a raw payload
    pub fn data(data: impl Into<Bytes>) -> Self {
        Self {
            payload: Payload::Data(data.into()),
            attributes: Attributes::new(),
        }
    }

    /// Message with a JSON payload
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self {
            payload: Payload::Json(serde_json::to_value(value)?),
            attributes: Attributes::new(),
        })
    }

    /// Add one attribute
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Replace all attributes
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub(crate) fn into_parts(self) -> Result<(Bytes, Attributes)> {
        let data = match self.payload {
            Payload::Data(data) => data,
            Payload::Json(value) => Bytes::from(serde_json::to_vec(&value)?),
        };
        Ok((data, self.attributes))
    }
}

/// Event kinds a listener can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Delivered messages
    Message,
    /// Subscription-level failures
    Error,
    /// The subscription stopped delivering
    Close,
}

impl EventKind {
    /// Lower-case event name
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::Error => "error",
            EventKind::Close => "close",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = PubSubError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "message" => Ok(EventKind::Message),
            "error" => Ok(EventKind::Error),
            "close" => Ok(EventKind::Close),
            other => Err(PubSubError::InvalidArgument(format!(
                "Unknown event kind: {}",
                other
            ))),
        }
    }
}

/// What a listener receives
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    /// A delivered message (only for `"message"` listeners)
    Message(Message),
    /// A subscription error (only for `"error"` listeners)
    Error(Arc<PubSubError>),
    /// The subscription closed (only for `"close"` listeners)
    Close,
}

impl SubscriptionEvent {
    /// Kind of listener this event goes to
    pub fn kind(&self) -> EventKind {
        match self {
            SubscriptionEvent::Message(_) => EventKind::Message,
            SubscriptionEvent::Error(_) => EventKind::Error,
            SubscriptionEvent::Close => EventKind::Close,
        }
    }
}

/// Handle returned when registering a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Point-in-time counters for one subscription
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStats {
    /// Messages waiting for a listener
    pub pending: usize,

    /// Messages delivered and awaiting ack or nack
    pub in_flight: usize,

    /// Registered listeners across all event kinds
    pub listeners: usize,
}
