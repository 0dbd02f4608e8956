use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// String attributes attached to a message. Iteration order is unspecified.
pub type Attributes = HashMap<String, String>;

/// A named channel to which messages are published.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Topic {
    /// The project-scoped topic id.
    pub id: String,
}

impl Topic {
    /// Creates a topic handle for the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A named feed bound to exactly one topic.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Subscription {
    /// The subscription id.
    pub id: String,

    /// The topic the subscription was bound to at creation.
    pub topic_id: String,
}

/// A published message as seen by a subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Broker-assigned unique id.
    pub id: String,

    /// Opaque payload.
    pub payload: Bytes,

    /// String attributes.
    pub attributes: Attributes,

    /// When the broker accepted the message.
    pub publish_time: DateTime<Utc>,
}
